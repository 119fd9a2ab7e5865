//! Operator client for the rover controller: send demands, stop the
//! rover, or fetch camera frames to disk.
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use phobos::devices::hardware::{
    camera::CameraId,
    motor::{ActuatorClass, ActuatorId},
};
use phobos::messages::control::{
    camera::{CameraReply, CameraRequest},
    demand::{ActuatorDemand, DEMAND_ACK},
};
use phobos::transport::request::TcpRequestSocket;
use phobos::utils::{image::FormatSpec, logging};
use std::path::{Path, PathBuf};
use strum::IntoEnumIterator;

/// Arguments required for starting the program from the command line.
#[derive(Parser, Debug)]
struct Args {
    /// Address of the rover's command socket.
    #[arg(long, default_value = "127.0.0.1:5000")]
    mech: String,
    /// Address of the rover's camera socket.
    #[arg(long, default_value = "127.0.0.1:5002")]
    cam: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send a single actuator demand.
    Demand {
        /// Steer position as ID=RAD, e.g. StrFL=0.3. Repeatable.
        #[arg(long = "pos", value_parser = parse_setpoint)]
        positions: Vec<(ActuatorId, f64)>,
        /// Drive speed as ID=RAD_S, e.g. DrvFL=2.0. Repeatable.
        #[arg(long = "speed", value_parser = parse_setpoint)]
        speeds: Vec<(ActuatorId, f64)>,
    },
    /// Zero every drive.
    Stop,
    /// Fetch frames and save them as `<camera>_<timestamp>.<ext>`.
    Cameras {
        /// Camera to capture, e.g. LeftNav. Repeatable.
        #[arg(long = "camera", required = true)]
        cameras: Vec<CameraId>,
        /// Image format name, e.g. png or jpeg.
        #[arg(long, default_value = "png")]
        format: String,
        /// Directory the images are written to.
        #[arg(long, default_value = ".")]
        output: PathBuf,
    },
}

fn parse_setpoint(raw: &str) -> std::result::Result<(ActuatorId, f64), String> {
    let (id, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected ID=VALUE, got {raw}"))?;
    let id = id
        .parse::<ActuatorId>()
        .map_err(|_| format!("unknown actuator id {id}"))?;
    let value = value
        .parse::<f64>()
        .map_err(|e| format!("bad value {value}: {e}"))?;
    Ok((id, value))
}

async fn send_demand(addr: &str, demand: &ActuatorDemand) -> Result<()> {
    let mut socket = TcpRequestSocket::connect(addr)
        .await
        .with_context(|| format!("failed to connect to the rover at {addr}"))?;
    let payload = serde_json::to_string(demand).context("failed to serialise demand")?;
    let reply = socket
        .request(&payload)
        .await
        .context("demand was not acknowledged")?;
    if reply != DEMAND_ACK {
        bail!("unexpected acknowledgement {reply}");
    }
    tracing::info!(?demand, "demand acknowledged");
    Ok(())
}

async fn fetch_frames(addr: &str, request: &CameraRequest, output: &Path) -> Result<()> {
    let mut socket = TcpRequestSocket::connect(addr)
        .await
        .with_context(|| format!("failed to connect to the camera server at {addr}"))?;
    let payload = serde_json::to_string(request).context("failed to serialise camera request")?;
    let reply = socket
        .request(&payload)
        .await
        .context("camera request failed")?;

    let frames = match serde_json::from_str(&reply).context("failed to parse camera reply")? {
        CameraReply::Frames(frames) => frames,
        CameraReply::Error { error } => {
            bail!("rover refused the request ({}): {}", error.kind, error.message)
        }
    };

    for (camera, frame) in frames.0 {
        let extension = frame.format.extension()?;
        let bytes = frame
            .image_bytes()
            .with_context(|| format!("{camera} frame is not valid base64"))?;
        let path = output.join(format!("{camera}_{}.{extension}", frame.timestamp));
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(%camera, path = %path.display(), "saved frame");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let args = Args::parse();

    match args.command {
        Command::Demand { positions, speeds } => {
            let mut demand = ActuatorDemand::new();
            for (id, position_rad) in positions {
                demand = demand.with_position(id, position_rad);
            }
            for (id, speed_rads) in speeds {
                demand = demand.with_speed(id, speed_rads);
            }
            if demand.is_empty() {
                bail!("nothing to send, give at least one --pos or --speed");
            }
            send_demand(&args.mech, &demand).await
        }
        Command::Stop => {
            let demand = ActuatorId::iter()
                .filter(|id| id.class() == ActuatorClass::Drive)
                .fold(ActuatorDemand::new(), |demand, id| demand.with_speed(id, 0.0));
            send_demand(&args.mech, &demand).await
        }
        Command::Cameras {
            cameras,
            format,
            output,
        } => {
            let request = CameraRequest {
                cameras,
                format: FormatSpec::from_name(format),
            };
            fetch_frames(&args.cam, &request, &output).await
        }
    }
}
