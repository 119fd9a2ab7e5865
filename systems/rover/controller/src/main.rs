//! Rover controller binary.
use clap::Parser;
use phobos::components::prelude::*;
use phobos::devices::software::virtual_rover::{VirtualRover, DEFAULT_RESOLUTION};
use phobos::error::{Result, RoverError};
use phobos::utils::logging;
use std::process::ExitCode;

/// Arguments required for starting the program from the command line.
#[derive(Parser, Debug)]
struct Args {
    /// Path to the config file for the rover controller.
    #[arg(short, long)]
    filepath: String,
    /// Width of the virtual camera frames.
    #[arg(long, default_value_t = DEFAULT_RESOLUTION.0)]
    width: u32,
    /// Height of the virtual camera frames.
    #[arg(long, default_value_t = DEFAULT_RESOLUTION.1)]
    height: u32,
}

fn main() -> ExitCode {
    logging::init();
    let args = Args::parse();
    match run(&args) {
        Ok(RunOutcome::SimulationEnded) => ExitCode::SUCCESS,
        Ok(RunOutcome::CommandFailure) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(error = %e, cause = ?std::error::Error::source(&e), "rover controller failed");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<RunOutcome> {
    let config = RoverConfig::from_file(&args.filepath)?;
    tracing::info!(filepath = %args.filepath, ?config, "loaded rover config");

    // Socket tasks run here, the control loop and camera relay on their own threads.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(RoverError::Runtime)?;
    let sockets = RoverSockets::bind(runtime.handle(), &config)?;

    let host = VirtualRover::new(args.width, args.height).with_realtime(true);
    RoverController::start(host, &config, sockets)
}
