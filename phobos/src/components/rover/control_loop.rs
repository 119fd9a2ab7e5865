use crate::components::rover::camera_relay::{
    CameraRelay, CameraRelayController, DEFAULT_POLL_INTERVAL,
};
use crate::devices::hardware::{
    camera::{self, CameraDevice, CameraId},
    motor::{ActuatorClass, ActuatorId, Motor, DRIVE_MOTOR_ORDER, STEER_MOTOR_ORDER},
};
use crate::devices::software::simulation::{SimulationHost, StepOutcome};
use crate::error::{
    CaptureError, CommandError, ConfigError, DeviceError, RelayError, Result, RoverError,
};
use crate::messages::{
    control::{
        camera::CameraRequest,
        demand::{ActuatorDemand, DEMAND_ACK},
    },
    relay::{FrameBundle, ToControl, ToRelay},
};
use crate::transport::{
    broadcast::TcpBroadcastSocket,
    relay::{relay_channel, ControlEnd},
    reply::TcpReplySocket,
    ReplyEndpoint,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    ffi::OsStr,
    path::Path,
    str::FromStr,
    time::Duration,
};
use tokio::runtime::Handle;
use uuid::Uuid;

/// Prefix of environment variables that override the config file,
/// e.g. `PHOBOS_MECH_REP_ENDPOINT`.
pub const CONFIG_ENV_PREFIX: &str = "PHOBOS";

/// As with all elements in the phobos system, a configuration struct
/// is consumed to bring the rover up.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RoverConfig {
    /// Simulated time advanced by each control loop tick.
    pub controller_timestep_ms: u32,
    /// Sample period of the left navigation camera.
    pub left_nav_cam_timestep_ms: u32,
    /// Sample period of the right navigation camera.
    pub right_nav_cam_timestep_ms: u32,
    /// Sample period of the left depth camera.
    pub left_depth_cam_timestep_ms: u32,
    /// Address of the command (reply) socket.
    pub mech_rep_endpoint: String,
    /// Address of the telemetry (broadcast) socket.
    pub mech_pub_endpoint: String,
    /// Address of the camera (reply) socket.
    pub cam_rep_endpoint: String,
    /// How long the camera relay sleeps when a poll found nothing to do.
    #[serde(default)]
    pub cam_poll_interval_ms: Option<u64>,
}

impl Default for RoverConfig {
    fn default() -> Self {
        Self {
            controller_timestep_ms: 10,
            left_nav_cam_timestep_ms: 100,
            right_nav_cam_timestep_ms: 100,
            left_depth_cam_timestep_ms: 100,
            mech_rep_endpoint: String::from("0.0.0.0:5000"),
            mech_pub_endpoint: String::from("0.0.0.0:5001"),
            cam_rep_endpoint: String::from("0.0.0.0:5002"),
            cam_poll_interval_ms: Some(1),
        }
    }
}

impl RoverConfig {
    /// Read the config from a yaml file, then apply `PHOBOS_*`
    /// environment overrides.
    ///
    /// * `filepath`: path to config file.
    pub fn from_file<F: AsRef<OsStr>>(filepath: F) -> std::result::Result<Self, ConfigError> {
        let file = Path::new(&filepath);
        if !file.is_file() {
            return Err(ConfigError::NotFound(file.to_path_buf()));
        }
        let config_file = config::Config::builder()
            .add_source(config::File::new(
                &file.to_string_lossy(),
                config::FileFormat::Yaml,
            ))
            .add_source(config::Environment::with_prefix(CONFIG_ENV_PREFIX).try_parsing(true))
            .build()?;
        Ok(config_file.try_deserialize::<RoverConfig>()?)
    }

    /// Sample period configured for a camera.
    pub fn camera_timestep_ms(&self, camera: CameraId) -> u32 {
        match camera {
            CameraId::LeftNav => self.left_nav_cam_timestep_ms,
            CameraId::RightNav => self.right_nav_cam_timestep_ms,
            CameraId::LeftDepth => self.left_depth_cam_timestep_ms,
        }
    }

    pub fn cam_poll_interval(&self) -> Duration {
        self.cam_poll_interval_ms
            .map_or(DEFAULT_POLL_INTERVAL, Duration::from_millis)
    }
}

/// The rover's equipment as seen by the control loop: steer and drive
/// motor groups in [`STEER_MOTOR_ORDER`] / [`DRIVE_MOTOR_ORDER`] order and
/// the fitted cameras.
pub struct Rover<M, C> {
    /// Unique id of the rover, tagged on its logs.
    uuid: Uuid,
    steer_motors: Vec<M>,
    drive_motors: Vec<M>,
    cameras: BTreeMap<CameraId, C>,
}

impl<M: Motor, C: CameraDevice> Rover<M, C> {
    /// Assemble a rover from already acquired devices.
    ///
    /// * `steer_motors`: steer group, indexed by [`ActuatorId::group_index`].
    /// * `drive_motors`: drive group, indexed the same way.
    /// * `cameras`: fitted cameras.
    pub fn new(steer_motors: Vec<M>, drive_motors: Vec<M>, cameras: BTreeMap<CameraId, C>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            steer_motors,
            drive_motors,
            cameras,
        }
    }

    /// Find all equipment in the simulation and enable the cameras at the
    /// configured sample periods.
    ///
    /// * `host`: simulation host that owns the devices.
    /// * `config`: rover config.
    pub fn from_host<H>(host: &mut H, config: &RoverConfig) -> std::result::Result<Self, DeviceError>
    where
        H: SimulationHost<Motor = M, Camera = C>,
    {
        let mut find_motors = |names: &[&'static str]| {
            names
                .iter()
                .map(|&name| host.motor(name).ok_or(DeviceError::MissingMotor(name)))
                .collect::<std::result::Result<Vec<_>, _>>()
        };
        let steer_motors = find_motors(&STEER_MOTOR_ORDER)?;
        let drive_motors = find_motors(&DRIVE_MOTOR_ORDER)?;

        let mut cameras = BTreeMap::new();
        for id in [CameraId::LeftNav, CameraId::RightNav, CameraId::LeftDepth] {
            let mut camera = host
                .camera(id.device_name())
                .ok_or(DeviceError::MissingCamera(id.device_name()))?;
            camera.enable(config.camera_timestep_ms(id));
            cameras.insert(id, camera);
        }
        Ok(Self::new(steer_motors, drive_motors, cameras))
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Actuate a demand. Positions are applied to steer actuators, speeds
    /// to drive actuators after putting them into unbounded rotation.
    /// Anything else is not applied and is returned so it can be reported.
    ///
    /// * `demand`: validated demand from the command socket.
    pub fn apply(&mut self, demand: &ActuatorDemand) -> Vec<String> {
        let mut ignored = Vec::new();

        for (raw_id, &position_rad) in &demand.pos_rad {
            match resolve(raw_id, ActuatorClass::Steer, &mut self.steer_motors) {
                Some(motor) => motor.set_position(position_rad),
                None => ignored.push(raw_id.clone()),
            }
        }

        for (raw_id, &speed_rads) in &demand.speed_rads {
            match resolve(raw_id, ActuatorClass::Drive, &mut self.drive_motors) {
                Some(motor) => {
                    motor.set_position(f64::INFINITY);
                    motor.set_velocity(speed_rads);
                }
                None => ignored.push(raw_id.clone()),
            }
        }

        if !ignored.is_empty() {
            tracing::warn!(rover = %self.uuid, ids = ?ignored, "ignoring demands for unknown or unsupported actuators");
        }
        ignored
    }

    /// Bring the rover to a complete stop by zeroing every drive.
    pub fn full_stop(&mut self) {
        for motor in &mut self.drive_motors {
            motor.set_velocity(0.0);
        }
    }

    /// Capture the latest frame of every camera in a request.
    ///
    /// * `request`: forwarded camera request.
    pub fn capture(&self, request: &CameraRequest) -> std::result::Result<FrameBundle, CaptureError> {
        let mut frames = BTreeMap::new();
        for &id in &request.cameras {
            let device = self.cameras.get(&id).ok_or(CaptureError::UnknownCamera(id))?;
            frames.insert(id, camera::capture(id, device)?);
        }
        Ok(FrameBundle {
            format: request.format.clone(),
            frames,
        })
    }
}

/// Look up the motor for a raw actuator id, only if it is of `class`.
fn resolve<'a, M>(raw_id: &str, class: ActuatorClass, group: &'a mut [M]) -> Option<&'a mut M> {
    let id = ActuatorId::from_str(raw_id).ok()?;
    if id.class() != class {
        return None;
    }
    group.get_mut(id.group_index())
}

/// Take one demand off the command socket without blocking.
///
/// A payload that is not a demand, including one that could not be read
/// as a line at all, is abandoned and its sender gets no reply.
///
/// * `mech_rep`: command socket.
pub fn receive_demand<S: ReplyEndpoint>(
    mech_rep: &mut S,
) -> std::result::Result<Option<ActuatorDemand>, CommandError> {
    let parsed = match mech_rep.try_recv() {
        Ok(None) => return Ok(None),
        Ok(Some(raw)) => serde_json::from_str::<ActuatorDemand>(&raw).map_err(CommandError::from),
        Err(e) => Err(CommandError::from(e)),
    };
    if parsed.is_err() {
        mech_rep.abandon();
    }
    parsed.map(Some)
}

/// What servicing the command socket did this tick.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MechStatus {
    /// No demand was waiting.
    Idle,
    /// A demand was acknowledged and applied.
    Actuated,
    /// The command path failed, the rover has been stopped.
    Failed,
}

/// Service at most one demand: acknowledge it, then actuate. Any failure
/// stops the rover, the operator has lost control authority.
///
/// * `rover`: equipment to actuate.
/// * `mech_rep`: command socket.
pub fn handle_mech<S, M, C>(rover: &mut Rover<M, C>, mech_rep: &mut S) -> MechStatus
where
    S: ReplyEndpoint,
    M: Motor,
    C: CameraDevice,
{
    let result = receive_demand(mech_rep).and_then(|demand| match demand {
        Some(demand) => {
            // Acknowledge before actuating.
            mech_rep.send(DEMAND_ACK)?;
            Ok(Some(demand))
        }
        None => Ok(None),
    });

    match result {
        Ok(None) => MechStatus::Idle,
        Ok(Some(demand)) => {
            tracing::debug!(rover = %rover.uuid(), ?demand, "applying demand");
            rover.apply(&demand);
            MechStatus::Actuated
        }
        Err(e) => {
            tracing::error!(rover = %rover.uuid(), error = %e, cause = ?std::error::Error::source(&e), "command channel failed, stopping rover");
            rover.full_stop();
            MechStatus::Failed
        }
    }
}

/// Service at most one camera request from the relay, replying with
/// either the captured frames or the reason capture failed. Returns
/// whether a request was served.
///
/// * `rover`: equipment holding the cameras.
/// * `link`: control end of the relay channel.
pub fn handle_camera_request<M, C>(
    rover: &Rover<M, C>,
    link: &ControlEnd,
) -> std::result::Result<bool, RelayError>
where
    M: Motor,
    C: CameraDevice,
{
    let Some(ToControl::CameraRequest(request)) = link.try_recv()? else {
        return Ok(false);
    };
    let reply = match rover.capture(&request) {
        Ok(bundle) => ToRelay::Frames(bundle),
        Err(e) => {
            tracing::warn!(rover = %rover.uuid(), error = %e, "camera capture failed");
            ToRelay::CaptureFailed(e)
        }
    };
    link.send(reply)?;
    Ok(true)
}

/// Why the control loop stopped.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// The simulation host ended the run.
    SimulationEnded,
    /// The command channel failed and the rover was stopped.
    CommandFailure,
}

/// Network endpoints of the rover, bound before anything is started so a
/// bad address fails start-up cleanly.
pub struct RoverSockets {
    pub mech_rep: TcpReplySocket,
    pub mech_pub: TcpBroadcastSocket,
    pub cam_rep: TcpReplySocket,
}

impl RoverSockets {
    /// Bind all three endpoints from the config.
    ///
    /// * `runtime`: runtime serving the socket tasks.
    /// * `config`: rover config holding the endpoint addresses.
    pub fn bind(runtime: &Handle, config: &RoverConfig) -> Result<Self> {
        Ok(Self {
            mech_rep: TcpReplySocket::bind(runtime, &config.mech_rep_endpoint)?,
            mech_pub: TcpBroadcastSocket::bind(runtime, &config.mech_pub_endpoint)?,
            cam_rep: TcpReplySocket::bind(runtime, &config.cam_rep_endpoint)?,
        })
    }
}

/// Unit struct to link the controller behaviour to the rover.
pub struct RoverController;

impl RoverController {
    /// Bring the rover up on a simulation host and run until the host ends
    /// the run or the command channel fails. The camera relay runs on its
    /// own thread for the whole run and is joined before returning.
    ///
    /// * `host`: simulation host to drive.
    /// * `config`: rover config.
    /// * `sockets`: bound endpoints, see [`RoverSockets::bind`].
    pub fn start<H: SimulationHost>(
        mut host: H,
        config: &RoverConfig,
        sockets: RoverSockets,
    ) -> Result<RunOutcome> {
        let mut rover = Rover::from_host(&mut host, config)?;
        let RoverSockets {
            mut mech_rep,
            mech_pub,
            cam_rep,
        } = sockets;

        let (control_end, relay_end) = relay_channel();
        let cam_addr = cam_rep.local_addr();
        let relay = CameraRelay::new(cam_rep, relay_end, config.cam_poll_interval());
        let relay_handle = CameraRelayController::start(relay)?;
        tracing::info!(rover = %rover.uuid(), %cam_addr, "camera server started");
        tracing::info!(
            rover = %rover.uuid(),
            mech_rep = %mech_rep.local_addr(),
            mech_pub = %mech_pub.local_addr(),
            "mech server started"
        );

        tracing::info!(rover = %rover.uuid(), "starting main control loop");
        let outcome = Self::run(
            &mut host,
            &mut rover,
            &mut mech_rep,
            &control_end,
            config.controller_timestep_ms,
        );

        if control_end.send(ToRelay::Terminate).is_err() {
            tracing::warn!(rover = %rover.uuid(), "camera relay already stopped");
        }
        relay_handle.join().map_err(|_| RoverError::RelayPanicked)?;
        tracing::info!(rover = %rover.uuid(), ?outcome, "rover controller stopped");
        Ok(outcome)
    }

    /// The control loop. Each tick services at most one demand, at most
    /// one camera request, then steps the simulation.
    ///
    /// * `host`: simulation host to step.
    /// * `rover`: equipment acquired from `host`.
    /// * `mech_rep`: command socket.
    /// * `link`: control end of the relay channel.
    /// * `timestep_ms`: simulated time per tick.
    pub fn run<H, S>(
        host: &mut H,
        rover: &mut Rover<H::Motor, H::Camera>,
        mech_rep: &mut S,
        link: &ControlEnd,
        timestep_ms: u32,
    ) -> RunOutcome
    where
        H: SimulationHost,
        S: ReplyEndpoint,
    {
        let mut relay_alive = true;
        loop {
            if handle_mech(rover, mech_rep) == MechStatus::Failed {
                return RunOutcome::CommandFailure;
            }

            if relay_alive {
                if let Err(e) = handle_camera_request(rover, link) {
                    tracing::error!(rover = %rover.uuid(), error = %e, "camera relay lost, cameras are offline");
                    relay_alive = false;
                }
            }

            if host.step(timestep_ms) == StepOutcome::Finished {
                return RunOutcome::SimulationEnded;
            }
        }
    }
}
