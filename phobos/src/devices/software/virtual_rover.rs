use crate::devices::hardware::{
    camera::{CameraDevice, CameraId},
    motor::{Motor, DRIVE_MOTOR_ORDER, STEER_MOTOR_ORDER},
};
use crate::devices::software::simulation::{SimulationHost, StepOutcome};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    thread,
    time::Duration,
};
use strum::IntoEnumIterator;

/// Default framebuffer size of the virtual cameras.
pub const DEFAULT_RESOLUTION: (u32, u32) = (320, 240);

/// Setpoints last written to a virtual motor.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct MotorState {
    pub position: f64,
    pub velocity: f64,
}

/// Motor handle into the virtual world. Clones share the same joint, so a
/// probe taken before the host is handed to the controller keeps seeing
/// every setpoint the controller writes.
#[derive(Clone, Default)]
pub struct VirtualMotor {
    state: Arc<Mutex<MotorState>>,
}

impl VirtualMotor {
    /// Current setpoints of the joint.
    pub fn state(&self) -> MotorState {
        *lock(&self.state)
    }
}

impl Motor for VirtualMotor {
    fn set_position(&mut self, position_rad: f64) {
        lock(&self.state).position = position_rad;
    }

    fn set_velocity(&mut self, speed_rads: f64) {
        lock(&self.state).velocity = speed_rads;
    }
}

struct CameraState {
    width: u32,
    height: u32,
    sample_period_ms: Option<u32>,
    last_sample_ms: Option<u64>,
    samples: u64,
    frame: Option<Vec<u8>>,
    /// Injected framebuffers are never overwritten by the test pattern.
    pinned: bool,
}

impl CameraState {
    /// Moving B,G,R,A gradient so consecutive frames differ.
    fn sample_pattern(&mut self) {
        let shift = self.samples as usize;
        let mut frame = Vec::with_capacity(self.width as usize * self.height as usize * 4);
        for y in 0..self.height as usize {
            for x in 0..self.width as usize {
                frame.extend_from_slice(&[
                    (x + shift) as u8,
                    (y + shift) as u8,
                    shift as u8,
                    u8::MAX,
                ]);
            }
        }
        self.frame = Some(frame);
        self.samples += 1;
    }
}

/// Camera handle into the virtual world.
#[derive(Clone)]
pub struct VirtualCamera {
    state: Arc<Mutex<CameraState>>,
}

impl VirtualCamera {
    fn new(width: u32, height: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(CameraState {
                width,
                height,
                sample_period_ms: None,
                last_sample_ms: None,
                samples: 0,
                frame: None,
                pinned: false,
            })),
        }
    }

    /// Sample period set by the controller, `None` while disabled.
    pub fn sample_period_ms(&self) -> Option<u32> {
        lock(&self.state).sample_period_ms
    }
}

impl CameraDevice for VirtualCamera {
    fn enable(&mut self, sample_period_ms: u32) {
        lock(&self.state).sample_period_ms = Some(sample_period_ms);
    }

    fn image(&self) -> Option<Vec<u8>> {
        lock(&self.state).frame.clone()
    }

    fn width(&self) -> u32 {
        lock(&self.state).width
    }

    fn height(&self) -> u32 {
        lock(&self.state).height
    }
}

/// In-process simulation host with the rover's full set of steer and
/// drive motors and its three cameras. Physics is not modelled, the host
/// only records setpoints and produces frames on the camera clocks.
pub struct VirtualRover {
    motors: HashMap<&'static str, VirtualMotor>,
    cameras: HashMap<&'static str, VirtualCamera>,
    time_ms: u64,
    steps: u64,
    max_steps: Option<u64>,
    realtime: bool,
}

impl VirtualRover {
    /// Create a rover whose cameras produce `width` x `height` frames.
    pub fn new(width: u32, height: u32) -> Self {
        let motors = STEER_MOTOR_ORDER
            .iter()
            .chain(DRIVE_MOTOR_ORDER.iter())
            .map(|name| (*name, VirtualMotor::default()))
            .collect();
        let cameras = CameraId::iter()
            .map(|id| (id.device_name(), VirtualCamera::new(width, height)))
            .collect();
        Self {
            motors,
            cameras,
            time_ms: 0,
            steps: 0,
            max_steps: None,
            realtime: false,
        }
    }

    /// End the run after `max_steps` steps, like a finite simulation would.
    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    /// Sleep one timestep of wall clock per step.
    pub fn with_realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    /// Pin a fixed framebuffer on a camera. Returns false if the world has
    /// no camera with that name.
    ///
    /// * `device_name`: camera name in the world, e.g. `l_cam`.
    /// * `frame`: B,G,R,A bytes matching the camera resolution.
    pub fn set_framebuffer(&mut self, device_name: &str, frame: Vec<u8>) -> bool {
        match self.cameras.get(device_name) {
            Some(camera) => {
                let mut state = lock(&camera.state);
                state.frame = Some(frame);
                state.pinned = true;
                true
            }
            None => false,
        }
    }

    /// Shared handle to a motor, for observing setpoints from outside.
    pub fn probe_motor(&self, name: &str) -> Option<VirtualMotor> {
        self.motors.get(name).cloned()
    }

    /// Shared handle to a camera, for observing it from outside.
    pub fn probe_camera(&self, name: &str) -> Option<VirtualCamera> {
        self.cameras.get(name).cloned()
    }

    /// Number of completed steps.
    pub fn steps(&self) -> u64 {
        self.steps
    }
}

impl Default for VirtualRover {
    fn default() -> Self {
        Self::new(DEFAULT_RESOLUTION.0, DEFAULT_RESOLUTION.1)
    }
}

impl SimulationHost for VirtualRover {
    type Motor = VirtualMotor;
    type Camera = VirtualCamera;

    fn motor(&mut self, name: &str) -> Option<VirtualMotor> {
        self.probe_motor(name)
    }

    fn camera(&mut self, name: &str) -> Option<VirtualCamera> {
        self.probe_camera(name)
    }

    fn step(&mut self, timestep_ms: u32) -> StepOutcome {
        if self.max_steps.is_some_and(|max| self.steps >= max) {
            return StepOutcome::Finished;
        }
        if self.realtime {
            thread::sleep(Duration::from_millis(timestep_ms.into()));
        }
        self.time_ms += u64::from(timestep_ms);
        self.steps += 1;

        for camera in self.cameras.values() {
            let mut state = lock(&camera.state);
            let Some(period) = state.sample_period_ms else {
                continue;
            };
            let due = state
                .last_sample_ms
                .map_or(true, |last| self.time_ms - last >= u64::from(period));
            if due {
                state.last_sample_ms = Some(self.time_ms);
                if !state.pinned {
                    state.sample_pattern();
                }
            }
        }
        StepOutcome::Continue
    }
}

/// The virtual world never panics while holding a lock, but a poisoned
/// lock still holds valid setpoints.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
