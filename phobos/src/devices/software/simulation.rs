use crate::devices::hardware::{camera::CameraDevice, motor::Motor};

/// Outcome of advancing the simulated world by one step.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// The world advanced, keep running.
    Continue,
    /// The host ended the run, the controller must shut down.
    Finished,
}

/// The host that owns the simulated world. It hands out device handles
/// once at start-up and is stepped by the control loop at a fixed rate.
pub trait SimulationHost {
    type Motor: Motor;
    type Camera: CameraDevice;

    /// Look up a motor by its name in the world.
    fn motor(&mut self, name: &str) -> Option<Self::Motor>;

    /// Look up a camera by its name in the world.
    fn camera(&mut self, name: &str) -> Option<Self::Camera>;

    /// Advance the world by `timestep_ms` of simulated time.
    fn step(&mut self, timestep_ms: u32) -> StepOutcome;
}
