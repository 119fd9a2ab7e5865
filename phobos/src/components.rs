/// Components that make up the rover's controller.
pub mod rover {
    /// The main control loop: command channel, rover equipment and the
    /// simulation step.
    pub mod control_loop;
    /// The camera relay that bridges the camera socket to the control loop.
    pub mod camera_relay;
}

/// Helpful prelude when working with components.
pub mod prelude {
    pub use crate::components::rover::camera_relay::*;
    pub use crate::components::rover::control_loop::*;
}
