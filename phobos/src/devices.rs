/// Devices are the atomic units that can be combined together
/// into components. Their core responsibilities do not change
/// based on location, name etc.
pub mod hardware {
    /// Device interface for the simulated cameras.
    pub mod camera;
    /// Device interface for the steer, drive and arm motors.
    pub mod motor;
}

/// The simulation host that owns the hardware and the world clock.
pub mod software {
    /// Contract between the controller and whichever host steps the world.
    pub mod simulation;
    /// In-process host used by the controller binary and the tests.
    pub mod virtual_rover;
}
