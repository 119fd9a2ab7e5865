/// Standardise how messages are sent into and out of
/// the rover. Provide test suite to ensure interfaces
/// are respected.
pub mod control {
    /// Demand messages come from the operator and set the
    /// motor targets for the next simulation step.
    pub mod demand;
    /// Camera messages ask for encoded frames from a set of
    /// cameras and carry the frames back.
    pub mod camera;
}

/// Messages passed between the control loop and the camera relay.
pub mod relay;
