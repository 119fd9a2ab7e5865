/**
The phobos controller bridges a simulated rover to its operators. Functionality is
split the same way as on the vehicle: a control loop owns the rover's motors and
cameras and steps the simulation, while a camera relay runs beside it to serve
encoded frames, so that slow image encoding never holds up actuation.
*/

/// Components in the system are created by grouping together
/// devices into a logical unit that performs some function
/// for the overall control system.
pub mod components;
/// Devices that are an atomic unit, and can be composed
/// with other devices into components to perform some function.
pub mod devices;
/// Error types shared across the controller.
pub mod error;
/// Message structure for communication into and out of the
/// control system, and between its two loops.
pub mod messages;
/// Sockets the operators talk to, and the channel joining the
/// control loop and the camera relay.
pub mod transport;
/// Development utilities for working with serialisation,
/// image information and logging.
pub mod utils;
