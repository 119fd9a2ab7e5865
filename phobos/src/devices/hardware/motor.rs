use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

/// Simulation names of the steering motors, in group index order.
pub const STEER_MOTOR_ORDER: [&str; 6] = [
    "fl_gimbal",
    "ml_gimbal",
    "rl_gimbal",
    "fr_gimbal",
    "mr_gimbal",
    "rr_gimbal",
];

/// Simulation names of the drive motors, in group index order.
pub const DRIVE_MOTOR_ORDER: [&str; 6] = [
    "fl_drive", "ml_drive", "rl_drive", "fr_drive", "mr_drive", "rr_drive",
];

/// A single rotary joint exposed by the simulation host. The controller
/// only ever writes setpoints, reading state back is the host's concern.
pub trait Motor {
    /// Command an absolute position in radians. Passing
    /// `f64::INFINITY` switches the joint into unbounded rotation, after
    /// which it follows the velocity setpoint.
    fn set_position(&mut self, position_rad: f64);

    /// Command an angular velocity in radians per second.
    fn set_velocity(&mut self, speed_rads: f64);
}

/// How an actuator id is driven. Decided by the first three characters
/// of the id on the wire.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ActuatorClass {
    /// Gimbal motors, commanded by position.
    Steer,
    /// Wheel motors, commanded by velocity.
    Drive,
    /// Manipulator joints. Known to the protocol, not fitted to the rover.
    Arm,
}

/// Every actuator id the command protocol recognises.
#[derive(
    EnumString,
    IntoStaticStr,
    Display,
    EnumIter,
    Deserialize,
    Serialize,
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
)]
pub enum ActuatorId {
    DrvFL,
    DrvML,
    DrvRL,
    DrvFR,
    DrvMR,
    DrvRR,
    StrFL,
    StrML,
    StrRL,
    StrFR,
    StrMR,
    StrRR,
    ArmBase,
    ArmShoulder,
    ArmElbow,
    ArmWrist,
    ArmGrabber,
}

impl ActuatorId {
    /// Class of the actuator, taken from the three character prefix.
    pub fn class(self) -> ActuatorClass {
        let name: &'static str = self.into();
        match &name[..3] {
            "Str" => ActuatorClass::Steer,
            "Drv" => ActuatorClass::Drive,
            _ => ActuatorClass::Arm,
        }
    }

    /// Index of the actuator within its motor group.
    pub fn group_index(self) -> usize {
        use ActuatorId::*;
        match self {
            DrvFL | StrFL | ArmBase => 0,
            DrvML | StrML | ArmShoulder => 1,
            DrvRL | StrRL | ArmElbow => 2,
            DrvFR | StrFR | ArmWrist => 3,
            DrvMR | StrMR | ArmGrabber => 4,
            DrvRR | StrRR => 5,
        }
    }
}
