use crate::devices::hardware::motor::ActuatorId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Literal reply sent on the command socket once a demand is received.
pub const DEMAND_ACK: &str = r#""DemsOk""#;

/// Actuator demands for one simulation step, sent by the operator.
///
/// Keys are kept as raw strings rather than [`ActuatorId`] so that one
/// unknown id does not throw away the rest of an otherwise valid demand.
#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
pub struct ActuatorDemand {
    /// Absolute position targets in radians, applied to steer actuators.
    #[serde(default)]
    pub pos_rad: BTreeMap<String, f64>,
    /// Angular velocity targets in radians per second, applied to drive
    /// actuators.
    #[serde(default)]
    pub speed_rads: BTreeMap<String, f64>,
}

impl ActuatorDemand {
    /// Create an empty demand.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a position target.
    ///
    /// * `id`: actuator to move.
    /// * `position_rad`: absolute position in radians.
    pub fn with_position(mut self, id: ActuatorId, position_rad: f64) -> Self {
        self.pos_rad.insert(id.to_string(), position_rad);
        self
    }

    /// Add a velocity target.
    ///
    /// * `id`: actuator to drive.
    /// * `speed_rads`: angular velocity in radians per second.
    pub fn with_speed(mut self, id: ActuatorId, speed_rads: f64) -> Self {
        self.speed_rads.insert(id.to_string(), speed_rads);
        self
    }

    /// True when the demand names no actuator at all.
    pub fn is_empty(&self) -> bool {
        self.pos_rad.is_empty() && self.speed_rads.is_empty()
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(r#"{"pos_rad": {"StrFL": 0.5, "StrRR": -0.5}, "speed_rads": {"DrvFL": 2.0}}"#)]
    #[case(r#"{"speed_rads": {"DrvFL": 2.0}}"#)]
    #[case(r#"{"pos_rad": {"StrML": 1}}"#)]
    #[case(r#"{"pos_rad": {}, "speed_rads": {}}"#)]
    #[case(r#"{}"#)]
    fn test_parse_demand_message(#[case] raw_string: &str) {
        let _parsed: ActuatorDemand = serde_json::from_str(raw_string).unwrap();
    }

    #[rstest]
    #[case("Hello")]
    #[case(r#"{"speed_rads": {"DrvFL": "fast"}}"#)]
    #[case(r#"{"pos_rad": [0.1, 0.2]}"#)]
    #[case(r#"["DrvFL", 2.0]"#)]
    fn test_reject_malformed_demand_message(#[case] raw_string: &str) {
        assert!(serde_json::from_str::<ActuatorDemand>(raw_string).is_err());
    }

    #[rstest]
    #[case((
        r#"{"speed_rads": {"DrvFL": 2.0}}"#,
        ActuatorDemand::new().with_speed(ActuatorId::DrvFL, 2.0)
    ))]
    #[case((
        r#"{"pos_rad": {"StrFR": 0.25}, "speed_rads": {"DrvRR": -1.0}}"#,
        ActuatorDemand::new()
            .with_position(ActuatorId::StrFR, 0.25)
            .with_speed(ActuatorId::DrvRR, -1.0)
    ))]
    fn test_parse_and_compare_demand_message(#[case] args: (&str, ActuatorDemand)) {
        let parsed: ActuatorDemand = serde_json::from_str(args.0).unwrap();

        assert_eq!(parsed, args.1, "Failed to parse message correctly");
    }

    #[test]
    /// Unknown ids survive parsing so the controller can report them.
    fn test_unknown_ids_are_kept() {
        let parsed: ActuatorDemand =
            serde_json::from_str(r#"{"speed_rads": {"DrvXX": 1.0, "DrvFL": 2.0}}"#).unwrap();
        assert_eq!(parsed.speed_rads.len(), 2);
        assert!(parsed.pos_rad.is_empty());
    }

    #[rstest]
    #[case(r#"{}"#, true)]
    #[case(r#"{"pos_rad": {}, "speed_rads": {}}"#, true)]
    #[case(r#"{"pos_rad": {"StrML": 0.1}}"#, false)]
    #[case(r#"{"speed_rads": {"DrvXX": 1.0}}"#, false)]
    fn test_empty_demand(#[case] raw_string: &str, #[case] empty: bool) {
        let parsed: ActuatorDemand = serde_json::from_str(raw_string).unwrap();
        assert_eq!(parsed.is_empty(), empty);
    }

    #[test]
    fn test_ack_is_a_json_string() {
        let ack: String = serde_json::from_str(DEMAND_ACK).unwrap();
        assert_eq!(ack, "DemsOk");
    }
}
