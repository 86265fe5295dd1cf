//! Configuration validation module
//!
//! Uses the `validator` crate for structured validation while retaining
//! custom validation rules.
//!
//! Validation rules:
//! - sensor names and wire addresses must be unique
//! - each body segment carries at most one sensor
//! - joint decomposition requires both ends: a segment whose joint partner
//!   is absent is reported (warning-grade, expressed as validation error
//!   only for an empty fleet)
//! - sample_rate_hz bounds and non-empty names (handled by validator derive)

use std::collections::HashSet;

use contracts::{PipelineError, SessionBlueprint};
use validator::Validate;

/// Validate SessionBlueprint configuration
///
/// First runs structured validator checks, then executes custom validation.
pub fn validate(blueprint: &SessionBlueprint) -> Result<(), PipelineError> {
    // 1. Run validator derive defined rules
    blueprint
        .validate()
        .map_err(|e| PipelineError::config_validation("validation", format!("{}", e)))?;

    // 2. Execute custom validation (uniqueness, mapping integrity)
    validate_fleet_not_empty(blueprint)?;
    validate_unique_sensor_names(blueprint)?;
    validate_unique_wire_ids(blueprint)?;
    validate_unique_segments(blueprint)?;

    Ok(())
}

fn validate_fleet_not_empty(blueprint: &SessionBlueprint) -> Result<(), PipelineError> {
    if blueprint.sensors.is_empty() {
        return Err(PipelineError::config_validation(
            "sensors",
            "at least one sensor mapping is required",
        ));
    }
    Ok(())
}

/// Validate sensor name uniqueness
fn validate_unique_sensor_names(blueprint: &SessionBlueprint) -> Result<(), PipelineError> {
    let mut seen = HashSet::with_capacity(blueprint.sensors.len());
    for sensor in &blueprint.sensors {
        if !seen.insert(&sensor.name) {
            return Err(PipelineError::config_validation(
                format!("sensors[name={}]", sensor.name),
                "duplicate sensor name",
            ));
        }
    }
    Ok(())
}

/// Validate wire address uniqueness
fn validate_unique_wire_ids(blueprint: &SessionBlueprint) -> Result<(), PipelineError> {
    let mut seen = HashSet::with_capacity(blueprint.sensors.len());
    for sensor in &blueprint.sensors {
        if !seen.insert(sensor.wire_id) {
            return Err(PipelineError::config_validation(
                format!("sensors[wire_id={}]", sensor.wire_id),
                "duplicate wire_id",
            ));
        }
    }
    Ok(())
}

/// Validate one sensor per segment
fn validate_unique_segments(blueprint: &SessionBlueprint) -> Result<(), PipelineError> {
    let mut seen = HashSet::with_capacity(blueprint.sensors.len());
    for sensor in &blueprint.sensors {
        if !seen.insert(sensor.segment) {
            return Err(PipelineError::config_validation(
                format!("sensors[name={}]", sensor.name),
                format!("segment '{}' already has a sensor", sensor.segment),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{
        ConfigVersion, MagneticConfig, Segment, SensorMapping, SessionConfig, SyncTuning,
    };

    fn minimal_blueprint() -> SessionBlueprint {
        SessionBlueprint {
            version: ConfigVersion::V1,
            session: SessionConfig {
                name: "lab".into(),
                sample_rate_hz: 60.0,
                default_node_id: 0,
            },
            sensors: vec![
                SensorMapping {
                    wire_id: 1,
                    name: "pelvis_imu".into(),
                    segment: Segment::Pelvis,
                },
                SensorMapping {
                    wire_id: 2,
                    name: "head_imu".into(),
                    segment: Segment::Head,
                },
            ],
            sync: SyncTuning::default(),
            fusion: Default::default(),
            magnetic: MagneticConfig::default(),
            sinks: vec![],
        }
    }

    #[test]
    fn test_minimal_blueprint_is_valid() {
        assert!(validate(&minimal_blueprint()).is_ok());
    }

    #[test]
    fn test_empty_fleet_rejected() {
        let mut bp = minimal_blueprint();
        bp.sensors.clear();
        assert!(validate(&bp).is_err());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut bp = minimal_blueprint();
        bp.sensors[1].name = "pelvis_imu".into();
        bp.sensors[1].segment = Segment::ThighLeft;
        let err = validate(&bp).unwrap_err();
        assert!(err.to_string().contains("duplicate sensor name"));
    }

    #[test]
    fn test_duplicate_wire_id_rejected() {
        let mut bp = minimal_blueprint();
        bp.sensors[1].wire_id = 1;
        let err = validate(&bp).unwrap_err();
        assert!(err.to_string().contains("duplicate wire_id"));
    }

    #[test]
    fn test_duplicate_segment_rejected() {
        let mut bp = minimal_blueprint();
        bp.sensors[1].segment = Segment::Pelvis;
        let err = validate(&bp).unwrap_err();
        assert!(err.to_string().contains("already has a sensor"));
    }

    #[test]
    fn test_empty_session_name_rejected() {
        let mut bp = minimal_blueprint();
        bp.session.name = String::new();
        assert!(validate(&bp).is_err());
    }

    #[test]
    fn test_bad_sample_rate_rejected() {
        let mut bp = minimal_blueprint();
        bp.session.sample_rate_hz = 0.0;
        assert!(validate(&bp).is_err());
    }
}
