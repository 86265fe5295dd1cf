//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Validate configuration legality
//! - Generate `SessionBlueprint`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("session.toml")).unwrap();
//! println!("Session: {}", blueprint.session.name);
//! ```

mod parser;
mod validator;

pub use contracts::SessionBlueprint;
pub use parser::ConfigFormat;

use contracts::PipelineError;
use std::path::Path;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<SessionBlueprint, PipelineError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<SessionBlueprint, PipelineError> {
        Self::parse_and_validate(content, format)
    }

    /// Serialize SessionBlueprint to TOML string
    pub fn to_toml(blueprint: &SessionBlueprint) -> Result<String, PipelineError> {
        toml::to_string_pretty(blueprint)
            .map_err(|e| PipelineError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize SessionBlueprint to JSON string
    pub fn to_json(blueprint: &SessionBlueprint) -> Result<String, PipelineError> {
        serde_json::to_string_pretty(blueprint)
            .map_err(|e| PipelineError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, PipelineError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            PipelineError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            PipelineError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, PipelineError> {
        Ok(std::fs::read_to_string(path)?)
    }

    /// Parse and validate configuration content
    fn parse_and_validate(
        content: &str,
        format: ConfigFormat,
    ) -> Result<SessionBlueprint, PipelineError> {
        let blueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_TOML: &str = r#"
[session]
name = "gait-lab"
sample_rate_hz = 60.0

[[sensors]]
wire_id = 1
name = "pelvis_imu"
segment = "pelvis"

[[sensors]]
wire_id = 2
name = "thigh_l_imu"
segment = "thigh_left"

[[sinks]]
name = "log_sink"
sink_type = "log"
"#;

    #[test]
    fn test_load_minimal_toml() {
        let blueprint = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        assert_eq!(blueprint.session.name, "gait-lab");
        assert_eq!(blueprint.sensors.len(), 2);
        assert_eq!(blueprint.sinks.len(), 1);
    }

    #[test]
    fn test_roundtrip_through_toml() {
        let blueprint = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let rendered = ConfigLoader::to_toml(&blueprint).unwrap();
        let reloaded = ConfigLoader::load_from_str(&rendered, ConfigFormat::Toml).unwrap();
        assert_eq!(reloaded.sensors.len(), blueprint.sensors.len());
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let err = ConfigLoader::load_from_path(Path::new("session.yaml"));
        assert!(err.is_err());
    }
}
