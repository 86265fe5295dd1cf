//! `validate` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    session: String,
    sample_rate_hz: f64,
    sensor_count: usize,
    sink_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    // Check file exists
    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => ValidationResult {
            valid: true,
            config_path,
            error: None,
            summary: Some(ConfigSummary {
                version: format!("{:?}", blueprint.version),
                session: blueprint.session.name.clone(),
                sample_rate_hz: blueprint.session.sample_rate_hz,
                sensor_count: blueprint.sensors.len(),
                sink_count: blueprint.sinks.len(),
            }),
        },
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            summary: None,
        },
    }
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✅ Configuration is valid: {}", result.config_path);
        if let Some(summary) = &result.summary {
            println!("   Session: {}", summary.session);
            println!("   Sample rate: {} Hz", summary.sample_rate_hz);
            println!("   Sensors: {}", summary.sensor_count);
            println!("   Sinks: {}", summary.sink_count);
        }
    } else {
        println!("❌ Configuration is invalid: {}", result.config_path);
        if let Some(error) = &result.error {
            println!("   Error: {}", error);
        }
    }
}
