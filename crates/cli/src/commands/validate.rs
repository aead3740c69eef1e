//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{AcquisitionBlueprint, EngineKind, NO_POSITION};
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
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    engine: String,
    event_count: usize,
    position_count: usize,
    channel_count: usize,
    drift_entries: usize,
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

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);

            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    engine: blueprint.engine.kind.as_str().to_string(),
                    event_count: blueprint.to_sequence().len(),
                    position_count: blueprint.sequence.stage_positions.len(),
                    channel_count: blueprint.sequence.channels.len(),
                    drift_entries: blueprint.drift.len(),
                    sink_count: blueprint.sinks.len(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &AcquisitionBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.sinks.is_empty() {
        warnings.push("No sinks configured - frames will only be counted".to_string());
    }

    if blueprint.sequence.shape().is_empty() {
        warnings.push("Sequence has no dimensions - a single event will be acquired".to_string());
    }

    match blueprint.engine.kind {
        EngineKind::Dev if !blueprint.drift.is_empty() => {
            warnings.push("Drift table is ignored by the dev engine".to_string());
        }
        EngineKind::DriftCorrection if blueprint.drift.is_empty() => {
            warnings.push("Drift engine with an empty drift table - no correction applied".to_string());
        }
        _ => {}
    }

    if blueprint.drift.iter().any(|entry| entry.position == NO_POSITION)
        && !blueprint.sequence.stage_positions.is_empty()
    {
        warnings.push(format!(
            "Drift entry for position {NO_POSITION} never matches a sequence with stage positions"
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Engine: {}", summary.engine);
            println!("  Events: {}", summary.event_count);
            println!("  Positions: {}", summary.position_count);
            println!("  Channels: {}", summary.channel_count);
            println!("  Drift entries: {}", summary.drift_entries);
            println!("  Sinks: {}", summary.sink_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
