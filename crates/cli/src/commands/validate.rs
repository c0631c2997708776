//! `validate` command implementation.

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::ConfigDocument;
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
    control_addr: String,
    heartbeat_addr: String,
    device_count: usize,
    device_types: Vec<String>,
    writers_in_use: Vec<String>,
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

    match ConfigLoader::load_from_path(&args.config) {
        Ok(document) => {
            let warnings = collect_warnings(&document);
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
                    control_addr: document.control_addr.clone(),
                    heartbeat_addr: document.heartbeat_addr.clone(),
                    device_count: document.device_count(),
                    device_types: document.devices.keys().cloned().collect(),
                    writers_in_use: document
                        .enabled_writers()
                        .map(|(tag, _)| tag.to_string())
                        .collect(),
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
fn collect_warnings(document: &ConfigDocument) -> Vec<String> {
    let mut warnings = Vec::new();

    if document.device_count() == 0 {
        warnings.push("No devices configured - runs will build no events".to_string());
    }

    let mut in_use = 0;
    for (tag, _) in document.enabled_writers() {
        in_use += 1;
        if !sinks::KNOWN_TAGS.contains(&tag) {
            warnings.push(format!("Writer '{}' is in use but not supported - it will be skipped", tag));
        }
    }
    if in_use == 0 {
        warnings.push("No writers in use - composite events will be dropped".to_string());
    }

    if document.controller.drain_timeout_ms.is_none() {
        warnings.push(
            "controller.drain_timeout_ms is unset - STOP waits indefinitely for a stalled device"
                .to_string(),
        );
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Control: {}", summary.control_addr);
            println!("  Heartbeat: {}", summary.heartbeat_addr);
            println!("  Devices: {} ({})", summary.device_count, summary.device_types.join(", "));
            println!("  Writers: {}", summary.writers_in_use.join(", "));
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args(config: PathBuf) -> ValidateArgs {
        ValidateArgs {
            config,
            json: false,
        }
    }

    #[test]
    fn test_missing_file_is_invalid() {
        let result = validate_config(&args(PathBuf::from("/nonexistent/fe.json")));
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("File not found"));
    }

    #[test]
    fn test_valid_file_with_warnings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fe.json");
        std::fs::write(
            &path,
            r#"{
                "devices": { "fake": { "fake_0": { "rate": 50 } } },
                "writers": { "midas": { "in_use": true } }
            }"#,
        )
        .unwrap();

        let result = validate_config(&args(path));
        assert!(result.valid, "{:?}", result.error);
        let summary = result.summary.unwrap();
        assert_eq!(summary.device_count, 1);
        assert_eq!(summary.device_types, ["fake"]);
        let warnings = result.warnings.unwrap();
        assert!(warnings.iter().any(|w| w.contains("midas")));
    }

    #[test]
    fn test_unknown_device_type_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fe.json");
        std::fs::write(&path, r#"{ "devices": { "caen_1785": { "a": {} } } }"#).unwrap();

        let result = validate_config(&args(path));
        assert!(!result.valid);
    }
}
