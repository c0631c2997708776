//! Configuration validation
//!
//! Rules:
//! - device names unique across all device types
//! - device tags known to the caller
//! - `online` writer in use has a parseable `addr`
//! - poll intervals > 0

use std::collections::HashSet;
use std::net::SocketAddr;

use contracts::{ConfigDocument, ContractError};

/// Validate the document structure
///
/// Returns the first error encountered.
pub fn validate(document: &ConfigDocument) -> Result<(), ContractError> {
    validate_device_names(document)?;
    validate_writers(document)?;
    validate_intervals(document)?;
    Ok(())
}

/// Reject device-type tags outside `known`
pub fn validate_device_tags(document: &ConfigDocument, known: &[&str]) -> Result<(), ContractError> {
    for tag in document.devices.keys() {
        if !known.contains(&tag.as_str()) {
            return Err(ContractError::config_validation(
                format!("devices.{tag}"),
                format!("unknown device type '{tag}' (known: {})", known.join(", ")),
            ));
        }
    }
    Ok(())
}

fn validate_device_names(document: &ConfigDocument) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (tag, name, _) in document.device_entries() {
        if name.is_empty() {
            return Err(ContractError::config_validation(
                format!("devices.{tag}"),
                "device name cannot be empty",
            ));
        }
        if !seen.insert(name) {
            return Err(ContractError::config_validation(
                format!("devices.{tag}.{name}"),
                "duplicate device name",
            ));
        }
    }
    Ok(())
}

fn validate_writers(document: &ConfigDocument) -> Result<(), ContractError> {
    for (tag, entry) in document.enabled_writers() {
        if tag == "online" {
            let addr = entry.str_field("addr").ok_or_else(|| {
                ContractError::config_validation("writers.online.addr", "missing addr")
            })?;
            addr.parse::<SocketAddr>().map_err(|e| {
                ContractError::config_validation(
                    "writers.online.addr",
                    format!("invalid addr '{addr}': {e}"),
                )
            })?;
        }
    }
    Ok(())
}

fn validate_intervals(document: &ConfigDocument) -> Result<(), ContractError> {
    if document.worker.poll_interval_us == 0 {
        return Err(ContractError::config_validation(
            "worker.poll_interval_us",
            "poll interval must be > 0",
        ));
    }
    if document.builder.poll_interval_us == 0 {
        return Err(ContractError::config_validation(
            "builder.poll_interval_us",
            "poll interval must be > 0",
        ));
    }
    if document.controller.drain_poll_ms == 0 {
        return Err(ContractError::config_validation(
            "controller.drain_poll_ms",
            "poll interval must be > 0",
        ));
    }
    Ok(())
}
