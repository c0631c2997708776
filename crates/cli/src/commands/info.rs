//! `info` command implementation.

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::{AlignmentConfig, ConfigDocument, DeviceEntry};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    endpoints: EndpointInfo,
    data_dir: String,
    device_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    devices: Vec<DeviceInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    writers: Vec<WriterInfo>,
    timing: TimingInfo,
}

#[derive(Serialize)]
struct EndpointInfo {
    control: String,
    heartbeat: String,
}

#[derive(Serialize)]
struct DeviceInfo {
    name: String,
    device_type: String,
    source: String,
}

#[derive(Serialize)]
struct WriterInfo {
    name: String,
    in_use: bool,
}

#[derive(Serialize)]
struct TimingInfo {
    worker_poll_us: u64,
    builder_poll_us: u64,
    alignment: String,
    drain_poll_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    drain_timeout_ms: Option<u64>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let document = ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&document, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&document, args);
    }

    Ok(())
}

fn entry_source(entry: &DeviceEntry) -> String {
    match entry {
        DeviceEntry::Path(path) => path.display().to_string(),
        DeviceEntry::Inline(_) => "inline".to_string(),
    }
}

fn alignment_label(alignment: &AlignmentConfig) -> String {
    match alignment {
        AlignmentConfig::Position => "position".to_string(),
        AlignmentConfig::TimestampSpread { max_spread } => {
            format!("timestamp_spread (max {max_spread})")
        }
    }
}

fn build_config_info(document: &ConfigDocument, args: &InfoArgs) -> ConfigInfo {
    let devices = if args.devices {
        document
            .device_entries()
            .map(|(tag, name, entry)| DeviceInfo {
                name: name.to_string(),
                device_type: tag.to_string(),
                source: entry_source(entry),
            })
            .collect()
    } else {
        Vec::new()
    };

    let writers = if args.writers {
        document
            .writers
            .iter()
            .map(|(name, entry)| WriterInfo {
                name: name.clone(),
                in_use: entry.in_use,
            })
            .collect()
    } else {
        Vec::new()
    };

    ConfigInfo {
        endpoints: EndpointInfo {
            control: document.control_addr.clone(),
            heartbeat: document.heartbeat_addr.clone(),
        },
        data_dir: document.data_dir.display().to_string(),
        device_count: document.device_count(),
        devices,
        writers,
        timing: TimingInfo {
            worker_poll_us: document.worker.poll_interval_us,
            builder_poll_us: document.builder.poll_interval_us,
            alignment: alignment_label(&document.builder.alignment),
            drain_poll_ms: document.controller.drain_poll_ms,
            drain_timeout_ms: document.controller.drain_timeout_ms,
        },
    }
}

fn print_config_info(document: &ConfigDocument, args: &InfoArgs) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                  fe-master Configuration                     ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📡 Endpoints");
    println!("   ├─ Control: {}", document.control_addr);
    println!("   ├─ Heartbeat: {}", document.heartbeat_addr);
    println!("   └─ Data dir: {}", document.data_dir.display());

    println!("\n🔌 Devices ({})", document.device_count());
    let types: Vec<_> = document.devices.iter().collect();
    for (i, (tag, entries)) in types.iter().enumerate() {
        let is_last = i == types.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };

        println!("   {} {} ({} devices)", prefix, tag, entries.len());

        if args.devices {
            for (j, (name, entry)) in entries.iter().enumerate() {
                let entry_prefix = if j == entries.len() - 1 { "└─" } else { "├─" };
                println!(
                    "   {}  {} {} ({})",
                    child_prefix,
                    entry_prefix,
                    name,
                    entry_source(entry)
                );
            }
        }
    }

    println!("\n⚙️  Timing");
    println!("   ├─ Worker poll: {} us", document.worker.poll_interval_us);
    println!("   ├─ Builder poll: {} us", document.builder.poll_interval_us);
    println!("   ├─ Alignment: {}", alignment_label(&document.builder.alignment));
    match document.controller.drain_timeout_ms {
        Some(ms) => println!("   └─ Drain timeout: {} ms", ms),
        None => println!("   └─ Drain timeout: unbounded"),
    }

    if args.writers && !document.writers.is_empty() {
        println!("\n📤 Writers ({})", document.writers.len());
        for (i, (name, entry)) in document.writers.iter().enumerate() {
            let is_last = i == document.writers.len() - 1;
            let prefix = if is_last { "└─" } else { "├─" };
            let state = if entry.in_use { "in use" } else { "off" };
            println!("   {} {} ({})", prefix, name, state);
        }
    }

    println!();
}
