//! Fake Run Example
//!
//! Drives a RunController through two short runs with simulated digitizers,
//! without any UDP endpoints. Commands are fed in-process the same way the
//! control bridge would deliver them.
//!
//! Run with: cargo run -p fe_master_demos --bin fake_run [config.json]

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use config_loader::{ConfigLoader, StaticConfigSource};
use contracts::ConfigDocument;
use devices::DeviceFactory;
use observability::{LogFormat, ObservabilityConfig};
use run_control::RunController;

fn main() -> Result<()> {
    observability::init_tracing(&ObservabilityConfig::from_verbosity(
        0,
        false,
        LogFormat::Pretty,
        0,
    ))?;

    tracing::info!("Starting Fake Run Demo");

    let (document, base_dir) = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading config");
            let document = ConfigLoader::load_from_path(&path)?;
            let base_dir = path.parent().map(PathBuf::from).unwrap_or_default();
            (document, base_dir)
        }
        None => (demo_document()?, std::env::temp_dir()),
    };
    let data_dir = document.data_dir.clone();

    let source = StaticConfigSource::new(document).with_base_dir(base_dir);
    let mut controller = RunController::new(Box::new(source), DeviceFactory::new());

    for run in 1..=2u64 {
        controller.handle_message(format!("START:{run}").as_bytes())?;
        tracing::info!(
            run,
            workers = controller.registry().len(),
            "Run active, collecting for 2s"
        );
        thread::sleep(Duration::from_secs(2));
        controller.handle_message(b"STOP")?;

        if let Some(summary) = controller.last_summary() {
            println!("\nRun {run}\n{summary}");
        }
    }

    println!("Output written under {}", data_dir.display());
    Ok(())
}

/// Two fake digitizers with different trigger rates, written to a file
fn demo_document() -> Result<ConfigDocument> {
    let data_dir = std::env::temp_dir().join("fe_master_demo");
    let document = serde_json::from_value(serde_json::json!({
        "data_dir": data_dir,
        "devices": {
            "fake": {
                "fast": { "channels": 2, "trace_len": 64, "rate": 200.0, "seed": 7 },
                "slow": { "channels": 2, "trace_len": 64, "rate": 50.0, "jitter": 0.2, "seed": 11 }
            }
        },
        "writers": {
            "file": { "in_use": true },
            "log": { "in_use": false }
        },
        "builder": {
            "alignment": { "mode": "timestamp_spread", "max_spread": 1000 }
        },
        "controller": { "drain_timeout_ms": 5000 }
    }))?;
    Ok(document)
}
