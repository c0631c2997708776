//! `run` command implementation.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use bytes::Bytes;
use config_loader::{ConfigLoader, FileConfigSource};
use contracts::ConfigDocument;
use devices::DeviceFactory;
use observability::RunSummary;
use run_control::{HeartbeatResponder, RunController};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::bridge;
use crate::cli::RunArgs;
use crate::error::CliError;

/// Execute the `run` command
pub async fn run_frontend(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    // Loaded once up front for the listen addresses and to fail fast; the
    // controller re-reads the file on every START.
    let mut document = ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if let Some(addr) = args.control_addr {
        info!(%addr, "Overriding control address from CLI");
        document.control_addr = addr.to_string();
    }
    if let Some(addr) = args.heartbeat_addr {
        info!(%addr, "Overriding heartbeat address from CLI");
        document.heartbeat_addr = addr.to_string();
    }

    info!(
        control = %document.control_addr,
        heartbeat = %document.heartbeat_addr,
        devices = document.device_count(),
        writers = document.enabled_writers().count(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&document);
        return Ok(());
    }

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
    }

    let control_socket = bind("control", &document.control_addr).await?;
    let heartbeat_socket = bind("heartbeat", &document.heartbeat_addr).await?;

    let capacity = args.channel_capacity.max(1);
    let (command_tx, command_rx) = mpsc::channel::<Bytes>(capacity);
    let (probe_tx, probe_rx) = mpsc::channel::<Bytes>(capacity);
    let (reply_tx, reply_rx) = mpsc::channel::<Bytes>(capacity);

    let responder = HeartbeatResponder::spawn(probe_rx, reply_tx)?;

    let source = FileConfigSource::new(&args.config);
    let controller = std::thread::Builder::new()
        .name("run-controller".to_string())
        .spawn(move || {
            let mut controller = RunController::new(Box::new(source), DeviceFactory::new());
            controller.serve(command_rx);
            controller.last_summary().cloned()
        })
        .context("Failed to spawn run controller thread")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let control = tokio::spawn(bridge::control_bridge(
        control_socket,
        command_tx,
        shutdown_rx.clone(),
    ));
    let heartbeat = tokio::spawn(bridge::heartbeat_bridge(
        heartbeat_socket,
        probe_tx,
        reply_rx,
        shutdown_rx,
    ));

    info!("fe-master ready, waiting for START");
    shutdown_signal().await;
    warn!("Received shutdown signal, stopping...");

    // bridges drop their senders on exit, closing both channels
    bridge::signal_shutdown(&shutdown_tx);
    let forwarded = control.await.context("Control bridge task failed")?;
    let answered = heartbeat.await.context("Heartbeat bridge task failed")?;

    let summary = tokio::task::spawn_blocking(move || {
        let summary = controller.join();
        responder.join();
        summary
    })
    .await
    .context("Shutdown task failed")?
    .map_err(|_| CliError::shutdown("run controller thread panicked"))?;

    info!(forwarded, answered, "fe-master finished");
    if let Some(summary) = summary {
        print_run_summary(&summary);
    }
    Ok(())
}

async fn bind(what: &'static str, addr: &str) -> Result<UdpSocket> {
    let addr: SocketAddr = addr
        .parse()
        .with_context(|| format!("Invalid {what} address '{addr}'"))?;
    UdpSocket::bind(addr)
        .await
        .map_err(|e| CliError::bind(what, addr, e).into())
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(document: &ConfigDocument) {
    println!("\n=== Configuration Summary ===\n");
    println!("Endpoints:");
    println!("  Control: {}", document.control_addr);
    println!("  Heartbeat: {}", document.heartbeat_addr);
    println!("  Data dir: {}", document.data_dir.display());

    println!("\nDevices ({}):", document.device_count());
    for (tag, name, _) in document.device_entries() {
        println!("  - {} ({})", name, tag);
    }

    let writers: Vec<_> = document.enabled_writers().map(|(tag, _)| tag).collect();
    if !writers.is_empty() {
        println!("\nWriters ({}):", writers.len());
        for tag in writers {
            println!("  - {}", tag);
        }
    }

    println!("\nEvent Builder:");
    println!("  Poll interval: {} us", document.builder.poll_interval_us);
    println!("  Alignment: {:?}", document.builder.alignment);
    match document.controller.drain_timeout_ms {
        Some(ms) => println!("  Drain timeout: {} ms", ms),
        None => println!("  Drain timeout: unbounded"),
    }

    println!();
}

fn print_run_summary(summary: &RunSummary) {
    println!("\n{summary}");
}
