//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;

/// fe-master - run control and event building for a multi-digitizer front-end
#[derive(Parser, Debug)]
#[command(
    name = "fe-master",
    author,
    version,
    about = "DAQ front-end master: run control and event building",
    long_about = "Front-end master for a multi-digitizer data acquisition system.\n\n\
                  Listens for START:<run>/STOP commands, materializes one worker per \n\
                  configured device, merges their streams into composite events and \n\
                  writes them to the configured writers."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "FE_MASTER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "FE_MASTER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve run control until interrupted
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (JSON or TOML), re-read on every START
    #[arg(short, long, default_value = "config/fe_master.json", env = "FE_MASTER_CONFIG")]
    pub config: PathBuf,

    /// Override the control listen address from configuration
    #[arg(long, env = "FE_MASTER_CONTROL_ADDR")]
    pub control_addr: Option<SocketAddr>,

    /// Override the heartbeat listen address from configuration
    #[arg(long, env = "FE_MASTER_HEARTBEAT_ADDR")]
    pub heartbeat_addr: Option<SocketAddr>,

    /// Validate configuration and exit without serving
    #[arg(long)]
    pub dry_run: bool,

    /// Capacity of the control and heartbeat channels
    #[arg(long, default_value = "16", env = "FE_MASTER_CHANNEL_CAPACITY")]
    pub channel_capacity: usize,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "9000", env = "FE_MASTER_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config/fe_master.json")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/fe_master.json")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show every configured device
    #[arg(long)]
    pub devices: bool,

    /// Show writer configuration
    #[arg(long)]
    pub writers: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_overrides() {
        let cli = Cli::try_parse_from([
            "fe-master",
            "-vv",
            "run",
            "--config",
            "conf.toml",
            "--control-addr",
            "0.0.0.0:5000",
            "--metrics-port",
            "0",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.config, PathBuf::from("conf.toml"));
        assert_eq!(args.control_addr.map(|a| a.port()), Some(5000));
        assert_eq!(args.heartbeat_addr, None);
        assert_eq!(args.metrics_port, 0);
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["fe-master", "-q", "-v", "info"]).is_err());
    }

    #[test]
    fn test_validate_json_flag() {
        let cli = Cli::try_parse_from(["fe-master", "validate", "--json"]).unwrap();
        assert!(matches!(cli.command, Commands::Validate(ValidateArgs { json: true, .. })));
    }
}
