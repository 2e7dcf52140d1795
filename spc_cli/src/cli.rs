//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "spc", version, about = "Simulated sensors with SPC monitoring")]
pub struct Cli {
    /// Path to config TOML (built-in defaults when omitted)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log and report as JSON lines instead of pretty text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start every simulator and sensor, monitor them, then print a summary
    Run {
        /// Stop after this many seconds (runs until Ctrl-C when omitted)
        #[arg(long, value_name = "SECS")]
        duration_s: Option<u64>,
        /// Power sensors on but leave them out of MEASURING
        #[arg(long, action = ArgAction::SetTrue)]
        no_measure: bool,
    },
    /// Drive sensors and simulators interactively from stdin
    Console,
    /// Print stored measurements of one sensor over a look-back window
    Query {
        /// Sensor name, e.g. temperature_sensor
        sensor: String,
        /// Look-back window: 5min, 15min, 1h, 12h, 1d, 5d or 1M
        #[arg(long, value_name = "WINDOW", default_value = "1h")]
        window: String,
    },
    /// Validate the config and assemble the station without starting it
    SelfCheck,
}
