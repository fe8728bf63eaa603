//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "cage", version, about = "Home-cage dosing controller")]
pub struct Cli {
    /// Cage config TOML
    #[arg(long, value_name = "FILE", default_value = "etc/cage_config.toml")]
    pub config: PathBuf,

    /// Scale calibration CSV (`raw,grams`), used when the config has no [calibration]
    #[arg(long, value_name = "FILE")]
    pub calibration: Option<PathBuf>,

    /// JSON output on stdout and JSON-lines logs on stderr
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Log level (error|warn|info|debug|trace); overrides [logging].level, default info
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

        #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the cage until interrupted or a reboot is requested
    Run {
        /// Stop after this many milliseconds (the occupant is logged out and saved)
        #[arg(long, value_name = "MS")]
        duration_ms: Option<u64>,
    },
    /// Open every device and the registry, then exit
    SelfCheck,
    /// Print the animal registry
    Status,
}
