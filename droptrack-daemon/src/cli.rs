//! CLI argument definitions for droptrack-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.
//! Flags are applied on top of the config file and `DROPTRACK_*` environment
//! overrides.

use std::path::PathBuf;

use clap::Parser;
use droptrack_core::config::DroptrackConfig;

/// Droptrack item drop tracker.
///
/// Tails the game client log, aggregates item quantity changes per map
/// session, and logs every drop as it happens.
#[derive(Parser, Debug)]
#[command(name = "droptrack-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to droptrack.toml configuration file.
    ///
    /// Built-in defaults are used when omitted.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Game log file to tail (overrides `tailer.log_path`).
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Read the log from the beginning instead of the current end.
    #[arg(long)]
    pub from_beginning: bool,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,
}

impl DaemonCli {
    /// Apply command-line overrides to a loaded configuration.
    pub fn apply_overrides(&self, config: &mut DroptrackConfig) {
        if let Some(path) = &self.log_file {
            config.tailer.log_path = path.display().to_string();
        }
        if self.from_beginning {
            config.tailer.from_end = false;
        }
        if let Some(level) = &self.log_level {
            config.general.log_level.clone_from(level);
        }
        if let Some(format) = &self.log_format {
            config.general.log_format.clone_from(format);
        }
    }
}
