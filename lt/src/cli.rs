//! CLI argument parsing for the `lt` demo

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Latest-value broadcast demo
#[derive(Parser, Debug)]
#[command(name = "lt")]
#[command(author, version, about = "Latest-value broadcast demo", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Publish a counter to paced subscribers and report what each one saw
    Run {
        /// Number of subscribers
        #[arg(short, long)]
        subscribers: Option<usize>,

        /// Number of updates to publish
        #[arg(short, long)]
        updates: Option<u64>,

        /// Pause between updates in milliseconds
        #[arg(short, long = "interval-ms")]
        interval_ms: Option<u64>,
    },

    /// Print the effective configuration
    Config,
}

/// Parse a log level name, case-insensitive
///
/// Unknown names yield None so the caller can fall back.
pub fn parse_log_level(s: &str) -> Option<tracing::Level> {
    match s.to_uppercase().as_str() {
        "TRACE" => Some(tracing::Level::TRACE),
        "DEBUG" => Some(tracing::Level::DEBUG),
        "INFO" => Some(tracing::Level::INFO),
        "WARN" | "WARNING" => Some(tracing::Level::WARN),
        "ERROR" => Some(tracing::Level::ERROR),
        _ => None,
    }
}
