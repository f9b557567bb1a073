//! lt - latest-value broadcast demo
//!
//! CLI entry point: publishes a counter to subscribers of varying speed.

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing::{debug, info};

use latest::cli::{Cli, Command, parse_log_level};
use latest::config::Config;
use latest::demo::{self, ConsumerReport};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Priority: CLI --log-level > config file > default (INFO)
    let requested = cli_log_level.or(config_log_level);
    let level = match requested {
        Some(s) => parse_log_level(s).unwrap_or_else(|| {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
            tracing::Level::INFO
        }),
        None => tracing::Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

fn print_report(reports: &[ConsumerReport], updates: u64) {
    println!(
        "{} {} updates to {} subscribers",
        "Published".bold(),
        updates,
        reports.len()
    );
    for report in reports {
        let status = if report.got_final {
            "final".green()
        } else {
            "missed final".red()
        };
        let last = report.last.map_or_else(|| "-".to_string(), |v| v.to_string());
        println!(
            "  {:<8} delay {:>4}ms  received {:>5}  skipped {:>5}  last {:>6}  {}",
            report.name.cyan(),
            report.delay_ms,
            report.received,
            report.skipped,
            last,
            status
        );
        if report.regressions > 0 {
            println!("    {} {} out-of-order deliveries", "!".red(), report.regressions);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Run {
            subscribers,
            updates,
            interval_ms,
        } => {
            let demo_config = config.demo.with_overrides(subscribers, updates, interval_ms);
            let reports = demo::run(&demo_config).await.context("Demo run failed")?;
            print_report(&reports, demo_config.updates);
        }
        Command::Config => {
            let yaml = serde_yaml::to_string(&config).context("Failed to serialize configuration")?;
            print!("{}", yaml);
        }
    }

    Ok(())
}
