use anyhow::Context;
use clap::Parser;
use log::{error, info, warn};
use logwarden::alerts::{AlertCoordinator, AlertDispatcher, LogChannel};
use logwarden::config::Config;
use logwarden::Monitor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Exit code when analysis succeeded but the alert could not be delivered
const EXIT_DELIVERY_FAILED: i32 = 2;

/// Command-line arguments for the log analyzer
#[derive(Parser)]
#[command(
    name = "logwarden",
    about = "Log analysis and alerting - classifies errors, checks metric thresholds, alerts with cooldown",
    long_about = "Fetches recent records from log groups and object-storage buckets, classifies \
                  error lines, extracts response-time, memory and disk metrics, checks them \
                  against thresholds and sends rate-limited alerts about the findings."
)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Configuration file path (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(
        short,
        long,
        help = "Enable verbose logging output (sets RUST_LOG=debug)"
    )]
    verbose: bool,

    /// Keep running cycles until interrupted
    #[arg(
        short,
        long,
        help = "Run an analysis cycle every monitor.interval_seconds until Ctrl+C"
    )]
    watch: bool,
}

impl Cli {
    /// Reject a configuration path that exists but cannot be a config file
    ///
    /// A missing file is fine: `Config::load` falls back to defaults.
    fn validate(&self) -> Result<(), String> {
        let Some(path) = self.config.as_deref().filter(|path| path.exists()) else {
            return Ok(());
        };
        if !path.is_file() {
            return Err(format!(
                "Configuration path is not a file: {}",
                path.display()
            ));
        }
        if path.extension().is_some_and(|extension| extension != "toml") {
            warn!("Configuration file is not .toml: {}", path.display());
        }
        Ok(())
    }
}

/// Load configuration and build the monitor
fn setup(cli: &Cli) -> anyhow::Result<(Config, Monitor)> {
    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    let monitor = Monitor::from_config(&config).context("failed to initialize monitor")?;

    if monitor.source_count() == 0 {
        warn!("No sources configured, reports will be empty");
    }
    Ok((config, monitor))
}

/// Run a single cycle and print the report as JSON
///
/// # Returns
///
/// Whether the alert for the report was handled without a delivery failure.
async fn run_once(monitor: &Monitor) -> anyhow::Result<bool> {
    let outcome = monitor.run_cycle().await;
    let json =
        serde_json::to_string_pretty(&outcome.report).context("failed to serialize report")?;
    println!("{}", json);
    Ok(outcome.alert.is_ok())
}

/// Run cycles until Ctrl+C
async fn run_watch(monitor: &Monitor, config: &Config) -> anyhow::Result<()> {
    let (shutdown_sender, shutdown_receiver) = watch::channel(false);
    ctrlc::set_handler(move || {
        info!("Received interrupt signal (SIGINT), shutting down gracefully...");
        if shutdown_sender.send(true).is_err() {
            error!("Failed to send shutdown signal");
        }
    })
    .context("failed to set SIGINT handler")?;

    info!(
        "Watching {} sources every {}s. Press Ctrl+C to stop.",
        monitor.source_count(),
        config.monitor.interval_seconds
    );
    monitor
        .watch(
            Duration::from_secs(config.monitor.interval_seconds),
            shutdown_receiver,
        )
        .await;
    Ok(())
}

/// Best-effort CRITICAL alert about the analyzer itself failing
async fn report_failure(dispatcher: &AlertDispatcher, failure: &anyhow::Error) {
    let reason = format!("{:#}", failure);
    if let Err(e) = dispatcher
        .dispatch_failure(&reason, chrono::Utc::now())
        .await
    {
        error!("Failed to send failure alert: {}", e);
    }
}

/// Dispatcher used when the configured one could not be built
fn fallback_dispatcher() -> AlertDispatcher {
    AlertDispatcher::new(AlertCoordinator::default(), vec![Arc::new(LogChannel)])
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }
    env_logger::init();

    info!("Starting logwarden");

    if let Err(e) = cli.validate() {
        error!("Invalid arguments: {}", e);
        std::process::exit(1);
    }

    let (config, monitor) = match setup(&cli) {
        Ok(ready) => ready,
        Err(e) => {
            error!("{:#}", e);
            report_failure(&fallback_dispatcher(), &e).await;
            std::process::exit(1);
        }
    };

    let result = if cli.watch {
        run_watch(&monitor, &config).await.map(|_| true)
    } else {
        run_once(&monitor).await
    };

    match result {
        Ok(true) => info!("logwarden finished"),
        Ok(false) => std::process::exit(EXIT_DELIVERY_FAILED),
        Err(e) => {
            error!("{:#}", e);
            report_failure(monitor.dispatcher(), &e).await;
            std::process::exit(1);
        }
    }
}
