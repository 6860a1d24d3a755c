//! tcping: a TCP link watchdog
//!
//! Connects to one endpoint and keeps a timestamp echo going:
//! - Measures round-trip latency and reports slow and lagging probes
//! - Reconnects with exponential backoff when the session fails
//! - Plays an audible alert on connect and on every kind of loss
//!
//! The endpoint comes from `--addr`, `TCPING_ADDR` or a TOML file.

mod alert;
mod clock;
mod config;
mod latency;
mod protocol;
mod runtime;

use config::Config;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        addr = %config.addr,
        read_timeout_ms = config.read_timeout_ms,
        interval_ms = config.interval_ms,
        slow_threshold_ms = config.slow_threshold_ms,
        lag_threshold_ms = config.lag_threshold_ms,
        alerts = config.alert_enabled,
        "Starting tcping"
    );

    // Reconnect, probe and alert all run in sequence on one thread
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    rt.block_on(runtime::run(config))?;
    Ok(())
}
