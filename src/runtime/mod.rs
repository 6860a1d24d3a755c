//! Connection lifecycle for the watchdog.
//!
//! A single supervisor drives every component in sequence:
//!
//! ```text
//! Acquiring ──connected──▶ Probing ──I/O failure──▶ Closing ──alert──▶ Acquiring
//! ```
//!
//! - `reconnect`: connect with exponential backoff, raise the connected alert
//! - `probe`: timestamp echo loop, returns why the session ended
//! - `connection`: endpoint, live connection and supervisor state
//!
//! Nothing here runs concurrently; the whole lifecycle lives on one
//! current-thread Tokio runtime.

mod connection;
mod probe;
mod reconnect;

pub use connection::{ConnState, Endpoint};
pub use probe::{ProbeConfig, ProbeLoop, SessionEnd};
pub use reconnect::{BackoffConfig, Reconnector};

use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

use crate::alert::{Notifier, PlayerNotifier};
use crate::clock::Clock;
use crate::config::Config;

/// Resolve the configured endpoint and supervise it forever.
///
/// Only returns if the endpoint cannot be resolved.
pub async fn run(config: Config) -> std::io::Result<()> {
    let endpoint = Endpoint::resolve(&config.addr).await.map_err(|e| {
        error!(addr = %config.addr, error = %e, "ResolveTCPAddr failed");
        e
    })?;
    info!(endpoint = %endpoint, "Monitoring endpoint");

    let notifier = PlayerNotifier::new(
        config.alert_enabled,
        config.player.clone(),
        config.sounds_dir.clone(),
    );
    let reconnector = Reconnector::new(config.backoff(), config.connect_timeout());

    let mut supervisor = Supervisor::new(
        endpoint,
        reconnector,
        config.probe(),
        Clock::new(),
        notifier,
    );
    supervisor.run().await;
    Ok(())
}

/// Runs acquire → probe → close → alert cycles against one endpoint.
pub struct Supervisor<N> {
    endpoint: Endpoint,
    reconnector: Reconnector,
    probe: ProbeConfig,
    clock: Clock,
    notifier: N,
    state: ConnState,
}

impl<N: Notifier> Supervisor<N> {
    pub fn new(
        endpoint: Endpoint,
        reconnector: Reconnector,
        probe: ProbeConfig,
        clock: Clock,
        notifier: N,
    ) -> Self {
        Self {
            endpoint,
            reconnector,
            probe,
            clock,
            notifier,
            state: ConnState::Acquiring,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> ConnState {
        self.state
    }

    #[cfg(test)]
    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Cycle forever.
    pub async fn run(&mut self) {
        loop {
            self.run_once().await;
        }
    }

    /// One full session: acquire a connection, probe it until it fails,
    /// close it, then raise exactly one alert for the failure.
    pub async fn run_once(&mut self) -> SessionEnd {
        debug_assert_eq!(self.state, ConnState::Acquiring);
        let mut conn = self
            .reconnector
            .acquire(&self.endpoint, &self.notifier)
            .await;
        self.advance();
        debug!(route = %conn.route, attempts = conn.attempts, "Probing");

        let mut probe = ProbeLoop::new(self.probe, self.clock);
        let end = probe.run(&mut conn.stream, conn.route).await;
        self.advance();

        info!(route = %conn.route, "Disconnect");
        if let Err(e) = conn.stream.shutdown().await {
            debug!(error = %e, "Shutdown after session end failed");
        }
        drop(conn);

        let stats = probe.stats();
        info!(
            sent = stats.sent,
            echoed = stats.echoed,
            malformed = stats.malformed,
            slow = stats.slow,
            lag = stats.lag,
            last_latency_ms = ?stats.last_latency_ms,
            "Session ended"
        );

        warn!(reason = %end, "AlarmConnection");
        self.notifier.notify(end.sound()).await;
        self.advance();

        end
    }

    fn advance(&mut self) {
        let next = self.state.next();
        debug!(from = ?self.state, to = ?next, "State transition");
        self.state = next;
    }
}
