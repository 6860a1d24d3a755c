//! Connection acquisition with exponential backoff.

use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::alert::{Notifier, Sound};
use crate::runtime::connection::{Connection, Endpoint, Route};

/// Retry timing for one reconnect sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Growth applied after every failed attempt.
    pub factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_millis(5000),
            factor: 2.0,
        }
    }
}

/// Delay state for a single reconnect sequence. Never shared across sequences.
#[derive(Debug)]
pub struct Backoff {
    delay_ms: u64,
    max_ms: u64,
    factor: f64,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        let max_ms = config.max_delay.as_millis() as u64;
        Self {
            delay_ms: (config.initial_delay.as_millis() as u64).min(max_ms),
            max_ms,
            factor: config.factor,
        }
    }

    /// Delay to wait now; grows the next one by `factor`, rounded up and capped.
    pub fn next_delay(&mut self) -> Duration {
        let current = self.delay_ms;
        let grown = (current as f64 * self.factor).ceil();
        self.delay_ms = if grown >= self.max_ms as f64 {
            self.max_ms
        } else {
            grown as u64
        };
        Duration::from_millis(current)
    }
}

/// Establishes connections to the endpoint, retrying forever.
#[derive(Debug, Clone)]
pub struct Reconnector {
    backoff: BackoffConfig,
    connect_timeout: Duration,
}

impl Reconnector {
    pub fn new(backoff: BackoffConfig, connect_timeout: Duration) -> Self {
        Self {
            backoff,
            connect_timeout,
        }
    }

    /// Block until a connection succeeds, then raise the connected alert.
    pub async fn acquire<N: Notifier>(&self, endpoint: &Endpoint, notifier: &N) -> Connection {
        self.acquire_with(endpoint, notifier, || TcpStream::connect(endpoint.addr))
            .await
    }

    /// Retry loop behind [`acquire`](Self::acquire), dialing through `dial`.
    async fn acquire_with<N, F, Fut>(
        &self,
        endpoint: &Endpoint,
        notifier: &N,
        mut dial: F,
    ) -> Connection
    where
        N: Notifier,
        F: FnMut() -> Fut,
        Fut: Future<Output = io::Result<TcpStream>>,
    {
        let mut backoff = Backoff::new(self.backoff);
        let mut attempts = 0u32;

        loop {
            attempts = attempts.saturating_add(1);

            let error = match timeout(self.connect_timeout, dial()).await {
                Ok(Ok(stream)) => match Route::of(&stream) {
                    Ok(route) => {
                        if let Err(e) = stream.set_nodelay(true) {
                            debug!(error = %e, "Failed to set TCP_NODELAY");
                        }
                        info!(%route, attempts, "Connected");
                        notifier.notify(Sound::Connected).await;
                        return Connection {
                            stream,
                            route,
                            attempts,
                        };
                    }
                    // The peer can reset between connect and getpeername.
                    Err(e) => e.to_string(),
                },
                Ok(Err(e)) => e.to_string(),
                Err(_) => format!(
                    "dial tcp {}: i/o timeout after {}ms",
                    endpoint.addr,
                    self.connect_timeout.as_millis()
                ),
            };

            let delay = backoff.next_delay();
            warn!(
                endpoint = %endpoint,
                attempt = attempts,
                retry_in_ms = delay.as_millis() as u64,
                "Dial failed: {error}"
            );
            sleep(delay).await;
        }
    }
}
