//! Request/echo timing loop over a live connection.
//!
//! Each iteration writes the current timestamp, waits for the peer to echo
//! it back within the read deadline, and classifies the round trip. The loop
//! only returns when the session is over; the returned [`SessionEnd`] carries
//! the reason to the alert stage.

use bytes::BytesMut;
use std::fmt;
use std::io;
use std::time::Duration;
use tokio::io::{
    split, AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::alert::Sound;
use crate::clock::{date_string, Clock};
use crate::latency::{LatencyClass, LatencyPolicy};
use crate::protocol::{self, EchoError, MAX_LINE_LENGTH};
use crate::runtime::connection::Route;

/// Timing knobs for the probe loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeConfig {
    /// Deadline for the echo of each probe.
    pub read_timeout: Duration,
    /// Deadline for writing and flushing each probe.
    pub write_timeout: Duration,
    /// Pause between probes.
    pub interval: Duration,
    pub policy: LatencyPolicy,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_millis(2500),
            write_timeout: Duration::from_millis(2500),
            interval: Duration::from_millis(500),
            policy: LatencyPolicy::default(),
        }
    }
}

/// Direction of the failed I/O operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Read,
    Write,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Read => f.write_str("read"),
            Op::Write => f.write_str("write"),
        }
    }
}

/// Why a probe session ended.
#[derive(Debug)]
pub enum SessionEnd {
    /// The peer closed the connection.
    Eof,
    /// An operation missed its deadline.
    Timeout { op: Op, route: Route },
    /// Any other I/O failure.
    Io { op: Op, route: Route, error: io::Error },
}

impl SessionEnd {
    /// Alert raised for this termination.
    pub fn sound(&self) -> Sound {
        match self {
            SessionEnd::Eof => Sound::ServerLost,
            SessionEnd::Timeout { op: Op::Read, .. } => Sound::ConnectionLost,
            SessionEnd::Timeout { op: Op::Write, .. } | SessionEnd::Io { .. } => Sound::Lost,
        }
    }
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEnd::Eof => f.write_str("EOF"),
            SessionEnd::Timeout { op, route } => write!(f, "{op} tcp {route}: i/o timeout"),
            SessionEnd::Io { op, route, error } => write!(f, "{op} tcp {route}: {error}"),
        }
    }
}

/// Per-session probe counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeStats {
    /// Probes written and flushed.
    pub sent: u64,
    /// Echoes parsed and timed.
    pub echoed: u64,
    /// Echoes that could not be parsed.
    pub malformed: u64,
    pub slow: u64,
    pub lag: u64,
    pub last_latency_ms: Option<i64>,
}

pub struct ProbeLoop {
    config: ProbeConfig,
    clock: Clock,
    stats: ProbeStats,
}

impl ProbeLoop {
    pub fn new(config: ProbeConfig, clock: Clock) -> Self {
        Self {
            config,
            clock,
            stats: ProbeStats::default(),
        }
    }

    pub fn stats(&self) -> &ProbeStats {
        &self.stats
    }

    /// Probe until the session fails. The stream is left open for the caller.
    pub async fn run<S>(&mut self, stream: &mut S, route: Route) -> SessionEnd
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (reader, mut writer) = split(stream);
        let mut reader = BufReader::new(reader);
        let mut request = BytesMut::with_capacity(24);
        let mut line = Vec::with_capacity(MAX_LINE_LENGTH);

        loop {
            let ts = self.clock.now_ms();
            request.clear();
            protocol::encode(ts, &mut request);

            let write = async {
                writer.write_all(&request).await?;
                writer.flush().await
            };
            match timeout(self.config.write_timeout, write).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    info!(error = %e, "Write to server failed");
                    return SessionEnd::Io {
                        op: Op::Write,
                        route,
                        error: e,
                    };
                }
                Err(_) => {
                    info!("Write to server timed out");
                    return SessionEnd::Timeout {
                        op: Op::Write,
                        route,
                    };
                }
            }
            self.stats.sent += 1;
            debug!(">{ts}");

            line.clear();
            let read = timeout(self.config.read_timeout, read_echo(&mut reader, &mut line)).await;
            let echoed = match read {
                Ok(Ok(EchoRead::Line)) => {
                    let text = String::from_utf8_lossy(&line);
                    debug!("<{}", text.trim());
                    protocol::parse_echo(&text)
                }
                Ok(Ok(EchoRead::TooLong(len))) => Err(EchoError::TooLong(len)),
                Ok(Ok(EchoRead::Eof)) => return read_failed(SessionEnd::Eof),
                Ok(Err(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return read_failed(SessionEnd::Eof);
                }
                Ok(Err(e)) => {
                    return read_failed(SessionEnd::Io {
                        op: Op::Read,
                        route,
                        error: e,
                    });
                }
                Err(_) => {
                    return read_failed(SessionEnd::Timeout {
                        op: Op::Read,
                        route,
                    });
                }
            };

            match echoed {
                Ok(sent_ts) => {
                    let latency_ms = self.clock.now_ms().saturating_sub(sent_ts);
                    self.record(latency_ms);
                }
                Err(e) => {
                    self.stats.malformed += 1;
                    error!(error = %e, "Malformed echo");
                }
            }

            sleep(self.config.interval).await;
        }
    }

    fn record(&mut self, latency_ms: i64) {
        self.stats.echoed += 1;
        self.stats.last_latency_ms = Some(latency_ms);
        debug!("Ping: {latency_ms}");

        match self.config.policy.classify(latency_ms) {
            LatencyClass::Lag => {
                self.stats.lag += 1;
                warn!(latency_ms, "[{}] Lag detected: {latency_ms}ms", date_string());
            }
            LatencyClass::Slow => {
                self.stats.slow += 1;
                info!(latency_ms, "[{}] Slow detected: {latency_ms}ms", date_string());
            }
            LatencyClass::Healthy => {}
        }
    }
}

fn read_failed(end: SessionEnd) -> SessionEnd {
    error!("Read ERROR: [{end}]");
    end
}

/// Outcome of reading one echoed line.
#[derive(Debug, PartialEq, Eq)]
enum EchoRead {
    /// A complete line of at most [`MAX_LINE_LENGTH`] bytes is in the buffer.
    Line,
    /// The line was longer than [`MAX_LINE_LENGTH`]; it was consumed through
    /// its newline but only the first bytes were kept.
    TooLong(usize),
    /// End of stream before a newline.
    Eof,
}

/// Read exactly one `\n`-terminated line, keeping at most
/// [`MAX_LINE_LENGTH`] bytes of it in `line`.
///
/// Bytes past the limit are discarded up to and including the newline, so
/// the next read starts at the next echo.
async fn read_echo<R>(reader: &mut R, line: &mut Vec<u8>) -> io::Result<EchoRead>
where
    R: AsyncBufRead + Unpin,
{
    let mut total = 0;
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(EchoRead::Eof);
        }

        let (chunk, done) = match available.iter().position(|&b| b == b'\n') {
            Some(pos) => (&available[..=pos], true),
            None => (available, false),
        };
        let room = MAX_LINE_LENGTH.saturating_sub(line.len());
        line.extend_from_slice(&chunk[..chunk.len().min(room)]);
        let used = chunk.len();
        total += used;
        reader.consume(used);

        if done {
            return Ok(if total > MAX_LINE_LENGTH {
                EchoRead::TooLong(total)
            } else {
                EchoRead::Line
            });
        }
    }
}
