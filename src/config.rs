//! Configuration module for tcping.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments (and `TCPING_ADDR`) take precedence over config file values.

use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::latency::LatencyPolicy;
use crate::runtime::{BackoffConfig, ProbeConfig};

/// Command-line arguments for the watchdog
#[derive(Parser, Debug)]
#[command(name = "tcping")]
#[command(author = "tcping authors")]
#[command(version = "0.1.0")]
#[command(about = "Watches a TCP link with timestamp echoes and alerts on loss", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Endpoint to monitor (host:port)
    #[arg(short, long, env = "TCPING_ADDR")]
    pub addr: Option<String>,

    /// Echo deadline in milliseconds
    #[arg(long)]
    pub read_timeout_ms: Option<u64>,

    /// Pause between probes in milliseconds
    #[arg(short, long)]
    pub interval_ms: Option<u64>,

    /// Audio player used for alerts
    #[arg(long)]
    pub player: Option<String>,

    /// Directory holding the alert sound files
    #[arg(long)]
    pub sounds_dir: Option<PathBuf>,

    /// Log alerts instead of playing them
    #[arg(long)]
    pub no_alert: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub probe: ProbeSection,
    #[serde(default)]
    pub reconnect: ReconnectSection,
    #[serde(default)]
    pub alert: AlertSection,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Monitored endpoint
#[derive(Debug, Deserialize, Default)]
pub struct TargetConfig {
    pub addr: Option<String>,
}

/// Probe loop timing and latency thresholds
#[derive(Debug, Deserialize)]
pub struct ProbeSection {
    #[serde(default = "default_io_timeout_ms")]
    pub read_timeout_ms: u64,
    #[serde(default = "default_io_timeout_ms")]
    pub write_timeout_ms: u64,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_slow_threshold_ms")]
    pub slow_threshold_ms: u64,
    #[serde(default = "default_lag_threshold_ms")]
    pub lag_threshold_ms: u64,
}

impl Default for ProbeSection {
    fn default() -> Self {
        Self {
            read_timeout_ms: default_io_timeout_ms(),
            write_timeout_ms: default_io_timeout_ms(),
            interval_ms: default_interval_ms(),
            slow_threshold_ms: default_slow_threshold_ms(),
            lag_threshold_ms: default_lag_threshold_ms(),
        }
    }
}

/// Reconnect backoff
#[derive(Debug, Deserialize)]
pub struct ReconnectSection {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_factor")]
    pub factor: f64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for ReconnectSection {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            factor: default_factor(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

/// Alert playback
#[derive(Debug, Deserialize)]
pub struct AlertSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_player")]
    pub player: String,
    #[serde(default = "default_sounds_dir")]
    pub sounds_dir: PathBuf,
}

impl Default for AlertSection {
    fn default() -> Self {
        Self {
            enabled: true,
            player: default_player(),
            sounds_dir: default_sounds_dir(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_io_timeout_ms() -> u64 {
    2500
}

fn default_interval_ms() -> u64 {
    500
}

fn default_slow_threshold_ms() -> u64 {
    138
}

fn default_lag_threshold_ms() -> u64 {
    400
}

fn default_initial_delay_ms() -> u64 {
    200
}

fn default_max_delay_ms() -> u64 {
    5000
}

fn default_factor() -> f64 {
    2.0
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

fn default_true() -> bool {
    true
}

fn default_player() -> String {
    "mplayer".to_string()
}

fn default_sounds_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub addr: String,
    pub read_timeout_ms: u64,
    pub write_timeout_ms: u64,
    pub interval_ms: u64,
    pub slow_threshold_ms: u64,
    pub lag_threshold_ms: u64,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_factor: f64,
    pub connect_timeout_ms: u64,
    pub alert_enabled: bool,
    pub player: String,
    pub sounds_dir: PathBuf,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args, the environment and optional TOML file.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = CliArgs::parse();

        // Load TOML config if specified
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Self::merge(cli, toml_config)
    }

    /// Merge CLI args with TOML config (CLI takes precedence), then validate.
    pub fn merge(cli: CliArgs, toml_config: TomlConfig) -> Result<Self, ConfigError> {
        let addr = cli
            .addr
            .or(toml_config.target.addr)
            .filter(|addr| !addr.trim().is_empty())
            .ok_or(ConfigError::MissingAddress)?;

        let config = Config {
            addr,
            read_timeout_ms: cli
                .read_timeout_ms
                .unwrap_or(toml_config.probe.read_timeout_ms),
            write_timeout_ms: toml_config.probe.write_timeout_ms,
            interval_ms: cli.interval_ms.unwrap_or(toml_config.probe.interval_ms),
            slow_threshold_ms: toml_config.probe.slow_threshold_ms,
            lag_threshold_ms: toml_config.probe.lag_threshold_ms,
            initial_delay_ms: toml_config.reconnect.initial_delay_ms,
            max_delay_ms: toml_config.reconnect.max_delay_ms,
            backoff_factor: toml_config.reconnect.factor,
            connect_timeout_ms: toml_config.reconnect.connect_timeout_ms,
            alert_enabled: !cli.no_alert && toml_config.alert.enabled,
            player: cli.player.unwrap_or(toml_config.alert.player),
            sounds_dir: cli.sounds_dir.unwrap_or(toml_config.alert.sounds_dir),
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.read_timeout_ms == 0 || self.write_timeout_ms == 0 {
            return invalid("read and write timeouts must be non-zero".to_string());
        }
        if self.interval_ms == 0 {
            return invalid("probe interval must be non-zero".to_string());
        }
        if self.connect_timeout_ms == 0 {
            return invalid("connect timeout must be non-zero".to_string());
        }
        if self.slow_threshold_ms >= self.lag_threshold_ms {
            return invalid(format!(
                "slow threshold ({}ms) must be below lag threshold ({}ms)",
                self.slow_threshold_ms, self.lag_threshold_ms
            ));
        }
        if self.backoff_factor.is_nan() || self.backoff_factor < 1.0 {
            return invalid(format!(
                "backoff factor must be at least 1.0, got {}",
                self.backoff_factor
            ));
        }
        if self.initial_delay_ms == 0 || self.initial_delay_ms > self.max_delay_ms {
            return invalid(format!(
                "backoff delays must satisfy 0 < initial ({}ms) <= max ({}ms)",
                self.initial_delay_ms, self.max_delay_ms
            ));
        }
        Ok(())
    }

    pub fn probe(&self) -> ProbeConfig {
        ProbeConfig {
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            write_timeout: Duration::from_millis(self.write_timeout_ms),
            interval: Duration::from_millis(self.interval_ms),
            policy: LatencyPolicy::new(
                Duration::from_millis(self.slow_threshold_ms),
                Duration::from_millis(self.lag_threshold_ms),
            ),
        }
    }

    pub fn backoff(&self) -> BackoffConfig {
        BackoffConfig {
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            factor: self.backoff_factor,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
    MissingAddress,
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::MissingAddress => write!(
                f,
                "Required env parameter TCPING_ADDR [host:port] is not set"
            ),
            ConfigError::Invalid(msg) => write!(f, "Invalid configuration: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("tcping").chain(args.iter().copied())).unwrap()
    }

    fn toml_with_addr() -> TomlConfig {
        toml::from_str("[target]\naddr = \"example.net:7\"").unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = TomlConfig::default();
        assert_eq!(config.target.addr, None);
        assert_eq!(config.probe.read_timeout_ms, 2500);
        assert_eq!(config.probe.write_timeout_ms, 2500);
        assert_eq!(config.probe.interval_ms, 500);
        assert_eq!(config.probe.slow_threshold_ms, 138);
        assert_eq!(config.probe.lag_threshold_ms, 400);
        assert_eq!(config.reconnect.initial_delay_ms, 200);
        assert_eq!(config.reconnect.max_delay_ms, 5000);
        assert_eq!(config.reconnect.factor, 2.0);
        assert!(config.alert.enabled);
        assert_eq!(config.alert.player, "mplayer");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
            [target]
            addr = "10.0.0.1:7"

            [probe]
            read_timeout_ms = 2000
            slow_threshold_ms = 100

            [reconnect]
            max_delay_ms = 10000
            factor = 1.5

            [alert]
            player = "mpg123"
            sounds_dir = "/usr/share/tcping"

            [logging]
            level = "debug"
        "#;

        let config: TomlConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.target.addr.as_deref(), Some("10.0.0.1:7"));
        assert_eq!(config.probe.read_timeout_ms, 2000);
        assert_eq!(config.probe.slow_threshold_ms, 100);
        assert_eq!(config.probe.lag_threshold_ms, 400);
        assert_eq!(config.reconnect.max_delay_ms, 10000);
        assert_eq!(config.reconnect.factor, 1.5);
        assert_eq!(config.alert.player, "mpg123");
        assert_eq!(config.alert.sounds_dir, PathBuf::from("/usr/share/tcping"));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_missing_address() {
        let err = Config::merge(cli(&[]), TomlConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingAddress));
        assert!(err.to_string().contains("TCPING_ADDR"));

        let err = Config::merge(cli(&["--addr", " "]), TomlConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingAddress));
    }

    #[test]
    fn test_cli_overrides_file() {
        let config = Config::merge(
            cli(&[
                "--addr",
                "127.0.0.1:9",
                "--read-timeout-ms",
                "2000",
                "--player",
                "paplay",
                "--no-alert",
                "--log-level",
                "debug",
            ]),
            toml_with_addr(),
        )
        .unwrap();

        assert_eq!(config.addr, "127.0.0.1:9");
        assert_eq!(config.read_timeout_ms, 2000);
        assert_eq!(config.player, "paplay");
        assert!(!config.alert_enabled);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_file_address_used_without_cli() {
        let config = Config::merge(cli(&[]), toml_with_addr()).unwrap();
        assert_eq!(config.addr, "example.net:7");
        assert!(config.alert_enabled);

        let probe = config.probe();
        assert_eq!(probe.read_timeout, Duration::from_millis(2500));
        assert_eq!(probe.interval, Duration::from_millis(500));
        assert_eq!(probe.policy, LatencyPolicy::default());
        assert_eq!(config.backoff(), BackoffConfig::default());
        assert_eq!(config.connect_timeout(), Duration::from_millis(5000));
    }

    #[test]
    fn test_validation() {
        let cases = [
            "[target]\naddr = \"a:1\"\n[probe]\nread_timeout_ms = 0",
            "[target]\naddr = \"a:1\"\n[probe]\ninterval_ms = 0",
            "[target]\naddr = \"a:1\"\n[probe]\nslow_threshold_ms = 400",
            "[target]\naddr = \"a:1\"\n[reconnect]\nfactor = 0.5",
            "[target]\naddr = \"a:1\"\n[reconnect]\ninitial_delay_ms = 6000",
            "[target]\naddr = \"a:1\"\n[reconnect]\nconnect_timeout_ms = 0",
        ];

        for case in cases {
            let file: TomlConfig = toml::from_str(case).unwrap();
            let err = Config::merge(cli(&[]), file).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{case}");
        }
    }
}
