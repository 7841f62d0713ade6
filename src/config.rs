use clap::Parser;
use config::{self, File, FileFormat};
use log::debug;
use serde::Deserialize;
use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{ExporterError, Result};

/// Default logging level
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default metric name prefix
pub const DEFAULT_NAMESPACE: &str = "jellyfin";

/// Default listen address, all interfaces
pub const DEFAULT_LISTEN: &str = ":9453";

/// Command line arguments, each backed by an environment variable
#[derive(Parser, Debug, Default, Clone)]
#[command(
    name = "jellyfin-exporter",
    version,
    about = "Jellyfin Exporter",
    help_template = "{about} (version {version})\n\n{usage-heading} {usage}\n\n{all-args}",
    disable_help_flag = true
)]
pub struct Args {
    /// log verbosity level (trace, debug, info, warn, error, fatal)
    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,

    /// metric name prefix
    #[arg(long, env = "METRIC_NAMESPACE")]
    pub namespace: Option<String>,

    /// host:port to listen on
    #[arg(short, long, env = "LISTEN")]
    pub listen: Option<String>,

    /// jellyfin host to export metrics for
    #[arg(short = 'h', long, env = "HOST")]
    pub host: Option<String>,

    /// jellyfin apikey for auth
    #[arg(short = 'u', long = "apikey", env = "API_KEY")]
    pub api_key: Option<String>,

    /// optional TOML file providing any of the options above
    #[arg(short, long, env = "EXPORTER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print help
    #[arg(long, action = clap::ArgAction::Help)]
    help: Option<bool>,
}

/// Exporter configuration after all sources have been merged
#[derive(Deserialize, Clone)]
pub struct ExporterConfig {
    /// Requested log level, parsed lazily so a bad value is not fatal
    pub log_level: String,
    /// Metric name prefix
    pub namespace: String,
    /// `host:port` or `:port`
    pub listen: String,
    /// Base URL of the Jellyfin server
    #[serde(default)]
    pub host: String,
    /// API key sent with every request
    #[serde(default)]
    pub api_key: String,
}

impl fmt::Debug for ExporterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExporterConfig")
            .field("log_level", &self.log_level)
            .field("namespace", &self.namespace)
            .field("listen", &self.listen)
            .field("host", &self.host)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl ExporterConfig {
    /// Parse the configured log level
    pub fn log_level(&self) -> Result<LogLevel> {
        self.log_level.parse()
    }

    /// Resolve the listen option into a socket address
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        let listen = self.listen.trim();
        let candidate = if listen.starts_with(':') {
            format!("0.0.0.0{listen}")
        } else {
            listen.to_string()
        };

        candidate
            .to_socket_addrs()
            .map_err(|e| ExporterError::Config(format!("Invalid listen address {listen:?}: {e}")))?
            .next()
            .ok_or_else(|| {
                ExporterError::Config(format!("Listen address {listen:?} did not resolve"))
            })
    }

    /// Check required options and value formats
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(ExporterError::Config(
                "the required option `--host` (HOST) was not specified".to_string(),
            ));
        }
        if self.api_key.trim().is_empty() {
            return Err(ExporterError::Config(
                "the required option `--apikey` (API_KEY) was not specified".to_string(),
            ));
        }
        if !is_valid_namespace(&self.namespace) {
            return Err(ExporterError::Config(format!(
                "Invalid metric namespace {:?}",
                self.namespace
            )));
        }
        self.listen_addr()?;
        Ok(())
    }
}

/// Prometheus metric-name prefix: `[a-zA-Z_:][a-zA-Z0-9_:]*`
fn is_valid_namespace(namespace: &str) -> bool {
    let mut chars = namespace.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// Logging level
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Error level
    Error,
    /// Warning level
    Warn,
    /// Info level
    Info,
    /// Debug level
    Debug,
    /// Trace level
    Trace,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl FromStr for LogLevel {
    type Err = ExporterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            // logrus-style levels above error collapse onto it
            "error" | "fatal" | "panic" => Ok(LogLevel::Error),
            other => Err(ExporterError::Config(format!("not a valid log level: {other:?}"))),
        }
    }
}

/// Merge defaults, the optional config file and command line/environment
/// values, in increasing order of precedence, then validate the result.
pub fn load_config(args: &Args) -> Result<ExporterConfig> {
    let mut builder = config::Config::builder()
        .set_default("log_level", DEFAULT_LOG_LEVEL)
        .and_then(|b| b.set_default("namespace", DEFAULT_NAMESPACE))
        .and_then(|b| b.set_default("listen", DEFAULT_LISTEN))
        .map_err(|e| ExporterError::Config(e.to_string()))?;

    if let Some(path) = &args.config {
        if !path.exists() {
            return Err(ExporterError::Config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }
        debug!("Loading configuration from {}", path.display());
        builder = builder.add_source(File::from(path.as_path()).format(FileFormat::Toml));
    }

    let config = builder
        .set_override_option("log_level", args.log_level.clone())
        .and_then(|b| b.set_override_option("namespace", args.namespace.clone()))
        .and_then(|b| b.set_override_option("listen", args.listen.clone()))
        .and_then(|b| b.set_override_option("host", args.host.clone()))
        .and_then(|b| b.set_override_option("api_key", args.api_key.clone()))
        .and_then(|b| b.build())
        .map_err(|e| ExporterError::Config(format!("Failed to build configuration: {}", e)))?;

    let result: ExporterConfig = config
        .try_deserialize()
        .map_err(|e| ExporterError::Config(format!("Failed to deserialize configuration: {}", e)))?;

    result.validate()?;
    debug!("Configuration loaded successfully: {:?}", result);

    Ok(result)
}
