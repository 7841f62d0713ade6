// src/error.rs
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type used throughout the exporter library
pub type Result<T, E = ExporterError> = std::result::Result<T, E>;

/// Error type for the exporter
///
/// `Timeout`, `Remote` and `Decode` are scrape-local: they abort a single
/// collection and are reported to the scraper, never to the process.
#[derive(Error, Debug)]
pub enum ExporterError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Timeout error: GET {url} did not complete within {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("Remote error: GET {url} returned {status} {reason}")]
    Remote {
        url: String,
        status: u16,
        reason: String,
    },

    #[error("Decode error: GET {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Collection error: {0}")]
    Collection(String),

    #[error("Encode error: {0}")]
    Encode(#[from] prometheus::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ExporterError {
    /// URL of the failed request, for fetch-time errors
    pub fn url(&self) -> Option<&str> {
        match self {
            ExporterError::Timeout { url, .. }
            | ExporterError::Remote { url, .. }
            | ExporterError::Decode { url, .. }
            | ExporterError::InvalidUrl { url, .. } => Some(url),
            _ => None,
        }
    }
}
