//! A Prometheus exporter for Jellyfin media server statistics

pub mod client;
pub mod collector;
pub mod config;
pub mod error;
pub mod exposition;
pub mod server;
pub mod util;

/// Re-export of commonly used types for convenience
pub mod prelude {
    pub use crate::client::{ApiClient, ItemCounts, RequestObserver, SystemInfo};
    pub use crate::collector::{Collector, JellyfinCollector, MetricDesc, MetricSample};
    pub use crate::config::{Args, ExporterConfig, LogLevel, load_config};
    pub use crate::error::{ExporterError, Result};
    pub use crate::exposition::Registry;
}

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
