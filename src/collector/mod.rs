mod core;
mod descriptors;
mod jellyfin;

// Re-export public items
pub use self::core::{Collector, MetricDesc, MetricSample, build_fq_name};
pub use descriptors::{JellyfinDescriptors, build_descriptors};
pub use jellyfin::{JellyfinCollector, ScrapeResult};
