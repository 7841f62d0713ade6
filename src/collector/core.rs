//! Core collector traits and types
use crate::error::Result;
use std::fmt::Debug;
use std::sync::Arc;

/// Static identity of an exported gauge: name, help text and label schema
///
/// Created once at startup and shared read-only by every scrape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricDesc {
    /// Fully-qualified metric name
    pub fq_name: String,
    /// Help text
    pub help: String,
    /// Names of the variable labels, in order
    pub label_names: Vec<String>,
}

impl MetricDesc {
    pub fn new(fq_name: impl Into<String>, help: impl Into<String>, label_names: &[&str]) -> Self {
        Self {
            fq_name: fq_name.into(),
            help: help.into(),
            label_names: label_names.iter().map(|l| l.to_string()).collect(),
        }
    }
}

/// Join the non-empty parts of a metric name with underscores
pub fn build_fq_name(namespace: &str, subsystem: &str, name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }
    [namespace, subsystem, name]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("_")
}

/// One gauge value produced by a scrape
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    /// The descriptor this sample belongs to
    pub desc: Arc<MetricDesc>,
    /// The sample value
    pub value: f64,
    /// Label values, matching `desc.label_names` positionally
    pub label_values: Vec<String>,
}

impl MetricSample {
    pub fn new(desc: &Arc<MetricDesc>, value: f64, label_values: Vec<String>) -> Self {
        Self {
            desc: Arc::clone(desc),
            value,
            label_values,
        }
    }
}

/// A source of metrics, queried afresh on every scrape
#[async_trait::async_trait]
pub trait Collector: Send + Sync + 'static {
    /// Descriptors of every metric this collector can emit.
    /// Must return the same set on every call.
    fn describe(&self) -> Vec<Arc<MetricDesc>>;

    /// Produce all current samples, or fail the whole scrape
    async fn collect(&self) -> Result<Vec<MetricSample>>;

    /// Get the collector name
    fn name(&self) -> &str;
}
