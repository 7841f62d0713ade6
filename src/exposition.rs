//! Scrape-time registry and Prometheus text rendering
//!
//! Collectors are described once at registration. Each scrape runs every
//! collector in its own task, so a collector that errors or panics fails
//! that scrape only.
use log::debug;
use prometheus::proto::{Gauge, LabelPair, Metric, MetricFamily, MetricType};
use prometheus::{Encoder, TextEncoder};
use std::collections::HashSet;
use std::sync::Arc;

use crate::collector::{Collector, MetricDesc, MetricSample};
use crate::error::{ExporterError, Result};

/// Content type of the rendered exposition
pub const CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;

struct Registered {
    collector: Arc<dyn Collector>,
    descs: Vec<Arc<MetricDesc>>,
}

/// A set of collectors scraped together
#[derive(Default)]
pub struct Registry {
    collectors: Vec<Registered>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a collector, caching its descriptors.
    ///
    /// Fails if any metric name is already taken.
    pub fn register_collector(&mut self, collector: Arc<dyn Collector>) -> Result<()> {
        let descs = collector.describe();

        {
            let mut names: HashSet<&str> =
                self.descriptors().map(|d| d.fq_name.as_str()).collect();
            for desc in &descs {
                if !names.insert(desc.fq_name.as_str()) {
                    return Err(ExporterError::Collection(format!(
                        "collector {} describes already registered metric {}",
                        collector.name(),
                        desc.fq_name
                    )));
                }
            }
        }

        debug!(
            "Registered collector {} with {} metrics",
            collector.name(),
            descs.len()
        );
        self.collectors.push(Registered { collector, descs });
        Ok(())
    }

    /// Every cached descriptor, in registration order
    pub fn descriptors(&self) -> impl Iterator<Item = &Arc<MetricDesc>> {
        self.collectors.iter().flat_map(|r| r.descs.iter())
    }

    /// Scrape every collector and group the samples into metric families
    pub async fn gather(&self) -> Result<Vec<MetricFamily>> {
        let handles: Vec<_> = self
            .collectors
            .iter()
            .map(|registered| {
                let collector = Arc::clone(&registered.collector);
                tokio::spawn(async move { collector.collect().await })
            })
            .collect();

        let mut families = Vec::new();
        for (registered, handle) in self.collectors.iter().zip(handles) {
            let name = registered.collector.name();
            let samples = handle.await.map_err(|e| {
                ExporterError::Collection(format!("collector {} aborted: {}", name, e))
            })??;
            families.extend(build_families(name, &registered.descs, samples)?);
        }

        Ok(families)
    }

    /// Scrape and encode in the Prometheus text format
    pub async fn render(&self) -> Result<String> {
        let families = self.gather().await?;

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| ExporterError::Collection(e.to_string()))
    }
}

/// Check samples against the described metrics and group them per descriptor
fn build_families(
    collector: &str,
    descs: &[Arc<MetricDesc>],
    samples: Vec<MetricSample>,
) -> Result<Vec<MetricFamily>> {
    let mut grouped: Vec<Vec<MetricSample>> = vec![Vec::new(); descs.len()];

    for sample in samples {
        let index = descs
            .iter()
            .position(|d| d.as_ref() == sample.desc.as_ref())
            .ok_or_else(|| {
                ExporterError::Collection(format!(
                    "collector {} emitted undescribed metric {}",
                    collector, sample.desc.fq_name
                ))
            })?;

        if sample.label_values.len() != sample.desc.label_names.len() {
            return Err(ExporterError::Collection(format!(
                "metric {} expects {} label values, got {}",
                sample.desc.fq_name,
                sample.desc.label_names.len(),
                sample.label_values.len()
            )));
        }

        grouped[index].push(sample);
    }

    Ok(descs
        .iter()
        .zip(grouped)
        .filter(|(_, samples)| !samples.is_empty())
        .map(|(desc, samples)| gauge_family(desc, samples))
        .collect())
}

fn gauge_family(desc: &MetricDesc, samples: Vec<MetricSample>) -> MetricFamily {
    let mut family = MetricFamily::default();
    family.set_name(desc.fq_name.clone());
    family.set_help(desc.help.clone());
    family.set_field_type(MetricType::GAUGE);

    for sample in samples {
        let mut gauge = Gauge::default();
        gauge.set_value(sample.value);

        let mut metric = Metric::default();
        metric.set_gauge(gauge);
        for (name, value) in desc.label_names.iter().zip(sample.label_values) {
            let mut pair = LabelPair::default();
            pair.set_name(name.clone());
            pair.set_value(value);
            metric.mut_label().push(pair);
        }

        family.mut_metric().push(metric);
    }

    family
}
