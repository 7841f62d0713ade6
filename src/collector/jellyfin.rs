use log::trace;
use std::sync::Arc;

use super::core::{Collector, MetricDesc, MetricSample};
use super::descriptors::{JellyfinDescriptors, build_descriptors};
use crate::client::{ApiClient, ItemCounts, RequestObserver, SystemInfo};
use crate::error::Result;

/// Outcome of both fetches for one scrape. Never shared between scrapes.
#[derive(Debug)]
pub struct ScrapeResult {
    pub counts: Result<ItemCounts>,
    pub info: Result<SystemInfo>,
}

impl ScrapeResult {
    /// Turn the fetched values into samples.
    ///
    /// Any failed fetch fails the whole scrape. When both failed, the
    /// `/Items/Counts` error wins and the other goes to `observer`.
    pub fn into_samples(
        self,
        descs: &JellyfinDescriptors,
        observer: &dyn RequestObserver,
    ) -> Result<Vec<MetricSample>> {
        match (self.counts, self.info) {
            (Ok(counts), Ok(info)) => {
                let mut samples = Vec::with_capacity(3);
                samples.push(MetricSample::new(&descs.movie_count, counts.movie_count, vec![]));
                samples.push(MetricSample::new(&descs.series_count, counts.series_count, vec![]));
                samples.push(MetricSample::new(&descs.version, 1.0, vec![info.version]));
                Ok(samples)
            }
            (Err(e), Ok(_)) | (Ok(_), Err(e)) => Err(e),
            (Err(e), Err(other)) => {
                observer.on_failure(&other);
                Err(e)
            }
        }
    }
}

/// Collector publishing Jellyfin server version and library counts
pub struct JellyfinCollector {
    client: ApiClient,
    descs: JellyfinDescriptors,
    observer: Arc<dyn RequestObserver>,
    name: String,
}

impl JellyfinCollector {
    /// Create a new collector whose metrics are prefixed with `namespace`.
    /// Failures are reported to the client's observer.
    pub fn new(client: ApiClient, namespace: &str) -> Self {
        Self {
            observer: client.observer(),
            client,
            descs: build_descriptors(namespace),
            name: "jellyfin".to_string(),
        }
    }

    /// Run both fetches concurrently and wait for each to settle
    pub async fn scrape(&self) -> ScrapeResult {
        trace!("Fetching counts and server info from {}", self.client.host());
        let (counts, info) = tokio::join!(self.client.item_counts(), self.client.system_info());
        ScrapeResult { counts, info }
    }
}

#[async_trait::async_trait]
impl Collector for JellyfinCollector {
    fn describe(&self) -> Vec<Arc<MetricDesc>> {
        self.descs.all()
    }

    async fn collect(&self) -> Result<Vec<MetricSample>> {
        self.scrape()
            .await
            .into_samples(&self.descs, self.observer.as_ref())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
