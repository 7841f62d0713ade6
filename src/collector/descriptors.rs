use std::sync::Arc;

use super::core::{MetricDesc, build_fq_name};

/// Descriptors for everything the Jellyfin collector exports
#[derive(Debug, Clone)]
pub struct JellyfinDescriptors {
    /// Always 1, labelled with the server version
    pub version: Arc<MetricDesc>,
    pub movie_count: Arc<MetricDesc>,
    pub series_count: Arc<MetricDesc>,
}

impl JellyfinDescriptors {
    /// All descriptors in declaration order
    pub fn all(&self) -> Vec<Arc<MetricDesc>> {
        vec![
            Arc::clone(&self.version),
            Arc::clone(&self.movie_count),
            Arc::clone(&self.series_count),
        ]
    }
}

/// Build the descriptor set under `namespace`
pub fn build_descriptors(namespace: &str) -> JellyfinDescriptors {
    JellyfinDescriptors {
        version: Arc::new(MetricDesc::new(
            build_fq_name(namespace, "", "version"),
            "always 1. label 'version' contains Jellyfin server version",
            &["version"],
        )),
        movie_count: Arc::new(MetricDesc::new(
            build_fq_name(namespace, "", "movieCount"),
            "Number of movies in the Library",
            &[],
        )),
        series_count: Arc::new(MetricDesc::new(
            build_fq_name(namespace, "", "seriesCount"),
            "Number of series in the Library",
            &[],
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_names_and_labels() {
        let descs = build_descriptors("jellyfin");
        assert_eq!(descs.version.fq_name, "jellyfin_version");
        assert_eq!(descs.version.label_names, vec!["version".to_string()]);
        assert_eq!(descs.movie_count.fq_name, "jellyfin_movieCount");
        assert!(descs.movie_count.label_names.is_empty());
        assert_eq!(descs.series_count.fq_name, "jellyfin_seriesCount");
        assert!(descs.series_count.label_names.is_empty());
    }

    #[test]
    fn test_custom_namespace() {
        let names: Vec<_> = build_descriptors("media")
            .all()
            .iter()
            .map(|d| d.fq_name.clone())
            .collect();
        assert_eq!(names, ["media_version", "media_movieCount", "media_seriesCount"]);
    }
}
