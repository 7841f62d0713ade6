//! HTTP client for the Jellyfin API
//!
//! Every request carries the `X-Emby-Token` header and is bounded by a fixed
//! timeout. There are no retries: a failed request fails the current scrape
//! and the next scrape simply tries again.
use log::{debug, warn};
use reqwest::header::HeaderValue;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ExporterError, Result};

/// Timeout applied to every outbound request
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Header carrying the API key
pub const AUTH_HEADER: &str = "X-Emby-Token";

/// `GET /Items/Counts`
pub const ITEM_COUNTS: Endpoint<ItemCounts> = Endpoint::new("/Items/Counts");

/// `GET /System/Info`
pub const SYSTEM_INFO: Endpoint<SystemInfo> = Endpoint::new("/System/Info");

/// A fixed API path together with the shape its JSON body decodes into
#[derive(Debug)]
pub struct Endpoint<T> {
    path: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Endpoint<T> {
    pub const fn new(path: &'static str) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &'static str {
        self.path
    }
}

/// Library counters from `/Items/Counts`. A missing or null counter reads as zero.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ItemCounts {
    #[serde(rename = "MovieCount", default, deserialize_with = "null_as_zero")]
    pub movie_count: f64,

    #[serde(rename = "SeriesCount", default, deserialize_with = "null_as_zero")]
    pub series_count: f64,

    /// Counters the exporter does not publish
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}

fn null_as_zero<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0))
}

/// Server information from `/System/Info`
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(try_from = "RawSystemInfo")]
pub struct SystemInfo {
    pub version: String,
}

/// Jellyfin sends `Version`; older servers and proxies may send `version`
#[derive(Deserialize)]
struct RawSystemInfo {
    version: Option<String>,
    #[serde(rename = "Version")]
    title_version: Option<String>,
}

impl TryFrom<RawSystemInfo> for SystemInfo {
    type Error = String;

    fn try_from(raw: RawSystemInfo) -> std::result::Result<Self, Self::Error> {
        raw.version
            .or(raw.title_version)
            .map(|version| SystemInfo { version })
            .ok_or_else(|| "missing field `version`".to_string())
    }
}

/// Hooks for request tracing and for failures that are reported but not returned
pub trait RequestObserver: Send + Sync + 'static {
    fn on_request(&self, url: &Url);

    fn on_failure(&self, err: &ExporterError) {
        warn!("Request failed: {}", err);
    }
}

/// Default observer, traces requests at debug level
#[derive(Debug, Default)]
pub struct LogObserver;

impl RequestObserver for LogObserver {
    fn on_request(&self, url: &Url) {
        debug!("GET api url={}", url);
    }
}

/// Authenticated JSON client for a single Jellyfin host
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    host: String,
    api_key: HeaderValue,
    timeout: Duration,
    observer: Arc<dyn RequestObserver>,
}

impl ApiClient {
    /// Create a client with the standard request timeout
    pub fn new(host: impl Into<String>, api_key: &str) -> Result<Self> {
        Self::with_timeout(host, api_key, REQUEST_TIMEOUT)
    }

    /// Create a client with a custom request timeout
    pub fn with_timeout(host: impl Into<String>, api_key: &str, timeout: Duration) -> Result<Self> {
        let host = host.into().trim_end_matches('/').to_string();

        let mut api_key = HeaderValue::from_str(api_key).map_err(|_| {
            ExporterError::Config("API key contains characters not allowed in a header".to_string())
        })?;
        api_key.set_sensitive(true);

        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            host,
            api_key,
            timeout,
            observer: Arc::new(LogObserver),
        })
    }

    /// Replace the request observer
    pub fn with_observer(mut self, observer: Arc<dyn RequestObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// The observer requests are reported to
    pub fn observer(&self) -> Arc<dyn RequestObserver> {
        Arc::clone(&self.observer)
    }

    /// Base URL requests are made against, without a trailing slash
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Absolute URL for an API path
    pub fn url(&self, path: &str) -> Result<Url> {
        let raw = format!("{}{}", self.host, path);
        Url::parse(&raw).map_err(|e| ExporterError::InvalidUrl {
            url: raw.clone(),
            reason: e.to_string(),
        })
    }

    /// Fetch and decode a known endpoint
    pub async fn fetch<T: DeserializeOwned>(&self, endpoint: &Endpoint<T>) -> Result<T> {
        self.get_json(endpoint.path()).await
    }

    pub async fn item_counts(&self) -> Result<ItemCounts> {
        self.fetch(&ITEM_COUNTS).await
    }

    pub async fn system_info(&self) -> Result<SystemInfo> {
        self.fetch(&SYSTEM_INFO).await
    }

    /// GET `path` and decode the JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path)?;
        self.observer.on_request(&url);

        let response = self
            .http
            .get(url.clone())
            .header(AUTH_HEADER, self.api_key.clone())
            .send()
            .await
            .map_err(|e| self.transport_error(&url, e))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ExporterError::Remote {
                url: url.to_string(),
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(&url, e))?;

        serde_json::from_slice(&body).map_err(|source| ExporterError::Decode {
            url: url.to_string(),
            source,
        })
    }

    fn transport_error(&self, url: &Url, err: reqwest::Error) -> ExporterError {
        if err.is_timeout() {
            ExporterError::Timeout {
                url: url.to_string(),
                timeout: self.timeout,
            }
        } else {
            ExporterError::Transport(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct RecordingObserver {
        urls: Mutex<Vec<String>>,
    }

    impl RequestObserver for RecordingObserver {
        fn on_request(&self, url: &Url) {
            self.urls.lock().unwrap().push(url.to_string());
        }
    }

    #[test]
    fn test_system_info_tolerates_both_spellings() {
        let info: SystemInfo =
            serde_json::from_value(serde_json::json!({"version": "10.8.5", "Version": "10.8.5"}))
                .unwrap();
        assert_eq!(info.version, "10.8.5");

        let info: SystemInfo =
            serde_json::from_value(serde_json::json!({"Version": "10.9.0"})).unwrap();
        assert_eq!(info.version, "10.9.0");

        assert!(serde_json::from_value::<SystemInfo>(serde_json::json!({"Id": "abc"})).is_err());
    }

    #[test]
    fn test_null_counters_read_as_zero() {
        let counts: ItemCounts = serde_json::from_value(
            serde_json::json!({"MovieCount": null, "SeriesCount": 12, "EpisodeCount": null}),
        )
        .unwrap();
        assert_eq!(counts.movie_count, 0.0);
        assert_eq!(counts.series_count, 12.0);
    }

    #[test]
    fn test_url_trims_trailing_slash() {
        let client = ApiClient::new("http://jellyfin.local:8096///", "key").unwrap();
        assert_eq!(client.host(), "http://jellyfin.local:8096");
        assert_eq!(
            client.url("/System/Info").unwrap().as_str(),
            "http://jellyfin.local:8096/System/Info"
        );
    }

    #[test]
    fn test_invalid_host() {
        let client = ApiClient::new("not a url", "key").unwrap();
        assert!(matches!(
            client.url("/System/Info"),
            Err(ExporterError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_api_key_must_be_header_safe() {
        assert!(matches!(
            ApiClient::new("http://localhost", "bad\nkey"),
            Err(ExporterError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_sends_token_and_decodes() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/System/Info"))
            .and(header(AUTH_HEADER, "secret"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"version": "10.8.5"})),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let observer = Arc::new(RecordingObserver::default());
        let client = ApiClient::new(format!("{}/", mock_server.uri()), "secret")
            .unwrap()
            .with_observer(observer.clone());

        let info = client.system_info().await.unwrap();
        assert_eq!(info.version, "10.8.5");

        let urls = observer.urls.lock().unwrap();
        assert_eq!(urls.as_slice(), [format!("{}/System/Info", mock_server.uri())]);
    }

    #[tokio::test]
    async fn test_system_info_accepts_capitalised_field() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/System/Info"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"Version": "10.9.0", "ServerName": "media"}),
            ))
            .mount(&mock_server)
            .await;

        let client = ApiClient::new(mock_server.uri(), "secret").unwrap();
        assert_eq!(client.system_info().await.unwrap().version, "10.9.0");
    }

    #[tokio::test]
    async fn test_item_counts_missing_keys_are_zero() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/Items/Counts"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"MovieCount": 42, "EpisodeCount": 7})),
            )
            .mount(&mock_server)
            .await;

        let client = ApiClient::new(mock_server.uri(), "secret").unwrap();
        let counts = client.item_counts().await.unwrap();
        assert_eq!(counts.movie_count, 42.0);
        assert_eq!(counts.series_count, 0.0);
        assert_eq!(counts.other.get("EpisodeCount"), Some(&serde_json::json!(7)));
    }

    #[tokio::test]
    async fn test_non_200_is_remote_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/System/Info"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = ApiClient::new(mock_server.uri(), "wrong").unwrap();
        match client.system_info().await {
            Err(ExporterError::Remote { status, reason, url }) => {
                assert_eq!(status, 401);
                assert_eq!(reason, "Unauthorized");
                assert!(url.ends_with("/System/Info"));
            }
            other => panic!("Expected ExporterError::Remote, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/System/Info"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/Items/Counts"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"MovieCount": "many"})),
            )
            .mount(&mock_server)
            .await;

        let client = ApiClient::new(mock_server.uri(), "secret").unwrap();
        assert!(matches!(
            client.system_info().await,
            Err(ExporterError::Decode { .. })
        ));
        assert!(matches!(
            client.item_counts().await,
            Err(ExporterError::Decode { .. })
        ));
    }

    #[tokio::test]
    async fn test_slow_response_is_timeout() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/System/Info"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"version": "10.8.5"}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&mock_server)
            .await;

        let client =
            ApiClient::with_timeout(mock_server.uri(), "secret", Duration::from_millis(200)).unwrap();
        let err = client.system_info().await.unwrap_err();
        assert!(matches!(err, ExporterError::Timeout { .. }));
        assert!(err.url().unwrap().ends_with("/System/Info"));
    }
}
