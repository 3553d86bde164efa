//! Asynchronous image reachability checks for IMAGE fields.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use sheetdb_core::config::EngineConfig;
use thiserror::Error;
use tokio::time;

pub use reqwest::Url;

/// Reasons an image URL failed verification.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MediaError {
    /// URL could not be parsed
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// No response within the timeout
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Loading failed
    #[error("{0}")]
    Unreachable(String),
}

/// Loads a URL as an image resource.
#[async_trait]
pub trait ImageProbe: Send + Sync {
    /// Resolves once the resource has loaded as an image.
    async fn probe(&self, url: &Url) -> Result<(), String>;
}

/// Probe that fetches the URL over HTTP.
pub struct HttpImageProbe {
    client: reqwest::Client,
    require_image_content_type: bool,
}

impl HttpImageProbe {
    /// Creates a probe with a default client.
    pub fn new(require_image_content_type: bool) -> Self {
        Self::with_client(reqwest::Client::new(), require_image_content_type)
    }

    /// Creates a probe around a preconfigured client.
    pub fn with_client(client: reqwest::Client, require_image_content_type: bool) -> Self {
        Self {
            client,
            require_image_content_type,
        }
    }
}

#[async_trait]
impl ImageProbe for HttpImageProbe {
    async fn probe(&self, url: &Url) -> Result<(), String> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {}", status));
        }

        if self.require_image_content_type {
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            if !content_type.starts_with("image/") {
                return Err(format!("not an image (content type '{}')", content_type));
            }
        }
        Ok(())
    }
}

/// Verifies image URLs with a timeout and cache busting.
pub struct MediaValidator {
    probe: Arc<dyn ImageProbe>,
    timeout: Duration,
    cache_bust_param: String,
    sequence: AtomicU64,
}

impl MediaValidator {
    /// Creates a validator around an arbitrary probe.
    pub fn new(probe: Arc<dyn ImageProbe>, config: &EngineConfig) -> Self {
        Self {
            probe,
            timeout: config.image_check_timeout(),
            cache_bust_param: config.cache_bust_param.clone(),
            sequence: AtomicU64::new(0),
        }
    }

    /// Creates a validator that probes over HTTP.
    pub fn http(config: &EngineConfig) -> Self {
        Self::new(
            Arc::new(HttpImageProbe::new(config.require_image_content_type)),
            config,
        )
    }

    /// Returns the configured timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Appends a unique cache-busting query parameter to `url`.
    pub fn cache_busted(&self, url: &str) -> Result<Url, MediaError> {
        let mut parsed =
            Url::parse(url.trim()).map_err(|e| MediaError::InvalidUrl(format!("{}: {}", url, e)))?;
        let token = format!(
            "{}-{}",
            Utc::now().timestamp_millis(),
            self.sequence.fetch_add(1, Ordering::Relaxed)
        );
        parsed
            .query_pairs_mut()
            .append_pair(&self.cache_bust_param, &token);
        Ok(parsed)
    }

    /// Verifies `url` with the configured timeout.
    pub async fn verify(&self, url: &str) -> Result<(), MediaError> {
        self.verify_with_timeout(url, self.timeout).await
    }

    /// Verifies that `url` loads as an image within `timeout`.
    ///
    /// # Errors
    /// `InvalidUrl` when the URL does not parse, `Timeout` when the probe does
    /// not finish in time, `Unreachable` when loading fails.
    pub async fn verify_with_timeout(&self, url: &str, timeout: Duration) -> Result<(), MediaError> {
        let target = self.cache_busted(url)?;
        tracing::debug!("Checking image {}", target);
        match time::timeout(timeout, self.probe.probe(&target)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(reason)) => Err(MediaError::Unreachable(reason)),
            Err(_) => Err(MediaError::Timeout(timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingProbe {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ImageProbe for RecordingProbe {
        async fn probe(&self, url: &Url) -> Result<(), String> {
            self.seen.lock().push(url.to_string());
            if url.path().ends_with(".png") {
                Ok(())
            } else {
                Err("HTTP 404 Not Found".to_string())
            }
        }
    }

    struct StalledProbe;

    #[async_trait]
    impl ImageProbe for StalledProbe {
        async fn probe(&self, _url: &Url) -> Result<(), String> {
            time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_cache_busting_is_unique() {
        let probe = Arc::new(RecordingProbe::default());
        let validator = MediaValidator::new(probe.clone(), &EngineConfig::default());

        validator.verify("https://cdn.test/a.png?size=2").await.unwrap();
        validator.verify("https://cdn.test/a.png?size=2").await.unwrap();

        let seen = probe.seen.lock().clone();
        assert_eq!(seen.len(), 2);
        assert_ne!(seen[0], seen[1]);
        for url in &seen {
            let parsed = Url::parse(url).unwrap();
            let params: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();
            assert_eq!(params[0], ("size".to_string(), "2".to_string()));
            assert_eq!(params[1].0, "_cb");
        }
    }

    #[tokio::test]
    async fn test_failure_and_invalid_url() {
        let validator =
            MediaValidator::new(Arc::new(RecordingProbe::default()), &EngineConfig::default());
        assert_eq!(
            validator.verify("https://cdn.test/missing").await,
            Err(MediaError::Unreachable("HTTP 404 Not Found".to_string()))
        );
        assert!(matches!(
            validator.verify("not a url").await,
            Err(MediaError::InvalidUrl(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout() {
        let validator = MediaValidator::new(Arc::new(StalledProbe), &EngineConfig::default());
        assert_eq!(
            validator.verify("https://slow.test/a.png").await,
            Err(MediaError::Timeout(Duration::from_millis(8000)))
        );
    }
}
