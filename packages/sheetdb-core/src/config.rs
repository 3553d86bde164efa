//! Record engine configuration.

use serde::Deserialize;

/// Record engine configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of non-primary columns per table
    pub max_non_primary_columns: usize,
    /// Image reachability check timeout in milliseconds
    pub image_check_timeout_ms: u64,
    /// Query parameter appended to image URLs to bypass caches
    pub cache_bust_param: String,
    /// Whether the HTTP image probe requires an `image/*` content type
    pub require_image_content_type: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_non_primary_columns: 10,
            image_check_timeout_ms: 8000,
            cache_bust_param: "_cb".to_string(),
            require_image_content_type: true,
        }
    }
}

impl EngineConfig {
    /// Parses a configuration from JSON, filling unset keys with defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Returns the image check timeout as a `Duration`.
    pub fn image_check_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.image_check_timeout_ms)
    }
}
