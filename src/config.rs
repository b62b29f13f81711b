// ABOUTME: Client configuration: service base URL, timeouts and polling cadence
// ABOUTME: Merges built-in defaults, an optional TOML file and the ML_API_URL environment variable

use std::path::Path;
use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;

use crate::error::{InferenceError, Result};
use crate::remote::PollOptions;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_REPORT_BUCKET_URL: &str =
    "https://battery-ml-results-070872471952.s3.amazonaws.com";
pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://cms.charjkaro.in/admin/api/v1/zipbolt/token";
pub const BASE_URL_ENV: &str = "ML_API_URL";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    pub poll: PollOptions,
    pub report_bucket_url: String,
    pub token_endpoint: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            poll: PollOptions::default(),
            report_bucket_url: DEFAULT_REPORT_BUCKET_URL.to_string(),
            token_endpoint: DEFAULT_TOKEN_ENDPOINT.to_string(),
        }
    }
}

/// On-disk shape. Every key is optional and overrides the default.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    base_url: Option<String>,
    request_timeout_secs: Option<u64>,
    poll_interval_ms: Option<u64>,
    poll_timeout_secs: Option<u64>,
    report_bucket_url: Option<String>,
    token_endpoint: Option<String>,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Defaults, then `path` (if given), then `ML_API_URL`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_base_url(path, None)
    }

    /// Like [`ClientConfig::load`], with `base_url` taking precedence over
    /// every other source. Validation runs once, on the merged result.
    pub fn load_with_base_url(path: Option<&Path>, base_url: Option<&str>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path).map_err(|e| {
                    InferenceError::Config(format!("Failed to read {}: {}", path.display(), e))
                })?;
                Self::merge_toml(&contents)?
            }
            None => Self::default(),
        };

        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.trim().is_empty() {
                config.base_url = url;
            }
        }
        if let Some(url) = base_url {
            config.base_url = url.to_string();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config = Self::merge_toml(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn merge_toml(contents: &str) -> Result<Self> {
        let file: FileConfig = toml::from_str(contents)
            .map_err(|e| InferenceError::Config(format!("Failed to parse config: {}", e)))?;

        let mut config = Self::default();
        if let Some(url) = file.base_url {
            config.base_url = url;
        }
        if let Some(secs) = file.request_timeout_secs {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = file.poll_interval_ms {
            config.poll.interval = Duration::from_millis(ms);
        }
        if let Some(secs) = file.poll_timeout_secs {
            config.poll.timeout = Duration::from_secs(secs);
        }
        if let Some(url) = file.report_bucket_url {
            config.report_bucket_url = url;
        }
        if let Some(url) = file.token_endpoint {
            config.token_endpoint = url;
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.parsed_base_url()?;
        if self.request_timeout.is_zero() {
            return Err(InferenceError::Config(
                "request timeout must be greater than zero".to_string(),
            ));
        }
        if self.poll.interval.is_zero() {
            return Err(InferenceError::Config(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        if self.poll.timeout.is_zero() {
            return Err(InferenceError::Config(
                "poll timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn parsed_base_url(&self) -> Result<Url> {
        let trimmed = self.base_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(InferenceError::Config("base_url is empty".to_string()));
        }
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(InferenceError::Config(format!(
                "base_url must start with http:// or https://, got '{}'",
                trimmed
            )));
        }
        Url::parse(trimmed)
            .map_err(|e| InferenceError::Config(format!("invalid base_url '{}': {}", trimmed, e)))
    }
}
