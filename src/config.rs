//! Client configuration.
//!
//! Settings can be built in code with [`Config::new`] and the `with_*`
//! methods, or loaded from `WECHAT_*` environment variables with
//! [`Config::from_env`].

use std::path::PathBuf;
use std::time::Duration;

use config::Environment;
use serde::Deserialize;

use crate::error::{Result, WeChatError};

/// Default API host.
pub const DEFAULT_BASE_URL: &str = "https://api.weixin.qq.com";
/// Default location of the token cache file.
pub const DEFAULT_TOKEN_CACHE_PATH: &str = ".token_cache";
/// Default image size ceiling (1 MiB).
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 1024 * 1024;

const ENV_PREFIX: &str = "WECHAT";

/// Configuration for a [`WeChatClient`](crate::WeChatClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub app_id: String,
    pub app_secret: String,
    /// Scheme and host of the API, without a trailing slash.
    pub base_url: String,
    pub token_cache_path: PathBuf,
    /// Upper bound for every uploaded image, in bytes.
    pub max_image_bytes: usize,
    /// Request timeout; `None` keeps the HTTP client default.
    pub timeout: Option<Duration>,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    app_id: String,
    app_secret: String,
    base_url: Option<String>,
    token_cache_path: Option<PathBuf>,
    max_image_bytes: Option<usize>,
    timeout_secs: Option<u64>,
}

impl Config {
    /// Creates a configuration with default endpoint, cache path and limits.
    pub fn new(app_id: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            app_secret: app_secret.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            token_cache_path: PathBuf::from(DEFAULT_TOKEN_CACHE_PATH),
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            timeout: None,
        }
    }

    /// Loads configuration from `WECHAT_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_environment(Environment::with_prefix(ENV_PREFIX))
    }

    fn from_environment(env: Environment) -> Result<Self> {
        let raw: RawConfig = config::Config::builder()
            .add_source(env)
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| WeChatError::config_error(e.to_string()))?;

        let mut config = Self::new(raw.app_id, raw.app_secret);
        if let Some(base_url) = raw.base_url {
            config = config.with_base_url(base_url);
        }
        if let Some(path) = raw.token_cache_path {
            config = config.with_token_cache_path(path);
        }
        if let Some(max) = raw.max_image_bytes {
            config = config.with_max_image_bytes(max);
        }
        if let Some(secs) = raw.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        config.validate()?;
        Ok(config)
    }

    /// Sets the API base URL. A trailing slash is dropped.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the token cache file path.
    pub fn with_token_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_cache_path = path.into();
        self
    }

    /// Sets the image size ceiling in bytes.
    pub fn with_max_image_bytes(mut self, max: usize) -> Self {
        self.max_image_bytes = max;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Checks that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        if self.app_id.trim().is_empty() {
            return Err(WeChatError::config_error("app_id must not be empty"));
        }
        if self.app_secret.trim().is_empty() {
            return Err(WeChatError::config_error("app_secret must not be empty"));
        }
        let url = url::Url::parse(&self.base_url)?;
        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(WeChatError::config_error(format!(
                "base_url must use http or https, got \"{}\"",
                url.scheme()
            )));
        }
        if self.max_image_bytes == 0 {
            return Err(WeChatError::config_error(
                "max_image_bytes must be greater than zero",
            ));
        }
        Ok(())
    }
}
