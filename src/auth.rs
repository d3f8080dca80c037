//! Access token management.
//!
//! Tokens are cached in memory and in a flat file holding
//! `"<token>,<expires_at>"`, where `expires_at` is a float Unix timestamp.
//! A new token is requested only when both caches are empty or expired.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Result, WeChatError};
use crate::http::WeChatHttpClient;

const TOKEN_PATH: &str = "/cgi-bin/token";
/// Seconds subtracted from the issued lifetime.
const EXPIRY_MARGIN_SECS: f64 = 60.0;
const DEFAULT_EXPIRES_IN: f64 = 7200.0;

/// A token and the Unix time (seconds) at which it stops being used.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenInfo {
    pub access_token: String,
    pub expires_at: f64,
}

impl TokenInfo {
    /// True once the current time reaches `expires_at`.
    pub fn is_expired(&self) -> bool {
        now_secs() >= self.expires_at
    }

    /// Parses the cache file format. Returns `None` for anything malformed.
    fn parse(contents: &str) -> Option<Self> {
        let fields: Vec<&str> = contents.trim().split(',').collect();
        if fields.len() != 2 || fields[0].is_empty() {
            return None;
        }
        let expires_at = fields[1].trim().parse::<f64>().ok()?;
        Some(Self {
            access_token: fields[0].to_string(),
            expires_at,
        })
    }

    fn serialize(&self) -> String {
        format!("{},{}", self.access_token, self.expires_at)
    }
}

/// Fetches and caches access tokens for one app.
#[derive(Debug)]
pub struct TokenManager {
    app_id: String,
    app_secret: String,
    cache_path: PathBuf,
    http_client: Arc<WeChatHttpClient>,
    current: Mutex<Option<TokenInfo>>,
}

impl TokenManager {
    /// Creates a manager with an empty in-memory cache.
    pub fn new(
        app_id: impl Into<String>,
        app_secret: impl Into<String>,
        cache_path: impl Into<PathBuf>,
        http_client: Arc<WeChatHttpClient>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            app_secret: app_secret.into(),
            cache_path: cache_path.into(),
            http_client,
            current: Mutex::new(None),
        }
    }

    /// Path of the token cache file.
    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// Returns a valid access token, refreshing it if necessary.
    pub async fn get_access_token(&self) -> Result<String> {
        let mut current = self.current.lock().await;

        if let Some(token) = current.as_ref().filter(|t| !t.is_expired()) {
            return Ok(token.access_token.clone());
        }

        if let Some(token) = self.read_cache_file().await {
            debug!("Using cached access token from {}", self.cache_path.display());
            let access_token = token.access_token.clone();
            *current = Some(token);
            return Ok(access_token);
        }

        let token = self.fetch_token().await?;
        let access_token = token.access_token.clone();
        *current = Some(token);
        Ok(access_token)
    }

    /// Requests a new token regardless of cache state.
    pub async fn force_refresh(&self) -> Result<String> {
        let mut current = self.current.lock().await;
        let token = self.fetch_token().await?;
        let access_token = token.access_token.clone();
        *current = Some(token);
        Ok(access_token)
    }

    /// Returns the in-memory token, if one has been loaded.
    pub async fn get_token_info(&self) -> Option<TokenInfo> {
        self.current.lock().await.clone()
    }

    async fn read_cache_file(&self) -> Option<TokenInfo> {
        let contents = match tokio::fs::read_to_string(&self.cache_path).await {
            Ok(contents) => contents,
            Err(e) => {
                debug!("Token cache {} unavailable: {e}", self.cache_path.display());
                return None;
            }
        };
        match TokenInfo::parse(&contents) {
            Some(token) if !token.is_expired() => Some(token),
            Some(_) => {
                debug!("Cached access token expired");
                None
            }
            None => {
                debug!("Ignoring malformed token cache {}", self.cache_path.display());
                None
            }
        }
    }

    async fn fetch_token(&self) -> Result<TokenInfo> {
        info!("Requesting new access token");
        let payload = self
            .http_client
            .get_json(
                TOKEN_PATH,
                &[
                    ("grant_type", "client_credential"),
                    ("appid", self.app_id.as_str()),
                    ("secret", self.app_secret.as_str()),
                ],
            )
            .await?;

        let access_token = payload
            .get("access_token")
            .and_then(|v| v.as_str())
            .ok_or_else(|| WeChatError::Auth {
                response: payload.to_string(),
            })?
            .to_string();
        let expires_in = payload
            .get("expires_in")
            .and_then(|v| v.as_f64())
            .unwrap_or(DEFAULT_EXPIRES_IN);

        let token = TokenInfo {
            access_token,
            expires_at: now_secs() + expires_in - EXPIRY_MARGIN_SECS,
        };

        if let Err(e) = tokio::fs::write(&self.cache_path, token.serialize()).await {
            warn!(
                "Failed to write token cache {}: {e}",
                self.cache_path.display()
            );
        }

        Ok(token)
    }
}

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
