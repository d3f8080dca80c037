//! Error types for the WeChat draft SDK.
//!
//! Every failure surfaces as a [`WeChatError`]. Variants that come from the
//! platform carry the raw JSON response so the caller sees exactly what the
//! API returned.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, WeChatError>;

/// The single error type returned by the SDK.
#[derive(Debug, Error)]
pub enum WeChatError {
    /// The token endpoint did not return an `access_token`.
    #[error("Token fetch failed: {response}")]
    Auth { response: String },

    /// An API call answered without the field it is supposed to return.
    #[error("{operation} failed: {response}")]
    Api {
        operation: &'static str,
        response: String,
    },

    /// The platform answered with a body that is not JSON.
    #[error("Unexpected response (HTTP {status}): {body}")]
    InvalidResponse { status: u16, body: String },

    /// A remote image could not be downloaded.
    #[error("Failed to download image {url}: HTTP {status}")]
    Download { url: String, status: u16 },

    #[error("Image file not found: {path}")]
    FileNotFound { path: String },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Image decode error: {0}")]
    ImageDecode(String),

    #[error("Image conversion error: {0}")]
    ImageConversion(String),

    #[error("Image encode error: {0}")]
    ImageEncode(String),

    #[error("HTML rewrite error: {0}")]
    Html(String),

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl WeChatError {
    /// Creates a configuration error.
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an API error for `operation` embedding the raw response.
    pub fn api(operation: &'static str, response: impl ToString) -> Self {
        Self::Api {
            operation,
            response: response.to_string(),
        }
    }

    /// Returns true when the error carries a response body from the platform.
    pub fn is_api_error(&self) -> bool {
        matches!(
            self,
            Self::Auth { .. } | Self::Api { .. } | Self::InvalidResponse { .. }
        )
    }

    /// Returns the raw upstream response, if any.
    pub fn response(&self) -> Option<&str> {
        match self {
            Self::Auth { response } | Self::Api { response, .. } => Some(response),
            Self::InvalidResponse { body, .. } => Some(body),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for WeChatError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network {
            message: err.to_string(),
        }
    }
}

impl From<url::ParseError> for WeChatError {
    fn from(err: url::ParseError) -> Self {
        Self::config_error(format!("invalid URL: {err}"))
    }
}

impl From<lol_html::errors::RewritingError> for WeChatError {
    fn from(err: lol_html::errors::RewritingError) -> Self {
        Self::Html(err.to_string())
    }
}
