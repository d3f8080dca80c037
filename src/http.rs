//! HTTP plumbing for the WeChat API.
//!
//! [`WeChatHttpClient`] owns the `reqwest` client and the API base URL. All
//! responses are read as raw JSON so callers can pick out the field they
//! expect and report the whole payload when it is missing.

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, Url};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::error::{Result, WeChatError};

const USER_AGENT: &str = concat!("wechat-draft-rs/", env!("CARGO_PKG_VERSION"));
const JSON_UTF8: &str = "application/json; charset=utf-8";

/// Thin wrapper over `reqwest::Client` bound to an API base URL.
#[derive(Debug, Clone)]
pub struct WeChatHttpClient {
    client: Client,
    base_url: Url,
}

impl WeChatHttpClient {
    /// Creates a client for `base_url`, e.g. `https://api.weixin.qq.com`.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;
        let base_url = Url::parse(base_url)?;
        Ok(Self { client, base_url })
    }

    /// Returns the configured base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Builds an absolute API URL from a path and query pairs.
    pub fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url> {
        let mut url = self.base_url.join(path)?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Sends a GET to an API path and returns the JSON body.
    pub async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        let url = self.url(path, query)?;
        debug!("GET {}", url.path());
        let response = self.client.get(url).send().await?;
        Self::read_json(response).await
    }

    /// Posts `body` as UTF-8 JSON (non-ASCII kept verbatim) with an access token.
    pub async fn post_json_with_token<T: Serialize + ?Sized>(
        &self,
        path: &str,
        access_token: &str,
        body: &T,
    ) -> Result<Value> {
        let url = self.url(path, &[("access_token", access_token)])?;
        let payload = serde_json::to_vec(body)?;
        debug!("POST {} ({} bytes of JSON)", url.path(), payload.len());
        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, JSON_UTF8)
            .body(payload)
            .send()
            .await?;
        Self::read_json(response).await
    }

    /// Uploads a file as the multipart field `media`.
    pub async fn post_media(
        &self,
        path: &str,
        query: &[(&str, &str)],
        file: MediaFile,
    ) -> Result<Value> {
        let url = self.url(path, query)?;
        debug!(
            "POST {} (multipart {}, {} bytes)",
            url.path(),
            file.filename,
            file.data.len()
        );
        let mut part = Part::bytes(file.data).file_name(file.filename);
        if let Some(mime) = file.mime {
            part = part.mime_str(mime)?;
        }
        let form = Form::new().part("media", part);
        let response = self.client.post(url).multipart(form).send().await?;
        Self::read_json(response).await
    }

    /// Fetches an arbitrary absolute URL and returns the status and body.
    pub async fn download(&self, url: &str) -> Result<(u16, Vec<u8>)> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await?;
        Ok((status, bytes.to_vec()))
    }

    async fn read_json(response: Response) -> Result<Value> {
        let status = response.status().as_u16();
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            debug!("Response (HTTP {status}) is not JSON: {e}");
            WeChatError::InvalidResponse {
                status,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            }
        })
    }
}

/// A file ready to be sent as a multipart upload.
#[derive(Debug, Clone)]
pub struct MediaFile {
    pub filename: String,
    pub data: Vec<u8>,
    /// Declared MIME type; omitted from the part when `None`.
    pub mime: Option<&'static str>,
}

impl MediaFile {
    /// Creates a file part with no declared MIME type.
    pub fn new(filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            data,
            mime: None,
        }
    }

    /// Sets the declared MIME type.
    pub fn with_mime(mut self, mime: &'static str) -> Self {
        self.mime = Some(mime);
        self
    }
}

/// Returns the string field `field` of `payload`, or an API error embedding
/// the whole payload.
pub fn require_str(payload: &Value, field: &str, operation: &'static str) -> Result<String> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| WeChatError::api(operation, payload))
}
