//! Image upload and draft creation.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::auth::TokenManager;
use crate::error::Result;
use crate::http::{require_str, MediaFile, WeChatHttpClient};
use crate::media::{compress_image, ImageSource, OUTPUT_MIME};

const UPLOAD_IMAGE_PATH: &str = "/cgi-bin/media/uploadimg";
const ADD_MATERIAL_PATH: &str = "/cgi-bin/material/add_material";
const DRAFT_ADD_PATH: &str = "/cgi-bin/draft/add";

/// Markup of an article's `content`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Html,
    Markdown,
}

/// An article supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    #[serde(default)]
    pub author: String,
    pub content: String,
    #[serde(rename = "type", default)]
    pub content_type: ContentType,
    /// Permanent media id of the cover. When absent the first image is used.
    #[serde(default)]
    pub thumb_media_id: Option<String>,
}

impl Article {
    /// Creates an HTML article.
    pub fn html(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(title, content, ContentType::Html)
    }

    /// Creates a Markdown article.
    pub fn markdown(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(title, content, ContentType::Markdown)
    }

    /// Creates an article with an explicit content type.
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        content_type: ContentType,
    ) -> Self {
        Self {
            title: title.into(),
            author: String::new(),
            content: content.into(),
            content_type,
            thumb_media_id: None,
        }
    }

    /// Sets the author.
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Sets an existing cover media id.
    pub fn thumb_media_id(mut self, media_id: impl Into<String>) -> Self {
        self.thumb_media_id = Some(media_id.into());
        self
    }
}

/// One entry of the `draft/add` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftArticle {
    pub title: String,
    pub author: String,
    pub digest: String,
    pub content: String,
    /// Empty string when there is no cover; the API rejects null.
    pub thumb_media_id: String,
    pub show_cover_pic: u8,
    pub need_open_comment: u8,
    pub only_fans_can_comment: u8,
}

impl DraftArticle {
    /// Builds a draft entry; a missing cover becomes an empty `thumb_media_id`.
    pub fn new(
        title: impl Into<String>,
        author: impl Into<String>,
        content: impl Into<String>,
        thumb_media_id: Option<String>,
    ) -> Self {
        let thumb_media_id = thumb_media_id.unwrap_or_default();
        let show_cover_pic = u8::from(!thumb_media_id.is_empty());
        Self {
            title: title.into(),
            author: author.into(),
            digest: String::new(),
            content: content.into(),
            thumb_media_id,
            show_cover_pic,
            need_open_comment: 0,
            only_fans_can_comment: 0,
        }
    }
}

/// Body of the `draft/add` request.
#[derive(Debug, Clone, Serialize)]
pub struct DraftRequest<'a> {
    pub articles: &'a [DraftArticle],
}

/// Uploads images after compressing them.
#[derive(Debug, Clone)]
pub struct ImageUploader {
    http_client: Arc<WeChatHttpClient>,
    token_manager: Arc<TokenManager>,
    max_image_bytes: usize,
}

impl ImageUploader {
    /// Creates an uploader that compresses images to `max_image_bytes`.
    pub fn new(
        http_client: Arc<WeChatHttpClient>,
        token_manager: Arc<TokenManager>,
        max_image_bytes: usize,
    ) -> Self {
        Self {
            http_client,
            token_manager,
            max_image_bytes,
        }
    }

    /// Uploads an image for use inside article content and returns its URL.
    pub async fn upload_content_image(&self, source: &ImageSource) -> Result<String> {
        let file = self.prepare(source).await?;
        let access_token = self.token_manager.get_access_token().await?;
        let payload = self
            .http_client
            .post_media(
                UPLOAD_IMAGE_PATH,
                &[("access_token", access_token.as_str())],
                file,
            )
            .await?;
        let url = require_str(&payload, "url", "Upload image")?;
        debug!("Uploaded {} -> {}", source, url);
        Ok(url)
    }

    /// Uploads an image as permanent material and returns its media id.
    pub async fn upload_cover_material(&self, source: &ImageSource) -> Result<String> {
        let file = self.prepare(source).await?.with_mime(OUTPUT_MIME);
        let access_token = self.token_manager.get_access_token().await?;
        let payload = self
            .http_client
            .post_media(
                ADD_MATERIAL_PATH,
                &[("access_token", access_token.as_str()), ("type", "image")],
                file,
            )
            .await?;
        let media_id = require_str(&payload, "media_id", "Upload cover")?;
        info!("Uploaded cover {} as material {}", source, media_id);
        Ok(media_id)
    }

    async fn prepare(&self, source: &ImageSource) -> Result<MediaFile> {
        let original = source.load(&self.http_client).await?;
        let compressed = compress_image(&original, self.max_image_bytes)?;
        debug!(
            "Prepared {}: {} -> {} bytes",
            source,
            original.len(),
            compressed.data.len()
        );
        Ok(MediaFile::new(source.filename(), compressed.data))
    }
}

/// Submits drafts.
#[derive(Debug, Clone)]
pub struct DraftManager {
    http_client: Arc<WeChatHttpClient>,
    token_manager: Arc<TokenManager>,
}

impl DraftManager {
    /// Creates a draft manager sharing the client's HTTP and token state.
    pub fn new(http_client: Arc<WeChatHttpClient>, token_manager: Arc<TokenManager>) -> Self {
        Self {
            http_client,
            token_manager,
        }
    }

    /// Creates one draft containing `articles` and returns its media id.
    pub async fn create_draft(&self, articles: &[DraftArticle]) -> Result<String> {
        let access_token = self.token_manager.get_access_token().await?;
        let payload = self
            .http_client
            .post_json_with_token(DRAFT_ADD_PATH, &access_token, &DraftRequest { articles })
            .await?;
        require_str(&payload, "media_id", "Create draft")
    }
}

/// Directory that relative image paths of a file are resolved against.
pub fn base_dir_of(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}
