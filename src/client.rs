//! Main WeChat client implementation.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::auth::{TokenInfo, TokenManager};
use crate::config::Config;
use crate::error::Result;
use crate::html;
use crate::http::WeChatHttpClient;
use crate::markdown;
use crate::media::ImageSource;
use crate::upload::{Article, ContentType, DraftArticle, DraftManager, ImageUploader};

/// Main WeChat Official Account client.
#[derive(Debug)]
pub struct WeChatClient {
    config: Config,
    http_client: Arc<WeChatHttpClient>,
    token_manager: Arc<TokenManager>,
    image_uploader: ImageUploader,
    draft_manager: DraftManager,
}

impl WeChatClient {
    /// Creates a client with app credentials and default settings.
    pub fn new(app_id: impl Into<String>, app_secret: impl Into<String>) -> Result<Self> {
        Self::from_config(Config::new(app_id, app_secret))
    }

    /// Creates a client from a full configuration.
    pub fn from_config(config: Config) -> Result<Self> {
        config.validate()?;

        let http_client = Arc::new(WeChatHttpClient::new(&config.base_url, config.timeout)?);

        let token_manager = Arc::new(TokenManager::new(
            config.app_id.clone(),
            config.app_secret.clone(),
            config.token_cache_path.clone(),
            Arc::clone(&http_client),
        ));

        let image_uploader = ImageUploader::new(
            Arc::clone(&http_client),
            Arc::clone(&token_manager),
            config.max_image_bytes,
        );

        let draft_manager = DraftManager::new(Arc::clone(&http_client), Arc::clone(&token_manager));

        Ok(Self {
            config,
            http_client,
            token_manager,
            image_uploader,
            draft_manager,
        })
    }

    /// Publishes `articles` as a single draft and returns its media id.
    ///
    /// For every article this:
    /// 1. Converts Markdown content to HTML
    /// 2. Uploads each referenced image (remote URLs are downloaded, other
    ///    paths are read relative to `base_dir`) and points `<img src>` at
    ///    the hosted copy
    /// 3. Uploads the first image as the cover when no `thumb_media_id` is set
    ///
    /// All articles are then submitted in one `draft/add` request. The first
    /// failure aborts the whole call.
    pub async fn create_draft_from_articles(
        &self,
        articles: &[Article],
        base_dir: impl AsRef<Path>,
    ) -> Result<String> {
        let base_dir = base_dir.as_ref();
        info!("Creating draft with {} article(s)", articles.len());

        let mut drafts = Vec::with_capacity(articles.len());
        for article in articles {
            drafts.push(self.prepare_article(article, base_dir).await?);
        }

        let media_id = self.draft_manager.create_draft(&drafts).await?;
        info!("Successfully created draft with ID: {media_id}");
        Ok(media_id)
    }

    /// Uploads a single image (local path or URL) and returns the hosted URL.
    pub async fn upload_image(&self, path_or_url: &str) -> Result<String> {
        let source = ImageSource::resolve(path_or_url, Path::new(""));
        self.image_uploader.upload_content_image(&source).await
    }

    /// Uploads a single image as permanent material and returns its media id.
    pub async fn upload_cover_material(&self, path_or_url: &str) -> Result<String> {
        let source = ImageSource::resolve(path_or_url, Path::new(""));
        self.image_uploader.upload_cover_material(&source).await
    }

    /// Returns a valid access token, using the cache when possible.
    pub async fn get_access_token(&self) -> Result<String> {
        self.token_manager.get_access_token().await
    }

    /// Forces a token refresh.
    pub async fn refresh_token(&self) -> Result<String> {
        self.token_manager.force_refresh().await
    }

    /// Gets access token information for debugging.
    pub async fn get_token_info(&self) -> Option<TokenInfo> {
        self.token_manager.get_token_info().await
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Gets the underlying HTTP client for advanced usage.
    pub fn http_client(&self) -> &WeChatHttpClient {
        &self.http_client
    }

    async fn prepare_article(&self, article: &Article, base_dir: &Path) -> Result<DraftArticle> {
        let content = match article.content_type {
            ContentType::Markdown => markdown::to_html(&article.content),
            ContentType::Html => article.content.clone(),
        };

        let sources = html::extract_image_sources(&content)?;
        debug!("Found {} images in \"{}\"", sources.len(), article.title);

        let mut hosted = HashMap::with_capacity(sources.len());
        for src in &sources {
            let source = ImageSource::from_html_src(src, base_dir);
            let url = self.image_uploader.upload_content_image(&source).await?;
            hosted.insert(src.clone(), url);
        }
        let content = html::replace_image_sources(&content, &hosted)?;

        let thumb_media_id = match article.thumb_media_id.as_deref().filter(|id| !id.is_empty()) {
            Some(id) => Some(id.to_string()),
            None => match sources.first() {
                Some(first) => {
                    let cover = ImageSource::from_html_src(first, base_dir);
                    Some(self.image_uploader.upload_cover_material(&cover).await?)
                }
                None => None,
            },
        };

        Ok(DraftArticle::new(
            article.title.clone(),
            article.author.clone(),
            content,
            thumb_media_id,
        ))
    }
}
