//! wechat-draft: publish Markdown or HTML files as a WeChat draft.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use wechat_draft_rs::config::{DEFAULT_BASE_URL, DEFAULT_MAX_IMAGE_BYTES, DEFAULT_TOKEN_CACHE_PATH};
use wechat_draft_rs::markdown::is_markdown_file;
use wechat_draft_rs::upload::base_dir_of;
use wechat_draft_rs::{Article, Config, ContentType, WeChatClient, WeChatError};

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Sdk(#[from] WeChatError),
    #[error("failed to read input file {path}: {source}")]
    InputFile {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("failed to install tracing subscriber: {0}")]
    Telemetry(String),
}

#[derive(Debug, Parser)]
#[command(
    name = "wechat-draft",
    version,
    about = "Publish articles as WeChat Official Account drafts"
)]
struct Cli {
    /// Official Account app id.
    #[arg(long, env = "WECHAT_APP_ID")]
    app_id: String,

    /// Official Account app secret.
    #[arg(long, env = "WECHAT_APP_SECRET", hide_env_values = true)]
    app_secret: String,

    #[arg(long, env = "WECHAT_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// File holding the cached access token.
    #[arg(long, env = "WECHAT_TOKEN_CACHE_PATH", default_value = DEFAULT_TOKEN_CACHE_PATH)]
    token_cache: PathBuf,

    /// Size ceiling for uploaded images, in bytes.
    #[arg(long, env = "WECHAT_MAX_IMAGE_BYTES", default_value_t = DEFAULT_MAX_IMAGE_BYTES)]
    max_image_bytes: usize,

    #[arg(long, env = "WECHAT_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Upload images and create one draft from the given files.
    Publish(PublishArgs),
}

#[derive(Debug, Args)]
struct PublishArgs {
    /// Markdown (.md, .markdown) or HTML files, one article each.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Directory relative image paths are resolved against
    /// (defaults to the directory of the first file).
    #[arg(long)]
    base_dir: Option<PathBuf>,

    /// Article title; only allowed with a single file. Defaults to the file stem.
    #[arg(long)]
    title: Option<String>,

    #[arg(long, default_value = "")]
    author: String,

    /// Existing permanent media id to use as cover.
    #[arg(long)]
    thumb_media_id: Option<String>,
}

impl Cli {
    fn config(&self) -> Config {
        let mut config = Config::new(&self.app_id, &self.app_secret)
            .with_base_url(&self.base_url)
            .with_token_cache_path(&self.token_cache)
            .with_max_image_bytes(self.max_image_bytes);
        if let Some(secs) = self.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        config
    }
}

fn init_tracing() -> Result<(), CliError> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init()
        .map_err(|err| CliError::Telemetry(err.to_string()))
}

fn content_type_of(path: &Path) -> ContentType {
    if is_markdown_file(path) {
        ContentType::Markdown
    } else {
        ContentType::Html
    }
}

fn default_title(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Untitled".to_string())
}

async fn load_articles(args: &PublishArgs) -> Result<Vec<Article>, CliError> {
    if args.title.is_some() && args.files.len() > 1 {
        return Err(CliError::InvalidInput(
            "--title can only be used with a single file".to_string(),
        ));
    }

    let mut articles = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| CliError::InputFile {
                    path: path.display().to_string(),
                    source,
                })?;
        let title = args.title.clone().unwrap_or_else(|| default_title(path));
        let mut article =
            Article::new(title, content, content_type_of(path)).author(args.author.clone());
        if let Some(id) = &args.thumb_media_id {
            article = article.thumb_media_id(id.clone());
        }
        articles.push(article);
    }
    Ok(articles)
}

async fn publish(client: &WeChatClient, args: PublishArgs) -> Result<(), CliError> {
    let articles = load_articles(&args).await?;
    let base_dir = match &args.base_dir {
        Some(dir) => dir.clone(),
        None => base_dir_of(&args.files[0]).to_path_buf(),
    };
    let media_id = client.create_draft_from_articles(&articles, &base_dir).await?;
    println!("{media_id}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    init_tracing()?;

    let client = WeChatClient::from_config(cli.config())?;
    match cli.command {
        Commands::Publish(args) => publish(&client, args).await?,
    }

    Ok(())
}
