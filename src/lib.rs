//! # WeChat Official Account draft SDK
//!
//! Publishes articles to a WeChat Official Account as drafts. Images referenced
//! by an article are uploaded to WeChat (remote images are downloaded first),
//! compressed to fit the platform's size limit, and the article HTML is
//! rewritten to point at the hosted copies.
//!
//! ## Architecture
//!
//! - [`WeChatClient`] - Main entry point tying the pieces together
//! - [`auth`] - Access token management with an on-disk cache
//! - [`media`] - Image loading and JPEG compression
//! - [`upload`] - Image upload and draft creation
//! - [`markdown`] / [`html`] - Markdown rendering and `<img>` rewriting
//! - [`error`] - The [`WeChatError`] type
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use wechat_draft_rs::{Article, Result, WeChatClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = WeChatClient::new("your_app_id", "your_app_secret")?;
//!
//!     let article = Article::markdown("Title", "# Hello\n\n![cover](images/cover.png)")
//!         .author("Author");
//!
//!     // Relative image paths are resolved against the base directory
//!     let media_id = client.create_draft_from_articles(&[article], "./posts").await?;
//!     println!("Draft created with ID: {}", media_id);
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Every failure is a [`WeChatError`]. Errors caused by an unexpected API
//! response carry the raw response:
//!
//! ```rust,no_run
//! use wechat_draft_rs::{Article, WeChatClient, WeChatError};
//!
//! # #[tokio::main]
//! # async fn main() -> wechat_draft_rs::Result<()> {
//! let client = WeChatClient::new("app_id", "app_secret")?;
//!
//! match client.create_draft_from_articles(&[Article::html("T", "<p>hi</p>")], ".").await {
//!     Ok(media_id) => println!("Success: {}", media_id),
//!     Err(WeChatError::FileNotFound { path }) => eprintln!("Missing image: {}", path),
//!     Err(err) if err.is_api_error() => eprintln!("API rejected request: {}", err),
//!     Err(err) => eprintln!("Other error: {}", err),
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod html;
pub mod http;
pub mod markdown;
pub mod media;
pub mod upload;

// Re-export main types for convenience
pub use client::WeChatClient;
pub use config::Config;
pub use error::{Result, WeChatError};
pub use media::{compress_image, CompressedImage};
pub use upload::{Article, ContentType, DraftArticle};
