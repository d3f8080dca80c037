//! Image loading and compression.
//!
//! WeChat rejects oversized images, so everything that gets uploaded is
//! re-encoded as JPEG and pushed under a byte ceiling by [`compress_image`]:
//! quality 85, then 75, then a resize at 75, then the resized image at 50.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, RgbImage};
use percent_encoding::percent_decode_str;
use tracing::{debug, warn};

use crate::error::{Result, WeChatError};
use crate::http::WeChatHttpClient;

/// MIME type of every image produced by [`compress_image`].
pub const OUTPUT_MIME: &str = "image/jpeg";

const DEFAULT_FILENAME: &str = "image.jpg";
const INITIAL_QUALITY: u8 = 85;
const REDUCED_QUALITY: u8 = 75;
const FINAL_QUALITY: u8 = 50;

/// One JPEG encoding made while compressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeAttempt {
    /// JPEG quality used for this encoding.
    pub quality: u8,
    pub width: u32,
    pub height: u32,
    /// Encoded size in bytes.
    pub size: usize,
}

/// Result of [`compress_image`].
#[derive(Debug, Clone)]
pub struct CompressedImage {
    pub data: Vec<u8>,
    /// Every encoding in the order it was tried.
    pub attempts: Vec<EncodeAttempt>,
    /// True when the original bytes were returned unmodified.
    pub passthrough: bool,
}

/// Re-encodes `original` as JPEG no larger than `max_size` bytes (best effort).
///
/// An opaque JPEG that already fits and is no larger than its quality-85
/// re-encode is returned unchanged. If decoding or re-encoding fails but the
/// original already fits under `max_size`, the original bytes are returned
/// unchanged as well.
pub fn compress_image(original: &[u8], max_size: usize) -> Result<CompressedImage> {
    match encode_within_limit(original, max_size) {
        Ok(compressed) => Ok(compressed),
        Err(e) if original.len() <= max_size => {
            warn!(
                "Image normalization failed ({e}); uploading original {} bytes",
                original.len()
            );
            Ok(CompressedImage {
                data: original.to_vec(),
                attempts: Vec::new(),
                passthrough: true,
            })
        }
        Err(e) => Err(e),
    }
}

fn encode_within_limit(original: &[u8], max_size: usize) -> Result<CompressedImage> {
    let decoded =
        image::load_from_memory(original).map_err(|e| WeChatError::ImageDecode(e.to_string()))?;
    let opaque = !decoded.color().has_alpha();
    let rgb = flatten_to_rgb(decoded)?;
    let mut attempts = Vec::new();

    let mut data = encode_jpeg(&rgb, INITIAL_QUALITY, &mut attempts)?;
    if opaque
        && original.len() <= max_size
        && original.len() <= data.len()
        && image::guess_format(original).ok() == Some(ImageFormat::Jpeg)
    {
        debug!(
            "Keeping original {} byte JPEG (re-encode was {} bytes)",
            original.len(),
            data.len()
        );
        return Ok(CompressedImage {
            data: original.to_vec(),
            attempts,
            passthrough: true,
        });
    }
    if data.len() > max_size {
        data = encode_jpeg(&rgb, REDUCED_QUALITY, &mut attempts)?;
    }
    if data.len() > max_size {
        let ratio = (max_size as f64 / data.len() as f64).sqrt();
        let (width, height) = scaled_dimensions(rgb.width(), rgb.height(), ratio);
        debug!(
            "Resizing {}x{} -> {}x{} to fit {} bytes",
            rgb.width(),
            rgb.height(),
            width,
            height,
            max_size
        );
        let resized = image::imageops::resize(&rgb, width, height, FilterType::Lanczos3);
        data = encode_jpeg(&resized, REDUCED_QUALITY, &mut attempts)?;
        if data.len() > max_size {
            data = encode_jpeg(&resized, FINAL_QUALITY, &mut attempts)?;
        }
    }

    debug!(
        "Compressed image {} -> {} bytes in {} attempt(s)",
        original.len(),
        data.len(),
        attempts.len()
    );
    Ok(CompressedImage {
        data,
        attempts,
        passthrough: false,
    })
}

/// Scales both dimensions by `ratio`, never returning zero.
pub fn scaled_dimensions(width: u32, height: u32, ratio: f64) -> (u32, u32) {
    let scale = |d: u32| ((d as f64 * ratio).floor() as u32).max(1);
    (scale(width), scale(height))
}

/// Drops any alpha channel by compositing onto white and converts to 8-bit RGB.
fn flatten_to_rgb(img: DynamicImage) -> Result<RgbImage> {
    if !img.color().has_alpha() {
        return Ok(img.to_rgb8());
    }

    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut raw = Vec::with_capacity(width as usize * height as usize * 3);
    for pixel in rgba.pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = u16::from(a);
        for channel in [r, g, b] {
            let blended = (u16::from(channel) * alpha + 255 * (255 - alpha) + 127) / 255;
            raw.push(blended as u8);
        }
    }
    RgbImage::from_raw(width, height, raw).ok_or_else(|| {
        WeChatError::ImageConversion(format!(
            "pixel buffer does not match {width}x{height} RGB image"
        ))
    })
}

fn encode_jpeg(
    img: &RgbImage,
    quality: u8,
    attempts: &mut Vec<EncodeAttempt>,
) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode_image(img)
        .map_err(|e| WeChatError::ImageEncode(e.to_string()))?;
    attempts.push(EncodeAttempt {
        quality,
        width: img.width(),
        height: img.height(),
        size: out.len(),
    });
    Ok(out)
}

/// Where an image reference points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Remote(String),
    Local(PathBuf),
}

impl ImageSource {
    /// Classifies `src`: `http(s)://` is remote, anything else is a path
    /// relative to `base_dir` (absolute paths are kept as-is).
    pub fn resolve(src: &str, base_dir: &Path) -> Self {
        if src.starts_with("http://") || src.starts_with("https://") {
            Self::Remote(src.to_string())
        } else {
            Self::Local(base_dir.join(src))
        }
    }

    /// Upload filename: the source basename with a `.jpg` extension.
    pub fn filename(&self) -> String {
        let name = match self {
            Self::Remote(url) => url::Url::parse(url)
                .ok()
                .and_then(|u| {
                    u.path_segments()
                        .and_then(|mut segments| segments.next_back().map(str::to_string))
                })
                .unwrap_or_default(),
            Self::Local(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        jpg_filename(&name)
    }

    /// Classifies an `<img src>` attribute value as written in HTML.
    ///
    /// Character references are decoded first. Local paths are then
    /// percent-decoded, since Markdown renderers escape non-ASCII and spaces
    /// in link targets.
    pub fn from_html_src(src: &str, base_dir: &Path) -> Self {
        let unescaped = html_escape::decode_html_entities(src);
        match Self::resolve(&unescaped, base_dir) {
            Self::Local(_) => {
                let path = percent_decode_str(&unescaped).decode_utf8_lossy();
                Self::Local(base_dir.join(&*path))
            }
            remote => remote,
        }
    }

    /// Reads the raw bytes, downloading remote images.
    pub async fn load(&self, http_client: &WeChatHttpClient) -> Result<Vec<u8>> {
        match self {
            Self::Remote(url) => download_image(http_client, url).await,
            Self::Local(path) => tokio::fs::read(path).await.map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    WeChatError::FileNotFound {
                        path: path.display().to_string(),
                    }
                } else {
                    WeChatError::Io {
                        path: path.display().to_string(),
                        source: e,
                    }
                }
            }),
        }
    }
}

impl std::fmt::Display for ImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Remote(url) => f.write_str(url),
            Self::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Downloads a remote image; any non-success status is an error.
pub async fn download_image(http_client: &WeChatHttpClient, url: &str) -> Result<Vec<u8>> {
    let (status, body) = http_client.download(url).await?;
    if !(200..300).contains(&status) {
        return Err(WeChatError::Download {
            url: url.to_string(),
            status,
        });
    }
    debug!("Downloaded {} bytes from {}", body.len(), url);
    Ok(body)
}

fn jpg_filename(name: &str) -> String {
    match Path::new(name).file_stem().map(|s| s.to_string_lossy()) {
        Some(stem) if !stem.is_empty() && name.contains('.') => format!("{stem}.jpg"),
        _ => DEFAULT_FILENAME.to_string(),
    }
}
