//! Cloud image uploads.
//!
//! This module provides one [`Uploader`] per supported image host and an
//! [`UploadManager`] that tries them in the configured failover order:
//!
//! - **imgur**: anonymous upload with an application client id.
//! - **smms**: SM.MS with an API token.
//! - **github**: commit the file into a repository via the contents API.
//! - **cloudinary**: unsigned (preset) or signed upload.
//! - **custom**: any endpoint taking a multipart upload and answering JSON.
//!
//! Each provider issues exactly one HTTP request per upload. There is no
//! retry; a failed provider hands over to the next one in line.
//!
//! # Example
//!
//! ```no_run
//! use eaglelink::upload::{UploadManager, UploadRequest};
//! use eaglelink::Config;
//!
//! # async fn run() -> eaglelink::Result<()> {
//! let config = Config::load()?;
//! let manager = UploadManager::from_config(&config.upload)?;
//! let request = UploadRequest::from_path("screenshot.png".as_ref()).await?;
//! let outcome = manager.upload(&request).await?;
//! println!("{}", outcome.url);
//! # Ok(())
//! # }
//! ```

mod cloudinary;
mod custom;
mod github;
mod imgur;
mod manager;
mod publish;
mod smms;

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::multipart::Part;
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

pub use cloudinary::CloudinaryUploader;
pub use custom::CustomUploader;
pub use github::GithubUploader;
pub use imgur::ImgurUploader;
pub use manager::UploadManager;
pub use publish::{publish, Published};
pub use smms::SmmsUploader;

/// The supported image hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// imgur.com
    Imgur,
    /// sm.ms
    Smms,
    /// A GitHub repository.
    Github,
    /// Cloudinary.
    Cloudinary,
    /// A user-defined HTTP endpoint.
    Custom,
}

impl ProviderKind {
    /// Every provider, in display order.
    pub const ALL: [ProviderKind; 5] = [
        Self::Imgur,
        Self::Smms,
        Self::Github,
        Self::Cloudinary,
        Self::Custom,
    ];
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(match self {
            Self::Imgur => "imgur",
            Self::Smms => "smms",
            Self::Github => "github",
            Self::Cloudinary => "cloudinary",
            Self::Custom => "custom",
        })
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::config_validation(format!("unknown upload provider: {s}")))
    }
}

/// How uploaded files are named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenameStrategy {
    /// Keep the original file name.
    #[default]
    Keep,
    /// `<first 16 hex chars of the BLAKE3 hash>.<ext>`
    Hash,
    /// `YYYYMMDD-HHMMSS-<name>`
    Timestamp,
}

impl RenameStrategy {
    /// Produce the upload name for a file.
    #[must_use]
    pub fn apply(self, file_name: &str, content_hash: &str, now: DateTime<Utc>) -> String {
        match self {
            Self::Keep => file_name.to_string(),
            Self::Hash => {
                let short = &content_hash[..content_hash.len().min(16)];
                match extension_of(file_name) {
                    Some(ext) => format!("{short}.{ext}"),
                    None => short.to_string(),
                }
            }
            Self::Timestamp => format!("{}-{file_name}", now.format("%Y%m%d-%H%M%S")),
        }
    }
}

fn extension_of(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

/// Guess a MIME type from a file name.
#[must_use]
pub fn mime_for(file_name: &str) -> &'static str {
    match extension_of(file_name).as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("bmp") => "image/bmp",
        Some("avif") => "image/avif",
        Some("tif" | "tiff") => "image/tiff",
        Some("ico") => "image/x-icon",
        Some("heic") => "image/heic",
        _ => "application/octet-stream",
    }
}

/// A file about to be uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    /// File contents.
    pub bytes: Vec<u8>,
    /// Name sent to the provider.
    pub file_name: String,
    /// MIME type sent to the provider.
    pub mime: String,
}

impl UploadRequest {
    /// Build a request from in-memory bytes.
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>, file_name: impl Into<String>) -> Self {
        let file_name = file_name.into();
        let mime = mime_for(&file_name).to_string();
        Self {
            bytes,
            file_name,
            mime,
        }
    }

    /// Read a file from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or has no file name.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| Error::invalid_path(path, "path has no file name"))?;
        let bytes = tokio::fs::read(path).await?;
        Ok(Self::from_bytes(bytes, file_name))
    }

    /// BLAKE3 hash of the contents, hex encoded.
    #[must_use]
    pub fn content_hash(&self) -> String {
        blake3::hash(&self.bytes).to_hex().to_string()
    }

    /// Apply a naming strategy.
    #[must_use]
    pub fn renamed(mut self, strategy: RenameStrategy, now: DateTime<Utc>) -> Self {
        self.file_name = strategy.apply(&self.file_name, &self.content_hash(), now);
        self
    }

    fn part(&self) -> Result<Part> {
        Ok(Part::bytes(self.bytes.clone())
            .file_name(self.file_name.clone())
            .mime_str(&self.mime)?)
    }
}

/// A completed upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadOutcome {
    /// Provider that accepted the file.
    pub provider: ProviderKind,
    /// Public URL of the file.
    pub url: String,
    /// URL (or token) that deletes the file, when the provider offers one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_url: Option<String>,
}

/// An image host.
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Which provider this is.
    fn kind(&self) -> ProviderKind;

    /// Upload one file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Upload`] when the provider rejects the file, or a
    /// transport error.
    async fn upload(&self, request: &UploadRequest) -> Result<UploadOutcome>;
}

/// Read a provider response as JSON, keeping the status for the caller.
async fn response_json(kind: ProviderKind, response: Response) -> Result<(StatusCode, Value)> {
    let status = response.status();
    let body = response.text().await?;
    tracing::trace!(provider = %kind, %status, body_len = body.len(), "Provider response");
    match serde_json::from_str(&body) {
        Ok(value) => Ok((status, value)),
        Err(_) => Err(Error::upload(
            kind,
            format!("HTTP {status}: {}", snippet(&body)),
        )),
    }
}

fn snippet(body: &str) -> String {
    const MAX: usize = 200;
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(MAX).collect();
        format!("{cut}...")
    }
}

/// Look up a dot-separated path (`data.items.0.url`) in a JSON value.
///
/// Numeric segments index into arrays.
#[must_use]
pub fn json_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(value, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

fn json_str<'a>(value: &'a Value, path: &str) -> Option<&'a str> {
    json_path(value, path).and_then(Value::as_str)
}

fn required(value: Option<&String>, kind: ProviderKind) -> Result<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(String::from)
        .ok_or(Error::ProviderNotConfigured(kind))
}
