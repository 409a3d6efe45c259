//! Configuration management for eaglelink.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::link::LinkStyle;
use crate::upload::{ProviderKind, RenameStrategy};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "eaglelink";

/// Default history database file name.
const DATABASE_FILE_NAME: &str = "uploads.db";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `EAGLELINK_`, sections split by `__`)
/// 2. TOML config file at `~/.config/eaglelink/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Eagle connection settings.
    pub eagle: EagleConfig,
    /// Link rendering settings.
    pub link: LinkConfig,
    /// Cloud upload settings.
    pub upload: UploadConfig,
    /// Upload history settings.
    pub history: HistoryConfig,
}

/// How to reach the Eagle app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EagleConfig {
    /// Base URL of the local API.
    pub base_url: String,
    /// API token, for Eagle builds that require one.
    pub token: Option<String>,
    /// Library directory. Asked from Eagle when unset.
    pub library_path: Option<PathBuf>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Default number of items fetched for a search.
    pub search_limit: usize,
}

/// How links are rendered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Output style.
    pub style: LinkStyle,
    /// Link the thumbnail instead of the original file.
    pub use_thumbnail: bool,
    /// Display width for embedded images.
    pub image_width: Option<u32>,
    /// Append the asset's tags as hashtags.
    pub include_tags: bool,
}

/// Cloud upload settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Provider tried first.
    pub default_provider: Option<ProviderKind>,
    /// Providers tried, in order, when the default fails.
    pub fallback: Vec<ProviderKind>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// How uploaded files are named.
    pub rename: RenameStrategy,
    /// Reuse the URL of a previous upload with identical content.
    pub dedupe: bool,
    /// File name template for clipboard images (`{date}`, `{hash}`).
    pub paste_name: String,
    /// Imgur credentials.
    pub imgur: ImgurConfig,
    /// SM.MS credentials.
    pub smms: SmmsConfig,
    /// GitHub repository settings.
    pub github: GithubConfig,
    /// Cloudinary settings.
    pub cloudinary: CloudinaryConfig,
    /// Generic HTTP endpoint settings.
    pub custom: CustomConfig,
}

/// Imgur anonymous upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImgurConfig {
    /// Application client id.
    pub client_id: Option<String>,
    /// Upload endpoint.
    pub endpoint: String,
}

/// SM.MS upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmmsConfig {
    /// API token.
    pub token: Option<String>,
    /// Upload endpoint.
    pub endpoint: String,
}

/// Upload into a GitHub repository via the contents API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    /// Personal access token.
    pub token: Option<String>,
    /// Repository owner.
    pub owner: Option<String>,
    /// Repository name.
    pub repo: Option<String>,
    /// Target branch.
    pub branch: String,
    /// Directory inside the repository.
    pub path: String,
    /// Public URL template (`{owner}`, `{repo}`, `{branch}`, `{path}`).
    pub custom_url: Option<String>,
    /// Commit message; `{file}` is replaced by the file name.
    pub message: String,
    /// API base URL.
    pub api_url: String,
}

/// Cloudinary upload, unsigned (preset) or signed (key + secret).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudinaryConfig {
    /// Cloud name.
    pub cloud_name: Option<String>,
    /// Unsigned upload preset.
    pub upload_preset: Option<String>,
    /// API key for signed uploads.
    pub api_key: Option<String>,
    /// API secret for signed uploads.
    pub api_secret: Option<String>,
    /// Target folder.
    pub folder: Option<String>,
    /// API base URL.
    pub api_url: String,
}

/// Any HTTP endpoint accepting a multipart upload and answering JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomConfig {
    /// Upload URL.
    pub url: Option<String>,
    /// Multipart field carrying the file.
    pub field_name: String,
    /// Extra request headers.
    pub headers: BTreeMap<String, String>,
    /// Extra form fields.
    pub form: BTreeMap<String, String>,
    /// Dot path to the URL in the JSON response.
    pub url_path: String,
}

/// Upload history settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Record uploads.
    pub enabled: bool,
    /// Path to the database file.
    /// Defaults to `~/.local/share/eaglelink/uploads.db`
    pub database_path: Option<PathBuf>,
    /// Maximum age of records in days.
    /// Set to 0 for unlimited.
    pub max_age_days: u32,
}

impl Default for EagleConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:41595".to_string(),
            token: None,
            library_path: None,
            timeout_secs: 10,
            search_limit: 200,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            default_provider: None,
            fallback: Vec::new(),
            timeout_secs: 30,
            rename: RenameStrategy::default(),
            dedupe: true,
            paste_name: "pasted-{date}".to_string(),
            imgur: ImgurConfig::default(),
            smms: SmmsConfig::default(),
            github: GithubConfig::default(),
            cloudinary: CloudinaryConfig::default(),
            custom: CustomConfig::default(),
        }
    }
}

impl Default for ImgurConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            endpoint: "https://api.imgur.com/3/image".to_string(),
        }
    }
}

impl Default for SmmsConfig {
    fn default() -> Self {
        Self {
            token: None,
            endpoint: "https://sm.ms/api/v2/upload".to_string(),
        }
    }
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            token: None,
            owner: None,
            repo: None,
            branch: "main".to_string(),
            path: "images".to_string(),
            custom_url: None,
            message: "Upload {file}".to_string(),
            api_url: "https://api.github.com".to_string(),
        }
    }
}

impl Default for CloudinaryConfig {
    fn default() -> Self {
        Self {
            cloud_name: None,
            upload_preset: None,
            api_key: None,
            api_secret: None,
            folder: None,
            api_url: "https://api.cloudinary.com".to_string(),
        }
    }
}

impl Default for CustomConfig {
    fn default() -> Self {
        Self {
            url: None,
            field_name: "file".to_string(),
            headers: BTreeMap::new(),
            form: BTreeMap::new(),
            url_path: "data.url".to_string(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            database_path: None, // Will be resolved to default at runtime
            max_age_days: 0,
        }
    }
}

/// Stand-in for credentials in printed configuration.
const REDACTED: &str = "********";

fn redact(value: &mut Option<String>) {
    if is_set(value.as_ref()) {
        *value = Some(REDACTED.to_string());
    }
}

fn is_set(value: Option<&String>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

impl UploadConfig {
    /// Whether credentials for `kind` are present.
    #[must_use]
    pub fn is_configured(&self, kind: ProviderKind) -> bool {
        match kind {
            ProviderKind::Imgur => is_set(self.imgur.client_id.as_ref()),
            ProviderKind::Smms => is_set(self.smms.token.as_ref()),
            ProviderKind::Github => {
                is_set(self.github.token.as_ref())
                    && is_set(self.github.owner.as_ref())
                    && is_set(self.github.repo.as_ref())
            }
            ProviderKind::Cloudinary => {
                let c = &self.cloudinary;
                is_set(c.cloud_name.as_ref())
                    && (is_set(c.upload_preset.as_ref())
                        || (is_set(c.api_key.as_ref()) && is_set(c.api_secret.as_ref())))
            }
            ProviderKind::Custom => is_set(self.custom.url.as_ref()),
        }
    }

    /// Default provider followed by fallbacks, without duplicates.
    #[must_use]
    pub fn provider_order(&self) -> Vec<ProviderKind> {
        let mut order = Vec::new();
        for kind in self.default_provider.iter().chain(self.fallback.iter()) {
            if !order.contains(kind) {
                order.push(*kind);
            }
        }
        order
    }

    /// The request timeout as a Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `EAGLELINK_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("EAGLELINK_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if url::Url::parse(&self.eagle.base_url).is_err() {
            return Err(Error::config_validation(format!(
                "eagle.base_url is not a valid URL: {}",
                self.eagle.base_url
            )));
        }

        if self.eagle.timeout_secs == 0 {
            return Err(Error::config_validation(
                "eagle.timeout_secs must be greater than 0",
            ));
        }

        if self.upload.timeout_secs == 0 {
            return Err(Error::config_validation(
                "upload.timeout_secs must be greater than 0",
            ));
        }

        // Every provider in the failover order needs credentials
        for kind in self.upload.provider_order() {
            if !self.upload.is_configured(kind) {
                return Err(Error::config_validation(format!(
                    "upload provider '{kind}' is selected but not configured"
                )));
            }
        }

        if let Some(custom_url) = &self.upload.custom.url {
            if url::Url::parse(custom_url).is_err() {
                return Err(Error::config_validation(format!(
                    "upload.custom.url is not a valid URL: {custom_url}"
                )));
            }
        }

        if self.upload.custom.field_name.trim().is_empty() {
            return Err(Error::config_validation(
                "upload.custom.field_name must not be empty",
            ));
        }

        Ok(())
    }

    /// A copy that is safe to print.
    ///
    /// Tokens, client ids, API keys and secrets are masked, as are the values
    /// of custom headers and form fields.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        redact(&mut config.eagle.token);

        let upload = &mut config.upload;
        redact(&mut upload.imgur.client_id);
        redact(&mut upload.smms.token);
        redact(&mut upload.github.token);
        redact(&mut upload.cloudinary.api_key);
        redact(&mut upload.cloudinary.api_secret);
        for value in upload
            .custom
            .headers
            .values_mut()
            .chain(upload.custom.form.values_mut())
        {
            *value = REDACTED.to_string();
        }
        config
    }

    /// Get the history database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.history
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the max history age as a Duration.
    #[must_use]
    pub fn max_history_age(&self) -> Option<Duration> {
        if self.history.max_age_days == 0 {
            None
        } else {
            Some(Duration::from_secs(
                u64::from(self.history.max_age_days) * 24 * 60 * 60,
            ))
        }
    }

    /// Get the Eagle request timeout as a Duration.
    #[must_use]
    pub fn eagle_timeout(&self) -> Duration {
        Duration::from_secs(self.eagle.timeout_secs)
    }
}
