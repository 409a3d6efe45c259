//! Error types for eaglelink.
//!
//! This module defines all error types used throughout the eaglelink crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

use crate::upload::ProviderKind;

/// The main error type for eaglelink operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Eagle API Errors ===
    /// The Eagle API answered with an error envelope or a non-success status.
    #[error("Eagle API error on {endpoint}: {message}")]
    EagleApi {
        /// The API endpoint that was called.
        endpoint: String,
        /// Message reported by Eagle (or the HTTP status).
        message: String,
    },

    /// The requested asset does not exist in the library.
    #[error("asset not found: {0}")]
    AssetNotFound(String),

    // === Upload Errors ===
    /// A single provider rejected or failed an upload.
    #[error("upload to {provider} failed: {message}")]
    Upload {
        /// The provider that failed.
        provider: ProviderKind,
        /// Description of what went wrong.
        message: String,
    },

    /// Every provider in the failover order failed.
    #[error("all upload providers failed: {}", format_attempts(.attempts))]
    AllProvidersFailed {
        /// Each provider that was tried, with its failure message.
        attempts: Vec<(ProviderKind, String)>,
    },

    /// No upload provider is configured.
    #[error("no upload provider configured; set upload.default_provider")]
    NoProviderConfigured,

    /// A provider was requested but its credentials are missing.
    #[error("upload provider '{0}' is not configured")]
    ProviderNotConfigured(ProviderKind),

    // === History Errors ===
    /// Failed to open or create the history database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Input Errors ===
    /// A path could not be turned into a link target.
    #[error("invalid path {path}: {message}")]
    InvalidPath {
        /// The offending path.
        path: PathBuf,
        /// Why it was rejected.
        message: String,
    },

    /// Clipboard access failed or held no image.
    #[error("clipboard error: {0}")]
    Clipboard(String),

    // === Transport Errors ===
    /// An HTTP request could not be completed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A URL could not be parsed.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for eaglelink operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

fn format_attempts(attempts: &[(ProviderKind, String)]) -> String {
    attempts
        .iter()
        .map(|(kind, message)| format!("{kind}: {message}"))
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Create a new Eagle API error.
    #[must_use]
    pub fn eagle_api(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EagleApi {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Create a new provider upload error.
    #[must_use]
    pub fn upload(provider: ProviderKind, message: impl Into<String>) -> Self {
        Self::Upload {
            provider,
            message: message.into(),
        }
    }

    /// Create a new invalid path error.
    #[must_use]
    pub fn invalid_path(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new clipboard error.
    #[must_use]
    pub fn clipboard(message: impl Into<String>) -> Self {
        Self::Clipboard(message.into())
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a configuration validation error.
    #[must_use]
    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    /// Check if this error means the Eagle app (or a host) could not be reached.
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        match self {
            Self::Http(err) => err.is_connect() || err.is_timeout(),
            _ => false,
        }
    }

    /// Check if this error is a missing asset.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::AssetNotFound(_))
    }
}
