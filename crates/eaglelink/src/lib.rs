//! `eaglelink` - Eagle asset library links and cloud image uploads for notes
//!
//! This library talks to the local API of the Eagle asset manager to search
//! and link assets, and uploads images to cloud hosts (imgur, SM.MS, GitHub,
//! Cloudinary, or a custom endpoint) with provider failover and an upload
//! history for deduplication.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod eagle;
pub mod error;
pub mod filter;
pub mod format;
pub mod history;
pub mod link;
pub mod logging;
pub mod paste;
pub mod upload;

pub use config::Config;
pub use eagle::{Asset, EagleClient};
pub use error::{Error, Result};
pub use filter::AssetFilter;
pub use history::{History, HistoryStats, UploadRecord};
pub use link::{LinkBuilder, LinkStyle, LinkTarget};
pub use logging::init_logging;
pub use upload::{ProviderKind, UploadManager, UploadOutcome, UploadRequest};
