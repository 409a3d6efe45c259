use chrono::Utc;
use tracing::{info, warn};

use super::{RenameStrategy, UploadManager, UploadOutcome, UploadRequest};
use crate::error::Result;
use crate::history::History;

/// Result of [`publish`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    /// Where the file lives.
    pub outcome: UploadOutcome,
    /// Name the file was uploaded under.
    pub file_name: String,
    /// The URL came from history; nothing was uploaded.
    pub reused: bool,
}

/// Upload a file, consulting and updating the history when one is given.
///
/// With `dedupe` set, a file whose contents were uploaded before returns the
/// recorded URL without any network request. History write failures are
/// logged and do not fail the upload.
///
/// # Errors
///
/// Returns the history lookup error, or the upload error when every
/// provider fails.
pub async fn publish(
    manager: &UploadManager,
    history: Option<&History>,
    request: UploadRequest,
    rename: RenameStrategy,
    dedupe: bool,
) -> Result<Published> {
    let content_hash = request.content_hash();

    let previous = match history {
        Some(history) if dedupe => history.find_by_hash(&content_hash)?,
        _ => None,
    };
    if let Some(record) = previous {
        info!(url = %record.url, file = %request.file_name, "Reusing previous upload");
        return Ok(Published {
            outcome: record.to_outcome(),
            file_name: record.file_name,
            reused: true,
        });
    }

    let request = request.renamed(rename, Utc::now());
    let outcome = manager.upload(&request).await?;

    if let Some(history) = history {
        if let Err(e) = history.record(&outcome, &request.file_name, &content_hash) {
            warn!(error = %e, "Failed to record upload in history");
        }
    }

    Ok(Published {
        outcome,
        file_name: request.file_name,
        reused: false,
    })
}
