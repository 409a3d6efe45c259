//! Clipboard image capture.

use chrono::{DateTime, Utc};
use clipboard_rs::common::RustImage;
use clipboard_rs::{Clipboard, ClipboardContext, ContentFormat};
use tracing::debug;

use crate::error::{Error, Result};

/// Read the image on the system clipboard as PNG bytes.
///
/// This blocks on the platform clipboard; call it from a blocking task in
/// async code.
///
/// # Errors
///
/// Returns [`Error::Clipboard`] if the clipboard cannot be opened or holds
/// no image.
pub fn read_clipboard_image() -> Result<Vec<u8>> {
    let ctx = ClipboardContext::new().map_err(|e| Error::clipboard(e.to_string()))?;

    if !ctx.has(ContentFormat::Image) {
        return Err(Error::clipboard("clipboard does not contain an image"));
    }

    let image = ctx
        .get_image()
        .map_err(|e| Error::clipboard(format!("failed to read image: {e}")))?;
    let png = image
        .to_png()
        .map_err(|e| Error::clipboard(format!("failed to encode image as PNG: {e}")))?;

    let bytes = png.get_bytes().to_vec();
    debug!(len = bytes.len(), "Read clipboard image");
    Ok(bytes)
}

/// File name for a pasted image.
///
/// `{date}` becomes `YYYYMMDD-HHMMSS` and `{hash}` the first 12 hex chars of
/// the BLAKE3 hash. `.png` is appended unless already present.
#[must_use]
pub fn paste_file_name(template: &str, bytes: &[u8], now: DateTime<Utc>) -> String {
    let mut name = template.trim().to_string();
    if name.is_empty() {
        name = "pasted-{date}".to_string();
    }

    if name.contains("{date}") {
        name = name.replace("{date}", &now.format("%Y%m%d-%H%M%S").to_string());
    }
    if name.contains("{hash}") {
        let hash = blake3::hash(bytes).to_hex();
        name = name.replace("{hash}", &hash.as_str()[..12]);
    }

    if !name.to_ascii_lowercase().ends_with(".png") {
        name.push_str(".png");
    }
    name
}
