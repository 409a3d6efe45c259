//! String helpers for presenting asset metadata.
//!
//! Everything here is pure: file sizes, tags, dimensions and extensions are
//! normalized the same way whether they end up in a terminal table or in
//! a note.

const SIZE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Format a byte count using 1024-based units.
///
/// Values below one kilobyte print as whole bytes, anything larger gets one
/// decimal place.
///
/// ```
/// use eaglelink::format::format_file_size;
///
/// assert_eq!(format_file_size(512), "512 B");
/// assert_eq!(format_file_size(1536), "1.5 KB");
/// ```
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_file_size(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{bytes} B");
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", SIZE_UNITS[unit])
}

/// Normalize a single tag into note-friendly form.
///
/// Leading `#` marks are stripped, whitespace runs become `-`, characters
/// outside alphanumerics and `-_/` are dropped and the result is lowercased.
/// Returns `None` when nothing is left.
#[must_use]
pub fn normalize_tag(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_start_matches('#');

    let mut out = String::with_capacity(trimmed.len());
    let mut pending_dash = false;
    for ch in trimmed.chars() {
        if ch.is_whitespace() {
            pending_dash = !out.is_empty();
            continue;
        }
        if !(ch.is_alphanumeric() || matches!(ch, '-' | '_' | '/')) {
            continue;
        }
        if pending_dash {
            out.push('-');
            pending_dash = false;
        }
        out.extend(ch.to_lowercase());
    }

    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

/// Normalize a list of tags, dropping empties and duplicates.
///
/// First occurrence wins, so the original ordering is kept.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = Vec::new();
    for tag in tags {
        if let Some(normalized) = normalize_tag(tag.as_ref()) {
            if !seen.contains(&normalized) {
                seen.push(normalized);
            }
        }
    }
    seen
}

/// Render tags as inline hashtags (`#a #b`).
pub fn format_tags<I, S>(tags: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    normalize_tags(tags)
        .iter()
        .map(|tag| format!("#{tag}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Format pixel dimensions as `WxH`.
#[must_use]
pub fn format_dimensions(width: u32, height: u32) -> Option<String> {
    if width == 0 || height == 0 {
        None
    } else {
        Some(format!("{width}x{height}"))
    }
}

/// Normalize a file extension: no leading dot, lowercase.
#[must_use]
pub fn normalize_extension(raw: &str) -> String {
    raw.trim().trim_start_matches('.').to_lowercase()
}
