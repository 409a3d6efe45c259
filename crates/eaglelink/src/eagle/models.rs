//! Wire models for the Eagle local API.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::filter::AssetFilter;
use crate::format::{format_dimensions, format_file_size, normalize_extension};

/// Response envelope shared by every Eagle endpoint.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Envelope<T> {
    pub status: String,
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

/// A single item in the Eagle library.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Asset {
    /// Eagle item id.
    pub id: String,
    /// Display name, without extension.
    pub name: String,
    /// File extension, without the dot.
    pub ext: String,
    /// File size in bytes.
    pub size: u64,
    /// Pixel width (0 for non-images).
    pub width: u32,
    /// Pixel height (0 for non-images).
    pub height: u32,
    /// Tags attached to the item.
    pub tags: Vec<String>,
    /// Ids of folders containing the item.
    pub folders: Vec<String>,
    /// Source URL the item was saved from, if any.
    pub url: String,
    /// Free-form note.
    pub annotation: String,
    /// Last modification, in milliseconds since the epoch.
    pub modification_time: i64,
    /// Whether the item sits in the trash.
    pub is_deleted: bool,
}

impl Asset {
    /// File name including extension.
    #[must_use]
    pub fn file_name(&self) -> String {
        if self.ext.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.name, self.ext)
        }
    }

    /// Normalized extension.
    #[must_use]
    pub fn extension(&self) -> String {
        normalize_extension(&self.ext)
    }

    /// Human-readable size.
    #[must_use]
    pub fn display_size(&self) -> String {
        format_file_size(self.size)
    }

    /// `WxH`, when the item has pixel dimensions.
    #[must_use]
    pub fn dimensions(&self) -> Option<String> {
        format_dimensions(self.width, self.height)
    }

    /// Location of the original file inside a library.
    ///
    /// Eagle stores every item as `images/<id>.info/<name>.<ext>`.
    #[must_use]
    pub fn file_path(&self, library_root: &Path) -> PathBuf {
        library_root
            .join("images")
            .join(format!("{}.info", self.id))
            .join(self.file_name())
    }
}

/// A folder, possibly with nested children.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Folder {
    /// Folder id.
    pub id: String,
    /// Folder name.
    pub name: String,
    /// Folder description.
    pub description: String,
    /// Nested folders.
    pub children: Vec<Folder>,
    /// Number of items, when reported.
    pub image_count: Option<u64>,
}

impl Folder {
    /// Flatten this folder tree into `(path, id)` pairs, parents first.
    #[must_use]
    pub fn flatten(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        self.flatten_into("", &mut out);
        out
    }

    fn flatten_into(&self, prefix: &str, out: &mut Vec<(String, String)>) {
        let path = if prefix.is_empty() {
            self.name.clone()
        } else {
            format!("{prefix}/{}", self.name)
        };
        out.push((path.clone(), self.id.clone()));
        for child in &self.children {
            child.flatten_into(&path, out);
        }
    }
}

/// Flatten a list of top-level folders.
#[must_use]
pub fn flatten_folders(folders: &[Folder]) -> Vec<(String, String)> {
    folders.iter().flat_map(Folder::flatten).collect()
}

/// Resolve a folder reference (id or path) against a folder tree.
///
/// Names compare case-insensitively so `--folder design/icons` works.
#[must_use]
pub fn resolve_folder_id(folders: &[Folder], reference: &str) -> Option<String> {
    flatten_folders(folders)
        .into_iter()
        .find(|(path, id)| id == reference || path.eq_ignore_ascii_case(reference))
        .map(|(_, id)| id)
}

/// Library location as reported by Eagle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryLocation {
    /// Library name.
    pub name: String,
    /// Absolute path to the `.library` directory.
    pub path: PathBuf,
}

/// `GET /api/library/info` payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryInfo {
    /// Top-level folders.
    pub folders: Vec<Folder>,
    /// Where the library lives.
    pub library: LibraryLocation,
}

/// `GET /api/application/info` payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplicationInfo {
    /// Eagle version.
    pub version: String,
    /// Build number.
    pub build_version: String,
    /// Host platform (`darwin`, `win32`).
    pub platform: String,
}

/// An asset with its thumbnail, fetched together.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetDetail {
    /// The asset metadata.
    pub asset: Asset,
    /// Path to the thumbnail file, if Eagle has one.
    pub thumbnail: Option<PathBuf>,
}

/// Query parameters for `GET /api/item/list`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// Maximum number of items.
    pub limit: Option<usize>,
    /// Page offset.
    pub offset: Option<usize>,
    /// Sort key, e.g. `CREATEDATE` or `-FILESIZE`.
    pub order_by: Option<String>,
    /// Server-side keyword filter.
    pub keyword: Option<String>,
    /// Extension filter.
    pub ext: Option<String>,
    /// Tags the item must carry.
    pub tags: Vec<String>,
    /// Folder ids to search in.
    pub folders: Vec<String>,
}

impl ListQuery {
    /// Build a query with only a limit set.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    /// The server-side part of a client-side filter, in pages of `page_size`.
    ///
    /// A single extension and the folder ids are pushed down. Tags are not:
    /// Eagle compares them as stored, while [`AssetFilter`] normalizes them.
    #[must_use]
    pub fn for_filter(filter: &AssetFilter, page_size: usize) -> Self {
        let mut query = Self::with_limit(page_size);
        if let [ext] = filter.extensions.as_slice() {
            query.ext = Some(normalize_extension(ext));
        }
        query.folders.clone_from(&filter.folders);
        query
    }

    /// Convert to query-string pairs, skipping empty fields.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset", offset.to_string()));
        }
        let optional = [
            ("orderBy", &self.order_by),
            ("keyword", &self.keyword),
            ("ext", &self.ext),
        ];
        for (key, value) in optional {
            if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                pairs.push((key, value.to_string()));
            }
        }
        if !self.tags.is_empty() {
            pairs.push(("tags", self.tags.join(",")));
        }
        if !self.folders.is_empty() {
            pairs.push(("folders", self.folders.join(",")));
        }
        pairs
    }
}
