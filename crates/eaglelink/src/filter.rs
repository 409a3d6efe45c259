//! Client-side asset filtering and fuzzy ranking.
//!
//! Eagle's own list endpoint only narrows by a few fields, so the rest of the
//! search runs here as a linear predicate scan over the fetched items,
//! followed by an optional fuzzy ranking on names and tags.

use tracing::trace;

use crate::eagle::Asset;
use crate::format::{normalize_extension, normalize_tag};

/// Predicates an asset must satisfy.
///
/// Empty fields are ignored. Extensions and folders are any-of, tags are
/// all-of.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetFilter {
    /// Case-insensitive substring over name, annotation and tags.
    pub keyword: Option<String>,
    /// Allowed extensions.
    pub extensions: Vec<String>,
    /// Tags that must all be present.
    pub tags: Vec<String>,
    /// Folder ids, any of which must contain the asset.
    pub folders: Vec<String>,
    /// Minimum size in bytes.
    pub min_size: Option<u64>,
    /// Maximum size in bytes.
    pub max_size: Option<u64>,
    /// Minimum pixel width.
    pub min_width: Option<u32>,
    /// Minimum pixel height.
    pub min_height: Option<u32>,
    /// Keep items that are in the trash.
    pub include_deleted: bool,
}

impl AssetFilter {
    /// Create an empty filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the keyword.
    #[must_use]
    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    /// Add allowed extensions.
    #[must_use]
    pub fn extensions<I, S>(mut self, exts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions
            .extend(exts.into_iter().map(|e| normalize_extension(e.as_ref())));
        self
    }

    /// Add required tags.
    #[must_use]
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags
            .extend(tags.into_iter().filter_map(|t| normalize_tag(t.as_ref())));
        self
    }

    /// Add folder ids.
    #[must_use]
    pub fn folders<I, S>(mut self, folders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.folders.extend(folders.into_iter().map(Into::into));
        self
    }

    /// Whether the filter would accept everything that is not deleted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keyword.as_deref().map_or(true, |k| k.trim().is_empty())
            && self.extensions.is_empty()
            && self.tags.is_empty()
            && self.folders.is_empty()
            && self.min_size.is_none()
            && self.max_size.is_none()
            && self.min_width.is_none()
            && self.min_height.is_none()
    }

    /// Check a single asset.
    #[must_use]
    pub fn matches(&self, asset: &Asset) -> bool {
        if asset.is_deleted && !self.include_deleted {
            return false;
        }

        if !self.extensions.is_empty() {
            let ext = asset.extension();
            if !self
                .extensions
                .iter()
                .any(|wanted| normalize_extension(wanted) == ext)
            {
                return false;
            }
        }

        if !self.tags.is_empty() {
            let asset_tags: Vec<String> =
                asset.tags.iter().filter_map(|t| normalize_tag(t)).collect();
            let all_present = self.tags.iter().all(|wanted| {
                normalize_tag(wanted).map_or(true, |wanted| asset_tags.contains(&wanted))
            });
            if !all_present {
                return false;
            }
        }

        if !self.folders.is_empty() && !self.folders.iter().any(|f| asset.folders.contains(f)) {
            return false;
        }

        if self.min_size.is_some_and(|min| asset.size < min)
            || self.max_size.is_some_and(|max| asset.size > max)
            || self.min_width.is_some_and(|min| asset.width < min)
            || self.min_height.is_some_and(|min| asset.height < min)
        {
            return false;
        }

        if let Some(keyword) = self.keyword.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
            let needle = keyword.to_lowercase();
            let hit = asset.name.to_lowercase().contains(&needle)
                || asset.annotation.to_lowercase().contains(&needle)
                || asset.tags.iter().any(|t| t.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }

        true
    }

    /// Keep the assets that match, in their original order.
    #[must_use]
    pub fn apply(&self, assets: Vec<Asset>) -> Vec<Asset> {
        let before = assets.len();
        let kept: Vec<Asset> = assets.into_iter().filter(|a| self.matches(a)).collect();
        trace!(before, after = kept.len(), "Applied asset filter");
        kept
    }
}

const SCORE_MATCH: i64 = 16;
const BONUS_CONSECUTIVE: i64 = 24;
const BONUS_BOUNDARY: i64 = 32;
const BONUS_FIRST_CHAR: i64 = 16;
const PENALTY_GAP: i64 = 2;

/// Score how well `query` matches `candidate` as a subsequence.
///
/// Returns `None` when the query's characters do not all appear, in order,
/// in the candidate. Matching is case-insensitive; whitespace in the query
/// is ignored. An empty query scores 0.
#[must_use]
pub fn fuzzy_score(query: &str, candidate: &str) -> Option<i64> {
    let needle: Vec<char> = query
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();
    if needle.is_empty() {
        return Some(0);
    }

    let hay: Vec<char> = candidate.chars().flat_map(char::to_lowercase).collect();
    let mut score = 0;
    let mut next = 0;
    let mut last_match: Option<usize> = None;

    for (i, ch) in hay.iter().enumerate() {
        if next == needle.len() {
            break;
        }
        if *ch != needle[next] {
            continue;
        }

        score += SCORE_MATCH;
        if i == 0 {
            score += BONUS_FIRST_CHAR;
        }
        let at_boundary = i == 0 || !hay[i - 1].is_alphanumeric();
        if at_boundary {
            score += BONUS_BOUNDARY;
        }
        match last_match {
            Some(prev) if prev + 1 == i => score += BONUS_CONSECUTIVE,
            Some(prev) => score -= PENALTY_GAP * i64::try_from(i - prev - 1).unwrap_or(i64::MAX / 4),
            None => {}
        }
        last_match = Some(i);
        next += 1;
    }

    if next == needle.len() {
        Some(score)
    } else {
        None
    }
}

fn best_score(query: &str, asset: &Asset) -> Option<i64> {
    let name = fuzzy_score(query, &asset.name);
    // Tag hits count, but a name hit always wins over an equal tag hit
    let tag = asset
        .tags
        .iter()
        .filter_map(|t| fuzzy_score(query, t))
        .max()
        .map(|s| s - 1);
    name.into_iter().chain(tag).max()
}

/// Rank assets by fuzzy match against their names and tags.
///
/// Non-matching assets are dropped. Ties are broken by name.
#[must_use]
pub fn rank(query: &str, assets: Vec<Asset>) -> Vec<Asset> {
    let mut scored: Vec<(i64, Asset)> = assets
        .into_iter()
        .filter_map(|asset| best_score(query, &asset).map(|score| (score, asset)))
        .collect();
    scored.sort_by(|(sa, a), (sb, b)| sb.cmp(sa).then_with(|| a.name.cmp(&b.name)));
    scored.into_iter().map(|(_, asset)| asset).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(id: &str, name: &str, ext: &str) -> Asset {
        Asset {
            id: id.to_string(),
            name: name.to_string(),
            ext: ext.to_string(),
            ..Asset::default()
        }
    }

    fn library() -> Vec<Asset> {
        vec![
            Asset {
                size: 2_000,
                width: 64,
                height: 64,
                tags: vec!["UI".to_string(), "Icons".to_string()],
                folders: vec!["F-ICONS".to_string()],
                ..asset("1", "close-button", "svg")
            },
            Asset {
                size: 3_500_000,
                width: 4000,
                height: 3000,
                tags: vec!["Travel".to_string()],
                annotation: "Shot on the coast road".to_string(),
                folders: vec!["F-PHOTOS".to_string()],
                ..asset("2", "Sunset Beach", "JPG")
            },
            Asset {
                size: 120_000,
                tags: vec!["Docs".to_string()],
                ..asset("3", "brand guide", "pdf")
            },
            Asset {
                is_deleted: true,
                tags: vec!["UI".to_string()],
                ..asset("4", "old-button", "png")
            },
        ]
    }

    fn ids(assets: &[Asset]) -> Vec<&str> {
        assets.iter().map(|a| a.id.as_str()).collect()
    }

    #[test]
    fn test_empty_filter_drops_only_deleted() {
        let filter = AssetFilter::new();
        assert!(filter.is_empty());
        assert_eq!(ids(&filter.apply(library())), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_include_deleted() {
        let filter = AssetFilter {
            include_deleted: true,
            ..AssetFilter::default()
        };
        assert_eq!(filter.apply(library()).len(), 4);
    }

    #[test]
    fn test_extension_filter_is_case_insensitive() {
        let filter = AssetFilter::new().extensions([".jpg", "SVG"]);
        assert_eq!(ids(&filter.apply(library())), vec!["1", "2"]);
    }

    #[test]
    fn test_tags_are_all_of() {
        let filter = AssetFilter::new().tags(["#ui", "icons"]);
        assert_eq!(ids(&filter.apply(library())), vec!["1"]);

        let filter = AssetFilter::new().tags(["ui", "travel"]);
        assert!(filter.apply(library()).is_empty());
    }

    #[test]
    fn test_folders_are_any_of() {
        let filter = AssetFilter::new().folders(["F-PHOTOS", "F-OTHER"]);
        assert_eq!(ids(&filter.apply(library())), vec!["2"]);
    }

    #[test]
    fn test_size_bounds() {
        let filter = AssetFilter {
            min_size: Some(100_000),
            max_size: Some(1_000_000),
            ..AssetFilter::default()
        };
        assert_eq!(ids(&filter.apply(library())), vec!["3"]);
    }

    #[test]
    fn test_dimension_bounds() {
        let filter = AssetFilter {
            min_width: Some(1920),
            min_height: Some(1080),
            ..AssetFilter::default()
        };
        assert_eq!(ids(&filter.apply(library())), vec!["2"]);
    }

    #[test]
    fn test_keyword_searches_name_annotation_and_tags() {
        assert_eq!(
            ids(&AssetFilter::new().keyword("BEACH").apply(library())),
            vec!["2"]
        );
        assert_eq!(
            ids(&AssetFilter::new().keyword("coast").apply(library())),
            vec!["2"]
        );
        assert_eq!(
            ids(&AssetFilter::new().keyword("docs").apply(library())),
            vec!["3"]
        );
    }

    #[test]
    fn test_blank_keyword_is_ignored() {
        let filter = AssetFilter::new().keyword("   ");
        assert!(filter.is_empty());
        assert_eq!(filter.apply(library()).len(), 3);
    }

    #[test]
    fn test_combined_filters() {
        let filter = AssetFilter::new()
            .keyword("button")
            .extensions(["svg", "png"])
            .tags(["ui"]);
        assert_eq!(ids(&filter.apply(library())), vec!["1"]);
    }

    #[test]
    fn test_fuzzy_score_subsequence() {
        assert!(fuzzy_score("cb", "close-button").is_some());
        assert!(fuzzy_score("snst", "Sunset Beach").is_some());
        assert!(fuzzy_score("xyz", "close-button").is_none());
        assert!(fuzzy_score("nottcloser", "close").is_none());
    }

    #[test]
    fn test_fuzzy_score_empty_query() {
        assert_eq!(fuzzy_score("", "anything"), Some(0));
        assert_eq!(fuzzy_score("   ", "anything"), Some(0));
    }

    #[test]
    fn test_fuzzy_score_prefers_contiguous_and_boundaries() {
        let contiguous = fuzzy_score("sun", "sunset").unwrap();
        let scattered = fuzzy_score("sun", "s-u-n").unwrap();
        assert!(contiguous > fuzzy_score("sun", "xsxuxn").unwrap());

        let boundary = fuzzy_score("cb", "close button").unwrap();
        let inner = fuzzy_score("cb", "scab").unwrap();
        assert!(boundary > inner);
        assert!(scattered > 0);
    }

    #[test]
    fn test_fuzzy_score_ignores_case_and_query_spaces() {
        assert_eq!(fuzzy_score("Sun Set", "sunset"), fuzzy_score("sunset", "SUNSET"));
    }

    #[test]
    fn test_rank_orders_by_score_then_name() {
        let assets = vec![
            asset("a", "button-large", "png"),
            asset("b", "rebuttoned", "png"),
            asset("c", "button", "png"),
            asset("d", "unrelated", "png"),
        ];
        let ranked = rank("button", assets);
        // "button" and "button-large" score the same; name breaks the tie
        assert_eq!(ids(&ranked), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_rank_matches_tags() {
        let mut tagged = asset("t", "IMG_0042", "jpg");
        tagged.tags = vec!["mountains".to_string()];
        let ranked = rank("mount", vec![asset("x", "lake", "jpg"), tagged]);
        assert_eq!(ids(&ranked), vec!["t"]);
    }

    #[test]
    fn test_rank_empty_query_keeps_all_sorted_by_name() {
        let ranked = rank("", vec![asset("2", "zeta", "png"), asset("1", "alpha", "png")]);
        assert_eq!(ids(&ranked), vec!["1", "2"]);
    }
}
