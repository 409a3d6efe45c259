//! Link and embed text for assets.
//!
//! A [`LinkBuilder`] turns an [`Asset`] plus a target (a local path or a
//! remote URL) into text that can be pasted into a note. The second half of
//! this module goes the other way: it finds local image embeds in a
//! markdown note so they can be uploaded and swapped for remote URLs.

use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::LinkConfig;
use crate::eagle::Asset;
use crate::error::{Error, Result};
use crate::format::{format_tags, normalize_extension};

const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "webp", "bmp", "svg", "avif", "tif", "tiff", "ico", "heic",
];

/// Output style for rendered links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStyle {
    /// `![name](file:///...)`
    #[default]
    Markdown,
    /// `![[path]]`
    Wiki,
    /// `<img src="...">`
    Html,
    /// `[name](eagle://item/<id>)`
    Eagle,
}

impl std::fmt::Display for LinkStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Markdown => write!(f, "markdown"),
            Self::Wiki => write!(f, "wiki"),
            Self::Html => write!(f, "html"),
            Self::Eagle => write!(f, "eagle"),
        }
    }
}

/// Where a link should point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    /// A file on disk; must be absolute.
    Path(PathBuf),
    /// An already-public URL.
    Url(String),
}

impl LinkTarget {
    /// The target as a URL, converting paths to `file://`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPath`] for relative paths.
    pub fn to_url(&self) -> Result<String> {
        match self {
            Self::Url(url) => Ok(url.clone()),
            Self::Path(path) => file_url(path),
        }
    }

    /// The target as written in a wiki embed.
    #[must_use]
    pub fn display(&self) -> String {
        match self {
            Self::Url(url) => url.clone(),
            Self::Path(path) => path.display().to_string(),
        }
    }
}

/// Convert an absolute path into a percent-encoded `file://` URL.
///
/// # Errors
///
/// Returns [`Error::InvalidPath`] when the path is relative.
pub fn file_url(path: &Path) -> Result<String> {
    Url::from_file_path(path)
        .map(String::from)
        .map_err(|()| Error::invalid_path(path, "path must be absolute"))
}

/// Whether an extension denotes something a note can display inline.
#[must_use]
pub fn is_image_ext(ext: &str) -> bool {
    IMAGE_EXTENSIONS.contains(&normalize_extension(ext).as_str())
}

/// Renders link text for assets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkBuilder {
    /// Output style.
    pub style: LinkStyle,
    /// Display width for images.
    pub image_width: Option<u32>,
    /// Append `#tags` after the link.
    pub include_tags: bool,
}

impl LinkBuilder {
    /// Create a builder for a style with no extras.
    #[must_use]
    pub fn new(style: LinkStyle) -> Self {
        Self {
            style,
            ..Self::default()
        }
    }

    /// Create a builder from the `[link]` configuration section.
    #[must_use]
    pub fn from_config(config: &LinkConfig) -> Self {
        Self {
            style: config.style,
            image_width: config.image_width,
            include_tags: config.include_tags,
        }
    }

    /// Render the link text for `asset` pointing at `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if a local target cannot be turned into a URL.
    pub fn render(&self, asset: &Asset, target: &LinkTarget) -> Result<String> {
        let image = is_image_ext(&asset.ext);
        let mut out = match self.style {
            LinkStyle::Markdown => self.markdown(asset, target, image)?,
            LinkStyle::Wiki => self.wiki(target, image),
            LinkStyle::Html => self.html(asset, target, image)?,
            LinkStyle::Eagle => format!(
                "[{}](eagle://item/{})",
                escape_markdown_text(&asset.name),
                asset.id
            ),
        };

        if self.include_tags {
            let tags = format_tags(&asset.tags);
            if !tags.is_empty() {
                out.push(' ');
                out.push_str(&tags);
            }
        }
        Ok(out)
    }

    fn markdown(&self, asset: &Asset, target: &LinkTarget, image: bool) -> Result<String> {
        let url = target.to_url()?;
        if image {
            let alt = escape_markdown_text(&asset.name);
            Ok(match self.image_width {
                Some(width) => format!("![{alt}|{width}]({url})"),
                None => format!("![{alt}]({url})"),
            })
        } else {
            Ok(format!(
                "[{}]({url})",
                escape_markdown_text(&asset.file_name())
            ))
        }
    }

    fn wiki(&self, target: &LinkTarget, image: bool) -> String {
        let location = target.display();
        match (image, self.image_width) {
            (true, Some(width)) => format!("![[{location}|{width}]]"),
            (true, None) => format!("![[{location}]]"),
            (false, _) => format!("[[{location}]]"),
        }
    }

    fn html(&self, asset: &Asset, target: &LinkTarget, image: bool) -> Result<String> {
        let url = escape_html(&target.to_url()?);
        if image {
            let alt = escape_html(&asset.name);
            Ok(match self.image_width {
                Some(width) => format!(r#"<img src="{url}" alt="{alt}" width="{width}">"#),
                None => format!(r#"<img src="{url}" alt="{alt}">"#),
            })
        } else {
            Ok(format!(
                r#"<a href="{url}">{}</a>"#,
                escape_html(&asset.file_name())
            ))
        }
    }
}

fn escape_markdown_text(text: &str) -> String {
    text.replace('[', "\\[").replace(']', "\\]")
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// A local image embed found in a note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// Alt text (empty for wiki embeds).
    pub alt: String,
    /// The embed target, as written.
    pub target: String,
    /// Size suffix of a wiki embed (`300` in `![[a.png|300]]`).
    pub size: Option<String>,
    /// Byte range of the whole embed in the note.
    pub span: Range<usize>,
}

impl ImageRef {
    /// Resolve the target against the note's directory.
    #[must_use]
    pub fn resolve(&self, note_dir: &Path) -> PathBuf {
        let decoded = urlencoding::decode(&self.target)
            .map_or_else(|_| self.target.clone(), |cow| cow.into_owned());
        let path = Path::new(&decoded);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            note_dir.join(path)
        }
    }
}

fn embed_regex() -> &'static Regex {
    static EMBED: OnceLock<Regex> = OnceLock::new();
    EMBED.get_or_init(|| {
        Regex::new(
            r#"!\[(?P<alt>[^\]]*)\]\((?:<(?P<angle>[^>]+)>|(?P<plain>[^)\s]+))(?:\s+"[^"]*")?\)|!\[\[(?P<wiki>[^\]|]+)(?:\|(?P<size>[^\]]*))?\]\]"#,
        )
        .expect("embed regex is valid")
    })
}

fn is_remote(target: &str) -> bool {
    let lower = target.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("data:")
}

fn has_image_ext(target: &str) -> bool {
    Path::new(target)
        .extension()
        .is_some_and(|ext| is_image_ext(&ext.to_string_lossy()))
}

/// Find image embeds in `markdown` that point at local image files.
///
/// Embeds of anything else (notes, PDFs) are left alone.
#[must_use]
pub fn find_local_images(markdown: &str) -> Vec<ImageRef> {
    embed_regex()
        .captures_iter(markdown)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let (alt, target, size) = if let Some(wiki) = caps.name("wiki") {
                let size = caps
                    .name("size")
                    .map(|m| m.as_str().trim().to_string())
                    .filter(|s| !s.is_empty());
                (String::new(), wiki.as_str().trim().to_string(), size)
            } else {
                let target = caps.name("angle").or_else(|| caps.name("plain"))?;
                (
                    caps.name("alt").map_or("", |m| m.as_str()).to_string(),
                    target.as_str().to_string(),
                    None,
                )
            };
            if is_remote(&target) || !has_image_ext(&target) {
                return None;
            }
            Some(ImageRef {
                alt,
                target,
                size,
                span: whole.range(),
            })
        })
        .collect()
}

/// Replace embeds with remote images.
///
/// A wiki embed's size moves into the alt text (`![[a.png|300]]` becomes
/// `![|300](url)`). Each replacement pairs an [`ImageRef`] from [`find_local_images`] on the
/// same text with the URL it was uploaded to.
#[must_use]
pub fn replace_images(markdown: &str, replacements: &[(ImageRef, String)]) -> String {
    let mut ordered: Vec<&(ImageRef, String)> = replacements.iter().collect();
    ordered.sort_by_key(|(image, _)| std::cmp::Reverse(image.span.start));

    let mut out = markdown.to_string();
    for (image, url) in ordered {
        let alt = match &image.size {
            Some(size) => format!("{}|{size}", image.alt),
            None => image.alt.clone(),
        };
        out.replace_range(image.span.clone(), &format!("![{alt}]({url})"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_asset() -> Asset {
        Asset {
            id: "KBKE04XLEAB5Q".to_string(),
            name: "sunset".to_string(),
            ext: "jpg".to_string(),
            tags: vec!["Beach".to_string(), "Warm Light".to_string()],
            ..Asset::default()
        }
    }

    fn doc_asset() -> Asset {
        Asset {
            id: "KBKE04XLEAB5R".to_string(),
            name: "brief".to_string(),
            ext: "pdf".to_string(),
            ..Asset::default()
        }
    }

    fn path_target() -> LinkTarget {
        LinkTarget::Path(PathBuf::from("/lib/images/KBKE04XLEAB5Q.info/sunset.jpg"))
    }

    #[test]
    fn test_is_image_ext() {
        assert!(is_image_ext("PNG"));
        assert!(is_image_ext(".webp"));
        assert!(!is_image_ext("pdf"));
        assert!(!is_image_ext(""));
    }

    #[test]
    fn test_link_style_display() {
        assert_eq!(LinkStyle::Markdown.to_string(), "markdown");
        assert_eq!(LinkStyle::Wiki.to_string(), "wiki");
        assert_eq!(LinkStyle::Html.to_string(), "html");
        assert_eq!(LinkStyle::Eagle.to_string(), "eagle");
    }

    #[test]
    fn test_file_url_encodes_spaces() {
        let url = file_url(Path::new("/lib/my images/a b.png")).unwrap();
        assert_eq!(url, "file:///lib/my%20images/a%20b.png");
    }

    #[test]
    fn test_file_url_rejects_relative() {
        let err = file_url(Path::new("images/a.png")).unwrap_err();
        assert!(matches!(err, Error::InvalidPath { .. }));
    }

    #[test]
    fn test_markdown_image() {
        let out = LinkBuilder::new(LinkStyle::Markdown)
            .render(&image_asset(), &path_target())
            .unwrap();
        assert_eq!(
            out,
            "![sunset](file:///lib/images/KBKE04XLEAB5Q.info/sunset.jpg)"
        );
    }

    #[test]
    fn test_markdown_image_with_width_and_tags() {
        let builder = LinkBuilder {
            style: LinkStyle::Markdown,
            image_width: Some(320),
            include_tags: true,
        };
        let out = builder
            .render(&image_asset(), &LinkTarget::Url("https://i.example.com/s.jpg".into()))
            .unwrap();
        assert_eq!(out, "![sunset|320](https://i.example.com/s.jpg) #beach #warm-light");
    }

    #[test]
    fn test_markdown_non_image() {
        let out = LinkBuilder::new(LinkStyle::Markdown)
            .render(&doc_asset(), &LinkTarget::Path(PathBuf::from("/lib/brief.pdf")))
            .unwrap();
        assert_eq!(out, "[brief.pdf](file:///lib/brief.pdf)");
    }

    #[test]
    fn test_markdown_escapes_brackets() {
        let mut asset = image_asset();
        asset.name = "draft [v2]".to_string();
        let out = LinkBuilder::new(LinkStyle::Markdown)
            .render(&asset, &LinkTarget::Url("https://x/y.jpg".into()))
            .unwrap();
        assert_eq!(out, r"![draft \[v2\]](https://x/y.jpg)");
    }

    #[test]
    fn test_markdown_relative_path_is_error() {
        let result = LinkBuilder::new(LinkStyle::Markdown)
            .render(&image_asset(), &LinkTarget::Path(PathBuf::from("rel/sunset.jpg")));
        assert!(result.is_err());
    }

    #[test]
    fn test_wiki_styles() {
        let mut builder = LinkBuilder::new(LinkStyle::Wiki);
        assert_eq!(
            builder.render(&image_asset(), &path_target()).unwrap(),
            "![[/lib/images/KBKE04XLEAB5Q.info/sunset.jpg]]"
        );
        builder.image_width = Some(200);
        assert_eq!(
            builder.render(&image_asset(), &path_target()).unwrap(),
            "![[/lib/images/KBKE04XLEAB5Q.info/sunset.jpg|200]]"
        );
        assert_eq!(
            builder
                .render(&doc_asset(), &LinkTarget::Path(PathBuf::from("/lib/brief.pdf")))
                .unwrap(),
            "[[/lib/brief.pdf]]"
        );
    }

    #[test]
    fn test_wiki_accepts_relative_paths() {
        let out = LinkBuilder::new(LinkStyle::Wiki)
            .render(&image_asset(), &LinkTarget::Path(PathBuf::from("assets/sunset.jpg")))
            .unwrap();
        assert_eq!(out, "![[assets/sunset.jpg]]");
    }

    #[test]
    fn test_html_image_escapes_attributes() {
        let mut asset = image_asset();
        asset.name = r#"say "hi" & <wave>"#.to_string();
        let builder = LinkBuilder {
            style: LinkStyle::Html,
            image_width: Some(100),
            include_tags: false,
        };
        let out = builder
            .render(&asset, &LinkTarget::Url("https://x/y.jpg?a=1&b=2".into()))
            .unwrap();
        assert_eq!(
            out,
            r#"<img src="https://x/y.jpg?a=1&amp;b=2" alt="say &quot;hi&quot; &amp; &lt;wave&gt;" width="100">"#
        );
    }

    #[test]
    fn test_html_non_image() {
        let out = LinkBuilder::new(LinkStyle::Html)
            .render(&doc_asset(), &LinkTarget::Url("https://x/brief.pdf".into()))
            .unwrap();
        assert_eq!(out, r#"<a href="https://x/brief.pdf">brief.pdf</a>"#);
    }

    #[test]
    fn test_eagle_link_ignores_target() {
        let out = LinkBuilder::new(LinkStyle::Eagle)
            .render(&image_asset(), &LinkTarget::Path(PathBuf::from("relative.jpg")))
            .unwrap();
        assert_eq!(out, "[sunset](eagle://item/KBKE04XLEAB5Q)");
    }

    #[test]
    fn test_include_tags_without_tags_adds_nothing() {
        let builder = LinkBuilder {
            style: LinkStyle::Eagle,
            image_width: None,
            include_tags: true,
        };
        let out = builder.render(&doc_asset(), &path_target()).unwrap();
        assert_eq!(out, "[brief](eagle://item/KBKE04XLEAB5R)");
    }

    #[test]
    fn test_from_config() {
        let config = LinkConfig {
            style: LinkStyle::Html,
            use_thumbnail: true,
            image_width: Some(64),
            include_tags: true,
        };
        let builder = LinkBuilder::from_config(&config);
        assert_eq!(builder.style, LinkStyle::Html);
        assert_eq!(builder.image_width, Some(64));
        assert!(builder.include_tags);
    }

    #[test]
    fn test_find_local_images() {
        let note = "# Trip\n\
            ![beach](images/beach.png)\n\
            ![remote](https://cdn.example.com/x.png)\n\
            ![[photos/dune.jpg|300]]\n\
            ![spaced](<my pics/a b.png> \"title\")\n\
            ![inline](data:image/png;base64,AAAA)\n";
        let images = find_local_images(note);
        assert_eq!(images.len(), 3);
        assert_eq!(images[0].alt, "beach");
        assert_eq!(images[0].target, "images/beach.png");
        assert_eq!(&note[images[0].span.clone()], "![beach](images/beach.png)");
        assert_eq!(images[1].alt, "");
        assert_eq!(images[1].target, "photos/dune.jpg");
        assert_eq!(images[1].size.as_deref(), Some("300"));
        assert_eq!(images[2].target, "my pics/a b.png");
    }

    #[test]
    fn test_find_local_images_ignores_plain_links() {
        assert!(find_local_images("[not an image](a.png) and [[wiki]]").is_empty());
    }

    #[test]
    fn test_find_local_images_skips_non_images() {
        let note = "See ![[Private Journal.md]] and ![[contract.pdf]] and ![x](notes/todo.md)\n\
            ![[Daily Note]] ![doc](<scans/tax return.PDF>) ![ok](<shots/Screen Shot.PNG>)";
        let images = find_local_images(note);
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].target, "shots/Screen Shot.PNG");
    }

    #[test]
    fn test_image_ref_resolve() {
        let relative = ImageRef {
            alt: String::new(),
            target: "img/a%20b.png".to_string(),
            size: None,
            span: 0..0,
        };
        assert_eq!(
            relative.resolve(Path::new("/notes")),
            PathBuf::from("/notes/img/a b.png")
        );

        let absolute = ImageRef {
            alt: String::new(),
            target: "/abs/c.png".to_string(),
            size: None,
            span: 0..0,
        };
        assert_eq!(absolute.resolve(Path::new("/notes")), PathBuf::from("/abs/c.png"));
    }

    #[test]
    fn test_replace_images() {
        let note = "a ![one](1.png) b ![[2.png]] c";
        let images = find_local_images(note);
        let replacements = vec![
            (images[0].clone(), "https://h/1.png".to_string()),
            (images[1].clone(), "https://h/2.png".to_string()),
        ];
        assert_eq!(
            replace_images(note, &replacements),
            "a ![one](https://h/1.png) b ![](https://h/2.png) c"
        );
    }

    #[test]
    fn test_replace_images_keeps_wiki_size() {
        let note = "![[photos/dune.jpg|300]]\n![[photos/sea.jpg| ]]";
        let images = find_local_images(note);
        let replacements: Vec<_> = images
            .into_iter()
            .zip(["https://h/dune.jpg", "https://h/sea.jpg"])
            .map(|(image, url)| (image, url.to_string()))
            .collect();
        assert_eq!(
            replace_images(note, &replacements),
            "![|300](https://h/dune.jpg)\n![](https://h/sea.jpg)"
        );
    }

    #[test]
    fn test_replace_images_partial() {
        let note = "![x](x.png)\n![y](y.png)";
        let images = find_local_images(note);
        let replacements = vec![(images[1].clone(), "https://h/y.png".to_string())];
        assert_eq!(
            replace_images(note, &replacements),
            "![x](x.png)\n![y](https://h/y.png)"
        );
    }
}
