//! CLI command definitions.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::link::LinkStyle;
use crate::upload::ProviderKind;

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Search command arguments.
#[derive(Debug, Args)]
pub struct SearchCommand {
    /// Fuzzy query matched against names and tags
    pub query: Option<String>,

    /// Only these extensions (repeatable)
    #[arg(short, long = "ext", value_name = "EXT")]
    pub extensions: Vec<String>,

    /// Require these tags (repeatable)
    #[arg(short, long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,

    /// Only these folders, by id or path (repeatable)
    #[arg(long = "folder", value_name = "FOLDER")]
    pub folders: Vec<String>,

    /// Minimum file size in bytes
    #[arg(long, value_name = "BYTES")]
    pub min_size: Option<u64>,

    /// Maximum file size in bytes
    #[arg(long, value_name = "BYTES")]
    pub max_size: Option<u64>,

    /// Maximum number of results
    #[arg(short, long, default_value = "20")]
    pub limit: usize,

    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub format: OutputFormat,
}

/// Show command arguments.
#[derive(Debug, Args)]
pub struct ShowCommand {
    /// Asset id
    pub id: String,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Link command arguments.
#[derive(Debug, Args)]
pub struct LinkCommand {
    /// Asset ids
    #[arg(required = true)]
    pub ids: Vec<String>,

    /// Link style (defaults to the configured style)
    #[arg(short, long, value_enum)]
    pub style: Option<LinkStyleArg>,

    /// Link the thumbnail instead of the original file
    #[arg(long)]
    pub thumbnail: bool,

    /// Display width for images
    #[arg(short, long)]
    pub width: Option<u32>,

    /// Append tags as hashtags
    #[arg(long)]
    pub tags: bool,
}

/// Folders command arguments.
#[derive(Debug, Args)]
pub struct FoldersCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Upload command arguments.
#[derive(Debug, Args)]
pub struct UploadCommand {
    /// Files to upload
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Use only this provider, skipping the failover order
    #[arg(short, long, value_enum)]
    pub provider: Option<ProviderArg>,

    /// Print a markdown image instead of the bare URL
    #[arg(short, long)]
    pub markdown: bool,
}

/// Paste command arguments.
#[derive(Debug, Args)]
pub struct PasteCommand {
    /// Use only this provider, skipping the failover order
    #[arg(short, long, value_enum)]
    pub provider: Option<ProviderArg>,

    /// Print a markdown image instead of the bare URL
    #[arg(short, long)]
    pub markdown: bool,
}

/// Rewrite command arguments.
#[derive(Debug, Args)]
pub struct RewriteCommand {
    /// Markdown note to rewrite
    pub note: PathBuf,

    /// Use only this provider, skipping the failover order
    #[arg(short, long, value_enum)]
    pub provider: Option<ProviderArg>,

    /// Overwrite the note instead of printing the result
    #[arg(short, long)]
    pub in_place: bool,
}

/// Upload history commands.
#[derive(Debug, Subcommand)]
pub enum HistoryCommand {
    /// List recent uploads
    List {
        /// Maximum number of entries
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Search uploads by file name or URL
    Search {
        /// Text to look for
        query: String,

        /// Maximum number of entries
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Forget one upload
    Delete {
        /// Record id
        id: i64,
    },

    /// Remove old records
    Prune {
        /// Remove records older than this many days (defaults to history.max_age_days)
        #[arg(short, long)]
        days: Option<u32>,
    },

    /// Show history statistics
    Stats {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Link style argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LinkStyleArg {
    /// `![name](file:///...)`
    Markdown,
    /// `![[path]]`
    Wiki,
    /// `<img src="...">`
    Html,
    /// `[name](eagle://item/<id>)`
    Eagle,
}

impl From<LinkStyleArg> for LinkStyle {
    fn from(arg: LinkStyleArg) -> Self {
        match arg {
            LinkStyleArg::Markdown => Self::Markdown,
            LinkStyleArg::Wiki => Self::Wiki,
            LinkStyleArg::Html => Self::Html,
            LinkStyleArg::Eagle => Self::Eagle,
        }
    }
}

/// Upload provider argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProviderArg {
    /// imgur.com
    Imgur,
    /// sm.ms
    Smms,
    /// A GitHub repository
    Github,
    /// Cloudinary
    Cloudinary,
    /// The configured custom endpoint
    Custom,
}

impl From<ProviderArg> for ProviderKind {
    fn from(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::Imgur => Self::Imgur,
            ProviderArg::Smms => Self::Smms,
            ProviderArg::Github => Self::Github,
            ProviderArg::Cloudinary => Self::Cloudinary,
            ProviderArg::Custom => Self::Custom,
        }
    }
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// One line per result
    #[default]
    Plain,
    /// Aligned columns with a header
    Table,
    /// JSON output
    Json,
}
