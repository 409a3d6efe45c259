//! Command-line interface for eaglelink.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::logging::Verbosity;

pub use commands::{
    ConfigCommand, FoldersCommand, HistoryCommand, LinkCommand, LinkStyleArg, OutputFormat,
    PasteCommand, ProviderArg, RewriteCommand, SearchCommand, ShowCommand, StatusCommand,
    UploadCommand,
};

/// eaglelink - Link Eagle assets into your notes
///
/// Searches the library of a running Eagle app, prints links and embeds for
/// its assets, and uploads images (files, the clipboard, or every local
/// image in a note) to cloud hosts with automatic failover.
#[derive(Debug, Parser)]
#[command(name = "eaglelink")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check that Eagle is running and show the open library
    Status(StatusCommand),

    /// Search the library
    Search(SearchCommand),

    /// Show one asset with its thumbnail
    Show(ShowCommand),

    /// Print links for assets
    Link(LinkCommand),

    /// List library folders
    Folders(FoldersCommand),

    /// Upload image files
    Upload(UploadCommand),

    /// Upload the image on the clipboard
    Paste(PasteCommand),

    /// Upload a note's local images and point the note at them
    Rewrite(RewriteCommand),

    /// Inspect upload history
    #[command(subcommand)]
    History(HistoryCommand),

    /// View or check configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }
}
