//! CLI module for Recap.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use crate::source::Language;
use crate::summary::SummaryLength;
use clap::{Parser, Subcommand};

/// Recap - YouTube video summaries
///
/// Summarize YouTube videos from their captions and keep every summary in a
/// searchable local catalog.
#[derive(Parser, Debug)]
#[command(name = "recap")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Summarize a video (served from the catalog when already summarized)
    Summarize {
        /// YouTube URL or video ID
        input: String,

        /// Summary language (english, french, german)
        #[arg(short, long)]
        language: Option<Language>,

        /// Summary length (short, medium, long)
        #[arg(short = 'n', long)]
        length: Option<SummaryLength>,

        /// Tag to attach (repeatable)
        #[arg(short, long)]
        tag: Vec<String>,

        /// Print the summary as it is generated
        #[arg(short, long)]
        stream: bool,
    },

    /// Show a stored summary
    Show {
        /// YouTube URL or video ID
        video: String,

        /// Summary language
        #[arg(short, long)]
        language: Option<Language>,

        /// Summary length
        #[arg(short = 'n', long)]
        length: Option<SummaryLength>,

        /// Also print the stored transcript
        #[arg(long)]
        transcript: bool,
    },

    /// List stored summaries, most recent first
    List {
        /// Maximum number of entries
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Search stored summaries by title, channel, text and tags
    Search {
        /// Search query (may be empty when filtering by tag)
        #[arg(default_value = "")]
        query: String,

        /// Only entries carrying this tag (repeatable)
        #[arg(short, long)]
        tag: Vec<String>,

        /// Maximum number of results
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Add tags to a stored summary
    Tag {
        /// YouTube URL or video ID
        video: String,

        /// Tags to add
        #[arg(required = true)]
        tags: Vec<String>,

        /// Summary language
        #[arg(short, long)]
        language: Option<Language>,

        /// Summary length
        #[arg(short = 'n', long)]
        length: Option<SummaryLength>,

        /// Replace existing tags instead of adding
        #[arg(long)]
        replace: bool,
    },

    /// Delete a video and all its summaries
    Delete {
        /// YouTube URL or video ID
        video: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Check system requirements and configuration
    Doctor,

    /// Start HTTP API server for integration with other systems
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}
