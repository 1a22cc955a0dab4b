//! CLI command implementations.

mod config;
mod delete;
mod doctor;
mod list;
mod search;
mod serve;
mod show;
mod summarize;
mod tag;

pub use config::run_config;
pub use delete::run_delete;
pub use doctor::run_doctor;
pub use list::run_list;
pub use search::run_search;
pub use serve::run_serve;
pub use show::run_show;
pub use summarize::run_summarize;
pub use tag::run_tag;

use crate::cli::Output;
use crate::config::Settings;
use crate::source::{parse_video_id, Language};
use crate::store::SummaryKey;
use crate::summary::SummaryLength;

/// Parse a video reference, reporting unparseable input.
fn video_id_or_exit(input: &str) -> anyhow::Result<String> {
    match parse_video_id(input) {
        Some(id) => Ok(id),
        None => {
            Output::error(&format!("Not a YouTube URL or video ID: {}", input));
            Err(anyhow::anyhow!("invalid video reference: {}", input))
        }
    }
}

/// Build a summary key, falling back to the configured defaults.
fn summary_key(
    input: &str,
    language: Option<Language>,
    length: Option<SummaryLength>,
    settings: &Settings,
) -> anyhow::Result<SummaryKey> {
    Ok(SummaryKey::new(
        video_id_or_exit(input)?,
        language.unwrap_or(settings.summary.default_language),
        length.unwrap_or(settings.summary.default_length),
    ))
}
