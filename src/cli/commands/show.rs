//! Show command implementation.

use super::summary_key;
use crate::cli::output::format_duration;
use crate::cli::Output;
use crate::config::Settings;
use crate::source::Language;
use crate::store::{open_store, CatalogEntry};
use crate::summary::SummaryLength;
use anyhow::Result;
use console::style;

/// Run the show command.
pub async fn run_show(
    video: &str,
    language: Option<Language>,
    length: Option<SummaryLength>,
    transcript: bool,
    settings: Settings,
) -> Result<()> {
    let key = summary_key(video, language, length, &settings)?;
    let store = open_store(&settings)?;

    match store.get(&key).await? {
        Some(entry) => {
            print_entry(&entry, true, transcript);
            Ok(())
        }
        None => {
            Output::warning(&format!("No summary stored for {}", key));

            let others: Vec<_> = store
                .list()
                .await?
                .into_iter()
                .filter(|e| e.summary.video_id == key.video_id)
                .collect();
            if !others.is_empty() {
                Output::info("Stored variants for this video:");
                for other in &others {
                    Output::list_item(&format!("{} / {}", other.summary.language, other.summary.length));
                }
            }
            Output::info(&format!(
                "Create it with: recap summarize {} --language {} --length {}",
                key.video_id, key.language, key.length
            ));
            Err(anyhow::anyhow!("summary not found: {}", key))
        }
    }
}

/// Print a catalog entry in full.
pub(crate) fn print_entry(entry: &CatalogEntry, include_text: bool, include_transcript: bool) {
    let video = &entry.video;
    let summary = &entry.summary;

    Output::header(video.display_title());
    if let Some(channel) = &video.channel {
        Output::kv("Channel", channel);
    }
    if let Some(duration) = video.duration_seconds {
        Output::kv("Duration", &format_duration(duration as f64));
    }
    if let Some(views) = video.view_count {
        Output::kv("Views", &views.to_string());
    }
    if let Some(published) = video.published_at {
        Output::kv("Published", &published.to_string());
    }
    Output::kv("URL", &video.url());
    Output::kv(
        "Summary",
        &format!(
            "{} / {} ({} words, {})",
            summary.language,
            summary.length,
            summary.summary_text.split_whitespace().count(),
            summary.created_at.format("%Y-%m-%d %H:%M UTC")
        ),
    );
    if !summary.tags.is_empty() {
        let tags: Vec<&str> = summary.tags.iter().map(String::as_str).collect();
        Output::kv("Tags", &tags.join(", "));
    }

    if include_text {
        println!();
        println!("{}", summary.summary_text);
    }

    if !summary.topics.is_empty() {
        println!();
        println!("{}", style("Topics").bold());
        Output::topics(&summary.topics, |seconds| video.url_with_timestamp(seconds));
    }

    if include_transcript {
        println!();
        println!("{}", style("Transcript").bold());
        match &summary.transcript {
            Some(text) => println!("{}", text),
            None => Output::info("No transcript stored for this summary."),
        }
    }
}
