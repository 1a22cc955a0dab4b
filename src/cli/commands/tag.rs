//! Tag command implementation.

use super::summary_key;
use crate::cli::Output;
use crate::config::Settings;
use crate::source::Language;
use crate::store::{normalize_tags, open_store};
use crate::summary::SummaryLength;
use anyhow::Result;

/// Run the tag command.
pub async fn run_tag(
    video: &str,
    language: Option<Language>,
    length: Option<SummaryLength>,
    tags: &[String],
    replace: bool,
    settings: Settings,
) -> Result<()> {
    let key = summary_key(video, language, length, &settings)?;
    let store = open_store(&settings)?;

    let Some(record) = store.lookup(&key).await? else {
        Output::error(&format!("No summary stored for {}", key));
        return Err(anyhow::anyhow!("summary not found: {}", key));
    };

    let requested = normalize_tags(tags);
    let tags = if replace {
        requested
    } else {
        record.tags.union(&requested).cloned().collect()
    };

    let updated = store.update_tags(&key, tags).await?;
    if updated.tags.is_empty() {
        Output::success(&format!("Cleared tags on {}", key));
    } else {
        let tags: Vec<&str> = updated.tags.iter().map(String::as_str).collect();
        Output::success(&format!("Tags on {}: {}", key, tags.join(", ")));
    }

    Ok(())
}
