//! Search command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::store::{normalize_tags, open_store};
use anyhow::Result;

/// Run the search command.
pub async fn run_search(query: &str, tags: &[String], limit: usize, settings: Settings) -> Result<()> {
    let store = open_store(&settings)?;
    let tags = normalize_tags(tags);

    match store.search(query, &tags).await {
        Ok(entries) => {
            if entries.is_empty() {
                Output::warning("No summaries match your query.");
            } else {
                Output::success(&format!("Found {} summaries", entries.len()));
                println!();
                for entry in entries.iter().take(limit) {
                    Output::entry_line(entry);
                }
            }
        }
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
