//! List command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::store::open_store;
use anyhow::Result;

/// Run the list command.
pub async fn run_list(limit: Option<usize>, settings: Settings) -> Result<()> {
    let store = open_store(&settings)?;

    match store.list().await {
        Ok(entries) => {
            if entries.is_empty() {
                Output::info("No summaries yet. Use 'recap summarize <url>' to add one.");
            } else {
                let total = entries.len();
                Output::header(&format!("Summaries ({})", total));
                println!();

                for entry in entries.iter().take(limit.unwrap_or(usize::MAX)) {
                    Output::entry_line(entry);
                }

                let videos: std::collections::BTreeSet<&str> =
                    entries.iter().map(|e| e.summary.video_id.as_str()).collect();
                println!();
                Output::kv("Total summaries", &total.to_string());
                Output::kv("Videos", &videos.len().to_string());
            }
        }
        Err(e) => {
            Output::error(&format!("Failed to list summaries: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
