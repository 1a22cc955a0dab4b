//! Delete command implementation.

use super::video_id_or_exit;
use crate::cli::Output;
use crate::config::Settings;
use crate::error::RecapError;
use crate::store::open_store;
use anyhow::Result;
use std::io::Write;

/// Run the delete command.
pub async fn run_delete(video: &str, yes: bool, settings: Settings) -> Result<()> {
    let video_id = video_id_or_exit(video)?;
    let store = open_store(&settings)?;

    if !yes {
        let title = store
            .get_video(&video_id)
            .await?
            .map(|v| v.display_title().to_string())
            .unwrap_or_else(|| video_id.clone());

        print!("Delete '{}' and all its summaries? [y/N] ", title);
        std::io::stdout().flush()?;
        let mut answer = String::new();
        std::io::stdin().read_line(&mut answer)?;
        if !matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") {
            Output::info("Aborted.");
            return Ok(());
        }
    }

    match store.delete_video(&video_id).await {
        Ok(removed) => {
            Output::success(&format!("Deleted {} ({} summaries)", video_id, removed));
            Ok(())
        }
        Err(RecapError::NotFound(_)) => {
            Output::warning(&format!("Nothing stored for {}", video_id));
            Err(anyhow::anyhow!("video not found: {}", video_id))
        }
        Err(e) => {
            Output::error(&format!("Failed to delete {}: {}", video_id, e));
            Err(e.into())
        }
    }
}
