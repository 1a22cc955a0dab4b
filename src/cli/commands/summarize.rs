//! Summarize command implementation.

use super::show::print_entry;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::ErrorKind;
use crate::orchestrator::{Orchestrator, PipelineEvent};
use crate::source::Language;
use crate::store::CatalogEntry;
use crate::summary::SummaryLength;
use anyhow::Result;
use std::io::Write;
use tokio::sync::mpsc;

/// Run the summarize command.
pub async fn run_summarize(
    input: &str,
    language: Option<Language>,
    length: Option<SummaryLength>,
    tags: &[String],
    stream: bool,
    settings: Settings,
) -> Result<()> {
    // Pre-flight checks
    if let Err(e) = preflight::check(Operation::Summarize, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'recap doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let language = language.unwrap_or(settings.summary.default_language);
    let length = length.unwrap_or(settings.summary.default_length);
    let orchestrator = Orchestrator::new(&settings)?;

    let (tx, mut rx) = mpsc::channel(256);
    let spinner = Output::spinner(&format!("Processing {}", input));

    let work = orchestrator.process_video_with_events(input, language, length, tags, tx);
    let progress = async {
        let mut streamed = false;
        while let Some(event) = rx.recv().await {
            match event {
                PipelineEvent::Stage(stage) if !streamed => spinner.set_message(stage.to_string()),
                PipelineEvent::Token(token) if stream => {
                    if !streamed {
                        spinner.finish_and_clear();
                        println!();
                        streamed = true;
                    }
                    print!("{}", token);
                    let _ = std::io::stdout().flush();
                }
                _ => {}
            }
        }
        streamed
    };

    let (result, streamed) = tokio::join!(work, progress);
    spinner.finish_and_clear();
    if streamed {
        println!();
    }

    let record = match result {
        Ok(record) => record,
        Err(e) => {
            Output::error(&format!("{}", e));
            match e.kind() {
                ErrorKind::NotFound => Output::info(&format!(
                    "The video has no {} captions. Try another --language.",
                    language
                )),
                ErrorKind::Transient => Output::info("The service is busy. Try again in a moment."),
                _ => {}
            }
            return Err(e.into());
        }
    };

    let entry = match orchestrator.store().get(&record.key()).await? {
        Some(entry) => entry,
        None => CatalogEntry {
            video: crate::source::VideoMetadata::unknown(record.video_id.clone()),
            summary: record,
        },
    };

    print_entry(&entry, !streamed, false);
    Ok(())
}
