//! CLI output formatting utilities.

use crate::store::CatalogEntry;
use crate::summary::Topic;
use crate::transcript::format_timestamp;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a list item.
    pub fn list_item(msg: &str) {
        println!("  {} {}", style("*").cyan(), msg);
    }

    /// Print one catalog line.
    pub fn entry_line(entry: &CatalogEntry) {
        let summary = &entry.summary;
        let duration = entry
            .video
            .duration_seconds
            .map(|d| format_duration(d as f64))
            .unwrap_or_else(|| "?".to_string());

        println!(
            "  {} {} ({}, {}/{}, {})",
            style("*").cyan(),
            style(entry.video.display_title()).bold(),
            style(&summary.video_id).dim(),
            summary.language,
            summary.length,
            duration
        );
        println!("     {}", content_preview(&summary.summary_text, 120));
        if !summary.tags.is_empty() {
            let tags: Vec<&str> = summary.tags.iter().map(String::as_str).collect();
            println!("     {}", style(format!("#{}", tags.join(" #"))).magenta());
        }
    }

    /// Print a topic list with jump links.
    pub fn topics(topics: &[Topic], video_url: impl Fn(u32) -> String) {
        for topic in topics {
            println!(
                "  {} {}  {}",
                style(format_timestamp(topic.start_seconds as f64)).cyan(),
                topic.label,
                style(video_url(topic.start_seconds)).dim()
            );
        }
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(spinner_style);
        }
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// Format duration in seconds to a human-readable string.
pub fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds as u32;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Single-line preview, truncated on a character boundary.
pub fn content_preview(content: &str, max_chars: usize) -> String {
    let content = content.replace('\n', " ");
    if content.chars().count() <= max_chars {
        content
    } else {
        let cut: String = content.chars().take(max_chars).collect();
        format!("{}...", cut.trim_end())
    }
}
