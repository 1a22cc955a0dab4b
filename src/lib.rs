//! Recap - YouTube video summaries
//!
//! A CLI tool and library that turns a YouTube video into a length-classed
//! summary with timestamped topics, and keeps every summary in a searchable
//! catalog so the same request is never computed twice.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration and prompt templates
//! - `source` - Video id parsing, transcript and metadata fetching (yt-dlp)
//! - `transcript` - Transcript model
//! - `llm` - Language model capability (OpenAI, OpenRouter, Azure OpenAI)
//! - `summary` - Summarization engine, chunking and topic parsing
//! - `store` - Summary catalog (SQLite or in-memory)
//! - `orchestrator` - Pipeline coordination and request coalescing
//!
//! # Example
//!
//! ```rust,no_run
//! use recap::config::Settings;
//! use recap::orchestrator::Orchestrator;
//! use recap::source::Language;
//! use recap::summary::SummaryLength;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(&settings)?;
//!
//!     let record = orchestrator
//!         .process_video("dQw4w9WgXcQ", Language::English, SummaryLength::Short, &[])
//!         .await?;
//!     println!("{}", record.summary_text);
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod orchestrator;
pub mod source;
pub mod store;
pub mod summary;
pub mod transcript;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{RecapError, Result};
