//! Configuration module for Recap.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{ChunkPrompts, LengthSpec, LengthTable, MergePrompts, Prompts, SummaryPrompts};
pub use settings::{
    GeneralSettings, LlmProvider, LlmSettings, PipelineSettings, PromptSettings, Settings,
    StoreSettings, SummarySettings, YoutubeSettings,
};
