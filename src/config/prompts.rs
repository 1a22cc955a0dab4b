//! Prompt templates for Recap.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use crate::summary::SummaryLength;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    /// Single-pass summary prompts (also the system prompt for every pass).
    pub summary: SummaryPrompts,
    /// Prompt for summarizing one chunk of a long transcript.
    pub chunk: ChunkPrompts,
    /// Prompt for merging chunk summaries into the final result.
    pub merge: MergePrompts,
    /// Length class table.
    pub lengths: LengthTable,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: std::collections::HashMap<String, String>,
}

/// Prompts for single-pass summarization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryPrompts {
    pub system: String,
    pub user: String,
}

impl Default for SummaryPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are an expert video summarizer. You turn raw YouTube transcripts into accurate, well-structured summaries.

Guidelines:
- Use only information present in the transcript
- Skip sponsor reads, subscription requests, intros and outros
- Write in clear prose; do not address the viewer
- Timestamps in the transcript are given as [MM:SS] or [HH:MM:SS] at the start of each paragraph
- Always finish with a "Topics:" section listing the main topics in chronological order, one per line, formatted as "MM:SS - Topic label""#
                .to_string(),

            user: r#"Summarize the following video transcript in {{language}}.

Length: write a {{length_instruction}} summary of {{min_words}} to {{max_words}} words.

Transcript:
{{transcript}}

Respond with the summary text, then a blank line, then:
Topics:
MM:SS - First topic label
MM:SS - Second topic label"#
                .to_string(),
        }
    }
}

/// Prompt for one chunk of a transcript that exceeds the prompt budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkPrompts {
    pub user: String,
}

impl Default for ChunkPrompts {
    fn default() -> Self {
        Self {
            user: r#"This is part {{chunk_index}} of {{chunk_count}} of a long video transcript.

Summarize this part in {{language}} in at most {{chunk_words}} words. Keep the [MM:SS] timestamps of the moments where new topics start, placing them at the beginning of the sentence that introduces the topic.

Transcript part:
{{transcript}}"#
                .to_string(),
        }
    }
}

/// Prompt for the final pass over chunk summaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergePrompts {
    pub user: String,
}

impl Default for MergePrompts {
    fn default() -> Self {
        Self {
            user: r#"The following are summaries of consecutive parts of one video, in order. Merge them into a single coherent summary in {{language}}.

Length: write a {{length_instruction}} summary of {{min_words}} to {{max_words}} words. Do not repeat yourself and do not mention the parts.

Part summaries:
{{chunk_summaries}}

Respond with the summary text, then a blank line, then:
Topics:
MM:SS - First topic label
MM:SS - Second topic label"#
                .to_string(),
        }
    }
}

/// Instruction and word range for one summary length class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LengthSpec {
    /// Detail instruction inserted into prompts.
    pub instruction: String,
    /// Lower bound of the target range in words.
    pub min_words: usize,
    /// Upper bound in words; longer output is clamped.
    pub max_words: usize,
}

impl LengthSpec {
    fn new(instruction: &str, min_words: usize, max_words: usize) -> Self {
        Self {
            instruction: instruction.to_string(),
            min_words,
            max_words,
        }
    }
}

/// Fixed mapping from length class to instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LengthTable {
    pub short: LengthSpec,
    pub medium: LengthSpec,
    pub long: LengthSpec,
}

impl Default for LengthTable {
    fn default() -> Self {
        Self {
            short: LengthSpec::new("concise", 60, 150),
            medium: LengthSpec::new("moderate-length", 150, 400),
            long: LengthSpec::new("detailed", 400, 900),
        }
    }
}

impl LengthTable {
    /// Look up the spec for a length class.
    pub fn get(&self, length: SummaryLength) -> &LengthSpec {
        match length {
            SummaryLength::Short => &self.short,
            SummaryLength::Medium => &self.medium,
            SummaryLength::Long => &self.long,
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&std::collections::HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let summary_path = custom_path.join("summary.toml");
            if summary_path.exists() {
                let content = std::fs::read_to_string(&summary_path)?;
                prompts.summary = toml::from_str(&content)?;
            }

            let chunk_path = custom_path.join("chunk.toml");
            if chunk_path.exists() {
                let content = std::fs::read_to_string(&chunk_path)?;
                prompts.chunk = toml::from_str(&content)?;
            }

            let merge_path = custom_path.join("merge.toml");
            if merge_path.exists() {
                let content = std::fs::read_to_string(&merge_path)?;
                prompts.merge = toml::from_str(&content)?;
            }

            let lengths_path = custom_path.join("lengths.toml");
            if lengths_path.exists() {
                let content = std::fs::read_to_string(&lengths_path)?;
                prompts.lengths = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &std::collections::HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(
        &self,
        template: &str,
        vars: &std::collections::HashMap<String, String>,
    ) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_prompts() {
        let prompts = Prompts::default();
        assert!(prompts.summary.user.contains("{{transcript}}"));
        assert!(prompts.chunk.user.contains("{{chunk_index}}"));
        assert!(prompts.merge.user.contains("{{chunk_summaries}}"));
        assert_eq!(prompts.lengths.get(SummaryLength::Short).instruction, "concise");
        assert_eq!(prompts.lengths.get(SummaryLength::Long).instruction, "detailed");
    }

    #[test]
    fn test_length_ranges_do_not_overlap() {
        let table = LengthTable::default();
        assert!(table.short.max_words <= table.medium.min_words);
        assert!(table.medium.max_words <= table.long.min_words);
    }

    #[test]
    fn test_render_template() {
        let template = "Hello {{name}}, you have {{count}} messages.";
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "Alice".to_string());
        vars.insert("count".to_string(), "5".to_string());

        let result = Prompts::render(template, &vars);
        assert_eq!(result, "Hello Alice, you have 5 messages.");
    }

    #[test]
    fn test_custom_variables_are_overridable() {
        let mut custom = HashMap::new();
        custom.insert("audience".to_string(), "engineers".to_string());
        custom.insert("language".to_string(), "German".to_string());
        let prompts = Prompts::load(None, Some(&custom)).unwrap();

        let mut vars = HashMap::new();
        vars.insert("language".to_string(), "French".to_string());

        let rendered = prompts.render_with_custom("{{language}} for {{audience}}", &vars);
        assert_eq!(rendered, "French for engineers");
    }

    #[test]
    fn test_custom_lengths_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("lengths.toml"),
            r#"
            [short]
            instruction = "one-paragraph"
            min_words = 30
            max_words = 80
            "#,
        )
        .unwrap();

        let prompts = Prompts::load(dir.path().to_str(), None).unwrap();
        assert_eq!(prompts.lengths.short.instruction, "one-paragraph");
        assert_eq!(prompts.lengths.short.max_words, 80);
        assert_eq!(prompts.lengths.medium, LengthTable::default().medium);
    }
}
