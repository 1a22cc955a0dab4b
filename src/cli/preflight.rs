//! Pre-flight checks before expensive operations.
//!
//! Validates that required tools and configuration are available
//! before starting operations that would otherwise fail midway.

use crate::config::Settings;
use crate::error::{RecapError, Result};
use std::process::Command;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Summarizing requires yt-dlp and an API key.
    Summarize,
    /// Catalog reads and edits only touch the store.
    Catalog,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Summarize => {
            check_api_key(settings)?;
            check_tool(&settings.youtube.ytdlp_path)?;
        }
        Operation::Catalog => {}
    }
    Ok(())
}

/// Check that the configured provider's API key is set.
fn check_api_key(settings: &Settings) -> Result<()> {
    if settings.llm.has_api_key() {
        return Ok(());
    }
    let env = settings.llm.key_env();
    Err(RecapError::Config(format!(
        "{} is not set. Set it with: export {}='...' (or add it to .env)",
        env, env
    )))
}

/// Check if an external tool is available.
fn check_tool(name: &str) -> Result<()> {
    match Command::new(name).arg("--version").output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(RecapError::ToolNotFound(format!(
            "{} is installed but not working correctly",
            name
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(RecapError::ToolNotFound(name.to_string()))
        }
        Err(e) => Err(RecapError::ToolNotFound(format!("{}: {}", name, e))),
    }
}
