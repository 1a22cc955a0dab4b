//! Recap CLI entry point.

use anyhow::Result;
use clap::Parser;
use recap::cli::{commands, Cli, Commands};
use recap::config::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Credentials may live in a .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Load configuration
    let settings = match &cli.config {
        Some(path) => Settings::load_from(Some(&std::path::PathBuf::from(path)))?,
        None => Settings::load()?,
    };

    // Initialize logging
    let log_level = match cli.verbose {
        0 => settings.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("recap={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Execute command
    match &cli.command {
        Commands::Summarize {
            input,
            language,
            length,
            tag,
            stream,
        } => {
            commands::run_summarize(input, *language, *length, tag, *stream, settings).await?;
        }

        Commands::Show {
            video,
            language,
            length,
            transcript,
        } => {
            commands::run_show(video, *language, *length, *transcript, settings).await?;
        }

        Commands::List { limit } => {
            commands::run_list(*limit, settings).await?;
        }

        Commands::Search { query, tag, limit } => {
            commands::run_search(query, tag, *limit, settings).await?;
        }

        Commands::Tag {
            video,
            language,
            length,
            tags,
            replace,
        } => {
            commands::run_tag(video, *language, *length, tags, *replace, settings).await?;
        }

        Commands::Delete { video, yes } => {
            commands::run_delete(video, *yes, settings).await?;
        }

        Commands::Doctor => {
            commands::run_doctor(&settings)?;
        }

        Commands::Serve { host, port } => {
            commands::run_serve(host, *port, settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(action, settings)?;
        }
    }

    Ok(())
}
