use colored::Colorize;

use super::{attach, build_reconciler, load_config, resolve_input, status_sink, user_page};
use crate::api::{ArchiverClient, TaskState};
use crate::cli::Cli;
use crate::error::{CheckerError, Result};

/// Ask the archiver to preserve a video, or the one in the browser tab
pub async fn run(cli: &Cli, video: Option<&str>, page: Option<u32>) -> Result<()> {
    let config = load_config(cli)?;
    let reconciler = build_reconciler(&config, status_sink(cli))?;

    let outcome = match video {
        Some(video) => reconciler.trigger_archive(&user_page(video, page)?).await,
        None => {
            let tab = attach(cli, &config).await?;
            reconciler.trigger_archive(&tab).await
        }
    };

    outcome.into_result()
}

pub async fn queue(cli: &Cli, video: &str) -> Result<()> {
    let config = load_config(cli)?;
    let archiver = ArchiverClient::from_config(&config)?.ok_or_else(|| {
        CheckerError::ConfigError(
            "archiver.base_url is not set (use --archiver-url or `config set archiver.base_url`)"
                .to_string(),
        )
    })?;
    let reference = resolve_input(&config, video, None).await?;

    let status = archiver.queue_status(&reference.raw_id).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let marker = match status.status {
        TaskState::Finished => "✓".green(),
        TaskState::Failed => "✗".red(),
        TaskState::NotFound | TaskState::Unknown => "○".dimmed(),
        TaskState::Pending | TaskState::Downloading | TaskState::Uploading => "●".yellow(),
    };
    match status.queue_index {
        Some(index) => println!(
            "{} {} {} {}",
            marker,
            status.vid.bold(),
            status.status,
            format!("(queue position {})", index).dimmed()
        ),
        None => println!("{} {} {}", marker, status.vid.bold(), status.status),
    }

    Ok(())
}
