use super::{attach, build_reconciler, load_config, status_sink, user_page};
use crate::cli::Cli;
use crate::error::Result;
use crate::reconcile::CycleOutcome;

/// One cycle against a video given on the command line
pub async fn run(cli: &Cli, video: &str, page: Option<u32>) -> Result<()> {
    let config = load_config(cli)?;
    let snapshot = user_page(video, page)?;
    let reconciler = build_reconciler(&config, status_sink(cli))?;

    let outcome = reconciler.run_cycle(&snapshot).await;
    tracing::debug!("Check finished: {:?}", outcome);
    Ok(())
}

/// One cycle against the browser tab
pub async fn status(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let tab = attach(cli, &config).await?;
    let reconciler = build_reconciler(&config, status_sink(cli))?;

    if let CycleOutcome::NotApplicable = reconciler.run_cycle(&tab).await {
        tracing::info!("Tab {} is not showing a video", tab.target_id());
    }
    Ok(())
}
