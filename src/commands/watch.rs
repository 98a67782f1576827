use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use super::{attach, build_reconciler, load_config, status_sink};
use crate::cli::Cli;
use crate::error::Result;
use crate::reconcile::Reconciler;
use crate::video::PageState;
use crate::watch::{LocationSource, NavigationWatcher};

pub async fn run(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let tab = attach(cli, &config).await?;
    let reconciler = Arc::new(build_reconciler(&config, status_sink(cli))?);

    let start = tab.current_location().await?;
    tracing::info!(
        "Watching tab {} every {:?} (Ctrl-C to stop)",
        tab.target_id(),
        config.watch.poll_interval()
    );

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                shutdown.cancel();
            }
        }
    });

    let page: Arc<dyn PageState> = Arc::new(tab.clone());
    spawn_cycle(&reconciler, &page);

    let mut watcher = NavigationWatcher::new(tab, config.watch.poll_interval()).seeded(&start);
    let mut changes = std::pin::pin!(watcher.changes());

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            signal = changes.next() => match signal {
                Some(signal) => {
                    tracing::debug!("{} -> {}", signal.previous, signal.location);
                    spawn_cycle(&reconciler, &page);
                }
                None => break,
            },
        }
    }

    tracing::info!("Stopped watching");
    Ok(())
}

/// Run a cycle in its own task so a slow query never delays polling.
fn spawn_cycle(reconciler: &Arc<Reconciler>, page: &Arc<dyn PageState>) {
    let reconciler = reconciler.clone();
    let page = page.clone();
    tokio::spawn(async move {
        let outcome = reconciler.run_cycle(page.as_ref()).await;
        tracing::debug!("Cycle finished: {:?}", outcome);
    });
}
