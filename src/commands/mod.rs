pub mod archive;
pub mod check;
pub mod config;
pub mod encode;
pub mod watch;

use std::sync::Arc;

use crate::api::{ArchiverClient, BilibiliClient, RegistryClient};
use crate::browser::{CdpPage, CdpSession};
use crate::cli::Cli;
use crate::config::Config;
use crate::error::{CheckerError, Result};
use crate::identifier::IdentifierCodec;
use crate::reconcile::Reconciler;
use crate::sink::{JsonSink, StatusSink, TerminalSink};
use crate::video::{normalize_user_input, ContextResolver, PageSnapshot, Resolution, VideoReference};

/// Load configuration and apply command-line overrides on top
pub fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load()?;

    if let Some(ref host) = cli.cdp_host {
        config.browser.cdp_host = host.clone();
    }
    if let Some(port) = cli.cdp_port {
        config.browser.cdp_port = port;
    }
    if let Some(ref url) = cli.archiver_url {
        config.archiver.base_url = Some(url.clone());
    }
    if let Some(ms) = cli.interval {
        config.watch.poll_interval_ms = ms;
    }

    Ok(config)
}

pub fn status_sink(cli: &Cli) -> Arc<dyn StatusSink> {
    if cli.json {
        Arc::new(JsonSink)
    } else {
        Arc::new(TerminalSink)
    }
}

pub fn context_resolver(config: &Config) -> Result<ContextResolver> {
    Ok(ContextResolver::new(Arc::new(BilibiliClient::from_config(
        config,
    )?)))
}

pub fn identifier_codec(config: &Config) -> IdentifierCodec {
    IdentifierCodec::new(config.registry.namespace.clone())
}

/// Wire the controller to the real registry, Bilibili API and (if set) archiver
pub fn build_reconciler(config: &Config, sink: Arc<dyn StatusSink>) -> Result<Reconciler> {
    let registry = RegistryClient::from_config(config)?;
    let mut reconciler = Reconciler::new(
        context_resolver(config)?,
        identifier_codec(config),
        Arc::new(registry),
        sink,
    );

    if let Some(archiver) = ArchiverClient::from_config(config)? {
        reconciler = reconciler.with_archiver(Arc::new(archiver));
    }

    Ok(reconciler)
}

/// Attach to the tab named by `--target`, or pick one
pub async fn attach(cli: &Cli, config: &Config) -> Result<CdpPage> {
    let session = CdpSession::from_config(&config.browser)?;
    match cli.target.as_deref() {
        Some(target_id) => session.attach_to(target_id).await,
        None => session.attach().await,
    }
}

/// A command-line video argument seen as a page showing that video
pub fn user_page(video: &str, page: Option<u32>) -> Result<PageSnapshot> {
    Ok(PageSnapshot::from_location(normalize_user_input(video, page)?))
}

/// Resolve a command-line video argument to a canonical reference
pub async fn resolve_input(
    config: &Config,
    video: &str,
    page: Option<u32>,
) -> Result<VideoReference> {
    let snapshot = user_page(video, page)?;
    match context_resolver(config)?.resolve_snapshot(&snapshot).await {
        Resolution::Resolved(reference) => Ok(reference),
        Resolution::NotApplicable => Err(CheckerError::InvalidVideo(video.to_string())),
        Resolution::Failed(failure) => Err(CheckerError::ApiError(failure.to_string())),
    }
}
