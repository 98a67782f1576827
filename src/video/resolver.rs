use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use super::location::VideoLocation;
use super::providers::{first_bvid, first_page, ContextProvider, PageSnapshot, DEFAULT_PROVIDERS};
use super::VideoReference;
use crate::error::Result;

/// Read access to the page being checked.
#[async_trait]
pub trait PageState: Send + Sync {
    async fn snapshot(&self) -> Result<PageSnapshot>;
}

/// A page known only by a fixed snapshot, e.g. a URL given on the command line.
#[async_trait]
impl PageState for PageSnapshot {
    async fn snapshot(&self) -> Result<PageSnapshot> {
        Ok(self.clone())
    }
}

/// Translates a legacy `av` id into its `BV` id.
#[async_trait]
pub trait LegacyIdLookup: Send + Sync {
    async fn canonical_id(&self, aid: u64) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionFailure {
    #[error("could not read page state: {0}")]
    PageUnreadable(String),

    #[error("could not resolve av{aid}: {reason}")]
    LegacyLookupFailed { aid: u64, reason: String },

    #[error("malformed video id av{0}")]
    MalformedId(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(VideoReference),
    /// The page is not a video page. Not an error.
    NotApplicable,
    Failed(ResolutionFailure),
}

/// Turns page state into a canonical [`VideoReference`].
pub struct ContextResolver {
    lookup: Arc<dyn LegacyIdLookup>,
    providers: Vec<ContextProvider>,
}

impl ContextResolver {
    pub fn new(lookup: Arc<dyn LegacyIdLookup>) -> Self {
        Self {
            lookup,
            providers: DEFAULT_PROVIDERS.to_vec(),
        }
    }

    /// Replace the ordered list of injected-state providers.
    pub fn with_providers(mut self, providers: Vec<ContextProvider>) -> Self {
        self.providers = providers;
        self
    }

    pub async fn resolve(&self, page: &dyn PageState) -> Resolution {
        match page.snapshot().await {
            Ok(snapshot) => self.resolve_snapshot(&snapshot).await,
            Err(e) => {
                tracing::warn!("Failed to read page state: {}", e);
                Resolution::Failed(ResolutionFailure::PageUnreadable(e.to_string()))
            }
        }
    }

    pub async fn resolve_snapshot(&self, snapshot: &PageSnapshot) -> Resolution {
        match VideoLocation::parse(&snapshot.location) {
            VideoLocation::Canonical { bvid, page } => {
                let page = page
                    .or_else(|| self.injected_page(snapshot, &bvid))
                    .unwrap_or(1);
                Resolution::Resolved(VideoReference::new(bvid, page))
            }
            VideoLocation::Legacy { aid, page } => {
                tracing::debug!("Resolving legacy id av{}", aid);
                match self.lookup.canonical_id(aid).await {
                    Ok(bvid) => {
                        let page = page
                            .or_else(|| self.injected_page(snapshot, &bvid))
                            .unwrap_or(1);
                        Resolution::Resolved(VideoReference::new(bvid, page))
                    }
                    Err(e) => {
                        tracing::warn!("Legacy id av{} could not be resolved: {}", aid, e);
                        Resolution::Failed(ResolutionFailure::LegacyLookupFailed {
                            aid,
                            reason: e.to_string(),
                        })
                    }
                }
            }
            VideoLocation::MalformedLegacy { raw } => {
                tracing::warn!("Legacy id av{} is out of range", raw);
                Resolution::Failed(ResolutionFailure::MalformedId(raw))
            }
            VideoLocation::Other => {
                tracing::debug!("Not a video page: {}", snapshot.location);
                Resolution::NotApplicable
            }
        }
    }

    /// Page index from injected state, only trusted while that state still
    /// describes `bvid`. Client-side navigation can leave it stale.
    fn injected_page(&self, snapshot: &PageSnapshot, bvid: &str) -> Option<u32> {
        let injected_bvid = first_bvid(&self.providers, &snapshot.injected)?;
        if injected_bvid != bvid {
            tracing::debug!(
                "Injected state describes {}, not {}; ignoring its page index",
                injected_bvid,
                bvid
            );
            return None;
        }
        first_page(&self.providers, &snapshot.injected)
    }
}
