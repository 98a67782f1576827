//! Polling-based navigation detection.
//!
//! Bilibili switches videos client-side without firing a reload, so the only
//! dependable signal is the location itself. The watcher samples it on a
//! fixed interval and reports when its normalized form changes.

use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;

use crate::error::Result;

/// Anything that can report the location currently displayed.
#[async_trait]
pub trait LocationSource: Send + Sync {
    async fn current_location(&self) -> Result<String>;
}

/// Drop everything from the first `&` on, where tracking parameters live.
pub fn normalize_location(location: &str) -> &str {
    match location.find('&') {
        Some(end) => &location[..end],
        None => location,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationSignal {
    /// Normalized location after the change
    pub location: String,
    /// Normalized location before the change
    pub previous: String,
}

pub struct NavigationWatcher<S> {
    source: S,
    interval: Duration,
    last: Option<String>,
}

impl<S: LocationSource> NavigationWatcher<S> {
    pub fn new(source: S, interval: Duration) -> Self {
        Self {
            source,
            interval,
            last: None,
        }
    }

    /// Start from a known location so the first poll only reports a real change.
    pub fn seeded(mut self, location: &str) -> Self {
        self.last = Some(normalize_location(location).to_string());
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn last_location(&self) -> Option<&str> {
        self.last.as_deref()
    }

    /// Feed one polled location. The first observation of an unseeded watcher
    /// only records a baseline.
    pub fn observe(&mut self, location: &str) -> Option<NavigationSignal> {
        let normalized = normalize_location(location);
        match self.last.as_deref() {
            Some(last) if last == normalized => None,
            Some(_) => {
                let previous = self.last.replace(normalized.to_string()).unwrap_or_default();
                Some(NavigationSignal {
                    location: normalized.to_string(),
                    previous,
                })
            }
            None => {
                self.last = Some(normalized.to_string());
                None
            }
        }
    }

    /// Sleep and poll until the location changes. Read failures are logged and
    /// skipped; this never returns an error.
    pub async fn next_change(&mut self) -> NavigationSignal {
        loop {
            tokio::time::sleep(self.interval).await;

            match self.source.current_location().await {
                Ok(location) => {
                    tracing::trace!("Polled location: {}", location);
                    if let Some(signal) = self.observe(&location) {
                        tracing::debug!(
                            "Navigation detected: {} -> {}",
                            signal.previous,
                            signal.location
                        );
                        return signal;
                    }
                }
                Err(e) => tracing::warn!("Failed to read location: {}", e),
            }
        }
    }

    /// Endless stream of change signals. Dropping the stream stops polling;
    /// calling this again resumes from the last observed location.
    pub fn changes(&mut self) -> impl Stream<Item = NavigationSignal> + '_ {
        futures::stream::unfold(self, |watcher| async move {
            let signal = watcher.next_change().await;
            Some((signal, watcher))
        })
    }
}
