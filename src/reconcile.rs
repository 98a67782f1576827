//! Status reconciliation.
//!
//! Each detected context (initial load or navigation) starts a cycle:
//! resolve the video, derive its identifier, query the registry, publish the
//! result. Cycles are not cancelled when a newer one starts. Instead every
//! cycle carries the generation it was started with, and anything it wants to
//! publish after an await point is dropped unless that generation is still
//! the current one.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{CheckerError, Result};
use crate::identifier::{ArchiveIdentifier, IdentifierCodec};
use crate::sink::{StatusCategory, StatusSink, StatusUpdate};
use crate::status::ArchiveStatus;
use crate::video::{ContextResolver, PageState, Resolution, VideoReference};

/// Read side: is an item present under this identifier?
#[async_trait]
pub trait StatusQuery: Send + Sync {
    async fn query_status(&self, identifier: &ArchiveIdentifier) -> ArchiveStatus;
}

/// Write side: ask an archiver to preserve a video.
#[async_trait]
pub trait ArchiveTrigger: Send + Sync {
    async fn trigger(&self, canonical_id: &str) -> Result<()>;
}

/// How a cycle ended, from the point of view of the caller that ran it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Settled {
        identifier: Option<ArchiveIdentifier>,
        status: ArchiveStatus,
    },
    NotApplicable,
    /// A newer cycle started before this one finished; its result was dropped.
    Superseded,
}

/// Result of a manual archive request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    Requested {
        reference: VideoReference,
        identifier: ArchiveIdentifier,
    },
    Rejected(String),
    NotApplicable,
    ResolutionFailed,
    NoArchiver,
}

#[derive(Debug, Default)]
struct CycleState {
    generation: u64,
    status: ArchiveStatus,
}

pub struct Reconciler {
    resolver: ContextResolver,
    codec: IdentifierCodec,
    registry: Arc<dyn StatusQuery>,
    archiver: Option<Arc<dyn ArchiveTrigger>>,
    sink: Arc<dyn StatusSink>,
    state: Mutex<CycleState>,
}

impl Reconciler {
    pub fn new(
        resolver: ContextResolver,
        codec: IdentifierCodec,
        registry: Arc<dyn StatusQuery>,
        sink: Arc<dyn StatusSink>,
    ) -> Self {
        Self {
            resolver,
            codec,
            registry,
            archiver: None,
            sink,
            state: Mutex::new(CycleState::default()),
        }
    }

    pub fn with_archiver(mut self, archiver: Arc<dyn ArchiveTrigger>) -> Self {
        self.archiver = Some(archiver);
        self
    }

    /// Last status published by the current cycle
    pub fn status(&self) -> ArchiveStatus {
        self.lock_state().status.clone()
    }

    pub fn generation(&self) -> u64 {
        self.lock_state().generation
    }

    fn lock_state(&self) -> MutexGuard<'_, CycleState> {
        // The state is a plain value; a panic elsewhere cannot leave it half-written.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start a new cycle, superseding any cycle still in flight.
    fn begin(&self) -> u64 {
        let mut state = self.lock_state();
        state.generation += 1;
        state.status = ArchiveStatus::Unknown;
        self.sink.publish(StatusUpdate::new(
            "Page changed, checking...",
            StatusCategory::Navigating,
        ));
        state.generation
    }

    /// Record and publish `status` if `generation` is still current.
    /// Check, store and publish happen under one lock so a newer cycle can
    /// never be overwritten by an older one.
    fn commit(&self, generation: u64, status: ArchiveStatus, update: StatusUpdate) -> bool {
        let mut state = self.lock_state();
        if state.generation != generation {
            tracing::debug!(
                "Dropping result of cycle {} (current is {})",
                generation,
                state.generation
            );
            return false;
        }
        state.status = status;
        self.sink.publish(update);
        true
    }

    /// Run one full cycle against `page`.
    pub async fn run_cycle(&self, page: &dyn PageState) -> CycleOutcome {
        let generation = self.begin();
        tracing::info!("Cycle {} started", generation);

        let reference = match self.resolver.resolve(page).await {
            Resolution::Resolved(reference) => reference,
            Resolution::NotApplicable => {
                let committed = self.commit(
                    generation,
                    ArchiveStatus::Unknown,
                    StatusUpdate::new("Not a video page", StatusCategory::Inert),
                );
                return if committed {
                    CycleOutcome::NotApplicable
                } else {
                    CycleOutcome::Superseded
                };
            }
            Resolution::Failed(failure) => {
                let committed = self.commit(
                    generation,
                    ArchiveStatus::ResolutionFailed,
                    StatusUpdate::new(
                        format!("Could not determine the video id ({})", failure),
                        StatusCategory::Error,
                    ),
                );
                return if committed {
                    CycleOutcome::Settled {
                        identifier: None,
                        status: ArchiveStatus::ResolutionFailed,
                    }
                } else {
                    CycleOutcome::Superseded
                };
            }
        };

        let identifier = self.codec.encode(&reference);

        let querying = StatusUpdate::new(
            format!(
                "Querying Internet Archive for {} (BV: {}, P: {})",
                identifier, reference.raw_id, reference.page_index
            ),
            StatusCategory::Querying,
        );
        if !self.commit(generation, ArchiveStatus::Querying, querying) {
            return CycleOutcome::Superseded;
        }

        let status = self.registry.query_status(&identifier).await;

        let update = match &status {
            ArchiveStatus::NotArchived => {
                StatusUpdate::new("Not archived", StatusCategory::NotArchived)
            }
            ArchiveStatus::Archived { detail_url } => {
                StatusUpdate::new("This video is archived", StatusCategory::Archived)
                    .with_link(detail_url.clone())
            }
            ArchiveStatus::QueryFailed => {
                StatusUpdate::new("Archive query failed", StatusCategory::Error)
            }
            other => {
                tracing::warn!("Registry returned a non-terminal status: {:?}", other);
                StatusUpdate::new("Archive query failed", StatusCategory::Error)
            }
        };
        let status = if status.is_terminal() {
            status
        } else {
            ArchiveStatus::QueryFailed
        };

        if self.commit(generation, status.clone(), update) {
            tracing::info!("Cycle {} settled: {:?}", generation, status);
            CycleOutcome::Settled {
                identifier: Some(identifier),
                status,
            }
        } else {
            CycleOutcome::Superseded
        }
    }

    /// Manual "start archiving" side cycle. Publishes its own progress but
    /// leaves the read cycle's generation and status alone.
    pub async fn trigger_archive(&self, page: &dyn PageState) -> TriggerOutcome {
        let Some(archiver) = self.archiver.as_ref() else {
            self.sink.publish(StatusUpdate::new(
                "No archiver configured (set archiver.base_url)",
                StatusCategory::Error,
            ));
            return TriggerOutcome::NoArchiver;
        };

        let reference = match self.resolver.resolve(page).await {
            Resolution::Resolved(reference) => reference,
            Resolution::NotApplicable => {
                self.sink.publish(StatusUpdate::new(
                    "Not a video page",
                    StatusCategory::Inert,
                ));
                return TriggerOutcome::NotApplicable;
            }
            Resolution::Failed(failure) => {
                self.sink.publish(StatusUpdate::new(
                    format!("Could not determine the video id ({})", failure),
                    StatusCategory::Error,
                ));
                return TriggerOutcome::ResolutionFailed;
            }
        };

        let identifier = self.codec.encode(&reference);
        self.sink.publish(StatusUpdate::new(
            format!("Sending archive request for {}", reference.raw_id),
            StatusCategory::Querying,
        ));

        match archiver.trigger(&reference.raw_id).await {
            Ok(()) => {
                self.sink.publish(StatusUpdate::new(
                    format!("Archive request sent, expected item {}", identifier),
                    StatusCategory::Triggered,
                ));
                TriggerOutcome::Requested {
                    reference,
                    identifier,
                }
            }
            Err(e) => {
                tracing::warn!("Archive request for {} failed: {}", reference.raw_id, e);
                self.sink.publish(StatusUpdate::new(
                    "Archive request failed",
                    StatusCategory::Error,
                ));
                TriggerOutcome::Rejected(e.to_string())
            }
        }
    }
}

impl TriggerOutcome {
    /// Collapse into an error for callers that only care whether it worked.
    pub fn into_result(self) -> Result<()> {
        match self {
            TriggerOutcome::Requested { .. } => Ok(()),
            TriggerOutcome::Rejected(msg) => Err(CheckerError::ApiError(msg)),
            TriggerOutcome::NotApplicable => {
                Err(CheckerError::InvalidVideo("not a video page".to_string()))
            }
            TriggerOutcome::ResolutionFailed => Err(CheckerError::Other(
                "could not determine the video id".to_string(),
            )),
            TriggerOutcome::NoArchiver => Err(CheckerError::ConfigError(
                "archiver.base_url is not set".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::encode;
    use crate::sink::MemorySink;
    use crate::video::{LegacyIdLookup, PageSnapshot};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::oneshot;

    const VIDEO_A: &str = "https://www.bilibili.com/video/BV1HP411D7Rj";
    const VIDEO_B: &str = "https://www.bilibili.com/video/BV1xx411c7mD?p=2";

    struct NoLookup;

    #[async_trait]
    impl LegacyIdLookup for NoLookup {
        async fn canonical_id(&self, aid: u64) -> Result<String> {
            Err(CheckerError::ApiError(format!("av{} unknown", aid)))
        }
    }

    /// Answers immediately with a fixed status.
    struct FixedRegistry {
        status: ArchiveStatus,
        calls: AtomicUsize,
    }

    impl FixedRegistry {
        fn new(status: ArchiveStatus) -> Arc<Self> {
            Arc::new(Self {
                status,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl StatusQuery for FixedRegistry {
        async fn query_status(&self, _identifier: &ArchiveIdentifier) -> ArchiveStatus {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.status.clone()
        }
    }

    /// Holds each query until the test releases it.
    #[derive(Default)]
    struct GatedRegistry {
        gates: Mutex<HashMap<String, oneshot::Receiver<ArchiveStatus>>>,
        calls: AtomicUsize,
    }

    impl GatedRegistry {
        fn gate(&self, identifier: &ArchiveIdentifier) -> oneshot::Sender<ArchiveStatus> {
            let (tx, rx) = oneshot::channel();
            self.gates
                .lock()
                .unwrap()
                .insert(identifier.to_string(), rx);
            tx
        }
    }

    #[async_trait]
    impl StatusQuery for GatedRegistry {
        async fn query_status(&self, identifier: &ArchiveIdentifier) -> ArchiveStatus {
            let gate = self.gates.lock().unwrap().remove(identifier.as_str());
            self.calls.fetch_add(1, Ordering::SeqCst);
            match gate {
                Some(rx) => rx.await.unwrap_or(ArchiveStatus::QueryFailed),
                None => ArchiveStatus::QueryFailed,
            }
        }
    }

    struct RecordingArchiver {
        accept: bool,
        requested: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ArchiveTrigger for RecordingArchiver {
        async fn trigger(&self, canonical_id: &str) -> Result<()> {
            self.requested.lock().unwrap().push(canonical_id.to_string());
            if self.accept {
                Ok(())
            } else {
                Err(CheckerError::ApiError("500".to_string()))
            }
        }
    }

    fn reconciler(registry: Arc<dyn StatusQuery>, sink: Arc<MemorySink>) -> Reconciler {
        Reconciler::new(
            ContextResolver::new(Arc::new(NoLookup)),
            IdentifierCodec::default(),
            registry,
            sink,
        )
    }

    async fn wait_for_calls(registry: &GatedRegistry, n: usize) {
        while registry.calls.load(Ordering::SeqCst) < n {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn archived_cycle_publishes_detail_link() {
        let detail_url = format!("https://archive.org/details/{}", encode("BV1HP411D7Rj", 1));
        let registry = FixedRegistry::new(ArchiveStatus::Archived {
            detail_url: detail_url.clone(),
        });
        let sink = Arc::new(MemorySink::new());
        let rec = reconciler(registry, sink.clone());

        let outcome = rec.run_cycle(&PageSnapshot::from_location(VIDEO_A)).await;

        assert_eq!(
            outcome,
            CycleOutcome::Settled {
                identifier: Some(encode("BV1HP411D7Rj", 1)),
                status: ArchiveStatus::Archived {
                    detail_url: detail_url.clone()
                },
            }
        );
        let categories: Vec<_> = sink.updates().iter().map(|u| u.category).collect();
        assert_eq!(
            categories,
            [
                StatusCategory::Navigating,
                StatusCategory::Querying,
                StatusCategory::Archived
            ]
        );
        assert!(sink.updates()[1]
            .message
            .contains("BiliBili-BV1HP411D7Rj_p1-1R1D3PH1VB"));
        assert_eq!(sink.last().and_then(|u| u.link), Some(detail_url));
        assert_eq!(rec.generation(), 1);
    }

    #[tokio::test]
    async fn not_archived_cycle() {
        let sink = Arc::new(MemorySink::new());
        let rec = reconciler(FixedRegistry::new(ArchiveStatus::NotArchived), sink.clone());

        rec.run_cycle(&PageSnapshot::from_location(VIDEO_B)).await;

        assert_eq!(rec.status(), ArchiveStatus::NotArchived);
        assert_eq!(sink.last().map(|u| u.category), Some(StatusCategory::NotArchived));
    }

    #[tokio::test]
    async fn non_video_page_never_queries() {
        let registry = FixedRegistry::new(ArchiveStatus::NotArchived);
        let sink = Arc::new(MemorySink::new());
        let rec = reconciler(registry.clone(), sink.clone());

        let outcome = rec
            .run_cycle(&PageSnapshot::from_location("https://www.bilibili.com/"))
            .await;

        assert_eq!(outcome, CycleOutcome::NotApplicable);
        assert_eq!(registry.calls.load(Ordering::SeqCst), 0);
        assert_eq!(rec.status(), ArchiveStatus::Unknown);
        assert_eq!(sink.last().map(|u| u.category), Some(StatusCategory::Inert));
    }

    #[tokio::test]
    async fn resolution_failure_is_published_and_skips_query() {
        let registry = FixedRegistry::new(ArchiveStatus::NotArchived);
        let sink = Arc::new(MemorySink::new());
        let rec = reconciler(registry.clone(), sink.clone());

        let outcome = rec
            .run_cycle(&PageSnapshot::from_location(
                "https://www.bilibili.com/video/av170001",
            ))
            .await;

        assert_eq!(
            outcome,
            CycleOutcome::Settled {
                identifier: None,
                status: ArchiveStatus::ResolutionFailed
            }
        );
        assert_eq!(registry.calls.load(Ordering::SeqCst), 0);
        assert_eq!(sink.last().map(|u| u.category), Some(StatusCategory::Error));
    }

    #[tokio::test]
    async fn query_failure_is_terminal() {
        let sink = Arc::new(MemorySink::new());
        let rec = reconciler(FixedRegistry::new(ArchiveStatus::QueryFailed), sink.clone());

        rec.run_cycle(&PageSnapshot::from_location(VIDEO_A)).await;

        assert_eq!(rec.status(), ArchiveStatus::QueryFailed);
        assert_eq!(sink.last().map(|u| u.category), Some(StatusCategory::Error));
    }

    #[tokio::test]
    async fn superseded_cycle_result_is_dropped() {
        let registry = Arc::new(GatedRegistry::default());
        let sink = Arc::new(MemorySink::new());
        let rec = Arc::new(reconciler(registry.clone(), sink.clone()));

        let gate_a = registry.gate(&encode("BV1HP411D7Rj", 1));
        let gate_b = registry.gate(&encode("BV1xx411c7mD", 2));

        let cycle_a = tokio::spawn({
            let rec = rec.clone();
            async move { rec.run_cycle(&PageSnapshot::from_location(VIDEO_A)).await }
        });
        wait_for_calls(&registry, 1).await;

        let cycle_b = tokio::spawn({
            let rec = rec.clone();
            async move { rec.run_cycle(&PageSnapshot::from_location(VIDEO_B)).await }
        });
        wait_for_calls(&registry, 2).await;
        assert_eq!(rec.generation(), 2);

        // Cycle A settles after B started: its result must not show.
        gate_a
            .send(ArchiveStatus::Archived {
                detail_url: "https://archive.org/details/a".to_string(),
            })
            .unwrap();
        assert_eq!(cycle_a.await.unwrap(), CycleOutcome::Superseded);
        assert_eq!(rec.status(), ArchiveStatus::Querying);
        assert_eq!(sink.last().map(|u| u.category), Some(StatusCategory::Querying));

        gate_b.send(ArchiveStatus::NotArchived).unwrap();
        assert!(matches!(
            cycle_b.await.unwrap(),
            CycleOutcome::Settled {
                status: ArchiveStatus::NotArchived,
                ..
            }
        ));
        assert_eq!(rec.status(), ArchiveStatus::NotArchived);
        assert!(sink
            .updates()
            .iter()
            .all(|u| u.category != StatusCategory::Archived));
    }

    #[tokio::test]
    async fn stale_cycle_settling_last_does_not_overwrite() {
        let registry = Arc::new(GatedRegistry::default());
        let sink = Arc::new(MemorySink::new());
        let rec = Arc::new(reconciler(registry.clone(), sink.clone()));

        let gate_a = registry.gate(&encode("BV1HP411D7Rj", 1));
        let gate_b = registry.gate(&encode("BV1xx411c7mD", 2));

        let cycle_a = tokio::spawn({
            let rec = rec.clone();
            async move { rec.run_cycle(&PageSnapshot::from_location(VIDEO_A)).await }
        });
        wait_for_calls(&registry, 1).await;
        let cycle_b = tokio::spawn({
            let rec = rec.clone();
            async move { rec.run_cycle(&PageSnapshot::from_location(VIDEO_B)).await }
        });
        wait_for_calls(&registry, 2).await;

        gate_b.send(ArchiveStatus::NotArchived).unwrap();
        cycle_b.await.unwrap();
        gate_a.send(ArchiveStatus::QueryFailed).unwrap();

        assert_eq!(cycle_a.await.unwrap(), CycleOutcome::Superseded);
        assert_eq!(rec.status(), ArchiveStatus::NotArchived);
        assert_eq!(sink.last().map(|u| u.category), Some(StatusCategory::NotArchived));
    }

    #[tokio::test]
    async fn trigger_sends_canonical_id_without_touching_read_state() {
        let sink = Arc::new(MemorySink::new());
        let archiver = Arc::new(RecordingArchiver {
            accept: true,
            requested: Mutex::new(Vec::new()),
        });
        let rec = reconciler(FixedRegistry::new(ArchiveStatus::NotArchived), sink.clone())
            .with_archiver(archiver.clone());

        rec.run_cycle(&PageSnapshot::from_location(VIDEO_A)).await;
        let outcome = rec
            .trigger_archive(&PageSnapshot::from_location(VIDEO_B))
            .await;

        assert_eq!(
            outcome,
            TriggerOutcome::Requested {
                reference: VideoReference::new("BV1xx411c7mD", 2),
                identifier: encode("BV1xx411c7mD", 2),
            }
        );
        assert_eq!(*archiver.requested.lock().unwrap(), ["BV1xx411c7mD"]);
        assert_eq!(rec.generation(), 1);
        assert_eq!(rec.status(), ArchiveStatus::NotArchived);
        assert_eq!(sink.last().map(|u| u.category), Some(StatusCategory::Triggered));
    }

    #[tokio::test]
    async fn rejected_trigger_is_published() {
        let sink = Arc::new(MemorySink::new());
        let archiver = Arc::new(RecordingArchiver {
            accept: false,
            requested: Mutex::new(Vec::new()),
        });
        let rec = reconciler(FixedRegistry::new(ArchiveStatus::NotArchived), sink.clone())
            .with_archiver(archiver);

        let outcome = rec
            .trigger_archive(&PageSnapshot::from_location(VIDEO_A))
            .await;

        assert!(matches!(outcome, TriggerOutcome::Rejected(_)));
        assert_eq!(sink.last().map(|u| u.category), Some(StatusCategory::Error));
    }

    #[tokio::test]
    async fn trigger_without_archiver_reports_it() {
        let sink = Arc::new(MemorySink::new());
        let rec = reconciler(FixedRegistry::new(ArchiveStatus::NotArchived), sink.clone());

        let outcome = rec
            .trigger_archive(&PageSnapshot::from_location(VIDEO_A))
            .await;

        assert_eq!(outcome, TriggerOutcome::NoArchiver);
        assert!(matches!(
            outcome.into_result(),
            Err(CheckerError::ConfigError(_))
        ));
    }
}
