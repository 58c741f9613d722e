//! Smart folder refresh engine
//!
//! Every evaluation of a smart folder carries a per-folder generation number.
//! Starting a new evaluation bumps the generation and cancels the previous
//! run's token, and a finished run is applied only while its generation is
//! still the latest. A superseded run therefore never becomes visible.
//!
//! Scheduled refreshes wait out a debounce window first, so a burst of
//! triggers for one folder collapses into a single evaluation.

use crate::config::FolderConfig;
use crate::error::{FolderError, FolderResult};
use crate::models::{CriteriaExpression, DocumentSummary};
use crate::services::criteria_evaluator::{CriteriaEvaluator, MatchSummary};
use crate::store::DocumentStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Last successfully applied evaluation of one smart folder
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartSnapshot {
    pub folder_id: String,
    pub generation: u64,
    /// Criteria the snapshot was evaluated against
    pub criteria: CriteriaExpression,
    pub matched_ids: Vec<String>,
    /// Matched documents in collection order
    pub documents: Vec<DocumentSummary>,
    pub summary: MatchSummary,
    pub evaluated_at: DateTime<Utc>,
}

/// Refresh lifecycle notification
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RefreshEvent {
    Applied {
        #[serde(rename = "folderId")]
        folder_id: String,
        generation: u64,
        #[serde(rename = "matchedCount")]
        matched_count: usize,
    },
    Superseded {
        #[serde(rename = "folderId")]
        folder_id: String,
        generation: u64,
    },
    Failed {
        #[serde(rename = "folderId")]
        folder_id: String,
        generation: u64,
        reason: String,
    },
}

/// How a single evaluation run ended
#[derive(Debug)]
pub enum RefreshOutcome {
    Applied(SmartSnapshot),
    /// A newer run was requested before this one could be applied
    Superseded,
    Failed(FolderError),
}

/// How the run that superseded a reader's own run ended
enum NewerResult {
    Applied(SmartSnapshot),
    Failed(String),
    Removed,
}

/// Answer for a caller that needs the folder's members right now
#[derive(Debug, Clone)]
pub struct SnapshotRead {
    pub snapshot: SmartSnapshot,
    /// The snapshot predates a failed or superseded evaluation
    pub stale: bool,
}

#[derive(Default)]
struct FolderRefreshState {
    generation: u64,
    cancel: Option<CancellationToken>,
    snapshot: Option<SmartSnapshot>,
}

/// Debounced, cancelable re-evaluation of smart folders
pub struct SmartFolderRefresher {
    documents: Arc<dyn DocumentStore>,
    evaluator: CriteriaEvaluator,
    debounce: Duration,
    states: RwLock<HashMap<String, FolderRefreshState>>,
    events: broadcast::Sender<RefreshEvent>,
}

impl SmartFolderRefresher {
    pub fn new(documents: Arc<dyn DocumentStore>, config: &FolderConfig) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            documents,
            evaluator: CriteriaEvaluator::from_config(config),
            debounce: config.refresh_debounce(),
            states: RwLock::new(HashMap::new()),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RefreshEvent> {
        self.events.subscribe()
    }

    /// Last applied snapshot, if any
    pub async fn snapshot(&self, folder_id: &str) -> Option<SmartSnapshot> {
        let states = self.states.read().await;
        states.get(folder_id).and_then(|s| s.snapshot.clone())
    }

    /// Latest requested generation for a folder, 0 if never requested
    pub async fn generation(&self, folder_id: &str) -> u64 {
        let states = self.states.read().await;
        states.get(folder_id).map(|s| s.generation).unwrap_or(0)
    }

    /// Schedule a debounced refresh in the background.
    /// Supersedes whatever is pending or running for the same folder.
    pub async fn schedule(
        self: &Arc<Self>,
        folder_id: &str,
        criteria: CriteriaExpression,
    ) -> JoinHandle<RefreshOutcome> {
        let (generation, token) = self.begin(folder_id).await;
        debug!(
            "Smart folder refresh scheduled: {} (generation {})",
            folder_id, generation
        );
        let this = Arc::clone(self);
        let folder_id = folder_id.to_string();
        tokio::spawn(async move {
            this.run(&folder_id, &criteria, generation, token, this.debounce)
                .await
        })
    }

    /// Evaluate immediately and return the freshest result available.
    ///
    /// When a newer request supersedes this run, the caller waits for that
    /// request's outcome instead. Failures fall back to the last applied
    /// snapshot for the same criteria, marked stale; with no such snapshot
    /// the caller gets `EvaluationUnavailable`.
    pub async fn evaluate_now(
        &self,
        folder_id: &str,
        criteria: &CriteriaExpression,
    ) -> FolderResult<SnapshotRead> {
        let mut events = self.events.subscribe();
        let (generation, token) = self.begin(folder_id).await;
        let reason = match self
            .run(folder_id, criteria, generation, token, Duration::ZERO)
            .await
        {
            RefreshOutcome::Applied(snapshot) => {
                return Ok(SnapshotRead {
                    snapshot,
                    stale: false,
                })
            }
            RefreshOutcome::Failed(e) => e.to_string(),
            RefreshOutcome::Superseded => {
                match self.await_newer(folder_id, generation, &mut events).await {
                    NewerResult::Applied(snapshot) => {
                        return Ok(SnapshotRead {
                            snapshot,
                            stale: false,
                        })
                    }
                    NewerResult::Failed(reason) => reason,
                    NewerResult::Removed => {
                        return Err(FolderError::FolderNotFound(folder_id.to_string()))
                    }
                }
            }
        };
        match self.snapshot(folder_id).await {
            Some(snapshot) if snapshot.criteria == *criteria => Ok(SnapshotRead {
                snapshot,
                stale: true,
            }),
            _ => Err(FolderError::EvaluationUnavailable { reason }),
        }
    }

    /// Wait until a run newer than `generation` is applied, or until the
    /// latest run fails or the folder's state is dropped.
    async fn await_newer(
        &self,
        folder_id: &str,
        generation: u64,
        events: &mut broadcast::Receiver<RefreshEvent>,
    ) -> NewerResult {
        loop {
            {
                let states = self.states.read().await;
                let Some(state) = states.get(folder_id) else {
                    return NewerResult::Removed;
                };
                if let Some(snapshot) = &state.snapshot {
                    if snapshot.generation > generation {
                        return NewerResult::Applied(snapshot.clone());
                    }
                }
            }
            match events.recv().await {
                Ok(RefreshEvent::Failed {
                    folder_id: failed,
                    generation: failed_generation,
                    reason,
                }) if failed == folder_id && failed_generation > generation => {
                    if failed_generation == self.generation(folder_id).await {
                        return NewerResult::Failed(reason);
                    }
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => {
                    return NewerResult::Failed("refresh events closed".to_string())
                }
            }
        }
    }

    /// Cancel any run and drop all state for a folder
    pub async fn forget(&self, folder_id: &str) {
        let mut states = self.states.write().await;
        if let Some(state) = states.remove(folder_id) {
            if let Some(token) = state.cancel {
                token.cancel();
            }
            debug!("Smart folder refresh state dropped: {}", folder_id);
        }
    }

    /// Bump the generation and cancel the previous run
    async fn begin(&self, folder_id: &str) -> (u64, CancellationToken) {
        let mut states = self.states.write().await;
        let state = states.entry(folder_id.to_string()).or_default();
        if let Some(previous) = state.cancel.take() {
            previous.cancel();
        }
        state.generation += 1;
        let token = CancellationToken::new();
        state.cancel = Some(token.clone());
        (state.generation, token)
    }

    async fn run(
        &self,
        folder_id: &str,
        criteria: &CriteriaExpression,
        generation: u64,
        token: CancellationToken,
        debounce: Duration,
    ) -> RefreshOutcome {
        if !debounce.is_zero() {
            tokio::select! {
                _ = token.cancelled() => return self.superseded(folder_id, generation),
                _ = tokio::time::sleep(debounce) => {}
            }
        }

        let fetched = tokio::select! {
            _ = token.cancelled() => return self.superseded(folder_id, generation),
            result = self.documents.list_documents(None) => result,
        };
        let documents = match fetched {
            Ok(documents) => documents,
            Err(e) => {
                let error = FolderError::EvaluationUnavailable {
                    reason: e.to_string(),
                };
                warn!(
                    "Smart folder {} evaluation failed (generation {}): {}",
                    folder_id, generation, error
                );
                let _ = self.events.send(RefreshEvent::Failed {
                    folder_id: folder_id.to_string(),
                    generation,
                    reason: error.to_string(),
                });
                return RefreshOutcome::Failed(error);
            }
        };

        let Some(result) = self
            .evaluator
            .evaluate_cancellable(criteria, &documents, &token)
            .await
        else {
            return self.superseded(folder_id, generation);
        };

        let matched: HashSet<&str> = result.matched_ids.iter().map(String::as_str).collect();
        let members: Vec<DocumentSummary> = documents
            .iter()
            .filter(|d| matched.contains(d.id.as_str()))
            .map(DocumentSummary::from)
            .collect();
        let snapshot = SmartSnapshot {
            folder_id: folder_id.to_string(),
            generation,
            criteria: criteria.clone(),
            documents: members,
            matched_ids: result.matched_ids,
            summary: result.summary,
            evaluated_at: Utc::now(),
        };

        {
            let mut states = self.states.write().await;
            let Some(state) = states.get_mut(folder_id) else {
                // Forgotten while running
                return self.superseded(folder_id, generation);
            };
            if state.generation != generation || token.is_cancelled() {
                drop(states);
                return self.superseded(folder_id, generation);
            }
            state.snapshot = Some(snapshot.clone());
            state.cancel = None;
        }

        info!(
            "Smart folder {} refreshed: {} matches (generation {})",
            folder_id, snapshot.summary.matched_count, generation
        );
        let _ = self.events.send(RefreshEvent::Applied {
            folder_id: folder_id.to_string(),
            generation,
            matched_count: snapshot.summary.matched_count,
        });
        RefreshOutcome::Applied(snapshot)
    }

    fn superseded(&self, folder_id: &str, generation: u64) -> RefreshOutcome {
        debug!(
            "Smart folder {} evaluation superseded (generation {})",
            folder_id, generation
        );
        let _ = self.events.send(RefreshEvent::Superseded {
            folder_id: folder_id.to_string(),
            generation,
        });
        RefreshOutcome::Superseded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CriteriaBuilder, DocumentDescriptor};
    use crate::store::MemoryDocumentStore;

    fn documents() -> Vec<DocumentDescriptor> {
        vec![
            DocumentDescriptor::new("d1", "1", "pdf", 2048),
            DocumentDescriptor::new("d2", "2", "docx", 2048),
            DocumentDescriptor::new("d3", "3", "pdf", 10),
        ]
    }

    fn refresher(store: MemoryDocumentStore, debounce_ms: u64) -> Arc<SmartFolderRefresher> {
        let config = FolderConfig {
            refresh_debounce_ms: debounce_ms,
            ..FolderConfig::default()
        };
        Arc::new(SmartFolderRefresher::new(Arc::new(store), &config))
    }

    fn pdf() -> CriteriaExpression {
        CriteriaBuilder::new().document_type("pdf").build().unwrap()
    }

    fn docx() -> CriteriaExpression {
        CriteriaBuilder::new().document_type("docx").build().unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_request_cancels_in_flight_evaluation() {
        let store = MemoryDocumentStore::with_documents(documents())
            .with_latency(Duration::from_millis(100));
        let refresher = refresher(store, 0);
        let mut events = refresher.subscribe();

        let first = refresher.schedule("f", pdf()).await;
        // First run is now waiting on the document fetch
        tokio::time::sleep(Duration::from_millis(50)).await;
        let second = refresher.schedule("f", docx()).await;

        assert!(matches!(first.await.unwrap(), RefreshOutcome::Superseded));
        let RefreshOutcome::Applied(snapshot) = second.await.unwrap() else {
            panic!("newest evaluation should apply");
        };
        assert_eq!(snapshot.generation, 2);
        assert_eq!(snapshot.matched_ids, vec!["d2".to_string()]);

        let mut applied = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let RefreshEvent::Applied { generation, .. } = event {
                applied.push(generation);
            }
        }
        assert_eq!(applied, vec![2]);
        assert_eq!(refresher.snapshot("f").await.unwrap().generation, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_is_coalesced_by_debounce() {
        let refresher = refresher(MemoryDocumentStore::with_documents(documents()), 300);
        let mut handles = Vec::new();
        for _ in 0..5 {
            handles.push(refresher.schedule("f", pdf()).await);
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        let mut applied = 0;
        let mut superseded = 0;
        for handle in handles {
            match handle.await.unwrap() {
                RefreshOutcome::Applied(snapshot) => {
                    applied += 1;
                    assert_eq!(snapshot.generation, 5);
                    assert_eq!(snapshot.summary.matched_count, 2);
                }
                RefreshOutcome::Superseded => superseded += 1,
                RefreshOutcome::Failed(e) => panic!("unexpected failure: {}", e),
            }
        }
        assert_eq!((applied, superseded), (1, 4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_folders_are_independent() {
        let refresher = refresher(MemoryDocumentStore::with_documents(documents()), 300);
        let a = refresher.schedule("a", pdf()).await;
        let b = refresher.schedule("b", docx()).await;
        assert!(matches!(a.await.unwrap(), RefreshOutcome::Applied(_)));
        assert!(matches!(b.await.unwrap(), RefreshOutcome::Applied(_)));
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_last_known_good() {
        let store = Arc::new(MemoryDocumentStore::with_documents(documents()));
        let refresher = SmartFolderRefresher::new(store.clone(), &FolderConfig::default());

        let fresh = refresher.evaluate_now("f", &pdf()).await.unwrap();
        assert!(!fresh.stale);
        assert_eq!(fresh.snapshot.summary.matched_count, 2);

        store.set_available(false);
        let stale = refresher.evaluate_now("f", &pdf()).await.unwrap();
        assert!(stale.stale);
        assert_eq!(stale.snapshot, fresh.snapshot);

        // A snapshot taken for other criteria is never served
        let err = refresher.evaluate_now("f", &docx()).await.unwrap_err();
        assert!(matches!(err, FolderError::EvaluationUnavailable { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_reads_both_get_newest_result() {
        let store = MemoryDocumentStore::with_documents(documents())
            .with_latency(Duration::from_millis(50));
        let refresher = refresher(store, 0);

        let (criteria_a, criteria_b) = (pdf(), pdf());
        let (first, second) = tokio::join!(
            refresher.evaluate_now("f", &criteria_a),
            refresher.evaluate_now("f", &criteria_b)
        );
        let first = first.unwrap();
        let second = second.unwrap();
        assert!(!first.stale);
        assert!(!second.stale);
        assert_eq!(first.snapshot.generation, 2);
        assert_eq!(first.snapshot, second.snapshot);
        assert_eq!(first.snapshot.summary.matched_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiting_read_sees_forget() {
        let store = MemoryDocumentStore::with_documents(documents())
            .with_latency(Duration::from_millis(50));
        let refresher = refresher(store, 300);

        let read = {
            let refresher = refresher.clone();
            tokio::spawn(async move { refresher.evaluate_now("f", &pdf()).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        // Supersede the read with a debounced run, then drop the folder
        let pending = refresher.schedule("f", pdf()).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        refresher.forget("f").await;

        assert!(matches!(pending.await.unwrap(), RefreshOutcome::Superseded));
        let err = read.await.unwrap().unwrap_err();
        assert!(matches!(err, FolderError::FolderNotFound(_)));
    }

    #[tokio::test]
    async fn test_fetch_failure_without_snapshot_is_unavailable() {
        let store = MemoryDocumentStore::with_documents(documents());
        store.set_available(false);
        let refresher = SmartFolderRefresher::new(Arc::new(store), &FolderConfig::default());
        let err = refresher.evaluate_now("f", &pdf()).await.unwrap_err();
        assert!(matches!(err, FolderError::EvaluationUnavailable { .. }));
        assert!(err.is_transient());
    }

    #[tokio::test(start_paused = true)]
    async fn test_forget_cancels_pending_refresh() {
        let refresher = refresher(MemoryDocumentStore::with_documents(documents()), 300);
        refresher.evaluate_now("f", &pdf()).await.unwrap();
        let pending = refresher.schedule("f", docx()).await;
        refresher.forget("f").await;

        assert!(matches!(pending.await.unwrap(), RefreshOutcome::Superseded));
        assert!(refresher.snapshot("f").await.is_none());
        assert_eq!(refresher.generation("f").await, 0);
    }
}
