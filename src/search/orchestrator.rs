//! Single-flight search orchestration
//!
//! `submit` never queues and never cancels the network call it supersedes.
//! Each response is checked against the sequencer before it may touch the
//! published view; a stale success and a stale failure are dropped alike.

use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::RwLock;

use crate::api::{ApiError, IndexService, SearchResponse, SearchResult};

use super::history::QueryHistory;
use super::intent::{FilterSet, IntentSequencer, SearchIntent, SearchMode};

/// What a submit ended up doing
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Response was current and is now the published result set
    Published { sequence: u64, total: usize },
    /// Blank text query: results cleared, nothing sent
    Cleared { sequence: u64 },
    /// Current intent failed; error is published
    Failed { sequence: u64, error: ApiError },
    /// A newer intent was submitted while this one was in flight
    Superseded { sequence: u64 },
}

impl SubmitOutcome {
    pub fn sequence(&self) -> u64 {
        match self {
            SubmitOutcome::Published { sequence, .. }
            | SubmitOutcome::Cleared { sequence }
            | SubmitOutcome::Failed { sequence, .. }
            | SubmitOutcome::Superseded { sequence } => *sequence,
        }
    }

    pub fn is_published(&self) -> bool {
        matches!(self, SubmitOutcome::Published { .. })
    }
}

/// Published search state
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchView {
    /// Sequence of the intent whose outcome is shown (0 = nothing yet)
    pub sequence: u64,
    pub mode: Option<SearchMode>,
    pub query: String,
    pub response: Option<SearchResponse>,
    pub error: Option<String>,
    /// Latest intent still waiting on the service
    pub pending: Option<u64>,
}

impl SearchView {
    pub fn results(&self) -> &[SearchResult] {
        self.response
            .as_ref()
            .map(|r| r.results.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_searching(&self) -> bool {
        self.pending.is_some()
    }
}

pub struct SearchOrchestrator {
    service: Arc<dyn IndexService>,
    history: Arc<QueryHistory>,
    sequencer: IntentSequencer,
    view: RwLock<SearchView>,
    /// Last intent handed to `submit`, kept for retry and filter reset
    last_intent: Mutex<Option<SearchIntent>>,
}

impl SearchOrchestrator {
    pub fn new(service: Arc<dyn IndexService>, history: Arc<QueryHistory>) -> Self {
        Self {
            service,
            history,
            sequencer: IntentSequencer::new(),
            view: RwLock::new(SearchView::default()),
            last_intent: Mutex::new(None),
        }
    }

    pub fn history(&self) -> &Arc<QueryHistory> {
        &self.history
    }

    /// Issue `intent`, superseding anything still in flight
    pub async fn submit(&self, intent: SearchIntent) -> SubmitOutcome {
        let sequence = self.sequencer.next();
        let intent = intent.issued(sequence);
        *self.last_intent.lock().unwrap_or_else(PoisonError::into_inner) = Some(intent.clone());

        if intent.is_blank() {
            let mut view = self.view.write().await;
            if self.sequencer.is_latest(sequence) {
                *view = SearchView {
                    sequence,
                    mode: Some(SearchMode::Text),
                    ..Default::default()
                };
            }
            return SubmitOutcome::Cleared { sequence };
        }

        self.view.write().await.pending = Some(sequence);
        log::debug!(
            "Issuing {:?} search #{} (limit {})",
            intent.mode(),
            sequence,
            intent.result_limit()
        );

        let result = self.dispatch(&intent).await;
        self.settle(&intent, result).await
    }

    async fn dispatch(&self, intent: &SearchIntent) -> Result<SearchResponse, ApiError> {
        match intent.mode() {
            SearchMode::Text => self.service.search(&intent.to_search_query()).await,
            SearchMode::Face => match intent.to_face_query() {
                Some(query) => self.service.face_search(&query).await,
                None => Err(ApiError::InvalidRequest(
                    "Face search requires a reference image".to_string(),
                )),
            },
        }
    }

    async fn settle(
        &self,
        intent: &SearchIntent,
        result: Result<SearchResponse, ApiError>,
    ) -> SubmitOutcome {
        let sequence = intent.sequence();
        let mut view = self.view.write().await;

        if !self.sequencer.is_latest(sequence) {
            log::debug!(
                "Dropping stale search #{} (latest is #{})",
                sequence,
                self.sequencer.latest()
            );
            return SubmitOutcome::Superseded { sequence };
        }

        let outcome = match result {
            Ok(response) => {
                let total = response.results.len();
                *view = SearchView {
                    sequence,
                    mode: Some(intent.mode()),
                    query: intent.query_text().to_string(),
                    response: Some(response),
                    error: None,
                    pending: None,
                };
                SubmitOutcome::Published { sequence, total }
            }
            Err(error) => {
                log::warn!("Search #{} failed: {}", sequence, error);
                *view = SearchView {
                    sequence,
                    mode: Some(intent.mode()),
                    query: intent.query_text().to_string(),
                    response: None,
                    error: Some(error.to_string()),
                    pending: None,
                };
                SubmitOutcome::Failed { sequence, error }
            }
        };
        drop(view);

        if outcome.is_published() && intent.mode() == SearchMode::Text {
            self.history.push(intent.query_text());
        }

        outcome
    }

    /// Drop results and error, and abandon whatever is in flight
    pub async fn clear(&self) {
        let mut view = self.view.write().await;
        self.sequencer.supersede();
        *view = SearchView {
            sequence: self.sequencer.latest(),
            ..Default::default()
        };
    }

    /// Re-issue the last intent as a new one (user-initiated retry)
    pub async fn retry(&self) -> Option<SubmitOutcome> {
        let last = self
            .last_intent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()?;
        Some(self.submit(last).await)
    }

    /// Clear the filters; re-run the last text query if there was one
    pub async fn reset_filters(&self) -> Option<SubmitOutcome> {
        let last = self
            .last_intent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()?;

        if last.mode() != SearchMode::Text || last.is_blank() {
            return None;
        }

        Some(self.submit(last.with_filters(FilterSet::default())).await)
    }

    pub async fn snapshot(&self) -> SearchView {
        self.view.read().await.clone()
    }

    pub async fn results(&self) -> Vec<SearchResult> {
        self.view.read().await.results().to_vec()
    }

    pub fn latest_sequence(&self) -> u64 {
        self.sequencer.latest()
    }
}
