//! Search intents and the stale-response guard
//!
//! A [`SearchIntent`] is one logical search request. It receives its sequence
//! number from an [`IntentSequencer`] when it is issued and is never mutated
//! afterwards; changing a parameter means building a new intent.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::api::{FaceQuery, ReferenceImage, SearchQuery};

/// Default result-count cap for a search
pub const DEFAULT_RESULT_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Text,
    Face,
}

/// Optional constraints; absence means no constraint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct FilterSet {
    pub file_type: Option<String>,
    pub extension: Option<String>,
    pub folder_path: Option<String>,
    /// 0-100, 0 = no minimum
    pub min_score: u8,
}

impl FilterSet {
    /// Blank strings become `None`, `min_score` is capped at 100
    pub fn normalized(self) -> Self {
        Self {
            file_type: non_blank(self.file_type),
            extension: non_blank(self.extension),
            folder_path: non_blank(self.folder_path),
            min_score: self.min_score.min(100),
        }
    }

    pub fn active_count(&self) -> usize {
        [
            self.file_type.is_some(),
            self.extension.is_some(),
            self.folder_path.is_some(),
            self.min_score > 0,
        ]
        .iter()
        .filter(|active| **active)
        .count()
    }

    pub fn is_empty(&self) -> bool {
        self.active_count() == 0
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Reference image plus the similarity threshold it was issued with
#[derive(Debug, Clone, PartialEq)]
pub struct FaceReference {
    pub image: ReferenceImage,
    /// Percentage, 0-100
    pub threshold_percent: u8,
}

/// One logical search request
#[derive(Debug, Clone, PartialEq)]
pub struct SearchIntent {
    query_text: String,
    filters: FilterSet,
    mode: SearchMode,
    result_limit: usize,
    text_only: bool,
    face: Option<FaceReference>,
    sequence: u64,
}

impl SearchIntent {
    /// Text/visual search; the query is trimmed
    pub fn text(query: impl AsRef<str>) -> Self {
        Self {
            query_text: query.as_ref().trim().to_string(),
            filters: FilterSet::default(),
            mode: SearchMode::Text,
            result_limit: DEFAULT_RESULT_LIMIT,
            text_only: false,
            face: None,
            sequence: 0,
        }
    }

    /// Face search against a reference image
    pub fn face(image: ReferenceImage, threshold_percent: u8) -> Self {
        Self {
            query_text: String::new(),
            filters: FilterSet::default(),
            mode: SearchMode::Face,
            result_limit: DEFAULT_RESULT_LIMIT,
            text_only: false,
            face: Some(FaceReference {
                image,
                threshold_percent: threshold_percent.min(100),
            }),
            sequence: 0,
        }
    }

    pub fn with_filters(mut self, filters: FilterSet) -> Self {
        self.filters = filters.normalized();
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.result_limit = limit.max(1);
        self
    }

    pub fn with_text_only(mut self, text_only: bool) -> Self {
        self.text_only = text_only;
        self
    }

    /// Stamp the sequence number; only the orchestrator issues intents
    pub(crate) fn issued(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn query_text(&self) -> &str {
        &self.query_text
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    pub fn mode(&self) -> SearchMode {
        self.mode
    }

    pub fn result_limit(&self) -> usize {
        self.result_limit
    }

    pub fn is_text_only(&self) -> bool {
        self.text_only
    }

    pub fn face_reference(&self) -> Option<&FaceReference> {
        self.face.as_ref()
    }

    /// 0 until issued
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// A text intent with nothing to search for
    pub fn is_blank(&self) -> bool {
        self.mode == SearchMode::Text && self.query_text.is_empty()
    }

    pub fn to_search_query(&self) -> SearchQuery {
        SearchQuery {
            query: self.query_text.clone(),
            n_results: self.result_limit,
            file_type: self.filters.file_type.clone(),
            extension: self.filters.extension.clone(),
            folder_path: self.filters.folder_path.clone(),
            min_score: (self.filters.min_score > 0).then_some(self.filters.min_score),
            text_only: self.text_only,
        }
    }

    /// `None` for text intents
    pub fn to_face_query(&self) -> Option<FaceQuery> {
        self.face.as_ref().map(|face| FaceQuery {
            image: face.image.clone(),
            n_results: self.result_limit,
            threshold: f32::from(face.threshold_percent) / 100.0,
            folder_path: self.filters.folder_path.clone(),
        })
    }
}

/// Monotonic counter deciding which response is still wanted
///
/// Only the most recently issued sequence number is current; anything
/// older is stale and its response must be dropped.
#[derive(Debug, Default)]
pub struct IntentSequencer {
    counter: AtomicU64,
}

impl IntentSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next sequence number, superseding every earlier one
    pub fn next(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn latest(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }

    pub fn is_latest(&self, sequence: u64) -> bool {
        sequence == self.latest()
    }

    /// Invalidate everything in flight without issuing a request
    pub fn supersede(&self) {
        self.next();
    }
}
