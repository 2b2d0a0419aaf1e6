//! Wire types for the FindMyFile service
//!
//! Field names follow the service's JSON (snake_case). Every payload is an
//! immutable snapshot of service output; the client never edits them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Why a result matched the query
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MatchType {
    #[serde(rename = "visual")]
    Visual,
    #[serde(rename = "text")]
    Text,
    #[serde(rename = "visual+text")]
    VisualText,
    #[serde(rename = "face")]
    Face,
}

/// Bounding box of a detected face, in source image pixels
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FaceBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

/// A single search hit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// Stable across searches
    pub file_id: String,
    pub filepath: String,
    pub filename: String,
    #[serde(default)]
    pub extension: String,
    #[serde(default)]
    pub file_type: String,
    #[serde(default)]
    pub size_mb: f64,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub modified: String,
    /// 0-100
    #[serde(default)]
    pub relevance_score: f64,
    #[serde(default)]
    pub date_taken: Option<String>,
    #[serde(default)]
    pub camera_model: Option<String>,
    #[serde(default)]
    pub ocr_text: Option<String>,
    #[serde(default)]
    pub match_type: Option<MatchType>,
    #[serde(default)]
    pub face_box: Option<FaceBox>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl SearchResult {
    pub fn is_image(&self) -> bool {
        self.file_type == "image"
    }
}

/// Response shape shared by text and face search
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SearchResponse {
    /// The query as the service understood it (empty for face search)
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub total_results: usize,
    #[serde(default)]
    pub results: Vec<SearchResult>,
}

/// Snapshot of the background indexing job
///
/// Replaced wholesale on every poll.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct IndexProgress {
    pub total_files: u64,
    pub processed: u64,
    pub skipped: u64,
    pub failed: u64,
    pub is_running: bool,
    pub percent_complete: f64,
    pub files_per_second: f64,
    pub eta_seconds: f64,
    pub elapsed_seconds: f64,
    pub current_file: String,
    pub error_count: u64,
    pub faces_found: u64,
    pub ocr_extracted: u64,
}

impl IndexProgress {
    /// A run that actually finished, as opposed to a reset or never-started job
    pub fn has_finished(&self) -> bool {
        !self.is_running && self.total_files > 0 && self.processed > 0
    }

    /// Nothing running and nothing ever counted
    pub fn is_idle(&self) -> bool {
        !self.is_running && self.total_files == 0
    }

    /// Partial failures inside an otherwise healthy run
    pub fn has_warnings(&self) -> bool {
        self.error_count > 0 || self.failed > 0
    }
}

/// Dry-run scan result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ScanResult {
    pub total_files: u64,
    /// Per-category counts ("image", "document", ...)
    #[serde(default)]
    pub breakdown: BTreeMap<String, u64>,
}

/// Service-side settings (read only from the client's point of view)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ServiceSettings {
    pub indexed_folders: Vec<String>,
    pub total_indexed_files: u64,
    pub excluded_folders: Vec<String>,
    pub image_extensions: Vec<String>,
    pub document_extensions: Vec<String>,
    pub video_extensions_excluded: Vec<String>,
    pub batch_size: u32,
    pub max_file_size_mb: f64,
    pub data_dir: String,
    pub chroma_dir: String,
    pub thumbnails_dir: String,
}

/// Search index statistics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SearchStats {
    pub total_files: u64,
    #[serde(default)]
    pub persist_dir: String,
}

/// Generic `{status, message}` acknowledgement
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Acknowledgement {
    pub status: String,
    pub message: Option<String>,
}
