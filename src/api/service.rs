//! Service trait and error types
//!
//! Every component talks to the remote indexing/search service through
//! [`IndexService`], so the orchestration core can be exercised against a
//! scripted fake as easily as against the real HTTP client.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::types::{
    Acknowledgement, IndexProgress, ScanResult, SearchResponse, SearchStats, ServiceSettings,
};

/// Error types for service operations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ApiError {
    /// Service could not be reached or timed out
    Unreachable(String),
    /// Service answered with a non-success status
    Service { status: u16, message: String },
    /// Response body could not be decoded
    InvalidResponse(String),
    /// Request rejected before it was sent
    InvalidRequest(String),
}

impl ApiError {
    /// Transient connectivity failure (as opposed to a service-reported one)
    pub fn is_unreachable(&self) -> bool {
        matches!(self, ApiError::Unreachable(_))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Unreachable(msg) => write!(f, "Backend unreachable: {}", msg),
            ApiError::Service { status, message } => {
                write!(f, "API Error {}: {}", status, message)
            }
            ApiError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
            ApiError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

/// Text/visual search request
#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct SearchQuery {
    pub query: String,
    pub n_results: usize,
    pub file_type: Option<String>,
    pub extension: Option<String>,
    pub folder_path: Option<String>,
    /// `None` means no minimum
    pub min_score: Option<u8>,
    pub text_only: bool,
}

/// A reference image held in memory so it can be re-sent without re-selecting it
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceImage {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl ReferenceImage {
    pub fn new(file_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let file_name = file_name.into();
        let content_type = guess_image_type(&file_name).to_string();
        Self {
            file_name,
            content_type,
            data: data.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

fn guess_image_type(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "heic" => "image/heic",
        _ => "application/octet-stream",
    }
}

/// Face similarity search request
#[derive(Debug, Clone, PartialEq)]
pub struct FaceQuery {
    pub image: ReferenceImage,
    pub n_results: usize,
    /// Similarity threshold as a fraction (0-1)
    pub threshold: f32,
    pub folder_path: Option<String>,
}

/// The remote indexing/search service
#[async_trait]
pub trait IndexService: Send + Sync {
    /// Natural-language search over the index
    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, ApiError>;

    /// Search by reference face
    async fn face_search(&self, query: &FaceQuery) -> Result<SearchResponse, ApiError>;

    /// Start indexing the given root paths
    async fn start_indexing(&self, paths: &[String]) -> Result<Acknowledgement, ApiError>;

    /// Ask the service to cancel the running job
    async fn cancel_indexing(&self) -> Result<Acknowledgement, ApiError>;

    /// Dry-run count of the files under the given roots
    async fn scan(&self, paths: &[String]) -> Result<ScanResult, ApiError>;

    /// Current job progress
    async fn progress(&self) -> Result<IndexProgress, ApiError>;

    async fn settings(&self) -> Result<ServiceSettings, ApiError>;

    /// Delete all indexed data on the service
    async fn clear_index(&self) -> Result<Acknowledgement, ApiError>;

    async fn stats(&self) -> Result<SearchStats, ApiError>;

    /// Reachability probe; callers bound it with their own timeout
    async fn ping(&self) -> Result<(), ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ApiError::Service {
            status: 404,
            message: "No face detected".to_string(),
        };
        assert_eq!(err.to_string(), "API Error 404: No face detected");
        assert!(!err.is_unreachable());
        assert!(ApiError::Unreachable("refused".into()).is_unreachable());
    }

    #[test]
    fn test_reference_image_content_type() {
        let img = ReferenceImage::new("Portrait.JPG", vec![1u8, 2, 3]);
        assert_eq!(img.content_type, "image/jpeg");
        assert_eq!(img.len(), 3);

        let unknown = ReferenceImage::new("face", Vec::<u8>::new());
        assert_eq!(unknown.content_type, "application/octet-stream");
        assert!(unknown.is_empty());
    }
}
