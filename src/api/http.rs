//! HTTP client for the FindMyFile service
//!
//! Connects to a running service (default: 127.0.0.1:8000). All API routes
//! live under `/api`; the health probe hits the bare origin.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::service::{ApiError, FaceQuery, IndexService, SearchQuery};
use super::types::{
    Acknowledgement, IndexProgress, ScanResult, SearchResponse, SearchStats, ServiceSettings,
};

/// Service connection configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    /// Origin of the service, without the `/api` prefix
    pub base_url: String,
    pub timeout_secs: u64,
    pub health_timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            timeout_secs: 30,
            health_timeout_secs: 10,
        }
    }
}

impl ServiceConfig {
    pub fn origin(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }
}

/// Search request body
#[derive(Debug, Serialize)]
struct SearchBody<'a> {
    query: &'a str,
    n_results: usize,
    file_type: Option<&'a str>,
    extension: Option<&'a str>,
    folder_path: Option<&'a str>,
    min_score: Option<u8>,
    text_only: bool,
}

impl<'a> From<&'a SearchQuery> for SearchBody<'a> {
    fn from(q: &'a SearchQuery) -> Self {
        Self {
            query: &q.query,
            n_results: q.n_results,
            file_type: q.file_type.as_deref(),
            extension: q.extension.as_deref(),
            folder_path: q.folder_path.as_deref(),
            min_score: q.min_score,
            text_only: q.text_only,
        }
    }
}

#[derive(Debug, Serialize)]
struct PathsBody<'a> {
    paths: &'a [String],
}

/// FastAPI-style error body
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: String,
}

/// reqwest-backed [`IndexService`]
pub struct HttpIndexService {
    config: ServiceConfig,
    client: Client,
}

impl HttpIndexService {
    pub fn new(config: ServiceConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    pub fn with_default_config() -> Result<Self, ApiError> {
        Self::new(ServiceConfig::default())
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api{}", self.config.origin(), path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request.send().await.map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(service_error(status.as_u16(), &body));
        }

        Ok(response)
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        self.send(request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.fetch(self.client.get(self.api_url(path))).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.fetch(self.client.post(self.api_url(path))).await
    }
}

fn map_transport_error(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Unreachable(format!("Request timed out: {}", e))
    } else if e.is_builder() {
        ApiError::InvalidRequest(e.to_string())
    } else {
        ApiError::Unreachable(format!("Cannot connect to FindMyFile service: {}", e))
    }
}

/// Prefer the service's `detail` message, fall back to the raw body
fn service_error(status: u16, body: &str) -> ApiError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.detail)
        .unwrap_or_else(|_| body.trim().to_string());

    ApiError::Service { status, message }
}

/// Query parameters for the face search endpoint
fn face_params(query: &FaceQuery) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("n_results", query.n_results.to_string()),
        ("min_similarity", format!("{:.2}", query.threshold)),
    ];
    if let Some(folder) = &query.folder_path {
        params.push(("folder_path", folder.clone()));
    }
    params
}

#[async_trait]
impl IndexService for HttpIndexService {
    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, ApiError> {
        let body = SearchBody::from(query);
        self.fetch(self.client.post(self.api_url("/search/")).json(&body))
            .await
    }

    async fn face_search(&self, query: &FaceQuery) -> Result<SearchResponse, ApiError> {
        let part = Part::bytes(query.image.data.to_vec())
            .file_name(query.image.file_name.clone())
            .mime_str(&query.image.content_type)
            .map_err(|e| ApiError::InvalidRequest(format!("Bad image type: {}", e)))?;
        let form = Form::new().part("file", part);

        let request = self
            .client
            .post(self.api_url("/search/face"))
            .query(&face_params(query))
            .multipart(form);

        self.fetch(request).await
    }

    async fn start_indexing(&self, paths: &[String]) -> Result<Acknowledgement, ApiError> {
        let request = self
            .client
            .post(self.api_url("/index/start"))
            .json(&PathsBody { paths });
        self.fetch(request).await
    }

    async fn cancel_indexing(&self) -> Result<Acknowledgement, ApiError> {
        self.post("/index/cancel").await
    }

    async fn scan(&self, paths: &[String]) -> Result<ScanResult, ApiError> {
        let request = self
            .client
            .post(self.api_url("/index/scan"))
            .json(&PathsBody { paths });
        self.fetch(request).await
    }

    async fn progress(&self) -> Result<IndexProgress, ApiError> {
        self.get("/index/progress").await
    }

    async fn settings(&self) -> Result<ServiceSettings, ApiError> {
        self.get("/settings/").await
    }

    async fn clear_index(&self) -> Result<Acknowledgement, ApiError> {
        self.post("/settings/clear-index").await
    }

    async fn stats(&self) -> Result<SearchStats, ApiError> {
        self.get("/search/stats").await
    }

    async fn ping(&self) -> Result<(), ApiError> {
        let url = format!("{}/", self.config.origin());
        let request = self.client.get(url).timeout(self.config.health_timeout());
        self.send(request).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::service::ReferenceImage;
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    #[test]
    fn test_search_body_serialization() {
        let query = SearchQuery {
            query: "receipts from march".to_string(),
            n_results: 50,
            extension: Some(".pdf".to_string()),
            ..Default::default()
        };

        let json = serde_json::to_value(SearchBody::from(&query)).unwrap();
        assert_eq!(json["query"], "receipts from march");
        assert_eq!(json["n_results"], 50);
        assert_eq!(json["extension"], ".pdf");
        assert!(json["file_type"].is_null());
        assert!(json["min_score"].is_null());
        assert_eq!(json["text_only"], false);
    }

    #[test]
    fn test_service_error_prefers_detail() {
        let err = service_error(400, r#"{"detail": "No face found in image"}"#);
        assert_eq!(
            err,
            ApiError::Service {
                status: 400,
                message: "No face found in image".to_string()
            }
        );

        let raw = service_error(500, "Internal Server Error\n");
        assert_eq!(raw.to_string(), "API Error 500: Internal Server Error");
    }

    #[test]
    fn test_api_url_trims_trailing_slash() {
        let service = HttpIndexService::new(ServiceConfig {
            base_url: "http://localhost:9000/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(service.api_url("/index/progress"), "http://localhost:9000/api/index/progress");
    }

    fn face_query(threshold: f32, folder: Option<&str>) -> FaceQuery {
        FaceQuery {
            image: ReferenceImage::new("me.jpg", vec![0xFF, 0xD8, 0xFF]),
            n_results: 50,
            threshold,
            folder_path: folder.map(str::to_string),
        }
    }

    #[test]
    fn test_face_params_use_min_similarity() {
        let params = face_params(&face_query(0.75, Some("/photos")));
        assert_eq!(
            params,
            vec![
                ("n_results", "50".to_string()),
                ("min_similarity", "0.75".to_string()),
                ("folder_path", "/photos".to_string()),
            ]
        );
        assert!(face_params(&face_query(0.5, None))
            .iter()
            .all(|(k, _)| *k != "folder_path"));
    }

    #[tokio::test]
    async fn test_face_search_request_line() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (read, mut write) = socket.into_split();
            let mut reader = BufReader::new(read);

            let mut request_line = String::new();
            reader.read_line(&mut request_line).await.unwrap();

            // Drain headers and the multipart body before replying
            let mut content_length = 0usize;
            loop {
                let mut header = String::new();
                reader.read_line(&mut header).await.unwrap();
                let header = header.trim_end();
                if header.is_empty() {
                    break;
                }
                if let Some((name, value)) = header.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap();
                    }
                }
            }
            let mut body = vec![0u8; content_length];
            reader.read_exact(&mut body).await.unwrap();

            let body = r#"{"query": "", "total_results": 0, "results": []}"#;
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            write.write_all(response.as_bytes()).await.unwrap();
            write.shutdown().await.unwrap();
            request_line.trim_end().to_string()
        });

        let service = HttpIndexService::new(ServiceConfig {
            base_url: format!("http://{}", addr),
            timeout_secs: 5,
            health_timeout_secs: 5,
        })
        .unwrap();

        let response = service.face_search(&face_query(0.75, None)).await.unwrap();
        assert_eq!(response.total_results, 0);

        let request_line = server.await.unwrap();
        assert!(request_line.starts_with("POST /api/search/face?"), "{}", request_line);
        assert!(request_line.contains("min_similarity=0.75"), "{}", request_line);
        assert!(!request_line.contains("threshold="), "{}", request_line);
    }

    #[tokio::test]
    async fn test_unreachable_service_maps_to_unreachable() {
        // Port 9 (discard) is closed on any sane test host
        let service = HttpIndexService::new(ServiceConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
            health_timeout_secs: 2,
        })
        .unwrap();

        let err = service.progress().await.unwrap_err();
        assert!(err.is_unreachable(), "unexpected error: {:?}", err);
    }
}
