//! Scripted in-memory service used by unit tests

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::oneshot;

use super::service::{ApiError, FaceQuery, IndexService, SearchQuery};
use super::types::{
    Acknowledgement, IndexProgress, ScanResult, SearchResponse, SearchResult, SearchStats,
    ServiceSettings,
};

type Reply = Result<SearchResponse, ApiError>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PingBehavior {
    Ok,
    Fail,
    Hang,
}

pub struct ScriptedService {
    gates: Mutex<HashMap<String, oneshot::Receiver<Reply>>>,
    search_errors: Mutex<HashMap<String, ApiError>>,
    face_gates: Mutex<HashMap<String, oneshot::Receiver<Reply>>>,
    face_errors: Mutex<HashMap<String, ApiError>>,
    pub search_calls: Mutex<Vec<SearchQuery>>,
    pub face_calls: Mutex<Vec<FaceQuery>>,
    progress_script: Mutex<VecDeque<Result<IndexProgress, ApiError>>>,
    last_progress: Mutex<Option<Result<IndexProgress, ApiError>>>,
    pub progress_calls: AtomicUsize,
    pub cancel_calls: AtomicUsize,
    pub start_calls: Mutex<Vec<Vec<String>>>,
    ping: Mutex<PingBehavior>,
    stats_total: Mutex<Result<u64, ApiError>>,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self {
            gates: Mutex::new(HashMap::new()),
            search_errors: Mutex::new(HashMap::new()),
            face_gates: Mutex::new(HashMap::new()),
            face_errors: Mutex::new(HashMap::new()),
            search_calls: Mutex::new(Vec::new()),
            face_calls: Mutex::new(Vec::new()),
            progress_script: Mutex::new(VecDeque::new()),
            last_progress: Mutex::new(None),
            progress_calls: AtomicUsize::new(0),
            cancel_calls: AtomicUsize::new(0),
            start_calls: Mutex::new(Vec::new()),
            ping: Mutex::new(PingBehavior::Ok),
            stats_total: Mutex::new(Ok(0)),
        }
    }

    /// Hold the response for `query` until the returned sender fires
    pub fn gate(&self, query: &str) -> oneshot::Sender<Reply> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().unwrap().insert(query.to_string(), rx);
        tx
    }

    pub fn fail_search(&self, query: &str, error: ApiError) {
        self.search_errors
            .lock()
            .unwrap()
            .insert(query.to_string(), error);
    }

    /// Hold the face response for `threshold` (a fraction) until released
    pub fn gate_face(&self, threshold: f32) -> oneshot::Sender<Reply> {
        let (tx, rx) = oneshot::channel();
        self.face_gates.lock().unwrap().insert(face_key(threshold), rx);
        tx
    }

    pub fn fail_face(&self, threshold: f32, error: ApiError) {
        self.face_errors
            .lock()
            .unwrap()
            .insert(face_key(threshold), error);
    }

    pub fn script_progress(&self, steps: Vec<Result<IndexProgress, ApiError>>) {
        self.progress_script.lock().unwrap().extend(steps);
    }

    pub fn set_ping(&self, behavior: PingBehavior) {
        *self.ping.lock().unwrap() = behavior;
    }

    pub fn set_stats(&self, total: Result<u64, ApiError>) {
        *self.stats_total.lock().unwrap() = total;
    }

    pub fn search_queries(&self) -> Vec<String> {
        self.search_calls
            .lock()
            .unwrap()
            .iter()
            .map(|q| q.query.clone())
            .collect()
    }
}

fn face_key(threshold: f32) -> String {
    format!("{:.2}", threshold)
}

/// What an ungated face search at `threshold` returns
pub fn face_response(threshold: f32) -> SearchResponse {
    SearchResponse {
        query: String::new(),
        total_results: 1,
        results: vec![result_named(&format!("face-{}", face_key(threshold)))],
    }
}

/// Response with one hit whose id and name derive from `tag`
pub fn response_for(tag: &str) -> SearchResponse {
    SearchResponse {
        query: tag.to_string(),
        total_results: 1,
        results: vec![result_named(tag)],
    }
}

pub fn result_named(tag: &str) -> SearchResult {
    SearchResult {
        file_id: format!("id-{}", tag),
        filepath: format!("/photos/{}.jpg", tag),
        filename: format!("{}.jpg", tag),
        extension: ".jpg".to_string(),
        file_type: "image".to_string(),
        size_mb: 1.0,
        created: String::new(),
        modified: String::new(),
        relevance_score: 50.0,
        date_taken: None,
        camera_model: None,
        ocr_text: None,
        match_type: None,
        face_box: None,
        confidence: None,
    }
}

pub fn running(total: u64, processed: u64) -> IndexProgress {
    IndexProgress {
        total_files: total,
        processed,
        is_running: true,
        ..Default::default()
    }
}

pub fn finished(total: u64, processed: u64) -> IndexProgress {
    IndexProgress {
        total_files: total,
        processed,
        is_running: false,
        percent_complete: 100.0,
        ..Default::default()
    }
}

#[async_trait]
impl IndexService for ScriptedService {
    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, ApiError> {
        self.search_calls.lock().unwrap().push(query.clone());

        let gate = self.gates.lock().unwrap().remove(&query.query);
        if let Some(rx) = gate {
            return rx
                .await
                .unwrap_or_else(|_| Err(ApiError::Unreachable("gate dropped".into())));
        }

        if let Some(err) = self.search_errors.lock().unwrap().get(&query.query) {
            return Err(err.clone());
        }

        Ok(response_for(&query.query))
    }

    async fn face_search(&self, query: &FaceQuery) -> Result<SearchResponse, ApiError> {
        self.face_calls.lock().unwrap().push(query.clone());
        let key = face_key(query.threshold);

        let gate = self.face_gates.lock().unwrap().remove(&key);
        if let Some(rx) = gate {
            return rx
                .await
                .unwrap_or_else(|_| Err(ApiError::Unreachable("gate dropped".into())));
        }

        if let Some(err) = self.face_errors.lock().unwrap().get(&key) {
            return Err(err.clone());
        }

        Ok(face_response(query.threshold))
    }

    async fn start_indexing(&self, paths: &[String]) -> Result<Acknowledgement, ApiError> {
        self.start_calls.lock().unwrap().push(paths.to_vec());
        Ok(Acknowledgement {
            status: "started".to_string(),
            message: None,
        })
    }

    async fn cancel_indexing(&self) -> Result<Acknowledgement, ApiError> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Acknowledgement {
            status: "cancelling".to_string(),
            message: None,
        })
    }

    async fn scan(&self, paths: &[String]) -> Result<ScanResult, ApiError> {
        let mut result = ScanResult::default();
        result.total_files = paths.len() as u64 * 10;
        result.breakdown.insert("image".to_string(), result.total_files);
        Ok(result)
    }

    async fn progress(&self) -> Result<IndexProgress, ApiError> {
        self.progress_calls.fetch_add(1, Ordering::SeqCst);

        let next = self.progress_script.lock().unwrap().pop_front();
        let mut last = self.last_progress.lock().unwrap();
        if let Some(step) = next {
            *last = Some(step);
        }
        last.clone().unwrap_or_else(|| Ok(IndexProgress::default()))
    }

    async fn settings(&self) -> Result<ServiceSettings, ApiError> {
        Ok(ServiceSettings::default())
    }

    async fn clear_index(&self) -> Result<Acknowledgement, ApiError> {
        Ok(Acknowledgement::default())
    }

    async fn stats(&self) -> Result<SearchStats, ApiError> {
        let total = self.stats_total.lock().unwrap().clone()?;
        Ok(SearchStats {
            total_files: total,
            persist_dir: String::new(),
        })
    }

    async fn ping(&self) -> Result<(), ApiError> {
        let behavior = *self.ping.lock().unwrap();
        match behavior {
            PingBehavior::Ok => Ok(()),
            PingBehavior::Fail => Err(ApiError::Unreachable("connection refused".into())),
            PingBehavior::Hang => std::future::pending().await,
        }
    }
}
