//! Face match controller
//!
//! Holds the reference image and its two refinable parameters. Selecting an
//! image or changing a parameter re-issues a face intent built from the
//! stored image; only `clear` ever drops the image.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::api::ReferenceImage;

use super::intent::{FilterSet, SearchIntent, DEFAULT_RESULT_LIMIT};
use super::orchestrator::{SearchOrchestrator, SubmitOutcome};

pub const DEFAULT_THRESHOLD: u8 = 50;
pub const MIN_THRESHOLD: u8 = 20;
pub const MAX_THRESHOLD: u8 = 90;
pub const THRESHOLD_STEP: u8 = 5;

/// Clamp into range and snap to the nearest step
pub fn normalize_threshold(value: i32) -> u8 {
    let clamped = value.clamp(i32::from(MIN_THRESHOLD), i32::from(MAX_THRESHOLD));
    let step = i32::from(THRESHOLD_STEP);
    let snapped = (clamped + step / 2) / step * step;
    snapped.clamp(i32::from(MIN_THRESHOLD), i32::from(MAX_THRESHOLD)) as u8
}

#[derive(Debug, Clone)]
struct FaceParams {
    reference: Option<ReferenceImage>,
    threshold: u8,
    folder_scope: Option<String>,
    result_limit: usize,
}

impl FaceParams {
    fn intent_with(&self, image: ReferenceImage) -> SearchIntent {
        SearchIntent::face(image, self.threshold)
            .with_limit(self.result_limit)
            .with_filters(FilterSet {
                folder_path: self.folder_scope.clone(),
                ..Default::default()
            })
    }

    fn intent(&self) -> Option<SearchIntent> {
        self.reference.clone().map(|image| self.intent_with(image))
    }
}

/// Serializable view of the controller's parameters
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FaceSettings {
    pub has_reference: bool,
    pub reference_name: Option<String>,
    pub threshold: u8,
    pub folder_scope: Option<String>,
}

pub struct FaceMatchController {
    orchestrator: Arc<SearchOrchestrator>,
    params: Mutex<FaceParams>,
}

impl FaceMatchController {
    pub fn new(orchestrator: Arc<SearchOrchestrator>) -> Self {
        Self::with_result_limit(orchestrator, DEFAULT_RESULT_LIMIT)
    }

    pub fn with_result_limit(orchestrator: Arc<SearchOrchestrator>, result_limit: usize) -> Self {
        Self {
            orchestrator,
            params: Mutex::new(FaceParams {
                reference: None,
                threshold: DEFAULT_THRESHOLD,
                folder_scope: None,
                result_limit,
            }),
        }
    }

    /// New reference image; always searches
    pub async fn select_image(&self, image: ReferenceImage) -> SubmitOutcome {
        let intent = {
            let mut params = self.params.lock().await;
            params.reference = Some(image.clone());
            params.intent_with(image)
        };

        self.orchestrator.submit(intent).await
    }

    /// Returns `None` when nothing was re-issued (no image, or value unchanged)
    pub async fn set_threshold(&self, value: i32) -> Option<SubmitOutcome> {
        let threshold = normalize_threshold(value);
        let intent = {
            let mut params = self.params.lock().await;
            if params.threshold == threshold {
                return None;
            }
            params.threshold = threshold;
            params.intent()
        }?;

        log::debug!("Face threshold changed to {}%, re-issuing", threshold);
        Some(self.orchestrator.submit(intent).await)
    }

    /// `None` (or a blank path) lifts the folder constraint
    pub async fn set_folder_scope(&self, folder: Option<String>) -> Option<SubmitOutcome> {
        let folder = folder
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty());

        let intent = {
            let mut params = self.params.lock().await;
            if params.folder_scope == folder {
                return None;
            }
            params.folder_scope = folder;
            params.intent()
        }?;

        Some(self.orchestrator.submit(intent).await)
    }

    /// Drop the image, the error and the results together
    pub async fn clear(&self) {
        let mut params = self.params.lock().await;
        params.reference = None;
        self.orchestrator.clear().await;
    }

    pub async fn settings(&self) -> FaceSettings {
        let params = self.params.lock().await;
        FaceSettings {
            has_reference: params.reference.is_some(),
            reference_name: params.reference.as_ref().map(|r| r.file_name.clone()),
            threshold: params.threshold,
            folder_scope: params.folder_scope.clone(),
        }
    }

    pub fn orchestrator(&self) -> &Arc<SearchOrchestrator> {
        &self.orchestrator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{face_response, ScriptedService};
    use crate::api::ApiError;
    use crate::search::history::{MemoryHistoryStore, QueryHistory};
    use crate::search::intent::SearchMode;

    fn controller() -> (Arc<ScriptedService>, FaceMatchController) {
        let service = Arc::new(ScriptedService::new());
        let history = Arc::new(QueryHistory::load(Arc::new(MemoryHistoryStore::new())));
        let orch = Arc::new(SearchOrchestrator::new(service.clone(), history));
        (service, FaceMatchController::new(orch))
    }

    fn portrait() -> ReferenceImage {
        ReferenceImage::new("portrait.jpg", vec![7u8; 32])
    }

    #[test]
    fn test_normalize_threshold() {
        assert_eq!(normalize_threshold(5), 20);
        assert_eq!(normalize_threshold(95), 90);
        assert_eq!(normalize_threshold(72), 70);
        assert_eq!(normalize_threshold(73), 75);
        assert_eq!(normalize_threshold(50), 50);
    }

    #[tokio::test]
    async fn test_threshold_change_reuses_stored_image() {
        let (service, face) = controller();

        let first = face.select_image(portrait()).await;
        assert!(first.is_published());

        let second = face.set_threshold(75).await.unwrap();
        assert!(second.is_published());

        let calls = service.face_calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].image, calls[1].image);
        assert!((calls[0].threshold - 0.50).abs() < 1e-6);
        assert!((calls[1].threshold - 0.75).abs() < 1e-6);

        let view = face.orchestrator().snapshot().await;
        assert_eq!(view.mode, Some(SearchMode::Face));
        assert_eq!(view.results()[0].file_id, "id-face-0.75");
    }

    #[tokio::test]
    async fn test_late_response_for_old_threshold_is_discarded() {
        let (service, face) = controller();
        let gate_50 = service.gate_face(0.50);

        let first = face.select_image(portrait());
        let second = async {
            tokio::task::yield_now().await;
            let outcome = face.set_threshold(75).await;
            // The 50% response lands after the 75% one
            gate_50.send(Ok(face_response(0.50))).unwrap();
            outcome
        };

        let (a, b) = tokio::join!(first, second);
        assert_eq!(a, SubmitOutcome::Superseded { sequence: 1 });
        assert_eq!(b, Some(SubmitOutcome::Published { sequence: 2, total: 1 }));

        let view = face.orchestrator().snapshot().await;
        assert_eq!(view.sequence, 2);
        assert_eq!(view.results()[0].file_id, "id-face-0.75");
    }

    #[tokio::test]
    async fn test_service_failure_surfaces_and_keeps_image() {
        let (service, face) = controller();
        service.fail_face(
            0.50,
            ApiError::Service {
                status: 400,
                message: "No face detected in the uploaded image".into(),
            },
        );

        let outcome = face.select_image(portrait()).await;
        assert!(matches!(outcome, SubmitOutcome::Failed { sequence: 1, .. }));

        let view = face.orchestrator().snapshot().await;
        assert_eq!(
            view.error.as_deref(),
            Some("API Error 400: No face detected in the uploaded image")
        );
        assert!(view.results().is_empty());
        assert!(face.settings().await.has_reference);

        // A new threshold retries the same image and clears the error
        let retried = face.set_threshold(60).await.unwrap();
        assert!(retried.is_published());
        let view = face.orchestrator().snapshot().await;
        assert!(view.error.is_none());
        assert_eq!(view.results()[0].file_id, "id-face-0.60");
    }

    #[tokio::test]
    async fn test_parameter_change_without_image_only_stores() {
        let (service, face) = controller();

        assert!(face.set_threshold(80).await.is_none());
        assert!(face.set_folder_scope(Some("/photos".into())).await.is_none());
        assert!(service.face_calls.lock().unwrap().is_empty());

        let settings = face.settings().await;
        assert_eq!(settings.threshold, 80);
        assert_eq!(settings.folder_scope.as_deref(), Some("/photos"));

        face.select_image(portrait()).await;
        let calls = service.face_calls.lock().unwrap().clone();
        assert_eq!(calls[0].folder_path.as_deref(), Some("/photos"));
        assert!((calls[0].threshold - 0.80).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_unchanged_value_does_not_reissue() {
        let (service, face) = controller();
        face.select_image(portrait()).await;

        assert!(face.set_threshold(50).await.is_none());
        assert!(face.set_folder_scope(Some("  ".into())).await.is_none());
        assert_eq!(service.face_calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_folder_scope_change_reissues() {
        let (service, face) = controller();
        face.select_image(portrait()).await;

        face.set_folder_scope(Some("/photos/family".into())).await.unwrap();
        face.set_folder_scope(None).await.unwrap();

        let calls = service.face_calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1].folder_path.as_deref(), Some("/photos/family"));
        assert_eq!(calls[2].folder_path, None);
    }

    #[tokio::test]
    async fn test_clear_resets_image_and_results() {
        let (_, face) = controller();
        face.select_image(portrait()).await;

        face.clear().await;

        let settings = face.settings().await;
        assert!(!settings.has_reference);
        let view = face.orchestrator().snapshot().await;
        assert!(view.response.is_none());
        assert!(view.error.is_none());

        // Parameters survive; the image does not
        assert!(face.set_threshold(60).await.is_none());
    }
}
