// Application state for the FindMyFile client
//
// One service client, one database, one orchestrator shared by text and
// face search, and one progress monitor.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::api::{
    Acknowledgement, ApiError, HttpIndexService, IndexService, MediaUrls, ScanResult,
};
use crate::config::ClientConfig;
use crate::database::DatabaseManager;
use crate::indexing::{CompletionCallback, ProgressMonitor};
use crate::search::{FaceMatchController, QueryHistory, SearchOrchestrator};

pub struct AppState {
    config: ClientConfig,
    service: Arc<dyn IndexService>,
    database: Arc<DatabaseManager>,
    search: Arc<SearchOrchestrator>,
    face: FaceMatchController,
    monitor: ProgressMonitor,
    media: MediaUrls,
}

impl AppState {
    /// HTTP client plus the database in `config.data_dir`
    pub fn init(config: ClientConfig) -> Result<Self> {
        let service = HttpIndexService::new(config.service.clone())
            .context("Failed to create service client")?;
        let database = DatabaseManager::open_in(&config.data_dir)
            .context("Failed to open client database")?;

        Self::with_parts(config, Arc::new(service), Arc::new(database))
    }

    pub fn with_parts(
        config: ClientConfig,
        service: Arc<dyn IndexService>,
        database: Arc<DatabaseManager>,
    ) -> Result<Self> {
        let media = MediaUrls::new(config.service.origin())?;
        let history = Arc::new(QueryHistory::load(database.clone()));
        let search = Arc::new(SearchOrchestrator::new(service.clone(), history));
        let face = FaceMatchController::with_result_limit(search.clone(), config.face_result_limit);
        let monitor = ProgressMonitor::new(service.clone(), config.progress_interval());

        log::info!("Client state ready (service at {})", config.service.origin());

        Ok(Self {
            config,
            service,
            database,
            search,
            face,
            monitor,
            media,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn service(&self) -> &Arc<dyn IndexService> {
        &self.service
    }

    pub fn db(&self) -> &DatabaseManager {
        &self.database
    }

    pub fn search(&self) -> &Arc<SearchOrchestrator> {
        &self.search
    }

    pub fn face(&self) -> &FaceMatchController {
        &self.face
    }

    pub fn monitor(&self) -> &ProgressMonitor {
        &self.monitor
    }

    pub fn media(&self) -> &MediaUrls {
        &self.media
    }

    /// Start indexing `folders`
    ///
    /// On success the folder list and setup flag are persisted and the
    /// progress monitor is (re)started for the new run.
    pub async fn start_indexing(
        &self,
        folders: &[String],
        on_complete: Option<CompletionCallback>,
    ) -> Result<Acknowledgement, ApiError> {
        let folders: Vec<String> = folders
            .iter()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect();
        if folders.is_empty() {
            return Err(ApiError::InvalidRequest(
                "Add at least one folder to index".to_string(),
            ));
        }

        log::info!("Starting indexing of {} folder(s)", folders.len());
        let ack = self.service.start_indexing(&folders).await?;

        if let Err(e) = self.database.set_indexed_folders(&folders) {
            log::warn!("Failed to persist indexed folders: {:#}", e);
        }
        if let Err(e) = self.database.mark_setup_complete() {
            log::warn!("Failed to persist setup flag: {:#}", e);
        }

        self.monitor.start(on_complete);
        Ok(ack)
    }

    /// Follow an indexing job the service is already running
    ///
    /// Returns whether the monitor attached. Nothing is polled when the
    /// service reports no running job.
    pub async fn resume_monitoring(
        &self,
        on_complete: Option<CompletionCallback>,
    ) -> Result<bool, ApiError> {
        let progress = self.service.progress().await?;
        if !progress.is_running {
            log::debug!("No indexing job running, monitor stays idle");
            return Ok(false);
        }
        log::info!(
            "Indexing already running ({}/{} files), following it",
            progress.processed,
            progress.total_files
        );
        Ok(self.monitor.attach(on_complete))
    }

    pub async fn scan(&self, folders: &[String]) -> Result<ScanResult, ApiError> {
        if folders.is_empty() {
            return Err(ApiError::InvalidRequest("No folders to scan".to_string()));
        }
        let result = self.service.scan(folders).await?;
        log::info!(
            "Scan found {} files across {} categories",
            result.total_files,
            result.breakdown.len()
        );
        Ok(result)
    }

    /// Clear the setup flag and folder list so onboarding runs again
    pub fn reset_onboarding(&self) -> Result<()> {
        self.database.reset_onboarding()
    }

    pub fn shutdown(&self) {
        self.monitor.stop();
    }
}
