// FindMyFile client - orchestration core for the local file search service
//
// Talks to a running FindMyFile indexing/search service over HTTP:
// - Text and face search with stale-response suppression
// - Indexing progress monitoring
// - Client-side persistence (setup flag, indexed folders, search history)

pub mod api;
pub mod config;
pub mod database;
pub mod health;
pub mod indexing;
pub mod search;
pub mod state;

pub use api::{ApiError, HttpIndexService, IndexService, ServiceConfig};
pub use config::ClientConfig;
pub use database::DatabaseManager;
pub use state::AppState;

/// Install the env_logger backend (`RUST_LOG`, default `info`, stderr)
///
/// Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}
