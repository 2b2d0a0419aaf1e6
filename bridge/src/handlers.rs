//! Method handlers
//!
//! Each handler takes the raw params value and returns the JSON result.
//! Failures come back as `anyhow` errors and become JSON-RPC errors.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;

use findmyfile_lib::api::ReferenceImage;
use findmyfile_lib::health::probe_health;
use findmyfile_lib::indexing::{format_duration, CompletionCallback};
use findmyfile_lib::search::{
    excerpt, highlight, paginate, FilterSet, SearchIntent, SubmitOutcome, PAGE_SIZE,
    SUGGESTION_COUNT,
};

use crate::Bridge;

/// How much OCR text each result card shows
const OCR_EXCERPT_CHARS: usize = 120;

pub async fn dispatch(bridge: &Bridge, method: &str, params: Value) -> Result<Value> {
    match method {
        "search" => handle_search(bridge, parse(params)?).await,
        "reset_filters" => {
            let outcome = bridge.state.search().reset_filters().await;
            Ok(outcome.as_ref().map(outcome_json).unwrap_or(Value::Null))
        }
        "clear_results" => {
            bridge.state.search().clear().await;
            Ok(json!({ "success": true }))
        }
        "retry" => {
            let outcome = bridge.state.search().retry().await;
            Ok(outcome.as_ref().map(outcome_json).unwrap_or(Value::Null))
        }
        "results_page" => handle_results_page(bridge, parse(params)?).await,

        "face.select_image" => handle_face_select(bridge, parse(params)?).await,
        "face.set_threshold" => {
            let params: ThresholdParams = parse(params)?;
            let outcome = bridge.state.face().set_threshold(params.value).await;
            Ok(json!({
                "outcome": outcome.as_ref().map(outcome_json),
                "settings": bridge.state.face().settings().await,
            }))
        }
        "face.set_folder" => {
            let params: FolderScopeParams = parse(params)?;
            let outcome = bridge.state.face().set_folder_scope(params.folder).await;
            Ok(json!({
                "outcome": outcome.as_ref().map(outcome_json),
                "settings": bridge.state.face().settings().await,
            }))
        }
        "face.clear" => {
            bridge.state.face().clear().await;
            Ok(json!(bridge.state.face().settings().await))
        }
        "face.settings" => Ok(json!(bridge.state.face().settings().await)),

        "history.list" => {
            let params: HistoryParams = parse(params)?;
            let history = bridge.state.search().history();
            Ok(json!(history.recent(params.limit.unwrap_or(SUGGESTION_COUNT))))
        }
        "history.clear" => {
            bridge.state.search().history().clear();
            Ok(json!({ "success": true }))
        }

        "folders.list" => Ok(json!(bridge.state.db().indexed_folders()?)),
        "folders.add" => {
            let params: PathParams = parse(params)?;
            Ok(json!(bridge.state.db().add_indexed_folder(&params.path)?))
        }
        "folders.remove" => {
            let params: PathParams = parse(params)?;
            Ok(json!(bridge.state.db().remove_indexed_folder(&params.path)?))
        }

        "index.scan" => {
            let folders = folders_or_saved(bridge, parse(params)?)?;
            Ok(json!(bridge.state.scan(&folders).await?))
        }
        "index.start" => handle_index_start(bridge, parse(params)?).await,
        "index.watch" => {
            let attached = bridge.state.monitor().attach(Some(completion_notifier(bridge)));
            Ok(json!({ "attached": attached, "view": bridge.state.monitor().view() }))
        }
        "index.cancel" => Ok(json!(bridge.state.monitor().request_cancel().await?)),
        "index.progress" => {
            let view = bridge.state.monitor().view();
            let (eta, elapsed) = view
                .snapshot
                .as_ref()
                .map(|p| (format_duration(p.eta_seconds), format_duration(p.elapsed_seconds)))
                .unwrap_or_default();
            Ok(json!({
                "view": view,
                "eta": eta,
                "elapsed": elapsed,
                "polling": bridge.state.monitor().is_polling(),
            }))
        }

        "service.settings" => Ok(json!(bridge.state.service().settings().await?)),
        "service.clear_index" => {
            let ack = bridge.state.service().clear_index().await?;
            bridge.state.search().clear().await;
            Ok(json!(ack))
        }
        "service.stats" => Ok(json!(bridge.state.service().stats().await?)),

        "health" => {
            let timeout = bridge.state.config().service.health_timeout();
            let reachable = probe_health(bridge.state.service().as_ref(), timeout).await;
            Ok(json!({ "reachable": reachable, "status": bridge.watcher.status() }))
        }
        "setup.status" => Ok(json!(bridge.state.db().load_all_settings()?)),
        "setup.reset" => {
            bridge.state.reset_onboarding()?;
            Ok(json!({ "success": true }))
        }
        "shutdown" => {
            log::info!("Shutdown requested");
            bridge.state.shutdown();
            Ok(json!({ "success": true }))
        }
        _ => Err(anyhow!("Unknown method: {}", method)),
    }
}

fn parse<T: for<'de> Deserialize<'de>>(params: Value) -> Result<T> {
    // Methods without params may send null
    let params = if params.is_null() { json!({}) } else { params };
    serde_json::from_value(params).map_err(|e| anyhow!("Invalid params: {}", e))
}

fn outcome_json(outcome: &SubmitOutcome) -> Value {
    match outcome {
        SubmitOutcome::Published { sequence, total } => {
            json!({ "status": "published", "sequence": sequence, "total": total })
        }
        SubmitOutcome::Cleared { sequence } => json!({ "status": "cleared", "sequence": sequence }),
        SubmitOutcome::Failed { sequence, error } => json!({
            "status": "failed",
            "sequence": sequence,
            "error": error.to_string(),
            "unreachable": error.is_unreachable(),
        }),
        SubmitOutcome::Superseded { sequence } => {
            json!({ "status": "superseded", "sequence": sequence })
        }
    }
}

// ============================================================================
// Search
// ============================================================================

#[derive(Debug, Deserialize)]
struct SearchParams {
    query: String,
    #[serde(default)]
    filters: FilterSet,
    limit: Option<usize>,
    #[serde(default)]
    text_only: bool,
}

async fn handle_search(bridge: &Bridge, params: SearchParams) -> Result<Value> {
    let limit = params
        .limit
        .unwrap_or(bridge.state.config().default_result_limit);
    let intent = SearchIntent::text(&params.query)
        .with_filters(params.filters)
        .with_limit(limit)
        .with_text_only(params.text_only);

    let outcome = bridge.state.search().submit(intent).await;
    Ok(outcome_json(&outcome))
}

#[derive(Debug, Deserialize)]
struct PageParams {
    #[serde(default = "first_page")]
    page: usize,
    page_size: Option<usize>,
}

fn first_page() -> usize {
    1
}

async fn handle_results_page(bridge: &Bridge, params: PageParams) -> Result<Value> {
    let view = bridge.state.search().snapshot().await;
    let window = paginate(view.results(), params.page, params.page_size.unwrap_or(PAGE_SIZE));
    let media = bridge.state.media();

    let items: Vec<Value> = window
        .items
        .iter()
        .map(|result| {
            let ocr = result
                .ocr_text
                .as_deref()
                .filter(|t| !t.trim().is_empty())
                .map(|t| highlight(&excerpt(t, OCR_EXCERPT_CHARS), &view.query));
            json!({
                "result": result,
                "thumbnail_url": media.thumbnail_url(&result.file_id),
                "file_url": media.file_url(&result.filepath),
                "ocr_highlight": ocr,
            })
        })
        .collect();

    Ok(json!({
        "query": view.query,
        "mode": view.mode,
        "error": view.error,
        "searching": view.is_searching(),
        "total_results": view.results().len(),
        "current_page": window.current_page,
        "total_pages": window.total_pages,
        "start": window.start,
        "end": window.end,
        "visible_pages": window.visible_pages,
        "items": items,
    }))
}

// ============================================================================
// Face search
// ============================================================================

#[derive(Debug, Deserialize)]
struct FaceImageParams {
    path: String,
}

#[derive(Debug, Deserialize)]
struct ThresholdParams {
    value: i32,
}

#[derive(Debug, Deserialize)]
struct FolderScopeParams {
    #[serde(default)]
    folder: Option<String>,
}

async fn handle_face_select(bridge: &Bridge, params: FaceImageParams) -> Result<Value> {
    let path = Path::new(&params.path);
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read image {:?}", path))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "reference.jpg".to_string());

    let image = ReferenceImage::new(file_name, data);
    if image.is_empty() {
        return Err(anyhow!("Image file is empty"));
    }

    let outcome = bridge.state.face().select_image(image).await;
    Ok(json!({
        "outcome": outcome_json(&outcome),
        "settings": bridge.state.face().settings().await,
    }))
}

// ============================================================================
// Folders and indexing
// ============================================================================

#[derive(Debug, Deserialize)]
struct PathParams {
    path: String,
}

#[derive(Debug, Deserialize)]
struct FoldersParams {
    #[serde(default)]
    folders: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    #[serde(default)]
    limit: Option<usize>,
}

/// Explicit folders, else the saved list
fn folders_or_saved(bridge: &Bridge, params: FoldersParams) -> Result<Vec<String>> {
    match params.folders {
        Some(folders) => Ok(folders),
        None => bridge.state.db().indexed_folders(),
    }
}

/// Sends `index.completed` when the monitored run finishes
pub fn completion_notifier(bridge: &Bridge) -> CompletionCallback {
    let notifier = bridge.notifier.clone();
    Box::new(move |progress| {
        notifier.notify("index.completed", json!(progress));
    })
}

async fn handle_index_start(bridge: &Bridge, params: FoldersParams) -> Result<Value> {
    let folders = folders_or_saved(bridge, params)?;
    let ack = bridge
        .state
        .start_indexing(&folders, Some(completion_notifier(bridge)))
        .await?;
    Ok(json!(ack))
}
