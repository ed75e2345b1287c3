//! Administrative endpoints.
//!
//! Unauthenticated; bind the server to a trusted interface.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::state::AppState;

/// Response for the clear endpoints.
#[derive(Debug, Serialize)]
pub(crate) struct ClearResponse {
    /// Number of entries removed.
    cleared: usize,
}

/// Install task entry for `GET /admin/tasks`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TaskResponse {
    version: String,
    waiters: usize,
    elapsed_ms: u128,
}

/// Handle `GET|POST /admin/tasks/clear`.
pub(crate) async fn clear_tasks(State(state): State<Arc<AppState>>) -> Json<ClearResponse> {
    let cleared = state.coordinator.clear();
    Json(ClearResponse { cleared })
}

/// Handle `GET|POST /admin/cache/clear`.
pub(crate) async fn clear_cache(State(state): State<Arc<AppState>>) -> Json<ClearResponse> {
    let cleared = state.cache.clear();
    tracing::info!(cleared, "Cleared document cache");
    Json(ClearResponse { cleared })
}

/// Handle `GET /admin/tasks`.
pub(crate) async fn list_tasks(State(state): State<Arc<AppState>>) -> Json<Vec<TaskResponse>> {
    let tasks = state
        .coordinator
        .running_tasks()
        .into_iter()
        .map(|task| TaskResponse {
            version: task.version.to_string(),
            waiters: task.waiters,
            elapsed_ms: task.elapsed.as_millis(),
        })
        .collect();
    Json(tasks)
}
