//! Report rendering endpoint.
//!
//! `GET /?token=...` renders the report the token points to; without a token
//! the configured local report is rendered. While the report's engine version
//! is being installed the client is sent to the waiting page, which brings it
//! back here once the install has had time to finish.

use std::sync::Arc;

use axum::extract::{OriginalUri, Query, State};
use axum::http::Uri;
use axum::response::{Html, IntoResponse, Redirect, Response};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use replay_engine::{InstallStatus, VersionIdentifier};
use serde::Deserialize;

use crate::error::ServerError;
use crate::state::AppState;

/// Query parameters for `GET /`.
#[derive(Debug, Deserialize)]
pub(crate) struct RenderQuery {
    token: Option<String>,
}

/// Handle `GET /`.
pub(crate) async fn render_report(
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<RenderQuery>,
) -> Result<Response, ServerError> {
    let document = match query.token.as_deref().filter(|t| !t.is_empty()) {
        Some(token) => state.fetch_by_token(token).await?,
        None => state.load_local().await?,
    };

    let version = document.version();
    state.active_version.set(version);

    let alias = match state.coordinator.ensure_installed(version).await {
        InstallStatus::Ready(alias) => alias,
        InstallStatus::Pending => {
            return Ok(Redirect::to(&wait_location(version, &uri)).into_response());
        }
    };

    let entry = state.resolver.resolve_entry_point(&alias).await?;
    tracing::info!(
        version = %version,
        alias = %entry.alias,
        layout = entry.layout.name,
        "Rendering report"
    );

    let generator = state.generators.generator(&entry);
    let html = replay_render::render(&document, generator.as_ref()).await?;

    Ok(Html(html).into_response())
}

/// `/wait/{version}?return={original path and query}`
fn wait_location(version: &VersionIdentifier, uri: &Uri) -> String {
    let original = uri.path_and_query().map_or("/", |pq| pq.as_str());
    format!(
        "/wait/{version}?return={}",
        utf8_percent_encode(original, NON_ALPHANUMERIC)
    )
}
