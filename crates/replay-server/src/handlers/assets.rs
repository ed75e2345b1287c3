//! Report asset endpoint.
//!
//! Serves files from the asset directory of an installed engine version.
//! The version comes from the `v` query parameter written by the asset
//! rewriter, or else the version of the last rendered report. Candidates are
//! tried in order: exact version, its major line, the default package.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use replay_engine::{PackageAlias, VersionIdentifier};
use serde::Deserialize;

use crate::error::ServerError;
use crate::state::AppState;

/// Query parameters for `GET /assets/{file}`.
#[derive(Debug, Deserialize)]
pub(crate) struct AssetQuery {
    v: Option<String>,
}

/// Handle `GET /assets/{file}`.
pub(crate) async fn serve_asset(
    State(state): State<Arc<AppState>>,
    Path(file): Path<String>,
    Query(query): Query<AssetQuery>,
) -> Result<Response, ServerError> {
    if !is_safe_file_name(&file) {
        return Err(ServerError::BadRequest(format!(
            "invalid asset name {file:?}"
        )));
    }

    let version = match query.v.as_deref().filter(|v| !v.is_empty()) {
        Some(v) => {
            Some(VersionIdentifier::parse(v).map_err(|e| ServerError::BadRequest(e.to_string()))?)
        }
        None => state.active_version.get(),
    };

    for alias in candidate_aliases(&state, version.as_ref()) {
        let Some(dir) = state.resolver.probe_asset_dir(&alias).await else {
            continue;
        };

        match tokio::fs::read(dir.path.join(&file)).await {
            Ok(content) => {
                tracing::debug!(file = %file, alias = %alias, "Serving asset");
                return Ok((
                    [(header::CONTENT_TYPE, guess_content_type(&file))],
                    content,
                )
                    .into_response());
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }

    Err(ServerError::AssetNotFound(file))
}

/// Exact version, then its major line, then the default package.
fn candidate_aliases(state: &AppState, version: Option<&VersionIdentifier>) -> Vec<PackageAlias> {
    let dirs = state.coordinator.dirs();
    let mut aliases = Vec::with_capacity(3);
    if let Some(version) = version {
        aliases.push(dirs.exact_alias(version));
        if !version.is_bare_major() {
            aliases.push(dirs.major_alias(version.major()));
        }
    }
    aliases.push(dirs.default_alias());
    aliases
}

/// A single path component that cannot escape the asset directory.
fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains(['/', '\\', '\0'])
        && !name.contains("..")
        && !name.starts_with('.')
}

fn guess_content_type(path: &str) -> &'static str {
    match path.rsplit('.').next() {
        Some("html") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript",
        Some("json" | "map") => "application/json",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("ico") => "image/x-icon",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_is_safe_file_name() {
        assert!(is_safe_file_name("report.css"));
        assert!(is_safe_file_name("standalone-template.html"));
        assert!(!is_safe_file_name(""));
        assert!(!is_safe_file_name("../package.json"));
        assert!(!is_safe_file_name("a..b"));
        assert!(!is_safe_file_name("sub/file.js"));
        assert!(!is_safe_file_name("sub\\file.js"));
        assert!(!is_safe_file_name(".npmrc"));
    }

    #[test]
    fn test_guess_content_type() {
        assert_eq!(guess_content_type("report.css"), "text/css; charset=utf-8");
        assert_eq!(guess_content_type("viewer.js"), "application/javascript");
        assert_eq!(guess_content_type("logo.svg"), "image/svg+xml");
        assert_eq!(guess_content_type("LICENSE"), "application/octet-stream");
    }
}
