//! Waiting page shown while an engine version installs.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{Html, IntoResponse, Response};
use replay_engine::VersionIdentifier;
use serde::Deserialize;

use crate::error::ServerError;
use crate::handlers::escape_html;
use crate::state::AppState;

/// Query parameters for `GET /wait/{version}`.
#[derive(Debug, Deserialize)]
pub(crate) struct WaitQuery {
    #[serde(rename = "return")]
    return_to: Option<String>,
}

/// Handle `GET /wait/{version}`.
pub(crate) async fn wait_page(
    State(state): State<Arc<AppState>>,
    Path(version): Path<String>,
    Query(query): Query<WaitQuery>,
) -> Result<Response, ServerError> {
    let version = VersionIdentifier::parse(&version)
        .map_err(|e| ServerError::BadRequest(e.to_string()))?;
    let target = safe_return_target(query.return_to.as_deref());

    let page = render_page(&version, target, state.poll_interval_secs);
    Ok(([(header::CACHE_CONTROL, "no-store")], Html(page)).into_response())
}

/// Local path to return to; anything else becomes `/`.
fn safe_return_target(target: Option<&str>) -> &str {
    match target {
        Some(t) if t.starts_with('/') && !t.starts_with("//") && !t.contains('\\') => t,
        _ => "/",
    }
}

fn render_page(version: &VersionIdentifier, target: &str, interval_secs: u64) -> String {
    let version = escape_html(version.as_str());
    let target = escape_html(target);
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta http-equiv="refresh" content="{interval_secs};url={target}">
<title>Preparing report</title>
</head>
<body>
<p>Installing report engine {version}. This page reloads every {interval_secs} seconds.</p>
<p><a href="{target}">Reload now</a></p>
</body>
</html>
"#
    )
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_safe_return_target() {
        assert_eq!(safe_return_target(Some("/?token=abc")), "/?token=abc");
        assert_eq!(safe_return_target(Some("//evil.example.com/")), "/");
        assert_eq!(safe_return_target(Some("/\\evil.example.com")), "/");
        assert_eq!(safe_return_target(Some("https://evil.example.com/")), "/");
        assert_eq!(safe_return_target(Some("")), "/");
        assert_eq!(safe_return_target(None), "/");
    }

    #[test]
    fn test_page_escapes_target() {
        let version = VersionIdentifier::parse("10.4.0").unwrap();
        let page = render_page(&version, "/?token=a\"><script>", 2);

        assert!(page.contains(r#"content="2;url=/?token=a&quot;&gt;&lt;script&gt;""#));
        assert!(!page.contains("<script>"));
        assert!(page.contains("Installing report engine 10.4.0"));
    }
}
