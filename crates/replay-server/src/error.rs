//! Error types for the HTTP server.

use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use replay_engine::ResolutionError;
use replay_fetch::{DocumentError, FetchError};
use replay_render::RenderError;
use replay_token::TokenError;

/// Server error type.
///
/// Rendered as a plain-text body with a status matching the failure class.
#[derive(Debug, thiserror::Error)]
pub(crate) enum ServerError {
    /// Malformed request parameter.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Token could not be decrypted.
    #[error("Invalid token: {0}")]
    Token(#[from] TokenError),

    /// No token given and no local report configured.
    #[error("No report token given and no local report configured")]
    NoLocalReport,

    /// Configured local report file does not exist.
    #[error("Local report not found: {}", .0.display())]
    LocalReportMissing(PathBuf),

    /// Requested asset exists in no candidate version.
    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    /// Report is not JSON or lacks a usable engine version.
    #[error("Invalid report: {0}")]
    Document(#[from] DocumentError),

    /// Remote retrieval failed.
    #[error("Failed to fetch report: {0}")]
    Fetch(FetchError),

    /// Required setting missing.
    #[error("Server misconfigured: {0}")]
    Config(String),

    #[error("{0}")]
    Resolution(#[from] ResolutionError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<FetchError> for ServerError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Document(err) => Self::Document(err),
            // A token that decrypts to something unfetchable is a bad token
            FetchError::InvalidUrl { reason, .. } => Self::BadRequest(format!(
                "token does not resolve to a report URL ({reason})"
            )),
            other => Self::Fetch(other),
        }
    }
}

impl ServerError {
    pub(crate) fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Token(_) => StatusCode::BAD_REQUEST,
            Self::NoLocalReport | Self::LocalReportMissing(_) | Self::AssetNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            Self::Document(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Fetch(_) => StatusCode::BAD_GATEWAY,
            Self::Config(_) | Self::Resolution(_) | Self::Render(_) | Self::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        (status, self.to_string()).into_response()
    }
}
