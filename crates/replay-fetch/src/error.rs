//! Error type for remote fetches.

use std::error::Error;

use crate::document::{DocumentError, ValidationError};

/// Error retrieving a remote report.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid report URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("GET {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("GET {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("object storage error for s3://{bucket}/{key}: {message}")]
    ObjectStore {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("fetcher misconfigured: {0}")]
    Config(String),

    #[error(transparent)]
    Document(#[from] DocumentError),
}

impl FetchError {
    /// The report was retrieved but lacks a usable engine version.
    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Document(DocumentError::Validation(err)) => Some(err),
            _ => None,
        }
    }
}

/// Walk the error source chain and join all messages.
pub(crate) fn error_chain(err: &dyn Error) -> String {
    let mut msgs = vec![err.to_string()];
    let mut source = err.source();
    while let Some(s) = source {
        msgs.push(s.to_string());
        source = s.source();
    }
    msgs.join(": ")
}
