//! Parsed report documents.

use std::sync::Arc;

use replay_engine::{VersionError, VersionIdentifier};
use serde_json::Value;

/// Top-level field holding the engine version that produced a report.
pub const VERSION_FIELD: &str = "lighthouseVersion";

/// A report with a validated engine version.
///
/// The payload is opaque apart from the version field. Clones share the
/// parsed JSON.
#[derive(Clone, Debug)]
pub struct ReportDocument {
    version: VersionIdentifier,
    raw: Arc<Value>,
}

/// Report parsed but does not say which engine produced it.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("report is not a JSON object")]
    NotAnObject,

    #[error("report has no lighthouseVersion field")]
    MissingVersion,

    #[error("report has invalid lighthouseVersion {value}: {source}")]
    InvalidVersion {
        value: String,
        #[source]
        source: VersionError,
    },
}

/// Error turning bytes into a [`ReportDocument`].
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("report is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl ReportDocument {
    /// Parse and validate a JSON report.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, DocumentError> {
        let value: Value = serde_json::from_slice(bytes)?;
        Ok(Self::from_value(value)?)
    }

    /// Validate an already parsed report.
    pub fn from_value(value: Value) -> Result<Self, ValidationError> {
        let object = value.as_object().ok_or(ValidationError::NotAnObject)?;
        let field = object
            .get(VERSION_FIELD)
            .filter(|v| !v.is_null())
            .ok_or(ValidationError::MissingVersion)?;

        let version = match field {
            Value::String(s) => VersionIdentifier::parse(s.trim()),
            other => VersionIdentifier::parse(&other.to_string()),
        }
        .map_err(|source| ValidationError::InvalidVersion {
            value: field.to_string(),
            source,
        })?;

        Ok(Self {
            version,
            raw: Arc::new(value),
        })
    }

    /// Engine version that produced the report.
    pub fn version(&self) -> &VersionIdentifier {
        &self.version
    }

    /// Serialize the report back to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&*self.raw)
    }
}
