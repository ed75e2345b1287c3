//! Application state.
//!
//! Shared state for all request handlers.

use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use replay_engine::{InstallCoordinator, LayoutResolver, VersionIdentifier};
use replay_fetch::{DocumentCache, DocumentFetcher, ReportDocument};
use replay_render::GeneratorFactory;

use crate::error::ServerError;

/// Application state shared across all handlers.
pub(crate) struct AppState {
    /// Install task registry.
    pub(crate) coordinator: InstallCoordinator,
    /// Locates generator modules and assets of installed versions.
    pub(crate) resolver: LayoutResolver,
    /// Remote report fetcher (cache-backed).
    pub(crate) fetcher: Arc<dyn DocumentFetcher>,
    /// Cache behind `fetcher`, for the admin route.
    pub(crate) cache: Arc<DocumentCache>,
    /// Builds generators for resolved entry points.
    pub(crate) generators: Arc<dyn GeneratorFactory>,
    /// Token secret (`None` disables token requests).
    pub(crate) secret: Option<String>,
    /// Report rendered when no token is given.
    pub(crate) local_report: Option<PathBuf>,
    /// Refresh interval of the waiting page.
    pub(crate) poll_interval_secs: u64,
    /// Version of the most recently requested report.
    pub(crate) active_version: ActiveVersion,
}

/// Version assets fall back to when a request does not name one.
#[derive(Debug, Default)]
pub(crate) struct ActiveVersion(RwLock<Option<VersionIdentifier>>);

impl ActiveVersion {
    pub(crate) fn get(&self) -> Option<VersionIdentifier> {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub(crate) fn set(&self, version: &VersionIdentifier) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = Some(version.clone());
    }
}

impl AppState {
    /// Decrypt a token and fetch the report it points to.
    pub(crate) async fn fetch_by_token(&self, token: &str) -> Result<ReportDocument, ServerError> {
        let secret = self
            .secret
            .as_deref()
            .ok_or_else(|| ServerError::Config("token.secret is not set".to_owned()))?;
        let url = replay_token::decrypt(token, secret)?;
        tracing::debug!(url = %url, "Resolved report token");
        Ok(self.fetcher.fetch(&url).await?)
    }

    /// Read the configured local report.
    pub(crate) async fn load_local(&self) -> Result<ReportDocument, ServerError> {
        let Some(path) = &self.local_report else {
            return Err(ServerError::NoLocalReport);
        };

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ServerError::LocalReportMissing(path.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        Ok(ReportDocument::from_slice(&bytes)?)
    }
}
