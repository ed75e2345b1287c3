//! In-memory document cache.
//!
//! Entries are never evicted on their own; [`DocumentCache::clear`] is the
//! only way to drop them.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use url::Url;

use crate::document::ReportDocument;
use crate::error::FetchError;
use crate::fetcher::DocumentFetcher;

/// Canonical URL → parsed report.
#[derive(Debug, Default)]
pub struct DocumentCache {
    entries: RwLock<HashMap<String, ReportDocument>>,
}

impl DocumentCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, url: &str) -> Option<ReportDocument> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&canonical_url(url))
            .cloned()
    }

    pub fn insert(&self, url: &str, document: ReportDocument) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(canonical_url(url), document);
    }

    /// Drop all entries, returning how many there were.
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let removed = entries.len();
        entries.clear();
        removed
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Normalize a URL so trivially different spellings share an entry.
///
/// Unparseable input is used verbatim.
pub fn canonical_url(url: &str) -> String {
    Url::parse(url.trim()).map_or_else(|_| url.to_owned(), |u| u.to_string())
}

/// [`DocumentFetcher`] that serves repeated URLs from a [`DocumentCache`].
///
/// Failed fetches are not cached.
pub struct CachedFetcher {
    inner: Arc<dyn DocumentFetcher>,
    cache: Arc<DocumentCache>,
}

impl CachedFetcher {
    #[must_use]
    pub fn new(inner: Arc<dyn DocumentFetcher>, cache: Arc<DocumentCache>) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &Arc<DocumentCache> {
        &self.cache
    }
}

#[async_trait]
impl DocumentFetcher for CachedFetcher {
    async fn fetch(&self, url: &str) -> Result<ReportDocument, FetchError> {
        if let Some(document) = self.cache.get(url) {
            tracing::debug!(url, "Document cache hit");
            return Ok(document);
        }

        let document = self.inner.fetch(url).await?;
        self.cache.insert(url, document.clone());
        Ok(document)
    }
}
