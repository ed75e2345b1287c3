//! Fetcher abstraction and the URL-dispatching implementation.

use std::time::Duration;

use async_trait::async_trait;

use crate::document::ReportDocument;
use crate::error::FetchError;
use crate::http::{DEFAULT_USER_AGENT, HttpFetcher};
use crate::location::RemoteLocation;
use crate::object_store::{ObjectStoreCredentials, ObjectStoreFetcher};

/// Retrieves a report by URL.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<ReportDocument, FetchError>;
}

/// Object storage settings for [`RemoteFetcher`].
#[derive(Clone, Debug)]
pub struct StorageSettings {
    /// Region used when the URL does not name one.
    pub region: String,
    pub credentials: Option<ObjectStoreCredentials>,
}

/// Configuration for [`RemoteFetcher`].
#[derive(Clone, Debug)]
pub struct FetcherConfig {
    pub timeout: Duration,
    pub user_agent: String,
    /// `None` disables object storage; every URL is fetched over HTTP.
    pub storage: Option<StorageSettings>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            storage: None,
        }
    }
}

/// Fetches from HTTP or object storage depending on the URL shape.
pub struct RemoteFetcher {
    http: HttpFetcher,
    object_store: Option<(ObjectStoreFetcher, String)>,
}

impl RemoteFetcher {
    #[must_use]
    pub fn new(config: FetcherConfig) -> Self {
        Self {
            http: HttpFetcher::new(config.timeout, config.user_agent),
            object_store: config
                .storage
                .map(|s| (ObjectStoreFetcher::new(s.credentials), s.region)),
        }
    }

    /// Classify `url` against this fetcher's storage settings.
    pub fn locate(&self, url: &str) -> Result<RemoteLocation, FetchError> {
        match &self.object_store {
            Some((_, region)) => RemoteLocation::classify(url, true, region),
            None => RemoteLocation::classify(url, false, ""),
        }
    }
}

#[async_trait]
impl DocumentFetcher for RemoteFetcher {
    async fn fetch(&self, url: &str) -> Result<ReportDocument, FetchError> {
        match self.locate(url)? {
            RemoteLocation::Http { url } => self.http.fetch(&url).await,
            RemoteLocation::ObjectStore(location) => {
                let Some((store, _)) = &self.object_store else {
                    return Err(FetchError::Config(
                        "object location without object storage".to_owned(),
                    ));
                };
                store.fetch_object(&location).await
            }
        }
    }
}
