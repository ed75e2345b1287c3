//! S3-compatible object storage retrieval.

use std::collections::HashMap;

use aws_sdk_s3::Client;
use aws_sdk_s3::config::Credentials;
use tokio::sync::Mutex;

use crate::document::ReportDocument;
use crate::error::{FetchError, error_chain};
use crate::location::ObjectLocation;

/// Static access key pair for object storage.
#[derive(Clone, Debug)]
pub struct ObjectStoreCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// Fetches reports from S3-compatible object storage.
///
/// One client is built per endpoint and reused for later requests.
pub struct ObjectStoreFetcher {
    credentials: Option<ObjectStoreCredentials>,
    clients: Mutex<HashMap<ClientKey, Client>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct ClientKey {
    endpoint: String,
    region: String,
    path_style: bool,
}

impl ObjectStoreFetcher {
    /// Create a fetcher.
    ///
    /// Without explicit credentials the default AWS provider chain is used
    /// (environment, profile, instance metadata).
    #[must_use]
    pub fn new(credentials: Option<ObjectStoreCredentials>) -> Self {
        Self {
            credentials,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Download and parse one object.
    pub async fn fetch_object(
        &self,
        location: &ObjectLocation,
    ) -> Result<ReportDocument, FetchError> {
        let client = self.client(location).await;
        let object_error = |message: String| FetchError::ObjectStore {
            bucket: location.bucket.clone(),
            key: location.key.clone(),
            message,
        };

        let output = client
            .get_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .send()
            .await
            .map_err(|e| object_error(error_chain(&e)))?;

        let body = output
            .body
            .collect()
            .await
            .map_err(|e| object_error(error_chain(&e)))?
            .into_bytes();

        tracing::debug!(
            bucket = %location.bucket,
            key = %location.key,
            bytes = body.len(),
            "Fetched report from object storage"
        );

        Ok(ReportDocument::from_slice(&body)?)
    }

    async fn client(&self, location: &ObjectLocation) -> Client {
        let key = ClientKey {
            endpoint: location.endpoint.clone(),
            region: location.region.clone(),
            path_style: location.path_style,
        };

        if let Some(client) = self.clients.lock().await.get(&key) {
            return client.clone();
        }

        // Built without the lock held; a concurrent miss may build a twin,
        // and the first one inserted wins.
        let client = self.build_client(&key).await;
        self.clients
            .lock()
            .await
            .entry(key)
            .or_insert(client)
            .clone()
    }

    async fn build_client(&self, key: &ClientKey) -> Client {
        tracing::debug!(endpoint = %key.endpoint, region = %key.region, "Creating object storage client");

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(key.region.clone()))
            .endpoint_url(&key.endpoint);

        if let Some(credentials) = &self.credentials {
            loader = loader.credentials_provider(Credentials::new(
                &credentials.access_key_id,
                &credentials.secret_access_key,
                None,
                None,
                "replay",
            ));
        }

        let sdk_config = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(key.path_style)
            .build();
        Client::from_conf(s3_config)
    }
}
