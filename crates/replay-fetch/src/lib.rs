//! Remote report retrieval.
//!
//! A report URL is classified into a [`RemoteLocation`] and fetched either
//! with a plain HTTP `GET` or from S3-compatible object storage. The body
//! must be a JSON report naming the engine version that produced it.
//!
//! [`CachedFetcher`] wraps any [`DocumentFetcher`] with an in-memory cache
//! keyed by canonical URL.

mod cache;
mod document;
mod error;
mod fetcher;
mod http;
mod location;
mod object_store;
#[cfg(test)]
mod test_support;

pub use cache::{CachedFetcher, DocumentCache, canonical_url};
pub use document::{DocumentError, ReportDocument, VERSION_FIELD, ValidationError};
pub use error::FetchError;
pub use fetcher::{DocumentFetcher, FetcherConfig, RemoteFetcher, StorageSettings};
pub use http::{DEFAULT_USER_AGENT, HttpFetcher};
pub use location::{ObjectLocation, RemoteLocation};
pub use object_store::{ObjectStoreCredentials, ObjectStoreFetcher};
