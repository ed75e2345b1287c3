//! Generic HTTP retrieval.

use std::time::Duration;

use async_trait::async_trait;
use ureq::Agent;

use crate::document::ReportDocument;
use crate::error::FetchError;
use crate::fetcher::DocumentFetcher;

/// `User-Agent` sent with every request unless configured otherwise.
pub const DEFAULT_USER_AGENT: &str = concat!("replay/", env!("CARGO_PKG_VERSION"));

/// Reports above this size are rejected.
const MAX_BODY_BYTES: u64 = 64 * 1024 * 1024;

/// Fetches reports with plain `GET` requests.
///
/// ureq is blocking, so requests run on the blocking thread pool.
#[derive(Clone)]
pub struct HttpFetcher {
    agent: Agent,
    user_agent: String,
}

impl HttpFetcher {
    #[must_use]
    pub fn new(timeout: Duration, user_agent: impl Into<String>) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            agent,
            user_agent: user_agent.into(),
        }
    }

    /// Download the response body of a successful `GET`.
    pub async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let agent = self.agent.clone();
        let user_agent = self.user_agent.clone();
        let owned_url = url.to_owned();

        tokio::task::spawn_blocking(move || get_blocking(&agent, &owned_url, &user_agent))
            .await
            .map_err(|e| FetchError::Transport {
                url: url.to_owned(),
                message: e.to_string(),
            })?
    }
}

fn get_blocking(agent: &Agent, url: &str, user_agent: &str) -> Result<Vec<u8>, FetchError> {
    let transport = |message: String| FetchError::Transport {
        url: url.to_owned(),
        message,
    };

    let response = agent
        .get(url)
        .header("User-Agent", user_agent)
        .header("Accept", "application/json")
        .call()
        .map_err(|e| transport(e.to_string()))?;

    let status = response.status().as_u16();
    if !(200..300).contains(&status) {
        return Err(FetchError::Status {
            url: url.to_owned(),
            status,
        });
    }

    response
        .into_body()
        .with_config()
        .limit(MAX_BODY_BYTES)
        .read_to_vec()
        .map_err(|e| transport(e.to_string()))
}

#[async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<ReportDocument, FetchError> {
        let body = self.get(url).await?;
        tracing::debug!(url, bytes = body.len(), "Fetched report over HTTP");
        Ok(ReportDocument::from_slice(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::test_support::serve_once;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_fetch_parses_report() {
        let (url, server) = serve_once(
            "/report.json",
            "200 OK",
            r#"{"lighthouseVersion":"10.4.0"}"#,
        );
        let fetcher = HttpFetcher::new(Duration::from_secs(5), "replay-test/1.0");

        let doc = fetcher.fetch(&url).await.unwrap();
        let head = server.join().unwrap().to_lowercase();

        assert_eq!(doc.version().as_str(), "10.4.0");
        assert!(head.starts_with("get /report.json"), "{head}");
        assert!(head.contains("user-agent: replay-test/1.0"), "{head}");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_non_success_status_is_error() {
        let (url, server) = serve_once("/report.json", "404 Not Found", "missing");
        let fetcher = HttpFetcher::new(Duration::from_secs(5), DEFAULT_USER_AGENT);

        let err = fetcher.fetch(&url).await.unwrap_err();
        server.join().unwrap();

        assert!(
            matches!(err, FetchError::Status { status: 404, .. }),
            "got {err:?}"
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_body_without_version_is_validation_error() {
        let (url, server) = serve_once("/report.json", "200 OK", r#"{"audits":{}}"#);
        let fetcher = HttpFetcher::new(Duration::from_secs(5), DEFAULT_USER_AGENT);

        let err = fetcher.fetch(&url).await.unwrap_err();
        server.join().unwrap();

        assert!(err.validation().is_some(), "got {err:?}");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_connection_refused_is_transport_error() {
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let fetcher = HttpFetcher::new(Duration::from_secs(5), DEFAULT_USER_AGENT);

        let err = fetcher
            .fetch(&format!("http://127.0.0.1:{port}/report.json"))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Transport { .. }), "got {err:?}");
    }
}
