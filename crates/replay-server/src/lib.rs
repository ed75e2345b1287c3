//! HTTP server for Replay report rendering.
//!
//! Renders stored performance reports with the engine release that produced
//! them:
//! - `GET /` renders the report an encrypted `token` points to, or the
//!   configured local report
//! - `GET /wait/{version}` is shown while that release installs
//! - `GET /assets/{file}` serves the release's report assets
//! - `/admin/*` clears install tasks and the document cache
//!
//! # Quick Start
//!
//! ```ignore
//! use replay_server::{ServerConfig, run_server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig {
//!         secret: Some("0123456789abcdef".to_owned()),
//!         ..ServerConfig::default()
//!     };
//!
//!     run_server(config).await.unwrap();
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! Browser ──HTTP──► axum server (replay-server)
//!                        │
//!                        ├─► token ──► replay-token (decrypt URL)
//!                        │
//!                        ├─► report ──► replay-fetch (HTTP / object storage, cached)
//!                        │
//!                        ├─► engine ──► replay-engine (install coordinator, layouts)
//!                        │
//!                        └─► HTML ──► replay-render (node generator, asset rewrite)
//! ```

mod app;
mod error;
mod handlers;
mod middleware;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use replay_engine::{EngineDirs, InstallCoordinator, LayoutResolver, NpmInstaller};
use replay_fetch::{
    CachedFetcher, DEFAULT_USER_AGENT, DocumentCache, FetcherConfig, ObjectStoreCredentials,
    RemoteFetcher, StorageSettings,
};
use replay_render::NodeGeneratorFactory;
use state::{ActiveVersion, AppState};

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Engine install prefix.
    pub install_dir: PathBuf,
    /// Engine package name.
    pub package: String,
    /// Package manager program.
    pub npm: String,
    /// Script runtime that runs the report generator.
    pub node: String,
    /// Refresh interval of the waiting page.
    pub poll_interval_secs: u64,
    /// Report rendered when no token is given.
    pub local_report: Option<PathBuf>,
    /// Token secret (`None` rejects token requests).
    pub secret: Option<String>,
    /// Remote fetch settings.
    pub fetcher: FetcherConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8080,
            install_dir: PathBuf::from(".replay/engine"),
            package: "lighthouse".to_owned(),
            npm: "npm".to_owned(),
            node: "node".to_owned(),
            poll_interval_secs: 2,
            local_report: None,
            secret: None,
            fetcher: FetcherConfig::default(),
        }
    }
}

/// Run the server.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.secret.is_none() {
        tracing::warn!("No token secret configured, token requests will be rejected");
    }

    let dirs = EngineDirs::new(config.install_dir.clone(), config.package.clone());
    let installer = Arc::new(NpmInstaller::new(config.npm.clone(), dirs.clone()));
    let coordinator = InstallCoordinator::new(dirs.clone(), installer);

    let cache = Arc::new(DocumentCache::new());
    let remote = Arc::new(RemoteFetcher::new(config.fetcher.clone()));
    let fetcher = Arc::new(CachedFetcher::new(remote, Arc::clone(&cache)));

    let state = Arc::new(AppState {
        coordinator,
        resolver: LayoutResolver::new(dirs),
        fetcher,
        cache,
        generators: Arc::new(NodeGeneratorFactory::new(config.node.clone())),
        secret: config.secret.clone(),
        local_report: config.local_report.clone(),
        poll_interval_secs: config.poll_interval_secs,
        active_version: ActiveVersion::default(),
    });

    let app = app::create_router(state);

    let addr = SocketAddr::from_str(&format!("{}:{}", config.host, config.port))?;
    tracing::info!(
        address = %addr,
        install_dir = %config.install_dir.display(),
        "Starting server"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for shutdown signal (Ctrl-C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, stopping server...");
}

/// Create server configuration from Replay config.
///
/// An invalid or missing secret leaves token requests disabled; storage
/// without static keys uses the default credential chain.
#[must_use]
pub fn server_config_from_replay_config(config: &replay_config::Config) -> ServerConfig {
    let storage = config.storage.enabled.then(|| StorageSettings {
        region: config.storage.region.clone(),
        credentials: config
            .require_storage()
            .ok()
            .map(|c| ObjectStoreCredentials {
                access_key_id: c.access_key_id,
                secret_access_key: c.secret_access_key,
            }),
    });

    ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
        install_dir: config.engine_resolved.install_dir.clone(),
        package: config.engine_resolved.package.clone(),
        npm: config.engine_resolved.npm.clone(),
        node: config.engine_resolved.node.clone(),
        poll_interval_secs: config.engine_resolved.poll_interval_secs,
        local_report: config.report_resolved.local_path.clone(),
        secret: config.require_secret().ok().map(str::to_owned),
        fetcher: FetcherConfig {
            timeout: Duration::from_secs(config.fetch.timeout_secs),
            user_agent: config
                .fetch
                .user_agent
                .clone()
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_owned()),
            storage,
        },
    }
}
