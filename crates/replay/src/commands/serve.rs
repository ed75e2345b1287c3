//! `replay serve` command implementation.

use std::path::{Path, PathBuf};

use clap::Args;
use replay_config::{CliSettings, Config};
use replay_server::{run_server, server_config_from_replay_config};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the serve command.
#[derive(Args)]
pub(crate) struct ServeArgs {
    /// Path to configuration file (default: auto-discover replay.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind to (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind to (overrides config).
    #[arg(short, long)]
    port: Option<u16>,

    /// Engine install directory (overrides config).
    #[arg(long)]
    install_dir: Option<PathBuf>,

    /// Report rendered when a request carries no token (overrides config).
    #[arg(short, long)]
    local_report: Option<PathBuf>,

    /// Token secret (overrides config).
    #[arg(long, env = "REPLAY_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// Fetch object storage URLs through the storage API.
    #[arg(long)]
    storage: Option<bool>,

    /// Fetch every URL over plain HTTP.
    #[arg(long, conflicts_with = "storage")]
    no_storage: bool,

    /// Enable verbose output (request and install logs).
    #[arg(short, long)]
    pub verbose: bool,
}

impl ServeArgs {
    /// Execute the serve command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or the server fails to start.
    pub(crate) async fn execute(self, version: &str) -> Result<(), CliError> {
        let output = Output::new();

        let storage_enabled = self.resolve_storage_enabled();
        let cli_settings = CliSettings {
            host: self.host,
            port: self.port,
            install_dir: self.install_dir,
            local_report: self.local_report,
            storage_enabled,
            secret: self.secret,
        };

        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        config.validate()?;

        ensure_install_dir(&config.engine_resolved.install_dir)?;

        output.info(&format!(
            "Starting replay {version} on {}:{}",
            config.server.host, config.server.port
        ));
        output.info(&format!(
            "Engine: {} (installed under {})",
            config.engine_resolved.package,
            config.engine_resolved.install_dir.display()
        ));

        match &config.report_resolved.local_path {
            Some(path) => output.info(&format!("Local report: {}", path.display())),
            None => output.info("Local report: none"),
        }

        if let Err(e) = config.require_secret() {
            output.warning(&format!("Token requests disabled: {e}"));
        }

        if config.storage.enabled {
            if config.require_storage().is_ok() {
                output.info("Object storage: enabled (static credentials)");
            } else {
                output.info("Object storage: enabled (default credential chain)");
            }
        } else {
            output.info("Object storage: disabled");
        }

        let server_config = server_config_from_replay_config(&config);
        run_server(server_config)
            .await
            .map_err(|e| CliError::Server(e.to_string()))?;

        Ok(())
    }

    /// Resolve `storage_enabled` from --storage/--no-storage flags.
    fn resolve_storage_enabled(&self) -> Option<bool> {
        self.no_storage.then_some(false).or(self.storage)
    }
}

/// Ensure the engine install directory exists with a `.gitignore`.
fn ensure_install_dir(install_dir: &Path) -> Result<(), CliError> {
    std::fs::create_dir_all(install_dir)
        .map_err(|e| CliError::Server(format!("Failed to create install directory: {e}")))?;

    let gitignore_path = install_dir.join(".gitignore");
    if !gitignore_path.exists() {
        let _ = std::fs::write(&gitignore_path, "# Automatically created by replay\n*\n");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_ensure_install_dir_creates_gitignore() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join(".replay/engine");

        ensure_install_dir(&dir).unwrap();

        assert!(dir.is_dir());
        assert_eq!(
            std::fs::read_to_string(dir.join(".gitignore")).unwrap(),
            "# Automatically created by replay\n*\n"
        );
    }

    #[test]
    fn test_ensure_install_dir_keeps_existing_gitignore() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join(".gitignore"), "custom\n").unwrap();

        ensure_install_dir(temp.path()).unwrap();

        assert_eq!(
            std::fs::read_to_string(temp.path().join(".gitignore")).unwrap(),
            "custom\n"
        );
    }
}
