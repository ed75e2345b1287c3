//! `replay engine` command implementations.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Subcommand};
use replay_config::{CliSettings, Config};
use replay_engine::{
    AliasKind, EngineDirs, InstallCoordinator, NpmInstaller, PackageAlias, VersionIdentifier,
};

use crate::error::CliError;
use crate::output::Output;

/// Engine version commands.
#[derive(Subcommand)]
pub(crate) enum EngineCommand {
    /// Install an engine version ahead of the first request for it.
    Install {
        /// Engine version, e.g. `10.4.0` or `9`.
        version: String,
        #[command(flatten)]
        common: EngineArgs,
    },
    /// List installed engine versions.
    List {
        #[command(flatten)]
        common: EngineArgs,
    },
}

/// Options shared by engine commands.
#[derive(Args)]
pub(crate) struct EngineArgs {
    /// Path to configuration file (default: auto-discover replay.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Engine install directory (overrides config).
    #[arg(long)]
    install_dir: Option<PathBuf>,

    /// Enable verbose output (show package manager logs).
    #[arg(short, long)]
    verbose: bool,
}

impl EngineArgs {
    fn coordinator(self) -> Result<InstallCoordinator, CliError> {
        let settings = CliSettings {
            install_dir: self.install_dir,
            ..CliSettings::default()
        };
        let config = Config::load(self.config.as_deref(), Some(&settings))?;
        let engine = &config.engine_resolved;

        let dirs = EngineDirs::new(engine.install_dir.clone(), engine.package.clone());
        let installer = Arc::new(NpmInstaller::new(engine.npm.clone(), dirs.clone()));
        Ok(InstallCoordinator::new(dirs, installer))
    }
}

impl EngineCommand {
    pub(crate) fn verbose(&self) -> bool {
        match self {
            Self::Install { common, .. } | Self::List { common } => common.verbose,
        }
    }

    /// Execute the engine command.
    ///
    /// # Errors
    ///
    /// Returns an error if the version is invalid, the install fails, or the
    /// install directory cannot be read.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        match self {
            Self::Install { version, common } => {
                let version = VersionIdentifier::parse(&version)?;
                let coordinator = common.coordinator()?;

                output.info(&format!("Installing engine {version}..."));
                let alias = coordinator.wait_installed(&version).await;
                check_installed(&version, &alias)?;
                output.success(&format!(
                    "Installed {} at {}",
                    alias,
                    coordinator.dirs().package_dir(&alias).display()
                ));
            }
            Self::List { common } => {
                let coordinator = common.coordinator()?;
                let installed = coordinator.list_installed().await?;
                if installed.is_empty() {
                    output.warning(&format!(
                        "No engine versions installed in {}",
                        coordinator.dirs().modules_dir().display()
                    ));
                }
                for alias in installed {
                    output.result(alias.name());
                }
            }
        }

        Ok(())
    }
}

/// An install counts only if it produced the exact alias.
fn check_installed(version: &VersionIdentifier, alias: &PackageAlias) -> Result<(), CliError> {
    match alias.kind() {
        AliasKind::Exact(installed) if installed == version => Ok(()),
        _ => Err(CliError::Validation(format!(
            "Failed to install engine {version}; requests would fall back to {alias}"
        ))),
    }
}
