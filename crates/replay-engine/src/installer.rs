//! External package-install primitive.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::dirs::EngineDirs;
use crate::version::{PackageAlias, VersionIdentifier};

/// Error from an install attempt.
///
/// Never reaches request handlers: the coordinator absorbs it and falls back
/// to an already installed alias.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("failed to prepare install directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("installing {spec} failed ({status}): {stderr}")]
    Failed {
        spec: String,
        status: String,
        stderr: String,
    },
}

/// Installs one pinned engine version under an alias.
#[async_trait]
pub trait PackageInstaller: Send + Sync {
    /// Install `version` of the engine so that it resolves as `alias`.
    async fn install(
        &self,
        alias: &PackageAlias,
        version: &VersionIdentifier,
    ) -> Result<(), InstallError>;
}

/// [`PackageInstaller`] backed by `npm install` with aliased specifiers.
///
/// Runs `npm install --prefix {prefix} {alias}@npm:{package}@{version}`, so
/// many versions of the same package coexist side by side.
pub struct NpmInstaller {
    program: String,
    dirs: EngineDirs,
}

impl NpmInstaller {
    #[must_use]
    pub fn new(program: impl Into<String>, dirs: EngineDirs) -> Self {
        Self {
            program: program.into(),
            dirs,
        }
    }

    fn spec(&self, alias: &PackageAlias, version: &VersionIdentifier) -> String {
        format!("{alias}@npm:{}@{version}", self.dirs.package())
    }
}

#[async_trait]
impl PackageInstaller for NpmInstaller {
    async fn install(
        &self,
        alias: &PackageAlias,
        version: &VersionIdentifier,
    ) -> Result<(), InstallError> {
        tokio::fs::create_dir_all(self.dirs.prefix()).await?;

        let spec = self.spec(alias, version);
        tracing::info!(spec = %spec, prefix = %self.dirs.prefix().display(), "Running npm install");

        let output = Command::new(&self.program)
            .arg("install")
            .arg("--prefix")
            .arg(self.dirs.prefix())
            .arg("--no-audit")
            .arg("--no-fund")
            .arg(&spec)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| InstallError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(InstallError::Failed {
                spec,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }

        Ok(())
    }
}
