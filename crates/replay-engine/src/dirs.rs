//! On-disk locations of installed engine versions.

use std::io;
use std::path::{Path, PathBuf};

use crate::version::{PackageAlias, VersionIdentifier};

/// Install prefix of the rendering engine.
///
/// Every version lives in its own package directory:
///
/// ```text
/// {prefix}/
/// +-- package.json
/// +-- node_modules/
///     +-- lighthouse/            # default package
///     +-- lighthouse-10/         # major alias
///     +-- lighthouse-10.4.0/     # exact alias
/// ```
#[derive(Clone, Debug)]
pub struct EngineDirs {
    prefix: PathBuf,
    package: String,
}

impl EngineDirs {
    /// Create engine directories rooted at `prefix` for `package`.
    pub fn new(prefix: impl Into<PathBuf>, package: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            package: package.into(),
        }
    }

    /// Install prefix.
    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    /// Package name of the rendering engine.
    pub fn package(&self) -> &str {
        &self.package
    }

    /// Directory holding all installed packages.
    pub fn modules_dir(&self) -> PathBuf {
        self.prefix.join("node_modules")
    }

    /// Package root of an alias.
    pub fn package_dir(&self, alias: &PackageAlias) -> PathBuf {
        self.modules_dir().join(alias.name())
    }

    pub fn exact_alias(&self, version: &VersionIdentifier) -> PackageAlias {
        PackageAlias::exact(&self.package, version)
    }

    pub fn major_alias(&self, major: u64) -> PackageAlias {
        PackageAlias::major(&self.package, major)
    }

    pub fn default_alias(&self) -> PackageAlias {
        PackageAlias::default_package(&self.package)
    }

    /// Check whether an alias has an installed package manifest.
    pub async fn is_installed(&self, alias: &PackageAlias) -> bool {
        let manifest = self.package_dir(alias).join("package.json");
        tokio::fs::try_exists(&manifest).await.unwrap_or(false)
    }

    /// List installed aliases of the engine package, sorted by name.
    ///
    /// Directories that merely share the package prefix without a version
    /// suffix (e.g. `lighthouse-plugin-foo`) are skipped.
    pub async fn list_installed(&self) -> io::Result<Vec<PackageAlias>> {
        let mut entries = match tokio::fs::read_dir(self.modules_dir()).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut aliases = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(alias) = self.alias_from_dir_name(&name) else {
                continue;
            };
            if self.is_installed(&alias).await {
                aliases.push(alias);
            }
        }

        aliases.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(aliases)
    }

    /// Map a `node_modules` entry back to the alias it was installed as.
    fn alias_from_dir_name(&self, name: &str) -> Option<PackageAlias> {
        if name == self.package {
            return Some(self.default_alias());
        }

        let suffix = name.strip_prefix(&self.package)?.strip_prefix('-')?;
        let version = VersionIdentifier::parse(suffix).ok()?;
        if version.is_bare_major() {
            Some(self.major_alias(version.major()))
        } else {
            Some(self.exact_alias(&version))
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn install_fake(dirs: &EngineDirs, name: &str) {
        let dir = dirs.modules_dir().join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("package.json"), "{}").unwrap();
    }

    #[test]
    fn test_package_dir() {
        let dirs = EngineDirs::new("/opt/engine", "lighthouse");
        let version = VersionIdentifier::parse("10.4.0").unwrap();

        assert_eq!(
            dirs.package_dir(&dirs.exact_alias(&version)),
            PathBuf::from("/opt/engine/node_modules/lighthouse-10.4.0")
        );
        assert_eq!(
            dirs.package_dir(&dirs.default_alias()),
            PathBuf::from("/opt/engine/node_modules/lighthouse")
        );
    }

    #[tokio::test]
    async fn test_is_installed_requires_manifest() {
        let temp = tempfile::tempdir().unwrap();
        let dirs = EngineDirs::new(temp.path(), "lighthouse");
        let alias = dirs.major_alias(9);

        assert!(!dirs.is_installed(&alias).await);

        // A bare directory (e.g. an interrupted install) does not count
        std::fs::create_dir_all(dirs.package_dir(&alias)).unwrap();
        assert!(!dirs.is_installed(&alias).await);

        install_fake(&dirs, "lighthouse-9");
        assert!(dirs.is_installed(&alias).await);
    }

    #[tokio::test]
    async fn test_list_installed() {
        let temp = tempfile::tempdir().unwrap();
        let dirs = EngineDirs::new(temp.path(), "lighthouse");
        install_fake(&dirs, "lighthouse");
        install_fake(&dirs, "lighthouse-10");
        install_fake(&dirs, "lighthouse-10.4.0");
        install_fake(&dirs, "lighthouse-plugin-field-performance");
        install_fake(&dirs, "left-pad");

        let names: Vec<String> = dirs
            .list_installed()
            .await
            .unwrap()
            .iter()
            .map(|a| a.name().to_owned())
            .collect();

        assert_eq!(
            names,
            vec!["lighthouse", "lighthouse-10", "lighthouse-10.4.0"]
        );
    }

    #[tokio::test]
    async fn test_list_installed_without_modules_dir() {
        let temp = tempfile::tempdir().unwrap();
        let dirs = EngineDirs::new(temp.path().join("missing"), "lighthouse");

        assert!(dirs.list_installed().await.unwrap().is_empty());
    }
}
