//! Layout resolution for installed engine packages.
//!
//! The report generator moved around between engine releases. A static table
//! maps major versions to the layout they are known to ship; that layout is
//! probed first, then every other known layout in table order. If nothing
//! matches under the requested alias, the default package is probed the same
//! way.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use crate::dirs::EngineDirs;
use crate::version::PackageAlias;

/// How a layout's generator module exposes its HTML entry point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeneratorApi {
    /// `ReportGenerator.generateReportHtml(lhr)`.
    Static,
    /// `new ReportGeneratorV2().generateReportHtml(lhr)`.
    Instance,
}

impl GeneratorApi {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Instance => "instance",
        }
    }
}

/// One historical directory layout of the engine package.
#[derive(Debug, PartialEq, Eq)]
pub struct Layout {
    pub name: &'static str,
    /// Generator module, relative to the package root.
    pub entry_point: &'static str,
    /// Report asset directory, relative to the package root.
    pub asset_dir: &'static str,
    /// Major versions known to ship this layout.
    pub majors: RangeInclusive<u64>,
    pub api: GeneratorApi,
}

/// Known layouts in probe order.
pub static LAYOUTS: [Layout; 3] = [
    Layout {
        name: "modern",
        entry_point: "report/generator/report-generator.js",
        asset_dir: "report/assets",
        majors: 9..=u64::MAX,
        api: GeneratorApi::Static,
    },
    Layout {
        name: "legacy-flat",
        entry_point: "lighthouse-core/report/report-generator.js",
        asset_dir: "lighthouse-core/report/html",
        majors: 3..=8,
        api: GeneratorApi::Static,
    },
    Layout {
        name: "versioned",
        entry_point: "lighthouse-core/report/v2/report-generator.js",
        asset_dir: "lighthouse-core/report/v2",
        majors: 2..=2,
        api: GeneratorApi::Instance,
    },
];

/// Layout expected for a major version, if the table covers it.
pub fn layout_for_major(major: u64) -> Option<&'static Layout> {
    LAYOUTS.iter().find(|layout| layout.majors.contains(&major))
}

/// Resolved generator module of an installed package.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryPoint {
    pub alias: PackageAlias,
    pub layout: &'static Layout,
    pub path: PathBuf,
}

/// Resolved asset directory of an installed package.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetDir {
    pub alias: PackageAlias,
    pub layout: &'static Layout,
    pub path: PathBuf,
}

/// No known layout matched the alias or the default package.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("no report generator found in {alias} or {default}")]
    EntryPoint { alias: String, default: String },

    #[error("no report assets found in {alias} or {default}")]
    AssetDir { alias: String, default: String },
}

#[derive(Clone, Copy)]
enum Artifact {
    EntryPoint,
    AssetDir,
}

impl Artifact {
    fn relative_path(self, layout: &Layout) -> &'static str {
        match self {
            Self::EntryPoint => layout.entry_point,
            Self::AssetDir => layout.asset_dir,
        }
    }

    async fn exists(self, path: &Path) -> bool {
        match tokio::fs::metadata(path).await {
            Ok(meta) => match self {
                Self::EntryPoint => meta.is_file(),
                Self::AssetDir => meta.is_dir(),
            },
            Err(_) => false,
        }
    }
}

/// Locates generator entry points and asset directories on disk.
#[derive(Clone, Debug)]
pub struct LayoutResolver {
    dirs: EngineDirs,
}

impl LayoutResolver {
    #[must_use]
    pub fn new(dirs: EngineDirs) -> Self {
        Self { dirs }
    }

    /// Find the generator entry point of `alias` without falling back.
    pub async fn probe_entry_point(&self, alias: &PackageAlias) -> Option<EntryPoint> {
        let (layout, path) = self.probe(alias, Artifact::EntryPoint).await?;
        Some(EntryPoint {
            alias: alias.clone(),
            layout,
            path,
        })
    }

    /// Find the asset directory of `alias` without falling back.
    pub async fn probe_asset_dir(&self, alias: &PackageAlias) -> Option<AssetDir> {
        let (layout, path) = self.probe(alias, Artifact::AssetDir).await?;
        Some(AssetDir {
            alias: alias.clone(),
            layout,
            path,
        })
    }

    /// Find the generator entry point of `alias`, falling back to the
    /// default package.
    pub async fn resolve_entry_point(
        &self,
        alias: &PackageAlias,
    ) -> Result<EntryPoint, ResolutionError> {
        if let Some(entry) = self.probe_entry_point(alias).await {
            return Ok(entry);
        }

        let default = self.dirs.default_alias();
        if !alias.is_default()
            && let Some(entry) = self.probe_entry_point(&default).await
        {
            tracing::warn!(alias = %alias, "No generator in alias, using default package");
            return Ok(entry);
        }

        Err(ResolutionError::EntryPoint {
            alias: alias.to_string(),
            default: default.to_string(),
        })
    }

    /// Find the asset directory of `alias`, falling back to the default
    /// package.
    pub async fn resolve_asset_dir(
        &self,
        alias: &PackageAlias,
    ) -> Result<AssetDir, ResolutionError> {
        if let Some(dir) = self.probe_asset_dir(alias).await {
            return Ok(dir);
        }

        let default = self.dirs.default_alias();
        if !alias.is_default()
            && let Some(dir) = self.probe_asset_dir(&default).await
        {
            tracing::warn!(alias = %alias, "No assets in alias, using default package");
            return Ok(dir);
        }

        Err(ResolutionError::AssetDir {
            alias: alias.to_string(),
            default: default.to_string(),
        })
    }

    async fn probe(
        &self,
        alias: &PackageAlias,
        artifact: Artifact,
    ) -> Option<(&'static Layout, PathBuf)> {
        let root = self.dirs.package_dir(alias);
        for layout in candidates(alias) {
            let path = root.join(artifact.relative_path(layout));
            if artifact.exists(&path).await {
                tracing::debug!(alias = %alias, layout = layout.name, "Resolved layout");
                return Some((layout, path));
            }
        }
        None
    }
}

/// Layouts in probe order: the table's pick for the pinned major first.
fn candidates(alias: &PackageAlias) -> Vec<&'static Layout> {
    let hinted = alias.pinned_major().and_then(layout_for_major);
    hinted
        .into_iter()
        .chain(
            LAYOUTS
                .iter()
                .filter(move |layout| hinted.is_none_or(|h| !std::ptr::eq(h, *layout))),
        )
        .collect()
}
