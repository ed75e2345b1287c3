//! Version-pinned report engine management.
//!
//! Reports are rendered by the exact engine release that produced them. This
//! crate installs those releases side by side under package aliases
//! ([`InstallCoordinator`]) and locates their generator modules and report
//! assets across historical directory layouts ([`LayoutResolver`]).
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use replay_engine::{EngineDirs, InstallCoordinator, InstallStatus, NpmInstaller};
//!
//! let dirs = EngineDirs::new(".replay/engine", "lighthouse");
//! let installer = Arc::new(NpmInstaller::new("npm", dirs.clone()));
//! let coordinator = InstallCoordinator::new(dirs, installer);
//!
//! match coordinator.ensure_installed(&"10.4.0".parse()?).await {
//!     InstallStatus::Ready(alias) => println!("use {alias}"),
//!     InstallStatus::Pending => println!("try again later"),
//! }
//! ```

mod coordinator;
mod dirs;
mod installer;
mod layout;
mod version;

pub use coordinator::{InstallCoordinator, InstallStatus, TaskSnapshot, TaskState};
pub use dirs::EngineDirs;
pub use installer::{InstallError, NpmInstaller, PackageInstaller};
pub use layout::{
    AssetDir, EntryPoint, GeneratorApi, LAYOUTS, Layout, LayoutResolver, ResolutionError,
    layout_for_major,
};
pub use version::{AliasKind, PackageAlias, VersionError, VersionIdentifier};
