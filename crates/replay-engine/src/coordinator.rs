//! Installation coordinator.
//!
//! Deduplicates concurrent requests to provision the same engine version.
//! Callers never block on an install: they get [`InstallStatus::Pending`] and
//! are expected to poll again later. The first caller for a version starts
//! the install in a background task; everyone else joins it.
//!
//! Install failures never reach callers. A failed exact install resolves to
//! the major-version alias if that one is already installed, otherwise to the
//! default package.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::watch;

use crate::dirs::EngineDirs;
use crate::installer::PackageInstaller;
use crate::version::{PackageAlias, VersionIdentifier};

/// Outcome of [`InstallCoordinator::ensure_installed`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InstallStatus {
    /// The version (or its fallback) can be used right away.
    Ready(PackageAlias),
    /// An install is running; retry later.
    Pending,
}

/// State of an install task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskState {
    Running,
    Completed(PackageAlias),
}

/// Point-in-time view of a running install task.
#[derive(Clone, Debug)]
pub struct TaskSnapshot {
    pub version: VersionIdentifier,
    /// Callers that found the task already running.
    pub waiters: usize,
    pub elapsed: Duration,
}

struct InstallTask {
    id: u64,
    state: watch::Receiver<TaskState>,
    waiters: usize,
    started_at: Instant,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    running: HashMap<VersionIdentifier, InstallTask>,
    completed: HashMap<VersionIdentifier, PackageAlias>,
}

/// Result of the atomic registry check.
enum Claim {
    Ready(PackageAlias),
    Joined,
    Started {
        id: u64,
        sender: watch::Sender<TaskState>,
    },
}

/// Process-wide install task registry.
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone)]
pub struct InstallCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    dirs: EngineDirs,
    installer: Arc<dyn PackageInstaller>,
    registry: Mutex<Registry>,
}

impl InstallCoordinator {
    #[must_use]
    pub fn new(dirs: EngineDirs, installer: Arc<dyn PackageInstaller>) -> Self {
        Self {
            inner: Arc::new(Inner {
                dirs,
                installer,
                registry: Mutex::new(Registry::default()),
            }),
        }
    }

    pub fn dirs(&self) -> &EngineDirs {
        &self.inner.dirs
    }

    /// Make sure `version` is installed, without waiting for it.
    ///
    /// Returns [`InstallStatus::Ready`] if the exact version is installed or
    /// an earlier install of it has completed (possibly with a fallback
    /// alias). Otherwise starts or joins the install and returns
    /// [`InstallStatus::Pending`].
    pub async fn ensure_installed(&self, version: &VersionIdentifier) -> InstallStatus {
        let exact = self.inner.dirs.exact_alias(version);
        if self.inner.dirs.is_installed(&exact).await {
            return InstallStatus::Ready(exact);
        }

        match self.claim(version) {
            Claim::Ready(alias) => InstallStatus::Ready(alias),
            Claim::Joined => {
                tracing::debug!(version = %version, "Install already running");
                InstallStatus::Pending
            }
            Claim::Started { id, sender } => {
                tracing::info!(version = %version, alias = %exact, "Starting engine install");
                let this = self.clone();
                let version = version.clone();
                tokio::spawn(async move {
                    this.run_install(id, version, exact, sender).await;
                });
                InstallStatus::Pending
            }
        }
    }

    /// Make sure `version` is installed and wait for the outcome.
    pub async fn wait_installed(&self, version: &VersionIdentifier) -> PackageAlias {
        loop {
            if let InstallStatus::Ready(alias) = self.ensure_installed(version).await {
                return alias;
            }

            // The task may finish between the two registry lookups; the next
            // iteration then sees its outcome.
            let Some(mut state) = self.subscribe(version) else {
                continue;
            };

            let outcome = state
                .wait_for(|s| matches!(s, TaskState::Completed(_)))
                .await
                .ok()
                .and_then(|s| match &*s {
                    TaskState::Completed(alias) => Some(alias.clone()),
                    TaskState::Running => None,
                });

            return match outcome {
                Some(alias) => alias,
                // Task vanished without publishing an outcome
                None => self.fallback_alias(version).await,
            };
        }
    }

    /// Non-blocking status query for a version.
    pub fn status(&self, version: &VersionIdentifier) -> Option<TaskState> {
        let registry = self.registry();
        if registry.running.contains_key(version) {
            return Some(TaskState::Running);
        }
        registry
            .completed
            .get(version)
            .map(|alias| TaskState::Completed(alias.clone()))
    }

    /// Snapshot of all running install tasks, sorted by version.
    pub fn running_tasks(&self) -> Vec<TaskSnapshot> {
        let registry = self.registry();
        let mut tasks: Vec<TaskSnapshot> = registry
            .running
            .iter()
            .map(|(version, task)| TaskSnapshot {
                version: version.clone(),
                waiters: task.waiters,
                elapsed: task.started_at.elapsed(),
            })
            .collect();
        tasks.sort_by(|a, b| a.version.cmp(&b.version));
        tasks
    }

    /// Forget all running and completed tasks.
    ///
    /// Running installs are not cancelled; they finish in the background.
    /// Returns the number of entries removed.
    pub fn clear(&self) -> usize {
        let mut registry = self.registry();
        let removed = registry.running.len() + registry.completed.len();
        registry.running.clear();
        registry.completed.clear();
        tracing::info!(removed, "Cleared install task registry");
        removed
    }

    /// Installed aliases of the engine package.
    pub async fn list_installed(&self) -> std::io::Result<Vec<PackageAlias>> {
        self.inner.dirs.list_installed().await
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.inner
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Check for and insert a task in one critical section.
    fn claim(&self, version: &VersionIdentifier) -> Claim {
        let mut registry = self.registry();

        if let Some(alias) = registry.completed.get(version) {
            return Claim::Ready(alias.clone());
        }

        if let Some(task) = registry.running.get_mut(version) {
            task.waiters += 1;
            return Claim::Joined;
        }

        let id = registry.next_id;
        registry.next_id += 1;
        let (sender, receiver) = watch::channel(TaskState::Running);
        registry.running.insert(
            version.clone(),
            InstallTask {
                id,
                state: receiver,
                waiters: 0,
                started_at: Instant::now(),
            },
        );

        Claim::Started { id, sender }
    }

    fn subscribe(&self, version: &VersionIdentifier) -> Option<watch::Receiver<TaskState>> {
        self.registry()
            .running
            .get(version)
            .map(|task| task.state.clone())
    }

    async fn run_install(
        self,
        id: u64,
        version: VersionIdentifier,
        exact: PackageAlias,
        sender: watch::Sender<TaskState>,
    ) {
        let started_at = Instant::now();

        let alias = match self.inner.installer.install(&exact, &version).await {
            Ok(()) => {
                tracing::info!(
                    version = %version,
                    alias = %exact,
                    elapsed_ms = started_at.elapsed().as_millis(),
                    "Engine install completed"
                );
                exact
            }
            Err(err) => {
                let fallback = self.fallback_alias(&version).await;
                tracing::warn!(
                    version = %version,
                    error = %err,
                    fallback = %fallback,
                    "Engine install failed, using fallback"
                );
                fallback
            }
        };

        {
            let mut registry = self.registry();
            registry.completed.insert(version.clone(), alias.clone());
            // After an admin clear a newer task may own this slot
            if registry.running.get(&version).is_some_and(|t| t.id == id) {
                registry.running.remove(&version);
            }
        }

        sender.send_replace(TaskState::Completed(alias));
    }

    /// Major alias if installed, otherwise the default package.
    async fn fallback_alias(&self, version: &VersionIdentifier) -> PackageAlias {
        let dirs = &self.inner.dirs;
        if !version.is_bare_major() {
            let major = dirs.major_alias(version.major());
            if dirs.is_installed(&major).await {
                return major;
            }
        }
        dirs.default_alias()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use tokio::sync::Notify;

    use super::*;
    use crate::installer::InstallError;

    /// Installer that records calls and optionally waits for a release signal.
    struct MockInstaller {
        dirs: EngineDirs,
        succeed: bool,
        gate: Option<Notify>,
        calls: AtomicUsize,
    }

    impl MockInstaller {
        fn new(dirs: &EngineDirs, succeed: bool) -> Self {
            Self {
                dirs: dirs.clone(),
                succeed,
                gate: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn gated(mut self) -> Self {
            self.gate = Some(Notify::new());
            self
        }

        fn release(&self) {
            if let Some(gate) = &self.gate {
                gate.notify_one();
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PackageInstaller for MockInstaller {
        async fn install(
            &self,
            alias: &PackageAlias,
            _version: &VersionIdentifier,
        ) -> Result<(), InstallError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if !self.succeed {
                return Err(InstallError::Failed {
                    spec: alias.to_string(),
                    status: "exit status: 1".to_owned(),
                    stderr: "npm ERR! 404".to_owned(),
                });
            }
            install_fake(&self.dirs, alias);
            Ok(())
        }
    }

    fn install_fake(dirs: &EngineDirs, alias: &PackageAlias) {
        let dir = dirs.package_dir(alias);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("package.json"), "{}").unwrap();
    }

    fn version(s: &str) -> VersionIdentifier {
        VersionIdentifier::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_installed_version_is_ready_without_side_effects() {
        let temp = tempfile::tempdir().unwrap();
        let dirs = EngineDirs::new(temp.path(), "lighthouse");
        let installer = Arc::new(MockInstaller::new(&dirs, true));
        let coordinator = InstallCoordinator::new(dirs.clone(), Arc::clone(&installer) as _);
        let v = version("10.4.0");
        install_fake(&dirs, &dirs.exact_alias(&v));

        let status = coordinator.ensure_installed(&v).await;

        assert_eq!(status, InstallStatus::Ready(dirs.exact_alias(&v)));
        assert_eq!(installer.calls(), 0);
        assert!(coordinator.status(&v).is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_launch_one_install() {
        let temp = tempfile::tempdir().unwrap();
        let dirs = EngineDirs::new(temp.path(), "lighthouse");
        let installer = Arc::new(MockInstaller::new(&dirs, true).gated());
        let coordinator = InstallCoordinator::new(dirs.clone(), Arc::clone(&installer) as _);
        let v = version("9.9.9");

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let coordinator = coordinator.clone();
                let v = v.clone();
                tokio::spawn(async move { coordinator.ensure_installed(&v).await })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap(), InstallStatus::Pending);
        }

        let tasks = coordinator.running_tasks();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].version, v);
        assert_eq!(tasks[0].waiters, 15);
        assert_eq!(coordinator.status(&v), Some(TaskState::Running));

        installer.release();
        let alias = coordinator.wait_installed(&v).await;

        assert_eq!(alias, dirs.exact_alias(&v));
        assert_eq!(installer.calls(), 1);
        assert!(coordinator.running_tasks().is_empty());
        assert_eq!(
            coordinator.ensure_installed(&v).await,
            InstallStatus::Ready(dirs.exact_alias(&v))
        );
    }

    #[tokio::test]
    async fn test_failed_install_falls_back_to_installed_major() {
        let temp = tempfile::tempdir().unwrap();
        let dirs = EngineDirs::new(temp.path(), "lighthouse");
        let installer = Arc::new(MockInstaller::new(&dirs, false));
        let coordinator = InstallCoordinator::new(dirs.clone(), Arc::clone(&installer) as _);
        install_fake(&dirs, &dirs.major_alias(10));
        install_fake(&dirs, &dirs.default_alias());
        let v = version("10.4.0");

        let alias = coordinator.wait_installed(&v).await;

        assert_eq!(alias, dirs.major_alias(10));
    }

    #[tokio::test]
    async fn test_failed_install_falls_back_to_default_package() {
        let temp = tempfile::tempdir().unwrap();
        let dirs = EngineDirs::new(temp.path(), "lighthouse");
        let installer = Arc::new(MockInstaller::new(&dirs, false));
        let coordinator = InstallCoordinator::new(dirs.clone(), Arc::clone(&installer) as _);
        // A different major line does not qualify
        install_fake(&dirs, &dirs.major_alias(9));
        let v = version("10.4.0");

        let alias = coordinator.wait_installed(&v).await;

        assert_eq!(alias, dirs.default_alias());
    }

    #[tokio::test]
    async fn test_bare_major_failure_skips_major_alias() {
        let temp = tempfile::tempdir().unwrap();
        let dirs = EngineDirs::new(temp.path(), "lighthouse");
        let installer = Arc::new(MockInstaller::new(&dirs, false));
        let coordinator = InstallCoordinator::new(dirs.clone(), Arc::clone(&installer) as _);

        let alias = coordinator.wait_installed(&version("10")).await;

        assert_eq!(alias, dirs.default_alias());
    }

    #[tokio::test]
    async fn test_completed_fallback_is_not_retried() {
        let temp = tempfile::tempdir().unwrap();
        let dirs = EngineDirs::new(temp.path(), "lighthouse");
        let installer = Arc::new(MockInstaller::new(&dirs, false));
        let coordinator = InstallCoordinator::new(dirs.clone(), Arc::clone(&installer) as _);
        let v = version("10.4.0");

        coordinator.wait_installed(&v).await;
        let status = coordinator.ensure_installed(&v).await;

        assert_eq!(status, InstallStatus::Ready(dirs.default_alias()));
        assert_eq!(
            coordinator.status(&v),
            Some(TaskState::Completed(dirs.default_alias()))
        );
        assert_eq!(installer.calls(), 1);
    }

    #[tokio::test]
    async fn test_clear_allows_retry() {
        let temp = tempfile::tempdir().unwrap();
        let dirs = EngineDirs::new(temp.path(), "lighthouse");
        let installer = Arc::new(MockInstaller::new(&dirs, false));
        let coordinator = InstallCoordinator::new(dirs.clone(), Arc::clone(&installer) as _);
        let v = version("10.4.0");

        coordinator.wait_installed(&v).await;
        assert_eq!(coordinator.clear(), 1);
        assert!(coordinator.status(&v).is_none());

        coordinator.wait_installed(&v).await;
        assert_eq!(installer.calls(), 2);
    }

    #[tokio::test]
    async fn test_different_versions_get_separate_tasks() {
        let temp = tempfile::tempdir().unwrap();
        let dirs = EngineDirs::new(temp.path(), "lighthouse");
        let installer = Arc::new(MockInstaller::new(&dirs, true).gated());
        let coordinator = InstallCoordinator::new(dirs.clone(), Arc::clone(&installer) as _);

        coordinator.ensure_installed(&version("9.6.8")).await;
        coordinator.ensure_installed(&version("10.4.0")).await;

        let versions: Vec<String> = coordinator
            .running_tasks()
            .iter()
            .map(|t| t.version.to_string())
            .collect();
        assert_eq!(versions, vec!["10.4.0", "9.6.8"]);
    }
}
