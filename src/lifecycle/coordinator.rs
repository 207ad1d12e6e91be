/*!
 * Lifecycle Coordinator
 *
 * Starts supervision once per application run, in order:
 * 1. Build the subprogram environment
 * 2. Persist the device identifier (if the host supplied one)
 * 3. Spawn one supervisor task per enabled subprogram
 * 4. Wait for readiness (head start or TCP probe)
 * 5. Signal readiness to the UI layer
 */

use super::hooks::RestartHooks;
use super::identity::write_device_id;
use super::readiness::{head_start, probe_tcp, Readiness};
use crate::core::config::{KernelConfig, ReadinessMode};
use crate::core::errors::{LifecycleError, LifecycleResult};
use crate::environment::{build_environment, EnvironmentSet};
use crate::process::{
    BackoffPolicy, FixedBackoff, OsLauncher, ProcessLauncher, RestartEvent, Supervisor,
    SupervisorStatus, SupervisorTask,
};
use crate::resources::{BundleDirectory, Materializer, ResourceStore};
use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};

/// What `start` did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartupReport {
    /// Subprograms now under supervision
    pub supervised: Vec<String>,
    /// Subprograms skipped because they are disabled
    pub disabled: Vec<String>,
    pub readiness: Readiness,
    /// Address the UI surface should load
    pub ui_url: String,
    pub environment_vars: usize,
}

/// Owns every supervisor of one application run
pub struct LifecycleCoordinator {
    config: KernelConfig,
    store: Arc<dyn ResourceStore>,
    launcher: Arc<dyn ProcessLauncher>,
    backoff: Arc<dyn BackoffPolicy>,
    hooks: Arc<RestartHooks>,
    started: AtomicBool,
    environment: OnceLock<Arc<EnvironmentSet>>,
    supervisors: Mutex<Vec<SupervisorTask>>,
    ready_tx: watch::Sender<bool>,
}

impl LifecycleCoordinator {
    pub fn builder(config: KernelConfig) -> CoordinatorBuilder {
        CoordinatorBuilder {
            config,
            store: None,
            launcher: None,
            backoff: None,
        }
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Start supervision; only the first call does anything
    pub async fn start(&self) -> LifecycleResult<StartupReport> {
        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(LifecycleError::AlreadyStarted);
        }

        info!("Lifecycle coordinator starting");

        let env = Arc::new(build_environment(
            &self.config.data_dir,
            self.config.install_dir(),
        ));
        let environment_vars = env.len();
        let _ = self.environment.set(Arc::clone(&env));

        if let Some(device_id) = &self.config.device_id {
            match write_device_id(&self.config.data_dir, device_id) {
                Ok(path) => info!(path = %path.display(), "Device identifier written"),
                Err(e) => warn!(error = %e, "Could not write device identifier"),
            }
        }

        let (supervised, disabled) = self.spawn_supervisors(&env);

        let readiness = if supervised.is_empty() {
            warn!("No subprograms enabled, nothing to supervise");
            Readiness::Assumed
        } else {
            self.await_readiness().await
        };

        self.ready_tx.send_replace(true);
        info!(?readiness, ui_url = %self.config.ui_url(), "Supervised servers ready");

        Ok(StartupReport {
            supervised,
            disabled,
            readiness,
            ui_url: self.config.ui_url(),
            environment_vars,
        })
    }

    fn spawn_supervisors(&self, env: &Arc<EnvironmentSet>) -> (Vec<String>, Vec<String>) {
        let materializer = Materializer::new(Arc::clone(&self.store), &self.config.data_dir)
            .with_buffer_size(self.config.copy_buffer_size);

        let mut supervised = Vec::new();
        let mut disabled = Vec::new();
        let mut tasks = self.supervisors.lock();

        for name in &self.config.subprograms {
            if !self.config.is_enabled(name) {
                info!(subprogram = %name, "Subprogram disabled, not starting it");
                disabled.push(name.clone());
                continue;
            }
            if supervised.contains(name) {
                warn!(subprogram = %name, "Subprogram listed twice, supervising once");
                continue;
            }

            let supervisor = Supervisor::builder(
                name.clone(),
                materializer.clone(),
                Arc::clone(&self.launcher),
                Arc::clone(env),
            )
            .with_backoff(Arc::clone(&self.backoff))
            .with_poll_interval(self.config.poll_interval)
            .with_restart_callback(self.hooks.as_callback())
            .build();

            tasks.push(SupervisorTask::spawn(supervisor));
            supervised.push(name.clone());
        }

        (supervised, disabled)
    }

    async fn await_readiness(&self) -> Readiness {
        match self.config.readiness {
            ReadinessMode::FixedDelay => head_start(self.config.startup_delay).await,
            ReadinessMode::TcpProbe => match self.config.ui_socket_addr() {
                Ok(addr) => probe_tcp(addr, self.config.probe_timeout).await,
                Err(e) => {
                    warn!(error = %e, "Cannot probe UI address, using head start");
                    head_start(self.config.startup_delay).await
                }
            },
        }
    }

    /// Register a restart hook; works before and after `start`
    pub fn on_restart<F>(&self, callback: F)
    where
        F: Fn(&RestartEvent) + Send + Sync + 'static,
    {
        self.hooks.register(callback);
    }

    pub fn subscribe_restarts(&self) -> broadcast::Receiver<RestartEvent> {
        self.hooks.subscribe()
    }

    /// Flips to `true` once startup finished
    pub fn subscribe_ready(&self) -> watch::Receiver<bool> {
        self.ready_tx.subscribe()
    }

    pub fn is_ready(&self) -> bool {
        *self.ready_tx.borrow()
    }

    /// Environment shared by every spawn, once started
    pub fn environment(&self) -> Option<Arc<EnvironmentSet>> {
        self.environment.get().cloned()
    }

    pub fn statuses(&self) -> Vec<SupervisorStatus> {
        self.supervisors.lock().iter().map(SupervisorTask::status).collect()
    }

    /// Force a restart of one subprogram; false if it is not supervised
    pub fn restart(&self, name: &str) -> bool {
        match self.supervisors.lock().iter().find(|t| t.name() == name) {
            Some(task) => {
                task.restart();
                true
            }
            None => false,
        }
    }

    /// Stop every supervisor and kill their children
    pub async fn shutdown(&self) -> Vec<SupervisorStatus> {
        let tasks: Vec<SupervisorTask> = std::mem::take(&mut *self.supervisors.lock());
        info!(supervisors = tasks.len(), "Stopping supervisors");

        let statuses = join_all(tasks.into_iter().map(SupervisorTask::shutdown)).await;
        self.ready_tx.send_replace(false);
        statuses
    }
}

/// Builder for [`LifecycleCoordinator`]
///
/// Unset collaborators default to the bundle directory from the config, real
/// OS processes, and a fixed backoff of `config.restart_backoff`.
pub struct CoordinatorBuilder {
    config: KernelConfig,
    store: Option<Arc<dyn ResourceStore>>,
    launcher: Option<Arc<dyn ProcessLauncher>>,
    backoff: Option<Arc<dyn BackoffPolicy>>,
}

impl CoordinatorBuilder {
    pub fn with_store(mut self, store: Arc<dyn ResourceStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_launcher(mut self, launcher: Arc<dyn ProcessLauncher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    pub fn with_backoff(mut self, backoff: Arc<dyn BackoffPolicy>) -> Self {
        self.backoff = Some(backoff);
        self
    }

    pub fn build(self) -> LifecycleCoordinator {
        let store: Arc<dyn ResourceStore> = match self.store {
            Some(store) => store,
            None => Arc::new(BundleDirectory::new(&self.config.bundle_dir)),
        };
        let launcher: Arc<dyn ProcessLauncher> = match self.launcher {
            Some(launcher) => launcher,
            None => Arc::new(OsLauncher::new()),
        };
        let backoff: Arc<dyn BackoffPolicy> = match self.backoff {
            Some(backoff) => backoff,
            None => Arc::new(FixedBackoff::new(self.config.restart_backoff)),
        };
        let (ready_tx, _) = watch::channel(false);

        LifecycleCoordinator {
            config: self.config,
            store,
            launcher,
            backoff,
            hooks: Arc::new(RestartHooks::new()),
            started: AtomicBool::new(false),
            environment: OnceLock::new(),
            supervisors: Mutex::new(Vec::new()),
            ready_tx,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::EmbeddedStore;
    use std::time::Duration;

    fn test_config(dir: &std::path::Path) -> KernelConfig {
        KernelConfig {
            data_dir: dir.to_path_buf(),
            bundle_dir: dir.to_path_buf(),
            startup_delay: Duration::from_millis(1),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_all_disabled_still_ready() {
        let dir = tempfile::tempdir().unwrap();
        let config = KernelConfig {
            disabled_subprograms: vec!["server_webgui".to_string()],
            ..test_config(dir.path())
        };
        let coordinator = LifecycleCoordinator::builder(config)
            .with_store(Arc::new(EmbeddedStore::new()))
            .build();

        let report = coordinator.start().await.unwrap();
        assert!(report.supervised.is_empty());
        assert_eq!(report.disabled, vec!["server_webgui".to_string()]);
        assert!(coordinator.is_ready());
    }

    #[tokio::test]
    async fn test_second_start_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = KernelConfig {
            disabled_subprograms: vec!["server_webgui".to_string()],
            ..test_config(dir.path())
        };
        let coordinator = LifecycleCoordinator::builder(config)
            .with_store(Arc::new(EmbeddedStore::new()))
            .build();

        coordinator.start().await.unwrap();
        assert!(matches!(
            coordinator.start().await,
            Err(LifecycleError::AlreadyStarted)
        ));
    }

    #[tokio::test]
    async fn test_device_id_written() {
        let dir = tempfile::tempdir().unwrap();
        let config = KernelConfig {
            device_id: Some("abc123".to_string()),
            disabled_subprograms: vec!["server_webgui".to_string()],
            ..test_config(dir.path())
        };
        let coordinator = LifecycleCoordinator::builder(config)
            .with_store(Arc::new(EmbeddedStore::new()))
            .build();

        coordinator.start().await.unwrap();
        let written = std::fs::read_to_string(dir.path().join("machine_id.txt")).unwrap();
        assert_eq!(written, "abc123\n");
    }
}
