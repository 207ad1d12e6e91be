/*!
 * Process Supervisor
 *
 * Keeps one named subprogram running for the life of the host:
 *
 * ```text
 * Idle -> Spawning -> Running -> Exited -> Spawning -> ...
 * ```
 *
 * - The payload is materialized once, on first entry. Restarts reuse the file.
 *   The copy and every post-kill reap run on the blocking pool.
 * - Liveness is polled at a fixed interval; the exit status is never judged.
 * - Before every respawn the previous handle is killed and dropped, restart
 *   hooks run, and the backoff policy decides the pause.
 * - Launch failures are logged and retried after the backoff. They do not
 *   count as restarts and do not fire hooks.
 * - Only a `Shutdown` command (or a failed materialization) ends the loop.
 */

use super::backoff::FixedBackoff;
use super::traits::{BackoffPolicy, ChildHandle, ProcessLauncher};
use super::types::{
    RestartCallback, RestartEvent, SubprogramSpec, SupervisorCommand, SupervisorState,
    SupervisorStatus,
};
use crate::core::limits::CHILD_POLL_INTERVAL;
use crate::environment::EnvironmentSet;
use crate::monitoring::{generate_trace_id, supervisor_span};
use crate::resources::Materializer;
use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn, Instrument, Span};

/// The single supervised entity for one subprogram name
///
/// Owned by exactly one supervisor task; the child handle never leaves it.
pub struct SupervisedProcess {
    spec: SubprogramSpec,
    child: Option<Box<dyn ChildHandle>>,
    state: SupervisorState,
    restarts: u64,
    spawns: u64,
    spawn_failures: u64,
}

impl SupervisedProcess {
    pub fn new(spec: SubprogramSpec) -> Self {
        Self {
            spec,
            child: None,
            state: SupervisorState::Idle,
            restarts: 0,
            spawns: 0,
            spawn_failures: 0,
        }
    }

    pub fn spec(&self) -> &SubprogramSpec {
        &self.spec
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn restarts(&self) -> u64 {
        self.restarts
    }

    /// A child is launched and not yet seen to exit
    pub fn is_running(&self) -> bool {
        self.state == SupervisorState::Running && self.child.is_some()
    }

    /// Kill, reap, and drop the current child, if any
    ///
    /// Reaping blocks, so it runs on the blocking pool.
    async fn discard_child(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        match tokio::task::spawn_blocking(move || child.terminate()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Failed to terminate previous child"),
            Err(e) => warn!(error = %e, "Terminate task did not complete"),
        }
    }

    fn child_alive(&mut self) -> bool {
        let Some(child) = self.child.as_mut() else {
            return false;
        };
        match child.is_alive() {
            Ok(alive) => alive,
            Err(e) => {
                // Unknown state: treat as exited so the restart path kills it
                warn!(error = %e, "Liveness poll failed");
                false
            }
        }
    }
}

/// Configured supervisor, ready to be spawned as a task
pub struct Supervisor {
    process: SupervisedProcess,
    materializer: Materializer,
    launcher: Arc<dyn ProcessLauncher>,
    env: Arc<EnvironmentSet>,
    backoff: Arc<dyn BackoffPolicy>,
    poll_interval: Duration,
    on_restart: Option<RestartCallback>,
    status: Arc<RwLock<SupervisorStatus>>,
    trace_id: String,
}

impl Supervisor {
    pub fn builder(
        name: impl Into<String>,
        materializer: Materializer,
        launcher: Arc<dyn ProcessLauncher>,
        env: Arc<EnvironmentSet>,
    ) -> SupervisorBuilder {
        SupervisorBuilder {
            name: name.into(),
            materializer,
            launcher,
            env,
            backoff: Arc::new(FixedBackoff::default()),
            poll_interval: CHILD_POLL_INTERVAL,
            on_restart: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.process.spec.name
    }

    /// Shared status cell, written only by this supervisor
    pub fn status_handle(&self) -> Arc<RwLock<SupervisorStatus>> {
        Arc::clone(&self.status)
    }

    /// Supervise until shut down
    pub async fn run(self, commands: mpsc::UnboundedReceiver<SupervisorCommand>) {
        let span = supervisor_span(self.name(), &self.trace_id);
        SupervisorLoop {
            inner: self,
            commands,
            commands_closed: false,
        }
        .run()
        .instrument(span)
        .await
    }
}

/// Builder for [`Supervisor`]
pub struct SupervisorBuilder {
    name: String,
    materializer: Materializer,
    launcher: Arc<dyn ProcessLauncher>,
    env: Arc<EnvironmentSet>,
    backoff: Arc<dyn BackoffPolicy>,
    poll_interval: Duration,
    on_restart: Option<RestartCallback>,
}

impl SupervisorBuilder {
    pub fn with_backoff(mut self, backoff: Arc<dyn BackoffPolicy>) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn on_restart<F>(mut self, callback: F) -> Self
    where
        F: Fn(&RestartEvent) + Send + Sync + 'static,
    {
        self.on_restart = Some(Arc::new(callback));
        self
    }

    pub fn with_restart_callback(mut self, callback: RestartCallback) -> Self {
        self.on_restart = Some(callback);
        self
    }

    pub fn build(self) -> Supervisor {
        let target_path = self.materializer.target_path(&self.name);
        let status = SupervisorStatus::new(self.name.clone());
        Supervisor {
            process: SupervisedProcess::new(SubprogramSpec::new(self.name, target_path)),
            materializer: self.materializer,
            launcher: self.launcher,
            env: self.env,
            backoff: self.backoff,
            poll_interval: self.poll_interval,
            on_restart: self.on_restart,
            status: Arc::new(RwLock::new(status)),
            trace_id: generate_trace_id(),
        }
    }
}

/// Why a wait ended early
enum Interrupt {
    Restart,
    Shutdown,
}

struct SupervisorLoop {
    inner: Supervisor,
    commands: mpsc::UnboundedReceiver<SupervisorCommand>,
    commands_closed: bool,
}

impl SupervisorLoop {
    async fn run(mut self) {
        info!("Supervisor started");

        // Idle -> Spawning: materialize once
        self.set_state(SupervisorState::Spawning);
        let name = self.inner.process.spec.name.clone();
        let materializer = self.inner.materializer.clone();
        let span = Span::current();
        let materialized =
            tokio::task::spawn_blocking(move || span.in_scope(|| materializer.materialize(&name)))
                .await;
        let executable = match materialized {
            Ok(Ok(materialized)) => materialized.path,
            Ok(Err(e)) => {
                error!(error = %e, "Cannot materialize subprogram, giving up on it");
                self.set_state(SupervisorState::Failed);
                return;
            }
            Err(e) => {
                error!(error = %e, "Materialization task did not complete");
                self.set_state(SupervisorState::Failed);
                return;
            }
        };
        self.inner.status.write().executable = Some(executable.clone());

        loop {
            self.inner.process.discard_child().await;
            self.set_state(SupervisorState::Spawning);

            let launched = self.launch(&executable);

            if launched {
                match self.watch_child().await {
                    Some(Interrupt::Shutdown) => return self.stop().await,
                    Some(Interrupt::Restart) => info!("Restart requested"),
                    None => info!("Subprogram exited"),
                }

                // Exited -> Spawning
                self.set_state(SupervisorState::Exited);
                self.inner.process.discard_child().await;
                self.inner.process.restarts += 1;
                self.publish();
                self.notify_restart();
            }

            let delay = self.inner.backoff.delay(self.inner.process.restarts);
            if self.backoff(delay).await {
                return self.stop().await;
            }
        }
    }

    /// Wait out the full backoff; true if a shutdown arrived meanwhile
    ///
    /// A respawn is already pending here, so `Restart` does not cut the
    /// delay short.
    async fn backoff(&mut self, delay: Duration) -> bool {
        let deadline = Instant::now() + delay;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.wait(remaining).await {
                Some(Interrupt::Shutdown) => return true,
                Some(Interrupt::Restart) => {
                    debug!("Restart requested between spawns, respawn already pending")
                }
                None => return false,
            }
        }
    }

    /// Spawning -> Running, or straight to Exited when the launch fails
    fn launch(&mut self, executable: &Path) -> bool {
        match self.inner.launcher.launch(executable, &self.inner.env) {
            Ok(child) => {
                let os_pid = child.id();
                self.inner.process.child = Some(child);
                self.inner.process.spawns += 1;
                self.inner.status.write().os_pid = os_pid;
                self.set_state(SupervisorState::Running);
                debug!(os_pid = ?os_pid, spawns = self.inner.process.spawns, "Subprogram running");
                true
            }
            Err(e) => {
                self.inner.process.spawn_failures += 1;
                error!(error = %e, failures = self.inner.process.spawn_failures, "Launch failed, will retry");
                self.set_state(SupervisorState::Exited);
                false
            }
        }
    }

    /// Poll until the child dies or a command interrupts
    async fn watch_child(&mut self) -> Option<Interrupt> {
        while self.inner.process.child_alive() {
            if let Some(interrupt) = self.wait(self.inner.poll_interval).await {
                return Some(interrupt);
            }
        }
        None
    }

    /// Sleep for `duration` unless a command arrives first
    async fn wait(&mut self, duration: Duration) -> Option<Interrupt> {
        if self.commands_closed {
            tokio::time::sleep(duration).await;
            return None;
        }

        tokio::select! {
            _ = tokio::time::sleep(duration) => None,
            command = self.commands.recv() => match command {
                Some(SupervisorCommand::Shutdown) => Some(Interrupt::Shutdown),
                Some(SupervisorCommand::Restart) => Some(Interrupt::Restart),
                None => {
                    // Sender dropped without a Shutdown. `SupervisorTask` always
                    // sends one on drop, so only direct `run` callers get here.
                    self.commands_closed = true;
                    None
                }
            },
        }
    }

    fn notify_restart(&self) {
        let event = RestartEvent {
            name: self.inner.process.spec.name.clone(),
            restart_count: self.inner.process.restarts,
            trace_id: self.inner.trace_id.clone(),
        };
        info!(restart_count = event.restart_count, "Restarting subprogram");

        if let Some(callback) = &self.inner.on_restart {
            if catch_unwind(AssertUnwindSafe(|| callback(&event))).is_err() {
                error!("Restart hook panicked");
            }
        }
    }

    async fn stop(&mut self) {
        self.inner.process.discard_child().await;
        self.set_state(SupervisorState::Stopped);
        info!(restarts = self.inner.process.restarts, "Supervisor stopped");
    }

    fn set_state(&mut self, state: SupervisorState) {
        self.inner.process.state = state;
        self.publish();
    }

    fn publish(&self) {
        let process = &self.inner.process;
        let mut status = self.inner.status.write();
        status.state = process.state;
        status.restarts = process.restarts;
        status.spawns = process.spawns;
        status.spawn_failures = process.spawn_failures;
        if process.child.is_none() {
            status.os_pid = None;
        }
    }
}
