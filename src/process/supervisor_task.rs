/*!
 * Supervisor Task
 *
 * Runs a [`Supervisor`] on its own tokio task and hands back a handle for
 * status queries, forced restarts, and cooperative shutdown. Without an
 * explicit shutdown the task runs until the host process exits.
 */

use super::supervisor::Supervisor;
use super::types::{SupervisorCommand, SupervisorState, SupervisorStatus};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Handle to one supervisor background task
pub struct SupervisorTask {
    name: String,
    command_tx: mpsc::UnboundedSender<SupervisorCommand>,
    status: Arc<RwLock<SupervisorStatus>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl SupervisorTask {
    /// Spawn the supervisor onto the current tokio runtime
    pub fn spawn(supervisor: Supervisor) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let name = supervisor.name().to_string();
        let status = supervisor.status_handle();

        let handle = tokio::spawn(supervisor.run(command_rx));

        info!(subprogram = %name, "Supervisor task spawned");

        Self {
            name,
            command_tx,
            status,
            handle: Some(handle),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current status snapshot
    pub fn status(&self) -> SupervisorStatus {
        self.status.read().clone()
    }

    pub fn state(&self) -> SupervisorState {
        self.status.read().state
    }

    /// Kill the running child so it is respawned through the normal restart path
    pub fn restart(&self) {
        let _ = self.command_tx.send(SupervisorCommand::Restart);
    }

    /// Whether the supervisor loop has ended (stopped or failed)
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Stop supervising: kill the child and wait for the task to end
    pub async fn shutdown(mut self) -> SupervisorStatus {
        let _ = self.command_tx.send(SupervisorCommand::Shutdown);

        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!(subprogram = %self.name, error = %e, "Supervisor task shutdown error");
            } else {
                info!(subprogram = %self.name, "Supervisor task shutdown complete");
            }
        }

        self.status()
    }
}

impl Drop for SupervisorTask {
    fn drop(&mut self) {
        if self.handle.is_some() {
            let _ = self.command_tx.send(SupervisorCommand::Shutdown);
        }
    }
}

impl std::fmt::Debug for SupervisorTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupervisorTask")
            .field("name", &self.name)
            .field("status", &*self.status.read())
            .finish()
    }
}
