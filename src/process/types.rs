/*!
 * Process Types
 * Common types for subprogram supervision
 */

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Identity of one supervised subprogram
///
/// The payload itself is addressed by `name` in the resource store.
/// Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubprogramSpec {
    pub name: String,
    /// Where the materialized executable is installed
    pub target_path: PathBuf,
}

impl SubprogramSpec {
    pub fn new(name: impl Into<String>, target_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            target_path: target_path.into(),
        }
    }
}

/// Supervisor state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisorState {
    /// Created, nothing materialized yet
    Idle,
    /// Materializing or launching the child
    Spawning,
    /// Child launched and polled for liveness
    Running,
    /// Child gone (or never launched), restart pending
    Exited,
    /// Shut down on request
    Stopped,
    /// Payload could not be materialized; nothing to run
    Failed,
}

impl SupervisorState {
    /// Whether the supervisor loop has ended
    pub fn is_terminal(self) -> bool {
        matches!(self, SupervisorState::Stopped | SupervisorState::Failed)
    }
}

/// Point-in-time view of a supervised subprogram
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SupervisorStatus {
    pub name: String,
    pub state: SupervisorState,
    /// Exit-to-respawn transitions so far
    pub restarts: u64,
    /// Successful launches
    pub spawns: u64,
    pub spawn_failures: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executable: Option<PathBuf>,
}

impl SupervisorStatus {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: SupervisorState::Idle,
            restarts: 0,
            spawns: 0,
            spawn_failures: 0,
            os_pid: None,
            executable: None,
        }
    }
}

/// Delivered to restart hooks each time a subprogram is about to be respawned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartEvent {
    pub name: String,
    /// 1 for the first restart
    pub restart_count: u64,
    pub trace_id: String,
}

/// Restart notification hook
pub type RestartCallback = Arc<dyn Fn(&RestartEvent) + Send + Sync>;

/// Control messages for a supervisor task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorCommand {
    /// Kill the current child; the normal restart path follows
    Restart,
    /// Kill the current child and end the supervisor
    Shutdown,
}
