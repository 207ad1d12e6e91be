/*!
 * Process Traits
 * Seams between the supervisor and the operating system
 */

use crate::core::errors::ProcessResult;
use crate::environment::EnvironmentSet;
use std::path::Path;
use std::time::Duration;

/// A launched child process
pub trait ChildHandle: Send {
    /// OS process id, when known
    fn id(&self) -> Option<u32>;

    /// Non-blocking liveness check
    fn is_alive(&mut self) -> ProcessResult<bool>;

    /// Forcibly kill and reap the child; a no-op if it already exited
    fn terminate(&mut self) -> ProcessResult<()>;
}

/// Process spawning interface
pub trait ProcessLauncher: Send + Sync {
    /// Start `executable` with no arguments and exactly `env` as its environment
    fn launch(&self, executable: &Path, env: &EnvironmentSet) -> ProcessResult<Box<dyn ChildHandle>>;
}

/// Delay between a child's exit and the next spawn
pub trait BackoffPolicy: Send + Sync {
    /// `restarts` is the number of restarts so far, including this one
    fn delay(&self, restarts: u64) -> Duration;
}
