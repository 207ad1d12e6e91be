/*!
 * Process Module
 * Subprogram launching, supervision, and restart policy
 */

pub mod backoff;
pub mod executor;
pub mod supervisor;
pub mod supervisor_task;
pub mod traits;
pub mod types;

// Re-export for convenience
pub use backoff::{FixedBackoff, NoBackoff};
pub use executor::{OsChild, OsLauncher};
pub use supervisor::{SupervisedProcess, Supervisor, SupervisorBuilder};
pub use supervisor_task::SupervisorTask;
pub use traits::{BackoffPolicy, ChildHandle, ProcessLauncher};
pub use types::{
    RestartCallback, RestartEvent, SubprogramSpec, SupervisorCommand, SupervisorState,
    SupervisorStatus,
};
