/*!
 * Loci Kernel Library
 * Supervision of the embedded servers behind an app's UI surface
 */

pub mod core;
pub mod environment;
pub mod lifecycle;
pub mod monitoring;
pub mod process;
pub mod resources;

// Re-exports
pub use crate::core::{
    ConfigError, KernelConfig, KernelError, LifecycleError, ProcessError, ReadinessMode,
    ResourceError,
};
pub use environment::{build_environment, EnvironmentBuilder, EnvironmentSet};
pub use lifecycle::{LifecycleCoordinator, Readiness, RestartHooks, StartupReport};
pub use monitoring::init_tracing;
pub use process::{
    RestartEvent, Supervisor, SupervisorState, SupervisorStatus, SupervisorTask,
};
pub use resources::{BundleDirectory, EmbeddedStore, Materializer, ResourceStore};
