/*!
 * Lifecycle Module
 * Application-run startup, readiness, restart notification, and shutdown
 */

pub mod coordinator;
pub mod hooks;
pub mod identity;
pub mod readiness;

pub use coordinator::{CoordinatorBuilder, LifecycleCoordinator, StartupReport};
pub use hooks::RestartHooks;
pub use identity::write_device_id;
pub use readiness::Readiness;
