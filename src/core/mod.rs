/*!
 * Core Module
 * Errors, constants, and configuration shared by every subsystem
 */

pub mod config;
pub mod errors;
pub mod limits;

pub use config::{KernelConfig, ReadinessMode};
pub use errors::{
    ConfigError, ConfigResult, KernelError, LifecycleError, LifecycleResult, ProcessError,
    ProcessResult, ResourceError, ResourceResult,
};
