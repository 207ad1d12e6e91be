/*!
 * Error Types
 * Centralized error handling with thiserror and miette
 */

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Payload extraction errors
///
/// Fatal for the subprogram whose payload failed, never for the host.
#[derive(Error, Debug, Diagnostic)]
pub enum ResourceError {
    #[error("Embedded resource not found: {0}")]
    #[diagnostic(
        code(resource::not_found),
        help("Check that the payload was bundled under this exact name.")
    )]
    NotFound(String),

    #[error("I/O error materializing {}: {source}", .path.display())]
    #[diagnostic(
        code(resource::io),
        help("The data directory must be writable by the host application.")
    )]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ResourceError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ResourceError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type ResourceResult<T> = Result<T, ResourceError>;

/// Child process errors
///
/// None of these stop a supervisor; they are logged and the loop moves on.
#[derive(Error, Debug, Diagnostic)]
pub enum ProcessError {
    #[error("Spawn failed for {}: {source}", .path.display())]
    #[diagnostic(
        code(process::spawn_failed),
        help("The executable may be missing, not executable, or built for another platform.")
    )]
    SpawnFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to terminate child {pid}: {source}")]
    #[diagnostic(code(process::terminate_failed))]
    TerminateFailed {
        pid: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to poll child {pid}: {source}")]
    #[diagnostic(code(process::poll_failed))]
    PollFailed {
        pid: u32,
        #[source]
        source: std::io::Error,
    },
}

pub type ProcessResult<T> = Result<T, ProcessError>;

/// Startup coordination errors
#[derive(Error, Debug, Diagnostic)]
pub enum LifecycleError {
    #[error("Lifecycle coordinator already started")]
    #[diagnostic(
        code(lifecycle::already_started),
        help("start() runs once per application run.")
    )]
    AlreadyStarted,
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Configuration loading errors
#[derive(Error, Debug, Diagnostic)]
pub enum ConfigError {
    #[error("Cannot read config file {}: {source}", .path.display())]
    #[diagnostic(code(config::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse config file {}: {source}", .path.display())]
    #[diagnostic(code(config::parse), help("The config file must be a JSON object."))]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid value for {key}: {reason}")]
    #[diagnostic(code(config::invalid_value))]
    InvalidValue { key: String, reason: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Unified kernel error type with miette diagnostics
#[derive(Error, Debug, Diagnostic)]
pub enum KernelError {
    #[error("Resource error: {0}")]
    #[diagnostic(transparent)]
    Resource(#[from] ResourceError),

    #[error("Process error: {0}")]
    #[diagnostic(transparent)]
    Process(#[from] ProcessError),

    #[error("Lifecycle error: {0}")]
    #[diagnostic(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("Config error: {0}")]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}
