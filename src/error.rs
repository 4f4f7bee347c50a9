//! Error types for the control-plane bootstrapper.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Top-level error type for bootstrap operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to create the store data directory.
    #[error("failed to create store data directory {path}: {source}")]
    StoreDataDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The store socket path is not usable.
    #[error("invalid store socket path: {0}")]
    InvalidSocketPath(PathBuf),

    /// The embedded store failed to come up.
    #[error("store failed to start: {0}")]
    StoreStartup(String),

    /// A server role could not be launched.
    #[error("failed to launch {role}: {reason}")]
    Launch { role: String, reason: String },

    /// A server role exited with a failure after having started.
    #[error("{role} exited: {reason}")]
    RoleExited { role: String, reason: String },

    /// The task observed the shared lifecycle signal and stopped.
    ///
    /// Not a failure; the supervisor treats it as a clean stop.
    #[error("stopped on shutdown signal")]
    Cancelled,

    /// Health endpoint did not become healthy within the deadline.
    #[error("health check deadline exceeded for {url} after {deadline:?}")]
    HealthDeadline { url: String, deadline: Duration },

    /// Startup was aborted by the lifecycle signal while waiting on health.
    #[error("startup aborted while waiting for {0}")]
    StartupAborted(String),

    /// Health gate client could not be constructed.
    #[error("health client error: {0}")]
    Health(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for bootstrap operations.
pub type Result<T> = std::result::Result<T, Error>;
