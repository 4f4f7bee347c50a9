//! Server-engine seams.
//!
//! The control plane is assembled out of externally supplied server engines
//! invoked as opaque long-running tasks parameterized by an argument list.
//! Production engines run the real binaries as child processes (see
//! `process`); tests substitute stubs.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::supervisor::ShutdownSignal;

/// One of the four server functions launched during bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Embedded key-value store backing the API server.
    Store,
    /// kube-apiserver.
    ApiServer,
    /// kube-controller-manager.
    ControllerManager,
    /// kube-scheduler.
    Scheduler,
}

impl Role {
    /// Canonical component name, also the conventional binary name.
    pub fn name(&self) -> &'static str {
        match self {
            Role::Store => "etcd",
            Role::ApiServer => "kube-apiserver",
            Role::ControllerManager => "kube-controller-manager",
            Role::Scheduler => "kube-scheduler",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A long-running server engine for one role.
///
/// `run` drives the engine until it exits on its own or the lifecycle
/// signal fires. An exit caused solely by the signal must be reported as
/// `Error::Cancelled`, which the supervisor counts as a clean stop; any
/// other error is fatal and tears the control plane down.
#[async_trait]
pub trait ServerEngine: Send + Sync {
    async fn run(&self, args: Vec<String>, shutdown: ShutdownSignal) -> Result<()>;
}

/// Factory for the embedded key-value store.
///
/// `start` must return only once the store is ready to accept client
/// connections on the socket; everything downstream depends on that.
#[async_trait]
pub trait StoreEngine: Send + Sync {
    async fn start(&self, data_dir: &Path, socket_path: &Path) -> Result<Box<dyn StoreHandle>>;
}

/// A running embedded store.
#[async_trait]
pub trait StoreHandle: Send {
    /// Stops the store. Called exactly once, as the last shutdown action.
    async fn close(&mut self);
}
