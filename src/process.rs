//! Child-process server engines.
//!
//! Production engines invoke the externally supplied server binaries
//! (`etcd`, `kube-apiserver`, `kube-controller-manager`, `kube-scheduler`)
//! as child processes parameterized by the built argument list. Stderr is
//! forwarded into tracing; the lifecycle signal kills the child.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UnixStream;
use tokio::process::{Child, Command};

use crate::args::{store_args, to_command_line};
use crate::engine::{ServerEngine, StoreEngine, StoreHandle};
use crate::error::{Error, Result};
use crate::supervisor::ShutdownSignal;

const STORE_READY_POLL_INTERVAL: Duration = Duration::from_millis(100);
const DEFAULT_STORE_READY_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs a server binary as a child process until it exits or the lifecycle
/// signal fires.
pub struct ProcessEngine {
    binary: String,
}

impl ProcessEngine {
    /// Creates an engine running the given binary (resolved via PATH).
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl ServerEngine for ProcessEngine {
    async fn run(&self, args: Vec<String>, mut shutdown: ShutdownSignal) -> Result<()> {
        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Launch {
                role: self.binary.clone(),
                reason: e.to_string(),
            })?;

        forward_stderr(&mut child, self.binary.clone());

        tokio::select! {
            status = child.wait() => {
                let status = status?;
                if status.success() {
                    Ok(())
                } else {
                    Err(Error::RoleExited {
                        role: self.binary.clone(),
                        reason: status.to_string(),
                    })
                }
            }
            _ = shutdown.cancelled() => {
                stop_child(&mut child, &self.binary).await;
                Err(Error::Cancelled)
            }
        }
    }
}

/// Runs `etcd` as a child process listening on a local unix socket.
///
/// Readiness is the socket accepting a connection, bounded by a timeout.
pub struct ProcessStoreEngine {
    binary: String,
    ready_timeout: Duration,
}

impl ProcessStoreEngine {
    /// Creates an engine running the default `etcd` binary.
    pub fn new() -> Self {
        Self {
            binary: "etcd".to_string(),
            ready_timeout: DEFAULT_STORE_READY_TIMEOUT,
        }
    }

    /// Overrides the store binary.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Overrides the readiness timeout.
    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }
}

impl Default for ProcessStoreEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoreEngine for ProcessStoreEngine {
    async fn start(&self, data_dir: &Path, socket_path: &Path) -> Result<Box<dyn StoreHandle>> {
        let args = to_command_line(&store_args(data_dir, socket_path));

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Launch {
                role: self.binary.clone(),
                reason: e.to_string(),
            })?;

        forward_stderr(&mut child, self.binary.clone());

        // Ready once the client socket accepts a connection.
        let start = Instant::now();
        loop {
            if let Some(status) = child.try_wait()? {
                return Err(Error::StoreStartup(format!(
                    "{} exited during startup: {}",
                    self.binary, status
                )));
            }

            match UnixStream::connect(socket_path).await {
                Ok(_) => break,
                Err(e) => {
                    if start.elapsed() >= self.ready_timeout {
                        stop_child(&mut child, &self.binary).await;
                        return Err(Error::StoreStartup(format!(
                            "socket {} not ready after {:?}: {}",
                            socket_path.display(),
                            self.ready_timeout,
                            e
                        )));
                    }
                    tokio::time::sleep(STORE_READY_POLL_INTERVAL).await;
                }
            }
        }

        Ok(Box::new(ProcessStoreHandle {
            binary: self.binary.clone(),
            child,
        }))
    }
}

struct ProcessStoreHandle {
    binary: String,
    child: Child,
}

#[async_trait]
impl StoreHandle for ProcessStoreHandle {
    async fn close(&mut self) {
        stop_child(&mut self.child, &self.binary).await;
    }
}

/// Forwards the child's stderr lines into tracing.
fn forward_stderr(child: &mut Child, component: String) {
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::debug!(component = %component, "{}", line);
            }
        });
    }
}

async fn stop_child(child: &mut Child, component: &str) {
    if let Err(e) = child.start_kill() {
        tracing::warn!(component = %component, error = %e, "failed to kill child");
    }
    if let Err(e) = child.wait().await {
        tracing::warn!(component = %component, error = %e, "failed to reap child");
    }
}
