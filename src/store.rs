//! Embedded store lifecycle.
//!
//! The key-value store backing the API server listens only on a local unix
//! socket; nothing network-facing. Starting it is the one blocking call in
//! the bootstrap flow, and closing it is the last action of shutdown.

use std::os::unix::fs::DirBuilderExt;
use std::path::Path;
use std::sync::Arc;

use crate::engine::{StoreEngine, StoreHandle};
use crate::error::{Error, Result};

/// Manages the embedded key-value store.
pub struct EmbeddedStore {
    engine: Arc<dyn StoreEngine>,
    handle: Option<Box<dyn StoreHandle>>,
}

impl EmbeddedStore {
    /// Creates a manager around the given store engine.
    pub fn new(engine: Arc<dyn StoreEngine>) -> Self {
        Self {
            engine,
            handle: None,
        }
    }

    /// Starts the store and blocks until it is ready to accept connections.
    ///
    /// Creates `data_dir` (including parents) with mode 0700 if absent and
    /// removes a stale socket file left over from a previous run.
    pub async fn start(&mut self, data_dir: &Path, socket_path: &Path) -> Result<()> {
        if socket_path.as_os_str().is_empty() || socket_path.parent().is_none() {
            return Err(Error::InvalidSocketPath(socket_path.to_path_buf()));
        }

        std::fs::DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(data_dir)
            .map_err(|source| Error::StoreDataDir {
                path: data_dir.to_path_buf(),
                source,
            })?;

        if socket_path.exists() {
            tracing::debug!(socket = %socket_path.display(), "removing stale store socket");
            std::fs::remove_file(socket_path)?;
        }

        tracing::info!(
            data_dir = %data_dir.display(),
            socket = %socket_path.display(),
            "starting embedded store"
        );
        let handle = self.engine.start(data_dir, socket_path).await?;
        tracing::info!("embedded store ready");
        self.handle = Some(handle);
        Ok(())
    }

    /// Whether the store has been started and not yet closed.
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Stops the store. Safe to call more than once; only the first call
    /// closes anything.
    pub async fn close(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            tracing::info!("closing embedded store");
            handle.close().await;
        }
    }
}

/// Client URL for a store socket path, using the local-socket scheme.
pub fn socket_url(socket_path: &Path) -> String {
    format!("unix://{}", socket_path.display())
}
