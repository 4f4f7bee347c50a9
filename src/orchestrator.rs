//! Control-plane orchestrator façade.
//!
//! Owns the supervisor and the embedded store, applies configuration
//! defaults once at construction, and exposes the ordered start calls plus
//! a coherent shutdown. The required startup order (store → API server →
//! controller manager → health gate → scheduler) is enforced by the
//! caller, not re-validated here.

use std::sync::Arc;

use crate::args::{build_args, to_command_line};
use crate::config::{ControlPlaneConfig, CONTROLLER_MANAGER_SECURE_PORT};
use crate::engine::{Role, ServerEngine, StoreEngine};
use crate::error::Result;
use crate::process::{ProcessEngine, ProcessStoreEngine};
use crate::store::EmbeddedStore;
use crate::supervisor::{ShutdownSignal, Supervisor};

/// The four server engines the control plane is assembled from, plus an
/// optional one-time process-global initialization hook (feature gates,
/// warning handlers and the like in the wrapped engines).
pub struct EngineSet {
    pub store: Arc<dyn StoreEngine>,
    pub api_server: Arc<dyn ServerEngine>,
    pub controller_manager: Arc<dyn ServerEngine>,
    pub scheduler: Arc<dyn ServerEngine>,
    global_init: Option<Box<dyn FnOnce() + Send>>,
}

impl EngineSet {
    /// Creates an engine set from explicit engines.
    pub fn new(
        store: Arc<dyn StoreEngine>,
        api_server: Arc<dyn ServerEngine>,
        controller_manager: Arc<dyn ServerEngine>,
        scheduler: Arc<dyn ServerEngine>,
    ) -> Self {
        Self {
            store,
            api_server,
            controller_manager,
            scheduler,
            global_init: None,
        }
    }

    /// Engine set running the conventional server binaries as child
    /// processes.
    pub fn processes() -> Self {
        Self::new(
            Arc::new(ProcessStoreEngine::new()),
            Arc::new(ProcessEngine::new(Role::ApiServer.name())),
            Arc::new(ProcessEngine::new(Role::ControllerManager.name())),
            Arc::new(ProcessEngine::new(Role::Scheduler.name())),
        )
    }

    /// Registers a hook run exactly once, before the first component
    /// starts. Never re-invoked per role.
    pub fn with_global_init(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.global_init = Some(Box::new(hook));
        self
    }
}

/// Single-node control plane: embedded store plus API server, controller
/// manager and scheduler tasks under one lifecycle signal.
pub struct ControlPlane {
    config: ControlPlaneConfig,
    engines: EngineSet,
    supervisor: Supervisor,
    store: EmbeddedStore,
    shut_down: bool,
}

impl ControlPlane {
    /// Creates the orchestrator. Defaults are applied to the configuration
    /// exactly once, here; it is immutable afterwards.
    pub fn new(mut config: ControlPlaneConfig, engines: EngineSet) -> Self {
        config.apply_defaults();
        let store = EmbeddedStore::new(engines.store.clone());
        Self {
            config,
            engines,
            supervisor: Supervisor::new(),
            store,
            shut_down: false,
        }
    }

    /// The effective (defaulted) configuration.
    pub fn config(&self) -> &ControlPlaneConfig {
        &self.config
    }

    /// Subscribes to the shared lifecycle signal, which fires when any
    /// component fails or shutdown begins.
    pub fn subscribe_lifecycle(&self) -> ShutdownSignal {
        self.supervisor.signal().subscribe()
    }

    /// Health endpoint of the controller manager, consumed by the health
    /// gate before the scheduler may start.
    pub fn controller_manager_health_url(&self) -> String {
        format!(
            "https://127.0.0.1:{}/healthz",
            CONTROLLER_MANAGER_SECURE_PORT
        )
    }

    /// Starts the embedded store and blocks until it is ready to accept
    /// connections. Must complete before any other component starts.
    pub async fn start_store(&mut self) -> Result<()> {
        self.run_global_init();
        let data_dir = self.config.etcd_data_dir.clone();
        let socket_path = self.config.etcd_socket_path.clone();
        self.store.start(&data_dir, &socket_path).await
    }

    /// Launches the API server task and returns immediately.
    pub fn start_api_server(&mut self) {
        let engine = self.engines.api_server.clone();
        self.launch(Role::ApiServer, engine);
    }

    /// Launches the controller manager task and returns immediately.
    pub fn start_controller_manager(&mut self) {
        let engine = self.engines.controller_manager.clone();
        self.launch(Role::ControllerManager, engine);
    }

    /// Launches the scheduler task and returns immediately. The caller
    /// must have observed the controller manager healthy first.
    pub fn start_scheduler(&mut self) {
        let engine = self.engines.scheduler.clone();
        self.launch(Role::Scheduler, engine);
    }

    /// Triggers the lifecycle signal, waits for every launched task to
    /// complete, then closes the store. Safe to call more than once; the
    /// second call returns immediately.
    pub async fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        tracing::info!("shutting down control plane");
        self.supervisor.shutdown().await;
        // The store goes last: closing it while the API server is still
        // unwinding would surface spurious request errors.
        self.store.close().await;
    }

    fn launch(&mut self, role: Role, engine: Arc<dyn ServerEngine>) {
        self.run_global_init();
        // Arguments are frozen at launch; no live reconfiguration.
        let args = to_command_line(&build_args(role, &self.config));
        self.supervisor.launch(role, engine, args);
    }

    fn run_global_init(&mut self) {
        if let Some(hook) = self.engines.global_init.take() {
            tracing::debug!("running one-time process initialization");
            hook();
        }
    }
}
