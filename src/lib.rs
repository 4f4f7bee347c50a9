//! kube-scratch - single-node scratch Kubernetes control plane bootstrapper.
//!
//! Assembles a minimal control plane out of four long-running server
//! components (embedded key-value store, API server, controller manager,
//! scheduler), starts them in dependency order, gates the scheduler on the
//! controller manager's observed health, and tears everything down
//! coherently on shutdown or on any component's fatal exit.

pub mod args;
pub mod authz;
pub mod config;
pub mod engine;
pub mod error;
pub mod health;
pub mod orchestrator;
pub mod process;
pub mod store;
pub mod supervisor;

pub use args::{build_args, to_command_line, Arg};
pub use authz::{resolve_authz_modes, DEFAULT_AUTHZ_MODES};
pub use config::{ControlPlaneConfig, CONTROLLER_MANAGER_SECURE_PORT};
pub use engine::{Role, ServerEngine, StoreEngine, StoreHandle};
pub use error::{Error, Result};
pub use health::HealthGate;
pub use orchestrator::{ControlPlane, EngineSet};
pub use process::{ProcessEngine, ProcessStoreEngine};
pub use store::EmbeddedStore;
pub use supervisor::{LifecycleSignal, ShutdownSignal, Supervisor};
