//! Task supervision and the shared lifecycle signal.
//!
//! Each launched role runs as one tokio task bound to a single fire-once
//! cancellation signal. A role failing with a real error triggers the
//! signal and stops everyone else; a role stopping because it observed the
//! signal is a clean stop.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::engine::{Role, ServerEngine};
use crate::error::Error;

/// Fire-once cancellation shared by all running roles and the orchestrator.
///
/// Triggering is idempotent and irreversible; there is no resume.
#[derive(Clone)]
pub struct LifecycleSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl LifecycleSignal {
    /// Creates an untriggered signal.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Requests every subscribed task to stop. A second trigger is a no-op.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Whether the signal has fired.
    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Creates a new subscription for one task.
    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for LifecycleSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// One task's view of the lifecycle signal.
#[derive(Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Resolves once the lifecycle signal has fired.
    pub async fn cancelled(&mut self) {
        // The sender lives in the supervisor for the supervisor's lifetime;
        // a closed channel means teardown either way.
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }

    /// Whether the signal has already fired.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }
}

struct RunningTask {
    role: Role,
    handle: JoinHandle<()>,
}

/// Owns one task per launched server role.
///
/// The set of running tasks is private to the supervisor; callers observe
/// aggregate completion only through [`Supervisor::shutdown`].
pub struct Supervisor {
    signal: LifecycleSignal,
    tasks: Vec<RunningTask>,
}

impl Supervisor {
    /// Creates a supervisor with a fresh lifecycle signal.
    pub fn new() -> Self {
        Self {
            signal: LifecycleSignal::new(),
            tasks: Vec::new(),
        }
    }

    /// The shared lifecycle signal.
    pub fn signal(&self) -> &LifecycleSignal {
        &self.signal
    }

    /// Number of roles launched and not yet drained.
    pub fn running(&self) -> usize {
        self.tasks.len()
    }

    /// Launches one role's engine as a task and returns immediately.
    ///
    /// A non-cancellation error from the engine is logged and triggers the
    /// shared signal, asking every other running task to stop.
    pub fn launch(&mut self, role: Role, engine: Arc<dyn ServerEngine>, args: Vec<String>) {
        let shutdown = self.signal.subscribe();
        let signal = self.signal.clone();

        tracing::info!(role = %role, "launching");
        let handle = tokio::spawn(async move {
            match engine.run(args, shutdown).await {
                Ok(()) => tracing::info!(role = %role, "exited cleanly"),
                Err(Error::Cancelled) => {
                    tracing::debug!(role = %role, "stopped on shutdown signal")
                }
                Err(e) => {
                    tracing::error!(role = %role, error = %e, "exited");
                    signal.trigger();
                }
            }
        });

        self.tasks.push(RunningTask { role, handle });
    }

    /// Triggers the lifecycle signal and waits for every launched task to
    /// report completion.
    pub async fn shutdown(&mut self) {
        self.signal.trigger();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.handle.await {
                tracing::error!(role = %task.role, error = %e, "task join failed");
            }
        }
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::engine::ServerEngine;
    use crate::error::Result;

    /// Engine that waits on the shutdown signal, optionally failing first.
    struct StubEngine {
        events: Arc<Mutex<Vec<String>>>,
        name: &'static str,
        fail_after: Option<Duration>,
    }

    impl StubEngine {
        fn waiting(events: Arc<Mutex<Vec<String>>>, name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                events,
                name,
                fail_after: None,
            })
        }

        fn failing(
            events: Arc<Mutex<Vec<String>>>,
            name: &'static str,
            after: Duration,
        ) -> Arc<Self> {
            Arc::new(Self {
                events,
                name,
                fail_after: Some(after),
            })
        }
    }

    #[async_trait]
    impl ServerEngine for StubEngine {
        async fn run(&self, _args: Vec<String>, mut shutdown: ShutdownSignal) -> Result<()> {
            self.events
                .lock()
                .unwrap()
                .push(format!("{} started", self.name));
            if let Some(delay) = self.fail_after {
                tokio::time::sleep(delay).await;
                return Err(Error::RoleExited {
                    role: self.name.to_string(),
                    reason: "boom".to_string(),
                });
            }
            shutdown.cancelled().await;
            self.events
                .lock()
                .unwrap()
                .push(format!("{} stopped", self.name));
            Err(Error::Cancelled)
        }
    }

    #[test]
    fn signal_trigger_is_idempotent() {
        let signal = LifecycleSignal::new();
        assert!(!signal.is_triggered());

        signal.trigger();
        signal.trigger();

        assert!(signal.is_triggered());
        assert!(signal.subscribe().is_cancelled());
    }

    #[tokio::test]
    async fn shutdown_drains_all_running_tasks() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut supervisor = Supervisor::new();

        supervisor.launch(
            Role::ApiServer,
            StubEngine::waiting(events.clone(), "api"),
            vec![],
        );
        supervisor.launch(
            Role::ControllerManager,
            StubEngine::waiting(events.clone(), "cm"),
            vec![],
        );
        supervisor.launch(
            Role::Scheduler,
            StubEngine::waiting(events.clone(), "sched"),
            vec![],
        );
        assert_eq!(supervisor.running(), 3);

        tokio::time::timeout(Duration::from_secs(5), supervisor.shutdown())
            .await
            .expect("shutdown should drain promptly");

        let events = events.lock().unwrap();
        assert_eq!(
            events.iter().filter(|e| e.ends_with("stopped")).count(),
            3
        );
        assert_eq!(supervisor.running(), 0);
    }

    #[tokio::test]
    async fn role_failure_fans_out_to_other_tasks() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut supervisor = Supervisor::new();

        supervisor.launch(
            Role::ApiServer,
            StubEngine::waiting(events.clone(), "api"),
            vec![],
        );
        supervisor.launch(
            Role::ControllerManager,
            StubEngine::failing(events.clone(), "cm", Duration::from_millis(20)),
            vec![],
        );

        let mut observer = supervisor.signal().subscribe();
        tokio::time::timeout(Duration::from_secs(5), observer.cancelled())
            .await
            .expect("failure should trigger the lifecycle signal");

        supervisor.shutdown().await;

        let events = events.lock().unwrap();
        assert!(events.contains(&"api stopped".to_string()));
    }

    #[tokio::test]
    async fn cancellation_exit_does_not_trigger_signal() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut supervisor = Supervisor::new();

        supervisor.launch(
            Role::Scheduler,
            StubEngine::waiting(events, "sched"),
            vec![],
        );
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Task is parked on the signal; nothing failed, so it stays unfired.
        assert!(!supervisor.signal().is_triggered());
        supervisor.shutdown().await;
    }
}
