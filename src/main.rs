//! kube-scratch bootstrap driver.
//!
//! Brings up the control plane in dependency order, waits for an interrupt
//! or termination signal (or a component failure), then shuts down.

use std::path::Path;

use tokio::signal::unix::{signal, SignalKind};

use kube_scratch::{ControlPlane, ControlPlaneConfig, EngineSet, Error, HealthGate, Result};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() > 2 {
        eprintln!("Usage: {} [config.yaml]", args[0]);
        eprintln!("\nBootstraps a single-node scratch control plane.");
        eprintln!("Without a config file, built-in defaults are used.");
        std::process::exit(1);
    }

    let config = match args.get(1) {
        Some(path) => match ControlPlaneConfig::load(Path::new(path)) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config: {}", e);
                std::process::exit(1);
            }
        },
        None => ControlPlaneConfig::default(),
    };

    if let Err(e) = bootstrap(config).await {
        eprintln!("Bootstrap failed: {}", e);
        std::process::exit(1);
    }
}

async fn bootstrap(config: ControlPlaneConfig) -> Result<()> {
    let mut plane = ControlPlane::new(config, EngineSet::processes());

    plane.start_store().await?;
    plane.start_api_server();
    plane.start_controller_manager();

    // The scheduler assumes a stable API surface in leader-election-disabled
    // mode, so it waits on the controller manager being observably healthy.
    let gate = HealthGate::new();
    let mut startup = plane.subscribe_lifecycle();
    let health_url = plane.controller_manager_health_url();
    if let Err(e) = gate.wait_healthy_with_shutdown(&health_url, &mut startup).await {
        plane.shutdown().await;
        return Err(e);
    }

    plane.start_scheduler();
    tracing::info!("control plane is up");

    wait_for_stop(&plane).await?;
    plane.shutdown().await;
    Ok(())
}

/// Blocks until SIGINT, SIGTERM, or a component failure.
async fn wait_for_stop(plane: &ControlPlane) -> Result<()> {
    let mut lifecycle = plane.subscribe_lifecycle();
    let mut term =
        signal(SignalKind::terminate()).map_err(|e| Error::Config(e.to_string()))?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.map_err(|e| Error::Config(e.to_string()))?;
            tracing::info!("interrupt received");
        }
        _ = term.recv() => {
            tracing::info!("termination signal received");
        }
        _ = lifecycle.cancelled() => {
            tracing::warn!("a control-plane component failed");
        }
    }
    Ok(())
}
