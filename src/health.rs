//! Health gate: poll an HTTPS endpoint until it reports healthy.
//!
//! Used to serialize "controller manager is ready" before starting the
//! scheduler. The endpoint is a local loopback probe behind a self-signed
//! certificate, so TLS verification is disabled; keep-alives are disabled
//! so no socket is pooled across polls.

use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::supervisor::ShutdownSignal;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Polls a single health endpoint on a fixed interval until success.
#[derive(Debug, Clone)]
pub struct HealthGate {
    poll_interval: Duration,
    request_timeout: Duration,
    deadline: Option<Duration>,
}

impl HealthGate {
    /// Creates a gate with a 1s poll interval, 5s per-attempt timeouts and
    /// no overall deadline.
    pub fn new() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            deadline: None,
        }
    }

    /// Sets the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Bounds the overall wait; exceeding it is an error. Without a
    /// deadline the gate retries forever.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Blocks until `url` answers 200, sleeping the poll interval between
    /// attempts. Transport errors and non-200 statuses are logged and
    /// retried, never fatal.
    pub async fn wait_healthy(&self, url: &str) -> Result<()> {
        let client = self.client()?;
        let start = Instant::now();

        loop {
            if probe(&client, url).await {
                tracing::info!(url = %url, "endpoint healthy");
                return Ok(());
            }

            if let Some(deadline) = self.deadline {
                if start.elapsed() >= deadline {
                    return Err(Error::HealthDeadline {
                        url: url.to_string(),
                        deadline,
                    });
                }
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Like [`wait_healthy`](Self::wait_healthy), but aborts with
    /// `Error::StartupAborted` if the lifecycle signal fires first.
    pub async fn wait_healthy_with_shutdown(
        &self,
        url: &str,
        shutdown: &mut ShutdownSignal,
    ) -> Result<()> {
        if shutdown.is_cancelled() {
            return Err(Error::StartupAborted(url.to_string()));
        }

        tokio::select! {
            result = self.wait_healthy(url) => result,
            _ = shutdown.cancelled() => Err(Error::StartupAborted(url.to_string())),
        }
    }

    fn client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            // Local loopback probe, not a trust boundary.
            .danger_accept_invalid_certs(true)
            .pool_max_idle_per_host(0)
            .connect_timeout(self.request_timeout)
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| Error::Health(e.to_string()))
    }
}

impl Default for HealthGate {
    fn default() -> Self {
        Self::new()
    }
}

async fn probe(client: &reqwest::Client, url: &str) -> bool {
    match client.get(url).send().await {
        Ok(response) => {
            let healthy = response.status() == reqwest::StatusCode::OK;
            if !healthy {
                tracing::debug!(url = %url, status = %response.status(), "health check not ready");
            }
            healthy
        }
        Err(e) => {
            tracing::debug!(url = %url, error = %e, "health check failed");
            false
        }
    }
}
