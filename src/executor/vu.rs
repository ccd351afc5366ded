//! The per-user request/check/sleep loop.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::checks;
use crate::client::{send_request, HttpsClient};
use crate::models::dsl_model::RunConfig;
use crate::models::metrics::RunSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VuState {
    Running,
    Sleeping,
    Stopped,
}

/// State after a sleep: keep going while the run window is open and nobody
/// asked to stop.
pub fn next_after_sleep(elapsed: Duration, duration: Duration, stop_requested: bool) -> VuState {
    if stop_requested || elapsed >= duration {
        VuState::Stopped
    } else {
        VuState::Running
    }
}

pub struct VirtualUser {
    id: usize,
    client: Arc<HttpsClient>,
    config: Arc<RunConfig>,
    sink: Arc<Mutex<RunSummary>>,
    stop: CancellationToken,
    started: Instant,
    state: VuState,
    iterations: u64,
}

impl VirtualUser {
    pub fn new(
        id: usize,
        client: Arc<HttpsClient>,
        config: Arc<RunConfig>,
        sink: Arc<Mutex<RunSummary>>,
        stop: CancellationToken,
        started: Instant,
    ) -> Self {
        Self {
            id,
            client,
            config,
            sink,
            stop,
            started,
            state: VuState::Running,
            iterations: 0,
        }
    }

    /// Drives the loop to `Stopped` and returns the completed iteration count.
    pub async fn run(mut self) -> u64 {
        loop {
            match self.state {
                VuState::Running => {
                    self.iterate().await;
                    self.state = VuState::Sleeping;
                }
                VuState::Sleeping => {
                    self.pause().await;
                    self.state = next_after_sleep(
                        self.started.elapsed(),
                        self.config.duration,
                        self.stop.is_cancelled(),
                    );
                }
                VuState::Stopped => break,
            }
        }
        debug!(vu = self.id, iterations = self.iterations, "virtual user stopped");
        self.iterations
    }

    async fn iterate(&mut self) {
        let outcome = send_request(&self.client, &self.config).await;

        match &outcome {
            Ok(response) => debug!(
                vu = self.id,
                status = response.status,
                latency_ms = response.latency.as_millis() as u64,
                "request completed"
            ),
            Err(e) => warn!(vu = self.id, error = %e, "request failed"),
        }

        let results = checks::evaluate(&self.config.checks, &outcome);
        for result in &results {
            trace!(vu = self.id, check = result.name, passed = result.passed);
        }

        self.sink.lock().record(self.id, &outcome, &results);
        self.iterations += 1;
    }

    async fn pause(&self) {
        tokio::select! {
            _ = sleep(self.config.sleep) => {}
            _ = self.stop.cancelled() => {}
        }
    }
}
