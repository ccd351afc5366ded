pub mod vu;

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::client::build_client;
use crate::models::dsl_model::RunConfig;
use crate::models::metrics::RunSummary;

pub use vu::{VirtualUser, VuState};

/// Runs `config.virtual_users` concurrent virtual users until the configured
/// duration elapses or `shutdown` fires, then returns the aggregated summary.
///
/// Stopping is cooperative: sleeping users wake immediately, users with a
/// request in flight finish it (bounded by the request timeout) first.
pub async fn run_load_test(config: RunConfig, shutdown: CancellationToken) -> RunSummary {
    let client = Arc::new(build_client());
    let config = Arc::new(config);
    let sink = Arc::new(Mutex::new(RunSummary::new(
        &config.checks,
        config.virtual_users,
    )));
    let stop = shutdown.child_token();

    info!(
        name = %config.name,
        target = %config.target,
        vus = config.virtual_users,
        duration = ?config.duration,
        sleep = ?config.sleep,
        timeout = ?config.timeout,
        "starting load test"
    );

    let started = Instant::now();
    let deadline = started + config.duration;
    let mut handles = Vec::with_capacity(config.virtual_users);

    for id in 0..config.virtual_users {
        let user = VirtualUser::new(
            id,
            Arc::clone(&client),
            Arc::clone(&config),
            Arc::clone(&sink),
            stop.clone(),
            started,
        );
        handles.push(task::spawn(user.run()));
    }

    tokio::select! {
        _ = sleep_until(deadline) => {
            info!("duration elapsed, stopping virtual users");
        }
        _ = shutdown.cancelled() => {
            info!("stop requested, finishing in-flight requests");
        }
    }
    stop.cancel();

    let mut iterations = 0u64;
    for (id, handle) in handles.into_iter().enumerate() {
        match handle.await {
            Ok(count) => iterations += count,
            Err(e) => error!(vu = id, error = %e, "virtual user task failed"),
        }
    }

    let mut summary = sink.lock().clone();
    summary.name = config.name.clone();
    summary.target_url = config.target.to_string();
    summary.finish(config.duration, started.elapsed());

    info!(
        requests = summary.total_requests,
        iterations,
        elapsed_secs = summary.elapsed_secs,
        "load test finished"
    );
    summary
}
