//! Supervisor for detached work.
//!
//! Jobs run on a shared [`JoinSet`] so failures are logged with the job name
//! and shutdown can wait for them instead of dropping them mid-write.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::{JoinError, JoinSet};
use tracing::{Instrument, error, info, info_span, warn};

#[derive(Clone, Default)]
pub struct BackgroundTasks {
    jobs: Arc<Mutex<JoinSet<()>>>,
}

impl BackgroundTasks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `job` in the background. An `Err` outcome is logged and counted.
    pub fn spawn<F>(&self, name: &'static str, job: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let span = info_span!("background", task = name);
        let mut jobs = self.lock();
        reap(&mut jobs);

        jobs.spawn(
            async move {
                if let Err(e) = job.await {
                    error!(event = "background_task_failed", error = %e, "Background task failed");
                    metrics::counter!("background_task_failures_total", "task" => name)
                        .increment(1);
                }
            }
            .instrument(span),
        );
    }

    /// Jobs that have not finished yet.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        let mut jobs = self.lock();
        reap(&mut jobs);
        jobs.len()
    }

    /// Waits up to `timeout` for outstanding jobs, then aborts the rest.
    /// Returns how many jobs were aborted.
    pub async fn shutdown(&self, timeout: Duration) -> usize {
        let mut jobs = std::mem::take(&mut *self.lock());
        if jobs.is_empty() {
            return 0;
        }

        info!(pending = jobs.len(), "Waiting for background tasks");

        let drained = tokio::time::timeout(timeout, async {
            while let Some(result) = jobs.join_next().await {
                log_join_result(result);
            }
        })
        .await;

        if drained.is_ok() {
            return 0;
        }

        let remaining = jobs.len();
        warn!(remaining, "Background tasks did not finish in time, aborting");
        jobs.shutdown().await;
        remaining
    }
}

fn reap(jobs: &mut JoinSet<()>) {
    while let Some(result) = jobs.try_join_next() {
        log_join_result(result);
    }
}

fn log_join_result(result: Result<(), JoinError>) {
    match result {
        Err(e) if e.is_panic() => {
            error!(event = "background_task_panicked", error = %e, "Background task panicked");
            metrics::counter!("background_task_failures_total", "task" => "panic").increment(1);
        }
        Ok(()) | Err(_) => {}
    }
}
