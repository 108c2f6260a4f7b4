//! The worker loop: dequeue, process, repeat.

use crate::{Orchestrator, PipelineContext};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Pause after a broker error before polling again.
const DEQUEUE_BACKOFF: Duration = Duration::from_secs(2);

/// Create the shutdown signal pair for a worker.
///
/// Send `true` (e.g. from a SIGTERM handler) to stop the worker picking up
/// new jobs; in-flight jobs finish or are reclaimed by visibility expiry.
pub fn shutdown_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// Consumes the story queue and hands each delivery to the orchestrator.
///
/// Jobs run concurrently up to `job_parallelism`; the broker's visibility
/// timeout and this bound are the system's back-pressure — when every permit
/// is busy, jobs stay on the queue.
pub struct Worker {
    ctx: Arc<PipelineContext>,
    shutdown: watch::Receiver<bool>,
}

impl Worker {
    /// Create a worker over the shared context.
    pub fn new(ctx: Arc<PipelineContext>, shutdown: watch::Receiver<bool>) -> Self {
        Self { ctx, shutdown }
    }

    /// Run until shutdown is signalled, then drain in-flight jobs.
    pub async fn run(mut self) {
        let orchestrator = Arc::new(Orchestrator::new(self.ctx.clone()));
        let permits = Arc::new(Semaphore::new(self.ctx.settings.job_parallelism));
        let visibility = self.ctx.settings.visibility_timeout;
        let mut jobs = JoinSet::new();

        info!(
            job_parallelism = self.ctx.settings.job_parallelism,
            scene_parallelism = self.ctx.settings.scene_parallelism,
            "worker started"
        );

        loop {
            if *self.shutdown.borrow() {
                break;
            }
            while jobs.try_join_next().is_some() {}

            let permit = tokio::select! {
                permit = permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
                changed = self.shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            };

            let delivery = tokio::select! {
                result = self.ctx.broker.dequeue(visibility) => result,
                changed = self.shutdown.changed() => {
                    drop(permit);
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            };

            match delivery {
                Ok(Some(delivery)) => {
                    let orchestrator = orchestrator.clone();
                    jobs.spawn(async move {
                        orchestrator.process(delivery).await;
                        drop(permit);
                    });
                }
                Ok(None) => drop(permit),
                Err(err) => {
                    warn!(error = %err, "dequeue failed, backing off");
                    drop(permit);
                    tokio::time::sleep(DEQUEUE_BACKOFF).await;
                }
            }
        }

        info!("worker shutting down, draining in-flight jobs");
        while jobs.join_next().await.is_some() {}
        info!("worker stopped");
    }
}
