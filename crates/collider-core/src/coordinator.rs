use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use collider_config::ColliderConfig;
use rand::Rng;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::claim::saturating_millis;
use crate::context::{RunContext, RunSettings};
use crate::error::ColliderError;
use crate::report::{RunReport, RunTiming, WorkerReport};
use crate::traits::Connector;
use crate::worker::Worker;

/// Owns one run: resets the tracker, launches every worker and joins them.
pub struct Coordinator {
    ctx: Arc<RunContext>,
    connector: Arc<dyn Connector>,
    ttl: Duration,
}

impl Coordinator {
    /// Validate `config` and prepare a run against `connector`.
    ///
    /// Without a configured seed a random one is drawn and logged so the
    /// shuffles can be replayed.
    pub fn new(config: &ColliderConfig, connector: Arc<dyn Connector>) -> Result<Self, ColliderError> {
        let config = config.effective();
        config.validate_or_err()?;

        let seed = config.seed.unwrap_or_else(|| rand::thread_rng().gen());
        let settings = RunSettings::from_config(&config, seed);

        Ok(Coordinator {
            ctx: Arc::new(RunContext::new(settings)),
            connector,
            ttl: config.ttl.as_duration(),
        })
    }

    pub fn seed(&self) -> u64 {
        self.ctx.settings.seed
    }

    /// Shared run state, for inspection after [`run`](Self::run).
    pub fn context(&self) -> Arc<RunContext> {
        Arc::clone(&self.ctx)
    }

    /// Run every worker to completion and summarize.
    pub async fn run(self) -> RunReport {
        let settings = &self.ctx.settings;
        info!(
            workers = settings.workers,
            iterations = settings.iterations,
            seed = settings.seed,
            target = %self.connector.describe(),
            table = %settings.table,
            "starting collider run"
        );

        self.ctx.tracker.reset();
        let started_at = Utc::now();
        let started = Instant::now();

        let handles: Vec<(usize, JoinHandle<WorkerReport>)> = (0..settings.workers)
            .map(|id| {
                let worker = Worker::new(id, Arc::clone(&self.ctx), Arc::clone(&self.connector));
                (id, tokio::spawn(worker.run()))
            })
            .collect();

        let mut workers = Vec::with_capacity(handles.len());
        for (id, handle) in handles {
            match handle.await {
                Ok(report) => workers.push(report),
                Err(e) => {
                    let err = ColliderError::Join {
                        worker: id,
                        reason: e.to_string(),
                    };
                    error!(worker = id, error = %err, "worker aborted");
                    workers.push(WorkerReport::new(id));
                }
            }
        }

        let elapsed = started.elapsed();
        let ttl_exceeded = elapsed >= self.ttl;
        if ttl_exceeded {
            warn!(
                elapsed_ms = saturating_millis(elapsed),
                ttl_secs = self.ttl.as_secs(),
                "run outlived the row TTL; collisions may be expired rows claimed again"
            );
        }

        let tracker = &self.ctx.tracker;
        let report = RunReport {
            started_at,
            seed: settings.seed,
            iterations: settings.iterations,
            workers,
            reset: self.ctx.gate.reset_status(),
            claimed_slots: tracker.len(),
            collisions: tracker.collisions(),
            elapsed_ms: saturating_millis(elapsed),
            ttl_exceeded,
            timing: RunTiming {
                reset_finished_at: self.ctx.gate.reset_finished_at(),
                first_claim_at: tracker.first_claim_at(),
            },
        };

        if report.collisions.is_empty() {
            info!(
                claimed = report.claimed_slots,
                applied = report.total_applied(),
                missing = report.coverage_gap(),
                elapsed_ms = report.elapsed_ms,
                "run finished without duplicates"
            );
        } else {
            error!(
                collisions = report.collisions.len(),
                claimed = report.claimed_slots,
                "run finished with DUPLICATE claims"
            );
        }

        report
    }
}
