use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, error, info, instrument};

use crate::claim::{self, with_timeout, ClaimOutcome};
use crate::context::RunContext;
use crate::report::WorkerReport;
use crate::statement::{SlotId, WorkerId};
use crate::traits::{Connector, Session};

/// Every slot of `[0, iterations)` in a shuffled order.
pub fn permutation<R: Rng + ?Sized>(iterations: u32, rng: &mut R) -> Vec<SlotId> {
    let mut slots: Vec<SlotId> = (0..iterations).collect();
    slots.shuffle(rng);
    slots
}

/// One contender: a dedicated session that tries to claim every slot once.
pub struct Worker {
    id: WorkerId,
    ctx: Arc<RunContext>,
    connector: Arc<dyn Connector>,
    rng: ChaCha8Rng,
}

impl Worker {
    pub fn new(id: WorkerId, ctx: Arc<RunContext>, connector: Arc<dyn Connector>) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(ctx.settings.seed);
        rng.set_stream(id as u64);
        Worker {
            id,
            ctx,
            connector,
            rng,
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Connect, pass the start gate, then claim every slot of a private
    /// permutation in order. Failures never escape the worker.
    #[instrument(skip(self), fields(worker = self.id))]
    pub async fn run(mut self) -> WorkerReport {
        let mut report = WorkerReport::new(self.id);
        let order = permutation(self.ctx.settings.iterations, &mut self.rng);

        let connected = with_timeout(
            self.ctx.settings.op_timeout,
            "connect",
            self.connector.connect(self.id),
        )
        .await;

        let session = match connected {
            Ok(session) => session,
            Err(e) => {
                error!(target = %self.connector.describe(), error = %e, "Unable to connect");
                return report;
            }
        };
        report.connected = true;

        let ctx = Arc::clone(&self.ctx);
        let id = self.id;
        let leader = ctx
            .gate
            .enter(|| claim::truncate(session.as_ref(), &ctx, id))
            .await;
        if leader {
            debug!("reset performed by this worker");
        }

        for slot in order {
            self.claim_with_retry(session.as_ref(), slot, &mut report)
                .await;
        }

        session.close().await;

        info!(
            applied = report.applied,
            rejected = report.rejected,
            failed = report.failed,
            collisions = report.collisions,
            "worker finished"
        );
        report
    }

    /// Claim `slot`, retrying transient failures up to the configured limit.
    async fn claim_with_retry(&self, session: &dyn Session, slot: SlotId, report: &mut WorkerReport) {
        let settings = &self.ctx.settings;
        let mut attempt: u32 = 0;

        loop {
            report.attempted += 1;
            match claim::claim_slot(session, &self.ctx, self.id, slot).await {
                ClaimOutcome::Won { collision } => {
                    report.applied += 1;
                    if collision {
                        report.collisions += 1;
                    }
                    return;
                }
                ClaimOutcome::Lost => {
                    report.rejected += 1;
                    return;
                }
                ClaimOutcome::Failed(e) => {
                    if !e.is_transient() || attempt >= settings.max_retries {
                        report.failed += 1;
                        return;
                    }
                    attempt += 1;
                    report.retries += 1;
                    debug!(slot, attempt, "retrying claim after transient error");
                    tokio::time::sleep(settings.retry_backoff * attempt).await;
                }
            }
        }
    }
}
