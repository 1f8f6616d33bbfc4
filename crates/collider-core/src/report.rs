use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;

use crate::gate::ResetStatus;
use crate::statement::WorkerId;
use crate::tracker::Collision;

/// Per-worker tallies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkerReport {
    pub worker: WorkerId,
    /// Whether the worker got a session at all.
    pub connected: bool,
    /// Claim requests issued, retries included.
    pub attempted: u64,
    /// Claims the store reported as applied.
    pub applied: u64,
    /// Claims that lost to an earlier writer.
    pub rejected: u64,
    /// Slots given up on after a failed request.
    pub failed: u64,
    pub retries: u64,
    /// Applied claims the tracker flagged as duplicates.
    pub collisions: u64,
}

impl WorkerReport {
    pub fn new(worker: WorkerId) -> Self {
        WorkerReport {
            worker,
            ..Default::default()
        }
    }
}

/// Clock readings used by post-run ordering checks.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunTiming {
    pub reset_finished_at: Option<Instant>,
    pub first_claim_at: Option<Instant>,
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub seed: u64,
    pub iterations: u32,
    pub workers: Vec<WorkerReport>,
    pub reset: ResetStatus,
    /// Distinct slots the tracker saw applied.
    pub claimed_slots: usize,
    pub collisions: Vec<Collision>,
    pub elapsed_ms: u64,
    /// The run outlived the row TTL, so late collisions may be expired rows re-claimed.
    pub ttl_exceeded: bool,
    #[serde(skip)]
    pub timing: RunTiming,
}

/// Pass/fail reading of a [`RunReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Every slot claimed exactly once.
    Clean,
    /// At least one slot was claimed more than once.
    Collisions(usize),
    /// No collisions, but some slots were never claimed.
    Incomplete { missing: usize },
}

impl RunReport {
    pub fn total_applied(&self) -> u64 {
        self.workers.iter().map(|w| w.applied).sum()
    }

    pub fn total_failed(&self) -> u64 {
        self.workers.iter().map(|w| w.failed).sum()
    }

    pub fn connected_workers(&self) -> usize {
        self.workers.iter().filter(|w| w.connected).count()
    }

    /// Slots no worker managed to claim.
    pub fn coverage_gap(&self) -> usize {
        (self.iterations as usize).saturating_sub(self.claimed_slots)
    }

    pub fn verdict(&self) -> Verdict {
        if !self.collisions.is_empty() {
            Verdict::Collisions(self.collisions.len())
        } else if self.coverage_gap() > 0 {
            Verdict::Incomplete {
                missing: self.coverage_gap(),
            }
        } else {
            Verdict::Clean
        }
    }
}
