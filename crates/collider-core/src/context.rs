use std::time::Duration;

use collider_config::ColliderConfig;

use crate::gate::StartGate;
use crate::statement::{ConditionalInsert, SlotId};
use crate::tracker::OutcomeTracker;

/// Immutable per-run parameters shared by every worker.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub workers: usize,
    pub iterations: u32,
    /// Fully qualified `keyspace.table`.
    pub table: String,
    pub partition_key: i32,
    pub ttl_secs: u32,
    pub op_timeout: Option<Duration>,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    /// Master seed; each worker derives its own shuffle stream from it.
    pub seed: u64,
}

impl Default for RunSettings {
    fn default() -> Self {
        RunSettings::from_config(&ColliderConfig::default(), 0)
    }
}

impl RunSettings {
    pub fn from_config(config: &ColliderConfig, seed: u64) -> Self {
        RunSettings {
            workers: config.workers,
            iterations: config.iterations,
            table: config.table_ref(),
            partition_key: config.partition_key,
            ttl_secs: config.ttl_secs(),
            op_timeout: config.op_timeout(),
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff.as_duration(),
            seed,
        }
    }

    /// The conditional insert that claims `slot`.
    pub fn insert_for(&self, slot: SlotId) -> ConditionalInsert {
        ConditionalInsert {
            table: self.table.clone(),
            partition_key: self.partition_key,
            slot,
            ttl_secs: self.ttl_secs,
        }
    }
}

/// State shared by all workers of one run, owned by the coordinator.
#[derive(Debug)]
pub struct RunContext {
    pub settings: RunSettings,
    pub tracker: OutcomeTracker,
    pub gate: StartGate,
}

impl RunContext {
    pub fn new(settings: RunSettings) -> Self {
        RunContext {
            settings,
            tracker: OutcomeTracker::new(),
            gate: StartGate::new(),
        }
    }
}
