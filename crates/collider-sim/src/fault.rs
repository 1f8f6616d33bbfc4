use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use collider_core::{ConditionalInsert, Connector, Session, SlotId, Statement, StoreError, WorkerId};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::Mutex;

/// Prefix used in error messages to distinguish injected faults from real errors.
pub const FAULT_PREFIX: &str = "[fault-injected]";

/// Configuration for fault injection.
#[derive(Debug, Clone, Default)]
pub struct FaultConfig {
    /// Probability of a transient error per claim (0.0-1.0).
    pub error_rate: f64,
    /// Slots whose every claim fails with a statement error.
    pub failing_slots: BTreeSet<SlotId>,
    /// The first N connect calls fail.
    pub connect_failures: usize,
    /// Probability that a losing insert is reported as applied (0.0-1.0).
    pub phantom_apply_rate: f64,
    /// Upper bound of a random delay before each session call.
    pub max_latency_ms: u64,
}

impl FaultConfig {
    /// Every claim for `slots` fails.
    pub fn failing(slots: impl IntoIterator<Item = SlotId>) -> Self {
        FaultConfig {
            failing_slots: slots.into_iter().collect(),
            ..Default::default()
        }
    }

    /// True when the configuration can make a slot go unclaimed.
    pub fn can_lose_claims(&self) -> bool {
        self.error_rate > 0.0 || !self.failing_slots.is_empty() || self.connect_failures > 0
    }
}

/// Statistics about injected faults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaultStats {
    /// Transient errors injected into claims.
    pub fault_count: usize,
    /// Claims rejected because their slot is configured to fail.
    pub slot_failures: usize,
    pub failed_connects: usize,
    /// Losing inserts reported as applied.
    pub phantom_count: usize,
}

#[derive(Debug, Default)]
struct FaultCounters {
    fault_count: AtomicUsize,
    slot_failures: AtomicUsize,
    failed_connects: AtomicUsize,
    phantom_count: AtomicUsize,
}

/// A connector wrapper whose sessions inject errors, latency and phantom applies.
pub struct FaultyConnector {
    inner: Arc<dyn Connector>,
    config: Arc<FaultConfig>,
    seed: u64,
    connects: AtomicUsize,
    counters: Arc<FaultCounters>,
}

impl FaultyConnector {
    /// Each session draws from its own ChaCha8 stream of `seed`, keyed by worker id.
    pub fn new(inner: Arc<dyn Connector>, seed: u64, config: FaultConfig) -> Self {
        FaultyConnector {
            inner,
            config: Arc::new(config),
            seed,
            connects: AtomicUsize::new(0),
            counters: Arc::new(FaultCounters::default()),
        }
    }

    pub fn stats(&self) -> FaultStats {
        FaultStats {
            fault_count: self.counters.fault_count.load(Ordering::Relaxed),
            slot_failures: self.counters.slot_failures.load(Ordering::Relaxed),
            failed_connects: self.counters.failed_connects.load(Ordering::Relaxed),
            phantom_count: self.counters.phantom_count.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl Connector for FaultyConnector {
    async fn connect(&self, worker: WorkerId) -> Result<Box<dyn Session>, StoreError> {
        if self.connects.fetch_add(1, Ordering::SeqCst) < self.config.connect_failures {
            self.counters.failed_connects.fetch_add(1, Ordering::Relaxed);
            return Err(StoreError::ConnectionFailed {
                endpoints: vec![format!("{} {}", FAULT_PREFIX, self.describe())],
                source: Box::new(std::io::Error::other(format!(
                    "{} connection refused for worker {}",
                    FAULT_PREFIX, worker
                ))),
            });
        }

        let inner = self.inner.connect(worker).await?;
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        rng.set_stream(worker as u64);

        Ok(Box::new(FaultySession {
            inner,
            rng: Mutex::new(rng),
            config: Arc::clone(&self.config),
            counters: Arc::clone(&self.counters),
        }))
    }

    fn describe(&self) -> String {
        format!("faulty {}", self.inner.describe())
    }
}

pub struct FaultySession {
    inner: Box<dyn Session>,
    rng: Mutex<ChaCha8Rng>,
    config: Arc<FaultConfig>,
    counters: Arc<FaultCounters>,
}

impl FaultySession {
    async fn roll(&self, rate: f64) -> bool {
        if rate <= 0.0 {
            return false;
        }
        let roll: f64 = self.rng.lock().await.gen();
        roll < rate
    }

    async fn maybe_delay(&self) {
        if self.config.max_latency_ms == 0 {
            return;
        }
        let ms = self.rng.lock().await.gen_range(0..=self.config.max_latency_ms);
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    /// A transient error, either a timeout or a dropped connection.
    async fn injected_error(&self, slot: SlotId) -> StoreError {
        self.counters.fault_count.fetch_add(1, Ordering::Relaxed);
        let use_timeout: bool = self.rng.lock().await.gen();
        if use_timeout {
            StoreError::Timeout {
                operation: format!("{} insert slot {}", FAULT_PREFIX, slot),
                elapsed_ms: 0,
            }
        } else {
            StoreError::ConnectionFailed {
                endpoints: vec![format!("{} faulty", FAULT_PREFIX)],
                source: Box::new(std::io::Error::other(format!(
                    "{} connection dropped during insert of slot {}",
                    FAULT_PREFIX, slot
                ))),
            }
        }
    }
}

#[async_trait]
impl Session for FaultySession {
    async fn execute(&self, statement: &Statement) -> Result<(), StoreError> {
        self.maybe_delay().await;
        self.inner.execute(statement).await
    }

    async fn insert_if_not_exists(&self, insert: &ConditionalInsert) -> Result<bool, StoreError> {
        self.maybe_delay().await;

        if self.config.failing_slots.contains(&insert.slot) {
            self.counters.slot_failures.fetch_add(1, Ordering::Relaxed);
            return Err(StoreError::Statement(format!(
                "{} write to slot {} rejected",
                FAULT_PREFIX, insert.slot
            )));
        }
        if self.roll(self.config.error_rate).await {
            return Err(self.injected_error(insert.slot).await);
        }

        let applied = self.inner.insert_if_not_exists(insert).await?;
        if !applied && self.roll(self.config.phantom_apply_rate).await {
            self.counters.phantom_count.fetch_add(1, Ordering::Relaxed);
            return Ok(true);
        }
        Ok(applied)
    }

    async fn close(&self) {
        self.inner.close().await
    }
}

/// Check if an error was injected by the fault layer.
pub fn is_injected_fault(msg: &str) -> bool {
    msg.contains(FAULT_PREFIX)
}
