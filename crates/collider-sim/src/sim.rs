use std::sync::Arc;

use collider_config::{BackendKind, ColliderConfig, HumanDuration};
use collider_core::{ColliderError, Connector, Coordinator, RunContext, RunReport};
use collider_store::{MemoryConnector, MemoryStats, MemoryStore};

use crate::fault::{FaultConfig, FaultStats, FaultyConnector};
use crate::invariants::{check_run_invariants, Violation};

/// Everything a simulated run produced.
#[derive(Debug)]
pub struct SimOutcome {
    pub report: RunReport,
    pub violations: Vec<Violation>,
    pub store: MemoryStats,
    pub faults: Option<FaultStats>,
    /// Shared run state, for tracker inspection.
    pub context: Arc<RunContext>,
}

/// Runs the full coordinator against a fresh in-memory store.
pub struct Sim {
    seed: u64,
    faults: Option<FaultConfig>,
    max_retries: u32,
}

impl Sim {
    /// Create a new deterministic simulation with the given seed.
    pub fn new(seed: u64) -> Self {
        Sim {
            seed,
            faults: None,
            max_retries: 0,
        }
    }

    /// Create a simulation whose sessions inject faults.
    pub fn with_faults(seed: u64, faults: FaultConfig) -> Self {
        Sim {
            seed,
            faults: Some(faults),
            max_retries: 0,
        }
    }

    /// Let workers retry transient failures.
    pub fn retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn config(&self, workers: usize, iterations: u32) -> ColliderConfig {
        ColliderConfig {
            backend: BackendKind::Memory,
            workers,
            iterations,
            seed: Some(self.seed),
            max_retries: self.max_retries,
            retry_backoff: HumanDuration::from_millis(1),
            // Long enough that no row expires mid-run.
            ttl: HumanDuration::from_secs(3600),
            ..Default::default()
        }
    }

    /// Run `workers` contenders over `iterations` slots and check the result.
    pub async fn run(&self, workers: usize, iterations: u32) -> Result<SimOutcome, ColliderError> {
        let store = Arc::new(MemoryStore::new());
        let memory: Arc<dyn Connector> = Arc::new(MemoryConnector::with_store(Arc::clone(&store)));

        let faulty = self
            .faults
            .clone()
            .map(|config| Arc::new(FaultyConnector::new(memory.clone(), self.seed, config)));
        let connector: Arc<dyn Connector> = match &faulty {
            Some(f) => Arc::clone(f) as Arc<dyn Connector>,
            None => memory,
        };

        let coordinator = Coordinator::new(&self.config(workers, iterations), connector)?;
        let context = coordinator.context();
        let report = coordinator.run().await;

        let stats = store.stats();
        let lossy = self.faults.as_ref().is_some_and(FaultConfig::can_lose_claims);
        let violations = check_run_invariants(&report, &context, &stats, lossy);

        Ok(SimOutcome {
            report,
            violations,
            store: stats,
            faults: faulty.map(|f| f.stats()),
            context,
        })
    }
}
