//! Minimal map-backed store for unit tests inside this crate.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::StoreError;
use crate::statement::{ConditionalInsert, SlotId, Statement, WorkerId};
use crate::traits::{Connector, Session};

#[derive(Default)]
struct MapState {
    rows: HashMap<(i32, SlotId), WorkerId>,
    failing: HashSet<SlotId>,
    refuse_workers: HashSet<WorkerId>,
    panic_workers: HashSet<WorkerId>,
    hang_workers: HashSet<WorkerId>,
    always_apply: bool,
    truncates: usize,
}

#[derive(Clone, Default)]
pub struct MapConnector {
    state: Arc<Mutex<MapState>>,
}

impl MapConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_slot(&self, slot: SlotId) {
        self.state.lock().unwrap().failing.insert(slot);
    }

    pub fn refuse_worker(&self, worker: WorkerId) {
        self.state.lock().unwrap().refuse_workers.insert(worker);
    }

    pub fn panic_on_connect(&self, worker: WorkerId) {
        self.state.lock().unwrap().panic_workers.insert(worker);
    }

    /// `worker`'s connect never resolves.
    pub fn hang_on_connect(&self, worker: WorkerId) {
        self.state.lock().unwrap().hang_workers.insert(worker);
    }

    pub fn always_apply(&self) {
        self.state.lock().unwrap().always_apply = true;
    }

    pub fn rows(&self) -> usize {
        self.state.lock().unwrap().rows.len()
    }

    pub fn truncates(&self) -> usize {
        self.state.lock().unwrap().truncates
    }
}

#[async_trait]
impl Connector for MapConnector {
    async fn connect(&self, worker: WorkerId) -> Result<Box<dyn Session>, StoreError> {
        let (panics, hangs) = {
            let state = self.state.lock().unwrap();
            (
                state.panic_workers.contains(&worker),
                state.hang_workers.contains(&worker),
            )
        };
        if panics {
            panic!("connector blew up for worker {}", worker);
        }
        if hangs {
            std::future::pending::<()>().await;
        }
        if self.state.lock().unwrap().refuse_workers.contains(&worker) {
            return Err(StoreError::ConnectionFailed {
                endpoints: vec!["map".to_string()],
                source: Box::new(std::io::Error::other("refused")),
            });
        }
        Ok(Box::new(MapSession {
            state: Arc::clone(&self.state),
            worker,
            hang: false,
        }))
    }

    fn describe(&self) -> String {
        "map".to_string()
    }
}

pub struct MapSession {
    state: Arc<Mutex<MapState>>,
    worker: WorkerId,
    hang: bool,
}

impl MapSession {
    /// A session whose inserts never complete.
    pub fn hanging() -> Self {
        MapSession {
            state: Arc::new(Mutex::new(MapState::default())),
            worker: 0,
            hang: true,
        }
    }
}

#[async_trait]
impl Session for MapSession {
    async fn execute(&self, statement: &Statement) -> Result<(), StoreError> {
        match statement {
            Statement::Truncate { .. } => {
                let mut state = self.state.lock().unwrap();
                state.rows.clear();
                state.truncates += 1;
                Ok(())
            }
        }
    }

    async fn insert_if_not_exists(&self, insert: &ConditionalInsert) -> Result<bool, StoreError> {
        if self.hang {
            std::future::pending::<()>().await;
        }
        let mut state = self.state.lock().unwrap();
        if state.failing.contains(&insert.slot) {
            return Err(StoreError::Statement(format!(
                "injected failure for slot {}",
                insert.slot
            )));
        }
        let key = (insert.partition_key, insert.slot);
        if state.rows.contains_key(&key) {
            return Ok(state.always_apply);
        }
        state.rows.insert(key, self.worker);
        Ok(true)
    }
}
