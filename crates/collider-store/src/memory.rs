use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use collider_core::{ConditionalInsert, Connector, Session, SlotId, Statement, StoreError, WorkerId};
use tokio::time::Instant;
use tracing::debug;

/// `(table, partition key, slot)`.
type RowKey = (String, i32, SlotId);

#[derive(Debug, Clone, Copy)]
struct Row {
    owner: WorkerId,
    expires_at: Instant,
}

impl Row {
    fn live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Counters kept by [`MemoryStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStats {
    pub truncates: u64,
    /// Applied inserts per `(partition key, slot)`. Anything above 1 is a double claim.
    pub applied: HashMap<(i32, SlotId), u64>,
    pub rejected: u64,
}

impl MemoryStats {
    pub fn total_applied(&self) -> u64 {
        self.applied.values().sum()
    }
}

/// Linearizable in-process store.
///
/// Every conditional insert is decided under one write lock, so at most one
/// writer can ever win a row while it is live. Rows expire after their TTL,
/// measured on the tokio clock.
pub struct MemoryStore {
    rows: RwLock<HashMap<RowKey, Row>>,
    stats: Mutex<MemoryStats>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        MemoryStore {
            rows: RwLock::new(HashMap::new()),
            stats: Mutex::new(MemoryStats::default()),
        }
    }

    /// Live rows in `table`.
    pub fn row_count(&self, table: &str) -> usize {
        let now = Instant::now();
        let rows = self.rows.read().unwrap_or_else(|e| e.into_inner());
        rows.iter()
            .filter(|((t, _, _), row)| t == table && row.live(now))
            .count()
    }

    /// Current owner of a live row.
    pub fn owner(&self, table: &str, partition_key: i32, slot: SlotId) -> Option<WorkerId> {
        let now = Instant::now();
        let rows = self.rows.read().unwrap_or_else(|e| e.into_inner());
        rows.get(&(table.to_string(), partition_key, slot))
            .filter(|row| row.live(now))
            .map(|row| row.owner)
    }

    pub fn stats(&self) -> MemoryStats {
        self.stats.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn truncate(&self, table: &str) {
        let mut rows = self.rows.write().unwrap_or_else(|e| e.into_inner());
        rows.retain(|(t, _, _), _| t != table);
        drop(rows);

        self.stats.lock().unwrap_or_else(|e| e.into_inner()).truncates += 1;
        debug!(table, "truncated");
    }

    fn insert_if_not_exists(&self, insert: &ConditionalInsert, worker: WorkerId) -> bool {
        let now = Instant::now();
        let key = (insert.table.clone(), insert.partition_key, insert.slot);

        let applied = {
            let mut rows = self.rows.write().unwrap_or_else(|e| e.into_inner());
            match rows.get(&key) {
                Some(row) if row.live(now) => false,
                _ => {
                    let ttl = Duration::from_secs(u64::from(insert.ttl_secs));
                    rows.insert(
                        key,
                        Row {
                            owner: worker,
                            expires_at: now + ttl,
                        },
                    );
                    true
                }
            }
        };

        let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        if applied {
            *stats
                .applied
                .entry((insert.partition_key, insert.slot))
                .or_insert(0) += 1;
        } else {
            stats.rejected += 1;
        }
        applied
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Hands out sessions onto one shared [`MemoryStore`].
#[derive(Clone, Default)]
pub struct MemoryConnector {
    store: Arc<MemoryStore>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(store: Arc<MemoryStore>) -> Self {
        MemoryConnector { store }
    }

    pub fn store(&self) -> Arc<MemoryStore> {
        Arc::clone(&self.store)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, worker: WorkerId) -> Result<Box<dyn Session>, StoreError> {
        Ok(Box::new(MemorySession {
            store: Arc::clone(&self.store),
            worker,
        }))
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// A worker's view of a [`MemoryStore`].
pub struct MemorySession {
    store: Arc<MemoryStore>,
    worker: WorkerId,
}

#[async_trait]
impl Session for MemorySession {
    async fn execute(&self, statement: &Statement) -> Result<(), StoreError> {
        match statement {
            Statement::Truncate { table } => self.store.truncate(table),
        }
        Ok(())
    }

    async fn insert_if_not_exists(&self, insert: &ConditionalInsert) -> Result<bool, StoreError> {
        // Yield so concurrent workers interleave between claims.
        tokio::task::yield_now().await;
        Ok(self.store.insert_if_not_exists(insert, self.worker))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert(slot: SlotId, ttl_secs: u32) -> ConditionalInsert {
        ConditionalInsert {
            table: "test.test".to_string(),
            partition_key: 3,
            slot,
            ttl_secs,
        }
    }

    #[tokio::test]
    async fn test_first_writer_wins() {
        let connector = MemoryConnector::new();
        let a = connector.connect(0).await.unwrap();
        let b = connector.connect(1).await.unwrap();

        assert!(a.insert_if_not_exists(&insert(5, 60)).await.unwrap());
        assert!(!b.insert_if_not_exists(&insert(5, 60)).await.unwrap());

        let store = connector.store();
        assert_eq!(store.owner("test.test", 3, 5), Some(0));
        let stats = store.stats();
        assert_eq!(stats.total_applied(), 1);
        assert_eq!(stats.rejected, 1);
    }

    #[tokio::test]
    async fn test_truncate_only_touches_its_table() {
        let connector = MemoryConnector::new();
        let session = connector.connect(0).await.unwrap();
        session.insert_if_not_exists(&insert(1, 60)).await.unwrap();
        let mut other = insert(1, 60);
        other.table = "test.other".to_string();
        session.insert_if_not_exists(&other).await.unwrap();

        session
            .execute(&Statement::Truncate {
                table: "test.test".to_string(),
            })
            .await
            .unwrap();

        let store = connector.store();
        assert_eq!(store.row_count("test.test"), 0);
        assert_eq!(store.row_count("test.other"), 1);
        assert_eq!(store.stats().truncates, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rows_expire_after_ttl() {
        let connector = MemoryConnector::new();
        let session = connector.connect(0).await.unwrap();
        assert!(session.insert_if_not_exists(&insert(2, 1)).await.unwrap());

        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(!session.insert_if_not_exists(&insert(2, 1)).await.unwrap());

        tokio::time::advance(Duration::from_millis(600)).await;
        assert!(session.insert_if_not_exists(&insert(2, 1)).await.unwrap());
        assert_eq!(connector.store().stats().applied[&(3, 2)], 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_claims_have_one_winner() {
        let connector = MemoryConnector::new();
        let mut handles = Vec::new();
        for worker in 0..16 {
            let connector = connector.clone();
            handles.push(tokio::spawn(async move {
                let session = connector.connect(worker).await.unwrap();
                session.insert_if_not_exists(&insert(9, 60)).await.unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(connector.store().stats().rejected, 15);
    }
}
