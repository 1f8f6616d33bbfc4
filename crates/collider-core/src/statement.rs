use std::fmt;

/// One contended slot under the shared partition key.
pub type SlotId = u32;

/// Index of a worker within a run.
pub type WorkerId = usize;

/// Administrative statements issued outside the claim path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// Remove every row of a table.
    Truncate { table: String },
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Truncate { table } => write!(f, "TRUNCATE TABLE {}", table),
        }
    }
}

/// Insert `(partition_key, slot)` only if the row does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionalInsert {
    pub table: String,
    pub partition_key: i32,
    pub slot: SlotId,
    pub ttl_secs: u32,
}

impl ConditionalInsert {
    /// Prepared form with bind markers for `(lock_key, bucket_id, ttl)`.
    pub fn cql(&self) -> String {
        format!(
            "INSERT INTO {} (lock_key, bucket_id) VALUES (?, ?) IF NOT EXISTS USING TTL ?",
            self.table
        )
    }
}

impl fmt::Display for ConditionalInsert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "INSERT INTO {} (lock_key, bucket_id) VALUES ({}, {}) IF NOT EXISTS USING TTL {}",
            self.table, self.partition_key, self.slot, self.ttl_secs
        )
    }
}
