use async_trait::async_trait;

use crate::error::StoreError;
use crate::statement::{ConditionalInsert, Statement, WorkerId};

/// A dedicated connection to the storage system under test.
#[async_trait]
pub trait Session: Send + Sync {
    /// Run an administrative statement, discarding any result rows.
    async fn execute(&self, statement: &Statement) -> Result<(), StoreError>;

    /// Run a conditional insert and return its `[applied]` flag.
    ///
    /// `Ok(false)` means the request succeeded but another writer already owns
    /// the row; it is not an error.
    async fn insert_if_not_exists(&self, insert: &ConditionalInsert) -> Result<bool, StoreError>;

    /// Release the session. Called once, after the worker's last claim.
    async fn close(&self) {}
}

/// Opens sessions against one storage system; each worker gets its own.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, worker: WorkerId) -> Result<Box<dyn Session>, StoreError>;

    /// Short human-readable target description for logs.
    fn describe(&self) -> String;
}
