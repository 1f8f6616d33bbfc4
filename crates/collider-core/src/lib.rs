mod claim;
mod context;
mod coordinator;
mod error;
mod gate;
mod report;
mod statement;
mod tracker;
mod traits;
mod worker;

#[cfg(test)]
mod test_support;

pub use claim::{attempt, claim_slot, truncate, with_timeout, ClaimOutcome, ClaimRecord};
pub use context::{RunContext, RunSettings};
pub use coordinator::Coordinator;
pub use error::{ColliderError, StoreError};
pub use gate::{ResetStatus, StartGate};
pub use report::{RunReport, RunTiming, Verdict, WorkerReport};
pub use statement::{ConditionalInsert, SlotId, Statement, WorkerId};
pub use tracker::{Collision, OutcomeTracker};
pub use traits::{Connector, Session};
pub use worker::{permutation, Worker};
