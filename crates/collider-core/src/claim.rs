//! The conditional claim operation and the reset statement.

use std::future::Future;
use std::time::Duration;

use tracing::{trace, warn};

use crate::context::RunContext;
use crate::error::StoreError;
use crate::statement::{ConditionalInsert, SlotId, Statement, WorkerId};
use crate::traits::Session;

/// Result of one conditional-write attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimRecord {
    pub slot: SlotId,
    pub applied: bool,
}

/// What a claim attempt meant for the run.
#[derive(Debug)]
pub enum ClaimOutcome {
    /// This attempt created the row. `collision` is set when the tracker had
    /// already seen an applied claim for the slot.
    Won { collision: bool },
    /// The request succeeded but another writer owns the row.
    Lost,
    /// The request itself failed; the slot counts as unclaimed by this attempt.
    Failed(StoreError),
}

/// Whole milliseconds in `d`, saturating at `u64::MAX`.
pub(crate) fn saturating_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Await `fut`, turning expiry of `limit` into [`StoreError::Timeout`].
pub async fn with_timeout<T, F>(
    limit: Option<Duration>,
    operation: &str,
    fut: F,
) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match limit {
        None => fut.await,
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout {
                operation: operation.to_string(),
                elapsed_ms: saturating_millis(limit),
            }),
        },
    }
}

/// Issue one `INSERT ... IF NOT EXISTS` for `slot`.
pub async fn attempt(
    session: &dyn Session,
    insert: &ConditionalInsert,
    limit: Option<Duration>,
) -> Result<ClaimRecord, StoreError> {
    let applied = with_timeout(limit, "insert", session.insert_if_not_exists(insert)).await?;
    Ok(ClaimRecord {
        slot: insert.slot,
        applied,
    })
}

/// Try to claim `slot` once and forward a win to the tracker.
///
/// Never retries; a failed request is logged and reported as
/// [`ClaimOutcome::Failed`].
pub async fn claim_slot(
    session: &dyn Session,
    ctx: &RunContext,
    worker: WorkerId,
    slot: SlotId,
) -> ClaimOutcome {
    let insert = ctx.settings.insert_for(slot);

    match attempt(session, &insert, ctx.settings.op_timeout).await {
        Ok(ClaimRecord { applied: true, .. }) => {
            let collision = ctx.tracker.record(slot, worker);
            trace!(worker, slot, collision, "claim applied");
            ClaimOutcome::Won { collision }
        }
        Ok(ClaimRecord { applied: false, .. }) => {
            trace!(worker, slot, "claim lost to an earlier writer");
            ClaimOutcome::Lost
        }
        Err(e) => {
            warn!(worker, slot, error = %e, "Unable to run query");
            ClaimOutcome::Failed(e)
        }
    }
}

/// Run the truncate for this run's table, logging a failure.
pub async fn truncate(
    session: &dyn Session,
    ctx: &RunContext,
    worker: WorkerId,
) -> Result<(), StoreError> {
    let statement = Statement::Truncate {
        table: ctx.settings.table.clone(),
    };

    let result = with_timeout(ctx.settings.op_timeout, "truncate", session.execute(&statement)).await;
    if let Err(e) = &result {
        warn!(worker, statement = %statement, error = %e, "Unable to run statement");
    }
    result
}
