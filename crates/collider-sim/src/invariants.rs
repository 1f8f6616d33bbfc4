use std::collections::BTreeSet;

use collider_core::{RunContext, RunReport, SlotId};
use collider_store::MemoryStats;

/// A violation detected after a simulated run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub invariant: String,
    pub details: String,
}

impl Violation {
    fn new(invariant: &str, details: String) -> Self {
        Violation {
            invariant: invariant.to_string(),
            details,
        }
    }
}

/// Check a finished run against the store's own bookkeeping.
///
/// `lossy` means faults could legitimately leave slots unclaimed, which
/// disables the coverage check.
pub fn check_run_invariants(
    report: &RunReport,
    ctx: &RunContext,
    store: &MemoryStats,
    lossy: bool,
) -> Vec<Violation> {
    let mut violations = Vec::new();
    let partition_key = ctx.settings.partition_key;

    // 1. At most one applied claim per slot, as seen by the workers.
    for collision in &report.collisions {
        violations.push(Violation::new(
            "at-most-once",
            format!(
                "slot {} applied for worker {} and again for worker {}",
                collision.slot, collision.first, collision.second
            ),
        ));
    }

    // 2. Worker-observed applies match what the store committed.
    let store_slots: BTreeSet<SlotId> = store
        .applied
        .iter()
        .filter(|(key, count)| key.0 == partition_key && **count > 0)
        .map(|(key, _)| key.1)
        .collect();
    let tracked_slots: BTreeSet<SlotId> = ctx.tracker.claimed_slots().into_iter().collect();
    if store_slots != tracked_slots {
        let only_store: Vec<_> = store_slots.difference(&tracked_slots).collect();
        let only_tracker: Vec<_> = tracked_slots.difference(&store_slots).collect();
        violations.push(Violation::new(
            "store-agrees-with-tracker",
            format!(
                "slots committed but not tracked: {:?}; tracked but never committed: {:?}",
                only_store, only_tracker
            ),
        ));
    }
    if store.total_applied() != report.total_applied() {
        violations.push(Violation::new(
            "store-agrees-with-tracker",
            format!(
                "store committed {} inserts but workers saw {} applied",
                store.total_applied(),
                report.total_applied()
            ),
        ));
    }

    // 3. Exactly one reset whenever any worker got through the gate.
    let expected_resets = if report.connected_workers() > 0 { 1 } else { 0 };
    let attempts = ctx.gate.reset_attempts();
    if attempts != expected_resets || store.truncates != expected_resets as u64 {
        violations.push(Violation::new(
            "reset-once",
            format!(
                "expected {} reset, gate ran {} and store saw {} truncates",
                expected_resets, attempts, store.truncates
            ),
        ));
    }

    // 4. No applied claim before the reset finished.
    let timing = report.timing;
    match (timing.reset_finished_at, timing.first_claim_at) {
        (Some(reset), Some(first)) if first < reset => {
            violations.push(Violation::new(
                "no-claims-before-reset",
                format!(
                    "first claim landed {:?} before the reset finished",
                    reset - first
                ),
            ));
        }
        (None, Some(_)) => {
            violations.push(Violation::new(
                "no-claims-before-reset",
                "claims were recorded but the reset never finished".to_string(),
            ));
        }
        _ => {}
    }

    // 5. Every slot claimed when nothing could have been lost.
    if !lossy && report.coverage_gap() > 0 {
        let claimed: BTreeSet<SlotId> = tracked_slots;
        let missing: Vec<SlotId> = (0..report.iterations)
            .filter(|slot| !claimed.contains(slot))
            .take(10)
            .collect();
        violations.push(Violation::new(
            "eventual-coverage",
            format!(
                "{} of {} slots never claimed, first missing: {:?}",
                report.coverage_gap(),
                report.iterations,
                missing
            ),
        ));
    }

    violations
}
