//! Client-side auditor of successful conditional writes.
//!
//! Every claim the storage system reports as applied is funnelled through
//! [`OutcomeTracker::record`]. The check-and-insert happens under a single
//! lock, so two workers can never both observe a slot as unclaimed.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;
use tokio::time::Instant;
use tracing::error;

use crate::statement::{SlotId, WorkerId};

/// Two applied claims observed for the same slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Collision {
    pub slot: SlotId,
    /// Worker whose claim was recorded first.
    pub first: WorkerId,
    /// Worker whose later claim collided.
    pub second: WorkerId,
}

#[derive(Debug, Clone, Copy)]
struct ClaimEntry {
    worker: WorkerId,
    at: Instant,
}

#[derive(Debug, Default)]
struct TrackerState {
    claimed: HashMap<SlotId, ClaimEntry>,
    collisions: Vec<Collision>,
}

/// Concurrency-safe set of claimed slots.
#[derive(Debug, Default)]
pub struct OutcomeTracker {
    state: Mutex<TrackerState>,
}

impl OutcomeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget every recorded claim and collision.
    ///
    /// Must complete before the first claim of a run; the coordinator orders this.
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.claimed.clear();
        state.collisions.clear();
    }

    /// Record an applied claim. Returns `true` if the slot was already claimed.
    ///
    /// A collision is logged and kept, but never stops the run.
    pub fn record(&self, slot: SlotId, worker: WorkerId) -> bool {
        let collision = {
            let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
            let state = &mut *guard;
            match state.claimed.entry(slot) {
                Entry::Vacant(vacant) => {
                    vacant.insert(ClaimEntry {
                        worker,
                        at: Instant::now(),
                    });
                    None
                }
                Entry::Occupied(occupied) => {
                    let collision = Collision {
                        slot,
                        first: occupied.get().worker,
                        second: worker,
                    };
                    state.collisions.push(collision.clone());
                    Some(collision)
                }
            }
        };

        match collision {
            Some(c) => {
                error!(
                    slot = c.slot,
                    first_worker = c.first,
                    second_worker = c.second,
                    "================= DUPLICATE FOUND: {} =================",
                    c.slot
                );
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, slot: SlotId) -> bool {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.claimed.contains_key(&slot)
    }

    /// Number of distinct claimed slots.
    pub fn len(&self) -> usize {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.claimed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn collision_count(&self) -> usize {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.collisions.len()
    }

    /// Collisions in the order they were detected.
    pub fn collisions(&self) -> Vec<Collision> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.collisions.clone()
    }

    /// Claimed slots in ascending order.
    pub fn claimed_slots(&self) -> Vec<SlotId> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let mut slots: Vec<SlotId> = state.claimed.keys().copied().collect();
        slots.sort_unstable();
        slots
    }

    /// Worker that holds the recorded claim for `slot`.
    pub fn owner(&self, slot: SlotId) -> Option<WorkerId> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.claimed.get(&slot).map(|entry| entry.worker)
    }

    /// When the earliest recorded claim was accepted.
    pub fn first_claim_at(&self) -> Option<Instant> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.claimed.values().map(|entry| entry.at).min()
    }
}
