//! Start gate: a run-once reset latch whose completion opens the way to claims.
//!
//! The first worker to arrive runs the reset; every other arrival waits for it
//! to finish. The gate opens when the reset completes, not when a head count
//! is reached, so a worker that never arrives cannot hold the others back.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;
use tokio::sync::OnceCell;
use tokio::time::Instant;

use crate::error::StoreError;

/// What happened to the one shared-state reset of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum ResetStatus {
    /// No worker connected, so nobody ran the reset.
    NotAttempted,
    Completed,
    /// The statement failed; claims went ahead regardless.
    Failed(String),
}

#[derive(Debug, Clone)]
struct ResetRecord {
    status: ResetStatus,
    finished_at: Instant,
}

/// Gate that every worker must pass exactly once before claiming.
#[derive(Debug)]
pub struct StartGate {
    reset: OnceCell<ResetRecord>,
    attempts: AtomicUsize,
}

impl Default for StartGate {
    fn default() -> Self {
        Self::new()
    }
}

impl StartGate {
    pub fn new() -> Self {
        StartGate {
            reset: OnceCell::new(),
            attempts: AtomicUsize::new(0),
        }
    }

    /// Run `reset` if no other worker has, or wait for the one in flight.
    ///
    /// Returns `true` for the worker whose `reset` closure actually ran.
    pub async fn enter<F, Fut>(&self, reset: F) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), StoreError>>,
    {
        let mut ran = false;
        self.reset
            .get_or_init(|| async {
                ran = true;
                self.attempts.fetch_add(1, Ordering::SeqCst);
                let status = match reset().await {
                    Ok(()) => ResetStatus::Completed,
                    Err(e) => ResetStatus::Failed(e.to_string()),
                };
                ResetRecord {
                    status,
                    finished_at: Instant::now(),
                }
            })
            .await;
        ran
    }

    pub fn reset_status(&self) -> ResetStatus {
        self.reset
            .get()
            .map(|record| record.status.clone())
            .unwrap_or(ResetStatus::NotAttempted)
    }

    /// When the reset finished, successfully or not.
    pub fn reset_finished_at(&self) -> Option<Instant> {
        self.reset.get().map(|record| record.finished_at)
    }

    /// How many times a reset closure was started. At most one.
    pub fn reset_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_reset_runs_once_and_blocks_until_done() {
        let gate = Arc::new(StartGate::new());
        let resets = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();

        for _ in 0..4 {
            let gate = Arc::clone(&gate);
            let resets = Arc::clone(&resets);
            handles.push(tokio::spawn(async move {
                let ran = gate
                    .enter(|| async {
                        tokio::time::sleep(Duration::from_secs(2)).await;
                        resets.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    })
                    .await;
                // Past the gate the reset must be visible as finished.
                assert_eq!(resets.load(Ordering::SeqCst), 1);
                assert!(gate.reset_finished_at().is_some());
                ran
            }));
        }

        let mut leaders = 0;
        for handle in handles {
            if handle.await.unwrap() {
                leaders += 1;
            }
        }

        assert_eq!(leaders, 1);
        assert_eq!(gate.reset_attempts(), 1);
        assert_eq!(gate.reset_status(), ResetStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_reset_is_recorded_not_retried() {
        let gate = Arc::new(StartGate::new());
        let g1 = Arc::clone(&gate);
        let g2 = Arc::clone(&gate);

        let a = tokio::spawn(async move {
            g1.enter(|| async { Err(StoreError::Statement("no such table".to_string())) })
                .await
        });
        let b = tokio::spawn(async move {
            g2.enter(|| async { Err(StoreError::Statement("no such table".to_string())) })
                .await
        });

        let ran_a = a.await.unwrap();
        let ran_b = b.await.unwrap();
        assert!(ran_a ^ ran_b);
        assert_eq!(gate.reset_attempts(), 1);
        assert!(matches!(gate.reset_status(), ResetStatus::Failed(msg) if msg.contains("no such table")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gate_opens_without_every_worker() {
        let gate = Arc::new(StartGate::new());
        let passed = Arc::new(AtomicUsize::new(0));

        // Only two of the run's workers ever show up.
        let mut handles = Vec::new();
        for _ in 0..2 {
            let gate = Arc::clone(&gate);
            let passed = Arc::clone(&passed);
            handles.push(tokio::spawn(async move {
                gate.enter(|| async { Ok(()) }).await;
                passed.fetch_add(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(passed.load(Ordering::SeqCst), 2);
        assert_eq!(gate.reset_attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_arrival_skips_finished_reset() {
        let gate = StartGate::new();
        assert!(gate.enter(|| async { Ok(()) }).await);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!gate.enter(|| async { Ok(()) }).await);
        assert_eq!(gate.reset_attempts(), 1);
    }

    #[test]
    fn test_untouched_gate_means_not_attempted() {
        let gate = StartGate::new();
        assert_eq!(gate.reset_status(), ResetStatus::NotAttempted);
        assert_eq!(gate.reset_attempts(), 0);
        assert!(gate.reset_finished_at().is_none());
    }
}
