use collider_sim::{FaultConfig, Sim, SimOutcome};
use proptest::prelude::*;

fn run_case(sim: Sim, workers: usize, iterations: u32) -> SimOutcome {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    rt.block_on(async move {
        tokio::time::pause();
        sim.run(workers, iterations).await.unwrap()
    })
}

#[tokio::test(start_paused = true)]
async fn chaos_transient_errors_without_retry() {
    let faults = FaultConfig {
        error_rate: 0.2,
        max_latency_ms: 3,
        ..Default::default()
    };
    let outcome = Sim::with_faults(21, faults).run(8, 100).await.unwrap();

    assert!(outcome.violations.is_empty(), "{:#?}", outcome.violations);
    let stats = outcome.faults.unwrap();
    assert!(stats.fault_count > 0);
    assert_eq!(outcome.report.total_failed(), stats.fault_count as u64);
    assert_eq!(outcome.report.collisions.len(), 0);
}

#[tokio::test(start_paused = true)]
async fn chaos_retries_recover_transient_errors() {
    let faults = FaultConfig {
        error_rate: 0.3,
        ..Default::default()
    };
    let outcome = Sim::with_faults(22, faults)
        .retries(10)
        .run(4, 200)
        .await
        .unwrap();

    assert!(outcome.violations.is_empty(), "{:#?}", outcome.violations);
    let retries: u64 = outcome.report.workers.iter().map(|w| w.retries).sum();
    assert!(retries > 0);
    // Four contenders per slot make it vanishingly unlikely that all give up.
    assert_eq!(outcome.report.coverage_gap(), 0);
}

#[tokio::test(start_paused = true)]
async fn chaos_failing_slots_never_retried() {
    let faults = FaultConfig {
        failing_slots: [0, 7, 19].into_iter().collect(),
        max_latency_ms: 2,
        ..Default::default()
    };
    let outcome = Sim::with_faults(23, faults).retries(5).run(3, 20).await.unwrap();

    assert!(outcome.violations.is_empty(), "{:#?}", outcome.violations);
    let retries: u64 = outcome.report.workers.iter().map(|w| w.retries).sum();
    assert_eq!(retries, 0);
    assert_eq!(outcome.report.claimed_slots, 17);
    for slot in [0, 7, 19] {
        assert!(!outcome.context.tracker.contains(slot));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_clean_store_never_collides(
        seed in any::<u64>(),
        workers in 1usize..12,
        iterations in 1u32..150,
        latency in 0u64..4,
    ) {
        let faults = FaultConfig {
            max_latency_ms: latency,
            ..Default::default()
        };
        let outcome = run_case(Sim::with_faults(seed, faults), workers, iterations);

        prop_assert!(outcome.violations.is_empty(), "{:#?}", outcome.violations);
        prop_assert_eq!(outcome.report.claimed_slots, iterations as usize);
        prop_assert_eq!(outcome.report.total_applied(), u64::from(iterations));
    }

    #[test]
    fn prop_faults_only_lose_claims(
        seed in any::<u64>(),
        workers in 1usize..8,
        iterations in 1u32..100,
        error_rate in 0.0f64..0.5,
    ) {
        let faults = FaultConfig {
            error_rate,
            ..Default::default()
        };
        let outcome = run_case(Sim::with_faults(seed, faults), workers, iterations);

        prop_assert!(outcome.violations.is_empty(), "{:#?}", outcome.violations);
        prop_assert!(outcome.report.collisions.is_empty());
        prop_assert!(outcome.report.claimed_slots <= iterations as usize);
    }
}
