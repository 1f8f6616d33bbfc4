use collider_config::ColliderConfig;
use collider_core::{Coordinator, RunReport, Verdict};
use collider_store::connector_for;

use super::{EXIT_CLEAN, EXIT_COLLISIONS, EXIT_INCOMPLETE};

pub async fn run(
    config: &ColliderConfig,
    json: bool,
    require_coverage: bool,
) -> Result<u8, Box<dyn std::error::Error>> {
    let connector = connector_for(config)?;
    let coordinator = Coordinator::new(config, connector)?;
    let report = coordinator.run().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }

    Ok(exit_code(report.verdict(), require_coverage))
}

fn print_summary(report: &RunReport) {
    println!(
        "{} workers ({} connected), {} slots, seed {}",
        report.workers.len(),
        report.connected_workers(),
        report.iterations,
        report.seed
    );
    println!(
        "claimed {} slots, {} applied, {} failed, {} missing in {}ms",
        report.claimed_slots,
        report.total_applied(),
        report.total_failed(),
        report.coverage_gap(),
        report.elapsed_ms
    );
    for collision in &report.collisions {
        println!(
            "DUPLICATE slot {} (workers {} and {})",
            collision.slot, collision.first, collision.second
        );
    }
    if report.ttl_exceeded {
        println!("warning: run outlived the row TTL");
    }
}

fn exit_code(verdict: Verdict, require_coverage: bool) -> u8 {
    match verdict {
        Verdict::Clean => EXIT_CLEAN,
        Verdict::Collisions(_) => EXIT_COLLISIONS,
        Verdict::Incomplete { .. } if require_coverage => EXIT_INCOMPLETE,
        Verdict::Incomplete { .. } => EXIT_CLEAN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use collider_config::BackendKind;

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(Verdict::Clean, true), 0);
        assert_eq!(exit_code(Verdict::Collisions(2), false), 1);
        assert_eq!(exit_code(Verdict::Incomplete { missing: 3 }, false), 0);
        assert_eq!(exit_code(Verdict::Incomplete { missing: 3 }, true), 3);
    }

    #[tokio::test]
    async fn test_memory_run_exits_clean() {
        let config = ColliderConfig {
            backend: BackendKind::Memory,
            workers: 4,
            iterations: 50,
            seed: Some(1),
            ..Default::default()
        };
        assert_eq!(run(&config, true, true).await.unwrap(), EXIT_CLEAN);
    }
}
