//! Randomized stress test for the ledger invariants: under concurrent
//! acquire, execute, and unload traffic, pool occupancy never exceeds
//! capacity and no model holds slots in both tiers at once.

use hearth_core::{MockBackend, ResidencyScheduler, SchedulerConfigLoader, SchedulerError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

const WORKERS: usize = 12;
const ITERATIONS: usize = 40;

fn build_scheduler() -> (ResidencyScheduler, Arc<MockBackend>) {
    let content = r#"
fast_tier_capacity_bytes = 10000
slow_tier_capacity_bytes = 8000
graceful_unload_timeout_ms = 20

[load_retry]
max_attempts = 2
initial_backoff_ms = 1
multiplier = 2.0
max_backoff_ms = 5

[[models]]
id = "m0"
size_bytes = 4000
affinity = "fast_only"
priority = "preferred"

[[models]]
id = "m1"
size_bytes = 3000
affinity = "either"
priority = "best_effort"

[[models]]
id = "m2"
size_bytes = 2500
affinity = "either"
priority = "preferred"

[[models]]
id = "m3"
size_bytes = 2000
affinity = "slow_only"
priority = "best_effort"

[[models]]
id = "m4"
size_bytes = 1500
affinity = "either"
priority = "best_effort"

[[models]]
id = "m5"
size_bytes = 1000
affinity = "fast_only"
priority = "pinned"
"#;
    let config = SchedulerConfigLoader::parse(content).unwrap();
    let backend = Arc::new(MockBackend::new().with_default_load_delay(Duration::from_millis(2)));
    let scheduler = ResidencyScheduler::new(&config, backend.clone()).unwrap();
    (scheduler, backend)
}

fn assert_invariants(scheduler: &ResidencyScheduler) {
    let status = scheduler.status();
    let mut seen = HashSet::new();
    for pool in &status.pools {
        assert!(
            pool.used_bytes <= pool.capacity_bytes,
            "{} pool over budget: {} > {}",
            pool.tier,
            pool.used_bytes,
            pool.capacity_bytes
        );
        let resident_total: u64 = pool.residents.iter().map(|r| r.size_bytes).sum();
        assert_eq!(pool.used_bytes, resident_total, "{} pool accounting drift", pool.tier);
        for resident in &pool.residents {
            assert!(
                seen.insert(resident.model_id.clone()),
                "model '{}' resident in both tiers",
                resident.model_id
            );
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_capacity_invariant_under_concurrent_churn() {
    let (scheduler, _backend) = build_scheduler();
    let models = ["m0", "m1", "m2", "m3", "m4", "m5"];

    let mut workers = Vec::new();
    for seed in 0..WORKERS as u64 {
        let scheduler = scheduler.clone();
        workers.push(tokio::spawn(async move {
            let mut rng = StdRng::seed_from_u64(seed);
            for _ in 0..ITERATIONS {
                let model = models[rng.gen_range(0..models.len())];
                if rng.gen_bool(0.8) {
                    match scheduler.acquire(model, Some(Duration::from_millis(250))).await {
                        Ok(lease) => {
                            let hold = rng.gen_range(0..3);
                            if hold > 0 {
                                tokio::time::sleep(Duration::from_millis(hold)).await;
                            }
                            drop(lease);
                        }
                        // Contention failures are expected; only the
                        // accounting invariants matter here.
                        Err(
                            SchedulerError::CapacityExceeded { .. }
                            | SchedulerError::ModelUnavailable { .. }
                            | SchedulerError::Timeout { .. },
                        ) => {}
                        Err(other) => panic!("unexpected acquire failure: {other}"),
                    }
                } else if model != "m5" {
                    match scheduler.unload(model).await {
                        Ok(()) | Err(SchedulerError::NotResident { .. }) => {}
                        Err(SchedulerError::ModelUnavailable { .. }) => {}
                        Err(other) => panic!("unexpected unload failure: {other}"),
                    }
                }
            }
        }));
    }

    // Sample the invariants while the churn is running.
    let monitor = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move {
            for _ in 0..200 {
                assert_invariants(&scheduler);
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
    };

    for worker in workers {
        worker.await.unwrap();
    }
    monitor.await.unwrap();
    assert_invariants(&scheduler);
}

/// The pinned model survives arbitrary churn from every other model.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pinned_model_survives_churn() {
    let (scheduler, backend) = build_scheduler();
    scheduler.preload("m5", None).await.unwrap();

    let mut workers = Vec::new();
    for seed in 0..4u64 {
        let scheduler = scheduler.clone();
        workers.push(tokio::spawn(async move {
            let mut rng = StdRng::seed_from_u64(1000 + seed);
            let models = ["m0", "m1", "m2", "m4"];
            for _ in 0..ITERATIONS {
                let model = models[rng.gen_range(0..models.len())];
                let _ = scheduler.acquire(model, Some(Duration::from_millis(250))).await;
            }
        }));
    }
    for worker in workers {
        worker.await.unwrap();
    }

    assert_eq!(backend.unload_calls("m5"), 0);
    assert!(backend.is_loaded("m5"));
    let status = scheduler.status();
    assert!(status.pools[0].residents.iter().any(|r| r.model_id == "m5"));
}
