//! Scheduler safety under randomised interleavings (spec §8: "no task is
//! executed twice and none is lost"). `proptest` drives the shape of the
//! workload (task count, chunk size, worker count); the actual
//! interleaving comes from the OS scheduler racing real threads against a
//! shared set of deques, repeated many times per case.

use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Mutex;
use stochastic_valuation::*;

/// Run `task_count` single-scenario tasks distributed round-robin across
/// `worker_count` deques, then drain them concurrently via pop/steal from
/// `worker_count` threads racing each other. Every scenario index must be
/// claimed by exactly one thread.
fn run_one_interleaving(scenario_count: u32, chunk_size: u32, worker_count: usize) {
    let tasks = scheduler::partition_tasks(scenario_count, chunk_size);
    let capacity = (tasks.len() / worker_count.max(1) + 2).next_power_of_two();
    let deques: Vec<scheduler::Deque> = (0..worker_count)
        .map(|_| scheduler::Deque::with_capacity(capacity))
        .collect();
    for (i, task) in tasks.iter().enumerate() {
        assert!(deques[i % worker_count].push(*task));
    }

    let claimed: Mutex<Vec<u32>> = Mutex::new(Vec::new());

    std::thread::scope(|scope| {
        for worker_id in 0..worker_count {
            let deques = &deques;
            let claimed = &claimed;
            scope.spawn(move || {
                let mut empty_passes = 0usize;
                let threshold = scheduler::termination_threshold(worker_count);
                loop {
                    let own = &deques[worker_id];
                    let found = own.pop().or_else(|| {
                        (1..worker_count).find_map(|offset| {
                            let victim = (worker_id + offset) % worker_count;
                            deques[victim].steal()
                        })
                    });
                    match found {
                        Some(task) => {
                            empty_passes = 0;
                            let mut guard = claimed.lock().unwrap();
                            for s in task.start()..(task.start() + task.count()) {
                                guard.push(s as u32);
                            }
                        }
                        None => {
                            empty_passes += 1;
                            if empty_passes > threshold {
                                return;
                            }
                            std::thread::yield_now();
                        }
                    }
                }
            });
        }
    });

    let claimed = claimed.into_inner().unwrap();
    assert_eq!(
        claimed.len(),
        scenario_count as usize,
        "every scenario must be claimed exactly once, none lost or duplicated"
    );
    let unique: HashSet<u32> = claimed.iter().copied().collect();
    assert_eq!(unique.len(), scenario_count as usize, "no scenario claimed twice");
    assert_eq!(
        unique,
        (0..scenario_count).collect::<HashSet<_>>(),
        "claimed set must equal [0, scenario_count)"
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn every_task_executes_exactly_once_under_random_shapes(
        scenario_count in 1u32..500,
        chunk_size in 1u32..64,
        worker_count in 1usize..9,
    ) {
        run_one_interleaving(scenario_count, chunk_size, worker_count);
    }
}

#[test]
fn large_scenario_count_tiny_chunks_still_terminates() {
    run_one_interleaving(20_000, 1, 8);
}

#[test]
fn single_scenario_many_workers_terminates_without_stealing() {
    run_one_interleaving(1, 32, 8);
}
