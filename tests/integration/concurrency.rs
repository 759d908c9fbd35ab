//! Concurrent registration and removal while the loop ticks.

use metronome::testing::{FireCounter, wait_until};
use metronome::{PeriodicScheduler, TaskId};
use std::collections::HashSet;
use std::thread;

use crate::common::{RESOLUTION, WAIT, ms};

const ADDERS: usize = 4;
const REMOVERS: usize = 4;
const TASKS_PER_THREAD: usize = 50;

#[test]
fn test_ids_are_unique_across_threads() {
    let scheduler = PeriodicScheduler::new(RESOLUTION).unwrap();

    let ids: Vec<TaskId> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                s.spawn(|| {
                    (0..100)
                        .map(|_| scheduler.add_task(|| {}, ms(5)).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect()
    });

    let unique: HashSet<_> = ids.iter().copied().collect();
    assert_eq!(ids.len(), 800);
    assert_eq!(unique.len(), 800);
    assert_eq!(scheduler.len(), 800);
}

#[test]
fn test_concurrent_add_and_remove_under_load() {
    let scheduler = PeriodicScheduler::new(RESOLUTION).unwrap();
    let counter = FireCounter::new();

    // Tasks that exist before the churn starts; removers take every other one.
    let initial: Vec<TaskId> = (0..ADDERS * TASKS_PER_THREAD)
        .map(|_| scheduler.add_task(counter.callback(), ms(5)).unwrap())
        .collect();
    let to_remove: Vec<TaskId> = initial.iter().copied().step_by(2).collect();

    // Churn only once the loop is firing.
    assert!(wait_until(WAIT, || counter.count() > 0));

    let added: Vec<TaskId> = thread::scope(|s| {
        let adders: Vec<_> = (0..ADDERS)
            .map(|_| {
                s.spawn(|| {
                    (0..TASKS_PER_THREAD)
                        .map(|_| {
                            let id = scheduler.add_task(counter.callback(), ms(5)).unwrap();
                            thread::yield_now();
                            id
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        for chunk in to_remove.chunks(to_remove.len().div_ceil(REMOVERS)) {
            let scheduler = &scheduler;
            s.spawn(move || {
                for id in chunk {
                    assert!(scheduler.remove_task(*id));
                    thread::yield_now();
                }
            });
        }

        adders
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect()
    });

    let removed: HashSet<TaskId> = to_remove.into_iter().collect();
    let expected: HashSet<TaskId> = initial
        .into_iter()
        .chain(added.iter().copied())
        .filter(|id| !removed.contains(id))
        .collect();
    let actual: HashSet<TaskId> = scheduler.task_ids().into_iter().collect();

    assert_eq!(added.len(), ADDERS * TASKS_PER_THREAD);
    assert_eq!(actual, expected);
    assert_eq!(scheduler.len(), expected.len());
    let after_churn = counter.count();
    assert!(
        wait_until(WAIT, || counter.count() > after_churn),
        "loop stopped firing after concurrent churn"
    );
}
