#![cfg(not(loom))]

//! 8 producers push 10 000 tagged values each while 8 consumers race to pop
//! them; every value must come out exactly once.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use atombuf::{Backoff, IndexCasQueue, Queue, SlottedMpmcQueue};

const PRODUCERS: usize = 8;
const CONSUMERS: usize = 8;
const ITEMS_PER_PRODUCER: usize = 10_000;
const TOTAL: usize = PRODUCERS * ITEMS_PER_PRODUCER;
const CAPACITY: usize = 128;

fn run_stress<Q>() -> Vec<usize>
where
    Q: Queue<usize> + Send + Sync + 'static,
{
    let queue = Arc::new(Q::with_capacity(CAPACITY).unwrap());
    let consumed = Arc::new(AtomicUsize::new(0));
    let start = Arc::new(Barrier::new(PRODUCERS + CONSUMERS));

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|producer_id| {
            let queue = queue.clone();
            let start = start.clone();
            thread::spawn(move || {
                start.wait();
                for i in 0..ITEMS_PER_PRODUCER {
                    let mut item = producer_id * ITEMS_PER_PRODUCER + i;
                    let backoff = Backoff::new();
                    while let Err(rejected) = queue.try_push(item) {
                        item = rejected;
                        backoff.snooze();
                    }
                }
            })
        })
        .collect();

    let consumers: Vec<_> = (0..CONSUMERS)
        .map(|_| {
            let queue = queue.clone();
            let consumed = consumed.clone();
            let start = start.clone();
            thread::spawn(move || {
                start.wait();
                let mut received = Vec::new();
                while consumed.load(Ordering::Relaxed) < TOTAL {
                    match queue.try_pop() {
                        Some(item) => {
                            received.push(item);
                            consumed.fetch_add(1, Ordering::Relaxed);
                        }
                        None => thread::yield_now(),
                    }
                }
                received
            })
        })
        .collect();

    for handle in producers {
        handle.join().unwrap();
    }
    let received: Vec<usize> = consumers
        .into_iter()
        .flat_map(|handle| handle.join().unwrap())
        .collect();

    assert!(queue.is_empty());
    assert_eq!(queue.try_pop(), None);
    received
}

fn assert_exactly_once(received: Vec<usize>) {
    assert_eq!(received.len(), TOTAL, "lost or duplicated items");

    let unique: HashSet<usize> = received.iter().copied().collect();
    assert_eq!(unique.len(), TOTAL, "duplicated items");

    let expected: HashSet<usize> = (0..TOTAL).collect();
    assert_eq!(unique, expected, "consumed set differs from produced set");
}

#[test]
fn slotted_8p_8c_exactly_once() {
    assert_exactly_once(run_stress::<SlottedMpmcQueue<usize>>());
}

#[test]
fn index_cas_8p_8c_exactly_once() {
    assert_exactly_once(run_stress::<IndexCasQueue<usize>>());
}
