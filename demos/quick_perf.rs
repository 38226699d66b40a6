//! Wall-clock throughput of both queues over a fixed set of workloads.
//!
//! `cargo run --release --example quick_perf`

use atombuf::{Backoff, IndexCasQueue, Queue, SlottedMpmcQueue};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

struct Workload {
    name: &'static str,
    capacity: usize,
    producers: usize,
    consumers: usize,
    items_per_producer: usize,
}

const WORKLOADS: &[Workload] = &[
    Workload { name: "SPSC (1P/1C)", capacity: 128, producers: 1, consumers: 1, items_per_producer: 1_000_000 },
    Workload { name: "MPSC (4P/1C)", capacity: 128, producers: 4, consumers: 1, items_per_producer: 250_000 },
    Workload { name: "SPMC (1P/4C)", capacity: 128, producers: 1, consumers: 4, items_per_producer: 1_000_000 },
    Workload { name: "MPMC (4P/4C)", capacity: 128, producers: 4, consumers: 4, items_per_producer: 250_000 },
    Workload { name: "High contention (8P/8C, small buffer)", capacity: 16, producers: 8, consumers: 8, items_per_producer: 125_000 },
    Workload { name: "Low contention (2P/2C, large buffer)", capacity: 4096, producers: 2, consumers: 2, items_per_producer: 500_000 },
    Workload { name: "Stress (16P/16C)", capacity: 256, producers: 16, consumers: 16, items_per_producer: 62_500 },
    Workload { name: "Burst (8P/8C)", capacity: 64, producers: 8, consumers: 8, items_per_producer: 12_500 },
];

fn main() -> Result<(), atombuf::ConstructionError> {
    println!("atombuf performance test");
    println!("========================");
    println!(
        "hardware threads: {}\n",
        thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
    );

    println!("{:<40} {:>14} {:>14} {:>12}", "workload", "index-cas", "slotted", "ratio");
    println!("{}", "-".repeat(84));

    for w in WORKLOADS {
        // Index-cas keeps one slot reserved, so ask for one less to get the
        // same ring length as the slotted queue.
        let index_cas = run(IndexCasQueue::new(w.capacity - 1)?, w);
        let slotted = run(SlottedMpmcQueue::new(w.capacity)?, w);
        println!(
            "{:<40} {:>10.2} M/s {:>10.2} M/s {:>11.2}x",
            w.name,
            mops(w, index_cas),
            mops(w, slotted),
            mops(w, slotted) / mops(w, index_cas),
        );
    }
    Ok(())
}

fn mops(w: &Workload, elapsed: Duration) -> f64 {
    (w.producers * w.items_per_producer) as f64 / elapsed.as_secs_f64() / 1e6
}

fn run<Q: Queue<usize> + Send + Sync + 'static>(queue: Q, w: &Workload) -> Duration {
    let queue = Arc::new(queue);
    let total = w.producers * w.items_per_producer;
    let consumed = Arc::new(AtomicUsize::new(0));
    let start = Arc::new(Barrier::new(w.producers + w.consumers + 1));
    let mut handles = Vec::with_capacity(w.producers + w.consumers);

    for p in 0..w.producers {
        let queue = queue.clone();
        let start = start.clone();
        let items = w.items_per_producer;
        handles.push(thread::spawn(move || {
            start.wait();
            for i in 0..items {
                let mut item = p * items + i;
                let backoff = Backoff::new();
                while let Err(rejected) = queue.try_push(item) {
                    item = rejected;
                    backoff.snooze();
                }
            }
        }));
    }

    for _ in 0..w.consumers {
        let queue = queue.clone();
        let consumed = consumed.clone();
        let start = start.clone();
        handles.push(thread::spawn(move || {
            start.wait();
            let backoff = Backoff::new();
            while consumed.load(Ordering::Relaxed) < total {
                match queue.try_pop() {
                    Some(item) => {
                        std::hint::black_box(item);
                        consumed.fetch_add(1, Ordering::Relaxed);
                        backoff.reset();
                    }
                    None => backoff.snooze(),
                }
            }
        }));
    }

    start.wait();
    let began = Instant::now();
    for h in handles {
        h.join().unwrap();
    }
    began.elapsed()
}
