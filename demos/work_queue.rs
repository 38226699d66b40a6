//! Jobs fan out to workers through a slotted queue; results come back through
//! a logged index-cas queue.
//!
//! `RUST_LOG=debug cargo run --example work_queue` shows every result push and
//! pop.

use atombuf::{Backoff, IndexCasQueue, Logged, SlottedMpmcQueue};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

const NUM_WORKERS: usize = 4;
const NUM_JOBS: usize = 20;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_thread_names(true)
        .init();

    let jobs = Arc::new(SlottedMpmcQueue::<String>::new(128)?);
    let results = Arc::new(Logged::new(IndexCasQueue::<String>::new(127)?).with_label("results"));
    let done = Arc::new(AtomicUsize::new(0));

    let jobs_tx = jobs.clone();
    let producer = thread::Builder::new().name("producer".into()).spawn(move || {
        for i in 0..NUM_JOBS {
            let mut job = format!("Job-{:02}", i);
            let backoff = Backoff::new();
            while let Err(rejected) = jobs_tx.try_push(job) {
                job = rejected;
                backoff.snooze();
            }
            info!(job = i, "enqueued");
            thread::sleep(Duration::from_millis(10));
        }
        info!("all jobs enqueued");
    })?;

    let mut workers = vec![];
    for worker_id in 0..NUM_WORKERS {
        let jobs_rx = jobs.clone();
        let results_tx = results.clone();
        let done = done.clone();

        workers.push(thread::Builder::new().name(format!("worker-{}", worker_id)).spawn(move || {
            let mut processed = 0;
            let backoff = Backoff::new();
            while done.load(Ordering::Relaxed) < NUM_JOBS {
                let Some(job) = jobs_rx.try_pop() else {
                    backoff.snooze();
                    continue;
                };
                backoff.reset();
                done.fetch_add(1, Ordering::Relaxed);

                thread::sleep(Duration::from_millis(40));

                let mut result = format!("{} -> completed by worker {}", job, worker_id);
                let push_backoff = Backoff::new();
                while let Err(rejected) = results_tx.try_push(result) {
                    result = rejected;
                    push_backoff.snooze();
                }
                processed += 1;
            }
            info!(processed, "worker finished");
        })?);
    }

    let results_rx = results.clone();
    let collector = thread::Builder::new().name("collector".into()).spawn(move || {
        let mut collected = 0;
        let backoff = Backoff::new();
        while collected < NUM_JOBS {
            match results_rx.try_pop() {
                Some(result) => {
                    info!(%result, "result");
                    collected += 1;
                    backoff.reset();
                }
                None => backoff.snooze(),
            }
        }
        info!("all results collected");
    })?;

    producer.join().unwrap();
    for worker in workers {
        worker.join().unwrap();
    }
    collector.join().unwrap();

    info!("work queue example completed");
    Ok(())
}
