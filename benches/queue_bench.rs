use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use atombuf::{Backoff, CachePadded, IndexCasQueue, Queue, SlottedMpmcQueue};

const MESSAGES: usize = 1_000_000;

/// Producer/consumer mix and ring size, mirroring the scenarios the queues
/// are expected to serve.
#[derive(Clone, Copy)]
struct Scenario {
    name: &'static str,
    producers: usize,
    consumers: usize,
    capacity: usize,
}

const SCENARIOS: &[Scenario] = &[
    Scenario { name: "1p_1c", producers: 1, consumers: 1, capacity: 1024 },
    Scenario { name: "4p_1c", producers: 4, consumers: 1, capacity: 1024 },
    Scenario { name: "1p_4c", producers: 1, consumers: 4, capacity: 1024 },
    Scenario { name: "4p_4c", producers: 4, consumers: 4, capacity: 1024 },
    Scenario { name: "8p_8c_small", producers: 8, consumers: 8, capacity: 16 },
];

fn run_atombuf<Q: Queue<usize> + Send + Sync + 'static>(scenario: Scenario) {
    let queue = Arc::new(Q::with_capacity(scenario.capacity).unwrap());
    let consumed = Arc::new(AtomicUsize::new(0));
    let per_producer = MESSAGES / scenario.producers;
    let total = per_producer * scenario.producers;
    let mut handles = Vec::with_capacity(scenario.producers + scenario.consumers);

    for p in 0..scenario.producers {
        let q = queue.clone();
        handles.push(thread::spawn(move || {
            for i in 0..per_producer {
                let mut item = black_box(p * per_producer + i);
                let backoff = Backoff::new();
                while let Err(rejected) = q.try_push(item) {
                    item = rejected;
                    backoff.snooze();
                }
            }
        }));
    }

    for _ in 0..scenario.consumers {
        let q = queue.clone();
        let consumed = consumed.clone();
        handles.push(thread::spawn(move || {
            while consumed.load(Ordering::Relaxed) < total {
                match q.try_pop() {
                    Some(item) => {
                        black_box(item);
                        consumed.fetch_add(1, Ordering::Relaxed);
                    }
                    None => std::hint::spin_loop(),
                }
            }
        }));
    }

    for h in handles {
        h.join().unwrap();
    }
}

fn run_crossbeam(scenario: Scenario) {
    let (tx, rx) = crossbeam_channel::bounded::<usize>(scenario.capacity);
    let per_producer = MESSAGES / scenario.producers;
    let total = per_producer * scenario.producers;
    let consumed = Arc::new(AtomicUsize::new(0));
    let mut handles = Vec::new();

    for p in 0..scenario.producers {
        let tx = tx.clone();
        handles.push(thread::spawn(move || {
            for i in 0..per_producer {
                tx.send(black_box(p * per_producer + i)).unwrap();
            }
        }));
    }
    drop(tx);

    for _ in 0..scenario.consumers {
        let rx = rx.clone();
        let consumed = consumed.clone();
        handles.push(thread::spawn(move || {
            while consumed.load(Ordering::Relaxed) < total {
                if let Ok(item) = rx.recv() {
                    black_box(item);
                    consumed.fetch_add(1, Ordering::Relaxed);
                } else {
                    break;
                }
            }
        }));
    }

    for h in handles {
        h.join().unwrap();
    }
}

fn run_flume(scenario: Scenario) {
    let (tx, rx) = flume::bounded::<usize>(scenario.capacity);
    let per_producer = MESSAGES / scenario.producers;
    let total = per_producer * scenario.producers;
    let consumed = Arc::new(AtomicUsize::new(0));
    let mut handles = Vec::new();

    for p in 0..scenario.producers {
        let tx = tx.clone();
        handles.push(thread::spawn(move || {
            for i in 0..per_producer {
                tx.send(black_box(p * per_producer + i)).unwrap();
            }
        }));
    }
    drop(tx);

    for _ in 0..scenario.consumers {
        let rx = rx.clone();
        let consumed = consumed.clone();
        handles.push(thread::spawn(move || {
            while consumed.load(Ordering::Relaxed) < total {
                if let Ok(item) = rx.recv() {
                    black_box(item);
                    consumed.fetch_add(1, Ordering::Relaxed);
                } else {
                    break;
                }
            }
        }));
    }

    for h in handles {
        h.join().unwrap();
    }
}

fn bench_scenarios(c: &mut Criterion) {
    for &scenario in SCENARIOS {
        let mut group = c.benchmark_group(scenario.name);
        group.throughput(Throughput::Elements(MESSAGES as u64));
        group.sample_size(10);

        group.bench_function("index_cas", |b| {
            b.iter(|| run_atombuf::<IndexCasQueue<usize>>(scenario))
        });
        group.bench_function("slotted_mpmc", |b| {
            b.iter(|| run_atombuf::<SlottedMpmcQueue<usize>>(scenario))
        });
        group.bench_function("crossbeam_channel", |b| b.iter(|| run_crossbeam(scenario)));
        group.bench_function("flume", |b| b.iter(|| run_flume(scenario)));

        group.finish();
    }
}

// ---------------------------------------------------------------------------
// False sharing: the same SPSC ring with its cursors on one cache line versus
// on separate ones.
// ---------------------------------------------------------------------------

trait Cursors: Default + Send + Sync + 'static {
    fn head(&self) -> &AtomicUsize;
    fn tail(&self) -> &AtomicUsize;
}

#[derive(Default)]
struct Adjacent {
    head: AtomicUsize,
    tail: AtomicUsize,
}

impl Cursors for Adjacent {
    fn head(&self) -> &AtomicUsize {
        &self.head
    }
    fn tail(&self) -> &AtomicUsize {
        &self.tail
    }
}

#[derive(Default)]
struct Padded {
    head: CachePadded<AtomicUsize>,
    tail: CachePadded<AtomicUsize>,
}

impl Cursors for Padded {
    fn head(&self) -> &AtomicUsize {
        &self.head
    }
    fn tail(&self) -> &AtomicUsize {
        &self.tail
    }
}

struct SpscRing<C> {
    cursors: C,
    slots: Box<[AtomicUsize]>,
}

impl<C: Cursors> SpscRing<C> {
    fn new(capacity: usize) -> Self {
        SpscRing {
            cursors: C::default(),
            slots: (0..capacity).map(|_| AtomicUsize::new(0)).collect(),
        }
    }

    fn try_push(&self, value: usize) -> bool {
        let tail = self.cursors.tail().load(Ordering::Relaxed);
        if tail - self.cursors.head().load(Ordering::Acquire) == self.slots.len() {
            return false;
        }
        self.slots[tail % self.slots.len()].store(value, Ordering::Relaxed);
        self.cursors.tail().store(tail + 1, Ordering::Release);
        true
    }

    fn try_pop(&self) -> Option<usize> {
        let head = self.cursors.head().load(Ordering::Relaxed);
        if head == self.cursors.tail().load(Ordering::Acquire) {
            return None;
        }
        let value = self.slots[head % self.slots.len()].load(Ordering::Relaxed);
        self.cursors.head().store(head + 1, Ordering::Release);
        Some(value)
    }
}

fn run_spsc_ring<C: Cursors>() {
    let ring = Arc::new(SpscRing::<C>::new(1024));
    let producer = {
        let ring = ring.clone();
        thread::spawn(move || {
            for i in 0..MESSAGES {
                while !ring.try_push(black_box(i)) {
                    std::hint::spin_loop();
                }
            }
        })
    };
    for _ in 0..MESSAGES {
        loop {
            if let Some(v) = ring.try_pop() {
                black_box(v);
                break;
            }
            std::hint::spin_loop();
        }
    }
    producer.join().unwrap();
}

fn bench_false_sharing(c: &mut Criterion) {
    let mut group = c.benchmark_group("false_sharing_spsc");
    group.throughput(Throughput::Elements(MESSAGES as u64));
    group.sample_size(10);

    group.bench_with_input(BenchmarkId::new("cursors", "adjacent"), &(), |b, _| {
        b.iter(run_spsc_ring::<Adjacent>)
    });
    group.bench_with_input(BenchmarkId::new("cursors", "cache_padded"), &(), |b, _| {
        b.iter(run_spsc_ring::<Padded>)
    });

    group.finish();
}

criterion_group!(benches, bench_scenarios, bench_false_sharing);
criterion_main!(benches);
