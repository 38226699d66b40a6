//! Simple usage example

use atombuf::{Backoff, IndexCasQueue, Queue, SlottedMpmcQueue};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() -> Result<(), atombuf::ConstructionError> {
    println!("atombuf - Simple Example\n");

    println!("index-cas queue:");
    run(IndexCasQueue::<String>::new(15)?);

    println!("\nslotted queue:");
    run(SlottedMpmcQueue::<String>::new(16)?);

    println!("\nExample completed successfully!");
    Ok(())
}

fn run<Q: Queue<String> + Send + Sync + 'static>(queue: Q) {
    println!("capacity = {}", queue.capacity());
    let queue = Arc::new(queue);

    let producer_queue = queue.clone();
    let consumer_queue = queue.clone();

    let producer = thread::spawn(move || {
        for i in 0..10 {
            let mut message = format!("Message {}", i);
            println!("Sending: {}", message);

            let backoff = Backoff::new();
            while let Err(rejected) = producer_queue.try_push(message) {
                // Full: the item comes back, retry with it
                message = rejected;
                backoff.snooze();
            }

            thread::sleep(Duration::from_millis(20));
        }
        println!("Producer finished!");
    });

    let consumer = thread::spawn(move || {
        for _ in 0..10 {
            let backoff = Backoff::new();
            loop {
                match consumer_queue.try_pop() {
                    Some(message) => {
                        println!("Received: {}", message);
                        break;
                    }
                    None => backoff.snooze(),
                }
            }
        }
        println!("Consumer finished!");
    });

    producer.join().unwrap();
    consumer.join().unwrap();

    assert!(queue.is_empty());
}
