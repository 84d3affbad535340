//! scenario 4: a burst of 2000 async messages from a single source thread is
//! observed exactly once, in FIFO order, at the consumer thread, without a
//! `QueueOverflow` surfacing to the caller even though the burst exceeds the
//! default high-water mark.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use engine_core::config::ThreadHostConfig;
use engine_core::thread::ThreadHost;

#[test]
fn burst_of_2000_async_messages_is_delivered_fifo_without_overflow() {
    const MESSAGE_COUNT: u64 = 2000;

    let stop = Arc::new(AtomicBool::new(false));
    let stop_clone = stop.clone();
    let (ready_tx, ready_rx) = mpsc::channel();

    let host = ThreadHost::spawn("consumer", ThreadHostConfig::default(), move |host| {
        ready_tx.send(host.handle()).unwrap();
        // Simulate a thread that is busy with its own update pass between ticks.
        while !stop_clone.load(Ordering::Acquire) {
            host.tick(Duration::from_millis(1));
            std::thread::sleep(Duration::from_millis(2));
        }
        host.close();
    })
    .unwrap();

    let handle = ready_rx.recv_timeout(Duration::from_secs(5)).unwrap();

    let (observed_tx, observed_rx) = mpsc::channel::<u64>();
    for i in 0..MESSAGE_COUNT {
        let observed_tx = observed_tx.clone();
        handle
            .push_async(Box::new(move || observed_tx.send(i).unwrap()))
            .expect("a burst below the hard ceiling must never surface QueueOverflow to the caller");
    }

    let mut observed = Vec::with_capacity(MESSAGE_COUNT as usize);
    for _ in 0..MESSAGE_COUNT {
        observed.push(observed_rx.recv_timeout(Duration::from_secs(10)).unwrap());
    }

    assert_eq!(observed, (0..MESSAGE_COUNT).collect::<Vec<_>>());

    stop.store(true, Ordering::Release);
    host.join().unwrap();
}
