//! scenario 2: thread A hosts a parent module; thread B hosts a child module.
//! An attach request issued from the test thread is routed to the parent's
//! owning thread (A) and is observed to complete on both sides.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use engine_core::config::ThreadHostConfig;
use engine_core::ids::TypeIdList;
use engine_core::module::{Module, ModuleClassId, ModuleHandle, NoopBehavior};
use engine_core::thread::{request_attach_on_owning_thread, ThreadHost, ThreadHostHandle};

/// Drives a freshly spawned `ThreadHost` until `stop` is requested, ticking
/// frequently enough to drain async jobs pushed onto it promptly.
fn run_until_stopped(host: Arc<ThreadHost>, stop: Arc<AtomicBool>) {
    while !stop.load(Ordering::Acquire) {
        host.tick(Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(1));
    }
    host.close();
}

#[test]
fn attach_across_threads_round_trips_through_the_owning_thread() {
    let stop_a = Arc::new(AtomicBool::new(false));
    let stop_b = Arc::new(AtomicBool::new(false));

    let (tx_a, rx_a) = mpsc::channel::<(ModuleHandle, ThreadHostHandle)>();
    let stop_a_clone = stop_a.clone();
    let thread_a = ThreadHost::spawn("thread-a", ThreadHostConfig::default(), move |host| {
        let parent = Module::new(
            ModuleClassId(2),
            "parent",
            Arc::new(NoopBehavior),
            TypeIdList::empty(),
            TypeIdList::empty(),
            1,
            false,
        );
        host.module().attach(Some("parent".into()), parent.clone()).unwrap();
        tx_a.send((parent, host.handle())).unwrap();
        run_until_stopped(host, stop_a_clone);
    })
    .unwrap();

    let (tx_b, rx_b) = mpsc::channel::<ModuleHandle>();
    let stop_b_clone = stop_b.clone();
    let thread_b = ThreadHost::spawn("thread-b", ThreadHostConfig::default(), move |host| {
        let child = Module::new(
            ModuleClassId(1),
            "child",
            Arc::new(NoopBehavior),
            TypeIdList::empty(),
            TypeIdList::empty(),
            4,
            false,
        );
        host.module().attach(Some("child".into()), child.clone()).unwrap();
        tx_b.send(child).unwrap();
        run_until_stopped(host, stop_b_clone);
    })
    .unwrap();

    let (parent, handle_a) = rx_a.recv_timeout(Duration::from_secs(5)).unwrap();
    let child = rx_b.recv_timeout(Duration::from_secs(5)).unwrap();

    let completion = request_attach_on_owning_thread(&handle_a, parent.clone(), Some("attached-child".into()), child.clone())
        .unwrap();
    assert!(
        completion.wait_timeout(Duration::from_secs(5)),
        "attach request did not complete before the timeout"
    );

    assert!(parent.children().iter().any(|c| Arc::ptr_eq(c, &child)));
    assert!(child.parents().iter().any(|p| Arc::ptr_eq(p, &parent)));

    stop_a.store(true, Ordering::Release);
    stop_b.store(true, Ordering::Release);
    thread_a.join().unwrap();
    thread_b.join().unwrap();
}
