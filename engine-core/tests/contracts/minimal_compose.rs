//! scenario 1: a thread hosting one child with an empty message surface goes
//! through Link -> Compose -> Update -> Delete without leaking the child.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use engine_core::config::ThreadHostConfig;
use engine_core::ids::TypeIdList;
use engine_core::module::{Module, ModuleBehavior, ModuleClassId, ModuleHandle, ModuleState};
use engine_core::thread::ThreadHost;

struct CountingUpdate {
    updates: AtomicU32,
}

impl ModuleBehavior for CountingUpdate {
    fn on_update(&self, _module: &ModuleHandle, _delta_time: Duration) {
        self.updates.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn minimal_compose_lifecycle_has_no_leaks() {
    let host = ThreadHost::new_on_current_thread("main", ThreadHostConfig::default());

    let child_behavior = Arc::new(CountingUpdate {
        updates: AtomicU32::new(0),
    });
    let child = Module::new(
        ModuleClassId(1),
        "child",
        child_behavior.clone() as Arc<dyn ModuleBehavior>,
        TypeIdList::empty(),
        TypeIdList::empty(),
        1,
        false,
    );
    let weak_child: Weak<_> = Arc::downgrade(&child);

    host.module().attach(Some("child".into()), child.clone()).unwrap();

    host.module().link().unwrap();
    assert_eq!(child.state(), ModuleState::Linked);

    host.module().compose(false).unwrap();
    assert_eq!(child.state(), ModuleState::ComposedMutable);

    host.tick(Duration::from_millis(16));
    assert_eq!(child_behavior.updates.load(Ordering::SeqCst), 1);

    host.module().delete().unwrap();
    assert_eq!(child.state(), ModuleState::Deleting);

    drop(child);
    assert!(weak_child.upgrade().is_none(), "child must be reclaimed once every strong reference is dropped");
}
