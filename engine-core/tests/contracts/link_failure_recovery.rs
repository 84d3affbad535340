//! scenario 5: a module whose link check depends on an external flag fails
//! `Link` until the dependency becomes available, then succeeds on retry
//! without having run its handler twice for the same attempt.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use engine_core::error::{codes, CoreError};
use engine_core::ids::TypeIdList;
use engine_core::module::{Module, ModuleBehavior, ModuleClassId, ModuleHandle, ModuleState};

struct DependsOnFlag {
    dependency_ready: Arc<std::sync::atomic::AtomicBool>,
    link_attempts: AtomicU32,
}

impl ModuleBehavior for DependsOnFlag {
    fn on_link(&self, _module: &ModuleHandle) -> Result<(), CoreError> {
        self.link_attempts.fetch_add(1, Ordering::SeqCst);
        if self.dependency_ready.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CoreError::new(codes::MISSING_DEPENDENCY, "sibling dependency not yet attached"))
        }
    }
}

#[test]
fn link_failure_recovers_once_dependency_is_satisfied() {
    let dependency_ready = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let behavior = Arc::new(DependsOnFlag {
        dependency_ready: dependency_ready.clone(),
        link_attempts: AtomicU32::new(0),
    });
    let module = Module::new(
        ModuleClassId(1),
        "dependent",
        behavior.clone() as Arc<dyn ModuleBehavior>,
        TypeIdList::empty(),
        TypeIdList::empty(),
        1,
        false,
    );

    let err = module.link().unwrap_err();
    assert_eq!(err.code(), codes::MISSING_DEPENDENCY);
    assert_eq!(module.state(), ModuleState::LinkingFailed);
    assert_eq!(behavior.link_attempts.load(Ordering::SeqCst), 1);

    let subscriptions_before = module.messages.len();

    dependency_ready.store(true, Ordering::SeqCst);
    // Retrying `Link` directly from `LinkingFailed` is legal (it is the one error
    // state `link()` re-enters without an explicit `reset()`); `ComposingFailed`
    // and `IncompleteAttachment` would require an explicit reset first.
    module.link().unwrap();
    assert_eq!(module.state(), ModuleState::Linked);
    assert_eq!(behavior.link_attempts.load(Ordering::SeqCst), 2);

    assert_eq!(module.messages.len(), subscriptions_before);
}
