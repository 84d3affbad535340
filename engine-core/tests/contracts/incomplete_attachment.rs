//! A parent declares a required child class; `Link` (and, independently,
//! `Compose`) must transition to `IncompleteAttachment` rather than succeed
//! while that child is still absent, and must recover once it is attached.

use std::sync::Arc;

use engine_core::error::codes;
use engine_core::ids::TypeIdList;
use engine_core::module::{Module, ModuleBehavior, ModuleClassId, ModuleState, NoopBehavior};

const REQUIRED_CHILD_CLASS: ModuleClassId = ModuleClassId(42);

#[test]
fn link_fails_incomplete_until_the_required_child_is_attached() {
    let parent = Module::new(
        ModuleClassId(1),
        "parent",
        Arc::new(NoopBehavior) as Arc<dyn ModuleBehavior>,
        TypeIdList::empty(),
        TypeIdList::empty(),
        1,
        true,
    );
    parent.require_child_class(REQUIRED_CHILD_CLASS);

    let err = parent.link().unwrap_err();
    assert_eq!(err.code(), codes::INCOMPLETE_ATTACHMENT);
    assert_eq!(parent.state(), ModuleState::IncompleteAttachment);

    // Error states only permit a reset to Initial before retrying.
    parent.reset().unwrap();

    let child = Module::new(
        REQUIRED_CHILD_CLASS,
        "required-child",
        Arc::new(NoopBehavior) as Arc<dyn ModuleBehavior>,
        TypeIdList::empty(),
        TypeIdList::empty(),
        1,
        false,
    );
    parent.attach(None, child).unwrap();

    parent.link().unwrap();
    assert_eq!(parent.state(), ModuleState::Linked);
}

#[test]
fn compose_fails_incomplete_when_the_required_child_is_missing() {
    let parent = Module::new(
        ModuleClassId(2),
        "compose-parent",
        Arc::new(NoopBehavior) as Arc<dyn ModuleBehavior>,
        TypeIdList::empty(),
        TypeIdList::empty(),
        1,
        true,
    );
    parent.require_child_class(REQUIRED_CHILD_CLASS);
    parent.link().unwrap_err();
    parent.reset().unwrap();

    let child = Module::new(
        REQUIRED_CHILD_CLASS,
        "required-child",
        Arc::new(NoopBehavior) as Arc<dyn ModuleBehavior>,
        TypeIdList::empty(),
        TypeIdList::empty(),
        1,
        false,
    );
    parent.attach(None, child.clone()).unwrap();
    parent.link().unwrap();

    // Detach the required child again before compose: compose must re-check
    // the requirement independently of link having already passed it.
    parent.detach(&child).unwrap();
    let err = parent.compose(false).unwrap_err();
    assert_eq!(err.code(), codes::INCOMPLETE_ATTACHMENT);
    assert_eq!(parent.state(), ModuleState::IncompleteAttachment);
}
