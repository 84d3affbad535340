//! scenario 6: attaching to a module composed with `immutable=true` is
//! rejected and leaves the module's state and children untouched.

use std::sync::Arc;

use engine_core::error::codes;
use engine_core::ids::TypeIdList;
use engine_core::module::{Module, ModuleClassId, ModuleState, NoopBehavior};

#[test]
fn attach_after_immutable_compose_is_rejected() {
    let parent = Module::new(
        ModuleClassId(2),
        "parent",
        Arc::new(NoopBehavior),
        TypeIdList::empty(),
        TypeIdList::empty(),
        1,
        false,
    );
    parent.link().unwrap();
    parent.compose(true).unwrap();
    assert_eq!(parent.state(), ModuleState::ComposedImmutable);

    let child = Module::new(
        ModuleClassId(1),
        "child",
        Arc::new(NoopBehavior),
        TypeIdList::empty(),
        TypeIdList::empty(),
        1,
        false,
    );

    let err = parent.attach(Some("child".into()), child).unwrap_err();
    assert_eq!(err.code(), codes::INVALID_STATE);
    assert_eq!(parent.state(), ModuleState::ComposedImmutable);
    assert!(parent.children().is_empty());
}
