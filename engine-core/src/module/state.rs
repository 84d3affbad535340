//! 模块生命周期状态机（spec §4.3.1）。
//!
//! 状态沿 `Initial → Linked → ComposedMutable/ComposedImmutable → Deleting` 单调推进；
//! `LinkingFailed`/`ComposingFailed`/`IncompleteAttachment` 是可恢复的错误态，只能回到
//! `Initial`（重新 Link）或 `Deleting`；`Deleting` 是终态。

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModuleState {
    Initial,
    Linked,
    ComposedMutable,
    ComposedImmutable,
    LinkingFailed,
    ComposingFailed,
    IncompleteAttachment,
    Deleting,
}

impl ModuleState {
    /// 是否处于"已组合"的两种终端可用态之一。
    pub fn is_composed(&self) -> bool {
        matches!(self, ModuleState::ComposedMutable | ModuleState::ComposedImmutable)
    }

    /// 是否为 §4.3.1 中列出的三个可恢复错误态之一。
    pub fn is_error_state(&self) -> bool {
        matches!(
            self,
            ModuleState::LinkingFailed | ModuleState::ComposingFailed | ModuleState::IncompleteAttachment
        )
    }

    /// 是否允许显式 reset 回 `Initial`。三个可恢复错误态都必须能通过 reset
    /// 回到 `Initial`（spec "error states may transition only to Initial or
    /// Deleting"），否则它们会成为死胡同。`ComposedImmutable` 只能转到
    /// `Deleting`，`Deleting` 是终态，二者都不允许 reset。
    pub fn allows_reset(&self) -> bool {
        !matches!(self, ModuleState::ComposedImmutable | ModuleState::Deleting)
    }
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ModuleState::Initial => "Initial",
            ModuleState::Linked => "Linked",
            ModuleState::ComposedMutable => "ComposedMutable",
            ModuleState::ComposedImmutable => "ComposedImmutable",
            ModuleState::LinkingFailed => "LinkingFailed",
            ModuleState::ComposingFailed => "ComposingFailed",
            ModuleState::IncompleteAttachment => "IncompleteAttachment",
            ModuleState::Deleting => "Deleting",
        };
        f.write_str(label)
    }
}
