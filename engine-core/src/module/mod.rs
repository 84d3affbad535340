//! C3 — Module：组合的基本单元。
//!
//! # 设计背景（Why）
//! - spec §3/§4.3 把模块的关系严格分成三种：`children`（强引用，独占所有权）、
//!   `parents`（弱引用，仅用于事件上溯）、`manager`（弱引用，至多一个，充当调度/容器）。
//!   把这三种关系分开存放并各自加锁，而不是合并成一张邻接表，是为了让 P2/P3
//!   （边对称性、无反向强引用导致的内存泄漏）能够直接从类型系统读出来，而不必
//!   依赖运行时断言。
//! - 生命周期状态机（[`state::ModuleState`]）与关系变更（Attach/Detach/Manager）
//!   是分开的两套不变量；把它们放在同一个 `Module` 结构体里、但各自用短临界区
//!   的锁保护，可以避免"改关系的同时状态跑飞"的竞态，又不必引入一把大锁。
//!
//! # 契约（What）
//! - 所有变更类操作（Attach/Detach/Link/Compose/Update/Delete）只在模块的
//!   `thread_affinity` 线程上合法；调用方应通过 C4 的线程宿主把跨线程请求
//!   转换成该线程上的异步消息（见 `crate::thread`）。

pub mod state;

use std::fmt;
use std::sync::{Arc, Weak};
use std::thread::ThreadId;
use std::time::Duration;

use parking_lot::Mutex;

use crate::dispatch::{Dispatcher, SubscriberId, SubscriberRef};
use crate::error::{codes, CoreError};
use crate::ids::TypeIdList;

pub use state::ModuleState;

/// 模块类标识：一个在编译期约定的总序，用于 invariant 4 ——
/// "一个模块的 manager 的类必须严格 '高于' 自身的类"，以此杜绝 manager 成环。
///
/// 约定：数值越大，代表的模块在组合关系中越"靠近根"（例如线程宿主、GPU 设备）。
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleClassId(pub u64);

/// 每个模块实现的行为钩子；默认什么都不做，对应 spec "every module implements
/// these core handlers; defaults provided"。
pub trait ModuleBehavior: Send + Sync {
    /// Link 阶段的依赖解析；失败返回 `CoreError`，模块随之转入 `LinkingFailed`。
    fn on_link(&self, _module: &ModuleHandle) -> Result<(), CoreError> {
        Ok(())
    }

    /// Compose 阶段的合成检查；失败返回 `CoreError`，模块随之转入 `ComposingFailed`。
    fn on_compose(&self, _module: &ModuleHandle, _immutable: bool) -> Result<(), CoreError> {
        Ok(())
    }

    /// 每帧/每 tick 的更新；仅在 composed 态下被调用。
    fn on_update(&self, _module: &ModuleHandle, _delta_time: Duration) {}

    /// manager 指针发生变化时的通知；实现应在此丢弃对旧 manager 的订阅。
    fn on_manager_changed(
        &self,
        _module: &ModuleHandle,
        _old: Option<ModuleHandle>,
        _new: Option<ModuleHandle>,
    ) {
    }

    /// 本模块类是否声明为全局（或线程内）唯一，对应原始实现中
    /// `GModID::_ID`/`TModID::_ID` 标签位掩码命中的模块类：即便父节点的
    /// `multi_attachment=true`，这一类子模块在同一个父节点下也至多只能
    /// 出现一次。默认 `false`，与其余模块类一样只受 `multi_attachment` 约束。
    fn is_globally_unique_class(&self) -> bool {
        false
    }
}

/// 不做任何事的默认行为，供只需要容器语义（没有自定义逻辑）的模块使用。
#[derive(Default)]
pub struct NoopBehavior;
impl ModuleBehavior for NoopBehavior {}

/// 模块在父节点的 `children` 表中的一条边：可选名字 + 独占所有权的强引用。
struct ChildEdge {
    name: Option<String>,
    child: ModuleHandle,
}

/// `OnModuleAttached` 事件负载。
#[derive(Clone)]
pub struct OnModuleAttached {
    pub parent: ModuleHandle,
    pub child: ModuleHandle,
}

/// `OnModuleDetached` 事件负载。`is_last` 仅在多重挂载的最后一份副本被移除时为 `true`。
#[derive(Clone)]
pub struct OnModuleDetached {
    pub parent: ModuleHandle,
    pub child: ModuleHandle,
    pub is_last: bool,
}

/// 组合图中的一个节点。始终通过 [`ModuleHandle`]（`Arc<Module>`）传递。
pub struct Module {
    module_id: ModuleClassId,
    debug_name: Arc<str>,
    thread_affinity: ThreadId,
    max_parents: usize,
    multi_attachment: bool,
    message_surface: TypeIdList,
    event_surface: TypeIdList,
    behavior: Arc<dyn ModuleBehavior>,

    /// 本模块作为消息接收方的订阅表（同步 `send`）。
    pub messages: Dispatcher,
    /// 本模块作为事件发送方时，订阅者登记在这张表上。
    pub events: Dispatcher,

    state: Mutex<ModuleState>,
    children: Mutex<Vec<ChildEdge>>,
    parents: Mutex<Vec<Weak<Module>>>,
    manager: Mutex<Option<Weak<Module>>>,
    /// 子模块类，必须在 Link/Compose 之前挂载，否则转入 `IncompleteAttachment`。
    required_children: Mutex<Vec<ModuleClassId>>,

    /// 本模块的存活哨兵；别的模块订阅本模块时，持有它的 `Weak`。
    alive: Arc<()>,
    subscriber_id: SubscriberId,
}

pub type ModuleHandle = Arc<Module>;

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("module_id", &self.module_id.0)
            .field("debug_name", &self.debug_name)
            .field("state", &*self.state.lock())
            .finish()
    }
}

impl Module {
    /// 在当前线程上创建一个新模块；`thread_affinity` 被捕获为当前线程 ID。
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        module_id: ModuleClassId,
        debug_name: impl Into<Arc<str>>,
        behavior: Arc<dyn ModuleBehavior>,
        message_surface: TypeIdList,
        event_surface: TypeIdList,
        max_parents: usize,
        multi_attachment: bool,
    ) -> ModuleHandle {
        assert!(max_parents >= 1, "max_parents must be at least 1");
        Arc::new(Module {
            module_id,
            debug_name: debug_name.into(),
            thread_affinity: std::thread::current().id(),
            max_parents,
            multi_attachment,
            message_surface,
            event_surface,
            behavior,
            messages: Dispatcher::new(),
            events: Dispatcher::new(),
            state: Mutex::new(ModuleState::Initial),
            children: Mutex::new(Vec::new()),
            parents: Mutex::new(Vec::new()),
            manager: Mutex::new(None),
            required_children: Mutex::new(Vec::new()),
            alive: Arc::new(()),
            subscriber_id: SubscriberId::next(),
        })
    }

    pub fn module_id(&self) -> ModuleClassId {
        self.module_id
    }

    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }

    pub fn thread_affinity(&self) -> ThreadId {
        self.thread_affinity
    }

    pub fn state(&self) -> ModuleState {
        *self.state.lock()
    }

    pub fn message_surface(&self) -> &TypeIdList {
        &self.message_surface
    }

    pub fn event_surface(&self) -> &TypeIdList {
        &self.event_surface
    }

    pub fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    /// 本模块作为订阅者出现在别处分发表中时使用的弱引用。
    pub fn as_subscriber_ref(&self) -> SubscriberRef {
        SubscriberRef::new(self.subscriber_id, Arc::downgrade(&self.alive))
    }

    /// 声明一个在 Link/Compose 之前必须挂载的子模块类。缺失时 Link/Compose
    /// 转入 `IncompleteAttachment` 而不是 `Linked`/`Composed*`（spec §4.3.3）。
    pub fn require_child_class(&self, module_id: ModuleClassId) {
        let mut required = self.required_children.lock();
        if !required.contains(&module_id) {
            required.push(module_id);
        }
    }

    /// 所有声明的必需子模块类当前是否都已挂载。
    fn has_all_required_children(&self) -> bool {
        let required = self.required_children.lock();
        if required.is_empty() {
            return true;
        }
        let children = self.children.lock();
        required
            .iter()
            .all(|class| children.iter().any(|e| e.child.module_id() == *class))
    }

    /// 大多数操作都要求调用方当前就在模块的归属线程上；不满足时返回 `InvalidState`。
    fn assert_affinity(&self) -> Result<(), CoreError> {
        if std::thread::current().id() != self.thread_affinity {
            return Err(self.err(codes::INVALID_STATE, "operation called off the module's affinity thread"));
        }
        Ok(())
    }

    fn err(&self, code: &'static str, message: impl Into<std::borrow::Cow<'static, str>>) -> CoreError {
        CoreError::new(code, message).with_module(self.debug_name.to_string())
    }

    // ---------------------------------------------------------------- lifecycle

    /// 驱动 Initial → Linked。幂等：已处于 Linked/Composed* 时直接返回成功（L1）。
    pub fn link(self: &ModuleHandle) -> Result<(), CoreError> {
        self.assert_affinity()?;
        let mut state = self.state.lock();
        match *state {
            ModuleState::Linked | ModuleState::ComposedMutable | ModuleState::ComposedImmutable => {
                return Ok(())
            }
            ModuleState::Deleting => {
                return Err(self.err(codes::INVALID_STATE, "module is deleting"))
            }
            ModuleState::Initial | ModuleState::LinkingFailed => {}
            ModuleState::ComposingFailed | ModuleState::IncompleteAttachment => {
                // 错误态只能先显式 reset 回 Initial 才能重新 Link。
                return Err(self.err(codes::INVALID_STATE, "must reset before re-linking"));
            }
        }
        drop(state);
        if !self.has_all_required_children() {
            *self.state.lock() = ModuleState::IncompleteAttachment;
            return Err(self.err(codes::INCOMPLETE_ATTACHMENT, "a required child class is not attached"));
        }
        match self.behavior.on_link(self) {
            Ok(()) => {
                *self.state.lock() = ModuleState::Linked;
                for child in self.children.lock().iter() {
                    let _ = child.child.link();
                }
                Ok(())
            }
            Err(e) => {
                *self.state.lock() = ModuleState::LinkingFailed;
                crate::observability::dispatch(
                    crate::observability::Level::Warn,
                    "engine_core::module",
                    format_args!("link failed: module={} code={}", self.debug_name, e.code()),
                );
                Err(e)
            }
        }
    }

    /// 驱动 Linked → ComposedMutable/ComposedImmutable。幂等于已达到的目标态（L2）。
    pub fn compose(self: &ModuleHandle, immutable: bool) -> Result<(), CoreError> {
        self.assert_affinity()?;
        {
            let state = *self.state.lock();
            match state {
                ModuleState::ComposedMutable if !immutable => return Ok(()),
                ModuleState::ComposedImmutable if immutable => return Ok(()),
                ModuleState::ComposedMutable | ModuleState::ComposedImmutable => {
                    return Err(self.err(codes::INVALID_STATE, "already composed with different mutability"))
                }
                ModuleState::Linked => {}
                ModuleState::Deleting => return Err(self.err(codes::INVALID_STATE, "module is deleting")),
                _ => return Err(self.err(codes::INVALID_STATE, "compose requires Linked state")),
            }
        }
        if !self.has_all_required_children() {
            *self.state.lock() = ModuleState::IncompleteAttachment;
            return Err(self.err(codes::INCOMPLETE_ATTACHMENT, "a required child class is not attached"));
        }
        match self.behavior.on_compose(self, immutable) {
            Ok(()) => {
                let target = if immutable {
                    ModuleState::ComposedImmutable
                } else {
                    ModuleState::ComposedMutable
                };
                *self.state.lock() = target;
                for child in self.children.lock().iter() {
                    let _ = child.child.compose(immutable);
                }
                Ok(())
            }
            Err(e) => {
                *self.state.lock() = ModuleState::ComposingFailed;
                crate::observability::dispatch(
                    crate::observability::Level::Warn,
                    "engine_core::module",
                    format_args!("compose failed: module={} code={}", self.debug_name, e.code()),
                );
                Err(e)
            }
        }
    }

    /// 显式重置回 `Initial`；只允许从 Initial/Linked/ComposedMutable 触发
    /// （典型场景：关键子模块被重新挂载，需要重新走一次 Link/Compose）。
    pub fn reset(&self) -> Result<(), CoreError> {
        self.assert_affinity()?;
        let mut state = self.state.lock();
        if !state.allows_reset() {
            return Err(self.err(codes::INVALID_STATE, "reset not allowed from current state"));
        }
        *state = ModuleState::Initial;
        Ok(())
    }

    /// 驱动 * → Deleting：分离全部子节点、从所有父节点与 manager 上分离自身、
    /// 清空两张分发表。对已经在 Deleting 的模块是无操作。
    pub fn delete(self: &ModuleHandle) -> Result<(), CoreError> {
        if self.state() == ModuleState::Deleting {
            return Ok(());
        }
        self.assert_affinity()?;
        let children: Vec<ModuleHandle> = self.children.lock().iter().map(|e| e.child.clone()).collect();
        for child in children {
            let _ = self.detach(&child);
            let _ = child.delete();
        }
        for parent in self.parents.lock().drain(..).collect::<Vec<_>>() {
            if let Some(parent) = parent.upgrade() {
                let _ = parent.detach(self);
            }
        }
        *self.manager.lock() = None;
        self.messages.clear();
        self.events.clear();
        *self.state.lock() = ModuleState::Deleting;
        Ok(())
    }

    // ---------------------------------------------------------------- attach/detach

    /// 挂载一个子模块；父节点处于 `ComposedImmutable` 时拒绝。
    pub fn attach(self: &ModuleHandle, name: Option<String>, child: ModuleHandle) -> Result<(), CoreError> {
        self.assert_affinity()?;
        if self.state() == ModuleState::ComposedImmutable {
            return Err(self.err(codes::INVALID_STATE, "cannot attach to an immutable composed module"));
        }
        if !self.multi_attachment {
            let already = self
                .children
                .lock()
                .iter()
                .any(|e| Arc::ptr_eq(&e.child, &child));
            if already {
                return Err(self.err(codes::ATTACHMENT_CYCLE, "child already attached and multi_attachment is disabled"));
            }
        }
        // 即便 multi_attachment=true，声明为全局唯一的模块类在同一个父节点下
        // 也至多只能出现一次（原始实现里的 GModID::_ID/TModID::_ID 位掩码）。
        if child.behavior.is_globally_unique_class() {
            let same_class_already = self
                .children
                .lock()
                .iter()
                .any(|e| e.child.module_id() == child.module_id());
            if same_class_already {
                return Err(self.err(
                    codes::ATTACHMENT_CYCLE,
                    "child's module class is declared globally unique and is already attached",
                ));
            }
        }
        if child.parents.lock().len() >= child.max_parents {
            return Err(self.err(codes::ATTACHMENT_CYCLE, "child has reached its max_parents limit"));
        }

        child.parents.lock().push(Arc::downgrade(self));
        self.children.lock().push(ChildEdge {
            name,
            child: child.clone(),
        });

        let event = OnModuleAttached {
            parent: self.clone(),
            child: child.clone(),
        };
        let siblings = self.children();
        for sibling in &siblings {
            sibling.messages.send(&event);
        }
        self.events.send(&event);
        Ok(())
    }

    /// 分离一个子模块。若本模块允许多重挂载，移除该子模块的全部副本，
    /// 每移除一份即广播一次 `OnModuleDetached`，只有最后一份的 `is_last=true`。
    ///
    /// 每次移除后重新扫描子节点列表（而不是一次性收集全部下标），以便吸收
    /// handler 在事件回调中再次触发的挂载/分离（见 spec §9 的 open question，
    /// 本实现采用"吸收重入"的安全读法）。
    pub fn detach(self: &ModuleHandle, child: &ModuleHandle) -> Result<(), CoreError> {
        self.assert_affinity()?;
        loop {
            let idx = self
                .children
                .lock()
                .iter()
                .position(|e| Arc::ptr_eq(&e.child, child));
            let Some(idx) = idx else { break };

            let remaining_after = {
                let children = self.children.lock();
                children
                    .iter()
                    .filter(|e| Arc::ptr_eq(&e.child, child))
                    .count()
                    - 1
            };
            let is_last = remaining_after == 0;

            let event = OnModuleDetached {
                parent: self.clone(),
                child: child.clone(),
                is_last,
            };
            let siblings = self.children();
            for sibling in &siblings {
                sibling.messages.send(&event);
            }
            self.events.send(&event);

            self.children.lock().remove(idx);
            // 只移除一份对应的父边（多重挂载时 child.parents 里可能有多份指向
            // 同一个 parent 的弱引用，每次 detach 只对消一份，保持 P2 边对称性）。
            let mut parents = child.parents.lock();
            if let Some(pidx) = parents
                .iter()
                .position(|p| matches!(p.upgrade(), Some(parent) if Arc::ptr_eq(&parent, self)))
            {
                parents.remove(pidx);
            }
            drop(parents);

            if !self.multi_attachment || is_last {
                break;
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------- manager

    /// 设置（或清除）本模块的 manager；manager 的类必须严格高于本模块的类
    /// （invariant 4），否则返回 `AttachmentCycle`。
    pub fn set_manager(self: &ModuleHandle, manager: Option<ModuleHandle>) -> Result<(), CoreError> {
        self.assert_affinity()?;
        if let Some(m) = &manager {
            if m.module_id() <= self.module_id() {
                return Err(self.err(
                    codes::ATTACHMENT_CYCLE,
                    "manager's module class must be strictly above this module's class",
                ));
            }
        }
        let old = self.manager.lock().as_ref().and_then(Weak::upgrade);
        *self.manager.lock() = manager.as_ref().map(Arc::downgrade);
        self.behavior.on_manager_changed(self, old, manager);
        Ok(())
    }

    pub fn manager(&self) -> Option<ModuleHandle> {
        self.manager.lock().as_ref().and_then(Weak::upgrade)
    }

    pub fn parents(&self) -> Vec<ModuleHandle> {
        self.parents.lock().iter().filter_map(Weak::upgrade).collect()
    }

    pub fn children(&self) -> Vec<ModuleHandle> {
        self.children.lock().iter().map(|e| e.child.clone()).collect()
    }

    // ---------------------------------------------------------------- queries

    /// 按名字在直接子节点中查找（不递归，不修改任何状态）。
    pub fn find_module(&self, name: &str) -> Option<ModuleHandle> {
        self.children
            .lock()
            .iter()
            .find(|e| e.name.as_deref() == Some(name))
            .map(|e| e.child.clone())
    }

    /// 按模块类 ID 在直接子节点中查找。
    pub fn find_module_by_id(&self, module_id: ModuleClassId) -> Option<ModuleHandle> {
        self.children
            .lock()
            .iter()
            .find(|e| e.child.module_id() == module_id)
            .map(|e| e.child.clone())
    }

    /// 深度优先遍历整棵子树，在第一个满足 `predicate` 的模块处提前返回。
    pub fn modules_deep_search(&self, predicate: &impl Fn(&ModuleHandle) -> bool) -> Option<ModuleHandle> {
        for child in self.children.lock().iter() {
            if predicate(&child.child) {
                return Some(child.child.clone());
            }
            if let Some(found) = child.child.modules_deep_search(predicate) {
                return Some(found);
            }
        }
        None
    }

    // ---------------------------------------------------------------- update

    /// 仅在 composed 态下合法；调用自身的 `on_update` 钩子后广播给全部子节点。
    pub fn update(self: &ModuleHandle, delta_time: Duration) -> Result<(), CoreError> {
        if !self.state().is_composed() {
            return Err(self.err(codes::INVALID_STATE, "update requires a composed state"));
        }
        self.behavior.on_update(self, delta_time);
        for child in self.children.lock().iter() {
            let _ = child.child.update(delta_time);
        }
        Ok(())
    }
}
