//! C1 — 类型注册表：为每一种消息/事件负载类型提供稳定、全局唯一的标识。
//!
//! # 设计背景（Why）
//! - 调度器（C2）与模块（C3）都需要一个便宜、可比较、可哈希的"类型身份"，
//!   而不是在运行时反复做字符串匹配；[`TypeId`] 就是这唯一的权威来源。
//! - 原始工程使用模板元编程为每个消息类生成编译期常量 ID；Rust 里
//!   `std::any::TypeId` 已经提供等价的稳定性保证（同一进程内，同一并发类型
//!   永远映射到同一个值，const/volatile 在类型层面本就不存在，因此无需额外剥离）。
//!
//! # 契约（What）
//! - `type_id_of::<T>()` 纯、全、常数时间、不 panic；
//! - [`TypeIdList`] 在构造时去重并排序，`contains` 因而是 O(log n)。

use std::any::{type_name, TypeId as StdTypeId};
use std::fmt;

/// 不透明的类型标识，贯穿调度器订阅表与模块的消息/事件表面。
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId {
    inner: StdTypeId,
    name: &'static str,
}

impl fmt::Debug for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeId").field(&self.name).finish()
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl TypeId {
    /// 返回类型的可读名称，仅用于日志与诊断，不作为相等性判据。
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// 返回 `T` 的稳定类型标识；同一类型在进程内的任意调用点返回相同的值。
///
/// 引用与指针和它们指向的值被视作不同类型（`&T` 与 `T` 的 [`TypeId`] 不相等），
/// 与标准库 `TypeId::of` 的既有语义一致。
pub fn type_id_of<T: 'static>() -> TypeId {
    TypeId {
        inner: StdTypeId::of::<T>(),
        name: type_name::<T>(),
    }
}

/// 有序、去重的 [`TypeId`] 集合，在模块类初始化时从编译期类型列表构建一次，
/// 用于对外广播"我能接受/我能发出"哪些消息与事件（spec §3 "TypeIdList"）。
#[derive(Clone, Debug, Default)]
pub struct TypeIdList {
    ids: Vec<TypeId>,
}

impl TypeIdList {
    /// 从一组（可能重复的）类型标识构建去重、排序后的列表。
    pub fn from_ids(mut ids: Vec<TypeId>) -> Self {
        ids.sort_unstable();
        ids.dedup();
        Self { ids }
    }

    /// 返回空列表，对应"空消息表面"（spec §8 scenario 1）。
    pub fn empty() -> Self {
        Self { ids: Vec::new() }
    }

    /// O(log n) 成员测试。
    pub fn contains(&self, id: TypeId) -> bool {
        self.ids.binary_search(&id).is_ok()
    }

    /// `other` 中的每个 ID 是否都在 `self` 中；O(|other| · log|self|)。
    pub fn contains_all(&self, other: &TypeIdList) -> bool {
        other.ids.iter().all(|id| self.contains(*id))
    }

    pub fn iter(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.ids.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// 声明一个静态 [`TypeIdList`] 的构造辅助宏，对应 spec 中"编译期类型列表"的角色。
///
/// ```
/// use engine_core::{type_id_list, ids::TypeIdList};
/// struct Ping;
/// struct Pong;
/// let surface: TypeIdList = type_id_list![Ping, Pong];
/// assert_eq!(surface.len(), 2);
/// ```
#[macro_export]
macro_rules! type_id_list {
    ($($ty:ty),* $(,)?) => {
        $crate::ids::TypeIdList::from_ids(vec![$($crate::ids::type_id_of::<$ty>()),*])
    };
}
