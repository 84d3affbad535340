//! C2 — 消息分发器：每个模块持有一份从 [`TypeId`] 到有序订阅列表的映射。
//!
//! # 设计背景（Why）
//! - spec §4.2 要求"快照后释放锁再调用 handler"，这样 handler 内部再次调用
//!   `send`（depth-first 重入）不会在同一把锁上死锁，也不会让另一线程在
//!   handler 执行期间看到不一致的订阅表。
//! - 订阅者是弱引用：模块删除/分离后，残留的订阅不应该让已经死掉的模块
//!   继续被"调用"——`send` 在调用前用 [`SubscriberRef::is_alive`] 过滤一次。
//!
//! # 契约（What）
//! - `subscribe` 对不在声明表面内的 TypeID 返回 `UnsupportedMessage`；
//! - 同一 `(TypeID, subscriber, handler 地址)` 三元组重复订阅时替换旧条目，
//!   其余条目的插入顺序不变；
//! - `send` 返回值表示"是否至少有一个 handler 被调用"。

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use std::collections::HashMap;

use crate::error::{codes, CoreError, ErrorCategory};
use crate::ids::{type_id_of, TypeId, TypeIdList};

/// 模块实例的稳定数字身份，贯穿订阅表的增删与比较。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// 分配一个进程内唯一的新身份。每个模块实例在构造时调用一次。
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// 订阅者的弱引用：携带稳定身份 + 一个用于存活探测的弱标记。
///
/// `alive` 通常来自订阅者内部持有的 `Arc<()>` 哨兵；当订阅者被删除时该哨兵
/// 被释放，`is_alive()` 随即返回 `false`，`send` 会跳过该条目而不是调用到
/// 悬空状态。
#[derive(Clone)]
pub struct SubscriberRef {
    id: SubscriberId,
    alive: Weak<()>,
}

impl SubscriberRef {
    pub fn new(id: SubscriberId, alive: Weak<()>) -> Self {
        Self { id, alive }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn is_alive(&self) -> bool {
        self.alive.strong_count() > 0
    }
}

/// 不捕获状态的裸函数指针，对应 spec 中"handler function pointer"。
/// 第二个参数是调用方在订阅时附带的不透明用户数据。
pub type RawHandler = fn(payload: &dyn Any, user_data: Option<&(dyn Any + Send + Sync)>);

#[derive(Clone)]
struct Subscription {
    subscriber: SubscriberRef,
    handler: RawHandler,
    user_data: Option<Arc<dyn Any + Send + Sync>>,
}

fn handler_addr(handler: RawHandler) -> usize {
    handler as usize
}

/// 每个模块持有一份的订阅表。
#[derive(Default)]
pub struct Dispatcher {
    table: Mutex<HashMap<TypeId, Vec<Subscription>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(HashMap::new()),
        }
    }

    /// 为 `type_id` 注册一个订阅；`type_id` 必须在 `valid_types` 声明的表面内。
    pub fn subscribe(
        &self,
        valid_types: &TypeIdList,
        type_id: TypeId,
        subscriber: SubscriberRef,
        handler: RawHandler,
        user_data: Option<Arc<dyn Any + Send + Sync>>,
    ) -> Result<(), CoreError> {
        if !valid_types.contains(type_id) {
            return Err(CoreError::new(
                codes::UNSUPPORTED_MESSAGE,
                format!("type `{type_id}` is not in the declared message surface"),
            )
            .with_category(ErrorCategory::Permanent));
        }
        let mut table = self.table.lock();
        let entries = table.entry(type_id).or_default();
        let addr = handler_addr(handler);
        if let Some(existing) = entries
            .iter_mut()
            .find(|e| e.subscriber.id() == subscriber.id() && handler_addr(e.handler) == addr)
        {
            existing.user_data = user_data;
        } else {
            entries.push(Subscription {
                subscriber,
                handler,
                user_data,
            });
        }
        Ok(())
    }

    /// 移除所有属于 `subscriber` 的订阅；返回移除的条目数。
    pub fn unsubscribe_all(&self, subscriber: SubscriberId) -> usize {
        let mut removed = 0;
        let mut table = self.table.lock();
        for entries in table.values_mut() {
            let before = entries.len();
            entries.retain(|e| e.subscriber.id() != subscriber);
            removed += before - entries.len();
        }
        table.retain(|_, v| !v.is_empty());
        removed
    }

    /// 把 `from` 在本分发器上、针对 `ids` 中每个类型的订阅原样拷贝到 `dest`，
    /// 要求 `dest_valid_types` 接受每一个被拷贝的类型（目标表面白名单）。
    ///
    /// 用于"包装子模块并对外重新暴露其消息表面"的场景（spec 4.2 design notes）：
    /// 这是一次性的批量拷贝，不是代理转发——拷贝之后两张表各自独立演进。
    pub fn copy_subscriptions(
        &self,
        from: SubscriberId,
        dest_valid_types: &TypeIdList,
        dest: &Dispatcher,
        ids: &[TypeId],
    ) -> Result<(), CoreError> {
        let table = self.table.lock();
        let mut to_copy: Vec<(TypeId, Subscription)> = Vec::new();
        for &id in ids {
            let found = table
                .get(&id)
                .and_then(|entries| entries.iter().find(|e| e.subscriber.id() == from).cloned());
            match found {
                Some(sub) => to_copy.push((id, sub)),
                None => {
                    return Err(CoreError::new(
                        codes::MISSING_DEPENDENCY,
                        format!("no subscription for `{id}` found on source dispatcher"),
                    ))
                }
            }
        }
        drop(table);
        for (id, sub) in to_copy {
            if !dest_valid_types.contains(id) {
                return Err(CoreError::new(
                    codes::UNSUPPORTED_MESSAGE,
                    format!("type `{id}` is not in the destination's declared surface"),
                ));
            }
            let mut dest_table = dest.table.lock();
            dest_table.entry(id).or_default().push(sub);
        }
        Ok(())
    }

    /// 同步派发 `payload`：快照匹配的订阅列表、释放锁，再按注册顺序逐个调用。
    /// 返回值表示是否至少有一个存活的 handler 被调用。
    pub fn send<P: Any>(&self, payload: &P) -> bool {
        let tid = type_id_of::<P>();
        let snapshot = {
            let table = self.table.lock();
            table.get(&tid).cloned().unwrap_or_default()
        };
        let mut invoked = false;
        for sub in &snapshot {
            if sub.subscriber.is_alive() {
                (sub.handler)(payload, sub.user_data.as_deref());
                invoked = true;
            }
        }
        invoked
    }

    /// 移除所有订阅（模块删除时调用）。
    pub fn clear(&self) {
        self.table.lock().clear();
    }

    /// 当前订阅总数，供测试断言用。
    pub fn len(&self) -> usize {
        self.table.lock().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
