//! C4 — 线程宿主与跨线程异步队列。
//!
//! 每个参与调度的 OS 线程恰好承载一个 [`ThreadHost`]：一个拥有双环异步队列
//! （[`queue::AsyncQueue`]）的协作式更新循环，外加一棵以自身为根的模块子树
//! （挂载在 `host.module()` 下的 Task 子模块）。跨线程通信只能通过
//! [`ThreadHostHandle::push_async`] 完成——这是 spec §4.4 "only legal
//! cross-thread communication" 的唯一入口。

pub mod queue;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{JoinHandle, ThreadId};
use std::time::Duration;

use crate::config::ThreadHostConfig;
use crate::error::CoreError;
use crate::ids::TypeIdList;
use crate::module::{Module, ModuleBehavior, ModuleClassId, ModuleHandle, NoopBehavior};
use crate::sync_event::SyncEvent;

use queue::{AsyncJob, AsyncQueue};

/// 约定：线程宿主本身的模块类序号，高于它承载的普通 Task/资源模块，
/// 满足 invariant 4（manager 的类必须严格高于被管理者）。
pub const THREAD_HOST_CLASS: ModuleClassId = ModuleClassId(1_000_000);

/// 一个 OS 线程上的协作式调度宿主。
pub struct ThreadHost {
    module: ModuleHandle,
    queue: Arc<AsyncQueue>,
    cancelled: AtomicBool,
}

/// 可以跨线程克隆、传递给其它线程用来投递异步任务的句柄。
///
/// 它只暴露 `push_async`：拿到它的线程无法绕过队列直接触碰宿主线程上的模块树。
#[derive(Clone)]
pub struct ThreadHostHandle {
    thread_id: ThreadId,
    queue: Arc<AsyncQueue>,
}

impl ThreadHostHandle {
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// 从任意线程把一个闭包投递到这个句柄对应的目标线程；永不阻塞。
    pub fn push_async(&self, job: AsyncJob) -> Result<usize, CoreError> {
        self.queue.push(job)
    }
}

impl ThreadHost {
    /// 在调用线程上创建一个新的线程宿主；必须在目标 OS 线程内部调用
    /// （模块的 `thread_affinity` 在构造时捕获当前线程）。
    pub fn new_on_current_thread(debug_name: impl Into<Arc<str>>, config: ThreadHostConfig) -> Self {
        let module = Module::new(
            THREAD_HOST_CLASS,
            debug_name,
            Arc::new(NoopBehavior) as Arc<dyn ModuleBehavior>,
            TypeIdList::empty(),
            TypeIdList::empty(),
            1,
            true,
        );
        Self {
            module,
            queue: Arc::new(AsyncQueue::new(config.high_water_mark, config.hard_ceiling)),
            cancelled: AtomicBool::new(false),
        }
    }

    /// 生成一个新的 OS 线程，在其上构造 `ThreadHost` 并运行 `entry`。
    /// 对应 spec §6 "Platform thread spawn and join" 外部接口的具体实现。
    pub fn spawn(
        name: impl Into<String>,
        config: ThreadHostConfig,
        entry: impl FnOnce(Arc<ThreadHost>) + Send + 'static,
    ) -> std::io::Result<JoinHandle<()>> {
        let name = name.into();
        std::thread::Builder::new().name(name.clone()).spawn(move || {
            let host = Arc::new(ThreadHost::new_on_current_thread(name, config));
            entry(host);
        })
    }

    pub fn module(&self) -> &ModuleHandle {
        &self.module
    }

    pub fn thread_id(&self) -> ThreadId {
        self.module.thread_affinity()
    }

    /// 供其它线程持有的投递句柄；可以安全地跨线程 `Clone`。
    pub fn handle(&self) -> ThreadHostHandle {
        ThreadHostHandle {
            thread_id: self.thread_id(),
            queue: self.queue.clone(),
        }
    }

    /// 一次 Update tick：(a) 把 pending 环换入 current 环并执行，
    /// (b) 向子节点广播 `Update(delta_time)`。
    pub fn tick(self: &Arc<Self>, delta_time: Duration) -> usize {
        let executed = self.queue.drain_and_run();
        let _ = self.module.update(delta_time);
        executed
    }

    /// 关闭线程：先阻止后续入队，再做最后一次排空，再把全部子节点转入 Deleting。
    pub fn close(self: &Arc<Self>) {
        self.cancelled.store(true, Ordering::Release);
        self.queue.close_and_drain_once();
        for child in self.module.children() {
            let _ = child.delete();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// 把一次 Attach 请求投递到 `target` 所在线程上执行，并返回一个一次性事件
/// 供调用方在需要时同步等待完成（spec §4.3.3 "issues an async attach
/// request and optionally waits on a completion handle"）。
///
/// `target` 必须是 `parent` 的归属线程的句柄——Attach 的变更被建模为
/// "parent 一侧的单一原子操作"（spec invariant 2），因此请求总是路由到
/// parent 的线程上执行，不论调用方和 child 实际处在哪个线程。
pub fn request_attach_on_owning_thread(
    target: &ThreadHostHandle,
    parent: ModuleHandle,
    name: Option<String>,
    child: ModuleHandle,
) -> Result<Arc<SyncEvent>, CoreError> {
    let event = Arc::new(SyncEvent::new());
    let completion = event.clone();
    target.push_async(Box::new(move || {
        if let Err(err) = parent.attach(name, child) {
            crate::observability::dispatch(
                crate::observability::Level::Warn,
                "engine_core::thread",
                format_args!("async attach failed: code={}", err.code()),
            );
        }
        completion.signal();
    }))?;
    Ok(event)
}
