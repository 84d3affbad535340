//! 双环异步队列：生产者在短临界区内写入 pending 环，消费者以 O(1) 把
//! pending 环整体换入 current 环，再在不持锁的情况下执行 current 环里的闭包。
//!
//! # 设计背景（Why）
//! - spec §4.4 要求"有界生产者延迟 + 消费者串行执行"：如果消费者在持锁状态下
//!   逐个执行闭包，生产者会被任意一个慢闭包挡住；双环结构把"搬运"和"执行"
//!   拆成两步，搬运是 O(1) 的指针交换，执行完全在锁外发生。
//! - 高水位线触发的强制刷新（force-flush）是一种背压阀门：生产者一旦把
//!   pending 环撑到阈值以上，立即把它们搬进 current 环，但**入队调用本身依旧成功
//!   返回**（spec 原文："the caller's enqueue still succeeds"）——不会向调用方
//!   报告 `QueueOverflow`。真正的 `QueueOverflow` 只在触达硬性上限（force-flush
//!   之后队列仍然超限，说明消费者彻底停滞）时才会出现。
//! - 在 `--cfg loom` 下整条队列改用 loom 的影子原语，好让模型检查器穷举
//!   `push`/`drain_and_run` 的线程交错（见 `tests/loom_concurrency.rs`，P5）；
//!   常规构建下是真正的 `parking_lot`/`std::sync::atomic`。

use std::collections::VecDeque;

use crate::error::{codes, CoreError, ErrorCategory};

#[cfg(loom)]
use loom::sync::{atomic::AtomicBool, atomic::Ordering, Mutex};
#[cfg(not(loom))]
use parking_lot::Mutex;
#[cfg(not(loom))]
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(loom)]
fn lock<T>(m: &Mutex<T>) -> loom::sync::MutexGuard<'_, T> {
    m.lock().unwrap()
}
#[cfg(not(loom))]
fn lock<T>(m: &Mutex<T>) -> parking_lot::MutexGuard<'_, T> {
    m.lock()
}

/// 一个异步消息：拥有自身参数的闭包，在目标线程上执行一次。
pub type AsyncJob = Box<dyn FnOnce() + Send>;

pub struct AsyncQueue {
    pending: Mutex<VecDeque<AsyncJob>>,
    current: Mutex<VecDeque<AsyncJob>>,
    high_water_mark: usize,
    hard_ceiling: usize,
    closed: AtomicBool,
}

impl AsyncQueue {
    pub fn new(high_water_mark: usize, hard_ceiling: usize) -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            current: Mutex::new(VecDeque::new()),
            high_water_mark,
            hard_ceiling,
            closed: AtomicBool::new(false),
        }
    }

    /// 从任意线程入队一个异步任务；永不阻塞，返回入队后 pending 环的深度。
    ///
    /// 当深度超过高水位线时立即强制把 pending 环搬进 current 环（调用方的
    /// 这次入队仍然成功）；只有在强制搬运后总深度依然超过硬性上限时，才
    /// 返回 `QueueOverflow`——这是消费者彻底停滞的兜底信号，不是常规背压。
    pub fn push(&self, job: AsyncJob) -> Result<usize, CoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CoreError::new(codes::QUEUE_OVERFLOW, "thread host is closing; no further enqueues accepted")
                .with_category(ErrorCategory::Cancelled));
        }
        let mut pending = lock(&self.pending);
        pending.push_back(job);
        let depth = pending.len();
        if depth > self.high_water_mark {
            let drained = std::mem::take(&mut *pending);
            drop(pending);
            let mut current = lock(&self.current);
            let total = current.len() + drained.len();
            current.extend(drained);
            drop(current);
            crate::observability::dispatch(
                crate::observability::Level::Warn,
                "engine_core::thread::queue",
                format_args!(
                    "force-flushing pending async queue: depth={depth} high_water_mark={}",
                    self.high_water_mark
                ),
            );
            if total > self.hard_ceiling {
                return Err(CoreError::new(
                    codes::QUEUE_OVERFLOW,
                    format!("queue depth {total} exceeded hard ceiling {} after forced flush", self.hard_ceiling),
                )
                .with_category(ErrorCategory::Budget));
            }
        }
        Ok(depth)
    }

    /// 消费者侧：把 pending 环整体换入 current 环（O(1)），再在不持锁的情况下
    /// 逐个执行 current 环里的闭包，最后清空 current 环。返回本次执行的任务数。
    pub fn drain_and_run(&self) -> usize {
        let swapped = {
            let mut pending = lock(&self.pending);
            std::mem::take(&mut *pending)
        };
        if !swapped.is_empty() {
            lock(&self.current).extend(swapped);
        }
        let jobs: Vec<AsyncJob> = std::mem::take(&mut *lock(&self.current)).into_iter().collect();
        let count = jobs.len();
        for job in jobs {
            job();
        }
        count
    }

    /// 关闭队列：阻止后续入队，并做最后一次排空（scenario：线程关闭流程）。
    pub fn close_and_drain_once(&self) -> usize {
        self.closed.store(true, Ordering::Release);
        self.drain_and_run()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
