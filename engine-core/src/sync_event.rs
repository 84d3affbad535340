//! 一次性/手动重置的信号原语（spec §6 外部接口 "One-shot/manual-reset
//! signalling primitive"）。任务 Join 点与跨线程完成通知都构建在它之上，
//! 是唯一允许阻塞等待的地方——且总是带超时（spec §5 "Suspension points"）。

use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// 进程内一次性信号：`signal()` 可以被多次调用（幂等），`wait_timeout`
/// 在信号已经置位时立即返回，否则最多等待给定时长。
pub struct SyncEvent {
    state: Mutex<bool>,
    cond: Condvar,
}

/// §4.4 默认的任务 Join 超时上限。
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(60);

impl SyncEvent {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    /// 置位信号并唤醒所有等待者；对已置位的事件重复调用是无操作。
    pub fn signal(&self) {
        let mut signalled = self.state.lock().unwrap();
        if !*signalled {
            *signalled = true;
            self.cond.notify_all();
        }
    }

    /// 手动重置回未置位状态，供可重用的事件（而非一次性）使用。
    pub fn reset(&self) {
        *self.state.lock().unwrap() = false;
    }

    pub fn is_signalled(&self) -> bool {
        *self.state.lock().unwrap()
    }

    /// 阻塞等待信号置位，最多等待 `timeout`；返回 `true` 表示等到了信号，
    /// `false` 表示超时。
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let guard = self.state.lock().unwrap();
        if *guard {
            return true;
        }
        let (guard, result) = self.cond.wait_timeout(guard, timeout).unwrap();
        *guard || !result.timed_out()
    }
}

impl Default for SyncEvent {
    fn default() -> Self {
        Self::new()
    }
}
