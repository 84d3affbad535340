//! 内核各子系统的可调参数，集中在这里给出带文档的默认值（spec §1A 外部化配置）。
//!
//! 两个配置体分别对应 C4（线程宿主/异步队列）与 C5（命令缓冲管理器）；
//! 两者都实现 `Default`，调用方只需要覆盖自己关心的字段。

use std::time::Duration;

/// [`crate::thread::ThreadHost`] 的可调参数。
#[derive(Clone, Copy, Debug)]
pub struct ThreadHostConfig {
    /// 异步队列高水位线：超过后强制把 pending 环搬进 current 环并记录一条
    /// 日志，但入队调用本身依旧成功（默认 1024，对应 spec scenario 4）。
    pub high_water_mark: usize,
    /// 强制刷新后依然超限才会报错的硬性上限，远大于 `high_water_mark`，
    /// 只作为消费者彻底停滞时的兜底信号。
    pub hard_ceiling: usize,
    /// 异步任务 Join 默认超时；未显式传入超时时使用它。
    pub task_join_timeout: Duration,
}

impl Default for ThreadHostConfig {
    fn default() -> Self {
        Self {
            high_water_mark: 1024,
            hard_ceiling: 1 << 16,
            task_join_timeout: crate::sync_event::DEFAULT_JOIN_TIMEOUT,
        }
    }
}

/// [`crate::cmdbuf::CommandBufferManager`] 的可调参数。
#[derive(Clone, Copy, Debug)]
pub struct CommandBufferConfig {
    /// 环的长度（飞行中帧数），至少为 2（双缓冲）；默认 3（三重缓冲）。
    pub ring_length: usize,
    /// 栅栏等待的"节奏"预算：低于此值的等待被视为正常调度延迟，不记录警告。
    pub fence_wait_pacing_budget: Duration,
    /// 栅栏等待的硬性上限：超过此值即返回 `FenceWaitTimeout`，不论节奏预算如何。
    pub fence_wait_hard_timeout: Duration,
}

impl CommandBufferConfig {
    /// 构造前校验 `ring_length`，供需要显式处理非法配置的调用方使用。
    pub fn validated(self) -> Result<Self, &'static str> {
        if self.ring_length < 2 {
            return Err("ring_length must be at least 2");
        }
        Ok(self)
    }
}

impl Default for CommandBufferConfig {
    fn default() -> Self {
        Self {
            ring_length: 3,
            fence_wait_pacing_budget: Duration::from_millis(16),
            fence_wait_hard_timeout: Duration::from_secs(2),
        }
    }
}
