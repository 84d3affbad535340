//! 高精度单调时钟（spec §6 外部接口），供 Update 的 delta-time 与任务超时使用。

use std::time::{Duration, Instant};

/// 单调时钟抽象；测试替身可以实现确定性的可控前进。
pub trait Clock: Send + Sync {
    /// 自某个固定但未指定的起点以来经过的时间，微秒级分辨率。
    fn now(&self) -> Duration;
}

/// 基于 `std::time::Instant` 的默认实现。
pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self { epoch: Instant::now() }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }
}

/// 测试用可控时钟：每次 `advance` 把时间向前推进指定量。
#[cfg(any(test, feature = "test-util"))]
pub struct ManualClock {
    elapsed: std::sync::atomic::AtomicU64,
}

#[cfg(any(test, feature = "test-util"))]
impl ManualClock {
    pub fn new() -> Self {
        Self {
            elapsed: std::sync::atomic::AtomicU64::new(0),
        }
    }

    pub fn advance(&self, delta: Duration) {
        self.elapsed
            .fetch_add(delta.as_micros() as u64, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(any(test, feature = "test-util"))]
impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_micros(self.elapsed.load(std::sync::atomic::Ordering::SeqCst))
    }
}
