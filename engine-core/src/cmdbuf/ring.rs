//! 帧环：长度 N（默认 3）的飞行中帧记录环，支持强制刷新（spec §4.5.2/§8
//! scenario 3 "frame rotation"）。与 [`crate::thread::queue::AsyncQueue`]
//! 的双环设计同源，但这里环里放的是帧记录而不是待执行闭包。

use std::collections::VecDeque;

use crate::backend::{CommandBufferHandle, FenceHandle, FramebufferHandle, SemaphoreHandle, WaitSemaphore};

/// 帧完成时触发的回调；在宿主线程上同步执行一次。
pub type FrameCompletionCallback = Box<dyn FnOnce() + Send>;

/// 一帧的完整记录：管理器自己创建的命令缓冲、调用方后续追加的命令缓冲、
/// 依赖的等待/发出信号量，以及完成回调。
#[derive(Default)]
pub struct FrameRecord {
    pub sequence: u64,
    pub framebuffer: Option<FramebufferHandle>,
    /// This slot's own completion fence, created by the manager at `begin_frame`
    /// and signalled by the backend once the frame's submission completes.
    pub fence: Option<FenceHandle>,
    /// Extra fences queued via `add_frame_dependency` for the frame that occupied
    /// this slot; client-waited alongside `fence` before the slot is reused.
    pub wait_fences: Vec<FenceHandle>,
    pub owned_command_buffers: Vec<CommandBufferHandle>,
    pub appended_command_buffers: Vec<CommandBufferHandle>,
    pub wait_semaphores: Vec<WaitSemaphore>,
    pub signal_semaphores: Vec<SemaphoreHandle>,
    pub completion_callbacks: Vec<FrameCompletionCallback>,
}

impl FrameRecord {
    pub fn new(sequence: u64) -> Self {
        Self {
            sequence,
            ..Default::default()
        }
    }

    pub fn all_command_buffers(&self) -> Vec<CommandBufferHandle> {
        self.owned_command_buffers
            .iter()
            .chain(self.appended_command_buffers.iter())
            .copied()
            .collect()
    }
}

/// 固定长度 N 的帧记录环；`push_frame` 在环满时丢弃最旧的一帧
/// （该帧的栅栏此时必须已经被上一次 `reclaim` 等到，否则说明 N 配置过小）。
pub struct FrameRing {
    capacity: usize,
    records: VecDeque<FrameRecord>,
}

impl FrameRing {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 2, "frame ring capacity must be at least 2");
        Self {
            capacity,
            records: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 是否已经飞满 N 帧，下一帧必须先回收最旧的一帧。
    pub fn is_full(&self) -> bool {
        self.records.len() >= self.capacity
    }

    pub fn push(&mut self, record: FrameRecord) {
        self.records.push_back(record);
    }

    /// 回收（弹出）最旧的一帧，供调用方在其栅栏完成后调用完成回调。
    pub fn reclaim_oldest(&mut self) -> Option<FrameRecord> {
        self.records.pop_front()
    }

    /// 丢弃最新的一帧而不触发其完成回调（提交失败时的清理路径，spec §4.5.3）。
    pub fn discard_newest(&mut self) -> Option<FrameRecord> {
        self.records.pop_back()
    }

    pub fn newest(&self) -> Option<&FrameRecord> {
        self.records.back()
    }

    pub fn newest_mut(&mut self) -> Option<&mut FrameRecord> {
        self.records.back_mut()
    }
}
