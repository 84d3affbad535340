//! C5 — 命令缓冲管理器：围绕一个固定长度的帧环编排 GPU 提交生命周期。
//!
//! # 设计背景（Why）
//! - spec §4.5 把"一帧"建模成四层严格嵌套的作用域（None/Frame/Command/
//!   RenderPass）加上一份飞行中的帧记录；把作用域校验（[`scope::ScopeTracker`]）
//!   和帧记录存储（[`ring::FrameRing`]）拆成两个独立的小模块，是因为它们各自
//!   的不变量互相独立——作用域是"调用顺序对不对"，帧环是"资源有没有超配"，
//!   混在一起会让两类 bug 互相掩盖。
//! - `current_state` 用 `arc_swap::ArcSwap` 发布，而不是在锁后面放一个
//!   `FrameSnapshot`，是因为 `get_current_state` 在 spec 里被定性为"任意线程
//!   随时可读的只读查询"（类比 C3 的 `find_module` 系查询）——用 `ArcSwap`
//!   可以让读者完全不必和写者竞争同一把锁。
//!
//! # 契约（What）
//! - `begin_frame`/`end_frame`（以及 VR 对应版本）必须在命令缓冲管理器的
//!   归属线程上调用；`get_current_state` 和 `subscribe_on_frame_completed`
//!   可以从任意线程调用。
//! - 设备销毁前必须收到 `DeviceBeforeDestroy`，之后任何 begin/end 调用都返回
//!   `InvalidState`，直到下一次 `DeviceCreated` 恢复（spec §6, §9 的设备
//!   重建场景）。

pub mod ring;
pub mod scope;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::backend::{
    CommandBufferHandle, FenceHandle, GpuBackend, Scope, SemaphoreHandle, SubmitRequest, WaitSemaphore,
};
use crate::clock::{Clock, MonotonicClock};
use crate::config::CommandBufferConfig;
use crate::error::{codes, CoreError, ErrorCategory};

use ring::{FrameCompletionCallback, FrameRecord, FrameRing};
use scope::ScopeTracker;

/// `get_current_state` 返回的只读快照（spec §4.5 "query the current frame
/// state from any thread"）。
#[derive(Clone, Copy, Debug)]
pub struct FrameSnapshot {
    pub sequence: u64,
    pub scope: Scope,
    pub frames_in_flight: usize,
    pub device_alive: bool,
}

impl Default for FrameSnapshot {
    fn default() -> Self {
        Self {
            sequence: 0,
            scope: Scope::None,
            frames_in_flight: 0,
            device_alive: false,
        }
    }
}

/// Dependencies queued via `add_frame_dependency` while recording the current
/// frame, waiting to be attached to the record for slot `(r+1) mod N`.
#[derive(Default)]
struct PendingDependencies {
    wait_fences: Vec<FenceHandle>,
    wait_semaphores: Vec<WaitSemaphore>,
    signal_semaphores: Vec<SemaphoreHandle>,
}

pub struct CommandBufferManager {
    backend: Arc<dyn GpuBackend>,
    config: CommandBufferConfig,
    clock: Arc<dyn Clock>,
    scope: Mutex<ScopeTracker>,
    ring: Mutex<FrameRing>,
    pending: Mutex<PendingDependencies>,
    /// Command buffers reclaimed from a rotated-out slot, available for reuse
    /// by a later `begin_frame_impl`/`begin(Scope::Command)` instead of asking
    /// the backend to create a fresh one on every frame.
    free_command_buffers: Mutex<Vec<CommandBufferHandle>>,
    next_sequence: AtomicU64,
    current_state: ArcSwap<FrameSnapshot>,
    device_alive: AtomicBool,
}

impl CommandBufferManager {
    pub fn new(backend: Arc<dyn GpuBackend>, config: CommandBufferConfig) -> Self {
        Self::with_clock(backend, config, Arc::new(MonotonicClock::new()))
    }

    /// Like [`Self::new`] but with an injectable [`Clock`], used by tests to
    /// make the fence-wait pacing/hard-timeout budget deterministic.
    pub fn with_clock(backend: Arc<dyn GpuBackend>, config: CommandBufferConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            backend,
            config,
            clock,
            scope: Mutex::new(ScopeTracker::new()),
            ring: Mutex::new(FrameRing::new(config.ring_length)),
            pending: Mutex::new(PendingDependencies::default()),
            free_command_buffers: Mutex::new(Vec::new()),
            next_sequence: AtomicU64::new(0),
            current_state: ArcSwap::from_pointee(FrameSnapshot::default()),
            device_alive: AtomicBool::new(false),
        }
    }

    /// Pop a reclaimed command buffer off the free list, or ask the backend
    /// to create a fresh one if none is available yet.
    fn acquire_command_buffer(&self) -> Result<CommandBufferHandle, CoreError> {
        if let Some(cmd) = self.free_command_buffers.lock().pop() {
            return Ok(cmd);
        }
        self.backend.create_command_buffer()
    }

    /// 任意线程都可以安全读取的当前帧状态快照。
    pub fn get_current_state(&self) -> FrameSnapshot {
        *self.current_state.load_full()
    }

    fn publish_snapshot(&self) {
        let scope = self.scope.lock().current();
        let ring = self.ring.lock();
        self.current_state.store(Arc::new(FrameSnapshot {
            sequence: self.next_sequence.load(Ordering::Relaxed),
            scope,
            frames_in_flight: ring.len(),
            device_alive: self.device_alive.load(Ordering::Acquire),
        }));
    }

    fn require_device_alive(&self) -> Result<(), CoreError> {
        if !self.device_alive.load(Ordering::Acquire) {
            return Err(CoreError::new(
                codes::INVALID_STATE,
                "command buffer manager has no live device (awaiting DeviceCreated)",
            ));
        }
        Ok(())
    }

    // ---------------------------------------------------------------- device lifecycle

    /// 设备创建完成后调用；重置序列号与作用域，允许新的帧开始。
    pub fn on_device_created(&self) {
        self.device_alive.store(true, Ordering::Release);
        self.publish_snapshot();
        crate::observability::dispatch(
            crate::observability::Level::Info,
            "engine_core::cmdbuf",
            format_args!("command buffer manager: device created"),
        );
    }

    /// 设备销毁前调用：丢弃飞行中的全部帧记录，触发其完成回调，但不做提交
    /// （此时后端资源已经失效，再提交没有意义——spec §9 设备重建场景）。
    pub fn on_device_before_destroy(&self) {
        self.device_alive.store(false, Ordering::Release);
        let drained: Vec<FrameRecord> = {
            let mut ring = self.ring.lock();
            std::iter::from_fn(|| ring.reclaim_oldest()).collect()
        };
        for frame in drained {
            // Best-effort: the device is already going away, a fence wait timeout
            // here must not block teardown from reaching Deleting.
            let _ = self.wait_and_release_record_fences(&frame);
            for cb in frame.completion_callbacks {
                cb();
            }
        }
        *self.scope.lock() = ScopeTracker::new();
        self.publish_snapshot();
        crate::observability::dispatch(
            crate::observability::Level::Warn,
            "engine_core::cmdbuf",
            format_args!("command buffer manager: device about to be destroyed, frame ring flushed"),
        );
    }

    // ---------------------------------------------------------------- frame lifecycle

    /// Client-side wait on a single fence: a short pacing budget first (the
    /// expected case in steady state), then the hard timeout before surfacing
    /// `FenceWaitTimeout` (spec §9 open question).
    fn bounded_fence_wait(&self, fence: FenceHandle) -> Result<(), CoreError> {
        let started = self.clock.now();
        match self.backend.client_wait_fence(fence, self.config.fence_wait_pacing_budget) {
            Ok(()) => Ok(()),
            Err(_) => {
                let elapsed = self.clock.now().saturating_sub(started);
                let remaining = self.config.fence_wait_hard_timeout.saturating_sub(elapsed);
                self.backend.client_wait_fence(fence, remaining).map_err(|err| {
                    CoreError::new(codes::FENCE_WAIT_TIMEOUT, err.message().to_string())
                        .with_category(ErrorCategory::Retryable)
                })
            }
        }
    }

    /// §4.5.2 begin_frame step: "wait (client-side) on the fence plus any
    /// wait-fences queued for this slot" before the slot can be reused.
    fn wait_and_release_record_fences(&self, record: &FrameRecord) -> Result<(), CoreError> {
        for &fence in &record.wait_fences {
            self.bounded_fence_wait(fence)?;
        }
        if let Some(fence) = record.fence {
            self.bounded_fence_wait(fence)?;
            self.backend.destroy_fence(fence);
        }
        Ok(())
    }

    fn begin_frame_impl(&self, vr: bool) -> Result<u64, CoreError> {
        self.require_device_alive()?;
        self.scope.lock().enter(Scope::Frame)?;
        // Steady state: the ring holds exactly `ring_length` in-flight frames, so it is
        // full by the time the (N+1)-th frame begins. Reclaiming the oldest slot here
        // is the normal rotation mechanic, not a back-pressure event — no warning.
        if self.ring.lock().is_full() {
            if let Some(oldest) = self.ring.lock().reclaim_oldest() {
                self.wait_and_release_record_fences(&oldest)?;
                for cb in oldest.completion_callbacks {
                    cb();
                }
                // Owned buffers survive the slot; externally-appended ones are
                // just dropped (the backend has no destroy_command_buffer entry
                // point, and they aren't this manager's to reuse).
                self.free_command_buffers.lock().extend(oldest.owned_command_buffers);
            }
        }
        let (framebuffer, _) = if vr {
            self.backend.vr_begin_frame()?
        } else {
            self.backend.thread_begin_frame()?
        };
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        let mut record = FrameRecord::new(sequence);
        let cmd = self.acquire_command_buffer()?;
        record.owned_command_buffers.push(cmd);
        record.framebuffer = Some(framebuffer);
        record.fence = Some(self.backend.create_fence()?);
        {
            let mut pending = self.pending.lock();
            record.wait_fences = std::mem::take(&mut pending.wait_fences);
            record.wait_semaphores = std::mem::take(&mut pending.wait_semaphores);
            record.signal_semaphores = std::mem::take(&mut pending.signal_semaphores);
        }
        self.ring.lock().push(record);
        self.publish_snapshot();
        Ok(sequence)
    }

    /// 提交当前帧。提交成功时，帧记录连同其完成回调继续留在环里——回调不在
    /// 这里触发，而是等到环转回同一槽位、下一次 `begin_frame` 回收这帧时才
    /// 触发（spec §4.5.2 "fired during the begin_frame of the next rotation
    /// that reaches this slot" / P7）。提交失败时按 §4.5.3 丢弃这个槽位，
    /// 不调用其回调。
    fn end_frame_impl(&self, vr: bool) -> Result<(), CoreError> {
        self.scope.lock().exit(Scope::Frame)?;
        let (framebuffer, request) = {
            let ring = self.ring.lock();
            let record = ring
                .newest()
                .ok_or_else(|| CoreError::new(codes::INVALID_STATE, "end_frame with no active frame record"))?;
            let framebuffer = record.framebuffer.ok_or_else(|| {
                CoreError::new(codes::INVALID_STATE, "frame record missing framebuffer handle")
            })?;
            let request = SubmitRequest {
                command_buffers: record.all_command_buffers(),
                wait_semaphores: record.wait_semaphores.clone(),
                signal_semaphores: record.signal_semaphores.clone(),
                fence: record.fence,
            };
            (framebuffer, request)
        };

        let submit_result = if vr {
            self.backend.vr_end_frame(framebuffer, request)
        } else {
            self.backend.thread_end_frame(framebuffer, request)
        };

        self.publish_snapshot();

        match submit_result {
            Ok(()) => Ok(()),
            Err(err) => {
                crate::observability::dispatch(
                    crate::observability::Level::Warn,
                    "engine_core::cmdbuf",
                    format_args!("frame submission failed: code={}", err.code()),
                );
                if let Some(discarded) = self.ring.lock().discard_newest() {
                    if let Some(fence) = discarded.fence {
                        self.backend.destroy_fence(fence);
                    }
                }
                Err(CoreError::new(codes::FRAME_SUBMISSION_FAILED, err.message().to_string())
                    .with_category(ErrorCategory::Retryable))
            }
        }
    }

    pub fn begin_frame(&self) -> Result<u64, CoreError> {
        self.begin_frame_impl(false)
    }

    pub fn end_frame(&self) -> Result<(), CoreError> {
        self.end_frame_impl(false)
    }

    pub fn begin_vr_frame(&self) -> Result<u64, CoreError> {
        if !self.backend.supports_vr() {
            return Err(CoreError::new(codes::INVALID_SCOPE, "backend does not support VR frames"));
        }
        self.begin_frame_impl(true)
    }

    pub fn end_vr_frame(&self) -> Result<(), CoreError> {
        self.end_frame_impl(true)
    }

    // ---------------------------------------------------------------- sub-scopes

    pub fn begin(&self, scope: Scope) -> Result<(), CoreError> {
        self.scope.lock().enter(scope)?;
        if scope == Scope::Command {
            // §4.5.2: "acquire an owned command buffer from the free list (or
            // create one)" — each entry into Command scope gets its own buffer,
            // not a single one shared for the whole frame.
            let cmd = self.acquire_command_buffer()?;
            if let Some(record) = self.ring.lock().newest_mut() {
                record.owned_command_buffers.push(cmd);
            }
            self.backend.cmd_begin(cmd)?;
        } else if scope == Scope::RenderPass {
            if let Some(record) = self.ring.lock().newest() {
                if let Some(&cmd) = record.owned_command_buffers.last() {
                    self.backend.cmd_begin_render_pass(cmd)?;
                }
            }
        }
        Ok(())
    }

    pub fn end(&self, scope: Scope) -> Result<(), CoreError> {
        if scope == Scope::RenderPass {
            if let Some(record) = self.ring.lock().newest() {
                if let Some(&cmd) = record.owned_command_buffers.last() {
                    self.backend.cmd_end_render_pass(cmd)?;
                }
            }
        } else if scope == Scope::Command {
            if let Some(record) = self.ring.lock().newest() {
                if let Some(&cmd) = record.owned_command_buffers.last() {
                    self.backend.cmd_end(cmd)?;
                }
            }
        }
        self.scope.lock().exit(scope)
    }

    /// 把一个外部创建的命令缓冲追加到当前飞行中的帧（spec §4.5.3
    /// "externally-appended buffers"）。
    pub fn append(&self, cmd: CommandBufferHandle) -> Result<(), CoreError> {
        if self.scope.lock().current() != Scope::Frame {
            return Err(CoreError::new(codes::INVALID_SCOPE, "append is only valid in Scope::Frame"));
        }
        let mut ring = self.ring.lock();
        let record = ring
            .newest_mut()
            .ok_or_else(|| CoreError::new(codes::INVALID_STATE, "append with no active frame"))?;
        record.appended_command_buffers.push(cmd);
        Ok(())
    }

    /// 登记一组 GPU 同步依赖，应用于**下一帧**（槽位 `(r+1) mod N`），而不是
    /// 当前正在记录的帧——调用方在录制当前帧期间声明"下一帧需要等什么/发出什么"
    /// （spec §4.5.2 "enqueues GPU synchronization to apply to the next frame"）。
    /// 这些依赖在下一次 `begin_frame` 创建新帧记录时被取走并附着在该记录上。
    pub fn add_frame_dependency(
        &self,
        wait_fences: Vec<FenceHandle>,
        wait_semaphores: Vec<WaitSemaphore>,
        signal_semaphores: Vec<SemaphoreHandle>,
    ) {
        let mut pending = self.pending.lock();
        pending.wait_fences.extend(wait_fences);
        pending.wait_semaphores.extend(wait_semaphores);
        pending.signal_semaphores.extend(signal_semaphores);
    }

    /// 注册一个在当前帧提交完成后触发的回调。
    pub fn subscribe_on_frame_completed(&self, callback: FrameCompletionCallback) -> Result<(), CoreError> {
        let mut ring = self.ring.lock();
        let record = ring.newest_mut().ok_or_else(|| {
            CoreError::new(codes::INVALID_STATE, "subscribe_on_frame_completed with no active frame")
        })?;
        record.completion_callbacks.push(callback);
        Ok(())
    }

    /// 手动阻塞等待当前帧的栅栏，供调用方在 `end_frame` 之外需要强制同步点时
    /// 使用；正常的回收路径（§4.5.2）已经在 `begin_frame` 里自动完成等待。
    pub fn wait_current_fence(&self) -> Result<(), CoreError> {
        let fence = {
            let ring = self.ring.lock();
            ring.newest().and_then(|r| r.fence)
        };
        let Some(fence) = fence else { return Ok(()) };
        self.bounded_fence_wait(fence)
    }
}
