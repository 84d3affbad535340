//! GPU 后端表面（spec §6）：内核不规定具体的线协议，只规定后端必须暴露的
//! 消息契约。具体的 Vulkan/OpenGL/计算/软件后端驱动完全在本 crate 的范围之外
//! （spec §1 "out of scope"）——这里只给出 trait 形式的契约与最小的句柄类型，
//! 供 [`crate::cmdbuf::CommandBufferManager`] 在其上编排帧生命周期。

use crate::error::CoreError;

/// 不透明的后端资源句柄；具体含义（Vulkan handle、GL name 等）由后端决定。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FenceHandle(pub u64);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SemaphoreHandle(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CommandBufferHandle(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FramebufferHandle(pub u64);

/// 信号量等待时附带的管线阶段掩码，随等待语义一起提交给后端。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineStageMask(pub u32);

/// 一次提交所携带的等待信号量集合（spec §4.5.3 "a set of wait-semaphores
/// with their pipeline-stage masks"）。
#[derive(Clone, Debug, Default)]
pub struct WaitSemaphore {
    pub semaphore: SemaphoreHandle,
    pub stage_mask: PipelineStageMask,
}

/// 提交给后端的一次完整帧提交请求。
#[derive(Clone, Debug, Default)]
pub struct SubmitRequest {
    pub command_buffers: Vec<CommandBufferHandle>,
    pub wait_semaphores: Vec<WaitSemaphore>,
    pub signal_semaphores: Vec<SemaphoreHandle>,
    pub fence: Option<FenceHandle>,
}

/// §4.5.1 的四值作用域状态机。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    None,
    Frame,
    Command,
    RenderPass,
}

/// 后端必须暴露的消息契约（spec §6）。对象安全，供命令缓冲管理器持有
/// `Arc<dyn GpuBackend>` 并在其上编排帧生命周期。
pub trait GpuBackend: Send + Sync {
    fn cmd_begin(&self, cmd: CommandBufferHandle) -> Result<(), CoreError>;
    fn cmd_end(&self, cmd: CommandBufferHandle) -> Result<(), CoreError>;
    fn cmd_begin_render_pass(&self, cmd: CommandBufferHandle) -> Result<(), CoreError>;
    fn cmd_end_render_pass(&self, cmd: CommandBufferHandle) -> Result<(), CoreError>;

    fn create_command_buffer(&self) -> Result<CommandBufferHandle, CoreError>;

    fn create_fence(&self) -> Result<FenceHandle, CoreError>;
    fn destroy_fence(&self, fence: FenceHandle);
    /// 客户端阻塞等待栅栏，带超时；超时返回 `FenceWaitTimeout`。
    fn client_wait_fence(&self, fence: FenceHandle, timeout: std::time::Duration) -> Result<(), CoreError>;

    fn create_semaphore(&self) -> Result<SemaphoreHandle, CoreError>;
    fn destroy_semaphore(&self, semaphore: SemaphoreHandle);

    /// 打开一帧，返回本帧的 framebuffer 句柄与帧序号。
    fn thread_begin_frame(&self) -> Result<(FramebufferHandle, u64), CoreError>;
    /// 提交本帧；失败时必须同步返回 `FrameSubmissionFailed`，不得 panic。
    fn thread_end_frame(&self, framebuffer: FramebufferHandle, request: SubmitRequest) -> Result<(), CoreError>;

    /// 是否支持 VR 并行入口点。
    fn supports_vr(&self) -> bool {
        false
    }
    fn vr_begin_frame(&self) -> Result<(FramebufferHandle, u64), CoreError> {
        Err(CoreError::new(
            crate::error::codes::INVALID_SCOPE,
            "backend does not support VR frames",
        ))
    }
    fn vr_end_frame(&self, _framebuffer: FramebufferHandle, _request: SubmitRequest) -> Result<(), CoreError> {
        Err(CoreError::new(
            crate::error::codes::INVALID_SCOPE,
            "backend does not support VR frames",
        ))
    }
}

/// `DeviceCreated` / `DeviceBeforeDestroy` 是后端的生命周期事件负载
/// （spec §6, §4.5.4）。作为普通消息经由 [`crate::dispatch::Dispatcher`] 广播。
#[derive(Clone, Copy, Debug)]
pub struct DeviceCreated;

#[derive(Clone, Copy, Debug)]
pub struct DeviceBeforeDestroy;
