//! scenario 3: with ring length N=3, performing 5 frames should invoke each
//! frame's completion callback during the `begin_frame` of frame k+N, not
//! before.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use engine_core::backend::{
    CommandBufferHandle, FenceHandle, FramebufferHandle, GpuBackend, SemaphoreHandle, SubmitRequest,
};
use engine_core::cmdbuf::CommandBufferManager;
use engine_core::config::CommandBufferConfig;
use engine_core::error::CoreError;

struct RecordingBackend {
    next_handle: AtomicU64,
    submissions: Mutex<Vec<Vec<CommandBufferHandle>>>,
}

impl RecordingBackend {
    fn new() -> Self {
        Self {
            next_handle: AtomicU64::new(1),
            submissions: Mutex::new(Vec::new()),
        }
    }

    fn next(&self) -> u64 {
        self.next_handle.fetch_add(1, Ordering::Relaxed)
    }
}

impl GpuBackend for RecordingBackend {
    fn cmd_begin(&self, _cmd: CommandBufferHandle) -> Result<(), CoreError> {
        Ok(())
    }
    fn cmd_end(&self, _cmd: CommandBufferHandle) -> Result<(), CoreError> {
        Ok(())
    }
    fn cmd_begin_render_pass(&self, _cmd: CommandBufferHandle) -> Result<(), CoreError> {
        Ok(())
    }
    fn cmd_end_render_pass(&self, _cmd: CommandBufferHandle) -> Result<(), CoreError> {
        Ok(())
    }
    fn create_command_buffer(&self) -> Result<CommandBufferHandle, CoreError> {
        Ok(CommandBufferHandle(self.next()))
    }
    fn create_fence(&self) -> Result<FenceHandle, CoreError> {
        Ok(FenceHandle(self.next()))
    }
    fn destroy_fence(&self, _fence: FenceHandle) {}
    fn client_wait_fence(&self, _fence: FenceHandle, _timeout: std::time::Duration) -> Result<(), CoreError> {
        Ok(())
    }
    fn create_semaphore(&self) -> Result<SemaphoreHandle, CoreError> {
        Ok(SemaphoreHandle(self.next()))
    }
    fn destroy_semaphore(&self, _semaphore: SemaphoreHandle) {}
    fn thread_begin_frame(&self) -> Result<(FramebufferHandle, u64), CoreError> {
        Ok((FramebufferHandle(self.next()), 0))
    }
    fn thread_end_frame(&self, _framebuffer: FramebufferHandle, request: SubmitRequest) -> Result<(), CoreError> {
        self.submissions.lock().unwrap().push(request.command_buffers);
        Ok(())
    }
}

#[test]
fn callbacks_fire_n_frames_after_registration() {
    let backend = Arc::new(RecordingBackend::new());
    let config = CommandBufferConfig {
        ring_length: 3,
        ..CommandBufferConfig::default()
    };
    let manager = CommandBufferManager::new(backend.clone(), config);
    manager.on_device_created();

    let fired = Arc::new(Mutex::new(Vec::new()));

    for frame in 1..=5u64 {
        manager.begin_frame().unwrap();

        // The begin_frame call above is where frame `frame - N` (if any) should
        // have just been reclaimed and its callback invoked.
        if frame > 3 {
            assert_eq!(*fired.lock().unwrap(), (1..frame - 3 + 1).collect::<Vec<_>>());
        } else {
            assert!(fired.lock().unwrap().is_empty());
        }

        let fired = fired.clone();
        manager
            .subscribe_on_frame_completed(Box::new(move || fired.lock().unwrap().push(frame)))
            .unwrap();
        manager.end_frame().unwrap();
    }

    // Two frames (1 and 2) have rotated out of the 3-deep ring by the time all
    // 5 frames have been recorded; frames 3-5 are still in flight.
    assert_eq!(*fired.lock().unwrap(), vec![1, 2]);
    assert_eq!(manager.get_current_state().frames_in_flight, 3);
    assert_eq!(backend.submissions.lock().unwrap().len(), 5);
}
