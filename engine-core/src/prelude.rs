//! 常用类型的一站式重导出，供下游 `use engine_core::prelude::*;`。

pub use crate::backend::{GpuBackend, Scope};
pub use crate::cmdbuf::CommandBufferManager;
pub use crate::config::{CommandBufferConfig, ThreadHostConfig};
pub use crate::dispatch::Dispatcher;
pub use crate::error::{CoreError, ErrorCategory, Result};
pub use crate::ids::{type_id_of, TypeId, TypeIdList};
pub use crate::module::{Module, ModuleBehavior, ModuleClassId, ModuleHandle, ModuleState};
pub use crate::sync_event::SyncEvent;
pub use crate::thread::{ThreadHost, ThreadHostHandle};
pub use crate::type_id_list;
