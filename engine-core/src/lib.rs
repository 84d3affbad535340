//! `engine_core` —— 跨平台引擎的模块内核。
//!
//! 内核本身不渲染、不加载资源、不解析场景：它只提供四层彼此独立又相互咬合
//! 的基础设施——
//!
//! - [`ids`]（C1）给每一种消息/事件负载一个稳定的类型身份；
//! - [`dispatch`]（C2）围绕这个身份做同步的订阅/广播；
//! - [`module`]（C3）把身份、分发器与一棵强/弱引用分明的组合树、外加一个
//!   生命周期状态机粘在一起；
//! - [`thread`]（C4）给每个参与调度的 OS 线程一个协作式更新循环和唯一合法的
//!   跨线程通信入口（双环异步队列）；
//! - [`cmdbuf`]（C5）在此之上编排 GPU 命令缓冲的帧级生命周期。
//!
//! 这些层都不知道彼此的存在之外的任何具体语义——`Module` 不知道命令缓冲，
//! `AsyncQueue` 不知道模块树的形状——组合它们是调用方的工作。

pub mod backend;
pub mod clock;
pub mod cmdbuf;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod future;
pub mod ids;
pub mod module;
pub mod observability;
pub mod prelude;
pub mod sync_event;
pub mod thread;

pub use crate::error::{CoreError, ErrorCategory, Result};
pub use crate::ids::{type_id_of, TypeId, TypeIdList};
pub use crate::module::{Module, ModuleBehavior, ModuleClassId, ModuleHandle, ModuleState};
