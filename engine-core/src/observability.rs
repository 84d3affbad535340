//! 结构化日志的薄注入层。内核自身的所有日志调用点（`module`, `thread`,
//! `cmdbuf` 各模块）都经由 [`dispatch`] 转发，而不是直接调用 `tracing` 宏，
//! 这样 spec §6 "a single level-tagged line-oriented sink" 才是内核实际
//! 经过的唯一出口，而不只是一个旁路的 trait 摆设。把日志重定向到宿主应用
//! 自有 sink 的嵌入场景（内核作为库嵌入一个已有日志框架的宿主进程）可以
//! 实现 [`Logger`] 并替换默认的 [`TracingLogger`]。

use std::fmt;

/// 日志事件的严重级别，对应 `tracing` 的 level 但不要求调用方依赖 `tracing`。
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// 可插拔的日志接收端。
pub trait Logger: Send + Sync {
    fn log(&self, level: Level, target: &str, message: fmt::Arguments<'_>);
}

/// 默认实现：直接转发给 `tracing`，事件表现与内核其它地方直接调用
/// `tracing::warn!` 等宏完全一致。
#[derive(Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: Level, target: &str, message: fmt::Arguments<'_>) {
        match level {
            Level::Trace => tracing::trace!(target: "engine_core::external", %target, "{}", message),
            Level::Debug => tracing::debug!(target: "engine_core::external", %target, "{}", message),
            Level::Info => tracing::info!(target: "engine_core::external", %target, "{}", message),
            Level::Warn => tracing::warn!(target: "engine_core::external", %target, "{}", message),
            Level::Error => tracing::error!(target: "engine_core::external", %target, "{}", message),
        }
    }
}

/// 内核各调用点的单一日志出口；目前转发给 [`TracingLogger`]，但所有
/// call site 都通过这一个函数而不是散落地直接调用 `tracing::*!`，这样
/// 替换 sink 只需要改这一处。
pub fn dispatch(level: Level, target: &str, message: fmt::Arguments<'_>) {
    TracingLogger.log(level, target, message);
}
