//! 内核统一错误域：`CoreError` 是所有失败返回的最终形态。
//!
//! # 设计背景（Why）
//! - 调度器、模块生命周期、命令缓冲管理器彼此独立，但失败之后都要走同一条
//!   "记录日志 → 返回给调用方 → 调用方决定重试/升级/继续" 的传播路径（见 spec §7）；
//!   把所有错误收敛到一个类型上，才能让这条路径在整个内核里保持一致。
//! - 内核从不中止进程，也不通过 panic 跨越模块边界传播失败——这与本仓库所有
//!   handler 都以 `Result` 返回值表达失败的约定一致。
//!
//! # 使用方式（How）
//! - 通过 [`codes`] 模块中的稳定字符串常量构造错误，便于日志与指标按错误码聚合；
//! - `with_cause` 串联底层原因（例如后端提交失败），保留根因链路；
//! - `category()` 供调用方判断是否值得重试，而不必解析错误码字符串。

use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// 内核错误分类，驱动调用方的自动化处置策略。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    /// 可重试：瞬时失败，例如队列溢出前的强制刷新、栅栏等待超时。
    Retryable,
    /// 永久性失败：需要人工或上层逻辑介入才能恢复。
    Permanent,
    /// 预算耗尽：队列、环形缓冲等资源达到硬性上限。
    Budget,
    /// 操作被取消（例如模块正在 Deleting）。
    Cancelled,
}

/// 内核统一错误码表，字符串遵循 `<域>.<语义>` 命名，便于日志与告警聚合。
///
/// 每个常量对应 spec §7 中列出的一个错误种类；命名刻意避免与具体子系统的
/// 内部类型绑定，方便 `CoreError::code()` 在日志行里被直接过滤查询。
pub mod codes {
    pub const UNSUPPORTED_MESSAGE: &str = "kernel.unsupported_message";
    pub const INVALID_STATE: &str = "kernel.invalid_state";
    pub const INVALID_SCOPE: &str = "cmdbuf.invalid_scope";
    pub const ATTACHMENT_CYCLE: &str = "kernel.attachment_cycle";
    pub const MISSING_DEPENDENCY: &str = "kernel.missing_dependency";
    pub const INCOMPLETE_ATTACHMENT: &str = "kernel.incomplete_attachment";
    pub const COMPOSE_FAILED: &str = "kernel.compose_failed";
    pub const QUEUE_OVERFLOW: &str = "thread.queue_overflow";
    pub const FENCE_WAIT_TIMEOUT: &str = "cmdbuf.fence_wait_timeout";
    pub const FRAME_SUBMISSION_FAILED: &str = "cmdbuf.frame_submission_failed";
}

/// 跨模块共享的核心错误类型。
#[derive(Debug, Clone)]
pub struct CoreError {
    code: &'static str,
    message: Cow<'static, str>,
    category: Option<ErrorCategory>,
    cause: Option<Arc<dyn StdError + Send + Sync>>,
    /// 触发错误的模块调试名，便于日志中直接定位（spec §7 "user-visible surface"）。
    module_name: Option<Cow<'static, str>>,
}

impl CoreError {
    /// 构造核心错误；默认不含原因与分类。
    pub fn new(code: &'static str, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code,
            message: message.into(),
            category: None,
            cause: None,
            module_name: None,
        }
    }

    /// 附带底层原因（建造者风格，返回新值）。
    pub fn with_cause(mut self, cause: impl StdError + Send + Sync + 'static) -> Self {
        self.cause = Some(Arc::new(cause));
        self
    }

    /// 标记结构化分类，驱动调用方的重试/升级决策。
    pub fn with_category(mut self, category: ErrorCategory) -> Self {
        self.category = Some(category);
        self
    }

    /// 标记触发错误的模块调试名，用于日志行（`module`, `code`, `cause` 三元组）。
    pub fn with_module(mut self, module_name: impl Into<Cow<'static, str>>) -> Self {
        self.module_name = Some(module_name.into());
        self
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn category(&self) -> Option<ErrorCategory> {
        self.category
    }

    pub fn module_name(&self) -> Option<&str> {
        self.module_name.as_deref()
    }

    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync)> {
        self.cause.as_deref()
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        if let Some(module) = &self.module_name {
            write!(f, " (module={module})")?;
        }
        Ok(())
    }
}

impl StdError for CoreError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause.as_ref().map(|c| c.as_ref() as &(dyn StdError + 'static))
    }
}

/// 内核统一 `Result` 别名。
pub type Result<T> = core::result::Result<T, CoreError>;
