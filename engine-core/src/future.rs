//! 对象安全的 Future 别名，供跨线程任务句柄与异步等待点使用。

use std::future::Future;
use std::pin::Pin;

/// 可发送、带生命周期约束的装箱 Future，用于任务句柄与异步完成通知。
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
