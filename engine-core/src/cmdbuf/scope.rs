//! §4.5.1 的作用域状态机：`None -> Frame -> Command -> RenderPass`，
//! 严格嵌套，`end` 只能退回到紧邻的上一级，不允许跳级关闭。

use crate::backend::Scope;
use crate::error::{codes, CoreError};

/// 一个线程私有的作用域栈；命令缓冲管理器每个逻辑线程持有一份。
#[derive(Debug, Default)]
pub struct ScopeTracker {
    stack: Vec<Scope>,
}

impl ScopeTracker {
    pub fn new() -> Self {
        Self { stack: Vec::new() }
    }

    pub fn current(&self) -> Scope {
        self.stack.last().copied().unwrap_or(Scope::None)
    }

    fn expect(&self, expected: Scope) -> Result<(), CoreError> {
        if self.current() != expected {
            return Err(CoreError::new(
                codes::INVALID_SCOPE,
                format!("expected scope {:?}, found {:?}", expected, self.current()),
            ));
        }
        Ok(())
    }

    /// 进入下一级作用域；只允许紧邻的嵌套（Frame 之下才能 begin Command，以此类推）。
    pub fn enter(&mut self, next: Scope) -> Result<(), CoreError> {
        let required_current = match next {
            Scope::Frame => Scope::None,
            Scope::Command => Scope::Frame,
            Scope::RenderPass => Scope::Command,
            Scope::None => {
                return Err(CoreError::new(codes::INVALID_SCOPE, "cannot explicitly enter scope None"))
            }
        };
        self.expect(required_current)?;
        self.stack.push(next);
        Ok(())
    }

    /// 退出当前作用域，回到紧邻的上一级；`expected` 必须匹配当前所在的作用域。
    pub fn exit(&mut self, expected: Scope) -> Result<(), CoreError> {
        self.expect(expected)?;
        self.stack.pop();
        Ok(())
    }

    pub fn is_idle(&self) -> bool {
        self.stack.is_empty()
    }
}
