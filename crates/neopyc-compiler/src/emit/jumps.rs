//! Loop bookkeeping for `break` and `continue`.
//!
//! Both jump forward at the time they are emitted: `break` to the loop exit
//! and `continue` to the condition test, which a `while` loop places after
//! its body. The jumps are collected here and resolved when the loop's
//! layout reaches those points.

use crate::bytecode::CodeId;

/// Tracks the innermost-last stack of loops being generated.
#[derive(Debug, Default)]
pub struct JumpManager {
    loops: Vec<LoopContext>,
}

/// Pending jumps of one loop.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct LoopContext {
    pub break_jumps: Vec<CodeId>,
    pub continue_jumps: Vec<CodeId>,
}

impl JumpManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter_loop(&mut self) {
        self.loops.push(LoopContext::default());
    }

    /// Leave the innermost loop, returning its pending jumps.
    pub fn exit_loop(&mut self) -> LoopContext {
        self.loops.pop().unwrap_or_default()
    }

    pub fn in_loop(&self) -> bool {
        !self.loops.is_empty()
    }

    pub fn loop_depth(&self) -> usize {
        self.loops.len()
    }

    pub fn add_break(&mut self, jump: CodeId) -> Result<(), super::BreakError> {
        let ctx = self.loops.last_mut().ok_or(super::BreakError::NotInLoop("break"))?;
        ctx.break_jumps.push(jump);
        Ok(())
    }

    pub fn add_continue(&mut self, jump: CodeId) -> Result<(), super::BreakError> {
        let ctx = self.loops.last_mut().ok_or(super::BreakError::NotInLoop("continue"))?;
        ctx.continue_jumps.push(jump);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::BreakError;

    #[test]
    fn new_manager_not_in_loop() {
        let manager = JumpManager::new();
        assert!(!manager.in_loop());
        assert_eq!(manager.loop_depth(), 0);
    }

    #[test]
    fn nested_loops_keep_their_own_jumps() {
        let mut manager = JumpManager::new();
        manager.enter_loop();
        manager.add_break(CodeId::new(1)).unwrap();
        manager.enter_loop();
        manager.add_continue(CodeId::new(2)).unwrap();
        assert_eq!(manager.loop_depth(), 2);

        let inner = manager.exit_loop();
        assert!(inner.break_jumps.is_empty());
        assert_eq!(inner.continue_jumps, vec![CodeId::new(2)]);

        let outer = manager.exit_loop();
        assert_eq!(outer.break_jumps, vec![CodeId::new(1)]);
        assert!(!manager.in_loop());
    }

    #[test]
    fn jumps_outside_loop_are_rejected() {
        let mut manager = JumpManager::new();
        assert_eq!(manager.add_break(CodeId::new(0)), Err(BreakError::NotInLoop("break")));
        assert_eq!(
            manager.add_continue(CodeId::new(0)),
            Err(BreakError::NotInLoop("continue"))
        );
    }

    #[test]
    fn exit_empty_returns_empty() {
        let mut manager = JumpManager::new();
        assert_eq!(manager.exit_loop(), LoopContext::default());
    }
}
