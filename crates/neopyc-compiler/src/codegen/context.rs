//! Per-compilation code generation state.
//!
//! [`CodeGenContext`] owns the instruction buffer of one compilation, the
//! method currently being generated and a stack of the static types of the
//! values the emitted code leaves on the VM stack. The type stack is empty
//! at every statement boundary; anything else is a generator fault.
//!
//! Code generation goes through the stack-aware helpers below, each of
//! which pops the types of the values its instruction consumes and pushes
//! the type of what it leaves, so the type stack mirrors the VM stack after
//! every instruction.

use neopyc_core::{CodegenError, Constant, DefaultValue, SymbolId, Type};

use crate::builtins::TemplateOp;
use crate::bytecode::{CodeId, CodeMap, Opcode, VmCode};
use crate::emit::Emitter;
use crate::symbols::VariableKind;

type Result<T> = std::result::Result<T, CodegenError>;

/// First and last instruction of a generated method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodBounds {
    pub entry: CodeId,
    pub exit: CodeId,
}

#[derive(Debug)]
struct OpenMethod {
    name: String,
    /// Position of the method's first body instruction.
    start: usize,
    args: usize,
    locals: usize,
    return_type: Type,
}

/// Instruction buffer and bookkeeping shared by every method of a
/// compilation.
#[derive(Debug, Default)]
pub struct CodeGenContext {
    emitter: Emitter,
    stack: Vec<Type>,
    current: Option<OpenMethod>,
}

impl CodeGenContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emitter(&mut self) -> &mut Emitter {
        &mut self.emitter
    }

    pub fn code(&self) -> &CodeMap {
        self.emitter.code()
    }

    // =========================================================================
    // Methods
    // =========================================================================

    /// Open a method. Its frame is set up by [`end_method`](Self::end_method)
    /// once the slot counts are final.
    pub fn begin_method(&mut self, name: &str, args: usize, locals: usize, return_type: Type) -> Result<()> {
        if let Some(open) = &self.current {
            tracing::debug!(open = %open.name, requested = name, "nested begin_method");
            return Err(CodegenError::NestedMethod(name.to_string()));
        }
        let start = self.emitter.start_method();
        tracing::trace!(method = name, start, "begin method");
        self.stack.clear();
        self.current = Some(OpenMethod {
            name: name.to_string(),
            start,
            args,
            locals,
            return_type,
        });
        Ok(())
    }

    /// Close the open method: add the implicit return if the end of the
    /// body is reachable and put `INITSLOT` in front of the body.
    pub fn end_method(&mut self) -> Result<MethodBounds> {
        let open = self.current.take().ok_or(CodegenError::NoCurrentMethod)?;

        if self.emitter.is_reachable() {
            if !open.return_type.is_none() {
                self.emitter.emit_push_null()?;
            }
            self.emitter.emit(Opcode::Ret)?;
        }

        let first = self
            .emitter
            .code()
            .at_position(open.start)
            .ok_or_else(|| CodegenError::Unexpected(format!("method '{}' has no instructions", open.name)))?;

        let entry = if open.args > 0 || open.locals > 0 {
            let locals = slot_count(open.locals)?;
            let args = slot_count(open.args)?;
            self.emitter
                .code_mut()
                .insert_before(first, VmCode::with_data(Opcode::InitSlot, vec![locals, args]))?
        } else {
            first
        };
        let exit = self.emitter.code().last().ok_or(CodegenError::NoCurrentMethod)?;

        tracing::debug!(method = %open.name, args = open.args, locals = open.locals, "method generated");
        Ok(MethodBounds { entry, exit })
    }

    pub fn current_method(&self) -> Option<&str> {
        self.current.as_ref().map(|open| open.name.as_str())
    }

    // =========================================================================
    // Type stack
    // =========================================================================

    pub fn push(&mut self, ty: Type) {
        self.stack.push(ty);
    }

    /// The type `depth` places from the top; 1 is the top itself.
    pub fn peek(&self, depth: usize) -> Result<&Type> {
        self.stack
            .len()
            .checked_sub(depth)
            .and_then(|index| self.stack.get(index))
            .ok_or_else(|| CodegenError::StackUnderflow(format!("peek at depth {depth}")))
    }

    pub fn pop(&mut self, what: &str) -> Result<Type> {
        self.stack
            .pop()
            .ok_or_else(|| CodegenError::StackUnderflow(what.to_string()))
    }

    pub fn pop_n(&mut self, count: usize, what: &str) -> Result<()> {
        for _ in 0..count {
            self.pop(what)?;
        }
        Ok(())
    }

    fn pop_operands(&mut self, count: usize, opcode: Opcode) -> Result<()> {
        let Some(rest) = self.stack.len().checked_sub(count) else {
            return Err(CodegenError::StackUnderflow(format!("{opcode:?}")));
        };
        self.stack.truncate(rest);
        Ok(())
    }

    /// Replace the static type of the top value.
    pub fn retype_top(&mut self, ty: Type) {
        if let Some(top) = self.stack.last_mut() {
            *top = ty;
        }
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Fails unless the type stack is empty.
    pub fn check_balanced(&self) -> Result<()> {
        if self.stack.is_empty() {
            return Ok(());
        }
        Err(CodegenError::UnbalancedStack {
            method: self.current_method().unwrap_or_default().to_string(),
            depth: self.stack.len(),
        })
    }

    // =========================================================================
    // Stack-aware emission
    // =========================================================================

    /// Emit `opcode`, consuming `pops` values and leaving `result`.
    pub fn emit_op(&mut self, opcode: Opcode, pops: usize, result: Option<Type>) -> Result<CodeId> {
        self.pop_operands(pops, opcode)?;
        let id = self.emitter.emit(opcode)?;
        self.stack.extend(result);
        Ok(id)
    }

    pub fn push_int(&mut self, value: i128) -> Result<CodeId> {
        let id = self.emitter.emit_push_int(value)?;
        self.push(Type::Int);
        Ok(id)
    }

    pub fn push_null(&mut self) -> Result<CodeId> {
        let id = self.emitter.emit_push_null()?;
        self.push(Type::None);
        Ok(id)
    }

    pub fn push_constant(&mut self, constant: &Constant) -> Result<CodeId> {
        let id = self.emitter.emit_push_constant(constant)?;
        self.push(constant.ty());
        Ok(id)
    }

    /// Push the starting value of a slot or field of type `ty`.
    pub fn push_default(&mut self, default: &DefaultValue, ty: Type) -> Result<CodeId> {
        let id = self.emitter.emit_default(default)?;
        self.push(ty);
        Ok(id)
    }

    pub fn load(&mut self, kind: &VariableKind, ty: Type) -> Result<CodeId> {
        let id = self.emitter.emit_load(kind)?;
        self.push(ty);
        Ok(id)
    }

    pub fn store(&mut self, kind: &VariableKind) -> Result<CodeId> {
        self.pop("store")?;
        self.emitter.emit_store(kind)
    }

    /// Copy the value `depth` places from the top (1 is the top itself).
    pub fn duplicate(&mut self, depth: usize) -> Result<CodeId> {
        let ty = self.peek(depth)?.clone();
        let id = self.emitter.emit_duplicate(depth)?;
        self.push(ty);
        Ok(id)
    }

    pub fn swap(&mut self) -> Result<CodeId> {
        let len = self.stack.len();
        if len < 2 {
            return Err(CodegenError::StackUnderflow("SWAP".to_string()));
        }
        self.stack.swap(len - 1, len - 2);
        self.emitter.emit(Opcode::Swap)
    }

    /// Emit a branch, consuming the values its test compares. Returns
    /// `None` when the current point is unreachable.
    pub fn branch(&mut self, opcode: Opcode, target: Option<CodeId>) -> Result<Option<CodeId>> {
        self.pop_operands(branch_operands(opcode), opcode)?;
        self.emitter.emit_jump(opcode, target)
    }

    pub fn call(&mut self, method: SymbolId, args: usize, result: Option<Type>) -> Result<CodeId> {
        self.pop_n(args, "call")?;
        let id = self.emitter.emit_call(method)?;
        self.stack.extend(result);
        Ok(id)
    }

    // =========================================================================
    // Templates
    // =========================================================================

    /// Splice an operator or builtin template. A template consumes its
    /// `operands` and leaves `result`.
    pub fn emit_template(&mut self, template: &[TemplateOp], operands: usize, result: Option<Type>) -> Result<()> {
        self.pop_n(operands, "template")?;
        for op in template {
            match op {
                TemplateOp::Op(opcode) => self.emitter.emit(*opcode)?,
                TemplateOp::Convert(target) => self.emitter.emit_convert(*target)?,
                TemplateOp::PushInt(value) => self.emitter.emit_push_int(*value)?,
                TemplateOp::PushData(bytes) => self.emitter.emit_push_data(bytes)?,
                TemplateOp::Syscall(name) => self.emitter.emit_syscall(name)?,
            };
        }
        self.stack.extend(result);
        Ok(())
    }

    pub fn finish(self) -> Result<Vec<u8>> {
        if let Some(open) = &self.current {
            return Err(CodegenError::Unexpected(format!("method '{}' was never ended", open.name)));
        }
        self.emitter.finish()
    }
}

/// Values a branch pops before jumping.
fn branch_operands(opcode: Opcode) -> usize {
    match opcode {
        Opcode::Jmp | Opcode::JmpL => 0,
        Opcode::JmpIf | Opcode::JmpIfL | Opcode::JmpIfNot | Opcode::JmpIfNotL => 1,
        _ => 2,
    }
}

fn slot_count(count: usize) -> Result<u8> {
    u8::try_from(count).map_err(|_| CodegenError::SlotOutOfRange(count))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opcodes(ctx: &CodeGenContext) -> Vec<Opcode> {
        ctx.code().iter().map(|(_, code)| code.opcode).collect()
    }

    #[test]
    fn implicit_return() {
        let mut ctx = CodeGenContext::new();
        ctx.begin_method("f", 0, 0, Type::None).unwrap();
        let bounds = ctx.end_method().unwrap();
        assert_eq!(opcodes(&ctx), vec![Opcode::Ret]);
        assert_eq!(bounds.entry, bounds.exit);
    }

    #[test]
    fn value_methods_return_null_when_falling_off() {
        let mut ctx = CodeGenContext::new();
        ctx.begin_method("f", 0, 0, Type::Int).unwrap();
        ctx.end_method().unwrap();
        assert_eq!(opcodes(&ctx), vec![Opcode::PushNull, Opcode::Ret]);
    }

    #[test]
    fn explicit_return_is_not_duplicated() {
        let mut ctx = CodeGenContext::new();
        ctx.begin_method("f", 0, 0, Type::Int).unwrap();
        ctx.emitter().emit_push_int(1).unwrap();
        ctx.emitter().emit(Opcode::Ret).unwrap();
        ctx.end_method().unwrap();
        assert_eq!(opcodes(&ctx), vec![Opcode::Push1, Opcode::Ret]);
    }

    #[test]
    fn frame_is_inserted_before_the_body() {
        let mut ctx = CodeGenContext::new();
        ctx.begin_method("f", 2, 1, Type::None).unwrap();
        ctx.emitter().emit(Opcode::LdArg0).unwrap();
        ctx.emitter().emit(Opcode::StLoc0).unwrap();
        let bounds = ctx.end_method().unwrap();

        assert_eq!(
            opcodes(&ctx),
            vec![Opcode::InitSlot, Opcode::LdArg0, Opcode::StLoc0, Opcode::Ret]
        );
        assert_eq!(ctx.code().get(bounds.entry).data, vec![1, 2]);
        assert_eq!(ctx.code().address_of(bounds.entry), 0);
        assert_eq!(ctx.code().address_of(bounds.exit), 5);
    }

    #[test]
    fn second_method_starts_reachable() {
        let mut ctx = CodeGenContext::new();
        ctx.begin_method("a", 0, 0, Type::None).unwrap();
        ctx.end_method().unwrap();
        ctx.begin_method("b", 0, 0, Type::None).unwrap();
        let bounds = ctx.end_method().unwrap();
        assert_eq!(opcodes(&ctx), vec![Opcode::Ret, Opcode::Ret]);
        assert_eq!(ctx.code().address_of(bounds.entry), 1);
    }

    #[test]
    fn nesting_and_unopened_methods_fail() {
        let mut ctx = CodeGenContext::new();
        assert_eq!(ctx.end_method(), Err(CodegenError::NoCurrentMethod));
        ctx.begin_method("a", 0, 0, Type::None).unwrap();
        assert_eq!(
            ctx.begin_method("b", 0, 0, Type::None),
            Err(CodegenError::NestedMethod("b".into()))
        );
    }

    #[test]
    fn instructions_move_the_type_stack() {
        let mut ctx = CodeGenContext::new();
        ctx.begin_method("f", 0, 0, Type::None).unwrap();
        ctx.emit_op(Opcode::NewArray0, 0, Some(Type::list(Type::Int))).unwrap();
        ctx.push_int(-1).unwrap();

        ctx.duplicate(1).unwrap();
        ctx.emit_op(Opcode::Sign, 1, Some(Type::Int)).unwrap();
        ctx.push_int(-1).unwrap();
        assert_eq!(ctx.depth(), 4);
        ctx.branch(Opcode::JmpNe, None).unwrap();
        assert_eq!(ctx.depth(), 2);

        ctx.duplicate(2).unwrap();
        assert_eq!(ctx.peek(1).unwrap(), &Type::list(Type::Int));
        ctx.emit_op(Opcode::Size, 1, Some(Type::Int)).unwrap();
        ctx.swap().unwrap();
        assert_eq!(ctx.peek(2).unwrap(), &Type::Int);
        ctx.emit_op(Opcode::Add, 2, Some(Type::Int)).unwrap();
        assert_eq!(ctx.depth(), 2);

        ctx.emit_op(Opcode::PickItem, 2, Some(Type::Int)).unwrap();
        ctx.emit_op(Opcode::Drop, 1, None).unwrap();
        assert!(ctx.check_balanced().is_ok());
        assert!(ctx.peek(1).is_err());
    }

    #[test]
    fn underflow_is_a_fault() {
        let mut ctx = CodeGenContext::new();
        ctx.begin_method("f", 0, 0, Type::None).unwrap();
        ctx.push_int(1).unwrap();
        assert_eq!(
            ctx.emit_op(Opcode::Add, 2, Some(Type::Int)),
            Err(CodegenError::StackUnderflow("Add".into()))
        );
        assert!(ctx.branch(Opcode::JmpIfNot, None).is_ok());
        assert!(ctx.swap().is_err());
    }

    #[test]
    fn type_stack() {
        let mut ctx = CodeGenContext::new();
        ctx.begin_method("f", 0, 0, Type::None).unwrap();
        assert!(ctx.pop("x").is_err());
        ctx.push(Type::Bool);
        ctx.retype_top(Type::Int);
        assert_eq!(
            ctx.check_balanced(),
            Err(CodegenError::UnbalancedStack {
                method: "f".into(),
                depth: 1
            })
        );
        assert_eq!(ctx.pop("x").unwrap(), Type::Int);
        assert!(ctx.check_balanced().is_ok());
    }
}
