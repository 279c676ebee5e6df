//! Expression compilation.
//!
//! Every compiled expression leaves at most one value on the VM stack. Each
//! instruction moves the context's type stack with it, and the value an
//! expression leaves is retyped to the expression's checked type once it
//! is complete. Indexing decisions read the operand types off that stack.

use neopyc_core::{CodegenError, StackItemType, Type};
use neopyc_parser::ast::{
    AttributeExpr, BinaryExpr, BoolOp, BoolOpExpr, DictExpr, Expr, IfExpr, Literal, SequenceExpr, SliceExpr,
    SubscriptExpr, UnaryExpr,
};

use super::function::{FunctionCompiler, Result};
use crate::builtins::TemplateOp;
use crate::bytecode::{CodeId, Opcode};
use crate::symbols::Symbol;

impl<'a, 'ast> FunctionCompiler<'a, 'ast> {
    /// Compile an expression whose value is used. An expression that
    /// produces nothing, such as a call of a `None` function, pushes `None`.
    pub(super) fn compile_value(&mut self, expr: &Expr<'ast>) -> Result<()> {
        let depth = self.code.depth();
        self.compile_expr(expr)?;
        if self.code.depth() == depth {
            self.code.push_null()?;
        }
        Ok(())
    }

    /// Compile an expression, leaving at most one value.
    pub(super) fn compile_expr(&mut self, expr: &Expr<'ast>) -> Result<()> {
        let ctx = self.ctx;
        if let Some(value) = ctx.model.folded(expr.id()) {
            self.code.push_constant(value)?;
            return Ok(());
        }

        let depth = self.code.depth();
        match expr {
            Expr::Literal(lit) => {
                self.code.push_constant(&lit.value.to_constant())?;
            }
            Expr::Name(name) => {
                let var = self.variable(name.id, name.name)?;
                self.code.load(&var.kind, var.ty.clone())?;
            }
            Expr::Attribute(attr) => self.compile_attribute(attr)?,
            Expr::Binary(bin) => self.compile_binary(bin)?,
            Expr::Unary(unary) => self.compile_unary(unary)?,
            Expr::BoolOp(bool_op) => self.compile_bool_op(bool_op)?,
            Expr::Call(call) => self.compile_call(call)?,
            Expr::Subscript(sub) => self.compile_subscript(sub)?,
            Expr::Slice(slice) => self.compile_slice(slice)?,
            Expr::List(seq) | Expr::Tuple(seq) => self.compile_sequence(seq)?,
            Expr::Dict(dict) => self.compile_dict(dict)?,
            Expr::IfExp(if_exp) => self.compile_if_exp(if_exp)?,
            Expr::Compare(cmp) => {
                return Err(CodegenError::Unexpected(format!(
                    "comparison chain at {} reached code generation",
                    cmp.span
                )));
            }
        }

        match self.code.depth().checked_sub(depth) {
            Some(0) => Ok(()),
            Some(1) => {
                if let Some(ty) = ctx.model.effective_type(expr.id()) {
                    self.code.retype_top(ty.clone());
                }
                Ok(())
            }
            _ => Err(CodegenError::UnbalancedStack {
                method: self.code.current_method().unwrap_or_default().to_string(),
                depth: self.code.depth(),
            }),
        }
    }

    fn compile_attribute(&mut self, attr: &AttributeExpr<'ast>) -> Result<()> {
        let ctx = self.ctx;
        let symbol = ctx
            .model
            .binding(attr.id)
            .ok_or_else(|| CodegenError::UnresolvedSymbol(attr.attr.name.to_string()))?;
        match ctx.symbols.symbol(symbol) {
            // A member of an imported module or package.
            Symbol::Variable(var) => {
                self.code.load(&var.kind, var.ty.clone())?;
            }
            Symbol::Property(property) => {
                self.compile_value(&attr.value)?;
                self.code.push_int(property.index as i128)?;
                self.code.emit_op(Opcode::PickItem, 2, Some(property.ty.clone()))?;
            }
            other => {
                return Err(CodegenError::Unexpected(format!(
                    "{} '{}' used as a value",
                    other.kind_name(),
                    attr.attr.name
                )));
            }
        }
        Ok(())
    }

    // =========================================================================
    // Operators
    // =========================================================================

    fn compile_binary(&mut self, bin: &BinaryExpr<'ast>) -> Result<()> {
        let ctx = self.ctx;
        let operation = ctx
            .model
            .operation(bin.id)
            .ok_or_else(|| CodegenError::Unexpected(format!("operator '{}' was not resolved", bin.op)))?;

        let operands = if operation.template.first() == Some(&TemplateOp::Op(Opcode::IsNull)) {
            // Only the side that is not the `None` literal is evaluated.
            let operand = match bin.left.as_literal() {
                Some(Literal::None) => &bin.right,
                _ => &bin.left,
            };
            self.compile_value(operand)?;
            1
        } else {
            self.compile_value(&bin.left)?;
            self.compile_value(&bin.right)?;
            2
        };
        let result = self.type_of(bin.id);
        self.code.emit_template(&operation.template, operands, Some(result))
    }

    fn compile_unary(&mut self, unary: &UnaryExpr<'ast>) -> Result<()> {
        let ctx = self.ctx;
        let operation = ctx
            .model
            .operation(unary.id)
            .ok_or_else(|| CodegenError::Unexpected(format!("operator '{}' was not resolved", unary.op)))?;
        self.compile_value(&unary.operand)?;
        let result = self.type_of(unary.id);
        self.code.emit_template(&operation.template, 1, Some(result))
    }

    fn compile_bool_op(&mut self, bool_op: &BoolOpExpr<'ast>) -> Result<()> {
        self.compile_value(&bool_op.left)?;
        self.compile_value(&bool_op.right)?;
        let opcode = match bool_op.op {
            BoolOp::And => Opcode::BoolAnd,
            BoolOp::Or => Opcode::BoolOr,
        };
        self.code.emit_op(opcode, 2, Some(Type::Bool))?;
        Ok(())
    }

    // =========================================================================
    // Indexing
    // =========================================================================

    /// `container[index]` with the container below the index on the stack.
    fn compile_subscript(&mut self, sub: &SubscriptExpr<'ast>) -> Result<()> {
        self.compile_value(&sub.value)?;
        self.compile_value(&sub.index)?;

        let container = self.code.peek(2)?.clone();
        if self.needs_index_fix()? {
            let skip = self.emit_index_fix()?;
            self.code.emitter().land_here([skip]);
        }
        let item = self.type_of(sub.id);
        if container == Type::Str {
            self.code.push_int(1)?;
            self.code.emit_op(Opcode::Substr, 3, Some(item))?;
        } else {
            self.code.emit_op(Opcode::PickItem, 2, Some(item))?;
        }
        Ok(())
    }

    /// Whether the container and index on top of the stack need the
    /// negative-index correction: any container that is not a map, indexed
    /// by an exact `int`.
    pub(super) fn needs_index_fix(&self) -> Result<bool> {
        let index = self.code.peek(1)?;
        let container = self.code.peek(2)?;
        Ok(container.stack_item() != StackItemType::Map && *index == Type::Int)
    }

    /// With the container and index on the stack, replace a negative index
    /// by `index + len`. Returns the branch skipping the correction; it must
    /// be pointed at whatever consumes the index.
    pub(super) fn emit_index_fix(&mut self) -> Result<Option<CodeId>> {
        self.code.duplicate(1)?;
        self.code.emit_op(Opcode::Sign, 1, Some(Type::Int))?;
        self.code.push_int(-1)?;
        let skip = self.code.branch(Opcode::JmpNe, None)?;
        self.code.duplicate(2)?;
        self.code.emit_op(Opcode::Size, 1, Some(Type::Int))?;
        self.code.emit_op(Opcode::Add, 2, Some(Type::Int))?;
        Ok(skip)
    }

    fn compile_slice(&mut self, slice: &SliceExpr<'ast>) -> Result<()> {
        self.compile_value(&slice.value)?;
        let sliced = self.type_of(slice.id);
        match (slice.lower, slice.upper) {
            (Some(lower), Some(upper)) => {
                self.compile_value(&lower)?;
                self.compile_value(&upper)?;
                self.code.duplicate(2)?;
                self.code.emit_op(Opcode::Sub, 2, Some(Type::Int))?;
                self.code.emit_op(Opcode::Substr, 3, Some(sliced))?;
            }
            (None, Some(upper)) => {
                self.compile_value(&upper)?;
                self.code.emit_op(Opcode::Left, 2, Some(sliced))?;
            }
            (Some(lower), None) => {
                self.compile_value(&lower)?;
                self.code.duplicate(2)?;
                self.code.emit_op(Opcode::Size, 1, Some(Type::Int))?;
                self.code.swap()?;
                self.code.emit_op(Opcode::Sub, 2, Some(Type::Int))?;
                self.code.emit_op(Opcode::Right, 2, Some(sliced))?;
            }
            (None, None) => {}
        }
        Ok(())
    }

    // =========================================================================
    // Displays
    // =========================================================================

    fn compile_sequence(&mut self, seq: &SequenceExpr<'ast>) -> Result<()> {
        let ty = self.type_of(seq.id);
        if seq.elements.is_empty() {
            self.code.emit_op(Opcode::NewArray0, 0, Some(ty))?;
            return Ok(());
        }
        // PACK takes the top of the stack as element 0.
        for element in seq.elements.iter().rev() {
            self.compile_value(element)?;
        }
        self.code.push_int(seq.elements.len() as i128)?;
        self.code.emit_op(Opcode::Pack, seq.elements.len() + 1, Some(ty))?;
        Ok(())
    }

    fn compile_dict(&mut self, dict: &DictExpr<'ast>) -> Result<()> {
        let ty = self.type_of(dict.id);
        self.code.emit_op(Opcode::NewMap, 0, Some(ty))?;
        for (key, value) in dict.keys.iter().zip(dict.values) {
            self.code.duplicate(1)?;
            self.compile_value(key)?;
            self.compile_value(value)?;
            self.code.emit_op(Opcode::SetItem, 3, None)?;
        }
        Ok(())
    }

    /// Each arm leaves one value; the stack is modelled along the `body`
    /// path, then rewound to the branch point for `orelse`.
    fn compile_if_exp(&mut self, if_exp: &IfExpr<'ast>) -> Result<()> {
        self.compile_value(&if_exp.test)?;
        let orelse = self.code.branch(Opcode::JmpIfNot, None)?;

        self.compile_value(&if_exp.body)?;
        let end = self.code.branch(Opcode::Jmp, None)?;
        self.code.pop("conditional expression")?;

        self.code.emitter().land_here([orelse]);
        self.compile_value(&if_exp.orelse)?;
        self.code.emitter().land_here([end]);
        Ok(())
    }
}
