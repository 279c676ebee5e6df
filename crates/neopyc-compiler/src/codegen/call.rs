//! Call compilation.
//!
//! Arguments are pushed last to first so the first argument ends up on top
//! of the stack, where both the VM's calling convention and the builtin
//! templates expect it. A bound method's receiver is pushed after the
//! arguments and becomes argument 0.

use neopyc_core::{CodegenError, SymbolId, Type};
use neopyc_parser::ast::{CallExpr, Expr};

use super::function::{FunctionCompiler, Result};
use crate::bytecode::Opcode;
use crate::semantic::{Callee, Intrinsic};
use crate::symbols::{ClassKind, Symbol};

impl<'a, 'ast> FunctionCompiler<'a, 'ast> {
    /// Compile a call; it leaves a value unless the callee returns `None`.
    pub(super) fn compile_call(&mut self, call: &CallExpr<'ast>) -> Result<()> {
        let ctx = self.ctx;
        let callee = ctx
            .model
            .callee(call.id)
            .ok_or_else(|| CodegenError::UnresolvedSymbol(format!("call at {}", call.span)))?;

        match callee {
            Callee::Builtin(id) => {
                let builtin = ctx.builtins.get(id);
                self.push_args(call.args)?;
                let result = Some(self.type_of(call.id)).filter(|ty| !ty.is_none());
                self.code.emit_template(&builtin.template, call.args.len(), result)
            }
            Callee::Method(method) => {
                self.push_args(call.args)?;
                let result = self.method_result(method)?;
                self.code.call(method, call.args.len(), result)?;
                Ok(())
            }
            Callee::BoundMethod(method) => {
                let receiver = receiver_of(call)?;
                self.push_args(call.args)?;
                self.compile_value(receiver)?;
                let result = self.method_result(method)?;
                self.code.call(method, call.args.len() + 1, result)?;
                Ok(())
            }
            Callee::Constructor(class) => self.compile_constructor(class, call.args),
            Callee::Intrinsic(intrinsic) => {
                let receiver = receiver_of(call)?;
                self.compile_value(receiver)?;
                for arg in call.args {
                    self.compile_value(arg)?;
                }
                let opcode = match intrinsic {
                    Intrinsic::Append => Opcode::Append,
                    Intrinsic::Keys => Opcode::Keys,
                    Intrinsic::Values => Opcode::Values,
                };
                let result = (intrinsic != Intrinsic::Append).then(|| self.type_of(call.id));
                self.code.emit_op(opcode, call.args.len() + 1, result)?;
                Ok(())
            }
        }
    }

    fn push_args(&mut self, args: &[Expr<'ast>]) -> Result<()> {
        for arg in args.iter().rev() {
            self.compile_value(arg)?;
        }
        Ok(())
    }

    /// `C(args)`: pack the field defaults into a struct, then run
    /// `__init__` on it. The struct stays on the stack as the result.
    fn compile_constructor(&mut self, class: SymbolId, args: &[Expr<'ast>]) -> Result<()> {
        let ctx = self.ctx;
        let Symbol::Class(ClassKind::User(user)) = ctx.symbols.symbol(class) else {
            return Err(CodegenError::Unexpected(format!(
                "'{}' is not a user class",
                ctx.symbols.get(class).name
            )));
        };

        // PACKSTRUCT takes the top of the stack as field 0.
        for field in user.fields.iter().rev() {
            let Symbol::Property(property) = ctx.symbols.symbol(*field) else {
                return Err(CodegenError::Unexpected(format!(
                    "field '{}' is not a property",
                    ctx.symbols.get(*field).name
                )));
            };
            self.code.push_default(&property.default, property.ty.clone())?;
        }
        self.code.push_int(user.fields.len() as i128)?;
        self.code
            .emit_op(Opcode::PackStruct, user.fields.len() + 1, Some(Type::Class(user.ty.clone())))?;

        if let Some(init) = user.init {
            self.push_args(args)?;
            // `self` is a copy of the struct below the arguments.
            self.code.duplicate(args.len() + 1)?;
            self.code.call(init, args.len() + 1, None)?;
        }
        Ok(())
    }

    /// Type a call of `method` leaves on the stack, if any.
    fn method_result(&self, method: SymbolId) -> Result<Option<Type>> {
        match self.ctx.symbols.symbol(method) {
            Symbol::Method(method) => Ok(Some(method.return_type.clone()).filter(|ty| !ty.is_none())),
            other => Err(CodegenError::Unexpected(format!("call of a {}", other.kind_name()))),
        }
    }
}

fn receiver_of<'e, 'ast>(call: &'e CallExpr<'ast>) -> Result<&'e Expr<'ast>> {
    match &call.func {
        Expr::Attribute(attr) => Ok(&attr.value),
        other => Err(CodegenError::Unexpected(format!(
            "method call on a {} at {}",
            other.describe(),
            call.span
        ))),
    }
}
