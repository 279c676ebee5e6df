//! Compiles the body of one method.
//!
//! [`FunctionCompiler`] walks a checked, normalised statement list and
//! emits its instructions into the [`CodeGenContext`]. Expressions are
//! compiled in `expr.rs`, calls in `call.rs` and statements in `stmt.rs`;
//! everything the generator needs to know about a node comes from the
//! semantic model filled in by the analysis passes.

use neopyc_core::{CodegenError, NodeId, Type};

use super::CodeGenContext;
use crate::context::CompilationContext;
use crate::symbols::{Symbol, Variable};

pub(super) type Result<T> = std::result::Result<T, CodegenError>;

pub struct FunctionCompiler<'a, 'ast> {
    pub(super) ctx: &'a CompilationContext<'ast>,
    pub(super) code: &'a mut CodeGenContext,
    /// Declared return type of the method being compiled.
    pub(super) return_type: Type,
}

impl<'a, 'ast> FunctionCompiler<'a, 'ast> {
    pub fn new(ctx: &'a CompilationContext<'ast>, code: &'a mut CodeGenContext, return_type: Type) -> Self {
        Self {
            ctx,
            code,
            return_type,
        }
    }

    /// The variable a name or module member was bound to.
    pub(super) fn variable(&self, node: NodeId, name: &str) -> Result<&'a Variable> {
        let ctx: &'a CompilationContext<'ast> = self.ctx;
        let symbol = ctx
            .model
            .binding(node)
            .ok_or_else(|| CodegenError::UnresolvedSymbol(name.to_string()))?;
        match ctx.symbols.symbol(symbol) {
            Symbol::Variable(var) => Ok(var),
            other => Err(CodegenError::Unexpected(format!(
                "{} '{name}' used as a variable",
                other.kind_name()
            ))),
        }
    }

    /// Static type of an expression as recorded by the type checker.
    pub(super) fn type_of(&self, node: NodeId) -> Type {
        self.ctx.model.type_of(node).cloned().unwrap_or(Type::Any)
    }
}
