//! Statement compilation.

use neopyc_core::CodegenError;
use neopyc_parser::ast::{AssertStmt, Expr, IfStmt, Literal, ReturnStmt, Stmt, WhileStmt};

use super::function::{FunctionCompiler, Result};
use crate::bytecode::{CodeId, Opcode};
use crate::symbols::{Symbol, VariableKind};

/// How the key of an item assignment is produced.
enum ItemKey<'e, 'ast> {
    /// A struct field by index.
    Field(usize),
    /// A subscript.
    Index(&'e Expr<'ast>),
}

impl<'a, 'ast> FunctionCompiler<'a, 'ast> {
    pub fn compile_block(&mut self, stmts: &[Stmt<'ast>]) -> Result<()> {
        for stmt in stmts {
            self.compile_stmt(stmt)?;
            self.code.check_balanced()?;
        }
        Ok(())
    }

    fn compile_stmt(&mut self, stmt: &Stmt<'ast>) -> Result<()> {
        match stmt {
            Stmt::Expr(s) => {
                let depth = self.code.depth();
                self.compile_expr(&s.expr)?;
                while self.code.depth() > depth {
                    self.code.emit_op(Opcode::Drop, 1, None)?;
                }
                Ok(())
            }
            Stmt::Assign(s) => self.compile_assign(&s.target, &s.value),
            Stmt::AnnAssign(s) => match &s.value {
                Some(value) => self.compile_assign(&s.target, value),
                None => self.compile_declaration(&s.target),
            },
            Stmt::Return(s) => self.compile_return(s),
            Stmt::If(s) => self.compile_if(s),
            Stmt::While(s) => self.compile_while(s),
            Stmt::Break(_) => self.code.emitter().emit_break(),
            Stmt::Continue(_) => self.code.emitter().emit_continue(),
            Stmt::Pass(_) => Ok(()),
            Stmt::Assert(s) => self.compile_assert(s),
            Stmt::AugAssign(_) | Stmt::For(_) => Err(CodegenError::Unexpected(format!(
                "statement at {} was not normalised",
                stmt.span()
            ))),
            Stmt::FunctionDef(_) | Stmt::ClassDef(_) | Stmt::Import(_) | Stmt::ImportFrom(_) => Err(
                CodegenError::Unexpected(format!("definition at {} inside a method body", stmt.span())),
            ),
        }
    }

    // =========================================================================
    // Assignment
    // =========================================================================

    fn compile_assign(&mut self, target: &Expr<'ast>, value: &Expr<'ast>) -> Result<()> {
        match target {
            Expr::Name(name) => {
                let var = self.variable(name.id, name.name)?;
                // Constants are inlined at every use.
                if matches!(var.kind, VariableKind::Constant(_)) {
                    return Ok(());
                }
                self.compile_value(value)?;
                self.code.store(&var.kind)?;
                Ok(())
            }
            Expr::Attribute(attr) => {
                let ctx = self.ctx;
                let symbol = ctx
                    .model
                    .binding(attr.id)
                    .ok_or_else(|| CodegenError::UnresolvedSymbol(attr.attr.name.to_string()))?;
                let Symbol::Property(property) = ctx.symbols.symbol(symbol) else {
                    return Err(CodegenError::Unexpected(format!(
                        "assignment to '{}' which is not a field",
                        attr.attr.name
                    )));
                };
                self.compile_item_store(&attr.value, ItemKey::Field(property.index), value)
            }
            Expr::Subscript(sub) => self.compile_item_store(&sub.value, ItemKey::Index(&sub.index), value),
            other => Err(CodegenError::Unexpected(format!(
                "assignment to a {} at {}",
                other.describe(),
                other.span()
            ))),
        }
    }

    /// `container[key] = value` and `obj.field = value`.
    ///
    /// The value is compiled first and then moved behind the container and
    /// key, so `SETITEM` finds value on top, key below it and the
    /// container below both. Branches waiting for the statement's first
    /// instruction are held back while the value is compiled and land on
    /// the container instead; branches leaving the value land on `SETITEM`.
    /// The value's type leaves the type stack while its instructions are
    /// moved and returns on top of the key with them.
    fn compile_item_store(&mut self, container: &Expr<'ast>, key: ItemKey<'_, 'ast>, value: &Expr<'ast>) -> Result<()> {
        let before = self.code.emitter().code_mut().suspend_pending();
        let start = self.code.code().len();
        self.compile_value(value)?;
        let value_ty = self.code.pop("assigned value")?;
        let (value_first, value_last) = self.range_from(start)?;
        let inside_value = self.code.emitter().code_mut().suspend_pending();
        self.code.emitter().code_mut().resume_pending(before);

        self.compile_value(container)?;
        let mut skip = None;
        match key {
            ItemKey::Field(index) => {
                self.code.push_int(index as i128)?;
            }
            ItemKey::Index(expr) => {
                self.compile_value(expr)?;
                if self.needs_index_fix()? {
                    skip = self.emit_index_fix()?;
                }
            }
        }

        // Branches leaving the key continue with the moved value.
        let code = self.code.emitter().code_mut();
        let mut into_value = code.suspend_pending();
        into_value.extend(skip);
        code.move_to_end(value_first, value_last)?;
        for branch in into_value {
            code.set_target(branch, value_first)?;
        }
        code.resume_pending(inside_value);

        self.code.push(value_ty);
        self.code.emit_op(Opcode::SetItem, 3, None)?;
        Ok(())
    }

    /// First and last instruction emitted since position `start`.
    fn range_from(&self, start: usize) -> Result<(CodeId, CodeId)> {
        let code = self.code.code();
        match (code.at_position(start), code.last()) {
            (Some(first), Some(last)) => Ok((first, last)),
            _ => Err(CodegenError::Unexpected("assigned value produced no instructions".into())),
        }
    }

    /// `x: T` without a value stores the default of `T`.
    fn compile_declaration(&mut self, target: &Expr<'ast>) -> Result<()> {
        let Expr::Name(name) = target else {
            return Err(CodegenError::Unexpected(format!(
                "annotation without a value on a {}",
                target.describe()
            )));
        };
        let var = self.variable(name.id, name.name)?;
        if matches!(var.kind, VariableKind::Constant(_)) {
            return Ok(());
        }
        self.code.push_default(&var.ty.default_value(), var.ty.clone())?;
        self.code.store(&var.kind)?;
        Ok(())
    }

    // =========================================================================
    // Control flow
    // =========================================================================

    fn compile_return(&mut self, ret: &ReturnStmt<'ast>) -> Result<()> {
        let returns_value = !self.return_type.is_none();
        match ret.value {
            Some(value) if returns_value => {
                self.compile_value(&value)?;
            }
            Some(value) if !matches!(value.as_literal(), Some(Literal::None)) => {
                // Evaluated for its effects; a `None` function returns nothing.
                let depth = self.code.depth();
                self.compile_expr(&value)?;
                while self.code.depth() > depth {
                    self.code.emit_op(Opcode::Drop, 1, None)?;
                }
            }
            None if returns_value => {
                self.code.push_null()?;
            }
            _ => {}
        }
        let result = usize::from(returns_value);
        self.code.emit_op(Opcode::Ret, result, None)?;
        Ok(())
    }

    fn compile_if(&mut self, stmt: &IfStmt<'ast>) -> Result<()> {
        if !stmt.elifs.is_empty() {
            return Err(CodegenError::Unexpected(format!("elif chain at {} was not normalised", stmt.span)));
        }

        self.compile_value(&stmt.test)?;
        let orelse = self.code.branch(Opcode::JmpIfNot, None)?;
        self.compile_block(stmt.body)?;

        if stmt.orelse.is_empty() {
            self.code.emitter().land_here([orelse]);
        } else {
            let end = self.code.branch(Opcode::Jmp, None)?;
            self.code.emitter().land_here([orelse]);
            self.compile_block(stmt.orelse)?;
            self.code.emitter().land_here([end]);
        }
        Ok(())
    }

    /// ```text
    ///         JMP test
    /// body:   <body>
    /// test:   <condition>
    ///         JMPIF body
    /// ```
    /// `continue` jumps to the condition, `break` past the `JMPIF`.
    fn compile_while(&mut self, stmt: &WhileStmt<'ast>) -> Result<()> {
        let to_test = self.code.branch(Opcode::Jmp, None)?;
        let body_start = self.code.code().len();

        self.code.emitter().enter_loop();
        let body = self.compile_block(stmt.body);
        let exits = self.code.emitter().exit_loop();
        body?;

        self.code.emitter().land_here(std::iter::once(to_test).chain(exits.continue_jumps.into_iter().map(Some)));
        self.compile_value(&stmt.test)?;

        // With an empty body the loop jumps straight back to its test.
        let body_first = self
            .code
            .code()
            .at_position(body_start)
            .ok_or_else(|| CodegenError::Unexpected(format!("empty while loop at {}", stmt.span)))?;
        self.code.branch(Opcode::JmpIf, Some(body_first))?;
        self.code.emitter().land_here(exits.break_jumps.into_iter().map(Some));
        Ok(())
    }

    fn compile_assert(&mut self, stmt: &AssertStmt<'ast>) -> Result<()> {
        self.compile_value(&stmt.test)?;
        match &stmt.msg {
            Some(msg) => {
                self.compile_value(msg)?;
                self.code.emit_op(Opcode::AssertMsg, 2, None)?;
            }
            None => {
                self.code.emit_op(Opcode::Assert, 1, None)?;
            }
        }
        Ok(())
    }
}
