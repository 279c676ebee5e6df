//! Constant folding.
//!
//! Runs after type checking over every analysed module. Expressions whose
//! operands are all known at compile time are evaluated and the result is
//! recorded with [`SemanticModel::fold`](crate::semantic::SemanticModel::fold);
//! the code generator pushes the folded value instead of emitting the
//! operation. Folding mirrors the VM's semantics: integer division and
//! remainder truncate toward zero, and nothing that would fault at run time
//! (division by zero, an out-of-range shift) is folded.

use neopyc_core::{Constant, Type};
use neopyc_parser::ast::{BinaryOp, Expr, Stmt, UnaryOp};
use num_bigint::BigInt;

use crate::context::CompilationContext;
use crate::symbols::{Symbol, Variable, VariableKind};

/// Largest shift the folder evaluates; wider shifts are left to the VM.
const MAX_SHIFT: i128 = 126;

pub struct OptimizePass<'a, 'ast> {
    ctx: &'a mut CompilationContext<'ast>,
    folded: usize,
}

impl<'a, 'ast> OptimizePass<'a, 'ast> {
    pub fn new(ctx: &'a mut CompilationContext<'ast>) -> Self {
        Self { ctx, folded: 0 }
    }

    /// Fold every module; returns the number of folded expressions.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn run(mut self) -> usize {
        let bodies: Vec<&'ast [Stmt<'ast>]> = self.ctx.modules().iter().map(|module| module.ast.body).collect();
        for body in bodies {
            self.block(body);
        }
        tracing::debug!(folded = self.folded, "constant folding finished");
        self.folded
    }

    fn block(&mut self, stmts: &'ast [Stmt<'ast>]) {
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &Stmt<'ast>) {
        match stmt {
            Stmt::Expr(s) => {
                self.expr(&s.expr);
            }
            Stmt::Assign(s) => {
                self.expr(&s.target);
                self.expr(&s.value);
            }
            Stmt::AnnAssign(s) => {
                if let Some(value) = s.value {
                    self.expr(&value);
                }
            }
            Stmt::AugAssign(s) => {
                self.expr(&s.value);
            }
            Stmt::Return(s) => {
                if let Some(value) = s.value {
                    self.expr(&value);
                }
            }
            Stmt::If(s) => {
                self.expr(&s.test);
                self.block(s.body);
                self.block(s.orelse);
            }
            Stmt::While(s) => {
                self.expr(&s.test);
                self.block(s.body);
            }
            Stmt::For(s) => {
                self.expr(&s.iter);
                self.block(s.body);
            }
            Stmt::Assert(s) => {
                self.expr(&s.test);
                if let Some(msg) = s.msg {
                    self.expr(&msg);
                }
            }
            Stmt::FunctionDef(def) => self.block(def.body),
            Stmt::ClassDef(class) => self.block(class.body),
            Stmt::Break(_) | Stmt::Continue(_) | Stmt::Pass(_) | Stmt::Import(_) | Stmt::ImportFrom(_) => {}
        }
    }

    /// Fold `expr` and its subexpressions. Returns the compile-time value of
    /// `expr` if it has one.
    fn expr(&mut self, expr: &Expr<'ast>) -> Option<Constant> {
        match expr {
            Expr::Literal(lit) => Some(lit.value.to_constant()),
            Expr::Name(name) => self.constant_of(name.id),
            Expr::Attribute(attr) => {
                self.expr(&attr.value);
                self.constant_of(attr.id)
            }
            Expr::Binary(bin) => {
                let left = self.expr(&bin.left);
                let right = self.expr(&bin.right);
                // Only operations the checker accepted are folded.
                self.ctx.model.operation(bin.id)?;
                let value = fold_binary(bin.op, left?, right?)?;
                self.record(expr, value)
            }
            Expr::Unary(unary) => {
                let operand = self.expr(&unary.operand)?;
                self.ctx.model.operation(unary.id)?;
                let value = fold_unary(unary.op, operand)?;
                self.record(expr, value)
            }
            Expr::BoolOp(e) => {
                self.expr(&e.left);
                self.expr(&e.right);
                None
            }
            Expr::Compare(e) => {
                self.expr(&e.left);
                for comparator in e.comparators {
                    self.expr(comparator);
                }
                None
            }
            Expr::Call(call) => {
                self.expr(&call.func);
                for arg in call.args {
                    self.expr(arg);
                }
                None
            }
            Expr::Subscript(sub) => {
                self.expr(&sub.value);
                self.expr(&sub.index);
                None
            }
            Expr::Slice(slice) => {
                self.expr(&slice.value);
                for bound in [slice.lower, slice.upper].into_iter().flatten() {
                    self.expr(&bound);
                }
                None
            }
            Expr::List(seq) | Expr::Tuple(seq) => {
                for element in seq.elements {
                    self.expr(element);
                }
                None
            }
            Expr::Dict(dict) => {
                for item in dict.keys.iter().chain(dict.values) {
                    self.expr(item);
                }
                None
            }
            Expr::IfExp(e) => {
                self.expr(&e.test);
                self.expr(&e.body);
                self.expr(&e.orelse);
                None
            }
        }
    }

    /// Value of a name or module member bound to an inlined constant.
    fn constant_of(&self, node: neopyc_core::NodeId) -> Option<Constant> {
        let symbol = self.ctx.model.binding(node)?;
        match self.ctx.symbols.symbol(symbol) {
            Symbol::Variable(Variable {
                kind: VariableKind::Constant(value),
                ..
            }) => Some(value.clone()),
            _ => None,
        }
    }

    fn record(&mut self, expr: &Expr<'ast>, value: Constant) -> Option<Constant> {
        // A folded value must keep the static type the checker assigned.
        let expected = self.ctx.model.type_of(expr.id()).cloned().unwrap_or(Type::Any);
        if !expected.is_type_of(&value.ty()) {
            return None;
        }
        tracing::trace!(node = ?expr.id(), ?value, "folded");
        self.ctx.model.fold(expr.id(), value.clone());
        self.folded += 1;
        Some(value)
    }
}

fn as_int(value: &Constant) -> Option<i128> {
    match value {
        Constant::Int(v) => Some(*v),
        Constant::Bool(b) => Some(i128::from(*b)),
        _ => None,
    }
}

fn fold_binary(op: BinaryOp, left: Constant, right: Constant) -> Option<Constant> {
    match (op, &left, &right) {
        (BinaryOp::Add, Constant::Str(a), Constant::Str(b)) => return Some(Constant::Str(format!("{a}{b}"))),
        (BinaryOp::Add, Constant::Bytes(a), Constant::Bytes(b)) => {
            let mut joined = a.clone();
            joined.extend_from_slice(b);
            return Some(Constant::Bytes(joined));
        }
        _ => {}
    }

    let a = as_int(&left)?;
    let b = as_int(&right)?;
    let value = match op {
        BinaryOp::Add => a.checked_add(b)?,
        BinaryOp::Sub => a.checked_sub(b)?,
        BinaryOp::Mul => a.checked_mul(b)?,
        BinaryOp::FloorDiv if b != 0 => a.checked_div(b)?,
        BinaryOp::Mod if b != 0 => a.checked_rem(b)?,
        BinaryOp::Pow => a.checked_pow(u32::try_from(b).ok()?)?,
        BinaryOp::LShift if (0..=MAX_SHIFT).contains(&b) => {
            let shifted = a.checked_shl(b as u32)?;
            if shifted >> b != a {
                return None;
            }
            shifted
        }
        BinaryOp::RShift if (0..=MAX_SHIFT).contains(&b) => a >> b,
        BinaryOp::BitAnd => a & b,
        BinaryOp::BitOr => a | b,
        BinaryOp::BitXor => a ^ b,
        _ => return None,
    };
    Some(Constant::Int(value))
}

fn fold_unary(op: UnaryOp, operand: Constant) -> Option<Constant> {
    match (op, operand) {
        (UnaryOp::Neg, Constant::Int(v)) => Some(Constant::integer(-BigInt::from(v))),
        (UnaryOp::Neg, Constant::BigInt(v)) => Some(Constant::integer(-v)),
        (UnaryOp::Pos, Constant::Int(v)) => Some(Constant::Int(v)),
        (UnaryOp::Invert, Constant::Int(v)) => Some(Constant::Int(!v)),
        (UnaryOp::Not, Constant::Bool(b)) => Some(Constant::Bool(!b)),
        _ => None,
    }
}
