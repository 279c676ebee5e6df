//! Statement and definition nodes.

use neopyc_core::{NodeId, Span};

use crate::ast::{BinaryOp, Expr, Ident};

/// A statement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stmt<'ast> {
    Expr(&'ast ExprStmt<'ast>),
    Assign(&'ast AssignStmt<'ast>),
    AnnAssign(&'ast AnnAssignStmt<'ast>),
    AugAssign(&'ast AugAssignStmt<'ast>),
    Return(&'ast ReturnStmt<'ast>),
    If(&'ast IfStmt<'ast>),
    While(&'ast WhileStmt<'ast>),
    For(&'ast ForStmt<'ast>),
    Break(Span),
    Continue(Span),
    Pass(Span),
    Assert(&'ast AssertStmt<'ast>),
    FunctionDef(&'ast FunctionDef<'ast>),
    ClassDef(&'ast ClassDef<'ast>),
    Import(&'ast ImportStmt<'ast>),
    ImportFrom(&'ast ImportFromStmt<'ast>),
}

impl Stmt<'_> {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Expr(s) => s.span,
            Stmt::Assign(s) => s.span,
            Stmt::AnnAssign(s) => s.span,
            Stmt::AugAssign(s) => s.span,
            Stmt::Return(s) => s.span,
            Stmt::If(s) => s.span,
            Stmt::While(s) => s.span,
            Stmt::For(s) => s.span,
            Stmt::Break(span) | Stmt::Continue(span) | Stmt::Pass(span) => *span,
            Stmt::Assert(s) => s.span,
            Stmt::FunctionDef(s) => s.span,
            Stmt::ClassDef(s) => s.span,
            Stmt::Import(s) => s.span,
            Stmt::ImportFrom(s) => s.span,
        }
    }

    /// Whether control never falls through to the next statement.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stmt::Return(_) | Stmt::Break(_) | Stmt::Continue(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExprStmt<'ast> {
    pub expr: Expr<'ast>,
    pub span: Span,
}

/// `target = value`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssignStmt<'ast> {
    pub target: Expr<'ast>,
    pub value: Expr<'ast>,
    pub span: Span,
}

/// `target: annotation = value`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnnAssignStmt<'ast> {
    pub target: Expr<'ast>,
    pub annotation: Expr<'ast>,
    pub value: Option<Expr<'ast>>,
    pub span: Span,
}

/// `target op= value`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AugAssignStmt<'ast> {
    pub target: Expr<'ast>,
    pub op: BinaryOp,
    pub value: Expr<'ast>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReturnStmt<'ast> {
    pub value: Option<Expr<'ast>>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IfStmt<'ast> {
    pub test: Expr<'ast>,
    pub body: &'ast [Stmt<'ast>],
    /// `elif` clauses in source order; empty once normalised.
    pub elifs: &'ast [ElifClause<'ast>],
    pub orelse: &'ast [Stmt<'ast>],
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElifClause<'ast> {
    pub test: Expr<'ast>,
    pub body: &'ast [Stmt<'ast>],
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WhileStmt<'ast> {
    pub test: Expr<'ast>,
    pub body: &'ast [Stmt<'ast>],
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForStmt<'ast> {
    pub target: Expr<'ast>,
    pub iter: Expr<'ast>,
    pub body: &'ast [Stmt<'ast>],
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssertStmt<'ast> {
    pub test: Expr<'ast>,
    pub msg: Option<Expr<'ast>>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Param<'ast> {
    pub id: NodeId,
    pub name: Ident<'ast>,
    pub annotation: Option<Expr<'ast>>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FunctionDef<'ast> {
    pub id: NodeId,
    pub name: Ident<'ast>,
    pub params: &'ast [Param<'ast>],
    pub returns: Option<Expr<'ast>>,
    pub body: &'ast [Stmt<'ast>],
    /// Decorator expressions; consumed by normalisation.
    pub decorators: &'ast [Expr<'ast>],
    /// Set by normalisation for `@public` functions.
    pub public: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassDef<'ast> {
    pub id: NodeId,
    pub name: Ident<'ast>,
    pub bases: &'ast [Expr<'ast>],
    pub body: &'ast [Stmt<'ast>],
    pub span: Span,
}

/// One imported name: `a.b as c`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImportAlias<'ast> {
    pub id: NodeId,
    /// Dotted name as written.
    pub name: &'ast str,
    pub asname: Option<Ident<'ast>>,
    pub span: Span,
}

impl<'ast> ImportAlias<'ast> {
    /// The name bound in the importing scope.
    pub fn bound_name(&self) -> &'ast str {
        match self.asname {
            Some(alias) => alias.name,
            None => self.name,
        }
    }
}

/// `import a, b.c as d`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImportStmt<'ast> {
    pub names: &'ast [ImportAlias<'ast>],
    pub span: Span,
}

/// `from module import names` or `from module import *`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImportFromStmt<'ast> {
    pub id: NodeId,
    pub module: &'ast str,
    /// Number of leading dots of a relative import.
    pub level: u32,
    /// Empty for a star import.
    pub names: &'ast [ImportAlias<'ast>],
    pub span: Span,
}

impl ImportFromStmt<'_> {
    pub fn is_star(&self) -> bool {
        self.names.is_empty()
    }
}
