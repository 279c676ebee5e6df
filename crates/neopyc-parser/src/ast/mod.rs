//! Abstract syntax tree for the Python subset.
//!
//! This module provides:
//! - AST node definitions ([`Expr`], [`Stmt`] and their node structs)
//! - the recursive-descent [`Parser`]
//! - literal decoding helpers
//!
//! # Example
//!
//! ```
//! use neopyc_parser::Parser;
//! use bumpalo::Bump;
//!
//! let arena = Bump::new();
//! let source = "def add(a: int, b: int) -> int:\n    return a + b\n";
//!
//! match Parser::parse(source, &arena) {
//!     Ok(module) => println!("parsed {} statement(s)", module.body.len()),
//!     Err(errors) => eprintln!("{} error(s)", errors.len()),
//! }
//! ```

pub mod expr;
pub mod literal;
pub mod ops;
pub mod stmt;

mod expr_parser;
mod parser;
mod stmt_parser;

pub use expr::*;
pub use ops::*;
pub use parser::Parser;
pub use stmt::*;

use neopyc_core::{NodeId, Span};

/// An identifier with its location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ident<'ast> {
    pub name: &'ast str,
    pub span: Span,
}

impl<'ast> Ident<'ast> {
    #[inline]
    pub fn new(name: &'ast str, span: Span) -> Self {
        Self { name, span }
    }
}

/// A parsed source file.
///
/// All nodes are allocated in the arena passed to the parser and stay valid
/// for the arena's lifetime. Several modules of one compilation share an
/// arena and a [`NodeIdGen`].
#[derive(Debug, Clone, Copy)]
pub struct Module<'ast> {
    pub body: &'ast [Stmt<'ast>],
    pub span: Span,
}

/// Source of fresh [`NodeId`]s.
///
/// One generator is threaded through the parser and every pass that
/// synthesises nodes, keeping ids unique across a compilation.
#[derive(Debug, Default)]
pub struct NodeIdGen {
    next: u32,
}

impl NodeIdGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh(&mut self) -> NodeId {
        let id = NodeId::new(self.next);
        self.next += 1;
        id
    }

    /// Number of ids handed out so far.
    pub fn count(&self) -> u32 {
        self.next
    }
}
