//! Lexer, parser and arena AST for the neopyc Python subset.
//!
//! Source text is tokenized with Python's indentation rules and parsed into
//! an AST whose nodes live in a [`bumpalo::Bump`] arena. Every node that the
//! later passes annotate carries a [`neopyc_core::NodeId`].
//!
//! ```
//! use bumpalo::Bump;
//! use neopyc_parser::{Parser, ast::Stmt};
//!
//! let arena = Bump::new();
//! let module = Parser::parse("x: int = 1\n", &arena).unwrap();
//! assert!(matches!(module.body[0], Stmt::AnnAssign(_)));
//! ```

pub mod ast;
pub mod lexer;

pub use ast::{Module, NodeIdGen, Parser};
pub use lexer::{Lexer, Token, TokenKind};
