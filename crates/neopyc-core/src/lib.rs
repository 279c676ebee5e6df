//! Core types shared by every stage of the neopyc compiler.
//!
//! This crate holds the pieces that the parser, the semantic passes and the
//! code generator all agree on:
//!
//! - [`Span`] for source locations
//! - [`CompilerError`], [`CompilerWarning`] and [`CodegenError`] diagnostics
//! - the [`Type`] model with its VM stack representation ([`StackItemType`])
//! - [`Constant`] literal values
//! - arena identifiers ([`NodeId`], [`SymbolId`], [`ScopeId`], [`ModuleId`])

mod constant;
mod error;
mod ids;
mod span;
pub mod types;

pub use constant::Constant;
pub use error::{CodegenError, CompilerError, CompilerWarning, Diagnostics};
pub use ids::{ModuleId, NodeId, ScopeId, SymbolId};
pub use span::Span;
pub use types::{ClassType, DefaultValue, StackItemType, Type};
