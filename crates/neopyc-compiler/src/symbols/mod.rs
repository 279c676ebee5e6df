//! Symbol table model.
//!
//! - [`SymbolTable`] - arena of [`SymbolEntry`]s and [`Scope`] chains
//! - [`Symbol`] - the closed set of things a name can refer to
//! - [`VariableKind`] - where a variable lives at run time

mod symbol;
mod table;

pub use symbol::{
    ClassKind, Import, Method, MethodState, Property, Symbol, SymbolEntry, SymbolFlags,
    TypeConstructor, UserClass, Variable, VariableKind,
};
pub use table::{Scope, ScopeKind, SymbolTable};
