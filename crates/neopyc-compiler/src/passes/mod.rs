//! Compiler passes.
//!
//! - [`normalize`]: rewrite syntactic sugar into the core statement set
//! - [`declaration`]: create symbols for every definition of a module
//! - [`type_check`]: type every expression and resolve every reference
//! - [`optimize`]: fold compile-time constant expressions
//!
//! The first three run per module, driven by
//! [`CompilationContext::analyse_module`](crate::context::CompilationContext);
//! folding runs once over the whole program after analysis succeeded.

pub mod declaration;
pub mod normalize;
pub mod optimize;
pub mod type_check;

pub use declaration::DeclarationPass;
pub use normalize::NormalizePass;
pub use optimize::OptimizePass;
pub use type_check::TypeCheckPass;
