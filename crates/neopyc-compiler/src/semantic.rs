//! Side tables produced by analysis and read by the code generator.

use rustc_hash::FxHashMap;

use neopyc_core::{Constant, NodeId, SymbolId, Type};

use crate::builtins::BuiltinId;
use crate::builtins::operators::Operation;

/// What a call expression invokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Callee {
    /// A module-level function.
    Method(SymbolId),
    /// A method called on a receiver, which becomes argument 0.
    BoundMethod(SymbolId),
    Builtin(BuiltinId),
    /// Instantiation of a user class.
    Constructor(SymbolId),
    /// A method of a builtin collection, called on a receiver.
    Intrinsic(Intrinsic),
}

/// Methods of builtin collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intrinsic {
    /// `list.append(item)`
    Append,
    /// `dict.keys()`
    Keys,
    /// `dict.values()`
    Values,
}

/// Facts about AST nodes, keyed by [`NodeId`].
#[derive(Debug, Default)]
pub struct SemanticModel {
    types: FxHashMap<NodeId, Type>,
    bindings: FxHashMap<NodeId, SymbolId>,
    operations: FxHashMap<NodeId, Operation>,
    callees: FxHashMap<NodeId, Callee>,
    casts: FxHashMap<NodeId, Type>,
    folded: FxHashMap<NodeId, Constant>,
}

impl SemanticModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_type(&mut self, node: NodeId, ty: Type) {
        self.types.insert(node, ty);
    }

    /// Static type of an expression.
    pub fn type_of(&self, node: NodeId) -> Option<&Type> {
        self.types.get(&node)
    }

    /// Type an expression has once its implicit cast, if any, is applied.
    pub fn effective_type(&self, node: NodeId) -> Option<&Type> {
        self.casts.get(&node).or_else(|| self.types.get(&node))
    }

    pub fn bind(&mut self, node: NodeId, symbol: SymbolId) {
        self.bindings.insert(node, symbol);
    }

    /// Symbol a name, attribute or definition resolved to.
    pub fn binding(&self, node: NodeId) -> Option<SymbolId> {
        self.bindings.get(&node).copied()
    }

    pub fn set_operation(&mut self, node: NodeId, operation: Operation) {
        self.operations.insert(node, operation);
    }

    pub fn operation(&self, node: NodeId) -> Option<&Operation> {
        self.operations.get(&node)
    }

    pub fn set_callee(&mut self, node: NodeId, callee: Callee) {
        self.callees.insert(node, callee);
    }

    pub fn callee(&self, node: NodeId) -> Option<Callee> {
        self.callees.get(&node).copied()
    }

    /// Record that the value of `node` is used as `ty`. The cast changes
    /// the static type only; both representations share a stack item.
    pub fn add_cast(&mut self, node: NodeId, ty: Type) {
        self.casts.insert(node, ty);
    }

    pub fn cast(&self, node: NodeId) -> Option<&Type> {
        self.casts.get(&node)
    }

    pub fn fold(&mut self, node: NodeId, value: Constant) {
        self.folded.insert(node, value);
    }

    /// Compile-time value computed for an expression by the optimizer.
    pub fn folded(&self, node: NodeId) -> Option<&Constant> {
        self.folded.get(&node)
    }

    pub fn folded_count(&self) -> usize {
        self.folded.len()
    }
}
