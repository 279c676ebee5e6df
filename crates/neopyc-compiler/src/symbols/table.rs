//! Symbol arena and scope chains.
//!
//! Every symbol of a compilation lives in one arena and is referred to by
//! its [`SymbolId`]. Scopes map names to ids and point at their parent;
//! lookups walk from the innermost scope outwards, so two functions can
//! each have a local `x` without the names ever meeting.

use rustc_hash::FxHashMap;

use neopyc_core::{ModuleId, ScopeId, SymbolId};

use super::{Symbol, SymbolEntry};

// ============================================================================
// Scopes
// ============================================================================

/// What a scope belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// The root scope of pre-seeded builtins.
    Builtins,
    /// Members of a builtin package such as `interop.storage`.
    Package,
    Module(ModuleId),
    /// Parameters and locals of a function.
    Function(SymbolId),
    /// Fields and methods of a class. Not on any lookup chain; members are
    /// only reached through attribute access.
    Class(SymbolId),
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    pub kind: ScopeKind,
    names: FxHashMap<String, SymbolId>,
    /// Bound names in binding order.
    order: Vec<String>,
}

impl Scope {
    fn new(parent: Option<ScopeId>, kind: ScopeKind) -> Self {
        Self {
            parent,
            kind,
            names: FxHashMap::default(),
            order: Vec::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<SymbolId> {
        self.names.get(name).copied()
    }

    /// Bound names with their symbols, in binding order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, SymbolId)> + '_ {
        self.order
            .iter()
            .filter_map(|name| self.names.get(name).map(|id| (name.as_str(), *id)))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

// ============================================================================
// SymbolTable
// ============================================================================

/// Arena of symbols and scopes for one compilation.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    symbols: Vec<SymbolEntry>,
    scopes: Vec<Scope>,
    root: ScopeId,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    /// A table with an empty root scope.
    pub fn new() -> Self {
        Self {
            symbols: Vec::new(),
            scopes: vec![Scope::new(None, ScopeKind::Builtins)],
            root: ScopeId::new(0),
        }
    }

    /// The builtins scope every module scope descends from.
    pub fn root(&self) -> ScopeId {
        self.root
    }

    pub fn add_scope(&mut self, parent: Option<ScopeId>, kind: ScopeKind) -> ScopeId {
        let id = ScopeId::from(self.scopes.len());
        self.scopes.push(Scope::new(parent, kind));
        id
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    /// Allocate a symbol without binding it to any name.
    pub fn alloc(&mut self, entry: SymbolEntry) -> SymbolId {
        let id = SymbolId::from(self.symbols.len());
        self.symbols.push(entry);
        id
    }

    /// Allocate a symbol and bind it under its own name in `scope`.
    ///
    /// Returns the new id and the symbol it evicted, if the name was
    /// already bound in that scope.
    pub fn define(&mut self, scope: ScopeId, entry: SymbolEntry) -> (SymbolId, Option<SymbolId>) {
        let name = entry.name.clone();
        let id = self.alloc(entry);
        let evicted = self.bind(scope, &name, id);
        (id, evicted)
    }

    /// Bind an existing symbol under `name` in `scope`, evicting whatever
    /// was bound there before.
    pub fn bind(&mut self, scope: ScopeId, name: &str, id: SymbolId) -> Option<SymbolId> {
        let scope = &mut self.scopes[scope.index()];
        let evicted = scope.names.insert(name.to_string(), id);
        if evicted.is_some() {
            scope.order.retain(|bound| bound != name);
        }
        scope.order.push(name.to_string());
        evicted
    }

    pub fn get(&self, id: SymbolId) -> &SymbolEntry {
        &self.symbols[id.index()]
    }

    pub fn get_mut(&mut self, id: SymbolId) -> &mut SymbolEntry {
        &mut self.symbols[id.index()]
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.index()].symbol
    }

    pub fn symbol_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.index()].symbol
    }

    /// Look a name up in `scope` only.
    pub fn lookup_local(&self, scope: ScopeId, name: &str) -> Option<SymbolId> {
        self.scope(scope).get(name)
    }

    /// Look a name up from `scope` outwards.
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<SymbolId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let scope = self.scope(id);
            if let Some(symbol) = scope.get(name) {
                return Some(symbol);
            }
            current = scope.parent;
        }
        None
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}
