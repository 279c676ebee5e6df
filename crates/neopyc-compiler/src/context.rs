//! Compilation context shared by the analysis passes.
//!
//! One [`CompilationContext`] exists per compilation. It owns the AST arena
//! handle, the node id generator, the symbol table, the builtin catalog,
//! the semantic side tables, the analysed-module cache and the import
//! graph. Modules are analysed depth first: an import of a module that has
//! not been seen yet suspends the importer until the imported module has
//! been parsed, normalised, declared and type checked.

use std::path::{Path, PathBuf};

use bumpalo::Bump;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, DfsPostOrder};
use rustc_hash::FxHashMap;

use neopyc_core::{CompilerError, Diagnostics, ModuleId, ScopeId, Span};
use neopyc_parser::ast::{Module, NodeIdGen, Parser};

use crate::builtins::Builtins;
use crate::loader::SourceLoader;
use crate::passes::{DeclarationPass, NormalizePass, TypeCheckPass};
use crate::semantic::SemanticModel;
use crate::symbols::{ScopeKind, SymbolTable};

/// An analysed source file.
#[derive(Debug, Clone)]
pub struct ModuleInfo<'ast> {
    pub id: ModuleId,
    /// File stem, used in diagnostics and logs.
    pub name: String,
    pub path: PathBuf,
    /// The normalised AST.
    pub ast: Module<'ast>,
    /// Scope holding the module's top-level names.
    pub scope: ScopeId,
    pub node: NodeIndex,
    pub is_entry: bool,
}

/// State of one compilation run.
pub struct CompilationContext<'ast> {
    pub arena: &'ast Bump,
    pub ids: NodeIdGen,
    pub(crate) loader: &'ast dyn SourceLoader,
    pub project_root: PathBuf,
    pub symbols: SymbolTable,
    pub builtins: Builtins,
    pub model: SemanticModel,
    pub diagnostics: Diagnostics,
    pub(crate) modules: Vec<ModuleInfo<'ast>>,
    pub(crate) cache: FxHashMap<PathBuf, ModuleId>,
    /// Paths of the modules currently being analysed, outermost first.
    pub(crate) import_stack: Vec<PathBuf>,
    /// Edges point from importer to imported module.
    pub(crate) graph: DiGraph<ModuleId, ()>,
    global_count: usize,
}

impl<'ast> CompilationContext<'ast> {
    pub fn new(arena: &'ast Bump, loader: &'ast dyn SourceLoader, project_root: impl Into<PathBuf>) -> Self {
        let mut symbols = SymbolTable::new();
        let builtins = Builtins::seed(&mut symbols);
        Self {
            arena,
            ids: NodeIdGen::new(),
            loader,
            project_root: project_root.into(),
            symbols,
            builtins,
            model: SemanticModel::new(),
            diagnostics: Diagnostics::new(),
            modules: Vec::new(),
            cache: FxHashMap::default(),
            import_stack: Vec::new(),
            graph: DiGraph::new(),
            global_count: 0,
        }
    }

    /// Analyse the entry module and, through it, every module it imports.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn analyse_entry(&mut self, path: &Path) -> Option<ModuleId> {
        self.analyse_module(crate::loader::normalize(path), true, Span::default())
    }

    /// Parse, normalise, declare and type check one module.
    ///
    /// Returns `None` when the module could not be loaded or parsed; errors
    /// are recorded in [`diagnostics`](Self::diagnostics) either way.
    pub(crate) fn analyse_module(&mut self, path: PathBuf, is_entry: bool, span: Span) -> Option<ModuleId> {
        let source = match self.loader.load(&path) {
            Ok(source) => source,
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "could not load module");
                self.diagnostics.error(CompilerError::UnresolvedImport {
                    target: path.display().to_string(),
                    span,
                });
                return None;
            }
        };

        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        tracing::debug!(module = %name, entry = is_entry, "analysing module");

        let parsed = match Parser::parse_with_ids(&source, self.arena, &mut self.ids) {
            Ok(parsed) => parsed,
            Err(errors) => {
                for error in errors {
                    self.diagnostics.error(error);
                }
                return None;
            }
        };

        let errors_before = self.diagnostics.error_count();
        let ast = NormalizePass::new(self.arena, &mut self.ids, &mut self.diagnostics).run(parsed);
        if self.diagnostics.error_count() > errors_before {
            return None;
        }

        let id = ModuleId::from(self.modules.len());
        let scope = self
            .symbols
            .add_scope(Some(self.symbols.root()), ScopeKind::Module(id));
        let node = self.graph.add_node(id);
        self.modules.push(ModuleInfo {
            id,
            name,
            path: path.clone(),
            ast,
            scope,
            node,
            is_entry,
        });
        self.cache.insert(path.clone(), id);

        self.import_stack.push(path);
        let errors_before = self.diagnostics.error_count();
        DeclarationPass::new(self, id).run();
        if self.diagnostics.error_count() == errors_before {
            TypeCheckPass::new(self, id).run();
        }
        self.import_stack.pop();

        tracing::debug!(
            module = %self.modules[id.index()].name,
            errors = self.diagnostics.error_count(),
            "module analysed"
        );
        Some(id)
    }

    pub fn module(&self, id: ModuleId) -> &ModuleInfo<'ast> {
        &self.modules[id.index()]
    }

    pub fn modules(&self) -> &[ModuleInfo<'ast>] {
        &self.modules
    }

    pub fn entry(&self) -> Option<&ModuleInfo<'ast>> {
        self.modules.iter().find(|module| module.is_entry)
    }

    /// Reserve the next static field slot.
    pub(crate) fn add_global(&mut self) -> usize {
        let slot = self.global_count;
        self.global_count += 1;
        slot
    }

    /// Number of static fields across every module.
    pub fn global_count(&self) -> usize {
        self.global_count
    }

    pub(crate) fn add_import_edge(&mut self, importer: ModuleId, imported: ModuleId) {
        let from = self.modules[importer.index()].node;
        let to = self.modules[imported.index()].node;
        self.graph.update_edge(from, to, ());
    }

    /// Modules in depth-first order from the entry: the entry first, then
    /// what it imports.
    pub fn generation_order(&self) -> Vec<ModuleId> {
        let Some(entry) = self.entry() else {
            return Vec::new();
        };
        let mut order = Vec::with_capacity(self.modules.len());
        let mut dfs = Dfs::new(&self.graph, entry.node);
        while let Some(node) = dfs.next(&self.graph) {
            order.push(self.graph[node]);
        }
        order
    }

    /// Modules with every import ahead of its importer, the order module
    /// initialisers run in.
    pub fn initialization_order(&self) -> Vec<ModuleId> {
        let Some(entry) = self.entry() else {
            return Vec::new();
        };
        let mut order = Vec::with_capacity(self.modules.len());
        let mut dfs = DfsPostOrder::new(&self.graph, entry.node);
        while let Some(node) = dfs.next(&self.graph) {
            order.push(self.graph[node]);
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryLoader;

    #[test]
    fn entry_module_is_registered() {
        let arena = Bump::new();
        let loader = MemoryLoader::new().with_file("proj/main.py", "x: int = 1\n");
        let mut ctx = CompilationContext::new(&arena, &loader, "proj");

        let id = ctx.analyse_entry(Path::new("proj/main.py")).unwrap();
        assert!(!ctx.diagnostics.has_errors(), "{:?}", ctx.diagnostics.errors());
        assert_eq!(ctx.module(id).name, "main");
        assert!(ctx.entry().unwrap().is_entry);
        assert_eq!(ctx.global_count(), 1);
    }

    #[test]
    fn missing_entry_is_an_unresolved_import() {
        let arena = Bump::new();
        let loader = MemoryLoader::new();
        let mut ctx = CompilationContext::new(&arena, &loader, "proj");

        assert!(ctx.analyse_entry(Path::new("proj/main.py")).is_none());
        assert!(matches!(
            ctx.diagnostics.errors(),
            [CompilerError::UnresolvedImport { .. }]
        ));
    }

    #[test]
    fn import_order() {
        let arena = Bump::new();
        let loader = MemoryLoader::new()
            .with_file("p/main.py", "from a import f\nfrom b import g\n")
            .with_file("p/a.py", "from b import g\ndef f() -> int:\n    return g()\n")
            .with_file("p/b.py", "def g() -> int:\n    return 1\n");
        let mut ctx = CompilationContext::new(&arena, &loader, "p");
        ctx.analyse_entry(Path::new("p/main.py")).unwrap();
        assert!(!ctx.diagnostics.has_errors(), "{:?}", ctx.diagnostics.errors());

        let names = |order: Vec<ModuleId>| -> Vec<String> {
            order.into_iter().map(|id| ctx.module(id).name.clone()).collect()
        };
        assert_eq!(names(ctx.generation_order())[0], "main");
        assert_eq!(names(ctx.initialization_order()), vec!["b", "a", "main"]);
    }
}
