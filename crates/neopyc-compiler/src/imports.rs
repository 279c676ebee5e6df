//! Import resolution.
//!
//! An import target resolves to a builtin package, a module that was
//! already analysed, a file that still has to be analysed, nothing, or a
//! module that is currently being analysed further up the import stack.
//! Resolution never recurses by itself; only [`Found`](ImportResolution::Found)
//! leads the context into a nested analysis.

use std::path::PathBuf;

use neopyc_core::{CompilerError, CompilerWarning, ModuleId, ScopeId, Span};
use neopyc_parser::ast::{ImportFromStmt, ImportStmt};

use crate::context::CompilationContext;
use crate::loader::{module_candidates, relative_base};
use crate::symbols::{Import, Symbol, SymbolEntry, SymbolFlags};

/// Outcome of resolving an import target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportResolution {
    /// A builtin package such as `typing` or `interop.storage`.
    Builtin(ScopeId),
    /// A module analysed earlier in this compilation.
    Cached(ModuleId),
    /// A source file that has not been analysed yet.
    Found(PathBuf),
    NotFound,
    /// The target is being analysed right now: a circular import.
    Recursive,
}

/// Names a star import skips: private names and compiler temporaries.
pub(crate) fn is_private(name: &str) -> bool {
    name.starts_with('_') || name.starts_with('$')
}

impl<'ast> CompilationContext<'ast> {
    /// Resolve `module` as imported from `importer` with `level` leading
    /// dots.
    pub fn resolve_import(&self, importer: ModuleId, module: &str, level: u32) -> ImportResolution {
        if level == 0 {
            if let Some(scope) = self.builtins.package(module) {
                return ImportResolution::Builtin(scope);
            }
        }

        let base = if level == 0 {
            self.project_root.clone()
        } else {
            relative_base(&self.module(importer).path, level)
        };
        let candidates = if module.is_empty() {
            vec![crate::loader::normalize(&base.join("__init__.py"))]
        } else {
            module_candidates(&base, module).to_vec()
        };

        for candidate in candidates {
            if self.import_stack.contains(&candidate) {
                return ImportResolution::Recursive;
            }
            if let Some(&id) = self.cache.get(&candidate) {
                return ImportResolution::Cached(id);
            }
            if self.loader.exists(&candidate) {
                return ImportResolution::Found(candidate);
            }
        }
        ImportResolution::NotFound
    }

    /// Resolve an import target and analyse it if needed.
    fn import_target(&mut self, importer: ModuleId, module: &str, level: u32, span: Span) -> Option<Import> {
        let resolution = self.resolve_import(importer, module, level);
        tracing::trace!(import = module, level, ?resolution, "resolved import");

        let display = format!("{}{module}", ".".repeat(level as usize));
        let imported = match resolution {
            ImportResolution::Builtin(scope) => return Some(Import { scope, module: None }),
            ImportResolution::Cached(id) => id,
            ImportResolution::Found(path) => self.analyse_module(path, false, span)?,
            ImportResolution::NotFound => {
                self.diagnostics
                    .error(CompilerError::UnresolvedImport { target: display, span });
                return None;
            }
            ImportResolution::Recursive => {
                self.diagnostics
                    .error(CompilerError::CircularImport { target: display, span });
                return None;
            }
        };

        self.add_import_edge(importer, imported);
        Some(Import {
            scope: self.module(imported).scope,
            module: Some(imported),
        })
    }

    /// `import a`, `import a.b as c`
    pub(crate) fn import_modules(&mut self, importer: ModuleId, stmt: &ImportStmt<'ast>) {
        let scope = self.module(importer).scope;

        for alias in stmt.names {
            let dotted = alias.name.contains('.');
            let (target, bound) = match alias.asname {
                Some(asname) => (alias.name, asname.name),
                None if dotted && self.builtins.package(alias.name).is_some() => {
                    let root = alias.name.split('.').next().unwrap_or(alias.name);
                    (root, root)
                }
                None if dotted => {
                    self.diagnostics.error(CompilerError::unsupported(
                        "dotted module import without an alias",
                        alias.span,
                    ));
                    continue;
                }
                None => (alias.name, alias.name),
            };

            let Some(import) = self.import_target(importer, target, 0, alias.span) else {
                continue;
            };
            let entry = SymbolEntry::new(bound, Symbol::Import(import)).with_origin(alias.id, alias.span);
            let (symbol, _) = self.symbols.define(scope, entry);
            self.model.bind(alias.id, symbol);
        }
    }

    /// `from m import a, b as c` and `from m import *`
    pub(crate) fn import_names(&mut self, importer: ModuleId, stmt: &ImportFromStmt<'ast>) {
        let Some(import) = self.import_target(importer, stmt.module, stmt.level, stmt.span) else {
            return;
        };
        let scope = self.module(importer).scope;

        let merged: Vec<(String, _)> = if stmt.is_star() {
            self.symbols
                .scope(import.scope)
                .entries()
                .filter(|(name, _)| !is_private(name))
                .map(|(name, symbol)| (name.to_string(), symbol))
                .collect()
        } else {
            let mut merged = Vec::with_capacity(stmt.names.len());
            for alias in stmt.names {
                match self.symbols.lookup_local(import.scope, alias.name) {
                    Some(symbol) => {
                        self.model.bind(alias.id, symbol);
                        merged.push((alias.bound_name().to_string(), symbol));
                    }
                    None => self.diagnostics.error(CompilerError::UnresolvedImport {
                        target: format!("{}.{}", stmt.module, alias.name),
                        span: alias.span,
                    }),
                }
            }
            merged
        };

        let root = self.symbols.root();
        for (name, symbol) in merged {
            let entry = self.symbols.get_mut(symbol);
            entry.flags.remove(SymbolFlags::DEFINED_BY_ENTRY);
            let builtin = entry.flags.contains(SymbolFlags::BUILTIN);
            if !builtin && self.symbols.lookup_local(root, &name).is_some() {
                self.diagnostics.warning(CompilerWarning::NameShadowing {
                    name: name.clone(),
                    span: stmt.span,
                });
            }
            self.symbols.bind(scope, &name, symbol);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use bumpalo::Bump;

    use super::*;
    use crate::loader::MemoryLoader;

    fn analyse<'a>(arena: &'a Bump, loader: &'a MemoryLoader) -> CompilationContext<'a> {
        let mut ctx = CompilationContext::new(arena, loader, "p");
        ctx.analyse_entry(Path::new("p/main.py"));
        ctx
    }

    #[test]
    fn builtin_packages_resolve_without_files() {
        let arena = Bump::new();
        let loader = MemoryLoader::new().with_file("p/main.py", "");
        let ctx = analyse(&arena, &loader);
        let entry = ctx.entry().unwrap().id;

        assert!(matches!(
            ctx.resolve_import(entry, "interop.storage", 0),
            ImportResolution::Builtin(_)
        ));
        assert_eq!(ctx.resolve_import(entry, "nowhere", 0), ImportResolution::NotFound);
    }

    #[test]
    fn files_resolve_as_found_then_cached() {
        let arena = Bump::new();
        let loader = MemoryLoader::new()
            .with_file("p/main.py", "from util import helper\n")
            .with_file("p/util.py", "def helper() -> int:\n    return 1\n")
            .with_file("p/pkg/__init__.py", "");
        let ctx = analyse(&arena, &loader);
        assert!(!ctx.diagnostics.has_errors(), "{:?}", ctx.diagnostics.errors());
        let entry = ctx.entry().unwrap().id;

        assert!(matches!(ctx.resolve_import(entry, "util", 0), ImportResolution::Cached(_)));
        assert_eq!(
            ctx.resolve_import(entry, "pkg", 0),
            ImportResolution::Found(PathBuf::from("p/pkg/__init__.py"))
        );
        // Analysis is over, so the entry itself is no longer on the stack.
        assert_eq!(
            ctx.resolve_import(entry, "main", 0),
            ImportResolution::Cached(ModuleId::new(0))
        );
    }

    #[test]
    fn circular_import_is_reported_once() {
        let arena = Bump::new();
        let loader = MemoryLoader::new()
            .with_file("p/main.py", "import a\n")
            .with_file("p/a.py", "import b\n")
            .with_file("p/b.py", "import a\n");
        let ctx = analyse(&arena, &loader);

        let circular: Vec<_> = ctx
            .diagnostics
            .errors()
            .iter()
            .filter(|err| matches!(err, CompilerError::CircularImport { .. }))
            .collect();
        assert_eq!(circular.len(), 1);
        assert!(circular[0].to_string().contains("'a'"));
    }

    #[test]
    fn missing_name_in_from_import() {
        let arena = Bump::new();
        let loader = MemoryLoader::new()
            .with_file("p/main.py", "from util import nope\n")
            .with_file("p/util.py", "x = 1\n");
        let ctx = analyse(&arena, &loader);
        assert!(matches!(
            ctx.diagnostics.errors(),
            [CompilerError::UnresolvedImport { target, .. }] if target == "util.nope"
        ));
    }

    #[test]
    fn star_import_skips_private_names() {
        let arena = Bump::new();
        let loader = MemoryLoader::new()
            .with_file("p/main.py", "from util import *\n")
            .with_file("p/util.py", "public_value = 1\n_hidden = 2\n");
        let ctx = analyse(&arena, &loader);
        let scope = ctx.entry().unwrap().scope;

        assert!(ctx.symbols.lookup_local(scope, "public_value").is_some());
        assert!(ctx.symbols.lookup_local(scope, "_hidden").is_none());
    }

    #[test]
    fn relative_import_from_package() {
        let arena = Bump::new();
        let loader = MemoryLoader::new()
            .with_file("p/main.py", "from pkg.a import f\n")
            .with_file("p/pkg/a.py", "from .b import g\ndef f() -> int:\n    return g()\n")
            .with_file("p/pkg/b.py", "def g() -> int:\n    return 2\n");
        let ctx = analyse(&arena, &loader);
        assert!(!ctx.diagnostics.has_errors(), "{:?}", ctx.diagnostics.errors());
        assert_eq!(ctx.modules().len(), 3);
    }

    #[test]
    fn dotted_user_import_needs_an_alias() {
        let arena = Bump::new();
        let loader = MemoryLoader::new()
            .with_file("p/main.py", "import pkg.a\n")
            .with_file("p/pkg/a.py", "");
        let ctx = analyse(&arena, &loader);
        assert!(matches!(
            ctx.diagnostics.errors(),
            [CompilerError::UnsupportedSyntax { .. }]
        ));
    }
}
