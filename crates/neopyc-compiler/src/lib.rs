//! neopyc compiler
//!
//! Semantic analysis and Neo N3 code generation for the neopyc Python
//! subset.
//!
//! ## Pipeline
//!
//! 1. **Analysis**: every module reachable from the entry is parsed,
//!    normalised, declared and type checked, imports first
//! 2. **Folding**: constant expressions are evaluated once the whole
//!    program is known to be valid
//! 3. **Generation**: every method is emitted into one script and the
//!    branch targets are resolved to relative offsets
//!
//! Each stage collects diagnostics; the pipeline stops between stages once
//! an error has been reported.
//!
//! ## Modules
//!
//! - [`bytecode`]: opcodes, integer encoding and the instruction map
//! - [`emit`]: instruction patterns on top of the instruction map
//! - [`symbols`]: symbol arena and scopes
//! - [`builtins`]: builtin functions, interop packages and operators
//! - [`semantic`]: per-node results of analysis
//! - [`context`]: state of one compilation run
//! - [`imports`]: module resolution for `import` statements
//! - [`passes`]: normalisation, declaration, type checking and folding
//! - [`codegen`]: code generation

pub mod builtins;
pub mod bytecode;
pub mod codegen;
pub mod context;
pub mod emit;
pub mod imports;
pub mod loader;
pub mod passes;
pub mod return_checker;
pub mod semantic;
pub mod symbols;
pub mod type_resolver;

pub use codegen::{CodeGenerator, GeneratedCode, INITIALIZE, MethodInfo};
pub use context::CompilationContext;
pub use loader::{FileSystemLoader, MemoryLoader, SourceLoader};

pub use neopyc_core::{CodegenError, CompilerError, CompilerWarning};

use std::path::{Path, PathBuf};

use bumpalo::Bump;
use thiserror::Error;

use passes::OptimizePass;

/// Settings of one compilation.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    project_root: Option<PathBuf>,
    optimize: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            project_root: None,
            optimize: true,
        }
    }
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory absolute imports are resolved against. Defaults to the
    /// directory of the entry file.
    pub fn project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = Some(root.into());
        self
    }

    /// Fold constant expressions before generating code. On by default.
    pub fn optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    pub fn is_optimized(&self) -> bool {
        self.optimize
    }

    fn root_for(&self, entry: &Path) -> PathBuf {
        match &self.project_root {
            Some(root) => root.clone(),
            None => entry.parent().map(Path::to_path_buf).unwrap_or_default(),
        }
    }
}

/// A successfully compiled program.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledContract {
    /// The script of every method, `_initialize` last.
    pub bytecode: Vec<u8>,
    pub methods: Vec<MethodInfo>,
    pub warnings: Vec<CompilerWarning>,
}

impl CompiledContract {
    pub fn method(&self, name: &str) -> Option<&MethodInfo> {
        self.methods.iter().find(|method| method.name == name)
    }

    /// Methods callable from outside the contract.
    pub fn entry_points(&self) -> impl Iterator<Item = &MethodInfo> {
        self.methods.iter().filter(|method| method.public)
    }
}

/// Everything reported by a compilation that did not produce code.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("compilation failed with {} error(s)", .errors.len())]
pub struct CompileFailure {
    pub errors: Vec<CompilerError>,
    pub warnings: Vec<CompilerWarning>,
}

/// Compile the program whose entry module is `entry`.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn compile(
    entry: &Path,
    loader: &dyn SourceLoader,
    options: &CompileOptions,
) -> Result<CompiledContract, CompileFailure> {
    let arena = Bump::new();
    let mut ctx = CompilationContext::new(&arena, loader, options.root_for(entry));
    tracing::debug!(entry = %entry.display(), optimize = options.optimize, "compiling");

    let analysed = ctx.analyse_entry(entry);
    if ctx.diagnostics.has_errors() {
        return Err(failure(ctx));
    }
    if analysed.is_none() {
        ctx.diagnostics.error(CompilerError::Internal {
            message: format!("entry module '{}' produced no module", entry.display()),
        });
        return Err(failure(ctx));
    }

    if options.optimize {
        let folded = OptimizePass::new(&mut ctx).run();
        tracing::debug!(folded, "constant folding finished");
    }

    match CodeGenerator::new(&mut ctx).generate() {
        Ok(generated) => {
            let (_, warnings) = ctx.diagnostics.into_parts();
            Ok(CompiledContract {
                bytecode: generated.bytecode,
                methods: generated.methods,
                warnings,
            })
        }
        Err(err) => {
            tracing::debug!(error = %err, "code generation failed");
            ctx.diagnostics.error(CompilerError::Internal {
                message: err.to_string(),
            });
            Err(failure(ctx))
        }
    }
}

fn failure(ctx: CompilationContext<'_>) -> CompileFailure {
    let (errors, warnings) = ctx.diagnostics.into_parts();
    CompileFailure { errors, warnings }
}
