//! neopyc
//!
//! Compiles a statically typed subset of Python into Neo N3 VM bytecode.
//!
//! ```
//! use neopyc::Compiler;
//!
//! let contract = Compiler::new()
//!     .compile_source("@public\ndef add(a: int, b: int) -> int:\n    return a + b\n")
//!     .unwrap();
//!
//! let add = contract.method("add").unwrap();
//! assert!(add.public);
//! assert_eq!(add.args.len(), 2);
//! ```
//!
//! The crates behind the facade can be used directly:
//!
//! - [`core`]: spans, diagnostics, types and constants
//! - [`parser`]: lexer and parser producing the arena AST
//! - [`compiler`]: analysis passes and code generation

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub use neopyc_compiler as compiler;
pub use neopyc_core as core;
pub use neopyc_parser as parser;

pub use neopyc_compiler::{
    CompileFailure, CompileOptions, CompiledContract, FileSystemLoader, INITIALIZE, MemoryLoader, MethodInfo,
    SourceLoader,
};
pub use neopyc_core::{CompilerError, CompilerWarning, Span, Type};

/// Path under which [`Compiler::compile_source`] registers its input.
pub const SOURCE_PATH: &str = "main.py";

/// Errors returned by [`Compiler`].
#[derive(Debug, Error)]
pub enum Error {
    /// The program was read but did not compile.
    #[error(transparent)]
    Compile(#[from] CompileFailure),

    /// The entry file could not be read.
    #[error("cannot read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Diagnostics of a failed compilation, empty for I/O errors.
    pub fn errors(&self) -> &[CompilerError] {
        match self {
            Error::Compile(failure) => &failure.errors,
            Error::Io { .. } => &[],
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Compiles programs with one set of [`CompileOptions`].
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    options: CompileOptions,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: CompileOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Compile a single module held in memory. It can import builtin
    /// packages but no other files.
    pub fn compile_source(&self, source: &str) -> Result<CompiledContract> {
        let loader = MemoryLoader::new().with_file(SOURCE_PATH, source);
        self.compile_with_loader(Path::new(SOURCE_PATH), &loader)
    }

    /// Compile the program whose entry module is the file at `path`.
    pub fn compile_file(&self, path: impl AsRef<Path>) -> Result<CompiledContract> {
        let path = path.as_ref();
        std::fs::metadata(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "compiling file");
        self.compile_with_loader(path, &FileSystemLoader)
    }

    pub fn compile_with_loader(&self, entry: &Path, loader: &dyn SourceLoader) -> Result<CompiledContract> {
        neopyc_compiler::compile(entry, loader, &self.options).map_err(Error::from)
    }
}
