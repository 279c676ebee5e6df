//! Access to module sources.
//!
//! The compiler never touches the file system directly; every module is
//! read through a [`SourceLoader`]. [`FileSystemLoader`] reads real files,
//! [`MemoryLoader`] serves sources registered in memory.

use std::io;
use std::path::{Component, Path, PathBuf};

use rustc_hash::FxHashMap;

/// Reads module sources by path.
pub trait SourceLoader {
    fn load(&self, path: &Path) -> io::Result<String>;

    fn exists(&self, path: &Path) -> bool;
}

/// Loads sources from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSystemLoader;

impl SourceLoader for FileSystemLoader {
    fn load(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// Serves sources from a map of paths to contents.
///
/// Paths are normalised lexically, so `src/./a.py` and `src/a.py` name the
/// same file.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    files: FxHashMap<PathBuf, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl AsRef<Path>, source: impl Into<String>) -> Self {
        self.insert(path, source);
        self
    }

    pub fn insert(&mut self, path: impl AsRef<Path>, source: impl Into<String>) {
        self.files.insert(normalize(path.as_ref()), source.into());
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl SourceLoader for MemoryLoader {
    fn load(&self, path: &Path) -> io::Result<String> {
        self.files
            .get(&normalize(path))
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("{} not found", path.display())))
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(&normalize(path))
    }
}

/// Resolve `.` and `..` components without touching the file system.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Candidate files for a dotted module name under `base`: `a/b.py`, then
/// the package form `a/b/__init__.py`.
pub fn module_candidates(base: &Path, module: &str) -> [PathBuf; 2] {
    let mut dir = base.to_path_buf();
    let parts: Vec<&str> = module.split('.').filter(|part| !part.is_empty()).collect();
    for part in &parts {
        dir.push(part);
    }
    let file = dir.with_extension("py");
    let package = dir.join("__init__.py");
    [normalize(&file), normalize(&package)]
}

/// Directory a relative import with `level` leading dots starts from.
pub fn relative_base(importer: &Path, level: u32) -> PathBuf {
    let mut base = importer.parent().map(Path::to_path_buf).unwrap_or_default();
    for _ in 1..level {
        base.push("..");
    }
    normalize(&base)
}
