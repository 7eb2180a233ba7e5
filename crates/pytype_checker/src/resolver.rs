//! Resolving an `import` statement to a module the checker can analyze (§6: "Module Resolver
//! external interface").
//!
//! Grounded in `red_knot_python_semantic::import_resolution`, simplified to this checker's flatter
//! module model: no namespace packages, no stub (`.pyi`) shadowing, no search-path precedence
//! rules beyond "first directory that has the file wins".

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedModule {
    pub path: PathBuf,
    pub source: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no module named '{0}' found on the search path")]
    NotFound(String),
    #[error("could not read '{path}': {message}")]
    Io { path: String, message: String },
    /// Returned instead of recursing when `import_name` is already being resolved higher up the
    /// same import chain; the caller substitutes a placeholder `object` instance type (§4.8).
    #[error("import cycle detected resolving '{0}'")]
    Cycle(String),
}

/// The external collaborator the checker asks to turn `import foo.bar` into source text. A real
/// CLI uses [`FsModuleResolver`]; tests can substitute an in-memory implementation.
pub trait ModuleResolver {
    fn resolve(&self, import_name: &str, current_path: &Path) -> Result<ResolvedModule, ResolveError>;
}

/// Resolves dotted import names against a fixed list of root search directories, the way the
/// original implementation walks `sys.path`-equivalent directories relative to the file being
/// checked.
pub struct FsModuleResolver {
    search_paths: Vec<PathBuf>,
}

impl FsModuleResolver {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self { search_paths }
    }

    /// A resolver rooted only at the directory containing the file being checked, the common case
    /// for a single-file invocation of the CLI.
    pub fn for_file(file_path: &Path) -> Self {
        let root = file_path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
        Self::new(vec![root])
    }

    fn candidate_paths(&self, import_name: &str) -> Vec<PathBuf> {
        let relative = import_name.replace('.', "/");
        self.search_paths
            .iter()
            .flat_map(|root| {
                vec![
                    root.join(format!("{relative}.py")),
                    root.join(&relative).join("__init__.py"),
                ]
            })
            .collect()
    }
}

impl ModuleResolver for FsModuleResolver {
    fn resolve(&self, import_name: &str, _current_path: &Path) -> Result<ResolvedModule, ResolveError> {
        for candidate in self.candidate_paths(import_name) {
            if candidate.is_file() {
                return match fs::read_to_string(&candidate) {
                    Ok(source) => Ok(ResolvedModule {
                        path: candidate,
                        source,
                    }),
                    Err(err) => Err(ResolveError::Io {
                        path: candidate.display().to_string(),
                        message: err.to_string(),
                    }),
                };
            }
        }
        Err(ResolveError::NotFound(import_name.to_string()))
    }
}

/// A resolver that never finds anything, used when the caller wants every import to resolve to
/// `Unknown` rather than hitting the filesystem (e.g. typing a single in-memory snippet in tests).
#[derive(Debug, Default)]
pub struct NullResolver;

impl ModuleResolver for NullResolver {
    fn resolve(&self, import_name: &str, _current_path: &Path) -> Result<ResolvedModule, ResolveError> {
        Err(ResolveError::NotFound(import_name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn resolves_sibling_module_by_name() {
        let dir = tempdir();
        let mut f = fs::File::create(dir.join("helper.py")).unwrap();
        writeln!(f, "x = 1").unwrap();

        let resolver = FsModuleResolver::for_file(&dir.join("main.py"));
        let resolved = resolver.resolve("helper", &dir.join("main.py")).unwrap();
        assert_eq!(resolved.source.trim(), "x = 1");
    }

    #[test]
    fn missing_module_is_not_found() {
        let dir = tempdir();
        let resolver = FsModuleResolver::for_file(&dir.join("main.py"));
        assert_eq!(
            resolver.resolve("does_not_exist", &dir.join("main.py")),
            Err(ResolveError::NotFound("does_not_exist".to_string()))
        );
    }

    fn tempdir() -> PathBuf {
        use std::sync::atomic::{AtomicU32, Ordering};
        static COUNTER: AtomicU32 = AtomicU32::new(0);

        let nonce = COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut dir = std::env::temp_dir();
        dir.push(format!("pytype_checker_test_{}_{nonce}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }
}
