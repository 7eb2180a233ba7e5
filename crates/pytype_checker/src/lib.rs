//! Static type checker core for a dynamically-typed scripting language.
//!
//! The entry point is [`check_source`], which parses a single module's source text and runs the
//! [`visitor::Visitor`] over it with a fresh [`context::Context`], returning every diagnostic and
//! annotation record produced. Everything underneath is organized the way `main.py`/`context.py`
//! split the original implementation: a closed type lattice (`types`), a scoped name environment
//! (`symbol`/`scope`/`context`), narrowing (`narrow`), expression typing (`expr_typer`), deferred
//! function evaluation (`function_eval`), and the statement-level traversal that ties them
//! together (`visitor`).

pub mod annotation;
pub mod cache;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod expr_typer;
pub mod function_eval;
pub mod narrow;
pub mod node_key;
pub mod resolver;
pub mod scope;
pub mod symbol;
pub mod types;
pub mod visitor;

use std::path::Path;

use thiserror::Error;
use tracing::instrument;

use crate::cache::{AnalyzedModuleCache, NullCache};
use crate::context::Context;
use crate::resolver::{ModuleResolver, NullResolver};
use crate::scope::Scope;
use crate::visitor::{CheckResult, Visitor};

#[derive(Debug, Error)]
pub enum CheckError {
    #[error("could not parse '{path}': {message}")]
    Parse { path: String, message: String },
}

/// Checks a single module's source text with no import resolution or caching: every `import`
/// resolves to `Unknown`-attributed module instance (§6's "no resolver configured" default).
pub fn check_source(path: &Path, source: &str) -> Result<CheckResult, CheckError> {
    let resolver = NullResolver;
    let cache = NullCache;
    check_source_with(path, source, &resolver, &cache)
}

/// Checks a single module's source text, resolving imports through `resolver` and consulting
/// `cache` for previously-analyzed modules (§6).
#[instrument(skip_all, fields(path = %path.display()))]
pub fn check_source_with(
    path: &Path,
    source: &str,
    resolver: &dyn ModuleResolver,
    cache: &dyn AnalyzedModuleCache,
) -> Result<CheckResult, CheckError> {
    let parsed = ruff_python_parser::parse_module(source).map_err(|err| CheckError::Parse {
        path: path.display().to_string(),
        message: err.to_string(),
    })?;

    let mut ctx = Context::new(Scope::new());
    let visitor = Visitor::new(path.to_path_buf(), resolver, cache);
    Ok(visitor.check_module(parsed.syntax().body.as_slice(), &mut ctx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticCategory;
    use std::path::PathBuf;

    #[test]
    fn checks_a_simple_module_with_no_diagnostics() {
        let result = check_source(&PathBuf::from("mod.py"), "x: int = 1\n").unwrap();
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn reports_annotation_mismatch_end_to_end() {
        let result = check_source(&PathBuf::from("mod.py"), "x: str = 1\n").unwrap();
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].category, DiagnosticCategory::TypeError);
    }

    #[test]
    fn parse_error_surfaces_as_check_error() {
        let result = check_source(&PathBuf::from("mod.py"), "def (:\n");
        assert!(result.is_err());
    }
}
