//! Content-addressed on-disk cache of a module's analysis result, keyed by a hash of its resolved
//! path and source text (§6: "Analyzed Module Cache external interface").
//!
//! Grounded in the original implementation's `hashlib.sha256(filepath + source)` + `pickle`
//! scheme and in `ouros`'s use of `postcard` for exactly this kind of on-disk snapshot. The cache
//! is optional and transparent to semantics (§6): a cache miss or absent cache simply means the
//! module gets re-analyzed, never a different result.
//!
//! `Type::Function` holds an `Rc<RefCell<FunctionEvaluator>>`, which cannot be meaningfully
//! serialized (its closure captures a whole `Context`), and `Type::Instance`/`Type::Class` embed
//! a `Scope` of attributes that isn't worth the complexity of a full structural cache format. The
//! `Persisted*` family below is a fully-owned mirror of the exported parts of [`Type`] used for
//! the cache; converting any of these three collapses them to the `Opaque` marker, which decodes
//! back to `Unknown`. A cached module that exports an instance, class, or function would lose
//! real information on a hit, so [`contains_opaque`] is used to keep such modules out of the
//! cache entirely — they're always freshly analyzed, and the Round-trip property (get after put
//! always returns what was put) holds for every module that *is* cached.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::diagnostics::{Diagnostic, DiagnosticCategory};
use crate::types::Type;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum PersistedType {
    Unknown,
    NoneType,
    Bool,
    Num,
    Str,
    List(Box<PersistedType>),
    Dict(Box<PersistedType>, Box<PersistedType>),
    Set(Box<PersistedType>),
    Tuple(Vec<PersistedType>),
    BaseTuple,
    Maybe(Box<PersistedType>),
    Union(Vec<PersistedType>),
    /// Collapses `Instance`, `Class`, and any `Function` (resolved or still-deferred) to the
    /// single "opaque" case this cache format can represent faithfully.
    Opaque,
}

impl PersistedType {
    /// Reverses [`From<&Type>`]; `Opaque` comes back as `Unknown` since the original
    /// instance/class/function identity was never recorded.
    pub fn to_type(&self) -> Type {
        match self {
            PersistedType::Unknown | PersistedType::Opaque => Type::Unknown,
            PersistedType::NoneType => Type::NoneType,
            PersistedType::Bool => Type::Bool,
            PersistedType::Num => Type::Num,
            PersistedType::Str => Type::Str,
            PersistedType::List(inner) => Type::List(Box::new(inner.to_type())),
            PersistedType::Dict(k, v) => Type::Dict(Box::new(k.to_type()), Box::new(v.to_type())),
            PersistedType::Set(inner) => Type::Set(Box::new(inner.to_type())),
            PersistedType::Tuple(elts) => Type::Tuple(elts.iter().map(PersistedType::to_type).collect()),
            PersistedType::BaseTuple => Type::BaseTuple,
            PersistedType::Maybe(inner) => Type::Maybe(Box::new(inner.to_type())),
            PersistedType::Union(alts) => Type::Union(alts.iter().map(PersistedType::to_type).collect()),
        }
    }
}

impl From<&Type> for PersistedType {
    fn from(ty: &Type) -> Self {
        match ty {
            Type::Unknown => PersistedType::Unknown,
            Type::NoneType => PersistedType::NoneType,
            Type::Bool => PersistedType::Bool,
            Type::Num => PersistedType::Num,
            Type::Str => PersistedType::Str,
            Type::List(inner) => PersistedType::List(Box::new(PersistedType::from(inner.as_ref()))),
            Type::Dict(k, v) => PersistedType::Dict(
                Box::new(PersistedType::from(k.as_ref())),
                Box::new(PersistedType::from(v.as_ref())),
            ),
            Type::Set(inner) => PersistedType::Set(Box::new(PersistedType::from(inner.as_ref()))),
            Type::Tuple(elts) => PersistedType::Tuple(elts.iter().map(PersistedType::from).collect()),
            Type::BaseTuple => PersistedType::BaseTuple,
            Type::Maybe(inner) => PersistedType::Maybe(Box::new(PersistedType::from(inner.as_ref()))),
            Type::Union(alts) => PersistedType::Union(alts.iter().map(PersistedType::from).collect()),
            Type::Instance(_) | Type::Class(_) | Type::Function(_) => PersistedType::Opaque,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedDiagnostic {
    pub category_code: String,
    pub message: String,
    pub range_start: u32,
    pub range_end: u32,
}

impl From<&Diagnostic> for PersistedDiagnostic {
    fn from(d: &Diagnostic) -> Self {
        Self {
            category_code: d.category.code().to_string(),
            message: d.message.clone(),
            range_start: d.range.start().into(),
            range_end: d.range.end().into(),
        }
    }
}

impl PersistedDiagnostic {
    pub fn category(&self) -> Option<DiagnosticCategory> {
        DiagnosticCategory::ALL
            .into_iter()
            .find(|c| c.code() == self.category_code)
    }
}

/// Whether `ty` contains an `Instance`, `Class`, or `Function` anywhere in its structure — the
/// three cases [`PersistedType`] cannot represent faithfully. A module whose exports satisfy this
/// is never written to the cache (see [`AnalyzedModuleCache`] callers), so every module that *is*
/// cached round-trips exactly.
pub fn contains_opaque(ty: &Type) -> bool {
    match ty {
        Type::Instance(_) | Type::Class(_) | Type::Function(_) => true,
        Type::Unknown | Type::NoneType | Type::Bool | Type::Num | Type::Str | Type::BaseTuple => false,
        Type::List(inner) | Type::Set(inner) | Type::Maybe(inner) => contains_opaque(inner),
        Type::Dict(k, v) => contains_opaque(k) || contains_opaque(v),
        Type::Tuple(elts) | Type::Union(elts) => elts.iter().any(contains_opaque),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedModule {
    pub diagnostics: Vec<PersistedDiagnostic>,
    pub exported_types: Vec<(String, PersistedType)>,
}

/// Hashes `(resolved_path, source)` the way the original implementation keys its pickle cache.
pub fn cache_key(resolved_path: &Path, source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(resolved_path.to_string_lossy().as_bytes());
    hasher.update(source.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub trait AnalyzedModuleCache {
    fn get(&self, key: &str) -> Option<PersistedModule>;
    fn put(&self, key: &str, module: &PersistedModule);
}

/// Never hits, never stores: the default when the CLI is run without `--cache-dir`.
#[derive(Debug, Default)]
pub struct NullCache;

impl AnalyzedModuleCache for NullCache {
    fn get(&self, _key: &str) -> Option<PersistedModule> {
        None
    }

    fn put(&self, _key: &str, _module: &PersistedModule) {}
}

/// Stores one `postcard`-encoded file per cache key under a directory.
pub struct FsAnalyzedModuleCache {
    directory: PathBuf,
}

impl FsAnalyzedModuleCache {
    pub fn new(directory: PathBuf) -> Self {
        Self { directory }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.directory.join(format!("{key}.postcard"))
    }
}

impl AnalyzedModuleCache for FsAnalyzedModuleCache {
    fn get(&self, key: &str) -> Option<PersistedModule> {
        let bytes = fs::read(self.path_for(key)).ok()?;
        postcard::from_bytes(&bytes).ok()
    }

    fn put(&self, key: &str, module: &PersistedModule) {
        if fs::create_dir_all(&self.directory).is_err() {
            return;
        }
        if let Ok(bytes) = postcard::to_allocvec(module) {
            let _ = fs::write(self.path_for(key), bytes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn persisted_type_round_trips_through_postcard() {
        let ty = Type::Maybe(Box::new(Type::List(Box::new(Type::Num))));
        let persisted = PersistedType::from(&ty);
        let bytes = postcard::to_allocvec(&persisted).unwrap();
        let decoded: PersistedType = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(persisted, decoded);
    }

    #[test]
    fn function_types_collapse_to_opaque() {
        let arguments = crate::types::Arguments::new();
        let evaluator = crate::function_eval::FunctionEvaluator::for_lambda(
            &ruff_python_parser::parse_expression("None").unwrap().into_syntax().body,
            arguments.clone(),
        );
        let ty = Type::Function(crate::types::FunctionType {
            arguments,
            return_spec: crate::types::ReturnSpec::Deferred(evaluator),
        });
        assert_eq!(PersistedType::from(&ty), PersistedType::Opaque);
        assert!(contains_opaque(&ty));
    }

    #[test]
    fn contains_opaque_is_false_for_plain_structural_types() {
        let ty = Type::Maybe(Box::new(Type::List(Box::new(Type::Num))));
        assert!(!contains_opaque(&ty));
    }

    #[test]
    fn contains_opaque_finds_a_class_nested_in_a_union() {
        let ty = Type::Union(vec![
            Type::Num,
            Type::Class(crate::types::ClassType {
                name: "Foo".to_string(),
                arguments: crate::types::Arguments::new(),
                instance_type: Box::new(Type::Instance(crate::types::InstanceType {
                    class_name: "Foo".to_string(),
                    attributes: crate::scope::Scope::new(),
                })),
                static_scope: crate::scope::Scope::new(),
            }),
        ]);
        assert!(contains_opaque(&ty));
    }

    #[test]
    fn cache_key_is_stable_for_same_inputs() {
        let a = cache_key(Path::new("mod.py"), "x = 1");
        let b = cache_key(Path::new("mod.py"), "x = 1");
        assert_eq!(a, b);
    }

    #[test]
    fn cache_key_differs_for_different_source() {
        let a = cache_key(Path::new("mod.py"), "x = 1");
        let b = cache_key(Path::new("mod.py"), "x = 2");
        assert_ne!(a, b);
    }
}
