//! Records of every explicit type annotation the visitor resolved, independent of whether it
//! produced a diagnostic (§4.7). Kept distinct from [`crate::diagnostics::Diagnostic`]: an
//! annotation record is informational output consumed by `--verbose` reporting and by tests that
//! assert what the checker believed an annotation meant, not a finding about the code.

use std::path::PathBuf;

use ruff_text_size::TextRange;

use crate::types::Type;

#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub filepath: PathBuf,
    pub name: String,
    pub declared_type: Type,
    pub range: TextRange,
}

impl Annotation {
    pub fn new(
        filepath: impl Into<PathBuf>,
        name: impl Into<String>,
        declared_type: Type,
        range: TextRange,
    ) -> Self {
        Self {
            filepath: filepath.into(),
            name: name.into(),
            declared_type,
            range,
        }
    }
}

#[derive(Debug, Default)]
pub struct AnnotationSink {
    annotations: Vec<Annotation>,
}

impl AnnotationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, annotation: Annotation) {
        self.annotations.push(annotation);
    }

    pub fn into_vec(self) -> Vec<Annotation> {
        self.annotations
    }

    pub fn as_slice(&self) -> &[Annotation] {
        &self.annotations
    }
}
