//! Internal, non-diagnostic failures (§7 of the design doc).
//!
//! These are distinct from [`crate::diagnostics::Diagnostic`]s: a `Diagnostic` is the *product*
//! of a successful check, while an [`InternalError`] means an invariant of the checker itself was
//! violated and traversal cannot continue meaningfully.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum InternalError {
    #[error("cannot pop the bottom (builtins) scope layer")]
    PopLastScope,

    #[error("ExtendedContext does not support copy()")]
    CopyExtendedContext,

    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}
