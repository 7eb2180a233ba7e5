//! The output of a successful check run: a list of type errors, each tagged with the rule that
//! produced it (§4.6/§6: "Diagnostic value").
//!
//! Grounded in `red_knot_python_semantic::types::diagnostic`'s lint-registry pattern, collapsed
//! from a dynamic, plugin-style registry of `LintId`s down to a closed enum: this checker ships a
//! fixed set of checks rather than a user-extensible lint set. The variant set itself mirrors the
//! original implementation's closed vocabulary of `self.warn('category', ...)` string literals
//! scattered through `main.py`'s `Visitor` methods, collected here into one exhaustively-matched
//! enum instead of bare strings.

use ruff_text_size::TextRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCategory {
    /// A name with no reaching binding.
    Undefined,
    /// A call whose callee resolved to `Unknown`.
    UndefinedFunction,
    /// A call whose callee resolved to a type that isn't a function or class.
    NotAFunction,
    /// A value's type disagrees with what an operator, call, or declared annotation requires.
    TypeError,
    /// Operand types that are individually known but can't be reconciled (chained comparison,
    /// ternary arms, mixed `+` operands).
    InconsistentTypes,
    /// A name already bound in an enclosing or the same scope is bound again.
    Reassignment,
    /// A rebinding's type differs from what the name was previously bound to.
    TypeChange,
    /// A function's inferred return type is not unifiable across its `return`/`yield` sites.
    MultipleReturnTypes,
    /// An `if`/`else` pair binds a name to irreconcilable types on each arm.
    ConditionalType,
    /// An `if`/`else` pair's branches return irreconcilable types.
    ConditionalReturnType,
    /// A name bound on exactly one arm of an `if`/`else`, absent from the enclosing scope.
    ConditionallyAssigned,
    /// An `if`/`while` test whose truth value is statically decidable.
    ConstantIfCondition,
    /// A call omits a required positional argument.
    MissingArgument,
    /// A call passes more positional arguments than the callee accepts.
    TooManyArguments,
    /// A call passes a keyword argument the callee does not declare.
    ExtraKeyword,
    /// A `*args`-named keyword argument whose type isn't a tuple or list.
    InvalidVarargType,
    /// A `**kwargs`-named keyword argument whose type isn't a dict.
    InvalidKwargType,
    /// A parameter's explicit annotation and default value disagree.
    DefaultArgumentTypeError,
    /// A class body binds a name that collides with one of its own instance attributes.
    OverlappingClassNames,
    /// `in`/`not in` chained with another comparison operator.
    InOperatorChaining,
    /// `is`/`is not` chained with another comparison operator.
    IsOperatorChaining,
    /// The right operand of `in`/`not in` is neither a list nor a dict.
    InOperatorArgumentNotListOrDict,
    /// A `del` statement — always reported; deletion defeats this checker's tracking.
    Delete,
    /// An import that could not be resolved to a module.
    ImportFailed,
    /// A `from x import y` where `x` resolved to something other than a module instance.
    InvalidImport,
}

impl DiagnosticCategory {
    pub fn code(self) -> &'static str {
        match self {
            DiagnosticCategory::Undefined => "undefined",
            DiagnosticCategory::UndefinedFunction => "undefined-function",
            DiagnosticCategory::NotAFunction => "not-a-function",
            DiagnosticCategory::TypeError => "type-error",
            DiagnosticCategory::InconsistentTypes => "inconsistent-types",
            DiagnosticCategory::Reassignment => "reassignment",
            DiagnosticCategory::TypeChange => "type-change",
            DiagnosticCategory::MultipleReturnTypes => "multiple-return-types",
            DiagnosticCategory::ConditionalType => "conditional-type",
            DiagnosticCategory::ConditionalReturnType => "conditional-return-type",
            DiagnosticCategory::ConditionallyAssigned => "conditionally-assigned",
            DiagnosticCategory::ConstantIfCondition => "constant-if-condition",
            DiagnosticCategory::MissingArgument => "missing-argument",
            DiagnosticCategory::TooManyArguments => "too-many-arguments",
            DiagnosticCategory::ExtraKeyword => "extra-keyword",
            DiagnosticCategory::InvalidVarargType => "invalid-vararg-type",
            DiagnosticCategory::InvalidKwargType => "invalid-kwarg-type",
            DiagnosticCategory::DefaultArgumentTypeError => "default-argument-type-error",
            DiagnosticCategory::OverlappingClassNames => "overlapping-class-names",
            DiagnosticCategory::InOperatorChaining => "in-operator-chaining",
            DiagnosticCategory::IsOperatorChaining => "is-operator-chaining",
            DiagnosticCategory::InOperatorArgumentNotListOrDict => {
                "in-operator-argument-not-list-or-dict"
            }
            DiagnosticCategory::Delete => "delete",
            DiagnosticCategory::ImportFailed => "import-failed",
            DiagnosticCategory::InvalidImport => "invalid-import",
        }
    }

    /// All 25 categories, in the order §7 of the specification lists them — used to reconstruct a
    /// category from its persisted code string (see `cache.rs`).
    pub const ALL: [DiagnosticCategory; 25] = [
        DiagnosticCategory::Undefined,
        DiagnosticCategory::UndefinedFunction,
        DiagnosticCategory::NotAFunction,
        DiagnosticCategory::TypeError,
        DiagnosticCategory::InconsistentTypes,
        DiagnosticCategory::Reassignment,
        DiagnosticCategory::TypeChange,
        DiagnosticCategory::MultipleReturnTypes,
        DiagnosticCategory::ConditionalType,
        DiagnosticCategory::ConditionalReturnType,
        DiagnosticCategory::ConditionallyAssigned,
        DiagnosticCategory::ConstantIfCondition,
        DiagnosticCategory::MissingArgument,
        DiagnosticCategory::TooManyArguments,
        DiagnosticCategory::ExtraKeyword,
        DiagnosticCategory::InvalidVarargType,
        DiagnosticCategory::InvalidKwargType,
        DiagnosticCategory::DefaultArgumentTypeError,
        DiagnosticCategory::OverlappingClassNames,
        DiagnosticCategory::InOperatorChaining,
        DiagnosticCategory::IsOperatorChaining,
        DiagnosticCategory::InOperatorArgumentNotListOrDict,
        DiagnosticCategory::Delete,
        DiagnosticCategory::ImportFailed,
        DiagnosticCategory::InvalidImport,
    ];
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub category: DiagnosticCategory,
    pub message: String,
    pub range: TextRange,
}

impl Diagnostic {
    pub fn new(category: DiagnosticCategory, message: impl Into<String>, range: TextRange) -> Self {
        Self {
            category,
            message: message.into(),
            range,
        }
    }
}

/// Accumulates diagnostics during a single module visit. Kept as a plain `Vec`-backed sink rather
/// than emitting through a callback, so a caller can inspect the full set after the fact (the CLI
/// sorts and renders it; tests assert against it directly).
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.diagnostics.extend(diagnostics);
    }

    pub fn report(
        &mut self,
        category: DiagnosticCategory,
        message: impl Into<String>,
        range: TextRange,
    ) {
        self.push(Diagnostic::new(category, message, range));
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }
}
