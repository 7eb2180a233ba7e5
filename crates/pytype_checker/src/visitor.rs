//! Statement-level dispatch over a parsed module (§4.5: "Statement Visitor").
//!
//! Grounded in `main.py`'s `Visitor` class: one method per statement kind, threading a single
//! mutable [`Context`] through the traversal. `if`/`elif`/`else` is the one construct whose arms
//! get a fresh nested scope each and are merged back into the enclosing scope, and that merge is
//! an explicit diff/unify/diagnose walk (§4.6) rather than a plain [`Scope::merge`] — this mirrors
//! `main.py`'s own `visit_If` override. `for` and `with` each push a scope for their target/body
//! and discard it once the construct ends, so a loop variable or a `with ... as name` binding
//! never leaks out. `while` and `try`/`except`/`else`/`finally` get no scope treatment at all:
//! `main.py` has no `visit_While`/`visit_Try` override, so its `ast.NodeVisitor` base class falls
//! through to `generic_visit`, which just walks their child statements against whatever scope is
//! already current — bindings made inside a loop body or a try arm are visible to whatever runs
//! after it, exactly like a straight-line sequence of statements.

use std::path::{Path, PathBuf};

use ruff_python_ast::{self as ast, Expr, Stmt};
use ruff_text_size::{Ranged, TextRange};
use tracing::{debug, instrument, warn};

use crate::annotation::{Annotation, AnnotationSink};
use crate::cache::{self, cache_key, AnalyzedModuleCache, PersistedModule, PersistedType};
use crate::context::{Context, TypeEnv};
use crate::diagnostics::{Diagnostic, DiagnosticCategory, DiagnosticSink};
use crate::expr_typer::{annotation_type, expression_type, function_arguments, static_evaluate};
use crate::function_eval::FunctionEvaluator;
use crate::narrow::{self, ClassTable};
use crate::resolver::ModuleResolver;
use crate::scope::Scope;
use crate::symbol::Symbol;
use crate::types::{self, Arguments, ClassType, FunctionType, InstanceType, ReturnSpec, Type};

/// Runs a function body (`def`, not `lambda`) against an already-parameter-bound [`Context`],
/// populating its return symbol, and returns whatever diagnostics/annotations the body produced.
/// Called back into by [`FunctionEvaluator::run`] — kept as a free function rather than a method so
/// `function_eval.rs` doesn't need a `Visitor` instance. Unlike a `def`'s own eager visit (done once
/// by [`Visitor::visit_function_def`]), a deferred re-run can happen any number of times (once per
/// distinct argument-type tuple a call site passes), so its diagnostics/annotations have to be
/// threaded back out rather than silently dropped (§4.4 points 3-4).
pub fn run_function_body(body: &[Stmt], ctx: &mut Context, classes: &ClassTable) -> (Vec<Diagnostic>, Vec<Annotation>) {
    let result = Visitor::headless(classes.clone()).check_module(body, ctx);
    (result.diagnostics, result.annotations)
}

pub struct CheckResult {
    pub diagnostics: Vec<Diagnostic>,
    pub annotations: Vec<Annotation>,
    pub module_scope: Scope,
}

pub struct Visitor<'a> {
    classes: ClassTable,
    diagnostics: DiagnosticSink,
    annotations: AnnotationSink,
    resolver: Option<&'a dyn ModuleResolver>,
    cache: Option<&'a dyn AnalyzedModuleCache>,
    current_path: PathBuf,
    import_stack: Vec<PathBuf>,
    /// Stack of enclosing class names, innermost last; non-empty while walking a class body
    /// (§4.6's `ClassDef`/`FunctionDef` interaction: a method's first parameter is `self`).
    current_class: Vec<String>,
    /// The attribute scope `self` accumulated by the most recently visited `__init__`, handed
    /// back to `visit_class_def` so `self.x = ...` assignments become instance attributes
    /// (§4.6: "take the resulting type of `self` as the inferred instance type").
    last_init_attributes: Option<Scope>,
}

impl<'a> Visitor<'a> {
    pub fn new(
        current_path: PathBuf,
        resolver: &'a dyn ModuleResolver,
        cache: &'a dyn AnalyzedModuleCache,
    ) -> Self {
        Self {
            classes: ClassTable::default(),
            diagnostics: DiagnosticSink::new(),
            annotations: AnnotationSink::new(),
            resolver: Some(resolver),
            cache: Some(cache),
            current_path,
            import_stack: Vec::new(),
            current_class: Vec::new(),
            last_init_attributes: None,
        }
    }

    /// A visitor with no import resolution or on-disk cache, used to re-run a function body for
    /// its return type (§4.4) and for nothing else; its diagnostics/annotations are real and get
    /// threaded back to the caller rather than discarded, but it never resolves an `import`.
    fn headless(classes: ClassTable) -> Self {
        Self {
            classes,
            diagnostics: DiagnosticSink::new(),
            annotations: AnnotationSink::new(),
            resolver: None,
            cache: None,
            current_path: PathBuf::new(),
            import_stack: Vec::new(),
            current_class: Vec::new(),
            last_init_attributes: None,
        }
    }

    #[instrument(skip_all, fields(path = %self.current_path.display()))]
    pub fn check_module(mut self, body: &[Stmt], ctx: &mut Context) -> CheckResult {
        self.visit_body(body, ctx);
        CheckResult {
            diagnostics: self.diagnostics.into_vec(),
            annotations: self.annotations.into_vec(),
            module_scope: ctx.current_scope().borrow().clone(),
        }
    }

    fn report(&mut self, category: DiagnosticCategory, message: impl Into<String>, range: impl Ranged) {
        self.diagnostics.report(category, message, range.range());
    }

    fn annotate(&mut self, name: impl Into<String>, ty: Type, range: TextRange) {
        self.annotations
            .push(Annotation::new(self.current_path.clone(), name, ty, range));
    }

    pub fn visit_body(&mut self, body: &[Stmt], ctx: &mut Context) {
        for stmt in body {
            self.visit_stmt(stmt, ctx);
        }
    }

    fn visit_stmt(&mut self, stmt: &Stmt, ctx: &mut Context) {
        match stmt {
            Stmt::Expr(expr_stmt) => self.check_expr(&expr_stmt.value, ctx),
            Stmt::Assign(assign) => self.visit_assign(assign, ctx),
            Stmt::AnnAssign(ann) => self.visit_ann_assign(ann, ctx),
            Stmt::AugAssign(aug) => self.visit_aug_assign(aug, ctx),
            Stmt::If(if_stmt) => self.visit_if(if_stmt, ctx),
            Stmt::While(while_stmt) => self.visit_while(while_stmt, ctx),
            Stmt::For(for_stmt) => self.visit_for(for_stmt, ctx),
            Stmt::FunctionDef(func) => self.visit_function_def(func, ctx),
            Stmt::ClassDef(class) => self.visit_class_def(class, ctx),
            Stmt::Return(ret) => {
                if let Some(v) = &ret.value {
                    self.check_expr(v, ctx);
                }
                let ty = ret
                    .value
                    .as_ref()
                    .map(|v| expression_type(v, ctx))
                    .unwrap_or(Type::NoneType);
                self.check_return(&ty, ctx, ret.range());
                ctx.set_return(Symbol::new("return", ty));
            }
            Stmt::Import(import) => self.visit_import(import, ctx),
            Stmt::ImportFrom(import_from) => self.visit_import_from(import_from, ctx),
            Stmt::Try(try_stmt) => self.visit_try(try_stmt, ctx),
            Stmt::With(with_stmt) => self.visit_with(with_stmt, ctx),
            Stmt::Pass(_) | Stmt::Break(_) | Stmt::Continue(_) => {}
            Stmt::Assert(assert_stmt) => self.check_expr(&assert_stmt.test, ctx),
            Stmt::Raise(raise_stmt) => {
                if let Some(exc) = &raise_stmt.exc {
                    self.check_expr(exc, ctx);
                }
            }
            Stmt::Delete(delete) => self.visit_delete(delete, ctx),
            _ => {
                debug!("statement kind not modeled by the checker; skipping");
            }
        }
    }

    /// A `del` statement is always reported: deleting a binding would require this checker to
    /// track "possibly unbound" states it otherwise never does (§5 treats every resolved name as
    /// fully bound), so a `del` is flagged and the binding is left exactly as it was.
    fn visit_delete(&mut self, delete: &ast::StmtDelete, ctx: &mut Context) {
        self.report(DiagnosticCategory::Delete, "'del' is not modeled by this checker", delete.range());
        for target in &delete.targets {
            self.check_expr(target, ctx);
        }
    }

    /// A function whose `return`s disagree on type across the body is flagged once per later
    /// `return` that introduces a new type — the first `return` sets the baseline, and every
    /// subsequent one that doesn't match it is a second, different promise about what the
    /// function hands back to its callers.
    fn check_return(&mut self, ty: &Type, ctx: &Context, range: TextRange) {
        let Some(existing) = ctx.get_return() else {
            return;
        };
        if matches!(existing.type_, Type::Unknown) || matches!(ty, Type::Unknown) {
            return;
        }
        if existing.type_ != *ty {
            self.report(
                DiagnosticCategory::MultipleReturnTypes,
                format!("function returns both {:?} and {ty:?}", existing.type_),
                range,
            );
        }
    }

    fn visit_assign(&mut self, assign: &ast::StmtAssign, ctx: &mut Context) {
        self.check_expr(&assign.value, ctx);
        let value_type = expression_type(&assign.value, ctx);
        let static_value = static_evaluate(&assign.value);
        for target in &assign.targets {
            self.bind_target(target, value_type.clone(), Some(static_value.clone()), true, ctx);
        }
    }

    fn visit_ann_assign(&mut self, ann: &ast::StmtAnnAssign, ctx: &mut Context) {
        let declared = annotation_type(&ann.annotation);
        self.annotate(
            target_name(&ann.target).unwrap_or_default(),
            declared.clone(),
            ann.annotation.range(),
        );

        if let Some(value) = &ann.value {
            self.check_expr(value, ctx);
            let actual = expression_type(value, ctx);
            if !types::subset(&actual, &declared) {
                self.report(
                    DiagnosticCategory::TypeError,
                    format!("value of type {actual:?} is not assignable to declared type {declared:?}"),
                    value.range(),
                );
            }
        }
        // An annotated assignment's declared type is definitional, not a rebinding in the sense
        // `reassignment`/`type-change` care about.
        self.bind_target(&ann.target, declared, None, false, ctx);
    }

    fn visit_aug_assign(&mut self, aug: &ast::StmtAugAssign, ctx: &mut Context) {
        self.check_expr(&aug.target, ctx);
        self.check_expr(&aug.value, ctx);
        let current = expression_type(&aug.target, ctx);
        let operand = expression_type(&aug.value, ctx);
        let combined = match (&current, &operand) {
            (Type::Str, Type::Str) => Type::Str,
            (Type::Num, Type::Num) => Type::Num,
            (Type::List(a), _) => Type::List(a.clone()),
            (Type::Unknown, _) | (_, Type::Unknown) => Type::Unknown,
            _ => {
                self.report(
                    DiagnosticCategory::TypeError,
                    format!("augmented assignment not supported between {current:?} and {operand:?}"),
                    aug.range(),
                );
                Type::Unknown
            }
        };
        // An augmented assignment rebinds the same name it just read, so it's a reassignment by
        // construction; checking it against its own prior type here would be noise. Only
        // `visit_assign`'s plain `x = ...` form is checked for an actual type-change.
        self.bind_target(&aug.target, combined, None, false, ctx);
    }

    fn bind_target(
        &mut self,
        target: &Expr,
        ty: Type,
        static_value: Option<crate::symbol::StaticValue>,
        track_reassignment: bool,
        ctx: &mut Context,
    ) {
        match target {
            Expr::Name(name) => {
                if track_reassignment {
                    self.check_reassignment(ctx, name.id.as_str(), &ty, name.range());
                }
                let mut symbol = Symbol::new(name.id.as_str(), ty);
                if let Some(sv) = static_value {
                    symbol = symbol.with_static_value(sv);
                }
                ctx.bind(symbol);
            }
            Expr::Tuple(tuple) => {
                for elt in &tuple.elts {
                    self.bind_target(elt, Type::Unknown, None, track_reassignment, ctx);
                }
            }
            Expr::List(list) => {
                for elt in &list.elts {
                    self.bind_target(elt, Type::Unknown, None, track_reassignment, ctx);
                }
            }
            Expr::Attribute(attr) => {
                if let Expr::Name(base) = attr.value.as_ref() {
                    if let Some(mut symbol) = ctx.resolve(base.id.as_str()) {
                        if let Type::Instance(instance) = &mut symbol.type_ {
                            instance.attributes.add(Symbol::new(attr.attr.as_str(), ty));
                            ctx.bind(symbol);
                        }
                    }
                }
            }
            Expr::Subscript(_) => {
                // Subscript assignment (`d[k] = v`) mutates a container's element type in place;
                // out of scope for this checker's container typing, which only widens on
                // construction (§4.1's Non-goals).
            }
            _ => {}
        }
    }

    /// A name already bound (in any enclosing scope) being bound again is always reported; if the
    /// new type also differs from the old one, that's a second, more specific diagnostic (§4.6).
    fn check_reassignment(&mut self, ctx: &Context, name: &str, new_ty: &Type, range: TextRange) {
        let Some(old) = ctx.resolve(name) else {
            return;
        };
        self.report(DiagnosticCategory::Reassignment, format!("'{name}' is already bound"), range);
        if old.type_ != *new_ty {
            self.report(
                DiagnosticCategory::TypeChange,
                format!("'{name}' changes from {:?} to {new_ty:?}", old.type_),
                range,
            );
        }
    }

    fn visit_if(&mut self, stmt: &ast::StmtIf, ctx: &mut Context) {
        self.check_constant_condition(&stmt.test, ctx);
        let then_scope = self.visit_branch(&stmt.test, true, &stmt.body, ctx);
        let else_scope = self.visit_else_chain(&stmt.test, &stmt.elif_else_clauses, ctx);
        self.merge_branches(then_scope, else_scope, ctx, stmt.range());
    }

    /// An `if`/`while` test whose truth value doesn't depend on anything the checker can't already
    /// resolve statically (a bare `True`/`False` literal) is almost certainly a mistake or dead
    /// code, so it gets its own diagnostic independent of whatever the branches themselves do.
    fn check_constant_condition(&mut self, test: &Expr, ctx: &Context) {
        if matches!(static_evaluate_bool(test, ctx), Some(_)) {
            self.report(
                DiagnosticCategory::ConstantIfCondition,
                "condition is always the same value",
                test.range(),
            );
        }
    }

    fn visit_else_chain(
        &mut self,
        prior_test: &Expr,
        clauses: &[ast::ElifElseClause],
        ctx: &mut Context,
    ) -> Scope {
        let Some((clause, rest)) = clauses.split_first() else {
            // No `else`: falling through means `prior_test` was falsy, but we don't thread that
            // fact into an empty branch body — there's nothing to visit.
            return Scope::new();
        };
        match &clause.test {
            Some(test) => {
                self.check_constant_condition(test, ctx);
                let then_scope = self.visit_branch(test, true, &clause.body, ctx);
                let else_scope = self.visit_else_chain(test, rest, ctx);
                let mut merged = Scope::new();
                merge_unify(&mut merged, &then_scope, &else_scope);
                merged
            }
            None => self.visit_branch(prior_test, false, &clause.body, ctx),
        }
    }

    fn visit_branch(&mut self, test: &Expr, truthy: bool, body: &[Stmt], ctx: &mut Context) -> Scope {
        if truthy {
            self.check_expr(test, ctx);
        }
        let constraints = if truthy {
            narrow::positive_constraints(test, ctx, &self.classes)
        } else {
            narrow::negative_constraints(test, ctx, &self.classes)
        };
        ctx.begin_scope();
        for (name, ty) in constraints {
            ctx.add_constraint(&name, ty);
        }
        self.visit_body(body, ctx);
        let scope = ctx.current_scope().borrow().clone();
        ctx.end_scope().expect("scope was pushed immediately above");
        scope
    }

    /// Visits `body` in its own nested scope with no narrowing constraints applied, returning
    /// that scope for the caller to merge back — used by control-flow arms with no boolean test
    /// of their own (a `try` body, an `except` handler, a plain `else`).
    fn visit_scoped(&mut self, body: &[Stmt], ctx: &mut Context) -> Scope {
        ctx.begin_scope();
        self.visit_body(body, ctx);
        let scope = ctx.current_scope().borrow().clone();
        ctx.end_scope().expect("scope was pushed immediately above");
        scope
    }

    /// Reconciles an `if`/`else` pair's two resulting scopes into the enclosing scope, diagnosing
    /// every name that disagrees across the branches instead of silently overwriting (§4.6): a name
    /// bound on only one arm becomes `conditionally-assigned`; one bound on both arms to two
    /// different types becomes `conditional-type` (the merged scope still gets the unified type —
    /// this only flags it); and if the two arms' inferred return types (if either set one) differ,
    /// that's `conditional-return-type`.
    fn merge_branches(&mut self, then_scope: Scope, else_scope: Scope, ctx: &mut Context, range: TextRange) {
        let mut merged = Scope::new();
        merge_unify(&mut merged, &then_scope, &else_scope);
        for name in merged.names().map(str::to_owned).collect::<Vec<_>>() {
            let then_ty = then_scope.get(&name).map(|s| &s.type_);
            let else_ty = else_scope.get(&name).map(|s| &s.type_);
            match (then_ty, else_ty) {
                (Some(t), Some(e)) if t != e => {
                    self.report(
                        DiagnosticCategory::ConditionalType,
                        format!("'{name}' is {t:?} on one branch and {e:?} on the other"),
                        range,
                    );
                }
                (Some(_), None) | (None, Some(_)) => {
                    self.report(
                        DiagnosticCategory::ConditionallyAssigned,
                        format!("'{name}' is only bound on one branch of this 'if'"),
                        range,
                    );
                }
                _ => {}
            }
        }

        match (then_scope.get_return(), else_scope.get_return()) {
            (Some(t), Some(e)) if t.type_ != e.type_ => {
                self.report(
                    DiagnosticCategory::ConditionalReturnType,
                    format!("branches return {:?} and {:?}", t.type_, e.type_),
                    range,
                );
            }
            _ => {}
        }

        self.adopt_scope(merged, ctx);
    }

    /// Folds a branch's resulting scope into the enclosing scope: every binding the branch made
    /// becomes visible to subsequent statements (merged with whatever was already there, per
    /// [`Scope::merge`]).
    fn adopt_scope(&mut self, branch: Scope, ctx: &mut Context) {
        ctx.merge_scope(&branch);
    }

    /// Recursively walks an expression looking for diagnosable sub-expressions: name lookups,
    /// calls, attribute accesses, and every per-operator rule in §4.6 (`BinOp`/`BoolOp`/`UnaryOp`
    /// /`Compare`/`IfExp`/`Slice`). Kept separate from [`expression_type`] since that function is a
    /// pure, side-effect-free query (§4.3) shared by the function evaluator's deferred re-entry,
    /// while diagnostics are only meaningful the first time a call site is visited — this method
    /// always runs *before* any [`expression_type`] call against the same expression at a given
    /// statement, so a deferred function call's diagnostics/annotations get attributed to this
    /// visit rather than silently lost to a later cache hit (§4.4 point 3).
    fn check_expr(&mut self, expr: &Expr, ctx: &Context) {
        match expr {
            Expr::Name(name) => self.check_name(name, ctx),
            Expr::Call(call) => {
                // The callee itself is inspected only through `check_call`'s undefined-function /
                // not-a-function checks, not as an independent name lookup — a bare `f()` where
                // `f` is unresolved gets exactly one diagnostic, not both `undefined` and
                // `undefined-function`.
                if !matches!(call.func.as_ref(), Expr::Name(_)) {
                    self.check_expr(&call.func, ctx);
                }
                for arg in &call.arguments.args {
                    self.check_expr(arg, ctx);
                }
                for keyword in &call.arguments.keywords {
                    self.check_expr(&keyword.value, ctx);
                }
                self.check_call(call, ctx);
            }
            Expr::Attribute(attr) => self.check_expr(&attr.value, ctx),
            Expr::BinOp(binop) => {
                self.check_expr(&binop.left, ctx);
                self.check_expr(&binop.right, ctx);
                self.check_binop(binop, ctx);
            }
            Expr::BoolOp(boolop) => {
                for value in &boolop.values {
                    self.check_expr(value, ctx);
                }
                self.check_boolop(boolop, ctx);
            }
            Expr::UnaryOp(unary) => {
                self.check_expr(&unary.operand, ctx);
                self.check_unaryop(unary, ctx);
            }
            Expr::Compare(compare) => {
                self.check_expr(&compare.left, ctx);
                for comparator in &compare.comparators {
                    self.check_expr(comparator, ctx);
                }
                self.check_compare(compare, ctx);
            }
            Expr::IfExp(ifexp) => {
                self.check_expr(&ifexp.test, ctx);
                self.check_expr(&ifexp.body, ctx);
                self.check_expr(&ifexp.orelse, ctx);
                self.check_ifexp(ifexp, ctx);
            }
            Expr::Slice(slice) => self.check_slice(slice, ctx),
            Expr::List(seq) => {
                for elt in &seq.elts {
                    self.check_expr(elt, ctx);
                }
            }
            Expr::Set(seq) => {
                for elt in &seq.elts {
                    self.check_expr(elt, ctx);
                }
            }
            Expr::Tuple(seq) => {
                for elt in &seq.elts {
                    self.check_expr(elt, ctx);
                }
            }
            Expr::Dict(dict) => {
                for item in &dict.items {
                    if let Some(key) = &item.key {
                        self.check_expr(key, ctx);
                    }
                    self.check_expr(&item.value, ctx);
                }
            }
            Expr::Subscript(sub) => {
                self.check_expr(&sub.value, ctx);
                self.check_expr(&sub.slice, ctx);
            }
            Expr::Starred(starred) => self.check_expr(&starred.value, ctx),
            Expr::Named(named) => self.check_expr(&named.value, ctx),
            _ => {}
        }
    }

    /// A bare name reference: `undefined` if nothing reaches it, otherwise its resolved type is
    /// recorded as an annotation (for every `Unknown`-free resolution, not just ones with an
    /// explicit source annotation — §4.7 treats a reference's resolved type as worth recording
    /// regardless of whether the binding that produced it came from a `: type` form).
    fn check_name(&mut self, name: &ast::ExprName, ctx: &Context) {
        match ctx.resolve(name.id.as_str()) {
            Some(symbol) => {
                if !matches!(symbol.type_, Type::Unknown) {
                    self.annotate(name.id.as_str(), symbol.type_, name.range());
                }
            }
            None => {
                self.report(
                    DiagnosticCategory::Undefined,
                    format!("name '{}' is not defined", name.id),
                    name.range(),
                );
            }
        }
    }

    fn check_call(&mut self, call: &ast::ExprCall, ctx: &Context) {
        let callee = expression_type(&call.func, ctx);
        match &callee {
            Type::Unknown => {
                self.report(
                    DiagnosticCategory::UndefinedFunction,
                    "call to an undefined name",
                    call.range(),
                );
                return;
            }
            Type::Function(_) | Type::Class(_) => {}
            other => {
                self.report(
                    DiagnosticCategory::NotAFunction,
                    format!("value of type {other:?} is not callable"),
                    call.range(),
                );
                return;
            }
        }

        let arguments = match &callee {
            Type::Function(func) => func.arguments.clone(),
            Type::Class(class) => class.arguments.clone(),
            _ => unreachable!("Unknown and non-callable types returned above"),
        };
        self.check_arguments(&arguments, call, ctx);

        // Only a plain function's deferred body re-runs here; a class constructor's "call" just
        // builds an instance and has no body of its own to evaluate (its `__init__` was already
        // checked once, eagerly, when the `class` was visited).
        if let Type::Function(func) = &callee {
            if let ReturnSpec::Deferred(evaluator) = &func.return_spec {
                let arg_types: Vec<Type> =
                    call.arguments.args.iter().map(|a| expression_type(a, ctx)).collect();
                let (_, diagnostics, annotations) =
                    FunctionEvaluator::evaluate_with_diagnostics(evaluator, &arg_types);
                self.diagnostics.extend(diagnostics);
                for annotation in annotations {
                    self.annotations.push(annotation);
                }
            }
        }
    }

    fn check_arguments(&mut self, arguments: &Arguments, call: &ast::ExprCall, ctx: &Context) {
        let positional = call.arguments.args.len();
        let has_spread_kwargs = call.arguments.keywords.iter().any(|kw| kw.arg.is_none());

        if !has_spread_kwargs {
            for i in positional..arguments.min_count.min(arguments.names.len()) {
                let name = &arguments.names[i];
                let supplied_by_keyword = call
                    .arguments
                    .keywords
                    .iter()
                    .any(|kw| kw.arg.as_ref().map(|n| n.as_str()) == Some(name.as_str()));
                if !supplied_by_keyword {
                    self.report(
                        DiagnosticCategory::MissingArgument,
                        format!("missing required argument '{name}'"),
                        call.range(),
                    );
                }
            }
        }
        if positional > arguments.names.len() && arguments.vararg.is_none() {
            self.report(
                DiagnosticCategory::TooManyArguments,
                format!(
                    "too many positional arguments (expected at most {}, got {positional})",
                    arguments.names.len()
                ),
                call.range(),
            );
        }

        for keyword in &call.arguments.keywords {
            let Some(name) = &keyword.arg else {
                continue;
            };
            let name_str = name.as_str();
            let value_type = expression_type(&keyword.value, ctx);

            if Some(name_str) == arguments.vararg.as_deref() {
                if !matches!(value_type, Type::Tuple(_) | Type::BaseTuple | Type::List(_) | Type::Unknown) {
                    self.report(
                        DiagnosticCategory::InvalidVarargType,
                        format!("'{name_str}' must be a tuple or list, got {value_type:?}"),
                        keyword.range(),
                    );
                }
                continue;
            }
            if Some(name_str) == arguments.kwarg.as_deref() {
                if !matches!(value_type, Type::Dict(_, _) | Type::Unknown) {
                    self.report(
                        DiagnosticCategory::InvalidKwargType,
                        format!("'{name_str}' must be a dict, got {value_type:?}"),
                        keyword.range(),
                    );
                }
                continue;
            }
            let Some(index) = arguments.names.iter().position(|n| n == name_str) else {
                if arguments.kwarg.is_none() {
                    self.report(
                        DiagnosticCategory::ExtraKeyword,
                        format!("unexpected keyword argument '{name_str}'"),
                        keyword.range(),
                    );
                }
                continue;
            };
            if let Some(declared) = arguments.explicit_types.get(index) {
                self.check_argument_type(declared, &value_type, keyword.range());
            }
        }

        for (i, arg) in call.arguments.args.iter().enumerate() {
            let Some(declared) = arguments.explicit_types.get(i) else {
                continue;
            };
            let actual = expression_type(arg, ctx);
            self.check_argument_type(declared, &actual, arg.range());
        }
    }

    /// `None` is always accepted regardless of the declared type (the original implementation's
    /// call-argument check widens every declared type with an implicit `| None`), matching the
    /// same leniency [`types::subset`] gives every type against `Unknown`.
    fn check_argument_type(&mut self, declared: &Type, actual: &Type, range: TextRange) {
        if matches!(declared, Type::Unknown) || matches!(actual, Type::Unknown | Type::NoneType) {
            return;
        }
        if !types::subset(actual, declared) {
            self.report(
                DiagnosticCategory::TypeError,
                format!("expected type {declared:?}, got {actual:?}"),
                range,
            );
        }
    }

    fn check_binop(&mut self, binop: &ast::ExprBinOp, ctx: &Context) {
        let left = expression_type(&binop.left, ctx);
        let right = expression_type(&binop.right, ctx);
        match binop.op {
            ast::Operator::Mult => {
                let patterns = vec![
                    vec![Type::Num, Type::Num],
                    vec![Type::Num, Type::Str],
                    vec![Type::Str, Type::Num],
                ];
                if !types::type_patterns(&[left.clone(), right.clone()], &patterns) {
                    self.report(
                        DiagnosticCategory::TypeError,
                        format!("cannot multiply {left:?} and {right:?}"),
                        binop.range(),
                    );
                }
            }
            ast::Operator::Add => {
                let both_known = types::known(&[left.clone(), right.clone()]);
                if both_known.len() == 2 && left != right {
                    let both_tuples =
                        matches!(left, Type::Tuple(_) | Type::BaseTuple) && matches!(right, Type::Tuple(_) | Type::BaseTuple);
                    if !both_tuples {
                        self.report(
                            DiagnosticCategory::InconsistentTypes,
                            format!("'+' operands have inconsistent types {left:?} and {right:?}"),
                            binop.range(),
                        );
                    }
                    return;
                }
                let allowed = Type::Union(vec![
                    Type::Num,
                    Type::Str,
                    Type::List(Box::new(Type::Unknown)),
                    Type::BaseTuple,
                ]);
                for (side, operand) in [("left", &left), ("right", &right)] {
                    if matches!(operand, Type::Unknown) {
                        continue;
                    }
                    if !types::subset(operand, &allowed) {
                        self.report(
                            DiagnosticCategory::TypeError,
                            format!("{side} operand of '+' has invalid type {operand:?}"),
                            binop.range(),
                        );
                    }
                }
            }
            ast::Operator::Mod => {
                if matches!(left, Type::Str | Type::Unknown) {
                    return;
                }
                for (side, operand) in [("left", &left), ("right", &right)] {
                    if !matches!(operand, Type::Num | Type::Unknown) {
                        self.report(
                            DiagnosticCategory::TypeError,
                            format!("{side} operand of '%' has invalid type {operand:?}"),
                            binop.range(),
                        );
                    }
                }
            }
            _ => {
                for (side, operand) in [("left", &left), ("right", &right)] {
                    if !matches!(operand, Type::Num | Type::Unknown) {
                        self.report(
                            DiagnosticCategory::TypeError,
                            format!("{side} operand has invalid type {operand:?}, expected a number"),
                            binop.range(),
                        );
                    }
                }
            }
        }
    }

    fn check_boolop(&mut self, boolop: &ast::ExprBoolOp, ctx: &Context) {
        for value in &boolop.values {
            let ty = expression_type(value, ctx);
            if !matches!(ty, Type::Bool | Type::Unknown) {
                self.report(
                    DiagnosticCategory::TypeError,
                    format!("boolean operand has type {ty:?}, expected bool"),
                    value.range(),
                );
            }
        }
    }

    fn check_unaryop(&mut self, unary: &ast::ExprUnaryOp, ctx: &Context) {
        let operand = expression_type(&unary.operand, ctx);
        match unary.op {
            ast::UnaryOp::Not => {
                if !matches!(operand, Type::Bool | Type::Unknown) {
                    self.report(
                        DiagnosticCategory::TypeError,
                        format!("'not' operand has type {operand:?}, expected bool"),
                        unary.range(),
                    );
                }
            }
            ast::UnaryOp::USub | ast::UnaryOp::UAdd | ast::UnaryOp::Invert => {
                if !matches!(operand, Type::Num | Type::Unknown) {
                    self.report(
                        DiagnosticCategory::TypeError,
                        format!("unary operand has type {operand:?}, expected a number"),
                        unary.range(),
                    );
                }
            }
        }
    }

    fn check_ifexp(&mut self, ifexp: &ast::ExprIfExp, ctx: &Context) {
        let test_ty = expression_type(&ifexp.test, ctx);
        if !matches!(test_ty, Type::Bool | Type::Unknown) {
            self.report(
                DiagnosticCategory::TypeError,
                format!("ternary condition has type {test_ty:?}, expected bool"),
                ifexp.test.range(),
            );
        }
        let body_ty = expression_type(&ifexp.body, ctx);
        let orelse_ty = expression_type(&ifexp.orelse, ctx);
        let is_none_widening = matches!(body_ty, Type::NoneType) || matches!(orelse_ty, Type::NoneType);
        let either_unknown = matches!(body_ty, Type::Unknown) || matches!(orelse_ty, Type::Unknown);
        if body_ty != orelse_ty && !is_none_widening && !either_unknown {
            self.report(
                DiagnosticCategory::InconsistentTypes,
                format!("ternary arms have incompatible types {body_ty:?} and {orelse_ty:?}"),
                ifexp.range(),
            );
        }
    }

    fn check_slice(&mut self, slice: &ast::ExprSlice, ctx: &Context) {
        for bound in [&slice.lower, &slice.upper, &slice.step] {
            let Some(expr) = bound else { continue };
            self.check_expr(expr, ctx);
            let ty = expression_type(expr, ctx);
            if !matches!(ty, Type::Num | Type::Unknown) {
                self.report(
                    DiagnosticCategory::TypeError,
                    format!("slice bound has type {ty:?}, expected a number"),
                    expr.range(),
                );
            }
        }
    }

    fn check_compare(&mut self, compare: &ast::ExprCompare, ctx: &Context) {
        let chained = compare.ops.len() > 1;
        let has_in = compare.ops.iter().any(|op| matches!(op, ast::CmpOp::In | ast::CmpOp::NotIn));
        let has_is = compare.ops.iter().any(|op| matches!(op, ast::CmpOp::Is | ast::CmpOp::IsNot));

        if chained {
            if has_in {
                self.report(
                    DiagnosticCategory::InOperatorChaining,
                    "chained 'in'/'not in' comparisons are not supported",
                    compare.range(),
                );
            }
            if has_is {
                self.report(
                    DiagnosticCategory::IsOperatorChaining,
                    "chained 'is'/'is not' comparisons are not supported",
                    compare.range(),
                );
            }
            if !has_in && !has_is {
                self.check_default_compare(compare, ctx);
            }
            return;
        }

        match compare.ops[0] {
            ast::CmpOp::In | ast::CmpOp::NotIn => {
                let left_ty = expression_type(&compare.left, ctx);
                let right_ty = expression_type(&compare.comparators[0], ctx);
                match &right_ty {
                    Type::List(elt) => {
                        if !types::comparable(&left_ty, elt) {
                            self.report(
                                DiagnosticCategory::InconsistentTypes,
                                format!("'{left_ty:?}' is not comparable to list element type {elt:?}"),
                                compare.range(),
                            );
                        }
                    }
                    Type::Dict(key, _) => {
                        if !types::comparable(&left_ty, key) {
                            self.report(
                                DiagnosticCategory::InconsistentTypes,
                                format!("'{left_ty:?}' is not comparable to dict key type {key:?}"),
                                compare.range(),
                            );
                        }
                    }
                    Type::Unknown => {}
                    other => {
                        self.report(
                            DiagnosticCategory::InOperatorArgumentNotListOrDict,
                            format!("right-hand side of 'in' has type {other:?}, expected a list or dict"),
                            compare.range(),
                        );
                    }
                }
            }
            ast::CmpOp::Is | ast::CmpOp::IsNot => self.check_default_compare(compare, ctx),
            _ => self.check_default_compare(compare, ctx),
        }
    }

    fn check_default_compare(&mut self, compare: &ast::ExprCompare, ctx: &Context) {
        let mut operands = vec![expression_type(&compare.left, ctx)];
        operands.extend(compare.comparators.iter().map(|c| expression_type(c, ctx)));
        for pair in operands.windows(2) {
            if !types::comparable(&pair[0], &pair[1]) {
                self.report(
                    DiagnosticCategory::InconsistentTypes,
                    format!("'{:?}' is not comparable to '{:?}'", pair[0], pair[1]),
                    compare.range(),
                );
            }
        }
    }

    fn visit_while(&mut self, stmt: &ast::StmtWhile, ctx: &mut Context) {
        self.check_constant_condition(&stmt.test, ctx);
        self.check_expr(&stmt.test, ctx);
        let test_ty = expression_type(&stmt.test, ctx);
        if !matches!(test_ty, Type::Bool | Type::Unknown) {
            self.report(
                DiagnosticCategory::TypeError,
                format!("'while' condition has type {test_ty:?}, expected bool"),
                stmt.test.range(),
            );
        }
        // No nested scope, no merge-back: a `while` body runs zero or more times in place, in the
        // same scope as the loop itself — there's no dedicated walker upstream for this node, it
        // just falls through to plain recursion over its children.
        self.visit_body(&stmt.body, ctx);
        self.visit_body(&stmt.orelse, ctx);
    }

    fn visit_for(&mut self, stmt: &ast::StmtFor, ctx: &mut Context) {
        self.check_expr(&stmt.iter, ctx);
        let iter_type = expression_type(&stmt.iter, ctx);
        let elt_type = element_type_of(&iter_type);

        // The loop's target and body live in their own scope that is discarded wholesale once the
        // loop ends — neither the target nor anything the body binds leaks to the enclosing scope,
        // matching the original implementation's treatment of `for`.
        ctx.begin_scope();
        self.bind_target(&stmt.target, elt_type, None, false, ctx);
        self.visit_body(&stmt.body, ctx);
        ctx.end_scope().expect("scope was pushed immediately above");

        self.visit_body(&stmt.orelse, ctx);
    }

    fn visit_try(&mut self, stmt: &ast::StmtTry, ctx: &mut Context) {
        // try/except has no dedicated walker upstream and falls through to plain recursion over
        // child statements, so every arm is visited in sequence against the same scope: no
        // push/pop, no merge. A binding made in the try body is visible to a handler the same way
        // a binding earlier in a straight-line block is visible later in it.
        self.visit_body(&stmt.body, ctx);

        for handler in &stmt.handlers {
            let ast::ExceptHandler::ExceptHandler(handler) = handler;
            if let Some(name) = &handler.name {
                ctx.bind(Symbol::new(name.as_str(), Type::Unknown));
            }
            self.visit_body(&handler.body, ctx);
        }

        self.visit_body(&stmt.orelse, ctx);
        self.visit_body(&stmt.finalbody, ctx);
    }

    fn visit_with(&mut self, stmt: &ast::StmtWith, ctx: &mut Context) {
        ctx.begin_scope();
        for item in &stmt.items {
            self.check_expr(&item.context_expr, ctx);
            let ctx_manager_type = expression_type(&item.context_expr, ctx);
            if let Some(target) = &item.optional_vars {
                self.bind_target(target, ctx_manager_type, None, false, ctx);
            }
        }
        self.visit_body(&stmt.body, ctx);
        ctx.end_scope().expect("scope was pushed immediately above");
    }

    fn visit_function_def(&mut self, func: &ast::StmtFunctionDef, ctx: &mut Context) {
        let arguments = function_arguments(Some(&func.parameters));
        self.check_default_argument_types(&arguments, func.range());

        let declared_return = func.returns.as_deref().map(annotation_type);
        let is_init = func.name.as_str() == "__init__";
        let enclosing_class = self.current_class.last().cloned();

        // Eagerly check the body once against declared/unknown parameter types so an unreferenced
        // function's own bugs still surface; the deferred evaluator below is only for narrowing
        // the return type to a specific call site's argument types.
        ctx.begin_scope();
        for (i, name) in arguments.names.iter().enumerate() {
            let explicit = arguments.explicit_types.get(i).cloned().unwrap_or(Type::Unknown);
            let ty = if i == 0 && is_init && explicit == Type::Unknown {
                match &enclosing_class {
                    // `self`'s declared type is the instance under construction, seeded with an
                    // empty attribute table that `self.x = ...` assignments in the body populate
                    // (via `bind_target`'s `Expr::Attribute` arm, which only writes into
                    // `instance.attributes` when the base symbol is already an `Instance`).
                    Some(class_name) => Type::Instance(InstanceType {
                        class_name: class_name.clone(),
                        attributes: Scope::new(),
                    }),
                    None => Type::Unknown,
                }
            } else {
                explicit
            };
            ctx.bind(Symbol::new(name.clone(), ty));
        }
        self.visit_body(&func.body, ctx);
        let inferred_return = ctx.get_return().map(|s| s.type_).unwrap_or(Type::NoneType);

        if is_init {
            if let Some(self_name) = arguments.names.first() {
                self.last_init_attributes = ctx
                    .current_scope()
                    .borrow()
                    .get(self_name.as_str())
                    .and_then(|symbol| match &symbol.type_ {
                        Type::Instance(instance) => Some(instance.attributes.clone()),
                        _ => None,
                    });
            }
        }
        ctx.end_scope().expect("scope was pushed immediately above");

        if let Some(declared) = &declared_return {
            if !types::subset(&inferred_return, declared) {
                self.report(
                    DiagnosticCategory::TypeError,
                    format!(
                        "function '{}' returns {inferred_return:?}, declared return type is {declared:?}",
                        func.name.as_str()
                    ),
                    func.range(),
                );
            }
        }

        let existing = ctx.resolve(func.name.as_str());

        // Bind a placeholder under the function's own name *before* snapshotting the closure, so
        // a self- or mutually-recursive call inside the body can resolve the name at all.
        // `ctx.copy()` shares the underlying scope (see `context.rs`), so overwriting this
        // placeholder with the real `Type::Function` just below is visible through the closure
        // snapshot too — recursive calls see the real signature, not the placeholder.
        ctx.bind(Symbol::new(func.name.as_str(), Type::Unknown));

        let evaluator = FunctionEvaluator::for_def(
            func.body.clone(),
            arguments.clone(),
            ctx.copy(),
            self.classes.clone(),
        );
        let return_spec = match declared_return {
            Some(declared) => ReturnSpec::Resolved(Box::new(declared)),
            None => ReturnSpec::Deferred(evaluator),
        };

        let function_type = Type::Function(FunctionType { arguments, return_spec });

        if let Some(old) = existing {
            self.report(
                DiagnosticCategory::Reassignment,
                format!("'{}' is already bound", func.name.as_str()),
                func.range(),
            );
            if old.type_ != function_type {
                self.report(
                    DiagnosticCategory::TypeChange,
                    format!("'{}' changes from {:?} to a function", func.name.as_str(), old.type_),
                    func.range(),
                );
            }
        }

        ctx.bind(Symbol::new(func.name.as_str(), function_type));
    }

    /// A parameter's default value, when the parameter also carries an explicit annotation, has
    /// to agree with that annotation — a default of `0` for a `str`-annotated parameter can never
    /// actually satisfy the declared type at the call sites that rely on the default.
    fn check_default_argument_types(&mut self, arguments: &Arguments, range: TextRange) {
        let without_default = arguments.names.len() - arguments.default_types.len();
        for (offset, default) in arguments.default_types.iter().enumerate() {
            let index = without_default + offset;
            let Some(declared) = arguments.explicit_types.get(index) else {
                continue;
            };
            if matches!(declared, Type::Unknown) || matches!(default, Type::Unknown) {
                continue;
            }
            if !types::subset(default, declared) {
                let name = arguments.names.get(index).map(String::as_str).unwrap_or("?");
                self.report(
                    DiagnosticCategory::DefaultArgumentTypeError,
                    format!("default value for '{name}' has type {default:?}, declared type is {declared:?}"),
                    range,
                );
            }
        }
    }

    fn visit_class_def(&mut self, class: &ast::StmtClassDef, ctx: &mut Context) {
        let name = class.name.to_string();
        let existing = ctx.resolve(&name);
        self.current_class.push(name.clone());
        self.last_init_attributes = None;
        ctx.begin_scope();
        self.visit_body(&class.body, ctx);
        let class_scope = ctx.current_scope().borrow().clone();
        ctx.end_scope().expect("scope was pushed immediately above");
        self.current_class.pop();

        // Methods are themselves instance attributes (§9's open question (b): class-level and
        // instance-level attributes are not distinguished), joined with whatever `self.x = ...`
        // assignments `__init__`'s body contributed. A name bound in the class body that collides
        // with one of its own methods/attributes (e.g. redefining `bar` after already defining a
        // method `bar`) is flagged the same way a module-level reassignment would be.
        let mut attributes = class_scope.clone();
        if let Some(init_attributes) = self.last_init_attributes.take() {
            for symbol in init_attributes.symbols() {
                if attributes.contains(&symbol.name) {
                    self.report(
                        DiagnosticCategory::OverlappingClassNames,
                        format!("'{}' is both a class-body name and an instance attribute", symbol.name),
                        class.range(),
                    );
                }
                attributes.add(symbol.clone());
            }
        }
        let instance = Type::Instance(InstanceType {
            class_name: name.clone(),
            attributes,
        });

        let arguments = match class_scope.get("__init__") {
            Some(symbol) => match &symbol.type_ {
                Type::Function(func) => func.arguments.clone().without_first(),
                _ => Arguments::new(),
            },
            None => Arguments::new(),
        };

        let class_type = Type::Class(ClassType {
            name: name.clone(),
            arguments,
            instance_type: Box::new(instance.clone()),
            static_scope: class_scope,
        });

        if let Some(old) = existing {
            self.report(
                DiagnosticCategory::Reassignment,
                format!("'{name}' is already bound"),
                class.range(),
            );
            if old.type_ != class_type {
                self.report(
                    DiagnosticCategory::TypeChange,
                    format!("'{name}' changes from {:?} to a class", old.type_),
                    class.range(),
                );
            }
        }

        self.classes.insert(name.clone(), instance);
        ctx.bind(Symbol::new(name, class_type));
    }

    fn visit_import(&mut self, import: &ast::StmtImport, ctx: &mut Context) {
        for alias in &import.names {
            let import_name = alias.name.as_str();
            let bound_name = alias
                .asname
                .as_ref()
                .map(|n| n.as_str())
                .unwrap_or(import_name);
            match self.resolve_and_analyze(import_name, import.range()) {
                Some(module_type) => ctx.bind(Symbol::new(bound_name, module_type)),
                None => {
                    // A failed import binds nothing: any later use of the name surfaces its own
                    // `undefined`, rather than this checker papering over the failure with a
                    // placeholder `Unknown` that would hide every subsequent real mistake.
                }
            }
        }
    }

    fn visit_import_from(&mut self, import_from: &ast::StmtImportFrom, ctx: &mut Context) {
        let Some(module) = &import_from.module else {
            self.report(
                DiagnosticCategory::ImportFailed,
                "relative imports without a module name are not resolved",
                import_from.range(),
            );
            return;
        };

        let Some(module_type) = self.resolve_and_analyze(module.as_str(), import_from.range()) else {
            return;
        };
        let Type::Instance(module_instance) = &module_type else {
            self.report(
                DiagnosticCategory::InvalidImport,
                format!("'{}' did not resolve to a module", module.as_str()),
                import_from.range(),
            );
            return;
        };

        for alias in &import_from.names {
            let bound = alias.asname.as_ref().map(|n| n.as_str()).unwrap_or(alias.name.as_str());
            let ty = module_instance
                .attributes
                .get(alias.name.as_str())
                .map(|s| s.type_.clone())
                .unwrap_or(Type::Unknown);
            ctx.bind(Symbol::new(bound, ty));
        }
    }

    /// Resolves `import_name` to source text, analyzes it (consulting and populating the module
    /// cache), and returns an `Instance("module", <its top-level scope>)` wrapping every name the
    /// module bound at module scope. Returns `None` (after reporting `import-failed`) on a
    /// resolution failure, a parse failure, or an import cycle, rather than a placeholder — per
    /// §4.8, a failed import binds nothing, it doesn't fabricate a module.
    fn resolve_and_analyze(&mut self, import_name: &str, range: impl Ranged) -> Option<Type> {
        let resolver = self.resolver?;
        let resolved = match resolver.resolve(import_name, &self.current_path) {
            Ok(resolved) => resolved,
            Err(err) => {
                self.report(
                    DiagnosticCategory::ImportFailed,
                    format!("could not resolve import '{import_name}': {err}"),
                    range,
                );
                return None;
            }
        };

        if self.import_stack.contains(&resolved.path) {
            warn!(path = %resolved.path.display(), "import cycle detected");
            self.report(
                DiagnosticCategory::ImportFailed,
                format!("import cycle detected resolving '{import_name}'"),
                range,
            );
            return None;
        }

        let key = cache_key(&resolved.path, &resolved.source);
        if let Some(cache) = self.cache {
            if let Some(persisted) = cache.get(&key) {
                return Some(module_instance_from_persisted(&persisted));
            }
        }

        let parsed = match ruff_python_parser::parse_module(&resolved.source) {
            Ok(parsed) => parsed,
            Err(err) => {
                self.report(
                    DiagnosticCategory::ImportFailed,
                    format!("module '{import_name}' failed to parse: {err}"),
                    range,
                );
                return None;
            }
        };

        self.import_stack.push(resolved.path.clone());
        let mut sub_ctx = Context::new(Scope::new());
        let sub_visitor = Visitor {
            classes: self.classes.clone(),
            diagnostics: DiagnosticSink::new(),
            annotations: AnnotationSink::new(),
            resolver: self.resolver,
            cache: self.cache,
            current_path: resolved.path.clone(),
            import_stack: self.import_stack.clone(),
            current_class: Vec::new(),
            last_init_attributes: None,
        };
        let result = sub_visitor.check_module(parsed.syntax().body.as_slice(), &mut sub_ctx);
        self.import_stack.pop();

        if let Some(cache) = self.cache {
            let exports_opaque = result.module_scope.symbols().any(|s| cache::contains_opaque(&s.type_));
            if !exports_opaque {
                let persisted = PersistedModule {
                    diagnostics: result.diagnostics.iter().map(Into::into).collect(),
                    exported_types: result
                        .module_scope
                        .symbols()
                        .map(|s| (s.name.clone(), PersistedType::from(&s.type_)))
                        .collect(),
                };
                cache.put(&key, &persisted);
            }
        }

        Some(Type::Instance(InstanceType {
            class_name: "module".to_string(),
            attributes: result.module_scope,
        }))
    }
}

/// Merges two branch-result scopes into `target` by unioning every type a name holds across
/// whichever of the two scopes bind it (both, or just one — in which case the other side's
/// "absent" is implicitly unified as if the name were never touched there). This is the "build the
/// merged scope" half of §4.6's `if`/`else` handling; [`Visitor::merge_branches`] is the "diagnose
/// what happened" half layered on top.
fn merge_unify(target: &mut Scope, then_scope: &Scope, else_scope: &Scope) {
    let mut names: Vec<&str> = then_scope.names().chain(else_scope.names()).collect();
    names.sort_unstable();
    names.dedup();
    for name in names {
        match (then_scope.get(name), else_scope.get(name)) {
            (Some(t), Some(e)) => {
                let unified = types::unify(&[t.type_.clone(), e.type_.clone()]);
                target.add(Symbol::new(name, unified));
            }
            (Some(only), None) | (None, Some(only)) => {
                let widened = types::unify(&[only.type_.clone(), Type::NoneType]);
                target.add(Symbol::new(name, widened));
            }
            (None, None) => unreachable!("name came from one of the two scopes"),
        }
    }
}

/// Evaluates `test` to a literal boolean when it is one of the handful of syntactic shapes whose
/// truthiness doesn't depend on anything but itself (a bare `True`/`False` literal, or a name bound
/// to a literal `bool` via [`crate::symbol::StaticValue`]).
fn static_evaluate_bool(test: &Expr, ctx: &Context) -> Option<bool> {
    match test {
        Expr::BooleanLiteral(b) => Some(b.value),
        Expr::Name(name) => match ctx.resolve(name.id.as_str())?.static_value {
            crate::symbol::StaticValue::Bool(b) => Some(b),
            _ => None,
        },
        _ => None,
    }
}

fn module_instance_from_persisted(persisted: &PersistedModule) -> Type {
    let mut scope = Scope::new();
    for (name, ty) in &persisted.exported_types {
        scope.add(Symbol::new(name.clone(), ty.to_type()));
    }
    Type::Instance(InstanceType {
        class_name: "module".to_string(),
        attributes: scope,
    })
}

fn element_type_of(iterable: &Type) -> Type {
    match iterable {
        Type::List(inner) | Type::Set(inner) => (**inner).clone(),
        Type::Dict(key, _) => (**key).clone(),
        Type::Tuple(elts) => types::unify(elts),
        Type::Str => Type::Str,
        _ => Type::Unknown,
    }
}

fn target_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Name(name) => Some(name.id.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::NullCache;
    use crate::resolver::NullResolver;

    fn check(source: &str) -> CheckResult {
        let parsed = ruff_python_parser::parse_module(source).unwrap();
        let mut ctx = Context::new(Scope::new());
        let resolver = NullResolver;
        let cache = NullCache;
        let visitor = Visitor::new(PathBuf::from("test.py"), &resolver, &cache);
        visitor.check_module(parsed.syntax().body.as_slice(), &mut ctx)
    }

    #[test]
    fn plain_assignment_binds_name() {
        let result = check("x = 1\n");
        assert_eq!(result.module_scope.get("x").unwrap().type_, Type::Num);
    }

    #[test]
    fn if_else_with_disjoint_branches_unifies() {
        let result = check("if True:\n    x = 1\nelse:\n    x = 'a'\n");
        match &result.module_scope.get("x").unwrap().type_ {
            Type::Union(alts) => {
                assert!(alts.contains(&Type::Num));
                assert!(alts.contains(&Type::Str));
            }
            other => panic!("expected union, got {other:?}"),
        }
    }

    #[test]
    fn if_without_else_makes_binding_maybe() {
        let result = check("if x:\n    y = 1\n");
        assert_eq!(result.module_scope.get("y").unwrap().type_, Type::Maybe(Box::new(Type::Num)));
    }

    #[test]
    fn annotation_mismatch_is_reported() {
        let result = check("x: str = 1\n");
        assert!(result.diagnostics.iter().any(|d| d.category == DiagnosticCategory::TypeError));
    }

    #[test]
    fn annotation_match_reports_nothing() {
        let result = check("x: int = 1\n");
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn function_return_type_is_inferred() {
        let result = check("def f():\n    return 1\n");
        let f = result.module_scope.get("f").unwrap();
        match &f.type_ {
            Type::Function(func) => match &func.return_spec {
                ReturnSpec::Deferred(evaluator) => {
                    assert_eq!(FunctionEvaluator::evaluate(evaluator, &[]), Type::Num);
                }
                ReturnSpec::Resolved(ty) => assert_eq!(**ty, Type::Num),
            },
            other => panic!("expected function, got {other:?}"),
        }
    }

    #[test]
    fn function_with_wrong_declared_return_is_reported() {
        let result = check("def f() -> str:\n    return 1\n");
        assert!(result.diagnostics.iter().any(|d| d.category == DiagnosticCategory::TypeError));
    }

    #[test]
    fn class_def_creates_instance_type_with_methods() {
        let result = check("class Foo:\n    def bar(self):\n        return 1\n");
        let foo = result.module_scope.get("Foo").unwrap();
        match &foo.type_ {
            Type::Class(class) => {
                assert_eq!(class.name, "Foo");
                assert!(class.static_scope.contains("bar"));
            }
            other => panic!("expected class, got {other:?}"),
        }
    }

    #[test]
    fn for_loop_does_not_leak_target_or_body_bindings() {
        let result = check("for x in [1, 2, 3]:\n    y = x\n");
        assert!(result.module_scope.get("x").is_none());
        assert!(result.module_scope.get("y").is_none());
    }

    #[test]
    fn while_body_bindings_are_visible_without_widening() {
        let result = check("x = True\nwhile x:\n    y = 1\n");
        assert_eq!(result.module_scope.get("y").unwrap().type_, Type::Num);
    }

    #[test]
    fn import_failure_is_reported_and_binds_nothing() {
        let result = check("import does_not_exist\n");
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].category, DiagnosticCategory::ImportFailed);
        assert!(result.module_scope.get("does_not_exist").is_none());
    }

    #[test]
    fn missing_required_argument_is_reported() {
        let result = check("def f(x):\n    return x\nf()\n");
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.category == DiagnosticCategory::MissingArgument));
    }

    #[test]
    fn too_many_positional_arguments_is_reported() {
        let result = check("def f(x):\n    return x\nf(1, 2)\n");
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.category == DiagnosticCategory::TooManyArguments));
    }

    #[test]
    fn unexpected_keyword_argument_is_reported() {
        let result = check("def f(x):\n    return x\nf(x=1, y=2)\n");
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.category == DiagnosticCategory::ExtraKeyword));
    }

    #[test]
    fn well_formed_call_reports_no_arity_mismatch() {
        let result = check("def f(x):\n    return x\nf(1)\n");
        assert!(!result.diagnostics.iter().any(|d| matches!(
            d.category,
            DiagnosticCategory::MissingArgument
                | DiagnosticCategory::TooManyArguments
                | DiagnosticCategory::ExtraKeyword
        )));
    }

    #[test]
    fn undefined_name_is_reported() {
        let result = check("y = x\n");
        assert!(result.diagnostics.iter().any(|d| d.category == DiagnosticCategory::Undefined));
    }

    #[test]
    fn calling_an_undefined_name_reports_undefined_function_not_undefined() {
        let result = check("f()\n");
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].category, DiagnosticCategory::UndefinedFunction);
    }

    #[test]
    fn calling_a_non_function_is_reported() {
        let result = check("x = 1\nx()\n");
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.category == DiagnosticCategory::NotAFunction));
    }

    #[test]
    fn reassignment_with_same_type_reports_only_reassignment() {
        let result = check("x = 1\nx = 2\n");
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].category, DiagnosticCategory::Reassignment);
    }

    #[test]
    fn reassignment_with_different_type_reports_both() {
        let result = check("x = 1\nx = 'a'\n");
        assert!(result.diagnostics.iter().any(|d| d.category == DiagnosticCategory::Reassignment));
        assert!(result.diagnostics.iter().any(|d| d.category == DiagnosticCategory::TypeChange));
    }

    #[test]
    fn delete_is_always_reported_and_binding_survives() {
        let result = check("x = 1\ndel x\ny = x\n");
        assert!(result.diagnostics.iter().any(|d| d.category == DiagnosticCategory::Delete));
        assert_eq!(result.module_scope.get("y").unwrap().type_, Type::Num);
    }

    #[test]
    fn mismatched_binop_operands_are_reported() {
        let result = check("x = 1 + 'a'\n");
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.category == DiagnosticCategory::TypeError));
    }

    #[test]
    fn in_operator_against_non_container_is_reported() {
        let result = check("x = 1 in 2\n");
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.category == DiagnosticCategory::InOperatorArgumentNotListOrDict));
    }

    #[test]
    fn chained_is_comparisons_are_reported() {
        let result = check("x = 1\ny = 2\nz = x is y is None\n");
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.category == DiagnosticCategory::IsOperatorChaining));
    }

    #[test]
    fn default_argument_type_mismatch_is_reported() {
        let result = check("def f(x: str = 1):\n    return x\n");
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.category == DiagnosticCategory::DefaultArgumentTypeError));
    }

    #[test]
    fn constant_if_condition_is_reported() {
        let result = check("if True:\n    x = 1\n");
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.category == DiagnosticCategory::ConstantIfCondition));
    }

    #[test]
    fn conditionally_assigned_name_is_reported() {
        let result = check("if x:\n    y = 1\nelse:\n    pass\n");
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.category == DiagnosticCategory::ConditionallyAssigned));
    }
}
