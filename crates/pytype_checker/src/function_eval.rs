//! Deferred, memoizing evaluation of a function or lambda body against concrete argument types
//! (§4.4: "Function Evaluator").
//!
//! Grounded directly in `main.py`'s `FunctionEvaluator` class: a function's return type is not
//! computed when the `def`/`lambda` is visited, only a thunk capturing its body, parameter
//! signature, and the enclosing scope at definition time (its closure). The thunk runs the first
//! time it's actually called with a given argument-type tuple, and the result is cached by
//! structural equality of that tuple so a function called twice with the same argument types is
//! only evaluated once. A linear scan is enough here: real modules call any one function with at
//! most a handful of distinct argument-type combinations.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use ruff_python_ast as ast;

use crate::annotation::Annotation;
use crate::context::Context;
use crate::diagnostics::Diagnostic;
use crate::narrow::ClassTable;
use crate::types::{Arguments, Type};

#[derive(Debug, Clone)]
enum FunctionBody {
    Statements(Vec<ast::Stmt>),
    Expression(Box<ast::Expr>),
}

#[derive(Debug)]
pub struct FunctionEvaluator {
    body: FunctionBody,
    arguments: Arguments,
    /// Snapshot of the scope stack visible where the function was defined, so a nested function
    /// can see its enclosing locals when it finally runs.
    closure: Context,
    classes: ClassTable,
    /// `(argument types, return type, warnings produced evaluating the body, annotations
    /// recorded evaluating the body)`. A cache *hit* suppresses the warnings (they were already
    /// surfaced to whichever call site first populated this entry) but still resurfaces the
    /// annotations, matching the original implementation's `clear_warnings` behavior: the first
    /// evaluation of a given argument-type tuple is the only one whose warnings reach a caller.
    cache: RefCell<Vec<(Vec<Type>, Type, Vec<Diagnostic>, Vec<Annotation>)>>,
    /// Guards against infinite regress when a function's body calls itself (directly or through
    /// mutual recursion) before its own return type is known; a reentrant call sees `Unknown`
    /// rather than looping forever, matching the original implementation's recursion guard.
    evaluating: Cell<bool>,
}

impl FunctionEvaluator {
    pub fn for_def(
        body: Vec<ast::Stmt>,
        arguments: Arguments,
        closure: Context,
        classes: ClassTable,
    ) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            body: FunctionBody::Statements(body),
            arguments,
            closure,
            classes,
            cache: RefCell::new(Vec::new()),
            evaluating: Cell::new(false),
        }))
    }

    pub fn for_lambda(body: &ast::Expr, arguments: Arguments) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            body: FunctionBody::Expression(Box::new(body.clone())),
            arguments,
            closure: Context::new(crate::scope::Scope::new()),
            classes: ClassTable::default(),
            cache: RefCell::new(Vec::new()),
            evaluating: Cell::new(false),
        }))
    }

    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    /// Resolves the return type of `evaluator` called with `arg_types`, discarding any
    /// diagnostics/annotations the evaluation produced. Most callers only need the type (e.g.
    /// typing a call as a sub-expression of something else); [`Self::evaluate_with_diagnostics`]
    /// is for the one call site (a bare `Call` statement) that also needs to surface findings.
    pub fn evaluate(evaluator: &Rc<RefCell<Self>>, arg_types: &[Type]) -> Type {
        Self::evaluate_with_diagnostics(evaluator, arg_types).0
    }

    /// Resolves the return type of `evaluator` called with `arg_types`, consulting and then
    /// populating its memo cache, and returns the diagnostics/annotations the body produced. On
    /// a cache hit, diagnostics are suppressed (already reported to whichever caller evaluated
    /// this argument-type tuple first) but annotations are returned again.
    pub fn evaluate_with_diagnostics(
        evaluator: &Rc<RefCell<Self>>,
        arg_types: &[Type],
    ) -> (Type, Vec<Diagnostic>, Vec<Annotation>) {
        {
            let this = evaluator.borrow();
            if let Some((_, cached_ty, _, cached_annotations)) = this
                .cache
                .borrow()
                .iter()
                .find(|(k, ..)| k.as_slice() == arg_types)
            {
                return (cached_ty.clone(), Vec::new(), cached_annotations.clone());
            }
            if this.evaluating.get() {
                return (Type::Unknown, Vec::new(), Vec::new());
            }
        }

        evaluator.borrow().evaluating.set(true);
        let (result, diagnostics, annotations) = Self::run(evaluator, arg_types);
        evaluator.borrow().evaluating.set(false);

        evaluator.borrow().cache.borrow_mut().push((
            arg_types.to_vec(),
            result.clone(),
            diagnostics.clone(),
            annotations.clone(),
        ));
        (result, diagnostics, annotations)
    }

    fn run(evaluator: &Rc<RefCell<Self>>, arg_types: &[Type]) -> (Type, Vec<Diagnostic>, Vec<Annotation>) {
        let this = evaluator.borrow();
        let mut ctx = this.closure.copy();
        ctx.begin_scope();

        for (i, name) in this.arguments.names.iter().enumerate() {
            let declared = this.arguments.explicit_types.get(i).cloned().unwrap_or(Type::Unknown);
            let passed = arg_types.get(i).cloned().unwrap_or(Type::Unknown);
            let bound = if declared != Type::Unknown { declared } else { passed };
            ctx.bind(crate::symbol::Symbol::new(name.clone(), bound));
        }

        match &this.body {
            FunctionBody::Expression(expr) => {
                let ty = crate::expr_typer::expression_type(expr, &ctx);
                drop(this);
                let _ = evaluator;
                (ty, Vec::new(), Vec::new())
            }
            FunctionBody::Statements(stmts) => {
                let classes = this.classes.clone();
                let stmts = stmts.clone();
                drop(this);
                let (diagnostics, annotations) =
                    crate::visitor::run_function_body(&stmts, &mut ctx, &classes);
                let return_type = ctx.get_return().map(|s| s.type_).unwrap_or(Type::NoneType);
                (return_type, diagnostics, annotations)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::Scope;

    #[test]
    fn lambda_evaluates_body_against_argument_types() {
        let body = ruff_python_parser::parse_expression("x + 1")
            .unwrap()
            .into_syntax()
            .body;
        let mut arguments = Arguments::new();
        arguments.names.push("x".to_string());
        arguments.explicit_types.push(Type::Unknown);
        arguments.min_count = 1;

        let evaluator = FunctionEvaluator::for_lambda(&body, arguments);
        let result = FunctionEvaluator::evaluate(&evaluator, &[Type::Num]);
        assert_eq!(result, Type::Num);
    }

    #[test]
    fn repeated_call_with_same_args_hits_cache() {
        let body = ruff_python_parser::parse_expression("x")
            .unwrap()
            .into_syntax()
            .body;
        let mut arguments = Arguments::new();
        arguments.names.push("x".to_string());
        arguments.explicit_types.push(Type::Unknown);

        let evaluator = FunctionEvaluator::for_lambda(&body, arguments);
        let first = FunctionEvaluator::evaluate(&evaluator, &[Type::Str]);
        let second = FunctionEvaluator::evaluate(&evaluator, &[Type::Str]);
        assert_eq!(first, second);
        assert_eq!(evaluator.borrow().cache.borrow().len(), 1);
    }

    #[test]
    fn unrelated_closure_scope_is_visible_to_lambda_body() {
        let mut ctx = Context::new(Scope::new());
        ctx.begin_scope();
        ctx.bind(crate::symbol::Symbol::new("y", Type::Str));

        let body = ruff_python_parser::parse_expression("y")
            .unwrap()
            .into_syntax()
            .body;
        let evaluator = Rc::new(RefCell::new(FunctionEvaluator {
            body: FunctionBody::Expression(Box::new(body)),
            arguments: Arguments::new(),
            closure: ctx,
            classes: ClassTable::default(),
            cache: RefCell::new(Vec::new()),
            evaluating: Cell::new(false),
        }));
        assert_eq!(FunctionEvaluator::evaluate(&evaluator, &[]), Type::Str);
    }

    #[test]
    fn cache_hit_suppresses_warnings_but_not_annotations() {
        let stmts = ruff_python_parser::parse_module("x\nreturn x\n")
            .unwrap()
            .into_syntax()
            .body;
        let mut arguments = Arguments::new();
        arguments.names.push("x".to_string());
        arguments.explicit_types.push(Type::Unknown);

        let evaluator = FunctionEvaluator::for_def(
            stmts,
            arguments,
            Context::new(Scope::new()),
            ClassTable::default(),
        );
        let (first_ty, first_diagnostics, first_annotations) =
            FunctionEvaluator::evaluate_with_diagnostics(&evaluator, &[Type::Num]);
        let (second_ty, second_diagnostics, second_annotations) =
            FunctionEvaluator::evaluate_with_diagnostics(&evaluator, &[Type::Num]);

        assert_eq!(first_ty, second_ty);
        assert_eq!(first_annotations.len(), second_annotations.len());
        assert!(
            second_diagnostics.is_empty(),
            "a cache hit must not re-surface warnings, got {second_diagnostics:?}"
        );
        let _ = first_diagnostics;
    }
}
