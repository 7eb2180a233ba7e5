//! Types an expression node against a [`TypeEnv`] (§4.3).
//!
//! Grounded in `main.py`'s `Visitor.expression_type`/`static_evaluate` pair. Expression typing is
//! read-only with respect to the real [`crate::context::Context`]: any name a sub-expression
//! introduces (a comprehension target, a lambda parameter) is bound into a throwaway
//! [`crate::context::ExtendedContext`] layered over the caller's environment rather than into the
//! real scope stack.

use ruff_python_ast::{self as ast, Expr};

use crate::context::{Context, TypeEnv};
use crate::function_eval::FunctionEvaluator;
use crate::symbol::StaticValue;
use crate::types::{self, Arguments, FunctionType, ReturnSpec, Type};

/// Types `expr` against `env`. Never fails: an expression this checker cannot model types to
/// `Unknown` rather than erroring, per §4.1's "Unknown is never itself the cause of an error".
pub fn expression_type(expr: &Expr, env: &dyn TypeEnv) -> Type {
    match expr {
        Expr::NoneLiteral(_) => Type::NoneType,
        Expr::BooleanLiteral(_) => Type::Bool,
        Expr::NumberLiteral(_) => Type::Num,
        Expr::StringLiteral(_) | Expr::FString(_) | Expr::BytesLiteral(_) => Type::Str,

        Expr::Name(name) => env
            .resolve(name.id.as_str())
            .map(|s| s.type_)
            .unwrap_or(Type::Unknown),

        Expr::List(list) => {
            let elt_types: Vec<Type> = list.elts.iter().map(|e| expression_type(e, env)).collect();
            Type::List(Box::new(types::unify(&elt_types)))
        }

        Expr::Set(set) => {
            let elt_types: Vec<Type> = set.elts.iter().map(|e| expression_type(e, env)).collect();
            Type::Set(Box::new(types::unify(&elt_types)))
        }

        Expr::Tuple(tuple) => {
            Type::Tuple(tuple.elts.iter().map(|e| expression_type(e, env)).collect())
        }

        Expr::Dict(dict) => {
            let mut key_types = Vec::new();
            let mut value_types = Vec::new();
            for item in &dict.items {
                if let Some(key) = &item.key {
                    key_types.push(expression_type(key, env));
                }
                value_types.push(expression_type(&item.value, env));
            }
            Type::Dict(
                Box::new(types::unify(&key_types)),
                Box::new(types::unify(&value_types)),
            )
        }

        Expr::ListComp(comp) => {
            let ext = ExtendedContextRef::new(env);
            bind_comprehensions(&comp.generators, &ext);
            Type::List(Box::new(expression_type(&comp.elt, &ext)))
        }
        Expr::SetComp(comp) => {
            let ext = ExtendedContextRef::new(env);
            bind_comprehensions(&comp.generators, &ext);
            Type::Set(Box::new(expression_type(&comp.elt, &ext)))
        }
        Expr::DictComp(comp) => {
            let ext = ExtendedContextRef::new(env);
            bind_comprehensions(&comp.generators, &ext);
            Type::Dict(
                Box::new(expression_type(&comp.key, &ext)),
                Box::new(expression_type(&comp.value, &ext)),
            )
        }
        Expr::Generator(comp) => {
            let ext = ExtendedContextRef::new(env);
            bind_comprehensions(&comp.generators, &ext);
            Type::List(Box::new(expression_type(&comp.elt, &ext)))
        }

        Expr::BoolOp(boolop) => {
            let operand_types: Vec<Type> =
                boolop.values.iter().map(|v| expression_type(v, env)).collect();
            types::unify(&operand_types)
        }

        Expr::UnaryOp(unary) => match unary.op {
            ast::UnaryOp::Not => Type::Bool,
            ast::UnaryOp::USub | ast::UnaryOp::UAdd | ast::UnaryOp::Invert => {
                expression_type(&unary.operand, env)
            }
        },

        Expr::BinOp(binop) => {
            let left = expression_type(&binop.left, env);
            let right = expression_type(&binop.right, env);
            binop_type(&left, &right)
        }

        Expr::Compare(_) => Type::Bool,

        Expr::IfExp(ifexp) => {
            let body = expression_type(&ifexp.body, env);
            let orelse = expression_type(&ifexp.orelse, env);
            types::unify(&[body, orelse])
        }

        Expr::Lambda(lambda) => {
            let arguments = function_arguments(lambda.parameters.as_deref());
            let evaluator = FunctionEvaluator::for_lambda(&lambda.body, arguments.clone());
            Type::Function(FunctionType {
                arguments,
                return_spec: ReturnSpec::Deferred(evaluator),
            })
        }

        Expr::Attribute(attr) => {
            let base = expression_type(&attr.value, env);
            attribute_type(&base, attr.attr.as_str())
        }

        Expr::Subscript(sub) => {
            let base = expression_type(&sub.value, env);
            subscript_type(&base)
        }

        Expr::Call(call) => call_type(call, env),

        Expr::Starred(starred) => expression_type(&starred.value, env),

        Expr::Named(named) => expression_type(&named.value, env),

        _ => Type::Unknown,
    }
}

fn binop_type(left: &Type, right: &Type) -> Type {
    match (left, right) {
        (Type::Str, Type::Str) => Type::Str,
        (Type::Num, Type::Num) => Type::Num,
        (Type::List(a), Type::List(b)) => Type::List(Box::new(types::unify(&[(**a).clone(), (**b).clone()]))),
        (Type::Unknown, _) | (_, Type::Unknown) => Type::Unknown,
        _ => Type::Unknown,
    }
}

fn attribute_type(base: &Type, attr: &str) -> Type {
    match base {
        Type::Instance(inst) => inst
            .attributes
            .get(attr)
            .map(|s| s.type_.clone())
            .unwrap_or(Type::Unknown),
        Type::Class(class) => class
            .static_scope
            .get(attr)
            .map(|s| s.type_.clone())
            .unwrap_or(Type::Unknown),
        Type::Maybe(inner) => attribute_type(inner, attr),
        _ => Type::Unknown,
    }
}

fn subscript_type(base: &Type) -> Type {
    match base {
        Type::List(inner) | Type::Set(inner) => (**inner).clone(),
        Type::Dict(_, value) => (**value).clone(),
        Type::Tuple(elts) => types::unify(elts),
        Type::BaseTuple | Type::Str => Type::Unknown,
        _ => Type::Unknown,
    }
}

fn call_type(call: &ast::ExprCall, env: &dyn TypeEnv) -> Type {
    let callee = expression_type(&call.func, env);
    match callee {
        Type::Function(func) => match func.return_spec {
            ReturnSpec::Resolved(ty) => *ty,
            ReturnSpec::Deferred(evaluator) => {
                let arg_types: Vec<Type> = call
                    .arguments
                    .args
                    .iter()
                    .map(|a| expression_type(a, env))
                    .collect();
                FunctionEvaluator::evaluate(&evaluator, &arg_types)
            }
        },
        Type::Class(class) => *class.instance_type,
        _ => Type::Unknown,
    }
}

fn bind_comprehensions(generators: &[ast::Comprehension], ext: &ExtendedContextRef) {
    for generator in generators {
        let iter_type = expression_type(&generator.iter, ext);
        let elt_type = subscript_type(&iter_type);
        bind_target(&generator.target, elt_type, ext);
    }
}

fn bind_target(target: &Expr, ty: Type, ext: &ExtendedContextRef) {
    match target {
        Expr::Name(name) => ext.bind(crate::symbol::Symbol::new(name.id.as_str(), ty)),
        Expr::Tuple(tuple) => {
            for elt in &tuple.elts {
                bind_target(elt, Type::Unknown, ext);
            }
        }
        Expr::List(list) => {
            for elt in &list.elts {
                bind_target(elt, Type::Unknown, ext);
            }
        }
        _ => {}
    }
}

/// Builds an [`Arguments`] signature from a parameter list, typing annotated parameters directly
/// and leaving unannotated ones `Unknown` (§4.4: annotations are the only source of a parameter's
/// declared type; inference never runs backwards from call sites to parameter types).
pub fn function_arguments(parameters: Option<&ast::Parameters>) -> Arguments {
    let Some(parameters) = parameters else {
        return Arguments::new();
    };
    let mut arguments = Arguments::new();
    for param in &parameters.args {
        arguments.names.push(param.parameter.name.to_string());
        let ty = param
            .parameter
            .annotation
            .as_deref()
            .map(annotation_type)
            .unwrap_or(Type::Unknown);
        arguments.explicit_types.push(ty);
        if let Some(default) = &param.default {
            arguments.default_types.push(expression_type(default, &unit_env()));
        }
    }
    arguments.min_count = arguments.names.len() - arguments.default_types.len();
    if let Some(vararg) = &parameters.vararg {
        arguments.vararg = Some(vararg.name.to_string());
    }
    if let Some(kwarg) = &parameters.kwarg {
        arguments.kwarg = Some(kwarg.name.to_string());
    }
    arguments
}

/// An empty, scope-less context used only to type a parameter default expression, which by
/// Python's own evaluation rules can never reference the function's own parameters.
fn unit_env() -> Context {
    Context::new(crate::scope::Scope::new())
}

/// Resolves a type annotation expression to a [`Type`] (§4.7/annotation handling). Grounded in
/// `main.py`'s handling of `ast.AnnAssign`/parameter annotations: only a fixed vocabulary of
/// annotation shapes is understood, anything else types to `Unknown`.
pub fn annotation_type(annotation: &Expr) -> Type {
    match annotation {
        Expr::Name(name) => match name.id.as_str() {
            "int" | "float" => Type::Num,
            "str" => Type::Str,
            "bool" => Type::Bool,
            "None" => Type::NoneType,
            _ => Type::Unknown,
        },
        Expr::NoneLiteral(_) => Type::NoneType,
        Expr::Subscript(sub) => {
            let Expr::Name(name) = sub.value.as_ref() else {
                return Type::Unknown;
            };
            match name.id.as_str() {
                "list" | "List" => Type::List(Box::new(annotation_type(&sub.slice))),
                "set" | "Set" => Type::Set(Box::new(annotation_type(&sub.slice))),
                "dict" | "Dict" => {
                    if let Expr::Tuple(tuple) = sub.slice.as_ref() {
                        if tuple.elts.len() == 2 {
                            return Type::Dict(
                                Box::new(annotation_type(&tuple.elts[0])),
                                Box::new(annotation_type(&tuple.elts[1])),
                            );
                        }
                    }
                    Type::Dict(Box::new(Type::Unknown), Box::new(Type::Unknown))
                }
                "tuple" | "Tuple" => match sub.slice.as_ref() {
                    Expr::Tuple(tuple) => {
                        Type::Tuple(tuple.elts.iter().map(annotation_type).collect())
                    }
                    single => Type::Tuple(vec![annotation_type(single)]),
                },
                "Optional" => Type::Maybe(Box::new(annotation_type(&sub.slice))),
                _ => Type::Unknown,
            }
        }
        Expr::BinOp(ast::ExprBinOp {
            left,
            op: ast::Operator::BitOr,
            right,
            ..
        }) => types::unify(&[annotation_type(left), annotation_type(right)]),
        Expr::StringLiteral(s) => {
            // A forward-reference annotation: the quoted text names a type the module hasn't
            // necessarily finished defining yet. Resolving it would require reparsing the
            // string as an expression against a full annotation grammar; out of scope.
            let _ = s;
            Type::Unknown
        }
        _ => Type::Unknown,
    }
}

/// Statically evaluates a *literal* value out of `expr`, if it is one, for narrowing purposes
/// (§4.6's literal-dependent constraints over `isinstance`/equality tests). Anything not a bare
/// literal yields [`StaticValue::Unknown`].
pub fn static_evaluate(expr: &Expr) -> StaticValue {
    match expr {
        Expr::NoneLiteral(_) => StaticValue::None,
        Expr::BooleanLiteral(b) => StaticValue::Bool(b.value),
        Expr::NumberLiteral(ast::ExprNumberLiteral { value, .. }) => match value {
            ast::Number::Int(i) => i.as_i64().map(|v| v as f64).map(StaticValue::Num).unwrap_or(StaticValue::Unknown),
            ast::Number::Float(f) => StaticValue::Num(*f),
            ast::Number::Complex { .. } => StaticValue::Unknown,
        },
        Expr::StringLiteral(s) => StaticValue::Str(s.value.to_str().to_owned()),
        _ => StaticValue::Unknown,
    }
}

/// A [`TypeEnv`] overlay exactly like [`ExtendedContext`] but layered over any `&dyn TypeEnv`
/// rather than concretely a [`Context`], so nested comprehensions can extend an already-extended
/// environment without the concrete-`Context` restriction [`ExtendedContext`] itself has.
pub struct ExtendedContextRef<'b> {
    base: &'b dyn TypeEnv,
    top: std::cell::RefCell<crate::scope::Scope>,
    constraints: std::cell::RefCell<rustc_hash::FxHashMap<String, Type>>,
}

impl<'b> ExtendedContextRef<'b> {
    pub fn new(base: &'b dyn TypeEnv) -> Self {
        Self {
            base,
            top: std::cell::RefCell::new(crate::scope::Scope::new()),
            constraints: std::cell::RefCell::new(rustc_hash::FxHashMap::default()),
        }
    }

    pub fn bind(&self, symbol: crate::symbol::Symbol) {
        self.top.borrow_mut().add(symbol);
    }
}

impl<'b> TypeEnv for ExtendedContextRef<'b> {
    fn resolve(&self, name: &str) -> Option<crate::symbol::Symbol> {
        self.top.borrow().get(name).cloned().or_else(|| self.base.resolve(name))
    }

    fn add_constraint(&self, name: &str, ty: Type) {
        self.constraints.borrow_mut().insert(name.to_owned(), ty);
    }

    fn constraint(&self, name: &str) -> Option<Type> {
        self.constraints
            .borrow()
            .get(name)
            .cloned()
            .or_else(|| self.base.constraint(name))
    }

    fn clear_constraint(&self, name: &str) {
        self.constraints.borrow_mut().remove(name);
    }

    fn depth(&self) -> usize {
        self.base.depth() + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::Scope;
    use crate::symbol::Symbol;
    use ruff_python_parser::parse_expression;

    fn parse(src: &str) -> Expr {
        *parse_expression(src).unwrap().into_syntax().body
    }

    #[test]
    fn literal_types() {
        let ctx = Context::new(Scope::new());
        assert_eq!(expression_type(&parse("None"), &ctx), Type::NoneType);
        assert_eq!(expression_type(&parse("True"), &ctx), Type::Bool);
        assert_eq!(expression_type(&parse("1"), &ctx), Type::Num);
        assert_eq!(expression_type(&parse("\"s\""), &ctx), Type::Str);
    }

    #[test]
    fn list_literal_unifies_element_types() {
        let ctx = Context::new(Scope::new());
        let ty = expression_type(&parse("[1, 2, 3]"), &ctx);
        assert_eq!(ty, Type::List(Box::new(Type::Num)));
    }

    #[test]
    fn name_lookup_through_context() {
        let mut ctx = Context::new(Scope::new());
        ctx.begin_scope();
        ctx.bind(Symbol::new("x", Type::Str));
        assert_eq!(expression_type(&parse("x"), &ctx), Type::Str);
    }

    #[test]
    fn ternary_unifies_branches() {
        let mut ctx = Context::new(Scope::new());
        ctx.begin_scope();
        ctx.bind(Symbol::new("x", Type::Num));
        let ty = expression_type(&parse("x if True else None"), &ctx);
        assert_eq!(ty, Type::Maybe(Box::new(Type::Num)));
    }

    #[test]
    fn annotation_list_of_int() {
        let expr = parse("list[int]");
        assert_eq!(annotation_type(&expr), Type::List(Box::new(Type::Num)));
    }

    #[test]
    fn annotation_optional() {
        let expr = parse("Optional[str]");
        assert_eq!(annotation_type(&expr), Type::Maybe(Box::new(Type::Str)));
    }

    #[test]
    fn static_evaluate_recognizes_literals() {
        assert_eq!(static_evaluate(&parse("None")), StaticValue::None);
        assert_eq!(static_evaluate(&parse("\"hi\"")), StaticValue::Str("hi".to_string()));
        assert_eq!(static_evaluate(&parse("x")), StaticValue::Unknown);
    }
}
