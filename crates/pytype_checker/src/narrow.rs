//! Derives narrowing constraints from a boolean test expression (§4.6).
//!
//! Grounded in `backend/context.py`'s constraint-building helpers and `main.py`'s handling of
//! `if`/`while` tests. Each test expression yields two constraint sets: the facts known to hold
//! when the test is truthy (`positive_constraints`) and when it is falsy (`negative_constraints`).
//! The visitor applies the positive set to the `if` body and the negative set to the `else`.

use ruff_python_ast::{self as ast, Expr};
use rustc_hash::FxHashMap;

use crate::context::TypeEnv;
use crate::types::Type;

/// Maps a bare class name (as it would appear as the second argument to `isinstance`) to the
/// instance type narrowing to that class implies. Built by the visitor from every `class`
/// statement seen so far in the module.
pub type ClassTable = FxHashMap<String, Type>;

/// Constraints that hold on the narrowed name(s) if `test` evaluates truthy.
pub fn positive_constraints(
    test: &Expr,
    env: &dyn TypeEnv,
    classes: &ClassTable,
) -> Vec<(String, Type)> {
    constraints_for(test, env, classes, true)
}

/// Constraints that hold on the narrowed name(s) if `test` evaluates falsy.
pub fn negative_constraints(
    test: &Expr,
    env: &dyn TypeEnv,
    classes: &ClassTable,
) -> Vec<(String, Type)> {
    constraints_for(test, env, classes, false)
}

fn constraints_for(
    test: &Expr,
    env: &dyn TypeEnv,
    classes: &ClassTable,
    truthy: bool,
) -> Vec<(String, Type)> {
    match test {
        Expr::UnaryOp(ast::ExprUnaryOp {
            op: ast::UnaryOp::Not,
            operand,
            ..
        }) => constraints_for(operand, env, classes, !truthy),

        Expr::BoolOp(ast::ExprBoolOp { op, values, .. }) => {
            // `a and b` truthy implies both a and b are truthy; falsy tells us nothing precise
            // about either individually, so only the "both happened" direction is sound.
            // `a or b` is the mirror image.
            let conjunctive = matches!(op, ast::BoolOp::And) == truthy;
            if conjunctive {
                values
                    .iter()
                    .flat_map(|v| constraints_for(v, env, classes, truthy))
                    .collect()
            } else {
                Vec::new()
            }
        }

        Expr::Compare(cmp) if cmp.comparators.len() == 1 => {
            compare_constraints(&cmp.left, cmp.ops[0], &cmp.comparators[0], truthy)
        }

        Expr::Call(call) => isinstance_constraints(call, classes, truthy),

        Expr::Name(name) if truthy => {
            // A bare name used as a condition being truthy rules out `None` (and, for a `Maybe`,
            // collapses it to the inner type) but says nothing when falsy: plenty of non-`None`
            // values (`0`, `""`, `[]`) are also falsy.
            match env.resolve(name.id.as_str()) {
                Some(symbol) => match symbol.type_ {
                    Type::Maybe(inner) => vec![(name.id.to_string(), *inner)],
                    _ => Vec::new(),
                },
                None => Vec::new(),
            }
        }

        _ => Vec::new(),
    }
}

fn compare_constraints(
    left: &Expr,
    op: ast::CmpOp,
    right: &Expr,
    truthy: bool,
) -> Vec<(String, Type)> {
    let is_eq = matches!(op, ast::CmpOp::Eq | ast::CmpOp::Is);
    let is_neq = matches!(op, ast::CmpOp::NotEq | ast::CmpOp::IsNot);
    if !is_eq && !is_neq {
        return Vec::new();
    }
    // Both forms narrow on their own truthy branch: `x is None` being true tells us `x` is
    // `None`; `x is not None` being true tells us the same match arm's fact applies to the
    // branch where the comparison holds, not its negation.
    let narrows_now = truthy;
    if !narrows_now {
        return Vec::new();
    }

    match (left, right) {
        (Expr::Name(name), Expr::NoneLiteral(_)) | (Expr::NoneLiteral(_), Expr::Name(name)) => {
            vec![(name.id.to_string(), Type::NoneType)]
        }
        _ => Vec::new(),
    }
}

fn isinstance_constraints(
    call: &ast::ExprCall,
    classes: &ClassTable,
    truthy: bool,
) -> Vec<(String, Type)> {
    if !truthy {
        // The negative branch of isinstance would need set-difference over the lattice, which
        // this checker doesn't model; we only narrow the positive arm.
        return Vec::new();
    }
    let Expr::Name(func_name) = call.func.as_ref() else {
        return Vec::new();
    };
    if func_name.id.as_str() != "isinstance" || call.arguments.args.len() != 2 {
        return Vec::new();
    }
    let Expr::Name(target) = &call.arguments.args[0] else {
        return Vec::new();
    };

    let class_names: Vec<&str> = match &call.arguments.args[1] {
        Expr::Name(name) => vec![name.id.as_str()],
        Expr::Tuple(tuple) => tuple
            .elts
            .iter()
            .filter_map(|e| match e {
                Expr::Name(name) => Some(name.id.as_str()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };

    let types: Vec<Type> = class_names
        .into_iter()
        .filter_map(|name| classes.get(name).cloned())
        .collect();

    if types.is_empty() {
        return Vec::new();
    }
    vec![(target.id.to_string(), crate::types::unify(&types))]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::scope::Scope;
    use crate::symbol::Symbol;
    use ruff_python_parser::parse_expression;

    fn parse(src: &str) -> Expr {
        *parse_expression(src).unwrap().into_syntax().body
    }

    #[test]
    fn name_truthy_narrows_maybe_to_inner() {
        let mut ctx = Context::new(Scope::new());
        ctx.begin_scope();
        ctx.bind(Symbol::new("x", Type::Maybe(Box::new(Type::Num))));

        let test = parse("x");
        let constraints = positive_constraints(&test, &ctx, &ClassTable::default());
        assert_eq!(constraints, vec![("x".to_string(), Type::Num)]);
    }

    #[test]
    fn is_none_yields_none_constraint_on_truthy_branch() {
        let ctx = Context::new(Scope::new());
        let test = parse("x is None");
        let constraints = positive_constraints(&test, &ctx, &ClassTable::default());
        assert_eq!(constraints, vec![("x".to_string(), Type::NoneType)]);
    }

    #[test]
    fn is_not_none_narrows_on_its_own_truthy_branch() {
        let ctx = Context::new(Scope::new());
        let test = parse("x is not None");
        let constraints = positive_constraints(&test, &ctx, &ClassTable::default());
        assert_eq!(constraints, vec![("x".to_string(), Type::NoneType)]);
    }

    #[test]
    fn not_flips_truthy_and_falsy() {
        let ctx = Context::new(Scope::new());
        let test = parse("not (x is None)");
        let positive = positive_constraints(&test, &ctx, &ClassTable::default());
        assert!(positive.is_empty());
    }

    #[test]
    fn isinstance_narrows_to_class_instance_type() {
        let ctx = Context::new(Scope::new());
        let test = parse("isinstance(x, Foo)");
        let mut classes = ClassTable::default();
        let instance_ty = Type::Instance(crate::types::InstanceType {
            class_name: "Foo".to_string(),
            attributes: Scope::new(),
        });
        classes.insert("Foo".to_string(), instance_ty.clone());

        let constraints = positive_constraints(&test, &ctx, &classes);
        assert_eq!(constraints, vec![("x".to_string(), instance_ty)]);
    }

    #[test]
    fn and_chain_collects_constraints_from_both_operands() {
        let ctx = Context::new(Scope::new());
        let test = parse("x is None and y is None");
        let constraints = positive_constraints(&test, &ctx, &ClassTable::default());
        assert_eq!(
            constraints,
            vec![
                ("x".to_string(), Type::NoneType),
                ("y".to_string(), Type::NoneType)
            ]
        );
    }
}
