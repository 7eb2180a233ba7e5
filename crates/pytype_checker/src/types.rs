//! The type lattice (§3, §4.1): a closed algebraic sum of type terms plus the unification,
//! subtyping, and intersection algebra over them.
//!
//! Grounded in `red_knot_python_semantic::types` (the `Type<'db>` enum and its `UnionBuilder`
//! / `IntersectionBuilder`), simplified from a salsa-interned, structurally-generic type system
//! down to the closed, non-generic lattice this specification actually calls for: there is no
//! class hierarchy, no protocol structural typing, and no per-db interning, so `Type` here is a
//! plain recursive enum rather than a `Copy` handle into a query database.

use std::cell::RefCell;
use std::rc::Rc;

pub mod builder;

use crate::function_eval::FunctionEvaluator;
use crate::scope::Scope;
pub use builder::{IntersectionBuilder, UnionBuilder};

/// A type term in the lattice (§3).
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    /// Bottom-of-knowledge sentinel: compatible with everything, never the cause of a type error.
    Unknown,
    NoneType,
    Bool,
    /// Ints and floats collapsed into one numeric type, per §3.
    Num,
    Str,
    List(Box<Type>),
    Dict(Box<Type>, Box<Type>),
    Set(Box<Type>),
    Tuple(Vec<Type>),
    /// The join of all tuples: a tuple of unknown arity.
    BaseTuple,
    /// `inner | NoneType`, kept distinct from `Union` so narrowing on `is None` is syntactic.
    Maybe(Box<Type>),
    /// A flattened, deduplicated disjunction of non-`Maybe` alternatives. Build with
    /// [`UnionBuilder`] rather than constructing directly, so the invariants in §3 hold.
    Union(Vec<Type>),
    Instance(InstanceType),
    Class(ClassType),
    Function(FunctionType),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstanceType {
    pub class_name: String,
    pub attributes: Scope,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassType {
    pub name: String,
    pub arguments: Arguments,
    pub instance_type: Box<Type>,
    /// Left empty: class-level vs. instance-level attribute separation is an open question the
    /// original implementation leaves as a TODO (§9); every method becomes an instance attribute.
    pub static_scope: Scope,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionType {
    pub arguments: Arguments,
    pub return_spec: ReturnSpec,
}

/// A function's return type: either already known (e.g. an `__init__` whose instance type was
/// inferred eagerly) or a thunk that runs the deferred, memoizing [`FunctionEvaluator`] (§4.4).
#[derive(Debug, Clone)]
pub enum ReturnSpec {
    Resolved(Box<Type>),
    Deferred(Rc<RefCell<FunctionEvaluator>>),
}

impl PartialEq for ReturnSpec {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ReturnSpec::Resolved(a), ReturnSpec::Resolved(b)) => a == b,
            // Two deferred evaluators are only the "same" return spec if they are literally the
            // same captured closure; comparing bodies structurally would conflate two distinct
            // `def`s with identical source text, which is not what type equality should mean.
            (ReturnSpec::Deferred(a), ReturnSpec::Deferred(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// A callable signature (§3: "Arguments value").
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Arguments {
    pub names: Vec<String>,
    pub explicit_types: Vec<Type>,
    pub default_types: Vec<Type>,
    pub vararg: Option<String>,
    pub kwarg: Option<String>,
    pub min_count: usize,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Used when building a class's constructor signature from `__init__`: the receiver
    /// (`self`) is never part of the externally-visible call signature.
    #[must_use]
    pub fn without_first(mut self) -> Self {
        if !self.names.is_empty() {
            self.names.remove(0);
            if !self.explicit_types.is_empty() {
                self.explicit_types.remove(0);
            }
            if !self.default_types.is_empty() {
                self.default_types.remove(0);
            }
            self.min_count = self.min_count.saturating_sub(1);
        }
        self
    }
}

// ---------------------------------------------------------------------------------------------
// Lattice algebra (§4.1)
// ---------------------------------------------------------------------------------------------

/// Joins a collection of types into one, per the rules in §4.1.
pub fn unify(types: &[Type]) -> Type {
    if types.is_empty() {
        return Type::Unknown;
    }
    if types.iter().all(|t| t == &types[0]) {
        return types[0].clone();
    }
    if types.len() == 2 {
        match (&types[0], &types[1]) {
            (Type::NoneType, other) | (other, Type::NoneType) if other != &Type::NoneType => {
                return Type::Maybe(Box::new(other.clone()));
            }
            _ => {}
        }
    }
    if types.iter().any(|t| *t == Type::Unknown) {
        return Type::Unknown;
    }
    UnionBuilder::new().add_all(types.iter().cloned()).build()
}

/// True when any value of type `a` is acceptable where `b` is expected (§4.1).
pub fn subset(a: &Type, b: &Type) -> bool {
    if a == &Type::Unknown || b == &Type::Unknown {
        return true;
    }
    if a == b {
        return true;
    }
    if let Type::Union(alts) = a {
        return alts.iter().all(|alt| subset(alt, b));
    }
    if let Type::Maybe(inner) = a {
        return subset(&Type::NoneType, b) && subset(inner, b);
    }
    if let Type::Union(alts) = b {
        return alts.iter().any(|alt| subset(a, alt));
    }
    if let Type::Maybe(inner) = b {
        return matches!(a, Type::NoneType) || subset(a, inner);
    }
    match (a, b) {
        (Type::List(x), Type::List(y)) => subset(x, y),
        (Type::Set(x), Type::Set(y)) => subset(x, y),
        (Type::Dict(xk, xv), Type::Dict(yk, yv)) => subset(xk, yk) && subset(xv, yv),
        (Type::Tuple(xs), Type::Tuple(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| subset(x, y))
        }
        (Type::Tuple(_), Type::BaseTuple) => true,
        (Type::Instance(x), Type::Instance(y)) => x.class_name == y.class_name,
        _ => false,
    }
}

/// The narrowest type consistent with both `a` and `b`; `Unknown` when they are disjoint.
pub fn intersection(a: &Type, b: &Type) -> Type {
    if a == &Type::Unknown {
        return b.clone();
    }
    if b == &Type::Unknown {
        return a.clone();
    }
    if a == b {
        return a.clone();
    }
    if subset(a, b) {
        return a.clone();
    }
    if subset(b, a) {
        return b.clone();
    }
    if let Type::Maybe(x) = a {
        let inner = intersection(x, b);
        return if subset(&Type::NoneType, b) {
            Type::Maybe(Box::new(inner))
        } else {
            inner
        };
    }
    if matches!(b, Type::Maybe(_)) {
        return intersection(b, a);
    }
    if let Type::Union(alts) = a {
        let mut builder = UnionBuilder::new();
        for alt in alts {
            let narrowed = intersection(alt, b);
            if narrowed != Type::Unknown {
                builder = builder.add(narrowed);
            }
        }
        return builder.build();
    }
    if matches!(b, Type::Union(_)) {
        return intersection(b, a);
    }
    Type::Unknown
}

/// True when equality/ordering between the two is semantically meaningful (§4.1).
pub fn comparable(a: &Type, b: &Type) -> bool {
    if a == &Type::Unknown || b == &Type::Unknown {
        return true;
    }
    if a == &Type::Num && b == &Type::Num {
        return true;
    }
    if a == &Type::Str && b == &Type::Str {
        return true;
    }
    if let Type::Maybe(inner) = a {
        if inner.as_ref() == b || b == &Type::NoneType {
            return true;
        }
    }
    if let Type::Maybe(inner) = b {
        if inner.as_ref() == a || a == &Type::NoneType {
            return true;
        }
    }
    false
}

/// True for a set of types when [`unify`] over them would not collapse to `Unknown`.
pub fn unifiable(types: &[Type]) -> bool {
    unify(types) != Type::Unknown
}

/// Filters out every `Unknown` in `types`.
pub fn known(types: &[Type]) -> Vec<Type> {
    types
        .iter()
        .filter(|t| **t != Type::Unknown)
        .cloned()
        .collect()
}

/// True iff some tuple in `patterns` is pointwise a subset-match to `actual`: every
/// `actual[i]` is a [`subset`] of `patterns[p][i]`.
pub fn type_patterns(actual: &[Type], patterns: &[Vec<Type>]) -> bool {
    patterns.iter().any(|pattern| {
        pattern.len() == actual.len()
            && pattern
                .iter()
                .zip(actual)
                .all(|(expected, got)| subset(got, expected))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn unify_empty_is_unknown() {
        assert_eq!(unify(&[]), Type::Unknown);
    }

    #[test]
    fn unify_equal_types() {
        assert_eq!(unify(&[Type::Num, Type::Num]), Type::Num);
    }

    #[test]
    fn unify_with_none_makes_maybe() {
        assert_eq!(
            unify(&[Type::Num, Type::NoneType]),
            Type::Maybe(Box::new(Type::Num))
        );
    }

    #[test]
    fn unify_maybe_of_maybe_collapses() {
        let maybe_num = Type::Maybe(Box::new(Type::Num));
        assert_eq!(unify(&[maybe_num, Type::NoneType]), Type::Maybe(Box::new(Type::Num)));
    }

    #[test]
    fn unify_with_unknown_is_unknown() {
        assert_eq!(unify(&[Type::Num, Type::Unknown]), Type::Unknown);
    }

    #[test]
    fn unify_distinct_known_types_builds_union() {
        let result = unify(&[Type::Num, Type::Str]);
        match result {
            Type::Union(alts) => {
                assert_eq!(alts.len(), 2);
                assert!(alts.contains(&Type::Num));
                assert!(alts.contains(&Type::Str));
            }
            other => panic!("expected Union, got {other:?}"),
        }
    }

    #[test]
    fn unify_single_alt_union_collapses() {
        assert_eq!(unify(&[Type::Num, Type::Num, Type::Num]), Type::Num);
    }

    #[test]
    fn subset_unknown_both_ways() {
        assert!(subset(&Type::Num, &Type::Unknown));
        assert!(subset(&Type::Unknown, &Type::Num));
    }

    #[test]
    fn subset_t_of_maybe_t() {
        assert!(subset(&Type::Num, &Type::Maybe(Box::new(Type::Num))));
        assert!(subset(&Type::NoneType, &Type::Maybe(Box::new(Type::Num))));
    }

    #[test]
    fn subset_union_lhs_requires_all_alts() {
        let u = Type::Union(vec![Type::Num, Type::Str]);
        assert!(!subset(&u, &Type::Num));
        assert!(subset(&u, &Type::Union(vec![Type::Num, Type::Str, Type::Bool])));
    }

    #[test]
    fn intersection_disjoint_is_unknown() {
        assert_eq!(intersection(&Type::Num, &Type::Str), Type::Unknown);
    }

    #[test]
    fn intersection_with_unknown_is_identity() {
        assert_eq!(intersection(&Type::Num, &Type::Unknown), Type::Num);
        assert_eq!(intersection(&Type::Unknown, &Type::Num), Type::Num);
    }

    #[test]
    fn intersection_associative_for_disjoint_triple() {
        let a = Type::Num;
        let b = Type::Str;
        let c = Type::Bool;
        assert_eq!(
            intersection(&a, &intersection(&b, &c)),
            intersection(&intersection(&a, &b), &c)
        );
    }

    #[test]
    fn comparable_num_and_str_pairs() {
        assert!(comparable(&Type::Num, &Type::Num));
        assert!(comparable(&Type::Str, &Type::Str));
        assert!(!comparable(&Type::Num, &Type::Str));
        assert!(comparable(&Type::Num, &Type::Unknown));
    }

    #[test]
    fn comparable_maybe_and_inner() {
        let maybe_num = Type::Maybe(Box::new(Type::Num));
        assert!(comparable(&maybe_num, &Type::Num));
        assert!(comparable(&maybe_num, &Type::NoneType));
    }

    #[test]
    fn type_patterns_matches_any_alternative() {
        let patterns = vec![
            vec![Type::Num, Type::Num],
            vec![Type::Num, Type::Str],
            vec![Type::Str, Type::Num],
        ];
        assert!(type_patterns(&[Type::Str, Type::Num], &patterns));
        assert!(!type_patterns(&[Type::Bool, Type::Bool], &patterns));
    }

    #[test]
    fn known_filters_unknown() {
        assert_eq!(known(&[Type::Num, Type::Unknown, Type::Str]), vec![Type::Num, Type::Str]);
    }
}
