//! A bound name within a [`crate::scope::Scope`] (§3: "Symbol value").
//!
//! Grounded in `backend/context.py`'s `Symbol` class and `red_knot_python_semantic::symbol`'s
//! `Symbol`/`Boundness` split, simplified to the single-module, non-incremental shape this
//! checker needs: no per-binding "possibly unbound" lattice, since §5 treats every name lookup as
//! fully resolved at the point it's visited.

use crate::node_key::NodeKey;
use crate::types::Type;

/// A value a symbol is known to hold exactly, used for literal-dependent narrowing (e.g.
/// `isinstance` on a tuple of literal class names, or equality against a literal).
#[derive(Debug, Clone, PartialEq)]
pub enum StaticValue {
    None,
    Bool(bool),
    Num(f64),
    Str(String),
    /// Not literal-trackable; only the [`Symbol::type_`] is meaningful.
    Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub type_: Type,
    pub static_value: StaticValue,
    /// Identity of the assignment/`def`/`class`/parameter node that introduced this binding, used
    /// to tell two symbols with the same name and type apart when merging scopes (§4.2's scope
    /// merge: two branches binding `x` to the same type from different assignments still produce
    /// one merged symbol, but the identity lets diagnostics point at the right statement).
    pub assign_node: Option<NodeKey>,
}

impl Symbol {
    pub fn new(name: impl Into<String>, type_: Type) -> Self {
        Self {
            name: name.into(),
            type_,
            static_value: StaticValue::Unknown,
            assign_node: None,
        }
    }

    #[must_use]
    pub fn with_static_value(mut self, value: StaticValue) -> Self {
        self.static_value = value;
        self
    }

    #[must_use]
    pub fn with_assign_node(mut self, node: NodeKey) -> Self {
        self.assign_node = Some(node);
        self
    }

    pub fn unknown(name: impl Into<String>) -> Self {
        Self::new(name, Type::Unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_with_same_name_and_type_are_equal_regardless_of_static_value_presence() {
        let a = Symbol::new("x", Type::Num);
        let b = Symbol::new("x", Type::Num).with_static_value(StaticValue::Num(1.0));
        assert_ne!(a, b, "static_value is part of equality, this documents that fact");
    }

    #[test]
    fn unknown_constructor_is_bottom_typed() {
        let s = Symbol::unknown("y");
        assert_eq!(s.type_, Type::Unknown);
        assert_eq!(s.static_value, StaticValue::Unknown);
    }
}
