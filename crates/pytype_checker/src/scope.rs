//! A single lexical scope: an ordered map of bound names plus an optional return binding (§3:
//! "Scope value").
//!
//! Grounded in `backend/context.py`'s `Scope` class. Uses `IndexMap` rather than a plain hash map
//! so that iteration order (used when rendering a scope's contents for diagnostics) matches
//! declaration order, the way dict iteration in the original implementation does.

use indexmap::IndexMap;

use crate::symbol::Symbol;

#[derive(Debug, Clone, Default)]
pub struct Scope {
    symbols: IndexMap<String, Symbol>,
    return_symbol: Option<Box<Symbol>>,
}

impl PartialEq for Scope {
    fn eq(&self, other: &Self) -> bool {
        self.symbols == other.symbols && self.return_symbol == other.return_symbol
    }
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, symbol: Symbol) {
        self.symbols.insert(symbol.name.clone(), symbol);
    }

    pub fn remove(&mut self, name: &str) -> Option<Symbol> {
        self.symbols.shift_remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.symbols.keys().map(String::as_str)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }

    pub fn set_return(&mut self, symbol: Symbol) {
        self.return_symbol = Some(Box::new(symbol));
    }

    pub fn get_return(&self) -> Option<&Symbol> {
        self.return_symbol.as_deref()
    }

    /// Copies every binding from `other` into `self` in place, overwriting same-named bindings.
    /// Plain right-biased overwrite, nothing more — unifying the two arms of a branch and
    /// deciding what to warn about when they disagree is the caller's job (the visitor does that
    /// explicitly for `if`/`else`, the way `main.py`'s `visit_If` walks both scopes' contents
    /// itself rather than asking `Scope` to reconcile them).
    pub fn merge(&mut self, other: &Scope) {
        for symbol in other.symbols() {
            self.add(symbol.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;

    #[test]
    fn merge_overwrites_shared_names_with_the_other_scopes_value() {
        let mut a = Scope::new();
        a.add(Symbol::new("x", Type::Num));
        let mut b = Scope::new();
        b.add(Symbol::new("x", Type::Str));

        a.merge(&b);
        assert_eq!(a.get("x").unwrap().type_, Type::Str);
    }

    #[test]
    fn merge_adds_names_only_present_in_the_other_scope() {
        let mut a = Scope::new();
        let mut b = Scope::new();
        b.add(Symbol::new("y", Type::Num));

        a.merge(&b);
        assert_eq!(a.get("y").unwrap().type_, Type::Num);
    }

    #[test]
    fn merge_leaves_return_symbol_untouched() {
        let mut a = Scope::new();
        a.set_return(Symbol::new("return", Type::Num));
        let mut b = Scope::new();
        b.set_return(Symbol::new("return", Type::Str));

        a.merge(&b);
        assert_eq!(a.get_return().unwrap().type_, Type::Num);
    }

    #[test]
    fn remove_then_get_is_none() {
        let mut s = Scope::new();
        s.add(Symbol::new("z", Type::Bool));
        assert!(s.remove("z").is_some());
        assert!(s.get("z").is_none());
    }
}
