//! The scope stack plus narrowing side table the visitor carries through a module (§3: "Context
//! value" and "ExtendedContext value").
//!
//! Grounded in `backend/context.py`'s `Context`/`ExtendedContext` classes. `Context` owns its
//! scope stack as `Rc<RefCell<Scope>>` rather than plain `Scope` so that [`Context::copy`] is a
//! cheap `Vec` clone that *shares* the underlying scopes: two copies taken at an `if`/`else`
//! branch point stay independent in stack depth (one can `begin_scope`/`end_scope` without
//! affecting the other) while an assignment made through either copy is visible through both,
//! matching the original implementation's behavior of mutating `Scope` objects in place. Only the
//! narrowing-constraint table is deep-cloned on `copy()`, since narrowing facts are branch-local
//! by design (§4.6).

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::error::InternalError;
use crate::scope::Scope;
use crate::symbol::Symbol;
use crate::types::{intersection, Type};

/// Shared read/write surface over a name environment, implemented by both [`Context`] (the real,
/// mutable environment the visitor advances statement by statement) and [`ExtendedContext`] (a
/// throwaway overlay used while typing a single expression that introduces its own bindings, e.g.
/// a lambda parameter or comprehension target, without touching the real context).
pub trait TypeEnv {
    /// The type of `name` as currently known, with any active narrowing constraint applied.
    fn resolve(&self, name: &str) -> Option<Symbol>;

    /// Adds (intersecting with any existing constraint on) a narrowing fact for `name`.
    fn add_constraint(&self, name: &str, ty: Type);

    /// The active narrowing constraint for `name`, if any, ignoring the symbol's declared type.
    fn constraint(&self, name: &str) -> Option<Type>;

    fn clear_constraint(&self, name: &str);

    /// Number of lexical scopes currently open, innermost-last.
    fn depth(&self) -> usize;
}

#[derive(Debug)]
pub struct Context {
    scopes: Vec<Rc<RefCell<Scope>>>,
    constraints: RefCell<FxHashMap<String, Type>>,
}

impl Context {
    /// A fresh context holding just the given builtins scope; this is the one scope that can
    /// never be popped.
    pub fn new(builtins: Scope) -> Self {
        Self {
            scopes: vec![Rc::new(RefCell::new(builtins))],
            constraints: RefCell::new(FxHashMap::default()),
        }
    }

    pub fn begin_scope(&mut self) {
        self.scopes.push(Rc::new(RefCell::new(Scope::new())));
    }

    pub fn end_scope(&mut self) -> Result<(), InternalError> {
        if self.scopes.len() <= 1 {
            return Err(InternalError::PopLastScope);
        }
        self.scopes.pop();
        Ok(())
    }

    /// A snapshot that shares scope contents with `self` but can diverge in stack depth and
    /// narrowing facts; used to visit two branches of a conditional independently before merging
    /// their resulting scopes back together (§4.6).
    #[must_use]
    pub fn copy(&self) -> Self {
        Self {
            scopes: self.scopes.clone(),
            constraints: RefCell::new(self.constraints.borrow().clone()),
        }
    }

    pub fn current_scope(&self) -> Rc<RefCell<Scope>> {
        self.scopes.last().expect("scopes is never empty").clone()
    }

    pub fn scope_at(&self, index: usize) -> Option<Rc<RefCell<Scope>>> {
        self.scopes.get(index).cloned()
    }

    /// Binds `symbol` into the innermost scope, shadowing any outer binding of the same name.
    pub fn bind(&self, symbol: Symbol) {
        self.current_scope().borrow_mut().add(symbol);
    }

    /// Looks up `name` outer-to-inner-reversed (innermost scope wins), with no constraint applied.
    fn lookup_raw(&self, name: &str) -> Option<Symbol> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.borrow().get(name).cloned())
    }

    pub fn set_return(&self, symbol: Symbol) {
        self.current_scope().borrow_mut().set_return(symbol);
    }

    pub fn get_return(&self) -> Option<Symbol> {
        self.current_scope().borrow().get_return().cloned()
    }

    /// Merges `scope`'s bindings into the innermost scope in place (§4.2). Plain overwrite, same
    /// as [`Scope::merge`] — reconciling conflicting types across branches is the visitor's job.
    pub fn merge_scope(&self, scope: &Scope) {
        self.current_scope().borrow_mut().merge(scope);
    }
}

impl TypeEnv for Context {
    fn resolve(&self, name: &str) -> Option<Symbol> {
        let symbol = self.lookup_raw(name)?;
        match self.constraints.borrow().get(name) {
            Some(narrowed) => {
                let narrowed_type = intersection(&symbol.type_, narrowed);
                Some(Symbol {
                    type_: narrowed_type,
                    ..symbol
                })
            }
            None => Some(symbol),
        }
    }

    fn add_constraint(&self, name: &str, ty: Type) {
        let mut constraints = self.constraints.borrow_mut();
        let merged = match constraints.get(name) {
            Some(existing) => intersection(existing, &ty),
            None => ty,
        };
        constraints.insert(name.to_owned(), merged);
    }

    fn constraint(&self, name: &str) -> Option<Type> {
        self.constraints.borrow().get(name).cloned()
    }

    fn clear_constraint(&self, name: &str) {
        self.constraints.borrow_mut().remove(name);
    }

    fn depth(&self) -> usize {
        self.scopes.len()
    }
}

/// A one-shot overlay scope used while typing a single expression that binds names of its own
/// (lambda parameters, comprehension targets) — §4.3's "extended context". Never mutates `base`;
/// callers discard it once the expression has been typed. Deliberately has no `copy()`: nesting a
/// second overlay on top of an overlay is never needed by any operation in this checker, and
/// omitting the method (rather than making it panic at runtime) lets the compiler catch an
/// attempt to do so.
pub struct ExtendedContext<'b> {
    base: &'b Context,
    top: RefCell<Scope>,
    constraints: RefCell<FxHashMap<String, Type>>,
}

impl<'b> ExtendedContext<'b> {
    pub fn new(base: &'b Context) -> Self {
        Self {
            base,
            top: RefCell::new(Scope::new()),
            constraints: RefCell::new(FxHashMap::default()),
        }
    }

    pub fn bind(&self, symbol: Symbol) {
        self.top.borrow_mut().add(symbol);
    }

    pub fn base(&self) -> &'b Context {
        self.base
    }
}

impl<'b> TypeEnv for ExtendedContext<'b> {
    fn resolve(&self, name: &str) -> Option<Symbol> {
        let symbol = self
            .top
            .borrow()
            .get(name)
            .cloned()
            .or_else(|| self.base.lookup_raw(name))?;

        let local = self.constraints.borrow().get(name).cloned();
        let base = self.base.constraint(name);
        let narrowed = match (local, base) {
            (Some(a), Some(b)) => Some(intersection(&a, &b)),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        };
        Some(match narrowed {
            Some(narrowed) => Symbol {
                type_: intersection(&symbol.type_, &narrowed),
                ..symbol
            },
            None => symbol,
        })
    }

    fn add_constraint(&self, name: &str, ty: Type) {
        let mut constraints = self.constraints.borrow_mut();
        let merged = match constraints.get(name) {
            Some(existing) => intersection(existing, &ty),
            None => ty,
        };
        constraints.insert(name.to_owned(), merged);
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

    #[test]
    fn copy_shares_mutations_but_not_stack_depth() {
        let mut ctx = Context::new(Scope::new());
        ctx.begin_scope();
        ctx.bind(Symbol::new("x", Type::Num));

        let mut copy = ctx.copy();
        assert_eq!(copy.depth(), ctx.depth());

        copy.begin_scope();
        assert_ne!(copy.depth(), ctx.depth(), "stack depth must diverge after begin_scope");

        copy.bind(Symbol::new("y", Type::Str));
        assert_eq!(
            ctx.resolve("y").map(|s| s.type_),
            Some(Type::Str),
            "mutation through a shared scope is visible back through the original"
        );
    }

    #[test]
    fn end_scope_refuses_to_pop_last_scope() {
        let mut ctx = Context::new(Scope::new());
        assert_eq!(ctx.end_scope(), Err(InternalError::PopLastScope));
    }

    #[test]
    fn constraint_narrows_resolved_type() {
        let mut ctx = Context::new(Scope::new());
        ctx.begin_scope();
        ctx.bind(Symbol::new("x", Type::Maybe(Box::new(Type::Num))));
        ctx.add_constraint("x", Type::Num);

        assert_eq!(ctx.resolve("x").unwrap().type_, Type::Num);
    }

    #[test]
    fn copy_constraints_are_independent() {
        let mut ctx = Context::new(Scope::new());
        ctx.begin_scope();
        ctx.bind(Symbol::new("x", Type::Maybe(Box::new(Type::Num))));

        let copy = ctx.copy();
        copy.add_constraint("x", Type::Num);

        assert_eq!(ctx.resolve("x").unwrap().type_, Type::Maybe(Box::new(Type::Num)));
        assert_eq!(copy.resolve("x").unwrap().type_, Type::Num);
    }

    #[test]
    fn extended_context_overlay_shadows_base_without_mutating_it() {
        let mut ctx = Context::new(Scope::new());
        ctx.begin_scope();
        ctx.bind(Symbol::new("x", Type::Num));

        let ext = ExtendedContext::new(&ctx);
        ext.bind(Symbol::new("x", Type::Str));
        assert_eq!(ext.resolve("x").unwrap().type_, Type::Str);
        assert_eq!(ctx.resolve("x").unwrap().type_, Type::Num);
    }
}
