//! Incremental builders for the two compound lattice joins, mirroring the shape of
//! `red_knot_python_semantic::types::builder`'s `UnionBuilder`/`IntersectionBuilder`: callers fold
//! elements in one at a time and the builder normalizes on `build()` rather than the caller having
//! to hand-roll flattening and deduplication at every call site.

use super::Type;

/// Builds a normalized union, folding in the collapsing rules from §3/§4.1:
/// `Maybe` is never nested, a bare `NoneType` alternative promotes the result to `Maybe`, `Union`
/// absorbs `Unknown`, and a single surviving alternative collapses to itself.
#[derive(Debug, Default)]
pub struct UnionBuilder {
    elements: Vec<Type>,
    has_none: bool,
    saw_unknown: bool,
}

impl UnionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn add(mut self, ty: Type) -> Self {
        match ty {
            Type::Unknown => self.saw_unknown = true,
            Type::NoneType => self.has_none = true,
            Type::Maybe(inner) => {
                self.has_none = true;
                return self.add(*inner);
            }
            Type::Union(members) => {
                for member in members {
                    self = self.add(member);
                }
            }
            other => {
                if !self.elements.contains(&other) {
                    self.elements.push(other);
                }
            }
        }
        self
    }

    pub fn add_all(self, types: impl IntoIterator<Item = Type>) -> Self {
        types.into_iter().fold(self, Self::add)
    }

    #[must_use]
    pub fn build(self) -> Type {
        if self.saw_unknown {
            return Type::Unknown;
        }
        match self.elements.len() {
            0 => {
                if self.has_none {
                    Type::NoneType
                } else {
                    // An empty join with no alternatives and no `None` is vacuous; treat it the
                    // same as `unify([])`.
                    Type::Unknown
                }
            }
            1 => {
                let only = self.elements.into_iter().next().unwrap();
                if self.has_none {
                    Type::Maybe(Box::new(only))
                } else {
                    only
                }
            }
            _ => {
                let union = Type::Union(self.elements);
                if self.has_none {
                    Type::Maybe(Box::new(union))
                } else {
                    union
                }
            }
        }
    }
}

/// Builds the narrowest type consistent with a growing set of positive constraints, used by
/// `Context::add_constraint` to fold a new narrowing fact in with whatever was already known about
/// a name.
#[derive(Debug)]
pub struct IntersectionBuilder {
    current: Option<Type>,
}

impl IntersectionBuilder {
    pub fn new() -> Self {
        Self { current: None }
    }

    #[must_use]
    pub fn add(mut self, ty: Type) -> Self {
        self.current = Some(match self.current.take() {
            None => ty,
            Some(existing) => super::intersection(&existing, &ty),
        });
        self
    }

    #[must_use]
    pub fn build(self) -> Type {
        self.current.unwrap_or(Type::Unknown)
    }
}

impl Default for IntersectionBuilder {
    fn default() -> Self {
        Self::new()
    }
}
