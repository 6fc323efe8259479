use crate::{Object, Value};
use core::fmt;

/// Runtime environment supplying values for references.
///
/// Resolvers form a linked stack of immutable frames: each frame exposes
/// the fields of one scope and defers everything else to its parent. The
/// codec layer pushes a fresh frame over the partially decoded object
/// before every binding, so an expression only ever sees fields that were
/// decoded before it runs.
pub trait Resolver: fmt::Debug {
    /// The value bound under `name` in this scope, if decoded yet.
    fn get(&self, name: &str) -> Option<&Value>;

    /// The enclosing scope, if any.
    fn outer(&self) -> Option<&dyn Resolver>;
}

impl dyn Resolver + '_ {
    /// The outermost scope of the chain.
    pub fn original(&self) -> &dyn Resolver {
        let mut scope: &dyn Resolver = self;
        while let Some(outer) = scope.outer() {
            scope = outer;
        }
        scope
    }
}

/// The resolver with no bindings at all; parameterless expressions evaluate
/// identically against any resolver, including this one.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyResolver;

impl Resolver for EmptyResolver {
    fn get(&self, _name: &str) -> Option<&Value> {
        None
    }

    fn outer(&self) -> Option<&dyn Resolver> {
        None
    }
}

/// A frame exposing the fields of one [`Object`] over an optional parent.
#[derive(Debug, Clone, Copy)]
pub struct ObjectScope<'a> {
    object: &'a Object,
    parent: Option<&'a dyn Resolver>,
}

impl<'a> ObjectScope<'a> {
    /// A frame over `object`, deferring unknown names to `parent`.
    pub fn new(object: &'a Object, parent: Option<&'a dyn Resolver>) -> Self {
        Self { object, parent }
    }
}

impl Resolver for ObjectScope<'_> {
    fn get(&self, name: &str) -> Option<&Value> {
        self.object.get(name)
    }

    fn outer(&self) -> Option<&dyn Resolver> {
        self.parent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_shadow_outwards() {
        let mut inner = Object::new();
        inner.set("x", Value::Integer(1));
        let mut outer_fields = Object::new();
        outer_fields.set("x", Value::Integer(2));
        outer_fields.set("y", Value::Integer(3));

        let root = ObjectScope::new(&outer_fields, None);
        let scope = ObjectScope::new(&inner, Some(&root));

        assert_eq!(scope.get("x"), Some(&Value::Integer(1)));
        assert_eq!(scope.get("y"), None);
        assert_eq!(scope.outer().unwrap().get("y"), Some(&Value::Integer(3)));

        let scope: &dyn Resolver = &scope;
        assert_eq!(scope.original().get("x"), Some(&Value::Integer(2)));
    }
}
