use crate::{
    BindingError, ContextNode, EvalError, Expr, ReferenceContext, Resolver, Span, StaticType, Value,
};
use core::fmt;
use std::sync::Arc;

/// One step of a reference path.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Navigate to a named attribute of the current scope.
    Attribute(String),
    /// Navigate to a list item; the index expression is evaluated in the
    /// scope the reference appears in.
    Item(Box<Expr>),
    /// Walk up one enclosing scope. Only occurs at the head of a path.
    Outer,
}

/// A late-bound path into the resolver chain.
///
/// References are assembled segment by segment while parsing, each step
/// validated against the [`ReferenceContext`], so a fully built reference
/// always carries the static type of its final segment. Equality considers
/// the segment sequence only.
#[derive(Debug, Clone)]
pub struct Reference {
    segments: Vec<Segment>,
    ty: StaticType,
    ctx: Option<Arc<dyn ReferenceContext>>,
}

impl PartialEq for Reference {
    fn eq(&self, other: &Self) -> bool {
        self.segments == other.segments
    }
}

impl Reference {
    /// The empty path denoting the scope `ctx` itself; the starting point
    /// of incremental selection.
    pub fn scope(ctx: Arc<dyn ReferenceContext>) -> Self {
        Self {
            segments: Vec::new(),
            ty: StaticType::Object,
            ctx: Some(ctx),
        }
    }

    /// Select attribute `name`, validating it against the current context.
    pub fn select_attribute(&self, name: &str, at: Span) -> Result<Self, BindingError> {
        let ctx = self.navigable(at)?;
        let node = ctx
            .attribute(name)
            .ok_or_else(|| BindingError::UnknownAttribute {
                name: name.into(),
                context: ctx.name(),
                at,
            })?;
        Ok(self.extended(Segment::Attribute(name.into()), node))
    }

    /// Select a list item through an Integer index expression.
    pub fn select_item(&self, index: Expr, at: Span) -> Result<Self, BindingError> {
        if index.ty() != StaticType::Integer {
            return Err(BindingError::IndexType {
                found: index.ty(),
                at,
            });
        }
        let ctx = self.navigable(at)?;
        let node = ctx.item().ok_or_else(|| BindingError::NotIndexable {
            context: ctx.name(),
            at,
        })?;
        Ok(self.extended(Segment::Item(Box::new(index)), node))
    }

    /// Walk up one enclosing scope. Valid only while the path is empty.
    pub fn select_outer(&self, at: Span) -> Result<Self, BindingError> {
        let ctx = self.navigable(at)?;
        let node = ctx.outer().ok_or(BindingError::NoOuterScope { at })?;
        Ok(self.extended(Segment::Outer, node))
    }

    /// Statically downcast the target to `node`, keeping the path. Used by
    /// choice codecs once a branch narrows the target type.
    pub fn narrow(&self, node: ContextNode) -> Self {
        Self {
            segments: self.segments.clone(),
            ty: node.ty,
            ctx: node.ctx,
        }
    }

    /// Re-root a reference valid in an inner scope so it is valid in the
    /// containing scope reached through `prefix`. Leading `outer` segments
    /// cancel against the prefix path.
    pub fn rescope(&self, prefix: &Reference) -> Self {
        let mut segments = prefix.segments.clone();
        let mut rest = self.segments.as_slice();
        while let Some(Segment::Outer) = rest.first() {
            if segments.pop().is_none() {
                break;
            }
            rest = &rest[1..];
        }
        segments.extend(rest.iter().cloned());
        Self {
            segments,
            ty: self.ty,
            ctx: self.ctx.clone(),
        }
    }

    /// Static type of the final segment.
    pub const fn ty(&self) -> StaticType {
        self.ty
    }

    /// The path segments in order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Whether the path is still the bare scope.
    pub fn is_scope(&self) -> bool {
        self.segments.is_empty()
    }

    /// Rendered path, e.g. `outer.items[n].len`.
    pub fn path(&self) -> String {
        self.to_string()
    }

    /// Resolve the path against a live resolver chain and clone out the
    /// value it lands on.
    pub fn eval(&self, resolver: &dyn Resolver) -> Result<Value, EvalError> {
        let mut scope: &dyn Resolver = resolver;
        let mut segments = self.segments.iter();
        let mut pending = segments.as_slice();
        while let Some(Segment::Outer) = pending.first() {
            segments.next();
            pending = segments.as_slice();
            scope = scope.outer().ok_or_else(|| EvalError::Unresolved {
                path: self.path(),
            })?;
        }

        let mut current: Option<&Value> = None;
        for segment in segments {
            match segment {
                Segment::Outer => {
                    return Err(EvalError::Unresolved { path: self.path() });
                }
                Segment::Attribute(name) => {
                    let next = match current {
                        None => scope.get(name),
                        Some(Value::Object(object)) => object.get(name),
                        Some(other) => {
                            return Err(EvalError::WrongType {
                                path: self.path(),
                                expected: "an object",
                                found: other.type_name(),
                            });
                        }
                    };
                    current = Some(next.ok_or_else(|| EvalError::Unresolved {
                        path: self.path(),
                    })?);
                }
                Segment::Item(index) => {
                    let index = index.eval_integer(resolver)?;
                    let items = match current {
                        Some(Value::List(items)) => items,
                        Some(other) => {
                            return Err(EvalError::WrongType {
                                path: self.path(),
                                expected: "a list",
                                found: other.type_name(),
                            });
                        }
                        None => {
                            return Err(EvalError::Unresolved { path: self.path() });
                        }
                    };
                    let slot = usize::try_from(index)
                        .ok()
                        .and_then(|index| items.get(index));
                    current = Some(slot.ok_or(EvalError::IndexOutOfBounds {
                        path: self.path(),
                        index,
                        len: items.len(),
                    })?);
                }
            }
        }

        match current {
            Some(value) => Ok(value.clone()),
            None => Err(EvalError::Unresolved { path: self.path() }),
        }
    }

    fn navigable(&self, at: Span) -> Result<&Arc<dyn ReferenceContext>, BindingError> {
        self.ctx.as_ref().ok_or_else(|| BindingError::NotNavigable {
            path: self.path(),
            at,
        })
    }

    fn extended(&self, segment: Segment, node: ContextNode) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self {
            segments,
            ty: node.ty,
            ctx: node.ctx,
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.segments {
            match segment {
                Segment::Outer => {
                    if !first {
                        f.write_str(".")?;
                    }
                    f.write_str("outer")?;
                }
                Segment::Attribute(name) => {
                    if !first {
                        f.write_str(".")?;
                    }
                    f.write_str(name)?;
                }
                Segment::Item(index) => {
                    write!(f, "[{index}]")?;
                }
            }
            first = false;
        }
        Ok(())
    }
}
