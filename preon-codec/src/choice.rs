use crate::codec::{Builder, Codec};
use crate::error::{DecodingError, DecodingErrorKind, EncodingError, EncodingErrorKind};
use crate::schema::TypeRef;
use preon_bits::{BitBuffer, BitChannel};
use preon_el::{Expr, Resolver, Value};
use std::sync::Arc;

/// Discriminated-union codec: ordered guarded branches plus an optional
/// default.
///
/// Decode evaluates the guards in declaration order against the resolver
/// and dispatches to the first branch whose guard holds; encode dispatches
/// the same way against the value being encoded, so both paths agree on
/// the discriminating fields.
#[derive(Debug)]
pub struct ChoiceCodec {
    ty: TypeRef,
    branches: Vec<(Expr, Arc<dyn Codec>)>,
    default: Option<Arc<dyn Codec>>,
    /// Path of the discriminating field, taken from the first guard, for
    /// error reporting.
    discriminator: Option<String>,
    size: Option<Expr>,
}

impl ChoiceCodec {
    /// A choice codec. The size is the branches' common constant size when
    /// they all agree, including the default.
    pub fn new(
        ty: TypeRef,
        branches: Vec<(Expr, Arc<dyn Codec>)>,
        default: Option<Arc<dyn Codec>>,
    ) -> Self {
        let discriminator = branches
            .first()
            .and_then(|(guard, _)| first_reference_path(guard));
        let size = common_size(&branches, default.as_deref());
        Self {
            ty,
            branches,
            default,
            discriminator,
            size,
        }
    }
}

impl Codec for ChoiceCodec {
    fn decode(
        &self,
        buffer: &mut BitBuffer<'_>,
        resolver: &dyn Resolver,
        builder: &dyn Builder,
    ) -> Result<Value, DecodingError> {
        let position = buffer.position();
        for (guard, codec) in &self.branches {
            if guard
                .eval_bool(resolver)
                .map_err(|e| DecodingError::at(position, e))?
            {
                return codec.decode(buffer, resolver, builder);
            }
        }
        if let Some(default) = &self.default {
            return default.decode(buffer, resolver, builder);
        }
        let mut error = DecodingError::at(position, DecodingErrorKind::UnmatchedChoice);
        if let Some(discriminator) = &self.discriminator {
            error = error.with_field(discriminator);
        }
        Err(error)
    }

    fn encode(
        &self,
        value: &Value,
        channel: &mut BitChannel,
        resolver: &dyn Resolver,
    ) -> Result<(), EncodingError> {
        let position = channel.position();
        for (guard, codec) in &self.branches {
            if guard
                .eval_bool(resolver)
                .map_err(|e| EncodingError::at(position, e))?
            {
                return codec.encode(value, channel, resolver);
            }
        }
        if let Some(default) = &self.default {
            return default.encode(value, channel, resolver);
        }
        let mut error = EncodingError::at(position, EncodingErrorKind::UnmatchedChoice);
        if let Some(discriminator) = &self.discriminator {
            error = error.with_field(discriminator);
        }
        Err(error)
    }

    fn size(&self) -> Option<&Expr> {
        self.size.as_ref()
    }

    fn type_ref(&self) -> &TypeRef {
        &self.ty
    }
}

/// The branches' shared constant size, if every branch (and the default,
/// when present) folds to the same literal.
fn common_size(branches: &[(Expr, Arc<dyn Codec>)], default: Option<&dyn Codec>) -> Option<Expr> {
    let sizes: Vec<i64> = branches
        .iter()
        .map(|(_, codec)| codec.size())
        .chain(default.map(|codec| codec.size()))
        .map(|size| match size {
            Some(Expr::Integer(bits)) => Some(*bits),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    let first = *sizes.first()?;
    sizes
        .iter()
        .all(|size| *size == first)
        .then_some(Expr::Integer(first))
}

fn first_reference_path(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Reference(reference) => Some(reference.path()),
        Expr::Integer(_) | Expr::Bool(_) | Expr::Str(_) => None,
        Expr::Arith { lhs, rhs, .. } | Expr::Compare { lhs, rhs, .. } => {
            first_reference_path(lhs).or_else(|| first_reference_path(rhs))
        }
        Expr::And(lhs, rhs) | Expr::Or(lhs, rhs) => {
            first_reference_path(lhs).or_else(|| first_reference_path(rhs))
        }
        Expr::Negate(operand) | Expr::Not(operand) => first_reference_path(operand),
        Expr::Cond {
            test,
            then,
            otherwise,
        } => first_reference_path(test)
            .or_else(|| first_reference_path(then))
            .or_else(|| first_reference_path(otherwise)),
    }
}
