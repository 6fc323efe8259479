use crate::codec::{Builder, Codec};
use crate::error::{DecodingError, DecodingErrorKind, EncodingError, EncodingErrorKind};
use crate::schema::TypeRef;
use preon_bits::{BitBuffer, BitChannel};
use preon_el::{ArithOp, Expr, Resolver, Value};
use std::sync::Arc;

/// Confines an inner codec to a byte extent.
///
/// The inner codec decodes from a sub-buffer with an independent cursor;
/// whatever it leaves unread is slack, and the parent cursor advances by
/// the full extent. Encoding zero-fills the slack and rejects values that
/// overrun the extent.
#[derive(Debug)]
pub struct SliceCodec {
    inner: Arc<dyn Codec>,
    extent: Expr,
    size: Expr,
}

impl SliceCodec {
    /// Confine `inner` to `extent` bytes.
    pub fn new(inner: Arc<dyn Codec>, extent: Expr) -> Self {
        let size = Expr::Arith {
            op: ArithOp::Mul,
            lhs: Box::new(extent.clone()),
            rhs: Box::new(Expr::Integer(8)),
        }
        .fold();
        Self {
            inner,
            extent,
            size,
        }
    }

    fn eval_extent_bits<E>(
        &self,
        resolver: &dyn Resolver,
        negative: impl Fn(i64) -> E,
        expression: impl Fn(preon_el::EvalError) -> E,
    ) -> Result<u64, E> {
        let bytes = self.extent.eval_integer(resolver).map_err(expression)?;
        u64::try_from(bytes)
            .map(|bytes| bytes * 8)
            .map_err(|_| negative(bytes))
    }
}

impl Codec for SliceCodec {
    fn decode(
        &self,
        buffer: &mut BitBuffer<'_>,
        resolver: &dyn Resolver,
        builder: &dyn Builder,
    ) -> Result<Value, DecodingError> {
        let position = buffer.position();
        let extent = self.eval_extent_bits(
            resolver,
            |length| DecodingError::at(position, DecodingErrorKind::NegativeLength { length }),
            |e| DecodingError::at(position, e),
        )?;
        let mut slice = buffer
            .slice(position, extent)
            .map_err(|e| DecodingError::at(position, e))?;
        let value = self.inner.decode(&mut slice, resolver, builder)?;
        buffer
            .skip(extent)
            .map_err(|e| DecodingError::at(position, e))?;
        Ok(value)
    }

    fn encode(
        &self,
        value: &Value,
        channel: &mut BitChannel,
        resolver: &dyn Resolver,
    ) -> Result<(), EncodingError> {
        let position = channel.position();
        let extent = self.eval_extent_bits(
            resolver,
            |length| {
                EncodingError::at(
                    position,
                    EncodingErrorKind::ExtentMismatch {
                        expected: 0,
                        actual: length.unsigned_abs(),
                    },
                )
            },
            |e| EncodingError::at(position, e),
        )?;
        self.inner.encode(value, channel, resolver)?;
        let written = channel.position() - position;
        if written > extent {
            return Err(EncodingError::at(
                channel.position(),
                EncodingErrorKind::ExtentMismatch {
                    expected: extent,
                    actual: written,
                },
            ));
        }
        channel
            .pad_to(position + extent)
            .map_err(|e| EncodingError::at(channel.position(), e))
    }

    fn size(&self) -> Option<&Expr> {
        Some(&self.size)
    }

    fn type_ref(&self) -> &TypeRef {
        self.inner.type_ref()
    }
}
