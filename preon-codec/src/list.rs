use crate::codec::{Builder, Codec};
use crate::error::{DecodingError, DecodingErrorKind, EncodingError, EncodingErrorKind};
use crate::schema::{Terminator, TypeRef};
use preon_bits::{BitBuffer, BitChannel};
use preon_el::{ArithOp, Expr, Resolver, Value};
use std::sync::Arc;

/// Length discipline of a list codec.
#[derive(Debug)]
pub enum ListExtent {
    /// Exactly this many items.
    Count(Expr),
    /// Items filling exactly this many bytes, decoded through a slice with
    /// an independent cursor.
    Bytes(Expr),
    /// Items until a sentinel element is decoded.
    Terminated(Terminator),
}

/// Codec of a homogeneous sequence.
#[derive(Debug)]
pub struct ListCodec {
    ty: TypeRef,
    element: Arc<dyn Codec>,
    extent: ListExtent,
    size: Option<Expr>,
}

impl ListCodec {
    /// A list codec over `element`. The size is statically expressible for
    /// the count discipline when the element size is, and for the byte
    /// extent discipline; never for the terminated discipline.
    pub fn new(element: Arc<dyn Codec>, extent: ListExtent) -> Self {
        let ty = TypeRef::List(Box::new(element.type_ref().clone()));
        let size = match &extent {
            ListExtent::Count(count) => element.size().map(|element_size| {
                Expr::Arith {
                    op: ArithOp::Mul,
                    lhs: Box::new(count.clone()),
                    rhs: Box::new(element_size.clone()),
                }
                .fold()
            }),
            ListExtent::Bytes(bytes) => Some(
                Expr::Arith {
                    op: ArithOp::Mul,
                    lhs: Box::new(bytes.clone()),
                    rhs: Box::new(Expr::Integer(8)),
                }
                .fold(),
            ),
            ListExtent::Terminated(_) => None,
        };
        Self {
            ty,
            element,
            extent,
            size,
        }
    }

    fn eval_byte_count<E>(
        expr: &Expr,
        resolver: &dyn Resolver,
        negative: impl Fn(i64) -> E,
        expression: impl Fn(preon_el::EvalError) -> E,
    ) -> Result<u64, E> {
        let count = expr.eval_integer(resolver).map_err(expression)?;
        u64::try_from(count).map_err(|_| negative(count))
    }
}

impl Codec for ListCodec {
    fn decode(
        &self,
        buffer: &mut BitBuffer<'_>,
        resolver: &dyn Resolver,
        builder: &dyn Builder,
    ) -> Result<Value, DecodingError> {
        let position = buffer.position();
        let mut items = Vec::new();
        match &self.extent {
            ListExtent::Count(count) => {
                let count = count
                    .eval_integer(resolver)
                    .map_err(|e| DecodingError::at(position, e))?;
                let count = usize::try_from(count).map_err(|_| {
                    DecodingError::at(position, DecodingErrorKind::NegativeLength { length: count })
                })?;
                for index in 0..count {
                    let item = self
                        .element
                        .decode(buffer, resolver, builder)
                        .map_err(|e| e.with_index(index))?;
                    items.push(item);
                }
            }
            ListExtent::Bytes(bytes) => {
                let bytes = Self::eval_byte_count(
                    bytes,
                    resolver,
                    |length| {
                        DecodingError::at(position, DecodingErrorKind::NegativeLength { length })
                    },
                    |e| DecodingError::at(position, e),
                )?;
                let extent = bytes * 8;
                let mut slice = buffer
                    .slice(position, extent)
                    .map_err(|e| DecodingError::at(position, e))?;
                while slice.remaining() > 0 {
                    let index = items.len();
                    let item = self
                        .element
                        .decode(&mut slice, resolver, builder)
                        .map_err(|e| e.with_index(index))?;
                    items.push(item);
                }
                buffer
                    .skip(extent)
                    .map_err(|e| DecodingError::at(position, e))?;
            }
            ListExtent::Terminated(terminator) => loop {
                if buffer.remaining() == 0 {
                    return Err(DecodingError::at(
                        buffer.position(),
                        DecodingErrorKind::TerminatorNotFound,
                    ));
                }
                let index = items.len();
                let item = self
                    .element
                    .decode(buffer, resolver, builder)
                    .map_err(|e| e.with_index(index))?;
                if item == terminator.sentinel {
                    if terminator.keep {
                        items.push(item);
                    }
                    break;
                }
                items.push(item);
            },
        }
        Ok(Value::List(items))
    }

    fn encode(
        &self,
        value: &Value,
        channel: &mut BitChannel,
        resolver: &dyn Resolver,
    ) -> Result<(), EncodingError> {
        let position = channel.position();
        let Value::List(items) = value else {
            return Err(EncodingError::at(
                position,
                EncodingErrorKind::Shape {
                    expected: "a list",
                    found: value.type_name(),
                },
            ));
        };

        match &self.extent {
            ListExtent::Count(count) => {
                let count = count
                    .eval_integer(resolver)
                    .map_err(|e| EncodingError::at(position, e))?;
                if count != items.len() as i64 {
                    return Err(EncodingError::at(
                        position,
                        EncodingErrorKind::LengthMismatch {
                            expected: count,
                            actual: items.len(),
                        },
                    ));
                }
                self.encode_items(items, channel, resolver)?;
            }
            ListExtent::Bytes(bytes) => {
                let bytes = Self::eval_byte_count(
                    bytes,
                    resolver,
                    |length| {
                        EncodingError::at(
                            position,
                            EncodingErrorKind::LengthMismatch {
                                expected: length,
                                actual: items.len(),
                            },
                        )
                    },
                    |e| EncodingError::at(position, e),
                )?;
                let expected = bytes * 8;
                self.encode_items(items, channel, resolver)?;
                let actual = channel.position() - position;
                if actual > expected {
                    return Err(EncodingError::at(
                        channel.position(),
                        EncodingErrorKind::ExtentMismatch { expected, actual },
                    ));
                }
                // Unused tail of the declared extent is zero-filled.
                channel
                    .pad_to(position + expected)
                    .map_err(|e| EncodingError::at(channel.position(), e))?;
            }
            ListExtent::Terminated(terminator) => {
                self.encode_items(items, channel, resolver)?;
                let terminated = terminator.keep
                    && items.last().is_some_and(|last| *last == terminator.sentinel);
                if !terminated {
                    self.element
                        .encode(&terminator.sentinel, channel, resolver)?;
                }
            }
        }
        Ok(())
    }

    fn size(&self) -> Option<&Expr> {
        self.size.as_ref()
    }

    fn type_ref(&self) -> &TypeRef {
        &self.ty
    }
}

impl ListCodec {
    fn encode_items(
        &self,
        items: &[Value],
        channel: &mut BitChannel,
        resolver: &dyn Resolver,
    ) -> Result<(), EncodingError> {
        for (index, item) in items.iter().enumerate() {
            self.element
                .encode(item, channel, resolver)
                .map_err(|e| e.with_index(index))?;
        }
        Ok(())
    }
}
