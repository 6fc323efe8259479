use crate::codec::{Builder, Codec};
use crate::error::{DecodingError, DecodingErrorKind, EncodingError, EncodingErrorKind};
use crate::schema::{Schema, TypeRef};
use preon_bits::{BitBuffer, BitChannel, BufferError};
use preon_el::{Expr, ObjectScope, Resolver, Value};
use std::sync::Arc;
use tracing::trace;

/// One field of a composite glued to its codec and expression-driven
/// modifiers.
#[derive(Debug, Clone)]
pub struct Binding {
    name: String,
    codec: Arc<dyn Codec>,
    guard: Option<Expr>,
    offset: Option<Expr>,
    init: Option<Expr>,
}

impl Binding {
    /// A plain binding of `name` to a codec.
    pub fn new(name: impl Into<String>, codec: Arc<dyn Codec>) -> Self {
        Self {
            name: name.into(),
            codec,
            guard: None,
            offset: None,
            init: None,
        }
    }

    /// Guard the binding by a boolean expression; a false guard skips the
    /// field on both paths.
    pub fn with_guard(mut self, guard: Expr) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Decode the field at an absolute bit position instead of the natural
    /// cursor; the cursor is restored afterwards.
    pub fn with_offset(mut self, offset: Expr) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Default a skipped field to the value of an expression.
    pub fn with_init(mut self, init: Expr) -> Self {
        self.init = Some(init);
        self
    }

    /// The field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The codec decoding and encoding this field.
    pub fn codec(&self) -> &Arc<dyn Codec> {
        &self.codec
    }

    /// The presence guard, if any.
    pub fn guard(&self) -> Option<&Expr> {
        self.guard.as_ref()
    }

    /// The position override, if any.
    pub fn offset(&self) -> Option<&Expr> {
        self.offset.as_ref()
    }

    /// The skip default, if any.
    pub fn init(&self) -> Option<&Expr> {
        self.init.as_ref()
    }

    fn eval_offset<E>(
        &self,
        offset: &Expr,
        scope: &dyn Resolver,
        position: u64,
        wrap: impl Fn(u64, i64) -> E,
        expr_err: impl Fn(u64, preon_el::EvalError) -> E,
    ) -> Result<u64, E> {
        let target = offset.eval_integer(scope).map_err(|e| expr_err(position, e))?;
        u64::try_from(target).map_err(|_| wrap(position, target))
    }
}

/// Codec of a composite: an ordered run of bindings over one object.
///
/// Decode allocates a blank object through the builder, then walks the
/// bindings in declaration order, extending the resolver with each decoded
/// field before the next binding's expressions run. Encode walks the same
/// bindings against the fields of the value being encoded.
#[derive(Debug)]
pub struct ObjectCodec {
    ty: TypeRef,
    schema: Arc<Schema>,
    bindings: Vec<Binding>,
    size: Option<Expr>,
}

impl ObjectCodec {
    /// An object codec over the given bindings. `size` is the guarded sum
    /// of the children's sizes, `None` when any child is unsized.
    pub fn new(
        ty: TypeRef,
        schema: Arc<Schema>,
        bindings: Vec<Binding>,
        size: Option<Expr>,
    ) -> Self {
        Self {
            ty,
            schema,
            bindings,
            size,
        }
    }

    /// The bindings in declaration order.
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }
}

impl Codec for ObjectCodec {
    fn decode(
        &self,
        buffer: &mut BitBuffer<'_>,
        resolver: &dyn Resolver,
        builder: &dyn Builder,
    ) -> Result<Value, DecodingError> {
        let built = builder.build(&self.ty, &self.schema, resolver)?;
        let Value::Object(mut object) = built else {
            return Err(DecodingError::at(
                buffer.position(),
                DecodingErrorKind::Shape {
                    expected: "an object",
                    found: built.type_name(),
                },
            ));
        };

        for binding in &self.bindings {
            let scope = ObjectScope::new(&object, Some(resolver));

            if let Some(guard) = binding.guard() {
                let present = guard
                    .eval_bool(&scope)
                    .map_err(|e| DecodingError::at(buffer.position(), e))
                    .map_err(|e| e.with_field(&binding.name))?;
                if !present {
                    trace!(field = %binding.name, "guard false, field skipped");
                    if let Some(init) = binding.init() {
                        let fallback = init
                            .eval(&scope)
                            .map_err(|e| DecodingError::at(buffer.position(), e))
                            .map_err(|e| e.with_field(&binding.name))?;
                        object.set(&binding.name, fallback);
                    }
                    continue;
                }
            }

            let value = if let Some(offset) = binding.offset() {
                let target = binding
                    .eval_offset(
                        offset,
                        &scope,
                        buffer.position(),
                        |at, offset| {
                            DecodingError::at(at, DecodingErrorKind::InvalidOffset { offset })
                        },
                        |at, e| DecodingError::at(at, e),
                    )
                    .map_err(|e| e.with_field(&binding.name))?;
                let natural = buffer.position();
                buffer
                    .seek(target)
                    .map_err(|e| DecodingError::at(natural, e).with_field(&binding.name))?;
                let value = binding
                    .codec()
                    .decode(buffer, &scope, builder)
                    .map_err(|e| e.with_field(&binding.name))?;
                // Explicit offsets never advance the object's natural end.
                buffer
                    .seek(natural)
                    .map_err(|e| DecodingError::at(buffer.position(), e))?;
                value
            } else {
                binding
                    .codec()
                    .decode(buffer, &scope, builder)
                    .map_err(|e| e.with_field(&binding.name))?
            };

            trace!(field = %binding.name, position = buffer.position(), "field decoded");
            object.set(&binding.name, value);
        }

        Ok(Value::Object(object))
    }

    fn encode(
        &self,
        value: &Value,
        channel: &mut BitChannel,
        resolver: &dyn Resolver,
    ) -> Result<(), EncodingError> {
        let Value::Object(object) = value else {
            return Err(EncodingError::at(
                channel.position(),
                EncodingErrorKind::Shape {
                    expected: "an object",
                    found: value.type_name(),
                },
            ));
        };

        for binding in &self.bindings {
            let scope = ObjectScope::new(object, Some(resolver));

            if let Some(guard) = binding.guard() {
                let present = guard
                    .eval_bool(&scope)
                    .map_err(|e| EncodingError::at(channel.position(), e))
                    .map_err(|e| e.with_field(&binding.name))?;
                if !present {
                    trace!(field = %binding.name, "guard false, field skipped");
                    continue;
                }
            }

            let field = object.get(&binding.name).ok_or_else(|| {
                EncodingError::at(
                    channel.position(),
                    EncodingErrorKind::MissingField {
                        name: binding.name.clone(),
                    },
                )
            })?;

            if let Some(offset) = binding.offset() {
                let target = binding
                    .eval_offset(
                        offset,
                        &scope,
                        channel.position(),
                        |at, offset| {
                            EncodingError::at(
                                at,
                                EncodingErrorKind::OffsetMismatch {
                                    expected: offset,
                                    actual: at,
                                },
                            )
                        },
                        |at, e| EncodingError::at(at, e),
                    )
                    .map_err(|e| e.with_field(&binding.name))?;
                channel.pad_to(target).map_err(|e| {
                    let kind = match e {
                        BufferError::InvalidSeek { target, length } => {
                            EncodingErrorKind::OffsetMismatch {
                                expected: target as i64,
                                actual: length,
                            }
                        }
                        other => EncodingErrorKind::Buffer(other),
                    };
                    EncodingError::at(channel.position(), kind).with_field(&binding.name)
                })?;
            }

            binding
                .codec()
                .encode(field, channel, &scope)
                .map_err(|e| e.with_field(&binding.name))?;
            trace!(field = %binding.name, position = channel.position(), "field encoded");
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
