use crate::error::{DecodingError, DecodingErrorKind, EncodingError};
use crate::schema::{Schema, TypeRef};
use core::fmt;
use preon_bits::{BitBuffer, BitChannel};
use preon_el::{EmptyResolver, EnumValue, Expr, Object, Resolver, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Bidirectional translator between wire bits and a [`Value`].
///
/// Codecs are built once per type declaration, are immutable afterwards
/// and may be shared across threads; buffers, channels and resolvers are
/// per-operation.
pub trait Codec: fmt::Debug + Send + Sync {
    /// Decode one value, advancing the buffer past its bits.
    fn decode(
        &self,
        buffer: &mut BitBuffer<'_>,
        resolver: &dyn Resolver,
        builder: &dyn Builder,
    ) -> Result<Value, DecodingError>;

    /// Encode `value`, appending its bits to the channel.
    fn encode(
        &self,
        value: &Value,
        channel: &mut BitChannel,
        resolver: &dyn Resolver,
    ) -> Result<(), EncodingError>;

    /// Bit size as an expression over sibling fields; parameterless sizes
    /// are folded literals. `None` when the size is not statically
    /// expressible, as for terminated lists.
    fn size(&self) -> Option<&Expr>;

    /// The declared type this codec translates.
    fn type_ref(&self) -> &TypeRef;
}

/// Produces blank values for the object codec to populate.
pub trait Constructor: fmt::Debug + Send + Sync {
    /// A default-initialised value of `ty`.
    fn construct(&self, ty: &TypeRef, schema: &Schema) -> Result<Value, DecodingError>;
}

type ValueFactory = Arc<dyn Fn() -> Value + Send + Sync>;

/// The zero-value constructor: integers to 0, booleans to false, floats to
/// 0.0, strings and containers to empty. A user-supplied factory can be
/// registered per named type for values with non-trivial blanks.
#[derive(Default, Clone)]
pub struct DefaultConstructor {
    overrides: HashMap<String, ValueFactory>,
}

impl DefaultConstructor {
    /// A constructor without overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory consulted for blank values of the named type.
    pub fn register(
        &mut self,
        type_name: impl Into<String>,
        factory: impl Fn() -> Value + Send + Sync + 'static,
    ) {
        self.overrides.insert(type_name.into(), Arc::new(factory));
    }

    fn blank_field(
        &self,
        schema: &Schema,
        field: &crate::schema::FieldDecl,
    ) -> Result<Value, DecodingError> {
        if !field.options.variants.is_empty() {
            let (discriminant, name) = field
                .options
                .variant_default
                .as_ref()
                .and_then(|default| {
                    field
                        .options
                        .variants
                        .iter()
                        .find(|(_, name)| name == default)
                })
                .or_else(|| field.options.variants.first())
                .cloned()
                .ok_or_else(|| {
                    DecodingError::at(
                        0,
                        DecodingErrorKind::Construct(format!(
                            "field `{}` declares an empty variant mapping",
                            field.name
                        )),
                    )
                })?;
            return Ok(Value::Enum(EnumValue::new(name, discriminant)));
        }
        match &field.ty {
            // A blank nested composite stays empty rather than recursing,
            // which keeps cyclic declarations constructible.
            TypeRef::Named(_) => Ok(Value::Object(Object::new())),
            other => self.construct(other, schema),
        }
    }
}

impl fmt::Debug for DefaultConstructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultConstructor")
            .field("overrides", &self.overrides.keys())
            .finish()
    }
}

impl Constructor for DefaultConstructor {
    fn construct(&self, ty: &TypeRef, schema: &Schema) -> Result<Value, DecodingError> {
        match ty {
            TypeRef::Bool => Ok(Value::Bool(false)),
            TypeRef::F32 | TypeRef::F64 => Ok(Value::Float(0.0)),
            TypeRef::Bytes => Ok(Value::Bytes(Vec::new())),
            TypeRef::Str => Ok(Value::String(String::new())),
            TypeRef::List(_) => Ok(Value::List(Vec::new())),
            TypeRef::Named(name) => {
                if let Some(factory) = self.overrides.get(name) {
                    return Ok(factory());
                }
                let decl = schema.get(name).ok_or_else(|| {
                    DecodingError::at(
                        0,
                        DecodingErrorKind::Construct(format!("unknown type `{name}`")),
                    )
                })?;
                let mut object = Object::new();
                for field in decl.fields() {
                    object.set(&field.name, self.blank_field(schema, field)?);
                }
                Ok(Value::Object(object))
            }
            _ => Ok(Value::Integer(0)),
        }
    }
}

/// Decode-time collaborator producing the instance a composite decodes
/// into; receives the live resolver so custom builders can dispatch on
/// already-decoded siblings.
pub trait Builder: fmt::Debug + Send + Sync {
    /// Produce the value the object codec populates.
    fn build(
        &self,
        ty: &TypeRef,
        schema: &Schema,
        resolver: &dyn Resolver,
    ) -> Result<Value, DecodingError>;
}

/// The default builder defers to a [`Constructor`].
#[derive(Debug, Clone)]
pub struct ConstructorBuilder {
    constructor: Arc<dyn Constructor>,
}

impl ConstructorBuilder {
    /// A builder over the given constructor.
    pub fn new(constructor: Arc<dyn Constructor>) -> Self {
        Self { constructor }
    }
}

impl Default for ConstructorBuilder {
    fn default() -> Self {
        Self::new(Arc::new(DefaultConstructor::new()))
    }
}

impl Builder for ConstructorBuilder {
    fn build(
        &self,
        ty: &TypeRef,
        schema: &Schema,
        _resolver: &dyn Resolver,
    ) -> Result<Value, DecodingError> {
        self.constructor.construct(ty, schema)
    }
}

/// A built codec bound to its schema, ready to decode and encode.
#[derive(Debug, Clone)]
pub struct CodecHandle {
    codec: Arc<dyn Codec>,
    schema: Arc<Schema>,
    builder: Arc<dyn Builder>,
}

impl CodecHandle {
    pub(crate) fn new(codec: Arc<dyn Codec>, schema: Arc<Schema>) -> Self {
        Self {
            codec,
            schema,
            builder: Arc::new(ConstructorBuilder::default()),
        }
    }

    /// Replace the decode-time builder.
    pub fn with_builder(mut self, builder: Arc<dyn Builder>) -> Self {
        self.builder = builder;
        self
    }

    /// Decode a value from `bytes`. Trailing bits are permitted.
    pub fn decode(&self, bytes: &[u8]) -> Result<Value, DecodingError> {
        let mut buffer = BitBuffer::new(bytes);
        self.codec.decode(&mut buffer, &EmptyResolver, &*self.builder)
    }

    /// Decode against an explicit outer resolver, handed through to custom
    /// [`Builder`] implementations that dispatch on caller-supplied state.
    pub fn decode_with(
        &self,
        bytes: &[u8],
        resolver: &dyn Resolver,
    ) -> Result<Value, DecodingError> {
        let mut buffer = BitBuffer::new(bytes);
        self.codec.decode(&mut buffer, resolver, &*self.builder)
    }

    /// Encode a value into bytes; the trailing partial byte is zero-padded.
    pub fn encode(&self, value: &Value) -> Result<Vec<u8>, EncodingError> {
        let mut channel = BitChannel::new();
        self.codec.encode(value, &mut channel, &EmptyResolver)?;
        Ok(channel.close())
    }

    /// Bit size expression of the bound codec.
    pub fn size(&self) -> Option<&Expr> {
        self.codec.size()
    }

    /// The underlying codec tree.
    pub fn codec(&self) -> &Arc<dyn Codec> {
        &self.codec
    }

    /// The schema the codec was built from.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}
