use crate::codec::{Builder, Codec};
use crate::error::{DecodingError, DecodingErrorKind, EncodingError, EncodingErrorKind};
use crate::schema::TypeRef;
use preon_bits::{BitBuffer, BitChannel, Endian, MAX_WIDTH};
use preon_el::{ArithOp, Expr, Resolver, Value};

/// Fixed- or expression-width integer codec, signed or unsigned, with a
/// selectable byte order. The width expression is usually a folded literal
/// but may reference sibling fields.
#[derive(Debug)]
pub struct NumericCodec {
    ty: TypeRef,
    width: Expr,
    signed: bool,
    endian: Endian,
}

impl NumericCodec {
    /// A numeric codec for `ty` with the given width expression.
    pub fn new(ty: TypeRef, width: Expr, endian: Endian) -> Self {
        let signed = ty.is_signed();
        Self {
            ty,
            width,
            signed,
            endian,
        }
    }

    fn eval_width(
        &self,
        resolver: &dyn Resolver,
    ) -> Result<Result<u32, i64>, preon_el::EvalError> {
        let width = self.width.eval_integer(resolver)?;
        Ok(u32::try_from(width)
            .ok()
            .filter(|width| (1..=MAX_WIDTH).contains(width))
            .ok_or(width))
    }

    /// Whether `value` fits the declared width.
    fn in_range(&self, value: i64, width: u32) -> bool {
        if width == 64 {
            return true;
        }
        if self.signed {
            let shifted = value >> (width - 1);
            shifted == 0 || shifted == -1
        } else {
            value >= 0 && (value as u64) >> width == 0
        }
    }
}

impl Codec for NumericCodec {
    fn decode(
        &self,
        buffer: &mut BitBuffer<'_>,
        resolver: &dyn Resolver,
        _builder: &dyn Builder,
    ) -> Result<Value, DecodingError> {
        let position = buffer.position();
        let width = self
            .eval_width(resolver)
            .map_err(|e| DecodingError::at(position, e))?
            .map_err(|width| DecodingError::at(position, DecodingErrorKind::InvalidWidth { width }))?;
        let value = if self.signed {
            buffer
                .read_signed(width, self.endian)
                .map_err(|e| DecodingError::at(position, e))?
        } else {
            buffer
                .read_unsigned(width, self.endian)
                .map_err(|e| DecodingError::at(position, e))? as i64
        };
        Ok(Value::Integer(value))
    }

    fn encode(
        &self,
        value: &Value,
        channel: &mut BitChannel,
        resolver: &dyn Resolver,
    ) -> Result<(), EncodingError> {
        let position = channel.position();
        let value = value.as_integer().ok_or_else(|| {
            EncodingError::at(
                position,
                EncodingErrorKind::Shape {
                    expected: "an integer",
                    found: value.type_name(),
                },
            )
        })?;
        let width = self
            .eval_width(resolver)
            .map_err(|e| EncodingError::at(position, e))?
            .map_err(|width| EncodingError::at(position, EncodingErrorKind::InvalidWidth { width }))?;
        if !self.in_range(value, width) {
            return Err(EncodingError::at(
                position,
                EncodingErrorKind::OutOfRange { value, width },
            ));
        }
        channel
            .write_unsigned(value as u64, width, self.endian)
            .map_err(|e| EncodingError::at(position, e))
    }

    fn size(&self) -> Option<&Expr> {
        Some(&self.width)
    }

    fn type_ref(&self) -> &TypeRef {
        &self.ty
    }
}

/// Single-bit boolean codec: 0 decodes to false, 1 to true.
#[derive(Debug)]
pub struct BooleanCodec {
    ty: TypeRef,
    size: Expr,
}

impl Default for BooleanCodec {
    fn default() -> Self {
        Self {
            ty: TypeRef::Bool,
            size: Expr::Integer(1),
        }
    }
}

impl BooleanCodec {
    /// The boolean codec.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Codec for BooleanCodec {
    fn decode(
        &self,
        buffer: &mut BitBuffer<'_>,
        _resolver: &dyn Resolver,
        _builder: &dyn Builder,
    ) -> Result<Value, DecodingError> {
        let position = buffer.position();
        let value = buffer
            .read_bool()
            .map_err(|e| DecodingError::at(position, e))?;
        Ok(Value::Bool(value))
    }

    fn encode(
        &self,
        value: &Value,
        channel: &mut BitChannel,
        _resolver: &dyn Resolver,
    ) -> Result<(), EncodingError> {
        let flag = value.as_bool().ok_or_else(|| {
            EncodingError::at(
                channel.position(),
                EncodingErrorKind::Shape {
                    expected: "a boolean",
                    found: value.type_name(),
                },
            )
        })?;
        channel.write_bool(flag);
        Ok(())
    }

    fn size(&self) -> Option<&Expr> {
        Some(&self.size)
    }

    fn type_ref(&self) -> &TypeRef {
        &self.ty
    }
}

/// IEEE-754 float codec, single or double precision.
#[derive(Debug)]
pub struct FloatCodec {
    ty: TypeRef,
    endian: Endian,
    size: Expr,
}

impl FloatCodec {
    /// A float codec for `TypeRef::F32` or `TypeRef::F64`.
    pub fn new(ty: TypeRef, endian: Endian) -> Self {
        let size = Expr::Integer(if ty == TypeRef::F32 { 32 } else { 64 });
        Self { ty, endian, size }
    }

    fn is_single(&self) -> bool {
        self.ty == TypeRef::F32
    }
}

impl Codec for FloatCodec {
    fn decode(
        &self,
        buffer: &mut BitBuffer<'_>,
        _resolver: &dyn Resolver,
        _builder: &dyn Builder,
    ) -> Result<Value, DecodingError> {
        let position = buffer.position();
        let value = if self.is_single() {
            buffer
                .read_f32(self.endian)
                .map_err(|e| DecodingError::at(position, e))? as f64
        } else {
            buffer
                .read_f64(self.endian)
                .map_err(|e| DecodingError::at(position, e))?
        };
        Ok(Value::Float(value))
    }

    fn encode(
        &self,
        value: &Value,
        channel: &mut BitChannel,
        _resolver: &dyn Resolver,
    ) -> Result<(), EncodingError> {
        let position = channel.position();
        let Value::Float(value) = value else {
            return Err(EncodingError::at(
                position,
                EncodingErrorKind::Shape {
                    expected: "a float",
                    found: value.type_name(),
                },
            ));
        };
        let result = if self.is_single() {
            channel.write_f32(*value as f32, self.endian)
        } else {
            channel.write_f64(*value, self.endian)
        };
        result.map_err(|e| EncodingError::at(position, e))
    }

    fn size(&self) -> Option<&Expr> {
        Some(&self.size)
    }

    fn type_ref(&self) -> &TypeRef {
        &self.ty
    }
}

/// Byte-array codec with an expression-driven byte length.
#[derive(Debug)]
pub struct ByteArrayCodec {
    ty: TypeRef,
    length: Expr,
    size: Expr,
}

impl ByteArrayCodec {
    /// A byte-array codec reading `length` (an Integer expression, in
    /// bytes) at decode time.
    pub fn new(length: Expr) -> Self {
        // `length` is Integer-typed by construction, so the size product
        // is well-typed without re-checking.
        let size = Expr::Arith {
            op: ArithOp::Mul,
            lhs: Box::new(length.clone()),
            rhs: Box::new(Expr::Integer(8)),
        }
        .fold();
        Self {
            ty: TypeRef::Bytes,
            length,
            size,
        }
    }
}

impl Codec for ByteArrayCodec {
    fn decode(
        &self,
        buffer: &mut BitBuffer<'_>,
        resolver: &dyn Resolver,
        _builder: &dyn Builder,
    ) -> Result<Value, DecodingError> {
        let position = buffer.position();
        let length = self
            .length
            .eval_integer(resolver)
            .map_err(|e| DecodingError::at(position, e))?;
        let length = usize::try_from(length)
            .map_err(|_| DecodingError::at(position, DecodingErrorKind::NegativeLength { length }))?;
        let bytes = buffer
            .read_bytes(length)
            .map_err(|e| DecodingError::at(position, e))?;
        Ok(Value::Bytes(bytes))
    }

    fn encode(
        &self,
        value: &Value,
        channel: &mut BitChannel,
        resolver: &dyn Resolver,
    ) -> Result<(), EncodingError> {
        let position = channel.position();
        let Value::Bytes(bytes) = value else {
            return Err(EncodingError::at(
                position,
                EncodingErrorKind::Shape {
                    expected: "a byte array",
                    found: value.type_name(),
                },
            ));
        };
        let length = self
            .length
            .eval_integer(resolver)
            .map_err(|e| EncodingError::at(position, e))?;
        if length != bytes.len() as i64 {
            return Err(EncodingError::at(
                position,
                EncodingErrorKind::LengthMismatch {
                    expected: length,
                    actual: bytes.len(),
                },
            ));
        }
        channel.write_bytes(bytes);
        Ok(())
    }

    fn size(&self) -> Option<&Expr> {
        Some(&self.size)
    }

    fn type_ref(&self) -> &TypeRef {
        &self.ty
    }
}
