use crate::codec::{Builder, Codec};
use crate::error::{DecodingError, DecodingErrorKind, EncodingError, EncodingErrorKind};
use crate::schema::{Charset, TypeRef};
use preon_bits::{BitBuffer, BitChannel, BufferError, Endian};
use preon_el::{ArithOp, Expr, Resolver, Value};

/// How a string codec finds its end on the wire.
#[derive(Debug)]
pub enum StringDiscipline {
    /// A byte length known from an expression over sibling fields.
    Fixed(Expr),
    /// Bytes up to a zero byte, which is consumed and excluded.
    ZeroByte,
    /// An unsigned byte-count prefix of the given width.
    LengthPrefixed {
        /// Width of the count prefix in bits.
        prefix_bits: u32,
        /// Byte order of the prefix.
        endian: Endian,
    },
}

/// String codec over a declared character set and termination discipline.
#[derive(Debug)]
pub struct StringCodec {
    ty: TypeRef,
    charset: Charset,
    discipline: StringDiscipline,
    size: Option<Expr>,
}

impl StringCodec {
    /// A string codec. Only the fixed-length discipline has a statically
    /// expressible size.
    pub fn new(charset: Charset, discipline: StringDiscipline) -> Self {
        let size = match &discipline {
            StringDiscipline::Fixed(length) => Some(
                Expr::Arith {
                    op: ArithOp::Mul,
                    lhs: Box::new(length.clone()),
                    rhs: Box::new(Expr::Integer(8)),
                }
                .fold(),
            ),
            _ => None,
        };
        Self {
            ty: TypeRef::Str,
            charset,
            discipline,
            size,
        }
    }

    fn decode_charset(&self, bytes: Vec<u8>, position: u64) -> Result<String, DecodingError> {
        match self.charset {
            Charset::Ascii => {
                if let Some(byte) = bytes.iter().copied().find(|byte| *byte >= 0x80) {
                    return Err(DecodingError::at(
                        position,
                        DecodingErrorKind::Charset {
                            byte,
                            charset: self.charset,
                        },
                    ));
                }
                Ok(bytes.into_iter().map(char::from).collect())
            }
            Charset::Iso8859_1 => Ok(bytes.into_iter().map(char::from).collect()),
            Charset::Utf8 => String::from_utf8(bytes).map_err(|error| {
                let valid = error.utf8_error().valid_up_to();
                let byte = error.as_bytes()[valid];
                DecodingError::at(
                    position,
                    DecodingErrorKind::Charset {
                        byte,
                        charset: self.charset,
                    },
                )
            }),
        }
    }

    fn encode_charset(&self, value: &str, position: u64) -> Result<Vec<u8>, EncodingError> {
        let limit = match self.charset {
            Charset::Ascii => 0x80,
            Charset::Iso8859_1 => 0x100,
            Charset::Utf8 => return Ok(value.as_bytes().to_vec()),
        };
        value
            .chars()
            .map(|ch| {
                if (ch as u32) < limit {
                    Ok(ch as u8)
                } else {
                    Err(EncodingError::at(
                        position,
                        EncodingErrorKind::Charset {
                            ch,
                            charset: self.charset,
                        },
                    ))
                }
            })
            .collect()
    }
}

impl Codec for StringCodec {
    fn decode(
        &self,
        buffer: &mut BitBuffer<'_>,
        resolver: &dyn Resolver,
        _builder: &dyn Builder,
    ) -> Result<Value, DecodingError> {
        let position = buffer.position();
        let bytes = match &self.discipline {
            StringDiscipline::Fixed(length) => {
                let length = length
                    .eval_integer(resolver)
                    .map_err(|e| DecodingError::at(position, e))?;
                let length = usize::try_from(length).map_err(|_| {
                    DecodingError::at(position, DecodingErrorKind::NegativeLength { length })
                })?;
                buffer
                    .read_bytes(length)
                    .map_err(|e| DecodingError::at(position, e))?
            }
            StringDiscipline::ZeroByte => {
                let mut bytes = Vec::new();
                loop {
                    let byte = buffer.read_bytes(1).map_err(|e| match e {
                        BufferError::Underflow { .. } => {
                            DecodingError::at(position, DecodingErrorKind::TerminatorNotFound)
                        }
                        other => DecodingError::at(position, other),
                    })?[0];
                    if byte == 0 {
                        break;
                    }
                    bytes.push(byte);
                }
                bytes
            }
            StringDiscipline::LengthPrefixed {
                prefix_bits,
                endian,
            } => {
                let length = buffer
                    .read_unsigned(*prefix_bits, *endian)
                    .map_err(|e| DecodingError::at(position, e))?;
                buffer
                    .read_bytes(length as usize)
                    .map_err(|e| DecodingError::at(position, e))?
            }
        };
        self.decode_charset(bytes, position).map(Value::String)
    }

    fn encode(
        &self,
        value: &Value,
        channel: &mut BitChannel,
        resolver: &dyn Resolver,
    ) -> Result<(), EncodingError> {
        let position = channel.position();
        let Value::String(value) = value else {
            return Err(EncodingError::at(
                position,
                EncodingErrorKind::Shape {
                    expected: "a string",
                    found: value.type_name(),
                },
            ));
        };
        let bytes = self.encode_charset(value, position)?;
        match &self.discipline {
            StringDiscipline::Fixed(length) => {
                let length = length
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
                channel.write_bytes(&bytes);
            }
            StringDiscipline::ZeroByte => {
                if bytes.contains(&0) {
                    return Err(EncodingError::at(position, EncodingErrorKind::InteriorNul));
                }
                channel.write_bytes(&bytes);
                channel.write_bytes(&[0]);
            }
            StringDiscipline::LengthPrefixed {
                prefix_bits,
                endian,
            } => {
                let length = bytes.len() as u64;
                if *prefix_bits < 64 && length >> prefix_bits != 0 {
                    return Err(EncodingError::at(
                        position,
                        EncodingErrorKind::OutOfRange {
                            value: length as i64,
                            width: *prefix_bits,
                        },
                    ));
                }
                channel
                    .write_unsigned(length, *prefix_bits, *endian)
                    .map_err(|e| EncodingError::at(position, e))?;
                channel.write_bytes(&bytes);
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
