use crate::codec::{Builder, Codec};
use crate::error::{DecodingError, DecodingErrorKind, EncodingError, EncodingErrorKind};
use crate::primitive::NumericCodec;
use crate::schema::TypeRef;
use preon_bits::{BitBuffer, BitChannel};
use preon_el::{EnumValue, Expr, Resolver, Value};

/// Enumeration codec: an underlying integer codec plus a
/// discriminant-to-name mapping.
///
/// An unmapped discriminant decodes to the configured default enumerator,
/// or fails when none is configured. Encoding maps the enumerator name
/// back; the carried discriminant is ignored in favour of the mapping.
#[derive(Debug)]
pub struct EnumCodec {
    underlying: NumericCodec,
    variants: Vec<(i64, String)>,
    default: Option<String>,
}

impl EnumCodec {
    /// An enum codec. The factory guarantees `default`, when present,
    /// names one of `variants`.
    pub fn new(
        underlying: NumericCodec,
        variants: Vec<(i64, String)>,
        default: Option<String>,
    ) -> Self {
        Self {
            underlying,
            variants,
            default,
        }
    }

    fn name_of(&self, discriminant: i64) -> Option<&str> {
        self.variants
            .iter()
            .find(|(mapped, _)| *mapped == discriminant)
            .map(|(_, name)| name.as_str())
    }

    fn discriminant_of(&self, name: &str) -> Option<i64> {
        self.variants
            .iter()
            .find(|(_, mapped)| mapped == name)
            .map(|(discriminant, _)| *discriminant)
    }
}

impl Codec for EnumCodec {
    fn decode(
        &self,
        buffer: &mut BitBuffer<'_>,
        resolver: &dyn Resolver,
        builder: &dyn Builder,
    ) -> Result<Value, DecodingError> {
        let position = buffer.position();
        let decoded = self.underlying.decode(buffer, resolver, builder)?;
        let discriminant = decoded
            .as_integer()
            .expect("the underlying numeric codec yields integers");

        if let Some(name) = self.name_of(discriminant) {
            return Ok(Value::Enum(EnumValue::new(name, discriminant)));
        }
        match &self.default {
            Some(name) => {
                let mapped = self
                    .discriminant_of(name)
                    .expect("the default names a declared variant");
                Ok(Value::Enum(EnumValue::new(name.clone(), mapped)))
            }
            None => Err(DecodingError::at(
                position,
                DecodingErrorKind::UnknownDiscriminant {
                    value: discriminant,
                },
            )),
        }
    }

    fn encode(
        &self,
        value: &Value,
        channel: &mut BitChannel,
        resolver: &dyn Resolver,
    ) -> Result<(), EncodingError> {
        let position = channel.position();
        let Value::Enum(value) = value else {
            return Err(EncodingError::at(
                position,
                EncodingErrorKind::Shape {
                    expected: "an enumerator",
                    found: value.type_name(),
                },
            ));
        };
        let discriminant = self.discriminant_of(&value.name).ok_or_else(|| {
            EncodingError::at(
                position,
                EncodingErrorKind::UnknownEnumerator {
                    name: value.name.clone(),
                },
            )
        })?;
        self.underlying
            .encode(&Value::Integer(discriminant), channel, resolver)
    }

    fn size(&self) -> Option<&Expr> {
        self.underlying.size()
    }

    fn type_ref(&self) -> &TypeRef {
        self.underlying.type_ref()
    }
}
