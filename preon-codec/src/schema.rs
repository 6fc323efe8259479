use core::fmt;
use preon_bits::Endian;
use preon_el::Value;

/// Declared type of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TypeRef {
    /// Unsigned integer, 8 bits naturally.
    U8,
    /// Unsigned integer, 16 bits naturally.
    U16,
    /// Unsigned integer, 32 bits naturally.
    U32,
    /// Unsigned integer, 64 bits naturally.
    U64,
    /// Signed integer, 8 bits naturally.
    I8,
    /// Signed integer, 16 bits naturally.
    I16,
    /// Signed integer, 32 bits naturally.
    I32,
    /// Signed integer, 64 bits naturally.
    I64,
    /// Single-bit boolean.
    Bool,
    /// IEEE-754 single precision float.
    F32,
    /// IEEE-754 double precision float.
    F64,
    /// Raw byte array; requires a `length` expression.
    Bytes,
    /// Character string.
    Str,
    /// Homogeneous list of an element type.
    List(Box<TypeRef>),
    /// A composite declared in the schema.
    Named(String),
}

impl TypeRef {
    /// Natural bit width of an integer type, before any `bits` override.
    pub fn natural_width(&self) -> Option<u32> {
        match self {
            TypeRef::U8 | TypeRef::I8 => Some(8),
            TypeRef::U16 | TypeRef::I16 => Some(16),
            TypeRef::U32 | TypeRef::I32 => Some(32),
            TypeRef::U64 | TypeRef::I64 => Some(64),
            _ => None,
        }
    }

    /// Whether this is an integer type, signed or not.
    pub fn is_integer(&self) -> bool {
        self.natural_width().is_some()
    }

    /// Whether this is a signed integer type.
    pub fn is_signed(&self) -> bool {
        matches!(self, TypeRef::I8 | TypeRef::I16 | TypeRef::I32 | TypeRef::I64)
    }
}

/// Character set of a string field.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Charset {
    /// Seven-bit US-ASCII.
    #[default]
    Ascii,
    /// ISO-8859-1; every byte maps to the Unicode scalar of the same value.
    Iso8859_1,
    /// UTF-8.
    Utf8,
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Charset::Ascii => "US-ASCII",
            Charset::Iso8859_1 => "ISO-8859-1",
            Charset::Utf8 => "UTF-8",
        };
        f.write_str(name)
    }
}

/// How a string field knows where it ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StringTermination {
    /// A single zero byte, consumed and excluded from the value.
    ZeroByte,
    /// An unsigned byte-count prefix of the given bit width.
    LengthPrefixed {
        /// Width of the count prefix in bits.
        prefix_bits: u32,
    },
}

/// Sentinel terminating a list.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Terminator {
    /// The sentinel element value.
    pub sentinel: Value,
    /// Whether the sentinel stays in the decoded list.
    pub keep: bool,
}

/// Metadata bag of one field declaration. Expression-valued options carry
/// expression-language source text, parsed and type-checked by the factory
/// pipeline against the enclosing composite's scope.
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldOptions {
    /// Width override for integer fields, in bits.
    pub bits: Option<String>,
    /// Byte order of multi-byte reads.
    pub endian: Option<Endian>,
    /// Presence guard; a false guard skips the field.
    pub when: Option<String>,
    /// Item count of lists, byte length of byte arrays and fixed strings.
    pub length: Option<String>,
    /// Byte extent of byte-delimited lists and slices.
    pub extent: Option<String>,
    /// Absolute bit position override.
    pub offset: Option<String>,
    /// Default expression a skipped field takes.
    pub init: Option<String>,
    /// Guarded branches of a discriminated union.
    pub choices: Vec<(String, TypeRef)>,
    /// Branch taken when no choice guard matches.
    pub choice_default: Option<TypeRef>,
    /// List termination sentinel.
    pub terminator: Option<Terminator>,
    /// Character set of string fields.
    pub charset: Option<Charset>,
    /// Termination policy of string fields without a fixed length.
    pub termination: Option<StringTermination>,
    /// Discriminant-to-enumerator mapping of enum fields.
    pub variants: Vec<(i64, String)>,
    /// Enumerator taken when a decoded discriminant is unmapped.
    pub variant_default: Option<String>,
}

impl FieldOptions {
    /// An empty option set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fix the width of an integer field.
    pub fn bits(mut self, bits: u32) -> Self {
        self.bits = Some(bits.to_string());
        self
    }

    /// Drive the width of an integer field by an expression.
    pub fn bits_expr(mut self, source: impl Into<String>) -> Self {
        self.bits = Some(source.into());
        self
    }

    /// Select the byte order.
    pub fn endian(mut self, endian: Endian) -> Self {
        self.endian = Some(endian);
        self
    }

    /// Guard the field's presence by a boolean expression.
    pub fn when(mut self, source: impl Into<String>) -> Self {
        self.when = Some(source.into());
        self
    }

    /// Drive the length by an expression.
    pub fn length(mut self, source: impl Into<String>) -> Self {
        self.length = Some(source.into());
        self
    }

    /// Confine the field to a byte extent.
    pub fn extent(mut self, source: impl Into<String>) -> Self {
        self.extent = Some(source.into());
        self
    }

    /// Override the absolute bit position the field is read from.
    pub fn offset(mut self, source: impl Into<String>) -> Self {
        self.offset = Some(source.into());
        self
    }

    /// Default a skipped field to an expression.
    pub fn init(mut self, source: impl Into<String>) -> Self {
        self.init = Some(source.into());
        self
    }

    /// Add a guarded branch of a discriminated union.
    pub fn choice(mut self, guard: impl Into<String>, ty: TypeRef) -> Self {
        self.choices.push((guard.into(), ty));
        self
    }

    /// Branch taken when no guard matches.
    pub fn choice_default(mut self, ty: TypeRef) -> Self {
        self.choice_default = Some(ty);
        self
    }

    /// Terminate a list at a sentinel element, excluded from the value.
    pub fn terminator(mut self, sentinel: impl Into<Value>) -> Self {
        self.terminator = Some(Terminator {
            sentinel: sentinel.into(),
            keep: false,
        });
        self
    }

    /// Keep the terminating sentinel in the decoded list.
    pub fn keep_terminator(mut self) -> Self {
        if let Some(terminator) = &mut self.terminator {
            terminator.keep = true;
        }
        self
    }

    /// Select the character set of a string field.
    pub fn charset(mut self, charset: Charset) -> Self {
        self.charset = Some(charset);
        self
    }

    /// Select the termination policy of a string field.
    pub fn termination(mut self, termination: StringTermination) -> Self {
        self.termination = Some(termination);
        self
    }

    /// Map a discriminant to an enumerator name.
    pub fn variant(mut self, discriminant: i64, name: impl Into<String>) -> Self {
        self.variants.push((discriminant, name.into()));
        self
    }

    /// Enumerator taken for unmapped discriminants.
    pub fn variant_default(mut self, name: impl Into<String>) -> Self {
        self.variant_default = Some(name.into());
        self
    }
}

/// One field of a composite declaration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldDecl {
    /// Field name; the decoded value enters the resolver under it.
    pub name: String,
    /// Declared type.
    pub ty: TypeRef,
    /// Binding metadata.
    pub options: FieldOptions,
}

/// An ordered composite type declaration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TypeDecl {
    name: String,
    fields: Vec<FieldDecl>,
}

impl TypeDecl {
    /// A declaration without fields yet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Append a field; declaration order is decode order.
    pub fn field(mut self, name: impl Into<String>, ty: TypeRef, options: FieldOptions) -> Self {
        self.fields.push(FieldDecl {
            name: name.into(),
            ty,
            options,
        });
        self
    }

    /// The declared type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[FieldDecl] {
        &self.fields
    }

    /// The field declared under `name`, if any.
    pub fn field_named(&self, name: &str) -> Option<&FieldDecl> {
        self.fields.iter().find(|field| field.name == name)
    }
}

/// The metadata source: an ordered set of composite type declarations the
/// factory pipeline walks to assemble codecs.
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Schema {
    types: Vec<TypeDecl>,
}

impl Schema {
    /// An empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a declaration, builder style.
    pub fn with(mut self, decl: TypeDecl) -> Self {
        self.declare(decl);
        self
    }

    /// Add a declaration. A redeclared name replaces the earlier one.
    pub fn declare(&mut self, decl: TypeDecl) {
        if let Some(slot) = self.types.iter_mut().find(|t| t.name == decl.name) {
            *slot = decl;
        } else {
            self.types.push(decl);
        }
    }

    /// The declaration of `name`, if any.
    pub fn get(&self, name: &str) -> Option<&TypeDecl> {
        self.types.iter().find(|decl| decl.name == name)
    }
}
