use crate::schema::{Charset, TypeRef};
use core::fmt;
use preon_bits::BufferError;
use preon_el::EvalError;
use thiserror::Error;

/// Path of a value inside the decoded document, used to anchor errors.
///
/// Attribute segments render dot-separated; index segments, stored as
/// `[i]`, attach to their predecessor.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    /// The empty path denoting the value under translation itself.
    pub fn root() -> Self {
        Self::default()
    }

    /// Append a segment, descending into a field.
    pub fn push(&mut self, segment: impl Into<String>) {
        self.0.push(segment.into());
    }

    /// Drop the last segment.
    pub fn pop(&mut self) {
        self.0.pop();
    }

    /// Prepend a segment while an error unwinds outwards.
    pub fn push_front(&mut self, segment: impl Into<String>) {
        self.0.insert(0, segment.into());
    }

    /// Whether any segment was recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<value>");
        }
        for (position, segment) in self.0.iter().enumerate() {
            if position > 0 && !segment.starts_with('[') {
                f.write_str(".")?;
            }
            f.write_str(segment)?;
        }
        Ok(())
    }
}

/// Build-time failure raised from the codec factory. Fatal: the type
/// declaration or its metadata cannot yield a codec.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("cannot bind `{path}`: {kind}")]
pub struct BindingError {
    /// Field path from the root declaration to the failing field.
    pub path: FieldPath,
    /// What went wrong.
    pub kind: BindingErrorKind,
}

impl BindingError {
    /// An error without path context yet.
    pub fn new(kind: impl Into<BindingErrorKind>) -> Self {
        Self {
            path: FieldPath::root(),
            kind: kind.into(),
        }
    }

    /// Prepend a field name while unwinding.
    pub fn with_field(mut self, name: &str) -> Self {
        self.path.push_front(name);
        self
    }
}

/// Causes of a [`BindingError`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindingErrorKind {
    /// The expression source failed to parse or type-check.
    #[error(transparent)]
    Expression(#[from] preon_el::BindingError),
    /// A named type the schema does not declare.
    #[error("unknown type `{name}`")]
    UnknownType {
        /// The missing name.
        name: String,
    },
    /// No registered factory accepted the type.
    #[error("no factory accepts {ty:?}")]
    Unsupported {
        /// The unhandled type.
        ty: TypeRef,
    },
    /// Metadata that contradicts the declared type.
    #[error("{0}")]
    IncompatibleMetadata(String),
}

/// Runtime failure while decoding; reports the bit position the failing
/// read started at and the path of the originating field.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("decoding `{path}` failed at bit {position}: {kind}")]
pub struct DecodingError {
    /// Bit position of the failing operation.
    pub position: u64,
    /// Path of the originating field.
    pub path: FieldPath,
    /// What went wrong.
    pub kind: DecodingErrorKind,
}

impl DecodingError {
    /// An error anchored at a bit position.
    pub fn at(position: u64, kind: impl Into<DecodingErrorKind>) -> Self {
        Self {
            position,
            path: FieldPath::root(),
            kind: kind.into(),
        }
    }

    /// Prepend a field name while unwinding through an object codec.
    pub fn with_field(mut self, name: &str) -> Self {
        self.path.push_front(name);
        self
    }

    /// Prepend a list index while unwinding through a list codec.
    pub fn with_index(mut self, index: usize) -> Self {
        self.path.push_front(format!("[{index}]"));
        self
    }
}

/// Causes of a [`DecodingError`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodingErrorKind {
    /// The buffer ran out or was misaddressed.
    #[error(transparent)]
    Buffer(#[from] BufferError),
    /// A binding expression failed against the live resolver.
    #[error(transparent)]
    Expression(#[from] EvalError),
    /// A width expression outside `1..=64`.
    #[error("width expression evaluated to {width}, expected 1..=64")]
    InvalidWidth {
        /// The evaluated width.
        width: i64,
    },
    /// A length expression below zero.
    #[error("length expression evaluated to {length}")]
    NegativeLength {
        /// The evaluated length.
        length: i64,
    },
    /// An offset expression below zero.
    #[error("offset expression evaluated to {offset}")]
    InvalidOffset {
        /// The evaluated offset.
        offset: i64,
    },
    /// No choice guard matched and no default branch exists.
    #[error("no choice guard matched")]
    UnmatchedChoice,
    /// A decoded discriminant without an enumerator or default.
    #[error("discriminant {value} does not map to an enumerator")]
    UnknownDiscriminant {
        /// The decoded discriminant.
        value: i64,
    },
    /// A terminated list or string ran out of input before its sentinel.
    #[error("terminator not found before the end of input")]
    TerminatorNotFound,
    /// A byte outside the declared character set.
    #[error("byte {byte:#04x} is not valid {charset} data")]
    Charset {
        /// The offending byte.
        byte: u8,
        /// The declared character set.
        charset: Charset,
    },
    /// The builder or constructor could not produce a blank value.
    #[error("cannot construct a blank value: {0}")]
    Construct(String),
    /// A value of an unexpected shape inside the decode pipeline.
    #[error("expected {expected}, found {found}")]
    Shape {
        /// Shape the codec needed.
        expected: &'static str,
        /// Shape actually present.
        found: &'static str,
    },
}

/// Runtime failure while encoding; reports the bit position of the channel
/// and the path of the originating field.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("encoding `{path}` failed at bit {position}: {kind}")]
pub struct EncodingError {
    /// Bit position of the channel when the failure occurred.
    pub position: u64,
    /// Path of the originating field.
    pub path: FieldPath,
    /// What went wrong.
    pub kind: EncodingErrorKind,
}

impl EncodingError {
    /// An error anchored at a channel position.
    pub fn at(position: u64, kind: impl Into<EncodingErrorKind>) -> Self {
        Self {
            position,
            path: FieldPath::root(),
            kind: kind.into(),
        }
    }

    /// Prepend a field name while unwinding through an object codec.
    pub fn with_field(mut self, name: &str) -> Self {
        self.path.push_front(name);
        self
    }

    /// Prepend a list index while unwinding through a list codec.
    pub fn with_index(mut self, index: usize) -> Self {
        self.path.push_front(format!("[{index}]"));
        self
    }
}

/// Causes of an [`EncodingError`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodingErrorKind {
    /// The channel was misaddressed.
    #[error(transparent)]
    Buffer(#[from] BufferError),
    /// A binding expression failed against the value being encoded.
    #[error(transparent)]
    Expression(#[from] EvalError),
    /// A value outside its declared width.
    #[error("value {value} does not fit in {width} bits")]
    OutOfRange {
        /// The offending value.
        value: i64,
        /// The declared width.
        width: u32,
    },
    /// A width expression outside `1..=64`.
    #[error("width expression evaluated to {width}, expected 1..=64")]
    InvalidWidth {
        /// The evaluated width.
        width: i64,
    },
    /// Declared and actual lengths disagree.
    #[error("declared length {expected} does not match actual length {actual}")]
    LengthMismatch {
        /// What the length expression evaluated to.
        expected: i64,
        /// The actual element or byte count of the value.
        actual: usize,
    },
    /// A value overran its declared byte extent.
    #[error("value occupies {actual} bits, declared extent is {expected} bits")]
    ExtentMismatch {
        /// Declared extent in bits.
        expected: u64,
        /// Bits actually written.
        actual: u64,
    },
    /// The channel cannot reach the expected absolute offset.
    #[error("channel at bit {actual} cannot reach expected offset {expected}")]
    OffsetMismatch {
        /// The evaluated offset.
        expected: i64,
        /// Where the channel already is.
        actual: u64,
    },
    /// A value of an unexpected shape for the codec.
    #[error("expected {expected}, found {found}")]
    Shape {
        /// Shape the codec needed.
        expected: &'static str,
        /// Shape actually supplied.
        found: &'static str,
    },
    /// The object misses a field its codec must encode.
    #[error("missing field `{name}`")]
    MissingField {
        /// The missing field name.
        name: String,
    },
    /// An enumerator name outside the declared mapping.
    #[error("enumerator `{name}` is not part of the declared mapping")]
    UnknownEnumerator {
        /// The offending enumerator name.
        name: String,
    },
    /// No choice guard matched the value being encoded.
    #[error("no choice guard matched")]
    UnmatchedChoice,
    /// A zero-terminated string with an interior zero byte.
    #[error("string contains an interior zero byte")]
    InteriorNul,
    /// A character unrepresentable in the declared character set.
    #[error("character {ch:?} is not representable in {charset}")]
    Charset {
        /// The offending character.
        ch: char,
        /// The declared character set.
        charset: Charset,
    },
}
