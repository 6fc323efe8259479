//! Declarative bit-level codec composition of the Preon binary format
//! framework.
//!
//! A [`Schema`] declares composite types field by field, each field
//! carrying [`FieldOptions`] whose expression-valued entries reference
//! sibling fields. The [`Pipeline`] walks a declaration, consults its
//! sub-factories in priority order and yields a [`CodecHandle`] that
//! translates between raw bytes and the dynamic [`Value`] document model:
//!
//! ```
//! use preon_codec::{FieldOptions, Pipeline, Schema, TypeDecl, TypeRef};
//! use std::sync::Arc;
//!
//! let schema = Arc::new(Schema::new().with(
//!     TypeDecl::new("Frame")
//!         .field("n", TypeRef::U8, FieldOptions::new())
//!         .field("payload", TypeRef::Bytes, FieldOptions::new().length("n")),
//! ));
//! let codec = Pipeline::new().codec_for(&schema, "Frame")?;
//!
//! let frame = codec.decode(&[0x03, 0x41, 0x42, 0x43])?;
//! assert_eq!(codec.encode(&frame)?, vec![0x03, 0x41, 0x42, 0x43]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(unused_must_use)]

mod choice;
mod codec;
mod context;
mod enumeration;
mod error;
mod factory;
mod list;
mod object;
mod primitive;
mod schema;
mod slice;
mod string;

pub use choice::ChoiceCodec;
pub use codec::{
    Builder, Codec, CodecHandle, Constructor, ConstructorBuilder, DefaultConstructor,
};
pub use context::SchemaContext;
pub use enumeration::EnumCodec;
pub use error::{
    BindingError, BindingErrorKind, DecodingError, DecodingErrorKind, EncodingError,
    EncodingErrorKind, FieldPath,
};
pub use factory::{
    BindingDecorator, BuildState, CodecDecorator, CodecFactory, Pipeline, TraceDecorator,
};
pub use list::{ListCodec, ListExtent};
pub use object::{Binding, ObjectCodec};
pub use primitive::{BooleanCodec, ByteArrayCodec, FloatCodec, NumericCodec};
pub use schema::{
    Charset, FieldDecl, FieldOptions, Schema, StringTermination, Terminator, TypeDecl, TypeRef,
};
pub use slice::SliceCodec;
pub use string::{StringCodec, StringDiscipline};

// The document model and the buffer layer are part of the public surface.
pub use preon_bits::{BitBuffer, BitChannel, BufferError, Endian};
pub use preon_el::{EmptyResolver, EnumValue, Expr, Object, ObjectScope, Resolver, Value};
