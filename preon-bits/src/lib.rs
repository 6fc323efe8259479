//! Bit-addressable buffers of the Preon binary format framework.
//!
//! [`BitBuffer`] is a random-access reader over a borrowed byte slice with a
//! cursor measured in bits; [`BitChannel`] is the sequential writer that
//! mirrors it. Within a byte the most significant bit always comes first;
//! multi-byte values select their byte order per operation via [`Endian`].

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(unused_must_use)]

mod buffer;
mod channel;
mod endian;
mod error;

pub use buffer::BitBuffer;
pub use channel::BitChannel;
pub use endian::Endian;
pub use error::BufferError;

/// Widest integer, in bits, a single read or write can carry.
pub const MAX_WIDTH: u32 = 64;
