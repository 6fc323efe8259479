use thiserror::Error;

/// Low-level failures of bit buffer and channel operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BufferError {
    /// A read asked for more bits than remain in the store.
    #[error("bit underflow: {requested} bits requested at bit {position}, {available} available")]
    Underflow {
        /// Number of bits the operation asked for.
        requested: u64,
        /// Cursor position when the operation started.
        position: u64,
        /// Number of bits left past the cursor.
        available: u64,
    },
    /// A seek or pad target lies outside the valid range.
    #[error("invalid seek to bit {target} in a span of {length} bits")]
    InvalidSeek {
        /// Requested absolute bit position.
        target: u64,
        /// Length of the buffer, or current position for backward pads.
        length: u64,
    },
    /// An integer width outside `1..=64` was requested.
    #[error("invalid integer width of {bits} bits, expected 1..=64")]
    InvalidWidth {
        /// The offending width.
        bits: u32,
    },
    /// A slice extends past the end of its parent buffer.
    #[error("slice of {length} bits at bit {start} exceeds parent length of {parent} bits")]
    SliceOutOfBounds {
        /// First bit of the requested slice.
        start: u64,
        /// Length of the requested slice in bits.
        length: u64,
        /// Length of the parent buffer in bits.
        parent: u64,
    },
}
