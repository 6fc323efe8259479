/// Byte order of a multi-byte read or write.
///
/// Sub-byte fields are unaffected by the byte order; for wider fields the
/// order decides whether the stream carries the most or the least
/// significant byte group first.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Endian {
    /// Most significant byte first.
    #[default]
    Big,
    /// Least significant byte first.
    Little,
}
