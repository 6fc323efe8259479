use crate::{BufferError, Endian, MAX_WIDTH};

/// Sequential bit writer mirroring [`BitBuffer`](crate::BitBuffer).
///
/// Bits accumulate most-significant-bit first into a partial byte that is
/// appended to the backing store once full; [`close`](Self::close) flushes
/// the trailing partial byte padded with zero bits. Values wider than the
/// requested width are truncated to their low bits before writing.
#[derive(Debug, Default)]
pub struct BitChannel {
    bytes: Vec<u8>,
    /// Pending high bits of the next byte, MSB-aligned in `current`.
    current: u8,
    /// Number of pending bits, always in `0..8`.
    pending: u32,
}

impl BitChannel {
    /// A channel with an empty backing store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bits written so far.
    pub fn position(&self) -> u64 {
        self.bytes.len() as u64 * 8 + self.pending as u64
    }

    /// Write the low `bits` (1..=64) of `value`.
    pub fn write_unsigned(
        &mut self,
        value: u64,
        bits: u32,
        endian: Endian,
    ) -> Result<(), BufferError> {
        if bits == 0 || bits > MAX_WIDTH {
            return Err(BufferError::InvalidWidth { bits });
        }
        match endian {
            Endian::Big => self.emit(value, bits),
            Endian::Little => {
                // Mirror of the reader: leading partial group carries the
                // most significant bits, whole bytes follow least
                // significant group first.
                let head_bits = bits % 8;
                let groups = bits / 8;
                if head_bits > 0 {
                    self.emit(value >> (8 * groups), head_bits);
                }
                for group in 0..groups {
                    self.emit(value >> (8 * group), 8);
                }
            }
        }
        Ok(())
    }

    /// Write the low `bits` of a signed value in two's complement.
    pub fn write_signed(&mut self, value: i64, bits: u32, endian: Endian) -> Result<(), BufferError> {
        self.write_unsigned(value as u64, bits, endian)
    }

    /// Write a boolean as a single bit.
    pub fn write_bool(&mut self, value: bool) {
        self.emit(value as u64, 1);
    }

    /// Write whole bytes in order.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        if self.pending == 0 {
            self.bytes.extend_from_slice(bytes);
        } else {
            for byte in bytes {
                self.emit(*byte as u64, 8);
            }
        }
    }

    /// Write an IEEE-754 single precision float.
    pub fn write_f32(&mut self, value: f32, endian: Endian) -> Result<(), BufferError> {
        self.write_unsigned(value.to_bits() as u64, 32, endian)
    }

    /// Write an IEEE-754 double precision float.
    pub fn write_f64(&mut self, value: f64, endian: Endian) -> Result<(), BufferError> {
        self.write_unsigned(value.to_bits(), 64, endian)
    }

    /// Advance to an absolute bit position by writing zero bits. Fails when
    /// the channel is already past `bit`.
    pub fn pad_to(&mut self, bit: u64) -> Result<(), BufferError> {
        let position = self.position();
        if bit < position {
            return Err(BufferError::InvalidSeek {
                target: bit,
                length: position,
            });
        }
        let mut gap = bit - position;
        while gap >= 64 {
            self.emit(0, 64);
            gap -= 64;
        }
        if gap > 0 {
            self.emit(0, gap as u32);
        }
        Ok(())
    }

    /// Flush the partial byte, padding its trailing bits with zero, and
    /// return the backing store.
    pub fn close(mut self) -> Vec<u8> {
        if self.pending > 0 {
            self.bytes.push(self.current << (8 - self.pending));
            self.pending = 0;
        }
        self.bytes
    }

    /// Append the low `bits` of `value`, MSB first.
    fn emit(&mut self, value: u64, bits: u32) {
        let mut remaining = bits;
        while remaining > 0 {
            let space = 8 - self.pending;
            let take = remaining.min(space);
            let chunk = (value >> (remaining - take)) as u8 & low_mask(take);
            self.current = self.current.wrapping_shl(take) | chunk;
            self.pending += take;
            remaining -= take;
            if self.pending == 8 {
                self.bytes.push(self.current);
                self.current = 0;
                self.pending = 0;
            }
        }
    }
}

const fn low_mask(bits: u32) -> u8 {
    if bits >= 8 {
        u8::MAX
    } else {
        (1u8 << bits) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BitBuffer;
    use quickcheck_macros::quickcheck;
    use rstest::rstest;

    #[test]
    fn packs_bit_fields_msb_first() {
        let mut channel = BitChannel::new();
        channel.write_unsigned(5, 3, Endian::Big).unwrap();
        channel.write_unsigned(11, 5, Endian::Big).unwrap();
        assert_eq!(channel.close(), vec![0xAB]);
    }

    #[test]
    fn flush_pads_trailing_bits_with_zero() {
        let mut channel = BitChannel::new();
        channel.write_unsigned(0b11, 2, Endian::Big).unwrap();
        assert_eq!(channel.close(), vec![0b1100_0000]);
    }

    #[test]
    fn truncates_to_requested_width() {
        let mut channel = BitChannel::new();
        channel.write_unsigned(0x1FF, 8, Endian::Big).unwrap();
        assert_eq!(channel.close(), vec![0xFF]);
    }

    #[rstest]
    #[case(Endian::Big)]
    #[case(Endian::Little)]
    fn aligned_u32_layout(#[case] endian: Endian) {
        let mut channel = BitChannel::new();
        channel.write_unsigned(0xDEADBEEF, 32, endian).unwrap();
        let expected = match endian {
            Endian::Big => vec![0xDE, 0xAD, 0xBE, 0xEF],
            Endian::Little => vec![0xEF, 0xBE, 0xAD, 0xDE],
        };
        assert_eq!(channel.close(), expected);
    }

    #[test]
    fn pad_to_fills_with_zero_bits() {
        let mut channel = BitChannel::new();
        channel.write_unsigned(0xFF, 8, Endian::Big).unwrap();
        channel.pad_to(32).unwrap();
        channel.write_unsigned(0x2A, 8, Endian::Big).unwrap();
        assert_eq!(channel.close(), vec![0xFF, 0x00, 0x00, 0x00, 0x2A]);
    }

    #[test]
    fn pad_backwards_is_rejected() {
        let mut channel = BitChannel::new();
        channel.write_unsigned(0, 16, Endian::Big).unwrap();
        assert_eq!(
            channel.pad_to(8).unwrap_err(),
            BufferError::InvalidSeek { target: 8, length: 16 }
        );
    }

    #[test]
    fn unaligned_byte_writes() {
        let mut channel = BitChannel::new();
        channel.write_unsigned(0xA, 4, Endian::Big).unwrap();
        channel.write_bytes(&[0xBC, 0xDE]);
        assert_eq!(channel.close(), vec![0xAB, 0xCD, 0xE0]);
    }

    #[quickcheck]
    fn roundtrips_any_width_and_phase(value: u64, width: u8, phase: u8, little: bool) -> bool {
        let width = (width % 64) as u32 + 1;
        let phase = (phase % 8) as u32;
        let endian = if little { Endian::Little } else { Endian::Big };
        let expected = if width == 64 { value } else { value & ((1u64 << width) - 1) };

        let mut channel = BitChannel::new();
        if phase > 0 {
            channel.write_unsigned(0, phase, Endian::Big).unwrap();
        }
        channel.write_unsigned(value, width, endian).unwrap();
        let bytes = channel.close();

        let mut buffer = BitBuffer::new(&bytes);
        buffer.skip(phase as u64).unwrap();
        buffer.read_unsigned(width, endian).unwrap() == expected
    }

    #[quickcheck]
    fn signed_roundtrip_full_width(value: i64) -> bool {
        let mut channel = BitChannel::new();
        channel.write_signed(value, 64, Endian::Big).unwrap();
        let bytes = channel.close();
        BitBuffer::new(&bytes).read_signed(64, Endian::Big).unwrap() == value
    }
}
