//! Low-level wire format reader.

use std::fmt;

use crate::error::WireError;

/// Longest valid varint encoding of a 64-bit value.
pub const MAX_VARINT_LEN: usize = 10;

/// Protobuf wire types understood by the decoder.
///
/// Groups (3 and 4) are deprecated and never show up in tracker payloads;
/// they are reported as unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireType {
    Varint,
    Fixed64,
    LengthDelimited,
    Fixed32,
}

impl WireType {
    pub fn from_tag_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(WireType::Varint),
            1 => Some(WireType::Fixed64),
            2 => Some(WireType::LengthDelimited),
            5 => Some(WireType::Fixed32),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            WireType::Varint => 0,
            WireType::Fixed64 => 1,
            WireType::LengthDelimited => 2,
            WireType::Fixed32 => 5,
        }
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WireType::Varint => "varint",
            WireType::Fixed64 => "fixed64",
            WireType::LengthDelimited => "length-delimited",
            WireType::Fixed32 => "fixed32",
        };
        f.write_str(name)
    }
}

/// Cursor over a protobuf byte stream.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn exhausted(&self, needed: usize) -> WireError {
        WireError::Exhausted {
            offset: self.pos,
            needed,
            available: self.remaining(),
        }
    }

    /// Read a base-128 varint (7 bits per byte, least significant group
    /// first, high bit set on every byte but the last).
    pub fn read_varint(&mut self) -> Result<u64, WireError> {
        let start = self.pos;
        let mut value: u64 = 0;

        for i in 0..MAX_VARINT_LEN {
            let byte = *self.buf.get(self.pos).ok_or_else(|| self.exhausted(1))?;
            self.pos += 1;

            // The tenth byte only has room for the top bit of a u64.
            value |= u64::from(byte & 0x7f).wrapping_shl(7 * i as u32);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }

        Err(WireError::VarintOverflow { offset: start })
    }

    /// Read a little-endian unsigned 32-bit value.
    pub fn read_fixed32(&mut self) -> Result<u32, WireError> {
        let bytes = self.read_slice(4)?;
        let mut raw = [0u8; 4];
        raw.copy_from_slice(bytes);
        Ok(u32::from_le_bytes(raw))
    }

    /// Read a little-endian unsigned 64-bit value.
    pub fn read_fixed64(&mut self) -> Result<u64, WireError> {
        let bytes = self.read_slice(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(raw))
    }

    /// Borrow the next `len` bytes and advance past them.
    pub fn read_slice(&mut self, len: usize) -> Result<&'a [u8], WireError> {
        if len > self.remaining() {
            return Err(self.exhausted(len));
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Read a field tag, returning `(field_number, wire_type)`.
    pub fn read_tag(&mut self) -> Result<(u64, WireType), WireError> {
        let offset = self.pos;
        let tag = self.read_varint()?;
        let field_number = tag >> 3;
        let bits = (tag & 0x07) as u8;

        if field_number == 0 {
            return Err(WireError::InvalidFieldNumber { offset });
        }
        let wire_type = WireType::from_tag_bits(bits).ok_or(WireError::UnknownWireType {
            wire_type: bits,
            offset,
        })?;

        Ok((field_number, wire_type))
    }
}

/// Append the varint encoding of `value` to `out`.
pub fn encode_varint(mut value: u64, out: &mut Vec<u8>) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_single_byte_varint() {
        let mut reader = WireReader::new(&[0x08]);
        assert_eq!(reader.read_varint(), Ok(8));
        assert!(reader.is_empty());
    }

    #[test]
    fn test_multi_byte_varint() {
        // 300 = 0b1_0010_1100
        let mut reader = WireReader::new(&[0xac, 0x02]);
        assert_eq!(reader.read_varint(), Ok(300));
    }

    #[test]
    fn test_varint_beyond_32_bits() {
        let mut buf = Vec::new();
        encode_varint(1 << 40, &mut buf);
        let mut reader = WireReader::new(&buf);
        assert_eq!(reader.read_varint(), Ok(1 << 40));
    }

    #[test]
    fn test_truncated_varint() {
        let mut reader = WireReader::new(&[0x80, 0x80]);
        assert!(matches!(
            reader.read_varint(),
            Err(WireError::Exhausted { offset: 2, .. })
        ));
    }

    #[test]
    fn test_overlong_varint() {
        let mut reader = WireReader::new(&[0xff; 11]);
        assert_eq!(
            reader.read_varint(),
            Err(WireError::VarintOverflow { offset: 0 })
        );
    }

    #[test]
    fn test_fixed_width() {
        let mut reader = WireReader::new(&[0x01, 0x00, 0x00, 0x00, 0x02, 0, 0, 0, 0, 0, 0, 0x01]);
        assert_eq!(reader.read_fixed32(), Ok(1));
        assert_eq!(reader.read_fixed64(), Ok((1u64 << 56) | 2));
    }

    #[test]
    fn test_read_tag() {
        // field 1, length-delimited
        let mut reader = WireReader::new(&[0x0a]);
        assert_eq!(reader.read_tag(), Ok((1, WireType::LengthDelimited)));

        // field 1, wire type 7
        let mut reader = WireReader::new(&[0x0f]);
        assert_eq!(
            reader.read_tag(),
            Err(WireError::UnknownWireType {
                wire_type: 7,
                offset: 0
            })
        );

        let mut reader = WireReader::new(&[0x00]);
        assert_eq!(
            reader.read_tag(),
            Err(WireError::InvalidFieldNumber { offset: 0 })
        );
    }

    proptest! {
        #[test]
        fn prop_varint_round_trip(n in any::<u64>()) {
            let mut buf = Vec::new();
            encode_varint(n, &mut buf);
            prop_assert!(buf.len() <= MAX_VARINT_LEN);
            let mut reader = WireReader::new(&buf);
            prop_assert_eq!(reader.read_varint(), Ok(n));
            prop_assert!(reader.is_empty());
        }
    }
}
