//! Byte order handling for TIFF files
//!
//! TIFF files declare their endianness in the first two header bytes.
//! All multi-byte values in the file, including IFD entries and inline
//! tag values, must then be decoded in that order.

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use std::io::Result;

use crate::io::seekable::SeekableReader;
use crate::tiff::errors::{TiffError, TiffResult};

/// Represents the byte order of a TIFF file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Little-endian byte order (II)
    LittleEndian,
    /// Big-endian byte order (MM)
    BigEndian,
}

impl ByteOrder {
    /// Detects the byte order from the first two bytes of a TIFF header
    pub fn detect(reader: &mut dyn SeekableReader) -> TiffResult<Self> {
        let marker = reader.read_u16::<LittleEndian>()?;
        match marker {
            0x4949 => Ok(ByteOrder::LittleEndian), // "II" (Intel)
            0x4D4D => Ok(ByteOrder::BigEndian),    // "MM" (Motorola)
            _ => Err(TiffError::InvalidByteOrder(marker)),
        }
    }

    /// Returns a string representation of this byte order
    pub fn name(&self) -> &'static str {
        match self {
            ByteOrder::LittleEndian => "Little Endian (II)",
            ByteOrder::BigEndian => "Big Endian (MM)",
        }
    }

    /// Read a u16 value in this byte order
    pub fn read_u16(&self, reader: &mut dyn SeekableReader) -> Result<u16> {
        match self {
            ByteOrder::LittleEndian => reader.read_u16::<LittleEndian>(),
            ByteOrder::BigEndian => reader.read_u16::<BigEndian>(),
        }
    }

    /// Read a u32 value in this byte order
    pub fn read_u32(&self, reader: &mut dyn SeekableReader) -> Result<u32> {
        match self {
            ByteOrder::LittleEndian => reader.read_u32::<LittleEndian>(),
            ByteOrder::BigEndian => reader.read_u32::<BigEndian>(),
        }
    }

    /// Read a u64 value in this byte order
    pub fn read_u64(&self, reader: &mut dyn SeekableReader) -> Result<u64> {
        match self {
            ByteOrder::LittleEndian => reader.read_u64::<LittleEndian>(),
            ByteOrder::BigEndian => reader.read_u64::<BigEndian>(),
        }
    }

    /// Read a rational value (numerator/denominator pair of u32)
    pub fn read_rational(&self, reader: &mut dyn SeekableReader) -> Result<(u32, u32)> {
        let numerator = self.read_u32(reader)?;
        let denominator = self.read_u32(reader)?;
        Ok((numerator, denominator))
    }

    /// Decode a u16 from a byte slice in this byte order
    pub fn u16_from_bytes(&self, bytes: &[u8]) -> u16 {
        match self {
            ByteOrder::LittleEndian => u16::from_le_bytes([bytes[0], bytes[1]]),
            ByteOrder::BigEndian => u16::from_be_bytes([bytes[0], bytes[1]]),
        }
    }

    /// Decode a u32 from a byte slice in this byte order
    pub fn u32_from_bytes(&self, bytes: &[u8]) -> u32 {
        match self {
            ByteOrder::LittleEndian => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            ByteOrder::BigEndian => u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        }
    }

    /// Decode a u64 from a byte slice in this byte order
    pub fn u64_from_bytes(&self, bytes: &[u8]) -> u64 {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&bytes[..8]);
        match self {
            ByteOrder::LittleEndian => u64::from_le_bytes(buf),
            ByteOrder::BigEndian => u64::from_be_bytes(buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;
    use std::io::Cursor;

    #[test]
    fn test_detect_little_endian() {
        let mut buffer = Vec::new();
        buffer.write_u16::<LittleEndian>(0x4949).unwrap(); // II
        let mut cursor = Cursor::new(buffer);

        let result = ByteOrder::detect(&mut cursor);
        assert!(result.is_ok());
        assert_eq!(result.unwrap(), ByteOrder::LittleEndian);
    }

    #[test]
    fn test_detect_big_endian() {
        let mut buffer = Vec::new();
        buffer.write_u16::<BigEndian>(0x4D4D).unwrap(); // MM
        let mut cursor = Cursor::new(buffer);

        let result = ByteOrder::detect(&mut cursor);
        assert!(result.is_ok());
        assert_eq!(result.unwrap(), ByteOrder::BigEndian);
    }

    #[test]
    fn test_detect_invalid_marker() {
        let mut buffer = Vec::new();
        buffer.write_u16::<LittleEndian>(0x1234).unwrap();
        let mut cursor = Cursor::new(buffer);

        assert!(ByteOrder::detect(&mut cursor).is_err());
    }

    #[test]
    fn test_typed_reads() {
        let mut buffer = Vec::new();
        buffer.write_u16::<BigEndian>(0x1234).unwrap();
        buffer.write_u32::<BigEndian>(0x12345678).unwrap();
        buffer.write_u64::<BigEndian>(0x1234567890ABCDEF).unwrap();
        let mut cursor = Cursor::new(buffer);

        let order = ByteOrder::BigEndian;
        assert_eq!(order.read_u16(&mut cursor).unwrap(), 0x1234);
        assert_eq!(order.read_u32(&mut cursor).unwrap(), 0x12345678);
        assert_eq!(order.read_u64(&mut cursor).unwrap(), 0x1234567890ABCDEF);
    }

    #[test]
    fn test_from_bytes() {
        let order = ByteOrder::LittleEndian;
        assert_eq!(order.u16_from_bytes(&[0x34, 0x12]), 0x1234);
        assert_eq!(order.u32_from_bytes(&[0x78, 0x56, 0x34, 0x12]), 0x12345678);
    }
}
