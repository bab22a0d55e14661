//! TIFF file reader implementation
//!
//! Reads classic TIFF and BigTIFF headers and IFD chains in either byte
//! order. Decoding of the actual pixel data is layered on top in the raster
//! module; this reader only walks the directory structure and serves tag
//! values.

use log::{debug, warn};
use std::io::SeekFrom;

use crate::io::byte_order::ByteOrder;
use crate::io::seekable::SeekableReader;
use crate::tiff::constants::{field_types, header};
use crate::tiff::errors::{TiffError, TiffResult};
use crate::tiff::ifd::{IFDEntry, IFD};

/// Parsed structural view of a TIFF file
#[derive(Debug)]
pub struct TiffFile {
    /// Image File Directories in the file, in chain order
    pub ifds: Vec<IFD>,
    /// Whether this is a BigTIFF format file
    pub is_big_tiff: bool,
    /// Byte order declared in the header
    pub byte_order: ByteOrder,
}

impl TiffFile {
    /// Returns the main (first) IFD if available
    pub fn main_ifd(&self) -> Option<&IFD> {
        self.ifds.first()
    }

    /// Returns the number of IFDs in the file
    pub fn ifd_count(&self) -> usize {
        self.ifds.len()
    }
}

/// Reader for TIFF and BigTIFF files
pub struct TiffReader {
    byte_order: ByteOrder,
    is_big_tiff: bool,
}

// Reasonable limit to prevent infinite IFD chains in corrupt files
const MAX_IFDS: usize = 100;

impl TiffReader {
    /// Creates a new TIFF reader
    pub fn new() -> Self {
        TiffReader {
            byte_order: ByteOrder::LittleEndian,
            is_big_tiff: false,
        }
    }

    /// Reads the TIFF structure from the given reader
    ///
    /// This handles the core process of reading a TIFF file:
    /// 1. Detect byte order (little/big endian)
    /// 2. Check for TIFF or BigTIFF format
    /// 3. Read all IFDs in the chain
    ///
    /// # Arguments
    /// * `reader` - Any struct implementing the SeekableReader trait
    ///
    /// # Returns
    /// A TiffFile structure describing the file's directories
    pub fn read(&mut self, reader: &mut dyn SeekableReader) -> TiffResult<TiffFile> {
        reader.seek(SeekFrom::Start(0))?;
        self.byte_order = ByteOrder::detect(reader)?;
        debug!("Detected byte order: {}", self.byte_order.name());

        let version = self.byte_order.read_u16(reader)?;
        let first_ifd_offset = match version {
            header::TIFF_VERSION => {
                self.is_big_tiff = false;
                self.byte_order.read_u32(reader)? as u64
            }
            header::BIG_TIFF_VERSION => {
                self.is_big_tiff = true;
                let offset_size = self.byte_order.read_u16(reader)?;
                let reserved = self.byte_order.read_u16(reader)?;
                if offset_size != header::BIGTIFF_OFFSET_SIZE || reserved != 0 {
                    return Err(TiffError::InvalidBigTiffHeader);
                }
                self.byte_order.read_u64(reader)?
            }
            other => return Err(TiffError::UnsupportedVersion(other)),
        };

        let file_size = file_size(reader)?;
        if first_ifd_offset == 0 || first_ifd_offset >= file_size {
            return Err(TiffError::GenericError(format!(
                "First IFD offset {} is outside the file ({} bytes)",
                first_ifd_offset, file_size
            )));
        }

        let ifds = self.read_ifd_chain(reader, first_ifd_offset, file_size)?;
        debug!("Read {} IFDs ({})", ifds.len(), if self.is_big_tiff { "BigTIFF" } else { "TIFF" });

        Ok(TiffFile {
            ifds,
            is_big_tiff: self.is_big_tiff,
            byte_order: self.byte_order,
        })
    }

    /// Reads a chain of IFDs starting from the given offset
    fn read_ifd_chain(
        &self,
        reader: &mut dyn SeekableReader,
        first_ifd_offset: u64,
        file_size: u64,
    ) -> TiffResult<Vec<IFD>> {
        let mut ifds = Vec::new();
        let mut ifd_offset = first_ifd_offset;
        let mut ifd_number = 0;

        while ifd_offset != 0 && ifd_number < MAX_IFDS {
            if ifd_offset >= file_size {
                warn!("IFD offset {} exceeds file size {}, stopping IFD chain",
                      ifd_offset, file_size);
                break;
            }

            let (ifd, next_offset) = self.read_ifd(reader, ifd_offset, ifd_number)?;
            ifds.push(ifd);
            ifd_offset = next_offset;
            ifd_number += 1;
        }

        if ifds.is_empty() {
            return Err(TiffError::GenericError("No IFDs found in file".to_string()));
        }
        Ok(ifds)
    }

    /// Reads a single IFD and the offset of its successor
    fn read_ifd(
        &self,
        reader: &mut dyn SeekableReader,
        offset: u64,
        number: usize,
    ) -> TiffResult<(IFD, u64)> {
        reader.seek(SeekFrom::Start(offset))?;

        let entry_count = if self.is_big_tiff {
            self.byte_order.read_u64(reader)?
        } else {
            self.byte_order.read_u16(reader)? as u64
        };

        if entry_count > 10_000 {
            return Err(TiffError::GenericError(format!(
                "Implausible IFD entry count {} at offset {}", entry_count, offset
            )));
        }

        let mut ifd = IFD::new(number, offset);
        for _ in 0..entry_count {
            let entry = self.read_entry(reader)?;
            ifd.add_entry(entry);
        }

        let next_offset = if self.is_big_tiff {
            self.byte_order.read_u64(reader)?
        } else {
            self.byte_order.read_u32(reader)? as u64
        };

        Ok((ifd, next_offset))
    }

    /// Reads a single IFD entry
    ///
    /// The value area is 4 bytes in classic TIFF and 8 in BigTIFF. When the
    /// value fits inline it is left-justified in that area, so the scalar is
    /// decoded at the width of the field type rather than the full area.
    fn read_entry(&self, reader: &mut dyn SeekableReader) -> TiffResult<IFDEntry> {
        let tag = self.byte_order.read_u16(reader)?;
        let field_type = self.byte_order.read_u16(reader)?;
        let count = if self.is_big_tiff {
            self.byte_order.read_u64(reader)?
        } else {
            self.byte_order.read_u32(reader)? as u64
        };

        let area = if self.is_big_tiff { 8 } else { 4 };
        let mut inline_bytes = [0u8; 8];
        std::io::Read::read_exact(reader, &mut inline_bytes[..area])?;

        let type_size = field_types::size_of(field_type).unwrap_or(1);
        let fits_inline = type_size * count <= area as u64;

        let value_offset = if fits_inline {
            match type_size {
                1 => inline_bytes[0] as u64,
                2 => self.byte_order.u16_from_bytes(&inline_bytes) as u64,
                4 => self.byte_order.u32_from_bytes(&inline_bytes) as u64,
                _ => self.byte_order.u64_from_bytes(&inline_bytes),
            }
        } else if self.is_big_tiff {
            self.byte_order.u64_from_bytes(&inline_bytes)
        } else {
            self.byte_order.u32_from_bytes(&inline_bytes) as u64
        };

        Ok(IFDEntry {
            tag,
            field_type,
            count,
            value_offset,
            inline_bytes,
        })
    }
}

impl Default for TiffReader {
    fn default() -> Self {
        TiffReader::new()
    }
}

/// Returns the total size of the underlying stream, preserving the position
pub fn file_size(reader: &mut dyn SeekableReader) -> TiffResult<u64> {
    let position = reader.stream_position()?;
    let size = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(position))?;
    Ok(size)
}

/// Reads all values of a tag entry as unsigned integers
///
/// Handles both inline values and values stored at an external offset.
/// RATIONAL values are not meaningful through this accessor; use
/// [`read_tag_rational`] for those.
pub fn read_tag_values(
    reader: &mut dyn SeekableReader,
    file: &TiffFile,
    entry: &IFDEntry,
) -> TiffResult<Vec<u64>> {
    let type_size = field_types::size_of(entry.field_type)
        .ok_or(TiffError::UnsupportedFieldType(entry.field_type))?;
    let order = file.byte_order;

    let raw = read_tag_bytes(reader, file, entry)?;
    let mut values = Vec::with_capacity(entry.count as usize);
    for i in 0..entry.count as usize {
        let chunk = &raw[i * type_size as usize..];
        let value = match entry.field_type {
            field_types::BYTE | field_types::ASCII | field_types::UNDEFINED => chunk[0] as u64,
            field_types::SHORT => order.u16_from_bytes(chunk) as u64,
            field_types::LONG => order.u32_from_bytes(chunk) as u64,
            field_types::LONG8 | field_types::IFD8 => order.u64_from_bytes(chunk),
            other => return Err(TiffError::UnsupportedFieldType(other)),
        };
        values.push(value);
    }
    Ok(values)
}

/// Reads an ASCII tag value as a string, trimming the trailing NUL
pub fn read_tag_ascii(
    reader: &mut dyn SeekableReader,
    file: &TiffFile,
    entry: &IFDEntry,
) -> TiffResult<String> {
    let raw = read_tag_bytes(reader, file, entry)?;
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
}

/// Reads the first RATIONAL value of a tag as (numerator, denominator)
pub fn read_tag_rational(
    reader: &mut dyn SeekableReader,
    file: &TiffFile,
    entry: &IFDEntry,
) -> TiffResult<(u32, u32)> {
    if entry.field_type != field_types::RATIONAL {
        return Err(TiffError::UnsupportedFieldType(entry.field_type));
    }
    let raw = read_tag_bytes(reader, file, entry)?;
    if raw.len() < 8 {
        return Err(TiffError::GenericError("Truncated RATIONAL value".to_string()));
    }
    let order = file.byte_order;
    Ok((order.u32_from_bytes(&raw[0..4]), order.u32_from_bytes(&raw[4..8])))
}

/// Reads the raw value bytes of a tag entry, inline or external
fn read_tag_bytes(
    reader: &mut dyn SeekableReader,
    file: &TiffFile,
    entry: &IFDEntry,
) -> TiffResult<Vec<u8>> {
    let type_size = field_types::size_of(entry.field_type)
        .ok_or(TiffError::UnsupportedFieldType(entry.field_type))?;
    let total = type_size
        .checked_mul(entry.count)
        .ok_or_else(|| TiffError::GenericError("Tag value size overflow".to_string()))?;

    if total > 64 * 1024 * 1024 {
        return Err(TiffError::GenericError(format!(
            "Tag {} value is implausibly large ({} bytes)", entry.tag, total
        )));
    }

    if entry.is_value_inline(file.is_big_tiff) {
        Ok(entry.inline_bytes[..total as usize].to_vec())
    } else {
        reader.seek(SeekFrom::Start(entry.value_offset))?;
        let mut buffer = vec![0u8; total as usize];
        std::io::Read::read_exact(reader, &mut buffer)?;
        Ok(buffer)
    }
}
