//! Image File Directory (IFD) structures and methods
//!
//! An IFD is a collection of tag entries describing one raster plane in a
//! TIFF file. The pipeline mostly works against the first IFD, but keeps the
//! whole chain around for channel-first sources where each plane is its own
//! directory.

use std::collections::HashMap;

use crate::tiff::constants::{field_types, tags};

/// Represents an entry in an Image File Directory
///
/// Each entry describes one aspect of the image (dimensions, compression,
/// tile geometry, etc.) using a tag-value pair. Small values are stored
/// inline in the entry; larger values live at `value_offset` in the file.
#[derive(Debug, Clone)]
pub struct IFDEntry {
    /// TIFF tag identifier
    pub tag: u16,
    /// Field type
    pub field_type: u16,
    /// Number of values
    pub count: u64,
    /// Value (when inline) or offset to the values
    pub value_offset: u64,
    /// Raw inline value bytes, in file byte order
    ///
    /// Inline arrays (for instance two SHORTs in a classic entry) cannot be
    /// reconstructed from the decoded `value_offset` alone, so the raw bytes
    /// are kept as read.
    pub inline_bytes: [u8; 8],
}

impl IFDEntry {
    /// Size in bytes of one value of this entry's field type
    pub fn field_type_size(&self) -> u64 {
        field_types::size_of(self.field_type).unwrap_or(1)
    }

    /// Determines if the value is stored inline in the entry
    /// rather than at the offset location
    pub fn is_value_inline(&self, is_big_tiff: bool) -> bool {
        let inline_capacity = if is_big_tiff { 8 } else { 4 };
        self.field_type_size() * self.count <= inline_capacity
    }
}

/// Represents an Image File Directory in a TIFF file
#[derive(Debug, Clone, Default)]
pub struct IFD {
    /// Entries in this IFD, in file order
    pub entries: Vec<IFDEntry>,
    /// IFD number (0-based)
    pub number: usize,
    /// Offset to this IFD in the file
    pub offset: u64,
    /// Tag lookup cache
    tag_map: HashMap<u16, usize>,
}

impl IFD {
    /// Creates a new empty IFD with the given index and file offset
    pub fn new(number: usize, offset: u64) -> Self {
        IFD {
            entries: Vec::new(),
            number,
            offset,
            tag_map: HashMap::new(),
        }
    }

    /// Adds an entry and updates the tag lookup cache
    pub fn add_entry(&mut self, entry: IFDEntry) {
        self.tag_map.insert(entry.tag, self.entries.len());
        self.entries.push(entry);
    }

    /// Returns the entry for a tag, if present
    pub fn get_entry(&self, tag: u16) -> Option<&IFDEntry> {
        self.tag_map.get(&tag).map(|&i| &self.entries[i])
    }

    /// Returns true if the IFD contains the given tag
    pub fn has_tag(&self, tag: u16) -> bool {
        self.tag_map.contains_key(&tag)
    }

    /// Returns the scalar value of a tag, if present and inline
    ///
    /// This is the common path for single-valued tags like dimensions,
    /// compression or samples per pixel.
    pub fn get_tag_value(&self, tag: u16) -> Option<u64> {
        self.get_entry(tag).map(|e| e.value_offset)
    }

    /// Image dimensions as (width, height), if present
    pub fn get_dimensions(&self) -> Option<(u64, u64)> {
        let width = self.get_tag_value(tags::IMAGE_WIDTH)?;
        let height = self.get_tag_value(tags::IMAGE_LENGTH)?;
        Some((width, height))
    }

    /// Number of samples (channels) per pixel, defaulting to 1
    pub fn get_samples_per_pixel(&self) -> u64 {
        self.get_tag_value(tags::SAMPLES_PER_PIXEL).unwrap_or(1)
    }

    /// Compression code, defaulting to uncompressed
    pub fn get_compression(&self) -> u64 {
        self.get_tag_value(tags::COMPRESSION).unwrap_or(1)
    }

    /// Tile dimensions as (width, height) when this IFD uses a tiled layout
    pub fn get_tile_dimensions(&self) -> Option<(u64, u64)> {
        let tile_width = self.get_tag_value(tags::TILE_WIDTH)?;
        let tile_height = self.get_tag_value(tags::TILE_LENGTH)?;
        Some((tile_width, tile_height))
    }

    /// True when image data is organized as tiles rather than strips
    pub fn is_tiled(&self) -> bool {
        self.has_tag(tags::TILE_OFFSETS) && self.has_tag(tags::TILE_WIDTH)
    }

    /// Rows per strip for strip-organized data, defaulting to the whole image
    pub fn get_rows_per_strip(&self) -> u64 {
        self.get_tag_value(tags::ROWS_PER_STRIP)
            .unwrap_or_else(|| self.get_tag_value(tags::IMAGE_LENGTH).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(tag: u16, field_type: u16, count: u64, value: u64) -> IFDEntry {
        IFDEntry {
            tag,
            field_type,
            count,
            value_offset: value,
            inline_bytes: [0u8; 8],
        }
    }

    #[test]
    fn test_dimensions_lookup() {
        let mut ifd = IFD::new(0, 8);
        ifd.add_entry(entry(tags::IMAGE_WIDTH, field_types::LONG, 1, 640));
        ifd.add_entry(entry(tags::IMAGE_LENGTH, field_types::LONG, 1, 480));

        assert_eq!(ifd.get_dimensions(), Some((640, 480)));
        assert_eq!(ifd.get_samples_per_pixel(), 1);
        assert!(!ifd.is_tiled());
    }

    #[test]
    fn test_inline_value_threshold() {
        let small = entry(tags::BITS_PER_SAMPLE, field_types::SHORT, 2, 0);
        assert!(small.is_value_inline(false));

        let large = entry(tags::BITS_PER_SAMPLE, field_types::SHORT, 3, 0);
        assert!(!large.is_value_inline(false));
        assert!(large.is_value_inline(true));
    }

    #[test]
    fn test_tiled_classification() {
        let mut ifd = IFD::new(0, 8);
        ifd.add_entry(entry(tags::TILE_WIDTH, field_types::SHORT, 1, 256));
        ifd.add_entry(entry(tags::TILE_LENGTH, field_types::SHORT, 1, 256));
        ifd.add_entry(entry(tags::TILE_OFFSETS, field_types::LONG, 4, 1024));

        assert!(ifd.is_tiled());
        assert_eq!(ifd.get_tile_dimensions(), Some((256, 256)));
    }
}
