//! TIFF format constants
//!
//! This module defines the constants the pipeline touches when reading and
//! writing TIFF/BigTIFF files, replacing magic numbers with descriptive names.

/// TIFF header constants
pub mod header {
    /// Standard TIFF version number (42)
    pub const TIFF_VERSION: u16 = 42;

    /// BigTIFF version number (43)
    pub const BIG_TIFF_VERSION: u16 = 43;

    /// "II" byte order marker for little-endian
    pub const LITTLE_ENDIAN_MARKER: [u8; 2] = [0x49, 0x49];

    /// BigTIFF offset size (8 bytes)
    pub const BIGTIFF_OFFSET_SIZE: u16 = 8;
}

/// Field types as defined in the TIFF spec
pub mod field_types {
    pub const BYTE: u16 = 1;       // 8-bit unsigned integer
    pub const ASCII: u16 = 2;      // 8-bit byte containing ASCII character
    pub const SHORT: u16 = 3;      // 16-bit unsigned integer
    pub const LONG: u16 = 4;       // 32-bit unsigned integer
    pub const RATIONAL: u16 = 5;   // Two LONGs: numerator and denominator
    pub const UNDEFINED: u16 = 7;  // 8-bit byte with unspecified format
    pub const LONG8: u16 = 16;     // BigTIFF 64-bit unsigned integer
    pub const IFD8: u16 = 18;      // BigTIFF 64-bit IFD offset

    /// Size in bytes of one value of the given field type
    pub fn size_of(field_type: u16) -> Option<u64> {
        match field_type {
            BYTE | ASCII | UNDEFINED => Some(1),
            SHORT => Some(2),
            LONG => Some(4),
            RATIONAL => Some(8),
            LONG8 | IFD8 => Some(8),
            _ => None,
        }
    }
}

/// Standard TIFF tags
pub mod tags {
    pub const IMAGE_WIDTH: u16 = 256;                // Width of the image in pixels
    pub const IMAGE_LENGTH: u16 = 257;               // Height of the image in pixels
    pub const BITS_PER_SAMPLE: u16 = 258;            // Bits per component
    pub const COMPRESSION: u16 = 259;                // Compression scheme
    pub const PHOTOMETRIC_INTERPRETATION: u16 = 262; // Color space of image data
    pub const IMAGE_DESCRIPTION: u16 = 270;          // Free-text description (OME-XML lives here)
    pub const STRIP_OFFSETS: u16 = 273;              // Offsets to the data strips
    pub const SAMPLES_PER_PIXEL: u16 = 277;          // Number of components per pixel
    pub const ROWS_PER_STRIP: u16 = 278;             // Rows per strip of data
    pub const STRIP_BYTE_COUNTS: u16 = 279;          // Byte counts for strips
    pub const X_RESOLUTION: u16 = 282;               // Horizontal resolution
    pub const Y_RESOLUTION: u16 = 283;               // Vertical resolution
    pub const PLANAR_CONFIGURATION: u16 = 284;       // How components are stored
    pub const RESOLUTION_UNIT: u16 = 296;            // Unit of measurement for resolution
    pub const SOFTWARE: u16 = 305;                   // Software used to create the image
    pub const TILE_WIDTH: u16 = 322;                 // Width of a tile
    pub const TILE_LENGTH: u16 = 323;                // Length of a tile
    pub const TILE_OFFSETS: u16 = 324;               // Offsets to the data tiles
    pub const TILE_BYTE_COUNTS: u16 = 325;           // Byte counts for tiles
    pub const SAMPLE_FORMAT: u16 = 339;              // Interpretation of sample data
}

/// Compression codes
pub mod compression {
    pub const NONE: u64 = 1;      // No compression
    pub const DEFLATE: u64 = 8;   // Adobe Deflate (zlib)
    pub const ZSTD: u64 = 14;     // Zstandard compression
}

/// Photometric interpretation values
pub mod photometric {
    pub const BLACK_IS_ZERO: u16 = 1; // Single intensity channel, minimum is black
    pub const RGB: u16 = 2;           // RGB color model
}

/// Sample format values
pub mod sample_format {
    pub const UNSIGNED: u16 = 1; // Unsigned integer data
    pub const FLOAT: u16 = 3;    // IEEE floating point data
}

/// Resolution unit values
pub mod resolution_unit {
    pub const NONE: u16 = 1;       // No absolute unit
    pub const INCH: u16 = 2;       // Pixels per inch
    pub const CENTIMETER: u16 = 3; // Pixels per centimeter
}

/// Planar configuration values
pub mod planar_config {
    pub const CHUNKY: u16 = 1; // Components interleaved per pixel
}
