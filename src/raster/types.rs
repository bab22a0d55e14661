//! Core raster description types

use std::fmt;

use crate::tiff::constants::sample_format;
use crate::tiff::errors::{TiffError, TiffResult};

/// How channels are laid out in a multi-channel raster
///
/// The classification happens once, in `RasterSource::describe`, instead of
/// rank checks scattered through call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisOrder {
    /// Channels interleaved per pixel (height x width x channels)
    InterleavedLast,
    /// One plane per channel (channels x height x width)
    ChannelFirst,
    /// A single intensity plane (height x width)
    SingleChannel,
}

impl AxisOrder {
    /// Short axis string in the microscopy convention
    pub fn name(&self) -> &'static str {
        match self {
            AxisOrder::InterleavedLast => "YXS",
            AxisOrder::ChannelFirst => "CYX",
            AxisOrder::SingleChannel => "YX",
        }
    }
}

/// Pixel sample type of a raster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelType {
    U8,
    U16,
    U32,
    F32,
    F64,
}

impl PixelType {
    /// Bytes occupied by one sample
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            PixelType::U8 => 1,
            PixelType::U16 => 2,
            PixelType::U32 | PixelType::F32 => 4,
            PixelType::F64 => 8,
        }
    }

    /// Bits per sample for the TIFF tag
    pub fn bits(&self) -> u16 {
        (self.bytes_per_sample() * 8) as u16
    }

    /// TIFF sample format value
    pub fn sample_format(&self) -> u16 {
        match self {
            PixelType::F32 | PixelType::F64 => sample_format::FLOAT,
            _ => sample_format::UNSIGNED,
        }
    }

    /// Classify from the TIFF BitsPerSample / SampleFormat tags
    pub fn from_tags(bits: u16, format: u16) -> TiffResult<Self> {
        match (bits, format) {
            (8, sample_format::UNSIGNED) => Ok(PixelType::U8),
            (16, sample_format::UNSIGNED) => Ok(PixelType::U16),
            (32, sample_format::UNSIGNED) => Ok(PixelType::U32),
            (32, sample_format::FLOAT) => Ok(PixelType::F32),
            (64, sample_format::FLOAT) => Ok(PixelType::F64),
            _ => Err(TiffError::UnsupportedPixelType(bits, format)),
        }
    }

    /// Name in the OME "Type" attribute convention
    pub fn name(&self) -> &'static str {
        match self {
            PixelType::U8 => "uint8",
            PixelType::U16 => "uint16",
            PixelType::U32 => "uint32",
            PixelType::F32 => "float",
            PixelType::F64 => "double",
        }
    }
}

impl fmt::Display for PixelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Structural description of an open raster
#[derive(Debug, Clone)]
pub struct RasterInfo {
    /// Image height in pixels
    pub height: u64,
    /// Image width in pixels
    pub width: u64,
    /// Number of channels
    pub channel_count: usize,
    /// Channel layout
    pub axis_order: AxisOrder,
    /// Sample type
    pub pixel_type: PixelType,
}

/// Physical pixel size carried as metadata
///
/// Propagated by copy from a source's embedded metadata into every derived
/// artifact; absent when the source lacks it, never fabricated.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PhysicalScale {
    /// Physical size of one pixel along X
    pub pixel_size_x: f64,
    /// Physical size of one pixel along Y
    pub pixel_size_y: f64,
    /// Unit string, typically "um"
    pub unit: String,
}

impl PhysicalScale {
    /// Resolution in pixels per centimeter, when the unit is micrometers
    ///
    /// Used to populate the TIFF resolution tags; other units are carried in
    /// the OME description only.
    pub fn resolution_pixels_per_cm(&self) -> Option<(f64, f64)> {
        if !matches!(self.unit.as_str(), "um" | "µm" | "micron") {
            return None;
        }
        if self.pixel_size_x <= 0.0 || self.pixel_size_y <= 0.0 {
            return None;
        }
        // 1 um = 0.0001 cm
        Some((1.0 / (self.pixel_size_x * 0.0001), 1.0 / (self.pixel_size_y * 0.0001)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_type_tags_round_trip() {
        for pt in [PixelType::U8, PixelType::U16, PixelType::U32, PixelType::F32, PixelType::F64] {
            assert_eq!(PixelType::from_tags(pt.bits(), pt.sample_format()).unwrap(), pt);
        }
    }

    #[test]
    fn test_unsupported_pixel_type() {
        assert!(PixelType::from_tags(1, 1).is_err());
        assert!(PixelType::from_tags(16, 3).is_err());
    }

    #[test]
    fn test_resolution_conversion() {
        let scale = PhysicalScale {
            pixel_size_x: 0.5,
            pixel_size_y: 0.25,
            unit: "um".to_string(),
        };
        let (rx, ry) = scale.resolution_pixels_per_cm().unwrap();
        assert!((rx - 20000.0).abs() < 1e-6);
        assert!((ry - 40000.0).abs() < 1e-6);

        let nm = PhysicalScale { unit: "nm".to_string(), ..scale };
        assert!(nm.resolution_pixels_per_cm().is_none());
    }
}
