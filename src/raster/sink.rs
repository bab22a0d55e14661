//! Single-channel raster output
//!
//! Thin layer over the TIFF writer that fills in the conventions every
//! derived raster shares: grayscale photometric interpretation, an OME-XML
//! description naming the channel, and resolution tags carried over from the
//! source's physical scale.

use std::path::Path;

use crate::errors::PipelineResult;
use crate::raster::ome;
use crate::raster::types::{PhysicalScale, PixelType};
use crate::tiff::constants::photometric;
use crate::tiff::{DataLayout, PixelProvider, TiffWriteOptions, TiffWriter};

/// Shared parameters for the single-channel rasters a run produces
#[derive(Debug, Clone)]
pub struct SinkParams {
    /// TIFF compression code
    pub compression: u64,
    /// Write BigTIFF instead of classic TIFF
    pub big_tiff: bool,
    /// Tile or strip organization of the output
    pub layout: DataLayout,
    /// Channel name recorded in the OME description
    pub channel_name: String,
    /// Physical pixel size to propagate, when the source had one
    pub scale: Option<PhysicalScale>,
}

/// Writes single-channel rasters with the pipeline's metadata conventions
pub struct RasterSink;

impl RasterSink {
    /// Write one grayscale raster, pulling pixels from the provider
    ///
    /// # Returns
    /// The number of bytes written to the file
    pub fn write_single_channel(
        path: &Path,
        height: u64,
        width: u64,
        pixel_type: PixelType,
        provider: &mut dyn PixelProvider,
        params: &SinkParams,
    ) -> PipelineResult<u64> {
        let description = ome::single_channel_description(
            width,
            height,
            pixel_type,
            &params.channel_name,
            params.scale.as_ref(),
        );

        let options = TiffWriteOptions {
            big_tiff: params.big_tiff,
            compression: params.compression,
            photometric: photometric::BLACK_IS_ZERO,
            layout: params.layout,
            description: Some(description),
            resolution_cm: params.scale.as_ref().and_then(|s| s.resolution_pixels_per_cm()),
        };

        let bytes = TiffWriter::write_raster(
            path,
            height,
            width,
            1,
            pixel_type.bits(),
            pixel_type.sample_format(),
            provider,
            &options,
        )?;
        Ok(bytes)
    }
}
