//! Channel extraction (Pass 1)
//!
//! Pulls one channel out of a multi-channel source in horizontal bands and
//! materializes it as an intermediate single-channel raster. Bands are
//! staged on disk, so peak memory is one band regardless of source size.
//!
//! The band height is the configured chunk_rows rounded up to a multiple of
//! the tile edge, which keeps later tile reads from straddling band
//! boundaries in the staged plane. A band that would exceed the configured
//! memory budget is refused up front rather than discovered as an
//! allocation failure mid-run.

use log::info;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{PipelineError, PipelineResult};
use crate::naming;
use crate::pipeline::config::PipelineConfig;
use crate::raster::{PhysicalScale, PixelType, RasterSink, RegionSource, SinkParams, StagingBuffer};
use crate::tiff::DataLayout;
use crate::utils::progress::ProgressTracker;

/// The intermediate raster Pass 1 hands to Pass 2
#[derive(Debug)]
pub struct ExtractedPlane {
    /// Path of the intermediate single-channel file
    pub path: PathBuf,
    pub height: u64,
    pub width: u64,
    pub pixel_type: PixelType,
    /// Number of channels the source had
    pub source_channels: usize,
    /// Conventional name of the extracted channel
    pub channel_name: String,
    /// Physical scale carried from the source
    pub scale: Option<PhysicalScale>,
}

/// Extracts one channel from a source into an intermediate raster
pub struct ChannelExtractor<'a> {
    config: &'a PipelineConfig,
}

impl<'a> ChannelExtractor<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        ChannelExtractor { config }
    }

    /// Run the extraction pass for one source
    ///
    /// # Arguments
    /// * `source` - Open source to read from
    /// * `stem` - Base name for the derived artifacts
    /// * `work_dir` - Directory receiving the staging file and intermediate
    ///
    /// # Returns
    /// A description of the written intermediate raster
    pub fn extract(
        &self,
        source: &mut dyn RegionSource,
        stem: &str,
        work_dir: &Path,
    ) -> PipelineResult<ExtractedPlane> {
        let info = source.info().clone();
        let channel = self.config.channel;

        // Fail fast, before any output exists for this file
        if channel >= info.channel_count {
            return Err(PipelineError::InvalidChannel {
                requested: channel,
                available: info.channel_count,
            });
        }

        let band_rows = self.config.band_rows();
        let pixel_bytes = info.pixel_type.bytes_per_sample();
        let band_bytes = band_rows.min(info.height) * info.width * pixel_bytes as u64;
        if band_bytes > self.config.max_band_bytes {
            return Err(PipelineError::InsufficientMemory(format!(
                "A {}-row band of a {}-pixel-wide plane needs {} bytes, budget is {}",
                band_rows.min(info.height), info.width, band_bytes, self.config.max_band_bytes
            )));
        }

        let channel_name = naming::channel_name(channel);
        let scale = source.physical_scale().cloned();
        fs::create_dir_all(work_dir)?;
        let staging_path = work_dir.join(naming::staging_name(stem, &channel_name));
        let intermediate_path = work_dir.join(naming::intermediate_name(stem, &channel_name));

        info!("Extracting channel {} ({}) of {}x{} plane in {}-row bands",
              channel, channel_name, info.height, info.width, band_rows);

        // Staging file is removed when the buffer drops, on every path
        let mut staging = StagingBuffer::create(&staging_path, info.height, info.width, pixel_bytes)?;

        let band_count = (info.height + band_rows - 1) / band_rows;
        let progress = ProgressTracker::new(band_count, &format!("extract {}", stem));

        let mut row0 = 0;
        while row0 < info.height {
            let rows = band_rows.min(info.height - row0);
            let band = source
                .read_region(Some(channel), row0..row0 + rows, 0..info.width)
                .map_err(|e| match e {
                    PipelineError::InvalidChannel { .. } => e,
                    other => PipelineError::Extraction(format!(
                        "Band at row {} of {}: {}", row0, stem, other
                    )),
                })?;
            staging.write_band(row0, rows, &band)?;
            progress.increment(1);
            row0 += rows;
        }
        progress.finish("extracted");

        let params = SinkParams {
            compression: self.config.compression_code()?,
            big_tiff: self.config.big_tiff_intermediate,
            layout: DataLayout::Tiled { edge: self.config.tile_edge as u32 },
            channel_name: channel_name.clone(),
            scale: scale.clone(),
        };

        let written = RasterSink::write_single_channel(
            &intermediate_path,
            info.height,
            info.width,
            info.pixel_type,
            &mut staging,
            &params,
        );
        if let Err(e) = written {
            // Do not leave a partial intermediate behind
            let _ = fs::remove_file(&intermediate_path);
            return Err(PipelineError::Extraction(format!(
                "Writing intermediate {}: {}", intermediate_path.display(), e
            )));
        }

        info!("Wrote intermediate {}", intermediate_path.display());
        Ok(ExtractedPlane {
            path: intermediate_path,
            height: info.height,
            width: info.width,
            pixel_type: info.pixel_type,
            source_channels: info.channel_count,
            channel_name,
            scale,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{AxisOrder, RasterInfo};
    use std::ops::Range;
    use tempfile::tempdir;

    /// Synthetic source that records every read it serves
    struct RecordingSource {
        info: RasterInfo,
        reads: Vec<(Range<u64>, Range<u64>)>,
    }

    impl RecordingSource {
        fn new(height: u64, width: u64, channels: usize) -> Self {
            RecordingSource {
                info: RasterInfo {
                    height,
                    width,
                    channel_count: channels,
                    axis_order: AxisOrder::InterleavedLast,
                    pixel_type: PixelType::U16,
                },
                reads: Vec::new(),
            }
        }
    }

    impl RegionSource for RecordingSource {
        fn info(&self) -> &RasterInfo {
            &self.info
        }

        fn physical_scale(&self) -> Option<&PhysicalScale> {
            None
        }

        fn read_region(
            &mut self,
            _channel: Option<usize>,
            rows: Range<u64>,
            cols: Range<u64>,
        ) -> PipelineResult<Vec<u8>> {
            let bytes = (rows.end - rows.start) * (cols.end - cols.start) * 2;
            self.reads.push((rows, cols));
            Ok(vec![7u8; bytes as usize])
        }
    }

    fn test_config(tile_edge: u64, chunk_rows: u64) -> PipelineConfig {
        let mut config = PipelineConfig::new("in".into(), "out".into());
        config.tile_edge = tile_edge;
        config.chunk_rows = chunk_rows;
        config
    }

    #[test]
    fn test_reads_are_band_sized_and_cover_plane() {
        let dir = tempdir().unwrap();
        let config = test_config(64, 100);
        let mut source = RecordingSource::new(300, 50, 3);

        let plane = ChannelExtractor::new(&config)
            .extract(&mut source, "img", dir.path())
            .unwrap();
        assert!(plane.path.exists());
        assert_eq!(plane.source_channels, 3);

        // 100 rounds up to 128; bands are 128, 128, 44
        let rows: Vec<_> = source.reads.iter().map(|(r, _)| (r.start, r.end)).collect();
        assert_eq!(rows, vec![(0, 128), (128, 256), (256, 300)]);
        assert!(source.reads.iter().all(|(_, c)| c.start == 0 && c.end == 50));
    }

    #[test]
    fn test_invalid_channel_fails_before_output() {
        let dir = tempdir().unwrap();
        let mut config = test_config(64, 64);
        config.channel = 5;
        let mut source = RecordingSource::new(100, 50, 3);

        let err = ChannelExtractor::new(&config)
            .extract(&mut source, "img", dir.path())
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidChannel { requested: 5, available: 3 }));
        assert!(source.reads.is_empty());
        assert!(!dir.path().join("img_ch5.tif").exists());
    }

    #[test]
    fn test_memory_budget_enforced() {
        let dir = tempdir().unwrap();
        let mut config = test_config(64, 64);
        config.max_band_bytes = 1024;
        let mut source = RecordingSource::new(10000, 10000, 3);

        let err = ChannelExtractor::new(&config)
            .extract(&mut source, "img", dir.path())
            .unwrap_err();
        assert!(matches!(err, PipelineError::InsufficientMemory(_)));
        assert!(source.reads.is_empty());
    }

    #[test]
    fn test_staging_file_removed_after_success() {
        let dir = tempdir().unwrap();
        let config = test_config(32, 32);
        let mut source = RecordingSource::new(64, 64, 3);

        ChannelExtractor::new(&config)
            .extract(&mut source, "img", dir.path())
            .unwrap();
        assert!(!dir.path().join("img_green.staging").exists());
        assert!(dir.path().join("img_green.tif").exists());
    }
}
