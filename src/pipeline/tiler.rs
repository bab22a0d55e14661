//! Tile grid writing (Pass 2)
//!
//! Reads the intermediate single-channel raster tile by tile and writes
//! each tile as its own small file. Tiles are independent by construction:
//! a failed read or write marks that one tile as failed in the manifest and
//! the pass moves on, so one bad tile never costs the other tiles of a
//! multi-hour run.

use log::{info, warn};
use std::fs;
use std::path::Path;

use crate::errors::{PipelineError, PipelineResult};
use crate::grid::{self, TileSpec};
use crate::naming;
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::extractor::ExtractedPlane;
use crate::pipeline::manifest::{TileRecord, TileStatus};
use crate::raster::{RasterSink, RasterSource, RegionSource, SinkParams};
use crate::tiff::{BufferProvider, DataLayout};
use crate::utils::progress::ProgressTracker;

/// Writes the tile grid of an extracted plane
pub struct TileGridWriter<'a> {
    config: &'a PipelineConfig,
}

impl<'a> TileGridWriter<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        TileGridWriter { config }
    }

    /// Tile one intermediate raster into `tiles_dir`
    ///
    /// # Returns
    /// One record per grid tile, in id order, including the failed ones.
    /// Only environment-level problems (an uncreatable tiles directory, an
    /// unopenable intermediate) surface as errors.
    pub fn tile(
        &self,
        plane: &ExtractedPlane,
        stem: &str,
        tiles_dir: &Path,
    ) -> PipelineResult<Vec<TileRecord>> {
        let tiles = grid::partition(plane.height, plane.width, self.config.tile_edge)?;
        fs::create_dir_all(tiles_dir)?;

        let mut source = RasterSource::open(&plane.path)
            .map_err(|e| PipelineError::TileWrite(format!(
                "Cannot open intermediate {}: {}", plane.path.display(), e
            )))?;

        let params = SinkParams {
            compression: self.config.compression_code()?,
            big_tiff: false,
            layout: DataLayout::Tiled { edge: self.config.tile_edge as u32 },
            channel_name: plane.channel_name.clone(),
            scale: plane.scale.clone(),
        };

        info!("Writing {} tiles for {} into {}", tiles.len(), stem, tiles_dir.display());
        let progress = ProgressTracker::new(tiles.len() as u64, &format!("tile {}", stem));

        let mut records = Vec::with_capacity(tiles.len());
        for spec in &tiles {
            let record = self.write_tile(&mut source, plane, spec, stem, tiles_dir, &params);
            if let (TileStatus::Failed, Some(error)) = (&record.status, &record.error) {
                warn!("Tile {} of {} failed: {}", spec.tile_id, stem, error);
            }
            records.push(record);
            progress.increment(1);
        }
        progress.finish("tiled");

        Ok(records)
    }

    /// Write one tile; failures become a Failed record, never an Err
    fn write_tile(
        &self,
        source: &mut RasterSource,
        plane: &ExtractedPlane,
        spec: &TileSpec,
        stem: &str,
        tiles_dir: &Path,
        params: &SinkParams,
    ) -> TileRecord {
        let filename = naming::tile_name(
            stem,
            &plane.channel_name,
            spec.tile_id,
            spec.row_origin,
            spec.col_origin,
            spec.row_extent,
            spec.col_extent,
        );

        let mut record = TileRecord {
            tile_id: spec.tile_id,
            filename: filename.clone(),
            row_origin: spec.row_origin,
            col_origin: spec.col_origin,
            row_extent: spec.row_extent,
            col_extent: spec.col_extent,
            status: TileStatus::Ok,
            error: None,
            file_bytes: None,
        };

        let result = self.read_and_write(source, plane, spec, &tiles_dir.join(&filename), params);
        match result {
            Ok(bytes) => record.file_bytes = Some(bytes),
            Err(e) => {
                record.status = TileStatus::Failed;
                record.error = Some(e.to_string());
                // A partial file would fail validation later; remove it
                let _ = fs::remove_file(tiles_dir.join(&filename));
            }
        }
        record
    }

    fn read_and_write(
        &self,
        source: &mut RasterSource,
        plane: &ExtractedPlane,
        spec: &TileSpec,
        path: &Path,
        params: &SinkParams,
    ) -> PipelineResult<u64> {
        let pixels = source.read_region(
            None,
            spec.row_origin..spec.row_origin + spec.row_extent,
            spec.col_origin..spec.col_origin + spec.col_extent,
        )?;

        let mut provider = BufferProvider::new(
            &pixels,
            spec.col_extent,
            plane.pixel_type.bytes_per_sample(),
        );
        RasterSink::write_single_channel(
            path,
            spec.row_extent,
            spec.col_extent,
            plane.pixel_type,
            &mut provider,
            params,
        )
        .map_err(|e| PipelineError::TileWrite(format!("{}: {}", path.display(), e)))
    }
}
