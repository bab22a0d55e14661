//! tilekit: streaming channel extraction and tile-grid conversion for huge
//! TIFF/BigTIFF microscopy images
//!
//! Converts multi-channel whole-slide images into one extracted channel
//! retiled as a grid of small, independently readable tiles, with bounded
//! memory, per-tile fault isolation and JSON manifests describing every
//! output.

pub mod api;
pub mod commands;
pub mod compression;
pub mod errors;
pub mod grid;
pub mod io;
pub mod naming;
pub mod pipeline;
pub mod raster;
pub mod tiff;
pub mod utils;

pub use crate::api::TileKit;

pub use errors::{PipelineError, PipelineResult};
pub use grid::{partition, TileSpec};
pub use pipeline::{PipelineConfig, PipelineOrchestrator, OutputValidator};
pub use raster::{RasterSource, RegionSource};
pub use tiff::TiffReader;
