//! Raster layer
//!
//! Sits between the TIFF codec and the pipeline: describes sources, serves
//! rectangular reads with degraded-mode fallback, stages extracted planes on
//! disk and writes single-channel outputs with consistent metadata.

pub mod ome;
pub mod sink;
pub mod source;
pub mod staging;
pub mod types;

pub use sink::{RasterSink, SinkParams};
pub use source::{RasterSource, RegionSource};
pub use staging::StagingBuffer;
pub use types::{AxisOrder, PhysicalScale, PixelType, RasterInfo};
