//! Library facade
//!
//! Single entry point for embedding the pipeline: batch processing, single
//! file processing, output validation and source description without going
//! through the CLI.

use log::info;
use std::path::Path;

use crate::errors::PipelineResult;
use crate::pipeline::{
    FileOutcome, OutputValidator, PipelineConfig, PipelineOrchestrator, RunSummary,
    ValidationReport,
};
use crate::raster::{PhysicalScale, RasterInfo, RasterSource, RegionSource};

/// Main interface to the tilekit library
pub struct TileKit {
    config: PipelineConfig,
}

impl TileKit {
    /// Create an instance with the given configuration
    ///
    /// # Returns
    /// A TileKit instance, or a configuration error
    pub fn new(config: PipelineConfig) -> PipelineResult<Self> {
        config.validate()?;
        Ok(TileKit { config })
    }

    /// Process every source file in the configured input directory
    ///
    /// Per-file failures are recorded in the summary, never raised; the
    /// run summary is persisted under the output root.
    pub fn process_all(&self) -> PipelineResult<RunSummary> {
        PipelineOrchestrator::new(self.config.clone()).run_batch()
    }

    /// Process a single source file to its terminal stage
    pub fn process_file(&self, path: &Path) -> FileOutcome {
        PipelineOrchestrator::new(self.config.clone()).process_file(path)
    }

    /// Validate the configured output root against its manifests
    ///
    /// The report is persisted next to the outputs whether or not it
    /// passes.
    pub fn validate(&self) -> PipelineResult<ValidationReport> {
        OutputValidator::new(&self.config.output_root).validate()
    }

    /// Describe the structure of one source file
    ///
    /// # Returns
    /// The structural description and physical scale, when present
    pub fn describe(path: &Path) -> PipelineResult<(RasterInfo, Option<PhysicalScale>)> {
        let source = RasterSource::open(path)?;
        let info = source.info().clone();
        let scale = source.physical_scale().cloned();
        info!("Described {}: {}x{}, {} channel(s)",
              path.display(), info.height, info.width, info.channel_count);
        Ok((info, scale))
    }
}
