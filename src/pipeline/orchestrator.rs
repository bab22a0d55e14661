//! Batch orchestration
//!
//! Drives each discovered source file through the two passes and records
//! where it ended up. Failures are contained at file granularity: a file
//! that cannot be extracted or tiled is marked failed and the batch moves
//! on. Only environment-level problems, like an uncreatable output root,
//! abort a run.

use chrono::Utc;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{PipelineError, PipelineResult};
use crate::naming;
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::extractor::ChannelExtractor;
use crate::pipeline::manifest::{ManifestStore, ProcessingManifest};
use crate::pipeline::tiler::TileGridWriter;
use crate::raster::{RasterSource, RegionSource};

/// Where a file's processing ended
///
/// Transitions run Discovered, Extracting, Extracted, Tiling, Tiled,
/// Cleaning, Done; the two Failed stages are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Discovered,
    Extracting,
    ExtractFailed,
    Extracted,
    Tiling,
    TileFailed,
    Tiled,
    Cleaning,
    Done,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Discovered => "discovered",
            PipelineStage::Extracting => "extracting",
            PipelineStage::ExtractFailed => "extract_failed",
            PipelineStage::Extracted => "extracted",
            PipelineStage::Tiling => "tiling",
            PipelineStage::TileFailed => "tile_failed",
            PipelineStage::Tiled => "tiled",
            PipelineStage::Cleaning => "cleaning",
            PipelineStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Terminal record for one source file in a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileOutcome {
    /// Source file path
    pub source: String,
    /// Terminal stage: Done, ExtractFailed or TileFailed
    pub stage: PipelineStage,
    /// Failure cause for the failed stages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Tiles in the grid, when tiling ran
    pub tile_count: usize,
    /// Tiles that individually failed
    pub failed_tiles: usize,
    /// Wall-clock seconds spent on this file
    pub elapsed_seconds: f64,
}

/// Record of a whole batch run, persisted next to the outputs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Run start (UTC, RFC 3339)
    pub started: String,
    /// Run end (UTC, RFC 3339)
    pub finished: String,
    /// Wall-clock seconds for the whole run
    pub elapsed_seconds: f64,
    pub total_files: usize,
    /// Files that reached Done
    pub succeeded: usize,
    /// Files that ended in a failed stage
    pub failed: usize,
    pub outcomes: Vec<FileOutcome>,
}

impl RunSummary {
    /// Filename of the persisted summary under the output root
    pub const FILENAME: &'static str = "run_summary.json";
}

/// Drives source files through extraction, tiling and cleanup
pub struct PipelineOrchestrator {
    config: PipelineConfig,
    store: ManifestStore,
}

impl PipelineOrchestrator {
    pub fn new(config: PipelineConfig) -> Self {
        let store = ManifestStore::new(&config.output_root);
        PipelineOrchestrator { config, store }
    }

    /// Source files in the input directory, sorted by name
    ///
    /// Accepts the extensions the scanners produce: .btf (including
    /// .ome.btf), .tif and .tiff, case-insensitive.
    pub fn discover_inputs(&self) -> PipelineResult<Vec<PathBuf>> {
        let dir = &self.config.input_dir;
        let entries = fs::read_dir(dir).map_err(|e| {
            PipelineError::Config(format!("Cannot read input directory {}: {}", dir.display(), e))
        })?;

        let mut inputs = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let extension = path
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            if matches!(extension.as_str(), "btf" | "tif" | "tiff") {
                inputs.push(path);
            }
        }
        inputs.sort();
        Ok(inputs)
    }

    /// Process every discovered file and persist the run summary
    ///
    /// Never aborts on a per-file failure; the summary records each file's
    /// terminal stage.
    pub fn run_batch(&self) -> PipelineResult<RunSummary> {
        fs::create_dir_all(&self.config.output_root).map_err(|e| {
            PipelineError::Config(format!(
                "Cannot create output root {}: {}", self.config.output_root.display(), e
            ))
        })?;

        let started = Utc::now();
        let clock = std::time::Instant::now();
        let inputs = self.discover_inputs()?;
        if inputs.is_empty() {
            warn!("No source files found in {}", self.config.input_dir.display());
        } else {
            info!("Processing {} file(s) from {}", inputs.len(), self.config.input_dir.display());
        }

        let mut outcomes = Vec::with_capacity(inputs.len());
        for path in &inputs {
            let outcome = self.process_file(path);
            match outcome.stage {
                PipelineStage::Done => info!(
                    "{}: done, {} tiles ({} failed) in {:.1}s",
                    outcome.source, outcome.tile_count, outcome.failed_tiles, outcome.elapsed_seconds
                ),
                stage => error!("{}: {} ({})", outcome.source, stage,
                                outcome.error.as_deref().unwrap_or("unknown error")),
            }
            outcomes.push(outcome);
        }

        let finished = Utc::now();
        let summary = RunSummary {
            started: started.to_rfc3339(),
            finished: finished.to_rfc3339(),
            elapsed_seconds: clock.elapsed().as_secs_f64(),
            total_files: outcomes.len(),
            succeeded: outcomes.iter().filter(|o| o.stage == PipelineStage::Done).count(),
            failed: outcomes.iter().filter(|o| o.stage != PipelineStage::Done).count(),
            outcomes,
        };
        self.save_summary(&summary)?;

        info!("Run complete: {}/{} file(s) succeeded", summary.succeeded, summary.total_files);
        Ok(summary)
    }

    /// Drive one file through the stage machine to a terminal stage
    pub fn process_file(&self, path: &Path) -> FileOutcome {
        let start = std::time::Instant::now();
        let stem = naming::source_stem(path);
        let mut outcome = FileOutcome {
            source: path.display().to_string(),
            stage: PipelineStage::Discovered,
            error: None,
            tile_count: 0,
            failed_tiles: 0,
            elapsed_seconds: 0.0,
        };

        outcome.stage = PipelineStage::Extracting;
        info!("{}: {} (channel {})", path.display(), outcome.stage, self.config.channel);

        let work_dir = naming::output_dir(&self.config.output_root, &stem);
        let plane = match self.extract(path, &stem, &work_dir) {
            Ok(plane) => plane,
            Err(e) => {
                outcome.stage = PipelineStage::ExtractFailed;
                outcome.error = Some(e.to_string());
                outcome.elapsed_seconds = start.elapsed().as_secs_f64();
                return outcome;
            }
        };
        outcome.stage = PipelineStage::Extracted;

        outcome.stage = PipelineStage::Tiling;
        let tiles_dir = naming::tiles_dir(&self.config.output_root, &stem, &plane.channel_name);
        let records = match TileGridWriter::new(&self.config).tile(&plane, &stem, &tiles_dir) {
            Ok(records) => records,
            Err(e) => {
                outcome.stage = PipelineStage::TileFailed;
                outcome.error = Some(e.to_string());
                outcome.elapsed_seconds = start.elapsed().as_secs_f64();
                return outcome;
            }
        };
        outcome.stage = PipelineStage::Tiled;

        let mut manifest = ProcessingManifest {
            source_file: path.display().to_string(),
            intermediate_file: if self.config.cleanup_intermediate {
                None
            } else {
                Some(plane.path.display().to_string())
            },
            stem: stem.clone(),
            channel_index: self.config.channel,
            channel_name: plane.channel_name.clone(),
            channel_count: plane.source_channels,
            image_height: plane.height,
            image_width: plane.width,
            pixel_type: plane.pixel_type.name().to_string(),
            tile_edge: self.config.tile_edge,
            physical_scale: plane.scale.clone(),
            tiles_dir: format!("{}_tiles", plane.channel_name),
            created: String::new(),
            tile_count: 0,
            failed_tiles: 0,
            tiles: records,
        };
        manifest.finalize();
        outcome.tile_count = manifest.tile_count;
        outcome.failed_tiles = manifest.failed_tiles;

        if let Err(e) = self.store.save(&manifest) {
            outcome.stage = PipelineStage::TileFailed;
            outcome.error = Some(format!("Cannot write manifest: {}", e));
            outcome.elapsed_seconds = start.elapsed().as_secs_f64();
            return outcome;
        }

        outcome.stage = PipelineStage::Cleaning;
        if self.config.cleanup_intermediate {
            if let Err(e) = fs::remove_file(&plane.path) {
                // Worth flagging but never worth failing a finished file
                warn!("Could not remove intermediate {}: {}", plane.path.display(), e);
            }
        }

        outcome.stage = PipelineStage::Done;
        outcome.elapsed_seconds = start.elapsed().as_secs_f64();
        outcome
    }

    fn extract(
        &self,
        path: &Path,
        stem: &str,
        work_dir: &Path,
    ) -> PipelineResult<crate::pipeline::extractor::ExtractedPlane> {
        let mut source = RasterSource::open(path)?;
        let info = source.info();
        info!("{}: {}x{}, {} channel(s), {}", path.display(), info.height, info.width,
              info.channel_count, info.pixel_type);
        ChannelExtractor::new(&self.config).extract(&mut source, stem, work_dir)
    }

    fn save_summary(&self, summary: &RunSummary) -> PipelineResult<()> {
        let path = self.config.output_root.join(RunSummary::FILENAME);
        let json = serde_json::to_string_pretty(summary)
            .map_err(|e| PipelineError::Io(std::io::Error::other(e)))?;
        fs::write(&path, json)?;
        info!("Wrote run summary {}", path.display());
        Ok(())
    }
}
