//! Extraction and tiling pipeline
//!
//! Pass 1 extracts one channel into an intermediate raster, Pass 2 cuts it
//! into a grid of independent tiles, and the orchestrator drives batches of
//! files through both with per-file fault isolation. Manifests record what
//! was produced; the validator checks an output tree against them.

pub mod config;
pub mod extractor;
pub mod manifest;
pub mod orchestrator;
pub mod tiler;
pub mod validator;

pub use config::PipelineConfig;
pub use extractor::{ChannelExtractor, ExtractedPlane};
pub use manifest::{ManifestStore, ProcessingManifest, TileRecord, TileStatus};
pub use orchestrator::{FileOutcome, PipelineOrchestrator, PipelineStage, RunSummary};
pub use tiler::TileGridWriter;
pub use validator::{IssueKind, OutputValidator, ValidationIssue, ValidationReport};
