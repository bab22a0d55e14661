//! Pipeline error taxonomy
//!
//! Errors are split by where they are allowed to stop processing: a tile
//! error is fatal to one tile, an extraction error is fatal to one file,
//! and only environment-level failures (an unwritable output root) abort a
//! whole run. See the orchestrator for the propagation policy.

use std::fmt;
use std::io;

use crate::tiff::errors::TiffError;

/// Errors produced by the extraction and tiling pipeline
#[derive(Debug)]
pub enum PipelineError {
    /// Source file missing, unreadable or structurally unparseable
    SourceOpen(String),
    /// A rectangular read from a source failed
    RegionRead(String),
    /// Requested channel index is outside the detected channel count
    InvalidChannel { requested: usize, available: usize },
    /// A staging band would exceed the configured memory budget
    InsufficientMemory(String),
    /// Channel extraction (Pass 1) failed; wraps the underlying cause
    Extraction(String),
    /// Writing a single output tile failed
    TileWrite(String),
    /// A tile filename does not match the naming convention
    NamingConvention(String),
    /// A tile file exists but is unreadable or has the wrong shape
    TileIntegrity(String),
    /// Configuration is missing or inconsistent
    Config(String),
    /// A batch run or validation finished with failures
    RunFailed(String),
    /// Underlying codec error
    Tiff(TiffError),
    /// Underlying I/O error
    Io(io::Error),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::SourceOpen(msg) => write!(f, "Cannot open source: {}", msg),
            PipelineError::RegionRead(msg) => write!(f, "Region read failed: {}", msg),
            PipelineError::InvalidChannel { requested, available } => {
                write!(f, "Channel {} requested but source has only {} channel(s)",
                       requested, available)
            }
            PipelineError::InsufficientMemory(msg) => {
                write!(f, "Insufficient memory: {} (reduce chunk_rows)", msg)
            }
            PipelineError::Extraction(msg) => write!(f, "Channel extraction failed: {}", msg),
            PipelineError::TileWrite(msg) => write!(f, "Tile write failed: {}", msg),
            PipelineError::NamingConvention(msg) => write!(f, "Naming convention violation: {}", msg),
            PipelineError::TileIntegrity(msg) => write!(f, "Tile integrity error: {}", msg),
            PipelineError::Config(msg) => write!(f, "Configuration error: {}", msg),
            PipelineError::RunFailed(msg) => write!(f, "Run finished with failures: {}", msg),
            PipelineError::Tiff(e) => write!(f, "Codec error: {}", e),
            PipelineError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<TiffError> for PipelineError {
    fn from(error: TiffError) -> Self {
        PipelineError::Tiff(error)
    }
}

impl From<io::Error> for PipelineError {
    fn from(error: io::Error) -> Self {
        PipelineError::Io(error)
    }
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;
