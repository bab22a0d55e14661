//! Pipeline configuration
//!
//! Runtime parameters with working defaults, overridable from a TOML file
//! and then from CLI flags. Validation happens once, up front, so the rest
//! of the pipeline can assume a coherent configuration.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::errors::{PipelineError, PipelineResult};
use crate::tiff::constants::compression;

fn default_tile_edge() -> u64 { 2048 }
fn default_channel() -> usize { 1 }
fn default_chunk_rows() -> u64 { 4096 }
fn default_compression() -> String { "deflate".to_string() }
fn default_true() -> bool { true }
fn default_max_band_bytes() -> u64 { 4 * 1024 * 1024 * 1024 }

/// Parameters of an extraction and tiling run
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Directory scanned for source images
    pub input_dir: PathBuf,
    /// Root directory for all outputs
    pub output_root: PathBuf,
    /// Output tile edge in pixels
    #[serde(default = "default_tile_edge")]
    pub tile_edge: u64,
    /// Channel index to extract
    #[serde(default = "default_channel")]
    pub channel: usize,
    /// Nominal rows per extraction band; rounded up to a tile-edge multiple
    #[serde(default = "default_chunk_rows")]
    pub chunk_rows: u64,
    /// Compression scheme for all outputs: none, deflate or zstd
    #[serde(default = "default_compression")]
    pub compression: String,
    /// Remove the intermediate single-channel raster after tiling
    #[serde(default = "default_true")]
    pub cleanup_intermediate: bool,
    /// Write the intermediate as BigTIFF (sources routinely exceed 4 GiB)
    #[serde(default = "default_true")]
    pub big_tiff_intermediate: bool,
    /// Upper bound on the bytes one extraction band may occupy in memory
    #[serde(default = "default_max_band_bytes")]
    pub max_band_bytes: u64,
}

impl PipelineConfig {
    /// Configuration with defaults for everything but the two paths
    pub fn new(input_dir: PathBuf, output_root: PathBuf) -> Self {
        PipelineConfig {
            input_dir,
            output_root,
            tile_edge: default_tile_edge(),
            channel: default_channel(),
            chunk_rows: default_chunk_rows(),
            compression: default_compression(),
            cleanup_intermediate: default_true(),
            big_tiff_intermediate: default_true(),
            max_band_bytes: default_max_band_bytes(),
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> PipelineResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        let config: PipelineConfig = toml::from_str(&content)
            .map_err(|e| PipelineError::Config(format!("Cannot parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for internal consistency
    pub fn validate(&self) -> PipelineResult<()> {
        if self.tile_edge == 0 {
            return Err(PipelineError::Config("tile_edge must be positive".to_string()));
        }
        // Tile geometry is written as 32-bit TIFF tags
        if self.tile_edge > u32::MAX as u64 {
            return Err(PipelineError::Config(format!(
                "tile_edge {} exceeds the maximum of {}", self.tile_edge, u32::MAX
            )));
        }
        if self.chunk_rows == 0 {
            return Err(PipelineError::Config("chunk_rows must be positive".to_string()));
        }
        if self.max_band_bytes == 0 {
            return Err(PipelineError::Config("max_band_bytes must be positive".to_string()));
        }
        self.compression_code()?;
        Ok(())
    }

    /// TIFF compression code for the configured scheme name
    pub fn compression_code(&self) -> PipelineResult<u64> {
        match self.compression.as_str() {
            "none" => Ok(compression::NONE),
            "deflate" | "zlib" | "zip" => Ok(compression::DEFLATE),
            "zstd" => Ok(compression::ZSTD),
            other => Err(PipelineError::Config(format!("Unknown compression scheme '{}'", other))),
        }
    }

    /// Extraction band height: chunk_rows rounded up to a tile-edge multiple
    ///
    /// Bands that are tile-aligned mean no tile ever straddles a band
    /// boundary in the staged plane.
    pub fn band_rows(&self) -> u64 {
        let edge = self.tile_edge;
        ((self.chunk_rows + edge - 1) / edge) * edge
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::new(PathBuf::from("in"), PathBuf::from("out"));
        assert_eq!(config.tile_edge, 2048);
        assert_eq!(config.channel, 1);
        assert_eq!(config.compression_code().unwrap(), compression::DEFLATE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_band_rows_rounds_up() {
        let mut config = PipelineConfig::new(PathBuf::from("in"), PathBuf::from("out"));
        config.chunk_rows = 4096;
        assert_eq!(config.band_rows(), 4096);
        config.chunk_rows = 4097;
        assert_eq!(config.band_rows(), 6144);
        config.chunk_rows = 1;
        assert_eq!(config.band_rows(), 2048);
    }

    #[test]
    fn test_toml_parse() {
        let text = r#"
input_dir = "/data/in"
output_root = "/data/out"
tile_edge = 1024
channel = 2
compression = "zstd"
cleanup_intermediate = false
"#;
        let config: PipelineConfig = toml::from_str(text).unwrap();
        assert_eq!(config.tile_edge, 1024);
        assert_eq!(config.channel, 2);
        assert_eq!(config.compression_code().unwrap(), compression::ZSTD);
        assert!(!config.cleanup_intermediate);
        // Unspecified fields keep their defaults
        assert_eq!(config.chunk_rows, 4096);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = PipelineConfig::new(PathBuf::from("in"), PathBuf::from("out"));
        config.tile_edge = 0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::new(PathBuf::from("in"), PathBuf::from("out"));
        config.tile_edge = u64::from(u32::MAX) + 1;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::new(PathBuf::from("in"), PathBuf::from("out"));
        config.compression = "lzw".to_string();
        assert!(config.validate().is_err());
    }
}
