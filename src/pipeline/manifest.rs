//! Processing manifests
//!
//! Every processed source file gets a JSON manifest recording what was
//! extracted and every tile that was produced or failed. The manifest is the
//! contract with downstream consumers: the validator and any analysis
//! tooling read it instead of globbing the output directory.

use chrono::Utc;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{PipelineError, PipelineResult};
use crate::naming;
use crate::raster::PhysicalScale;

/// Outcome of one tile in the grid
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TileStatus {
    /// Tile was written and its size recorded
    Ok,
    /// Tile write failed; the error is in the record
    Failed,
}

/// One tile's entry in the manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileRecord {
    /// Sequential id, row-major from the top-left tile
    pub tile_id: usize,
    /// Filename relative to the tiles directory
    pub filename: String,
    /// Top row of the tile in plane coordinates
    pub row_origin: u64,
    /// Left column of the tile in plane coordinates
    pub col_origin: u64,
    /// Tile height in pixels
    pub row_extent: u64,
    /// Tile width in pixels
    pub col_extent: u64,
    /// Whether the tile was written
    pub status: TileStatus,
    /// Failure cause, present only for failed tiles
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Size of the written file in bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_bytes: Option<u64>,
}

/// Per-source-file processing record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingManifest {
    /// Absolute path of the source file
    pub source_file: String,
    /// Path of the kept intermediate raster; absent when it was cleaned up
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intermediate_file: Option<String>,
    /// Base name shared by all derived artifacts
    pub stem: String,
    /// Extracted channel index
    pub channel_index: usize,
    /// Conventional name of the extracted channel
    pub channel_name: String,
    /// Number of channels in the source
    pub channel_count: usize,
    /// Source plane height in pixels
    pub image_height: u64,
    /// Source plane width in pixels
    pub image_width: u64,
    /// Pixel type name in the OME convention
    pub pixel_type: String,
    /// Tile edge used for the grid
    pub tile_edge: u64,
    /// Physical pixel size carried from the source, when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub physical_scale: Option<PhysicalScale>,
    /// Directory of the tiles, relative to the manifest
    pub tiles_dir: String,
    /// When processing of this file finished (UTC, RFC 3339)
    pub created: String,
    /// Number of tiles in the grid
    pub tile_count: usize,
    /// Number of tiles that failed to write
    pub failed_tiles: usize,
    /// Every tile in the grid, in id order
    pub tiles: Vec<TileRecord>,
}

impl ProcessingManifest {
    /// Recompute the tile counters from the tile list and stamp the time
    pub fn finalize(&mut self) {
        self.tile_count = self.tiles.len();
        self.failed_tiles = self
            .tiles
            .iter()
            .filter(|t| t.status == TileStatus::Failed)
            .count();
        self.created = Utc::now().to_rfc3339();
    }
}

/// Reads and writes manifests under the output root
pub struct ManifestStore {
    output_root: PathBuf,
}

impl ManifestStore {
    pub fn new(output_root: &Path) -> Self {
        ManifestStore { output_root: output_root.to_path_buf() }
    }

    /// Path of the manifest for a given stem
    pub fn manifest_path(&self, stem: &str) -> PathBuf {
        naming::output_dir(&self.output_root, stem).join(naming::manifest_name(stem))
    }

    /// Persist a manifest as pretty-printed JSON
    pub fn save(&self, manifest: &ProcessingManifest) -> PipelineResult<PathBuf> {
        let path = self.manifest_path(&manifest.stem);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(manifest)
            .map_err(|e| PipelineError::Io(std::io::Error::other(e)))?;
        fs::write(&path, json)?;
        info!("Wrote manifest {}", path.display());
        Ok(path)
    }

    /// Load a manifest from a path
    pub fn load(path: &Path) -> PipelineResult<ProcessingManifest> {
        let content = fs::read_to_string(path)?;
        let manifest = serde_json::from_str(&content).map_err(|e| {
            PipelineError::TileIntegrity(format!("Unreadable manifest {}: {}", path.display(), e))
        })?;
        Ok(manifest)
    }

    /// Find every manifest under the output root
    ///
    /// Looks one level deep: each source file's directory holds one
    /// `{stem}_metadata.json`.
    pub fn find_manifests(&self) -> PipelineResult<Vec<PathBuf>> {
        let mut found = Vec::new();
        if !self.output_root.is_dir() {
            return Ok(found);
        }

        for entry in fs::read_dir(&self.output_root)? {
            let dir = entry?.path();
            if !dir.is_dir() {
                continue;
            }
            let stem = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let candidate = dir.join(naming::manifest_name(&stem));
            if candidate.is_file() {
                found.push(candidate);
            } else {
                debug!("No manifest in {}", dir.display());
            }
        }
        found.sort();
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_manifest() -> ProcessingManifest {
        ProcessingManifest {
            source_file: "/data/img.ome.btf".to_string(),
            intermediate_file: None,
            stem: "img".to_string(),
            channel_index: 1,
            channel_name: "green".to_string(),
            channel_count: 3,
            image_height: 10000,
            image_width: 10000,
            pixel_type: "uint16".to_string(),
            tile_edge: 2048,
            physical_scale: None,
            tiles_dir: "green_tiles".to_string(),
            created: String::new(),
            tile_count: 0,
            failed_tiles: 0,
            tiles: vec![
                TileRecord {
                    tile_id: 0,
                    filename: "img_green_tile_0000_0_0_2048x2048.tif".to_string(),
                    row_origin: 0,
                    col_origin: 0,
                    row_extent: 2048,
                    col_extent: 2048,
                    status: TileStatus::Ok,
                    error: None,
                    file_bytes: Some(1234),
                },
                TileRecord {
                    tile_id: 1,
                    filename: "img_green_tile_0001_0_2048_2048x2048.tif".to_string(),
                    row_origin: 0,
                    col_origin: 2048,
                    row_extent: 2048,
                    col_extent: 2048,
                    status: TileStatus::Failed,
                    error: Some("disk full".to_string()),
                    file_bytes: None,
                },
            ],
        }
    }

    #[test]
    fn test_finalize_counts() {
        let mut manifest = sample_manifest();
        manifest.finalize();
        assert_eq!(manifest.tile_count, 2);
        assert_eq!(manifest.failed_tiles, 1);
        assert!(!manifest.created.is_empty());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempdir().unwrap();
        let store = ManifestStore::new(dir.path());
        let mut manifest = sample_manifest();
        manifest.finalize();

        let path = store.save(&manifest).unwrap();
        assert_eq!(path, dir.path().join("img").join("img_metadata.json"));

        let loaded = ManifestStore::load(&path).unwrap();
        assert_eq!(loaded.stem, "img");
        assert_eq!(loaded.tiles.len(), 2);
        assert_eq!(loaded.tiles[1].status, TileStatus::Failed);
        assert_eq!(loaded.tiles[1].error.as_deref(), Some("disk full"));
    }

    #[test]
    fn test_find_manifests() {
        let dir = tempdir().unwrap();
        let store = ManifestStore::new(dir.path());
        let mut manifest = sample_manifest();
        manifest.finalize();
        store.save(&manifest).unwrap();

        // A directory without a manifest is skipped, not an error
        fs::create_dir_all(dir.path().join("empty")).unwrap();

        let found = store.find_manifests().unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].ends_with("img/img_metadata.json"));
    }

    #[test]
    fn test_corrupt_manifest_is_integrity_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();
        let err = ManifestStore::load(&path).unwrap_err();
        assert!(matches!(err, PipelineError::TileIntegrity(_)));
    }
}
