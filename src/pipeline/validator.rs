//! Output validation
//!
//! Checks a finished output tree against its manifests: every tile the
//! manifests claim was written must exist, open, and have the recorded
//! shape, and every tile file on disk must follow the naming convention and
//! be accounted for. Validation is manifest-driven so deliberately kept
//! intermediates are never flagged as strays.
//!
//! The report is persisted under the output root whether or not validation
//! passes; a failed validation is a result, not an error.

use chrono::Utc;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{PipelineError, PipelineResult};
use crate::naming;
use crate::pipeline::manifest::{ManifestStore, ProcessingManifest, TileRecord, TileStatus};
use crate::raster::{RasterSource, RegionSource};

/// Classification of a validation finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// A filename violates the tile naming convention or disagrees with
    /// the manifest
    NamingConvention,
    /// A tile or manifest is missing, unreadable or has the wrong shape
    TileIntegrity,
}

/// One validation finding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    /// Manifest the finding belongs to
    pub manifest: String,
    /// Tile id, when the finding concerns a specific manifest record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tile_id: Option<usize>,
    /// Filename involved, when there is one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub message: String,
}

/// Result of validating an output tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// When validation ran (UTC, RFC 3339)
    pub created: String,
    pub checked_manifests: usize,
    pub checked_tiles: usize,
    /// Issues classified as naming convention violations
    pub naming_errors: usize,
    /// Issues classified as integrity failures
    pub integrity_errors: usize,
    /// True when no issues were found
    pub passed: bool,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Filename of the persisted report under the output root
    pub const FILENAME: &'static str = "validation_report.json";
}

/// Validates an output tree against its manifests
pub struct OutputValidator {
    output_root: PathBuf,
}

impl OutputValidator {
    pub fn new(output_root: &Path) -> Self {
        OutputValidator { output_root: output_root.to_path_buf() }
    }

    /// Validate every manifest under the output root and persist the report
    pub fn validate(&self) -> PipelineResult<ValidationReport> {
        let store = ManifestStore::new(&self.output_root);
        let manifest_paths = store.find_manifests()?;
        if manifest_paths.is_empty() {
            warn!("No manifests found under {}", self.output_root.display());
        }

        let mut issues = Vec::new();
        let mut checked_tiles = 0;

        for manifest_path in &manifest_paths {
            let manifest_name = manifest_path.display().to_string();
            let manifest = match ManifestStore::load(manifest_path) {
                Ok(manifest) => manifest,
                Err(e) => {
                    issues.push(ValidationIssue {
                        kind: IssueKind::TileIntegrity,
                        manifest: manifest_name,
                        tile_id: None,
                        filename: None,
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            let tiles_dir = manifest_path
                .parent()
                .map(|p| p.join(&manifest.tiles_dir))
                .unwrap_or_else(|| PathBuf::from(&manifest.tiles_dir));

            for record in &manifest.tiles {
                if record.status == TileStatus::Failed {
                    // Recorded as failed during the run; absence is expected
                    continue;
                }
                checked_tiles += 1;
                self.check_record(&manifest, record, &tiles_dir, &manifest_name, &mut issues);
            }

            self.check_strays(&manifest, &tiles_dir, &manifest_name, &mut issues);
        }

        let report = ValidationReport {
            created: Utc::now().to_rfc3339(),
            checked_manifests: manifest_paths.len(),
            checked_tiles,
            naming_errors: issues.iter().filter(|i| i.kind == IssueKind::NamingConvention).count(),
            integrity_errors: issues.iter().filter(|i| i.kind == IssueKind::TileIntegrity).count(),
            passed: issues.is_empty(),
            issues,
        };
        self.save_report(&report)?;

        if report.passed {
            info!("Validation passed: {} tile(s) across {} manifest(s)",
                  report.checked_tiles, report.checked_manifests);
        } else {
            warn!("Validation found {} issue(s)", report.issues.len());
        }
        Ok(report)
    }

    /// Check one manifest record: name agreement, then file integrity
    fn check_record(
        &self,
        manifest: &ProcessingManifest,
        record: &TileRecord,
        tiles_dir: &Path,
        manifest_name: &str,
        issues: &mut Vec<ValidationIssue>,
    ) {
        let issue = |kind, message: String| ValidationIssue {
            kind,
            manifest: manifest_name.to_string(),
            tile_id: Some(record.tile_id),
            filename: Some(record.filename.clone()),
            message,
        };

        if record.row_extent == 0 || record.col_extent == 0 {
            issues.push(issue(
                IssueKind::TileIntegrity,
                "Manifest records a tile with zero extent".to_string(),
            ));
        }

        match naming::parse_tile_name(&record.filename) {
            None => {
                issues.push(issue(
                    IssueKind::NamingConvention,
                    "Filename does not follow the tile naming convention".to_string(),
                ));
            }
            Some(parsed) => {
                let expected = (
                    manifest.stem.as_str(),
                    manifest.channel_name.as_str(),
                    record.tile_id,
                    record.row_origin,
                    record.col_origin,
                    record.row_extent,
                    record.col_extent,
                );
                let actual = (
                    parsed.stem.as_str(),
                    parsed.channel.as_str(),
                    parsed.tile_id,
                    parsed.row_origin,
                    parsed.col_origin,
                    parsed.row_extent,
                    parsed.col_extent,
                );
                if expected != actual {
                    issues.push(issue(
                        IssueKind::NamingConvention,
                        format!("Filename fields {:?} disagree with manifest record {:?}",
                                actual, expected),
                    ));
                }
            }
        }

        let path = tiles_dir.join(&record.filename);
        let mut source = match RasterSource::open(&path) {
            Ok(source) => source,
            Err(e) => {
                issues.push(issue(
                    IssueKind::TileIntegrity,
                    format!("Cannot open tile: {}", e),
                ));
                return;
            }
        };

        let info = source.info();
        if info.height != record.row_extent || info.width != record.col_extent {
            issues.push(issue(
                IssueKind::TileIntegrity,
                format!("Tile is {}x{}, manifest records {}x{}",
                        info.height, info.width, record.row_extent, record.col_extent),
            ));
        }
        if info.pixel_type.name() != manifest.pixel_type {
            issues.push(issue(
                IssueKind::TileIntegrity,
                format!("Tile pixel type {} disagrees with manifest {}",
                        info.pixel_type, manifest.pixel_type),
            ));
        }
        if info.channel_count != 1 {
            issues.push(issue(
                IssueKind::TileIntegrity,
                format!("Tile has {} channels, expected 1", info.channel_count),
            ));
        }

        // Corrupt pixel data surfaces here rather than in a consumer
        if let Err(e) = source.read_region(None, 0..1, 0..info.width) {
            issues.push(issue(
                IssueKind::TileIntegrity,
                format!("Cannot decode tile pixels: {}", e),
            ));
        }
    }

    /// Flag tile files on disk the manifest does not account for
    fn check_strays(
        &self,
        manifest: &ProcessingManifest,
        tiles_dir: &Path,
        manifest_name: &str,
        issues: &mut Vec<ValidationIssue>,
    ) {
        let entries = match fs::read_dir(tiles_dir) {
            Ok(entries) => entries,
            Err(e) => {
                issues.push(ValidationIssue {
                    kind: IssueKind::TileIntegrity,
                    manifest: manifest_name.to_string(),
                    tile_id: None,
                    filename: None,
                    message: format!("Cannot read tiles directory {}: {}", tiles_dir.display(), e),
                });
                return;
            }
        };

        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.to_lowercase().ends_with(".tif") {
                continue;
            }
            let known = manifest.tiles.iter().any(|t| t.filename == name);
            if known {
                continue;
            }
            let message = match naming::parse_tile_name(&name) {
                Some(_) => "Tile file is not recorded in the manifest".to_string(),
                None => "File in tiles directory violates the naming convention".to_string(),
            };
            issues.push(ValidationIssue {
                kind: IssueKind::NamingConvention,
                manifest: manifest_name.to_string(),
                tile_id: None,
                filename: Some(name),
                message,
            });
        }
    }

    fn save_report(&self, report: &ValidationReport) -> PipelineResult<()> {
        let path = self.output_root.join(ValidationReport::FILENAME);
        let json = serde_json::to_string_pretty(report)
            .map_err(|e| PipelineError::Io(std::io::Error::other(e)))?;
        fs::write(&path, json)?;
        info!("Wrote validation report {}", path.display());
        Ok(())
    }
}
