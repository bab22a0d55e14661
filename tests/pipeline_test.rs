//! End-to-end tests for the extraction and tiling pipeline
//!
//! Each test builds a synthetic multi-channel source with the library's own
//! writer, runs the pipeline over it and checks the produced tiles,
//! manifests and reports.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::tempdir;

use tilekit::pipeline::{
    ManifestStore, OutputValidator, PipelineConfig, PipelineOrchestrator, PipelineStage,
    TileStatus,
};
use tilekit::raster::{AxisOrder, RasterSource, RegionSource};
use tilekit::tiff::constants::{compression, photometric};
use tilekit::tiff::{DataLayout, PixelProvider, TiffResult, TiffWriteOptions, TiffWriter};
use tilekit::TileKit;

const HEIGHT: u64 = 300;
const WIDTH: u64 = 200;

/// Deterministic RGB test pattern: red = row, green = row + col, blue = col
struct PatternProvider;

impl PixelProvider for PatternProvider {
    fn fetch(&mut self, row0: u64, col0: u64, rows: u64, cols: u64) -> TiffResult<Vec<u8>> {
        let mut out = Vec::with_capacity((rows * cols * 6) as usize);
        for r in row0..row0 + rows {
            for c in col0..col0 + cols {
                out.extend_from_slice(&(r as u16).to_le_bytes());
                out.extend_from_slice(&((r + c) as u16).to_le_bytes());
                out.extend_from_slice(&(c as u16).to_le_bytes());
            }
        }
        Ok(out)
    }
}

fn ome_description() -> String {
    format!(
        "<?xml version=\"1.0\"?>\
         <OME xmlns=\"http://www.openmicroscopy.org/Schemas/OME/2016-06\">\
         <Image ID=\"Image:0\"><Pixels ID=\"Pixels:0\" DimensionOrder=\"XYCZT\" \
         SizeC=\"3\" SizeT=\"1\" SizeZ=\"1\" SizeX=\"{}\" SizeY=\"{}\" Type=\"uint16\" \
         PhysicalSizeX=\"0.5\" PhysicalSizeXUnit=\"um\" \
         PhysicalSizeY=\"0.5\" PhysicalSizeYUnit=\"um\"/></Image></OME>",
        WIDTH, HEIGHT
    )
}

fn write_fixture(path: &Path, layout: DataLayout, description: Option<String>) {
    let options = TiffWriteOptions {
        big_tiff: true,
        compression: compression::DEFLATE,
        photometric: photometric::RGB,
        layout,
        description,
        resolution_cm: None,
    };
    TiffWriter::write_raster(path, HEIGHT, WIDTH, 3, 16, 1, &mut PatternProvider, &options)
        .expect("fixture write");
}

fn test_config(input_dir: PathBuf, output_root: PathBuf) -> PipelineConfig {
    let mut config = PipelineConfig::new(input_dir, output_root);
    config.tile_edge = 64;
    config.chunk_rows = 100;
    config
}

/// Read a whole single-channel tile back as u16 values
fn read_tile_values(path: &Path) -> (u64, u64, Vec<u16>) {
    let mut source = RasterSource::open(path).expect("open tile");
    let (height, width) = (source.info().height, source.info().width);
    let bytes = source.read_region(None, 0..height, 0..width).expect("read tile");
    let values = bytes
        .chunks_exact(2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .collect();
    (height, width, values)
}

#[test]
fn test_describe_reads_ome_metadata() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("img.ome.btf");
    write_fixture(&path, DataLayout::Tiled { edge: 64 }, Some(ome_description()));

    let (info, scale) = TileKit::describe(&path).unwrap();
    assert_eq!((info.height, info.width), (HEIGHT, WIDTH));
    assert_eq!(info.channel_count, 3);
    assert_eq!(info.axis_order, AxisOrder::InterleavedLast);
    assert_eq!(info.pixel_type.name(), "uint16");

    let scale = scale.expect("physical scale");
    assert!((scale.pixel_size_x - 0.5).abs() < 1e-9);
    assert_eq!(scale.unit, "um");
}

#[test]
fn test_describe_falls_back_on_corrupt_metadata() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.btf");
    write_fixture(
        &path,
        DataLayout::Tiled { edge: 64 },
        Some("<OME><Pixels SizeC=\"3\"".to_string()),
    );

    // Truncated OME block: structure still comes from the TIFF tags
    let (info, _) = TileKit::describe(&path).unwrap();
    assert_eq!((info.height, info.width), (HEIGHT, WIDTH));
    assert_eq!(info.channel_count, 3);
    assert_eq!(info.axis_order, AxisOrder::InterleavedLast);
}

#[test]
fn test_single_file_end_to_end() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in");
    let output = dir.path().join("out");
    fs::create_dir_all(&input).unwrap();
    let source = input.join("img.ome.btf");
    write_fixture(&source, DataLayout::Tiled { edge: 64 }, Some(ome_description()));

    let config = test_config(input, output.clone());
    let outcome = PipelineOrchestrator::new(config).process_file(&source);
    assert_eq!(outcome.stage, PipelineStage::Done, "outcome: {:?}", outcome);

    // 300x200 at edge 64: 5 x 4 grid
    assert_eq!(outcome.tile_count, 20);
    assert_eq!(outcome.failed_tiles, 0);

    let manifest_path = output.join("img").join("img_metadata.json");
    let manifest = ManifestStore::load(&manifest_path).unwrap();
    assert_eq!(manifest.channel_name, "green");
    assert_eq!(manifest.channel_count, 3);
    assert_eq!(manifest.pixel_type, "uint16");
    assert_eq!(manifest.tiles.len(), 20);
    assert!(manifest.tiles.iter().all(|t| t.status == TileStatus::Ok));

    let tiles_dir = output.join("img").join("green_tiles");
    assert_eq!(manifest.tiles[0].filename, "img_green_tile_0000_0_0_64x64.tif");
    let last = &manifest.tiles[19];
    assert_eq!(last.filename, "img_green_tile_0019_256_192_44x8.tif");
    assert!(tiles_dir.join(&last.filename).exists());

    // Intermediate and staging are cleaned up by default
    assert!(!output.join("img").join("img_green.tif").exists());
    assert!(!output.join("img").join("img_green.staging").exists());

    // Tile pixels carry the extracted channel: green = row + col
    let (h, w, values) = read_tile_values(&tiles_dir.join(&manifest.tiles[0].filename));
    assert_eq!((h, w), (64, 64));
    for r in 0..h {
        for c in 0..w {
            assert_eq!(values[(r * w + c) as usize], (r + c) as u16);
        }
    }

    // Edge tile has source-plane coordinates, not tile-local ones
    let (h, w, values) = read_tile_values(&tiles_dir.join(&last.filename));
    assert_eq!((h, w), (44, 8));
    assert_eq!(values[0], (256 + 192) as u16);
}

#[test]
fn test_strip_organized_source_uses_degraded_path() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in");
    let output = dir.path().join("out");
    fs::create_dir_all(&input).unwrap();
    let source = input.join("strips.tif");
    write_fixture(
        &source,
        DataLayout::Strips { rows_per_strip: 50 },
        Some(ome_description()),
    );

    let config = test_config(input, output.clone());
    let outcome = PipelineOrchestrator::new(config).process_file(&source);
    assert_eq!(outcome.stage, PipelineStage::Done, "outcome: {:?}", outcome);

    let manifest = ManifestStore::load(&output.join("strips").join("strips_metadata.json")).unwrap();
    assert_eq!(manifest.failed_tiles, 0);

    let tile = output
        .join("strips")
        .join("green_tiles")
        .join("strips_green_tile_0005_64_64_64x64.tif");
    let (_, w, values) = read_tile_values(&tile);
    assert_eq!(values[0], (64 + 64) as u16);
    assert_eq!(values[(w + 1) as usize], (65 + 65) as u16);
}

#[test]
fn test_invalid_channel_fails_file_without_output() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in");
    let output = dir.path().join("out");
    fs::create_dir_all(&input).unwrap();
    let source = input.join("img.btf");
    write_fixture(&source, DataLayout::Tiled { edge: 64 }, Some(ome_description()));

    let mut config = test_config(input, output.clone());
    config.channel = 7;
    let outcome = PipelineOrchestrator::new(config).process_file(&source);

    assert_eq!(outcome.stage, PipelineStage::ExtractFailed);
    assert!(outcome.error.as_deref().unwrap_or("").contains("Channel 7"));
    assert!(!output.join("img").join("img_metadata.json").exists());
}

#[test]
fn test_one_bad_tile_does_not_fail_the_file() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in");
    let output = dir.path().join("out");
    fs::create_dir_all(&input).unwrap();
    let source = input.join("img.btf");
    write_fixture(&source, DataLayout::Tiled { edge: 64 }, Some(ome_description()));

    // Occupy tile 3's path with a directory so only that write fails
    let tiles_dir = output.join("img").join("green_tiles");
    fs::create_dir_all(tiles_dir.join("img_green_tile_0003_0_192_64x8.tif")).unwrap();

    let config = test_config(input, output.clone());
    let outcome = PipelineOrchestrator::new(config).process_file(&source);

    assert_eq!(outcome.stage, PipelineStage::Done, "outcome: {:?}", outcome);
    assert_eq!(outcome.tile_count, 20);
    assert_eq!(outcome.failed_tiles, 1);

    let manifest = ManifestStore::load(&output.join("img").join("img_metadata.json")).unwrap();
    let failed = &manifest.tiles[3];
    assert_eq!(failed.status, TileStatus::Failed);
    assert!(failed.error.is_some());
    assert!(manifest
        .tiles
        .iter()
        .filter(|t| t.tile_id != 3)
        .all(|t| t.status == TileStatus::Ok));
}

#[test]
fn test_batch_isolates_unreadable_files() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in");
    let output = dir.path().join("out");
    fs::create_dir_all(&input).unwrap();
    write_fixture(
        &input.join("good.btf"),
        DataLayout::Tiled { edge: 64 },
        Some(ome_description()),
    );
    fs::write(input.join("junk.tif"), b"this is not a tiff").unwrap();
    fs::write(input.join("notes.txt"), b"ignored").unwrap();

    let config = test_config(input, output.clone());
    let summary = PipelineOrchestrator::new(config).run_batch().unwrap();

    assert_eq!(summary.total_files, 2);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);
    assert!(output.join("run_summary.json").exists());

    let good = summary.outcomes.iter().find(|o| o.source.contains("good")).unwrap();
    assert_eq!(good.stage, PipelineStage::Done);
    let bad = summary.outcomes.iter().find(|o| o.source.contains("junk")).unwrap();
    assert_eq!(bad.stage, PipelineStage::ExtractFailed);
}

#[test]
fn test_validation_passes_on_clean_output() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in");
    let output = dir.path().join("out");
    fs::create_dir_all(&input).unwrap();
    write_fixture(
        &input.join("img.ome.btf"),
        DataLayout::Tiled { edge: 64 },
        Some(ome_description()),
    );

    let config = test_config(input, output.clone());
    PipelineOrchestrator::new(config).run_batch().unwrap();

    let report = OutputValidator::new(&output).validate().unwrap();
    assert!(report.passed, "issues: {:?}", report.issues);
    assert_eq!(report.checked_manifests, 1);
    assert_eq!(report.checked_tiles, 20);
    assert!(output.join("validation_report.json").exists());
}

#[test]
fn test_validation_flags_renamed_and_missing_tiles() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in");
    let output = dir.path().join("out");
    fs::create_dir_all(&input).unwrap();
    write_fixture(
        &input.join("img.btf"),
        DataLayout::Tiled { edge: 64 },
        Some(ome_description()),
    );

    let config = test_config(input, output.clone());
    PipelineOrchestrator::new(config).run_batch().unwrap();

    // Rename one tile so the manifest entry is missing and a stray with a
    // bad name appears
    let tiles_dir = output.join("img").join("green_tiles");
    fs::rename(
        tiles_dir.join("img_green_tile_0000_0_0_64x64.tif"),
        tiles_dir.join("renamed.tif"),
    )
    .unwrap();

    let report = OutputValidator::new(&output).validate().unwrap();
    assert!(!report.passed);

    use tilekit::pipeline::IssueKind;
    assert!(report.issues.iter().any(|i| {
        i.kind == IssueKind::TileIntegrity
            && i.filename.as_deref() == Some("img_green_tile_0000_0_0_64x64.tif")
    }));
    assert!(report.issues.iter().any(|i| {
        i.kind == IssueKind::NamingConvention && i.filename.as_deref() == Some("renamed.tif")
    }));

    // The report is persisted even though validation failed
    assert!(output.join("validation_report.json").exists());
}

#[test]
fn test_validation_flags_truncated_tile() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in");
    let output = dir.path().join("out");
    fs::create_dir_all(&input).unwrap();
    write_fixture(
        &input.join("img.btf"),
        DataLayout::Tiled { edge: 64 },
        Some(ome_description()),
    );

    let config = test_config(input, output.clone());
    PipelineOrchestrator::new(config).run_batch().unwrap();

    let victim = output
        .join("img")
        .join("green_tiles")
        .join("img_green_tile_0001_0_64_64x64.tif");
    fs::write(&victim, b"II*\0garbage").unwrap();

    let report = OutputValidator::new(&output).validate().unwrap();
    assert!(!report.passed);
    use tilekit::pipeline::IssueKind;
    assert!(report.issues.iter().any(|i| {
        i.kind == IssueKind::TileIntegrity
            && i.filename.as_deref() == Some("img_green_tile_0001_0_64_64x64.tif")
    }));
}

#[test]
fn test_reassembled_tiles_equal_the_intermediate() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in");
    let output = dir.path().join("out");
    fs::create_dir_all(&input).unwrap();
    write_fixture(
        &input.join("img.btf"),
        DataLayout::Tiled { edge: 64 },
        Some(ome_description()),
    );

    let mut config = test_config(input, output.clone());
    config.cleanup_intermediate = false;
    PipelineOrchestrator::new(config).run_batch().unwrap();

    let mut intermediate = RasterSource::open(&output.join("img").join("img_green.tif")).unwrap();
    let expected = intermediate
        .read_region(None, 0..HEIGHT, 0..WIDTH)
        .unwrap();

    // Place every tile back at its origin and compare pixel-for-pixel
    let manifest = ManifestStore::load(&output.join("img").join("img_metadata.json")).unwrap();
    let tiles_dir = output.join("img").join("green_tiles");
    let mut assembled = vec![0u8; (HEIGHT * WIDTH * 2) as usize];
    for record in &manifest.tiles {
        let (h, w, values) = read_tile_values(&tiles_dir.join(&record.filename));
        assert_eq!((h, w), (record.row_extent, record.col_extent));
        for r in 0..h {
            for c in 0..w {
                let dst = ((record.row_origin + r) * WIDTH + record.col_origin + c) as usize * 2;
                let bytes = values[(r * w + c) as usize].to_le_bytes();
                assembled[dst..dst + 2].copy_from_slice(&bytes);
            }
        }
    }
    assert_eq!(assembled, expected);
}

#[test]
fn test_keep_intermediate_is_not_flagged_by_validation() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in");
    let output = dir.path().join("out");
    fs::create_dir_all(&input).unwrap();
    write_fixture(
        &input.join("img.btf"),
        DataLayout::Tiled { edge: 64 },
        Some(ome_description()),
    );

    let mut config = test_config(input, output.clone());
    config.cleanup_intermediate = false;
    PipelineOrchestrator::new(config).run_batch().unwrap();

    let intermediate = output.join("img").join("img_green.tif");
    assert!(intermediate.exists());

    // The intermediate is a valid single-channel raster of the full plane
    let mut source = RasterSource::open(&intermediate).unwrap();
    assert_eq!((source.info().height, source.info().width), (HEIGHT, WIDTH));
    assert_eq!(source.info().channel_count, 1);
    let row = source.read_region(None, 10..11, 0..WIDTH).unwrap();
    let value = u16::from_le_bytes([row[8], row[9]]);
    assert_eq!(value, 10 + 4);

    // Validation is manifest-driven, so the kept intermediate is fine
    let report = OutputValidator::new(&output).validate().unwrap();
    assert!(report.passed, "issues: {:?}", report.issues);
}
