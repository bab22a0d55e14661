//! File and directory naming conventions
//!
//! Every artifact name a run produces, and the parser the validator uses to
//! check tile names, live here so the convention exists in exactly one place.
//!
//! Tile files are named
//! `{stem}_{channel}_tile_{id:04}_{row}_{col}_{height}x{width}.tif`
//! where row/col are the tile's pixel origin in the source plane.

use lazy_static::lazy_static;
use regex::Regex;
use std::path::{Path, PathBuf};

lazy_static! {
    static ref TILE_NAME: Regex =
        Regex::new(r"^(?P<stem>.+)_(?P<channel>[a-z0-9]+)_tile_(?P<id>\d{4,})_(?P<row>\d+)_(?P<col>\d+)_(?P<height>\d+)x(?P<width>\d+)\.tif$")
            .expect("tile name pattern is valid");
}

/// Conventional name for a channel index
///
/// The first three indices use the RGB color names common in the source
/// imagery; anything beyond that is numbered.
pub fn channel_name(index: usize) -> String {
    match index {
        0 => "red".to_string(),
        1 => "green".to_string(),
        2 => "blue".to_string(),
        n => format!("ch{}", n),
    }
}

/// Base name of a source file with extensions stripped
///
/// Handles the double extension of OME files: `slide.ome.btf` has the
/// stem `slide`, not `slide.ome`.
pub fn source_stem(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match stem.strip_suffix(".ome") {
        Some(base) => base.to_string(),
        None => stem,
    }
}

/// Directory holding all artifacts derived from one source file
pub fn output_dir(output_root: &Path, stem: &str) -> PathBuf {
    output_root.join(stem)
}

/// Directory holding the tiles of one extracted channel
pub fn tiles_dir(output_root: &Path, stem: &str, channel: &str) -> PathBuf {
    output_dir(output_root, stem).join(format!("{}_tiles", channel))
}

/// Name of the intermediate single-channel raster
pub fn intermediate_name(stem: &str, channel: &str) -> String {
    format!("{}_{}.tif", stem, channel)
}

/// Name of the staging file used while extracting a channel
pub fn staging_name(stem: &str, channel: &str) -> String {
    format!("{}_{}.staging", stem, channel)
}

/// Name of the per-file processing manifest
pub fn manifest_name(stem: &str) -> String {
    format!("{}_metadata.json", stem)
}

/// Build a tile filename from its grid position
pub fn tile_name(
    stem: &str,
    channel: &str,
    tile_id: usize,
    row_origin: u64,
    col_origin: u64,
    row_extent: u64,
    col_extent: u64,
) -> String {
    format!(
        "{}_{}_tile_{:04}_{}_{}_{}x{}.tif",
        stem, channel, tile_id, row_origin, col_origin, row_extent, col_extent
    )
}

/// Fields recovered from a tile filename
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTileName {
    pub stem: String,
    pub channel: String,
    pub tile_id: usize,
    pub row_origin: u64,
    pub col_origin: u64,
    pub row_extent: u64,
    pub col_extent: u64,
}

/// Parse a tile filename, or None when it does not follow the convention
pub fn parse_tile_name(name: &str) -> Option<ParsedTileName> {
    let captures = TILE_NAME.captures(name)?;
    Some(ParsedTileName {
        stem: captures["stem"].to_string(),
        channel: captures["channel"].to_string(),
        tile_id: captures["id"].parse().ok()?,
        row_origin: captures["row"].parse().ok()?,
        col_origin: captures["col"].parse().ok()?,
        row_extent: captures["height"].parse().ok()?,
        col_extent: captures["width"].parse().ok()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_names() {
        assert_eq!(channel_name(0), "red");
        assert_eq!(channel_name(1), "green");
        assert_eq!(channel_name(2), "blue");
        assert_eq!(channel_name(5), "ch5");
    }

    #[test]
    fn test_source_stem_strips_ome() {
        assert_eq!(source_stem(Path::new("/data/slide.ome.btf")), "slide");
        assert_eq!(source_stem(Path::new("img.btf")), "img");
        assert_eq!(source_stem(Path::new("scan.tiff")), "scan");
    }

    #[test]
    fn test_tile_name_round_trip() {
        let name = tile_name("img", "green", 24, 8192, 8192, 1808, 1808);
        assert_eq!(name, "img_green_tile_0024_8192_8192_1808x1808.tif");

        let parsed = parse_tile_name(&name).unwrap();
        assert_eq!(parsed.stem, "img");
        assert_eq!(parsed.channel, "green");
        assert_eq!(parsed.tile_id, 24);
        assert_eq!(parsed.row_origin, 8192);
        assert_eq!(parsed.col_origin, 8192);
        assert_eq!((parsed.row_extent, parsed.col_extent), (1808, 1808));
    }

    #[test]
    fn test_stem_with_underscores_parses() {
        let name = tile_name("my_long_name", "ch7", 0, 0, 0, 2048, 2048);
        let parsed = parse_tile_name(&name).unwrap();
        assert_eq!(parsed.stem, "my_long_name");
        assert_eq!(parsed.channel, "ch7");
    }

    #[test]
    fn test_malformed_names_rejected() {
        assert!(parse_tile_name("img_green_tile_0000_0_0_2048x2048.png").is_none());
        assert!(parse_tile_name("img_green_0000_0_0_2048x2048.tif").is_none());
        assert!(parse_tile_name("img_green_tile_12_0_0_2048x2048.tif").is_none());
        assert!(parse_tile_name("random.tif").is_none());
    }
}
