//! Tile grid partitioning
//!
//! Pure geometry: given plane dimensions and a tile edge, produce the
//! row-major list of tile rectangles. Edge tiles are clipped to the image
//! bounds, never padded, so every pixel belongs to exactly one tile.

use crate::errors::{PipelineError, PipelineResult};

/// One tile's position in the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileSpec {
    /// Sequential id, row-major from the top-left tile
    pub tile_id: usize,
    /// Top row of the tile in plane coordinates
    pub row_origin: u64,
    /// Left column of the tile in plane coordinates
    pub col_origin: u64,
    /// Tile height in pixels (clipped at the bottom edge)
    pub row_extent: u64,
    /// Tile width in pixels (clipped at the right edge)
    pub col_extent: u64,
}

/// Partition a plane into a row-major grid of tiles
///
/// # Arguments
/// * `height`, `width` - Plane dimensions in pixels
/// * `tile_edge` - Nominal square tile edge in pixels
///
/// # Returns
/// Tile rectangles ordered by id; deterministic for given inputs
pub fn partition(height: u64, width: u64, tile_edge: u64) -> PipelineResult<Vec<TileSpec>> {
    if tile_edge == 0 {
        return Err(PipelineError::Config("Tile edge must be positive".to_string()));
    }
    if height == 0 || width == 0 {
        return Err(PipelineError::Config(format!(
            "Cannot partition an empty {}x{} plane", height, width
        )));
    }

    let mut tiles = Vec::new();
    let mut tile_id = 0;
    let mut row = 0;
    while row < height {
        let mut col = 0;
        while col < width {
            tiles.push(TileSpec {
                tile_id,
                row_origin: row,
                col_origin: col,
                row_extent: tile_edge.min(height - row),
                col_extent: tile_edge.min(width - col),
            });
            tile_id += 1;
            col += tile_edge;
        }
        row += tile_edge;
    }
    Ok(tiles)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_grid() {
        let tiles = partition(4096, 4096, 2048).unwrap();
        assert_eq!(tiles.len(), 4);
        assert!(tiles.iter().all(|t| t.row_extent == 2048 && t.col_extent == 2048));
        assert_eq!(tiles[3].row_origin, 2048);
        assert_eq!(tiles[3].col_origin, 2048);
    }

    #[test]
    fn test_clipped_edges() {
        let tiles = partition(10000, 10000, 2048).unwrap();
        assert_eq!(tiles.len(), 25);

        let first = tiles[0];
        assert_eq!((first.tile_id, first.row_origin, first.col_origin), (0, 0, 0));
        assert_eq!((first.row_extent, first.col_extent), (2048, 2048));

        let last = tiles[24];
        assert_eq!((last.tile_id, last.row_origin, last.col_origin), (24, 8192, 8192));
        assert_eq!((last.row_extent, last.col_extent), (1808, 1808));
    }

    #[test]
    fn test_tile_larger_than_image() {
        let tiles = partition(100, 70, 2048).unwrap();
        assert_eq!(tiles.len(), 1);
        assert_eq!((tiles[0].row_extent, tiles[0].col_extent), (100, 70));
    }

    #[test]
    fn test_full_coverage_no_overlap() {
        let (height, width, edge) = (5000, 3000, 1024);
        let tiles = partition(height, width, edge).unwrap();

        let area: u64 = tiles.iter().map(|t| t.row_extent * t.col_extent).sum();
        assert_eq!(area, height * width);

        // Row-major id order
        for (i, tile) in tiles.iter().enumerate() {
            assert_eq!(tile.tile_id, i);
        }
        let mut sorted = tiles.clone();
        sorted.sort_by_key(|t| (t.row_origin, t.col_origin));
        assert_eq!(sorted, tiles);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(partition(100, 100, 0).is_err());
        assert!(partition(0, 100, 64).is_err());
    }
}
