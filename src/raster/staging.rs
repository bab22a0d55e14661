//! On-disk staging buffer for extracted channel data
//!
//! Pass 1 lands each extracted band here instead of holding the whole
//! channel plane in memory. The buffer is a flat row-major file sized up
//! front, written band by band, then read back as a PixelProvider while the
//! intermediate raster is written out. The backing file is removed when the
//! buffer is dropped, on every exit path.

use log::{debug, warn};
use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::errors::{PipelineError, PipelineResult};
use crate::tiff::errors::{TiffError, TiffResult};
use crate::tiff::PixelProvider;

/// A single-channel plane staged on disk
pub struct StagingBuffer {
    path: PathBuf,
    file: std::fs::File,
    height: u64,
    width: u64,
    pixel_bytes: usize,
}

impl StagingBuffer {
    /// Create a staging file sized for the full plane
    ///
    /// # Arguments
    /// * `path` - Location of the backing file
    /// * `height`, `width` - Plane dimensions in pixels
    /// * `pixel_bytes` - Bytes per pixel
    pub fn create(path: &Path, height: u64, width: u64, pixel_bytes: usize) -> PipelineResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| PipelineError::Extraction(format!("Cannot create staging file {}: {}",
                                                           path.display(), e)))?;

        let total = height * width * pixel_bytes as u64;
        file.set_len(total)
            .map_err(|e| PipelineError::Extraction(format!("Cannot size staging file to {} bytes: {}",
                                                           total, e)))?;
        debug!("Staging buffer at {} ({} bytes)", path.display(), total);

        Ok(StagingBuffer { path: path.to_path_buf(), file, height, width, pixel_bytes })
    }

    /// Write a full-width band of rows starting at `row0`
    pub fn write_band(&mut self, row0: u64, rows: u64, data: &[u8]) -> PipelineResult<()> {
        let row_bytes = self.width * self.pixel_bytes as u64;
        let expected = (rows * row_bytes) as usize;
        if data.len() != expected {
            return Err(PipelineError::Extraction(format!(
                "Band of {} rows should be {} bytes, got {}", rows, expected, data.len()
            )));
        }
        if row0 + rows > self.height {
            return Err(PipelineError::Extraction(format!(
                "Band rows {}..{} exceed plane height {}", row0, row0 + rows, self.height
            )));
        }

        self.file.seek(SeekFrom::Start(row0 * row_bytes))?;
        self.file.write_all(data)?;
        Ok(())
    }

    /// Plane height in pixels
    pub fn height(&self) -> u64 {
        self.height
    }

    /// Plane width in pixels
    pub fn width(&self) -> u64 {
        self.width
    }
}

impl PixelProvider for StagingBuffer {
    fn fetch(&mut self, row0: u64, col0: u64, rows: u64, cols: u64) -> TiffResult<Vec<u8>> {
        if row0 + rows > self.height || col0 + cols > self.width {
            return Err(TiffError::GenericError(format!(
                "Staging window rows {}..{} cols {}..{} exceeds {}x{} plane",
                row0, row0 + rows, col0, col0 + cols, self.height, self.width
            )));
        }

        let stride = self.width * self.pixel_bytes as u64;
        let row_bytes = (cols as usize) * self.pixel_bytes;
        let mut out = vec![0u8; rows as usize * row_bytes];

        if col0 == 0 && cols == self.width {
            // Full-width windows are one contiguous read
            self.file.seek(SeekFrom::Start(row0 * stride))?;
            self.file.read_exact(&mut out)?;
        } else {
            for r in 0..rows {
                let offset = (row0 + r) * stride + col0 * self.pixel_bytes as u64;
                self.file.seek(SeekFrom::Start(offset))?;
                self.file
                    .read_exact(&mut out[r as usize * row_bytes..(r as usize + 1) * row_bytes])?;
            }
        }
        Ok(out)
    }
}

impl Drop for StagingBuffer {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Could not remove staging file {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_band_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stage.raw");
        let mut buffer = StagingBuffer::create(&path, 4, 3, 2).unwrap();

        buffer.write_band(0, 2, &[1u8; 12]).unwrap();
        buffer.write_band(2, 2, &[2u8; 12]).unwrap();

        let top = buffer.fetch(0, 0, 2, 3).unwrap();
        assert_eq!(top, vec![1u8; 12]);
        let window = buffer.fetch(1, 1, 2, 2).unwrap();
        assert_eq!(window, vec![1, 1, 1, 1, 2, 2, 2, 2]);
    }

    #[test]
    fn test_band_size_mismatch() {
        let dir = tempdir().unwrap();
        let mut buffer = StagingBuffer::create(&dir.path().join("stage.raw"), 4, 3, 2).unwrap();
        assert!(buffer.write_band(0, 2, &[0u8; 5]).is_err());
        assert!(buffer.write_band(3, 2, &[0u8; 12]).is_err());
    }

    #[test]
    fn test_backing_file_removed_on_drop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stage.raw");
        {
            let _buffer = StagingBuffer::create(&path, 2, 2, 1).unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }
}
