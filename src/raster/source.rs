//! Raster source abstraction
//!
//! Opens a tiled multi-channel TIFF/BigTIFF, reports its structure and
//! serves arbitrary rectangular reads of one channel or all channels.
//!
//! The files this pipeline targets often carry corrupted OME metadata, so
//! description runs in two tiers: the OME-XML block is inspected first and,
//! when absent or unparsable, the baseline TIFF tags of the first plane are
//! authoritative. Region reads likewise have a preferred tile-intersection
//! decode and a one-shot degraded fallback that decodes the whole plane
//! once, caches it, and serves slices from the cache.

use log::{debug, warn};
use std::fs::File;
use std::io::{BufReader, Read, SeekFrom};
use std::ops::Range;
use std::path::{Path, PathBuf};

use crate::compression::CompressionFactory;
use crate::errors::{PipelineError, PipelineResult};
use crate::io::byte_order::ByteOrder;
use crate::io::seekable::SeekableReader;
use crate::raster::ome;
use crate::raster::types::{AxisOrder, PhysicalScale, PixelType, RasterInfo};
use crate::tiff::constants::{resolution_unit, tags};
use crate::tiff::errors::{TiffError, TiffResult};
use crate::tiff::ifd::IFD;
use crate::tiff::reader::{read_tag_ascii, read_tag_rational, read_tag_values, TiffFile, TiffReader};

/// A source of rectangular pixel reads
///
/// This is the seam between the extraction pipeline and the codec; tests
/// substitute synthetic implementations to observe read patterns.
pub trait RegionSource {
    /// Structural description of the raster
    fn info(&self) -> &RasterInfo;

    /// Physical pixel size, when the source carries one
    fn physical_scale(&self) -> Option<&PhysicalScale>;

    /// Read a rectangular window of pixels
    ///
    /// # Arguments
    /// * `channel` - Channel to extract, or None for all channels interleaved
    /// * `rows`, `cols` - Half-open pixel ranges of the window
    ///
    /// # Returns
    /// Row-major pixel bytes for the window
    fn read_region(
        &mut self,
        channel: Option<usize>,
        rows: Range<u64>,
        cols: Range<u64>,
    ) -> PipelineResult<Vec<u8>>;
}

/// An open TIFF-backed raster source
///
/// The file handle is released when the source is dropped, on every exit
/// path. Reads are served from the first plane except for channel-first
/// sources, where each channel is its own directory.
pub struct RasterSource {
    path: PathBuf,
    reader: BufReader<File>,
    file: TiffFile,
    info: RasterInfo,
    scale: Option<PhysicalScale>,
    /// Fully decoded plane for degraded mode, keyed by plane index
    cached_plane: Option<(usize, Vec<u8>)>,
    degraded_warned: bool,
}

impl RasterSource {
    /// Open a raster file and describe its structure
    ///
    /// # Arguments
    /// * `path` - Path to a TIFF/BigTIFF file
    ///
    /// # Returns
    /// An open source, or SourceOpen when the file is missing, unreadable
    /// or structurally unparseable
    pub fn open(path: &Path) -> PipelineResult<Self> {
        let file = File::open(path)
            .map_err(|e| PipelineError::SourceOpen(format!("{}: {}", path.display(), e)))?;
        let mut reader = BufReader::with_capacity(1024 * 1024, file);

        let tiff = TiffReader::new()
            .read(&mut reader)
            .map_err(|e| PipelineError::SourceOpen(format!("{}: {}", path.display(), e)))?;

        let (info, scale) = Self::describe(&mut reader, &tiff, path)?;
        debug!("Opened {}: {}x{}, {} channel(s), axes {}, {}",
               path.display(), info.height, info.width, info.channel_count,
               info.axis_order.name(), info.pixel_type);

        Ok(RasterSource {
            path: path.to_path_buf(),
            reader,
            file: tiff,
            info,
            scale,
            cached_plane: None,
            degraded_warned: false,
        })
    }

    /// Path this source was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Two-tier structural description
    ///
    /// The OME-XML block is the primary inspection path. When it is absent
    /// or unparsable the baseline tags of the first plane decide, with the
    /// channel layout classified from the sample count: a trailing sample
    /// dimension of 3 or 4 means channel-interleaved, a single sample means
    /// a single-channel plane.
    fn describe(
        reader: &mut dyn SeekableReader,
        tiff: &TiffFile,
        path: &Path,
    ) -> PipelineResult<(RasterInfo, Option<PhysicalScale>)> {
        let ifd = tiff
            .main_ifd()
            .ok_or_else(|| PipelineError::SourceOpen("File has no image directory".to_string()))?;

        let (width, height) = ifd
            .get_dimensions()
            .ok_or_else(|| PipelineError::SourceOpen(format!("{}: missing dimensions", path.display())))?;
        if width == 0 || height == 0 {
            return Err(PipelineError::SourceOpen(format!("{}: empty image", path.display())));
        }

        let samples = ifd.get_samples_per_pixel() as usize;
        let pixel_type = plane_pixel_type(reader, tiff, ifd)
            .map_err(|e| PipelineError::SourceOpen(format!("{}: {}", path.display(), e)))?;

        let ome_info = match ifd.get_entry(tags::IMAGE_DESCRIPTION) {
            Some(entry) => match read_tag_ascii(reader, tiff, entry) {
                Ok(text) => match ome::parse_ome(&text) {
                    Ok(parsed) => Some(parsed),
                    Err(e) => {
                        warn!("{}: corrupted structural metadata ({}), falling back to plane inspection",
                              path.display(), e);
                        None
                    }
                },
                Err(e) => {
                    warn!("{}: unreadable description ({}), falling back to plane inspection",
                          path.display(), e);
                    None
                }
            },
            None => None,
        };

        let (axis_order, channel_count) = match samples {
            3 | 4 => (AxisOrder::InterleavedLast, samples),
            1 => match ome_info.as_ref().and_then(|o| o.size_c) {
                Some(c) if c > 1 && tiff.ifd_count() >= c => (AxisOrder::ChannelFirst, c),
                _ => (AxisOrder::SingleChannel, 1),
            },
            n => (AxisOrder::InterleavedLast, n),
        };

        if let Some(o) = &ome_info {
            if o.size_x.map_or(false, |x| x != width) || o.size_y.map_or(false, |y| y != height) {
                warn!("{}: OME dimensions disagree with TIFF tags, trusting tags", path.display());
            }
        }

        let scale = ome_info
            .and_then(|o| o.scale)
            .or_else(|| resolution_scale(reader, tiff, ifd));

        Ok((
            RasterInfo {
                height,
                width,
                channel_count,
                axis_order,
                pixel_type,
            },
            scale,
        ))
    }

    /// Resolve which plane a read targets and whether a sample must be
    /// selected out of interleaved data
    fn plane_for_channel(&self, channel: Option<usize>) -> (usize, Option<usize>) {
        match self.info.axis_order {
            AxisOrder::SingleChannel => (0, None),
            AxisOrder::InterleavedLast => (0, channel),
            AxisOrder::ChannelFirst => (channel.unwrap_or(0), None),
        }
    }

    /// Decode the requested plane in full and serve from the cache
    ///
    /// This defeats the memory bound and is used at most once per open
    /// handle, only when the preferred path is unavailable.
    fn degraded_read(
        &mut self,
        plane: usize,
        sample: Option<usize>,
        rows: Range<u64>,
        cols: Range<u64>,
    ) -> PipelineResult<Vec<u8>> {
        if !self.degraded_warned {
            warn!("{}: degraded read mode, decoding entire plane {} once",
                  self.path.display(), plane);
            self.degraded_warned = true;
        }

        if self.cached_plane.as_ref().map(|(p, _)| *p) != Some(plane) {
            let ifd = self.file.ifds.get(plane).ok_or_else(|| {
                PipelineError::RegionRead(format!("Plane {} not present in file", plane))
            })?;
            let data = decode_full_plane(&mut self.reader, &self.file, ifd)
                .map_err(|e| PipelineError::RegionRead(format!("{}: {}", self.path.display(), e)))?;
            self.cached_plane = Some((plane, data));
        }

        let spp = self.file.ifds[plane].get_samples_per_pixel() as usize;
        match &self.cached_plane {
            Some((p, data)) if *p == plane => Ok(slice_from_plane(
                data,
                self.info.width,
                spp,
                self.info.pixel_type.bytes_per_sample(),
                rows,
                cols,
                sample,
            )),
            _ => Err(PipelineError::RegionRead("Plane cache missing after decode".to_string())),
        }
    }
}

impl RegionSource for RasterSource {
    fn info(&self) -> &RasterInfo {
        &self.info
    }

    fn physical_scale(&self) -> Option<&PhysicalScale> {
        self.scale.as_ref()
    }

    fn read_region(
        &mut self,
        channel: Option<usize>,
        rows: Range<u64>,
        cols: Range<u64>,
    ) -> PipelineResult<Vec<u8>> {
        if rows.start >= rows.end || cols.start >= cols.end
            || rows.end > self.info.height || cols.end > self.info.width
        {
            return Err(PipelineError::RegionRead(format!(
                "Region rows {}..{} cols {}..{} outside {}x{} image",
                rows.start, rows.end, cols.start, cols.end, self.info.height, self.info.width
            )));
        }
        if let Some(c) = channel {
            if c >= self.info.channel_count {
                return Err(PipelineError::InvalidChannel {
                    requested: c,
                    available: self.info.channel_count,
                });
            }
        }

        let (plane, sample) = self.plane_for_channel(channel);

        // Serve from the cache if a degraded decode already happened
        if self.cached_plane.as_ref().map(|(p, _)| *p) == Some(plane) {
            return self.degraded_read(plane, sample, rows, cols);
        }

        let ifd = self.file.ifds.get(plane).ok_or_else(|| {
            PipelineError::RegionRead(format!("Plane {} not present in file", plane))
        })?;

        if ifd.is_tiled() {
            let reader: &mut BufReader<File> = &mut self.reader;
            match decode_region_tiled(
                reader,
                &self.file,
                ifd,
                rows.clone(),
                cols.clone(),
                sample,
                self.info.pixel_type.bytes_per_sample(),
            ) {
                Ok(data) => return Ok(data),
                Err(e) => {
                    warn!("{}: tile decode failed ({}), trying degraded path", self.path.display(), e);
                }
            }
        }

        // Strip-organized sources and failed tile decodes both land here
        self.degraded_read(plane, sample, rows, cols)
    }
}

/// Pixel type of a plane from its BitsPerSample / SampleFormat tags
fn plane_pixel_type(
    reader: &mut dyn SeekableReader,
    tiff: &TiffFile,
    ifd: &IFD,
) -> TiffResult<PixelType> {
    let bits = match ifd.get_entry(tags::BITS_PER_SAMPLE) {
        Some(entry) => *read_tag_values(reader, tiff, entry)?
            .first()
            .ok_or(TiffError::GenericError("Empty BitsPerSample".to_string()))? as u16,
        None => 8,
    };
    let format = match ifd.get_entry(tags::SAMPLE_FORMAT) {
        Some(entry) => *read_tag_values(reader, tiff, entry)?
            .first()
            .unwrap_or(&1) as u16,
        None => 1,
    };
    PixelType::from_tags(bits, format)
}

/// Physical scale from the TIFF resolution tags, in micrometers
///
/// Only pixels-per-centimeter resolutions are convertible; anything else is
/// treated as absent rather than guessed at.
fn resolution_scale(
    reader: &mut dyn SeekableReader,
    tiff: &TiffFile,
    ifd: &IFD,
) -> Option<PhysicalScale> {
    if ifd.get_tag_value(tags::RESOLUTION_UNIT)? != resolution_unit::CENTIMETER as u64 {
        return None;
    }
    let x = read_tag_rational(reader, tiff, ifd.get_entry(tags::X_RESOLUTION)?).ok()?;
    let y = read_tag_rational(reader, tiff, ifd.get_entry(tags::Y_RESOLUTION)?).ok()?;
    if x.0 == 0 || x.1 == 0 || y.0 == 0 || y.1 == 0 {
        return None;
    }
    // pixels/cm back to um/pixel
    Some(PhysicalScale {
        pixel_size_x: 10_000.0 * x.1 as f64 / x.0 as f64,
        pixel_size_y: 10_000.0 * y.1 as f64 / y.0 as f64,
        unit: "um".to_string(),
    })
}

/// Decode only the tiles intersecting the requested window
fn decode_region_tiled(
    reader: &mut dyn SeekableReader,
    tiff: &TiffFile,
    ifd: &IFD,
    rows: Range<u64>,
    cols: Range<u64>,
    sample: Option<usize>,
    bytes_per_sample: usize,
) -> TiffResult<Vec<u8>> {
    let (width, _) = ifd.get_dimensions().ok_or(TiffError::MissingDimensions)?;
    let (tile_w, tile_h) = ifd
        .get_tile_dimensions()
        .ok_or(TiffError::GenericError("Tiled plane lacks tile dimensions".to_string()))?;
    let spp = ifd.get_samples_per_pixel() as usize;

    let offsets_entry = ifd.get_entry(tags::TILE_OFFSETS).ok_or(TiffError::TagNotFound(tags::TILE_OFFSETS))?;
    let counts_entry = ifd
        .get_entry(tags::TILE_BYTE_COUNTS)
        .ok_or(TiffError::TagNotFound(tags::TILE_BYTE_COUNTS))?;
    let offsets = read_tag_values(reader, tiff, offsets_entry)?;
    let byte_counts = read_tag_values(reader, tiff, counts_entry)?;

    let handler = CompressionFactory::create_handler(ifd.get_compression())?;
    let tiles_across = (width + tile_w - 1) / tile_w;

    let out_cols = (cols.end - cols.start) as usize;
    let out_rows = (rows.end - rows.start) as usize;
    let out_px = sample.map_or(spp, |_| 1) * bytes_per_sample;
    let mut out = vec![0u8; out_rows * out_cols * out_px];

    let tile_px = spp * bytes_per_sample;
    let tile_bytes = (tile_w * tile_h) as usize * tile_px;

    for tile_row in rows.start / tile_h..=(rows.end - 1) / tile_h {
        for tile_col in cols.start / tile_w..=(cols.end - 1) / tile_w {
            let index = (tile_row * tiles_across + tile_col) as usize;
            if index >= offsets.len() || index >= byte_counts.len() {
                return Err(TiffError::GenericError(format!(
                    "Tile index {} beyond offset table ({} tiles)", index, offsets.len()
                )));
            }

            reader.seek(SeekFrom::Start(offsets[index]))?;
            let mut compressed = vec![0u8; byte_counts[index] as usize];
            reader.read_exact(&mut compressed)?;
            let mut data = handler.decompress(&compressed)?;
            if data.len() < tile_bytes {
                return Err(TiffError::GenericError(format!(
                    "Tile {} decoded to {} bytes, expected {}", index, data.len(), tile_bytes
                )));
            }
            if tiff.byte_order == ByteOrder::BigEndian && bytes_per_sample > 1 {
                swap_sample_bytes(&mut data, bytes_per_sample);
            }

            let r0 = rows.start.max(tile_row * tile_h);
            let r1 = rows.end.min(tile_row * tile_h + tile_h);
            let c0 = cols.start.max(tile_col * tile_w);
            let c1 = cols.end.min(tile_col * tile_w + tile_w);

            for r in r0..r1 {
                let tile_r = (r - tile_row * tile_h) as usize;
                let out_r = (r - rows.start) as usize;
                match sample {
                    Some(s) => {
                        for c in c0..c1 {
                            let tile_c = (c - tile_col * tile_w) as usize;
                            let src = (tile_r * tile_w as usize + tile_c) * tile_px + s * bytes_per_sample;
                            let dst = (out_r * out_cols + (c - cols.start) as usize) * bytes_per_sample;
                            out[dst..dst + bytes_per_sample]
                                .copy_from_slice(&data[src..src + bytes_per_sample]);
                        }
                    }
                    None => {
                        let tile_c = (c0 - tile_col * tile_w) as usize;
                        let src = (tile_r * tile_w as usize + tile_c) * tile_px;
                        let len = (c1 - c0) as usize * tile_px;
                        let dst = (out_r * out_cols + (c0 - cols.start) as usize) * tile_px;
                        out[dst..dst + len].copy_from_slice(&data[src..src + len]);
                    }
                }
            }
        }
    }

    Ok(out)
}

/// Decode an entire plane, tiled or stripped, into an interleaved buffer
fn decode_full_plane(
    reader: &mut dyn SeekableReader,
    tiff: &TiffFile,
    ifd: &IFD,
) -> TiffResult<Vec<u8>> {
    let (width, height) = ifd.get_dimensions().ok_or(TiffError::MissingDimensions)?;

    let bytes_per_sample = plane_pixel_type(reader, tiff, ifd)?.bytes_per_sample();

    if ifd.is_tiled() {
        return decode_region_tiled(reader, tiff, ifd, 0..height, 0..width, None, bytes_per_sample);
    }

    let spp = ifd.get_samples_per_pixel() as usize;
    let row_bytes = width as usize * spp * bytes_per_sample;

    let offsets_entry = ifd
        .get_entry(tags::STRIP_OFFSETS)
        .ok_or(TiffError::TagNotFound(tags::STRIP_OFFSETS))?;
    let counts_entry = ifd
        .get_entry(tags::STRIP_BYTE_COUNTS)
        .ok_or(TiffError::TagNotFound(tags::STRIP_BYTE_COUNTS))?;
    let offsets = read_tag_values(reader, tiff, offsets_entry)?;
    let byte_counts = read_tag_values(reader, tiff, counts_entry)?;

    let rows_per_strip = ifd.get_rows_per_strip().min(height);
    let strip_count = ((height + rows_per_strip - 1) / rows_per_strip) as usize;
    if offsets.len() < strip_count || byte_counts.len() < strip_count {
        return Err(TiffError::GenericError(format!(
            "Strip table has {} entries, {} strips expected", offsets.len(), strip_count
        )));
    }

    let handler = CompressionFactory::create_handler(ifd.get_compression())?;
    let mut plane = vec![0u8; height as usize * row_bytes];

    for strip in 0..strip_count {
        let row0 = strip as u64 * rows_per_strip;
        let strip_rows = rows_per_strip.min(height - row0) as usize;

        reader.seek(SeekFrom::Start(offsets[strip]))?;
        let mut compressed = vec![0u8; byte_counts[strip] as usize];
        reader.read_exact(&mut compressed)?;
        let mut data = handler.decompress(&compressed)?;

        let expected = strip_rows * row_bytes;
        if data.len() < expected {
            return Err(TiffError::GenericError(format!(
                "Strip {} decoded to {} bytes, expected {}", strip, data.len(), expected
            )));
        }
        if tiff.byte_order == ByteOrder::BigEndian && bytes_per_sample > 1 {
            swap_sample_bytes(&mut data, bytes_per_sample);
        }

        let dst = row0 as usize * row_bytes;
        plane[dst..dst + expected].copy_from_slice(&data[..expected]);
    }

    Ok(plane)
}

/// Slice a window (optionally one sample) out of a decoded plane
fn slice_from_plane(
    plane: &[u8],
    width: u64,
    spp: usize,
    bytes_per_sample: usize,
    rows: Range<u64>,
    cols: Range<u64>,
    sample: Option<usize>,
) -> Vec<u8> {
    let stride = width as usize * spp * bytes_per_sample;
    let out_cols = (cols.end - cols.start) as usize;
    let out_px = sample.map_or(spp, |_| 1) * bytes_per_sample;
    let mut out = Vec::with_capacity((rows.end - rows.start) as usize * out_cols * out_px);

    for r in rows {
        let row = &plane[r as usize * stride..(r + 1) as usize * stride];
        match sample {
            Some(s) => {
                for c in cols.clone() {
                    let src = c as usize * spp * bytes_per_sample + s * bytes_per_sample;
                    out.extend_from_slice(&row[src..src + bytes_per_sample]);
                }
            }
            None => {
                let src = cols.start as usize * spp * bytes_per_sample;
                out.extend_from_slice(&row[src..src + out_cols * spp * bytes_per_sample]);
            }
        }
    }
    out
}

/// Reverse bytes within each sample, for big-endian sources
fn swap_sample_bytes(data: &mut [u8], sample_size: usize) {
    for chunk in data.chunks_exact_mut(sample_size) {
        chunk.reverse();
    }
}
