//! TIFF file writing
//!
//! Streams pixel data out as a classic TIFF or BigTIFF file, organized as
//! compressed tiles (the pipeline's output layout) or strips. Data is pulled
//! chunk by chunk from a PixelProvider so the whole image never has to be
//! resident in memory; one tile or strip at a time is staged, compressed and
//! written.
//!
//! Output is always little-endian. Writing a valid TIFF requires careful
//! management of offsets and value placement: tile data first, then external
//! tag values, then the IFD, and finally the header is patched with the IFD
//! offset.

use byteorder::{LittleEndian, WriteBytesExt};
use log::debug;
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use crate::compression::CompressionFactory;
use crate::tiff::constants::{field_types, header, planar_config, resolution_unit, tags};
use crate::tiff::errors::{TiffError, TiffResult};

/// How pixel data is organized in the output file
#[derive(Debug, Clone, Copy)]
pub enum DataLayout {
    /// Square tiles with the given edge length in pixels
    Tiled { edge: u32 },
    /// Horizontal strips of the given height in rows
    Strips { rows_per_strip: u64 },
}

/// Parameters for a raster write
#[derive(Debug, Clone)]
pub struct TiffWriteOptions {
    /// Write BigTIFF (64-bit offsets) instead of classic TIFF
    pub big_tiff: bool,
    /// TIFF compression code (1 = none, 8 = deflate, 14 = zstd)
    pub compression: u64,
    /// Photometric interpretation value
    pub photometric: u16,
    /// Tile or strip organization
    pub layout: DataLayout,
    /// Optional ImageDescription text (OME-XML block)
    pub description: Option<String>,
    /// Optional resolution in pixels per centimeter (x, y)
    pub resolution_cm: Option<(f64, f64)>,
}

/// Source of pixel data for a write
///
/// Implementations hand back interleaved pixel bytes for a rectangular
/// window. The writer only ever asks for one tile or strip at a time, which
/// is what keeps the write path's memory bounded.
pub trait PixelProvider {
    /// Fetch pixel bytes for `rows` rows starting at `row0` and `cols`
    /// columns starting at `col0`, row-major, channels interleaved
    fn fetch(&mut self, row0: u64, col0: u64, rows: u64, cols: u64) -> TiffResult<Vec<u8>>;
}

/// A pending tag with its value bytes already encoded little-endian
struct RawTag {
    tag: u16,
    field_type: u16,
    count: u64,
    data: Vec<u8>,
}

impl RawTag {
    fn shorts(tag: u16, values: &[u16]) -> Self {
        let mut data = Vec::with_capacity(values.len() * 2);
        for v in values {
            data.extend_from_slice(&v.to_le_bytes());
        }
        RawTag { tag, field_type: field_types::SHORT, count: values.len() as u64, data }
    }

    fn short(tag: u16, value: u16) -> Self {
        Self::shorts(tag, &[value])
    }

    fn long(tag: u16, value: u64) -> TiffResult<Self> {
        let v = u32::try_from(value)
            .map_err(|_| TiffError::GenericError(format!("Tag {} value {} exceeds LONG", tag, value)))?;
        Ok(RawTag {
            tag,
            field_type: field_types::LONG,
            count: 1,
            data: v.to_le_bytes().to_vec(),
        })
    }

    fn offsets(tag: u16, values: &[u64], big_tiff: bool) -> TiffResult<Self> {
        let mut data = Vec::new();
        if big_tiff {
            for v in values {
                data.extend_from_slice(&v.to_le_bytes());
            }
            Ok(RawTag { tag, field_type: field_types::LONG8, count: values.len() as u64, data })
        } else {
            for v in values {
                let v = u32::try_from(*v).map_err(|_| {
                    TiffError::GenericError("Offset exceeds 4 GiB; classic TIFF cannot hold this file".to_string())
                })?;
                data.extend_from_slice(&v.to_le_bytes());
            }
            Ok(RawTag { tag, field_type: field_types::LONG, count: values.len() as u64, data })
        }
    }

    fn ascii(tag: u16, text: &str) -> Self {
        let mut data = text.as_bytes().to_vec();
        data.push(0);
        RawTag { tag, field_type: field_types::ASCII, count: data.len() as u64, data }
    }

    fn rational(tag: u16, numerator: u32, denominator: u32) -> Self {
        let mut data = Vec::with_capacity(8);
        data.extend_from_slice(&numerator.to_le_bytes());
        data.extend_from_slice(&denominator.to_le_bytes());
        RawTag { tag, field_type: field_types::RATIONAL, count: 1, data }
    }
}

/// Writes rasters as tiled or stripped TIFF/BigTIFF files
pub struct TiffWriter;

impl TiffWriter {
    /// Write a complete raster file, pulling pixel data from the provider
    ///
    /// # Arguments
    /// * `path` - Output file path
    /// * `height`, `width` - Image dimensions in pixels
    /// * `samples_per_pixel` - Channel count (interleaved)
    /// * `bits_per_sample` - Bits per channel sample (8, 16, 32 or 64)
    /// * `sample_format` - TIFF sample format (1 = unsigned, 3 = float)
    /// * `provider` - Source of pixel bytes
    /// * `options` - Layout, compression and metadata parameters
    ///
    /// # Returns
    /// The total number of bytes written
    pub fn write_raster(
        path: &Path,
        height: u64,
        width: u64,
        samples_per_pixel: u16,
        bits_per_sample: u16,
        sample_format: u16,
        provider: &mut dyn PixelProvider,
        options: &TiffWriteOptions,
    ) -> TiffResult<u64> {
        if height == 0 || width == 0 {
            return Err(TiffError::MissingDimensions);
        }

        debug!("Writing {}x{} raster ({} channels, {} bits) to {}",
               height, width, samples_per_pixel, bits_per_sample, path.display());

        let file = File::create(path)?;
        let mut writer = BufWriter::with_capacity(1024 * 1024, file);
        let handler = CompressionFactory::create_handler(options.compression)?;

        let mut pos = Self::write_header(&mut writer, options.big_tiff)?;
        let pixel_bytes = (bits_per_sample as usize / 8) * samples_per_pixel as usize;

        // Pixel data blocks come first; offsets are recorded as we go
        let mut chunk_offsets = Vec::new();
        let mut chunk_byte_counts = Vec::new();

        match options.layout {
            DataLayout::Tiled { edge } => {
                let edge = edge as u64;
                let tiles_down = (height + edge - 1) / edge;
                let tiles_across = (width + edge - 1) / edge;

                for tile_row in 0..tiles_down {
                    for tile_col in 0..tiles_across {
                        let row0 = tile_row * edge;
                        let col0 = tile_col * edge;
                        let rows = edge.min(height - row0);
                        let cols = edge.min(width - col0);

                        let region = provider.fetch(row0, col0, rows, cols)?;
                        Self::check_region_len(&region, rows, cols, pixel_bytes)?;

                        // Edge tiles are zero-padded to the full tile size
                        let row_bytes = cols as usize * pixel_bytes;
                        let tile_stride = edge as usize * pixel_bytes;
                        let mut tile = vec![0u8; tile_stride * edge as usize];
                        for r in 0..rows as usize {
                            let src = &region[r * row_bytes..(r + 1) * row_bytes];
                            tile[r * tile_stride..r * tile_stride + row_bytes].copy_from_slice(src);
                        }

                        let compressed = handler.compress(&tile)?;
                        chunk_offsets.push(pos);
                        chunk_byte_counts.push(compressed.len() as u64);
                        writer.write_all(&compressed)?;
                        pos += compressed.len() as u64;
                        pos = Self::pad(&mut writer, pos, 4)?;
                    }
                }
            }
            DataLayout::Strips { rows_per_strip } => {
                let rows_per_strip = rows_per_strip.max(1).min(height);
                let mut row0 = 0;
                while row0 < height {
                    let rows = rows_per_strip.min(height - row0);
                    let strip = provider.fetch(row0, 0, rows, width)?;
                    Self::check_region_len(&strip, rows, width, pixel_bytes)?;

                    let compressed = handler.compress(&strip)?;
                    chunk_offsets.push(pos);
                    chunk_byte_counts.push(compressed.len() as u64);
                    writer.write_all(&compressed)?;
                    pos += compressed.len() as u64;
                    pos = Self::pad(&mut writer, pos, 4)?;
                    row0 += rows;
                }
            }
        }

        // Assemble the tag list; TIFF requires ascending tag order
        let spp = samples_per_pixel;
        let mut raw_tags = vec![
            RawTag::long(tags::IMAGE_WIDTH, width)?,
            RawTag::long(tags::IMAGE_LENGTH, height)?,
            RawTag::shorts(tags::BITS_PER_SAMPLE, &vec![bits_per_sample; spp as usize]),
            RawTag::short(tags::COMPRESSION, options.compression as u16),
            RawTag::short(tags::PHOTOMETRIC_INTERPRETATION, options.photometric),
            RawTag::short(tags::SAMPLES_PER_PIXEL, spp),
            RawTag::short(tags::PLANAR_CONFIGURATION, planar_config::CHUNKY),
            RawTag::ascii(tags::SOFTWARE, concat!("tilekit ", env!("CARGO_PKG_VERSION"))),
            RawTag::shorts(tags::SAMPLE_FORMAT, &vec![sample_format; spp as usize]),
        ];

        if let Some(text) = &options.description {
            raw_tags.push(RawTag::ascii(tags::IMAGE_DESCRIPTION, text));
        }
        if let Some((res_x, res_y)) = options.resolution_cm {
            let (nx, dx) = to_rational(res_x);
            let (ny, dy) = to_rational(res_y);
            raw_tags.push(RawTag::rational(tags::X_RESOLUTION, nx, dx));
            raw_tags.push(RawTag::rational(tags::Y_RESOLUTION, ny, dy));
            raw_tags.push(RawTag::short(tags::RESOLUTION_UNIT, resolution_unit::CENTIMETER));
        }

        match options.layout {
            DataLayout::Tiled { edge } => {
                raw_tags.push(RawTag::long(tags::TILE_WIDTH, edge as u64)?);
                raw_tags.push(RawTag::long(tags::TILE_LENGTH, edge as u64)?);
                raw_tags.push(RawTag::offsets(tags::TILE_OFFSETS, &chunk_offsets, options.big_tiff)?);
                raw_tags.push(RawTag::offsets(tags::TILE_BYTE_COUNTS, &chunk_byte_counts, options.big_tiff)?);
            }
            DataLayout::Strips { rows_per_strip } => {
                raw_tags.push(RawTag::long(tags::ROWS_PER_STRIP, rows_per_strip.max(1).min(height))?);
                raw_tags.push(RawTag::offsets(tags::STRIP_OFFSETS, &chunk_offsets, options.big_tiff)?);
                raw_tags.push(RawTag::offsets(tags::STRIP_BYTE_COUNTS, &chunk_byte_counts, options.big_tiff)?);
            }
        }
        raw_tags.sort_by_key(|t| t.tag);

        // External value area: anything too big for the inline slot
        let inline_capacity = if options.big_tiff { 8usize } else { 4usize };
        pos = Self::pad(&mut writer, pos, 4)?;
        let mut external_offsets = vec![0u64; raw_tags.len()];
        for (i, tag) in raw_tags.iter().enumerate() {
            if tag.data.len() > inline_capacity {
                external_offsets[i] = pos;
                writer.write_all(&tag.data)?;
                pos += tag.data.len() as u64;
                pos = Self::pad(&mut writer, pos, 2)?;
            }
        }

        // IFD last, then the header is patched to point at it
        pos = Self::pad(&mut writer, pos, 2)?;
        let ifd_offset = pos;
        pos = Self::write_ifd(&mut writer, &raw_tags, &external_offsets, options.big_tiff, pos)?;

        writer.flush()?;
        let mut file = writer.into_inner().map_err(|e| TiffError::GenericError(e.to_string()))?;
        Self::patch_ifd_offset(&mut file, ifd_offset, options.big_tiff)?;
        file.flush()?;

        Ok(pos)
    }

    /// Write the 8-byte classic or 16-byte BigTIFF header with a
    /// placeholder first-IFD offset
    fn write_header(writer: &mut impl Write, big_tiff: bool) -> TiffResult<u64> {
        writer.write_all(&header::LITTLE_ENDIAN_MARKER)?;
        if big_tiff {
            writer.write_u16::<LittleEndian>(header::BIG_TIFF_VERSION)?;
            writer.write_u16::<LittleEndian>(header::BIGTIFF_OFFSET_SIZE)?;
            writer.write_u16::<LittleEndian>(0)?;
            writer.write_u64::<LittleEndian>(0)?;
            Ok(16)
        } else {
            writer.write_u16::<LittleEndian>(header::TIFF_VERSION)?;
            writer.write_u32::<LittleEndian>(0)?;
            Ok(8)
        }
    }

    /// Write the IFD with inline or external values; returns the new position
    fn write_ifd(
        writer: &mut impl Write,
        raw_tags: &[RawTag],
        external_offsets: &[u64],
        big_tiff: bool,
        mut pos: u64,
    ) -> TiffResult<u64> {
        let inline_capacity = if big_tiff { 8usize } else { 4usize };

        if big_tiff {
            writer.write_u64::<LittleEndian>(raw_tags.len() as u64)?;
            pos += 8;
        } else {
            writer.write_u16::<LittleEndian>(raw_tags.len() as u16)?;
            pos += 2;
        }

        for (i, tag) in raw_tags.iter().enumerate() {
            writer.write_u16::<LittleEndian>(tag.tag)?;
            writer.write_u16::<LittleEndian>(tag.field_type)?;
            if big_tiff {
                writer.write_u64::<LittleEndian>(tag.count)?;
            } else {
                writer.write_u32::<LittleEndian>(tag.count as u32)?;
            }

            let mut area = vec![0u8; inline_capacity];
            if tag.data.len() <= inline_capacity {
                area[..tag.data.len()].copy_from_slice(&tag.data);
            } else if big_tiff {
                area.copy_from_slice(&external_offsets[i].to_le_bytes());
            } else {
                let offset = u32::try_from(external_offsets[i]).map_err(|_| {
                    TiffError::GenericError("Tag value offset exceeds 4 GiB in classic TIFF".to_string())
                })?;
                area.copy_from_slice(&offset.to_le_bytes());
            }
            writer.write_all(&area)?;
            pos += if big_tiff { 20 } else { 12 };
        }

        // No further IFDs in the chain
        if big_tiff {
            writer.write_u64::<LittleEndian>(0)?;
            pos += 8;
        } else {
            writer.write_u32::<LittleEndian>(0)?;
            pos += 4;
        }
        Ok(pos)
    }

    /// Patch the header's first-IFD offset now that the IFD position is known
    fn patch_ifd_offset(file: &mut File, ifd_offset: u64, big_tiff: bool) -> TiffResult<()> {
        if big_tiff {
            file.seek(SeekFrom::Start(8))?;
            file.write_u64::<LittleEndian>(ifd_offset)?;
        } else {
            let offset = u32::try_from(ifd_offset).map_err(|_| {
                TiffError::GenericError("IFD offset exceeds 4 GiB in classic TIFF".to_string())
            })?;
            file.seek(SeekFrom::Start(4))?;
            file.write_u32::<LittleEndian>(offset)?;
        }
        Ok(())
    }

    /// Zero-pad the stream to the given alignment; returns the new position
    fn pad(writer: &mut impl Write, pos: u64, align: u64) -> TiffResult<u64> {
        let rem = pos % align;
        if rem == 0 {
            return Ok(pos);
        }
        let fill = (align - rem) as usize;
        writer.write_all(&vec![0u8; fill])?;
        Ok(pos + fill as u64)
    }

    fn check_region_len(region: &[u8], rows: u64, cols: u64, pixel_bytes: usize) -> TiffResult<()> {
        let expected = rows as usize * cols as usize * pixel_bytes;
        if region.len() != expected {
            return Err(TiffError::GenericError(format!(
                "Pixel provider returned {} bytes for a {}x{} window, expected {}",
                region.len(), rows, cols, expected
            )));
        }
        Ok(())
    }
}

/// Approximate a positive real as a u32/u32 rational
fn to_rational(value: f64) -> (u32, u32) {
    if !value.is_finite() || value <= 0.0 {
        return (0, 1);
    }
    if value >= u32::MAX as f64 / 1000.0 {
        return (value.round() as u32, 1);
    }
    ((value * 1000.0).round() as u32, 1000)
}

/// In-memory pixel provider over a fully materialized interleaved buffer
///
/// Used for small rasters like individual output tiles, where the data has
/// already been read into memory.
pub struct BufferProvider<'a> {
    data: &'a [u8],
    width: u64,
    pixel_bytes: usize,
}

impl<'a> BufferProvider<'a> {
    /// Wrap a row-major interleaved buffer of the given width
    pub fn new(data: &'a [u8], width: u64, pixel_bytes: usize) -> Self {
        BufferProvider { data, width, pixel_bytes }
    }
}

impl PixelProvider for BufferProvider<'_> {
    fn fetch(&mut self, row0: u64, col0: u64, rows: u64, cols: u64) -> TiffResult<Vec<u8>> {
        let stride = self.width as usize * self.pixel_bytes;
        let row_bytes = cols as usize * self.pixel_bytes;
        let mut out = Vec::with_capacity(rows as usize * row_bytes);
        for r in row0..row0 + rows {
            let start = r as usize * stride + col0 as usize * self.pixel_bytes;
            let end = start + row_bytes;
            if end > self.data.len() {
                return Err(TiffError::GenericError("Buffer provider window out of range".to_string()));
            }
            out.extend_from_slice(&self.data[start..end]);
        }
        Ok(out)
    }
}
