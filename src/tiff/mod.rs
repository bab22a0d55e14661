//! TIFF/BigTIFF structure handling
//!
//! This module contains the directory-level reader and the streaming writer
//! the pipeline uses as its codec, plus the IFD structures and constants
//! they share.

pub mod constants;
pub mod errors;
pub mod ifd;
pub mod reader;
pub mod writer;

pub use errors::{TiffError, TiffResult};
pub use ifd::{IFDEntry, IFD};
pub use reader::{TiffFile, TiffReader};
pub use writer::{BufferProvider, DataLayout, PixelProvider, TiffWriteOptions, TiffWriter};
