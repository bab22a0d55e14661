//! Compression support for TIFF tile and strip data
//!
//! Each compression method supported by the pipeline is a strategy behind
//! the CompressionHandler trait, created through the factory from either a
//! TIFF compression code or a user-facing name.

mod handler;
mod factory;
mod schemes;

pub use handler::CompressionHandler;
pub use factory::CompressionFactory;
pub use schemes::{DeflateHandler, UncompressedHandler, ZstdHandler};
