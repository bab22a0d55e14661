//! Factory for creating compression handlers

use crate::tiff::errors::{TiffError, TiffResult};

use super::handler::CompressionHandler;
use super::schemes::{DeflateHandler, UncompressedHandler, ZstdHandler};

/// Factory for creating compression handlers
pub struct CompressionFactory;

impl CompressionFactory {
    /// Create a compression handler for the given TIFF compression code
    pub fn create_handler(compression: u64) -> TiffResult<Box<dyn CompressionHandler>> {
        match compression {
            1 => Ok(Box::new(UncompressedHandler)),
            8 => Ok(Box::new(DeflateHandler)),
            14 => Ok(Box::new(ZstdHandler::new())),
            _ => Err(TiffError::UnsupportedCompression(compression)),
        }
    }

    /// Get a handler by user-facing name
    pub fn get_handler_by_name(name: &str) -> TiffResult<Box<dyn CompressionHandler>> {
        match name.to_lowercase().as_str() {
            "uncompressed" | "none" => Ok(Box::new(UncompressedHandler)),
            "deflate" | "zlib" | "zip" => Ok(Box::new(DeflateHandler)),
            "zstd" => Ok(Box::new(ZstdHandler::new())),
            _ => Err(TiffError::GenericError(format!("Unknown compression type: {}", name))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_round_trips() {
        let payload: Vec<u8> = (0..4096u32).map(|v| (v % 251) as u8).collect();

        for code in [1u64, 8, 14] {
            let handler = CompressionFactory::create_handler(code).unwrap();
            let compressed = handler.compress(&payload).unwrap();
            let restored = handler.decompress(&compressed).unwrap();
            assert_eq!(restored, payload, "{} round trip", handler.name());
        }
    }

    #[test]
    fn test_unknown_code_rejected() {
        assert!(CompressionFactory::create_handler(5).is_err());
    }

    #[test]
    fn test_lookup_by_name() {
        assert_eq!(CompressionFactory::get_handler_by_name("deflate").unwrap().code(), 8);
        assert_eq!(CompressionFactory::get_handler_by_name("ZSTD").unwrap().code(), 14);
        assert_eq!(CompressionFactory::get_handler_by_name("none").unwrap().code(), 1);
        assert!(CompressionFactory::get_handler_by_name("lzw").is_err());
    }
}
