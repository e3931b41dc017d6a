//! Compression of the table payload and the metadata block.

use brotli::enc::{BrotliEncoderParams, backward_references::BrotliEncoderMode};
use log::debug;

use crate::{Error, Result};

/// What the compressed data is, as a hint to the compressor.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CompressionMode {
    /// Font table data.
    Font,
    /// UTF-8 text such as the extended metadata XML.
    Text,
}

/// A byte-oriented compressor and its inverse.
pub trait Compress {
    fn compress(&self, data: &[u8], mode: CompressionMode) -> Result<Vec<u8>>;
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BrotliParams {
    /// 0-11.
    pub quality: u32,
    /// log2 of the sliding window, 10-24.
    pub window: u32,
}

impl Default for BrotliParams {
    fn default() -> Self {
        Self { quality: 11, window: 22 }
    }
}

/// Brotli, as WOFF2 requires.
#[derive(Copy, Clone, Debug, Default)]
pub struct Brotli {
    pub params: BrotliParams,
}

impl Brotli {
    pub fn new(params: BrotliParams) -> Self {
        Self { params }
    }

    fn encoder_params(&self, mode: CompressionMode) -> BrotliEncoderParams {
        BrotliEncoderParams {
            quality: self.params.quality.min(11) as i32,
            lgwin: self.params.window.clamp(10, 24) as i32,
            mode: match mode {
                CompressionMode::Font => BrotliEncoderMode::BROTLI_MODE_FONT,
                CompressionMode::Text => BrotliEncoderMode::BROTLI_MODE_TEXT,
            },
            ..Default::default()
        }
    }
}

impl Compress for Brotli {
    fn compress(&self, data: &[u8], mode: CompressionMode) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(data.len() / 2);
        brotli::BrotliCompress(&mut &data[..], &mut out, &self.encoder_params(mode))
            .map_err(Error::Compression)?;
        Ok(out)
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        brotli::BrotliDecompress(&mut &data[..], &mut out).map_err(Error::Compression)?;
        Ok(out)
    }
}

/// Compress `data`, keeping it as is when compression does not make it smaller.
///
/// Returns the bytes to store and whether they are compressed.
pub fn compress_or_store(
    compressor: &dyn Compress,
    data: &[u8],
    mode: CompressionMode,
) -> Result<(Vec<u8>, bool)> {
    let compressed = compressor.compress(data, mode)?;
    if compressed.len() >= data.len() {
        debug!(
            "compressed size {} is not below input size {}, storing uncompressed",
            compressed.len(),
            data.len()
        );
        Ok((data.to_vec(), false))
    } else {
        Ok((compressed, true))
    }
}
