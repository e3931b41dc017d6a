//! WOFF2 encoding for TrueType and CFF fonts and font collections.
//!
//! The encoder applies the glyf/loca and hmtx transforms, packs the table
//! directory (and the collection directory, sharing identical tables between
//! fonts), compresses the table data with Brotli and lays out the container.
//!
//! Beyond conformant output, [`Options`] carries knobs that build
//! deliberately invalid files for exercising decoders.
//!
//! # Example
//!
//! ```no_run
//! use woffpress_font_woff2::{Encoder, Options};
//!
//! let ttf = std::fs::read("font.ttf").unwrap();
//! let woff2 = Encoder::new(Options::new().quality(9)).encode(&ttf).unwrap();
//! ```

pub mod collection;
mod compress;
pub mod container;
pub mod directory;
mod encoder;
mod error;
pub mod glyf;
pub mod glyph;
pub mod hmtx;
mod options;
pub mod reader;
pub mod sfnt;
pub mod triplet;
pub mod types;
pub mod varint;

pub use collection::{CollectionVersion, SharingOptions};
pub use compress::{Brotli, BrotliParams, Compress, CompressionMode, compress_or_store};
pub use encoder::{Encoder, TransformedFont};
pub use error::{Error, Result};
pub use glyf::BboxPolicy;
pub use hmtx::HmtxPolicy;
pub use options::Options;
pub use reader::{Woff2Info, read_woff2};
pub use sfnt::{ChecksumCache, SourceFont, load_fonts};
pub use types::{
    CFF_FLAVOR, COLLECTION_FLAVOR, FontIndex, GlyphId, TRUETYPE_FLAVOR, TableIndex, parse_tag,
};
pub use varint::U16Repr;

/// Encode a font or collection with default options.
pub fn encode(data: &[u8]) -> Result<Vec<u8>> {
    Encoder::default().encode(data)
}

/// Encode a font or collection with the given options.
pub fn encode_with(data: &[u8], options: Options) -> Result<Vec<u8>> {
    Encoder::new(options).encode(data)
}
