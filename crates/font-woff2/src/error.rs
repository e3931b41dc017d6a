//! Error types for WOFF2 encoding.

use std::{io, result};

use read_fonts::{ReadError, types::Tag};
use thiserror::Error;

/// Errors that can occur while transforming and packing a WOFF2 container.
#[derive(Error, Debug)]
pub enum Error {
    /// Outline data is internally inconsistent.
    #[error("malformed geometry in glyph {glyph_id}: {reason}")]
    MalformedGlyphGeometry { glyph_id: u32, reason: &'static str },

    /// A transform was requested that the format cannot express.
    #[error("unsupported transform for '{tag}': {reason}")]
    UnsupportedTransformCombination { tag: Tag, reason: &'static str },

    /// A value does not fit the variable-length encoding it is written with.
    #[error("{value} is out of range for {encoding}")]
    IntegerRangeViolation { value: u64, encoding: &'static str },

    /// glyf and loca are not shared as a pair across a collection.
    #[error("glyf table {glyf} and loca table {loca} are not shared as a pair")]
    CollectionSharingViolation { glyf: u16, loca: u16 },

    #[error("required table '{0}' not found")]
    MissingTable(Tag),

    #[error("conflicting checksums recorded for identical '{tag}' table data")]
    ChecksumConflict { tag: Tag },

    #[error("failed to read font: {0}")]
    Read(#[from] ReadError),

    #[error("compression failed: {0}")]
    Compression(#[source] io::Error),

    #[error("no fonts provided")]
    NoFonts,

    /// The container being read violates the format.
    #[error("invalid WOFF2 data: {0}")]
    InvalidContainer(&'static str),

    #[error("unexpected end of data")]
    Truncated,
}

pub type Result<T> = result::Result<T, Error>;
