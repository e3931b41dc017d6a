//! Named encoder configurations for decoder test fixtures.

use std::{fmt, str::FromStr};

use anyhow::{Context, Result, bail};
use woffpress_font_woff2::{
    BboxPolicy, ChecksumCache, Encoder, Options, SourceFont, U16Repr, load_fonts,
};

/// A fixture a decoder is expected to accept or reject.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Fixture {
    /// Every directory length carries a leading `0x80` byte.
    LeadingZeroBase128,
    /// `loca` sits before `glyf` in the table directory.
    UnsortedGlyfLoca,
    /// Collection fonts pair glyf and loca tables from different fonts.
    MismatchedGlyfLoca,
    /// Empty glyphs have their bbox bit set.
    EmptyGlyphBbox,
    /// Composite glyphs have no bbox.
    MissingCompositeBbox,
    /// Point counts rotate through every legal 255UInt16 form.
    AlternatePointCounts,
    /// Collection fonts keep separate glyf and loca tables.
    DuplicateGlyfLoca,
    /// Every simple glyph is marked overlapping, adding the overlap bitmap.
    OverlapBitmap,
    /// The transformed hmtx flags byte has every bit set, reserved ones included.
    HmtxAllFlags,
    /// The transformed hmtx flags byte is zero.
    HmtxZeroFlags,
    /// The transformed loca holds four zero bytes.
    NonEmptyLoca,
}

impl Fixture {
    pub const ALL: [Fixture; 11] = [
        Fixture::LeadingZeroBase128,
        Fixture::UnsortedGlyfLoca,
        Fixture::MismatchedGlyfLoca,
        Fixture::EmptyGlyphBbox,
        Fixture::MissingCompositeBbox,
        Fixture::AlternatePointCounts,
        Fixture::DuplicateGlyfLoca,
        Fixture::OverlapBitmap,
        Fixture::HmtxAllFlags,
        Fixture::HmtxZeroFlags,
        Fixture::NonEmptyLoca,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Fixture::LeadingZeroBase128 => "leading-zero-base128",
            Fixture::UnsortedGlyfLoca => "unsorted-glyf-loca",
            Fixture::MismatchedGlyfLoca => "mismatched-glyf-loca",
            Fixture::EmptyGlyphBbox => "empty-glyph-bbox",
            Fixture::MissingCompositeBbox => "missing-composite-bbox",
            Fixture::AlternatePointCounts => "alternate-point-counts",
            Fixture::DuplicateGlyfLoca => "duplicate-glyf-loca",
            Fixture::OverlapBitmap => "glyf-overlap-bitmap",
            Fixture::HmtxAllFlags => "hmtx-all-flags",
            Fixture::HmtxZeroFlags => "hmtx-zero-flags",
            Fixture::NonEmptyLoca => "nonzero-loca",
        }
    }

    /// Whether a conforming decoder accepts the output.
    pub fn is_valid(self) -> bool {
        matches!(
            self,
            Fixture::AlternatePointCounts | Fixture::DuplicateGlyfLoca | Fixture::OverlapBitmap
        )
    }

    /// Whether the fixture only makes sense for a collection.
    pub fn needs_collection(self) -> bool {
        matches!(self, Fixture::MismatchedGlyfLoca | Fixture::DuplicateGlyfLoca)
    }

    /// Apply the fixture on top of `options`.
    pub fn options(self, options: Options) -> Options {
        match self {
            Fixture::LeadingZeroBase128 => options.base128_leading_zero(true),
            Fixture::UnsortedGlyfLoca => options.unsort_glyf_loca(true),
            Fixture::MismatchedGlyfLoca => options.mismatch_glyf_loca(true),
            Fixture::EmptyGlyphBbox => options.bbox_policy(BboxPolicy::ExplicitEmpty),
            Fixture::MissingCompositeBbox => options.bbox_policy(BboxPolicy::OmitComposite),
            Fixture::AlternatePointCounts => options.point_count_repr(U16Repr::Cycle),
            Fixture::DuplicateGlyfLoca => options.duplicate_tables(["glyf", "loca"]),
            Fixture::OverlapBitmap => options.mark_overlaps(true),
            Fixture::HmtxAllFlags => options.hmtx_flags(0xff),
            Fixture::HmtxZeroFlags => options.hmtx_flags(0x00),
            Fixture::NonEmptyLoca => options.nonzero_loca(true),
        }
    }
}

impl fmt::Display for Fixture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Fixture {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match Fixture::ALL.into_iter().find(|fixture| fixture.name() == s) {
            Some(fixture) => Ok(fixture),
            None => bail!("Unknown fixture '{s}'"),
        }
    }
}

/// Encode `font` (a single font or a collection) as `fixture`.
///
/// Collection fixtures given a single font pack two copies of it.
pub fn encode_fixture(fixture: Fixture, font: &[u8]) -> Result<Vec<u8>> {
    let encoder = Encoder::new(fixture.options(Options::new()));
    if !fixture.needs_collection() {
        return encoder.encode(font).with_context(|| format!("Failed to encode {fixture}"));
    }
    let mut fonts: Vec<SourceFont> = load_fonts(font).context("Failed to load fixture source")?;
    if fonts.len() == 1 {
        fonts.push(fonts[0].clone());
    }
    encoder
        .encode_collection(&fonts, &mut ChecksumCache::new())
        .with_context(|| format!("Failed to encode {fixture}"))
}
