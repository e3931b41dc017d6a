//! SFNT side of the encoder: source tables, decoded records and checksums.

use std::collections::HashMap;

use indexmap::IndexMap;
use read_fonts::{
    FileRef, FontRef, ReadError, TableProvider,
    types::{GlyphId as ReadGlyphId, Tag},
};

use crate::{
    Error, Result,
    glyph::Glyph,
    hmtx::HorizontalMetrics,
    types::{GLYF, GlyphId, HEAD, HHEA, HMTX, LOCA, MAXP},
};

/// Tables of one font keyed by tag, in source directory order.
pub type TableSet = IndexMap<Tag, Vec<u8>>;

/// Offset of `checkSumAdjustment` in the head table.
pub const CHECKSUM_ADJUSTMENT_OFFSET: usize = 8;
/// Offset of `flags` in the head table.
pub const HEAD_FLAGS_OFFSET: usize = 16;
/// head.flags bit 11: the font went through a lossless transform.
pub const LOSSLESS_TRANSFORM_FLAG: u16 = 1 << 11;
/// `checkSumAdjustment` is this minus the whole-font checksum.
pub const CHECKSUM_MAGIC: u32 = 0xB1B0_AFBA;

const SFNT_HEADER_SIZE: usize = 12;
const SFNT_ENTRY_SIZE: usize = 16;

/// A font whose tables feed the encoder.
#[derive(Clone)]
pub struct SourceFont<'a> {
    font: FontRef<'a>,
}

impl<'a> SourceFont<'a> {
    pub fn new(font: FontRef<'a>) -> Self {
        Self { font }
    }

    pub fn parse(data: &'a [u8]) -> Result<Self> {
        Ok(Self::new(FontRef::new(data)?))
    }

    pub fn font(&self) -> &FontRef<'a> {
        &self.font
    }

    /// The sfnt version: `0x00010000` for TrueType outlines, `OTTO` for CFF.
    pub fn flavor(&self) -> u32 {
        self.font.table_directory.sfnt_version()
    }

    pub fn has_table(&self, tag: Tag) -> bool {
        self.font.table_data(tag).is_some()
    }

    /// Copy out every table in directory order.
    pub fn tables(&self) -> TableSet {
        self.font
            .table_directory
            .table_records()
            .iter()
            .filter_map(|record| {
                let tag = record.tag();
                self.font.table_data(tag).map(|data| (tag, data.as_bytes().to_vec()))
            })
            .collect()
    }

    fn require(&self, tag: Tag) -> Result<()> {
        if self.has_table(tag) { Ok(()) } else { Err(Error::MissingTable(tag)) }
    }

    /// `head.indexToLocFormat`.
    pub fn index_format(&self) -> Result<u16> {
        self.require(HEAD)?;
        Ok(self.font.head()?.index_to_loc_format() as u16)
    }

    pub fn num_glyphs(&self) -> Result<u16> {
        self.require(MAXP)?;
        Ok(self.font.maxp()?.num_glyphs())
    }

    /// Decode every glyph in glyph-id order.
    pub fn glyphs(&self) -> Result<Vec<Glyph>> {
        self.require(GLYF)?;
        self.require(LOCA)?;
        let glyf = self.font.glyf()?;
        let loca = self.font.loca(None)?;
        (0..self.num_glyphs()?)
            .map(|gid| {
                let glyph = loca.get_glyf(ReadGlyphId::new(gid.into()), &glyf)?;
                Glyph::from_read(glyph.as_ref(), GlyphId::new(gid))
            })
            .collect()
    }

    /// Advances and side bearings from hmtx.
    pub fn horizontal_metrics(&self) -> Result<HorizontalMetrics> {
        self.require(HHEA)?;
        self.require(HMTX)?;
        let num_glyphs = self.num_glyphs()?;
        let num_h_metrics = self.font.hhea()?.number_of_h_metrics();
        let hmtx = self.font.hmtx()?;

        let advances = (0..num_h_metrics.min(num_glyphs))
            .map(|gid| hmtx.advance(ReadGlyphId::new(gid.into())).ok_or(ReadError::OutOfBounds))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let side_bearings = (0..num_glyphs)
            .map(|gid| hmtx.side_bearing(ReadGlyphId::new(gid.into())).ok_or(ReadError::OutOfBounds))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(HorizontalMetrics { advances, side_bearings })
    }
}

/// Every font in `data`, which may be a single font or a collection.
pub fn load_fonts(data: &[u8]) -> Result<Vec<SourceFont<'_>>> {
    let fonts = FileRef::new(data)?
        .fonts()
        .map(|font| font.map(SourceFont::new))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    if fonts.is_empty() {
        return Err(Error::NoFonts);
    }
    Ok(fonts)
}

/// Sum of big-endian u32 words, zero padded to a multiple of four.
pub fn checksum(data: &[u8]) -> u32 {
    let mut chunks = data.chunks_exact(4);
    let sum = chunks
        .by_ref()
        .fold(0u32, |sum, word| sum.wrapping_add(u32::from_be_bytes([word[0], word[1], word[2], word[3]])));
    let rest = chunks.remainder();
    if rest.is_empty() {
        return sum;
    }
    let mut last = [0u8; 4];
    last[..rest.len()].copy_from_slice(rest);
    sum.wrapping_add(u32::from_be_bytes(last))
}

/// Checksum of a table as recorded in an sfnt directory. head is summed with
/// its `checkSumAdjustment` zeroed.
pub fn table_checksum(tag: Tag, data: &[u8]) -> u32 {
    let adjustment = CHECKSUM_ADJUSTMENT_OFFSET..CHECKSUM_ADJUSTMENT_OFFSET + 4;
    if tag == HEAD && data.len() >= adjustment.end {
        let stored = &data[adjustment];
        checksum(data).wrapping_sub(u32::from_be_bytes([stored[0], stored[1], stored[2], stored[3]]))
    } else {
        checksum(data)
    }
}

/// Table checksums shared across a batch of encodes.
///
/// Entries are keyed by tag and table bytes, so a table that appears in many
/// fonts is summed once.
#[derive(Clone, Debug, Default)]
pub struct ChecksumCache {
    entries: HashMap<(Tag, Vec<u8>), u32>,
}

impl ChecksumCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record a known checksum. Recording a different value for the same
    /// bytes is an error.
    pub fn insert(&mut self, tag: Tag, data: &[u8], checksum: u32) -> Result<()> {
        match self.entries.get(&(tag, data.to_vec())) {
            Some(&existing) if existing != checksum => Err(Error::ChecksumConflict { tag }),
            Some(_) => Ok(()),
            None => {
                self.entries.insert((tag, data.to_vec()), checksum);
                Ok(())
            }
        }
    }

    /// The checksum for `data`, computing and remembering it on first use.
    pub fn checksum(&mut self, tag: Tag, data: &[u8]) -> u32 {
        *self
            .entries
            .entry((tag, data.to_vec()))
            .or_insert_with(|| table_checksum(tag, data))
    }
}

/// Set head.flags bit 11 in place.
pub fn set_lossless_transform_flag(head: &mut [u8]) -> Result<()> {
    let flags = head
        .get_mut(HEAD_FLAGS_OFFSET..HEAD_FLAGS_OFFSET + 2)
        .ok_or(Error::Read(ReadError::OutOfBounds))?;
    let value = u16::from_be_bytes([flags[0], flags[1]]) | LOSSLESS_TRANSFORM_FLAG;
    flags.copy_from_slice(&value.to_be_bytes());
    Ok(())
}

/// `searchRange`, `entrySelector` and `rangeShift` for an sfnt header.
pub fn search_params(num_tables: u16) -> (u16, u16, u16) {
    if num_tables == 0 {
        return (0, 0, 0);
    }
    let entry_selector = 15 - num_tables.leading_zeros() as u16;
    let search_range = (1u16 << entry_selector).saturating_mul(SFNT_ENTRY_SIZE as u16);
    let range_shift = num_tables.saturating_mul(SFNT_ENTRY_SIZE as u16).saturating_sub(search_range);
    (search_range, entry_selector, range_shift)
}

/// Build the sfnt header and table directory the tables decode to.
///
/// Tables are listed by tag with offsets laid out in that order, each table
/// padded to four bytes.
pub fn sfnt_directory(flavor: u32, tables: &TableSet, checksums: &mut ChecksumCache) -> Result<Vec<u8>> {
    let num_tables = u16::try_from(tables.len()).map_err(|_| Error::IntegerRangeViolation {
        value: tables.len() as u64,
        encoding: "numTables",
    })?;
    let (search_range, entry_selector, range_shift) = search_params(num_tables);

    let mut out = Vec::with_capacity(SFNT_HEADER_SIZE + SFNT_ENTRY_SIZE * tables.len());
    out.extend(flavor.to_be_bytes());
    for v in [num_tables, search_range, entry_selector, range_shift] {
        out.extend(v.to_be_bytes());
    }

    let mut sorted: Vec<_> = tables.iter().collect();
    sorted.sort_by_key(|(tag, _)| **tag);
    let mut offset = (SFNT_HEADER_SIZE + SFNT_ENTRY_SIZE * tables.len()) as u64;
    for (tag, data) in sorted {
        let length = u32::try_from(data.len()).map_err(|_| Error::IntegerRangeViolation {
            value: data.len() as u64,
            encoding: "table length",
        })?;
        let table_offset = u32::try_from(offset).map_err(|_| Error::IntegerRangeViolation {
            value: offset,
            encoding: "table offset",
        })?;
        out.extend(tag.to_be_bytes());
        out.extend(checksums.checksum(*tag, data).to_be_bytes());
        out.extend(table_offset.to_be_bytes());
        out.extend(length.to_be_bytes());
        offset += u64::from(length).next_multiple_of(4);
    }
    Ok(out)
}

/// Recompute head.checkSumAdjustment for the font `tables` describe.
pub fn update_checksum_adjustment(
    flavor: u32,
    tables: &mut TableSet,
    checksums: &mut ChecksumCache,
) -> Result<()> {
    if !tables.contains_key(&HEAD) {
        return Err(Error::MissingTable(HEAD));
    }
    let directory = sfnt_directory(flavor, tables, checksums)?;
    let total = tables
        .iter()
        .map(|(tag, data)| checksums.checksum(*tag, data))
        .fold(checksum(&directory), u32::wrapping_add);
    let adjustment = CHECKSUM_MAGIC.wrapping_sub(total);

    let head = tables.get_mut(&HEAD).ok_or(Error::MissingTable(HEAD))?;
    head.get_mut(CHECKSUM_ADJUSTMENT_OFFSET..CHECKSUM_ADJUSTMENT_OFFSET + 4)
        .ok_or(Error::Read(ReadError::OutOfBounds))?
        .copy_from_slice(&adjustment.to_be_bytes());
    Ok(())
}
