//! Synthetic TrueType/OpenType collections.

use anyhow::{Context, Result, bail};
use read_fonts::{FontRef, types::Tag};
use woffpress_font_woff2::sfnt::{search_params, table_checksum};

const TTC_TAG: &[u8; 4] = b"ttcf";
const DSIG: Tag = Tag::new(b"DSIG");
/// An empty version 1 DSIG table.
const EMPTY_DSIG: [u8; 8] = [0, 0, 0, 1, 0, 0, 0, 0];

/// How tables are shared between the fonts of a collection.
#[derive(Clone, Debug, Default)]
pub struct TtcOptions {
    /// Write a version 2 header with a DSIG table.
    pub dsig: bool,
    /// Tags that always get their own copy.
    pub duplicates: Vec<Tag>,
    /// When non-empty, only these tags may be shared.
    pub shared: Vec<Tag>,
}

impl TtcOptions {
    fn may_share(&self, tag: Tag) -> bool {
        !self.duplicates.contains(&tag) && (self.shared.is_empty() || self.shared.contains(&tag))
    }
}

fn sorted_tables<'a>(font: &FontRef<'a>) -> Vec<(Tag, &'a [u8])> {
    let mut tags: Vec<Tag> = font.table_directory.table_records().iter().map(|r| r.tag()).collect();
    tags.sort();
    tags.into_iter()
        .filter_map(|tag| font.table_data(tag).map(|data| (tag, data.as_bytes())))
        .collect()
}

fn to_u32(value: usize) -> Result<u32> {
    u32::try_from(value).context("collection does not fit 32-bit offsets")
}

/// Build a collection from single fonts, storing identical tables once.
///
/// Each font's directory lists its tables sorted by tag.
pub fn build_ttc(fonts: &[&[u8]], options: &TtcOptions) -> Result<Vec<u8>> {
    if fonts.is_empty() {
        bail!("No fonts to pack into a collection");
    }
    let fonts = fonts
        .iter()
        .enumerate()
        .map(|(i, data)| FontRef::new(data).with_context(|| format!("Failed to parse font {i}")))
        .collect::<Result<Vec<_>>>()?;

    let font_tables: Vec<_> = fonts.iter().map(sorted_tables).collect();

    let mut out = Vec::new();
    out.extend(TTC_TAG);
    out.extend(if options.dsig { 0x0002_0000u32 } else { 0x0001_0000u32 }.to_be_bytes());
    out.extend(to_u32(fonts.len())?.to_be_bytes());

    let mut offset = 12 + 4 * fonts.len() + if options.dsig { 12 } else { 0 };
    for tables in &font_tables {
        out.extend(to_u32(offset)?.to_be_bytes());
        offset += 12 + 16 * tables.len();
    }

    // Table data in file order, with the offset each copy lands at.
    let mut stored: Vec<(&[u8], usize)> = Vec::new();
    if options.dsig {
        out.extend(DSIG.to_be_bytes());
        out.extend(to_u32(EMPTY_DSIG.len())?.to_be_bytes());
        out.extend(to_u32(offset)?.to_be_bytes());
        stored.push((&EMPTY_DSIG[..], offset));
        offset += EMPTY_DSIG.len();
    }

    for (font, tables) in fonts.iter().zip(&font_tables) {
        let num_tables = u16::try_from(tables.len()).context("too many tables")?;
        let (search_range, entry_selector, range_shift) = search_params(num_tables);
        out.extend(font.table_directory.sfnt_version().to_be_bytes());
        for v in [num_tables, search_range, entry_selector, range_shift] {
            out.extend(v.to_be_bytes());
        }

        for &(tag, data) in tables {
            let existing = if options.may_share(tag) {
                stored.iter().find(|(d, _)| *d == data).map(|&(_, o)| o)
            } else {
                None
            };
            let table_offset = match existing {
                Some(o) => o,
                None => {
                    stored.push((data, offset));
                    let table_offset = offset;
                    offset += data.len().next_multiple_of(4);
                    table_offset
                }
            };
            out.extend(tag.to_be_bytes());
            out.extend(table_checksum(tag, data).to_be_bytes());
            out.extend(to_u32(table_offset)?.to_be_bytes());
            out.extend(to_u32(data.len())?.to_be_bytes());
        }
    }

    for (data, _) in &stored {
        out.extend_from_slice(data);
        out.resize(out.len().next_multiple_of(4), 0);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_fonts() {
        assert!(build_ttc(&[], &TtcOptions::default()).is_err());
    }

    #[test]
    fn test_may_share() {
        let glyf = Tag::new(b"glyf");
        let name = Tag::new(b"name");
        let options = TtcOptions { duplicates: vec![glyf], ..Default::default() };
        assert!(!options.may_share(glyf));
        assert!(options.may_share(name));

        let options = TtcOptions { shared: vec![glyf], ..Default::default() };
        assert!(options.may_share(glyf));
        assert!(!options.may_share(name));
    }
}
