//! Table sharing across the fonts of a collection.
//!
//! Every font contributes its transformed tables; byte-identical tables with
//! the same tag collapse into one shared slot. Each font then refers to the
//! shared list by index through its collection directory entry.

use std::collections::HashMap;

use indexmap::IndexMap;
use log::{debug, info, warn};
use read_fonts::types::Tag;

use crate::{
    Error, Result,
    directory::TableEntry,
    sfnt::ChecksumCache,
    types::{FontIndex, GLYF, LOCA, TableIndex},
    varint::{read_255_u16, write_255_count},
};

/// Collection header version. Version 2 adds the DSIG fields to the
/// reconstructed TTC header.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum CollectionVersion {
    #[default]
    V1,
    V2,
}

impl CollectionVersion {
    pub const fn to_u32(self) -> u32 {
        match self {
            Self::V1 => 0x0001_0000,
            Self::V2 => 0x0002_0000,
        }
    }

    pub fn from_u32(version: u32) -> Option<Self> {
        match version {
            0x0001_0000 => Some(Self::V1),
            0x0002_0000 => Some(Self::V2),
            _ => None,
        }
    }

    /// Size of the reconstructed TTC header for `num_fonts` fonts.
    pub const fn ttc_header_size(self, num_fonts: usize) -> usize {
        let size = 12 + 4 * num_fonts;
        match self {
            Self::V1 => size,
            Self::V2 => size + 12,
        }
    }
}

/// Knobs that let a collection deliberately break the sharing rules.
#[derive(Clone, Debug, Default)]
pub struct SharingOptions {
    /// Tags that get a slot per font even when the data is identical.
    pub duplicate_tags: Vec<Tag>,
    /// Give every font its own glyf and loca, then hand the loca slots out in
    /// reverse font order.
    pub mismatch_glyf_loca: bool,
}

/// One font's tables, in the order they should appear in its entry.
#[derive(Clone, Debug)]
pub struct CollectionFont {
    pub flavor: u32,
    pub tables: Vec<TableEntry>,
}

impl CollectionFont {
    /// Order tables the way a collection entry lists them: by tag, with loca
    /// directly after glyf.
    pub fn new(flavor: u32, mut tables: Vec<TableEntry>) -> Self {
        tables.sort_by_key(|entry| entry.tag);
        if let Some(loca) = tables.iter().position(|e| e.tag == LOCA) {
            let entry = tables.remove(loca);
            let at = tables.iter().position(|e| e.tag == GLYF).map_or(loca, |glyf| glyf + 1);
            tables.insert(at, entry);
        }
        Self { flavor, tables }
    }
}

/// A table in the deduplicated list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SharedTable {
    pub entry: TableEntry,
    /// Checksum of the original table bytes.
    pub checksum: u32,
}

/// A font's view of the shared table list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectionDirectoryEntry {
    pub flavor: u32,
    pub indices: IndexMap<Tag, TableIndex>,
}

impl CollectionDirectoryEntry {
    pub fn num_tables(&self) -> usize {
        self.indices.len()
    }
}

/// The shared table list and one directory entry per font.
#[derive(Clone, Debug)]
pub struct ResolvedCollection {
    pub tables: Vec<SharedTable>,
    pub fonts: Vec<CollectionDirectoryEntry>,
}

impl ResolvedCollection {
    /// `totalSfntSize` of the TTC this collection decodes to.
    pub fn sfnt_size(&self, version: CollectionVersion) -> u64 {
        let directories: usize = self.fonts.iter().map(|f| 12 + 16 * f.num_tables()).sum();
        let tables: u64 = self
            .tables
            .iter()
            .map(|t| (t.entry.original.len() as u64).next_multiple_of(4))
            .sum();
        (version.ttc_header_size(self.fonts.len()) + directories) as u64 + tables
    }
}

/// Build the shared table list for `fonts`.
pub fn resolve(
    fonts: Vec<CollectionFont>,
    sharing: &SharingOptions,
    checksums: &mut ChecksumCache,
) -> Result<ResolvedCollection> {
    if fonts.is_empty() {
        return Err(Error::NoFonts);
    }

    let mut tables: Vec<SharedTable> = Vec::new();
    let mut directory = Vec::with_capacity(fonts.len());
    let mut loca_slots = Vec::new();
    let mut total_refs = 0usize;

    for (i, font) in fonts.into_iter().enumerate() {
        let font_index = FontIndex::new(i);
        let mut indices = IndexMap::with_capacity(font.tables.len());
        let mut entries = font.tables.into_iter().peekable();
        while let Some(entry) = entries.next() {
            let tag = entry.tag;
            let paired_loca =
                if tag == GLYF { entries.next_if(|next| next.tag == LOCA) } else { None };
            if let Some(loca) = paired_loca {
                total_refs += 2;
                let force_new = sharing.mismatch_glyf_loca
                    || sharing.duplicate_tags.iter().any(|t| *t == GLYF || *t == LOCA);
                let (glyf_slot, loca_slot) = place_pair(&mut tables, entry, loca, force_new, checksums);
                indices.insert(GLYF, table_index(glyf_slot)?);
                let loca_index = table_index(loca_slot)?;
                loca_slots.push(loca_index);
                indices.insert(LOCA, loca_index);
                continue;
            }

            total_refs += 1;
            let existing = if sharing.duplicate_tags.contains(&tag) {
                None
            } else {
                tables.iter().position(|t| t.entry == entry)
            };
            let slot = match existing {
                Some(slot) => slot,
                None => push_table(&mut tables, entry, checksums),
            };
            let index = table_index(slot)?;
            if tag == LOCA {
                loca_slots.push(index);
            }
            indices.insert(tag, index);
        }
        debug!("{font_index}: {} tables", indices.len());
        directory.push(CollectionDirectoryEntry { flavor: font.flavor, indices });
    }

    if sharing.mismatch_glyf_loca {
        warn!("pairing glyf and loca from different fonts; the collection will be invalid");
        loca_slots.reverse();
        let mut slots = loca_slots.into_iter();
        for font in directory.iter_mut().filter(|f| f.indices.contains_key(&LOCA)) {
            if let (Some(index), Some(slot)) = (font.indices.get_mut(&LOCA), slots.next()) {
                *index = slot;
            }
        }
    } else {
        check_glyf_loca_pairing(&directory)?;
    }

    info!(
        "collection: {} fonts, {} table references, {} shared tables",
        directory.len(),
        total_refs,
        tables.len()
    );
    Ok(ResolvedCollection { tables, fonts: directory })
}

fn push_table(tables: &mut Vec<SharedTable>, entry: TableEntry, checksums: &mut ChecksumCache) -> usize {
    let checksum = checksums.checksum(entry.tag, &entry.original);
    tables.push(SharedTable { entry, checksum });
    tables.len() - 1
}

/// Place a font's glyf and loca as one unit.
///
/// The pair is reused only when an earlier font has both tables identical;
/// otherwise both get fresh, adjacent slots, even if one of them matches on
/// its own.
fn place_pair(
    tables: &mut Vec<SharedTable>,
    glyf: TableEntry,
    loca: TableEntry,
    force_new: bool,
    checksums: &mut ChecksumCache,
) -> (usize, usize) {
    let existing = if force_new {
        None
    } else {
        tables.windows(2).position(|pair| pair[0].entry == glyf && pair[1].entry == loca)
    };
    match existing {
        Some(slot) => (slot, slot + 1),
        None => {
            let glyf_slot = push_table(tables, glyf, checksums);
            let loca_slot = push_table(tables, loca, checksums);
            (glyf_slot, loca_slot)
        }
    }
}

fn table_index(slot: usize) -> Result<TableIndex> {
    u16::try_from(slot).map(TableIndex::new).map_err(|_| Error::IntegerRangeViolation {
        value: slot as u64,
        encoding: "255UInt16",
    })
}

/// Check that glyf and loca are shared as pairs.
///
/// Within a font, loca must be the slot right after glyf. Across fonts, a
/// glyf slot is always paired with the same loca slot and vice versa.
pub fn check_glyf_loca_pairing(fonts: &[CollectionDirectoryEntry]) -> Result<()> {
    let mut loca_for_glyf: HashMap<TableIndex, TableIndex> = HashMap::new();
    let mut glyf_for_loca: HashMap<TableIndex, TableIndex> = HashMap::new();
    for font in fonts {
        let glyf = font.indices.get(&GLYF).copied();
        let loca = font.indices.get(&LOCA).copied();
        let (glyf, loca) = match (glyf, loca) {
            (None, None) => continue,
            (Some(glyf), Some(loca)) => (glyf, loca),
            (glyf, loca) => {
                return Err(Error::CollectionSharingViolation {
                    glyf: glyf.map_or(u16::MAX, TableIndex::to_u16),
                    loca: loca.map_or(u16::MAX, TableIndex::to_u16),
                });
            }
        };
        let violation =
            || Error::CollectionSharingViolation { glyf: glyf.to_u16(), loca: loca.to_u16() };
        if glyf.to_u16().checked_add(1) != Some(loca.to_u16()) {
            return Err(violation());
        }
        if *loca_for_glyf.entry(glyf).or_insert(loca) != loca
            || *glyf_for_loca.entry(loca).or_insert(glyf) != glyf
        {
            return Err(violation());
        }
    }
    Ok(())
}

/// Pack the collection header: version, then the font count.
pub fn pack_collection_header(version: CollectionVersion, num_fonts: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(7);
    out.extend(version.to_u32().to_be_bytes());
    write_255_count(num_fonts, &mut out)?;
    Ok(out)
}

/// Pack the per-font entries that follow the collection header.
pub fn pack_collection_directory(fonts: &[CollectionDirectoryEntry]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for font in fonts {
        write_255_count(font.num_tables(), &mut out)?;
        out.extend(font.flavor.to_be_bytes());
        for index in font.indices.values() {
            write_255_count(index.to_u16().into(), &mut out)?;
        }
    }
    Ok(out)
}

/// Parse a collection header and its entries.
///
/// `shared_tags` is the tag of each table in the shared directory, used to
/// resolve indices back to tags. Returns the version, the entries and the
/// bytes consumed.
pub fn read_collection(
    data: &[u8],
    shared_tags: &[Tag],
) -> Result<(CollectionVersion, Vec<CollectionDirectoryEntry>, usize)> {
    let version = data.get(..4).ok_or(Error::Truncated)?;
    let version = u32::from_be_bytes([version[0], version[1], version[2], version[3]]);
    let version = CollectionVersion::from_u32(version)
        .ok_or(Error::InvalidContainer("unknown collection header version"))?;
    let mut pos = 4;
    let (num_fonts, n) = read_255_u16(&data[pos..])?;
    pos += n;

    let mut fonts = Vec::with_capacity(num_fonts.into());
    for _ in 0..num_fonts {
        let (num_tables, n) = read_255_u16(data.get(pos..).ok_or(Error::Truncated)?)?;
        pos += n;
        let flavor = data.get(pos..pos + 4).ok_or(Error::Truncated)?;
        let flavor = u32::from_be_bytes([flavor[0], flavor[1], flavor[2], flavor[3]]);
        pos += 4;
        let mut indices = IndexMap::with_capacity(num_tables.into());
        for _ in 0..num_tables {
            let (index, n) = read_255_u16(data.get(pos..).ok_or(Error::Truncated)?)?;
            pos += n;
            let tag = *shared_tags
                .get(usize::from(index))
                .ok_or(Error::InvalidContainer("collection table index out of range"))?;
            if indices.insert(tag, TableIndex::new(index)).is_some() {
                return Err(Error::InvalidContainer("font references a tag twice"));
            }
        }
        fonts.push(CollectionDirectoryEntry { flavor, indices });
    }
    Ok((version, fonts, pos))
}
