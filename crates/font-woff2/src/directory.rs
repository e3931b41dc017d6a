//! Table entries and the packed WOFF2 table directory.
//!
//! Each directory entry is a flag byte (known-tag index in bits 0-5, transform
//! code in bits 6-7), an optional literal tag, `UIntBase128(origLength)` and,
//! for transformed tables, `UIntBase128(transformLength)`.

use read_fonts::types::Tag;

use crate::{
    Error, Result,
    types::{GLYF, HMTX, LOCA},
    varint::{read_base128, write_base128},
};

/// Flag value announcing a literal 4-byte tag.
pub const CUSTOM_TAG: u8 = 63;

/// Tags with a one-byte encoding. The index of a tag is part of the wire format.
pub const KNOWN_TAGS: [Tag; 63] = [
    Tag::new(b"cmap"),
    Tag::new(b"head"),
    Tag::new(b"hhea"),
    Tag::new(b"hmtx"),
    Tag::new(b"maxp"),
    Tag::new(b"name"),
    Tag::new(b"OS/2"),
    Tag::new(b"post"),
    Tag::new(b"cvt "),
    Tag::new(b"fpgm"),
    Tag::new(b"glyf"),
    Tag::new(b"loca"),
    Tag::new(b"prep"),
    Tag::new(b"CFF "),
    Tag::new(b"VORG"),
    Tag::new(b"EBDT"),
    Tag::new(b"EBLC"),
    Tag::new(b"gasp"),
    Tag::new(b"hdmx"),
    Tag::new(b"kern"),
    Tag::new(b"LTSH"),
    Tag::new(b"PCLT"),
    Tag::new(b"VDMX"),
    Tag::new(b"vhea"),
    Tag::new(b"vmtx"),
    Tag::new(b"BASE"),
    Tag::new(b"GDEF"),
    Tag::new(b"GPOS"),
    Tag::new(b"GSUB"),
    Tag::new(b"EBSC"),
    Tag::new(b"JSTF"),
    Tag::new(b"MATH"),
    Tag::new(b"CBDT"),
    Tag::new(b"CBLC"),
    Tag::new(b"COLR"),
    Tag::new(b"CPAL"),
    Tag::new(b"SVG "),
    Tag::new(b"sbix"),
    Tag::new(b"acnt"),
    Tag::new(b"avar"),
    Tag::new(b"bdat"),
    Tag::new(b"bloc"),
    Tag::new(b"bsln"),
    Tag::new(b"cvar"),
    Tag::new(b"fdsc"),
    Tag::new(b"feat"),
    Tag::new(b"fmtx"),
    Tag::new(b"fvar"),
    Tag::new(b"gvar"),
    Tag::new(b"hsty"),
    Tag::new(b"just"),
    Tag::new(b"lcar"),
    Tag::new(b"mort"),
    Tag::new(b"morx"),
    Tag::new(b"opbd"),
    Tag::new(b"prop"),
    Tag::new(b"trak"),
    Tag::new(b"Zapf"),
    Tag::new(b"Silf"),
    Tag::new(b"Glat"),
    Tag::new(b"Gloc"),
    Tag::new(b"Feat"),
    Tag::new(b"Sill"),
];

pub fn known_tag_index(tag: Tag) -> Option<u8> {
    KNOWN_TAGS.iter().position(|t| *t == tag).map(|i| i as u8)
}

/// Transform code meaning "stored as is" for `tag`.
///
/// glyf and loca invert the usual convention: 0 is their transform and 3 the
/// null transform.
pub fn null_transform(tag: Tag) -> u8 {
    if is_glyf_or_loca(tag) { 3 } else { 0 }
}

pub fn is_transformed(tag: Tag, code: u8) -> bool {
    code != null_transform(tag)
}

fn is_glyf_or_loca(tag: Tag) -> bool {
    tag == GLYF || tag == LOCA
}

/// A table ready for packing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableEntry {
    pub tag: Tag,
    /// The table as it appears in the reconstructed font.
    pub original: Vec<u8>,
    /// Transformed bytes, when a transform was applied.
    pub transformed: Option<Vec<u8>>,
    pub transform: u8,
}

impl TableEntry {
    /// An entry stored without transformation.
    pub fn passthrough(tag: Tag, original: Vec<u8>) -> Self {
        Self { tag, original, transformed: None, transform: null_transform(tag) }
    }

    /// An entry carrying transformed bytes under `code`.
    pub fn transformed(tag: Tag, original: Vec<u8>, transformed: Vec<u8>, code: u8) -> Result<Self> {
        let unsupported = |reason| Error::UnsupportedTransformCombination { tag, reason };
        if code > 3 {
            return Err(unsupported("transform code outside 0..=3"));
        }
        if !is_transformed(tag, code) {
            return Err(unsupported("transformed data under the null transform code"));
        }
        if is_glyf_or_loca(tag) {
            if code != 0 {
                return Err(unsupported("glyf and loca only define transform 0"));
            }
        } else if tag != HMTX || code != 1 {
            return Err(unsupported("no transform is defined for this table"));
        }
        Ok(Self { tag, original, transformed: Some(transformed), transform: code })
    }

    pub fn is_transformed(&self) -> bool {
        self.transformed.is_some()
    }

    /// Bytes that go into the table data payload.
    pub fn stored(&self) -> &[u8] {
        self.transformed.as_deref().unwrap_or(&self.original)
    }

    pub fn directory_entry(&self) -> Result<DirectoryEntry> {
        let len = |data: &[u8]| {
            u32::try_from(data.len()).map_err(|_| Error::IntegerRangeViolation {
                value: data.len() as u64,
                encoding: "UIntBase128",
            })
        };
        Ok(DirectoryEntry {
            tag: self.tag,
            transform: self.transform,
            orig_length: len(&self.original)?,
            transform_length: self.transformed.as_deref().map(len).transpose()?,
        })
    }
}

/// Sort entries by tag, as required for a single font.
pub fn sort_by_tag(entries: &mut [TableEntry]) {
    entries.sort_by_key(|entry| entry.tag);
}

/// Move loca directly in front of glyf. Produces an out-of-order directory.
pub fn put_loca_before_glyf(entries: &mut Vec<TableEntry>) {
    let Some(loca) = entries.iter().position(|e| e.tag == LOCA) else {
        return;
    };
    let entry = entries.remove(loca);
    let glyf = entries.iter().position(|e| e.tag == GLYF).unwrap_or(entries.len());
    entries.insert(glyf, entry);
}

/// Check that glyf and loca are transformed together and that hmtx is only
/// transformed alongside glyf.
pub fn check_transform_pairs(entries: &[TableEntry]) -> Result<()> {
    let transformed = |tag| entries.iter().find(|e| e.tag == tag).map(TableEntry::is_transformed);
    let glyf = transformed(GLYF);
    let loca = transformed(LOCA);
    match (glyf, loca) {
        (Some(true), Some(false)) | (Some(true), None) => Err(Error::UnsupportedTransformCombination {
            tag: GLYF,
            reason: "glyf transformed without loca",
        }),
        (Some(false), Some(true)) | (None, Some(true)) => Err(Error::UnsupportedTransformCombination {
            tag: LOCA,
            reason: "loca transformed without glyf",
        }),
        _ if transformed(HMTX) == Some(true) && glyf != Some(true) => {
            Err(Error::UnsupportedTransformCombination {
                tag: HMTX,
                reason: "hmtx transformed while glyf is not",
            })
        }
        _ => Ok(()),
    }
}

/// One entry of the packed table directory.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub tag: Tag,
    pub transform: u8,
    pub orig_length: u32,
    pub transform_length: Option<u32>,
}

impl DirectoryEntry {
    /// Length of this table in the decompressed payload.
    pub fn stored_length(&self) -> u32 {
        self.transform_length.unwrap_or(self.orig_length)
    }

    pub fn write(&self, leading_zero: bool, out: &mut Vec<u8>) -> Result<()> {
        let transform_bits = self.transform << 6;
        match known_tag_index(self.tag) {
            Some(index) => out.push(index | transform_bits),
            None => {
                out.push(CUSTOM_TAG | transform_bits);
                out.extend(self.tag.to_be_bytes());
            }
        }
        write_base128(self.orig_length.into(), leading_zero, out)?;
        if let Some(length) = self.transform_length {
            write_base128(length.into(), leading_zero, out)?;
        }
        Ok(())
    }

    /// Parse one entry, returning it and the bytes consumed.
    pub fn read(data: &[u8]) -> Result<(Self, usize)> {
        let flags = *data.first().ok_or(Error::Truncated)?;
        let mut pos = 1;
        let tag = match flags & 0x3f {
            CUSTOM_TAG => {
                let bytes: [u8; 4] =
                    data.get(1..5).ok_or(Error::Truncated)?.try_into().map_err(|_| Error::Truncated)?;
                pos += 4;
                Tag::new(&bytes)
            }
            index => KNOWN_TAGS[index as usize],
        };
        let transform = flags >> 6;
        let (orig_length, n) = read_base128(&data[pos..])?;
        pos += n;
        let transform_length = if is_transformed(tag, transform) {
            let (length, n) = read_base128(&data[pos..])?;
            pos += n;
            Some(length)
        } else {
            None
        };
        Ok((Self { tag, transform, orig_length, transform_length }, pos))
    }
}

/// Pack directory entries in the order given.
pub fn pack_directory(entries: &[TableEntry], leading_zero: bool) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for entry in entries {
        entry.directory_entry()?.write(leading_zero, &mut out)?;
    }
    Ok(out)
}

/// Parse `num_tables` consecutive directory entries.
pub fn read_directory(data: &[u8], num_tables: usize) -> Result<(Vec<DirectoryEntry>, usize)> {
    let mut entries = Vec::with_capacity(num_tables);
    let mut pos = 0;
    for _ in 0..num_tables {
        let (entry, n) = DirectoryEntry::read(data.get(pos..).ok_or(Error::Truncated)?)?;
        entries.push(entry);
        pos += n;
    }
    Ok((entries, pos))
}
