//! Name table rewriting, used to keep fonts in one collection distinguishable.

use anyhow::{Context, Result};
use read_fonts::{FontRef, TableProvider, types::Tag};
use write_fonts::{
    FontBuilder,
    tables::name::{Name, NameRecord},
};

pub const NAME_ID_FAMILY: u16 = 1;
pub const NAME_ID_FULL_NAME: u16 = 4;
pub const NAME_ID_POSTSCRIPT_NAME: u16 = 6;

const NAME: Tag = Tag::new(b"name");

/// The string a name record gets for the font at `index` of a collection.
///
/// - 1 (Family): `"{family} {index}"`
/// - 4 (Full name): `"Regular"` becomes `"{index} Regular"`
/// - 6 (PostScript name): `"-"` becomes `"{index}-"`
pub fn suffixed_name(name_id: u16, current: &str, index: usize) -> Option<String> {
    match name_id {
        NAME_ID_FAMILY => Some(format!("{current} {index}")),
        NAME_ID_FULL_NAME => Some(current.replace("Regular", &format!("{index} Regular"))),
        NAME_ID_POSTSCRIPT_NAME => Some(current.replace('-', &format!("{index}-"))),
        _ => None,
    }
}

/// Suffix the names of one font. A font without a name table is returned as is.
///
/// Every other table is copied unchanged.
pub fn suffix_names(data: &[u8], index: usize) -> Result<Vec<u8>> {
    let font = FontRef::new(data).context("Failed to parse font")?;
    if font.table_data(NAME).is_none() {
        return Ok(data.to_vec());
    }

    let mut builder = FontBuilder::new();
    builder.add_table(&suffixed_name_table(&font, index)?)?;
    for record in font.table_directory.table_records() {
        let tag = record.tag();
        if tag == NAME {
            continue;
        }
        if let Some(table) = font.table_data(tag) {
            builder.add_raw(tag, table);
        }
    }
    Ok(builder.build())
}

/// The font's name table with [`suffixed_name`] applied to every record.
/// Records whose string cannot be decoded are left out.
fn suffixed_name_table(font: &FontRef, index: usize) -> Result<Name> {
    let name = font.name().context("Failed to read name table")?;
    let strings = name.string_data();
    let records: Vec<NameRecord> = name
        .name_record()
        .iter()
        .filter_map(|record| {
            let current: String = record.string(strings).ok()?.chars().collect();
            let name_id = record.name_id();
            let string = suffixed_name(name_id.to_u16(), &current, index).unwrap_or(current);
            Some(NameRecord::new(
                record.platform_id(),
                record.encoding_id(),
                record.language_id(),
                name_id,
                string.into(),
            ))
        })
        .collect();
    Ok(Name::new(records))
}

/// Give every font a distinct name, numbering from the first font or, with
/// `reverse`, from the last.
pub fn unique_names(fonts: &[&[u8]], reverse: bool) -> Result<Vec<Vec<u8>>> {
    let count = fonts.len();
    fonts
        .iter()
        .enumerate()
        .map(|(i, data)| {
            let index = if reverse { count - i - 1 } else { i };
            suffix_names(data, index).with_context(|| format!("Failed to rename font {i}"))
        })
        .collect()
}
