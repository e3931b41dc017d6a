//! `inspect`: dump the structure of a WOFF2 file.

use std::{fmt::Write, path::Path};

use anyhow::{Context, Result};
use woffpress_font_woff2::{Woff2Info, read_woff2};

use crate::io::read_file;

pub fn inspect(path: &Path) -> Result<()> {
    let data = read_file(path)?;
    let info = read_woff2(&data).with_context(|| format!("Invalid WOFF2: {}", path.display()))?;
    print!("{}", describe(&info));
    Ok(())
}

fn tag_of(value: u32) -> String {
    value.to_be_bytes().iter().map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' }).collect()
}

/// Human-readable summary of a parsed container.
pub fn describe(info: &Woff2Info) -> String {
    let header = &info.header;
    let mut out = String::new();
    let _ = writeln!(out, "flavor:              {} ({:#010x})", tag_of(header.flavor), header.flavor);
    let _ = writeln!(out, "length:              {}", header.length);
    let _ = writeln!(out, "numTables:           {}", header.num_tables);
    let _ = writeln!(out, "totalSfntSize:       {}", header.total_sfnt_size);
    let _ = writeln!(out, "totalCompressedSize: {}", header.total_compressed_size);
    let _ = writeln!(out, "version:             {}.{}", header.major_version, header.minor_version);
    if header.meta_offset != 0 {
        let _ = writeln!(
            out,
            "metadata:            offset {}, {} bytes ({} uncompressed)",
            header.meta_offset, header.meta_length, header.meta_orig_length
        );
    }
    if header.priv_offset != 0 {
        let _ = writeln!(out, "private data:        offset {}, {} bytes", header.priv_offset, header.priv_length);
    }

    let _ = writeln!(out, "\n  #  tag   code  origLength  transformLength");
    for (i, table) in info.tables.iter().enumerate() {
        let transform_length = table.transform_length.map_or_else(|| "-".to_string(), |l| l.to_string());
        let _ = writeln!(
            out,
            "{i:>3}  {}  {:>4}  {:>10}  {:>15}",
            table.tag, table.transform, table.orig_length, transform_length
        );
    }

    if let Some(collection) = &info.collection {
        let _ = writeln!(out, "\ncollection version {:#010x}", collection.version.to_u32());
        for (i, font) in collection.fonts.iter().enumerate() {
            let indices: Vec<String> =
                font.indices.iter().map(|(tag, index)| format!("{tag}={}", index.to_u16())).collect();
            let _ = writeln!(out, "  font {i} ({}): {}", tag_of(font.flavor), indices.join(" "));
        }
    }
    out
}
