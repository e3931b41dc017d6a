//! The WOFF2 header and the final container layout.
//!
//! ```text
//! header (48 bytes)
//! table directory
//! collection header + entries   (collections only)
//! compressed table data         padded to 4 if anything follows
//! compressed metadata           padded to 4 if private data follows
//! private data
//! ```

use crate::{Error, Result};

/// `wOF2`.
pub const SIGNATURE: u32 = 0x774F_4632;
pub const HEADER_SIZE: usize = 48;

/// The fixed header at the start of every WOFF2 file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Header {
    pub flavor: u32,
    pub length: u32,
    pub num_tables: u16,
    pub reserved: u16,
    pub total_sfnt_size: u32,
    pub total_compressed_size: u32,
    pub major_version: u16,
    pub minor_version: u16,
    pub meta_offset: u32,
    pub meta_length: u32,
    pub meta_orig_length: u32,
    pub priv_offset: u32,
    pub priv_length: u32,
}

impl Header {
    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend(SIGNATURE.to_be_bytes());
        out.extend(self.flavor.to_be_bytes());
        out.extend(self.length.to_be_bytes());
        out.extend(self.num_tables.to_be_bytes());
        out.extend(self.reserved.to_be_bytes());
        out.extend(self.total_sfnt_size.to_be_bytes());
        out.extend(self.total_compressed_size.to_be_bytes());
        out.extend(self.major_version.to_be_bytes());
        out.extend(self.minor_version.to_be_bytes());
        for v in [
            self.meta_offset,
            self.meta_length,
            self.meta_orig_length,
            self.priv_offset,
            self.priv_length,
        ] {
            out.extend(v.to_be_bytes());
        }
    }

    /// Parse a header. Only the signature is checked here.
    pub fn read(data: &[u8]) -> Result<Self> {
        let data = data.get(..HEADER_SIZE).ok_or(Error::Truncated)?;
        let u32_at = |pos: usize| u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]);
        let u16_at = |pos: usize| u16::from_be_bytes([data[pos], data[pos + 1]]);
        if u32_at(0) != SIGNATURE {
            return Err(Error::InvalidContainer("bad signature"));
        }
        Ok(Self {
            flavor: u32_at(4),
            length: u32_at(8),
            num_tables: u16_at(12),
            reserved: u16_at(14),
            total_sfnt_size: u32_at(16),
            total_compressed_size: u32_at(20),
            major_version: u16_at(24),
            minor_version: u16_at(26),
            meta_offset: u32_at(28),
            meta_length: u32_at(32),
            meta_orig_length: u32_at(36),
            priv_offset: u32_at(40),
            priv_length: u32_at(44),
        })
    }
}

/// Compressed extended metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Metadata {
    pub compressed: Vec<u8>,
    pub orig_length: usize,
}

/// Everything the assembler lays out, already packed.
#[derive(Clone, Debug, Default)]
pub struct ContainerParts {
    pub flavor: u32,
    pub num_tables: usize,
    pub directory: Vec<u8>,
    /// Collection header and entries.
    pub collection: Option<Vec<u8>>,
    pub table_data: Vec<u8>,
    pub total_sfnt_size: u64,
    pub version: (u16, u16),
    pub metadata: Option<Metadata>,
    pub private_data: Option<Vec<u8>>,
}

fn to_u32(value: usize, field: &'static str) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::IntegerRangeViolation { value: value as u64, encoding: field })
}

/// Lay out a container and fill in the header fields that depend on it.
pub fn assemble(parts: ContainerParts) -> Result<Vec<u8>> {
    let ContainerParts {
        flavor,
        num_tables,
        directory,
        collection,
        table_data,
        total_sfnt_size,
        version,
        metadata,
        private_data,
    } = parts;

    let mut header = Header {
        flavor,
        num_tables: u16::try_from(num_tables).map_err(|_| Error::IntegerRangeViolation {
            value: num_tables as u64,
            encoding: "numTables",
        })?,
        total_sfnt_size: u32::try_from(total_sfnt_size).map_err(|_| Error::IntegerRangeViolation {
            value: total_sfnt_size,
            encoding: "totalSfntSize",
        })?,
        total_compressed_size: to_u32(table_data.len(), "totalCompressedSize")?,
        major_version: version.0,
        minor_version: version.1,
        ..Default::default()
    };

    let mut body = Vec::with_capacity(directory.len() + table_data.len());
    body.extend_from_slice(&directory);
    if let Some(collection) = &collection {
        body.extend_from_slice(collection);
    }
    body.extend_from_slice(&table_data);
    let mut end = HEADER_SIZE + body.len();

    if let Some(metadata) = &metadata {
        let pad = end.next_multiple_of(4) - end;
        body.resize(body.len() + pad, 0);
        header.meta_offset = to_u32(HEADER_SIZE + body.len(), "metaOffset")?;
        header.meta_length = to_u32(metadata.compressed.len(), "metaLength")?;
        header.meta_orig_length = to_u32(metadata.orig_length, "metaOrigLength")?;
        body.extend_from_slice(&metadata.compressed);
        end = HEADER_SIZE + body.len();
    }
    if let Some(private_data) = &private_data {
        let pad = end.next_multiple_of(4) - end;
        body.resize(body.len() + pad, 0);
        header.priv_offset = to_u32(HEADER_SIZE + body.len(), "privOffset")?;
        header.priv_length = to_u32(private_data.len(), "privLength")?;
        body.extend_from_slice(private_data);
    }
    header.length = to_u32(HEADER_SIZE + body.len(), "length")?;

    let mut out = Vec::with_capacity(HEADER_SIZE + body.len());
    header.write(&mut out);
    out.append(&mut body);
    debug_assert_eq!(out.len(), header.length as usize);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts() -> ContainerParts {
        ContainerParts {
            flavor: 0x0001_0000,
            num_tables: 1,
            directory: vec![1, 54],
            table_data: vec![0xaa; 7],
            total_sfnt_size: 12 + 16 + 56,
            ..Default::default()
        }
    }

    #[test]
    fn test_header_layout() {
        let data = assemble(parts()).unwrap();
        assert_eq!(&data[..4], b"wOF2");
        let header = Header::read(&data).unwrap();
        assert_eq!(header.length as usize, data.len());
        assert_eq!(header.num_tables, 1);
        assert_eq!(header.total_compressed_size, 7);
        assert_eq!(header.total_sfnt_size, 84);
        assert_eq!(header.meta_offset, 0);
    }

    #[test]
    fn test_last_section_is_not_padded() {
        let data = assemble(parts()).unwrap();
        assert_eq!(data.len(), HEADER_SIZE + 2 + 7);
    }

    #[test]
    fn test_metadata_alignment() {
        let mut parts = parts();
        parts.metadata = Some(Metadata { compressed: vec![1, 2, 3], orig_length: 20 });
        let data = assemble(parts).unwrap();
        let header = Header::read(&data).unwrap();
        assert_eq!(header.meta_offset, 60);
        assert_eq!(header.meta_length, 3);
        assert_eq!(header.meta_orig_length, 20);
        assert_eq!(data.len(), 63);
        assert_eq!(&data[57..60], &[0, 0, 0]);
    }

    #[test]
    fn test_private_data_after_metadata() {
        let mut parts = parts();
        parts.metadata = Some(Metadata { compressed: vec![1, 2, 3], orig_length: 20 });
        parts.private_data = Some(vec![9; 5]);
        let data = assemble(parts).unwrap();
        let header = Header::read(&data).unwrap();
        assert_eq!(header.priv_offset, 64);
        assert_eq!(header.priv_length, 5);
        assert_eq!(header.length, 69);
        assert_eq!(&data[64..], &[9; 5]);
    }

    #[test]
    fn test_private_data_without_metadata() {
        let mut parts = parts();
        parts.private_data = Some(vec![9; 4]);
        let header = Header::read(&assemble(parts).unwrap()).unwrap();
        assert_eq!(header.priv_offset, 60);
        assert_eq!(header.meta_offset, 0);
    }

    #[test]
    fn test_bad_signature() {
        let mut data = assemble(parts()).unwrap();
        data[0] = b'x';
        assert!(matches!(Header::read(&data), Err(Error::InvalidContainer(_))));
        assert!(matches!(Header::read(&data[..20]), Err(Error::Truncated)));
    }
}
