//! Structural reading of WOFF2 containers.
//!
//! This does not reconstruct sfnt data. It parses the parts the encoder
//! writes and checks the constraints a decoder enforces up front, which is
//! enough to inspect a file and to verify encoder output.

use read_fonts::types::Tag;

use crate::{
    Error, Result,
    collection::{CollectionDirectoryEntry, CollectionVersion, check_glyf_loca_pairing, read_collection},
    compress::{Brotli, Compress},
    container::{HEADER_SIZE, Header},
    directory::{DirectoryEntry, read_directory},
    glyf::check_transformed_glyf,
    hmtx::check_hmtx_flags,
    types::{COLLECTION_FLAVOR, GLYF, HMTX, LOCA},
};

/// A parsed collection block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectionInfo {
    pub version: CollectionVersion,
    pub fonts: Vec<CollectionDirectoryEntry>,
}

/// Everything in a container apart from the compressed bytes themselves.
#[derive(Clone, Debug)]
pub struct Woff2Info {
    pub header: Header,
    pub tables: Vec<DirectoryEntry>,
    pub collection: Option<CollectionInfo>,
    /// Where the compressed table data starts.
    pub data_offset: usize,
}

impl Woff2Info {
    /// Size of the table data once decompressed.
    pub fn payload_length(&self) -> u64 {
        self.tables.iter().map(|t| u64::from(t.stored_length())).sum()
    }

    pub fn compressed_data<'a>(&self, data: &'a [u8]) -> Result<&'a [u8]> {
        let end = self.data_offset + self.header.total_compressed_size as usize;
        data.get(self.data_offset..end).ok_or(Error::Truncated)
    }

    /// Decompress the table data and split it per table, in directory order.
    ///
    /// Transformed glyf and hmtx tables are checked on the way.
    pub fn table_data(&self, data: &[u8]) -> Result<Vec<(Tag, Vec<u8>)>> {
        let compressed = self.compressed_data(data)?;
        // Compressed data is always strictly smaller than the payload.
        let payload = if compressed.len() as u64 == self.payload_length() {
            compressed.to_vec()
        } else {
            Brotli::default().decompress(compressed)?
        };
        if payload.len() as u64 != self.payload_length() {
            return Err(Error::InvalidContainer("table data length does not match the directory"));
        }

        let mut pos = 0;
        let mut tables = Vec::with_capacity(self.tables.len());
        for entry in &self.tables {
            let end = pos + entry.stored_length() as usize;
            let bytes = payload[pos..end].to_vec();
            if entry.transform_length.is_some() {
                if entry.tag == HMTX {
                    check_hmtx_flags(*bytes.first().ok_or(Error::Truncated)?)?;
                } else if entry.tag == GLYF {
                    check_transformed_glyf(&bytes)?;
                }
            }
            tables.push((entry.tag, bytes));
            pos = end;
        }
        Ok(tables)
    }

    /// Decompress the extended metadata block, if there is one.
    pub fn metadata(&self, data: &[u8]) -> Result<Option<Vec<u8>>> {
        if self.header.meta_offset == 0 {
            return Ok(None);
        }
        let start = self.header.meta_offset as usize;
        let compressed = data
            .get(start..start + self.header.meta_length as usize)
            .ok_or(Error::Truncated)?;
        let xml = Brotli::default().decompress(compressed)?;
        if xml.len() != self.header.meta_orig_length as usize {
            return Err(Error::InvalidContainer("metadata length does not match metaOrigLength"));
        }
        Ok(Some(xml))
    }

    pub fn private_data<'a>(&self, data: &'a [u8]) -> Result<Option<&'a [u8]>> {
        if self.header.priv_offset == 0 {
            return Ok(None);
        }
        let start = self.header.priv_offset as usize;
        data.get(start..start + self.header.priv_length as usize).map(Some).ok_or(Error::Truncated)
    }
}

/// Parse the header, table directory and collection block of `data`.
pub fn read_woff2(data: &[u8]) -> Result<Woff2Info> {
    let header = Header::read(data)?;
    if header.reserved != 0 {
        return Err(Error::InvalidContainer("reserved header field is not zero"));
    }
    if header.length as usize != data.len() {
        return Err(Error::InvalidContainer("length does not match the file size"));
    }

    let mut pos = HEADER_SIZE;
    let (tables, n) = read_directory(&data[pos..], header.num_tables.into())?;
    pos += n;
    if tables.iter().any(|t| t.tag == LOCA && t.transform_length.is_some_and(|len| len != 0)) {
        return Err(Error::InvalidContainer("transformed loca is not empty"));
    }
    if header.flavor != COLLECTION_FLAVOR && !tables.is_sorted_by(|a, b| a.tag < b.tag) {
        return Err(Error::InvalidContainer("table directory is not sorted by tag"));
    }

    let collection = if header.flavor == COLLECTION_FLAVOR {
        let tags: Vec<Tag> = tables.iter().map(|t| t.tag).collect();
        let (version, fonts, n) = read_collection(&data[pos..], &tags)?;
        check_glyf_loca_pairing(&fonts)?;
        pos += n;
        Some(CollectionInfo { version, fonts })
    } else {
        None
    };

    Ok(Woff2Info { header, tables, collection, data_offset: pos })
}
