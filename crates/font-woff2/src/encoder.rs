//! Main Encoder implementation

use log::{debug, info, warn};
use read_fonts::FileRef;

use crate::{
    Error, Result,
    collection::{CollectionFont, pack_collection_directory, pack_collection_header, resolve},
    compress::{Brotli, Compress, CompressionMode, compress_or_store},
    container::{ContainerParts, Metadata, assemble},
    directory::{TableEntry, check_transform_pairs, pack_directory, put_loca_before_glyf, sort_by_tag},
    glyf::transform_glyf,
    hmtx::{pack_hmtx, transform_hmtx},
    options::Options,
    sfnt::{ChecksumCache, SourceFont, set_lossless_transform_flag, update_checksum_adjustment},
    types::{COLLECTION_FLAVOR, GLYF, HEAD, HMTX, LOCA},
};

/// WOFF2 encoder for single fonts and collections
#[derive(Debug, Default)]
pub struct Encoder {
    options: Options,
    compressor: Brotli,
}

/// A font after its tables went through the transforms.
#[derive(Debug)]
pub struct TransformedFont {
    pub flavor: u32,
    pub entries: Vec<TableEntry>,
}

impl Encoder {
    /// Create a new Encoder with the given options
    pub fn new(options: Options) -> Self {
        let compressor = Brotli::new(options.brotli);
        Self { options, compressor }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Encode a font file, which may be a single font or a collection
    pub fn encode(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.encode_with_cache(data, &mut ChecksumCache::new())
    }

    /// Like [`Encoder::encode`], reusing checksums from earlier encodes
    pub fn encode_with_cache(&self, data: &[u8], checksums: &mut ChecksumCache) -> Result<Vec<u8>> {
        match FileRef::new(data)? {
            FileRef::Font(font) => self.encode_font(&SourceFont::new(font), checksums),
            FileRef::Collection(collection) => {
                let fonts = collection
                    .iter()
                    .map(|font| font.map(SourceFont::new))
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                self.encode_collection(&fonts, checksums)
            }
        }
    }

    /// Apply the table transforms to one font.
    pub fn transform_font(
        &self,
        font: &SourceFont,
        checksums: &mut ChecksumCache,
    ) -> Result<TransformedFont> {
        let flavor = font.flavor();
        let mut tables = font.tables();

        if self.options.set_transformed_flag {
            if let Some(head) = tables.get_mut(&HEAD) {
                set_lossless_transform_flag(head)?;
                update_checksum_adjustment(flavor, &mut tables, checksums)?;
            }
        }

        let mut transformed = Vec::new();
        let glyf_transformed =
            self.options.transform_glyf && tables.contains_key(&GLYF) && tables.contains_key(&LOCA);
        if glyf_transformed {
            let glyphs = font.glyphs()?;
            let glyf = transform_glyf(&glyphs, font.index_format()?, &self.options.glyf_options())?;
            debug!("glyf: {} glyphs, {} bytes transformed", glyphs.len(), glyf.len());
            transformed.push((GLYF, glyf, 0));
            let loca = if self.options.nonzero_loca {
                warn!("storing a non-empty transformed loca");
                vec![0; 4]
            } else {
                Vec::new()
            };
            transformed.push((LOCA, loca, 0));

            if self.options.transform_hmtx && tables.contains_key(&HMTX) {
                let original_len = tables.get(&HMTX).map_or(0, Vec::len);
                let metrics = font.horizontal_metrics()?;
                let hmtx = transform_hmtx(&metrics, &glyphs, self.options.hmtx_policy)?;
                match (hmtx, self.options.hmtx_flags) {
                    (hmtx, Some(flags)) => {
                        let mut hmtx = hmtx.unwrap_or_else(|| pack_hmtx(&metrics, 0));
                        debug!("hmtx flags forced from {:#04x} to {flags:#04x}", hmtx[0]);
                        hmtx[0] = flags;
                        transformed.push((HMTX, hmtx, 1));
                    }
                    (Some(hmtx), None) if hmtx.len() < original_len => transformed.push((HMTX, hmtx, 1)),
                    (Some(_), None) => debug!("hmtx transform does not shrink the table, storing as is"),
                    (None, None) => {}
                }
            }
        } else if self.options.transform_hmtx && tables.contains_key(&HMTX) {
            debug!("hmtx transform needs a transformed glyf, storing as is");
        }

        let mut entries = Vec::with_capacity(tables.len());
        for (tag, original) in tables {
            let entry = match transformed.iter().position(|(t, _, _)| *t == tag) {
                Some(i) => {
                    let (_, data, code) = transformed.swap_remove(i);
                    TableEntry::transformed(tag, original, data, code)?
                }
                None => TableEntry::passthrough(tag, original),
            };
            entries.push(entry);
        }
        check_transform_pairs(&entries)?;
        Ok(TransformedFont { flavor, entries })
    }

    /// Encode a single font
    pub fn encode_font(&self, font: &SourceFont, checksums: &mut ChecksumCache) -> Result<Vec<u8>> {
        self.warn_fixture_knobs();
        let TransformedFont { flavor, mut entries } = self.transform_font(font, checksums)?;

        sort_by_tag(&mut entries);
        if self.options.unsort_glyf_loca {
            warn!("placing loca before glyf; the table directory will be out of order");
            put_loca_before_glyf(&mut entries);
        }

        let directory = pack_directory(&entries, self.options.base128_leading_zero)?;
        let payload: Vec<u8> = entries.iter().flat_map(|e| e.stored().iter().copied()).collect();
        let total_sfnt_size = 12
            + 16 * entries.len() as u64
            + entries.iter().map(|e| (e.original.len() as u64).next_multiple_of(4)).sum::<u64>();

        self.finish(ContainerParts {
            flavor,
            num_tables: entries.len(),
            directory,
            collection: None,
            table_data: payload,
            total_sfnt_size,
            ..Default::default()
        })
    }

    /// Encode several fonts as one collection, sharing identical tables
    pub fn encode_collection(
        &self,
        fonts: &[SourceFont],
        checksums: &mut ChecksumCache,
    ) -> Result<Vec<u8>> {
        if fonts.is_empty() {
            return Err(Error::NoFonts);
        }
        self.warn_fixture_knobs();

        let mut collection_fonts = Vec::with_capacity(fonts.len());
        for font in fonts {
            let TransformedFont { flavor, entries } = self.transform_font(font, checksums)?;
            collection_fonts.push(CollectionFont::new(flavor, entries));
        }
        let resolved = resolve(collection_fonts, &self.options.sharing, checksums)?;

        let entries: Vec<TableEntry> = resolved.tables.iter().map(|t| t.entry.clone()).collect();
        let directory = pack_directory(&entries, self.options.base128_leading_zero)?;
        let mut collection = pack_collection_header(self.options.collection_version, resolved.fonts.len())?;
        collection.extend(pack_collection_directory(&resolved.fonts)?);
        let payload: Vec<u8> = entries.iter().flat_map(|e| e.stored().iter().copied()).collect();

        self.finish(ContainerParts {
            flavor: COLLECTION_FLAVOR,
            num_tables: entries.len(),
            directory,
            collection: Some(collection),
            table_data: payload,
            total_sfnt_size: resolved.sfnt_size(self.options.collection_version),
            ..Default::default()
        })
    }

    /// Compress the payload and metadata, then lay out the container.
    fn finish(&self, mut parts: ContainerParts) -> Result<Vec<u8>> {
        let payload_len = parts.table_data.len();
        let (table_data, compressed) =
            compress_or_store(&self.compressor, &parts.table_data, CompressionMode::Font)?;
        parts.table_data = table_data;
        parts.version = self.options.font_version;
        parts.metadata = self
            .options
            .metadata
            .as_deref()
            .map(|xml| -> Result<Metadata> {
                Ok(Metadata {
                    compressed: self.compressor.compress(xml, CompressionMode::Text)?,
                    orig_length: xml.len(),
                })
            })
            .transpose()?;
        parts.private_data = self.options.private_data.clone();

        let num_tables = parts.num_tables;
        let stored_len = parts.table_data.len();
        let data = assemble(parts)?;
        info!(
            "Encoded {num_tables} tables: {payload_len} bytes of table data {} to {stored_len}, \
             {} bytes total",
            if compressed { "compressed" } else { "stored" },
            data.len()
        );
        Ok(data)
    }

    fn warn_fixture_knobs(&self) {
        if self.options.produces_invalid_output() {
            warn!("fixture options are set; the output is deliberately invalid");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        container::{HEADER_SIZE, Header},
        directory::read_directory,
    };

    // The encoder is exercised end to end with real fonts in tests/; these
    // cover the pieces that do not need one.

    #[test]
    fn test_encode_rejects_garbage() {
        assert!(Encoder::default().encode(b"not a font").is_err());
    }

    #[test]
    fn test_encode_collection_without_fonts() {
        let result = Encoder::default().encode_collection(&[], &mut ChecksumCache::new());
        assert!(matches!(result, Err(Error::NoFonts)));
    }

    #[test]
    fn test_finish_stores_incompressible_payload() {
        let encoder = Encoder::new(Options::new().metadata("<metadata/>"));
        let data = encoder
            .finish(ContainerParts {
                flavor: 0x0001_0000,
                num_tables: 1,
                directory: vec![1, 1],
                table_data: vec![0x42],
                total_sfnt_size: 32,
                ..Default::default()
            })
            .unwrap();
        let header = Header::read(&data).unwrap();
        assert_eq!(header.total_compressed_size, 1);
        assert_eq!(header.meta_orig_length, 11);
        assert_eq!(header.meta_offset, 52);
        let (entries, _) = read_directory(&data[HEADER_SIZE..], 1).unwrap();
        assert_eq!(entries[0].orig_length, 1);
    }
}
