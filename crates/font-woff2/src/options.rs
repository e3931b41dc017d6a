//! Options for WOFF2 encoding
//!
//! The defaults produce a conformant container. Everything under "fixture
//! knobs" exists to build files a decoder is expected to reject or to decode
//! through an unusual path.

use crate::{
    collection::{CollectionVersion, SharingOptions},
    compress::BrotliParams,
    glyf::{BboxPolicy, GlyfOptions},
    hmtx::{HmtxPolicy, check_hmtx_flags},
    types::parse_tag,
    varint::U16Repr,
};

/// Options for WOFF2 encoding
#[derive(Debug, Clone)]
pub struct Options {
    /// Apply the glyf/loca transform to TrueType fonts
    pub transform_glyf: bool,

    /// Try the hmtx transform (requires the glyf transform)
    pub transform_hmtx: bool,

    pub hmtx_policy: HmtxPolicy,

    /// Set head.flags bit 11 and recompute head.checkSumAdjustment
    pub set_transformed_flag: bool,

    pub brotli: BrotliParams,

    /// Extended metadata (uncompressed XML)
    pub metadata: Option<Vec<u8>>,

    pub private_data: Option<Vec<u8>>,

    pub collection_version: CollectionVersion,

    /// majorVersion / minorVersion header fields
    pub font_version: (u16, u16),

    // Fixture knobs
    pub bbox_policy: BboxPolicy,
    pub point_count_repr: U16Repr,
    pub base128_leading_zero: bool,
    pub sharing: SharingOptions,
    pub unsort_glyf_loca: bool,
    /// Mark every simple glyph as overlapping, which adds the glyf overlap bitmap
    pub mark_overlaps: bool,
    /// Overwrite the flags byte of the transformed hmtx table
    pub hmtx_flags: Option<u8>,
    /// Store four zero bytes as the transformed loca
    pub nonzero_loca: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            transform_glyf: true,
            transform_hmtx: true,
            hmtx_policy: HmtxPolicy::default(),
            set_transformed_flag: true,
            brotli: BrotliParams::default(),
            metadata: None,
            private_data: None,
            collection_version: CollectionVersion::default(),
            font_version: (0, 0),
            bbox_policy: BboxPolicy::default(),
            point_count_repr: U16Repr::default(),
            base128_leading_zero: false,
            sharing: SharingOptions::default(),
            unsort_glyf_loca: false,
            mark_overlaps: false,
            hmtx_flags: None,
            nonzero_loca: false,
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Turn both outline and metrics transforms on or off
    pub fn transforms(mut self, enabled: bool) -> Self {
        self.transform_glyf = enabled;
        self.transform_hmtx = enabled;
        self
    }

    pub fn transform_glyf(mut self, enabled: bool) -> Self {
        self.transform_glyf = enabled;
        self
    }

    pub fn transform_hmtx(mut self, enabled: bool) -> Self {
        self.transform_hmtx = enabled;
        self
    }

    pub fn hmtx_policy(mut self, policy: HmtxPolicy) -> Self {
        self.hmtx_policy = policy;
        self
    }

    pub fn set_transformed_flag(mut self, enabled: bool) -> Self {
        self.set_transformed_flag = enabled;
        self
    }

    pub fn quality(mut self, quality: u32) -> Self {
        self.brotli.quality = quality;
        self
    }

    pub fn window(mut self, window: u32) -> Self {
        self.brotli.window = window;
        self
    }

    pub fn metadata(mut self, metadata: impl Into<Vec<u8>>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }

    pub fn private_data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.private_data = Some(data.into());
        self
    }

    pub fn collection_version(mut self, version: CollectionVersion) -> Self {
        self.collection_version = version;
        self
    }

    pub fn font_version(mut self, major: u16, minor: u16) -> Self {
        self.font_version = (major, minor);
        self
    }

    pub fn bbox_policy(mut self, policy: BboxPolicy) -> Self {
        self.bbox_policy = policy;
        self
    }

    pub fn point_count_repr(mut self, repr: U16Repr) -> Self {
        self.point_count_repr = repr;
        self
    }

    pub fn base128_leading_zero(mut self, enabled: bool) -> Self {
        self.base128_leading_zero = enabled;
        self
    }

    /// Tables that are never shared between collection fonts (accepts any
    /// iterable of string-like values)
    pub fn duplicate_tables(mut self, tables: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
        self.sharing.duplicate_tags = tables.into_iter().filter_map(|s| parse_tag(s.as_ref())).collect();
        self
    }

    pub fn mismatch_glyf_loca(mut self, enabled: bool) -> Self {
        self.sharing.mismatch_glyf_loca = enabled;
        self
    }

    pub fn unsort_glyf_loca(mut self, enabled: bool) -> Self {
        self.unsort_glyf_loca = enabled;
        self
    }

    pub fn mark_overlaps(mut self, enabled: bool) -> Self {
        self.mark_overlaps = enabled;
        self
    }

    /// Force the transformed hmtx flags byte. The transform is applied even
    /// when it would omit nothing.
    pub fn hmtx_flags(mut self, flags: u8) -> Self {
        self.hmtx_flags = Some(flags);
        self
    }

    pub fn nonzero_loca(mut self, enabled: bool) -> Self {
        self.nonzero_loca = enabled;
        self
    }

    pub(crate) fn glyf_options(&self) -> GlyfOptions {
        GlyfOptions {
            bbox_policy: self.bbox_policy,
            point_count_repr: self.point_count_repr,
            mark_overlaps: self.mark_overlaps,
        }
    }

    /// Whether any knob that produces deliberately invalid output is set
    pub fn produces_invalid_output(&self) -> bool {
        self.bbox_policy != BboxPolicy::Conformant
            || self.base128_leading_zero
            || self.sharing.mismatch_glyf_loca
            || self.unsort_glyf_loca
            || self.hmtx_flags.is_some_and(|flags| check_hmtx_flags(flags).is_err())
            || self.nonzero_loca
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GLYF, LOCA};

    #[test]
    fn test_defaults_are_conformant() {
        let options = Options::new();
        assert!(options.transform_glyf);
        assert!(options.transform_hmtx);
        assert!(options.set_transformed_flag);
        assert_eq!(options.brotli.quality, 11);
        assert!(!options.produces_invalid_output());
    }

    #[test]
    fn test_builder() {
        let options = Options::new()
            .transforms(false)
            .quality(5)
            .duplicate_tables(["glyf", "loca", "toolong"])
            .base128_leading_zero(true);
        assert!(!options.transform_glyf);
        assert!(!options.transform_hmtx);
        assert_eq!(options.brotli.quality, 5);
        assert_eq!(options.sharing.duplicate_tags, [GLYF, LOCA]);
        assert!(options.produces_invalid_output());
    }

    #[test]
    fn test_hmtx_flags_validity() {
        assert!(!Options::new().hmtx_flags(0x03).produces_invalid_output());
        assert!(Options::new().hmtx_flags(0xff).produces_invalid_output());
        assert!(Options::new().hmtx_flags(0x00).produces_invalid_output());
        assert!(!Options::new().mark_overlaps(true).produces_invalid_output());
        assert!(Options::new().nonzero_loca(true).produces_invalid_output());
    }
}
