//! The hmtx transform: drop left side bearings that equal glyph xMin.

use log::debug;

use crate::{Error, Result, glyph::Glyph, types::HMTX};

/// Bit 0: the proportional `lsb` array is omitted.
pub const PROPORTIONAL_LSBS_OMITTED: u8 = 0x01;
/// Bit 1: the trailing `leftSideBearing` array is omitted.
pub const MONOSPACE_LSBS_OMITTED: u8 = 0x02;
const RESERVED_BITS: u8 = !(PROPORTIONAL_LSBS_OMITTED | MONOSPACE_LSBS_OMITTED);

/// When the transform is applied.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum HmtxPolicy {
    /// Only when every side bearing equals its glyph's xMin.
    #[default]
    Strict,
    /// When either side bearing array is fully redundant.
    Partial,
}

/// Decoded hmtx contents.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HorizontalMetrics {
    /// One advance per long metric (`numberOfHMetrics` entries).
    pub advances: Vec<u16>,
    /// One side bearing per glyph: the long metrics first, then the trailing array.
    pub side_bearings: Vec<i16>,
}

impl HorizontalMetrics {
    pub fn num_h_metrics(&self) -> usize {
        self.advances.len()
    }
}

/// Transform hmtx against the glyphs it describes.
///
/// Returns `None` when the policy does not allow the transform, in which case
/// the table is stored as is.
pub fn transform_hmtx(
    metrics: &HorizontalMetrics,
    glyphs: &[Glyph],
    policy: HmtxPolicy,
) -> Result<Option<Vec<u8>>> {
    let num_h_metrics = metrics.num_h_metrics();
    if num_h_metrics == 0 || num_h_metrics > glyphs.len() {
        return Err(Error::UnsupportedTransformCombination {
            tag: HMTX,
            reason: "numberOfHMetrics is zero or exceeds the glyph count",
        });
    }
    if metrics.side_bearings.len() != glyphs.len() {
        return Err(Error::UnsupportedTransformCombination {
            tag: HMTX,
            reason: "hmtx and glyf disagree on the glyph count",
        });
    }

    let matches_x_min = |range: std::ops::Range<usize>| {
        metrics.side_bearings[range.clone()]
            .iter()
            .zip(&glyphs[range])
            .all(|(lsb, glyph)| *lsb == glyph.x_min())
    };
    let proportional = matches_x_min(0..num_h_metrics);
    // Vacuously redundant when every glyph has a long metric.
    let monospace = matches_x_min(num_h_metrics..glyphs.len());

    let apply = match policy {
        HmtxPolicy::Strict => proportional && monospace,
        HmtxPolicy::Partial => proportional || monospace,
    };
    if !apply {
        debug!(
            "hmtx transform skipped: proportional lsbs redundant={proportional}, \
             monospace lsbs redundant={monospace}"
        );
        return Ok(None);
    }

    let mut flags = 0;
    if proportional {
        flags |= PROPORTIONAL_LSBS_OMITTED;
    }
    if monospace {
        flags |= MONOSPACE_LSBS_OMITTED;
    }
    let out = pack_hmtx(metrics, flags);
    debug!("hmtx transform applied with flags {flags:#04x}, {} bytes", out.len());
    Ok(Some(out))
}

/// Pack a transformed hmtx table, omitting the arrays `flags` says to omit.
pub fn pack_hmtx(metrics: &HorizontalMetrics, flags: u8) -> Vec<u8> {
    let num_h_metrics = metrics.num_h_metrics();
    let mut out = Vec::with_capacity(1 + 2 * num_h_metrics + 2 * metrics.side_bearings.len());
    out.push(flags);
    for advance in &metrics.advances {
        out.extend(advance.to_be_bytes());
    }
    let split = num_h_metrics.min(metrics.side_bearings.len());
    let (proportional, monospace) = metrics.side_bearings.split_at(split);
    if flags & PROPORTIONAL_LSBS_OMITTED == 0 {
        for lsb in proportional {
            out.extend(lsb.to_be_bytes());
        }
    }
    if flags & MONOSPACE_LSBS_OMITTED == 0 {
        for lsb in monospace {
            out.extend(lsb.to_be_bytes());
        }
    }
    out
}

/// Validate the flags byte that starts a transformed hmtx table.
pub fn check_hmtx_flags(flags: u8) -> Result<()> {
    if flags & RESERVED_BITS != 0 {
        return Err(Error::InvalidContainer("reserved hmtx transform flag bits set"));
    }
    if flags == 0 {
        return Err(Error::InvalidContainer("hmtx transform omits no side bearings"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glyph::{Bbox, Point, SimpleGlyph};

    fn glyph_at(x_min: i16) -> Glyph {
        Glyph::Simple(SimpleGlyph::new(
            vec![vec![Point::on_curve(x_min, 0), Point::on_curve(x_min + 10, 20)]],
            vec![],
        ))
    }

    fn glyphs() -> Vec<Glyph> {
        vec![Glyph::default(), glyph_at(15), glyph_at(-4), glyph_at(7)]
    }

    #[test]
    fn test_all_redundant() {
        let metrics = HorizontalMetrics { advances: vec![500, 600], side_bearings: vec![0, 15, -4, 7] };
        let out = transform_hmtx(&metrics, &glyphs(), HmtxPolicy::Strict).unwrap().unwrap();
        assert_eq!(out, [0x03, 0x01, 0xf4, 0x02, 0x58]);
        assert!(check_hmtx_flags(out[0]).is_ok());
    }

    #[test]
    fn test_no_monospace_glyphs() {
        let glyphs = glyphs();
        let metrics = HorizontalMetrics {
            advances: vec![500, 600, 600, 600],
            side_bearings: vec![0, 15, -4, 7],
        };
        let out = transform_hmtx(&metrics, &glyphs, HmtxPolicy::Strict).unwrap().unwrap();
        assert_eq!(out[0], PROPORTIONAL_LSBS_OMITTED | MONOSPACE_LSBS_OMITTED);
        assert_eq!(out.len(), 1 + 8);

        let partial = transform_hmtx(&metrics, &glyphs, HmtxPolicy::Partial).unwrap().unwrap();
        assert_eq!(partial, out);
    }

    #[test]
    fn test_mismatch_skips_transform() {
        let metrics = HorizontalMetrics { advances: vec![500, 600], side_bearings: vec![0, 15, -4, 8] };
        assert_eq!(transform_hmtx(&metrics, &glyphs(), HmtxPolicy::Strict).unwrap(), None);
    }

    #[test]
    fn test_partial_keeps_mismatched_array() {
        let metrics = HorizontalMetrics { advances: vec![500, 600], side_bearings: vec![0, 15, -4, 8] };
        let out = transform_hmtx(&metrics, &glyphs(), HmtxPolicy::Partial).unwrap().unwrap();
        assert_eq!(out, [0x01, 0x01, 0xf4, 0x02, 0x58, 0xff, 0xfc, 0x00, 0x08]);
    }

    #[test]
    fn test_empty_glyph_x_min_is_zero() {
        let glyphs = vec![Glyph::Empty { bbox: Bbox::default() }, glyph_at(3)];
        let metrics = HorizontalMetrics { advances: vec![250, 500], side_bearings: vec![5, 3] };
        assert_eq!(transform_hmtx(&metrics, &glyphs, HmtxPolicy::Strict).unwrap(), None);
    }

    #[test]
    fn test_glyph_count_mismatch() {
        let metrics = HorizontalMetrics { advances: vec![500], side_bearings: vec![0] };
        assert!(matches!(
            transform_hmtx(&metrics, &glyphs(), HmtxPolicy::Strict),
            Err(Error::UnsupportedTransformCombination { .. })
        ));
    }

    #[test]
    fn test_check_flags() {
        assert!(check_hmtx_flags(0x01).is_ok());
        assert!(check_hmtx_flags(0x02).is_ok());
        assert!(check_hmtx_flags(0x00).is_err());
        assert!(check_hmtx_flags(0x04).is_err());
        assert!(check_hmtx_flags(0x83).is_err());
    }

    #[test]
    fn test_pack_with_no_flags_keeps_both_arrays() {
        let metrics = HorizontalMetrics { advances: vec![500], side_bearings: vec![0, 15] };
        assert_eq!(pack_hmtx(&metrics, 0), [0x00, 0x01, 0xf4, 0x00, 0x00, 0x00, 0x0f]);
        assert_eq!(pack_hmtx(&metrics, 0xff), [0xff, 0x01, 0xf4]);
    }
}
