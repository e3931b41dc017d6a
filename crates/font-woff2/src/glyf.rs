//! The glyf/loca transform.
//!
//! Glyphs are split across seven streams behind a fixed header:
//!
//! ```text
//! u16 reserved (0)       u16 optionFlags        u16 numGlyphs
//! u16 indexFormat        u32 nContourStreamSize u32 nPointsStreamSize
//! u32 flagStreamSize     u32 glyphStreamSize    u32 compositeStreamSize
//! u32 bboxStreamSize     u32 instructionStreamSize
//! ```
//!
//! `bboxStreamSize` covers the bbox bitmap and the boxes that follow it. When
//! bit 0 of `optionFlags` is set, an overlap bitmap with one bit per glyph
//! follows the instruction stream. The transformed loca is always empty; a
//! decoder rebuilds it from glyph boundaries.

use log::debug;

use crate::{
    Error, Result,
    glyph::{Bbox, CompositeGlyph, Glyph, SimpleGlyph},
    triplet::encode_triplet,
    types::GlyphId,
    varint::{U16Repr, U16Writer},
};

/// Size of the transformed glyf header in bytes.
pub const HEADER_SIZE: usize = 36;
/// `optionFlags` bit 0: an overlap bitmap follows the streams.
pub const HAS_OVERLAP_BITMAP: u16 = 0x0001;

/// When glyph bounding boxes are written to the bbox stream.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum BboxPolicy {
    /// Boxes are written only when they cannot be recomputed. Composite
    /// glyphs always carry one; an empty glyph with a non-zero box is an error.
    #[default]
    Conformant,
    /// Every empty glyph gets its bitmap bit and its stored box.
    ExplicitEmpty,
    /// Composite glyphs never carry a box, which a decoder must reject.
    OmitComposite,
}

#[derive(Clone, Debug, Default)]
pub struct GlyfOptions {
    pub bbox_policy: BboxPolicy,
    /// Representation of point counts and instruction lengths. Alternation
    /// restarts with every glyph.
    pub point_count_repr: U16Repr,
    /// Mark every simple glyph as overlapping, whatever its own flag says.
    pub mark_overlaps: bool,
}

/// The seven output streams, in wire order.
#[derive(Debug, Default)]
struct Streams {
    n_contour: Vec<u8>,
    n_points: Vec<u8>,
    flags: Vec<u8>,
    glyph: Vec<u8>,
    composite: Vec<u8>,
    bbox_bitmap: Vec<u8>,
    bbox: Vec<u8>,
    instructions: Vec<u8>,
    overlap_bitmap: Vec<u8>,
    has_overlap: bool,
}

impl Streams {
    fn new(num_glyphs: usize) -> Self {
        Self {
            bbox_bitmap: vec![0; bbox_bitmap_len(num_glyphs)],
            overlap_bitmap: vec![0; overlap_bitmap_len(num_glyphs)],
            ..Default::default()
        }
    }

    fn record_bbox(&mut self, glyph_id: usize, bbox: &Bbox) {
        set_bit(&mut self.bbox_bitmap, glyph_id);
        bbox.write(&mut self.bbox);
    }

    fn record_overlap(&mut self, glyph_id: usize) {
        set_bit(&mut self.overlap_bitmap, glyph_id);
        self.has_overlap = true;
    }
}

/// Glyph bits are numbered from the most significant bit of byte 0.
fn set_bit(bitmap: &mut [u8], glyph_id: usize) {
    bitmap[glyph_id >> 3] |= 0x80 >> (glyph_id & 7);
}

/// Bitmap length: one bit per glyph, rounded up to whole 32-bit words.
pub fn bbox_bitmap_len(num_glyphs: usize) -> usize {
    4 * num_glyphs.div_ceil(32)
}

/// Overlap bitmap length: one bit per glyph, rounded up to whole bytes.
pub fn overlap_bitmap_len(num_glyphs: usize) -> usize {
    num_glyphs.div_ceil(8)
}

/// Transform an ordered glyph list into the glyf stream format.
///
/// `index_format` is `head.indexToLocFormat` of the source font.
pub fn transform_glyf(glyphs: &[Glyph], index_format: u16, options: &GlyfOptions) -> Result<Vec<u8>> {
    let num_glyphs = u16::try_from(glyphs.len()).map_err(|_| Error::IntegerRangeViolation {
        value: glyphs.len() as u64,
        encoding: "numGlyphs",
    })?;

    let mut streams = Streams::new(glyphs.len());

    for (gid, glyph) in glyphs.iter().enumerate() {
        let glyph_id = GlyphId::new(gid as u16);
        let mut counts = U16Writer::new(options.point_count_repr);
        streams.n_contour.extend(glyph.number_of_contours().to_be_bytes());
        match glyph {
            Glyph::Empty { bbox } => match options.bbox_policy {
                BboxPolicy::ExplicitEmpty => streams.record_bbox(gid, bbox),
                _ if !bbox.is_zero() => {
                    return Err(Error::MalformedGlyphGeometry {
                        glyph_id: glyph_id.to_u32(),
                        reason: "empty glyph with a non-zero bounding box",
                    });
                }
                _ => {}
            },
            Glyph::Simple(simple) => {
                write_simple(simple, glyph_id, &mut counts, &mut streams)?;
                if simple.bbox != simple.computed_bbox() {
                    streams.record_bbox(gid, &simple.bbox);
                }
                if simple.overlap || options.mark_overlaps {
                    streams.record_overlap(gid);
                }
            }
            Glyph::Composite(composite) => {
                write_composite(composite, glyph_id, &mut counts, &mut streams)?;
                if options.bbox_policy != BboxPolicy::OmitComposite {
                    streams.record_bbox(gid, &composite.bbox);
                }
            }
        }
    }

    let bbox_size = streams.bbox_bitmap.len() + streams.bbox.len();
    let sizes = [
        streams.n_contour.len(),
        streams.n_points.len(),
        streams.flags.len(),
        streams.glyph.len(),
        streams.composite.len(),
        bbox_size,
        streams.instructions.len(),
    ];
    let overlap: &[u8] = if streams.has_overlap { &streams.overlap_bitmap } else { &[] };
    let option_flags = if streams.has_overlap { HAS_OVERLAP_BITMAP } else { 0 };
    debug!(
        "glyf transform: {num_glyphs} glyphs, streams nContour={} nPoints={} flags={} glyph={} \
         composite={} bbox={} instructions={} overlap={}",
        sizes[0], sizes[1], sizes[2], sizes[3], sizes[4], sizes[5], sizes[6], overlap.len()
    );

    let mut out = Vec::with_capacity(HEADER_SIZE + sizes.iter().sum::<usize>() + overlap.len());
    out.extend(0u16.to_be_bytes());
    out.extend(option_flags.to_be_bytes());
    out.extend(num_glyphs.to_be_bytes());
    out.extend(index_format.to_be_bytes());
    for size in sizes {
        let size = u32::try_from(size).map_err(|_| Error::IntegerRangeViolation {
            value: size as u64,
            encoding: "glyf stream size",
        })?;
        out.extend(size.to_be_bytes());
    }
    for stream in [
        &streams.n_contour,
        &streams.n_points,
        &streams.flags,
        &streams.glyph,
        &streams.composite,
        &streams.bbox_bitmap,
        &streams.bbox,
        &streams.instructions,
    ] {
        out.extend_from_slice(stream);
    }
    out.extend_from_slice(overlap);
    Ok(out)
}

fn write_instructions(instructions: &[u8], counts: &mut U16Writer, streams: &mut Streams) -> Result<()> {
    let len = u16::try_from(instructions.len()).map_err(|_| Error::IntegerRangeViolation {
        value: instructions.len() as u64,
        encoding: "255UInt16",
    })?;
    counts.write(len, &mut streams.glyph);
    streams.instructions.extend_from_slice(instructions);
    Ok(())
}

fn write_simple(
    simple: &SimpleGlyph,
    glyph_id: GlyphId,
    point_counts: &mut U16Writer,
    streams: &mut Streams,
) -> Result<()> {
    let malformed = |reason| Error::MalformedGlyphGeometry { glyph_id: glyph_id.to_u32(), reason };
    if simple.contours.is_empty() {
        return Err(malformed("simple glyph without contours"));
    }
    if simple.contours.len() > i16::MAX as usize {
        return Err(malformed("too many contours"));
    }
    if simple.num_points() > u16::MAX as usize {
        return Err(malformed("too many points"));
    }

    let (mut last_x, mut last_y) = (0i32, 0i32);
    for contour in &simple.contours {
        if contour.is_empty() {
            return Err(malformed("contour without points"));
        }
        point_counts.write(contour.len() as u16, &mut streams.n_points);
        for point in contour {
            let (x, y) = (i32::from(point.x), i32::from(point.y));
            let triplet = encode_triplet(x - last_x, y - last_y, point.on_curve);
            streams.flags.push(triplet.flag);
            streams.glyph.extend_from_slice(triplet.data());
            (last_x, last_y) = (x, y);
        }
    }
    write_instructions(&simple.instructions, point_counts, streams)
}

fn write_composite(
    composite: &CompositeGlyph,
    glyph_id: GlyphId,
    counts: &mut U16Writer,
    streams: &mut Streams,
) -> Result<()> {
    let Some(last) = composite.components.len().checked_sub(1) else {
        return Err(Error::MalformedGlyphGeometry {
            glyph_id: glyph_id.to_u32(),
            reason: "composite glyph without components",
        });
    };
    let have_instructions = composite.instructions.is_some();
    for (i, component) in composite.components.iter().enumerate() {
        let is_last = i == last;
        component.write(glyph_id, !is_last, is_last && have_instructions, &mut streams.composite)?;
    }
    if let Some(instructions) = &composite.instructions {
        write_instructions(instructions, counts, streams)?;
    }
    Ok(())
}

/// Check a transformed glyf table the way a decoder does before rebuilding it:
/// stream sizes against the table length, and bbox bits against glyph kinds.
pub fn check_transformed_glyf(data: &[u8]) -> Result<()> {
    let header = data.get(..HEADER_SIZE).ok_or(Error::Truncated)?;
    let u16_at = |pos: usize| u16::from_be_bytes([header[pos], header[pos + 1]]);
    if u16_at(0) != 0 {
        return Err(Error::InvalidContainer("reserved glyf transform field is not zero"));
    }
    let num_glyphs = usize::from(u16_at(4));
    let sizes: [u64; 7] = std::array::from_fn(|i| {
        let pos = 8 + 4 * i;
        u32::from_be_bytes([header[pos], header[pos + 1], header[pos + 2], header[pos + 3]]).into()
    });
    let overlap = if u16_at(2) & HAS_OVERLAP_BITMAP != 0 { overlap_bitmap_len(num_glyphs) } else { 0 };
    if HEADER_SIZE as u64 + sizes.iter().sum::<u64>() + overlap as u64 != data.len() as u64 {
        return Err(Error::InvalidContainer("glyf stream sizes do not match the table length"));
    }
    // Every size fits in the table from here on.
    let sizes = sizes.map(|size| size as usize);

    let n_contour = &data[HEADER_SIZE..HEADER_SIZE + sizes[0]];
    if n_contour.len() != 2 * num_glyphs {
        return Err(Error::InvalidContainer("nContour stream does not match numGlyphs"));
    }
    let bitmap_len = bbox_bitmap_len(num_glyphs);
    if sizes[5] < bitmap_len {
        return Err(Error::InvalidContainer("bbox stream is shorter than its bitmap"));
    }
    let bbox_start = HEADER_SIZE + sizes[..5].iter().sum::<usize>();
    let bitmap = &data[bbox_start..bbox_start + bitmap_len];

    let mut boxes = 0;
    for (gid, pair) in n_contour.chunks_exact(2).enumerate() {
        let has_bbox = bitmap[gid >> 3] & (0x80 >> (gid & 7)) != 0;
        boxes += usize::from(has_bbox);
        match i16::from_be_bytes([pair[0], pair[1]]) {
            0 if has_bbox => return Err(Error::InvalidContainer("empty glyph has a bounding box")),
            -1 if !has_bbox => {
                return Err(Error::InvalidContainer("composite glyph without a bounding box"));
            }
            n if n < -1 => return Err(Error::InvalidContainer("negative contour count")),
            _ => {}
        }
    }
    if sizes[5] != bitmap_len + 8 * boxes {
        return Err(Error::InvalidContainer("bbox stream size does not match its bitmap"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glyph::{Anchor, Component, Point};

    fn triangle() -> SimpleGlyph {
        SimpleGlyph::new(
            vec![vec![Point::on_curve(0, 0), Point::on_curve(100, 0), Point::off_curve(50, 80)]],
            vec![0xb0, 0x01],
        )
    }

    fn composite() -> Glyph {
        Glyph::Composite(CompositeGlyph {
            components: vec![
                Component::new(1, Anchor::Offset { x: 0, y: 0 }),
                Component::new(1, Anchor::Offset { x: 120, y: 0 }),
            ],
            instructions: None,
            bbox: Bbox::new(0, 0, 220, 80),
        })
    }

    fn read_u32(data: &[u8], offset: usize) -> u32 {
        u32::from_be_bytes(data[offset..offset + 4].try_into().unwrap())
    }

    /// Stream sizes from the header, in wire order.
    fn stream_sizes(data: &[u8]) -> [usize; 7] {
        std::array::from_fn(|i| read_u32(data, 8 + 4 * i) as usize)
    }

    fn bbox_stream(data: &[u8]) -> &[u8] {
        let sizes = stream_sizes(data);
        let start = HEADER_SIZE + sizes[..5].iter().sum::<usize>();
        &data[start..start + sizes[5]]
    }

    #[test]
    fn test_header_fields() {
        let glyphs = vec![Glyph::default(), Glyph::Simple(triangle())];
        let data = transform_glyf(&glyphs, 1, &GlyfOptions::default()).unwrap();
        assert_eq!(read_u32(&data, 0), 0);
        assert_eq!(&data[4..8], &[0, 2, 0, 1]);
        let sizes = stream_sizes(&data);
        assert_eq!(data.len(), HEADER_SIZE + sizes.iter().sum::<usize>());
        // nContour: one i16 per glyph.
        assert_eq!(sizes[0], 4);
        // nPoints: a single contour of three points.
        assert_eq!(sizes[1], 1);
        assert_eq!(sizes[2], 3);
        // Bitmap only, no boxes.
        assert_eq!(sizes[5], 4);
        assert_eq!(sizes[6], 2);
    }

    #[test]
    fn test_stream_contents() {
        let data = transform_glyf(&[Glyph::Simple(triangle())], 0, &GlyfOptions::default()).unwrap();
        let body = &data[HEADER_SIZE..];
        assert_eq!(&body[..2], &[0, 1]);
        assert_eq!(body[2], 3);
        // (0,0) on, (+100,0) on, (-50,+80) off.
        assert_eq!(&body[3..6], &[0, 11, 0x80 | encode_triplet(-50, 80, true).flag]);
    }

    #[test]
    fn test_matching_bbox_is_omitted() {
        let data = transform_glyf(&[Glyph::Simple(triangle())], 0, &GlyfOptions::default()).unwrap();
        assert_eq!(bbox_stream(&data), &[0, 0, 0, 0]);
    }

    #[test]
    fn test_bbox_off_by_one_adds_eight_bytes() {
        let base = transform_glyf(&[Glyph::Simple(triangle())], 0, &GlyfOptions::default()).unwrap();
        let mut glyph = triangle();
        glyph.bbox.x_max += 1;
        let data = transform_glyf(&[Glyph::Simple(glyph)], 0, &GlyfOptions::default()).unwrap();
        assert_eq!(data.len(), base.len() + 8);
        assert_eq!(bbox_stream(&data), &[0x80, 0, 0, 0, 0, 0, 0, 0, 0, 101, 0, 80]);
    }

    #[test]
    fn test_bitmap_bit_position() {
        let mut glyphs = vec![Glyph::default(); 10];
        glyphs[9] = composite();
        glyphs[1] = Glyph::Simple(triangle());
        let data = transform_glyf(&glyphs, 0, &GlyfOptions::default()).unwrap();
        let bbox = bbox_stream(&data);
        assert_eq!(&bbox[..4], &[0, 0x40, 0, 0]);
        assert_eq!(&bbox[4..], &[0, 0, 0, 0, 0, 220, 0, 80]);
    }

    #[test]
    fn test_composite_bbox_policy() {
        let glyphs = vec![Glyph::Simple(triangle()), composite()];
        let options = GlyfOptions { bbox_policy: BboxPolicy::OmitComposite, ..Default::default() };
        let data = transform_glyf(&glyphs, 0, &options).unwrap();
        assert_eq!(bbox_stream(&data), &[0, 0, 0, 0]);
    }

    #[test]
    fn test_composite_stream_flags() {
        let data = transform_glyf(&[composite()], 0, &GlyfOptions::default()).unwrap();
        let sizes = stream_sizes(&data);
        assert_eq!(sizes[3], 0);
        assert_eq!(sizes[4], 12);
        let start = HEADER_SIZE + sizes[..4].iter().sum::<usize>();
        let composite = &data[start..start + sizes[4]];
        // First record continues, the second does not.
        assert_eq!(&composite[..2], &[0x00, 0x22]);
        assert_eq!(&composite[6..8], &[0x00, 0x02]);
    }

    #[test]
    fn test_empty_glyph_with_bbox() {
        let glyphs = vec![Glyph::Empty { bbox: Bbox::new(0, 0, 10, 10) }];
        let err = transform_glyf(&glyphs, 0, &GlyfOptions::default()).unwrap_err();
        assert!(matches!(err, Error::MalformedGlyphGeometry { glyph_id: 0, .. }));

        let options = GlyfOptions { bbox_policy: BboxPolicy::ExplicitEmpty, ..Default::default() };
        let data = transform_glyf(&glyphs, 0, &options).unwrap();
        assert_eq!(bbox_stream(&data), &[0x80, 0, 0, 0, 0, 0, 0, 0, 0, 10, 0, 10]);
    }

    #[test]
    fn test_contour_without_points() {
        let glyph = SimpleGlyph::new(vec![vec![]], vec![]);
        assert!(transform_glyf(&[Glyph::Simple(glyph)], 0, &GlyfOptions::default()).is_err());
    }

    #[test]
    fn test_bitmap_len() {
        assert_eq!(bbox_bitmap_len(0), 0);
        assert_eq!(bbox_bitmap_len(1), 4);
        assert_eq!(bbox_bitmap_len(32), 4);
        assert_eq!(bbox_bitmap_len(33), 8);
    }

    #[test]
    fn test_overlap_bitmap() {
        let glyphs = vec![
            Glyph::default(),
            Glyph::Simple(triangle()),
            Glyph::Simple(triangle().with_overlap(true)),
            composite(),
        ];
        let plain = transform_glyf(&glyphs[..2], 0, &GlyfOptions::default()).unwrap();
        assert_eq!(&plain[2..4], &[0, 0]);

        let data = transform_glyf(&glyphs, 0, &GlyfOptions::default()).unwrap();
        assert_eq!(u16::from_be_bytes([data[2], data[3]]), HAS_OVERLAP_BITMAP);
        let sizes = stream_sizes(&data);
        // The bitmap is not counted in any stream size.
        assert_eq!(data.len(), HEADER_SIZE + sizes.iter().sum::<usize>() + 1);
        assert_eq!(data.last(), Some(&0b0010_0000));

        let options = GlyfOptions { mark_overlaps: true, ..Default::default() };
        let marked = transform_glyf(&glyphs, 0, &options).unwrap();
        assert_eq!(marked.last(), Some(&0b0110_0000));
        assert_eq!(overlap_bitmap_len(9), 2);
    }

    #[test]
    fn test_alternate_counts_restart_per_glyph() {
        let long_contour: Vec<Point> = (0..506).map(|i| Point::on_curve(i, 0)).collect();
        let glyph = Glyph::Simple(SimpleGlyph::new(vec![long_contour], vec![0; 506]));
        let options = GlyfOptions { point_count_repr: U16Repr::Cycle, ..Default::default() };
        let data = transform_glyf(&[glyph.clone(), glyph], 0, &options).unwrap();
        let sizes = stream_sizes(&data);

        // Both glyphs start the rotation over: the shortest form first.
        let n_points = &data[HEADER_SIZE + sizes[0]..HEADER_SIZE + sizes[0] + sizes[1]];
        assert_eq!(n_points, &[254, 0, 254, 0]);

        // The instruction length takes the next form in the rotation.
        let glyph_start = HEADER_SIZE + sizes[..3].iter().sum::<usize>();
        let glyph_stream = &data[glyph_start..glyph_start + sizes[3]];
        let per_glyph = glyph_stream.len() / 2;
        assert_eq!(&glyph_stream[per_glyph - 3..per_glyph], &[253, 1, 250]);
        assert_eq!(&glyph_stream[glyph_stream.len() - 3..], &[253, 1, 250]);
    }

    #[test]
    fn test_check_transformed_glyf() {
        let glyphs = vec![Glyph::default(), Glyph::Simple(triangle().with_overlap(true)), composite()];
        let data = transform_glyf(&glyphs, 0, &GlyfOptions::default()).unwrap();
        check_transformed_glyf(&data).unwrap();
        assert!(check_transformed_glyf(&data[..data.len() - 1]).is_err());
        assert!(matches!(check_transformed_glyf(&data[..20]), Err(Error::Truncated)));

        let options = GlyfOptions { bbox_policy: BboxPolicy::OmitComposite, ..Default::default() };
        let data = transform_glyf(&glyphs, 0, &options).unwrap();
        assert!(matches!(
            check_transformed_glyf(&data),
            Err(Error::InvalidContainer("composite glyph without a bounding box"))
        ));

        let options = GlyfOptions { bbox_policy: BboxPolicy::ExplicitEmpty, ..Default::default() };
        let data = transform_glyf(&glyphs, 0, &options).unwrap();
        assert!(matches!(
            check_transformed_glyf(&data),
            Err(Error::InvalidContainer("empty glyph has a bounding box"))
        ));
    }
}
