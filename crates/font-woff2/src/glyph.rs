//! Glyph records consumed by the glyf transform.
//!
//! These are owned, decoded outlines: a glyph is empty, simple (contours of
//! points) or composite (references to other glyphs). Conversion from
//! `read-fonts` glyphs lives here as well so the transform never sees raw
//! glyf bytes.

use read_fonts::tables::glyf::{
    Anchor as ReadAnchor, CompositeGlyph as ReadComposite, CompositeGlyphFlags,
    Glyph as ReadGlyph, SimpleGlyph as ReadSimple, SimpleGlyphFlags, Transform as ReadTransform,
};

use crate::{Error, Result, types::GlyphId};

/// Glyph bounding box, as stored in the glyph header.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Bbox {
    pub x_min: i16,
    pub y_min: i16,
    pub x_max: i16,
    pub y_max: i16,
}

impl Bbox {
    pub const fn new(x_min: i16, y_min: i16, x_max: i16, y_max: i16) -> Self {
        Self { x_min, y_min, x_max, y_max }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    /// Tight bounds of a point set; all-zero when there are no points.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point>) -> Self {
        let mut points = points.into_iter();
        let Some(first) = points.next() else {
            return Self::default();
        };
        points.fold(Self::new(first.x, first.y, first.x, first.y), |bbox, p| Self {
            x_min: bbox.x_min.min(p.x),
            y_min: bbox.y_min.min(p.y),
            x_max: bbox.x_max.max(p.x),
            y_max: bbox.y_max.max(p.y),
        })
    }

    pub(crate) fn write(&self, out: &mut Vec<u8>) {
        for v in [self.x_min, self.y_min, self.x_max, self.y_max] {
            out.extend(v.to_be_bytes());
        }
    }
}

/// A point of a simple glyph contour.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Point {
    pub x: i16,
    pub y: i16,
    pub on_curve: bool,
}

impl Point {
    pub const fn on_curve(x: i16, y: i16) -> Self {
        Self { x, y, on_curve: true }
    }

    pub const fn off_curve(x: i16, y: i16) -> Self {
        Self { x, y, on_curve: false }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SimpleGlyph {
    pub contours: Vec<Vec<Point>>,
    pub instructions: Vec<u8>,
    /// Bounding box as stored in the font. May differ from the outline when a
    /// font (or a fixture) says so.
    pub bbox: Bbox,
    /// `OVERLAP_SIMPLE` on the first point's flag.
    pub overlap: bool,
}

impl SimpleGlyph {
    /// Build a glyph whose stored bbox matches its outline.
    pub fn new(contours: Vec<Vec<Point>>, instructions: Vec<u8>) -> Self {
        let bbox = Bbox::from_points(contours.iter().flatten());
        Self { contours, instructions, bbox, overlap: false }
    }

    pub fn with_bbox(mut self, bbox: Bbox) -> Self {
        self.bbox = bbox;
        self
    }

    pub fn with_overlap(mut self, overlap: bool) -> Self {
        self.overlap = overlap;
        self
    }

    pub fn num_points(&self) -> usize {
        self.contours.iter().map(Vec::len).sum()
    }

    pub fn points(&self) -> impl Iterator<Item = &Point> {
        self.contours.iter().flatten()
    }

    pub fn computed_bbox(&self) -> Bbox {
        Bbox::from_points(self.points())
    }
}

/// Component placement.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Anchor {
    Offset { x: i16, y: i16 },
    Point { base: u16, component: u16 },
}

/// Component transform, kept as raw F2Dot14 bits so it round-trips exactly.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ComponentTransform {
    #[default]
    Identity,
    Scale(i16),
    XyScale { x: i16, y: i16 },
    TwoByTwo { xx: i16, yx: i16, xy: i16, yy: i16 },
}

/// Component flag bits.
pub mod component_flags {
    pub const ARG_1_AND_2_ARE_WORDS: u16 = 0x0001;
    pub const ARGS_ARE_XY_VALUES: u16 = 0x0002;
    pub const WE_HAVE_A_SCALE: u16 = 0x0008;
    pub const MORE_COMPONENTS: u16 = 0x0020;
    pub const WE_HAVE_AN_X_AND_Y_SCALE: u16 = 0x0040;
    pub const WE_HAVE_A_TWO_BY_TWO: u16 = 0x0080;
    pub const WE_HAVE_INSTRUCTIONS: u16 = 0x0100;

    /// Bits the encoder derives from the component itself.
    pub(crate) const DERIVED: u16 = ARGS_ARE_XY_VALUES
        | WE_HAVE_A_SCALE
        | MORE_COMPONENTS
        | WE_HAVE_AN_X_AND_Y_SCALE
        | WE_HAVE_A_TWO_BY_TWO
        | WE_HAVE_INSTRUCTIONS;
}

use component_flags::*;

/// One component record of a composite glyph.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Component {
    pub glyph: u16,
    pub anchor: Anchor,
    pub transform: ComponentTransform,
    /// Remaining flag bits (rounding, overlap, metrics, arg width). Placement,
    /// transform and continuation bits are recomputed on write.
    pub flags: u16,
}

impl Component {
    /// A component whose argument width is chosen to fit its anchor.
    pub fn new(glyph: u16, anchor: Anchor) -> Self {
        let fits_bytes = match anchor {
            Anchor::Offset { x, y } => i8::try_from(x).is_ok() && i8::try_from(y).is_ok(),
            Anchor::Point { base, component } => base <= 0xff && component <= 0xff,
        };
        let flags = if fits_bytes { 0 } else { ARG_1_AND_2_ARE_WORDS };
        Self { glyph, anchor, transform: ComponentTransform::Identity, flags }
    }

    pub fn with_transform(mut self, transform: ComponentTransform) -> Self {
        self.transform = transform;
        self
    }

    /// Serialize the record as it appears in both glyf and the composite stream.
    pub(crate) fn write(
        &self,
        glyph_id: GlyphId,
        more: bool,
        have_instructions: bool,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        let words = self.flags & ARG_1_AND_2_ARE_WORDS != 0;
        let mut flags = self.flags & !DERIVED;
        if matches!(self.anchor, Anchor::Offset { .. }) {
            flags |= ARGS_ARE_XY_VALUES;
        }
        flags |= match self.transform {
            ComponentTransform::Identity => 0,
            ComponentTransform::Scale(_) => WE_HAVE_A_SCALE,
            ComponentTransform::XyScale { .. } => WE_HAVE_AN_X_AND_Y_SCALE,
            ComponentTransform::TwoByTwo { .. } => WE_HAVE_A_TWO_BY_TWO,
        };
        if more {
            flags |= MORE_COMPONENTS;
        }
        if have_instructions {
            flags |= WE_HAVE_INSTRUCTIONS;
        }
        out.extend(flags.to_be_bytes());
        out.extend(self.glyph.to_be_bytes());

        let too_wide = || Error::MalformedGlyphGeometry {
            glyph_id: glyph_id.to_u32(),
            reason: "component argument does not fit in a byte",
        };
        match (self.anchor, words) {
            (Anchor::Offset { x, y }, true) => {
                out.extend(x.to_be_bytes());
                out.extend(y.to_be_bytes());
            }
            (Anchor::Offset { x, y }, false) => {
                let x = i8::try_from(x).map_err(|_| too_wide())?;
                let y = i8::try_from(y).map_err(|_| too_wide())?;
                out.extend([x as u8, y as u8]);
            }
            (Anchor::Point { base, component }, true) => {
                out.extend(base.to_be_bytes());
                out.extend(component.to_be_bytes());
            }
            (Anchor::Point { base, component }, false) => {
                let base = u8::try_from(base).map_err(|_| too_wide())?;
                let component = u8::try_from(component).map_err(|_| too_wide())?;
                out.extend([base, component]);
            }
        }

        match self.transform {
            ComponentTransform::Identity => {}
            ComponentTransform::Scale(s) => out.extend(s.to_be_bytes()),
            ComponentTransform::XyScale { x, y } => {
                out.extend(x.to_be_bytes());
                out.extend(y.to_be_bytes());
            }
            ComponentTransform::TwoByTwo { xx, yx, xy, yy } => {
                for v in [xx, yx, xy, yy] {
                    out.extend(v.to_be_bytes());
                }
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompositeGlyph {
    pub components: Vec<Component>,
    pub instructions: Option<Vec<u8>>,
    pub bbox: Bbox,
}

/// A glyph in original glyph-index order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Glyph {
    /// No outline. The bbox is all-zero in a well-formed font.
    Empty { bbox: Bbox },
    Simple(SimpleGlyph),
    Composite(CompositeGlyph),
}

impl Default for Glyph {
    fn default() -> Self {
        Self::Empty { bbox: Bbox::default() }
    }
}

impl Glyph {
    /// `numberOfContours` as written to the nContour stream.
    pub fn number_of_contours(&self) -> i16 {
        match self {
            Self::Empty { .. } => 0,
            Self::Simple(simple) => simple.contours.len() as i16,
            Self::Composite(_) => -1,
        }
    }

    pub fn bbox(&self) -> Bbox {
        match self {
            Self::Empty { bbox } => *bbox,
            Self::Simple(simple) => simple.bbox,
            Self::Composite(composite) => composite.bbox,
        }
    }

    /// The xMin an hmtx left side bearing is compared against.
    pub fn x_min(&self) -> i16 {
        match self {
            Self::Empty { .. } => 0,
            glyph => glyph.bbox().x_min,
        }
    }

    /// Decode a `read-fonts` glyph; `None` is an empty loca range.
    ///
    /// A glyph header with zero contours is empty too, keeping its stored bbox.
    pub fn from_read(glyph: Option<&ReadGlyph>, glyph_id: GlyphId) -> Result<Self> {
        match glyph {
            None => Ok(Self::default()),
            Some(ReadGlyph::Simple(simple)) if simple.number_of_contours() == 0 => Ok(Self::Empty {
                bbox: Bbox::new(simple.x_min(), simple.y_min(), simple.x_max(), simple.y_max()),
            }),
            Some(ReadGlyph::Simple(simple)) => convert_simple(simple, glyph_id).map(Self::Simple),
            Some(ReadGlyph::Composite(composite)) => {
                convert_composite(composite, glyph_id).map(Self::Composite)
            }
        }
    }
}

fn convert_simple(simple: &ReadSimple, glyph_id: GlyphId) -> Result<SimpleGlyph> {
    let malformed = |reason| Error::MalformedGlyphGeometry { glyph_id: glyph_id.to_u32(), reason };

    let mut points = simple.points();
    let mut contours = Vec::new();
    let mut start = 0usize;
    for end_pt in simple.end_pts_of_contours() {
        let end = end_pt.get() as usize;
        if end < start {
            return Err(malformed("contour end points are not increasing"));
        }
        let count = end + 1 - start;
        let contour: Vec<Point> = points
            .by_ref()
            .take(count)
            .map(|p| Point { x: p.x, y: p.y, on_curve: p.on_curve })
            .collect();
        if contour.len() != count {
            return Err(malformed("fewer points than contour end points claim"));
        }
        contours.push(contour);
        start = end + 1;
    }

    Ok(SimpleGlyph {
        contours,
        instructions: simple.instructions().to_vec(),
        bbox: Bbox::new(simple.x_min(), simple.y_min(), simple.x_max(), simple.y_max()),
        overlap: simple
            .glyph_data()
            .first()
            .is_some_and(|flag| flag & SimpleGlyphFlags::OVERLAP_SIMPLE.bits() != 0),
    })
}

fn convert_transform(flags: CompositeGlyphFlags, t: &ReadTransform) -> ComponentTransform {
    if flags.contains(CompositeGlyphFlags::WE_HAVE_A_SCALE) {
        ComponentTransform::Scale(t.xx.to_bits())
    } else if flags.contains(CompositeGlyphFlags::WE_HAVE_AN_X_AND_Y_SCALE) {
        ComponentTransform::XyScale { x: t.xx.to_bits(), y: t.yy.to_bits() }
    } else if flags.contains(CompositeGlyphFlags::WE_HAVE_A_TWO_BY_TWO) {
        ComponentTransform::TwoByTwo {
            xx: t.xx.to_bits(),
            yx: t.yx.to_bits(),
            xy: t.xy.to_bits(),
            yy: t.yy.to_bits(),
        }
    } else {
        ComponentTransform::Identity
    }
}

fn convert_composite(composite: &ReadComposite, glyph_id: GlyphId) -> Result<CompositeGlyph> {
    let components: Vec<Component> = composite
        .components()
        .map(|c| Component {
            glyph: c.glyph.to_u32() as u16,
            anchor: match c.anchor {
                ReadAnchor::Offset { x, y } => Anchor::Offset { x, y },
                ReadAnchor::Point { base, component } => Anchor::Point { base, component },
            },
            transform: convert_transform(c.flags, &c.transform),
            flags: c.flags.bits() & !DERIVED,
        })
        .collect();

    if components.is_empty() {
        return Err(Error::MalformedGlyphGeometry {
            glyph_id: glyph_id.to_u32(),
            reason: "composite glyph without components",
        });
    }

    Ok(CompositeGlyph {
        components,
        instructions: composite.instructions().map(<[u8]>::to_vec),
        bbox: Bbox::new(composite.x_min(), composite.y_min(), composite.x_max(), composite.y_max()),
    })
}

#[cfg(test)]
mod tests {
    use read_fonts::{FontData, FontRead};

    use super::*;

    /// A raw simple glyph: header, end points, no instructions, then one
    /// on-curve flag per point and byte-sized positive deltas.
    fn raw_simple(end_pts: &[u16], bbox: [i16; 4], first_flag: u8) -> Vec<u8> {
        let mut data = (end_pts.len() as i16).to_be_bytes().to_vec();
        for v in bbox {
            data.extend(v.to_be_bytes());
        }
        for end in end_pts {
            data.extend(end.to_be_bytes());
        }
        data.extend([0, 0]);
        let num_points = end_pts.last().map_or(0, |end| *end as usize + 1);
        // On curve, x and y short and positive.
        let flag = 0x01 | 0x02 | 0x04 | 0x10 | 0x20;
        for i in 0..num_points {
            data.push(if i == 0 { flag | first_flag } else { flag });
        }
        data.extend(std::iter::repeat_n(5, 2 * num_points));
        data
    }

    fn read_glyph(data: &[u8]) -> Result<Glyph> {
        let simple = ReadSimple::read(FontData::new(data))?;
        Glyph::from_read(Some(&ReadGlyph::Simple(simple)), GlyphId::new(2))
    }

    #[test]
    fn test_bbox_from_points() {
        let points = [Point::on_curve(10, -5), Point::off_curve(-3, 40), Point::on_curve(7, 7)];
        assert_eq!(Bbox::from_points(&points), Bbox::new(-3, -5, 10, 40));
        assert!(Bbox::from_points(&[]).is_zero());
    }

    #[test]
    fn test_simple_glyph_bbox_matches_outline() {
        let glyph = SimpleGlyph::new(
            vec![vec![Point::on_curve(0, 0), Point::on_curve(100, 0), Point::on_curve(50, 80)]],
            vec![],
        );
        assert_eq!(glyph.bbox, glyph.computed_bbox());
        assert_eq!(glyph.num_points(), 3);
    }

    #[test]
    fn test_number_of_contours() {
        assert_eq!(Glyph::default().number_of_contours(), 0);
        let composite = Glyph::Composite(CompositeGlyph {
            components: vec![Component::new(1, Anchor::Offset { x: 0, y: 0 })],
            instructions: None,
            bbox: Bbox::default(),
        });
        assert_eq!(composite.number_of_contours(), -1);
    }

    #[test]
    fn test_component_write_bytes() {
        let component = Component::new(3, Anchor::Offset { x: 10, y: -2 });
        let mut out = Vec::new();
        component.write(GlyphId::new(0), true, false, &mut out).unwrap();
        assert_eq!(out, [0x00, 0x22, 0x00, 0x03, 10, 0xfe]);
    }

    #[test]
    fn test_component_write_words_and_scale() {
        let component = Component::new(7, Anchor::Offset { x: 300, y: 0 })
            .with_transform(ComponentTransform::Scale(0x2000));
        let mut out = Vec::new();
        component.write(GlyphId::new(0), false, true, &mut out).unwrap();
        assert_eq!(out, [0x01, 0x0b, 0x00, 0x07, 0x01, 0x2c, 0x00, 0x00, 0x20, 0x00]);
    }

    #[test]
    fn test_component_byte_args_overflow() {
        let mut component = Component::new(1, Anchor::Offset { x: 500, y: 0 });
        component.flags &= !ARG_1_AND_2_ARE_WORDS;
        let err = component.write(GlyphId::new(4), false, false, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, Error::MalformedGlyphGeometry { glyph_id: 4, .. }));
    }

    #[test]
    fn test_empty_glyph_x_min_is_zero() {
        let glyph = Glyph::Empty { bbox: Bbox::new(5, 5, 5, 5) };
        assert_eq!(glyph.x_min(), 0);
    }

    #[test]
    fn test_zero_contour_header_is_empty() {
        let glyph = read_glyph(&raw_simple(&[], [0; 4], 0)).unwrap();
        assert_eq!(glyph, Glyph::default());

        let glyph = read_glyph(&raw_simple(&[], [1, 2, 3, 4], 0)).unwrap();
        assert_eq!(glyph, Glyph::Empty { bbox: Bbox::new(1, 2, 3, 4) });
    }

    #[test]
    fn test_overlap_flag_from_first_point() {
        let Glyph::Simple(plain) = read_glyph(&raw_simple(&[2], [5, 5, 15, 15], 0)).unwrap() else {
            panic!("expected a simple glyph");
        };
        assert!(!plain.overlap);
        assert_eq!(plain.num_points(), 3);

        let Glyph::Simple(overlapping) = read_glyph(&raw_simple(&[2], [5, 5, 15, 15], 0x40)).unwrap()
        else {
            panic!("expected a simple glyph");
        };
        assert!(overlapping.overlap);
        assert_eq!(overlapping.contours, plain.contours);
    }
}
