//! Domain-specific newtypes for type safety
//!
//! Collection bookkeeping juggles three kinds of index (font position, shared
//! table slot, glyph id). Wrapping them keeps the resolver from mixing them up.

use std::fmt::{self, Display, Formatter};

use read_fonts::types::Tag;

macro_rules! u16_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[repr(transparent)]
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u16);

        impl $name {
            pub const fn new(id: u16) -> Self {
                Self(id)
            }

            pub const fn to_u16(self) -> u16 {
                self.0
            }

            pub const fn to_u32(self) -> u32 {
                self.0 as u32
            }
        }

        impl From<u16> for $name {
            fn from(id: u16) -> Self {
                Self(id)
            }
        }

        impl From<$name> for u16 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $label, self.0)
            }
        }
    };
}

/// Position of a font within the collection being encoded
#[repr(transparent)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FontIndex(pub usize);

impl FontIndex {
    pub const fn new(idx: usize) -> Self {
        Self(idx)
    }

    pub const fn as_usize(self) -> usize {
        self.0
    }
}

impl From<usize> for FontIndex {
    fn from(idx: usize) -> Self {
        Self(idx)
    }
}

impl Display for FontIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Font[{}]", self.0)
    }
}

u16_id!(
    /// A slot in the deduplicated table list of a collection
    TableIndex,
    "T"
);

u16_id!(
    /// A glyph id in its source font
    GlyphId,
    "GID"
);

pub const GLYF: Tag = Tag::new(b"glyf");
pub const LOCA: Tag = Tag::new(b"loca");
pub const HMTX: Tag = Tag::new(b"hmtx");
pub const HEAD: Tag = Tag::new(b"head");
pub const HHEA: Tag = Tag::new(b"hhea");
pub const MAXP: Tag = Tag::new(b"maxp");

/// sfnt version of a TrueType-outline font.
pub const TRUETYPE_FLAVOR: u32 = 0x0001_0000;
/// sfnt version of a CFF-outline font (`OTTO`).
pub const CFF_FLAVOR: u32 = 0x4F54_544F;
/// Flavor recorded for collections (`ttcf`).
pub const COLLECTION_FLAVOR: u32 = 0x7474_6366;

/// Parse a table tag, padding short strings with spaces.
///
/// Returns None if the string is longer than 4 bytes.
pub fn parse_tag(s: &str) -> Option<Tag> {
    let bytes = s.as_bytes();
    (bytes.len() <= 4).then(|| {
        let mut arr = [b' '; 4];
        arr[..bytes.len()].copy_from_slice(bytes);
        Tag::new(&arr)
    })
}
