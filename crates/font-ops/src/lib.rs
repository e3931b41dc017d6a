//! Font helpers for building WOFF2 test fixtures.
//!
//! - name table suffixing so that fonts packed together stay distinguishable
//! - synthetic TTC construction with controllable table sharing
//! - named encoder configurations for deliberately invalid output

mod collection;
mod fixtures;
mod names;

pub use collection::{TtcOptions, build_ttc};
pub use fixtures::{Fixture, encode_fixture};
pub use names::{
    NAME_ID_FAMILY, NAME_ID_FULL_NAME, NAME_ID_POSTSCRIPT_NAME, suffix_names, suffixed_name,
    unique_names,
};
