//! CLI command implementations.

mod encode;
mod inspect;

pub use encode::{batch, encode};
pub use inspect::{describe, inspect};
