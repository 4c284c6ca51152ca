mod error;
mod store;
mod tle;
mod types;

pub use error::ElementError;
pub use store::{ElementSnapshot, ElementStore};
pub use tle::{checksum, lookup, parse, parse_all};
pub use types::ElementSet;

#[cfg(test)]
pub(crate) mod fixtures;
