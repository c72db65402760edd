//! Test-record normalization.
//!
//! Pipeline: Catalog read → [`CatalogIndex`] → [`normalize`] per order

mod engine;
mod index;

pub use engine::*;
pub use index::*;
