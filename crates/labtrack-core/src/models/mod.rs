//! Domain models for the labtrack system.

mod catalog;
mod identifier;
mod line_item;
mod order;

pub use catalog::*;
pub use identifier::*;
pub use line_item::*;
pub use order::*;
