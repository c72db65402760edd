//! Line item normalization.
//!
//! Rules, applied per item in this order:
//! 1. Bare name with a catalog match → new canonical object.
//! 2. Bare name without a match → left as the bare name.
//! 3. Object without a department, with a catalog match → department
//!    written, price, unit and reference range written where the catalog
//!    has them; every other field kept.
//! 4. Anything else → passed through.
//!
//! Normalizing already-normalized items against the same catalog changes
//! nothing, which is what makes a migration sweep safe to re-run.

use super::CatalogIndex;
use crate::models::{TestLineItem, TestRecord};

/// Result of normalizing one order's line items.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub items: Vec<TestLineItem>,
    /// True if any item was rewritten
    pub changed: bool,
}

impl Normalized {
    /// Names that could not be matched against the catalog.
    pub fn unresolved(&self) -> impl Iterator<Item = &str> {
        self.items.iter().filter_map(|item| match item {
            TestLineItem::Unresolved(name) => Some(name.as_str()),
            TestLineItem::Partial(record) => record.name(),
            TestLineItem::Canonical(_) => None,
        })
    }
}

/// Normalize a sequence of line items against the catalog.
pub fn normalize(items: &[TestLineItem], catalog: &CatalogIndex) -> Normalized {
    let mut changed = false;
    let items = items
        .iter()
        .map(|item| {
            let (item, item_changed) = normalize_item(item, catalog);
            changed |= item_changed;
            item
        })
        .collect();

    Normalized { items, changed }
}

/// Normalize a single line item. Returns the item and whether it changed.
pub fn normalize_item(item: &TestLineItem, catalog: &CatalogIndex) -> (TestLineItem, bool) {
    match item {
        TestLineItem::Unresolved(name) => match catalog.lookup(name) {
            Some(entry) => (TestLineItem::Canonical(TestRecord::from_catalog(entry)), true),
            None => (item.clone(), false),
        },
        TestLineItem::Partial(record) => match record.name().and_then(|n| catalog.lookup(n)) {
            Some(entry) => {
                let mut merged = record.clone();
                merged.merge_from_catalog(entry);
                (TestLineItem::from_record(merged), true)
            }
            None => (item.clone(), false),
        },
        TestLineItem::Canonical(_) => (item.clone(), false),
    }
}
