//! Test catalog models.

use serde::{Deserialize, Serialize};
use serde_json::Number;

/// Authoritative definition of an orderable lab test.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    /// Catalog identifier
    pub id: String,
    /// Test name, the key line items are matched on
    pub name: String,
    /// Performing department (e.g., "Hematology")
    pub department: String,
    /// List price, kept as the number it was imported as
    #[serde(default)]
    pub price: Option<Number>,
    /// Result unit (e.g., "g/dL")
    #[serde(default)]
    pub unit: Option<String>,
    /// Normal reference range (e.g., "12-15")
    #[serde(default)]
    pub reference_range: Option<String>,
}

impl CatalogEntry {
    /// Create a new catalog entry with required fields.
    pub fn new(id: String, name: String, department: String) -> Self {
        Self {
            id,
            name,
            department,
            price: None,
            unit: None,
            reference_range: None,
        }
    }
}
