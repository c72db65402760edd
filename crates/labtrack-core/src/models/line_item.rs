//! Test line item models.
//!
//! Historical orders store their tests in three shapes:
//! - a bare test name (`"Hemoglobin"`),
//! - an object with a `name` but no `department`,
//! - a fully populated object.
//!
//! [`TestLineItem`] makes that shape explicit. Objects keep every field they
//! were stored with, so results and flags recorded on an order survive a
//! round trip through the model untouched.

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::catalog::CatalogEntry;

pub const FIELD_ID: &str = "id";
pub const FIELD_NAME: &str = "name";
pub const FIELD_DEPARTMENT: &str = "department";
pub const FIELD_PRICE: &str = "price";
pub const FIELD_UNIT: &str = "unit";
pub const FIELD_REFERENCE_RANGE: &str = "referenceRange";

/// A stored test object, kept as its raw JSON fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TestRecord {
    fields: Map<String, Value>,
}

impl TestRecord {
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Canonical record built from a catalog entry.
    ///
    /// Missing catalog values default to price `0`, unit `""` and a null
    /// reference range.
    pub fn from_catalog(entry: &CatalogEntry) -> Self {
        let mut fields = Map::new();
        fields.insert(FIELD_ID.into(), Value::String(entry.id.clone()));
        fields.insert(FIELD_NAME.into(), Value::String(entry.name.clone()));
        fields.insert(
            FIELD_DEPARTMENT.into(),
            Value::String(entry.department.clone()),
        );
        for (key, value) in catalog_values(entry) {
            fields.insert(key.into(), value.unwrap_or_else(|| default_for(key)));
        }
        Self { fields }
    }

    /// Merge the catalog-sourced fields into an existing record.
    ///
    /// The department is always written. Price, unit and reference range
    /// are written where the catalog has a value; a field the catalog lacks
    /// keeps whatever the record holds and is defaulted only when absent.
    pub fn merge_from_catalog(&mut self, entry: &CatalogEntry) {
        self.fields.insert(
            FIELD_DEPARTMENT.into(),
            Value::String(entry.department.clone()),
        );
        for (key, value) in catalog_values(entry) {
            match value {
                Some(value) => {
                    self.fields.insert(key.into(), value);
                }
                None => {
                    self.fields
                        .entry(key)
                        .or_insert_with(|| default_for(key));
                }
            }
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.fields.get(FIELD_NAME).and_then(Value::as_str)
    }

    /// Whether the record carries a non-null department.
    pub fn has_department(&self) -> bool {
        self.fields
            .get(FIELD_DEPARTMENT)
            .is_some_and(|v| !v.is_null())
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }
}

/// Optional catalog values in the order they are written to a record.
fn catalog_values(entry: &CatalogEntry) -> [(&'static str, Option<Value>); 3] {
    [
        (FIELD_PRICE, entry.price.clone().map(Value::Number)),
        (FIELD_UNIT, entry.unit.clone().map(Value::String)),
        (
            FIELD_REFERENCE_RANGE,
            entry.reference_range.clone().map(Value::String),
        ),
    ]
}

fn default_for(key: &str) -> Value {
    match key {
        FIELD_PRICE => Value::from(0),
        FIELD_UNIT => Value::String(String::new()),
        _ => Value::Null,
    }
}

/// One ordered test, in whichever shape it was stored.
#[derive(Debug, Clone, PartialEq)]
pub enum TestLineItem {
    /// Bare test name, never matched against the catalog
    Unresolved(String),
    /// Object without a department
    Partial(TestRecord),
    /// Object with a department
    Canonical(TestRecord),
}

impl TestLineItem {
    /// Classify a stored object by whether it has a department.
    pub fn from_record(record: TestRecord) -> Self {
        if record.has_department() {
            TestLineItem::Canonical(record)
        } else {
            TestLineItem::Partial(record)
        }
    }

    /// Test name, if the item carries one.
    pub fn name(&self) -> Option<&str> {
        match self {
            TestLineItem::Unresolved(name) => Some(name.as_str()),
            TestLineItem::Partial(record) | TestLineItem::Canonical(record) => record.name(),
        }
    }

    pub fn is_canonical(&self) -> bool {
        matches!(self, TestLineItem::Canonical(_))
    }

    /// JSON form as stored in the orders table.
    pub fn to_value(&self) -> Value {
        match self {
            TestLineItem::Unresolved(name) => Value::String(name.clone()),
            TestLineItem::Partial(record) | TestLineItem::Canonical(record) => {
                Value::Object(record.fields.clone())
            }
        }
    }
}

impl From<&str> for TestLineItem {
    fn from(name: &str) -> Self {
        TestLineItem::Unresolved(name.to_string())
    }
}

impl TryFrom<Value> for TestLineItem {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(name) => Ok(TestLineItem::Unresolved(name)),
            Value::Object(fields) => Ok(TestLineItem::from_record(TestRecord::from_fields(fields))),
            other => Err(format!(
                "test line item must be a string or an object, found {}",
                other
            )),
        }
    }
}

impl Serialize for TestLineItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TestLineItem::Unresolved(name) => serializer.serialize_str(name),
            TestLineItem::Partial(record) | TestLineItem::Canonical(record) => {
                record.fields.serialize(serializer)
            }
        }
    }
}

impl<'de> Deserialize<'de> for TestLineItem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        TestLineItem::try_from(value).map_err(de::Error::custom)
    }
}
