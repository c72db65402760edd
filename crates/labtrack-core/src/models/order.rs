//! Lab order models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::identifier::OrderIdentifier;
use super::line_item::TestLineItem;

/// A persisted lab order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    /// Store-assigned key
    pub order_key: String,
    /// Human-readable identifier
    pub order_id: OrderIdentifier,
    /// Ordered tests
    pub tests: Vec<TestLineItem>,
    /// Remaining order fields (patient, physician, notes, ...)
    pub attributes: Map<String, Value>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// An order that has not been assigned an identifier yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub tests: Vec<TestLineItem>,
    pub attributes: Map<String, Value>,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    /// Create a new order stamped with the current time.
    pub fn new(tests: Vec<TestLineItem>) -> Self {
        Self {
            tests,
            attributes: Map::new(),
            created_at: Utc::now(),
        }
    }

    /// Override the creation timestamp.
    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self
    }

    /// Attach an order-level attribute.
    pub fn with_attribute(mut self, key: &str, value: Value) -> Self {
        self.attributes.insert(key.to_string(), value);
        self
    }

    /// Assign an identifier and a fresh store key.
    pub fn into_order(self, order_id: OrderIdentifier) -> Order {
        Order {
            order_key: uuid::Uuid::new_v4().to_string(),
            order_id,
            tests: self.tests,
            attributes: self.attributes,
            created_at: self.created_at,
        }
    }
}

/// Position in the orders table, used to resume paging.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct OrderCursor(pub i64);

impl OrderCursor {
    /// Cursor positioned before the first order.
    pub const START: OrderCursor = OrderCursor(0);
}
