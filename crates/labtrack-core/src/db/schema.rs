//! SQLite schema definition.

/// Complete database schema for labtrack.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Test Catalog
-- ============================================================================

CREATE TABLE IF NOT EXISTS test_catalog (
    catalog_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,                          -- not unique: duplicates are flagged, not rejected
    department TEXT NOT NULL,
    price TEXT,                                  -- JSON number text, 5 and 5.0 kept apart
    unit TEXT,
    reference_range TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_catalog_name ON test_catalog(name);

-- ============================================================================
-- Orders
-- ============================================================================

CREATE TABLE IF NOT EXISTS orders (
    order_key TEXT PRIMARY KEY,
    order_id TEXT NOT NULL,                      -- LAB-YYYY-MM-DD-SSS, not unique (see allocator)
    tests TEXT NOT NULL DEFAULT '[]',            -- JSON array of strings and objects
    attributes TEXT NOT NULL DEFAULT '{}',       -- JSON object
    created_at TEXT NOT NULL,                    -- RFC 3339 UTC, fixed width
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_orders_created_at ON orders(created_at);
CREATE INDEX IF NOT EXISTS idx_orders_order_id ON orders(order_id);

-- ============================================================================
-- Per-day ticket counters
-- ============================================================================

CREATE TABLE IF NOT EXISTS order_counters (
    day TEXT PRIMARY KEY,                        -- identifier day prefix
    last_sequence INTEGER NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- ============================================================================
-- Migration State
-- ============================================================================

CREATE TABLE IF NOT EXISTS migration_state (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,                         -- JSON checkpoint
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;
