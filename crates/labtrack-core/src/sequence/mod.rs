//! Order identifier allocation.
//!
//! Three strategies, trading simplicity for collision safety:
//!
//! | Strategy          | Duplicate identifiers under concurrent creation |
//! |-------------------|--------------------------------------------------|
//! | `ReadLatest`      | possible: two callers can read the same latest order |
//! | `CompareAndSwap`  | none for sequential ids; the insert is conditional on the id being free |
//! | `Ticket`          | none within one database; the per-day counter is bumped in one statement |
//!
//! Every strategy degrades to a timestamp identifier when the store cannot be
//! read. Two such identifiers collide only if minted in the same millisecond
//! with the same 24 random bits.

mod allocator;
mod book;

pub use allocator::*;
pub use book::*;

use crate::models::DEFAULT_PREFIX;

/// Default number of conditional inserts before falling back.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// How identifiers are kept unique when orders are created concurrently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationStrategy {
    /// Read the latest same-day order, add one, insert.
    ReadLatest,
    /// Like `ReadLatest`, but insert only if the identifier is still free
    /// and retry with the next sequence otherwise.
    CompareAndSwap { max_attempts: u32 },
    /// Take the sequence from an atomic per-day counter.
    Ticket,
}

impl Default for AllocationStrategy {
    fn default() -> Self {
        AllocationStrategy::CompareAndSwap {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Order creation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocatorConfig {
    /// Short code leading every identifier
    pub prefix: String,
    pub strategy: AllocationStrategy,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            strategy: AllocationStrategy::default(),
        }
    }
}
