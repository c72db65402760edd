//! Order creation: identifier allocation immediately followed by insert.

use chrono::{DateTime, Local, TimeZone};
use tracing::{debug, info, warn};

use super::{AllocationStrategy, AllocatorConfig, SequenceAllocator};
use crate::db::{DbError, DbResult, OrderRepository};
use crate::models::{NewOrder, Order, OrderIdentifier};

/// Creates orders with unique same-day identifiers.
pub struct OrderBook<'a, R: OrderRepository> {
    repo: &'a R,
    allocator: SequenceAllocator<'a, R>,
    strategy: AllocationStrategy,
}

impl<'a, R: OrderRepository> OrderBook<'a, R> {
    pub fn new(repo: &'a R, config: AllocatorConfig) -> Self {
        Self {
            repo,
            allocator: SequenceAllocator::new(repo, config.prefix),
            strategy: config.strategy,
        }
    }

    /// Create an order, numbering it within its local calendar day.
    pub fn create_order(&self, new_order: NewOrder) -> DbResult<Order> {
        self.create_order_in(new_order, &Local)
    }

    /// Create an order, numbering it within its calendar day in `tz`.
    pub fn create_order_in<Tz: TimeZone>(&self, new_order: NewOrder, tz: &Tz) -> DbResult<Order> {
        let order = match self.strategy {
            AllocationStrategy::ReadLatest => {
                let at = new_order.created_at.with_timezone(tz);
                let order = new_order.into_order(self.allocator.allocate_at(&at));
                self.repo.insert_order(&order)?;
                order
            }
            AllocationStrategy::CompareAndSwap { max_attempts } => {
                self.insert_with_retry(new_order, tz, max_attempts)?
            }
            AllocationStrategy::Ticket => {
                let at = new_order.created_at.with_timezone(tz);
                let order = new_order.into_order(self.allocator.allocate_ticket_at(&at));
                self.repo.insert_order(&order)?;
                order
            }
        };

        info!(
            order_id = %order.order_id,
            order_key = %order.order_key,
            tests = order.tests.len(),
            "order created"
        );
        Ok(order)
    }

    fn insert_with_retry<Tz: TimeZone>(
        &self,
        new_order: NewOrder,
        tz: &Tz,
        max_attempts: u32,
    ) -> DbResult<Order> {
        let at = new_order.created_at.with_timezone(tz);
        let mut floor = 0;

        for attempt in 1..=max_attempts {
            let slot = match self.allocator.read_slot(&at) {
                Ok(slot) => slot,
                Err(err) => return self.insert_fallback(new_order, &at, &err),
            };
            let sequence = slot.last.max(floor).saturating_add(1);
            let order = new_order
                .clone()
                .into_order(self.allocator.sequential(&slot, sequence));

            if self.repo.insert_order_if_absent(&order)? {
                return Ok(order);
            }
            debug!(attempt, order_id = %order.order_id, "identifier already taken, retrying");
            floor = sequence;
        }

        warn!(max_attempts, "identifier contention, giving up on a sequential identifier");
        let id = OrderIdentifier::fallback(self.allocator.prefix(), new_order.created_at);
        let order = new_order.into_order(id);
        self.repo.insert_order(&order)?;
        Ok(order)
    }

    fn insert_fallback<Tz: TimeZone>(
        &self,
        new_order: NewOrder,
        at: &DateTime<Tz>,
        err: &DbError,
    ) -> DbResult<Order> {
        let order = new_order.into_order(self.allocator.fallback(at, err));
        self.repo.insert_order(&order)?;
        Ok(order)
    }
}
