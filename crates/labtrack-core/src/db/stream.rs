//! Lazy, restartable iteration over the orders table.

use std::collections::VecDeque;

use super::{DbResult, OrderRecord, OrderRepository};
use crate::models::OrderCursor;

/// Pages through orders in cursor order, holding at most one page in memory.
///
/// Starting a new stream from the cursor of the last record handled resumes
/// exactly where a previous one stopped. A page read failure is yielded once
/// and ends the stream.
pub struct OrderStream<'a, R: OrderRepository> {
    repo: &'a R,
    next_after: OrderCursor,
    page_size: usize,
    buffer: VecDeque<OrderRecord>,
    exhausted: bool,
}

impl<'a, R: OrderRepository> OrderStream<'a, R> {
    pub fn new(repo: &'a R, after: OrderCursor, page_size: usize) -> Self {
        Self {
            repo,
            next_after: after,
            page_size: page_size.max(1),
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    fn fill(&mut self) -> DbResult<()> {
        let page = self.repo.order_page(self.next_after, self.page_size)?;
        if page.len() < self.page_size {
            self.exhausted = true;
        }
        if let Some(last) = page.last() {
            self.next_after = last.cursor;
        }
        self.buffer.extend(page);
        Ok(())
    }
}

impl<R: OrderRepository> Iterator for OrderStream<'_, R> {
    type Item = DbResult<OrderRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            if let Err(err) = self.fill() {
                self.exhausted = true;
                return Some(Err(err));
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}
