//! Per-day sequence allocation.

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use tracing::{debug, warn};

use crate::db::{DbError, DbResult, OrderRepository};
use crate::models::{day_prefix, OrderIdentifier};

/// The sequence state of one calendar day as read from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySlot {
    pub day: NaiveDate,
    /// `<PREFIX>-<YYYY>-<MM>-<DD>`
    pub base: String,
    /// Highest sequence seen for the day, 0 if none
    pub last: u32,
}

/// Computes the next order identifier for a calendar day.
///
/// The baseline [`allocate_at`](Self::allocate_at) reads the latest order of
/// the day and adds one. Nothing stops two callers from reading the same
/// latest order before either inserts, so both get the same identifier.
/// Use [`OrderBook`](super::OrderBook) with a compare-and-swap or ticket
/// strategy where that matters.
pub struct SequenceAllocator<'a, R: OrderRepository> {
    repo: &'a R,
    prefix: String,
}

impl<'a, R: OrderRepository> SequenceAllocator<'a, R> {
    pub fn new(repo: &'a R, prefix: impl Into<String>) -> Self {
        Self {
            repo,
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Next identifier for today in local time.
    pub fn allocate(&self) -> OrderIdentifier {
        self.allocate_at(&Local::now())
    }

    /// Next identifier for the calendar day of `at` in its time zone.
    ///
    /// Never fails: a store error yields a timestamp identifier instead.
    pub fn allocate_at<Tz: TimeZone>(&self, at: &DateTime<Tz>) -> OrderIdentifier {
        match self.read_slot(at) {
            Ok(slot) => self.sequential(&slot, slot.last.saturating_add(1)),
            Err(err) => self.fallback(at, &err),
        }
    }

    /// Next identifier drawn from the store's per-day ticket counter.
    pub fn allocate_ticket_at<Tz: TimeZone>(&self, at: &DateTime<Tz>) -> OrderIdentifier {
        let ticket = self
            .read_slot(at)
            .and_then(|slot| Ok((self.repo.next_ticket(&slot.base, slot.last)?, slot)));
        match ticket {
            Ok((ticket, slot)) => self.sequential(&slot, ticket),
            Err(err) => self.fallback(at, &err),
        }
    }

    /// Read the latest order of the day and derive the last used sequence.
    pub fn read_slot<Tz: TimeZone>(&self, at: &DateTime<Tz>) -> DbResult<DaySlot> {
        let day = at.date_naive();
        let base = day_prefix(&self.prefix, day);
        let (start, end) = day_bounds(&at.timezone(), day);

        let last = match self.repo.latest_order_id_between(&start, &end)? {
            None => 0,
            Some(latest) => match latest.sequence_under(&base) {
                Ok(Some(sequence)) => sequence,
                Ok(None) => {
                    debug!(latest = %latest, base = %base, "latest order is not sequential for this day");
                    0
                }
                Err(err) => {
                    warn!(error = %err, "cannot parse latest sequence, restarting day at 1");
                    0
                }
            },
        };

        Ok(DaySlot { day, base, last })
    }

    pub(crate) fn sequential(&self, slot: &DaySlot, sequence: u32) -> OrderIdentifier {
        OrderIdentifier::sequential(&self.prefix, slot.day, sequence)
    }

    pub(crate) fn fallback<Tz: TimeZone>(
        &self,
        at: &DateTime<Tz>,
        err: &DbError,
    ) -> OrderIdentifier {
        let id = OrderIdentifier::fallback(&self.prefix, at.with_timezone(&Utc));
        warn!(error = %err, fallback = %id, "order store unavailable, using timestamp identifier");
        id
    }
}

/// `[start, end)` of a calendar day in `tz`, as UTC instants.
pub fn day_bounds<Tz: TimeZone>(tz: &Tz, day: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = start_of_day(tz, day);
    let end = match day.succ_opt() {
        Some(next) => start_of_day(tz, next),
        None => DateTime::<Utc>::MAX_UTC,
    };
    (start, end)
}

/// First valid instant of `day`; skips forward over a DST gap at midnight.
fn start_of_day<Tz: TimeZone>(tz: &Tz, day: NaiveDate) -> DateTime<Utc> {
    let midnight = day.and_time(NaiveTime::MIN);
    (0..3)
        .find_map(|hours| {
            tz.from_local_datetime(&(midnight + Duration::hours(hours)))
                .earliest()
        })
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}
