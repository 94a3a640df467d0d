//! Expansion of a recurring task definition into dated occurrences.
//!
//! Occurrence `n` is always computed from the first one (`first + n * period`)
//! rather than from occurrence `n - 1`, so month-end anchors survive short
//! months: a monthly series starting Jan 31 lands on Feb 28 (or 29) and then
//! back on Mar 31.

use std::iter::FusedIterator;

use chrono::{DateTime, Days, Duration, Months, NaiveDate, NaiveTime, Utc};
use db::models::task::Recurrence;
use uuid::Uuid;

/// Latest instant at which an occurrence may still start on `date` (23:59:59).
pub fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::default()).and_utc() + Duration::seconds(86_399)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurrence {
    pub series_id: Uuid,
    pub start: DateTime<Utc>,
    pub due: DateTime<Utc>,
}

/// Lazy, finite sequence of occurrences for one series.
#[derive(Debug, Clone)]
pub struct Expansion {
    rule: Recurrence,
    series_id: Uuid,
    first_start: DateTime<Utc>,
    first_due: DateTime<Utc>,
    until: DateTime<Utc>,
    index: u32,
    done: bool,
}

impl Expansion {
    pub fn new(
        rule: Recurrence,
        first_start: DateTime<Utc>,
        first_due: Option<DateTime<Utc>>,
        end_recurring_date: NaiveDate,
        series_id: Option<Uuid>,
    ) -> Self {
        Self {
            rule,
            series_id: series_id.unwrap_or_else(Uuid::new_v4),
            first_start,
            first_due: first_due.unwrap_or(first_start),
            until: end_of_day(end_recurring_date),
            index: 0,
            done: false,
        }
    }

    pub fn series_id(&self) -> Uuid {
        self.series_id
    }
}

fn advance(rule: Recurrence, anchor: DateTime<Utc>, steps: u32) -> Option<DateTime<Utc>> {
    match rule {
        Recurrence::Daily => anchor.checked_add_days(Days::new(u64::from(steps))),
        Recurrence::Weekly => anchor.checked_add_days(Days::new(u64::from(steps) * 7)),
        Recurrence::Monthly => anchor.checked_add_months(Months::new(steps)),
        Recurrence::Annually => steps
            .checked_mul(12)
            .and_then(|months| anchor.checked_add_months(Months::new(months))),
    }
}

impl Iterator for Expansion {
    type Item = Occurrence;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let start = advance(self.rule, self.first_start, self.index);
        let due = advance(self.rule, self.first_due, self.index);
        match (start, due) {
            (Some(start), Some(due)) if start <= self.until => {
                match self.index.checked_add(1) {
                    Some(next) => self.index = next,
                    None => self.done = true,
                }
                Some(Occurrence {
                    series_id: self.series_id,
                    start,
                    due,
                })
            }
            _ => {
                self.done = true;
                None
            }
        }
    }
}

impl FusedIterator for Expansion {}
