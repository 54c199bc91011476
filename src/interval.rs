//! Date-range widening and trimming.
//!
//! The API buckets results by UTC day. A report in any other zone has to
//! fetch one extra UTC day on the side where local midnight falls into the
//! neighbouring UTC day, and afterwards drop the events whose local date is
//! outside the requested range.

use chrono::{DateTime, Days, NaiveDate, Offset, Utc};
use chrono_tz::Tz;

use crate::models::PlayEvent;

/// Inclusive range of calendar days.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReportInterval {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ReportInterval {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    /// Days of the interval in ascending order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |day| *day <= end)
    }

    pub fn num_days(&self) -> u64 {
        if self.end < self.start {
            return 0;
        }
        (self.end - self.start).num_days() as u64 + 1
    }
}

/// Days to fetch for a requested interval, and whether the result must be trimmed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchPlan {
    pub fetch: ReportInterval,
    pub trim: bool,
}

/// UTC offset of `tz` at `now`, in seconds.
pub fn utc_offset_seconds(tz: &Tz, now: DateTime<Utc>) -> i32 {
    now.with_timezone(tz).offset().fix().local_minus_utc()
}

/// Compute the UTC days to fetch so that `requested` is fully covered once
/// events are localized to `tz`.
///
/// The offset is taken at `now`, not at the requested dates, so a report for
/// a winter month run in summer classifies the zone by its summer offset.
/// Only the sign of the offset matters.
pub fn expand_interval(requested: ReportInterval, tz: &Tz, now: DateTime<Utc>) -> FetchPlan {
    let offset = if *tz == Tz::UTC {
        0
    } else {
        utc_offset_seconds(tz, now)
    };

    let fetch = if offset > 0 {
        ReportInterval::new(
            requested.start.checked_sub_days(Days::new(1)).unwrap_or(requested.start),
            requested.end,
        )
    } else if offset < 0 {
        ReportInterval::new(
            requested.start,
            requested.end.checked_add_days(Days::new(1)).unwrap_or(requested.end),
        )
    } else {
        requested
    };

    FetchPlan {
        fetch,
        trim: fetch != requested,
    }
}

/// Keep only events whose report date lies within `requested`.
pub fn trim_to_interval(events: Vec<PlayEvent>, requested: ReportInterval) -> Vec<PlayEvent> {
    events
        .into_iter()
        .filter(|event| requested.contains(event.report_date()))
        .collect()
}
