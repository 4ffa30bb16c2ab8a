//! Date partitioning by weekday.
//!
//! Buckets the half-open range `[start, end)` by ISO weekday. The end date
//! is excluded. Buckets are immutable once built and are persisted through a
//! [`BucketWriter`] so later stages (and operators) can inspect them.

use at_common::{ArtifactKey, Error, Result, WeekdaySelector};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use crate::store::ArtifactStore;

/// Persistence capability for date buckets.
pub trait BucketWriter {
    /// Write one weekday's dates, one per line.
    fn write_bucket(&self, weekday: WeekdaySelector, dates: &[NaiveDate]) -> Result<()>;
    /// Write the combined human-readable listing.
    fn write_listing(&self, listing: &str) -> Result<()>;
}

/// Dates of `[start, end)` grouped by weekday, ascending within each bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateBuckets {
    start: NaiveDate,
    end: NaiveDate,
    buckets: BTreeMap<WeekdaySelector, Vec<NaiveDate>>,
}

impl DateBuckets {
    /// Dates for a weekday; empty when the weekday was not selected.
    pub fn dates(&self, weekday: WeekdaySelector) -> &[NaiveDate] {
        self.buckets.get(&weekday).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Selected weekdays, ascending.
    pub fn selectors(&self) -> impl Iterator<Item = WeekdaySelector> + '_ {
        self.buckets.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (WeekdaySelector, &[NaiveDate])> + '_ {
        self.buckets.iter().map(|(k, v)| (*k, v.as_slice()))
    }

    /// Number of dates across all buckets.
    pub fn total_dates(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }
}

/// Partition `[start, end)` into buckets for the given weekdays.
///
/// Every selected weekday gets a bucket, even when no date in the range
/// falls on it.
pub fn partition(
    start: NaiveDate,
    end: NaiveDate,
    selectors: &BTreeSet<WeekdaySelector>,
) -> Result<DateBuckets> {
    if start >= end {
        return Err(Error::InvalidRange { start, end });
    }
    if selectors.is_empty() {
        return Err(Error::InvalidSelector {
            input: String::new(),
        });
    }

    let mut buckets: BTreeMap<WeekdaySelector, Vec<NaiveDate>> =
        selectors.iter().map(|s| (*s, Vec::new())).collect();
    for date in start.iter_days().take_while(|d| *d < end) {
        if let Some(bucket) = buckets.get_mut(&WeekdaySelector::of(date)) {
            bucket.push(date);
        }
    }

    Ok(DateBuckets {
        start,
        end,
        buckets,
    })
}

/// Partition using raw ISO weekday codes, validating each one.
pub fn partition_codes(start: NaiveDate, end: NaiveDate, codes: &[u8]) -> Result<DateBuckets> {
    if start >= end {
        return Err(Error::InvalidRange { start, end });
    }
    let selectors = codes
        .iter()
        .map(|code| WeekdaySelector::new(*code))
        .collect::<Result<BTreeSet<_>>>()?;
    partition(start, end, &selectors)
}

/// One date per line, as read back by [`parse_bucket`].
pub fn render_bucket(dates: &[NaiveDate]) -> String {
    let mut out = String::new();
    for date in dates {
        let _ = writeln!(out, "{}", date.format("%Y-%m-%d"));
    }
    out
}

/// Combined `<dow>: <date>` listing across all buckets.
pub fn render_listing(buckets: &DateBuckets) -> String {
    let mut out = String::new();
    for (weekday, dates) in buckets.iter() {
        for date in dates {
            let _ = writeln!(out, "{}: {}", weekday, date.format("%Y-%m-%d"));
        }
    }
    out
}

/// Persist every bucket and the combined listing.
pub fn persist(buckets: &DateBuckets, writer: &dyn BucketWriter) -> Result<()> {
    for (weekday, dates) in buckets.iter() {
        writer.write_bucket(weekday, dates)?;
    }
    writer.write_listing(&render_listing(buckets))
}

/// Parse a persisted bucket, ignoring blank lines.
pub fn parse_bucket(text: &str) -> Result<Vec<NaiveDate>> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(parse_listed_date)
        .collect()
}

fn parse_listed_date(line: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(line, "%Y-%m-%d")
        .map_err(|e| Error::Config(format!("bad listed date '{line}': {e}")))
}

/// Re-read a weekday's persisted bucket from the store.
pub fn load_bucket(store: &ArtifactStore, weekday: WeekdaySelector) -> Result<Vec<NaiveDate>> {
    let text = store.read_to_string(&ArtifactKey::DateList { weekday })?;
    parse_bucket(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn sel(code: u8) -> WeekdaySelector {
        WeekdaySelector::new(code).unwrap()
    }

    #[derive(Default)]
    struct RecordingWriter {
        buckets: RefCell<Vec<(WeekdaySelector, Vec<NaiveDate>)>>,
        listing: RefCell<Option<String>>,
    }

    impl BucketWriter for RecordingWriter {
        fn write_bucket(&self, weekday: WeekdaySelector, dates: &[NaiveDate]) -> Result<()> {
            self.buckets.borrow_mut().push((weekday, dates.to_vec()));
            Ok(())
        }

        fn write_listing(&self, listing: &str) -> Result<()> {
            *self.listing.borrow_mut() = Some(listing.to_string());
            Ok(())
        }
    }

    #[test]
    fn mondays_in_two_week_window() {
        let selectors = BTreeSet::from([sel(1)]);
        let buckets = partition(day("2023-01-02"), day("2023-01-16"), &selectors).unwrap();
        assert_eq!(
            buckets.dates(sel(1)),
            &[day("2023-01-02"), day("2023-01-09")]
        );
        assert_eq!(buckets.total_dates(), 2);
    }

    #[test]
    fn end_date_is_excluded() {
        let selectors = BTreeSet::from([sel(1)]);
        let buckets = partition(day("2023-01-02"), day("2023-01-09"), &selectors).unwrap();
        assert_eq!(buckets.dates(sel(1)), &[day("2023-01-02")]);
    }

    #[test]
    fn unmatched_selector_gets_empty_bucket() {
        let selectors = BTreeSet::from([sel(3)]);
        let buckets = partition(day("2023-01-02"), day("2023-01-04"), &selectors).unwrap();
        assert_eq!(buckets.selectors().collect::<Vec<_>>(), vec![sel(3)]);
        assert!(buckets.dates(sel(3)).is_empty());
    }

    #[test]
    fn reversed_range_is_invalid() {
        let selectors = BTreeSet::from([sel(1)]);
        let err = partition(day("2023-01-09"), day("2023-01-02"), &selectors).unwrap_err();
        assert!(matches!(err, Error::InvalidRange { .. }));
    }

    #[test]
    fn raw_code_zero_is_invalid_selector() {
        let err = partition_codes(day("2023-01-02"), day("2023-01-09"), &[0, 1]).unwrap_err();
        assert!(matches!(err, Error::InvalidSelector { .. }));
    }

    #[test]
    fn range_error_wins_over_selector_error() {
        let err = partition_codes(day("2023-01-09"), day("2023-01-02"), &[9]).unwrap_err();
        assert!(matches!(err, Error::InvalidRange { .. }));
    }

    #[test]
    fn persist_writes_each_bucket_and_listing() {
        let selectors = BTreeSet::from([sel(1), sel(2)]);
        let buckets = partition(day("2023-01-02"), day("2023-01-11"), &selectors).unwrap();
        let writer = RecordingWriter::default();
        persist(&buckets, &writer).unwrap();

        let written = writer.buckets.borrow();
        assert_eq!(written.len(), 2);
        assert_eq!(written[0].0, sel(1));
        assert_eq!(written[1].1, vec![day("2023-01-03"), day("2023-01-10")]);
        let listing = writer.listing.borrow().clone().unwrap();
        assert_eq!(
            listing,
            "1: 2023-01-02\n1: 2023-01-09\n2: 2023-01-03\n2: 2023-01-10\n"
        );
    }

    #[test]
    fn bucket_text_parses_back() {
        let dates = vec![day("2023-01-02"), day("2023-01-09")];
        let text = render_bucket(&dates);
        assert_eq!(parse_bucket(&text).unwrap(), dates);
        assert!(parse_bucket("2023-13-01\n").is_err());
    }
}
