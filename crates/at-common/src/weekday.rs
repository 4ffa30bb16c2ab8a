//! Weekday selectors.
//!
//! The harness uses ISO-8601 numbering only: `1 = Monday` through
//! `7 = Sunday`. Codes are validated on construction; the Sunday-first
//! `0..=6` convention is rejected rather than silently remapped.

use crate::error::{Error, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// A validated ISO weekday code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct WeekdaySelector(u8);

impl WeekdaySelector {
    /// Lowest valid code (Monday).
    pub const MIN: u8 = 1;
    /// Highest valid code (Sunday).
    pub const MAX: u8 = 7;

    /// Validate a raw code.
    pub fn new(code: u8) -> Result<Self> {
        if (Self::MIN..=Self::MAX).contains(&code) {
            Ok(WeekdaySelector(code))
        } else {
            Err(Error::InvalidSelector {
                input: code.to_string(),
            })
        }
    }

    /// Selector for the weekday a date falls on.
    pub fn of(date: NaiveDate) -> Self {
        WeekdaySelector(date.weekday().number_from_monday() as u8)
    }

    /// The raw ISO code.
    pub fn code(self) -> u8 {
        self.0
    }

    /// All seven selectors, Monday first.
    pub fn all() -> impl Iterator<Item = WeekdaySelector> {
        (Self::MIN..=Self::MAX).map(WeekdaySelector)
    }

    /// Parse a comma-separated list such as `"1,2,3,4,5"`.
    ///
    /// Duplicates collapse. An empty list is an error, as is any code outside
    /// `1..=7`; the offending token is reported verbatim.
    pub fn parse_list(input: &str) -> Result<BTreeSet<WeekdaySelector>> {
        let mut selectors = BTreeSet::new();
        for token in input.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            selectors.insert(token.parse::<WeekdaySelector>()?);
        }
        if selectors.is_empty() {
            return Err(Error::InvalidSelector {
                input: input.to_string(),
            });
        }
        Ok(selectors)
    }
}

impl fmt::Display for WeekdaySelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for WeekdaySelector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let code: u8 = s.trim().parse().map_err(|_| Error::InvalidSelector {
            input: s.to_string(),
        })?;
        WeekdaySelector::new(code).map_err(|_| Error::InvalidSelector {
            input: s.to_string(),
        })
    }
}

impl TryFrom<u8> for WeekdaySelector {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        WeekdaySelector::new(code)
    }
}

impl From<WeekdaySelector> for u8 {
    fn from(selector: WeekdaySelector) -> Self {
        selector.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn monday_is_one_sunday_is_seven() {
        assert_eq!(WeekdaySelector::of(date("2023-01-02")).code(), 1);
        assert_eq!(WeekdaySelector::of(date("2023-01-08")).code(), 7);
    }

    #[test]
    fn zero_is_rejected() {
        let err = WeekdaySelector::new(0).unwrap_err();
        assert!(matches!(err, Error::InvalidSelector { .. }));
        assert!(WeekdaySelector::new(8).is_err());
    }

    #[test]
    fn parse_list_dedupes_and_sorts() {
        let set = WeekdaySelector::parse_list("5, 1,5,3").unwrap();
        let codes: Vec<u8> = set.into_iter().map(u8::from).collect();
        assert_eq!(codes, vec![1, 3, 5]);
    }

    #[test]
    fn parse_list_reports_bad_token() {
        match WeekdaySelector::parse_list("1,x,3").unwrap_err() {
            Error::InvalidSelector { input } => assert_eq!(input, "x"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn parse_list_rejects_empty() {
        assert!(WeekdaySelector::parse_list(" , ").is_err());
    }

    #[test]
    fn all_covers_monday_through_sunday() {
        let codes: Vec<u8> = WeekdaySelector::all().map(u8::from).collect();
        assert_eq!(codes, vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn serde_rejects_out_of_range() {
        assert!(serde_json::from_str::<WeekdaySelector>("9").is_err());
        let sel: WeekdaySelector = serde_json::from_str("4").unwrap();
        assert_eq!(sel.code(), 4);
    }
}
