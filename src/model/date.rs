//! Day-precision date normalization shared by the aggregator and the sheet reconciler.
//!
//! Both sides of the join stringify dates through `DateKey`, so a Jira due date of `2024-06-05`
//! and a sheet cell of `06/05/2024` both become `Jun 5, 2024`.

use crate::error::Res;
use anyhow::ensure;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// The key used for records whose grouping date is missing or unparseable.
pub const INVALID_DATE: &str = "Invalid Date";

/// English short month, unpadded day, four-digit year. chrono formats month names in English
/// regardless of the host locale.
const DISPLAY_FORMAT: &str = "%b %-d, %Y";

/// `%B` also accepts the abbreviated month name when parsing.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%B %d, %Y",
    "%B %d %Y",
    "%d %B %Y",
    "%d-%B-%Y",
];

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Times that may follow a US month/day/year date.
const TIME_FORMATS: &[&str] = &["%H:%M", "%H:%M:%S", "%I:%M %p", "%I:%M:%S %p"];

/// The normalized, day-precision key of a `DailySummary`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum DateKey {
    Date(NaiveDate),
    /// Sorts after every real date.
    Invalid,
}

impl From<NaiveDate> for DateKey {
    fn from(value: NaiveDate) -> Self {
        DateKey::Date(value)
    }
}

impl From<Option<NaiveDate>> for DateKey {
    fn from(value: Option<NaiveDate>) -> Self {
        match value {
            Some(date) => DateKey::Date(date),
            None => DateKey::Invalid,
        }
    }
}

impl Display for DateKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DateKey::Date(date) => write!(f, "{}", date.format(DISPLAY_FORMAT)),
            DateKey::Invalid => f.write_str(INVALID_DATE),
        }
    }
}

impl FromStr for DateKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim() == INVALID_DATE {
            return Ok(DateKey::Invalid);
        }
        normalize_date(s).ok_or_else(|| anyhow::anyhow!("Unable to parse '{s}' as a date"))
    }
}

impl Serialize for DateKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DateKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DateKey::from_str(&s).map_err(D::Error::custom)
    }
}

/// An inclusive range of calendar days used to select issues.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Res<Self> {
        ensure!(
            start <= end,
            "The start date {start} is after the end date {end}"
        );
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Normalizes a raw date string, from Jira or from a sheet cell, into a `DateKey`. Returns `None`
/// when the value is blank or is not in any supported format.
pub fn normalize_date(raw: &str) -> Option<DateKey> {
    parse_date(raw).map(DateKey::Date)
}

/// Parses a date or timestamp and truncates it to the calendar day. Timestamps carrying an offset
/// keep the day as written in that offset. A leading weekday name such as `Thu, ` is ignored, even
/// when it does not agree with the date.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    parse_day(s).or_else(|| strip_weekday(s).and_then(parse_day))
}

fn strip_weekday(s: &str) -> Option<&str> {
    let (prefix, rest) = s.split_once(',')?;
    prefix.trim().parse::<Weekday>().ok()?;
    Some(rest.trim())
}

fn parse_day(s: &str) -> Option<NaiveDate> {
    if let Some(date) = parse_slash_date(s) {
        return Some(date);
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return Some(date);
        }
    }

    // Jira sends `2024-06-04T10:15:30.000+0000`, which is not quite RFC 3339.
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.date_naive());
    }

    for format in DATE_TIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt.date());
        }
    }

    None
}

/// US month/day/year, optionally followed by a time. The year may be two or four digits.
fn parse_slash_date(s: &str) -> Option<NaiveDate> {
    let (s, time) = match s.split_once(char::is_whitespace) {
        Some((date, time)) => (date, Some(time.trim())),
        None => (s, None),
    };
    if let Some(time) = time {
        if !TIME_FORMATS
            .iter()
            .any(|format| NaiveTime::parse_from_str(time, format).is_ok())
        {
            return None;
        }
    }

    let parts: Vec<&str> = s.split('/').collect();
    if parts.len() != 3 || !parts.iter().all(|p| is_digits(p)) {
        return None;
    }
    let format = match parts[2].len() {
        2 => "%m/%d/%y",
        4 => "%m/%d/%Y",
        _ => return None,
    };
    NaiveDate::parse_from_str(s, format).ok()
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn june_5() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 5).unwrap()
    }

    #[test]
    fn test_display_format() {
        assert_eq!(DateKey::from(june_5()).to_string(), "Jun 5, 2024");
        let dec = NaiveDate::from_ymd_opt(2023, 12, 25).unwrap();
        assert_eq!(DateKey::from(dec).to_string(), "Dec 25, 2023");
        assert_eq!(DateKey::Invalid.to_string(), "Invalid Date");
    }

    #[test]
    fn test_parse_supported_formats() {
        let inputs = [
            "2024-06-05",
            "2024/06/05",
            "06/05/2024",
            "6/5/2024",
            "6/5/24",
            "Jun 5, 2024",
            "June 5, 2024",
            "Jun 5 2024",
            "June 5 2024",
            "Wed, Jun 5, 2024",
            "Wednesday, June 5, 2024",
            "5 June 2024",
            "5-Jun-2024",
            "05-June-2024",
            "06/05/2024 10:00",
            "06/05/2024 10:00:00",
            "6/5/2024 10:00:00 AM",
            "6/5/2024 9:30 pm",
            "  2024-06-05  ",
            "2024-06-05T23:59:59.000+0000",
            "2024-06-05T10:15:30Z",
            "2024-06-05T10:15:30",
            "2024-06-05 10:15",
        ];
        for input in inputs {
            assert_eq!(parse_date(input), Some(june_5()), "input: {input}");
        }
    }

    #[test]
    fn test_timestamp_keeps_its_own_day() {
        // Late in the evening west of UTC is already the next day in UTC.
        let date = parse_date("2024-06-05T22:30:00.000-0700").unwrap();
        assert_eq!(date, june_5());
    }

    #[test]
    fn test_weekday_prefix_is_ignored() {
        // June 5, 2024 was a Wednesday.
        assert_eq!(parse_date("Thu, Jun 5, 2024"), Some(june_5()));
        assert_eq!(parse_date("friday, 06/05/2024"), Some(june_5()));
        assert_eq!(parse_date("Someday, Jun 5, 2024"), None);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for input in [
            "",
            "   ",
            "tomorrow",
            "13/45/2024",
            "2024-02-30",
            "6/5/202",
            "Total",
            "06/05/2024 25:00",
            "06/05/2024 soon",
        ] {
            assert_eq!(parse_date(input), None, "input: {input}");
        }
    }

    #[test]
    fn test_cross_format_keys_match() {
        let from_jira = normalize_date("2024-06-05").unwrap();
        let from_sheet = normalize_date("06/05/2024").unwrap();
        assert_eq!(from_jira, from_sheet);
        assert_eq!(from_sheet.to_string(), "Jun 5, 2024");
    }

    #[test]
    fn test_invalid_sorts_last() {
        let mut keys = vec![
            DateKey::Invalid,
            DateKey::from(june_5()),
            DateKey::from(NaiveDate::from_ymd_opt(2024, 5, 31).unwrap()),
        ];
        keys.sort();
        assert_eq!(keys.last(), Some(&DateKey::Invalid));
        assert_eq!(keys[0].to_string(), "May 31, 2024");
    }

    #[test]
    fn test_date_range() {
        let may_31 = NaiveDate::from_ymd_opt(2024, 5, 31).unwrap();
        let range = DateRange::new(may_31, june_5()).unwrap();
        assert!(range.contains(may_31));
        assert!(range.contains(june_5()));
        assert!(!range.contains(june_5().succ_opt().unwrap()));
        assert!(DateRange::new(june_5(), may_31).is_err());
        assert!(DateRange::new(june_5(), june_5()).is_ok());
    }

    #[test]
    fn test_date_key_serde() {
        let key = DateKey::from(june_5());
        assert_eq!(serde_json::to_string(&key).unwrap(), r#""Jun 5, 2024""#);
        let parsed: DateKey = serde_json::from_str(r#""Jun 5, 2024""#).unwrap();
        assert_eq!(parsed, key);
        let invalid: DateKey = serde_json::from_str(r#""Invalid Date""#).unwrap();
        assert_eq!(invalid, DateKey::Invalid);
    }
}
