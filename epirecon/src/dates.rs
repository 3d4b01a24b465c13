//! Parsing and formatting of the date labels found in raw source headers.

use std::sync::OnceLock;

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime};
use regex::Regex;

use crate::error::{ReconError, Result};

/// Formats tried in order by `parse_flexible_date` after the short case-file format.
const DATE_FORMATS: [&str; 10] = [
    "%Y-%m-%d",
    "%d%b%Y",
    "%d-%b-%Y",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%Y%m%d",
    "%m/%d/%Y",
    "%Y/%m/%d",
];

const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Largest serial day number Excel can represent (9999-12-31).
const MAX_EXCEL_SERIAL: f64 = 2_958_465.0;

fn short_date_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{2})$").expect("valid regex"))
}

/// Parse a case-file header in the `M/D/YY` format, e.g. `1/22/20`.
pub fn parse_short_date(label: &str) -> Result<NaiveDate> {
    let caps = short_date_regex()
        .captures(label.trim())
        .ok_or_else(|| ReconError::DateParse(label.to_string()))?;
    // Unwrap: all three groups are mandatory digit runs of at most two characters
    let month: u32 = caps[1].parse().unwrap();
    let day: u32 = caps[2].parse().unwrap();
    let year: i32 = 2000 + caps[3].parse::<i32>().unwrap();
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| ReconError::DateParse(label.to_string()))
}

/// Format a date the way case-file headers are written: no zero padding on month or day, two
/// digit year.
pub fn format_short_date(date: NaiveDate) -> String {
    format!("{}/{}/{:02}", date.month(), date.day(), date.year() % 100)
}

/// Every calendar day from `first` to `last`, both inclusive.
pub fn daily_range(first: NaiveDate, last: NaiveDate) -> Result<Vec<NaiveDate>> {
    if last < first {
        return Err(ReconError::DateParse(format!(
            "last date {last} precedes first date {first}"
        )));
    }
    Ok(first.iter_days().take_while(|date| *date <= last).collect())
}

/// Convert an Excel serial day number (1900 date system) to a date.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !(1.0..=MAX_EXCEL_SERIAL).contains(&serial) {
        return None;
    }
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_days(Days::new(serial.floor() as u64))
}

/// Parse a date label whose textual format is not known in advance.
pub fn parse_flexible_date(label: &str) -> Result<NaiveDate> {
    let label = label.trim();
    if let Ok(date) = parse_short_date(label) {
        return Ok(date);
    }
    if let Some(date) = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(label, fmt).ok())
    {
        return Ok(date);
    }
    if let Some(datetime) = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(label, fmt).ok())
    {
        return Ok(datetime.date());
    }
    label
        .parse::<f64>()
        .ok()
        .and_then(excel_serial_to_date)
        .ok_or_else(|| ReconError::DateParse(label.to_string()))
}
