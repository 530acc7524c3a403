//! Permissive date parsing for date candidates found in document text.
//!
//! Numeric dates are read month-first (`01/15/2023` is January 15) and fall
//! back to day-first when the first field cannot be a month. Two-digit years
//! map to 2000-2050 / 1951-1999. Anything that does not form a valid calendar
//! date yields `None` and the candidate is dropped.

use chrono::NaiveDate;
use tracing::debug;

use super::patterns::{DATE_DAY_MONTH, DATE_MONTH_DAY, DATE_NUMERIC};
use super::FieldExtractor;
use crate::models::document::{Match, Span};

/// Date entity extractor.
pub struct DateExtractor;

impl DateExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DateExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for DateExtractor {
    type Output = Match<NaiveDate>;

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let mut results = Vec::new();

        for pattern in [&*DATE_NUMERIC, &*DATE_DAY_MONTH, &*DATE_MONTH_DAY] {
            for m in pattern.find_iter(text) {
                match parse_fuzzy_date(m.as_str()) {
                    Some(date) => results.push(Match::new(
                        m.as_str(),
                        date,
                        Span::new(m.start(), m.end()),
                    )),
                    None => debug!("Failed to parse date '{}'", m.as_str()),
                }
            }
        }

        results
    }
}

/// Parse a numeric, "D Month YYYY" or "Month D, YYYY" date.
pub fn parse_fuzzy_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.contains(['/', '-']) && s.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        parse_numeric(s)
    } else {
        parse_textual(s)
    }
}

fn parse_numeric(s: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = s.split(['/', '-']).map(str::trim).collect();
    let [first, second, year] = parts.as_slice() else {
        return None;
    };

    let first: u32 = first.parse().ok()?;
    let second: u32 = second.parse().ok()?;
    let year = parse_year(year)?;

    let (month, day) = if first <= 12 {
        (first, second)
    } else {
        (second, first)
    };

    NaiveDate::from_ymd_opt(year, month, day)
}

fn parse_textual(s: &str) -> Option<NaiveDate> {
    let cleaned = s.replace(',', " ");
    let tokens: Vec<&str> = cleaned.split_whitespace().collect();
    let [a, b, c] = tokens.as_slice() else {
        return None;
    };

    // "10 January 2023" or "January 10 2023"
    let (day, month, year) = match month_number(a) {
        Some(month) => (b.parse().ok()?, month, c),
        None => (a.parse().ok()?, month_number(b)?, c),
    };

    NaiveDate::from_ymd_opt(parse_year(year)?, month, day)
}

/// Resolve an English month name or abbreviation.
///
/// Only the exact abbreviation, the full name, or "Sept" are accepted, so
/// "Janx" is rejected rather than guessed.
pub fn month_number(name: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "january",
        "february",
        "march",
        "april",
        "may",
        "june",
        "july",
        "august",
        "september",
        "october",
        "november",
        "december",
    ];

    let name = name.trim_end_matches('.').to_lowercase();
    if name.len() < 3 {
        return None;
    }

    MONTHS
        .iter()
        .position(|full| *full == name || full[..3] == name || (name == "sept" && *full == "september"))
        .map(|idx| idx as u32 + 1)
}

fn parse_year(s: &str) -> Option<i32> {
    let year: i32 = s.trim().parse().ok()?;
    if s.trim().len() <= 2 {
        // Two-digit year: assume 2000s for 00-50, 1900s for 51-99
        if year <= 50 {
            Some(2000 + year)
        } else {
            Some(1900 + year)
        }
    } else {
        Some(year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn test_extract_invoice_dates() {
        let text = "Invoice Date: 01/15/2023\nDue Date: 02/15/2023\nOrder Date: January 10, 2023";
        let dates = DateExtractor::new().extract_all(text);

        let raw: Vec<&str> = dates.iter().map(|d| d.raw.as_str()).collect();
        assert_eq!(raw, ["01/15/2023", "02/15/2023", "January 10, 2023"]);
        assert_eq!(dates[2].value, NaiveDate::from_ymd_opt(2023, 1, 10).unwrap());
        assert_eq!(&text[dates[0].span.start..dates[0].span.end], "01/15/2023");
    }

    #[test]
    fn test_unparseable_candidate_is_dropped_alone() {
        let dates = DateExtractor::new().extract_all("13/13/2023 and 03/04/2022");
        assert_eq!(dates.len(), 1);
        assert_eq!(dates[0].raw, "03/04/2022");
    }

    #[test]
    fn test_numeric_month_first() {
        assert_eq!(parse_fuzzy_date("01/15/2023"), date(2023, 1, 15));
        assert_eq!(parse_fuzzy_date("02-03-2023"), date(2023, 2, 3));
    }

    #[test]
    fn test_numeric_day_first_fallback() {
        assert_eq!(parse_fuzzy_date("15/01/2023"), date(2023, 1, 15));
    }

    #[test]
    fn test_two_digit_year() {
        assert_eq!(parse_fuzzy_date("12-08-29"), date(2029, 12, 8));
        assert_eq!(parse_fuzzy_date("1/2/99"), date(1999, 1, 2));
    }

    #[test]
    fn test_textual_forms() {
        assert_eq!(parse_fuzzy_date("January 10, 2023"), date(2023, 1, 10));
        assert_eq!(parse_fuzzy_date("10 Jan 2023"), date(2023, 1, 10));
        assert_eq!(parse_fuzzy_date("Sept 5 2021"), date(2021, 9, 5));
    }

    #[test]
    fn test_invalid_candidates_are_rejected() {
        assert_eq!(parse_fuzzy_date("13/13/2023"), None);
        assert_eq!(parse_fuzzy_date("02/30/2023"), None);
        assert_eq!(parse_fuzzy_date("Janxyz 10, 2023"), None);
    }
}
