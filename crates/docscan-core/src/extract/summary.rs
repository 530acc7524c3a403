//! Summary zone: labeled totals, taxes and balances.

use tracing::debug;

use super::patterns::{SUMMARY_LINE, VAT_PERCENTAGE};
use crate::models::document::{Currency, SummaryLine};

#[derive(Debug, Clone, Copy, Default)]
pub struct SummaryParser;

impl SummaryParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse the lines from the sentinel onward. Non-matching lines are
    /// skipped; duplicate labels are kept in input order.
    pub fn parse<S: AsRef<str>>(&self, lines: &[S]) -> Vec<SummaryLine> {
        lines
            .iter()
            .map(AsRef::as_ref)
            .filter_map(|line| {
                let parsed = self.parse_line(line);
                if parsed.is_none() && !line.trim().is_empty() {
                    debug!("Ignoring summary line: '{}'", line.trim());
                }
                parsed
            })
            .collect()
    }

    pub fn parse_line(&self, line: &str) -> Option<SummaryLine> {
        let caps = SUMMARY_LINE.captures(line)?;

        let mut label = caps["label"].to_string();
        let percentage = VAT_PERCENTAGE
            .captures(line)
            .map(|vat| vat["percent"].to_string());
        if let Some(percent) = &percentage {
            label = format!("{} ({}%)", label, percent);
        }

        Some(SummaryLine {
            label,
            amount: caps["amount"].to_string(),
            currency: caps
                .name("symbol")
                .and_then(|m| m.as_str().chars().next())
                .and_then(Currency::from_symbol),
            percentage,
        })
    }
}
