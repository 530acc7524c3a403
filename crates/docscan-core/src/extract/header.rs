//! Key/value metadata from the header zone.

use tracing::debug;

use super::patterns::{DATE_FIELD, DUE_DATE_FIELD, INVOICE_FIELD};
use crate::models::document::InvoiceMetadata;

/// Extracts invoice number, dates and the customer block from the lines that
/// precede the table header.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderFieldMatcher;

impl HeaderFieldMatcher {
    pub fn new() -> Self {
        Self
    }

    /// Scan `lines` (the header zone) for metadata. The first occurrence of
    /// each field wins.
    pub fn extract<S: AsRef<str>>(&self, lines: &[S]) -> InvoiceMetadata {
        let mut metadata = InvoiceMetadata::default();

        for line in lines {
            let line = line.as_ref();

            // Due date first so "Due Date:" is never read as the issue date
            if let Some(caps) = DUE_DATE_FIELD.captures(line) {
                metadata.due_date.get_or_insert_with(|| caps["value"].to_string());
            } else if let Some(caps) = DATE_FIELD.captures(line) {
                metadata.date.get_or_insert_with(|| caps["value"].to_string());
            } else if let Some(caps) = INVOICE_FIELD.captures(line) {
                metadata
                    .invoice_number
                    .get_or_insert_with(|| caps["value"].to_string());
            }
        }

        metadata.customer = self.customer_block(lines);
        metadata
    }

    /// Lines between a bare "To" line and the next blank line, joined with ", ".
    fn customer_block<S: AsRef<str>>(&self, lines: &[S]) -> Option<String> {
        let start = lines.iter().position(|line| is_to_marker(line.as_ref()))?;

        let block: Vec<&str> = lines[start + 1..]
            .iter()
            .map(|line| line.as_ref().trim())
            .take_while(|line| !line.is_empty())
            .collect();

        if block.is_empty() {
            debug!("Customer block at line {} is empty", start);
            return None;
        }

        Some(block.join(", "))
    }
}

fn is_to_marker(line: &str) -> bool {
    let line = line.trim();
    line.eq_ignore_ascii_case("to") || line.eq_ignore_ascii_case("to:")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_header_fields() {
        let lines = [
            "ACME Cleaning Co.",
            "Invoice #: INV-2041",
            "Invoice Date: 01/15/2023",
            "Due Date: 02/15/2023",
            "",
            "To",
            "Jane Doe",
            "12 Elm Road",
            "",
            "Thanks!",
        ];

        let metadata = HeaderFieldMatcher::new().extract(&lines);
        assert_eq!(
            metadata,
            InvoiceMetadata {
                invoice_number: Some("INV-2041".to_string()),
                date: Some("01/15/2023".to_string()),
                due_date: Some("02/15/2023".to_string()),
                customer: Some("Jane Doe, 12 Elm Road".to_string()),
            }
        );
    }

    #[test]
    fn test_bare_invoice_title_is_not_a_number() {
        let lines = ["INVOICE NUMBER", "Invoice No", "Invoice No 2041"];
        let metadata = HeaderFieldMatcher::new().extract(&lines);
        assert_eq!(metadata.invoice_number.as_deref(), Some("2041"));

        let metadata = HeaderFieldMatcher::new().extract(&["INVOICE", "Invoice Number"]);
        assert_eq!(metadata.invoice_number, None);
    }

    #[test]
    fn test_first_occurrence_wins() {
        let lines = ["Date: 03/01/2023", "Date: 04/01/2023"];
        let metadata = HeaderFieldMatcher::new().extract(&lines);
        assert_eq!(metadata.date.as_deref(), Some("03/01/2023"));
    }

    #[test]
    fn test_customer_block_runs_to_end_without_blank() {
        let lines = ["To:", "Globex", "Springfield"];
        let metadata = HeaderFieldMatcher::new().extract(&lines);
        assert_eq!(metadata.customer.as_deref(), Some("Globex, Springfield"));
    }

    #[test]
    fn test_missing_fields_stay_absent() {
        let lines = ["Hello there", "To", ""];
        let metadata = HeaderFieldMatcher::new().extract(&lines);
        assert!(metadata.is_empty());
    }
}
