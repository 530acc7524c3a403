//! Zone-based document structuring.
//!
//! A document is read as three consecutive zones: the header zone (metadata
//! key/value lines and the customer block), the table zone (rows under the
//! detected column header) and the summary zone (starting at the first
//! sentinel line). Loose entities are extracted over the whole text
//! independently of the zones.

use tracing::{debug, info};

use super::entities::EntityExtractor;
use super::header::HeaderFieldMatcher;
use super::summary::SummaryParser;
use super::table::{RowParser, TableHeaderDetector};
use super::DocumentParser;
use crate::models::document::{ParseResult, RawDocument};

/// Orchestrates the zone parsers into a single [`ParseResult`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentStructureExtractor {
    headers: TableHeaderDetector,
    fields: HeaderFieldMatcher,
    summary: SummaryParser,
    entities: EntityExtractor,
}

impl DocumentStructureExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Structure an already line-split document.
    pub fn parse_document(&self, document: &RawDocument) -> ParseResult {
        if document.is_blank() {
            debug!("Blank document, nothing to extract");
            return ParseResult::empty();
        }

        let lines = document.lines();
        let mut result = ParseResult::empty();

        match self.headers.detect(lines) {
            Some(header) => {
                result.metadata = self.fields.extract(&lines[..header.line_index]);

                let table_lines = &lines[header.line_index + 1..];
                let parsed = RowParser::new(header.schema.clone()).parse(table_lines);

                match parsed.sentinel {
                    Some(offset) => {
                        result.summary = self.summary.parse(&table_lines[offset..]);
                    }
                    None => result
                        .warnings
                        .push("no summary sentinel after table".to_string()),
                }

                result.schema = header.schema;
                result.rows = parsed.rows;
                result.warnings.extend(parsed.warnings);
            }
            None => {
                result.metadata = self.fields.extract(lines);
                result.raw_headers = self.headers.raw_headers(lines);
                result.warnings.push("no table header found".to_string());
            }
        }

        result.entities = self.entities.extract(document.text());

        info!(
            "Structured document: {} rows, {} summary lines, {} entities",
            result.rows.len(),
            result.summary.len(),
            result.entities.len()
        );

        result
    }
}

impl DocumentParser for DocumentStructureExtractor {
    fn name(&self) -> &'static str {
        "zone"
    }

    fn parse(&self, text: &str) -> ParseResult {
        self.parse_document(&RawDocument::from_text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::document::{Column, InvoiceMetadata, TableRow};
    use pretty_assertions::assert_eq;

    const INVOICE: &str = "\
Sparkle Cleaning Services
Invoice #: 2041
Invoice Date: 01/15/2023
Due Date: 02/15/2023

To
Jane Doe
12 Elm Road

Date Description Charges
12-08-29 Cleaning $30
12-09-29 Window washing $12.50

Subtotal: $42.50
VAT (20%): $8.50
Total: $51.00
";

    #[test]
    fn test_full_invoice() {
        let result = DocumentStructureExtractor::new().parse(INVOICE);

        assert_eq!(
            result.metadata,
            InvoiceMetadata {
                invoice_number: Some("2041".to_string()),
                date: Some("01/15/2023".to_string()),
                due_date: Some("02/15/2023".to_string()),
                customer: Some("Jane Doe, 12 Elm Road".to_string()),
            }
        );
        assert_eq!(
            result.schema.columns(),
            &[Column::Date, Column::Description, Column::Amount]
        );
        assert_eq!(
            result.rows,
            vec![
                TableRow::new()
                    .with(Column::Date, "12-08-29")
                    .with(Column::Description, "Cleaning")
                    .with(Column::Amount, "30"),
                TableRow::new()
                    .with(Column::Date, "12-09-29")
                    .with(Column::Description, "Window washing")
                    .with(Column::Amount, "12.50"),
            ]
        );

        let labels: Vec<&str> = result.summary.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, ["Subtotal", "VAT (20%)", "Total"]);
        assert!(result.warnings.is_empty());
        assert!(!result.entities.amounts.is_empty());
    }

    #[test]
    fn test_header_and_single_row() {
        let result = DocumentStructureExtractor::new().parse("Date Description Charges\n12-08-29 Cleaning $30");

        assert_eq!(
            result.rows,
            vec![TableRow::new()
                .with(Column::Date, "12-08-29")
                .with(Column::Description, "Cleaning")
                .with(Column::Amount, "30")]
        );
        assert!(result.summary.is_empty());
    }

    #[test]
    fn test_no_header_degrades_to_metadata() {
        let text = "Invoice Date: 01/15/2023\nPlease pay promptly.\nTotal: $10.00";
        let result = DocumentStructureExtractor::new().parse(text);

        assert!(result.schema.is_empty());
        assert!(result.rows.is_empty());
        assert!(result.summary.is_empty());
        assert_eq!(result.metadata.date.as_deref(), Some("01/15/2023"));
        assert_eq!(result.warnings, ["no table header found"]);
    }

    #[test]
    fn test_parse_is_idempotent() {
        let parser = DocumentStructureExtractor::new();
        assert_eq!(parser.parse(INVOICE), parser.parse(INVOICE));
    }

    #[test]
    fn test_empty_input() {
        let parser = DocumentStructureExtractor::new();
        assert!(parser.parse("").is_empty());
        assert!(parser.parse(" \n\t\n").is_empty());
    }

    #[test]
    fn test_rows_stop_at_sentinel() {
        let text = "Date Description Amount\n01/02/2023 Audit $900.00\nBalance $900.00\n01/03/2023 Late fee $5.00";
        let result = DocumentStructureExtractor::new().parse(text);

        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.summary.len(), 1);
        assert_eq!(result.summary[0].label, "Balance");
    }
}
