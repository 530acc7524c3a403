//! Document data models produced by the text-structuring engine.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ocr::{reconstruct_lines, OcrToken};

/// Immutable input text together with its line sequence.
///
/// Blank lines are kept: they terminate the customer block and separate zones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    text: String,
    lines: Vec<String>,
}

impl RawDocument {
    /// Split plain text into lines (handles `\n` and `\r\n`).
    pub fn from_text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            lines: text.lines().map(str::to_string).collect(),
        }
    }

    /// Build a document from lines reconstructed elsewhere (e.g. OCR tokens).
    pub fn from_lines(lines: Vec<String>) -> Self {
        Self {
            text: lines.join("\n"),
            lines,
        }
    }

    /// Build a document from an OCR token stream (see [`reconstruct_lines`]).
    pub fn from_tokens(tokens: &[OcrToken], min_confidence: f32) -> Self {
        Self::from_lines(reconstruct_lines(tokens, min_confidence))
    }

    /// Full document text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Ordered lines, blank lines included.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// True when the document holds no non-whitespace text.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Byte range of a match in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Check whether two spans share at least one byte.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// A single extracted entity.
///
/// `raw` is the matched substring, `value` its normalized form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match<T> {
    /// Matched substring, exactly as it appears in the text.
    pub raw: String,
    /// Normalized value.
    pub value: T,
    /// Location of `raw` in the source text.
    pub span: Span,
}

impl<T> Match<T> {
    pub fn new(raw: impl Into<String>, value: T, span: Span) -> Self {
        Self {
            raw: raw.into(),
            value,
            span,
        }
    }
}

/// Currencies recognized by symbol or ISO code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    #[serde(rename = "USD")]
    Usd,
    #[serde(rename = "EUR")]
    Eur,
    #[serde(rename = "GBP")]
    Gbp,
    #[serde(rename = "JPY")]
    Jpy,
}

impl Currency {
    /// ISO 4217 code.
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Jpy => "JPY",
        }
    }

    /// Map a currency symbol to its currency.
    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            '$' => Some(Currency::Usd),
            '€' => Some(Currency::Eur),
            '£' => Some(Currency::Gbp),
            '¥' => Some(Currency::Jpy),
            _ => None,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A monetary amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<Currency>,
}

/// A description/price pair found on a single line in flat mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPrice {
    pub description: String,
    pub price: String,
    /// The whole source line, trimmed.
    pub line: String,
}

/// Loose entities extracted from the whole text, grouped by kind.
///
/// Lists keep pattern order then text order; duplicates are not merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entities {
    pub dates: Vec<Match<NaiveDate>>,
    pub amounts: Vec<Match<Money>>,
    pub addresses: Vec<Match<String>>,
    pub emails: Vec<Match<String>>,
    pub phone_numbers: Vec<Match<String>>,
    pub invoice_numbers: Vec<Match<String>>,
    pub items: Vec<Match<ItemPrice>>,
}

impl Entities {
    /// Total number of extracted data points.
    pub fn len(&self) -> usize {
        self.dates.len()
            + self.amounts.len()
            + self.addresses.len()
            + self.emails.len()
            + self.phone_numbers.len()
            + self.invoice_numbers.len()
            + self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Key/value metadata found above the table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,

    /// Lines of the "To" block, joined with ", ".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<String>,
}

impl InvoiceMetadata {
    pub fn is_empty(&self) -> bool {
        self.invoice_number.is_none()
            && self.date.is_none()
            && self.due_date.is_none()
            && self.customer.is_none()
    }
}

/// Canonical table columns, declared in their fixed schema order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Column {
    Date,
    Description,
    Quantity,
    Rate,
    Amount,
}

impl Column {
    /// All columns in canonical order.
    pub const ALL: [Column; 5] = [
        Column::Date,
        Column::Description,
        Column::Quantity,
        Column::Rate,
        Column::Amount,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Column::Date => "Date",
            Column::Description => "Description",
            Column::Quantity => "Quantity",
            Column::Rate => "Rate",
            Column::Amount => "Amount",
        }
    }

    /// Resolve a header word or JSON key (any synonym, any case) to a column.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "date" => Some(Column::Date),
            "description" | "item" | "items" | "service" | "services" => {
                Some(Column::Description)
            }
            "quantity" | "qty" => Some(Column::Quantity),
            "rate" | "price" | "cost" | "unit price" => Some(Column::Rate),
            "amount" | "charges" | "charge" | "total" => Some(Column::Amount),
            _ => None,
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered, duplicate-free set of canonical columns.
///
/// Only built from a column list that is sorted and deduplicated on the way
/// in, and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableSchema(Vec<Column>);

impl TableSchema {
    pub fn new(columns: impl IntoIterator<Item = Column>) -> Self {
        let mut columns: Vec<Column> = columns.into_iter().collect();
        columns.sort();
        columns.dedup();
        Self(columns)
    }

    pub fn columns(&self) -> &[Column] {
        &self.0
    }

    pub fn contains(&self, column: Column) -> bool {
        self.0.contains(&column)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One table row: canonical column name to cell text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableRow(BTreeMap<Column, String>);

impl TableRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: Column, value: impl Into<String>) -> Self {
        self.0.insert(column, value.into());
        self
    }

    pub fn get(&self, column: Column) -> Option<&str> {
        self.0.get(&column).map(String::as_str)
    }

    /// Cells in canonical column order.
    pub fn iter(&self) -> impl Iterator<Item = (&Column, &String)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A labeled total, tax or balance line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryLine {
    /// Label as printed, with a VAT percentage embedded when present
    /// (e.g. `"VAT (20%)"`).
    pub label: String,

    /// Amount digits as printed, without currency symbol.
    pub amount: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<Currency>,

    /// Percentage qualifier, e.g. `"20"` for `VAT (20%)`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<String>,
}

/// Which strategy produced a result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseSource {
    /// Local regex/zone heuristics.
    #[default]
    Local,
    /// Remote extraction oracle (entities still local).
    Oracle,
}

/// Complete structured output for one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseResult {
    pub source: ParseSource,

    pub metadata: InvoiceMetadata,

    /// Canonical table schema; empty when no header row was recognized.
    pub schema: TableSchema,

    /// Whitespace-split header words when no catalog header was recognized.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub raw_headers: Vec<String>,

    pub rows: Vec<TableRow>,

    pub summary: Vec<SummaryLine>,

    pub entities: Entities,

    /// Diagnostics for degraded stages.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ParseResult {
    pub fn empty() -> Self {
        Self::default()
    }

    /// True when nothing at all was extracted.
    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
            && self.schema.is_empty()
            && self.rows.is_empty()
            && self.summary.is_empty()
            && self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_raw_document_keeps_blank_lines() {
        let doc = RawDocument::from_text("Invoice: 1\n\nTo\r\nAcme\n");
        assert_eq!(doc.lines(), &["Invoice: 1", "", "To", "Acme"]);
    }

    #[test]
    fn test_schema_is_sorted_and_unique() {
        let schema = TableSchema::new([Column::Amount, Column::Date, Column::Amount]);
        assert_eq!(schema.columns(), &[Column::Date, Column::Amount]);
    }

    #[test]
    fn test_all_columns_in_schema_order() {
        let schema = TableSchema::new(Column::ALL.iter().rev().copied());
        assert_eq!(schema.columns(), &Column::ALL);

        for column in Column::ALL {
            assert_eq!(Column::from_label(column.name()), Some(column));
        }
    }

    #[test]
    fn test_row_serializes_by_column_name() {
        let row = TableRow::new()
            .with(Column::Amount, "30")
            .with(Column::Date, "12-08-29");
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"Date":"12-08-29","Amount":"30"}"#);
    }

    #[test]
    fn test_column_from_label_synonyms() {
        assert_eq!(Column::from_label("Qty"), Some(Column::Quantity));
        assert_eq!(Column::from_label("CHARGES"), Some(Column::Amount));
        assert_eq!(Column::from_label("Service"), Some(Column::Description));
        assert_eq!(Column::from_label("Notes"), None);
    }

    #[test]
    fn test_metadata_skips_absent_fields() {
        let metadata = InvoiceMetadata {
            invoice_number: Some("INV-7".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_string(&metadata).unwrap();
        assert_eq!(json, r#"{"invoice_number":"INV-7"}"#);
    }
}
