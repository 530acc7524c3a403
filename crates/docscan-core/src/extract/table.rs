//! Table zone: header row detection and row parsing.

use tracing::{debug, info};

use super::patterns::{
    column_groups, DATED_ROW, HEADER_CATALOG, LEADING_DATE, SUMMARY_SENTINELS, TRAILING_AMOUNT,
};
use crate::models::document::{Column, Span, TableRow, TableSchema};

/// A recognized table header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedHeader {
    /// Index of the header line in the document.
    pub line_index: usize,
    /// Canonical columns named by the header.
    pub schema: TableSchema,
}

/// Finds the column-header line and derives its canonical schema.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableHeaderDetector;

impl TableHeaderDetector {
    pub fn new() -> Self {
        Self
    }

    /// Return the first line matching any catalog header pattern.
    pub fn detect<S: AsRef<str>>(&self, lines: &[S]) -> Option<DetectedHeader> {
        let (line_index, line) = lines
            .iter()
            .map(AsRef::as_ref)
            .enumerate()
            .find(|(_, line)| HEADER_CATALOG.iter().any(|re| re.is_match(line)))?;

        let schema = self.derive_schema(line);
        info!("Table header at line {}: {:?}", line_index, schema.columns());

        Some(DetectedHeader { line_index, schema })
    }

    /// Derive canonical columns from a header line.
    ///
    /// Synonym groups are tested in canonical order. A group may only claim a
    /// word no earlier group has consumed.
    pub fn derive_schema(&self, line: &str) -> TableSchema {
        let mut consumed: Vec<Span> = Vec::new();
        let mut columns = Vec::new();

        for (pattern, column) in column_groups() {
            let free = pattern
                .find_iter(line)
                .map(|m| Span::new(m.start(), m.end()))
                .find(|span| !consumed.iter().any(|c| c.overlaps(span)));

            if let Some(span) = free {
                consumed.push(span);
                columns.push(column);
            }
        }

        TableSchema::new(columns)
    }

    /// Uncanonicalized header words for documents with no catalog header:
    /// the whitespace-split words of the first digit-free line naming any column.
    pub fn raw_headers<S: AsRef<str>>(&self, lines: &[S]) -> Vec<String> {
        lines
            .iter()
            .map(AsRef::as_ref)
            .filter(|line| !line.chars().any(|c| c.is_ascii_digit()))
            .find(|line| column_groups().iter().any(|(re, _)| re.is_match(line)))
            .map(|line| line.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

/// Rows consumed from the table zone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedRows {
    pub rows: Vec<TableRow>,
    /// Offset (into the lines handed to the parser) of the sentinel line that
    /// ended the zone, if any.
    pub sentinel: Option<usize>,
    pub warnings: Vec<String>,
}

/// Consumes table lines under a fixed schema until a summary sentinel.
#[derive(Debug, Clone)]
pub struct RowParser {
    schema: TableSchema,
}

impl RowParser {
    pub fn new(schema: TableSchema) -> Self {
        Self { schema }
    }

    /// Whether rows can be built for this schema.
    ///
    /// Only `Date, Description, Amount` is supported; wider schemas are
    /// reported and produce no rows.
    pub fn is_supported(&self) -> bool {
        self.schema.columns() == [Column::Date, Column::Description, Column::Amount]
    }

    /// Parse the lines following the header row.
    pub fn parse<S: AsRef<str>>(&self, lines: &[S]) -> ParsedRows {
        let mut parsed = ParsedRows::default();
        let supported = self.is_supported();

        for (offset, line) in lines.iter().map(AsRef::as_ref).enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            if is_sentinel(line) {
                debug!("Summary sentinel at table offset {}: '{}'", offset, line.trim());
                parsed.sentinel = Some(offset);
                break;
            }

            if !supported {
                continue;
            }

            if self.schema.contains(Column::Date) && !LEADING_DATE.is_match(line) {
                debug!("Dropping row without leading date: '{}'", line.trim());
                continue;
            }

            if !TRAILING_AMOUNT.is_match(line) {
                debug!("Dropping row without trailing amount: '{}'", line.trim());
                continue;
            }

            match split_dated_row(line) {
                Some(row) => parsed.rows.push(row),
                None => debug!("Could not split row: '{}'", line.trim()),
            }
        }

        if !supported {
            let columns: Vec<&str> = self.schema.columns().iter().map(Column::name).collect();
            parsed.warnings.push(format!(
                "row parsing unsupported for schema [{}]",
                columns.join(", ")
            ));
        }

        info!("Parsed {} table rows", parsed.rows.len());
        parsed
    }
}

/// Whether a line starts the summary zone.
pub fn is_sentinel(line: &str) -> bool {
    let lower = line.to_lowercase();
    SUMMARY_SENTINELS.iter().any(|keyword| lower.contains(keyword))
}

/// Split `<date> <description> <symbol><amount>` into a row.
///
/// Tries the strict pattern first, then splits at the first currency symbol
/// and the first space before it.
fn split_dated_row(line: &str) -> Option<TableRow> {
    if let Some(caps) = DATED_ROW.captures(line) {
        return Some(
            TableRow::new()
                .with(Column::Date, &caps["date"])
                .with(Column::Description, caps["description"].trim())
                .with(Column::Amount, &caps["amount"]),
        );
    }

    let symbol = line.find(['$', '€', '£', '¥'])?;
    let (left, right) = line.split_at(symbol);
    let amount = right.chars().skip(1).collect::<String>();
    let (date, description) = left.trim().split_once(' ')?;
    let date = date.trim_end_matches(|c: char| !c.is_alphanumeric());

    Some(
        TableRow::new()
            .with(Column::Date, date)
            .with(Column::Description, description.trim())
            .with(Column::Amount, amount.trim()),
    )
}
