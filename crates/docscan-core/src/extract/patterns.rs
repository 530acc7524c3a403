//! Regex catalogs for document text extraction.
//!
//! Order inside each catalog is significant: extraction walks the families
//! in declaration order and never merges their matches.

use lazy_static::lazy_static;
use regex::Regex;

use crate::models::document::Column;

/// Month names accepted in textual dates.
const MONTHS: &str = r"(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[a-z]*";

lazy_static! {
    // Dates: numeric slash/dash, "D Month YYYY", "Month D, YYYY"
    pub static ref DATE_NUMERIC: Regex = Regex::new(
        r"\d{1,2}[/-]\d{1,2}[/-]\d{2,4}"
    ).unwrap();

    pub static ref DATE_DAY_MONTH: Regex = Regex::new(
        &format!(r"(?i)(\d{{1,2}})\s({MONTHS})\s(\d{{2,4}})")
    ).unwrap();

    pub static ref DATE_MONTH_DAY: Regex = Regex::new(
        &format!(r"(?i)({MONTHS})\s(\d{{1,2}}),?\s(\d{{2,4}})")
    ).unwrap();

    // Amounts: symbol-prefixed, symbol-suffixed, code-prefixed, code-suffixed
    pub static ref AMOUNT_SYMBOL_PREFIX: Regex = Regex::new(
        r"[$€£¥]\s?\d+(?:,\d{3})*(?:\.\d{2})?"
    ).unwrap();

    pub static ref AMOUNT_SYMBOL_SUFFIX: Regex = Regex::new(
        r"\d+(?:,\d{3})*(?:\.\d{2})?\s?[$€£¥]"
    ).unwrap();

    pub static ref AMOUNT_CODE_PREFIX: Regex = Regex::new(
        r"(?:USD|EUR|GBP|JPY)\s?\d+(?:,\d{3})*(?:\.\d{2})?"
    ).unwrap();

    pub static ref AMOUNT_CODE_SUFFIX: Regex = Regex::new(
        r"\d+(?:,\d{3})*(?:\.\d{2})?\s?(?:USD|EUR|GBP|JPY)"
    ).unwrap();

    /// Bare number with optional thousands separators and cents.
    pub static ref NUMBER: Regex = Regex::new(
        r"\d+(?:,\d{3})*(?:\.\d{2})?"
    ).unwrap();

    // Addresses
    pub static ref STREET_ADDRESS: Regex = Regex::new(
        r"(?i)\d+\s[\w\s]+(?:Street|St|Avenue|Ave|Road|Rd|Boulevard|Blvd|Drive|Dr|Lane|Ln|Court|Ct)[\w\s,]+\d{5}(?:-\d{4})?"
    ).unwrap();

    pub static ref PO_BOX: Regex = Regex::new(
        r"(?i)P\.?O\.?\s?Box\s\d+"
    ).unwrap();

    pub static ref EMAIL: Regex = Regex::new(
        r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}"
    ).unwrap();

    // Phones, plain forms first, then labeled forms
    pub static ref PHONE_INTERNATIONAL: Regex = Regex::new(
        r"\+?\d{1,3}[-.\s]?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}"
    ).unwrap();

    pub static ref PHONE_PARENTHESIZED: Regex = Regex::new(
        r"\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}"
    ).unwrap();

    pub static ref PHONE_PLAIN: Regex = Regex::new(
        r"\d{3}[-.\s]?\d{3}[-.\s]?\d{4}"
    ).unwrap();

    pub static ref PHONE_CALL_US: Regex = Regex::new(
        r"(?i)Call us:.*?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}"
    ).unwrap();

    pub static ref PHONE_SUPPORT: Regex = Regex::new(
        r"(?i)Support:.*?\d{3}[-.\s]?\d{3}[-.\s]?\d{4}"
    ).unwrap();

    /// Number embedded in a labeled phone match.
    pub static ref PHONE_EMBEDDED: Regex = Regex::new(
        r"\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}"
    ).unwrap();

    // Invoice numbers
    pub static ref INVOICE_NUMBER_NUMERIC: Regex = Regex::new(
        r"(?i)(?:Invoice|INV)[-:#\s]*\d+"
    ).unwrap();

    pub static ref INVOICE_NUMBER_ALNUM: Regex = Regex::new(
        r"(?i)(?:Invoice|INV)[-:#\s]*[A-Z0-9-]+"
    ).unwrap();

    // Table zone
    pub static ref LEADING_DATE: Regex = Regex::new(
        r"^\s*\d{1,2}[/-]\d{1,2}[/-]\d{2,4}\b"
    ).unwrap();

    pub static ref TRAILING_AMOUNT: Regex = Regex::new(
        r"[$€£¥]\s?\d+(?:,\d{3})*(?:\.\d{2})?\s*$"
    ).unwrap();

    /// Strict `<date> <description> <symbol><amount>` row split.
    pub static ref DATED_ROW: Regex = Regex::new(
        r"^\s*(?P<date>\d{1,2}[/-]\d{1,2}[/-]\d{2,4})\s+(?P<description>.*?\S)\s*[$€£¥]\s?(?P<amount>\d+(?:,\d{3})*(?:\.\d{2})?)\s*$"
    ).unwrap();

    // Summary zone
    pub static ref SUMMARY_LINE: Regex = Regex::new(
        r"(?i)\b(?P<label>Grand\s+Total|Sub[\s-]?total|Total|VAT|Tax|Balance(?:\s+Due)?|(?:Amount\s+)?Due)\b.*?(?:(?P<symbol>[$€£¥])\s?|[\s:])(?P<amount>\d+(?:,\d{3})*(?:\.\d{2})?)\s*$"
    ).unwrap();

    pub static ref VAT_PERCENTAGE: Regex = Regex::new(
        r"(?i)VAT\s*\(\s*(?P<percent>\d+(?:\.\d+)?)\s*%\s*\)"
    ).unwrap();

    // Header zone key/value lines
    pub static ref DUE_DATE_FIELD: Regex = Regex::new(
        r"(?i)^\s*(?:due\s+date|date\s+due|payment\s+due)\s*[:\-]?\s*(?P<value>.*?\S)\s*$"
    ).unwrap();

    pub static ref DATE_FIELD: Regex = Regex::new(
        r"(?i)^\s*(?:invoice\s+date|issue\s+date|date\s+of\s+issue|date)\b\s*[:\-]?\s*(?P<value>.*?\S)\s*$"
    ).unwrap();

    pub static ref INVOICE_FIELD: Regex = Regex::new(
        r"(?i)^\s*invoice\s*(?:no\.?|number|num\.?|#)?\s*[:#\-]?\s*(?P<value>[A-Z0-9][\w/\-]*\d[\w/\-]*|\d)\s*$"
    ).unwrap();

    // Table header synonym groups
    pub static ref DATE_HEADER: Regex = Regex::new(r"(?i)\bDate\b").unwrap();

    pub static ref DESCRIPTION_HEADER: Regex = Regex::new(
        r"(?i)\b(?:Description|Items?|Services?)\b"
    ).unwrap();

    pub static ref QUANTITY_HEADER: Regex = Regex::new(
        r"(?i)\b(?:Quantity|Qty)\b"
    ).unwrap();

    pub static ref RATE_HEADER: Regex = Regex::new(
        r"(?i)\b(?:Rate|Price|Cost)\b"
    ).unwrap();

    pub static ref AMOUNT_HEADER: Regex = Regex::new(
        r"(?i)\b(?:Amount|Charges|Total)\b"
    ).unwrap();

    /// Composite header rows, each naming 2-3 columns in reading order.
    pub static ref HEADER_CATALOG: Vec<Regex> = {
        const DATE: &str = r"\bDate\b";
        const DESC: &str = r"\b(?:Description|Items?|Services?)\b";
        const QTY: &str = r"\b(?:Quantity|Qty)\b";
        const RATE: &str = r"\b(?:Rate|Price|Cost)\b";
        const AMOUNT: &str = r"\b(?:Amount|Charges|Total)\b";

        [
            vec![DATE, DESC, AMOUNT],
            vec![DESC, QTY, RATE],
            vec![DESC, QTY, AMOUNT],
            vec![DESC, RATE, AMOUNT],
            vec![QTY, RATE, AMOUNT],
            vec![DATE, DESC],
            vec![DESC, AMOUNT],
            vec![DESC, QTY],
        ]
        .iter()
        .map(|parts| Regex::new(&format!(r"(?i){}", parts.join(r".*?"))).unwrap())
        .collect()
    };
}

/// Column synonym groups in canonical derivation order.
pub fn column_groups() -> [(&'static Regex, Column); 5] {
    [
        (&*DATE_HEADER, Column::Date),
        (&*DESCRIPTION_HEADER, Column::Description),
        (&*QUANTITY_HEADER, Column::Quantity),
        (&*RATE_HEADER, Column::Rate),
        (&*AMOUNT_HEADER, Column::Amount),
    ]
}

/// Keywords that end the table zone (case-insensitive substring match).
pub const SUMMARY_SENTINELS: [&str; 5] = ["subtotal", "total", "vat", "tax", "balance"];
