//! Monetary amount normalization.

use rust_decimal::Decimal;
use std::str::FromStr;

use tracing::debug;

use super::patterns::{
    AMOUNT_CODE_PREFIX, AMOUNT_CODE_SUFFIX, AMOUNT_SYMBOL_PREFIX, AMOUNT_SYMBOL_SUFFIX, NUMBER,
};
use super::FieldExtractor;
use crate::models::document::{Currency, Match, Money, Span};

/// Amount entity extractor.
pub struct AmountExtractor;

impl AmountExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AmountExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for AmountExtractor {
    type Output = Match<Money>;

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let mut results = Vec::new();

        for pattern in [
            &*AMOUNT_SYMBOL_PREFIX,
            &*AMOUNT_SYMBOL_SUFFIX,
            &*AMOUNT_CODE_PREFIX,
            &*AMOUNT_CODE_SUFFIX,
        ] {
            for m in pattern.find_iter(text) {
                match normalize_amount(m.as_str()) {
                    Some(money) => results.push(Match::new(
                        m.as_str(),
                        money,
                        Span::new(m.start(), m.end()),
                    )),
                    None => debug!("Failed to parse amount '{}'", m.as_str()),
                }
            }
        }

        results
    }
}

/// Currency markers in detection priority order.
const CURRENCY_MARKERS: [(&str, Currency); 8] = [
    ("$", Currency::Usd),
    ("€", Currency::Eur),
    ("£", Currency::Gbp),
    ("¥", Currency::Jpy),
    ("USD", Currency::Usd),
    ("EUR", Currency::Eur),
    ("GBP", Currency::Gbp),
    ("JPY", Currency::Jpy),
];

/// Parse the first number in `s` with thousands separators stripped
/// (e.g. `"$1,234.56"` -> `1234.56`).
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let digits = NUMBER.find(s)?.as_str().replace(',', "");
    Decimal::from_str(&digits).ok()
}

/// Infer the currency of a matched amount span; first marker present wins.
pub fn detect_currency(s: &str) -> Option<Currency> {
    CURRENCY_MARKERS
        .iter()
        .find(|(marker, _)| s.contains(marker))
        .map(|(_, currency)| *currency)
}

/// Normalize a matched amount span into value and currency.
pub fn normalize_amount(s: &str) -> Option<Money> {
    Some(Money {
        amount: parse_amount(s)?,
        currency: detect_currency(s),
    })
}
