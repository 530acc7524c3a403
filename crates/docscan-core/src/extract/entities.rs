//! Flat entity extraction over the whole document text.

use tracing::{debug, info};

use super::amounts::AmountExtractor;
use super::dates::DateExtractor;
use super::patterns::{
    EMAIL, INVOICE_NUMBER_ALNUM, INVOICE_NUMBER_NUMERIC, NUMBER, PHONE_CALL_US,
    PHONE_EMBEDDED, PHONE_INTERNATIONAL, PHONE_PARENTHESIZED, PHONE_PLAIN, PHONE_SUPPORT,
    PO_BOX, STREET_ADDRESS,
};
use super::FieldExtractor;
use crate::models::document::{Entities, ItemPrice, Match, Span};

/// Stateless extractor for every entity kind.
///
/// Each kind is extracted independently: pattern families run in a fixed
/// order and their matches are appended without merging, so the same raw
/// string may be reported by more than one family.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityExtractor;

impl EntityExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract all entity kinds from `text`.
    pub fn extract(&self, text: &str) -> Entities {
        let entities = Entities {
            dates: DateExtractor::new().extract_all(text),
            amounts: AmountExtractor::new().extract_all(text),
            addresses: self.extract_addresses(text),
            emails: self.extract_emails(text),
            phone_numbers: self.extract_phone_numbers(text),
            invoice_numbers: self.extract_invoice_numbers(text),
            items: self.extract_items(text),
        };

        info!(
            "Extracted {} entities ({} dates, {} amounts, {} phones, {} items)",
            entities.len(),
            entities.dates.len(),
            entities.amounts.len(),
            entities.phone_numbers.len(),
            entities.items.len()
        );

        entities
    }

    /// Street addresses with a zip code, then PO boxes. Values are trimmed raw text.
    pub fn extract_addresses(&self, text: &str) -> Vec<Match<String>> {
        [&*STREET_ADDRESS, &*PO_BOX]
            .into_iter()
            .flat_map(|pattern| pattern.find_iter(text))
            .filter_map(|m| trimmed(text, m.start(), m.end()))
            .collect()
    }

    pub fn extract_emails(&self, text: &str) -> Vec<Match<String>> {
        EMAIL
            .find_iter(text)
            .map(|m| {
                Match::new(
                    m.as_str(),
                    m.as_str().to_string(),
                    Span::new(m.start(), m.end()),
                )
            })
            .collect()
    }

    /// Plain phone forms, then labeled ones ("Call us:", "Support:").
    ///
    /// A labeled match is narrowed to the number it embeds; when it embeds
    /// none it is discarded.
    pub fn extract_phone_numbers(&self, text: &str) -> Vec<Match<String>> {
        let mut results = Vec::new();

        for pattern in [&*PHONE_INTERNATIONAL, &*PHONE_PARENTHESIZED, &*PHONE_PLAIN] {
            for m in pattern.find_iter(text) {
                results.push(Match::new(
                    m.as_str(),
                    m.as_str().to_string(),
                    Span::new(m.start(), m.end()),
                ));
            }
        }

        for pattern in [&*PHONE_CALL_US, &*PHONE_SUPPORT] {
            for m in pattern.find_iter(text) {
                let label_end = m.as_str().find(':').map_or(0, |idx| idx + 1);
                let rest = &m.as_str()[label_end..];

                match PHONE_EMBEDDED.find(rest) {
                    Some(number) => {
                        let start = m.start() + label_end + number.start();
                        results.push(Match::new(
                            number.as_str(),
                            number.as_str().to_string(),
                            Span::new(start, start + number.len()),
                        ));
                    }
                    None => debug!("Discarding labeled phone without number: '{}'", m.as_str()),
                }
            }
        }

        results
    }

    pub fn extract_invoice_numbers(&self, text: &str) -> Vec<Match<String>> {
        [&*INVOICE_NUMBER_NUMERIC, &*INVOICE_NUMBER_ALNUM]
            .into_iter()
            .flat_map(|pattern| pattern.find_iter(text))
            .filter_map(|m| trimmed(text, m.start(), m.end()))
            .collect()
    }

    /// Description/price pairs, one per line.
    ///
    /// A line qualifies when it is longer than four characters and holds a
    /// number with some text before it; the first number is the price.
    pub fn extract_items(&self, text: &str) -> Vec<Match<ItemPrice>> {
        let mut results = Vec::new();
        let mut offset = 0;

        for raw_line in text.split_inclusive('\n') {
            let line_start = offset;
            offset += raw_line.len();

            let line = raw_line.trim();
            if line.chars().count() <= 4 {
                continue;
            }

            let Some(number) = NUMBER.find(line) else {
                continue;
            };

            let description = line[..number.start()].trim();
            if description.is_empty() {
                debug!("Skipping item line without description: '{}'", line);
                continue;
            }

            let start = line_start + (raw_line.len() - raw_line.trim_start().len());
            results.push(Match::new(
                line,
                ItemPrice {
                    description: description.to_string(),
                    price: number.as_str().to_string(),
                    line: line.to_string(),
                },
                Span::new(start, start + line.len()),
            ));
        }

        results
    }
}

/// Build a string match from `text[start..end]` with surrounding whitespace removed.
fn trimmed(text: &str, start: usize, end: usize) -> Option<Match<String>> {
    let slice = &text[start..end];
    let value = slice.trim();
    if value.is_empty() {
        return None;
    }

    let lead = slice.len() - slice.trim_start().len();
    let start = start + lead;
    Some(Match::new(value, value.to_string(), Span::new(start, start + value.len())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    #[test]
    fn test_labeled_phone_is_stripped() {
        let phones = EntityExtractor::new().extract_phone_numbers("Call us: (123) 456-7890");

        assert!(!phones.is_empty());
        assert!(phones.iter().all(|p| p.value == "(123) 456-7890"));
        assert!(phones.iter().all(|p| !p.raw.contains("Call us")));
    }

    #[test]
    fn test_support_phone_span_points_at_number() {
        let text = "Support: 555.123.4567";
        let phones = EntityExtractor::new().extract_phone_numbers(text);
        let labeled = phones.last().unwrap();

        assert_eq!(labeled.value, "555.123.4567");
        assert_eq!(&text[labeled.span.start..labeled.span.end], "555.123.4567");
    }

    #[test]
    fn test_addresses_and_emails() {
        let text = "Ship to: 42 Main Street, Springfield, IL 62704\nP.O. Box 991\nbilling@acme.io";
        let extractor = EntityExtractor::new();

        let addresses: Vec<String> = extractor
            .extract_addresses(text)
            .into_iter()
            .map(|a| a.value)
            .collect();
        assert_eq!(
            addresses,
            ["42 Main Street, Springfield, IL 62704", "P.O. Box 991"]
        );

        let emails = extractor.extract_emails(text);
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0].raw, "billing@acme.io");
    }

    #[test]
    fn test_items_use_first_number_as_price() {
        let text = "Widget deluxe 3.50\n42\nno digits here\nConsulting hours 1,200.00 total";
        let items = EntityExtractor::new().extract_items(text);

        let pairs: Vec<(&str, &str)> = items
            .iter()
            .map(|m| (m.value.description.as_str(), m.value.price.as_str()))
            .collect();
        assert_eq!(
            pairs,
            [("Widget deluxe", "3.50"), ("Consulting hours", "1,200.00")]
        );
        assert_eq!(items[1].span.start, text.find("Consulting").unwrap());
    }

    #[test]
    fn test_item_length_counts_characters() {
        // "€123" is four characters but six bytes.
        let items = EntityExtractor::new().extract_items("€123\n£9.50");

        let pairs: Vec<(&str, &str)> = items
            .iter()
            .map(|m| (m.value.description.as_str(), m.value.price.as_str()))
            .collect();
        assert_eq!(pairs, [("£", "9.50")]);
        assert_eq!(items[0].span.start, "€123\n".len());
    }

    #[test]
    fn test_invoice_numbers_keep_family_order() {
        let numbers = EntityExtractor::new().extract_invoice_numbers("Invoice #12345");
        let raw: Vec<&str> = numbers.iter().map(|n| n.raw.as_str()).collect();
        assert_eq!(raw, ["Invoice #12345", "Invoice #12345"]);
    }

    #[test]
    fn test_extract_groups_every_kind() {
        let text = "Invoice Date: 01/15/2023\nSubtotal: $100.00\nTax: $8.50\nTotal: $108.50";
        let entities = EntityExtractor::new().extract(text);

        assert_eq!(entities.dates.len(), 1);
        let amounts: Vec<Decimal> = entities.amounts.iter().map(|a| a.value.amount).collect();
        assert_eq!(
            amounts,
            [Decimal::new(10000, 2), Decimal::new(850, 2), Decimal::new(10850, 2)]
        );
        assert!(entities.emails.is_empty());
    }

    #[test]
    fn test_empty_text_yields_no_entities() {
        assert!(EntityExtractor::new().extract("").is_empty());
        assert!(EntityExtractor::new().extract("   \n\n").is_empty());
    }
}
