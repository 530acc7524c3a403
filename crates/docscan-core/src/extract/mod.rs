//! Text structuring: turns recognized text into a [`ParseResult`].
//!
//! Three interchangeable strategies implement the same capability:
//! - [`RegexEntityParser`]: flat entity extraction only
//! - [`DocumentStructureExtractor`]: zone-based metadata, table and summary
//! - [`RemoteOracleParser`]: remote oracle with a local parser as fallback
//!
//! None of them fail: unparseable input degrades to partial or empty results.

pub mod amounts;
pub mod dates;
pub mod entities;
pub mod header;
pub mod oracle;
pub mod patterns;
pub mod structure;
pub mod summary;
pub mod table;

pub use entities::EntityExtractor;
pub use header::HeaderFieldMatcher;
pub use oracle::{salvage_json, HttpOracleClient, OracleClient, OracleRequest, RemoteOracleParser};
pub use structure::DocumentStructureExtractor;
pub use summary::SummaryParser;
pub use table::{RowParser, TableHeaderDetector};

use tracing::info;

use crate::models::document::{ParseResult, RawDocument};
use crate::ocr::OcrToken;

/// Trait for field extractors.
pub trait FieldExtractor {
    /// The type of value this extractor produces.
    type Output;

    /// Extract all occurrences of the field, in pattern order then text order.
    fn extract_all(&self, text: &str) -> Vec<Self::Output>;

    /// Extract the first occurrence of the field.
    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }
}

/// A local text-structuring strategy.
pub trait DocumentParser {
    /// Short strategy name used in logs.
    fn name(&self) -> &'static str;

    /// Parse recognized text. Never fails.
    fn parse(&self, text: &str) -> ParseResult;
}

/// Flat mode: loose entities only, no zones.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexEntityParser {
    entities: EntityExtractor,
}

impl RegexEntityParser {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentParser for RegexEntityParser {
    fn name(&self) -> &'static str {
        "regex"
    }

    fn parse(&self, text: &str) -> ParseResult {
        ParseResult {
            entities: self.entities.extract(text),
            ..ParseResult::empty()
        }
    }
}

/// Parse plain text with the zone-based strategy.
pub fn parse(text: &str) -> ParseResult {
    DocumentStructureExtractor::new().parse(text)
}

/// Parse an OCR token stream, rebuilding lines from token positions first.
pub fn parse_tokens(tokens: &[OcrToken], min_confidence: f32) -> ParseResult {
    let document = RawDocument::from_tokens(tokens, min_confidence);
    info!("Rebuilt {} lines from {} tokens", document.lines().len(), tokens.len());
    DocumentStructureExtractor::new().parse_document(&document)
}
