//! Core library for document OCR.
//!
//! This crate provides:
//! - Image normalization before OCR (grayscale, resize, denoise, deskew, threshold)
//! - OCR backends (external tesseract, optional in-process engine)
//! - Text structuring into invoice metadata, a line-item table and a summary
//! - Loose entity extraction (dates, amounts, addresses, phones, emails, items)
//! - An optional remote extraction oracle with local fallback

pub mod error;
pub mod extract;
pub mod models;
pub mod ocr;
pub mod preprocessing;

pub use error::{DocscanError, OcrError, OracleError, Result};
pub use extract::{
    parse, parse_tokens, DocumentParser, DocumentStructureExtractor, EntityExtractor,
    HttpOracleClient, OracleClient, RegexEntityParser, RemoteOracleParser,
};
pub use models::config::{DocscanConfig, Strategy};
pub use models::document::{
    Column, Currency, Entities, InvoiceMetadata, ItemPrice, Match, Money, ParseResult,
    ParseSource, RawDocument, Span, SummaryLine, TableRow, TableSchema,
};
pub use ocr::{create_backend, recognize_file, OcrBackend, OcrOutput, OcrToken, TesseractBackend};
#[cfg(feature = "native")]
pub use ocr::PureOcrEngine;
pub use preprocessing::{ImageNormalizer, NormalizeOptions, StandardNormalizer, ThresholdMethod};
