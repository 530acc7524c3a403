//! OCR backends and token-stream line reconstruction.

mod tesseract;

#[cfg(feature = "native")]
mod pure_engine;

pub use tesseract::{parse_tsv, TesseractBackend};

#[cfg(feature = "native")]
pub use pure_engine::PureOcrEngine;

use std::collections::BTreeMap;
use std::path::Path;

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::OcrError;
use crate::models::config::{OcrBackendKind, OcrConfig};
use crate::models::document::RawDocument;
use crate::preprocessing::{ImageNormalizer, NormalizeOptions};

/// A recognized word with its position on the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrToken {
    pub text: String,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Recognition confidence, 0-100. Tesseract reports -1 for non-word rows.
    pub confidence: f32,
    /// Line the token belongs to, in reading order.
    pub line_index: usize,
}

impl OcrToken {
    fn bottom(&self) -> u32 {
        self.y + self.height
    }
}

/// Result of OCR on one image.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcrOutput {
    /// Plain recognized text.
    pub text: String,

    /// Word tokens, when the backend reports positions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<Vec<OcrToken>>,

    /// Processing time in milliseconds.
    pub processing_time_ms: u64,
}

impl OcrOutput {
    /// Line-split document, rebuilt from tokens when available.
    pub fn to_document(&self, min_confidence: f32) -> RawDocument {
        match &self.tokens {
            Some(tokens) if !tokens.is_empty() => RawDocument::from_tokens(tokens, min_confidence),
            _ => RawDocument::from_text(&self.text),
        }
    }
}

/// An OCR engine: image in, text (and optionally tokens) out.
pub trait OcrBackend: Send + Sync {
    /// Short engine name used in logs.
    fn name(&self) -> &'static str;

    /// Recognize text in an already normalized image.
    fn recognize(&self, image: &DynamicImage) -> Result<OcrOutput, OcrError>;
}

/// Create the backend selected in `config`.
pub fn create_backend(config: &OcrConfig) -> Result<Box<dyn OcrBackend>, OcrError> {
    match config.backend {
        OcrBackendKind::Tesseract => Ok(Box::new(TesseractBackend::from_config(config))),
        #[cfg(feature = "native")]
        OcrBackendKind::Native => Ok(Box::new(PureOcrEngine::from_dir(&config.model_dir)?)),
        #[cfg(not(feature = "native"))]
        OcrBackendKind::Native => Err(OcrError::Unavailable(
            "native OCR engine requires the `native` feature".to_string(),
        )),
    }
}

/// Decode an image file, normalize it and run OCR on the result.
pub fn recognize_file(
    backend: &dyn OcrBackend,
    normalizer: &dyn ImageNormalizer,
    options: &NormalizeOptions,
    path: &Path,
) -> crate::Result<OcrOutput> {
    let image = image::open(path)?;
    let normalized = normalizer.normalize(&image, options)?;
    debug!(
        "Normalized {}x{} to {}x{}",
        image.width(),
        image.height(),
        normalized.width(),
        normalized.height()
    );

    Ok(backend.recognize(&normalized)?)
}

/// Rebuild text lines from a token stream.
///
/// Tokens with empty text or confidence below `min_confidence` (and always
/// those below zero) are dropped. Tokens are grouped by `line_index`, words
/// within a line ordered by `x` and joined with single spaces. A blank line
/// is inserted where the vertical gap to the previous line exceeds that
/// line's height.
pub fn reconstruct_lines(tokens: &[OcrToken], min_confidence: f32) -> Vec<String> {
    let mut grouped: BTreeMap<usize, Vec<&OcrToken>> = BTreeMap::new();

    for token in tokens {
        if token.text.trim().is_empty() || token.confidence < 0.0 || token.confidence < min_confidence {
            continue;
        }
        grouped.entry(token.line_index).or_default().push(token);
    }

    let mut lines = Vec::with_capacity(grouped.len());
    let mut previous: Option<(u32, u32)> = None;

    for (line_index, mut words) in grouped {
        words.sort_by_key(|token| token.x);

        let top = words.iter().map(|t| t.y).min().unwrap_or(0);
        let bottom = words.iter().map(|t| t.bottom()).max().unwrap_or(top);

        if let Some((prev_top, prev_bottom)) = previous {
            if top.saturating_sub(prev_bottom) > prev_bottom - prev_top {
                debug!("Paragraph break before line {}", line_index);
                lines.push(String::new());
            }
        }

        lines.push(
            words
                .iter()
                .map(|token| token.text.trim())
                .collect::<Vec<_>>()
                .join(" "),
        );
        previous = Some((top, bottom));
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DocscanError;
    use crate::preprocessing::StandardNormalizer;
    use pretty_assertions::assert_eq;

    fn token(text: &str, x: u32, y: u32, confidence: f32, line_index: usize) -> OcrToken {
        OcrToken {
            text: text.to_string(),
            x,
            y,
            width: 30,
            height: 10,
            confidence,
            line_index,
        }
    }

    /// Reports the size of the image it was given.
    struct SizeBackend;

    impl OcrBackend for SizeBackend {
        fn name(&self) -> &'static str {
            "size"
        }

        fn recognize(&self, image: &DynamicImage) -> Result<OcrOutput, OcrError> {
            if image.width() < 8 {
                return Err(OcrError::Recognition("image too small".to_string()));
            }
            Ok(OcrOutput {
                text: format!("{}x{}", image.width(), image.height()),
                ..Default::default()
            })
        }
    }

    #[test]
    fn test_recognize_file_normalizes_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.png");
        image::GrayImage::from_pixel(3600, 60, image::Luma([255u8])).save(&path).unwrap();

        let options = NormalizeOptions {
            max_width: 1800,
            ..Default::default()
        };
        let output = recognize_file(&SizeBackend, &StandardNormalizer::new(), &options, &path).unwrap();
        assert_eq!(output.text, "1800x30");
    }

    #[test]
    fn test_recognize_file_error_kinds() {
        let dir = tempfile::tempdir().unwrap();
        let normalizer = StandardNormalizer::new();
        let options = NormalizeOptions::default();

        let missing = recognize_file(&SizeBackend, &normalizer, &options, &dir.path().join("none.png"))
            .unwrap_err();
        assert!(matches!(missing, DocscanError::Image(_)), "got {missing:?}");

        let tiny = dir.path().join("tiny.png");
        image::GrayImage::new(4, 4).save(&tiny).unwrap();
        let failed = recognize_file(&SizeBackend, &normalizer, &options, &tiny).unwrap_err();
        assert!(matches!(failed, DocscanError::Ocr(OcrError::Recognition(_))), "got {failed:?}");
    }

    #[test]
    fn test_words_ordered_by_position() {
        let tokens = [
            token("Cleaning", 100, 0, 95.0, 0),
            token("$30", 200, 0, 95.0, 0),
            token("12-08-29", 0, 1, 95.0, 0),
        ];
        assert_eq!(reconstruct_lines(&tokens, 0.0), ["12-08-29 Cleaning $30"]);
    }

    #[test]
    fn test_low_confidence_and_empty_tokens_dropped() {
        let tokens = [
            token("To", 0, 0, 91.0, 0),
            token("", 40, 0, -1.0, 0),
            token("~", 60, 0, 12.0, 0),
            token("Jane", 0, 12, 88.0, 1),
        ];
        assert_eq!(reconstruct_lines(&tokens, 30.0), ["To", "Jane"]);
    }

    #[test]
    fn test_paragraph_gap_becomes_blank_line() {
        let tokens = [
            token("To", 0, 0, 90.0, 0),
            token("Jane", 0, 12, 90.0, 1),
            token("Date", 0, 60, 90.0, 2),
        ];
        assert_eq!(reconstruct_lines(&tokens, 0.0), ["To", "Jane", "", "Date"]);
    }

    #[test]
    fn test_output_prefers_tokens() {
        let output = OcrOutput {
            text: "garbled".to_string(),
            tokens: Some(vec![token("Invoice", 0, 0, 90.0, 0)]),
            processing_time_ms: 3,
        };
        assert_eq!(output.to_document(0.0).lines(), &["Invoice"]);

        let plain = OcrOutput {
            text: "a\nb".to_string(),
            ..Default::default()
        };
        assert_eq!(plain.to_document(0.0).lines(), &["a", "b"]);
    }
}
