//! Shared document pipeline: input loading, normalization, OCR and parsing.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use tracing::{debug, info, warn};

use docscan_core::models::config::{DocscanConfig, Strategy};
use docscan_core::{
    create_backend, recognize_file, DocumentParser, DocumentStructureExtractor, HttpOracleClient,
    OcrBackend, ParseResult, RawDocument, RegexEntityParser, RemoteOracleParser,
    StandardNormalizer,
};

/// File extensions routed through OCR.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff", "bmp", "webp"];

/// File extensions parsed as already recognized text.
pub const TEXT_EXTENSIONS: &[&str] = &["txt"];

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Whether the pipeline accepts this file.
pub fn is_supported(path: &Path) -> bool {
    let ext = extension(path);
    IMAGE_EXTENSIONS.contains(&ext.as_str()) || TEXT_EXTENSIONS.contains(&ext.as_str())
}

type OracleParser = RemoteOracleParser<HttpOracleClient, DocumentStructureExtractor>;

/// Normalizer, OCR backend and parser configured once and reused per file.
pub struct Pipeline {
    config: DocscanConfig,
    normalizer: StandardNormalizer,
    backend: Option<Box<dyn OcrBackend>>,
    oracle: Option<OracleParser>,
}

impl Pipeline {
    pub fn new(config: DocscanConfig) -> Self {
        let oracle = match config.extraction.strategy {
            Strategy::Oracle => match HttpOracleClient::from_config(&config.oracle) {
                Ok(client) => Some(
                    RemoteOracleParser::new(client, DocumentStructureExtractor::new())
                        .with_timeout(Duration::from_secs(config.oracle.timeout_secs))
                        .with_instructions(config.oracle.instructions.clone()),
                ),
                Err(e) => {
                    warn!("Oracle unavailable ({}), using zone extraction", e);
                    None
                }
            },
            _ => None,
        };

        Self {
            config,
            normalizer: StandardNormalizer::new(),
            backend: None,
            oracle,
        }
    }

    /// Read a file into line-split text, running OCR for images.
    pub fn load_document(&mut self, path: &Path) -> anyhow::Result<RawDocument> {
        let ext = extension(path);

        if TEXT_EXTENSIONS.contains(&ext.as_str()) {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            return Ok(RawDocument::from_text(&text));
        }

        if !IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            anyhow::bail!("Unsupported file format: {}", ext);
        }

        self.init_backend()?;
        let backend = self
            .backend
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("OCR backend not initialized"))?;
        let output = recognize_file(backend, &self.normalizer, &self.config.preprocessing, path)
            .with_context(|| format!("Failed to recognize {}", path.display()))?;
        info!(
            "{} recognized {} chars in {}ms",
            backend.name(),
            output.text.len(),
            output.processing_time_ms
        );

        let document = output.to_document(self.config.ocr.min_token_confidence);
        if document.is_blank() {
            anyhow::bail!("No text detected in image");
        }

        Ok(document)
    }

    /// Structure a document with the configured strategy.
    pub async fn extract(&self, document: &RawDocument) -> ParseResult {
        match (self.config.extraction.strategy, &self.oracle) {
            (Strategy::Regex, _) => RegexEntityParser::new().parse(document.text()),
            (Strategy::Oracle, Some(oracle)) => oracle.parse(document.text()).await,
            (Strategy::Oracle, None) | (Strategy::Zone, _) => {
                DocumentStructureExtractor::new().parse_document(document)
            }
        }
    }

    fn init_backend(&mut self) -> anyhow::Result<()> {
        if self.backend.is_none() {
            let backend = create_backend(&self.config.ocr)?;
            debug!("Created {} OCR backend", backend.name());
            self.backend = Some(backend);
        }
        Ok(())
    }
}
