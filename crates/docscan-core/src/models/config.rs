//! Configuration structures for the scanning pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{DocscanError, Result};
use crate::preprocessing::NormalizeOptions;

/// Main configuration for the docscan pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DocscanConfig {
    /// OCR configuration.
    pub ocr: OcrConfig,

    /// Image normalization applied before OCR.
    pub preprocessing: NormalizeOptions,

    /// Text extraction configuration.
    pub extraction: ExtractionConfig,

    /// Remote extraction oracle configuration.
    pub oracle: OracleConfig,
}

/// Which OCR engine to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrBackendKind {
    /// External `tesseract` executable.
    #[default]
    Tesseract,
    /// In-process `pure-onnx-ocr` engine (requires the `native` feature).
    Native,
}

/// OCR engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Engine selection.
    pub backend: OcrBackendKind,

    /// Path or name of the tesseract executable.
    pub tesseract_cmd: String,

    /// Tesseract language pack(s), e.g. "eng" or "eng+deu".
    pub language: String,

    /// Tesseract page segmentation mode.
    pub psm: u8,

    /// Directory with det.onnx / latin_rec.onnx / latin_dict.txt for the native engine.
    pub model_dir: PathBuf,

    /// Tokens below this confidence (0-100) are ignored when rebuilding lines.
    pub min_token_confidence: f32,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            backend: OcrBackendKind::Tesseract,
            tesseract_cmd: "tesseract".to_string(),
            language: "eng".to_string(),
            psm: 3,
            model_dir: PathBuf::from("models"),
            min_token_confidence: 0.0,
        }
    }
}

/// Extraction strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Flat regex entities only.
    Regex,
    /// Zone-based structure (metadata, table, summary) plus entities.
    #[default]
    Zone,
    /// Remote oracle with the zone parser as fallback.
    Oracle,
}

/// Text extraction configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Strategy used by `process` and `batch`.
    pub strategy: Strategy,
}

/// Default instructions sent to the oracle ahead of the document text.
pub const DEFAULT_ORACLE_INSTRUCTIONS: &str = "Extract the invoice in the document below. \
Answer with a single JSON object with keys \"invoice_data\" (invoice_number, date, due_date, customer), \
\"table_data\" (array of rows keyed by Date, Description, Quantity, Rate, Amount) and \
\"summary_data\" (array of {label, amount}). Use strings for all values.";

/// Remote extraction oracle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Chat-completions endpoint URL.
    pub endpoint: String,

    /// Model identifier sent with each request.
    pub model: String,

    /// Name of the environment variable holding the API key.
    pub api_key_env: String,

    /// Hard limit for the single remote call, in seconds.
    pub timeout_secs: u64,

    /// Instructions prepended to the document text.
    pub instructions: String,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "DOCSCAN_ORACLE_API_KEY".to_string(),
            timeout_secs: 30,
            instructions: DEFAULT_ORACLE_INSTRUCTIONS.to_string(),
        }
    }
}

impl OracleConfig {
    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

impl DocscanConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| DocscanError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| DocscanError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
