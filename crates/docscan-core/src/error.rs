//! Error types for the docscan-core library.
//!
//! Text parsing itself never fails: it degrades to partial results. These
//! errors cover the collaborators around it (OCR, image normalization, the
//! remote extraction oracle) and configuration I/O.

use thiserror::Error;

/// Main error type for the docscan library.
#[derive(Error, Debug)]
pub enum DocscanError {
    /// OCR or image normalization error.
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    /// Remote extraction oracle error.
    #[error("oracle error: {0}")]
    Oracle(#[from] OracleError),

    /// Image decoding error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors related to OCR processing and image normalization.
#[derive(Error, Debug)]
pub enum OcrError {
    /// The OCR engine could not be started or its models could not be loaded.
    #[error("OCR engine unavailable: {0}")]
    Unavailable(String),

    /// Text recognition failed.
    #[error("text recognition failed: {0}")]
    Recognition(String),

    /// The engine produced output that could not be read.
    #[error("malformed OCR output: {0}")]
    MalformedOutput(String),

    /// Image preprocessing failed.
    #[error("preprocessing failed: {0}")]
    Preprocessing(String),

    /// Invalid image format or dimensions.
    #[error("invalid image: {0}")]
    InvalidImage(String),
}

/// Errors from the remote extraction oracle.
///
/// None of these escape a parse call: the oracle-backed parser turns every
/// one of them into a warning and returns the local result instead.
#[derive(Error, Debug)]
pub enum OracleError {
    /// The oracle is not configured (missing endpoint or API key).
    #[error("oracle not configured: {0}")]
    NotConfigured(String),

    /// Network or protocol failure.
    #[error("request failed: {0}")]
    Transport(String),

    /// The oracle answered with a non-success status.
    #[error("oracle returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The call did not complete within the configured timeout.
    #[error("oracle call timed out after {0}ms")]
    Timeout(u64),

    /// The caller cancelled the request.
    #[error("oracle call cancelled")]
    Cancelled,

    /// No usable JSON object could be recovered from the response.
    #[error("unusable oracle payload: {0}")]
    Payload(String),
}

/// Result type for the docscan library.
pub type Result<T> = std::result::Result<T, DocscanError>;
