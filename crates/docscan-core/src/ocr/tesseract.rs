//! OCR through the external `tesseract` executable.

use std::io::ErrorKind;
use std::process::Command;
use std::time::Instant;

use image::{DynamicImage, GenericImageView, ImageFormat};
use tracing::{debug, info};

use super::{reconstruct_lines, OcrBackend, OcrOutput, OcrToken};
use crate::error::OcrError;
use crate::models::config::OcrConfig;

/// TSV `level` of word rows.
const WORD_LEVEL: &str = "5";

/// Runs `tesseract <image> stdout -l <lang> --psm <n> tsv` on a temporary PNG.
#[derive(Debug, Clone)]
pub struct TesseractBackend {
    command: String,
    language: String,
    psm: u8,
}

impl TesseractBackend {
    /// Create a backend using `tesseract` from `PATH` with English.
    pub fn new() -> Self {
        Self::from_config(&OcrConfig::default())
    }

    pub fn from_config(config: &OcrConfig) -> Self {
        Self {
            command: config.tesseract_cmd.clone(),
            language: config.language.clone(),
            psm: config.psm,
        }
    }

    /// Check whether the executable can be started.
    pub fn is_available(&self) -> bool {
        Command::new(&self.command)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn run_tsv(&self, image: &DynamicImage) -> Result<String, OcrError> {
        let input = tempfile::Builder::new()
            .prefix("docscan-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| OcrError::Recognition(format!("failed to create temp file: {}", e)))?;

        image
            .save_with_format(input.path(), ImageFormat::Png)
            .map_err(|e| OcrError::InvalidImage(format!("failed to write temp image: {}", e)))?;

        let output = Command::new(&self.command)
            .arg(input.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .arg("--psm")
            .arg(self.psm.to_string())
            .arg("tsv")
            .output()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => OcrError::Unavailable(format!(
                    "'{}' not found (is tesseract installed?)",
                    self.command
                )),
                _ => OcrError::Recognition(format!("failed to run '{}': {}", self.command, e)),
            })?;

        if !output.status.success() {
            return Err(OcrError::Recognition(format!(
                "tesseract exited with code {}: {}",
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for TesseractBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl OcrBackend for TesseractBackend {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn recognize(&self, image: &DynamicImage) -> Result<OcrOutput, OcrError> {
        let start = Instant::now();
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(OcrError::InvalidImage(format!("empty image {}x{}", width, height)));
        }

        info!("Running tesseract on {}x{} image", width, height);

        let tokens = parse_tsv(&self.run_tsv(image)?)?;
        let text = reconstruct_lines(&tokens, 0.0).join("\n");
        let processing_time_ms = start.elapsed().as_millis() as u64;

        info!(
            "OCR complete: {} tokens in {}ms",
            tokens.len(),
            processing_time_ms
        );

        Ok(OcrOutput {
            text,
            tokens: Some(tokens),
            processing_time_ms,
        })
    }
}

/// Parse tesseract TSV output into word tokens.
///
/// Line indices are assigned by counting distinct (block, paragraph, line)
/// triples in output order. Non-word rows are skipped.
pub fn parse_tsv(tsv: &str) -> Result<Vec<OcrToken>, OcrError> {
    let mut rows = tsv.lines();

    match rows.next() {
        Some(header) if header.starts_with("level") => {}
        Some(other) => {
            return Err(OcrError::MalformedOutput(format!(
                "unexpected TSV header: '{}'",
                other
            )))
        }
        None => return Ok(Vec::new()),
    }

    let mut tokens = Vec::new();
    let mut current_line: Option<(&str, &str, &str)> = None;
    let mut line_index = 0usize;

    for (row_number, row) in rows.enumerate() {
        let fields: Vec<&str> = row.split('\t').collect();
        if fields.len() < 11 {
            debug!("Skipping short TSV row {}: '{}'", row_number + 2, row);
            continue;
        }
        if fields[0] != WORD_LEVEL {
            continue;
        }

        let key = (fields[2], fields[3], fields[4]);
        match current_line {
            Some(previous) if previous == key => {}
            Some(_) => {
                line_index += 1;
                current_line = Some(key);
            }
            None => current_line = Some(key),
        }

        let number = |idx: usize| -> Result<u32, OcrError> {
            fields[idx].trim().parse().map_err(|_| {
                OcrError::MalformedOutput(format!(
                    "bad value '{}' in TSV row {}",
                    fields[idx],
                    row_number + 2
                ))
            })
        };

        tokens.push(OcrToken {
            text: fields.get(11).map_or("", |t| t.trim()).to_string(),
            x: number(6)?,
            y: number(7)?,
            width: number(8)?,
            height: number(9)?,
            confidence: fields[10].trim().parse().unwrap_or(-1.0),
            line_index,
        });
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TSV: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
1\t1\t0\t0\t0\t0\t0\t0\t800\t600\t-1\t
4\t1\t1\t1\t1\t0\t10\t10\t300\t14\t-1\t
5\t1\t1\t1\t1\t1\t10\t10\t60\t14\t96.2\tInvoice
5\t1\t1\t1\t1\t2\t80\t10\t40\t14\t91\t#2041
5\t1\t1\t1\t2\t1\t10\t30\t40\t14\t95\tTo
5\t1\t2\t1\t1\t1\t10\t80\t50\t14\t89.5\tDate
";

    #[test]
    fn test_parse_tsv_words_and_lines() {
        let tokens = parse_tsv(TSV).unwrap();

        let summary: Vec<(&str, usize)> = tokens
            .iter()
            .map(|t| (t.text.as_str(), t.line_index))
            .collect();
        assert_eq!(
            summary,
            [("Invoice", 0), ("#2041", 0), ("To", 1), ("Date", 2)]
        );
        assert_eq!(tokens[0].width, 60);
        assert_eq!(tokens[3].confidence, 89.5);
    }

    #[test]
    fn test_tsv_lines_rebuild_with_paragraph_break() {
        let tokens = parse_tsv(TSV).unwrap();
        assert_eq!(
            reconstruct_lines(&tokens, 0.0),
            ["Invoice #2041", "To", "", "Date"]
        );
    }

    #[test]
    fn test_parse_tsv_rejects_plain_text() {
        assert!(matches!(
            parse_tsv("Invoice 2041\n"),
            Err(OcrError::MalformedOutput(_))
        ));
        assert!(parse_tsv("").unwrap().is_empty());
    }

    #[test]
    fn test_missing_executable_is_unavailable() {
        let config = OcrConfig {
            tesseract_cmd: "/nonexistent/tesseract".to_string(),
            ..OcrConfig::default()
        };
        let backend = TesseractBackend::from_config(&config);
        assert!(!backend.is_available());

        let image = DynamicImage::new_luma8(8, 8);
        assert!(matches!(
            backend.recognize(&image),
            Err(OcrError::Unavailable(_))
        ));
    }
}
