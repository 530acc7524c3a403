//! In-process OCR backed by `pure-onnx-ocr` (no external executable).

use std::path::Path;
use std::time::Instant;

use image::{DynamicImage, GenericImageView};
use tracing::{debug, info};

use super::{reconstruct_lines, OcrBackend, OcrOutput, OcrToken};
use crate::error::OcrError;

pub struct PureOcrEngine {
    engine: pure_onnx_ocr::engine::OcrEngine,
}

impl PureOcrEngine {
    /// Load `det.onnx`, `latin_rec.onnx` and `latin_dict.txt` from `model_dir`.
    pub fn from_dir(model_dir: &Path) -> Result<Self, OcrError> {
        let engine = pure_onnx_ocr::engine::OcrEngineBuilder::new()
            .det_model_path(&model_dir.join("det.onnx"))
            .rec_model_path(&model_dir.join("latin_rec.onnx"))
            .dictionary_path(&model_dir.join("latin_dict.txt"))
            .build()
            .map_err(|e| OcrError::Unavailable(format!("pure-onnx-ocr: {}", e)))?;

        info!("Loaded pure-onnx-ocr engine from {}", model_dir.display());
        Ok(Self { engine })
    }
}

impl OcrBackend for PureOcrEngine {
    fn name(&self) -> &'static str {
        "native"
    }

    fn recognize(&self, image: &DynamicImage) -> Result<OcrOutput, OcrError> {
        let start = Instant::now();
        let (width, height) = image.dimensions();
        info!("Processing image: {}x{}", width, height);

        let regions = self
            .engine
            .run_from_image(image)
            .map_err(|e| OcrError::Recognition(format!("pure-onnx-ocr: {}", e)))?;
        debug!("pure-onnx-ocr returned {} text regions", regions.len());

        let boxes: Vec<(String, [u32; 4], f32)> = regions
            .iter()
            .map(|r| {
                (
                    r.text.replace("[UNK]", " ").trim().to_string(),
                    polygon_rect(&r.bounding_box),
                    r.confidence * 100.0,
                )
            })
            .collect();

        let tokens = assign_lines(boxes);
        let text = reconstruct_lines(&tokens, 0.0).join("\n");
        let processing_time_ms = start.elapsed().as_millis() as u64;

        info!(
            "OCR complete: {} regions in {}ms",
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

/// Axis-aligned `[x, y, width, height]` of a detection polygon.
fn polygon_rect(polygon: &pure_onnx_ocr::Polygon<f64>) -> [u32; 4] {
    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (0.0f64, 0.0f64);

    for coord in polygon.exterior().coords() {
        min_x = min_x.min(coord.x);
        min_y = min_y.min(coord.y);
        max_x = max_x.max(coord.x);
        max_y = max_y.max(coord.y);
    }

    if !min_x.is_finite() {
        return [0; 4];
    }

    let x = min_x.max(0.0) as u32;
    let y = min_y.max(0.0) as u32;
    [x, y, (max_x as u32).saturating_sub(x), (max_y as u32).saturating_sub(y)]
}

/// Group detected boxes into lines by vertical band.
///
/// A box joins the current line when its vertical center lies within the
/// line's first box; otherwise it starts a new line.
fn assign_lines(mut boxes: Vec<(String, [u32; 4], f32)>) -> Vec<OcrToken> {
    boxes.sort_by_key(|(_, rect, _)| (rect[1] + rect[3] / 2, rect[0]));

    let mut tokens = Vec::with_capacity(boxes.len());
    let mut band: Option<(u32, u32)> = None;
    let mut line_index = 0usize;

    for (text, [x, y, width, height], confidence) in boxes {
        let center = y + height / 2;
        match band {
            Some((top, bottom)) if center >= top && center <= bottom => {}
            Some(_) => {
                line_index += 1;
                band = Some((y, y + height));
            }
            None => band = Some((y, y + height)),
        }

        tokens.push(OcrToken {
            text,
            x,
            y,
            width,
            height,
            confidence,
            line_index,
        });
    }

    tokens
}
