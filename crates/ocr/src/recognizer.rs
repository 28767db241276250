use idscan_core::Point;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::preprocess::LoadedImage;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Image decode error: {0}")]
    ImageDecode(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("No OCR output found for {path}: {source}")]
    SidecarMissing {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid OCR output in {path}: {source}")]
    SidecarInvalid {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Tesseract not available, build with the `tesseract` feature")]
    NotAvailable,
}

/// Raw engine output for one image. `rec_texts[i]` was read inside
/// `dt_polys[i]`; the two are expected to line up one-to-one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrOutput {
    #[serde(default)]
    pub input_path: Option<String>,
    pub rec_texts: Vec<String>,
    pub dt_polys: Vec<Vec<Point>>,
}

/// Abstraction over an OCR engine.
///
/// Engines carry heavy model state, so each worker owns one and drives it
/// through `&mut self`; instances are never shared between workers.
pub trait OcrBackend: Send {
    fn recognize(&mut self, image: &LoadedImage) -> Result<OcrOutput, OcrError>;
}

impl<B: OcrBackend + ?Sized> OcrBackend for Box<B> {
    fn recognize(&mut self, image: &LoadedImage) -> Result<OcrOutput, OcrError> {
        (**self).recognize(image)
    }
}

// ── Mock backend (always available, used for tests) ───────────────────────────

/// Returns a pre-set output for every image. Lets the pipeline run
/// without an OCR engine installed.
#[derive(Debug, Clone)]
pub struct MockRecognizer {
    pub output: OcrOutput,
}

impl MockRecognizer {
    pub fn new(output: OcrOutput) -> Self {
        Self { output }
    }

    /// Build from `(text, polygon)` pairs.
    pub fn from_detections<I, S>(detections: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<Point>)>,
        S: Into<String>,
    {
        let (rec_texts, dt_polys) = detections
            .into_iter()
            .map(|(text, poly)| (text.into(), poly))
            .unzip();
        Self::new(OcrOutput { input_path: None, rec_texts, dt_polys })
    }
}

impl OcrBackend for MockRecognizer {
    fn recognize(&mut self, image: &LoadedImage) -> Result<OcrOutput, OcrError> {
        Ok(OcrOutput {
            input_path: Some(image.path().display().to_string()),
            ..self.output.clone()
        })
    }
}

// ── Sidecar backend (detections produced by an external OCR run) ──────────────

/// Reads PaddleOCR-style `<stem>_res.json` files written next to the image or
/// into a dedicated directory.
#[derive(Debug, Clone, Default)]
pub struct SidecarRecognizer {
    dir: Option<PathBuf>,
}

impl SidecarRecognizer {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    pub fn sidecar_path(&self, image_path: &Path) -> PathBuf {
        let stem = image_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file_name = format!("{stem}_res.json");
        match &self.dir {
            Some(dir) => dir.join(file_name),
            None => image_path.with_file_name(file_name),
        }
    }
}

impl OcrBackend for SidecarRecognizer {
    fn recognize(&mut self, image: &LoadedImage) -> Result<OcrOutput, OcrError> {
        let path = self.sidecar_path(image.path());
        let data = std::fs::read(&path)
            .map_err(|source| OcrError::SidecarMissing { path: path.clone(), source })?;
        serde_json::from_slice(&data).map_err(|source| OcrError::SidecarInvalid { path, source })
    }
}

// ── Tesseract backend (optional, gated behind `tesseract` feature) ─────────────

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use super::{OcrBackend, OcrError, OcrOutput};
    use crate::preprocess::{self, LoadedImage};
    use idscan_core::Point;
    use leptess::{capi, LepTess};

    /// One detection per recognized text line. The engine is created once
    /// and reused for every image this worker sees.
    pub struct TesseractRecognizer {
        engine: LepTess,
    }

    impl TesseractRecognizer {
        pub fn new(data_path: Option<&str>, lang: &str) -> Result<Self, OcrError> {
            let engine =
                LepTess::new(data_path, lang).map_err(|e| OcrError::Engine(e.to_string()))?;
            Ok(Self { engine })
        }
    }

    impl OcrBackend for TesseractRecognizer {
        fn recognize(&mut self, image: &LoadedImage) -> Result<OcrOutput, OcrError> {
            let png = preprocess::prepare_for_ocr(image.image())
                .map_err(|e| OcrError::ImageDecode(e.to_string()))?;
            // prepare_for_ocr may shrink the page; map boxes back to source pixels.
            let scale = preprocess::ocr_scale(image.image());

            self.engine
                .set_image_from_mem(&png)
                .map_err(|e| OcrError::ImageDecode(e.to_string()))?;

            let mut output = OcrOutput {
                input_path: Some(image.path().display().to_string()),
                ..Default::default()
            };
            let Some(boxes) = self
                .engine
                .get_component_boxes(capi::TessPageIteratorLevel_RIL_TEXTLINE, true)
            else {
                return Ok(output);
            };

            for b in &boxes {
                self.engine.set_rectangle(&b);
                let text = self
                    .engine
                    .get_utf8_text()
                    .map_err(|e| OcrError::Engine(e.to_string()))?;
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                let g = b.get_geometry();
                let (x0, y0) = (g.x as f64 / scale, g.y as f64 / scale);
                let (x1, y1) = ((g.x + g.w) as f64 / scale, (g.y + g.h) as f64 / scale);
                output.rec_texts.push(text.to_string());
                output
                    .dt_polys
                    .push(vec![Point(x0, y0), Point(x1, y0), Point(x1, y1), Point(x0, y1)]);
            }
            Ok(output)
        }
    }
}
