use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use idscan_core::{ExtractionResult, JobReport, Outcome, TextDetection};
use thiserror::Error;

use crate::extract::FieldExtractor;
use crate::normalize::{self, NormalizeError};
use crate::preprocess::{self, PreprocessError};
use crate::recognizer::{OcrBackend, OcrError};

/// Everything that can go wrong with a single image. None of these are fatal
/// to the batch.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Image load failed: {0}")]
    ImageLoad(#[from] PreprocessError),
    #[error("OCR recognition failed: {0}")]
    Ocr(#[from] OcrError),
    #[error("{0}")]
    MalformedDetection(#[from] NormalizeError),
    #[error("Processing panicked: {0}")]
    Panicked(String),
}

/// The result of processing one image.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedDocument {
    pub detections: Vec<TextDetection>,
    pub fields: ExtractionResult,
}

impl ProcessedDocument {
    pub fn raw_texts(&self) -> Vec<String> {
        self.detections.iter().map(|d| d.text.clone()).collect()
    }
}

impl From<ProcessedDocument> for Outcome {
    fn from(doc: ProcessedDocument) -> Self {
        let raw_texts = doc.raw_texts();
        Outcome::Success {
            raw_result: doc.detections,
            processed_fields: doc.fields,
            raw_texts,
        }
    }
}

/// Orchestrates: load → OCR → normalize → extract.
pub struct DocumentPipeline<R: OcrBackend> {
    recognizer: R,
    extractor: FieldExtractor,
}

impl<R: OcrBackend> DocumentPipeline<R> {
    pub fn new(recognizer: R, extractor: FieldExtractor) -> Self {
        Self { recognizer, extractor }
    }

    pub fn process_file(&mut self, path: &Path) -> Result<ProcessedDocument, PipelineError> {
        let image = preprocess::load_image(path)?;
        let output = self.recognizer.recognize(&image)?;
        let detections = output.detections()?;
        let page = normalize::annotate(image.width(), image.height(), &detections)?;
        let fields = self.extractor.extract(&page);
        Ok(ProcessedDocument { detections, fields })
    }

    /// Process one job to a terminal outcome. Errors and panics are folded
    /// into `Outcome::Failure`; this never propagates either.
    pub fn process_job(&mut self, path: &Path) -> JobReport {
        let result = catch_unwind(AssertUnwindSafe(|| self.process_file(path)))
            .unwrap_or_else(|payload| Err(PipelineError::Panicked(panic_message(&*payload))));

        let outcome = match result {
            Ok(doc) => doc.into(),
            Err(e) => {
                tracing::warn!("Failed to process {}: {e}", path.display());
                Outcome::failure(e.to_string())
            }
        };
        JobReport::new(path, outcome)
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
