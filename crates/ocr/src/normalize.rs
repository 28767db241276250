use idscan_core::{AnnotatedItem, AnnotatedPage, Quadrant, TextDetection};
use thiserror::Error;

use crate::recognizer::OcrOutput;

/// Detections that cannot be placed on the page.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("Malformed detections: {texts} texts but {polygons} polygons")]
    CountMismatch { texts: usize, polygons: usize },
    #[error("Malformed detections: polygon {index} has no points")]
    EmptyPolygon { index: usize },
}

impl OcrOutput {
    /// Pair each recognized text with its polygon.
    pub fn detections(&self) -> Result<Vec<TextDetection>, NormalizeError> {
        if self.rec_texts.len() != self.dt_polys.len() {
            return Err(NormalizeError::CountMismatch {
                texts: self.rec_texts.len(),
                polygons: self.dt_polys.len(),
            });
        }
        Ok(self
            .rec_texts
            .iter()
            .zip(&self.dt_polys)
            .map(|(text, poly)| TextDetection::new(text.clone(), poly.clone()))
            .collect())
    }
}

/// Place detections on a `width` × `height` page: centroid, quadrant, and
/// reading order (ascending `y`, then `x`; stable for ties).
pub fn annotate(
    width: u32,
    height: u32,
    detections: &[TextDetection],
) -> Result<AnnotatedPage, NormalizeError> {
    // Whole-pixel midlines; on odd sizes they round down.
    let cx = (width / 2) as f64;
    let cy = (height / 2) as f64;

    let mut items = detections
        .iter()
        .enumerate()
        .map(|(index, d)| {
            let c = d.centroid().ok_or(NormalizeError::EmptyPolygon { index })?;
            Ok(AnnotatedItem {
                text: d.text.trim().to_uppercase(),
                x: c.x(),
                y: c.y(),
                quadrant: Quadrant::classify(c.x(), c.y(), cx, cy),
            })
        })
        .collect::<Result<Vec<_>, NormalizeError>>()?;

    sort_reading_order(&mut items);

    Ok(AnnotatedPage { width, height, items })
}

pub fn sort_reading_order(items: &mut [AnnotatedItem]) {
    items.sort_by(|a, b| a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x)));
}
