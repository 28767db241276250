pub mod batch;
pub mod extract;
pub mod fuzzy;
pub mod normalize;
pub mod pipeline;
pub mod pool;
pub mod preprocess;
pub mod recognizer;

pub use batch::run_batch;
pub use extract::{FieldContext, FieldExtractor, Rule, RULES};
pub use fuzzy::{is_similar, partial_ratio, ratio};
pub use normalize::{annotate, sort_reading_order, NormalizeError};
pub use pipeline::{DocumentPipeline, PipelineError, ProcessedDocument};
pub use pool::{PoolConfig, PoolError, WorkerPool};
pub use preprocess::{load_image, prepare_for_ocr, LoadedImage, PreprocessError};
pub use recognizer::{MockRecognizer, OcrBackend, OcrError, OcrOutput, SidecarRecognizer};

#[cfg(feature = "tesseract")]
pub use recognizer::tesseract_backend::TesseractRecognizer;
