pub mod config;
pub mod detection;
pub mod record;

pub use config::{ConfigError, ExtractionConfig, ExtractionSettings, LabelDictionary, Thresholds};
pub use detection::{AnnotatedItem, AnnotatedPage, Point, Quadrant, TextDetection};
pub use record::{path_key, BatchResult, ExtractionResult, JobReport, Outcome};
