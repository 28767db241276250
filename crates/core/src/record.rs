use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::detection::TextDetection;

/// The structured fields read off one card. Every field is independently
/// optional; serialization always emits all eight keys (`null` when absent).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub date_of_birth: Option<String>,
    pub registration_date: Option<String>,
    pub card_number: Option<String>,
    pub sex: Option<String>,
    pub district_name: Option<String>,
    pub village_name: Option<String>,
    pub chief_name: Option<String>,
    pub first_name: Option<String>,
}

impl ExtractionResult {
    /// `(key, value)` pairs in artifact key order.
    pub fn fields(&self) -> [(&'static str, Option<&str>); 8] {
        [
            ("date_of_birth", self.date_of_birth.as_deref()),
            ("registration_date", self.registration_date.as_deref()),
            ("card_number", self.card_number.as_deref()),
            ("sex", self.sex.as_deref()),
            ("district_name", self.district_name.as_deref()),
            ("village_name", self.village_name.as_deref()),
            ("chief_name", self.chief_name.as_deref()),
            ("first_name", self.first_name.as_deref()),
        ]
    }

    pub fn found_count(&self) -> usize {
        self.fields().iter().filter(|(_, v)| v.is_some()).count()
    }
}

/// Terminal state of one job.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success {
        raw_result: Vec<TextDetection>,
        processed_fields: ExtractionResult,
        raw_texts: Vec<String>,
    },
    Failure {
        error: String,
    },
}

impl Outcome {
    pub fn failure(error: impl Into<String>) -> Self {
        Outcome::Failure { error: error.into() }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn fields(&self) -> Option<&ExtractionResult> {
        match self {
            Outcome::Success { processed_fields, .. } => Some(processed_fields),
            Outcome::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Outcome::Success { .. } => None,
            Outcome::Failure { error } => Some(error),
        }
    }
}

/// What a worker hands back for one job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobReport {
    pub path: PathBuf,
    pub outcome: Outcome,
}

impl JobReport {
    pub fn new(path: impl Into<PathBuf>, outcome: Outcome) -> Self {
        Self { path: path.into(), outcome }
    }
}

/// Key under which a path is stored in the batch mapping.
pub fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Image path → outcome for a whole run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResult {
    entries: BTreeMap<String, Outcome>,
}

impl BatchResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a report, replacing any earlier outcome for the same path.
    pub fn record(&mut self, report: JobReport) -> Option<Outcome> {
        self.entries.insert(path_key(&report.path), report.outcome)
    }

    pub fn get(&self, path: &str) -> Option<&Outcome> {
        self.entries.get(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn success_count(&self) -> usize {
        self.entries.values().filter(|o| o.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.len() - self.success_count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Outcome)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

// ── Artifact shape ────────────────────────────────────────────────────────────
//
// Each value in the persisted mapping repeats its own path and carries a
// `success` flag; successes hold the three payload keys, failures hold `error`.

#[derive(Serialize)]
struct OutcomeRecordRef<'a> {
    path: &'a str,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw_result: Option<&'a [TextDetection]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    processed_fields: Option<&'a ExtractionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw_texts: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

#[derive(Deserialize)]
struct OutcomeRecord {
    success: bool,
    #[serde(default)]
    raw_result: Vec<TextDetection>,
    #[serde(default)]
    processed_fields: ExtractionResult,
    #[serde(default)]
    raw_texts: Vec<String>,
    #[serde(default)]
    error: Option<String>,
}

impl<'a> OutcomeRecordRef<'a> {
    fn new(path: &'a str, outcome: &'a Outcome) -> Self {
        match outcome {
            Outcome::Success { raw_result, processed_fields, raw_texts } => Self {
                path,
                success: true,
                raw_result: Some(raw_result),
                processed_fields: Some(processed_fields),
                raw_texts: Some(raw_texts),
                error: None,
            },
            Outcome::Failure { error } => Self {
                path,
                success: false,
                raw_result: None,
                processed_fields: None,
                raw_texts: None,
                error: Some(error),
            },
        }
    }
}

impl From<OutcomeRecord> for Outcome {
    fn from(r: OutcomeRecord) -> Self {
        if r.success {
            Outcome::Success {
                raw_result: r.raw_result,
                processed_fields: r.processed_fields,
                raw_texts: r.raw_texts,
            }
        } else {
            Outcome::Failure { error: r.error.unwrap_or_default() }
        }
    }
}

impl Serialize for BatchResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (path, outcome) in &self.entries {
            map.serialize_entry(path, &OutcomeRecordRef::new(path, outcome))?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for BatchResult {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, OutcomeRecord>::deserialize(deserializer)?;
        Ok(BatchResult {
            entries: raw.into_iter().map(|(k, v)| (k, v.into())).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::Point;
    use serde_json::Value;

    fn success() -> Outcome {
        Outcome::Success {
            raw_result: vec![TextDetection::new("LUSAKA", vec![Point(1.0, 2.0)])],
            processed_fields: ExtractionResult {
                district_name: Some("LUSAKA".into()),
                ..Default::default()
            },
            raw_texts: vec!["LUSAKA".into()],
        }
    }

    #[test]
    fn extraction_result_always_has_eight_keys() {
        let v = serde_json::to_value(ExtractionResult::default()).unwrap();
        let obj = v.as_object().unwrap();
        assert_eq!(obj.len(), 8);
        assert!(obj.values().all(Value::is_null));
    }

    #[test]
    fn found_count_counts_present_fields() {
        let r = ExtractionResult {
            sex: Some("Male".into()),
            card_number: Some("Z123456".into()),
            ..Default::default()
        };
        assert_eq!(r.found_count(), 2);
    }

    #[test]
    fn batch_counts_successes_and_failures() {
        let mut batch = BatchResult::new();
        batch.record(JobReport::new("a.jpg", success()));
        batch.record(JobReport::new("b.jpg", Outcome::failure("boom")));
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.success_count(), 1);
        assert_eq!(batch.failure_count(), 1);
        assert_eq!(batch.get("b.jpg").and_then(Outcome::error), Some("boom"));
    }

    #[test]
    fn artifact_shape_for_success_and_failure() {
        let mut batch = BatchResult::new();
        batch.record(JobReport::new("a.jpg", success()));
        batch.record(JobReport::new("b.jpg", Outcome::failure("boom")));
        let v = serde_json::to_value(&batch).unwrap();

        let a = &v["a.jpg"];
        assert_eq!(a["path"], "a.jpg");
        assert_eq!(a["success"], true);
        assert_eq!(a["processed_fields"]["district_name"], "LUSAKA");
        assert!(a["processed_fields"]["sex"].is_null());
        assert_eq!(a["raw_texts"][0], "LUSAKA");
        assert_eq!(a["raw_result"][0]["polygon"][0][0], 1.0);
        assert!(a.get("error").is_none());

        let b = &v["b.jpg"];
        assert_eq!(b["success"], false);
        assert_eq!(b["error"], "boom");
        assert!(b.get("processed_fields").is_none());
    }

    #[test]
    fn artifact_reads_back() {
        let mut batch = BatchResult::new();
        batch.record(JobReport::new("a.jpg", success()));
        batch.record(JobReport::new("b.jpg", Outcome::failure("boom")));
        let json = serde_json::to_string(&batch).unwrap();
        let back: BatchResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, batch);
    }

    #[test]
    fn record_replaces_same_path() {
        let mut batch = BatchResult::new();
        batch.record(JobReport::new("a.jpg", Outcome::failure("first")));
        let prev = batch.record(JobReport::new("a.jpg", success()));
        assert_eq!(prev, Some(Outcome::failure("first")));
        assert_eq!(batch.len(), 1);
    }
}
