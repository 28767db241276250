use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

pub const CHIEF: &str = "CHIEF";
pub const DISTRICT: &str = "DISTRICT";
pub const VILLAGE: &str = "VILLAGE";
pub const SEX: &str = "SEX";
pub const REGISTRATION_DATE: &str = "REGISTRATION DATE";
pub const DATE_OF_BIRTH: &str = "DATE OF BIRTH";
pub const CARD_NUMBER: &str = "CARD NUMBER";

/// Known OCR misreadings of the printed card labels.
const DEFAULT_LABELS: &[(&str, &[&str])] = &[
    (CHIEF, &["CHIEF", "CHIES", "CHEIF", "CHEF", "CHILS"]),
    (DISTRICT, &["DISTRICT", "DISTNICT", "DIST", "DISRICT"]),
    (VILLAGE, &["VILLAGE", "VILLG", "VILAGE", "VILL"]),
    (SEX, &["SEX", "SAX", "S3X"]),
    (REGISTRATION_DATE, &["REGISTRATIONDATE", "REGISTRATIOWDATE", "REGDATE"]),
    (DATE_OF_BIRTH, &["DATEOFBIRTH", "BIRTHDATE", "DOB"]),
    (CARD_NUMBER, &["CARDNO", "CARDNUMBER"]),
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Threshold `{name}` must be within 0..=100, got {value}")]
    ThresholdOutOfRange { name: &'static str, value: u32 },
}

/// Similarity cut-offs on the 0–100 fuzzy scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Label and boilerplate matching.
    pub partial: u8,
    /// Dropping label/noise words from the village-chief block.
    pub village_chief: u8,
    /// Whole-string comparison against "NIL".
    pub nil: u8,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self { partial: 80, village_chief: 85, nil: 80 }
    }
}

/// Canonical label → the spellings OCR tends to produce for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelDictionary(BTreeMap<String, BTreeSet<String>>);

impl Default for LabelDictionary {
    fn default() -> Self {
        let map = DEFAULT_LABELS
            .iter()
            .map(|(label, variants)| {
                let set = variants.iter().map(|v| v.to_string()).collect();
                (label.to_string(), set)
            })
            .collect();
        LabelDictionary(map)
    }
}

impl LabelDictionary {
    /// Variants for `label`; empty when the label is unknown.
    pub fn variants(&self, label: &str) -> Vec<&str> {
        self.0
            .get(label)
            .map(|set| set.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Replace the variant set of one label. Variants are uppercased.
    pub fn set_variants<I, S>(&mut self, label: &str, variants: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set = variants
            .into_iter()
            .map(|v| v.as_ref().trim().to_uppercase())
            .filter(|v| !v.is_empty())
            .collect();
        self.0.insert(label.trim().to_uppercase(), set);
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionConfig {
    pub thresholds: Thresholds,
    pub labels: LabelDictionary,
}

/// User-facing form of [`ExtractionConfig`]; every key is optional and
/// falls back to the built-in default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractionSettings {
    pub partial_threshold: Option<u32>,
    pub village_chief_threshold: Option<u32>,
    pub nil_threshold: Option<u32>,
    pub label_variants: BTreeMap<String, Vec<String>>,
}

impl ExtractionSettings {
    pub fn into_config(self) -> Result<ExtractionConfig, ConfigError> {
        let defaults = Thresholds::default();
        let thresholds = Thresholds {
            partial: threshold("partial_threshold", self.partial_threshold, defaults.partial)?,
            village_chief: threshold(
                "village_chief_threshold",
                self.village_chief_threshold,
                defaults.village_chief,
            )?,
            nil: threshold("nil_threshold", self.nil_threshold, defaults.nil)?,
        };

        let mut labels = LabelDictionary::default();
        for (label, variants) in &self.label_variants {
            labels.set_variants(label, variants);
        }

        Ok(ExtractionConfig { thresholds, labels })
    }
}

fn threshold(name: &'static str, value: Option<u32>, default: u8) -> Result<u8, ConfigError> {
    match value {
        None => Ok(default),
        Some(v) if v <= 100 => Ok(v as u8),
        Some(v) => Err(ConfigError::ThresholdOutOfRange { name, value: v }),
    }
}

impl ExtractionConfig {
    pub fn from_toml(toml_content: &str) -> Result<Self, ConfigError> {
        let settings: ExtractionSettings = toml::from_str(toml_content)?;
        settings.into_config()
    }
}
