use std::sync::OnceLock;

use idscan_core::config::{CHIEF, DISTRICT, VILLAGE};
use idscan_core::{AnnotatedItem, AnnotatedPage, ExtractionConfig, ExtractionResult, Quadrant};
use regex::Regex;

use crate::fuzzy::{is_similar, partial_ratio, ratio};

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

// Prefix match; day-first and ISO-like orderings, 2- or 4-digit years.
re!(re_date,
    r"^(?:\d{1,2}[./-]\d{1,2}[./-]\d{2,4}|\d{4}[./-]\d{1,2}[./-]\d{1,2})");
re!(re_card_number,
    r"^[A-Z]?\s?\d{6,}$");

// ── Word lists ───────────────────────────────────────────────────────────────

/// Printed boilerplate on the front of the card, never a name.
const NAME_BOILERPLATE: &[&str] = &[
    "REPUBLIC", "OF", "NATIONAL", "REGISTRATION", "FULLNAME", "FULL NAME",
    "DATE", "BIRTH", "PLACE", "FATHER", "MOTHER", "SEX",
];

/// Printed text around the village/chief block on the back of the card.
const BACK_NOISE: &[&str] = &[
    "MARKS", "SPECIAL", "IF", "THIS", "CARD", "IS", "FOUND", "PLEASE", "OR",
];

/// Placeholder written when a card has no chief.
const NIL: &str = "NIL";

// ── Rule table ───────────────────────────────────────────────────────────────

/// One extraction step. Rules run in table order and may overwrite what an
/// earlier rule wrote.
pub type Rule = fn(&FieldContext<'_>, &mut ExtractionResult);

pub const RULES: [(&str, Rule); 8] = [
    ("date_of_birth", date_of_birth),
    ("registration_date", registration_date),
    ("card_number", card_number),
    ("sex", sex),
    ("first_name", first_name),
    ("village_and_chief", village_and_chief),
    ("district", district),
    ("chief_override", chief_override),
];

/// Read-only view the rules work from: items per quadrant, in reading order.
pub struct FieldContext<'a> {
    pub q1: Vec<&'a AnnotatedItem>,
    pub q2: Vec<&'a AnnotatedItem>,
    pub q3: Vec<&'a AnnotatedItem>,
    pub q4: Vec<&'a AnnotatedItem>,
    pub center_y: f64,
    pub config: &'a ExtractionConfig,
}

impl<'a> FieldContext<'a> {
    pub fn new(page: &'a AnnotatedPage, config: &'a ExtractionConfig) -> Self {
        Self {
            q1: page.items_in(Quadrant::Q1).collect(),
            q2: page.items_in(Quadrant::Q2).collect(),
            q3: page.items_in(Quadrant::Q3).collect(),
            q4: page.items_in(Quadrant::Q4).collect(),
            center_y: page.center().1,
            config,
        }
    }

    fn variants(&self, label: &str) -> Vec<&'a str> {
        self.config.labels.variants(label)
    }
}

// ── Public extraction API ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct FieldExtractor {
    config: ExtractionConfig,
}

impl FieldExtractor {
    pub fn new(config: ExtractionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Run every rule over the page. Missing fields stay `None`.
    pub fn extract(&self, page: &AnnotatedPage) -> ExtractionResult {
        let ctx = FieldContext::new(page, &self.config);
        let mut result = ExtractionResult::default();
        for (_, rule) in RULES {
            rule(&ctx, &mut result);
        }
        result
    }
}

// ── Dates ────────────────────────────────────────────────────────────────────

pub fn date_of_birth(ctx: &FieldContext<'_>, out: &mut ExtractionResult) {
    out.date_of_birth = first_date(&ctx.q2);
}

pub fn registration_date(ctx: &FieldContext<'_>, out: &mut ExtractionResult) {
    out.registration_date = first_date(&ctx.q4);
}

fn first_date(items: &[&AnnotatedItem]) -> Option<String> {
    items
        .iter()
        .find(|i| re_date().is_match(&i.text))
        .map(|i| i.text.clone())
}

// ── Card number ──────────────────────────────────────────────────────────────

pub fn card_number(ctx: &FieldContext<'_>, out: &mut ExtractionResult) {
    out.card_number = ctx
        .q1
        .iter()
        .find(|i| re_card_number().is_match(&i.text))
        .map(|i| normalize_card_number(&i.text));
}

/// Drop whitespace and force the `Z` series prefix. A different leading
/// letter is kept behind the `Z` ("A 123456" → "ZA123456").
pub fn normalize_card_number(text: &str) -> String {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.starts_with('Z') {
        compact
    } else {
        format!("Z{compact}")
    }
}

// ── Sex ──────────────────────────────────────────────────────────────────────

pub fn sex(ctx: &FieldContext<'_>, out: &mut ExtractionResult) {
    let threshold = ctx.config.thresholds.partial;
    for item in &ctx.q1 {
        // OCR often reads a trailing full stop after the value.
        let t = item.text.trim().trim_end_matches('.');
        if partial_ratio(t, "MALE") >= threshold {
            out.sex = Some("Male".into());
            return;
        }
        if partial_ratio(t, "FEMALE") >= threshold {
            out.sex = Some("Female".into());
            return;
        }
    }
}

// ── First name ───────────────────────────────────────────────────────────────

pub fn first_name(ctx: &FieldContext<'_>, out: &mut ExtractionResult) {
    let threshold = ctx.config.thresholds.partial;
    out.first_name = ctx
        .q2
        .iter()
        .find(|i| {
            NAME_BOILERPLATE
                .iter()
                .all(|word| partial_ratio(&i.text, word) < threshold)
        })
        .map(|i| i.text.clone());
}

// ── Village and chief (back of card, lower left) ─────────────────────────────

pub fn village_and_chief(ctx: &FieldContext<'_>, out: &mut ExtractionResult) {
    let threshold = ctx.config.thresholds.village_chief;
    let nil_threshold = ctx.config.thresholds.nil;

    let mut noise = ctx.variants(CHIEF);
    noise.extend(ctx.variants(VILLAGE));
    noise.extend_from_slice(BACK_NOISE);

    let candidates: Vec<&AnnotatedItem> = ctx
        .q3
        .iter()
        .copied()
        .filter(|i| noise.iter().all(|word| partial_ratio(&i.text, word) < threshold))
        .collect();

    // The village line sits closest to the card's horizontal midline; ties go
    // to the earlier item.
    let Some(village) = candidates.iter().min_by(|a, b| {
        (a.y - ctx.center_y)
            .abs()
            .total_cmp(&(b.y - ctx.center_y).abs())
    }) else {
        return;
    };
    out.village_name = Some(village.text.clone());

    out.chief_name = candidates
        .iter()
        .filter(|i| i.text != village.text)
        .find(|i| ratio(&i.text, NIL) < nil_threshold)
        .map(|i| i.text.clone());
}

// ── District (lower right) ───────────────────────────────────────────────────

pub fn district(ctx: &FieldContext<'_>, out: &mut ExtractionResult) {
    let threshold = ctx.config.thresholds.partial;
    let nil_threshold = ctx.config.thresholds.nil;

    if let Some(value) = value_after_label(&ctx.q4, &ctx.variants(DISTRICT), threshold, is_alphabetic) {
        out.district_name = Some(value.text.clone());
        return;
    }

    // No usable label: take the first plain word that isn't another label.
    let mut other_labels = ctx.variants(CHIEF);
    other_labels.extend(ctx.variants(VILLAGE));

    out.district_name = ctx
        .q4
        .iter()
        .find(|i| {
            is_alphabetic(&i.text)
                && ratio(&i.text, NIL) < nil_threshold
                && !is_similar(&i.text, &other_labels, threshold)
        })
        .map(|i| i.text.clone());
}

// ── Chief override (lower right label wins over the geometric guess) ──────────

pub fn chief_override(ctx: &FieldContext<'_>, out: &mut ExtractionResult) {
    let threshold = ctx.config.thresholds.partial;
    let nil_threshold = ctx.config.thresholds.nil;

    let accept = |t: &str| !t.is_empty() && ratio(t, NIL) < nil_threshold;
    if let Some(value) = value_after_label(&ctx.q4, &ctx.variants(CHIEF), threshold, accept) {
        out.chief_name = Some(value.text.clone());
    }
}

/// The item following the first label match whose successor passes `accept`.
/// A label in last position has no successor and is skipped.
fn value_after_label<'a>(
    items: &[&'a AnnotatedItem],
    label_variants: &[&str],
    threshold: u8,
    accept: impl Fn(&str) -> bool,
) -> Option<&'a AnnotatedItem> {
    items
        .windows(2)
        .find(|pair| is_similar(&pair[0].text, label_variants, threshold) && accept(&pair[1].text))
        .map(|pair| pair[1])
}

fn is_alphabetic(text: &str) -> bool {
    !text.is_empty() && text.chars().all(char::is_alphabetic)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
