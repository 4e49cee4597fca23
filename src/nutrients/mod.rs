//! Nutrient model: raw readings, canonical records and their derived status.
//!
//! - `names`: raw name -> canonical key resolution
//! - `classify`: status classifiers (range, +-10%, +-25%, narrative bands, leaf grades)
//! - `aggregate`: merge of the four lab sub-reports into one canonical list
//! - `ratios`: Ca/Mg, Mg/K and the other balance ratios

pub mod aggregate;
pub mod classify;
pub mod names;
pub mod ratios;

pub use aggregate::aggregate;
pub use classify::{LeafGrade, NarrativeStatus};
pub use names::{normalize_name, CanonicalKey, Element, MainMethod, Series};
pub use ratios::{nutrient_ratios, NutrientRatio};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

// ============================================================================
// Source Category
// ============================================================================

/// Lab sub-report a reading came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceCategory {
    Albrecht,
    BaseSaturation,
    LamotteReams,
    Tae,
}

impl SourceCategory {
    /// Lenient parse of the category tags emitted by the extraction backend
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_lowercase().replace([' ', '-', '/'], "_").as_str() {
            "albrecht" | "albrecht_mehlich" | "mehlich" => Some(SourceCategory::Albrecht),
            "base_saturation" | "basesaturation" => Some(SourceCategory::BaseSaturation),
            "lamotte_reams" | "lamotte" | "reams" => Some(SourceCategory::LamotteReams),
            "tae" => Some(SourceCategory::Tae),
            _ => None,
        }
    }

    pub fn display_text(&self) -> &'static str {
        match self {
            SourceCategory::Albrecht => "Albrecht",
            SourceCategory::BaseSaturation => "Base Saturation",
            SourceCategory::LamotteReams => "LaMotte/Reams",
            SourceCategory::Tae => "TAE",
        }
    }
}

// ============================================================================
// Measurements
// ============================================================================

/// Parse a lab value. Detection-limit values ("<0.5") read as 0; commas are
/// ignored; the leading numeric prefix is used ("12.3 ppm" -> 12.3).
pub fn parse_measurement(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.contains('<') {
        return Some(0.0);
    }

    let cleaned: String = text.chars().filter(|c| *c != ',').collect();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    for (i, ch) in cleaned.char_indices() {
        match ch {
            '-' | '+' if i == 0 => {}
            '.' if !seen_dot => seen_dot = true,
            c if c.is_ascii_digit() => seen_digit = true,
            _ => break,
        }
        end = i + ch.len_utf8();
    }

    if !seen_digit {
        return None;
    }
    cleaned[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Interpret a JSON value (number, string, null) as a measurement
pub fn measurement_from_value(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        serde_json::Value::String(s) => parse_measurement(s),
        _ => None,
    }
}

/// Serde adapters for lenient measurement fields
pub mod measurement {
    use super::measurement_from_value;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        let value = Option::<serde_json::Value>::deserialize(deserializer)?;
        Ok(value.as_ref().and_then(measurement_from_value))
    }

    /// Missing values serialize as an empty string so every slot still renders
    pub fn serialize_blank<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_f64(*v),
            None => serializer.serialize_str(""),
        }
    }
}

/// Target interval `[low, high]`, serialized as a two-element array
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdealRange {
    pub low: f64,
    pub high: f64,
}

impl IdealRange {
    /// Bounds are reordered so that `low <= high`
    pub fn new(a: f64, b: f64) -> Self {
        IdealRange {
            low: a.min(b),
            high: a.max(b),
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.low && value <= self.high
    }

    pub fn midpoint(&self) -> f64 {
        (self.low + self.high) / 2.0
    }

    pub fn within(&self, low: f64, high: f64) -> bool {
        self.low >= low && self.high <= high
    }

    /// Parse a JSON `[low, high]` pair whose entries may be strings
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        let items = value.as_array()?;
        if items.len() != 2 {
            return None;
        }
        let low = measurement_from_value(&items[0])?;
        let high = measurement_from_value(&items[1])?;
        Some(IdealRange::new(low, high))
    }
}

impl fmt::Display for IdealRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.low, self.high)
    }
}

impl Serialize for IdealRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        [self.low, self.high].serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for IdealRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        IdealRange::from_value(&value)
            .ok_or_else(|| serde::de::Error::custom("ideal_range must be a [low, high] pair"))
    }
}

// ============================================================================
// Readings and Canonical Records
// ============================================================================

/// A single observed value from one lab sub-report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutrientReading {
    pub name: String,
    #[serde(default, deserialize_with = "measurement::deserialize")]
    pub current: Option<f64>,
    /// Only positive targets count as an ideal
    #[serde(default, deserialize_with = "deserialize_ideal")]
    pub ideal: Option<f64>,
    #[serde(default)]
    pub ideal_range: Option<IdealRange>,
    #[serde(default)]
    pub unit: String,
    pub category: SourceCategory,
}

fn deserialize_ideal<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(measurement::deserialize(deserializer)?.filter(|v| *v > 0.0))
}

impl NutrientReading {
    pub fn new(name: &str, current: f64, ideal: f64, unit: &str, category: SourceCategory) -> Self {
        NutrientReading {
            name: name.to_string(),
            current: Some(current),
            ideal: Some(ideal).filter(|v| *v > 0.0),
            ideal_range: None,
            unit: unit.to_string(),
            category,
        }
    }

    pub fn with_range(mut self, low: f64, high: f64) -> Self {
        self.ideal_range = Some(IdealRange::new(low, high));
        self
    }

    pub fn is_percent(&self) -> bool {
        self.unit.trim() == "%"
    }

    pub fn is_ppm(&self) -> bool {
        self.unit.trim().eq_ignore_ascii_case("ppm")
    }
}

/// Identity of one canonical record: the panel it is shown in plus its key.
/// The same element can appear once per panel (Albrecht Calcium in ppm and
/// base-saturation Calcium in %).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NutrientSlot {
    pub category: SourceCategory,
    pub key: CanonicalKey,
}

impl NutrientSlot {
    pub fn new(category: SourceCategory, key: CanonicalKey) -> Self {
        NutrientSlot { category, key }
    }

    pub fn primary(category: SourceCategory, element: Element) -> Self {
        NutrientSlot::new(category, CanonicalKey::primary(element))
    }

    /// Label used in threshold tables and nutrient tables
    pub fn label(&self) -> String {
        match self.category {
            SourceCategory::BaseSaturation => format!("Base Saturation {}", self.key.display_text()),
            _ => self.key.display_text(),
        }
    }

    /// Inverse of `label`, for user-supplied threshold names
    pub fn parse_label(label: &str) -> Self {
        let label = label.trim();
        if let Some(rest) = label.strip_prefix("Base Saturation ") {
            return NutrientSlot::new(SourceCategory::BaseSaturation, normalize_name(rest).with_series(Series::Primary));
        }
        let key = normalize_name(label);
        let category = match key.series() {
            Some(Series::LaMotte) => SourceCategory::LamotteReams,
            Some(Series::Tae) => SourceCategory::Tae,
            _ => SourceCategory::Albrecht,
        };
        NutrientSlot::new(category, key)
    }
}

impl fmt::Display for NutrientSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Status band used by tables and charts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NutrientStatus {
    Low,
    Optimal,
    High,
}

impl NutrientStatus {
    pub fn display_text(&self) -> &'static str {
        match self {
            NutrientStatus::Low => "Low",
            NutrientStatus::Optimal => "Optimal",
            NutrientStatus::High => "High",
        }
    }
}

/// Deduplicated, display-ready nutrient record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalNutrient {
    pub generic_name: CanonicalKey,
    pub category: SourceCategory,
    /// Raw name of the reading that was selected, if any
    #[serde(default)]
    pub source_name: Option<String>,
    #[serde(
        default,
        serialize_with = "measurement::serialize_blank",
        deserialize_with = "measurement::deserialize"
    )]
    pub current: Option<f64>,
    #[serde(default)]
    pub ideal: Option<f64>,
    #[serde(default)]
    pub ideal_range: Option<IdealRange>,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub status: Option<NutrientStatus>,
    #[serde(default)]
    pub deviation_pct: Option<f64>,
    /// The selected reading also fills another slot; left out of the overall mean
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub shared_reading: bool,
}

impl CanonicalNutrient {
    /// Slot with no resolved reading; renders as an empty row
    pub fn empty(slot: NutrientSlot) -> Self {
        CanonicalNutrient {
            generic_name: slot.key,
            category: slot.category,
            source_name: None,
            current: None,
            ideal: None,
            ideal_range: None,
            unit: String::new(),
            status: None,
            deviation_pct: None,
            shared_reading: false,
        }
    }

    /// Project a reading into a slot, deriving status and deviation
    pub fn from_reading(slot: NutrientSlot, reading: &NutrientReading) -> Self {
        let mut nutrient = CanonicalNutrient {
            generic_name: slot.key,
            category: slot.category,
            source_name: Some(reading.name.clone()),
            current: reading.current,
            ideal: reading.ideal,
            ideal_range: reading.ideal_range,
            unit: reading.unit.clone(),
            status: None,
            deviation_pct: None,
            shared_reading: false,
        };
        if let Some(current) = nutrient.current {
            nutrient.status = classify::classify(current, nutrient.ideal, nutrient.ideal_range.as_ref());
            nutrient.deviation_pct =
                classify::deviation_pct(current, nutrient.ideal, nutrient.ideal_range.as_ref());
        }
        nutrient
    }

    pub fn slot(&self) -> NutrientSlot {
        NutrientSlot::new(self.category, self.generic_name.clone())
    }

    /// Ideal value, or the range midpoint when only a range is known
    pub fn target(&self) -> Option<f64> {
        self.ideal
            .or_else(|| self.ideal_range.map(|r| r.midpoint()))
            .filter(|v| *v > 0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }

    pub fn label(&self) -> String {
        self.slot().label()
    }
}
