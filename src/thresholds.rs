//! Threshold Configuration - per-nutrient colour bands and bar-chart geometry
//!
//! Two user-editable schemes sit beside the status classifiers:
//! - deviation bands `{red, blue, green_low, green_high}` (percent from ideal)
//!   that colour each nutrient in charts
//! - bar thresholds `{deficient_threshold, excessive_threshold}` that grade
//!   how far a value sits outside its ideal range
//!
//! Defaults are keyed by [`NutrientSlot`]; overrides can be loaded from JSON
//! keyed by slot label ("Calcium", "Base Saturation Calcium", "LaMotte Calcium").

use crate::nutrients::classify::deviation_fraction;
use crate::nutrients::names::{LAMOTTE_ELEMENTS, TAE_ELEMENTS};
use crate::nutrients::{CanonicalKey, CanonicalNutrient, Element, NutrientSlot, SourceCategory};
use crate::scorer::nutrient_score;
use anyhow::{Context, Result};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

// ============================================================================
// Deviation Bands
// ============================================================================

/// Colour of a nutrient in deviation charts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BandColor {
    Green,
    Red,
    Blue,
    Grey,
}

impl BandColor {
    pub fn hex(&self) -> &'static str {
        match self {
            BandColor::Green => "#22c55e",
            BandColor::Red => "#ef4444",
            BandColor::Blue => "#2563eb",
            BandColor::Grey => "#d1d5db",
        }
    }
}

/// Deviation-percent boundaries for one nutrient
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviationThreshold {
    pub red: f64,
    pub blue: f64,
    pub green_low: f64,
    pub green_high: f64,
}

impl DeviationThreshold {
    /// Bands for names without a configured default
    pub const UNKNOWN: DeviationThreshold = DeviationThreshold {
        red: -50.0,
        blue: 50.0,
        green_low: -50.0,
        green_high: 50.0,
    };

    /// Green band sits one point inside the red/blue boundaries
    fn band(red: f64, blue: f64) -> Self {
        DeviationThreshold {
            red,
            blue,
            green_low: red + 1.0,
            green_high: blue - 1.0,
        }
    }

    /// Green inside `[green_low, green_high]`, red below `red`, blue above
    /// `blue`, grey in the gaps between
    pub fn color(&self, deviation_pct: f64) -> BandColor {
        if deviation_pct >= self.green_low && deviation_pct <= self.green_high {
            BandColor::Green
        } else if deviation_pct < self.red {
            BandColor::Red
        } else if deviation_pct > self.blue {
            BandColor::Blue
        } else {
            BandColor::Grey
        }
    }
}

/// Partial edit of a nutrient's thresholds; absent fields keep their value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdUpdate {
    #[serde(default)]
    pub red: Option<f64>,
    #[serde(default)]
    pub blue: Option<f64>,
    #[serde(default)]
    pub green_low: Option<f64>,
    #[serde(default)]
    pub green_high: Option<f64>,
    #[serde(default, alias = "deficient_threshold")]
    pub deficient_threshold: Option<f64>,
    #[serde(default, alias = "excessive_threshold")]
    pub excessive_threshold: Option<f64>,
}

// ============================================================================
// Bar Thresholds
// ============================================================================

/// Percent beyond the range edge still graded "Acceptable"
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BarThreshold {
    pub deficient_threshold: f64,
    pub excessive_threshold: f64,
}

impl Default for BarThreshold {
    fn default() -> Self {
        BarThreshold {
            deficient_threshold: 25.0,
            excessive_threshold: 25.0,
        }
    }
}

/// Multipliers applied to each third of the bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneSensitivity {
    pub deficient: f64,
    pub optimal: f64,
    pub excessive: f64,
}

impl Default for ZoneSensitivity {
    fn default() -> Self {
        ZoneSensitivity {
            deficient: 1.0,
            optimal: 1.0,
            excessive: 1.0,
        }
    }
}

// ============================================================================
// Default Tables
// ============================================================================

struct BandDefault {
    category: SourceCategory,
    element: Element,
    red: f64,
    blue: f64,
}

static DEVIATION_DEFAULTS: &[BandDefault] = &[
    BandDefault { category: SourceCategory::Albrecht, element: Element::Cec, red: -50.0, blue: 50.0 },
    BandDefault { category: SourceCategory::Albrecht, element: Element::Paramagnetism, red: -50.0, blue: 50.0 },
    BandDefault { category: SourceCategory::Albrecht, element: Element::Ph, red: -35.0, blue: 35.0 },
    BandDefault { category: SourceCategory::Albrecht, element: Element::OrganicMatter, red: -25.0, blue: 15.0 },
    BandDefault { category: SourceCategory::Albrecht, element: Element::OrganicCarbon, red: -14.0, blue: 72.0 },
    BandDefault { category: SourceCategory::Albrecht, element: Element::Conductivity, red: -49.0, blue: 150.0 },
    BandDefault { category: SourceCategory::Albrecht, element: Element::CaMgRatio, red: -50.0, blue: 50.0 },
    BandDefault { category: SourceCategory::Albrecht, element: Element::Nitrate, red: -50.0, blue: 50.0 },
    BandDefault { category: SourceCategory::Albrecht, element: Element::Ammonium, red: -50.0, blue: 50.0 },
    BandDefault { category: SourceCategory::Albrecht, element: Element::Phosphorus, red: -30.0, blue: 100.0 },
    BandDefault { category: SourceCategory::Albrecht, element: Element::Calcium, red: -35.0, blue: 70.0 },
    BandDefault { category: SourceCategory::Albrecht, element: Element::Magnesium, red: -35.0, blue: 70.0 },
    BandDefault { category: SourceCategory::Albrecht, element: Element::Potassium, red: -35.0, blue: 70.0 },
    BandDefault { category: SourceCategory::Albrecht, element: Element::Sodium, red: -35.0, blue: 100.0 },
    BandDefault { category: SourceCategory::Albrecht, element: Element::Sulphur, red: -50.0, blue: 100.0 },
    BandDefault { category: SourceCategory::Albrecht, element: Element::Chloride, red: -50.0, blue: 100.0 },
    BandDefault { category: SourceCategory::Albrecht, element: Element::Aluminium, red: -50.0, blue: 100.0 },
    BandDefault { category: SourceCategory::Albrecht, element: Element::Silicon, red: -60.0, blue: 100.0 },
    BandDefault { category: SourceCategory::Albrecht, element: Element::Boron, red: -30.0, blue: 150.0 },
    BandDefault { category: SourceCategory::Albrecht, element: Element::Iron, red: -50.0, blue: 100.0 },
    BandDefault { category: SourceCategory::Albrecht, element: Element::Manganese, red: -50.0, blue: 100.0 },
    BandDefault { category: SourceCategory::Albrecht, element: Element::Copper, red: -50.0, blue: 100.0 },
    BandDefault { category: SourceCategory::Albrecht, element: Element::Zinc, red: -50.0, blue: 100.0 },
    BandDefault { category: SourceCategory::BaseSaturation, element: Element::Calcium, red: -35.0, blue: 70.0 },
    BandDefault { category: SourceCategory::BaseSaturation, element: Element::Magnesium, red: -35.0, blue: 70.0 },
    BandDefault { category: SourceCategory::BaseSaturation, element: Element::Potassium, red: -35.0, blue: 70.0 },
    BandDefault { category: SourceCategory::BaseSaturation, element: Element::Sodium, red: -35.0, blue: 100.0 },
    BandDefault { category: SourceCategory::BaseSaturation, element: Element::Aluminium, red: -35.0, blue: 100.0 },
    BandDefault { category: SourceCategory::BaseSaturation, element: Element::Hydrogen, red: -35.0, blue: 70.0 },
    BandDefault { category: SourceCategory::BaseSaturation, element: Element::OtherBases, red: -35.0, blue: 100.0 },
];

/// LaMotte bands, shared by every LaMotte element
const LAMOTTE_BAND: (f64, f64) = (-50.0, 100.0);

struct BarDefault {
    element: Element,
    deficient: f64,
    excessive: f64,
}

/// Albrecht-panel bar thresholds
static BAR_DEFAULTS: &[BarDefault] = &[
    BarDefault { element: Element::Cec, deficient: 50.0, excessive: 100.0 },
    BarDefault { element: Element::Tec, deficient: 50.0, excessive: 100.0 },
    BarDefault { element: Element::Paramagnetism, deficient: 50.0, excessive: 100.0 },
    BarDefault { element: Element::Ph, deficient: 50.0, excessive: 115.0 },
    BarDefault { element: Element::OrganicMatter, deficient: 50.0, excessive: 150.0 },
    BarDefault { element: Element::OrganicCarbon, deficient: 50.0, excessive: 100.0 },
    BarDefault { element: Element::Conductivity, deficient: 50.0, excessive: 100.0 },
    BarDefault { element: Element::CaMgRatio, deficient: 50.0, excessive: 100.0 },
    BarDefault { element: Element::Nitrate, deficient: 50.0, excessive: 100.0 },
    BarDefault { element: Element::Ammonium, deficient: 50.0, excessive: 100.0 },
    BarDefault { element: Element::Phosphorus, deficient: 30.0, excessive: 60.0 },
    BarDefault { element: Element::Calcium, deficient: 35.0, excessive: 70.0 },
    BarDefault { element: Element::Magnesium, deficient: 35.0, excessive: 70.0 },
    BarDefault { element: Element::Potassium, deficient: 35.0, excessive: 70.0 },
    BarDefault { element: Element::Sodium, deficient: 35.0, excessive: 100.0 },
    BarDefault { element: Element::Sulphur, deficient: 50.0, excessive: 100.0 },
    BarDefault { element: Element::Chloride, deficient: 35.0, excessive: 50.0 },
    BarDefault { element: Element::Aluminium, deficient: 50.0, excessive: 100.0 },
    BarDefault { element: Element::Silicon, deficient: 35.0, excessive: 70.0 },
    BarDefault { element: Element::Boron, deficient: 30.0, excessive: 150.0 },
    BarDefault { element: Element::Iron, deficient: 50.0, excessive: 100.0 },
    BarDefault { element: Element::Manganese, deficient: 50.0, excessive: 100.0 },
    BarDefault { element: Element::Copper, deficient: 50.0, excessive: 100.0 },
    BarDefault { element: Element::Zinc, deficient: 50.0, excessive: 100.0 },
];

/// Bar thresholds of the base-saturation, LaMotte and TAE panels
const SECONDARY_BAR: BarThreshold = BarThreshold {
    deficient_threshold: 35.0,
    excessive_threshold: 70.0,
};

// ============================================================================
// Threshold Config
// ============================================================================

/// Per-slot threshold store, seeded with defaults and edited by the user
#[derive(Debug, Clone)]
pub struct ThresholdConfig {
    deviation: FxHashMap<NutrientSlot, DeviationThreshold>,
    bar: FxHashMap<NutrientSlot, BarThreshold>,
    sensitivity: FxHashMap<NutrientSlot, ZoneSensitivity>,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        let mut deviation = FxHashMap::default();
        for d in DEVIATION_DEFAULTS {
            deviation.insert(
                NutrientSlot::primary(d.category, d.element),
                DeviationThreshold::band(d.red, d.blue),
            );
        }
        for &element in LAMOTTE_ELEMENTS {
            let (red, blue) = LAMOTTE_BAND;
            deviation.insert(lamotte_slot(element), DeviationThreshold::band(red, blue));
        }

        let mut bar = FxHashMap::default();
        for d in BAR_DEFAULTS {
            bar.insert(
                NutrientSlot::primary(SourceCategory::Albrecht, d.element),
                BarThreshold {
                    deficient_threshold: d.deficient,
                    excessive_threshold: d.excessive,
                },
            );
        }
        for &element in crate::nutrients::names::BASE_SATURATION_ELEMENTS {
            bar.insert(NutrientSlot::primary(SourceCategory::BaseSaturation, element), SECONDARY_BAR);
        }
        for &element in LAMOTTE_ELEMENTS {
            bar.insert(lamotte_slot(element), SECONDARY_BAR);
        }
        for &element in TAE_ELEMENTS {
            bar.insert(
                NutrientSlot::new(SourceCategory::Tae, CanonicalKey::tae(element)),
                SECONDARY_BAR,
            );
        }

        ThresholdConfig {
            deviation,
            bar,
            sensitivity: FxHashMap::default(),
        }
    }
}

fn lamotte_slot(element: Element) -> NutrientSlot {
    NutrientSlot::new(SourceCategory::LamotteReams, CanonicalKey::lamotte(element))
}

impl ThresholdConfig {
    /// Load defaults and apply a JSON file of overrides keyed by slot label
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read thresholds file: {:?}", path))?;

        let overrides: BTreeMap<String, ThresholdUpdate> = serde_json::from_str(&contents)
            .with_context(|| "Failed to parse thresholds JSON")?;

        let mut config = ThresholdConfig::default();
        config.apply_overrides(&overrides);
        tracing::info!("Loaded {} threshold overrides from {:?}", overrides.len(), path);
        Ok(config)
    }

    pub fn apply_overrides(&mut self, overrides: &BTreeMap<String, ThresholdUpdate>) {
        for (label, update) in overrides {
            self.set(NutrientSlot::parse_label(label), update);
        }
    }

    pub fn get(&self, slot: &NutrientSlot) -> DeviationThreshold {
        self.deviation
            .get(slot)
            .copied()
            .unwrap_or(DeviationThreshold::UNKNOWN)
    }

    pub fn bar_threshold(&self, slot: &NutrientSlot) -> BarThreshold {
        self.bar.get(slot).copied().unwrap_or_default()
    }

    pub fn sensitivity(&self, slot: &NutrientSlot) -> ZoneSensitivity {
        self.sensitivity.get(slot).copied().unwrap_or_default()
    }

    /// Merge a partial edit into the slot's current thresholds
    pub fn set(&mut self, slot: NutrientSlot, update: &ThresholdUpdate) {
        let mut band = self.get(&slot);
        band.red = update.red.unwrap_or(band.red);
        band.blue = update.blue.unwrap_or(band.blue);
        band.green_low = update.green_low.unwrap_or(band.green_low);
        band.green_high = update.green_high.unwrap_or(band.green_high);

        let mut bar = self.bar_threshold(&slot);
        bar.deficient_threshold = update.deficient_threshold.unwrap_or(bar.deficient_threshold);
        bar.excessive_threshold = update.excessive_threshold.unwrap_or(bar.excessive_threshold);

        self.deviation.insert(slot.clone(), band);
        self.bar.insert(slot, bar);
    }

    pub fn set_sensitivity(&mut self, slot: NutrientSlot, sensitivity: ZoneSensitivity) {
        self.sensitivity.insert(slot, sensitivity);
    }

    /// Chart colour for a record; `None` without a current value and target
    pub fn color_for(&self, nutrient: &CanonicalNutrient) -> Option<BandColor> {
        let current = nutrient.current?;
        let deviation = deviation_fraction(current, nutrient.target()?)? * 100.0;
        Some(self.get(&nutrient.slot()).color(deviation))
    }

    /// Current deviation bands keyed by slot label
    pub fn snapshot(&self) -> BTreeMap<String, DeviationThreshold> {
        self.deviation
            .iter()
            .map(|(slot, band)| (slot.label(), *band))
            .collect()
    }
}

// ============================================================================
// Bar Data
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BarStatus {
    DeficientAcceptable,
    DeficientCritical,
    Optimal,
    ExcessiveAcceptable,
    ExcessiveCritical,
}

impl BarStatus {
    pub fn display_text(&self) -> &'static str {
        match self {
            BarStatus::DeficientAcceptable => "Deficient (Acceptable)",
            BarStatus::DeficientCritical => "Deficient (Critical)",
            BarStatus::Optimal => "Optimal",
            BarStatus::ExcessiveAcceptable => "Excessive (Acceptable)",
            BarStatus::ExcessiveCritical => "Excessive (Critical)",
        }
    }
}

/// Geometry and grading of one nutrient bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarData {
    pub label: String,
    /// Fill fraction in [0, 1]: thirds for deficient, optimal and excessive
    pub bar: f64,
    pub color: BandColor,
    pub status: BarStatus,
    pub low: f64,
    pub high: f64,
    pub value: f64,
    /// Percent outside the range edge (0 inside the range)
    pub deviation_pct: f64,
    pub unit: String,
    pub score: Option<f64>,
}

/// Place a record on the three-zone bar. Without a range the zone edges are
/// `ideal * 0.8` and `ideal * 1.2`.
pub fn bar_data(nutrient: &CanonicalNutrient, config: &ThresholdConfig) -> Option<BarData> {
    let value = nutrient.current?;
    let (low, high) = match (nutrient.ideal_range, nutrient.ideal) {
        (Some(range), _) => (range.low, range.high),
        (None, Some(ideal)) => (ideal * 0.8, ideal * 1.2),
        (None, None) => return None,
    };

    let slot = nutrient.slot();
    let thresholds = config.bar_threshold(&slot);
    let sensitivity = config.sensitivity(&slot);

    let (bar, color, status, deviation_pct) = if value <= low {
        let ratio = if low > 0.0 { value / low } else { 0.0 };
        let deviation = if low > 0.0 { (low - value) / low * 100.0 } else { 100.0 };
        let acceptable = deviation <= thresholds.deficient_threshold.abs();
        (
            ratio * 0.333 * sensitivity.deficient,
            if acceptable { BandColor::Green } else { BandColor::Red },
            if acceptable { BarStatus::DeficientAcceptable } else { BarStatus::DeficientCritical },
            deviation,
        )
    } else if value <= high {
        let relative = if high > low { (value - low) / (high - low) } else { 0.0 };
        (0.333 + relative * 0.333 * sensitivity.optimal, BandColor::Green, BarStatus::Optimal, 0.0)
    } else {
        let excess = if high > 0.0 { (value - high) / high } else { 1.0 };
        let deviation = excess * 100.0;
        let acceptable = deviation <= thresholds.excessive_threshold.abs();
        (
            0.666 + excess.min(1.0) * 0.334 * sensitivity.excessive,
            if acceptable { BandColor::Green } else { BandColor::Blue },
            if acceptable { BarStatus::ExcessiveAcceptable } else { BarStatus::ExcessiveCritical },
            deviation,
        )
    };

    Some(BarData {
        label: nutrient.label(),
        bar: bar.clamp(0.0, 1.0),
        color,
        status,
        low,
        high,
        value,
        deviation_pct,
        unit: nutrient.unit.clone(),
        score: nutrient_score(nutrient),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nutrients::aggregate::find;
    use crate::nutrients::{aggregate, NutrientReading};
    use approx::assert_relative_eq;

    fn albrecht(element: Element) -> NutrientSlot {
        NutrientSlot::primary(SourceCategory::Albrecht, element)
    }

    #[test]
    fn test_defaults() {
        let config = ThresholdConfig::default();
        let om = config.get(&albrecht(Element::OrganicMatter));
        assert_eq!(om, DeviationThreshold { red: -25.0, blue: 15.0, green_low: -24.0, green_high: 14.0 });

        let bs_na = config.get(&NutrientSlot::primary(SourceCategory::BaseSaturation, Element::Sodium));
        assert_eq!((bs_na.red, bs_na.blue), (-35.0, 100.0));

        let lamotte = config.get(&lamotte_slot(Element::Phosphorus));
        assert_eq!((lamotte.red, lamotte.blue), (-50.0, 100.0));

        let unknown = config.get(&NutrientSlot::new(SourceCategory::Albrecht, CanonicalKey::Other("Xyz".into())));
        assert_eq!(unknown, DeviationThreshold::UNKNOWN);
    }

    #[test]
    fn test_set_merges_partial_update() {
        let mut config = ThresholdConfig::default();
        let slot = albrecht(Element::Calcium);
        config.set(slot.clone(), &ThresholdUpdate { blue: Some(90.0), ..Default::default() });

        let band = config.get(&slot);
        assert_eq!(band.blue, 90.0);
        assert_eq!(band.red, -35.0);
        assert_eq!(band.green_high, 69.0);
    }

    #[test]
    fn test_colors() {
        let band = DeviationThreshold::band(-35.0, 70.0);
        assert_eq!(band.color(0.0), BandColor::Green);
        assert_eq!(band.color(-34.0), BandColor::Green);
        assert_eq!(band.color(-34.5), BandColor::Grey);
        assert_eq!(band.color(-40.0), BandColor::Red);
        assert_eq!(band.color(80.0), BandColor::Blue);
    }

    #[test]
    fn test_color_for_nutrient() {
        let readings = vec![NutrientReading::new("Calcium (Mehlich III)", 500.0, 1000.0, "ppm", SourceCategory::Albrecht)];
        let nutrients = aggregate(&readings);
        let ca = find(&nutrients, &albrecht(Element::Calcium)).unwrap();
        assert_eq!(ThresholdConfig::default().color_for(ca), Some(BandColor::Red));
    }

    #[test]
    fn test_bar_zones() {
        let config = ThresholdConfig::default();
        let mk = |current: f64| {
            let readings = vec![NutrientReading::new("Zinc (DTPA)", current, 10.0, "ppm", SourceCategory::Albrecht).with_range(8.0, 12.0)];
            let nutrients = aggregate(&readings);
            bar_data(find(&nutrients, &albrecht(Element::Zinc)).unwrap(), &config).unwrap()
        };

        let optimal = mk(10.0);
        assert_eq!(optimal.status, BarStatus::Optimal);
        assert_relative_eq!(optimal.bar, 0.333 + 0.5 * 0.333);

        // 25% below the low edge, within zinc's 50% deficient threshold
        let deficient = mk(6.0);
        assert_eq!(deficient.status, BarStatus::DeficientAcceptable);
        assert_relative_eq!(deficient.deviation_pct, 25.0);

        let critical = mk(2.0);
        assert_eq!(critical.status, BarStatus::DeficientCritical);
        assert_eq!(critical.color, BandColor::Red);

        let excessive = mk(36.0);
        assert_eq!(excessive.status, BarStatus::ExcessiveCritical);
        assert_eq!(excessive.color, BandColor::Blue);
        assert_relative_eq!(excessive.bar, 1.0);
    }

    #[test]
    fn test_overrides_by_label() {
        let mut overrides = BTreeMap::new();
        overrides.insert(
            "Base Saturation Calcium".to_string(),
            ThresholdUpdate { red: Some(-20.0), ..Default::default() },
        );
        let mut config = ThresholdConfig::default();
        config.apply_overrides(&overrides);
        let band = config.get(&NutrientSlot::primary(SourceCategory::BaseSaturation, Element::Calcium));
        assert_eq!(band.red, -20.0);
        assert_eq!(band.blue, 70.0);
    }
}
