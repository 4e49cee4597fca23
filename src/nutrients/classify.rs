//! Status classification for nutrient readings.
//!
//! Several views flag nutrients with different sensitivity, so each band is
//! its own function and call sites pick the one they need:
//! - tables: ideal range, else +-25% around the ideal
//! - charts: +-10% around the ideal
//! - narrative comments: asymmetric five-level bands
//! - leaf analysis: five grades on the deviation percentage

use super::names::Element;
use super::{IdealRange, NutrientStatus};
use serde::{Deserialize, Serialize};

// ============================================================================
// Range and Percent-Deviation Classifiers
// ============================================================================

/// Range classifier; both boundaries count as optimal
pub fn classify_range(current: f64, range: &IdealRange) -> NutrientStatus {
    if current < range.low {
        NutrientStatus::Low
    } else if current > range.high {
        NutrientStatus::High
    } else {
        NutrientStatus::Optimal
    }
}

/// Signed deviation `(current - ideal) / ideal`; undefined unless ideal > 0
pub fn deviation_fraction(current: f64, ideal: f64) -> Option<f64> {
    if ideal > 0.0 {
        Some((current - ideal) / ideal)
    } else {
        None
    }
}

/// Chart band half-width (fraction of the ideal)
pub const CHART_BAND: f64 = 0.10;

/// +-10% band used by bar charts
pub fn classify_chart(current: f64, ideal: f64) -> Option<NutrientStatus> {
    if ideal <= 0.0 {
        return None;
    }
    if current < (1.0 - CHART_BAND) * ideal {
        Some(NutrientStatus::Low)
    } else if current > (1.0 + CHART_BAND) * ideal {
        Some(NutrientStatus::High)
    } else {
        Some(NutrientStatus::Optimal)
    }
}

/// Table band half-width in percent
pub const TABLE_BAND_PCT: f64 = 25.0;

/// +-25% band used by nutrient tables; exactly -25% is still optimal
pub fn classify_table(current: f64, ideal: f64) -> Option<NutrientStatus> {
    let deviation = deviation_fraction(current, ideal)? * 100.0;
    Some(match deviation {
        d if d < -TABLE_BAND_PCT => NutrientStatus::Low,
        d if d > TABLE_BAND_PCT => NutrientStatus::High,
        _ => NutrientStatus::Optimal,
    })
}

/// Status of a canonical record: range when present, else the table band
pub fn classify(current: f64, ideal: Option<f64>, range: Option<&IdealRange>) -> Option<NutrientStatus> {
    match (range, ideal) {
        (Some(range), _) => Some(classify_range(current, range)),
        (None, Some(ideal)) => classify_table(current, ideal),
        (None, None) => None,
    }
}

/// Signed deviation in percent. Measured from the ideal when known; otherwise
/// from the violated range boundary (0 inside the range).
pub fn deviation_pct(current: f64, ideal: Option<f64>, range: Option<&IdealRange>) -> Option<f64> {
    if let Some(fraction) = ideal.and_then(|i| deviation_fraction(current, i)) {
        return Some(fraction * 100.0);
    }
    let range = range?;
    if current < range.low {
        deviation_fraction(current, range.low).map(|f| f * 100.0)
    } else if current > range.high {
        deviation_fraction(current, range.high).map(|f| f * 100.0)
    } else {
        Some(0.0)
    }
}

// ============================================================================
// Narrative Classifier
// ============================================================================

/// Five-level status used when writing narrative comments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrativeStatus {
    Low,
    MarginallyLow,
    Optimal,
    MarginallyHigh,
    High,
}

/// Range margins, as fractions of the range width
pub const NARRATIVE_LOWER_MARGIN: f64 = 0.15;
pub const NARRATIVE_UPPER_MARGIN: f64 = 0.30;

/// Deviation cut points (fractions of the ideal)
pub const NARRATIVE_LOW: f64 = -0.35;
pub const NARRATIVE_MARGINALLY_LOW: f64 = -0.15;
pub const NARRATIVE_MARGINALLY_HIGH: f64 = 0.30;
pub const NARRATIVE_HIGH: f64 = 0.70;

/// Narrative bands.
///
/// With a range `[lo, hi]`: below `lo - 0.15 * width` is low, below `lo`
/// marginally low, above `hi + 0.30 * width` high, above `hi` marginally high.
/// Without a range: `< -35%` low, `< -15%` marginally low, `> +70%` high,
/// `> +30%` marginally high.
pub fn classify_narrative(current: f64, ideal: Option<f64>, range: Option<&IdealRange>) -> Option<NarrativeStatus> {
    if let Some(range) = range {
        let width = range.high - range.low;
        let lower_margin = range.low - NARRATIVE_LOWER_MARGIN * width;
        let upper_margin = range.high + NARRATIVE_UPPER_MARGIN * width;
        return Some(if current < lower_margin {
            NarrativeStatus::Low
        } else if current < range.low {
            NarrativeStatus::MarginallyLow
        } else if current > upper_margin {
            NarrativeStatus::High
        } else if current > range.high {
            NarrativeStatus::MarginallyHigh
        } else {
            NarrativeStatus::Optimal
        });
    }

    let deviation = deviation_fraction(current, ideal?)?;
    Some(match deviation {
        d if d < NARRATIVE_LOW => NarrativeStatus::Low,
        d if d < NARRATIVE_MARGINALLY_LOW => NarrativeStatus::MarginallyLow,
        d if d > NARRATIVE_HIGH => NarrativeStatus::High,
        d if d > NARRATIVE_MARGINALLY_HIGH => NarrativeStatus::MarginallyHigh,
        _ => NarrativeStatus::Optimal,
    })
}

// ============================================================================
// Leaf Analysis Grades
// ============================================================================

/// Grade of a plant-tissue (leaf) reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeafGrade {
    ExtremelyDeficient,
    Deficient,
    Good,
    Excessive,
    ExtremelyExcessive,
}

impl LeafGrade {
    /// Grade a deviation percentage
    pub fn from_deviation_pct(pct: f64) -> Self {
        match pct {
            p if p <= -100.0 => LeafGrade::ExtremelyDeficient,
            p if p <= -25.0 => LeafGrade::Deficient,
            p if p < 25.0 => LeafGrade::Good,
            p if p <= 100.0 => LeafGrade::Excessive,
            _ => LeafGrade::ExtremelyExcessive,
        }
    }

    pub fn display_text(&self) -> &'static str {
        match self {
            LeafGrade::ExtremelyDeficient => "Extremely Deficient",
            LeafGrade::Deficient => "Deficient",
            LeafGrade::Good => "Good",
            LeafGrade::Excessive => "Excessive",
            LeafGrade::ExtremelyExcessive => "Extremely Excessive",
        }
    }
}

/// Leaf target: the top of the range for P, Ca, Mg and B, the midpoint otherwise
pub fn leaf_ideal(element: Element, range: &IdealRange) -> f64 {
    match element {
        Element::Phosphorus | Element::Calcium | Element::Magnesium | Element::Boron => range.high,
        _ => range.midpoint(),
    }
}

/// Deviation percentage and grade of a leaf reading
pub fn grade_leaf(element: Element, value: f64, range: &IdealRange) -> Option<(f64, LeafGrade)> {
    let ideal = leaf_ideal(element, range);
    let pct = deviation_fraction(value, ideal)? * 100.0;
    Some((pct, LeafGrade::from_deviation_pct(pct)))
}
