//! Soil Corrections - fertilizer rates for deficient Albrecht nutrients
//!
//! Each deficient nutrient (current below ideal) takes the first fertilizer
//! in the table that carries it. The rate brings the nutrient up to its
//! ideal:
//!
//! ```text
//! rate (kg/ha) = (ideal - current) * 2.4 * 100 / percent
//! ```
//!
//! A fertilizer that carries several nutrients is capped so that none of the
//! others climbs more than `max_excess_pct` above its own ideal. Nutrients
//! delivered by earlier amendments count toward later ones.

use crate::nutrients::aggregate::find;
use crate::nutrients::{CanonicalNutrient, Element, NutrientSlot, SourceCategory};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// ppm in the top 15 cm -> kg/ha
pub const PPM_TO_KG_HA: f64 = 2.4;

// ============================================================================
// Fertilizer Table
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fertilizer {
    pub label: &'static str,
    /// Percent by weight of each nutrient
    pub content: &'static [(Element, f64)],
}

impl Fertilizer {
    pub fn percent(&self, element: Element) -> Option<f64> {
        self.content
            .iter()
            .find(|(e, _)| *e == element)
            .map(|(_, pct)| *pct)
            .filter(|pct| *pct > 0.0)
    }

    pub fn elements(&self) -> impl Iterator<Item = Element> + '_ {
        self.content.iter().map(|(e, _)| *e)
    }
}

/// Searched in order; the first match for a nutrient is used
pub const FERTILIZERS: &[Fertilizer] = &[
    Fertilizer { label: "Calcium Nitrate", content: &[(Element::Calcium, 19.0), (Element::Nitrate, 12.0)] },
    Fertilizer { label: "Potassium Nitrate", content: &[(Element::Potassium, 44.0), (Element::Nitrate, 13.0)] },
    Fertilizer { label: "Ammonium Sulfate", content: &[(Element::Ammonium, 21.0), (Element::Sulphur, 24.0)] },
    Fertilizer {
        label: "Monoammonium Phosphate (MAP)",
        content: &[(Element::Phosphorus, 22.0), (Element::Ammonium, 11.0)],
    },
    Fertilizer {
        label: "Diammonium Phosphate (DAP)",
        content: &[(Element::Phosphorus, 20.0), (Element::Ammonium, 18.0)],
    },
    Fertilizer {
        label: "Potassium Magnesium Sulfate",
        content: &[(Element::Potassium, 22.0), (Element::Magnesium, 11.0), (Element::Sulphur, 22.0)],
    },
    Fertilizer { label: "Calcium Sulfate (Gypsum)", content: &[(Element::Calcium, 23.0), (Element::Sulphur, 18.0)] },
    Fertilizer {
        label: "Magnesium Sulfate (Epsom Salt)",
        content: &[(Element::Magnesium, 10.0), (Element::Sulphur, 13.0)],
    },
    Fertilizer { label: "Potassium Sulfate", content: &[(Element::Potassium, 44.0), (Element::Sulphur, 18.0)] },
    Fertilizer { label: "Calcium Carbonate (Lime)", content: &[(Element::Calcium, 40.0)] },
    Fertilizer { label: "Dolomite Lime", content: &[(Element::Calcium, 22.0), (Element::Magnesium, 13.0)] },
    Fertilizer { label: "Boron", content: &[(Element::Boron, 17.0)] },
    Fertilizer { label: "Copper Sulfate", content: &[(Element::Copper, 25.0), (Element::Sulphur, 13.0)] },
    Fertilizer { label: "Iron Sulfate", content: &[(Element::Iron, 20.0), (Element::Sulphur, 11.0)] },
    Fertilizer { label: "Manganese Sulfate", content: &[(Element::Manganese, 23.0), (Element::Sulphur, 13.0)] },
    Fertilizer { label: "Zinc Sulfate", content: &[(Element::Zinc, 23.0), (Element::Sulphur, 11.0)] },
    Fertilizer { label: "Molybdenum", content: &[(Element::Molybdenum, 54.0)] },
];

/// First fertilizer in the table that carries `element`
pub fn fertilizer_for(element: Element) -> Option<&'static Fertilizer> {
    FERTILIZERS.iter().find(|f| f.percent(element).is_some())
}

// ============================================================================
// Amendments
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrectionParams {
    /// How far above its ideal a co-delivered nutrient may go
    pub max_excess_pct: f64,
}

impl Default for CorrectionParams {
    fn default() -> Self {
        Self { max_excess_pct: 25.0 }
    }
}

/// One fertilizer application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilAmendment {
    pub fertilizer: String,
    /// Nutrient the amendment corrects
    pub nutrient: String,
    /// kg/ha, one decimal
    pub rate: f64,
    pub unit: String,
    /// Every nutrient the fertilizer carries
    #[serde(default)]
    pub contains: Vec<String>,
    /// Rate needed to reach the ideal before capping
    #[serde(default)]
    pub uncapped_rate: f64,
    /// Co-delivered nutrient that capped the rate
    #[serde(default)]
    pub limiting_nutrient: Option<String>,
}

impl SoilAmendment {
    pub fn is_capped(&self) -> bool {
        self.limiting_nutrient.is_some()
    }

    /// "Full rate to reach target is 240 kg/ha, but capped at ..."
    pub fn limiting_reason(&self, params: &CorrectionParams) -> Option<String> {
        self.limiting_nutrient.as_ref().map(|other| {
            format!(
                "Full rate to reach target is {} kg/ha, but capped at {} kg/ha due to {} exceeding target by more than {}%",
                self.uncapped_rate, self.rate, other, params.max_excess_pct
            )
        })
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn ppm_added(rate: f64, percent: f64) -> f64 {
    rate * percent / 100.0 / PPM_TO_KG_HA
}

/// Albrecht records eligible for correction: a fertilizer-bearing element
/// with a current value below a positive ideal
pub fn deficient_nutrients(nutrients: &[CanonicalNutrient]) -> Vec<(Element, &CanonicalNutrient)> {
    nutrients
        .iter()
        .filter(|n| n.category == SourceCategory::Albrecht)
        .filter_map(|n| {
            let element = n.generic_name.element()?;
            let current = n.current?;
            let ideal = n.ideal.filter(|v| *v > 0.0)?;
            (current < ideal && fertilizer_for(element).is_some()).then_some((element, n))
        })
        .collect()
}

/// Fertilizer rates for every deficient Albrecht nutrient, in report order
pub fn soil_corrections(nutrients: &[CanonicalNutrient], params: &CorrectionParams) -> Vec<SoilAmendment> {
    let mut added: FxHashMap<Element, f64> = FxHashMap::default();
    let mut amendments = Vec::new();

    for (element, nutrient) in deficient_nutrients(nutrients) {
        let (Some(current), Some(ideal)) = (nutrient.current, nutrient.ideal) else {
            continue;
        };
        let Some(fertilizer) = fertilizer_for(element) else {
            continue;
        };
        let Some(percent) = fertilizer.percent(element) else {
            continue;
        };

        let already = added.get(&element).copied().unwrap_or(0.0);
        let needed = (ideal - (current + already)).max(0.0);
        let uncapped = round1(needed * 100.0 * PPM_TO_KG_HA / percent);

        let mut rate = uncapped;
        let mut limiting = None;
        for (other, other_pct) in fertilizer.content.iter().copied() {
            if other == element || other_pct <= 0.0 {
                continue;
            }
            let Some(record) = find(nutrients, &NutrientSlot::primary(SourceCategory::Albrecht, other)) else {
                continue;
            };
            let (Some(other_current), Some(other_ideal)) = (record.current, record.ideal.filter(|v| *v > 0.0)) else {
                continue;
            };
            let ceiling = other_ideal * (1.0 + params.max_excess_pct / 100.0);
            let headroom = ceiling - (other_current + added.get(&other).copied().unwrap_or(0.0));
            let max_rate = headroom * 100.0 * PPM_TO_KG_HA / other_pct;
            if max_rate < rate {
                rate = round1(max_rate).max(0.0);
                limiting = Some(other.key().to_string());
            }
        }

        if rate <= 0.0 {
            tracing::debug!("{}: no room for {}", element.key(), fertilizer.label);
            continue;
        }

        for (delivered, pct) in fertilizer.content.iter().copied() {
            *added.entry(delivered).or_insert(0.0) += ppm_added(rate, pct);
        }

        amendments.push(SoilAmendment {
            fertilizer: fertilizer.label.to_string(),
            nutrient: element.key().to_string(),
            rate,
            unit: "kg/ha".to_string(),
            contains: fertilizer.elements().map(|e| e.key().to_string()).collect(),
            uncapped_rate: uncapped,
            limiting_nutrient: limiting,
        });
    }

    amendments
}
