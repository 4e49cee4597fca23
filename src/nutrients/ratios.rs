//! Nutritional ratios between Albrecht nutrients.
//!
//! Ca/Mg prefers the lab's own ratio row and only falls back to dividing
//! the Calcium and Magnesium readings. Every ratio is coloured with the
//! +-25% table band around its ideal.

use super::aggregate::find;
use super::classify::classify_table;
use super::{CanonicalNutrient, Element, NutrientSlot, NutrientStatus, SourceCategory};
use crate::thresholds::BandColor;
use serde::{Deserialize, Serialize};

/// Ideal Ca/Mg when the lab reports none
pub const DEFAULT_CA_MG_IDEAL: f64 = 3.35;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatioDef {
    pub label: &'static str,
    pub numerator: Element,
    pub denominator: Element,
    pub ideal: f64,
}

pub const RATIOS: &[RatioDef] = &[
    RatioDef { label: "Ca/Mg", numerator: Element::Calcium, denominator: Element::Magnesium, ideal: DEFAULT_CA_MG_IDEAL },
    RatioDef { label: "Mg/K", numerator: Element::Magnesium, denominator: Element::Potassium, ideal: 7.0 },
    RatioDef { label: "K/Na", numerator: Element::Potassium, denominator: Element::Sodium, ideal: 1.0 },
    RatioDef { label: "Ca/K", numerator: Element::Calcium, denominator: Element::Potassium, ideal: 5.0 },
    RatioDef { label: "P/Zn", numerator: Element::Phosphorus, denominator: Element::Zinc, ideal: 10.0 },
    RatioDef { label: "Fe/Mn", numerator: Element::Iron, denominator: Element::Manganese, ideal: 1.1 },
];

/// One computed ratio; `value` is `None` when an operand is missing or the
/// denominator is zero
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutrientRatio {
    pub label: String,
    pub value: Option<f64>,
    pub ideal: f64,
    pub deviation_pct: Option<f64>,
    pub status: Option<NutrientStatus>,
    pub color: Option<BandColor>,
}

impl NutrientRatio {
    fn new(label: &str, value: Option<f64>, ideal: f64) -> Self {
        let status = value.and_then(|v| classify_table(v, ideal));
        NutrientRatio {
            label: label.to_string(),
            value,
            ideal,
            deviation_pct: value.filter(|_| ideal > 0.0).map(|v| (v - ideal) / ideal * 100.0),
            status,
            color: status.map(|s| match s {
                NutrientStatus::Low => BandColor::Red,
                NutrientStatus::Optimal => BandColor::Green,
                NutrientStatus::High => BandColor::Blue,
            }),
        }
    }
}

fn albrecht_current(nutrients: &[CanonicalNutrient], element: Element) -> Option<f64> {
    find(nutrients, &NutrientSlot::primary(SourceCategory::Albrecht, element)).and_then(|n| n.current)
}

fn divide(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d != 0.0 => Some(n / d),
        _ => None,
    }
}

/// Every ratio in display order, computed or not
pub fn nutrient_ratios(nutrients: &[CanonicalNutrient]) -> Vec<NutrientRatio> {
    RATIOS
        .iter()
        .map(|def| {
            if def.numerator == Element::Calcium && def.denominator == Element::Magnesium {
                let reported = find(nutrients, &NutrientSlot::primary(SourceCategory::Albrecht, Element::CaMgRatio))
                    .filter(|n| n.current.is_some());
                if let Some(row) = reported {
                    let ideal = row.ideal.filter(|v| *v > 0.0).unwrap_or(def.ideal);
                    return NutrientRatio::new(def.label, row.current, ideal);
                }
            }
            let value = divide(
                albrecht_current(nutrients, def.numerator),
                albrecht_current(nutrients, def.denominator),
            );
            NutrientRatio::new(def.label, value, def.ideal)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nutrients::{aggregate, NutrientReading};
    use approx::assert_relative_eq;

    fn albrecht(name: &str, current: f64, ideal: f64) -> NutrientReading {
        NutrientReading::new(name, current, ideal, "ppm", SourceCategory::Albrecht)
    }

    fn ratio<'a>(ratios: &'a [NutrientRatio], label: &str) -> &'a NutrientRatio {
        ratios.iter().find(|r| r.label == label).unwrap()
    }

    #[test]
    fn test_ca_mg_prefers_reported_row() {
        let readings = vec![
            albrecht("Calcium (Mehlich III)", 1200.0, 1300.0),
            albrecht("Magnesium (Mehlich III)", 200.0, 190.0),
            NutrientReading::new("Ca/Mg Ratio", 4.2, 4.0, "", SourceCategory::Albrecht),
        ];
        let ratios = nutrient_ratios(&aggregate(&readings));
        let ca_mg = ratio(&ratios, "Ca/Mg");
        assert_eq!(ca_mg.value, Some(4.2));
        assert_eq!(ca_mg.ideal, 4.0);
        assert_eq!(ca_mg.color, Some(BandColor::Green));
    }

    #[test]
    fn test_ca_mg_computed_without_row() {
        let readings = vec![
            albrecht("Calcium (Mehlich III)", 1200.0, 1300.0),
            albrecht("Magnesium (Mehlich III)", 200.0, 190.0),
        ];
        let ratios = nutrient_ratios(&aggregate(&readings));
        let ca_mg = ratio(&ratios, "Ca/Mg");
        assert_relative_eq!(ca_mg.value.unwrap(), 6.0);
        assert_eq!(ca_mg.ideal, DEFAULT_CA_MG_IDEAL);
        // +79% is outside the band
        assert_eq!(ca_mg.status, Some(NutrientStatus::High));
        assert_eq!(ca_mg.color, Some(BandColor::Blue));
    }

    #[test]
    fn test_zero_denominator_has_no_value() {
        let readings = vec![
            albrecht("Phosphorus (Mehlich III)", 40.0, 60.0),
            albrecht("Zinc (DTPA)", 0.0, 5.0),
        ];
        let ratios = nutrient_ratios(&aggregate(&readings));
        let p_zn = ratio(&ratios, "P/Zn");
        assert_eq!(p_zn.value, None);
        assert_eq!(p_zn.deviation_pct, None);
        assert_eq!(p_zn.color, None);
    }

    #[test]
    fn test_band_edges() {
        let readings = vec![
            albrecht("Magnesium (Mehlich III)", 140.0, 190.0),
            albrecht("Potassium (Mehlich III)", 20.0, 200.0),
            albrecht("Iron (DTPA)", 40.0, 50.0),
            albrecht("Manganese (DTPA)", 50.0, 40.0),
        ];
        let ratios = nutrient_ratios(&aggregate(&readings));

        // 7.0 exactly
        let mg_k = ratio(&ratios, "Mg/K");
        assert_relative_eq!(mg_k.deviation_pct.unwrap(), 0.0);
        assert_eq!(mg_k.color, Some(BandColor::Green));

        // 0.8 vs 1.1 is -27%
        let fe_mn = ratio(&ratios, "Fe/Mn");
        assert_eq!(fe_mn.status, Some(NutrientStatus::Low));
        assert_eq!(fe_mn.color, Some(BandColor::Red));

        // sodium missing
        assert_eq!(ratio(&ratios, "K/Na").value, None);
        assert_eq!(ratios.len(), RATIOS.len());
    }
}
