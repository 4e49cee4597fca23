//! Nutrient aggregation across lab sub-reports.
//!
//! Readings arrive from four panels (Albrecht, base saturation, LaMotte/Reams,
//! TAE) under inconsistent names. Aggregation resolves each reading to a
//! [`NutrientSlot`], keeps one reading per slot, and emits every known slot in
//! a fixed order, empty where nothing resolved.
//!
//! Duplicate resolution per panel:
//! - Base saturation: a `%` reading replaces any other unit
//! - Albrecht: the best main testing method wins (Mehlich III first)
//! - LaMotte/TAE: first reading wins; TAE never competes with other panels

use super::names::{
    is_mehlich, normalize_name, Element, MainMethod, Series, BASE_SATURATION_ELEMENTS,
    LAMOTTE_ELEMENTS, TAE_ELEMENTS,
};
use super::{CanonicalKey, CanonicalNutrient, NutrientReading, NutrientSlot, SourceCategory};
use rustc_hash::FxHashMap;

/// Albrecht panel, in report order
pub const ALBRECHT_ELEMENTS: &[Element] = &[
    Element::Cec,
    Element::Tec,
    Element::Paramagnetism,
    Element::Ph,
    Element::OrganicMatter,
    Element::OrganicCarbon,
    Element::Conductivity,
    Element::CaMgRatio,
    Element::Nitrate,
    Element::Ammonium,
    Element::Phosphorus,
    Element::Calcium,
    Element::Magnesium,
    Element::Potassium,
    Element::Sodium,
    Element::Sulphur,
    Element::Aluminium,
    Element::Silicon,
    Element::Boron,
    Element::Iron,
    Element::Manganese,
    Element::Copper,
    Element::Zinc,
];

/// LaMotte readings above this are taken to be another method's ppm value
pub const LAMOTTE_MAX_PPM: f64 = 1000.0;

/// Window of LaMotte Phosphorus targets (ppm)
pub const LAMOTTE_PHOSPHORUS_WINDOW: (f64, f64) = (7.0, 30.0);

/// Every slot that is always rendered, in report order
pub fn canonical_slots() -> Vec<NutrientSlot> {
    let albrecht = ALBRECHT_ELEMENTS
        .iter()
        .map(|&e| NutrientSlot::primary(SourceCategory::Albrecht, e));
    let base_saturation = BASE_SATURATION_ELEMENTS
        .iter()
        .map(|&e| NutrientSlot::primary(SourceCategory::BaseSaturation, e));
    let lamotte = LAMOTTE_ELEMENTS
        .iter()
        .map(|&e| NutrientSlot::new(SourceCategory::LamotteReams, CanonicalKey::lamotte(e)));
    let tae = TAE_ELEMENTS
        .iter()
        .map(|&e| NutrientSlot::new(SourceCategory::Tae, CanonicalKey::tae(e)));

    albrecht.chain(base_saturation).chain(lamotte).chain(tae).collect()
}

/// Slot a reading belongs to. The series implied by the name wins over an
/// Albrecht tag ("Calcium_TAE" tagged albrecht is still TAE).
pub fn slot_for(reading: &NutrientReading) -> NutrientSlot {
    let key = normalize_name(&reading.name);
    match (reading.category, key.series()) {
        (SourceCategory::Tae, _) | (_, Some(Series::Tae)) => {
            NutrientSlot::new(SourceCategory::Tae, key.with_series(Series::Tae))
        }
        (SourceCategory::LamotteReams, _) | (_, Some(Series::LaMotte)) => {
            NutrientSlot::new(SourceCategory::LamotteReams, key.with_series(Series::LaMotte))
        }
        (SourceCategory::BaseSaturation, _) => {
            NutrientSlot::new(SourceCategory::BaseSaturation, key.with_series(Series::Primary))
        }
        (SourceCategory::Albrecht, _) => NutrientSlot::new(SourceCategory::Albrecht, key),
    }
}

/// Whether `candidate` should replace `existing` in a slot of `category`
fn prefer(category: SourceCategory, existing: &NutrientReading, candidate: &NutrientReading) -> bool {
    if existing.current.is_none() && candidate.current.is_some() {
        return true;
    }
    if existing.current.is_some() && candidate.current.is_none() {
        return false;
    }
    match category {
        SourceCategory::BaseSaturation => candidate.is_percent() && !existing.is_percent(),
        SourceCategory::Albrecht => MainMethod::rank(&candidate.name) < MainMethod::rank(&existing.name),
        SourceCategory::LamotteReams | SourceCategory::Tae => false,
    }
}

/// Merge readings from all panels into one record per slot.
///
/// Known slots come first in report order (empty when unresolved), followed
/// by any other slots in first-seen order.
pub fn aggregate(readings: &[NutrientReading]) -> Vec<CanonicalNutrient> {
    let mut selected: FxHashMap<NutrientSlot, &NutrientReading> = FxHashMap::default();
    let mut seen_order: Vec<NutrientSlot> = Vec::new();

    for reading in readings {
        let slot = slot_for(reading);
        match selected.get(&slot) {
            Some(existing) => {
                if prefer(slot.category, existing, reading) {
                    tracing::debug!(
                        "{}: '{}' replaces '{}'",
                        slot, reading.name, existing.name
                    );
                    selected.insert(slot, reading);
                }
            }
            None => {
                seen_order.push(slot.clone());
                selected.insert(slot, reading);
            }
        }
    }

    // back-filled slots whose reading already fills another slot
    let mut shared: Vec<NutrientSlot> = Vec::new();
    for &element in LAMOTTE_ELEMENTS {
        let slot = NutrientSlot::new(SourceCategory::LamotteReams, CanonicalKey::lamotte(element));
        if selected.contains_key(&slot) {
            continue;
        }
        if let Some(reading) = lamotte_candidate(element, readings) {
            tracing::debug!("{} filled from '{}'", slot, reading.name);
            if selected.values().any(|r| std::ptr::eq(*r, reading)) {
                shared.push(slot.clone());
            }
            selected.insert(slot, reading);
        }
    }

    let known = canonical_slots();
    let mut nutrients: Vec<CanonicalNutrient> = known
        .iter()
        .map(|slot| match selected.get(slot) {
            Some(reading) => {
                let mut nutrient = CanonicalNutrient::from_reading(slot.clone(), reading);
                nutrient.shared_reading = shared.contains(slot);
                nutrient
            }
            None => CanonicalNutrient::empty(slot.clone()),
        })
        .collect();

    for slot in seen_order {
        if known.contains(&slot) {
            continue;
        }
        if let Some(reading) = selected.get(&slot) {
            nutrients.push(CanonicalNutrient::from_reading(slot, reading));
        }
    }

    nutrients
}

/// Scan unlabelled ppm readings for a LaMotte value of `element`.
///
/// Ca, Mg, K: a reading named exactly after the element, not TAE, not
/// Mehlich-qualified, at most 1000 ppm. Phosphorus: prefer a candidate whose
/// target sits in the LaMotte window (7-30 ppm) or that is tagged LaMotte,
/// else the first ppm Phosphorus reading.
pub fn lamotte_candidate(element: Element, readings: &[NutrientReading]) -> Option<&NutrientReading> {
    let eligible = |r: &&NutrientReading| {
        r.category != SourceCategory::Tae && r.is_ppm() && !is_mehlich(&r.name) && r.current.is_some()
    };

    match element {
        Element::Phosphorus => {
            let candidates: Vec<&NutrientReading> = readings
                .iter()
                .filter(eligible)
                .filter(|r| r.name.to_lowercase().contains("phosphorus"))
                .collect();
            candidates
                .iter()
                .copied()
                .find(|r| looks_like_lamotte_phosphorus(r))
                .or_else(|| candidates.first().copied())
        }
        _ => readings.iter().filter(eligible).find(|r| {
            r.name.trim().eq_ignore_ascii_case(element.key())
                && r.current.map_or(false, |c| c <= LAMOTTE_MAX_PPM)
        }),
    }
}

fn looks_like_lamotte_phosphorus(reading: &NutrientReading) -> bool {
    let (low, high) = LAMOTTE_PHOSPHORUS_WINDOW;
    reading.category == SourceCategory::LamotteReams
        || reading.name.to_lowercase().contains("lamotte")
        || reading.ideal.map_or(false, |i| (low..=high).contains(&i))
        || reading.ideal_range.map_or(false, |r| r.within(low, high))
}

/// Find the record for a slot
pub fn find<'a>(nutrients: &'a [CanonicalNutrient], slot: &NutrientSlot) -> Option<&'a CanonicalNutrient> {
    nutrients
        .iter()
        .find(|n| n.category == slot.category && n.generic_name == slot.key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nutrients::NutrientStatus;

    fn slot(category: SourceCategory, element: Element) -> NutrientSlot {
        NutrientSlot::primary(category, element)
    }

    #[test]
    fn test_cross_category_same_name_do_not_collide() {
        let readings = vec![
            NutrientReading::new("Calcium (Mehlich III)", 1030.0, 1317.0, "ppm", SourceCategory::Albrecht),
            NutrientReading::new("Calcium", 81.05, 64.0, "%", SourceCategory::BaseSaturation),
        ];
        let nutrients = aggregate(&readings);

        let albrecht = find(&nutrients, &slot(SourceCategory::Albrecht, Element::Calcium)).unwrap();
        assert_eq!(albrecht.current, Some(1030.0));
        assert_eq!(albrecht.ideal, Some(1317.0));
        assert_eq!(albrecht.unit, "ppm");

        let base = find(&nutrients, &slot(SourceCategory::BaseSaturation, Element::Calcium)).unwrap();
        assert_eq!(base.current, Some(81.05));
        assert_eq!(base.ideal, Some(64.0));
        assert_eq!(base.unit, "%");
    }

    #[test]
    fn test_base_saturation_percent_wins() {
        let readings = vec![
            NutrientReading::new("Magnesium", 3.2, 2.5, "meq/100g", SourceCategory::BaseSaturation),
            NutrientReading::new("Magnesium", 14.0, 15.0, "%", SourceCategory::BaseSaturation),
            NutrientReading::new("Magnesium", 5.0, 2.5, "cmol/kg", SourceCategory::BaseSaturation),
        ];
        let nutrients = aggregate(&readings);
        let mg = find(&nutrients, &slot(SourceCategory::BaseSaturation, Element::Magnesium)).unwrap();
        assert_eq!(mg.current, Some(14.0));
        assert_eq!(mg.unit, "%");
    }

    #[test]
    fn test_main_method_priority() {
        let readings = vec![
            NutrientReading::new("Sulphur (1:5 water)", 4.0, 10.0, "ppm", SourceCategory::Albrecht),
            NutrientReading::new("Sulfur (KCl)", 8.0, 10.0, "ppm", SourceCategory::Albrecht),
            NutrientReading::new("Sulphur", 99.0, 10.0, "ppm", SourceCategory::Albrecht),
        ];
        let nutrients = aggregate(&readings);
        let s = find(&nutrients, &slot(SourceCategory::Albrecht, Element::Sulphur)).unwrap();
        assert_eq!(s.current, Some(8.0));
        assert_eq!(s.source_name.as_deref(), Some("Sulfur (KCl)"));
    }

    #[test]
    fn test_tae_kept_separate() {
        let readings = vec![
            NutrientReading::new("Potassium (Mehlich III)", 180.0, 200.0, "ppm", SourceCategory::Albrecht),
            NutrientReading::new("Potassium", 2400.0, 3000.0, "ppm", SourceCategory::Tae),
            NutrientReading::new("Zinc", 40.0, 50.0, "ppm", SourceCategory::Tae),
        ];
        let nutrients = aggregate(&readings);

        let k = find(&nutrients, &slot(SourceCategory::Albrecht, Element::Potassium)).unwrap();
        assert_eq!(k.current, Some(180.0));

        let tae_slot = NutrientSlot::new(SourceCategory::Tae, CanonicalKey::tae(Element::Potassium));
        let k_tae = find(&nutrients, &tae_slot).unwrap();
        assert_eq!(k_tae.current, Some(2400.0));
        assert_eq!(k_tae.generic_name.to_string(), "Potassium_TAE");

        let zn_slot = NutrientSlot::new(SourceCategory::Tae, CanonicalKey::tae(Element::Zinc));
        assert_eq!(find(&nutrients, &zn_slot).unwrap().current, Some(40.0));
    }

    #[test]
    fn test_every_known_slot_is_emitted() {
        let nutrients = aggregate(&[]);
        assert_eq!(nutrients.len(), canonical_slots().len());
        assert!(nutrients.iter().all(|n| n.is_empty() && n.ideal.is_none()));
    }

    #[test]
    fn test_unrecognised_readings_are_appended() {
        let readings = vec![NutrientReading::new("Vanadium (XRF)", 3.0, 2.0, "ppm", SourceCategory::Albrecht)];
        let nutrients = aggregate(&readings);
        let last = nutrients.last().unwrap();
        assert_eq!(last.generic_name, CanonicalKey::Other("Vanadium (XRF)".to_string()));
        assert_eq!(last.status, Some(NutrientStatus::High));
    }

    #[test]
    fn test_lamotte_scan_for_bare_element() {
        let readings = vec![
            NutrientReading::new("Calcium (Mehlich III)", 1030.0, 1317.0, "ppm", SourceCategory::Albrecht),
            NutrientReading::new("Calcium", 2500.0, 1500.0, "ppm", SourceCategory::Albrecht),
            NutrientReading::new("Calcium", 934.0, 1500.0, "ppm", SourceCategory::Albrecht),
        ];
        let nutrients = aggregate(&readings);
        let slot = NutrientSlot::new(SourceCategory::LamotteReams, CanonicalKey::lamotte(Element::Calcium));
        assert_eq!(find(&nutrients, &slot).unwrap().current, Some(934.0));
    }

    #[test]
    fn test_backfill_marks_reading_shared_with_albrecht_slot() {
        // the bare ppm reading is both the Albrecht Calcium and the LaMotte Calcium
        let readings = vec![NutrientReading::new("Calcium", 934.0, 1500.0, "ppm", SourceCategory::Albrecht)];
        let nutrients = aggregate(&readings);

        let albrecht = find(&nutrients, &slot(SourceCategory::Albrecht, Element::Calcium)).unwrap();
        assert_eq!(albrecht.current, Some(934.0));
        assert!(!albrecht.shared_reading);

        let lamotte_slot = NutrientSlot::new(SourceCategory::LamotteReams, CanonicalKey::lamotte(Element::Calcium));
        let lamotte = find(&nutrients, &lamotte_slot).unwrap();
        assert_eq!(lamotte.current, Some(934.0));
        assert!(lamotte.shared_reading);
    }

    #[test]
    fn test_backfill_from_unused_reading_is_not_shared() {
        let readings = vec![
            NutrientReading::new("Calcium (Mehlich III)", 1030.0, 1317.0, "ppm", SourceCategory::Albrecht),
            NutrientReading::new("Calcium", 934.0, 1500.0, "ppm", SourceCategory::Albrecht),
        ];
        let nutrients = aggregate(&readings);
        let lamotte_slot = NutrientSlot::new(SourceCategory::LamotteReams, CanonicalKey::lamotte(Element::Calcium));
        assert!(!find(&nutrients, &lamotte_slot).unwrap().shared_reading);
    }

    #[test]
    fn test_lamotte_phosphorus_prefers_window() {
        let readings = vec![
            NutrientReading::new("Phosphorus", 60.0, 80.0, "ppm", SourceCategory::Albrecht),
            NutrientReading::new("Phosphorus", 7.7, 18.5, "ppm", SourceCategory::Albrecht).with_range(7.0, 30.0),
        ];
        let nutrients = aggregate(&readings);
        let slot = NutrientSlot::new(SourceCategory::LamotteReams, CanonicalKey::lamotte(Element::Phosphorus));
        assert_eq!(find(&nutrients, &slot).unwrap().current, Some(7.7));
    }

    #[test]
    fn test_lamotte_phosphorus_falls_back_to_any_ppm() {
        let readings = vec![NutrientReading::new("Phosphorus", 60.0, 80.0, "ppm", SourceCategory::Albrecht)];
        let nutrients = aggregate(&readings);
        let slot = NutrientSlot::new(SourceCategory::LamotteReams, CanonicalKey::lamotte(Element::Phosphorus));
        assert_eq!(find(&nutrients, &slot).unwrap().current, Some(60.0));
    }

    #[test]
    fn test_explicit_lamotte_reading_beats_scan() {
        let readings = vec![
            NutrientReading::new("Potassium", 70.0, 90.0, "ppm", SourceCategory::Albrecht),
            NutrientReading::new("LaMotte Potassium", 62.0, 90.0, "ppm", SourceCategory::LamotteReams),
        ];
        let nutrients = aggregate(&readings);
        let slot = NutrientSlot::new(SourceCategory::LamotteReams, CanonicalKey::lamotte(Element::Potassium));
        assert_eq!(find(&nutrients, &slot).unwrap().current, Some(62.0));
    }
}
