use proptest::prelude::*;
use soil_report_rust::nutrients::aggregate::find;
use soil_report_rust::nutrients::classify::{classify_range, classify_table};
use soil_report_rust::nutrients::{CanonicalKey, Element, IdealRange, NutrientSlot, SourceCategory};
use soil_report_rust::{aggregate, smooth_score, star_rating, NutrientReading, NutrientStatus};

proptest! {
    #[test]
    fn score_stays_in_bounds(d in -10.0f64..10.0) {
        let score = smooth_score(d);
        prop_assert!((0.0..=100.0).contains(&score));
    }

    #[test]
    fn score_is_symmetric(d in 0.0f64..3.0) {
        prop_assert_eq!(smooth_score(d), smooth_score(-d));
    }

    #[test]
    fn score_non_increasing_in_magnitude(a in 0.0f64..3.0, b in 0.0f64..3.0) {
        let (near, far) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(smooth_score(near) >= smooth_score(far));
    }

    #[test]
    fn score_zero_beyond_cutoff(d in 2.5f64..1000.0, negative in any::<bool>()) {
        let d = if negative { -d } else { d };
        prop_assert_eq!(smooth_score(d), 0.0);
    }

    #[test]
    fn stars_follow_score(a in 0.0f64..=100.0, b in 0.0f64..=100.0) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!((1..=5).contains(&star_rating(low)));
        prop_assert!(star_rating(low) <= star_rating(high));
    }

    #[test]
    fn range_classifier_is_inclusive(low in 0.0f64..100.0, width in 0.1f64..100.0, t in 0.0f64..=1.0) {
        let range = IdealRange::new(low, low + width);
        let inside = low + width * t;
        prop_assert_eq!(classify_range(inside, &range), NutrientStatus::Optimal);
        prop_assert_eq!(classify_range(low - 0.01, &range), NutrientStatus::Low);
        prop_assert_eq!(classify_range(low + width + 0.01, &range), NutrientStatus::High);
    }

    #[test]
    fn table_classifier_band(ideal in 1.0f64..5000.0, ratio in 0.0f64..3.0) {
        let status = classify_table(ideal * ratio, ideal).unwrap();
        if ratio < 0.7 {
            prop_assert_eq!(status, NutrientStatus::Low);
        } else if ratio > 1.3 {
            prop_assert_eq!(status, NutrientStatus::High);
        } else if (0.8..=1.2).contains(&ratio) {
            prop_assert_eq!(status, NutrientStatus::Optimal);
        }
    }

    #[test]
    fn percent_base_saturation_reading_wins(
        percent in 0.1f64..100.0,
        other in 0.1f64..5000.0,
        percent_first in any::<bool>(),
    ) {
        let pct = NutrientReading::new("Calcium", percent, 65.0, "%", SourceCategory::BaseSaturation);
        let ppm = NutrientReading::new("Calcium", other, 1500.0, "meq/100g", SourceCategory::BaseSaturation);
        let readings = if percent_first { vec![pct, ppm] } else { vec![ppm, pct] };

        let nutrients = aggregate(&readings);
        let record = find(&nutrients, &NutrientSlot::primary(SourceCategory::BaseSaturation, Element::Calcium)).unwrap();
        prop_assert_eq!(record.current, Some(percent));
        prop_assert_eq!(record.ideal, Some(65.0));
    }

    #[test]
    fn tae_readings_are_never_merged(tae in 1.0f64..5000.0, mehlich in 1.0f64..5000.0) {
        let readings = vec![
            NutrientReading::new("Calcium (Mehlich III)", mehlich, 1300.0, "ppm", SourceCategory::Albrecht),
            NutrientReading::new("Calcium_TAE", tae, 3000.0, "ppm", SourceCategory::Tae),
        ];
        let nutrients = aggregate(&readings);

        let tae_slot = NutrientSlot::new(SourceCategory::Tae, CanonicalKey::tae(Element::Calcium));
        prop_assert_eq!(find(&nutrients, &tae_slot).unwrap().current, Some(tae));
        let albrecht = NutrientSlot::primary(SourceCategory::Albrecht, Element::Calcium);
        prop_assert_eq!(find(&nutrients, &albrecht).unwrap().current, Some(mehlich));
    }
}

#[test]
fn score_anchor_points() {
    assert_eq!(smooth_score(0.0), 100.0);
    assert!((smooth_score(0.5) - 50.0).abs() < 1e-9);
}
