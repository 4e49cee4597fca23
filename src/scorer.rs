//! Soil Health Scorer - deviation scores, overall score and star rating
//!
//! Each nutrient with a current value and a positive ideal is scored with a
//! smooth decay of its absolute deviation; range-only rows are not scored. The overall score is the mean of those
//! scores; paddock batches are scored in parallel with Rayon and summarised
//! in a Polars table.

use crate::error::{Result, SoilError};
use crate::nutrients::classify::deviation_fraction;
use crate::nutrients::{CanonicalKey, CanonicalNutrient, SourceCategory};
use polars::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

// ============================================================================
// Smooth Score
// ============================================================================

/// Parameters of the smooth decay `100 / (1 + (x/D)^n)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmoothScoreParams {
    /// Deviation (percent) at which the score is 50
    pub half_score_pct: f64,
    /// Steepness exponent
    pub steepness: f64,
    /// Deviation (percent) at and beyond which the score is 0
    pub cutoff_pct: f64,
}

impl Default for SmoothScoreParams {
    fn default() -> Self {
        Self {
            half_score_pct: 50.0,
            steepness: 2.0,
            cutoff_pct: 250.0,
        }
    }
}

/// Score a deviation fraction with the default parameters (D=50, n=2, cutoff=250)
pub fn smooth_score(deviation: f64) -> f64 {
    smooth_score_with(deviation, &SmoothScoreParams::default())
}

/// Score a deviation fraction. `x = |deviation| * 100`; returns 0 when
/// `x >= cutoff`, otherwise `100 / (1 + (x/D)^n)` clamped to [0, 100].
/// NaN propagates so callers can filter it.
pub fn smooth_score_with(deviation: f64, params: &SmoothScoreParams) -> f64 {
    let x = deviation.abs() * 100.0;
    if x.is_nan() {
        return f64::NAN;
    }
    if x >= params.cutoff_pct {
        return 0.0;
    }
    let score = 100.0 / (1.0 + libm::pow(x / params.half_score_pct, params.steepness));
    score.clamp(0.0, 100.0)
}

/// Score of one record; `None` without a current value and a positive ideal
pub fn nutrient_score(nutrient: &CanonicalNutrient) -> Option<f64> {
    let current = nutrient.current?;
    let ideal = nutrient.ideal.filter(|v| *v > 0.0)?;
    let score = smooth_score(deviation_fraction(current, ideal)?);
    if score.is_nan() {
        None
    } else {
        Some(score)
    }
}

// ============================================================================
// Overall Score and Stars
// ============================================================================

/// Score that counts toward the overall mean; a reading shared with another
/// slot counts once
fn counted_score(nutrient: &CanonicalNutrient) -> Option<f64> {
    if nutrient.shared_reading {
        return None;
    }
    nutrient_score(nutrient)
}

/// Mean of per-nutrient scores; 0 when nothing can be scored
pub fn overall_score(nutrients: &[CanonicalNutrient]) -> f64 {
    let scores: Vec<f64> = nutrients.iter().filter_map(counted_score).collect();
    if scores.is_empty() {
        return 0.0;
    }
    scores.iter().sum::<f64>() / scores.len() as f64
}

/// Step function: >=80 -> 5, >=60 -> 4, >=40 -> 3, >=20 -> 2, else 1
pub fn star_rating(score: f64) -> u8 {
    match score {
        s if s >= 80.0 => 5,
        s if s >= 60.0 => 4,
        s if s >= 40.0 => 3,
        s if s >= 20.0 => 2,
        _ => 1,
    }
}

/// "★ ★ ★ ☆ ☆"
pub fn star_display(stars: u8) -> String {
    (0..5u8)
        .map(|i| if i < stars { "★" } else { "☆" })
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NutrientScore {
    pub label: String,
    pub generic_name: CanonicalKey,
    pub category: SourceCategory,
    pub deviation_pct: Option<f64>,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallScore {
    pub score: f64,
    pub stars: u8,
    pub stars_display: String,
    /// Number of nutrients that contributed to the mean
    pub scored_nutrients: usize,
}

impl OverallScore {
    pub fn from_nutrients(nutrients: &[CanonicalNutrient]) -> Self {
        let score = overall_score(nutrients);
        let stars = star_rating(score);
        OverallScore {
            score,
            stars,
            stars_display: star_display(stars),
            scored_nutrients: nutrients.iter().filter_map(counted_score).count(),
        }
    }
}

/// Per-nutrient scores plus the overall result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreCard {
    pub nutrients: Vec<NutrientScore>,
    pub overall: OverallScore,
}

pub fn score_card(nutrients: &[CanonicalNutrient]) -> ScoreCard {
    let scored = nutrients
        .iter()
        .filter_map(|n| {
            counted_score(n).map(|score| NutrientScore {
                label: n.label(),
                generic_name: n.generic_name.clone(),
                category: n.category,
                deviation_pct: n.deviation_pct,
                score,
            })
        })
        .collect();

    ScoreCard {
        nutrients: scored,
        overall: OverallScore::from_nutrients(nutrients),
    }
}

// ============================================================================
// Paddock Summary
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaddockScore {
    pub paddock: String,
    pub overall: OverallScore,
}

/// Score many paddocks in parallel; output order matches input order
pub fn score_paddocks(paddocks: &[(String, Vec<CanonicalNutrient>)]) -> Vec<PaddockScore> {
    paddocks
        .par_iter()
        .map(|(name, nutrients)| PaddockScore {
            paddock: name.clone(),
            overall: OverallScore::from_nutrients(nutrients),
        })
        .collect()
}

/// Summary table (paddock, score, stars) sorted from lowest to highest score
pub fn paddock_summary(scores: &[PaddockScore]) -> Result<DataFrame> {
    let names: Vec<String> = scores.iter().map(|s| s.paddock.clone()).collect();
    let values: Vec<f64> = scores.iter().map(|s| s.overall.score).collect();
    let stars: Vec<u32> = scores.iter().map(|s| s.overall.stars as u32).collect();

    let df = df! {
        "paddock" => names,
        "score" => values,
        "stars" => stars
    }?;

    let sorted = df.lazy().sort(["score"], Default::default()).collect()?;
    Ok(sorted)
}

/// Render a summary table as CSV with a header row
pub fn summary_csv(summary: &mut DataFrame) -> Result<String> {
    let mut buffer: Vec<u8> = Vec::new();
    CsvWriter::new(&mut buffer)
        .include_header(true)
        .finish(summary)?;
    String::from_utf8(buffer).map_err(|e| SoilError::parse("summary csv", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nutrients::{aggregate, NutrientReading};
    use approx::assert_relative_eq;

    #[test]
    fn test_smooth_score_anchor_points() {
        assert_relative_eq!(smooth_score(0.0), 100.0);
        assert_relative_eq!(smooth_score(0.5), 50.0);
        assert_relative_eq!(smooth_score(-0.5), 50.0);
        assert_relative_eq!(smooth_score(1.0), 20.0);
        assert_eq!(smooth_score(2.5), 0.0);
        assert_eq!(smooth_score(-3.0), 0.0);
        assert!(smooth_score(f64::NAN).is_nan());
    }

    #[test]
    fn test_smooth_score_just_below_cutoff() {
        // x = 249: 100 / (1 + 4.98^2) ~ 3.88
        let s = smooth_score(2.49);
        assert!(s > 3.8 && s < 3.9, "{}", s);
    }

    #[test]
    fn test_star_boundaries() {
        assert_eq!(star_rating(100.0), 5);
        assert_eq!(star_rating(80.0), 5);
        assert_eq!(star_rating(79.9), 4);
        assert_eq!(star_rating(60.0), 4);
        assert_eq!(star_rating(40.0), 3);
        assert_eq!(star_rating(20.0), 2);
        assert_eq!(star_rating(19.9), 1);
        assert_eq!(star_rating(0.0), 1);
        assert_eq!(star_display(3), "★ ★ ★ ☆ ☆");
    }

    #[test]
    fn test_all_at_ideal_scores_100() {
        let readings = vec![
            NutrientReading::new("Calcium (Mehlich III)", 1317.0, 1317.0, "ppm", SourceCategory::Albrecht),
            NutrientReading::new("Calcium", 64.0, 64.0, "%", SourceCategory::BaseSaturation),
            NutrientReading::new("Zinc (DTPA)", 5.0, 5.0, "ppm", SourceCategory::Albrecht),
        ];
        let nutrients = aggregate(&readings);
        let overall = OverallScore::from_nutrients(&nutrients);
        assert_relative_eq!(overall.score, 100.0);
        assert_eq!(overall.stars, 5);
        assert_eq!(overall.scored_nutrients, 3);
    }

    #[test]
    fn test_unscorable_nutrients_are_excluded() {
        let mut no_ideal = NutrientReading::new("Boron (Hot CaCl2)", 1.0, 0.0, "ppm", SourceCategory::Albrecht);
        no_ideal.ideal = None;
        let readings = vec![
            NutrientReading::new("Zinc (DTPA)", 5.0, 10.0, "ppm", SourceCategory::Albrecht),
            no_ideal,
        ];
        let nutrients = aggregate(&readings);
        // only zinc counts: 50% deviation
        assert_relative_eq!(overall_score(&nutrients), 50.0);
    }

    #[test]
    fn test_range_only_rows_are_not_scored() {
        let mut organic = NutrientReading::new("Organic Matter (Calc)", 6.0, 0.0, "%", SourceCategory::Albrecht)
            .with_range(4.0, 8.0);
        organic.ideal = None;
        let readings = vec![
            NutrientReading::new("Zinc (DTPA)", 5.0, 10.0, "ppm", SourceCategory::Albrecht),
            organic,
        ];
        let nutrients = aggregate(&readings);

        let om = nutrients.iter().find(|n| n.source_name.as_deref() == Some("Organic Matter (Calc)")).unwrap();
        assert_eq!(nutrient_score(om), None);

        // the range midpoint would have scored 100 and lifted the mean to 75
        assert_relative_eq!(overall_score(&nutrients), 50.0);
        assert_eq!(OverallScore::from_nutrients(&nutrients).scored_nutrients, 1);
    }

    #[test]
    fn test_shared_backfill_reading_counts_once() {
        // bare ppm Calcium fills the Albrecht slot and is back-filled into LaMotte
        let readings = vec![
            NutrientReading::new("Calcium", 750.0, 1500.0, "ppm", SourceCategory::Albrecht),
            NutrientReading::new("Zinc (DTPA)", 10.0, 10.0, "ppm", SourceCategory::Albrecht),
        ];
        let nutrients = aggregate(&readings);
        assert_eq!(nutrients.iter().filter(|n| n.current == Some(750.0)).count(), 2);

        let card = score_card(&nutrients);
        assert_eq!(card.overall.scored_nutrients, 2);
        assert_eq!(card.nutrients.len(), 2);
        // (50 + 100) / 2, not (50 + 50 + 100) / 3
        assert_relative_eq!(card.overall.score, 75.0);
    }

    #[test]
    fn test_empty_set_scores_zero() {
        assert_eq!(overall_score(&[]), 0.0);
        assert_eq!(overall_score(&aggregate(&[])), 0.0);
    }

    #[test]
    fn test_paddock_summary_sorted_ascending() {
        let good = aggregate(&[NutrientReading::new("Zinc (DTPA)", 5.0, 5.0, "ppm", SourceCategory::Albrecht)]);
        let poor = aggregate(&[NutrientReading::new("Zinc (DTPA)", 1.0, 5.0, "ppm", SourceCategory::Albrecht)]);
        let paddocks = vec![("North".to_string(), good), ("South".to_string(), poor)];

        let scores = score_paddocks(&paddocks);
        assert_eq!(scores[0].paddock, "North");
        assert_eq!(scores[1].paddock, "South");

        let mut summary = paddock_summary(&scores).unwrap();
        let names: Vec<String> = summary
            .column("paddock")
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .flatten()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(names, vec!["South", "North"]);

        let csv = summary_csv(&mut summary).unwrap();
        assert!(csv.starts_with("paddock,score,stars"));
        assert!(csv.contains("North"));
    }
}
