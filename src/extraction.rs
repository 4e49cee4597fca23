//! Extraction payload of an uploaded lab report
//!
//! The extraction backend returns one analysis per nutrient table, each with
//! loosely typed rows. This module turns that payload into per-paddock
//! readings: values are parsed leniently, missing categories are inferred
//! from the name and unit, and analyses sharing a paddock name are merged.

use crate::error::{Result, SoilError};
use crate::narrative::CachedComments;
use crate::narrative::ReportSection;
use crate::nutrients::names::BASE_SATURATION_ELEMENTS;
use crate::nutrients::{
    measurement, normalize_name, parse_measurement, IdealRange, NutrientReading, SourceCategory,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionResponse {
    #[serde(default)]
    pub analyses: Vec<Analysis>,
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub lamotte: Option<LamottePayload>,
    /// Pre-written section commentary keyed by paddock, then section title
    #[serde(default)]
    pub nutrient_overview: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Analysis {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub nutrients: Vec<RawNutrient>,
    #[serde(default)]
    pub info: AnalysisInfo,
}

/// Header metadata; the backend writes "Unknown" for fields it cannot find
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub crop: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub paddock: Option<String>,
}

fn known(field: &Option<String>) -> Option<&str> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("unknown"))
}

impl AnalysisInfo {
    /// Paddock label: the paddock field, else the analysis name, else "Paddock N"
    pub fn paddock_name(&self, index: usize) -> String {
        known(&self.paddock)
            .or_else(|| known(&self.name))
            .map(str::to_string)
            .unwrap_or_else(|| format!("Paddock {}", index + 1))
    }

    pub fn crop(&self) -> Option<&str> {
        known(&self.crop)
    }

    pub fn date(&self) -> Option<&str> {
        known(&self.date)
    }
}

/// One extracted table row
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawNutrient {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "measurement::deserialize")]
    pub current: Option<f64>,
    #[serde(default, deserialize_with = "measurement::deserialize")]
    pub ideal: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    /// Printed range such as "1200 - 1800"
    #[serde(default)]
    pub range: Option<String>,
    #[serde(default)]
    pub ideal_range: Option<Value>,
    #[serde(default)]
    pub category: Option<String>,
}

/// Category of a row the backend left untagged
pub fn infer_category(name: &str, unit: &str) -> SourceCategory {
    let lower = name.trim().to_lowercase();
    if lower.contains("lamotte") {
        return SourceCategory::LamotteReams;
    }
    if lower.ends_with("_tae") || lower.ends_with(" tae") || lower.contains("(tae)") || lower.starts_with("tae ") {
        return SourceCategory::Tae;
    }
    if unit.trim() == "%" && !name.contains('(') {
        let is_base = normalize_name(name)
            .element()
            .is_some_and(|e| BASE_SATURATION_ELEMENTS.contains(&e));
        if is_base {
            return SourceCategory::BaseSaturation;
        }
    }
    SourceCategory::Albrecht
}

/// Parse "low - high"; the bounds may carry units
pub fn parse_range(text: &str) -> Option<IdealRange> {
    let (low, high) = text.split_once('-')?;
    Some(IdealRange::new(parse_measurement(low)?, parse_measurement(high)?))
}

impl RawNutrient {
    pub fn unit(&self) -> &str {
        self.unit.as_deref().unwrap_or("").trim()
    }

    pub fn category(&self) -> SourceCategory {
        self.category
            .as_deref()
            .and_then(SourceCategory::parse)
            .unwrap_or_else(|| infer_category(&self.name, self.unit()))
    }

    pub fn ideal_range(&self) -> Option<IdealRange> {
        self.ideal_range
            .as_ref()
            .and_then(IdealRange::from_value)
            .or_else(|| self.range.as_deref().and_then(parse_range))
    }

    /// `None` for rows without a name
    pub fn to_reading(&self) -> Option<NutrientReading> {
        let name = self.name.trim();
        if name.is_empty() {
            return None;
        }
        Some(NutrientReading {
            name: name.to_string(),
            current: self.current,
            ideal: self.ideal.filter(|v| *v > 0.0),
            ideal_range: self.ideal_range(),
            unit: self.unit().to_string(),
            category: self.category(),
        })
    }
}

// ============================================================================
// LaMotte Selection
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LamottePayload {
    #[serde(default)]
    pub candidates: Vec<LamotteCandidate>,
    /// P, Ca, Mg, K in that order; null when not found
    #[serde(default)]
    pub selected: Vec<Option<LamotteCandidate>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LamotteCandidate {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "measurement::deserialize")]
    pub current: Option<f64>,
    #[serde(default, deserialize_with = "measurement::deserialize")]
    pub ideal: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub raw_name: Option<String>,
}

impl LamotteCandidate {
    pub fn to_reading(&self) -> Option<NutrientReading> {
        let base = self.name.trim();
        if base.is_empty() {
            return None;
        }
        Some(NutrientReading {
            name: format!("{}_LaMotte", base),
            current: self.current,
            ideal: self.ideal.filter(|v| *v > 0.0),
            ideal_range: None,
            unit: self.unit.clone().unwrap_or_else(|| "ppm".to_string()),
            category: SourceCategory::LamotteReams,
        })
    }
}

impl LamottePayload {
    pub fn selected_readings(&self) -> Vec<NutrientReading> {
        self.selected
            .iter()
            .flatten()
            .filter_map(LamotteCandidate::to_reading)
            .collect()
    }
}

// ============================================================================
// Paddocks
// ============================================================================

/// Readings of one paddock plus any commentary shipped with the upload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Paddock {
    pub name: String,
    pub crop: Option<String>,
    pub date: Option<String>,
    pub readings: Vec<NutrientReading>,
    #[serde(default)]
    pub comments: BTreeMap<ReportSection, String>,
}

impl ExtractionResponse {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| SoilError::parse("extraction response", e.to_string()))
    }

    /// Group analyses by paddock, in first-seen order.
    ///
    /// Backend-selected LaMotte values are only attributable when the upload
    /// holds a single paddock; otherwise the aggregator's own scan applies.
    pub fn paddocks(&self) -> Result<Vec<Paddock>> {
        if self.analyses.is_empty() {
            return Err(SoilError::InvalidInput("extraction contains no analyses".to_string()));
        }

        let mut paddocks: Vec<Paddock> = Vec::new();
        for (index, analysis) in self.analyses.iter().enumerate() {
            let name = analysis.info.paddock_name(index);
            let position = match paddocks.iter().position(|p| p.name == name) {
                Some(position) => position,
                None => {
                    paddocks.push(Paddock {
                        name: name.clone(),
                        crop: analysis.info.crop().map(str::to_string),
                        date: analysis.info.date().map(str::to_string),
                        ..Default::default()
                    });
                    paddocks.len() - 1
                }
            };

            let before = analysis.nutrients.len();
            let readings: Vec<NutrientReading> =
                analysis.nutrients.iter().filter_map(RawNutrient::to_reading).collect();
            if readings.len() < before {
                tracing::debug!("Analysis {}: skipped {} unnamed rows", analysis.id, before - readings.len());
            }
            paddocks[position].readings.extend(readings);
        }

        if let (Some(lamotte), [paddock]) = (&self.lamotte, paddocks.as_mut_slice()) {
            paddock.readings.extend(lamotte.selected_readings());
        }

        if let Some(overview) = &self.nutrient_overview {
            for paddock in &mut paddocks {
                if let Some(cached) = overview.get(&paddock.name).and_then(CachedComments::from_value) {
                    paddock.comments = cached.0;
                }
            }
        }

        tracing::info!(
            "Loaded {} analyses into {} paddock(s)",
            self.analyses.len(),
            paddocks.len()
        );
        Ok(paddocks)
    }
}
