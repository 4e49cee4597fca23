//! Report assembly: session state, product lists, soil corrections, tank
//! mix and formatters
//!
//! A `ReportSession` owns everything the user edits between upload and
//! export. `build_report` freezes it into a `SoilReport`, which the
//! formatters render as Markdown or JSON.

pub mod corrections;
pub mod formatters;
pub mod in_flight;
pub mod products;
pub mod session;
pub mod tank_mix;

pub use corrections::{soil_corrections, CorrectionParams, SoilAmendment};
pub use formatters::{JsonFormatter, MarkdownFormatter};
pub use in_flight::{InFlight, InFlightGuard};
pub use products::{ProductItem, ProductLists, ProductStage, ProductUpdate};
pub use session::{ExportFormat, ReportSession, SessionUpdate};
pub use tank_mix::{TankMixItem, TankMixSequence};

use crate::narrative::ReportSection;
use crate::nutrients::{CanonicalNutrient, IdealRange, NutrientRatio, NutrientStatus, SourceCategory};
use crate::scorer::{nutrient_score, OverallScore, PaddockScore};
use crate::thresholds::{BandColor, BarData, ThresholdConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Agronomist {
    pub name: String,
    pub role: String,
    pub email: String,
}

/// One row of the nutrient table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutrientRow {
    pub label: String,
    pub category: SourceCategory,
    pub current: Option<f64>,
    pub ideal: Option<f64>,
    pub ideal_range: Option<IdealRange>,
    pub unit: String,
    pub status: Option<NutrientStatus>,
    pub deviation_pct: Option<f64>,
    pub score: Option<f64>,
    pub color: Option<BandColor>,
}

impl NutrientRow {
    pub fn from_nutrient(nutrient: &CanonicalNutrient, thresholds: &ThresholdConfig) -> Self {
        NutrientRow {
            label: nutrient.label(),
            category: nutrient.category,
            current: nutrient.current,
            ideal: nutrient.ideal,
            ideal_range: nutrient.ideal_range,
            unit: nutrient.unit.clone(),
            status: nutrient.status,
            deviation_pct: nutrient.deviation_pct,
            score: nutrient_score(nutrient),
            color: thresholds.color_for(nutrient),
        }
    }

    /// "1317", "12-18" or "-"
    pub fn target_text(&self) -> String {
        match (self.ideal, self.ideal_range) {
            (Some(ideal), _) => format!("{}", ideal),
            (None, Some(range)) => range.to_string(),
            (None, None) => "-".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionText {
    pub section: ReportSection,
    pub title: String,
    pub text: String,
}

/// Frozen, render-ready report for one paddock
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoilReport {
    pub client_name: String,
    pub crop: String,
    pub report_date: String,
    pub agronomist: Agronomist,
    pub paddock: String,
    pub overall: OverallScore,
    pub sections: Vec<SectionText>,
    pub nutrients: Vec<NutrientRow>,
    pub ratios: Vec<NutrientRatio>,
    pub bars: Vec<BarData>,
    pub products: ProductLists,
    /// Fertilizer corrections; computed from the nutrients unless set by hand
    pub soil_amendments: Vec<SoilAmendment>,
    pub tank_mix: Vec<TankMixItem>,
    /// All paddocks of the upload, lowest score first
    pub paddock_scores: Vec<PaddockScore>,
    pub footer: String,
    pub warnings: Vec<String>,
}
