//! Report Session - all state edited between upload and export
//!
//! One owned value replaces scattered UI state: `load` ingests an
//! extraction, `update` applies partial edits, `reset` starts over. Upload,
//! comment generation and export each hold an in-flight flag so a duplicate
//! call is rejected while the first is running.

use super::formatters::{JsonFormatter, MarkdownFormatter};
use super::in_flight::{InFlight, InFlightGuard};
use super::corrections::{soil_corrections, CorrectionParams, SoilAmendment};
use super::products::ProductLists;
use super::tank_mix::TankMixSequence;
use super::{Agronomist, NutrientRow, SectionText, SoilReport};
use crate::error::{Result, SoilError};
use crate::extraction::{ExtractionResponse, Paddock};
use crate::narrative::{generate_section_comments, CachedComments, CommentSource, ReportSection, SectionComments};
use crate::nutrients::{aggregate, nutrient_ratios, CanonicalNutrient};
use crate::scorer::{score_card, score_paddocks, OverallScore, ScoreCard};
use crate::thresholds::{bar_data, ThresholdConfig, ThresholdUpdate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_FOOTER: &str = "Disclaimer: Any recommendations provided are advice only. As no control can be \
exercised over storage, handling, mixing, application or use, weather, plant or soil conditions before, during \
or after application, no responsibility or liability for any failure in performance, losses, damages or injuries \
(consequential or otherwise) arising from such storage, mixing, application or use will be accepted. The buyer \
assumes all responsibility for the use of any product.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Markdown,
    Json,
}

impl ExportFormat {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_lowercase().as_str() {
            "markdown" | "md" => Some(ExportFormat::Markdown),
            "json" => Some(ExportFormat::Json),
            _ => None,
        }
    }
}

/// Partial edit of the session; absent fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUpdate {
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub crop: Option<String>,
    #[serde(default)]
    pub report_date: Option<String>,
    #[serde(default)]
    pub agronomist: Option<Agronomist>,
    #[serde(default)]
    pub footer: Option<String>,
    #[serde(default)]
    pub selected_paddock: Option<String>,
    /// Section texts for the selected paddock
    #[serde(default)]
    pub section_texts: Option<BTreeMap<ReportSection, String>>,
    /// Threshold edits keyed by nutrient label
    #[serde(default)]
    pub thresholds: Option<BTreeMap<String, ThresholdUpdate>>,
    /// Hand-picked soil amendments; an empty list restores the computed ones
    #[serde(default)]
    pub soil_amendments: Option<Vec<SoilAmendment>>,
}

#[derive(Debug)]
pub struct ReportSession {
    pub client_name: String,
    pub crop: String,
    pub report_date: String,
    pub agronomist: Agronomist,
    pub footer: String,
    pub thresholds: ThresholdConfig,
    pub products: ProductLists,
    pub tank_mix: TankMixSequence,
    /// Manual soil amendments; when empty the report computes them
    pub soil_amendments: Vec<SoilAmendment>,
    pub correction_params: CorrectionParams,
    paddocks: Vec<Paddock>,
    selected: usize,
    warnings: Vec<String>,
    /// Thresholds restored by `reset`
    base_thresholds: ThresholdConfig,
    upload: InFlight,
    generation: InFlight,
    export: InFlight,
}

impl Default for ReportSession {
    fn default() -> Self {
        ReportSession::new(ThresholdConfig::default())
    }
}

impl ReportSession {
    pub fn new(thresholds: ThresholdConfig) -> Self {
        ReportSession {
            client_name: String::new(),
            crop: String::new(),
            report_date: String::new(),
            agronomist: Agronomist::default(),
            footer: DEFAULT_FOOTER.to_string(),
            thresholds: thresholds.clone(),
            products: ProductLists::default(),
            tank_mix: TankMixSequence::default(),
            soil_amendments: Vec::new(),
            correction_params: CorrectionParams::default(),
            paddocks: Vec::new(),
            selected: 0,
            warnings: Vec::new(),
            base_thresholds: thresholds,
            upload: InFlight::new("upload"),
            generation: InFlight::new("comment generation"),
            export: InFlight::new("export"),
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Replace the paddocks with those of a new extraction; returns the
    /// paddock count. Crop and date fill in only when still blank.
    pub fn load(&mut self, extraction: &ExtractionResponse) -> Result<usize> {
        let _guard = self.upload.try_begin()?;
        let paddocks = extraction.paddocks()?;

        if self.crop.is_empty() {
            if let Some(crop) = paddocks.iter().find_map(|p| p.crop.clone()) {
                self.crop = crop;
            }
        }
        if self.report_date.is_empty() {
            if let Some(date) = paddocks.iter().find_map(|p| p.date.clone()) {
                self.report_date = date;
            }
        }

        self.paddocks = paddocks;
        self.selected = 0;
        self.warnings.clear();
        tracing::info!("Session loaded {} paddock(s)", self.paddocks.len());
        Ok(self.paddocks.len())
    }

    pub fn load_json(&mut self, text: &str) -> Result<usize> {
        let extraction = ExtractionResponse::from_json(text)?;
        self.load(&extraction)
    }

    pub fn update(&mut self, update: SessionUpdate) -> Result<()> {
        if let Some(name) = &update.selected_paddock {
            self.select_paddock(name)?;
        }
        if let Some(texts) = update.section_texts {
            for (section, text) in texts {
                self.set_section_text(section, &text)?;
            }
        }
        if let Some(overrides) = update.thresholds {
            self.thresholds.apply_overrides(&overrides);
        }
        if let Some(client_name) = update.client_name {
            self.client_name = client_name;
        }
        if let Some(crop) = update.crop {
            self.crop = crop;
        }
        if let Some(report_date) = update.report_date {
            self.report_date = report_date;
        }
        if let Some(agronomist) = update.agronomist {
            self.agronomist = agronomist;
        }
        if let Some(footer) = update.footer {
            self.footer = footer;
        }
        if let Some(amendments) = update.soil_amendments {
            self.soil_amendments = amendments;
        }
        Ok(())
    }

    /// Back to a fresh session with the configured thresholds
    pub fn reset(&mut self) {
        *self = ReportSession::new(self.base_thresholds.clone());
    }

    pub fn begin_upload(&self) -> Result<InFlightGuard> {
        self.upload.try_begin()
    }

    pub fn begin_generation(&self) -> Result<InFlightGuard> {
        self.generation.try_begin()
    }

    pub fn begin_export(&self) -> Result<InFlightGuard> {
        self.export.try_begin()
    }

    // ========================================================================
    // Paddocks and Nutrients
    // ========================================================================

    pub fn paddock_names(&self) -> Vec<&str> {
        self.paddocks.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn select_paddock(&mut self, name: &str) -> Result<()> {
        let index = self
            .paddocks
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| SoilError::InvalidInput(format!("unknown paddock '{}'", name)))?;
        self.selected = index;
        Ok(())
    }

    pub fn selected_paddock(&self) -> Option<&Paddock> {
        self.paddocks.get(self.selected)
    }

    fn selected_paddock_mut(&mut self) -> Result<&mut Paddock> {
        self.paddocks
            .get_mut(self.selected)
            .ok_or_else(|| SoilError::InvalidInput("no paddock loaded".to_string()))
    }

    /// Canonical projection of the selected paddock
    pub fn nutrients(&self) -> Vec<CanonicalNutrient> {
        self.selected_paddock()
            .map(|p| aggregate(&p.readings))
            .unwrap_or_default()
    }

    pub fn summary(&self) -> OverallScore {
        OverallScore::from_nutrients(&self.nutrients())
    }

    pub fn score_card(&self) -> ScoreCard {
        score_card(&self.nutrients())
    }

    /// Manual amendments when set, else fertilizer corrections for the
    /// selected paddock
    pub fn soil_amendments(&self) -> Vec<SoilAmendment> {
        if !self.soil_amendments.is_empty() {
            return self.soil_amendments.clone();
        }
        soil_corrections(&self.nutrients(), &self.correction_params)
    }

    // ========================================================================
    // Narrative
    // ========================================================================

    pub fn section_text(&self, section: ReportSection) -> Option<&str> {
        self.selected_paddock()
            .and_then(|p| p.comments.get(&section))
            .map(|s| s.as_str())
    }

    pub fn set_section_text(&mut self, section: ReportSection, text: &str) -> Result<()> {
        self.selected_paddock_mut()?
            .comments
            .insert(section, text.to_string());
        Ok(())
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Fill every section of the selected paddock; failures fall back to the
    /// template and surface as a warning
    pub async fn generate_comments(
        &mut self,
        source: &dyn CommentSource,
        cached: Option<&CachedComments>,
    ) -> Result<SectionComments> {
        let _guard = self.generation.try_begin()?;
        if self.paddocks.is_empty() {
            return Err(SoilError::InvalidInput("no paddock loaded".to_string()));
        }

        let nutrients = self.nutrients();
        let result = generate_section_comments(source, &nutrients, cached).await;
        self.apply_comments(&result)?;
        Ok(result)
    }

    pub fn apply_comments(&mut self, comments: &SectionComments) -> Result<()> {
        let paddock = self.selected_paddock_mut()?;
        for (section, text) in &comments.comments {
            paddock.comments.insert(*section, text.clone());
        }
        self.warnings = comments.warning().into_iter().collect();
        Ok(())
    }

    // ========================================================================
    // Report
    // ========================================================================

    pub fn build_report(&self) -> Result<SoilReport> {
        let paddock = self
            .selected_paddock()
            .ok_or_else(|| SoilError::InvalidInput("no paddock loaded".to_string()))?;
        let nutrients = aggregate(&paddock.readings);

        let sections = ReportSection::ALL
            .iter()
            .filter_map(|&section| {
                let text = match paddock.comments.get(&section) {
                    Some(text) => text.clone(),
                    None if !section.nutrients(&nutrients).is_empty() => format!(
                        "{} analysis will be generated based on your uploaded data.",
                        section.display_text()
                    ),
                    None => return None,
                };
                Some(SectionText {
                    section,
                    title: section.display_text().to_string(),
                    text,
                })
            })
            .collect();

        let populated: Vec<&CanonicalNutrient> = nutrients.iter().filter(|n| !n.is_empty()).collect();
        let rows = populated
            .iter()
            .map(|n| NutrientRow::from_nutrient(n, &self.thresholds))
            .collect();
        let bars = populated
            .iter()
            .filter_map(|n| bar_data(n, &self.thresholds))
            .collect();

        let batches: Vec<(String, Vec<CanonicalNutrient>)> = self
            .paddocks
            .iter()
            .map(|p| (p.name.clone(), aggregate(&p.readings)))
            .collect();
        let mut paddock_scores = score_paddocks(&batches);
        paddock_scores.sort_by(|a, b| a.overall.score.total_cmp(&b.overall.score));

        let crop = if self.crop.is_empty() {
            paddock.crop.clone().unwrap_or_default()
        } else {
            self.crop.clone()
        };

        Ok(SoilReport {
            client_name: self.client_name.clone(),
            crop,
            report_date: self.report_date.clone(),
            agronomist: self.agronomist.clone(),
            paddock: paddock.name.clone(),
            overall: OverallScore::from_nutrients(&nutrients),
            sections,
            nutrients: rows,
            ratios: nutrient_ratios(&nutrients),
            bars,
            products: self.products.clone(),
            soil_amendments: self.soil_amendments(),
            tank_mix: self.tank_mix.items().to_vec(),
            paddock_scores,
            footer: self.footer.clone(),
            warnings: self.warnings.clone(),
        })
    }

    /// Render the report. The export flag is released whether or not
    /// rendering succeeds.
    pub fn export(&self, format: ExportFormat) -> Result<String> {
        let _guard = self.export.try_begin()?;
        let report = self.build_report()?;
        let rendered = match format {
            ExportFormat::Markdown => MarkdownFormatter::format(&report),
            ExportFormat::Json => JsonFormatter::format(&report)?,
        };
        tracing::info!("Exported report for '{}' ({:?})", report.paddock, format);
        Ok(rendered)
    }
}
