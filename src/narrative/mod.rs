//! Narrative commentary for the report sections
//!
//! Each section owns a fixed set of canonical slots. Its nutrients are sorted
//! into five narrative buckets, which feed either a remote comment writer or
//! the deterministic template in this module.

pub mod source;

pub use source::{
    generate_section_comments, CachedComments, CommentRequest, CommentSource, SectionComments,
    TemplateCommentSource,
};
#[cfg(feature = "api")]
pub use source::HttpCommentSource;

use crate::nutrients::classify::classify_narrative;
use crate::nutrients::names::{BASE_SATURATION_ELEMENTS, LAMOTTE_ELEMENTS, TAE_ELEMENTS};
use crate::nutrients::{
    CanonicalKey, CanonicalNutrient, Element, NarrativeStatus, NutrientSlot, SourceCategory,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Report Sections
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReportSection {
    OrganicMatter,
    Cec,
    SoilPh,
    BaseSaturation,
    AvailableNutrients,
    LamotteReams,
    Tae,
}

/// Albrecht elements discussed under "Available Nutrients"
const AVAILABLE_NUTRIENTS: &[Element] = &[
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

/// Base-saturation entries only mentioned when excessive
const EXCESS_ONLY: &[Element] = &[Element::Hydrogen, Element::Aluminium, Element::OtherBases];

impl ReportSection {
    pub const ALL: &'static [ReportSection] = &[
        ReportSection::OrganicMatter,
        ReportSection::Cec,
        ReportSection::SoilPh,
        ReportSection::BaseSaturation,
        ReportSection::AvailableNutrients,
        ReportSection::LamotteReams,
        ReportSection::Tae,
    ];

    /// Heading shown in the report
    pub fn display_text(&self) -> &'static str {
        match self {
            ReportSection::OrganicMatter => "Organic Matter",
            ReportSection::Cec => "CEC",
            ReportSection::SoilPh => "Soil pH",
            ReportSection::BaseSaturation => "Base Saturation",
            ReportSection::AvailableNutrients => "Available Nutrients",
            ReportSection::LamotteReams => "LaMotte/Reams",
            ReportSection::Tae => "TAE",
        }
    }

    /// Key of the section in cached comment payloads
    pub fn cache_key(&self) -> &'static str {
        match self {
            ReportSection::LamotteReams => "Lamotte Reams",
            other => other.display_text(),
        }
    }

    /// Name sent on the wire ("organicMatter", "soilPh", ...)
    pub fn wire_name(&self) -> &'static str {
        match self {
            ReportSection::OrganicMatter => "organicMatter",
            ReportSection::Cec => "cec",
            ReportSection::SoilPh => "soilPh",
            ReportSection::BaseSaturation => "baseSaturation",
            ReportSection::AvailableNutrients => "availableNutrients",
            ReportSection::LamotteReams => "lamotteReams",
            ReportSection::Tae => "tae",
        }
    }

    pub fn from_cache_key(key: &str) -> Option<Self> {
        let key = key.trim();
        ReportSection::ALL.iter().copied().find(|s| {
            s.cache_key().eq_ignore_ascii_case(key)
                || s.display_text().eq_ignore_ascii_case(key)
                || s.wire_name().eq_ignore_ascii_case(key)
        })
    }

    /// Canonical slots discussed in this section
    pub fn slots(&self) -> Vec<NutrientSlot> {
        let albrecht = |elements: &[Element]| {
            elements
                .iter()
                .map(|&e| NutrientSlot::primary(SourceCategory::Albrecht, e))
                .collect::<Vec<_>>()
        };
        match self {
            ReportSection::OrganicMatter => albrecht(&[Element::OrganicMatter]),
            ReportSection::Cec => albrecht(&[Element::Cec, Element::Tec]),
            ReportSection::SoilPh => albrecht(&[Element::Ph]),
            ReportSection::AvailableNutrients => albrecht(AVAILABLE_NUTRIENTS),
            ReportSection::BaseSaturation => BASE_SATURATION_ELEMENTS
                .iter()
                .map(|&e| NutrientSlot::primary(SourceCategory::BaseSaturation, e))
                .collect(),
            ReportSection::LamotteReams => LAMOTTE_ELEMENTS
                .iter()
                .map(|&e| NutrientSlot::new(SourceCategory::LamotteReams, CanonicalKey::lamotte(e)))
                .collect(),
            ReportSection::Tae => TAE_ELEMENTS
                .iter()
                .map(|&e| NutrientSlot::new(SourceCategory::Tae, CanonicalKey::tae(e)))
                .collect(),
        }
    }

    /// Populated records of this section, in slot order
    pub fn nutrients<'a>(&self, nutrients: &'a [CanonicalNutrient]) -> Vec<&'a CanonicalNutrient> {
        self.slots()
            .iter()
            .filter_map(|slot| nutrients.iter().find(|n| n.category == slot.category && n.generic_name == slot.key))
            .filter(|n| !n.is_empty())
            .collect()
    }
}

/// Section a slot is discussed in; slots belong to at most one
pub fn section_for(slot: &NutrientSlot) -> Option<ReportSection> {
    ReportSection::ALL
        .iter()
        .copied()
        .find(|section| section.slots().contains(slot))
}

// ============================================================================
// Status Categories
// ============================================================================

/// Names of a section's nutrients sorted into narrative buckets
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCategories {
    pub deficient: Vec<String>,
    pub marginally_deficient: Vec<String>,
    pub optimal: Vec<String>,
    pub marginally_excessive: Vec<String>,
    #[serde(rename = "excess")]
    pub excessive: Vec<String>,
}

impl StatusCategories {
    /// Classify a section's records. Each name lands in one bucket (the most
    /// excessive one wins); lists are sorted alphabetically. Records that
    /// cannot be classified are left out.
    pub fn from_section(section: ReportSection, nutrients: &[CanonicalNutrient]) -> Self {
        let mut assigned: BTreeMap<String, NarrativeStatus> = BTreeMap::new();

        for nutrient in section.nutrients(nutrients) {
            let Some(current) = nutrient.current else { continue };
            let Some(status) =
                classify_narrative(current, nutrient.ideal, nutrient.ideal_range.as_ref())
            else {
                continue;
            };

            if section == ReportSection::BaseSaturation
                && status != NarrativeStatus::High
                && nutrient.generic_name.element().is_some_and(|e| EXCESS_ONLY.contains(&e))
            {
                continue;
            }

            let name = nutrient.generic_name.display_text();
            assigned
                .entry(name)
                .and_modify(|existing| *existing = (*existing).max(status))
                .or_insert(status);
        }

        let mut categories = StatusCategories::default();
        for (name, status) in assigned {
            let bucket = match status {
                NarrativeStatus::Low => &mut categories.deficient,
                NarrativeStatus::MarginallyLow => &mut categories.marginally_deficient,
                NarrativeStatus::Optimal => &mut categories.optimal,
                NarrativeStatus::MarginallyHigh => &mut categories.marginally_excessive,
                NarrativeStatus::High => &mut categories.excessive,
            };
            bucket.push(name);
        }
        categories
    }

    pub fn is_empty(&self) -> bool {
        self.deficient.is_empty()
            && self.marginally_deficient.is_empty()
            && self.optimal.is_empty()
            && self.marginally_excessive.is_empty()
            && self.excessive.is_empty()
    }
}

// ============================================================================
// Template Fallback
// ============================================================================

enum Intro {
    /// Opening clause completed by the deficiency finding
    Finding(&'static str),
    /// Fixed opening sentence
    Fixed(&'static str),
}

fn intro(section: ReportSection) -> Intro {
    match section {
        ReportSection::OrganicMatter => Intro::Finding("Organic matter analysis shows"),
        ReportSection::Cec => Intro::Finding("Cation Exchange Capacity (CEC) analysis indicates"),
        ReportSection::SoilPh => Intro::Finding("Soil pH analysis shows"),
        ReportSection::BaseSaturation => Intro::Finding("Base saturation analysis reveals"),
        ReportSection::AvailableNutrients => {
            Intro::Fixed("Available nutrients analysis reveals plant-accessible nutrient levels.")
        }
        ReportSection::LamotteReams => {
            Intro::Fixed("LaMotte/Reams analysis provides specific nutrient availability assessment.")
        }
        ReportSection::Tae => Intro::Fixed(
            "Total Available Elements (TAE) analysis shows comprehensive nutrient availability.",
        ),
    }
}

/// Deterministic summary used when no remote comment is available
pub fn fallback_summary(section: ReportSection, categories: &StatusCategories) -> String {
    let mut sentences: Vec<String> = Vec::new();

    match intro(section) {
        Intro::Finding(lead) if categories.deficient.is_empty() => {
            sentences.push(format!("{} good levels.", lead));
        }
        Intro::Finding(lead) => {
            sentences.push(format!("{} deficiencies in {}.", lead, categories.deficient.join(", ")));
        }
        Intro::Fixed(text) => {
            sentences.push(text.to_string());
            if !categories.deficient.is_empty() {
                sentences.push(format!("Deficiencies detected in {}.", categories.deficient.join(", ")));
            }
        }
    }

    if !categories.excessive.is_empty() {
        sentences.push(format!("Excessive levels in {}.", categories.excessive.join(", ")));
    }
    if !categories.optimal.is_empty() {
        sentences.push(format!("Optimal levels in {}.", categories.optimal.join(", ")));
    }

    sentences.join(" ")
}
