//! Nutrient name normalization.
//!
//! Lab reports spell the same analyte many ways: "Calcium (Mehlich III)",
//! "Calcium_Mehlich_III", "LaMotte Calcium", "Calcium_TAE". Every known
//! spelling resolves through a static alias table to a [`CanonicalKey`].
//!
//! Resolution chain:
//! 1. Exact lookup in the alias table
//! 2. Strip parenthesised content and match case-insensitively against base names
//! 3. Fall back to the raw name as its own key ([`CanonicalKey::Other`])

use rustc_hash::FxHashMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::OnceLock;

// ============================================================================
// Elements and Series
// ============================================================================

/// Closed set of analytes (elements and soil properties) the engine knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Element {
    Cec,
    Tec,
    Paramagnetism,
    Ph,
    OrganicMatter,
    OrganicCarbon,
    Conductivity,
    CaMgRatio,
    Nitrate,
    Ammonium,
    Phosphorus,
    Calcium,
    Magnesium,
    Potassium,
    Sodium,
    Sulphur,
    Chloride,
    Aluminium,
    Silicon,
    Boron,
    Iron,
    Manganese,
    Copper,
    Zinc,
    Hydrogen,
    OtherBases,
    Selenium,
    Cobalt,
    Molybdenum,
}

impl Element {
    pub const ALL: &'static [Element] = &[
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
        Element::Chloride,
        Element::Aluminium,
        Element::Silicon,
        Element::Boron,
        Element::Iron,
        Element::Manganese,
        Element::Copper,
        Element::Zinc,
        Element::Hydrogen,
        Element::OtherBases,
        Element::Selenium,
        Element::Cobalt,
        Element::Molybdenum,
    ];

    /// Generic key used in canonical names ("Calcium", "Other_Bases")
    pub fn key(self) -> &'static str {
        match self {
            Element::Cec => "CEC",
            Element::Tec => "TEC",
            Element::Paramagnetism => "Paramagnetism",
            Element::Ph => "pH",
            Element::OrganicMatter => "Organic_Matter",
            Element::OrganicCarbon => "Organic_Carbon",
            Element::Conductivity => "Conductivity",
            Element::CaMgRatio => "Ca_Mg_Ratio",
            Element::Nitrate => "Nitrate",
            Element::Ammonium => "Ammonium",
            Element::Phosphorus => "Phosphorus",
            Element::Calcium => "Calcium",
            Element::Magnesium => "Magnesium",
            Element::Potassium => "Potassium",
            Element::Sodium => "Sodium",
            Element::Sulphur => "Sulphur",
            Element::Chloride => "Chloride",
            Element::Aluminium => "Aluminium",
            Element::Silicon => "Silicon",
            Element::Boron => "Boron",
            Element::Iron => "Iron",
            Element::Manganese => "Manganese",
            Element::Copper => "Copper",
            Element::Zinc => "Zinc",
            Element::Hydrogen => "Hydrogen",
            Element::OtherBases => "Other_Bases",
            Element::Selenium => "Selenium",
            Element::Cobalt => "Cobalt",
            Element::Molybdenum => "Molybdenum",
        }
    }

    /// Human-readable name for narrative text and tables
    pub fn display_text(self) -> &'static str {
        match self {
            Element::OrganicMatter => "Organic Matter",
            Element::OrganicCarbon => "Organic Carbon",
            Element::CaMgRatio => "Ca/Mg Ratio",
            Element::OtherBases => "Other Bases",
            other => other.key(),
        }
    }

    /// Spellings accepted besides the generic key
    fn alternate_spellings(self) -> &'static [&'static str] {
        match self {
            Element::Sulphur => &["Sulfur"],
            Element::Aluminium => &["Aluminum"],
            Element::OrganicMatter => &["Organic Matter"],
            Element::OrganicCarbon => &["Organic Carbon"],
            Element::CaMgRatio => &["Ca/Mg Ratio", "Ca / Mg Ratio"],
            Element::OtherBases => &["Other Bases"],
            Element::Ph => &["pH-level", "pH level"],
            _ => &[],
        }
    }

    fn spellings(self) -> impl Iterator<Item = &'static str> {
        std::iter::once(self.key()).chain(self.alternate_spellings().iter().copied())
    }
}

/// Measurement series a canonical key belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Series {
    /// Albrecht/Mehlich panel or base saturation
    Primary,
    LaMotte,
    Tae,
}

// ============================================================================
// Canonical Key
// ============================================================================

/// Canonical nutrient key: a known element in a series, or an unrecognised raw name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CanonicalKey {
    Known { element: Element, series: Series },
    Other(String),
}

impl CanonicalKey {
    pub fn primary(element: Element) -> Self {
        CanonicalKey::Known { element, series: Series::Primary }
    }

    pub fn lamotte(element: Element) -> Self {
        CanonicalKey::Known { element, series: Series::LaMotte }
    }

    pub fn tae(element: Element) -> Self {
        CanonicalKey::Known { element, series: Series::Tae }
    }

    pub fn element(&self) -> Option<Element> {
        match self {
            CanonicalKey::Known { element, .. } => Some(*element),
            CanonicalKey::Other(_) => None,
        }
    }

    pub fn series(&self) -> Option<Series> {
        match self {
            CanonicalKey::Known { series, .. } => Some(*series),
            CanonicalKey::Other(_) => None,
        }
    }

    /// Same element moved to another series; unrecognised keys are unchanged
    pub fn with_series(&self, series: Series) -> Self {
        match self {
            CanonicalKey::Known { element, .. } => CanonicalKey::Known {
                element: *element,
                series,
            },
            CanonicalKey::Other(raw) => CanonicalKey::Other(raw.clone()),
        }
    }

    /// Human-readable label ("Calcium", "LaMotte Calcium", "TAE Calcium")
    pub fn display_text(&self) -> String {
        match self {
            CanonicalKey::Known { element, series: Series::Primary } => {
                element.display_text().to_string()
            }
            CanonicalKey::Known { element, series: Series::LaMotte } => {
                format!("LaMotte {}", element.display_text())
            }
            CanonicalKey::Known { element, series: Series::Tae } => {
                format!("TAE {}", element.display_text())
            }
            CanonicalKey::Other(raw) => raw.clone(),
        }
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CanonicalKey::Known { element, series: Series::Primary } => f.write_str(element.key()),
            CanonicalKey::Known { element, series: Series::LaMotte } => {
                write!(f, "{}_LaMotte", element.key())
            }
            CanonicalKey::Known { element, series: Series::Tae } => {
                write!(f, "{}_TAE", element.key())
            }
            CanonicalKey::Other(raw) => f.write_str(raw),
        }
    }
}

impl Serialize for CanonicalKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CanonicalKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(normalize_name(&raw))
    }
}

// ============================================================================
// Alias Table
// ============================================================================

struct NameAlias {
    raw: &'static str,
    element: Element,
}

/// Method-qualified and backend-key spellings of the primary panel
static PRIMARY_ALIASES: &[NameAlias] = &[
    NameAlias { raw: "CEC", element: Element::Cec },
    NameAlias { raw: "TEC", element: Element::Tec },
    NameAlias { raw: "Paramagnetism", element: Element::Paramagnetism },
    NameAlias { raw: "pH-level (1:5 water)", element: Element::Ph },
    NameAlias { raw: "pH_level_1_5_water", element: Element::Ph },
    NameAlias { raw: "Organic Matter (Calc)", element: Element::OrganicMatter },
    NameAlias { raw: "Organic_Matter_Calc", element: Element::OrganicMatter },
    NameAlias { raw: "Organic Carbon (LECO)", element: Element::OrganicCarbon },
    NameAlias { raw: "Organic_Carbon_LECO", element: Element::OrganicCarbon },
    NameAlias { raw: "Conductivity (1:5 water)", element: Element::Conductivity },
    NameAlias { raw: "Conductivity_1_5_water", element: Element::Conductivity },
    NameAlias { raw: "Ca/Mg Ratio", element: Element::CaMgRatio },
    NameAlias { raw: "Ca / Mg Ratio", element: Element::CaMgRatio },
    NameAlias { raw: "Ca_Mg_Ratio", element: Element::CaMgRatio },
    NameAlias { raw: "Nitrate-N (KCl)", element: Element::Nitrate },
    NameAlias { raw: "Nitrate_N_KCl", element: Element::Nitrate },
    NameAlias { raw: "Ammonium-N (KCl)", element: Element::Ammonium },
    NameAlias { raw: "Ammonium_N_KCl", element: Element::Ammonium },
    NameAlias { raw: "Phosphorus (Mehlich III)", element: Element::Phosphorus },
    NameAlias { raw: "Phosphorus_Mehlich_III", element: Element::Phosphorus },
    NameAlias { raw: "Calcium (Mehlich III)", element: Element::Calcium },
    NameAlias { raw: "Calcium_Mehlich_III", element: Element::Calcium },
    NameAlias { raw: "Magnesium (Mehlich III)", element: Element::Magnesium },
    NameAlias { raw: "Magnesium_Mehlich_III", element: Element::Magnesium },
    NameAlias { raw: "Potassium (Mehlich III)", element: Element::Potassium },
    NameAlias { raw: "Potassium_Mehlich_III", element: Element::Potassium },
    NameAlias { raw: "Sodium (Mehlich III)", element: Element::Sodium },
    NameAlias { raw: "Sodium_Mehlich_III", element: Element::Sodium },
    NameAlias { raw: "Sulfur (KCl)", element: Element::Sulphur },
    NameAlias { raw: "Sulphur (KCl)", element: Element::Sulphur },
    NameAlias { raw: "Sulfur_KCl", element: Element::Sulphur },
    NameAlias { raw: "Chloride", element: Element::Chloride },
    NameAlias { raw: "Aluminium", element: Element::Aluminium },
    NameAlias { raw: "Silicon (CaCl2)", element: Element::Silicon },
    NameAlias { raw: "Silicon_CaCl2", element: Element::Silicon },
    NameAlias { raw: "Boron (Hot CaCl2)", element: Element::Boron },
    NameAlias { raw: "Boron_Hot_CaCl2", element: Element::Boron },
    NameAlias { raw: "Iron (DTPA)", element: Element::Iron },
    NameAlias { raw: "Iron_DTPA", element: Element::Iron },
    NameAlias { raw: "Manganese (DTPA)", element: Element::Manganese },
    NameAlias { raw: "Manganese_DTPA", element: Element::Manganese },
    NameAlias { raw: "Copper (DTPA)", element: Element::Copper },
    NameAlias { raw: "Copper_DTPA", element: Element::Copper },
    NameAlias { raw: "Zinc (DTPA)", element: Element::Zinc },
    NameAlias { raw: "Zinc_DTPA", element: Element::Zinc },
    // Base saturation
    NameAlias { raw: "Calcium", element: Element::Calcium },
    NameAlias { raw: "Magnesium", element: Element::Magnesium },
    NameAlias { raw: "Potassium", element: Element::Potassium },
    NameAlias { raw: "Sodium", element: Element::Sodium },
    NameAlias { raw: "Aluminum", element: Element::Aluminium },
    NameAlias { raw: "Hydrogen", element: Element::Hydrogen },
    NameAlias { raw: "Other_Bases", element: Element::OtherBases },
    NameAlias { raw: "Other Bases", element: Element::OtherBases },
];

/// Elements reported by the LaMotte/Reams panel
pub const LAMOTTE_ELEMENTS: &[Element] = &[
    Element::Calcium,
    Element::Magnesium,
    Element::Phosphorus,
    Element::Potassium,
];

/// Elements reported by the TAE panel
pub const TAE_ELEMENTS: &[Element] = &[
    Element::Sodium,
    Element::Potassium,
    Element::Calcium,
    Element::Magnesium,
    Element::Phosphorus,
    Element::Aluminium,
    Element::Copper,
    Element::Iron,
    Element::Manganese,
    Element::Selenium,
    Element::Zinc,
    Element::Boron,
    Element::Silicon,
    Element::Cobalt,
    Element::Molybdenum,
    Element::Sulphur,
];

/// Elements reported as a percentage of CEC
pub const BASE_SATURATION_ELEMENTS: &[Element] = &[
    Element::Calcium,
    Element::Magnesium,
    Element::Potassium,
    Element::Sodium,
    Element::Aluminium,
    Element::Hydrogen,
    Element::OtherBases,
];

fn alias_table() -> &'static FxHashMap<String, CanonicalKey> {
    static TABLE: OnceLock<FxHashMap<String, CanonicalKey>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = FxHashMap::default();

        for alias in PRIMARY_ALIASES {
            table.insert(alias.raw.to_string(), CanonicalKey::primary(alias.element));
        }

        for &element in LAMOTTE_ELEMENTS {
            let base = element.key();
            for raw in [
                format!("{}_LaMotte", base),
                format!("{}_Lamotte", base),
                format!("LaMotte {}", base),
                format!("{} LaMotte", base),
                format!("{} (LaMotte)", base),
            ] {
                table.insert(raw, CanonicalKey::lamotte(element));
            }
        }

        for &element in TAE_ELEMENTS {
            for base in element.spellings() {
                for raw in [
                    format!("{}_TAE", base),
                    format!("{} TAE", base),
                    format!("{} (TAE)", base),
                    format!("TAE {}", base),
                ] {
                    table.insert(raw, CanonicalKey::tae(element));
                }
            }
        }

        table
    })
}

/// Lowercased base names for the parenthesis-stripped fallback
fn base_name_table() -> &'static FxHashMap<String, Element> {
    static TABLE: OnceLock<FxHashMap<String, Element>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = FxHashMap::default();
        for &element in Element::ALL {
            for spelling in element.spellings() {
                table.insert(spelling.to_lowercase(), element);
            }
            table.insert(element.display_text().to_lowercase(), element);
        }
        table
    })
}

/// Remove every "(...)" segment and collapse whitespace
pub fn strip_parenthetical(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut depth = 0usize;
    for ch in name.chars() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            c if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolve a raw lab-report name to its canonical key
pub fn normalize_name(raw: &str) -> CanonicalKey {
    let trimmed = raw.trim();

    if let Some(key) = alias_table().get(trimmed) {
        return key.clone();
    }

    let base = strip_parenthetical(trimmed).to_lowercase();
    if let Some(&element) = base_name_table().get(&base) {
        return CanonicalKey::primary(element);
    }

    tracing::debug!("Unrecognised nutrient name '{}', keeping raw key", trimmed);
    CanonicalKey::Other(trimmed.to_string())
}

// ============================================================================
// Main Testing Methods
// ============================================================================

/// Extraction methods of the primary panel, in descending priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MainMethod {
    MehlichIII,
    Kcl,
    Dtpa,
    HotCaCl2,
    CaCl2,
    Leco,
    Calc,
    Water1To5,
}

impl MainMethod {
    pub const PRIORITY: &'static [MainMethod] = &[
        MainMethod::MehlichIII,
        MainMethod::Kcl,
        MainMethod::Dtpa,
        MainMethod::HotCaCl2,
        MainMethod::CaCl2,
        MainMethod::Leco,
        MainMethod::Calc,
        MainMethod::Water1To5,
    ];

    /// Suffix as printed on lab reports
    pub fn suffix(self) -> &'static str {
        match self {
            MainMethod::MehlichIII => " (Mehlich III)",
            MainMethod::Kcl => " (KCl)",
            MainMethod::Dtpa => " (DTPA)",
            MainMethod::HotCaCl2 => " (Hot CaCl2)",
            MainMethod::CaCl2 => " (CaCl2)",
            MainMethod::Leco => " (LECO)",
            MainMethod::Calc => " (Calc)",
            MainMethod::Water1To5 => " (1:5 water)",
        }
    }

    /// Suffix used in backend keys
    fn backend_suffix(self) -> &'static str {
        match self {
            MainMethod::MehlichIII => "_Mehlich_III",
            MainMethod::Kcl => "_KCl",
            MainMethod::Dtpa => "_DTPA",
            MainMethod::HotCaCl2 => "_Hot_CaCl2",
            MainMethod::CaCl2 => "_CaCl2",
            MainMethod::Leco => "_LECO",
            MainMethod::Calc => "_Calc",
            MainMethod::Water1To5 => "_1_5_water",
        }
    }

    /// Highest-priority method named in a raw reading name
    pub fn detect(raw: &str) -> Option<MainMethod> {
        MainMethod::PRIORITY
            .iter()
            .copied()
            .find(|m| raw.contains(m.suffix()) || raw.ends_with(m.backend_suffix()))
    }

    /// Rank for duplicate resolution; lower wins, unqualified names rank last
    pub fn rank(raw: &str) -> usize {
        MainMethod::detect(raw)
            .map(|m| m as usize)
            .unwrap_or(MainMethod::PRIORITY.len())
    }
}

pub fn is_mehlich(raw: &str) -> bool {
    raw.to_lowercase().contains("mehlich")
}
