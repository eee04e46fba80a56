use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Everything the ingestion pipeline treats as tunable: log verbosity,
/// layout tolerances, header-field fallbacks and the metric vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    pub log_filter: String,
    pub skip_cover_page_tables: bool,
    pub ruled_lines: RuledLineSettings,
    pub text_alignment: TextAlignmentSettings,
    pub word_clustering: WordClusterSettings,
    pub header_fields: HeaderFieldSettings,
    pub vocabulary: Vocabulary,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            skip_cover_page_tables: true,
            ruled_lines: RuledLineSettings::default(),
            text_alignment: TextAlignmentSettings::default(),
            word_clustering: WordClusterSettings::default(),
            header_fields: HeaderFieldSettings::default(),
            vocabulary: Vocabulary::default(),
        }
    }
}

impl ParserConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("failed to parse config {}", path.display()))
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

/// Ruled-line table detection, all values in PDF points.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuledLineSettings {
    pub snap_tolerance: f64,
    pub join_tolerance: f64,
    pub intersection_tolerance: f64,
    pub min_edge_length: f64,
}

impl Default for RuledLineSettings {
    fn default() -> Self {
        Self {
            snap_tolerance: 4.0,
            join_tolerance: 3.0,
            intersection_tolerance: 3.0,
            min_edge_length: 3.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TextAlignmentSettings {
    pub x_tolerance: f64,
    pub min_words_vertical: usize,
}

impl Default for TextAlignmentSettings {
    fn default() -> Self {
        Self {
            x_tolerance: 3.0,
            min_words_vertical: 3,
        }
    }
}

/// Multipliers of the page's median glyph height.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WordClusterSettings {
    pub column_tolerance: f64,
    pub row_tolerance: f64,
    pub cell_gap: f64,
    pub assign_tolerance: f64,
    pub run_on_gap: f64,
    pub fallback_glyph_height: f64,
}

impl Default for WordClusterSettings {
    fn default() -> Self {
        Self {
            column_tolerance: 1.5,
            row_tolerance: 2.0,
            cell_gap: 1.0,
            assign_tolerance: 2.0,
            run_on_gap: 0.15,
            fallback_glyph_height: 10.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderFieldSettings {
    /// Placeholder recorded when no technician pattern matches. Stored with
    /// `technician_is_placeholder = 1` so it never reads as extracted.
    pub default_technician: Option<String>,
    pub known_technicians: Vec<String>,
    pub facility_aliases: Vec<FacilityAlias>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacilityAlias {
    pub pattern: String,
    pub facility: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionalScheme {
    pub type_contains: String,
    pub leading: Vec<String>,
    #[serde(default)]
    pub middle: Vec<String>,
    #[serde(default)]
    pub trailing: Vec<String>,
}

impl PositionalScheme {
    pub fn min_values(&self) -> usize {
        self.leading.len() + self.trailing.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Vocabulary {
    pub metric_keys: Vec<String>,
    pub header_layouts: Vec<Vec<String>>,
    pub synonyms: BTreeMap<String, String>,
    pub positional_schemes: Vec<PositionalScheme>,
    pub vertical_header_tokens: Vec<String>,
    pub range_marker: String,
}

pub const INDEX_KEY: &str = "index";
pub const SYSTEM_TYPE_KEY: &str = "system_type";
pub const SYSTEM_NAME_KEY: &str = "system_name";
pub const COMMENT_KEY: &str = "comment";
pub const GLYCOL_KEY: &str = "glycol";

const DEFAULT_METRIC_KEYS: &[&str] = &[
    "conductivity",
    "ph",
    "temperature",
    "p_alkalinity",
    "m_alkalinity",
    "chloride",
    "hardness",
    "calcium",
    "po4",
    "so2",
    "mo",
    "no2",
    "live_atp",
    "glycol",
    "free_chlorine",
    "total_chlorine",
    "max_temperature",
];

const FULL_PAGE_LAYOUT: &[&str] = &[
    "#",
    "System Type",
    "System Name",
    "Cond.",
    "pH",
    "Temp",
    "P Alk",
    "M Alk",
    "Chloride",
    "Hardness",
    "Calcium",
    "PO4",
    "SO2",
    "Mo",
    "NO2",
    "Live ATP",
    "Glycol",
    "Free Chlorine",
    "Total Chlorine",
    "Max Temp.",
];

const DEFAULT_SYNONYMS: &[(&str, &str)] = &[
    ("#", INDEX_KEY),
    ("no", INDEX_KEY),
    ("index", INDEX_KEY),
    ("system_type", SYSTEM_TYPE_KEY),
    ("type", SYSTEM_TYPE_KEY),
    ("system_name", SYSTEM_NAME_KEY),
    ("system", SYSTEM_NAME_KEY),
    ("gwt_names", SYSTEM_NAME_KEY),
    ("sample_id", SYSTEM_NAME_KEY),
    ("sample", SYSTEM_NAME_KEY),
    ("comment", COMMENT_KEY),
    ("comments", COMMENT_KEY),
    ("notes", COMMENT_KEY),
    ("conductivity", "conductivity"),
    ("cond", "conductivity"),
    ("cond_uscm", "conductivity"),
    ("cond_us", "conductivity"),
    ("cond_µs/cm", "conductivity"),
    ("conductivity_µs/cm", "conductivity"),
    ("conductivity_uscm", "conductivity"),
    ("cond_umhos", "conductivity"),
    ("specific_conductance", "conductivity"),
    ("ph", "ph"),
    ("temperature", "temperature"),
    ("temp", "temperature"),
    ("temp_°f", "temperature"),
    ("temp_°c", "temperature"),
    ("temp_f", "temperature"),
    ("p_alkalinity", "p_alkalinity"),
    ("p_alk", "p_alkalinity"),
    ("p-alk", "p_alkalinity"),
    ("p-alkalinity", "p_alkalinity"),
    ("m_alkalinity", "m_alkalinity"),
    ("m_alk", "m_alkalinity"),
    ("m-alk", "m_alkalinity"),
    ("m-alkalinity", "m_alkalinity"),
    ("total_alkalinity", "m_alkalinity"),
    ("chloride", "chloride"),
    ("chlorides", "chloride"),
    ("cl", "chloride"),
    ("hardness", "hardness"),
    ("total_hardness", "hardness"),
    ("calcium", "calcium"),
    ("calcium_hardness", "calcium"),
    ("ca", "calcium"),
    ("po4", "po4"),
    ("phosphate", "po4"),
    ("ortho_po4", "po4"),
    ("so2", "so2"),
    ("so3", "so2"),
    ("sulfite", "so2"),
    ("mo", "mo"),
    ("moly", "mo"),
    ("molybdate", "mo"),
    ("moo4", "mo"),
    ("no2", "no2"),
    ("nitrite", "no2"),
    ("live_atp", "live_atp"),
    ("atp", "live_atp"),
    ("atp_live", "live_atp"),
    ("glycol", GLYCOL_KEY),
    ("glycol_%", GLYCOL_KEY),
    ("glycol_percent", GLYCOL_KEY),
    ("free_chlorine", "free_chlorine"),
    ("free_cl", "free_chlorine"),
    ("free_cl2", "free_chlorine"),
    ("total_chlorine", "total_chlorine"),
    ("total_cl", "total_chlorine"),
    ("total_cl2", "total_chlorine"),
    ("max_temperature", "max_temperature"),
    ("max_temp", "max_temperature"),
    ("maximum_temp", "max_temperature"),
];

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            metric_keys: strings(DEFAULT_METRIC_KEYS),
            header_layouts: vec![strings(FULL_PAGE_LAYOUT)],
            synonyms: DEFAULT_SYNONYMS
                .iter()
                .map(|(raw, canonical)| (raw.to_string(), canonical.to_string()))
                .collect(),
            positional_schemes: vec![
                PositionalScheme {
                    type_contains: "Dist".to_string(),
                    leading: strings(&["conductivity", "ph", "temperature"]),
                    middle: strings(&[
                        "p_alkalinity",
                        "m_alkalinity",
                        "chloride",
                        "hardness",
                        "calcium",
                        "po4",
                        "so2",
                        "mo",
                    ]),
                    trailing: strings(&["free_chlorine", "total_chlorine"]),
                },
                PositionalScheme {
                    type_contains: "Nitrite".to_string(),
                    leading: strings(&["conductivity", "ph", "no2"]),
                    middle: strings(&[GLYCOL_KEY]),
                    trailing: Vec::new(),
                },
            ],
            vertical_header_tokens: strings(&["Sample ID"]),
            range_marker: "Range".to_string(),
        }
    }
}
