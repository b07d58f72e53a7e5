// Engine configuration - one explicit value, no ambient globals
//
// Everything the pipeline needs to know about file naming, registry schema,
// source schema and report branding lives here. The caller builds (or
// deserializes) one `EngineConfig` and passes it into `pipeline::run`;
// nothing in the engine reads process-wide state.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default registry workbook file name inside the source directory.
pub const DEFAULT_REGISTRY_FILE: &str =
    "Ecovis Compliance Solution számlázási adatok_2025.xlsx";

fn default_source_marker() -> String {
    "TS".to_string()
}

fn default_lock_prefix() -> String {
    "~$".to_string()
}

fn default_extension() -> String {
    "xlsx".to_string()
}

fn default_active_sheet() -> String {
    "Cégadatok".to_string()
}

fn default_pair_sheet() -> String {
    "TS kódok".to_string()
}

fn default_client_column() -> String {
    "Ügyfélkód".to_string()
}

fn default_project_column() -> String {
    "Projekt neve".to_string()
}

fn default_hours_column() -> String {
    "Időráfordítás (óra)".to_string()
}

fn default_active_column() -> String {
    "Ügyfél aktív".to_string()
}

fn default_active_marker() -> String {
    "igen".to_string()
}

fn default_language_column() -> String {
    "Nyelv".to_string()
}

fn default_language() -> String {
    "magyar".to_string()
}

fn default_name_aliases() -> Vec<String> {
    ["Cégnév", "Cég neve", "Ügyfél neve", "Partner neve", "Név"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_description_aliases() -> Vec<String> {
    [
        "Munka leírása",
        "Munka leirasa",
        "Leírás",
        "Leiras",
        "Megjegyzés",
        "Megjegyzes",
        "Feladat leírása",
        "Feladat leirasa",
        "Feladat",
        "Tevékenység",
        "Tevekenyseg",
        "Munka",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_date_aliases() -> Vec<String> {
    ["Dátum", "Datum", "Nap"].iter().map(|s| s.to_string()).collect()
}

fn default_exempt_codes() -> Vec<String> {
    vec!["ECO".to_string()]
}

fn default_max_rows() -> usize {
    300
}

fn default_brand_color() -> String {
    "D92D27".to_string()
}

fn default_accent_color() -> String {
    "4F81BD".to_string()
}

fn default_invoice_codes() -> Vec<String> {
    [
        "AUC", "AXM", "BRD", "HÖG", "ITP", "JIS", "KKE", "KLU", "KRT", "LUT",
        "MES", "NUM", "OLD", "PCO", "PRM", "RAP", "ROC", "SCH", "SPA", "TLA",
        "VAB", "ZAP",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Engine configuration. All fields have working defaults matching the
/// production registry/source schema; a JSON file with any subset of the
/// fields can override them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Substring a file name must contain to count as a source workbook.
    pub source_marker: String,
    /// Spreadsheet-editor lock-file prefix; matching files are skipped.
    pub lock_prefix: String,
    /// Source workbook extension (lowercase, without dot).
    pub extension: String,

    /// Registry sheet holding the active-client table.
    pub active_sheet: String,
    /// Registry sheet holding the allowed client-project pairs.
    pub pair_sheet: String,

    /// Client-code column header (registry and source sheets).
    pub client_column: String,
    /// Project-code column header (registry pair sheet and source sheets).
    pub project_column: String,
    /// Hours column header (source sheets).
    pub hours_column: String,
    /// Active-flag column header (registry active sheet).
    pub active_column: String,
    /// Cell value marking a client as active, compared canonically.
    pub active_marker: String,
    /// Optional per-client report-language column header.
    pub language_column: String,
    /// Language used when the registry has no language column or value.
    pub default_language: String,
    /// Display-name column aliases, first present wins; fallback is the code.
    pub name_aliases: Vec<String>,

    /// Ordered aliases for the free-text description column.
    pub description_aliases: Vec<String>,
    /// Ordered aliases for the optional date column.
    pub date_aliases: Vec<String>,

    /// Administratively-exempt client codes, suppressed before validation.
    pub exempt_client_codes: Vec<String>,
    /// Row cap per sheet, bounding pathological files.
    pub max_rows_per_sheet: usize,

    /// Title-banner fill color (hex RGB).
    pub brand_color: String,
    /// Table-header fill color (hex RGB).
    pub accent_color: String,

    /// Default ordered client-code list for the invoice annex.
    pub invoice_client_codes: Vec<String>,

    /// Destination for produced artifacts; `None` means the source directory.
    pub output_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            source_marker: default_source_marker(),
            lock_prefix: default_lock_prefix(),
            extension: default_extension(),
            active_sheet: default_active_sheet(),
            pair_sheet: default_pair_sheet(),
            client_column: default_client_column(),
            project_column: default_project_column(),
            hours_column: default_hours_column(),
            active_column: default_active_column(),
            active_marker: default_active_marker(),
            language_column: default_language_column(),
            default_language: default_language(),
            name_aliases: default_name_aliases(),
            description_aliases: default_description_aliases(),
            date_aliases: default_date_aliases(),
            exempt_client_codes: default_exempt_codes(),
            max_rows_per_sheet: default_max_rows(),
            brand_color: default_brand_color(),
            accent_color: default_accent_color(),
            invoice_client_codes: default_invoice_codes(),
            output_dir: None,
        }
    }
}

impl EngineConfig {
    /// Load a configuration overlay from a JSON file. Missing keys fall back
    /// to the defaults above.
    pub fn from_json_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let cfg: EngineConfig = serde_json::from_str(&raw)?;
        Ok(cfg)
    }

    /// Banner fill color as an RGB integer.
    pub fn brand_rgb(&self) -> u32 {
        parse_rgb(&self.brand_color).unwrap_or(0xD92D27)
    }

    /// Table-header fill color as an RGB integer.
    pub fn accent_rgb(&self) -> u32 {
        parse_rgb(&self.accent_color).unwrap_or(0x4F81BD)
    }
}

fn parse_rgb(hex: &str) -> Option<u32> {
    let trimmed = hex.trim_start_matches('#');
    if trimmed.len() != 6 {
        return None;
    }
    u32::from_str_radix(trimmed, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_production_schema() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.source_marker, "TS");
        assert_eq!(cfg.lock_prefix, "~$");
        assert_eq!(cfg.active_sheet, "Cégadatok");
        assert_eq!(cfg.pair_sheet, "TS kódok");
        assert_eq!(cfg.client_column, "Ügyfélkód");
        assert_eq!(cfg.exempt_client_codes, vec!["ECO"]);
        assert_eq!(cfg.max_rows_per_sheet, 300);
        assert_eq!(cfg.description_aliases[0], "Munka leírása");
        assert_eq!(cfg.invoice_client_codes.len(), 22);
    }

    #[test]
    fn test_partial_json_overlay() {
        let cfg: EngineConfig =
            serde_json::from_str(r#"{"source_marker": "SHEET", "max_rows_per_sheet": 50}"#)
                .unwrap();
        assert_eq!(cfg.source_marker, "SHEET");
        assert_eq!(cfg.max_rows_per_sheet, 50);
        // Untouched fields keep their defaults
        assert_eq!(cfg.active_marker, "igen");
    }

    #[test]
    fn test_color_parsing() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.brand_rgb(), 0xD92D27);
        assert_eq!(cfg.accent_rgb(), 0x4F81BD);
        assert_eq!(parse_rgb("#112233"), Some(0x112233));
        assert_eq!(parse_rgb("bad"), None);
    }
}
