// Master Registry Loader - active clients + allowed client/project pairs
//
// The registry workbook is the single source of truth for one run. It is
// loaded fresh on every invocation (the registry may change between runs)
// and is read-only afterwards. A load failure is the one fatal condition of
// the whole engine: no partial reconciliation happens against unknown or
// incomplete master data.

use calamine::{open_workbook_auto, Data, Range, Reader};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use thiserror::Error;
use tracing::info;

use crate::config::EngineConfig;
use crate::extract::{cell_text, find_alias_column, find_column, header_map};
use crate::normalize::canonical;

// ============================================================================
// CLIENT RECORD
// ============================================================================

/// One active client as declared in the registry. Code and display name keep
/// their original casing for display contexts; lookups go through canonical
/// forms.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientRecord {
    pub code: String,
    pub display_name: String,
    /// Report-language tag ("magyar"/"angol"), defaulted when absent.
    pub language: String,
}

// ============================================================================
// REGISTRY ERROR
// ============================================================================

/// Fatal registry-load failure; aborts the entire run.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("cannot open registry workbook {path}: {source}")]
    Open {
        path: String,
        source: calamine::Error,
    },

    #[error("registry sheet '{sheet}' is missing")]
    MissingSheet { sheet: String },

    #[error("registry sheet '{sheet}' has no '{column}' column")]
    MissingColumn { sheet: String, column: String },
}

// ============================================================================
// CLIENT REGISTRY
// ============================================================================

/// Active-client map plus the allowed (client, project) pair set, keyed by
/// canonical form.
#[derive(Debug, Clone)]
pub struct ClientRegistry {
    clients: BTreeMap<String, ClientRecord>,
    allowed_pairs: HashSet<(String, String)>,
    allowed_clients: HashSet<String>,
}

impl ClientRegistry {
    /// Load the registry from a workbook. Only rows whose active cell
    /// canonicalizes to the configured marker are retained; each pair-sheet
    /// row declares exactly one allowed pair.
    pub fn load(path: &Path, config: &EngineConfig) -> Result<Self, RegistryError> {
        let mut workbook = open_workbook_auto(path).map_err(|source| RegistryError::Open {
            path: path.display().to_string(),
            source,
        })?;

        let active_range = worksheet(&mut workbook, &config.active_sheet)?;
        let clients = load_clients(&active_range, config)?;

        let pair_range = worksheet(&mut workbook, &config.pair_sheet)?;
        let (allowed_pairs, allowed_clients) = load_pairs(&pair_range, config)?;

        info!(
            active_clients = clients.len(),
            allowed_pairs = allowed_pairs.len(),
            "registry loaded"
        );

        Ok(ClientRegistry {
            clients,
            allowed_pairs,
            allowed_clients,
        })
    }

    /// Is the code marked active in the registry?
    pub fn is_active(&self, client_code: &str) -> bool {
        self.clients.contains_key(&canonical(client_code))
    }

    /// Active-client record for a code, if any.
    pub fn client(&self, client_code: &str) -> Option<&ClientRecord> {
        self.clients.get(&canonical(client_code))
    }

    /// Does the pair sheet know this client code at all?
    pub fn is_known_client(&self, client_code: &str) -> bool {
        self.allowed_clients.contains(&canonical(client_code))
    }

    /// Is the (client, project) combination declared permissible?
    pub fn is_allowed_pair(&self, client_code: &str, project_code: &str) -> bool {
        self.allowed_pairs
            .contains(&(canonical(client_code), canonical(project_code)))
    }

    pub fn active_count(&self) -> usize {
        self.clients.len()
    }

    pub fn pair_count(&self) -> usize {
        self.allowed_pairs.len()
    }

    /// Active-client records in canonical code order.
    pub fn active_clients(&self) -> impl Iterator<Item = &ClientRecord> {
        self.clients.values()
    }
}

fn worksheet(
    workbook: &mut calamine::Sheets<std::io::BufReader<std::fs::File>>,
    sheet: &str,
) -> Result<Range<Data>, RegistryError> {
    if !workbook.sheet_names().iter().any(|s| s.as_str() == sheet) {
        return Err(RegistryError::MissingSheet {
            sheet: sheet.to_string(),
        });
    }
    workbook
        .worksheet_range(sheet)
        .map_err(|_| RegistryError::MissingSheet {
            sheet: sheet.to_string(),
        })
}

fn load_clients(
    range: &Range<Data>,
    config: &EngineConfig,
) -> Result<BTreeMap<String, ClientRecord>, RegistryError> {
    let mut rows = range.rows();
    let header_row = rows.next().unwrap_or_default();
    let headers = header_map(header_row);

    let idx_code = find_column(&headers, &config.client_column).ok_or_else(|| {
        RegistryError::MissingColumn {
            sheet: config.active_sheet.clone(),
            column: config.client_column.clone(),
        }
    })?;
    let idx_active = find_column(&headers, &config.active_column).ok_or_else(|| {
        RegistryError::MissingColumn {
            sheet: config.active_sheet.clone(),
            column: config.active_column.clone(),
        }
    })?;
    let idx_name = find_alias_column(&headers, &config.name_aliases);
    let idx_lang = find_column(&headers, &config.language_column);

    let active_marker = canonical(&config.active_marker);
    let mut clients = BTreeMap::new();

    for row in rows {
        let code = match row.get(idx_code).and_then(cell_text) {
            Some(code) if !code.is_empty() => code,
            _ => continue,
        };
        let active = row
            .get(idx_active)
            .and_then(cell_text)
            .map(|v| canonical(&v) == active_marker)
            .unwrap_or(false);
        if !active {
            continue;
        }

        let display_name = idx_name
            .and_then(|i| row.get(i))
            .and_then(cell_text)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| code.clone());
        let language = idx_lang
            .and_then(|i| row.get(i))
            .and_then(cell_text)
            .map(|s| canonical(&s))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| canonical(&config.default_language));

        clients.entry(canonical(&code)).or_insert(ClientRecord {
            code,
            display_name,
            language,
        });
    }

    Ok(clients)
}

#[allow(clippy::type_complexity)]
fn load_pairs(
    range: &Range<Data>,
    config: &EngineConfig,
) -> Result<(HashSet<(String, String)>, HashSet<String>), RegistryError> {
    let mut rows = range.rows();
    let header_row = rows.next().unwrap_or_default();
    let headers = header_map(header_row);

    let idx_code = find_column(&headers, &config.client_column).ok_or_else(|| {
        RegistryError::MissingColumn {
            sheet: config.pair_sheet.clone(),
            column: config.client_column.clone(),
        }
    })?;
    let idx_project = find_column(&headers, &config.project_column).ok_or_else(|| {
        RegistryError::MissingColumn {
            sheet: config.pair_sheet.clone(),
            column: config.project_column.clone(),
        }
    })?;

    let mut pairs = HashSet::new();
    let mut clients = HashSet::new();

    for row in rows {
        let code = row.get(idx_code).and_then(cell_text).map(|s| canonical(&s));
        let project = row.get(idx_project).and_then(cell_text).map(|s| canonical(&s));
        match (code, project) {
            (Some(code), Some(project)) if !code.is_empty() && !project.is_empty() => {
                clients.insert(code.clone());
                pairs.insert((code, project));
            }
            _ => continue,
        }
    }

    Ok((pairs, clients))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;
    use tempfile::TempDir;

    fn write_registry(
        dir: &TempDir,
        active_rows: &[Vec<&str>],
        pair_rows: &[Vec<&str>],
    ) -> std::path::PathBuf {
        let path = dir.path().join("registry.xlsx");
        let mut workbook = Workbook::new();

        let sheet = workbook.add_worksheet();
        sheet.set_name("Cégadatok").unwrap();
        let headers = ["Ügyfélkód", "Ügyfél aktív", "Cégnév", "Nyelv"];
        for (col, h) in headers.iter().enumerate() {
            sheet.write_string(0, col as u16, *h).unwrap();
        }
        for (r, row) in active_rows.iter().enumerate() {
            for (c, v) in row.iter().enumerate() {
                sheet.write_string((r + 1) as u32, c as u16, *v).unwrap();
            }
        }

        let sheet = workbook.add_worksheet();
        sheet.set_name("TS kódok").unwrap();
        sheet.write_string(0, 0, "Ügyfélkód").unwrap();
        sheet.write_string(0, 1, "Projekt neve").unwrap();
        for (r, row) in pair_rows.iter().enumerate() {
            for (c, v) in row.iter().enumerate() {
                sheet.write_string((r + 1) as u32, c as u16, *v).unwrap();
            }
        }

        workbook.save(&path).unwrap();
        path
    }

    #[test]
    fn test_load_filters_inactive_clients() {
        let dir = TempDir::new().unwrap();
        let path = write_registry(
            &dir,
            &[
                vec!["AUC", "igen", "Aurum Consulting Kft.", "magyar"],
                vec!["AXM", "Igen", "Axiom Zrt.", "angol"],
                vec!["OLD", "nem", "Old Partner Bt.", "magyar"],
            ],
            &[vec!["AUC", "P1"], vec!["AUC", "P2"], vec!["AXM", "P1"]],
        );

        let registry = ClientRegistry::load(&path, &EngineConfig::default()).unwrap();
        assert_eq!(registry.active_count(), 2);
        assert!(registry.is_active("AUC"));
        assert!(registry.is_active("auc")); // canonical match
        assert!(!registry.is_active("OLD"));
        assert_eq!(registry.pair_count(), 3);
        assert!(registry.is_allowed_pair("AUC", "P1"));
        assert!(registry.is_allowed_pair("auc", "p2"));
        assert!(!registry.is_allowed_pair("AXM", "P2"));
        assert!(registry.is_known_client("AXM"));
        assert!(!registry.is_known_client("ZZZ"));
    }

    #[test]
    fn test_display_name_and_language() {
        let dir = TempDir::new().unwrap();
        let path = write_registry(
            &dir,
            &[
                vec!["AUC", "igen", "Aurum Consulting Kft.", "Angol"],
                vec!["AXM", "igen", "", ""],
            ],
            &[vec!["AUC", "P1"]],
        );

        let registry = ClientRegistry::load(&path, &EngineConfig::default()).unwrap();
        let auc = registry.client("AUC").unwrap();
        assert_eq!(auc.display_name, "Aurum Consulting Kft.");
        assert_eq!(auc.language, "angol");
        // Name falls back to the code, language to the default
        let axm = registry.client("AXM").unwrap();
        assert_eq!(axm.display_name, "AXM");
        assert_eq!(axm.language, "magyar");
    }

    #[test]
    fn test_missing_pair_sheet_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("registry.xlsx");
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name("Cégadatok").unwrap();
        sheet.write_string(0, 0, "Ügyfélkód").unwrap();
        sheet.write_string(0, 1, "Ügyfél aktív").unwrap();
        workbook.save(&path).unwrap();

        let err = ClientRegistry::load(&path, &EngineConfig::default()).unwrap_err();
        assert!(matches!(err, RegistryError::MissingSheet { sheet } if sheet == "TS kódok"));
    }

    #[test]
    fn test_missing_key_column_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("registry.xlsx");
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name("Cégadatok").unwrap();
        sheet.write_string(0, 0, "Ügyfélkód").unwrap();
        sheet.write_string(0, 1, "Valami").unwrap();
        let sheet = workbook.add_worksheet();
        sheet.set_name("TS kódok").unwrap();
        sheet.write_string(0, 0, "Ügyfélkód").unwrap();
        sheet.write_string(0, 1, "Projekt neve").unwrap();
        workbook.save(&path).unwrap();

        let err = ClientRegistry::load(&path, &EngineConfig::default()).unwrap_err();
        assert!(
            matches!(err, RegistryError::MissingColumn { column, .. } if column == "Ügyfél aktív")
        );
    }

    #[test]
    fn test_open_failure_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nope.xlsx");
        let err = ClientRegistry::load(&path, &EngineConfig::default()).unwrap_err();
        assert!(matches!(err, RegistryError::Open { .. }));
    }
}
