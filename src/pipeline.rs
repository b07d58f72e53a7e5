// Reconciliation pipeline - one blocking invocation, one artifact
//
// Linear flow: registry load (the only fatal failure) -> source discovery ->
// per-file sheet resolution and extraction (per-unit failures are skipped
// once and recorded as data) -> one validation pass -> per-mode aggregation
// and rendering. Inputs are opened read-only; nothing is cached across runs.

use chrono::{Datelike, Local};
use rust_xlsxwriter::XlsxError;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

use calamine::{open_workbook_auto, Reader};

use crate::aggregate::{aggregate, top_by_hours, total_hours, Dimension};
use crate::config::EngineConfig;
use crate::discovery::{discover_workbooks, employee_name};
use crate::extract::{extract_sheet, RawRow};
use crate::invoice::{annex_year, InvoiceRenderer};
use crate::period::{resolve_month_sheets, Period};
use crate::registry::{ClientRegistry, RegistryError};
use crate::report::{ReportMeta, ReportRenderer, SummaryFigures};
use crate::validate::{ValidationEngine, ValidationOutcome};

// ============================================================================
// MODES
// ============================================================================

/// Report mode of one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Aggregated hour summary across all employees.
    Summary,
    /// Client/project pair validation report.
    Validation,
    /// Per-client invoice annex.
    Invoice,
}

impl Mode {
    /// Report-kind prefix embedded in the artifact file name.
    pub fn artifact_kind(&self) -> &'static str {
        match self {
            Mode::Summary => "timesheet_summary",
            Mode::Validation => "invalid_parok",
            Mode::Invoice => "szamlamelleklet",
        }
    }
}

// ============================================================================
// RUN RESULT
// ============================================================================

/// Fatal engine failures. Everything else is absorbed into the outcome.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("failed to write artifact: {0}")]
    Artifact(#[from] XlsxError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Per-unit skip counters for one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub processed_files: usize,
    pub skipped_files: usize,
    pub processed_sheets: usize,
    pub skipped_sheets: usize,
    pub candidate_rows: usize,
    pub dropped_rows: usize,
    pub suppressed_rows: usize,
    pub inactive_rows: usize,
    pub file_errors: usize,
}

/// What one invocation produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub artifact: Option<PathBuf>,
    pub issue_count: usize,
    pub errors: Vec<String>,
    pub summary: RunSummary,
}

// ============================================================================
// PIPELINE
// ============================================================================

/// Run the whole pipeline once. Blocking; returns only the final result,
/// never partial output. The registry and every source workbook are opened
/// read-only and closed before returning.
pub fn run(
    mode: Mode,
    period: Period,
    directory: &Path,
    registry_path: &Path,
    config: &EngineConfig,
) -> Result<RunOutcome, EngineError> {
    let started = Instant::now();
    info!(?mode, period = period.label(), "run started");

    // Fatal on failure: no reconciliation against incomplete master data
    let registry = ClientRegistry::load(registry_path, config)?;

    let sources = discover_workbooks(directory, registry_path, config)?;
    info!(candidates = sources.len(), "source discovery done");

    let mut summary = RunSummary::default();
    let mut errors: Vec<String> = Vec::new();
    let mut rows: Vec<RawRow> = Vec::new();

    for path in &sources {
        collect_file(path, period, config, &mut rows, &mut summary, &mut errors);
    }
    summary.candidate_rows = rows.len();

    let engine = ValidationEngine::new(&registry, &config.exempt_client_codes);
    let outcome = engine.run(&rows);
    summary.suppressed_rows = outcome.suppressed_rows;
    summary.inactive_rows = outcome.inactive_rows;

    let generated_at = Local::now();
    let out_dir = config.output_dir.as_deref().unwrap_or(directory);
    let artifact_name = format!(
        "{}_{}_{}.xlsx",
        mode.artifact_kind(),
        period.label(),
        generated_at.format("%Y%m%d_%H%M")
    );
    let artifact_path = out_dir.join(&artifact_name);

    render_artifact(
        mode,
        period,
        &artifact_path,
        registry_path,
        &registry,
        &outcome,
        &summary,
        config,
        &generated_at,
    )?;

    let issue_count = outcome.issues.len();
    info!(
        processed_files = summary.processed_files,
        skipped_files = summary.skipped_files,
        processed_sheets = summary.processed_sheets,
        skipped_sheets = summary.skipped_sheets,
        issues = issue_count,
        errors = errors.len(),
        duration_ms = started.elapsed().as_millis() as u64,
        artifact = %artifact_path.display(),
        "run finished"
    );

    Ok(RunOutcome {
        artifact: Some(artifact_path),
        issue_count,
        errors,
        summary,
    })
}

/// Gather candidate rows from one source workbook. Open and schema failures
/// skip the file; a missing month sheet only logs it.
fn collect_file(
    path: &Path,
    period: Period,
    config: &EngineConfig,
    rows: &mut Vec<RawRow>,
    summary: &mut RunSummary,
    errors: &mut Vec<String>,
) {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let employee = employee_name(path);
    info!(file = %file_name, "processing source workbook");

    let mut workbook = match open_workbook_auto(path) {
        Ok(workbook) => workbook,
        Err(err) => {
            warn!(file = %file_name, "cannot open workbook: {err}");
            errors.push(format!("{file_name}: cannot open workbook: {err}"));
            summary.file_errors += 1;
            summary.skipped_files += 1;
            return;
        }
    };

    let sheet_names = workbook.sheet_names().to_owned();
    let matched = resolve_month_sheets(&sheet_names, period);
    summary.skipped_sheets += sheet_names.len() - matched.len();
    if matched.is_empty() {
        info!(file = %file_name, "skipped: no sheet for the requested period");
        summary.skipped_files += 1;
        return;
    }

    let mut sheets_processed = 0usize;
    for (sheet_idx, sheet) in matched.iter().enumerate() {
        let range = match workbook.worksheet_range(sheet) {
            Ok(range) => range,
            Err(err) => {
                warn!(file = %file_name, sheet = %sheet, "cannot read sheet: {err}");
                errors.push(format!("{file_name}/{sheet}: cannot read sheet: {err}"));
                summary.file_errors += 1;
                summary.skipped_sheets += 1;
                continue;
            }
        };
        match extract_sheet(&range, sheet, &file_name, &employee, config) {
            Ok(extraction) => {
                summary.dropped_rows += extraction.dropped_rows;
                if extraction.rows.is_empty() && extraction.dropped_rows == 0 {
                    info!(file = %file_name, sheet = %sheet, "skipped: empty sheet");
                    summary.skipped_sheets += 1;
                    continue;
                }
                rows.extend(extraction.rows);
                sheets_processed += 1;
                summary.processed_sheets += 1;
            }
            Err(schema) => {
                // The file is skipped once; the run continues
                warn!(file = %file_name, "skipped: {schema}");
                errors.push(schema.to_string());
                summary.skipped_sheets += matched.len() - sheet_idx;
                break;
            }
        }
    }

    if sheets_processed > 0 {
        summary.processed_files += 1;
    } else {
        summary.skipped_files += 1;
    }
}

#[allow(clippy::too_many_arguments)]
fn render_artifact(
    mode: Mode,
    period: Period,
    artifact_path: &Path,
    registry_path: &Path,
    registry: &ClientRegistry,
    outcome: &ValidationOutcome,
    summary: &RunSummary,
    config: &EngineConfig,
    generated_at: &chrono::DateTime<Local>,
) -> Result<(), XlsxError> {
    let stamp = generated_at.format("%Y-%m-%d %H:%M");
    match mode {
        Mode::Summary => {
            let main = aggregate(&outcome.accepted, Dimension::ClientProjectDescription);
            let by_person = aggregate(&outcome.accepted, Dimension::Employee);
            let by_person = top_by_hours(&by_person, by_person.len());
            let projects = aggregate(&outcome.accepted, Dimension::ClientProject);
            let top_projects = top_by_hours(&projects, 20);
            let figures = SummaryFigures {
                processed_files: summary.processed_files,
                skipped_files: summary.skipped_files,
                processed_sheets: summary.processed_sheets,
                skipped_sheets: summary.skipped_sheets,
                total_hours: total_hours(&main),
            };
            let meta = ReportMeta {
                title: format!("Timesheet összesítés — {}", period.label()),
                subtitle: format!("Generálva: {stamp}"),
            };
            ReportRenderer::new(config).render_summary(
                artifact_path,
                &meta,
                &main,
                &by_person,
                &top_projects,
                &figures,
            )
        }
        Mode::Validation => {
            let meta = ReportMeta {
                title: "Ügyfélkód–Projekt párok ellenőrzése — Hibák".to_string(),
                subtitle: format!("Hónap: {}    Generálva: {stamp}", period.label()),
            };
            ReportRenderer::new(config).render_validation(artifact_path, &meta, &outcome.issues)
        }
        Mode::Invoice => {
            // The registry workbook is year-scoped; its file name carries
            // the reporting year
            let registry_file = registry_path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default();
            let renderer = InvoiceRenderer {
                year: annex_year(registry_file, generated_at.year()),
                date_line: format!("Budapest, {}", generated_at.format("%Y. %m. %d.")),
            };
            renderer.render(
                artifact_path,
                period,
                &outcome.accepted,
                registry,
                &config.invoice_client_codes,
            )
        }
    }
}
