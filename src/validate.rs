// Validation & Filtering Engine - one pass, two views
//
// Every candidate row is classified exactly once; the accepted-entry list
// consumed by aggregation and the issue list consumed by the validation
// report are two views over that single pass, so the two report modes cannot
// diverge. Verdicts are data, never exceptions.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::extract::RawRow;
use crate::normalize::canonical;
use crate::registry::ClientRegistry;

// ============================================================================
// TIME ENTRY
// ============================================================================

/// A time record that passed every validation step. Immutable after
/// creation; invariant: hours > 0, codes non-empty.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeEntry {
    pub client_code: String,
    pub project_code: String,
    pub description: String,
    pub date: Option<NaiveDate>,
    pub hours: Decimal,
    pub employee: String,
    pub source_file: String,
}

// ============================================================================
// VALIDATION ISSUE
// ============================================================================

/// Why a row was rejected from aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IssueReason {
    /// Client code not present in the pair sheet at all.
    UnknownClient,
    /// Client is known, but the project is not allowed for it.
    DisallowedPair,
}

impl IssueReason {
    /// Report wording. The conditional-format rules key on substrings of
    /// these labels ("Ismeretlen", "Érvénytelen").
    pub fn label(&self) -> &'static str {
        match self {
            IssueReason::UnknownClient => "Ismeretlen Ügyfélkód (nincs a TS kódokban)",
            IssueReason::DisallowedPair => {
                "Érvénytelen páros: Ügyfélkódhoz ez a Projekt nem engedélyezett"
            }
        }
    }
}

/// One rejected row, with provenance and the codes exactly as written.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationIssue {
    pub source_file: String,
    pub sheet: String,
    pub row_number: u32,
    pub client_raw: String,
    pub project_raw: String,
    pub reason: IssueReason,
}

// ============================================================================
// ROW VERDICT
// ============================================================================

/// Outcome of classifying one candidate row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowVerdict {
    Accepted(TimeEntry),
    /// Administratively-exempt client code; never reported either way.
    Suppressed,
    /// Client not marked active; not reconciled, not an error.
    Inactive,
    Rejected(ValidationIssue),
}

// ============================================================================
// VALIDATION ENGINE
// ============================================================================

/// Classifies candidate rows against the master registry.
pub struct ValidationEngine<'a> {
    registry: &'a ClientRegistry,
    /// Canonical forms of the exempt client codes.
    exempt: Vec<String>,
}

/// Accepted entries and issues produced by one validation pass, with the
/// silent-skip counters for the run summary.
#[derive(Debug, Clone, Default)]
pub struct ValidationOutcome {
    pub accepted: Vec<TimeEntry>,
    pub issues: Vec<ValidationIssue>,
    pub suppressed_rows: usize,
    pub inactive_rows: usize,
}

impl<'a> ValidationEngine<'a> {
    pub fn new(registry: &'a ClientRegistry, exempt_codes: &[String]) -> Self {
        ValidationEngine {
            registry,
            exempt: exempt_codes.iter().map(|c| canonical(c)).collect(),
        }
    }

    /// Classify a single candidate row. Steps, in order: suppression list,
    /// active-client filter, unknown client, disallowed pair, accept.
    pub fn classify(&self, row: &RawRow) -> RowVerdict {
        let client_norm = canonical(&row.client_raw);

        if self.exempt.iter().any(|e| *e == client_norm) {
            return RowVerdict::Suppressed;
        }
        if !self.registry.is_active(&row.client_raw) {
            return RowVerdict::Inactive;
        }
        if !self.registry.is_known_client(&row.client_raw) {
            return RowVerdict::Rejected(issue(row, IssueReason::UnknownClient));
        }
        if !self
            .registry
            .is_allowed_pair(&row.client_raw, &row.project_raw)
        {
            return RowVerdict::Rejected(issue(row, IssueReason::DisallowedPair));
        }

        RowVerdict::Accepted(TimeEntry {
            client_code: row.client_raw.clone(),
            project_code: row.project_raw.clone(),
            description: row.description.clone(),
            date: row.date,
            hours: row.hours,
            employee: row.employee.clone(),
            source_file: row.source_file.clone(),
        })
    }

    /// Run the full pass over every candidate row. Issues come out sorted by
    /// (source file, sheet, row) for deterministic reporting.
    pub fn run(&self, rows: &[RawRow]) -> ValidationOutcome {
        let mut outcome = ValidationOutcome::default();
        for row in rows {
            match self.classify(row) {
                RowVerdict::Accepted(entry) => outcome.accepted.push(entry),
                RowVerdict::Suppressed => outcome.suppressed_rows += 1,
                RowVerdict::Inactive => outcome.inactive_rows += 1,
                RowVerdict::Rejected(issue) => outcome.issues.push(issue),
            }
        }
        outcome.issues.sort_by(|a, b| {
            (&a.source_file, &a.sheet, a.row_number)
                .cmp(&(&b.source_file, &b.sheet, b.row_number))
        });
        outcome
    }
}

fn issue(row: &RawRow, reason: IssueReason) -> ValidationIssue {
    ValidationIssue {
        source_file: row.source_file.clone(),
        sheet: row.sheet.clone(),
        row_number: row.row_number,
        client_raw: row.client_raw.clone(),
        project_raw: row.project_raw.clone(),
        reason,
    }
}

// ============================================================================
// ISSUE SUMMARIES (validation report views)
// ============================================================================

/// Issue counts per reason label, count-descending, label tie-break.
pub fn issues_by_reason(issues: &[ValidationIssue]) -> Vec<(String, usize)> {
    count_sorted(issues.iter().map(|i| i.reason.label().to_string()))
}

/// Issue counts per source file, count-descending, name tie-break.
pub fn issues_by_file(issues: &[ValidationIssue]) -> Vec<(String, usize)> {
    count_sorted(issues.iter().map(|i| i.source_file.clone()))
}

/// Repeated bad (client, project) pairs, count-descending.
pub fn repeated_pairs(issues: &[ValidationIssue]) -> Vec<(String, String, usize)> {
    let mut counts: BTreeMap<(String, String), usize> = BTreeMap::new();
    for i in issues {
        *counts
            .entry((i.client_raw.clone(), i.project_raw.clone()))
            .or_insert(0) += 1;
    }
    let mut out: Vec<_> = counts
        .into_iter()
        .map(|((client, project), n)| (client, project, n))
        .collect();
    out.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| (&a.0, &a.1).cmp(&(&b.0, &b.1))));
    out
}

fn count_sorted(keys: impl Iterator<Item = String>) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for key in keys {
        *counts.entry(key).or_insert(0) += 1;
    }
    let mut out: Vec<_> = counts.into_iter().collect();
    out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use rust_decimal_macros::dec;
    use rust_xlsxwriter::Workbook;
    use tempfile::TempDir;

    fn make_registry(dir: &TempDir) -> ClientRegistry {
        let path = dir.path().join("registry.xlsx");
        let mut workbook = Workbook::new();

        let sheet = workbook.add_worksheet();
        sheet.set_name("Cégadatok").unwrap();
        for (col, h) in ["Ügyfélkód", "Ügyfél aktív"].iter().enumerate() {
            sheet.write_string(0, col as u16, *h).unwrap();
        }
        // AAA and BBB active, PAS inactive
        for (r, (code, active)) in
            [("AAA", "igen"), ("BBB", "igen"), ("PAS", "nem")].iter().enumerate()
        {
            sheet.write_string((r + 1) as u32, 0, *code).unwrap();
            sheet.write_string((r + 1) as u32, 1, *active).unwrap();
        }

        let sheet = workbook.add_worksheet();
        sheet.set_name("TS kódok").unwrap();
        sheet.write_string(0, 0, "Ügyfélkód").unwrap();
        sheet.write_string(0, 1, "Projekt neve").unwrap();
        // AAA knows P1 only; BBB absent from the pair sheet entirely
        sheet.write_string(1, 0, "AAA").unwrap();
        sheet.write_string(1, 1, "P1").unwrap();

        workbook.save(&path).unwrap();
        ClientRegistry::load(&path, &EngineConfig::default()).unwrap()
    }

    fn make_row(client: &str, project: &str, hours: Decimal) -> RawRow {
        RawRow {
            client_raw: client.to_string(),
            project_raw: project.to_string(),
            description: "könyvelés".to_string(),
            date: None,
            hours,
            row_number: 2,
            sheet: "Január".to_string(),
            source_file: "Anna TS.xlsx".to_string(),
            employee: "Anna TS".to_string(),
        }
    }

    #[test]
    fn test_accepted_entry() {
        let dir = TempDir::new().unwrap();
        let registry = make_registry(&dir);
        let engine = ValidationEngine::new(&registry, &["ECO".to_string()]);

        let verdict = engine.classify(&make_row("AAA", "P1", dec!(5)));
        match verdict {
            RowVerdict::Accepted(entry) => {
                assert_eq!(entry.client_code, "AAA");
                assert_eq!(entry.project_code, "P1");
                assert_eq!(entry.hours, dec!(5));
            }
            other => panic!("expected acceptance, got {other:?}"),
        }
    }

    #[test]
    fn test_exempt_code_is_suppressed_before_everything() {
        let dir = TempDir::new().unwrap();
        let registry = make_registry(&dir);
        let engine = ValidationEngine::new(&registry, &["ECO".to_string()]);

        // ECO is not active and not known; suppression still wins
        assert_eq!(engine.classify(&make_row("ECO", "P1", dec!(1))), RowVerdict::Suppressed);
        assert_eq!(engine.classify(&make_row("eco", "P1", dec!(1))), RowVerdict::Suppressed);
    }

    #[test]
    fn test_inactive_client_dropped_silently() {
        let dir = TempDir::new().unwrap();
        let registry = make_registry(&dir);
        let engine = ValidationEngine::new(&registry, &[]);

        assert_eq!(engine.classify(&make_row("PAS", "P1", dec!(2))), RowVerdict::Inactive);
        // Entirely unknown codes are inactive too (not in the active map)
        assert_eq!(engine.classify(&make_row("ZZZ", "P1", dec!(2))), RowVerdict::Inactive);
    }

    #[test]
    fn test_unknown_client_code() {
        let dir = TempDir::new().unwrap();
        let registry = make_registry(&dir);
        let engine = ValidationEngine::new(&registry, &[]);

        // BBB is active but missing from the pair sheet
        match engine.classify(&make_row("BBB", "P1", dec!(2))) {
            RowVerdict::Rejected(issue) => {
                assert_eq!(issue.reason, IssueReason::UnknownClient);
                assert_eq!(issue.client_raw, "BBB");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_disallowed_pair() {
        let dir = TempDir::new().unwrap();
        let registry = make_registry(&dir);
        let engine = ValidationEngine::new(&registry, &[]);

        match engine.classify(&make_row("AAA", "P2", dec!(3))) {
            RowVerdict::Rejected(issue) => {
                assert_eq!(issue.reason, IssueReason::DisallowedPair);
                assert_eq!(issue.client_raw, "AAA");
                assert_eq!(issue.project_raw, "P2");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_one_pass_two_views() {
        let dir = TempDir::new().unwrap();
        let registry = make_registry(&dir);
        let engine = ValidationEngine::new(&registry, &["ECO".to_string()]);

        let rows = vec![
            make_row("AAA", "P1", dec!(5)),
            make_row("AAA", "P2", dec!(3)),
            make_row("ECO", "P1", dec!(1)),
            make_row("PAS", "P1", dec!(2)),
        ];
        let outcome = engine.run(&rows);

        assert_eq!(outcome.accepted.len(), 1);
        assert_eq!(outcome.issues.len(), 1);
        assert_eq!(outcome.suppressed_rows, 1);
        assert_eq!(outcome.inactive_rows, 1);

        // No row is both accepted and rejected
        for issue in &outcome.issues {
            assert!(!outcome.accepted.iter().any(|e| {
                e.client_code == issue.client_raw && e.project_code == issue.project_raw
            }));
        }
    }

    #[test]
    fn test_issue_ordering_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let registry = make_registry(&dir);
        let engine = ValidationEngine::new(&registry, &[]);

        let mut r1 = make_row("AAA", "P9", dec!(1));
        r1.source_file = "B TS.xlsx".to_string();
        r1.row_number = 4;
        let mut r2 = make_row("AAA", "P8", dec!(1));
        r2.source_file = "A TS.xlsx".to_string();
        r2.row_number = 9;
        let mut r3 = make_row("AAA", "P7", dec!(1));
        r3.source_file = "A TS.xlsx".to_string();
        r3.row_number = 3;

        let outcome = engine.run(&[r1, r2, r3]);
        let order: Vec<_> = outcome
            .issues
            .iter()
            .map(|i| (i.source_file.clone(), i.row_number))
            .collect();
        assert_eq!(
            order,
            vec![
                ("A TS.xlsx".to_string(), 3),
                ("A TS.xlsx".to_string(), 9),
                ("B TS.xlsx".to_string(), 4),
            ]
        );
    }

    #[test]
    fn test_issue_summaries() {
        let dir = TempDir::new().unwrap();
        let registry = make_registry(&dir);
        let engine = ValidationEngine::new(&registry, &[]);

        let mut rows = vec![
            make_row("AAA", "P2", dec!(1)),
            make_row("AAA", "P2", dec!(1)),
            make_row("BBB", "P1", dec!(1)),
        ];
        rows[2].source_file = "B TS.xlsx".to_string();
        let outcome = engine.run(&rows);

        let by_reason = issues_by_reason(&outcome.issues);
        assert_eq!(by_reason[0].1, 2); // two disallowed pairs
        assert_eq!(by_reason[1].1, 1);

        let by_file = issues_by_file(&outcome.issues);
        assert_eq!(by_file[0], ("Anna TS.xlsx".to_string(), 2));

        let pairs = repeated_pairs(&outcome.issues);
        assert_eq!(pairs[0], ("AAA".to_string(), "P2".to_string(), 2));
    }
}
