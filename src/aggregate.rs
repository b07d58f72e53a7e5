// Aggregation Engine - deterministic grouped hour sums
//
// Buckets are keyed by the canonical form of the grouping fields but carry
// the original text for display. Hours accumulate as exact decimals; the
// 2-decimal presentation is applied only at render time.

use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};

use crate::normalize::canonical;
use crate::validate::TimeEntry;

// ============================================================================
// DIMENSIONS
// ============================================================================

/// Grouping-key selector for one aggregation view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    /// Client code + project code + work description (main summary table).
    ClientProjectDescription,
    /// Employee identity (per-person view).
    Employee,
    /// Client code + project code (project totals).
    ClientProject,
}

impl Dimension {
    fn key_fields(&self, entry: &TimeEntry) -> Vec<String> {
        match self {
            Dimension::ClientProjectDescription => vec![
                entry.client_code.clone(),
                entry.project_code.clone(),
                entry.description.clone(),
            ],
            Dimension::Employee => vec![entry.employee.clone()],
            Dimension::ClientProject => {
                vec![entry.client_code.clone(), entry.project_code.clone()]
            }
        }
    }
}

// ============================================================================
// AGGREGATE BUCKET
// ============================================================================

/// One grouped row: original-text key fields, exact hour sum, and the set of
/// contributing source files.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateBucket {
    pub key: Vec<String>,
    pub hours: Decimal,
    pub sources: BTreeSet<String>,
}

impl AggregateBucket {
    /// Provenance for display: sorted, de-duplicated source files joined.
    pub fn sources_joined(&self) -> String {
        self.sources.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}

// ============================================================================
// AGGREGATION
// ============================================================================

/// Group accepted entries along one dimension. Output is sorted ascending by
/// the canonical key fields in declaration order, ties broken by the
/// original text, so bucket order never depends on input row order.
pub fn aggregate(entries: &[TimeEntry], dimension: Dimension) -> Vec<AggregateBucket> {
    // (canonical key, original key) -> bucket; the composite map key gives
    // the required sort for free.
    let mut buckets: BTreeMap<(Vec<String>, Vec<String>), AggregateBucket> = BTreeMap::new();

    for entry in entries {
        let key = dimension.key_fields(entry);
        let key_norm: Vec<String> = key.iter().map(|f| canonical(f)).collect();
        let bucket = buckets
            .entry((key_norm, key.clone()))
            .or_insert_with(|| AggregateBucket {
                key,
                hours: Decimal::ZERO,
                sources: BTreeSet::new(),
            });
        bucket.hours += entry.hours;
        bucket.sources.insert(entry.source_file.clone());
    }

    buckets.into_values().collect()
}

/// Top-N buckets by hours, descending, canonical-key tie-break. Deterministic
/// companion for the project-totals view.
pub fn top_by_hours(buckets: &[AggregateBucket], n: usize) -> Vec<AggregateBucket> {
    let mut sorted: Vec<AggregateBucket> = buckets.to_vec();
    sorted.sort_by(|a, b| {
        b.hours.cmp(&a.hours).then_with(|| {
            let ka: Vec<String> = a.key.iter().map(|f| canonical(f)).collect();
            let kb: Vec<String> = b.key.iter().map(|f| canonical(f)).collect();
            ka.cmp(&kb)
        })
    });
    sorted.truncate(n);
    sorted
}

/// Exact total over a bucket list.
pub fn total_hours(buckets: &[AggregateBucket]) -> Decimal {
    buckets.iter().map(|b| b.hours).sum()
}
