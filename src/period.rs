// Period tokens & month sheet resolution
//
// A period is either one of the twelve canonical month tokens or the
// full-year sentinel. Sheet names are matched through the Text Normalizer,
// so "Február", "februar" and " FEBRUÁR " all resolve to the same token.

use chrono::{Datelike, Local};

use crate::normalize::canonical;

/// Canonical month tokens, January..December, in the form sheet names
/// canonicalize to.
pub const MONTH_TOKENS: [&str; 12] = [
    "januar",
    "februar",
    "marcius",
    "aprilis",
    "majus",
    "junius",
    "julius",
    "augusztus",
    "szeptember",
    "oktober",
    "november",
    "december",
];

/// Label used for the full-year sentinel in artifact names.
pub const FULL_YEAR_LABEL: &str = "teljes_ev";

/// Requested reporting period: a single month or the whole year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    /// Calendar month, 1-based.
    Month(u32),
    /// All twelve month sheets.
    FullYear,
}

impl Period {
    /// Parse a user-supplied period string. Accepts any spelling that
    /// canonicalizes to a month token, and "teljes év" (any separator) for
    /// the full year.
    pub fn parse(raw: &str) -> Option<Period> {
        let norm = canonical(raw).replace(['_', '-'], " ");
        if norm == "teljes ev" {
            return Some(Period::FullYear);
        }
        MONTH_TOKENS
            .iter()
            .position(|t| *t == norm)
            .map(|idx| Period::Month(idx as u32 + 1))
    }

    /// The current calendar month, used as the validation-mode default.
    pub fn current() -> Period {
        Period::Month(Local::now().month())
    }

    /// Canonical token for a month period; `None` for the full year.
    pub fn token(&self) -> Option<&'static str> {
        match self {
            Period::Month(m) => Some(MONTH_TOKENS[(*m as usize) - 1]),
            Period::FullYear => None,
        }
    }

    /// Label embedded in artifact file names.
    pub fn label(&self) -> &'static str {
        match self {
            Period::Month(m) => MONTH_TOKENS[(*m as usize) - 1],
            Period::FullYear => FULL_YEAR_LABEL,
        }
    }

    /// 1-based month number; `None` for the full year.
    pub fn month_number(&self) -> Option<u32> {
        match self {
            Period::Month(m) => Some(*m),
            Period::FullYear => None,
        }
    }

    /// Does a sheet whose name canonicalizes to `sheet_norm` belong to this
    /// period?
    fn matches(&self, sheet_norm: &str) -> bool {
        match self {
            Period::Month(m) => MONTH_TOKENS[(*m as usize) - 1] == sheet_norm,
            Period::FullYear => MONTH_TOKENS.iter().any(|t| *t == sheet_norm),
        }
    }
}

/// Resolve the sheets of one workbook that belong to the requested period.
///
/// Sheet names are matched canonically. For a specific month at most one
/// sheet is returned; if several sheets canonicalize to the same token (bad
/// authoring, but it must not crash) the first in workbook order wins. An
/// empty result is "not found", which the caller logs and skips - it is
/// never an error.
pub fn resolve_month_sheets(sheet_names: &[String], period: Period) -> Vec<String> {
    let mut matched = Vec::new();
    for name in sheet_names {
        let norm = canonical(name);
        if !period.matches(&norm) {
            continue;
        }
        match period {
            Period::Month(_) => {
                // first sheet in workbook order wins
                return vec![name.clone()];
            }
            Period::FullYear => {
                // same tie-break per token in full-year mode
                if !matched
                    .iter()
                    .any(|m: &String| canonical(m) == norm)
                {
                    matched.push(name.clone());
                }
            }
        }
    }
    matched
}
