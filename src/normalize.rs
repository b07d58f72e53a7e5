// Text Normalizer - canonical forms for comparison
//
// Every equality decision in the engine goes through `canonical`: two tokens
// are "the same" if and only if their canonical forms are equal. The original
// text is never modified or discarded; it stays around for display and for
// map identity.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Canonical form of a text token: NFKD-decomposed with combining marks
/// removed (diacritic folding), surrounding whitespace trimmed, lowercased.
///
/// Total: any input produces a canonical form. Non-text cell values are
/// stringified by the cell coercion helpers before they get here.
pub fn canonical(raw: &str) -> String {
    raw.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .trim()
        .to_lowercase()
}

/// Compare two tokens under canonicalization.
pub fn same(a: &str, b: &str) -> bool {
    canonical(a) == canonical(b)
}
