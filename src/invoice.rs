// Invoice annex renderer - per-client certificate-of-completion sheets
//
// One sheet per selected active client, in accent-insensitive alphabetical
// code order. Each sheet carries the client's display name, a
// language-dependent boilerplate block, the description/hours task table and
// the four contract summary rows (used / contracted / older period /
// difference), the last of which is a live formula.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook, XlsxError};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::normalize::canonical;
use crate::period::Period;
use crate::registry::ClientRegistry;
use crate::validate::TimeEntry;

// ============================================================================
// BOILERPLATE
// ============================================================================

struct Boilerplate {
    title: &'static str,
    text: &'static str,
    task_header: &'static str,
    hours_header: &'static str,
    summary_labels: [&'static str; 4],
}

const BOILERPLATE_HU: Boilerplate = Boilerplate {
    title: "Számlamelléklet (teljesítési igazolás)",
    text: "Szerződésünk 4 pontja szerint csatoljuk az adott elszámolási időszakban \
           igénybe vett tanácsadási szolgáltatásokról szóló kimutatást.",
    task_header: "Feladat",
    hours_header: "Időráfordítás (óra)",
    summary_labels: [
        "Felhasznált tanácsadói órák",
        "Szerződés szerint rendelkezésre álló óraszám",
        "Korábbi időszaki órák",
        "Különbözet",
    ],
};

const BOILERPLATE_EN: Boilerplate = Boilerplate {
    title: "Invoice attachment (certificate of completion)",
    text: "According to point 4 of our contract, we are attaching a statement of \
           the consulting services used in the given accounting period.",
    task_header: "Task description",
    hours_header: "Time spent (hours)",
    summary_labels: [
        "Used consulting hours",
        "Contracted available hours",
        "Older period hours",
        "Difference",
    ],
};

fn boilerplate_for(language: &str) -> &'static Boilerplate {
    if canonical(language) == "angol" {
        &BOILERPLATE_EN
    } else {
        &BOILERPLATE_HU
    }
}

fn period_line(language: &str, year: i32, period: Period) -> String {
    match (canonical(language).as_str(), period.month_number()) {
        ("angol", Some(m)) => format!("{year}-{m:02}"),
        ("angol", None) => format!("{year}"),
        (_, Some(m)) => format!("{year}. {m}. hónap"),
        (_, None) => format!("{year}. év"),
    }
}

/// Year the annex reports on: a 20xx number embedded in the registry file
/// name wins (the registry is year-scoped), otherwise the fallback.
pub fn annex_year(registry_file_name: &str, fallback: i32) -> i32 {
    let bytes = registry_file_name.as_bytes();
    for window in bytes.windows(4) {
        if window[0] == b'2' && window[1] == b'0' && window[2].is_ascii_digit() && window[3].is_ascii_digit() {
            if let Ok(year) = std::str::from_utf8(window).unwrap_or("").parse::<i32>() {
                return year;
            }
        }
    }
    fallback
}

// ============================================================================
// SHEET TITLES
// ============================================================================

const INVALID_SHEET_CHARS: [char; 7] = [':', '\\', '/', '?', '*', '[', ']'];

/// Excel-safe sheet title: invalid characters replaced, 31-char cap,
/// `_n` suffix on collision.
fn sanitize_sheet_title(raw: &str, used: &mut HashSet<String>) -> String {
    let mut name: String = raw
        .chars()
        .map(|c| if INVALID_SHEET_CHARS.contains(&c) { '_' } else { c })
        .collect::<String>()
        .trim()
        .to_string();
    if name.is_empty() {
        name = "Lap".to_string();
    }
    if name.chars().count() > 31 {
        name = name.chars().take(31).collect();
    }
    let base = name.clone();
    let mut i = 1;
    while used.contains(&name) {
        let suffix = format!("_{i}");
        let keep = 31usize.saturating_sub(suffix.chars().count());
        name = base.chars().take(keep).collect::<String>() + &suffix;
        i += 1;
    }
    used.insert(name.clone());
    name
}

// ============================================================================
// INVOICE RENDERER
// ============================================================================

pub struct InvoiceRenderer {
    pub year: i32,
    /// Date line on each sheet, e.g. "Budapest, 2025. 02. 01.".
    pub date_line: String,
}

impl InvoiceRenderer {
    /// Render the annex workbook. `ordered_codes` drives which clients get a
    /// sheet; codes not active in the registry are filtered out.
    pub fn render(
        &self,
        path: &Path,
        period: Period,
        entries: &[TimeEntry],
        registry: &ClientRegistry,
        ordered_codes: &[String],
    ) -> Result<(), XlsxError> {
        // description -> hours per selected client, keyed canonically
        let selected: Vec<String> = ordered_codes
            .iter()
            .filter(|c| registry.is_active(c))
            .cloned()
            .collect();
        let selected_norm: HashSet<String> = selected.iter().map(|c| canonical(c)).collect();

        let mut per_client: BTreeMap<String, BTreeMap<String, Decimal>> = BTreeMap::new();
        for entry in entries {
            let code_norm = canonical(&entry.client_code);
            if !selected_norm.contains(&code_norm) {
                continue;
            }
            *per_client
                .entry(code_norm)
                .or_default()
                .entry(entry.description.trim().to_string())
                .or_insert(Decimal::ZERO) += entry.hours;
        }

        let formats = InvoiceFormats::new();
        let mut workbook = Workbook::new();
        let mut used_titles = HashSet::new();

        // Accent-insensitive alphabetical order regardless of input order
        let mut codes = selected;
        codes.sort_by_key(|c| canonical(c));

        for code in &codes {
            let record = match registry.client(code) {
                Some(record) => record,
                None => continue,
            };
            let items = per_client.get(&canonical(code));

            let title = sanitize_sheet_title(code, &mut used_titles);
            let sheet = workbook.add_worksheet();
            sheet.set_name(&title)?;

            sheet.set_column_width(0, 3)?;
            sheet.set_column_width(1, 3)?;
            sheet.set_column_width(2, 70)?;
            sheet.set_column_width(3, 18)?;

            // Client header
            sheet.write_with_format(5, 2, record.display_name.as_str(), &formats.client_name)?;

            let bp = boilerplate_for(&record.language);
            sheet.write_with_format(9, 2, bp.title, &formats.title)?;
            sheet.write_with_format(
                10,
                2,
                period_line(&record.language, self.year, period).as_str(),
                &formats.body,
            )?;
            sheet.write_with_format(11, 2, self.date_line.as_str(), &formats.date_line)?;
            sheet.write_with_format(12, 2, bp.text, &formats.body)?;

            // Task table header
            sheet.write_with_format(15, 2, bp.task_header, &formats.table_header)?;
            sheet.write_with_format(15, 3, bp.hours_header, &formats.table_header)?;

            let mut row = 16u32;
            if let Some(items) = items {
                let mut sorted: Vec<(&String, &Decimal)> = items.iter().collect();
                sorted.sort_by_key(|(desc, _)| desc.to_lowercase());
                for (desc, hours) in sorted {
                    sheet.write_with_format(row, 2, desc.as_str(), &formats.task)?;
                    sheet.write_with_format(row, 3, hours.to_f64().unwrap_or(0.0), &formats.hours)?;
                    row += 1;
                }
            }

            // Summary rows: used (=SUM), contracted, older period, difference
            let first_task_row = 17; // 1-based Excel rows for the formulas
            let last_task_row = row; // row is 0-based; +1 -1 cancel out
            let used_row = row + 1;

            sheet.write_with_format(row, 2, bp.summary_labels[0], &formats.summary_label)?;
            let sum_formula = if last_task_row >= first_task_row {
                format!("=SUM(D{first_task_row}:D{last_task_row})")
            } else {
                "=0".to_string()
            };
            sheet.write_formula_with_format(row, 3, sum_formula.as_str(), &formats.hours)?;

            sheet.write_with_format(row + 1, 2, bp.summary_labels[1], &formats.summary_label)?;
            sheet.write_with_format(row + 1, 3, 0.0, &formats.hours)?;

            sheet.write_with_format(row + 2, 2, bp.summary_labels[2], &formats.summary_label)?;
            sheet.write_with_format(row + 2, 3, 0.0, &formats.hours)?;

            sheet.write_with_format(row + 3, 2, bp.summary_labels[3], &formats.summary_label)?;
            let diff_formula = format!("=D{}-D{}+D{}", used_row, used_row + 1, used_row + 2);
            sheet.write_formula_with_format(row + 3, 3, diff_formula.as_str(), &formats.hours)?;
        }

        workbook.save(path)
    }
}

struct InvoiceFormats {
    client_name: Format,
    title: Format,
    date_line: Format,
    body: Format,
    table_header: Format,
    task: Format,
    hours: Format,
    summary_label: Format,
}

impl InvoiceFormats {
    fn new() -> Self {
        InvoiceFormats {
            client_name: Format::new()
                .set_italic()
                .set_font_color(0xC00000)
                .set_font_size(12)
                .set_border_bottom(FormatBorder::Medium),
            title: Format::new().set_bold().set_font_size(14),
            date_line: Format::new().set_italic().set_font_color(0xC00000),
            body: Format::new().set_text_wrap(),
            table_header: Format::new()
                .set_bold()
                .set_background_color(0xF2F2F2)
                .set_border(FormatBorder::Thin)
                .set_align(FormatAlign::Center),
            task: Format::new().set_text_wrap().set_border(FormatBorder::Thin),
            hours: Format::new()
                .set_num_format("0.00")
                .set_align(FormatAlign::Right)
                .set_border(FormatBorder::Thin),
            summary_label: Format::new().set_bold().set_border(FormatBorder::Thin),
        }
    }
}
