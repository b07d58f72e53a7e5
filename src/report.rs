// Report Renderer - styled xlsx artifacts from engine results
//
// The renderer is a pure projection: it never recomputes or re-validates
// anything, and the generation timestamp comes from the caller, so rendering
// the same results twice produces identical table content.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_xlsxwriter::{
    ConditionalFormatCell, ConditionalFormatCellRule, ConditionalFormatText,
    ConditionalFormatTextRule, Format, FormatAlign, FormatBorder, Workbook, Worksheet, XlsxError,
};
use std::path::Path;

use crate::aggregate::AggregateBucket;
use crate::config::EngineConfig;
use crate::validate::{issues_by_file, issues_by_reason, repeated_pairs, ValidationIssue};

// ============================================================================
// RENDER INPUTS
// ============================================================================

/// Title-band metadata for one artifact.
#[derive(Debug, Clone)]
pub struct ReportMeta {
    pub title: String,
    pub subtitle: String,
}

/// One rendered cell value.
#[derive(Debug, Clone)]
pub enum Cell {
    Text(String),
    Hours(Decimal),
    Count(usize),
}

/// Run counters shown on the summary sheet.
#[derive(Debug, Clone, Default)]
pub struct SummaryFigures {
    pub processed_files: usize,
    pub skipped_files: usize,
    pub processed_sheets: usize,
    pub skipped_sheets: usize,
    pub total_hours: Decimal,
}

// ============================================================================
// FORMATS
// ============================================================================

struct ReportFormats {
    banner: Format,
    subtitle: Format,
    table_header: Format,
    text: Format,
    hours: Format,
    count: Format,
    bold_label: Format,
    fill_yellow: Format,
    fill_light_red: Format,
}

impl ReportFormats {
    fn new(brand: u32, accent: u32) -> Self {
        ReportFormats {
            banner: Format::new()
                .set_bold()
                .set_font_size(16)
                .set_font_color(0xFFFFFF)
                .set_background_color(brand)
                .set_align(FormatAlign::VerticalCenter),
            subtitle: Format::new().set_font_size(11).set_font_color(0x333333),
            table_header: Format::new()
                .set_bold()
                .set_font_color(0xFFFFFF)
                .set_background_color(accent)
                .set_align(FormatAlign::Center)
                .set_border(FormatBorder::Thin),
            text: Format::new().set_border(FormatBorder::Thin),
            hours: Format::new()
                .set_num_format("0.00")
                .set_border(FormatBorder::Thin),
            count: Format::new()
                .set_num_format("0")
                .set_border(FormatBorder::Thin),
            bold_label: Format::new().set_bold(),
            // Differential fills for conditional rules
            fill_yellow: Format::new().set_background_color(0xFFF3CD),
            fill_light_red: Format::new().set_background_color(0xF8D7DA),
        }
    }
}

// ============================================================================
// COLUMN WIDTHS
// ============================================================================

/// Tracks the widest cell text per column; applied once per sheet.
struct ColumnWidths {
    widths: Vec<usize>,
}

impl ColumnWidths {
    fn new() -> Self {
        ColumnWidths { widths: Vec::new() }
    }

    fn observe(&mut self, col: usize, text: &str) {
        if self.widths.len() <= col {
            self.widths.resize(col + 1, 0);
        }
        let len = text.chars().count();
        if len > self.widths[col] {
            self.widths[col] = len;
        }
    }

    fn apply(&self, sheet: &mut Worksheet) -> Result<(), XlsxError> {
        for (col, width) in self.widths.iter().enumerate() {
            let w = (*width + 2).min(60) as f64;
            sheet.set_column_width(col as u16, w)?;
        }
        Ok(())
    }
}

// ============================================================================
// REPORT RENDERER
// ============================================================================

pub struct ReportRenderer {
    formats: ReportFormats,
}

impl ReportRenderer {
    pub fn new(config: &EngineConfig) -> Self {
        ReportRenderer {
            formats: ReportFormats::new(config.brand_rgb(), config.accent_rgb()),
        }
    }

    /// Aggregation summary artifact: main grouped table, per-employee and
    /// top-project views, run key figures.
    pub fn render_summary(
        &self,
        path: &Path,
        meta: &ReportMeta,
        main: &[AggregateBucket],
        by_person: &[AggregateBucket],
        top_projects: &[AggregateBucket],
        figures: &SummaryFigures,
    ) -> Result<(), XlsxError> {
        let mut workbook = Workbook::new();

        // Összesítés - the aggregated main table
        {
            let sheet = workbook.add_worksheet();
            sheet.set_name("Összesítés")?;
            let mut widths = ColumnWidths::new();
            self.write_banner(sheet, meta)?;

            let headers = ["Ügyfélkód", "Projekt neve", "Munka leírása", "Óra", "Forrás fájl(ok)"];
            let rows: Vec<Vec<Cell>> = main
                .iter()
                .map(|b| {
                    vec![
                        Cell::Text(b.key[0].clone()),
                        Cell::Text(b.key[1].clone()),
                        Cell::Text(b.key[2].clone()),
                        Cell::Hours(b.hours),
                        Cell::Text(b.sources_joined()),
                    ]
                })
                .collect();
            let last_row = self.write_table(sheet, 3, &headers, &rows, &mut widths)?;
            self.add_hour_highlights(sheet, 3, 4, last_row)?;
            widths.apply(sheet)?;
        }

        // Nézetek - per-employee and top-project views
        {
            let sheet = workbook.add_worksheet();
            sheet.set_name("Nézetek")?;
            let mut widths = ColumnWidths::new();
            self.write_banner(sheet, meta)?;

            sheet.write_with_format(3, 0, "Összesítés dolgozónként", &self.formats.bold_label)?;
            let person_rows: Vec<Vec<Cell>> = by_person
                .iter()
                .map(|b| vec![Cell::Text(b.key[0].clone()), Cell::Hours(b.hours)])
                .collect();
            let last = self.write_table(sheet, 4, &["Dolgozó", "Óra"], &person_rows, &mut widths)?;
            self.add_hour_highlights(sheet, 4, 1, last)?;

            let start = last + 2;
            sheet.write_with_format(start, 0, "Top projektek (óra szerint)", &self.formats.bold_label)?;
            let project_rows: Vec<Vec<Cell>> = top_projects
                .iter()
                .map(|b| {
                    vec![
                        Cell::Text(b.key[0].clone()),
                        Cell::Text(b.key[1].clone()),
                        Cell::Hours(b.hours),
                    ]
                })
                .collect();
            let last = self.write_table(
                sheet,
                start + 1,
                &["Ügyfélkód", "Projekt neve", "Óra"],
                &project_rows,
                &mut widths,
            )?;
            self.add_hour_highlights(sheet, start + 1, 2, last)?;
            widths.apply(sheet)?;
        }

        // Összegzés - key figures
        {
            let sheet = workbook.add_worksheet();
            sheet.set_name("Összegzés")?;
            let mut widths = ColumnWidths::new();
            self.write_banner(sheet, meta)?;

            let rows = [
                ("Feldolgozott fájlok", Cell::Count(figures.processed_files)),
                ("Kihagyott fájlok", Cell::Count(figures.skipped_files)),
                ("Feldolgozott sheetek", Cell::Count(figures.processed_sheets)),
                ("Kihagyott sheetek", Cell::Count(figures.skipped_sheets)),
            ];
            let mut row = 3u32;
            for (label, value) in rows {
                self.write_figure(sheet, row, label, &value, &mut widths)?;
                row += 1;
            }
            row += 1;
            self.write_figure(
                sheet,
                row,
                "Összes idő (óra)",
                &Cell::Hours(figures.total_hours),
                &mut widths,
            )?;
            widths.apply(sheet)?;
        }

        workbook.save(path)
    }

    /// Validation artifact: the issue table with conditional highlighting,
    /// plus the issue-breakdown summary sheet.
    pub fn render_validation(
        &self,
        path: &Path,
        meta: &ReportMeta,
        issues: &[ValidationIssue],
    ) -> Result<(), XlsxError> {
        let mut workbook = Workbook::new();

        // Hibák - one row per rejected entry
        {
            let sheet = workbook.add_worksheet();
            sheet.set_name("Hibák")?;
            let mut widths = ColumnWidths::new();
            self.write_banner(sheet, meta)?;

            let headers = ["Fájl", "Hónap", "Sor", "Ügyfélkód", "Projekt neve", "Hiba"];
            let rows: Vec<Vec<Cell>> = issues
                .iter()
                .map(|i| {
                    vec![
                        Cell::Text(i.source_file.clone()),
                        Cell::Text(i.sheet.clone()),
                        Cell::Count(i.row_number as usize),
                        Cell::Text(i.client_raw.clone()),
                        Cell::Text(i.project_raw.clone()),
                        Cell::Text(i.reason.label().to_string()),
                    ]
                })
                .collect();
            let last_row = self.write_table(sheet, 3, &headers, &rows, &mut widths)?;
            self.add_issue_highlights(sheet, 3, 5, last_row)?;
            widths.apply(sheet)?;
        }

        // Összegzés - issue counts by reason, by file, repeated pairs
        {
            let sheet = workbook.add_worksheet();
            sheet.set_name("Összegzés")?;
            let mut widths = ColumnWidths::new();
            self.write_banner(sheet, meta)?;

            self.write_figure(
                sheet,
                3,
                "Összes hibás sor",
                &Cell::Count(issues.len()),
                &mut widths,
            )?;

            let mut row = 5u32;
            if !issues.is_empty() {
                sheet.write_with_format(row, 0, "Hibatípusok", &self.formats.bold_label)?;
                let reason_rows: Vec<Vec<Cell>> = issues_by_reason(issues)
                    .into_iter()
                    .map(|(label, n)| vec![Cell::Text(label), Cell::Count(n)])
                    .collect();
                row = self.write_table(sheet, row + 1, &["Hiba", "Darab"], &reason_rows, &mut widths)?;

                row += 2;
                sheet.write_with_format(row, 0, "Hibák fájlonként", &self.formats.bold_label)?;
                let file_rows: Vec<Vec<Cell>> = issues_by_file(issues)
                    .into_iter()
                    .map(|(file, n)| vec![Cell::Text(file), Cell::Count(n)])
                    .collect();
                row = self.write_table(sheet, row + 1, &["Fájl", "Darab"], &file_rows, &mut widths)?;

                row += 2;
                sheet.write_with_format(row, 0, "Ismétlődő hibás párok", &self.formats.bold_label)?;
                let pair_rows: Vec<Vec<Cell>> = repeated_pairs(issues)
                    .into_iter()
                    .map(|(client, project, n)| {
                        vec![Cell::Text(client), Cell::Text(project), Cell::Count(n)]
                    })
                    .collect();
                self.write_table(
                    sheet,
                    row + 1,
                    &["Ügyfélkód", "Projekt neve", "Darab"],
                    &pair_rows,
                    &mut widths,
                )?;
            }
            widths.apply(sheet)?;
        }

        workbook.save(path)
    }

    // ------------------------------------------------------------------
    // building blocks
    // ------------------------------------------------------------------

    /// Brand-color title band over A1:F1 with a subtitle row under it.
    fn write_banner(&self, sheet: &mut Worksheet, meta: &ReportMeta) -> Result<(), XlsxError> {
        sheet.merge_range(0, 0, 0, 5, &meta.title, &self.formats.banner)?;
        sheet.merge_range(1, 0, 1, 5, &meta.subtitle, &self.formats.subtitle)?;
        Ok(())
    }

    /// Styled header + bordered data rows. Returns the last written row.
    fn write_table(
        &self,
        sheet: &mut Worksheet,
        start_row: u32,
        headers: &[&str],
        rows: &[Vec<Cell>],
        widths: &mut ColumnWidths,
    ) -> Result<u32, XlsxError> {
        for (col, header) in headers.iter().enumerate() {
            sheet.write_with_format(start_row, col as u16, *header, &self.formats.table_header)?;
            widths.observe(col, header);
        }

        let mut row = start_row;
        for cells in rows {
            row += 1;
            for (col, cell) in cells.iter().enumerate() {
                self.write_cell(sheet, row, col, cell, widths)?;
            }
        }
        Ok(row)
    }

    fn write_cell(
        &self,
        sheet: &mut Worksheet,
        row: u32,
        col: usize,
        cell: &Cell,
        widths: &mut ColumnWidths,
    ) -> Result<(), XlsxError> {
        match cell {
            Cell::Text(text) => {
                sheet.write_with_format(row, col as u16, text.as_str(), &self.formats.text)?;
                widths.observe(col, text);
            }
            Cell::Hours(hours) => {
                let value = hours.to_f64().unwrap_or(0.0);
                sheet.write_with_format(row, col as u16, value, &self.formats.hours)?;
                widths.observe(col, &format!("{hours:.2}"));
            }
            Cell::Count(n) => {
                sheet.write_with_format(row, col as u16, *n as f64, &self.formats.count)?;
                widths.observe(col, &n.to_string());
            }
        }
        Ok(())
    }

    fn write_figure(
        &self,
        sheet: &mut Worksheet,
        row: u32,
        label: &str,
        value: &Cell,
        widths: &mut ColumnWidths,
    ) -> Result<(), XlsxError> {
        sheet.write_with_format(row, 0, label, &self.formats.bold_label)?;
        widths.observe(0, label);
        match value {
            Cell::Text(text) => sheet.write(row, 1, text.as_str())?,
            Cell::Hours(hours) => sheet.write(row, 1, hours.to_f64().unwrap_or(0.0))?,
            Cell::Count(n) => sheet.write(row, 1, *n as f64)?,
        };
        Ok(())
    }

    /// Hour-column emphasis: 0 hours yellow, above 160 light red.
    fn add_hour_highlights(
        &self,
        sheet: &mut Worksheet,
        header_row: u32,
        col: u16,
        last_row: u32,
    ) -> Result<(), XlsxError> {
        if last_row <= header_row {
            return Ok(());
        }
        let zero = ConditionalFormatCell::new()
            .set_rule(ConditionalFormatCellRule::EqualTo(0.0))
            .set_format(&self.formats.fill_yellow);
        sheet.add_conditional_format(header_row + 1, col, last_row, col, &zero)?;

        let high = ConditionalFormatCell::new()
            .set_rule(ConditionalFormatCellRule::GreaterThan(160.0))
            .set_format(&self.formats.fill_light_red);
        sheet.add_conditional_format(header_row + 1, col, last_row, col, &high)?;
        Ok(())
    }

    /// Reason-column emphasis keyed on reason substrings: disallowed pairs
    /// red, unknown codes yellow.
    fn add_issue_highlights(
        &self,
        sheet: &mut Worksheet,
        header_row: u32,
        col: u16,
        last_row: u32,
    ) -> Result<(), XlsxError> {
        if last_row <= header_row {
            return Ok(());
        }
        let invalid = ConditionalFormatText::new()
            .set_rule(ConditionalFormatTextRule::Contains("Érvénytelen".to_string()))
            .set_format(&self.formats.fill_light_red);
        sheet.add_conditional_format(header_row + 1, col, last_row, col, &invalid)?;

        let unknown = ConditionalFormatText::new()
            .set_rule(ConditionalFormatTextRule::Contains("Ismeretlen".to_string()))
            .set_format(&self.formats.fill_yellow);
        sheet.add_conditional_format(header_row + 1, col, last_row, col, &unknown)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::IssueReason;
    use calamine::{open_workbook_auto, Data, Reader};
    use rust_decimal_macros::dec;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn bucket(key: Vec<&str>, hours: Decimal, sources: &[&str]) -> AggregateBucket {
        AggregateBucket {
            key: key.into_iter().map(|s| s.to_string()).collect(),
            hours,
            sources: sources.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
        }
    }

    fn meta() -> ReportMeta {
        ReportMeta {
            title: "Timesheet összesítés — januar".to_string(),
            subtitle: "Generálva: 2025-02-01 08:00".to_string(),
        }
    }

    fn sheet_cells(path: &Path, sheet: &str) -> Vec<Vec<Data>> {
        let mut wb = open_workbook_auto(path).unwrap();
        let range = wb.worksheet_range(sheet).unwrap();
        range.rows().map(|r| r.to_vec()).collect()
    }

    #[test]
    fn test_summary_artifact_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("summary.xlsx");
        let renderer = ReportRenderer::new(&EngineConfig::default());

        let main = vec![bucket(
            vec!["AUC", "P1", "könyvelés"],
            dec!(5.5),
            &["Anna TS.xlsx", "Béla TS.xlsx"],
        )];
        let by_person = vec![bucket(vec!["Anna TS"], dec!(5.5), &["Anna TS.xlsx"])];
        let figures = SummaryFigures {
            processed_files: 2,
            skipped_files: 1,
            processed_sheets: 2,
            skipped_sheets: 3,
            total_hours: dec!(5.5),
        };

        renderer
            .render_summary(&path, &meta(), &main, &by_person, &main, &figures)
            .unwrap();

        let rows = sheet_cells(&path, "Összesítés");
        // Banner, subtitle, blank, header, one data row
        assert_eq!(rows[3][0], Data::String("Ügyfélkód".to_string()));
        assert_eq!(rows[4][0], Data::String("AUC".to_string()));
        assert_eq!(rows[4][3], Data::Float(5.5));
        assert_eq!(
            rows[4][4],
            Data::String("Anna TS.xlsx, Béla TS.xlsx".to_string())
        );

        let views = sheet_cells(&path, "Nézetek");
        assert_eq!(views[4][0], Data::String("Dolgozó".to_string()));
        assert_eq!(views[5][0], Data::String("Anna TS".to_string()));
    }

    #[test]
    fn test_validation_artifact_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("issues.xlsx");
        let renderer = ReportRenderer::new(&EngineConfig::default());

        let issues = vec![ValidationIssue {
            source_file: "Anna TS.xlsx".to_string(),
            sheet: "Január".to_string(),
            row_number: 4,
            client_raw: "AAA".to_string(),
            project_raw: "P2".to_string(),
            reason: IssueReason::DisallowedPair,
        }];
        renderer.render_validation(&path, &meta(), &issues).unwrap();

        let rows = sheet_cells(&path, "Hibák");
        assert_eq!(rows[3][5], Data::String("Hiba".to_string()));
        assert_eq!(rows[4][0], Data::String("Anna TS.xlsx".to_string()));
        assert_eq!(rows[4][2], Data::Float(4.0));
        assert!(matches!(&rows[4][5], Data::String(s) if s.contains("Érvénytelen")));

        let summary = sheet_cells(&path, "Összegzés");
        assert_eq!(summary[3][0], Data::String("Összes hibás sor".to_string()));
        assert_eq!(summary[3][1], Data::Float(1.0));
    }

    #[test]
    fn test_rendering_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let renderer = ReportRenderer::new(&EngineConfig::default());
        let main = vec![bucket(vec!["AUC", "P1", "x"], dec!(1.0), &["a.xlsx"])];
        let figures = SummaryFigures::default();

        let p1 = dir.path().join("one.xlsx");
        let p2 = dir.path().join("two.xlsx");
        renderer
            .render_summary(&p1, &meta(), &main, &[], &[], &figures)
            .unwrap();
        renderer
            .render_summary(&p2, &meta(), &main, &[], &[], &figures)
            .unwrap();

        for sheet in ["Összesítés", "Nézetek", "Összegzés"] {
            assert_eq!(sheet_cells(&p1, sheet), sheet_cells(&p2, sheet));
        }
    }

    #[test]
    fn test_empty_results_still_render_headed_tables() {
        let dir = TempDir::new().unwrap();
        let renderer = ReportRenderer::new(&EngineConfig::default());
        let path = dir.path().join("empty.xlsx");
        renderer
            .render_validation(&path, &meta(), &[])
            .unwrap();

        let rows = sheet_cells(&path, "Hibák");
        assert_eq!(rows[3][0], Data::String("Fájl".to_string()));
        assert_eq!(rows.len(), 4); // banner, subtitle, spacer, header only
    }
}
