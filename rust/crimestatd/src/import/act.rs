use super::dates::parse_header_date;
use super::{ImportError, Lookups, ParseReport, StateImporter};
use crate::model::CrimeRecord;
use crate::spreadsheet::{self, Row, Table, Workbook};
use chrono::{Datelike, NaiveDate};
use std::path::Path;

pub const ACT: &str = "ACT";

/// Rows before this index are header rows: area name, a caption, then the month dates.
const DATE_ROW: usize = 2;
const FIRST_OFFENCE_ROW: usize = 3;

/// Australian Capital Territory export: one worksheet table per area, offences down
/// the side and one column per month.
pub struct ActXmlImporter;

impl StateImporter for ActXmlImporter {
    fn state(&self) -> &'static str {
        ACT
    }

    fn parse(
        &self,
        path: &Path,
        lookups: &Lookups,
        crimes: &mut Vec<CrimeRecord>,
    ) -> Result<ParseReport, ImportError> {
        log::info!("Parsing {ACT} data...");
        let book = spreadsheet::read_workbook(path)?;
        parse_workbook(&book, lookups, crimes)
    }
}

pub fn parse_workbook(
    book: &Workbook,
    lookups: &Lookups,
    crimes: &mut Vec<CrimeRecord>,
) -> Result<ParseReport, ImportError> {
    let mut report = ParseReport::default();
    for (n, (ws, table)) in book.tables().enumerate() {
        let sheet = if ws.name.trim().is_empty() {
            format!("table {}", n + 1)
        } else {
            ws.name.trim().to_string()
        };
        report.tables += 1;
        let before = crimes.len();
        parse_table(&sheet, table, lookups, crimes, &mut report)?;
        log::debug!("{}: {} records", sheet, crimes.len() - before);
    }
    report.records = crimes.len();
    Ok(report)
}

fn parse_table(
    sheet: &str,
    table: &Table,
    lookups: &Lookups,
    crimes: &mut Vec<CrimeRecord>,
    report: &mut ParseReport,
) -> Result<(), ImportError> {
    let Some(area_name) = table.rows.first().and_then(Row::first_text) else {
        report.skip_table(sheet, "no local government area name in the first row");
        return Ok(());
    };
    let Some(area) = lookups.area_by_name(area_name) else {
        log::warn!("{sheet}: unknown local government area '{area_name}', table skipped");
        report.skip_table(
            sheet,
            &format!("unknown local government area '{area_name}'"),
        );
        return Ok(());
    };
    let Some(date_row) = table.rows.get(DATE_ROW) else {
        report.skip_table(sheet, "no date header row");
        return Ok(());
    };
    let dates = header_dates(sheet, date_row)?;
    // Exports either leave the label column of the date row blank, so a date sits
    // over its counts, or start the dates in the first column, one to the left.
    let shift = usize::from(date_row.cells.first().is_some_and(|c| !c.is_blank()));

    for (ri, row) in table.rows.iter().enumerate().skip(FIRST_OFFENCE_ROW) {
        let name = row.cell_text(0).unwrap_or("");
        if name.is_empty() {
            continue;
        }
        let Some(offence) = lookups.offence_by_name(name) else {
            log::warn!("{sheet} row {}: unknown offence '{name}', row skipped", ri + 1);
            report.skipped_rows += 1;
            report.unknown_offences.insert(name.to_uppercase());
            continue;
        };

        for (ci, cell) in row.cells.iter().enumerate().skip(1) {
            if cell.is_blank() {
                report.blank_cells += 1;
                continue;
            }
            let Some(date) = dates.get(ci - shift).copied().flatten() else {
                return Err(ImportError::ColumnWithoutDate {
                    sheet: sheet.to_string(),
                    row: ri + 1,
                    column: ci + 1,
                });
            };
            let count = parse_count(&cell.text).ok_or_else(|| ImportError::BadCount {
                sheet: sheet.to_string(),
                row: ri + 1,
                column: ci + 1,
                text: cell.text.trim().to_string(),
            })?;
            crimes.push(CrimeRecord {
                local_government_area_id: area.id,
                offence_id: offence.id,
                month: date.month(),
                year: date.year(),
                count,
            });
        }
    }
    Ok(())
}

/// Dates keyed by their cell position; blank header cells stay `None`.
fn header_dates(sheet: &str, row: &Row) -> Result<Vec<Option<NaiveDate>>, ImportError> {
    row.cells
        .iter()
        .enumerate()
        .map(|(ci, c)| {
            if c.is_blank() {
                return Ok(None);
            }
            parse_header_date(&c.text)
                .map(Some)
                .ok_or_else(|| ImportError::BadDate {
                    sheet: sheet.to_string(),
                    row: DATE_ROW + 1,
                    column: ci + 1,
                    text: c.text.trim().to_string(),
                })
        })
        .collect()
}

fn parse_count(text: &str) -> Option<i64> {
    let t = strip_thousands(text.trim())?;
    if let Ok(n) = t.parse::<i64>() {
        return (n >= 0).then_some(n);
    }
    let f = t.parse::<f64>().ok()?;
    if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

/// Removes `,` separators from the integer part, but only when every group after
/// the first has exactly three digits.
fn strip_thousands(text: &str) -> Option<String> {
    if !text.contains(',') {
        return Some(text.to_string());
    }
    let (int_part, frac) = match text.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (text, None),
    };
    let mut groups = int_part.split(',');
    let first = groups.next()?;
    let digits = first.strip_prefix('-').unwrap_or(first);
    if digits.is_empty() || digits.len() > 3 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let mut out = first.to_string();
    for g in groups {
        if g.len() != 3 || !g.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        out.push_str(g);
    }
    if let Some(f) = frac {
        out.push('.');
        out.push_str(f);
    }
    Some(out)
}
