use chrono::{Datelike, NaiveDate};
use rust_xlsxwriter::{Color, ExcelDateTime, Format, FormatBorder, Workbook};

use super::{ReportRow, HEADER};
use crate::error::Result;

/// Columns SUISA marks as required (grey).
const REQUIRED_COLUMNS: usize = 11;
/// Subsidiary columns (green), from "EAN / GTIN" to "Bestellnummer".
const SUBSIDIARY_COLUMNS: std::ops::Range<usize> = 11..19;
/// Columns holding dates: Sendedatum, Aufnahmedatum, Erstveröffentlichungsdatum.
const DATE_COLUMNS: [(usize, &str); 3] = [(4, "%Y-%m-%d"), (13, "%Y%m%d"), (15, "%Y%m%d")];
const WIDTH_PADDING: usize = 3;
const DATE_FORMAT: &str = "dd.mm.yyyy";

/// Render rows as a styled spreadsheet.
pub fn render_xlsx(rows: &[ReportRow]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    let header = Format::new()
        .set_font_name("Calibri")
        .set_font_size(12)
        .set_bold()
        .set_border(FormatBorder::Thick)
        .set_border_color(Color::Black);
    let required = header.clone().set_background_color(Color::RGB(0xBFBFBF));
    let subsidiary = header.clone().set_background_color(Color::RGB(0xEBF1DE));
    let date_format = Format::new().set_num_format(DATE_FORMAT);

    for (col, label) in HEADER.iter().enumerate() {
        let format = if col < REQUIRED_COLUMNS {
            &required
        } else if SUBSIDIARY_COLUMNS.contains(&col) {
            &subsidiary
        } else {
            &header
        };
        worksheet.write_string_with_format(0, col as u16, *label, format)?;
    }

    for (i, row) in rows.iter().enumerate() {
        let row_num = i as u32 + 1;
        for (col, value) in row.cells().iter().enumerate() {
            let date_pattern = DATE_COLUMNS
                .iter()
                .find(|(c, _)| *c == col)
                .map(|(_, pattern)| *pattern);
            match date_pattern {
                Some(pattern) => {
                    if let Some(date) = excel_date(value, pattern)? {
                        worksheet.write_datetime_with_format(row_num, col as u16, &date, &date_format)?;
                    }
                }
                None => {
                    if !value.is_empty() {
                        worksheet.write_string(row_num, col as u16, *value)?;
                    }
                }
            }
        }
    }

    for (col, width) in column_widths(rows).into_iter().enumerate() {
        worksheet.set_column_width(col as u16, (width + WIDTH_PADDING) as f64)?;
    }

    Ok(workbook.save_to_buffer()?)
}

/// Parse a report date cell; blank or unparseable cells stay blank.
fn excel_date(value: &str, pattern: &str) -> Result<Option<ExcelDateTime>> {
    let Ok(date) = NaiveDate::parse_from_str(value, pattern) else {
        return Ok(None);
    };
    let date = ExcelDateTime::from_ymd(date.year() as u16, date.month() as u8, date.day() as u8)?;
    Ok(Some(date))
}

/// Longest value per column in characters, header included.
fn column_widths(rows: &[ReportRow]) -> Vec<usize> {
    let mut widths: Vec<usize> = HEADER.iter().map(|label| label.chars().count()).collect();
    for row in rows {
        for (col, value) in row.cells().iter().enumerate() {
            widths[col] = widths[col].max(value.chars().count());
        }
    }
    widths
}
