use csv::{QuoteStyle, Terminator, WriterBuilder};

use super::{ReportRow, HEADER};
use crate::error::{Error, Result};

/// Render rows as Excel-dialect CSV (comma, minimal quoting, CRLF).
pub fn render_csv(rows: &[ReportRow]) -> Result<String> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::CRLF)
        .from_writer(Vec::new());

    writer.write_record(HEADER)?;
    for row in rows {
        writer.write_record(row.cells())?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| Error::Io(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}
