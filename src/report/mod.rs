//! SUISA report rows and their renderings.
//!
//! The column order and German header labels are fixed by SUISA's
//! "Sendemeldung" template.

mod delimited;
mod spreadsheet;

pub use delimited::render_csv;
pub use spreadsheet::render_xlsx;

use clap::ValueEnum;
use serde::Deserialize;
use std::fmt;

use crate::error::Result;
use crate::identifier::{local_identifier, IdentifierSettings};
use crate::models::PlayEvent;
use crate::normalize;
use crate::progress::{create_progress_bar, log_progress};

pub const HEADER: [&str; 21] = [
    "Sender",
    "Titel des Musikwerks",
    "Name des Komponisten",
    "Interpret(en)",
    "Sendedatum",
    "Sendedauer",
    "Sendezeit",
    "ISRC",
    "Label",
    "Identifikationsnummer",
    "Eigenaufnahmen",
    "EAN / GTIN",
    "Albumtitel / Titel des Tonträgers",
    "Aufnahmedatum",
    "Aufnahmeland",
    "Erstveröffentlichungsdatum",
    "Katalog-Nummer / CD ID",
    "Werkverzeichnisangaben",
    "Bestellnummer",
    "Veröffentlichungsland",
    "Liveaufnahme",
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    #[default]
    Csv,
    Xlsx,
}

impl FileFormat {
    pub fn extension(self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Xlsx => "xlsx",
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// A rendered report, ready to be written, printed or attached.
#[derive(Clone, Debug, PartialEq)]
pub enum Rendered {
    Text(String),
    Binary(Vec<u8>),
}

impl Rendered {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Rendered::Text(text) => text.as_bytes(),
            Rendered::Binary(bytes) => bytes,
        }
    }
}

/// Station-level values shared by every row.
#[derive(Clone, Debug, Default)]
pub struct ReportContext {
    pub station_name: String,
    pub identifier: IdentifierSettings,
}

/// One report line.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReportRow {
    pub station: String,
    pub title: String,
    pub composer: String,
    pub artist: String,
    pub date: String,
    pub duration: String,
    pub time: String,
    pub isrc: String,
    pub label: String,
    pub local_id: String,
    pub upc: String,
    pub album: String,
    pub release_date: String,
    pub cd_id: String,
}

impl ReportRow {
    pub fn from_event(event: &PlayEvent, ctx: &ReportContext) -> Result<Self> {
        let track = event.primary_track()?;
        let timestamp = event.report_time();
        let artist = normalize::artist(track);
        let composer = normalize::composer(track, &artist);
        let acrid = track.acrid.as_deref().unwrap_or("");

        Ok(Self {
            station: ctx.station_name.clone(),
            title: track.title.clone().unwrap_or_default(),
            composer,
            artist,
            date: timestamp.format("%Y-%m-%d").to_string(),
            duration: normalize::format_duration(event.played_duration),
            time: timestamp.format("%H:%M:%S").to_string(),
            isrc: normalize::isrc(track),
            label: track.label.clone().unwrap_or_default(),
            local_id: local_identifier(&ctx.identifier, event.timestamp_utc(), acrid),
            upc: track
                .external_ids
                .as_ref()
                .and_then(|ids| ids.upc.clone())
                .unwrap_or_default(),
            album: track
                .album
                .as_ref()
                .map(|a| a.title().to_string())
                .unwrap_or_default(),
            release_date: normalize::release_date(track.release_date.as_deref().unwrap_or("")),
            cd_id: track
                .album
                .as_ref()
                .map(|a| a.cd_id().to_string())
                .unwrap_or_default(),
        })
    }

    /// Cells in [`HEADER`] order.
    pub fn cells(&self) -> [&str; 21] {
        [
            &self.station,
            &self.title,
            &self.composer,
            &self.artist,
            &self.date,
            &self.duration,
            &self.time,
            &self.isrc,
            &self.label,
            &self.local_id,
            "nein", // Eigenaufnahmen
            &self.upc,
            &self.album,
            "", // Aufnahmedatum
            "", // Aufnahmeland
            &self.release_date,
            &self.cd_id,
            "", // Werkverzeichnisangaben
            "", // Bestellnummer
            "", // Veröffentlichungsland
            "", // Liveaufnahme
        ]
    }
}

/// Build report rows for all events.
pub fn build_rows(events: &[PlayEvent], ctx: &ReportContext) -> Result<Vec<ReportRow>> {
    let total = events.len() as u64;
    let pb = create_progress_bar(total, "Preparing tracks for report");
    let mut rows = Vec::with_capacity(events.len());
    for (i, event) in events.iter().enumerate() {
        rows.push(ReportRow::from_event(event, ctx)?);
        pb.inc(1);
        log_progress("report", i as u64 + 1, total, 1000);
    }
    pb.finish_with_message(format!("Prepared {} report lines", rows.len()));
    Ok(rows)
}

/// Render rows in the requested format.
pub fn render(rows: &[ReportRow], format: FileFormat) -> Result<Rendered> {
    match format {
        FileFormat::Csv => Ok(Rendered::Text(render_csv(rows)?)),
        FileFormat::Xlsx => Ok(Rendered::Binary(render_xlsx(rows)?)),
    }
}
