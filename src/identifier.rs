//! Local identifiers tying each report line back to its detection.

use chrono::{DateTime, SecondsFormat, Utc};
use clap::ValueEnum;
use serde::Deserialize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierMode {
    /// `crid://` URI with a clock media fragment.
    #[default]
    Crid,
    /// Plain ISO timestamp followed by the acrid.
    Local,
}

/// Identifier settings; authority and show only apply to CRIDs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentifierSettings {
    pub mode: IdentifierMode,
    pub authority: String,
    pub show: String,
}

impl Default for IdentifierSettings {
    fn default() -> Self {
        Self {
            mode: IdentifierMode::Crid,
            authority: "rabe.ch".to_string(),
            show: "klangbecken".to_string(),
        }
    }
}

/// Build the identifier for a detection at `timestamp` of `acrid`.
pub fn local_identifier(settings: &IdentifierSettings, timestamp: DateTime<Utc>, acrid: &str) -> String {
    match settings.mode {
        IdentifierMode::Crid => format!(
            "crid://{}/v1/{}#t=clock={}.00Z&acrid={}",
            settings.authority,
            settings.show,
            timestamp.format("%Y%m%dT%H%M%S"),
            acrid
        ),
        IdentifierMode::Local => format!(
            "{}#acrid={}",
            timestamp.to_rfc3339_opts(SecondsFormat::Secs, false),
            acrid
        ),
    }
}
