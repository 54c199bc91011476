//! Error type shared by the library modules.

use chrono::NaiveDate;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Every configuration violation found, reported together.
    #[error("invalid configuration:\n  - {}", .0.join("\n  - "))]
    Config(Vec<String>),

    #[error("failed to parse config file {path:?}: {source}")]
    ConfigFile {
        path: std::path::PathBuf,
        source: toml::de::Error,
    },

    #[error("upstream returned {status} for {day}")]
    Upstream {
        status: reqwest::StatusCode,
        day: NaiveDate,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid upstream payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed record at {timestamp}: no music or custom_files entries")]
    MalformedRecord { timestamp: String },

    #[error("template error: {0}")]
    Template(String),

    #[error("spreadsheet error: {0}")]
    Render(#[from] rust_xlsxwriter::XlsxError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("email error: {0}")]
    Email(String),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<lettre::error::Error> for Error {
    fn from(err: lettre::error::Error) -> Self {
        Error::Email(err.to_string())
    }
}

impl From<lettre::address::AddressError> for Error {
    fn from(err: lettre::address::AddressError) -> Self {
        Error::Email(err.to_string())
    }
}
