use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Error, Result};
use crate::identifier::IdentifierMode;
use crate::report::FileFormat;

use super::OutputMode;

/// Config files read when present, lowest precedence first.
pub const DEFAULT_CONFIG_PATHS: [&str; 2] = ["/etc/sendemeldung.toml", "sendemeldung.toml"];

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct FileConfig {
    pub acr: Option<AcrConfig>,
    pub station: Option<StationConfig>,
    pub l10n: Option<L10nConfig>,
    pub date: Option<DateConfig>,
    pub file: Option<FileOutputConfig>,
    pub output: Option<OutputMode>,
    pub identifier: Option<IdentifierConfig>,
    pub email: Option<EmailConfig>,
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct AcrConfig {
    pub bearer_token: Option<String>,
    pub project_id: Option<i64>,
    pub stream_id: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct StationConfig {
    pub name: Option<String>,
    pub name_short: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct L10nConfig {
    /// IANA timezone name, e.g. "Europe/Zurich"
    pub timezone: Option<String>,
    pub locale: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct DateConfig {
    pub start: Option<String>,
    pub end: Option<String>,
    pub last_month: Option<bool>,
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct FileOutputConfig {
    pub path: Option<PathBuf>,
    pub format: Option<FileFormat>,
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct IdentifierConfig {
    pub mode: Option<IdentifierMode>,
    pub authority: Option<String>,
    pub show: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct EmailConfig {
    pub server: Option<String>,
    pub port: Option<u16>,
    pub sender: Option<String>,
    pub to: Option<String>,
    pub cc: Option<String>,
    pub bcc: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub subject: Option<String>,
    pub text: Option<String>,
    pub footer: Option<String>,
    pub responsible_email: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, path)
    }

    fn parse(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|source| Error::ConfigFile {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load and merge every existing file in `paths`; later files win per key.
    /// Missing files are skipped, unreadable or invalid ones are errors.
    pub fn load_layered<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut merged = toml::Table::new();
        for path in paths {
            let path = path.as_ref();
            if !path.exists() {
                continue;
            }
            debug!("Loading config file {:?}", path);
            let content = std::fs::read_to_string(path)?;
            let table: toml::Table = toml::from_str(&content).map_err(|source| Error::ConfigFile {
                path: path.to_path_buf(),
                source,
            })?;
            merge_tables(&mut merged, table);
        }
        Self::deserialize(toml::Value::Table(merged)).map_err(|source| Error::ConfigFile {
            path: paths
                .last()
                .map(|p| p.as_ref().to_path_buf())
                .unwrap_or_default(),
            source,
        })
    }
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(table)) => {
                merge_tables(existing, table);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
