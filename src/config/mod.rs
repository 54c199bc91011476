//! Runtime settings.
//!
//! Values are resolved from built-in defaults, TOML files and the command
//! line (which also carries `SENDEMELDUNG_*` environment variables), in
//! increasing order of precedence.

mod file_config;

pub use file_config::{
    AcrConfig, DateConfig, EmailConfig, FileConfig, FileOutputConfig, IdentifierConfig, L10nConfig,
    StationConfig, DEFAULT_CONFIG_PATHS,
};

use chrono::{Datelike, Days, Locale, NaiveDate};
use chrono_tz::Tz;
use clap::ValueEnum;
use serde::Deserialize;
use std::path::PathBuf;

use crate::acr_client::DEFAULT_BASE_URL;
use crate::email::EmailSettings;
use crate::error::{Error, Result};
use crate::identifier::{IdentifierMode, IdentifierSettings};
use crate::interval::ReportInterval;
use crate::report::{FileFormat, ReportContext};

const DATE_FMT: &str = "%Y-%m-%d";
const DEFAULT_SPAN_DAYS: u64 = 30;
const MIN_BEARER_TOKEN_LEN: usize = 32;
const MIN_STREAM_ID_LEN: usize = 9;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    Email,
    #[default]
    File,
    Stdout,
}

/// Command line values; `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub bearer_token: Option<String>,
    pub project_id: Option<i64>,
    pub stream_id: Option<String>,
    pub base_url: Option<String>,
    pub station_name: Option<String>,
    pub station_name_short: Option<String>,
    pub timezone: Option<String>,
    pub locale: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub last_month: bool,
    pub file_path: Option<PathBuf>,
    pub file_format: Option<FileFormat>,
    pub output: Option<OutputMode>,
    pub identifier_mode: Option<IdentifierMode>,
    pub identifier_authority: Option<String>,
    pub identifier_show: Option<String>,
    pub email_server: Option<String>,
    pub email_port: Option<u16>,
    pub email_sender: Option<String>,
    pub email_to: Option<String>,
    pub email_cc: Option<String>,
    pub email_bcc: Option<String>,
    pub email_username: Option<String>,
    pub email_password: Option<String>,
    pub email_subject: Option<String>,
    pub email_text: Option<String>,
    pub email_footer: Option<String>,
    pub email_responsible: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcrSettings {
    pub bearer_token: String,
    pub project_id: i64,
    pub stream_id: String,
    pub base_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationSettings {
    pub name: String,
    pub name_short: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateSettings {
    pub start: Option<String>,
    pub end: Option<String>,
    pub last_month: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub acr: AcrSettings,
    pub station: StationSettings,
    pub timezone: String,
    pub locale: String,
    pub date: DateSettings,
    pub file_path: Option<PathBuf>,
    pub file_format: FileFormat,
    pub output: OutputMode,
    pub identifier: IdentifierSettings,
    pub email: EmailSettings,
}

impl Settings {
    /// Resolve settings; command line values win over file values.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Self {
        let file = file_config.unwrap_or_default();

        let acr = file.acr.unwrap_or_default();
        let acr = AcrSettings {
            bearer_token: cli.bearer_token.clone().or(acr.bearer_token).unwrap_or_default(),
            project_id: cli.project_id.or(acr.project_id).unwrap_or_default(),
            stream_id: cli.stream_id.clone().or(acr.stream_id).unwrap_or_default(),
            base_url: cli
                .base_url
                .clone()
                .or(acr.base_url)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        };

        let station = file.station.unwrap_or_default();
        let station = StationSettings {
            name: cli
                .station_name
                .clone()
                .or(station.name)
                .unwrap_or_else(|| "Radio Bern RaBe".to_string()),
            name_short: cli
                .station_name_short
                .clone()
                .or(station.name_short)
                .unwrap_or_else(|| "rabe".to_string()),
        };

        let l10n = file.l10n.unwrap_or_default();
        let timezone = cli
            .timezone
            .clone()
            .or(l10n.timezone)
            .unwrap_or_else(|| "Europe/Zurich".to_string());
        let locale = cli
            .locale
            .clone()
            .or(l10n.locale)
            .unwrap_or_else(|| "de_CH".to_string());

        let date = file.date.unwrap_or_default();
        let date = DateSettings {
            start: cli.start.clone().or(date.start),
            end: cli.end.clone().or(date.end),
            last_month: cli.last_month || date.last_month.unwrap_or(false),
        };

        let file_output = file.file.unwrap_or_default();
        let file_path = cli.file_path.clone().or(file_output.path);
        let file_format = cli.file_format.or(file_output.format).unwrap_or_default();
        let output = cli.output.or(file.output).unwrap_or_default();

        let ident = file.identifier.unwrap_or_default();
        let defaults = IdentifierSettings::default();
        let identifier = IdentifierSettings {
            mode: cli.identifier_mode.or(ident.mode).unwrap_or(defaults.mode),
            authority: cli
                .identifier_authority
                .clone()
                .or(ident.authority)
                .unwrap_or(defaults.authority),
            show: cli.identifier_show.clone().or(ident.show).unwrap_or(defaults.show),
        };

        let mail = file.email.unwrap_or_default();
        let defaults = EmailSettings::default();
        let email = EmailSettings {
            server: cli.email_server.clone().or(mail.server).unwrap_or(defaults.server),
            port: cli.email_port.or(mail.port).unwrap_or(defaults.port),
            sender: cli.email_sender.clone().or(mail.sender),
            to: cli.email_to.clone().or(mail.to),
            cc: cli.email_cc.clone().or(mail.cc),
            bcc: cli.email_bcc.clone().or(mail.bcc),
            username: cli.email_username.clone().or(mail.username),
            password: cli.email_password.clone().or(mail.password),
            subject: cli.email_subject.clone().or(mail.subject).unwrap_or(defaults.subject),
            text: cli.email_text.clone().or(mail.text).unwrap_or(defaults.text),
            footer: cli.email_footer.clone().or(mail.footer).unwrap_or(defaults.footer),
            responsible_email: cli
                .email_responsible
                .clone()
                .or(mail.responsible_email)
                .unwrap_or(defaults.responsible_email),
        };

        Self {
            acr,
            station,
            timezone,
            locale,
            date,
            file_path,
            file_format,
            output,
            identifier,
            email,
        }
    }

    /// Check every setting, reporting all violations at once.
    pub fn validate(&self) -> Result<()> {
        let mut msgs = Vec::new();

        if self.acr.bearer_token.len() < MIN_BEARER_TOKEN_LEN {
            msgs.push(format!(
                "bearer token must be at least {} characters",
                MIN_BEARER_TOKEN_LEN
            ));
        }
        if self.acr.project_id < 0 {
            msgs.push("project id must not be negative".to_string());
        }
        if self.acr.stream_id.len() < MIN_STREAM_ID_LEN {
            msgs.push(format!(
                "stream id must be at least {} characters",
                MIN_STREAM_ID_LEN
            ));
        }
        if self.output == OutputMode::Stdout && self.file_format == FileFormat::Xlsx {
            msgs.push("xlsx cannot be printed to stdout, please set --file-format to csv".to_string());
        }
        if self.date.last_month && (self.date.start.is_some() || self.date.end.is_some()) {
            msgs.push("argument --last-month not allowed with --date-start or --date-end".to_string());
        }
        if let Err(err) = self.tz() {
            msgs.push(err);
        }
        if let Err(err) = self.parsed_locale() {
            msgs.push(err);
        }

        let start = parse_opt_date("start", self.date.start.as_deref(), &mut msgs);
        let end = parse_opt_date("end", self.date.end.as_deref(), &mut msgs);
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                msgs.push(format!("start date {} is after end date {}", start, end));
            }
        }

        if self.output == OutputMode::Email {
            if self.email.sender.as_deref().unwrap_or("").is_empty() {
                msgs.push("email output requires a sender".to_string());
            }
            if self.email.to.as_deref().unwrap_or("").trim().is_empty() {
                msgs.push("email output requires a recipient".to_string());
            }
        }

        if msgs.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(msgs))
        }
    }

    fn tz(&self) -> std::result::Result<Tz, String> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| format!("unknown timezone {:?}", self.timezone))
    }

    fn parsed_locale(&self) -> std::result::Result<Locale, String> {
        Locale::try_from(self.locale.as_str()).map_err(|_| format!("unknown locale {:?}", self.locale))
    }

    pub fn timezone(&self) -> Result<Tz> {
        self.tz().map_err(|msg| Error::Config(vec![msg]))
    }

    pub fn locale(&self) -> Result<Locale> {
        self.parsed_locale().map_err(|msg| Error::Config(vec![msg]))
    }

    /// The report interval, given the current local date.
    pub fn interval(&self, today: NaiveDate) -> Result<ReportInterval> {
        if self.date.last_month {
            let end = today.with_day(1).unwrap_or(today) - Days::new(1);
            let start = end.with_day(1).unwrap_or(end);
            return Ok(ReportInterval::new(start, end));
        }

        let mut msgs = Vec::new();
        let end = parse_opt_date("end", self.date.end.as_deref(), &mut msgs).unwrap_or(today);
        let start = parse_opt_date("start", self.date.start.as_deref(), &mut msgs)
            .unwrap_or(today - Days::new(DEFAULT_SPAN_DAYS));
        if start > end {
            msgs.push(format!("start date {} is after end date {}", start, end));
        }
        if !msgs.is_empty() {
            return Err(Error::Config(msgs));
        }
        Ok(ReportInterval::new(start, end))
    }

    /// Output filename for a report starting at `start`.
    pub fn filename(&self, start: NaiveDate) -> PathBuf {
        if let Some(path) = &self.file_path {
            return path.clone();
        }
        let ext = self.file_format.extension();
        let name = if self.date.last_month {
            format!("{}_{}.{}", self.station.name_short, start.format("%Y_%m"), ext)
        } else {
            format!("{}_{}.{}", self.station.name_short, start.format(DATE_FMT), ext)
        };
        PathBuf::from(name)
    }

    pub fn report_context(&self) -> ReportContext {
        ReportContext {
            station_name: self.station.name.clone(),
            identifier: self.identifier.clone(),
        }
    }
}

fn parse_opt_date(label: &str, value: Option<&str>, msgs: &mut Vec<String>) -> Option<NaiveDate> {
    let value = value?;
    match NaiveDate::parse_from_str(value, DATE_FMT) {
        Ok(date) => Some(date),
        Err(_) => {
            msgs.push(format!("invalid {} date {:?}, expected YYYY-MM-DD", label, value));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn valid_cli() -> CliConfig {
        CliConfig {
            bearer_token: Some("x".repeat(32)),
            project_id: Some(123),
            stream_id: Some("s-1234567".to_string()),
            ..CliConfig::default()
        }
    }

    fn settings(cli: CliConfig) -> Settings {
        Settings::resolve(&cli, None)
    }

    fn config_errors(settings: &Settings) -> Vec<String> {
        match settings.validate() {
            Err(Error::Config(msgs)) => msgs,
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_defaults() {
        let s = settings(CliConfig::default());
        assert_eq!(s.acr.base_url, DEFAULT_BASE_URL);
        assert_eq!(s.station.name_short, "rabe");
        assert_eq!(s.timezone, "Europe/Zurich");
        assert_eq!(s.locale, "de_CH");
        assert_eq!(s.file_format, FileFormat::Csv);
        assert_eq!(s.output, OutputMode::File);
        assert_eq!(s.identifier.mode, IdentifierMode::Crid);
        assert_eq!(s.email.port, 587);
        assert_eq!(s.email.server, "127.0.0.1");
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(
            br#"
output = "stdout"
[station]
name = "File Radio"
name_short = "file"
[l10n]
timezone = "UTC"
"#,
        )
        .unwrap();
        let file_config = FileConfig::load(file.path()).unwrap();
        let cli = CliConfig {
            station_name_short: Some("cli".to_string()),
            ..valid_cli()
        };
        let s = Settings::resolve(&cli, Some(file_config));
        assert_eq!(s.station.name, "File Radio");
        assert_eq!(s.station.name_short, "cli");
        assert_eq!(s.timezone, "UTC");
        assert_eq!(s.output, OutputMode::Stdout);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_valid_settings() {
        assert!(settings(valid_cli()).validate().is_ok());
    }

    #[test]
    fn test_all_violations_reported() {
        let s = settings(CliConfig {
            bearer_token: Some("short".to_string()),
            project_id: Some(-1),
            stream_id: Some("s-1".to_string()),
            output: Some(OutputMode::Stdout),
            file_format: Some(FileFormat::Xlsx),
            last_month: true,
            start: Some("2024-13-01".to_string()),
            timezone: Some("Mars/Olympus".to_string()),
            locale: Some("xx_YY".to_string()),
            ..CliConfig::default()
        });
        let msgs = config_errors(&s);
        assert_eq!(msgs.len(), 8, "{:?}", msgs);
        assert!(msgs.iter().any(|m| m.contains("xlsx cannot be printed")));
        assert!(msgs.iter().any(|m| m.contains("--last-month")));
        assert!(msgs.iter().any(|m| m.contains("Mars/Olympus")));
    }

    #[test]
    fn test_start_after_end() {
        let s = settings(CliConfig {
            start: Some("2024-02-01".to_string()),
            end: Some("2024-01-01".to_string()),
            ..valid_cli()
        });
        let msgs = config_errors(&s);
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].contains("after"));
    }

    #[test]
    fn test_email_requires_addresses() {
        let s = settings(CliConfig {
            output: Some(OutputMode::Email),
            ..valid_cli()
        });
        assert_eq!(config_errors(&s).len(), 2);

        let s = settings(CliConfig {
            output: Some(OutputMode::Email),
            email_sender: Some("noreply@rabe.ch".to_string()),
            email_to: Some("suisa@example.org".to_string()),
            ..valid_cli()
        });
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_interval_default_span() {
        let s = settings(valid_cli());
        let interval = s.interval(date(1993, 3, 31)).unwrap();
        assert_eq!(interval, ReportInterval::new(date(1993, 3, 1), date(1993, 3, 31)));
    }

    #[test]
    fn test_interval_last_month() {
        let s = settings(CliConfig {
            last_month: true,
            ..valid_cli()
        });
        assert_eq!(
            s.interval(date(1993, 3, 15)).unwrap(),
            ReportInterval::new(date(1993, 2, 1), date(1993, 2, 28))
        );
        assert_eq!(
            s.interval(date(1994, 1, 1)).unwrap(),
            ReportInterval::new(date(1993, 12, 1), date(1993, 12, 31))
        );
    }

    #[test]
    fn test_interval_explicit_bounds() {
        let s = settings(CliConfig {
            start: Some("1993-01-01".to_string()),
            ..valid_cli()
        });
        assert_eq!(
            s.interval(date(1993, 3, 1)).unwrap(),
            ReportInterval::new(date(1993, 1, 1), date(1993, 3, 1))
        );

        let s = settings(CliConfig {
            end: Some("1993-01-31".to_string()),
            ..valid_cli()
        });
        assert_eq!(
            s.interval(date(1993, 3, 1)).unwrap(),
            ReportInterval::new(date(1993, 1, 30), date(1993, 1, 31))
        );
    }

    #[test]
    fn test_interval_rejects_end_before_default_start() {
        let s = settings(CliConfig {
            end: Some("1993-01-01".to_string()),
            ..valid_cli()
        });
        assert!(s.validate().is_ok());
        match s.interval(date(1993, 3, 1)) {
            Err(Error::Config(msgs)) => {
                assert_eq!(msgs.len(), 1);
                assert!(msgs[0].contains("1993-01-30 is after end date 1993-01-01"));
            }
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_interval_rejects_start_after_today() {
        let s = settings(CliConfig {
            start: Some("1993-03-02".to_string()),
            ..valid_cli()
        });
        assert!(matches!(s.interval(date(1993, 3, 1)), Err(Error::Config(_))));
        assert_eq!(
            s.interval(date(1993, 3, 2)).unwrap(),
            ReportInterval::new(date(1993, 3, 2), date(1993, 3, 2))
        );
    }

    #[test]
    fn test_filename() {
        let start = date(1993, 3, 1);
        let s = settings(valid_cli());
        assert_eq!(s.filename(start), PathBuf::from("rabe_1993-03-01.csv"));

        let s = settings(CliConfig {
            last_month: true,
            file_format: Some(FileFormat::Xlsx),
            ..valid_cli()
        });
        assert_eq!(s.filename(start), PathBuf::from("rabe_1993_03.xlsx"));

        let s = settings(CliConfig {
            file_path: Some(PathBuf::from("/tmp/report.csv")),
            last_month: true,
            ..valid_cli()
        });
        assert_eq!(s.filename(start), PathBuf::from("/tmp/report.csv"));
    }

    #[test]
    fn test_report_context() {
        let s = settings(CliConfig {
            station_name: Some("Radio X".to_string()),
            identifier_mode: Some(IdentifierMode::Local),
            ..valid_cli()
        });
        let ctx = s.report_context();
        assert_eq!(ctx.station_name, "Radio X");
        assert_eq!(ctx.identifier.mode, IdentifierMode::Local);
        assert_eq!(ctx.identifier.authority, "rabe.ch");
    }
}
