//! Report delivery by email.
//!
//! Subject and body are `$name` / `${name}` templates; `$$` yields a literal
//! dollar sign. Every placeholder must be known, otherwise rendering fails.

use chrono::{Datelike, Locale, Months, NaiveDate};
use lettre::message::header::{ContentTransferEncoding, ContentType};
use lettre::message::{Attachment, Body, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use crate::error::{Error, Result};
use crate::report::FileFormat;

pub const DEFAULT_SUBJECT: &str = "SUISA Sendemeldung von $station_name für $year-$month";

pub const DEFAULT_TEXT: &str = "Liebe SUISA

Im Anhang finden Sie die Sendemeldung von $station_name für den Monat $month $year.

Bitte beachten Sie, dass die Meldung auf automatisch erkannten Titeln beruht. \
Korrekturen zu Meldungen aus dem Jahr $previous_year nehmen wir gerne bis am \
$in_three_months entgegen.

Bei Fragen erreichen Sie uns unter $responsible_email.

Freundliche Grüsse
$email_footer";

/// Long date as used in the body, e.g. "1. Juni 1993".
const LONG_DATE_FORMAT: &str = "%-d. %B %Y";

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$(?:(\$)|([A-Za-z_][A-Za-z0-9_]*)|\{([A-Za-z_][A-Za-z0-9_]*)\}|())").unwrap()
});

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmailSettings {
    pub server: String,
    pub port: u16,
    pub sender: Option<String>,
    /// Comma-separated recipients.
    pub to: Option<String>,
    pub cc: Option<String>,
    pub bcc: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub subject: String,
    pub text: String,
    pub footer: String,
    pub responsible_email: String,
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            server: "127.0.0.1".to_string(),
            port: 587,
            sender: None,
            to: None,
            cc: None,
            bcc: None,
            username: None,
            password: None,
            subject: DEFAULT_SUBJECT.to_string(),
            text: DEFAULT_TEXT.to_string(),
            footer: String::new(),
            responsible_email: String::new(),
        }
    }
}

// ============================================================================
// Templates
// ============================================================================

/// Replace all placeholders in `template` with values from `vars`.
pub fn substitute(template: &str, vars: &HashMap<&str, String>) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for caps in PLACEHOLDER.captures_iter(template) {
        let whole = caps.get(0).map_or(0..0, |m| m.range());
        out.push_str(&template[last..whole.start]);
        out.push_str(&expand(&caps, vars, whole.start)?);
        last = whole.end;
    }
    out.push_str(&template[last..]);
    Ok(out)
}

fn expand(caps: &Captures<'_>, vars: &HashMap<&str, String>, offset: usize) -> Result<String> {
    if caps.get(1).is_some() {
        return Ok("$".to_string());
    }
    match caps.get(2).or_else(|| caps.get(3)) {
        Some(name) => vars
            .get(name.as_str())
            .cloned()
            .ok_or_else(|| Error::Template(format!("unknown placeholder ${}", name.as_str()))),
        None => Err(Error::Template(format!("invalid placeholder at position {}", offset))),
    }
}

fn localized(date: NaiveDate, fmt: &str, locale: Locale) -> String {
    date.format_localized(fmt, locale).to_string()
}

/// Variables for the subject line.
pub fn subject_vars(station_name: &str, start: NaiveDate) -> HashMap<&'static str, String> {
    HashMap::from([
        ("station_name", station_name.to_string()),
        ("year", start.format("%Y").to_string()),
        ("month", start.format("%m").to_string()),
    ])
}

/// Variables for the message body; `today` anchors the correction deadline.
pub fn body_vars(
    settings: &EmailSettings,
    station_name: &str,
    start: NaiveDate,
    today: NaiveDate,
    locale: Locale,
) -> HashMap<&'static str, String> {
    let previous_year = start - chrono::Duration::days(365);
    let in_three_months = today.checked_add_months(Months::new(3)).unwrap_or(today);
    HashMap::from([
        ("station_name", station_name.to_string()),
        ("month", localized(start, "%B", locale)),
        ("year", start.year().to_string()),
        ("previous_year", previous_year.year().to_string()),
        ("in_three_months", localized(in_three_months, LONG_DATE_FORMAT, locale)),
        ("responsible_email", settings.responsible_email.clone()),
        ("email_footer", settings.footer.clone()),
    ])
}

// ============================================================================
// Message
// ============================================================================

fn mailboxes(list: &str) -> Result<Vec<Mailbox>> {
    list.split(',')
        .map(str::trim)
        .filter(|addr| !addr.is_empty())
        .map(|addr| addr.parse::<Mailbox>().map_err(Error::from))
        .collect()
}

fn attachment_type(format: FileFormat) -> &'static str {
    match format {
        FileFormat::Csv => "text/csv",
        FileFormat::Xlsx => "application/vnd.ms-excel",
    }
}

/// Build the report message with the rendered file attached.
pub fn create_message(
    settings: &EmailSettings,
    subject: &str,
    text: &str,
    filename: &str,
    format: FileFormat,
    data: &[u8],
) -> Result<Message> {
    let sender = settings
        .sender
        .as_deref()
        .ok_or_else(|| Error::Email("no sender configured".to_string()))?;
    let mut builder = Message::builder().from(sender.parse()?).subject(subject).date_now();

    for mbox in mailboxes(settings.to.as_deref().unwrap_or(""))? {
        builder = builder.to(mbox);
    }
    for mbox in mailboxes(settings.cc.as_deref().unwrap_or(""))? {
        builder = builder.cc(mbox);
    }
    for mbox in mailboxes(settings.bcc.as_deref().unwrap_or(""))? {
        builder = builder.bcc(mbox);
    }

    let basename = Path::new(filename)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string());
    let content_type = ContentType::parse(attachment_type(format)).map_err(|e| Error::Email(e.to_string()))?;
    let body = Body::new_with_encoding(data.to_vec(), ContentTransferEncoding::Base64)
        .map_err(|_| Error::Email("attachment could not be encoded".to_string()))?;

    let message = builder.multipart(
        MultiPart::mixed()
            .singlepart(SinglePart::plain(text.to_string()))
            .singlepart(Attachment::new(basename).body(body, content_type)),
    )?;
    Ok(message)
}

/// Credentials for the SMTP login; none unless a password is set.
pub fn smtp_credentials(settings: &EmailSettings) -> Option<Credentials> {
    let password = settings.password.as_deref().filter(|p| !p.is_empty())?;
    let login = settings
        .username
        .as_deref()
        .filter(|u| !u.is_empty())
        .or(settings.sender.as_deref())
        .unwrap_or_default();
    Some(Credentials::new(login.to_string(), password.to_string()))
}

/// Send `message` through the configured server using STARTTLS.
pub fn send_message(settings: &EmailSettings, message: &Message) -> Result<()> {
    let mut transport = SmtpTransport::starttls_relay(&settings.server)?.port(settings.port);
    if let Some(credentials) = smtp_credentials(settings) {
        transport = transport.credentials(credentials);
    }
    transport.build().send(message)?;
    info!("Sent report via {}:{}", settings.server, settings.port);
    Ok(())
}
