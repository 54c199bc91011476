use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sendemeldung::acr_client::{fetch_interval, AcrClient};
use sendemeldung::config::{CliConfig, FileConfig, OutputMode, Settings, DEFAULT_CONFIG_PATHS};
use sendemeldung::email::{body_vars, create_message, send_message, subject_vars, substitute};
use sendemeldung::identifier::IdentifierMode;
use sendemeldung::merge::merge_duplicates;
use sendemeldung::progress;
use sendemeldung::report::{build_rows, render, FileFormat, Rendered};

#[derive(Parser)]
#[command(name = "sendemeldung")]
#[command(about = "Create SUISA play-out reports from ACRCloud broadcast monitoring data")]
struct Args {
    /// Additional TOML config file, read after the default locations
    #[arg(long)]
    config: Option<PathBuf>,

    /// Hide progress bars and log progress instead
    #[arg(long)]
    no_progress: bool,

    #[arg(long, env = "SENDEMELDUNG_ACR_BEARER_TOKEN", hide_env_values = true)]
    bearer_token: Option<String>,

    #[arg(long, env = "SENDEMELDUNG_ACR_PROJECT_ID")]
    project_id: Option<i64>,

    #[arg(long, env = "SENDEMELDUNG_ACR_STREAM_ID")]
    stream_id: Option<String>,

    #[arg(long, env = "SENDEMELDUNG_ACR_BASE_URL")]
    base_url: Option<String>,

    #[arg(long, env = "SENDEMELDUNG_STATION_NAME")]
    station_name: Option<String>,

    /// Used in generated filenames
    #[arg(long, env = "SENDEMELDUNG_STATION_NAME_SHORT")]
    station_name_short: Option<String>,

    /// IANA timezone of the report, e.g. Europe/Zurich
    #[arg(long, env = "SENDEMELDUNG_L10N_TIMEZONE")]
    timezone: Option<String>,

    /// Locale for month names in emails, e.g. de_CH
    #[arg(long, env = "SENDEMELDUNG_L10N_LOCALE")]
    locale: Option<String>,

    /// First day of the report (YYYY-MM-DD)
    #[arg(long, env = "SENDEMELDUNG_DATE_START")]
    date_start: Option<String>,

    /// Last day of the report (YYYY-MM-DD)
    #[arg(long, env = "SENDEMELDUNG_DATE_END")]
    date_end: Option<String>,

    /// Report the whole previous month
    #[arg(long, env = "SENDEMELDUNG_DATE_LAST_MONTH")]
    last_month: bool,

    #[arg(long, env = "SENDEMELDUNG_FILE_PATH")]
    file_path: Option<PathBuf>,

    #[arg(long, value_enum, env = "SENDEMELDUNG_FILE_FORMAT")]
    file_format: Option<FileFormat>,

    #[arg(long, value_enum, env = "SENDEMELDUNG_OUTPUT")]
    output: Option<OutputMode>,

    #[arg(long, value_enum, env = "SENDEMELDUNG_IDENTIFIER_MODE")]
    identifier_mode: Option<IdentifierMode>,

    #[arg(long, env = "SENDEMELDUNG_IDENTIFIER_AUTHORITY")]
    identifier_authority: Option<String>,

    #[arg(long, env = "SENDEMELDUNG_IDENTIFIER_SHOW")]
    identifier_show: Option<String>,

    #[arg(long, env = "SENDEMELDUNG_EMAIL_SERVER")]
    email_server: Option<String>,

    #[arg(long, env = "SENDEMELDUNG_EMAIL_PORT")]
    email_port: Option<u16>,

    #[arg(long, env = "SENDEMELDUNG_EMAIL_SENDER")]
    email_sender: Option<String>,

    /// Recipients (comma-separated)
    #[arg(long, env = "SENDEMELDUNG_EMAIL_TO")]
    email_to: Option<String>,

    #[arg(long, env = "SENDEMELDUNG_EMAIL_CC")]
    email_cc: Option<String>,

    #[arg(long, env = "SENDEMELDUNG_EMAIL_BCC")]
    email_bcc: Option<String>,

    /// SMTP login, defaults to the sender
    #[arg(long, env = "SENDEMELDUNG_EMAIL_USERNAME")]
    email_username: Option<String>,

    #[arg(long, env = "SENDEMELDUNG_EMAIL_PASSWORD", hide_env_values = true)]
    email_password: Option<String>,

    #[arg(long, env = "SENDEMELDUNG_EMAIL_SUBJECT")]
    email_subject: Option<String>,

    #[arg(long, env = "SENDEMELDUNG_EMAIL_TEXT")]
    email_text: Option<String>,

    #[arg(long, env = "SENDEMELDUNG_EMAIL_FOOTER")]
    email_footer: Option<String>,

    #[arg(long, env = "SENDEMELDUNG_EMAIL_RESPONSIBLE_EMAIL")]
    email_responsible_email: Option<String>,
}

impl Args {
    fn cli_config(&self) -> CliConfig {
        CliConfig {
            bearer_token: self.bearer_token.clone(),
            project_id: self.project_id,
            stream_id: self.stream_id.clone(),
            base_url: self.base_url.clone(),
            station_name: self.station_name.clone(),
            station_name_short: self.station_name_short.clone(),
            timezone: self.timezone.clone(),
            locale: self.locale.clone(),
            start: self.date_start.clone(),
            end: self.date_end.clone(),
            last_month: self.last_month,
            file_path: self.file_path.clone(),
            file_format: self.file_format,
            output: self.output,
            identifier_mode: self.identifier_mode,
            identifier_authority: self.identifier_authority.clone(),
            identifier_show: self.identifier_show.clone(),
            email_server: self.email_server.clone(),
            email_port: self.email_port,
            email_sender: self.email_sender.clone(),
            email_to: self.email_to.clone(),
            email_cc: self.email_cc.clone(),
            email_bcc: self.email_bcc.clone(),
            email_username: self.email_username.clone(),
            email_password: self.email_password.clone(),
            email_subject: self.email_subject.clone(),
            email_text: self.email_text.clone(),
            email_footer: self.email_footer.clone(),
            email_responsible: self.email_responsible_email.clone(),
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let args = Args::parse();
    progress::set_hidden(args.no_progress);

    let mut config_paths: Vec<PathBuf> = DEFAULT_CONFIG_PATHS.iter().map(PathBuf::from).collect();
    if let Some(path) = &args.config {
        if !path.exists() {
            anyhow::bail!("Config file does not exist: {:?}", path);
        }
        config_paths.push(path.clone());
    }
    let file_config = FileConfig::load_layered(config_paths.as_slice()).context("Failed to load config")?;

    let settings = Settings::resolve(&args.cli_config(), Some(file_config));
    settings.validate()?;

    let started = Instant::now();
    let tz = settings.timezone()?;
    let now = Utc::now();
    let today = now.with_timezone(&tz).date_naive();
    let interval = settings.interval(today)?;
    let filename = settings.filename(interval.start);
    info!(
        "Creating report for {} to {} ({})",
        interval.start, interval.end, tz
    );

    let client = AcrClient::with_base_url(
        &settings.acr.base_url,
        &settings.acr.bearer_token,
        settings.acr.project_id,
        &settings.acr.stream_id,
        tz,
    )
    .context("Failed to create API client")?;

    let events = fetch_interval(&client, interval, &tz, now).context("Failed to fetch results")?;
    let fetched = events.len();
    let events = merge_duplicates(events).context("Failed to merge duplicates")?;
    info!("Merged {} results into {} plays", fetched, events.len());

    let rows = build_rows(&events, &settings.report_context())?;
    let rendered = render(&rows, settings.file_format).context("Failed to render report")?;

    match settings.output {
        OutputMode::File => {
            std::fs::write(&filename, rendered.as_bytes())
                .with_context(|| format!("Failed to write {:?}", filename))?;
            info!("Wrote report to {:?}", filename);
        }
        OutputMode::Stdout => match &rendered {
            Rendered::Text(text) => {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(text.as_bytes())?;
                stdout.flush()?;
            }
            Rendered::Binary(_) => anyhow::bail!("Binary report cannot be printed to stdout"),
        },
        OutputMode::Email => {
            let locale = settings.locale()?;
            let subject = substitute(
                &settings.email.subject,
                &subject_vars(&settings.station.name, interval.start),
            )
            .context("Failed to render email subject")?;
            let text = substitute(
                &settings.email.text,
                &body_vars(&settings.email, &settings.station.name, interval.start, today, locale),
            )
            .context("Failed to render email body")?;
            let message = create_message(
                &settings.email,
                &subject,
                &text,
                &filename.to_string_lossy(),
                settings.file_format,
                rendered.as_bytes(),
            )
            .context("Failed to create email")?;
            send_message(&settings.email, &message).context("Failed to send email")?;
        }
    }

    info!(
        "Report with {} lines done in {:.2}s",
        rows.len(),
        started.elapsed().as_secs_f64()
    );
    Ok(())
}
