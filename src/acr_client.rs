//! Client for the ACRCloud broadcast-monitoring results API.
//!
//! One request per UTC day. [`fetch_interval`] turns a report interval into
//! the list of events that lie inside it in the report timezone.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use reqwest::blocking::Client;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::interval::{expand_interval, trim_to_interval, ReportInterval};
use crate::models::{PlayEvent, ResultsResponse};
use crate::progress::{create_progress_bar, log_progress};

pub const DEFAULT_BASE_URL: &str = "https://eu-api-v2.acrcloud.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Source of recognition events for one UTC day.
pub trait DayFetcher {
    /// Events recorded on `day`, localized to the fetcher's timezone.
    fn fetch_day(&self, day: NaiveDate) -> Result<Vec<PlayEvent>>;
}

pub struct AcrClient {
    client: Client,
    base_url: String,
    bearer_token: String,
    project_id: i64,
    stream_id: String,
    timezone: Tz,
}

impl AcrClient {
    pub fn new(bearer_token: &str, project_id: i64, stream_id: &str, timezone: Tz) -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL, bearer_token, project_id, stream_id, timezone)
    }

    pub fn with_base_url(
        base_url: &str,
        bearer_token: &str,
        project_id: i64,
        stream_id: &str,
        timezone: Tz,
    ) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bearer_token: bearer_token.to_string(),
            project_id,
            stream_id: stream_id.to_string(),
            timezone,
        })
    }

    pub fn results_url(&self) -> String {
        format!(
            "{}/api/bm-cs-projects/{}/streams/{}/results",
            self.base_url, self.project_id, self.stream_id
        )
    }
}

impl DayFetcher for AcrClient {
    fn fetch_day(&self, day: NaiveDate) -> Result<Vec<PlayEvent>> {
        let date = day.format("%Y%m%d").to_string();
        debug!("Fetching results for {}", date);

        let response = self
            .client
            .get(self.results_url())
            .bearer_auth(&self.bearer_token)
            .query(&[("date", date.as_str())])
            .send()?;

        if !response.status().is_success() {
            return Err(Error::Upstream {
                status: response.status(),
                day,
            });
        }

        let body = response.text()?;
        parse_results(&body, &self.timezone)
    }
}

/// Parse a results body and localize every event to `tz`.
pub fn parse_results(body: &str, tz: &Tz) -> Result<Vec<PlayEvent>> {
    let response: ResultsResponse = serde_json::from_str(body)?;
    let mut events = response.data;
    for event in &mut events {
        event.localize(tz);
    }
    Ok(events)
}

/// Fetch all events of `requested` as seen in `tz`.
///
/// Days are fetched one after another in ascending order; the first failing
/// day aborts the whole interval.
pub fn fetch_interval<F: DayFetcher>(
    fetcher: &F,
    requested: ReportInterval,
    tz: &Tz,
    now: DateTime<Utc>,
) -> Result<Vec<PlayEvent>> {
    let plan = expand_interval(requested, tz, now);
    debug!(
        "Fetching {} to {} for requested {} to {} (trim: {})",
        plan.fetch.start, plan.fetch.end, requested.start, requested.end, plan.trim
    );

    let total = plan.fetch.num_days();
    let pb = create_progress_bar(total, "Fetching results");
    let mut events = Vec::new();
    for (i, day) in plan.fetch.days().enumerate() {
        pb.set_message(format!("Fetching {}", day));
        events.extend(fetcher.fetch_day(day)?);
        pb.inc(1);
        log_progress("fetch", i as u64 + 1, total, 7);
    }
    pb.finish_with_message(format!("Fetched {} results", events.len()));

    let events = if plan.trim {
        let fetched = events.len();
        let trimmed = trim_to_interval(events, requested);
        debug!("Trimmed {} results outside the interval", fetched - trimmed.len());
        trimmed
    } else {
        events
    };

    info!(
        "Fetched {} results for {} to {}",
        events.len(),
        requested.start,
        requested.end
    );
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Track, TrackSource};
    use chrono::{NaiveDateTime, TimeZone};
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// In-memory fetcher returning one canned event per configured day.
    struct FakeFetcher {
        tz: Tz,
        events: HashMap<NaiveDate, Vec<&'static str>>,
        default_time: Option<&'static str>,
        calls: RefCell<Vec<NaiveDate>>,
        fail_on: Option<NaiveDate>,
    }

    impl FakeFetcher {
        fn new(tz: Tz) -> Self {
            Self {
                tz,
                events: HashMap::new(),
                default_time: None,
                calls: RefCell::new(Vec::new()),
                fail_on: None,
            }
        }
    }

    impl DayFetcher for FakeFetcher {
        fn fetch_day(&self, day: NaiveDate) -> Result<Vec<PlayEvent>> {
            self.calls.borrow_mut().push(day);
            if self.fail_on == Some(day) {
                return Err(Error::Upstream {
                    status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                    day,
                });
            }
            let stamps = match self.events.get(&day) {
                Some(stamps) => stamps.clone(),
                None => self.default_time.into_iter().collect(),
            };
            Ok(stamps
                .into_iter()
                .map(|stamp| {
                    let ts = NaiveDateTime::parse_from_str(stamp, crate::models::TS_FMT)
                        .unwrap()
                        .and_utc();
                    let mut event = PlayEvent::new(
                        ts,
                        60,
                        Some(TrackSource::Music(vec![Track::with_acrid("a1")])),
                    );
                    event.localize(&self.tz);
                    event
                })
                .collect())
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn march() -> ReportInterval {
        ReportInterval::new(date(1993, 3, 1), date(1993, 3, 31))
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(1993, 3, 2, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_utc_fetches_each_day_once() {
        let mut fetcher = FakeFetcher::new(Tz::UTC);
        fetcher.default_time = Some("1993-03-15 13:12:00");
        let events = fetch_interval(&fetcher, march(), &Tz::UTC, now()).unwrap();
        assert_eq!(events.len(), 31);
        let calls = fetcher.calls.borrow();
        assert_eq!(calls.first(), Some(&date(1993, 3, 1)));
        assert_eq!(calls.last(), Some(&date(1993, 3, 31)));
        assert!(calls.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_ahead_of_utc_keeps_local_march() {
        let zurich = chrono_tz::Europe::Zurich;
        let mut fetcher = FakeFetcher::new(zurich);
        fetcher.events.insert(date(1993, 3, 1), vec!["1993-03-01 00:00:00"]);
        // 00:30 local on April 1st
        fetcher.events.insert(date(1993, 3, 31), vec!["1993-03-31 23:30:00"]);
        // 23:30 local on February 28th
        fetcher.events.insert(date(1993, 2, 28), vec!["1993-02-28 22:30:00"]);
        let events = fetch_interval(&fetcher, march(), &zurich, now()).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].timestamp_utc(),
            Utc.with_ymd_and_hms(1993, 3, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(fetcher.calls.borrow().first(), Some(&date(1993, 2, 28)));
    }

    #[test]
    fn test_behind_utc_trims_leading_utc_events() {
        let nuuk = chrono_tz::America::Nuuk;
        let mut fetcher = FakeFetcher::new(nuuk);
        // 21:00 local on February 28th
        fetcher.events.insert(date(1993, 3, 1), vec!["1993-03-01 00:00:00"]);
        fetcher.events.insert(date(1993, 3, 15), vec!["1993-03-15 12:00:00"]);
        // still March 31st in Nuuk
        fetcher.events.insert(date(1993, 4, 1), vec!["1993-04-01 01:00:00"]);
        let events = fetch_interval(&fetcher, march(), &nuuk, now()).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(fetcher.calls.borrow().last(), Some(&date(1993, 4, 1)));
    }

    #[test]
    fn test_failure_aborts_interval() {
        let mut fetcher = FakeFetcher::new(Tz::UTC);
        fetcher.default_time = Some("1993-03-15 13:12:00");
        fetcher.fail_on = Some(date(1993, 3, 10));
        let result = fetch_interval(&fetcher, march(), &Tz::UTC, now());
        assert!(matches!(result, Err(Error::Upstream { .. })));
        assert_eq!(fetcher.calls.borrow().len(), 10);
    }

    #[test]
    fn test_parse_results_localizes() {
        let body = r#"{"data": [{"metadata": {"timestamp_utc": "1993-03-01 13:12:00",
            "played_duration": 60, "music": [{"acrid": "a1"}]}}]}"#;
        let events = parse_results(body, &chrono_tz::Europe::Zurich).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].timestamp_local().unwrap().to_string(),
            "1993-03-01 14:12:00"
        );
    }

    #[test]
    fn test_parse_results_rejects_garbage() {
        assert!(matches!(
            parse_results("not json", &Tz::UTC),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn test_results_url() {
        let client = AcrClient::with_base_url(
            "http://localhost:8080/",
            "secret-key",
            123,
            "stream-id",
            Tz::UTC,
        )
        .unwrap();
        assert_eq!(
            client.results_url(),
            "http://localhost:8080/api/bm-cs-projects/123/streams/stream-id/results"
        );
    }
}
