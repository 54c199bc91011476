//! Core data models for recognition results.
//!
//! The monitoring API is loose about shapes: `artists` may be a list or a
//! string, an ISRC may be wrapped in a list, an album may be a plain title or
//! an object. Each of those is an explicit enum here, and fields whose shape
//! does not match any known variant deserialize to `None` instead of failing
//! the whole day.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

use crate::error::{Error, Result};

/// Timestamp format used by the API (`timestamp_utc`) and in reports.
pub const TS_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// Deserialize an optional field, mapping any shape mismatch to `None`.
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

// ============================================================================
// Track Fields
// ============================================================================

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct ArtistCredit {
    #[serde(default)]
    pub name: Option<String>,
}

/// The `artists` field: a list of credits for catalogued music, sometimes a
/// bare string on custom uploads.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Artists {
    Credits(Vec<ArtistCredit>),
    Name(String),
}

/// An ISRC as delivered, either a code or a single-element list (2021 records).
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum IsrcField {
    Code(String),
    Codes(Vec<String>),
}

impl IsrcField {
    /// The raw code, unwrapped from a list if needed. Empty values count as absent.
    pub fn code(&self) -> Option<&str> {
        let code = match self {
            IsrcField::Code(code) => Some(code.as_str()),
            IsrcField::Codes(codes) => codes.first().map(String::as_str),
        };
        code.filter(|c| !c.is_empty())
    }
}

/// Album information: an object from the ACRCloud bucket, a string from custom buckets.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Album {
    Release(AlbumRelease),
    Title(String),
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct AlbumRelease {
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub cd_id: Option<String>,
}

impl Album {
    pub fn title(&self) -> &str {
        match self {
            Album::Release(release) => release.name.as_deref().unwrap_or(""),
            Album::Title(title) => title,
        }
    }

    pub fn cd_id(&self) -> &str {
        match self {
            Album::Release(release) => release.cd_id.as_deref().unwrap_or(""),
            Album::Title(_) => "",
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Contributors {
    #[serde(default, deserialize_with = "lenient")]
    pub composers: Option<Vec<String>>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct ExternalIds {
    #[serde(default, deserialize_with = "lenient")]
    pub isrc: Option<IsrcField>,
    #[serde(default, deserialize_with = "lenient")]
    pub upc: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Creator {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "lenient")]
    pub role: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Work {
    #[serde(default)]
    pub creators: Vec<Creator>,
}

/// One music or custom-file item of a recognition result.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Track {
    #[serde(deserialize_with = "lenient")]
    pub acrid: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub title: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub artists: Option<Artists>,
    #[serde(deserialize_with = "lenient")]
    pub artist: Option<String>,
    /// Capitalized key found in records from June 2021.
    #[serde(rename = "Artist", deserialize_with = "lenient")]
    pub artist_legacy: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub contributors: Option<Contributors>,
    #[serde(deserialize_with = "lenient")]
    pub external_ids: Option<ExternalIds>,
    #[serde(deserialize_with = "lenient")]
    pub isrc: Option<IsrcField>,
    #[serde(deserialize_with = "lenient")]
    pub label: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub album: Option<Album>,
    #[serde(deserialize_with = "lenient")]
    pub release_date: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub works: Option<Vec<Work>>,
}

impl Track {
    /// Convenience constructor for a track known only by its acrid.
    pub fn with_acrid(acrid: &str) -> Self {
        Self {
            acrid: Some(acrid.to_string()),
            ..Self::default()
        }
    }
}

/// Where the tracks of a result were found.
#[derive(Clone, Debug, PartialEq)]
pub enum TrackSource {
    /// Catalogued music (`metadata.music`).
    Music(Vec<Track>),
    /// Custom, non-commercial recordings (`metadata.custom_files`).
    CustomFiles(Vec<Track>),
}

impl TrackSource {
    pub fn tracks(&self) -> &[Track] {
        match self {
            TrackSource::Music(tracks) | TrackSource::CustomFiles(tracks) => tracks,
        }
    }
}

// ============================================================================
// Play Events
// ============================================================================

#[derive(Deserialize)]
struct RawEntry {
    metadata: RawMetadata,
}

#[derive(Deserialize)]
struct RawMetadata {
    timestamp_utc: String,
    #[serde(default)]
    played_duration: u64,
    #[serde(default)]
    music: Option<Vec<Track>>,
    #[serde(default)]
    custom_files: Option<Vec<Track>>,
}

/// One recognition result.
///
/// `timestamp_local` is only ever set through [`PlayEvent::localize`], so it
/// always equals `timestamp_utc` converted to the zone it was localized to.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(try_from = "RawEntry")]
pub struct PlayEvent {
    timestamp_utc: DateTime<Utc>,
    timestamp_local: Option<NaiveDateTime>,
    pub played_duration: u64,
    pub tracks: Option<TrackSource>,
}

impl TryFrom<RawEntry> for PlayEvent {
    type Error = String;

    fn try_from(raw: RawEntry) -> std::result::Result<Self, Self::Error> {
        let metadata = raw.metadata;
        let timestamp = NaiveDateTime::parse_from_str(&metadata.timestamp_utc, TS_FMT)
            .map_err(|e| format!("invalid timestamp_utc '{}': {}", metadata.timestamp_utc, e))?;
        // `music` wins when both are present, `null` counts as absent
        let tracks = match (metadata.music, metadata.custom_files) {
            (Some(music), _) => Some(TrackSource::Music(music)),
            (None, Some(custom)) => Some(TrackSource::CustomFiles(custom)),
            (None, None) => None,
        };
        Ok(Self {
            timestamp_utc: timestamp.and_utc(),
            timestamp_local: None,
            played_duration: metadata.played_duration,
            tracks,
        })
    }
}

impl PlayEvent {
    pub fn new(
        timestamp_utc: DateTime<Utc>,
        played_duration: u64,
        tracks: Option<TrackSource>,
    ) -> Self {
        Self {
            timestamp_utc,
            timestamp_local: None,
            played_duration,
            tracks,
        }
    }

    pub fn timestamp_utc(&self) -> DateTime<Utc> {
        self.timestamp_utc
    }

    pub fn timestamp_local(&self) -> Option<NaiveDateTime> {
        self.timestamp_local
    }

    /// Annotate the event with its wall-clock time in `tz`.
    pub fn localize(&mut self, tz: &Tz) {
        self.timestamp_local = Some(self.timestamp_utc.with_timezone(tz).naive_local());
    }

    /// Local wall-clock time, or UTC when the event was never localized.
    pub fn report_time(&self) -> NaiveDateTime {
        self.timestamp_local
            .unwrap_or_else(|| self.timestamp_utc.naive_utc())
    }

    /// Calendar date that decides interval membership.
    pub fn report_date(&self) -> NaiveDate {
        self.report_time().date()
    }

    /// All track items of this event.
    pub fn track_items(&self) -> Result<&[Track]> {
        self.tracks
            .as_ref()
            .map(TrackSource::tracks)
            .ok_or_else(|| self.malformed())
    }

    /// The first track item; further items are not reported.
    pub fn primary_track(&self) -> Result<&Track> {
        self.track_items()?.first().ok_or_else(|| self.malformed())
    }

    fn malformed(&self) -> Error {
        Error::MalformedRecord {
            timestamp: self.timestamp_utc.format(TS_FMT).to_string(),
        }
    }
}

/// Body of a results response.
#[derive(Debug, Default, Deserialize)]
pub struct ResultsResponse {
    #[serde(default)]
    pub data: Vec<PlayEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn parse(json: &str) -> PlayEvent {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_music_entry() {
        let event = parse(
            r#"{"metadata": {"timestamp_utc": "1993-03-01 13:12:00", "played_duration": 60,
                "music": [{"title": "Uhrenvergleich", "acrid": "a1"}]}}"#,
        );
        assert_eq!(
            event.timestamp_utc(),
            Utc.with_ymd_and_hms(1993, 3, 1, 13, 12, 0).unwrap()
        );
        assert_eq!(event.played_duration, 60);
        assert!(matches!(event.tracks, Some(TrackSource::Music(_))));
        assert_eq!(event.primary_track().unwrap().acrid.as_deref(), Some("a1"));
        assert_eq!(event.timestamp_local(), None);
    }

    #[test]
    fn test_custom_files_entry() {
        let event = parse(
            r#"{"metadata": {"timestamp_utc": "1993-03-01 13:37:00",
                "custom_files": [{"acrid": "a2", "artists": "Da Gang", "album": "album, but string"}]}}"#,
        );
        assert!(matches!(event.tracks, Some(TrackSource::CustomFiles(_))));
        let track = event.primary_track().unwrap();
        assert_eq!(track.artists, Some(Artists::Name("Da Gang".to_string())));
        assert_eq!(track.album, Some(Album::Title("album, but string".to_string())));
    }

    #[test]
    fn test_null_music_falls_back_to_custom_files() {
        let event = parse(
            r#"{"metadata": {"timestamp_utc": "1993-03-01 13:37:00", "music": null,
                "custom_files": [{"acrid": "a2"}]}}"#,
        );
        assert!(matches!(event.tracks, Some(TrackSource::CustomFiles(_))));
    }

    #[test]
    fn test_missing_tracks_is_malformed() {
        let event = parse(r#"{"metadata": {"timestamp_utc": "1993-03-01 13:37:00"}}"#);
        assert!(event.tracks.is_none());
        assert!(matches!(
            event.track_items(),
            Err(Error::MalformedRecord { .. })
        ));
    }

    #[test]
    fn test_loose_shapes() {
        let event = parse(
            r#"{"metadata": {"timestamp_utc": "1993-03-01 16:20:00", "music": [{
                "acrid": "a3",
                "album": {"name": "Da Alboom"},
                "contributors": {"composers": null},
                "artists": [{"name": "Mary's Surprise Act"}, {"name": "Climmy Jiff"}],
                "isrc": ["DEZ650710376"],
                "external_ids": {"upc": 12345}
            }]}}"#,
        );
        let track = event.primary_track().unwrap();
        assert_eq!(track.album.as_ref().map(Album::title), Some("Da Alboom"));
        assert_eq!(track.contributors.as_ref().unwrap().composers, None);
        assert_eq!(track.isrc.as_ref().and_then(IsrcField::code), Some("DEZ650710376"));
        // upc of the wrong type is dropped rather than failing the record
        assert_eq!(track.external_ids.as_ref().unwrap().upc, None);
        match &track.artists {
            Some(Artists::Credits(credits)) => assert_eq!(credits.len(), 2),
            other => panic!("unexpected artists: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_timestamp_rejected() {
        let result: std::result::Result<PlayEvent, _> =
            serde_json::from_str(r#"{"metadata": {"timestamp_utc": "1993-03-01T13:37"}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_localize() {
        let mut event = PlayEvent::new(
            Utc.with_ymd_and_hms(1993, 3, 1, 23, 30, 0).unwrap(),
            10,
            None,
        );
        assert_eq!(event.report_date(), NaiveDate::from_ymd_opt(1993, 3, 1).unwrap());

        // winter time, UTC+1
        event.localize(&chrono_tz::Europe::Zurich);
        assert_eq!(
            event.timestamp_local().unwrap().format(TS_FMT).to_string(),
            "1993-03-02 00:30:00"
        );
        assert_eq!(event.report_date(), NaiveDate::from_ymd_opt(1993, 3, 2).unwrap());
    }

    #[test]
    fn test_localize_summer_time() {
        // Zurich is on UTC+2 from 1993-03-28
        let mut event = PlayEvent::new(
            Utc.with_ymd_and_hms(1993, 3, 31, 23, 30, 0).unwrap(),
            10,
            None,
        );
        event.localize(&chrono_tz::Europe::Zurich);
        assert_eq!(
            event.timestamp_local().unwrap().format(TS_FMT).to_string(),
            "1993-04-01 01:30:00"
        );
    }

    #[test]
    fn test_results_response() {
        let response: ResultsResponse = serde_json::from_str(
            r#"{"data": [{"metadata": {"timestamp_utc": "1993-03-01 13:12:00", "music": []}}]}"#,
        )
        .unwrap();
        assert_eq!(response.data.len(), 1);
        assert!(matches!(
            response.data[0].primary_track(),
            Err(Error::MalformedRecord { .. })
        ));
    }
}
