//! Raw input records.
//!
//! Both corpora are newline-delimited JSON. Fields are deserialized as
//! optional and checked afterwards, so a record missing a required field
//! can be reported (or skipped) instead of failing deserialization of the
//! whole file.

use clap::ValueEnum;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// Errors produced while turning a JSON line into a typed record.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("field `{0}` is out of range")]
    OutOfRange(&'static str),
}

/// What to do with a record that cannot be parsed or lacks a required field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum RecordPolicy {
    /// Abort the run on the first malformed record.
    Strict,
    /// Skip malformed records and count them.
    #[default]
    Lenient,
}

/// One entry of the song metadata corpus.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct MetadataRecord {
    pub song_id: Option<String>,
    pub title: Option<String>,
    pub artist_id: Option<String>,
    pub artist_name: Option<String>,
    pub artist_location: Option<String>,
    pub artist_latitude: Option<f64>,
    pub artist_longitude: Option<f64>,
    /// Release year, 0 when unknown.
    pub year: Option<i32>,
    /// Duration in seconds.
    pub duration: Option<f64>,
}

impl MetadataRecord {
    pub fn parse(line: &str) -> Result<Self, RecordError> {
        let record: MetadataRecord = serde_json::from_str(line)?;
        record.validate()?;
        Ok(record)
    }

    pub fn validate(&self) -> Result<(), RecordError> {
        require(&self.song_id, "song_id")?;
        require(&self.title, "title")?;
        require(&self.artist_id, "artist_id")?;
        require(&self.year, "year")?;
        require(&self.duration, "duration")?;
        Ok(())
    }
}

/// One line of the application event log.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub page: Option<String>,
    #[serde(default, deserialize_with = "deserialize_loose_id")]
    pub user_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub level: Option<String>,
    /// Epoch milliseconds.
    pub ts: Option<i64>,
    pub session_id: Option<i64>,
    pub location: Option<String>,
    pub user_agent: Option<String>,
    /// Free-text title of the played song.
    pub song: Option<String>,
    /// Free-text name of the played song's artist.
    pub artist: Option<String>,
}

impl EventRecord {
    /// Parses a log line. Nothing beyond valid JSON is required here: a line
    /// without `page` is simply not a play, and play-specific fields are
    /// checked by [`EventRecord::validate_play`] after filtering.
    pub fn parse(line: &str) -> Result<Self, RecordError> {
        Ok(serde_json::from_str(line)?)
    }

    pub fn is_page(&self, page: &str) -> bool {
        self.page.as_deref() == Some(page)
    }

    pub fn validate_play(&self) -> Result<(), RecordError> {
        match self.user_id.as_deref() {
            Some(id) if !id.is_empty() => {}
            _ => return Err(RecordError::MissingField("userId")),
        }
        require(&self.level, "level")?;
        require(&self.ts, "ts")?;
        require(&self.session_id, "sessionId")?;
        require(&self.song, "song")?;
        Ok(())
    }
}

fn require<T>(value: &Option<T>, field: &'static str) -> Result<(), RecordError> {
    match value {
        Some(_) => Ok(()),
        None => Err(RecordError::MissingField(field)),
    }
}

/// Log producers emit `userId` either as a string or as a number.
fn deserialize_loose_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
