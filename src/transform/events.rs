//! User, time and play tables from the event log.
//!
//! Only play events (`page == play_page`) take part. Each surviving event
//! is validated once, converted into a [`PlayEvent`], and then projected
//! into the three output tables. Song resolution goes through a
//! [`SongIndex`] built from the song table as persisted by the catalog step.

use super::time::{time_row, timestamp_from_millis};
use super::DedupPolicy;
use crate::records::{EventRecord, RecordError, RecordPolicy};
use crate::warehouse::models::{ArtistDim, PlayFact, SongDim, TimeDim, UserDim};
use chrono::NaiveDateTime;
use clap::ValueEnum;
use rayon::prelude::*;
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum EventError {
    #[error("Play event #{index} is malformed: {source}")]
    MalformedPlay {
        index: usize,
        #[source]
        source: RecordError,
    },
}

/// Which event fields identify the played song.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
#[value(rename_all = "snake_case")]
pub enum JoinKey {
    /// Exact match of the event's song title against the song title.
    #[default]
    Title,
    /// Exact match of title and artist name. Plays of same-titled songs by
    /// different artists are no longer attributed to each other.
    TitleAndArtist,
}

/// What happens to a play whose song cannot be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
#[value(rename_all = "snake_case")]
pub enum JoinMode {
    /// Keep the play with null song and artist ids.
    #[default]
    Left,
    /// Drop the play.
    Inner,
}

/// A validated play event.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayEvent {
    pub start_time: NaiveDateTime,
    pub user_id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub level: String,
    pub session_id: i64,
    pub location: Option<String>,
    pub user_agent: Option<String>,
    pub song: String,
    pub artist: Option<String>,
}

impl PlayEvent {
    fn from_record(record: &EventRecord) -> Result<Self, RecordError> {
        record.validate_play()?;
        let ts = record.ts.ok_or(RecordError::MissingField("ts"))?;
        let start_time = timestamp_from_millis(ts).ok_or(RecordError::OutOfRange("ts"))?;
        Ok(Self {
            start_time,
            user_id: record.user_id.clone().unwrap_or_default(),
            first_name: record.first_name.clone(),
            last_name: record.last_name.clone(),
            gender: record.gender.clone(),
            level: record.level.clone().unwrap_or_default(),
            session_id: record.session_id.unwrap_or_default(),
            location: record.location.clone(),
            user_agent: record.user_agent.clone(),
            song: record.song.clone().unwrap_or_default(),
            artist: record.artist.clone(),
        })
    }
}

/// Play events kept by [`filter_plays`] and the number of malformed ones
/// dropped under the lenient policy.
#[derive(Debug, Clone)]
pub struct FilteredPlays {
    pub plays: Vec<PlayEvent>,
    pub skipped: usize,
}

/// Keeps the events whose page equals `play_page` and validates them.
/// Events of any other page are discarded without validation.
pub fn filter_plays(
    records: &[EventRecord],
    play_page: &str,
    policy: RecordPolicy,
) -> Result<FilteredPlays, EventError> {
    let converted: Vec<(usize, Result<PlayEvent, RecordError>)> = records
        .par_iter()
        .enumerate()
        .filter(|(_, r)| r.is_page(play_page))
        .map(|(index, r)| (index, PlayEvent::from_record(r)))
        .collect();

    let mut plays = Vec::with_capacity(converted.len());
    let mut skipped = 0;
    for (index, result) in converted {
        match (result, policy) {
            (Ok(play), _) => plays.push(play),
            (Err(source), RecordPolicy::Strict) => {
                return Err(EventError::MalformedPlay { index, source })
            }
            (Err(source), RecordPolicy::Lenient) => {
                debug!("Skipping play event #{}: {}", index, source);
                skipped += 1;
            }
        }
    }
    if skipped > 0 {
        warn!("Skipped {} malformed play events", skipped);
    }
    Ok(FilteredPlays { plays, skipped })
}

/// One user row per play, then collapsed by user id. Plays are ordered by
/// time first, so `LastWins` keeps the most recent subscription level.
pub fn build_users(plays: &[PlayEvent], policy: DedupPolicy) -> Vec<UserDim> {
    let mut ordered: Vec<&PlayEvent> = plays.iter().collect();
    if policy != DedupPolicy::KeepAll {
        ordered.sort_by_key(|p| p.start_time);
    }
    let users: Vec<UserDim> = ordered
        .into_iter()
        .map(|p| UserDim {
            user_id: p.user_id.clone(),
            first_name: p.first_name.clone(),
            last_name: p.last_name.clone(),
            gender: p.gender.clone(),
            level: p.level.clone(),
        })
        .collect();
    policy.apply(users, |u| u.user_id.clone())
}

/// One row per distinct play timestamp, in ascending time order.
pub fn build_time(plays: &[PlayEvent]) -> Vec<TimeDim> {
    let distinct: BTreeSet<NaiveDateTime> = plays.iter().map(|p| p.start_time).collect();
    distinct.into_par_iter().map(time_row).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum LookupKey {
    Title(String),
    TitleAndArtist(String, String),
}

/// Song lookup by the configured join key. A key can map to several songs.
pub struct SongIndex {
    join_key: JoinKey,
    entries: HashMap<LookupKey, Vec<(String, String)>>,
}

impl SongIndex {
    /// Builds the index. `artists` is only consulted for
    /// [`JoinKey::TitleAndArtist`], to resolve a song's artist name.
    pub fn new(songs: &[SongDim], artists: &[ArtistDim], join_key: JoinKey) -> Self {
        let artist_names: HashMap<&str, &str> = artists
            .iter()
            .filter_map(|a| Some((a.artist_id.as_str(), a.name.as_deref()?)))
            .collect();

        let mut entries: HashMap<LookupKey, Vec<(String, String)>> = HashMap::new();
        for song in songs {
            let key = match join_key {
                JoinKey::Title => LookupKey::Title(song.title.clone()),
                JoinKey::TitleAndArtist => match artist_names.get(song.artist_id.as_str()) {
                    Some(name) => LookupKey::TitleAndArtist(song.title.clone(), name.to_string()),
                    None => continue,
                },
            };
            entries
                .entry(key)
                .or_default()
                .push((song.song_id.clone(), song.artist_id.clone()));
        }
        Self { join_key, entries }
    }

    /// `(song_id, artist_id)` pairs matching the play, possibly empty.
    pub fn lookup(&self, play: &PlayEvent) -> &[(String, String)] {
        let key = match self.join_key {
            JoinKey::Title => LookupKey::Title(play.song.clone()),
            JoinKey::TitleAndArtist => match &play.artist {
                Some(artist) => LookupKey::TitleAndArtist(play.song.clone(), artist.clone()),
                None => return &[],
            },
        };
        self.entries.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default)]
pub struct JoinedPlays {
    pub facts: Vec<PlayFact>,
    /// Plays that matched no song.
    pub misses: usize,
}

/// Resolves each play against `index`. A play matching several songs
/// yields one fact per match; an unmatched play yields a null-keyed fact
/// under [`JoinMode::Left`] and nothing under [`JoinMode::Inner`].
pub fn build_plays(plays: &[PlayEvent], index: &SongIndex, mode: JoinMode) -> JoinedPlays {
    let resolved: Vec<(Vec<PlayFact>, bool)> = plays
        .par_iter()
        .map(|play| {
            let matches = index.lookup(play);
            if matches.is_empty() {
                let facts = match mode {
                    JoinMode::Left => vec![fact(play, None)],
                    JoinMode::Inner => Vec::new(),
                };
                (facts, true)
            } else {
                let facts = matches.iter().map(|m| fact(play, Some(m))).collect();
                (facts, false)
            }
        })
        .collect();

    let mut joined = JoinedPlays::default();
    for (mut facts, missed) in resolved {
        joined.facts.append(&mut facts);
        if missed {
            joined.misses += 1;
        }
    }
    joined
}

fn fact(play: &PlayEvent, song: Option<&(String, String)>) -> PlayFact {
    PlayFact {
        event_timestamp: play.start_time,
        user_id: play.user_id.clone(),
        level: play.level.clone(),
        song_id: song.map(|(song_id, _)| song_id.clone()),
        artist_id: song.map(|(_, artist_id)| artist_id.clone()),
        session_id: play.session_id,
        location: play.location.clone(),
        user_agent: play.user_agent.clone(),
    }
}
