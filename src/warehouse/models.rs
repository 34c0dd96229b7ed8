//! Rows of the star schema.

use chrono::NaiveDateTime;

// ============================================================================
// Dimensions
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct SongDim {
    pub song_id: String,
    pub title: String,
    pub artist_id: String,
    /// 0 when unknown.
    pub year: i32,
    /// Seconds.
    pub duration: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArtistDim {
    pub artist_id: String,
    pub name: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// A user as seen on one play event. `level` is the subscription level at
/// that point in time, level history is not tracked.
#[derive(Debug, Clone, PartialEq)]
pub struct UserDim {
    pub user_id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub level: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TimeDim {
    /// Timezone-naive UTC timestamp.
    pub start_time: NaiveDateTime,
    pub hour: i32,
    pub day: i32,
    /// ISO 8601 week number.
    pub week_of_year: i32,
    pub month: i32,
    pub year: i32,
    /// 1 = Sunday ... 7 = Saturday
    pub weekday: i32,
}

// ============================================================================
// Facts
// ============================================================================

/// One play event. `song_id` and `artist_id` are `None` when the event
/// could not be matched to a song.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayFact {
    pub event_timestamp: NaiveDateTime,
    pub user_id: String,
    pub level: String,
    pub song_id: Option<String>,
    pub artist_id: Option<String>,
    pub session_id: i64,
    pub location: Option<String>,
    pub user_agent: Option<String>,
}
