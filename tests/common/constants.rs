//! Shared constants for end-to-end tests
//!
//! When test data changes (ids, titles, timestamps), update only this file.

// ============================================================================
// Catalog
// ============================================================================

/// "Test Song" by "The Test Band", released in 2000
pub const SONG_1_ID: &str = "S1";
pub const SONG_1_TITLE: &str = "Test Song";

/// "Blue Room" by "Jazz Ensemble", unknown year
pub const SONG_2_ID: &str = "S2";
pub const SONG_2_TITLE: &str = "Blue Room";

/// Another "Test Song", by "Jazz Ensemble"
pub const SONG_3_ID: &str = "S3";

pub const ARTIST_1_ID: &str = "A1";
pub const ARTIST_1_NAME: &str = "The Test Band";

pub const ARTIST_2_ID: &str = "A2";
pub const ARTIST_2_NAME: &str = "Jazz Ensemble";

// ============================================================================
// Event log
// ============================================================================

pub const USER_1_ID: &str = "U1";
pub const USER_2_ID: &str = "U2";

/// 2000-01-01 00:00:00 UTC, a Saturday
pub const PLAY_1_TS: i64 = 946_684_800_000;

/// 2000-02-15 12:30:00.250 UTC, a Tuesday
pub const PLAY_2_TS: i64 = 950_617_800_250;

pub const PLAY_PAGE: &str = "NextSong";
