//! JSON lines of the test corpus.

use super::constants::*;
use serde_json::json;

/// Metadata line for one of the known songs.
pub fn song_json(song_id: &str) -> String {
    let (title, artist_id, artist_name, year, duration) = match song_id {
        SONG_1_ID => (SONG_1_TITLE, ARTIST_1_ID, ARTIST_1_NAME, 2000, 180.0),
        SONG_2_ID => (SONG_2_TITLE, ARTIST_2_ID, ARTIST_2_NAME, 0, 200.5),
        SONG_3_ID => (SONG_1_TITLE, ARTIST_2_ID, ARTIST_2_NAME, 1999, 241.1),
        other => panic!("unknown test song {other}"),
    };
    metadata_json(song_id, title, artist_id, artist_name, year, duration)
}

pub fn metadata_json(
    song_id: &str,
    title: &str,
    artist_id: &str,
    artist_name: &str,
    year: i32,
    duration: f64,
) -> String {
    json!({
        "num_songs": 1,
        "artist_id": artist_id,
        "artist_latitude": null,
        "artist_longitude": null,
        "artist_location": "",
        "artist_name": artist_name,
        "song_id": song_id,
        "title": title,
        "duration": duration,
        "year": year,
    })
    .to_string()
}

/// USER_1 plays "Test Song" by "The Test Band" at PLAY_1_TS.
pub fn play_json() -> String {
    event_json(
        PLAY_PAGE,
        USER_1_ID,
        "free",
        PLAY_1_TS,
        Some(SONG_1_TITLE),
        Some(ARTIST_1_NAME),
    )
}

pub fn event_json(
    page: &str,
    user_id: &str,
    level: &str,
    ts: i64,
    song: Option<&str>,
    artist: Option<&str>,
) -> String {
    json!({
        "artist": artist,
        "auth": "Logged In",
        "firstName": "Kaylee",
        "gender": "F",
        "itemInSession": 0,
        "lastName": "Summers",
        "length": song.map(|_| 180.0),
        "level": level,
        "location": "Phoenix-Mesa-Scottsdale, AZ",
        "method": "PUT",
        "page": page,
        "registration": 1_540_344_794_796_i64,
        "sessionId": 139,
        "song": song,
        "status": 200,
        "ts": ts,
        "userAgent": "Mozilla/5.0",
        "userId": user_id,
    })
    .to_string()
}
