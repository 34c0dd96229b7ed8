//! Song and artist dimensions from the metadata corpus.

use super::DedupPolicy;
use crate::records::MetadataRecord;
use crate::warehouse::models::{ArtistDim, SongDim};
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct CatalogTables {
    pub songs: Vec<SongDim>,
    pub artists: Vec<ArtistDim>,
}

/// Projects every metadata record into one song row and one artist row,
/// then collapses duplicate keys per table.
///
/// Records are expected to have passed [`MetadataRecord::validate`]; any
/// that did not are dropped here.
pub fn transform_catalog(
    records: &[MetadataRecord],
    song_dedup: DedupPolicy,
    artist_dedup: DedupPolicy,
) -> CatalogTables {
    let songs: Vec<SongDim> = records.iter().filter_map(project_song).collect();
    let artists: Vec<ArtistDim> = records.iter().filter_map(project_artist).collect();

    let projected = (songs.len(), artists.len());
    let songs = song_dedup.apply(songs, |s| s.song_id.clone());
    let artists = artist_dedup.apply(artists, |a| a.artist_id.clone());
    debug!(
        "Catalog dedup: songs {} -> {}, artists {} -> {}",
        projected.0,
        songs.len(),
        projected.1,
        artists.len()
    );

    CatalogTables { songs, artists }
}

fn project_song(record: &MetadataRecord) -> Option<SongDim> {
    Some(SongDim {
        song_id: record.song_id.clone()?,
        title: record.title.clone()?,
        artist_id: record.artist_id.clone()?,
        year: record.year?,
        duration: record.duration?,
    })
}

fn project_artist(record: &MetadataRecord) -> Option<ArtistDim> {
    Some(ArtistDim {
        artist_id: record.artist_id.clone()?,
        name: record.artist_name.clone(),
        location: record.artist_location.clone(),
        latitude: record.artist_latitude,
        longitude: record.artist_longitude,
    })
}
