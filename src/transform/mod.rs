pub mod catalog;
mod dedup;
pub mod events;
pub mod time;

pub use catalog::{transform_catalog, CatalogTables};
pub use dedup::DedupPolicy;
pub use events::{
    build_plays, build_time, build_users, filter_plays, EventError, JoinKey, JoinMode,
    JoinedPlays, PlayEvent, SongIndex,
};
