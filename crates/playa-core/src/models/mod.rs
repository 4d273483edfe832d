mod episode;
mod incoming;
mod item;
mod record;

pub use episode::{Episode, EpisodePatch};
pub use incoming::{
    movie_files_from_json, EpisodeFile, MovieFile, PlaylistVideo, RemoteEpisode, ScanResults,
    SeriesMatch,
};
pub use item::{EpisodePointer, Item, ItemPatch, ItemRecord, ItemType, Source};
pub use record::{Record, Row, Table, Value};

/// Current time as unix seconds.
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}
