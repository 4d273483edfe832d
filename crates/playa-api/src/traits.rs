//! Trait definitions for remote episode sources.
//!
//! The runtime only talks to these traits, so a sync pass can be driven by
//! a stub source in tests.

use std::future::Future;

use playa_core::models::{ItemType, PlaylistVideo, RemoteEpisode, SeriesMatch};

/// A service that lists the episodes of a series.
pub trait EpisodeSource: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Episodes of a series in the service's default order.
    ///
    /// Unaired episodes are dropped unless `include_unaired` is set.
    fn series_episodes(
        &self,
        series_id: i64,
        include_unaired: bool,
    ) -> impl Future<Output = Result<Vec<RemoteEpisode>, Self::Error>> + Send;
}

/// A service that lists the videos of a playlist.
pub trait PlaylistSource: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn playlist_videos(
        &self,
        playlist_id: &str,
    ) -> impl Future<Output = Result<Vec<PlaylistVideo>, Self::Error>> + Send;
}

/// A service that finds series and movies by name and knows movie runtimes.
pub trait SeriesLookup: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Candidates for `query`, best match first.
    fn search(
        &self,
        query: &str,
        item_type: ItemType,
    ) -> impl Future<Output = Result<Vec<SeriesMatch>, Self::Error>> + Send;

    /// A movie's runtime as a duration string, if the service knows it.
    fn movie_runtime(
        &self,
        movie_id: i64,
    ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send;
}
