mod db;

use std::path::PathBuf;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};

use playa_api::traits::{EpisodeSource, PlaylistSource, SeriesLookup};
use playa_api::tvdb::TvdbClient;
use playa_api::youtube::{playlist_id_from_url, YoutubeClient};
use playa_core::actions::{self, PlayTarget};
use playa_core::catalog::{Catalog, DisplayContext, SearchResult};
use playa_core::config::AppConfig;
use playa_core::error::PlayaError;
use playa_core::models::{
    unix_now, EpisodePointer, Item, ItemPatch, ItemRecord, ItemType, MovieFile, ScanResults,
    SeriesMatch, Source,
};
use playa_core::navigation::Destination;
use playa_core::ordering::{bucket_of, Bucket};
use playa_core::persistence::{Db, WriteStatus};
use playa_core::reconcile::{Reconciler, SyncTally};
use playa_core::scanner;

pub use db::DbHandle;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("config error: {0}")]
    Config(String),
    #[error("database error: {0}")]
    Database(String),
    #[error("api error: {0}")]
    Api(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("scan error: {0}")]
    Scan(String),
}

impl From<PlayaError> for RuntimeError {
    fn from(e: PlayaError) -> Self {
        match e {
            PlayaError::NotFound(what) => Self::NotFound(what),
            PlayaError::Config(msg) => Self::Config(msg),
            other @ PlayaError::InvalidSourceResponse(_) => Self::Api(other.to_string()),
            other => Self::Database(other.to_string()),
        }
    }
}

// ── DTOs ────────────────────────────────────────────────────────

/// One line of an item listing.
#[derive(Debug, Clone, Serialize)]
pub struct ItemSummaryDto {
    pub id: i64,
    pub name: String,
    pub item_type: ItemType,
    pub source: Source,
    pub bucket: &'static str,
    pub progress: String,
    pub episode_count: usize,
    pub duration: Option<String>,
    pub last_watched_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EpisodeDto {
    pub id: i64,
    pub label: String,
    pub duration: Option<String>,
    pub released_on: Option<i64>,
    pub is_current: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemDetailDto {
    #[serde(flatten)]
    pub summary: ItemSummaryDto,
    pub url: Option<String>,
    pub pathname: Option<String>,
    pub tvdb_id: Option<i64>,
    pub is_archived: bool,
    pub order_is_reversed: bool,
    pub episodes: Vec<EpisodeDto>,
}

impl ItemSummaryDto {
    fn from_item(item: &Item) -> Self {
        let progress = match item.current_episode {
            EpisodePointer::BeforeStart => "not started".to_string(),
            EpisodePointer::Finished => "finished".to_string(),
            EpisodePointer::At(_) => item
                .current_episode()
                .map(|e| e.display_name())
                .unwrap_or_else(|| "not started".to_string()),
        };
        Self {
            id: item.id.unwrap_or_default(),
            name: item.name().to_string(),
            item_type: item.item_type,
            source: item.source,
            bucket: match bucket_of(item) {
                Bucket::Unfinished => "unfinished",
                Bucket::Finished => "finished",
                Bucket::Archived => "archived",
            },
            progress,
            episode_count: item.episode_count(),
            duration: item.duration.clone(),
            last_watched_at: item.last_watched_at,
        }
    }
}

impl ItemDetailDto {
    fn from_item(item: &Item) -> Self {
        let current = item.current_episode.episode_id();
        Self {
            summary: ItemSummaryDto::from_item(item),
            url: item.url.clone(),
            pathname: item.pathname.clone(),
            tvdb_id: item.tvdb_id,
            is_archived: item.is_archived,
            order_is_reversed: item.order_is_reversed,
            episodes: item
                .episodes()
                .filter_map(|e| {
                    let id = e.id?;
                    Some(EpisodeDto {
                        id,
                        label: e.display_name(),
                        duration: e.duration.clone(),
                        released_on: e.released_on,
                        is_current: current == Some(id),
                    })
                })
                .collect(),
        }
    }
}

/// Totals of a playlist refresh run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PlaylistRefresh {
    pub playlists_updated: usize,
    pub items_with_new_videos: usize,
    pub videos_added: usize,
    pub errors: Vec<String>,
}

impl PlaylistRefresh {
    /// One-line summary; empty when nothing was refreshed.
    pub fn summary(&self) -> String {
        if self.playlists_updated == 0 {
            return String::new();
        }
        format!(
            "{} updated from YouTube — {} with new videos — {} added",
            plural(self.playlists_updated, "playlist"),
            plural(self.items_with_new_videos, "item"),
            plural(self.videos_added, "total video"),
        )
    }
}

fn plural(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("{n} {noun}")
    } else {
        format!("{n} {noun}s")
    }
}

// ── Runtime ─────────────────────────────────────────────────────

pub struct Runtime {
    db: Db<DbHandle>,
    config: Arc<RwLock<AppConfig>>,
    catalog: Mutex<Catalog>,
}

impl Runtime {
    pub fn new() -> Result<Self, RuntimeError> {
        let config = AppConfig::load().map_err(|e| RuntimeError::Config(e.to_string()))?;
        let db_path =
            AppConfig::ensure_db_path().map_err(|e| RuntimeError::Config(e.to_string()))?;
        let db = DbHandle::open(&db_path)
            .ok_or_else(|| RuntimeError::Database("failed to open database".into()))?;
        Ok(Self::with_parts(config, Db::connected(db)))
    }

    /// Build a runtime over an explicit config and database, with an empty
    /// catalog until `load_catalog` runs.
    pub fn with_parts(config: AppConfig, db: Db<DbHandle>) -> Self {
        let show_finished = config.library.show_finished_items;
        Self {
            db,
            config: Arc::new(RwLock::new(config)),
            catalog: Mutex::new(Catalog::new(show_finished)),
        }
    }

    /// Replace the in-memory catalog with what the database holds.
    pub async fn load_catalog(&self) -> Result<usize, RuntimeError> {
        let show_finished = self.config.read().await.library.show_finished_items;
        let loaded = actions::load_catalog(&self.db, show_finished).await?;
        let count = loaded.len();
        *self.catalog.lock().await = loaded;
        Ok(count)
    }

    pub async fn get_config(&self) -> AppConfig {
        self.config.read().await.clone()
    }

    pub async fn update_config(&self, new_config: AppConfig) -> Result<(), RuntimeError> {
        new_config
            .save()
            .map_err(|e| RuntimeError::Config(e.to_string()))?;
        self.catalog
            .lock()
            .await
            .set_show_finished_items(new_config.library.show_finished_items);
        *self.config.write().await = new_config;
        Ok(())
    }

    // ── Browsing ────────────────────────────────────────────────

    pub async fn list(&self, context: DisplayContext) -> Vec<ItemSummaryDto> {
        let catalog = self.catalog.lock().await;
        catalog
            .list(context)
            .into_iter()
            .filter_map(|id| catalog.find_item(id))
            .map(ItemSummaryDto::from_item)
            .collect()
    }

    pub async fn item_detail(&self, item_id: i64) -> Result<ItemDetailDto, RuntimeError> {
        let catalog = self.catalog.lock().await;
        Ok(ItemDetailDto::from_item(catalog.item(item_id)?))
    }

    pub async fn search(&self, query: &str) -> Vec<SearchResult> {
        self.catalog.lock().await.search(query)
    }

    // ── Library scans ───────────────────────────────────────────

    /// Scan the TV directory and reconcile local shows against it.
    pub async fn scan_shows(&self) -> Result<SyncTally, RuntimeError> {
        let tv_dir = self
            .library_dir(|c| c.library.tv_dir().map(PathBuf::from), "tv_dir")
            .await?;
        let scan = tokio::task::spawn_blocking(move || scanner::scan_tv_dir(&tv_dir))
            .await
            .map_err(|e| RuntimeError::Scan(e.to_string()))?
            .map_err(|e| RuntimeError::Scan(e.to_string()))?;
        self.reconcile_shows(scan).await
    }

    /// Reconcile local shows against scan results produced elsewhere.
    pub async fn reconcile_shows(&self, scan: ScanResults) -> Result<SyncTally, RuntimeError> {
        let unarchive = self.config.read().await.library.unarchive_on_new_episodes;
        let mut catalog = self.catalog.lock().await;
        let tally = Reconciler::new(&mut catalog, &self.db)
            .unarchive_on_new_episodes(unarchive)
            .local_shows(scan)
            .await?;
        Ok(tally)
    }

    /// Scan the movie directory and reconcile local movies against it.
    pub async fn scan_movies(&self) -> Result<SyncTally, RuntimeError> {
        let movie_dir = self
            .library_dir(|c| c.library.movie_dir().map(PathBuf::from), "movie_dir")
            .await?;
        let files = tokio::task::spawn_blocking(move || scanner::scan_movie_dir(&movie_dir))
            .await
            .map_err(|e| RuntimeError::Scan(e.to_string()))?
            .map_err(|e| RuntimeError::Scan(e.to_string()))?;
        self.reconcile_movies(files).await
    }

    pub async fn reconcile_movies(&self, files: Vec<MovieFile>) -> Result<SyncTally, RuntimeError> {
        let mut catalog = self.catalog.lock().await;
        let tally = Reconciler::new(&mut catalog, &self.db)
            .local_movies(files)
            .await?;
        Ok(tally)
    }

    /// Scan whichever library directories are configured.
    pub async fn scan_library(&self) -> Result<SyncTally, RuntimeError> {
        let config = self.get_config().await;
        if config.library.tv_dir().is_none() && config.library.movie_dir().is_none() {
            return Err(RuntimeError::Config(
                "neither tv_dir nor movie_dir is configured".into(),
            ));
        }
        let mut tally = SyncTally::default();
        if config.library.tv_dir().is_some() {
            tally.merge(self.scan_shows().await?);
        }
        if config.library.movie_dir().is_some() {
            tally.merge(self.scan_movies().await?);
        }
        Ok(tally)
    }

    async fn library_dir(
        &self,
        pick: impl FnOnce(&AppConfig) -> Option<PathBuf>,
        name: &str,
    ) -> Result<PathBuf, RuntimeError> {
        pick(&*self.config.read().await)
            .ok_or_else(|| RuntimeError::Config(format!("library.{name} is not configured")))
    }

    // ── Remote sources ──────────────────────────────────────────

    /// Refresh an item's episodes from TVDB.
    pub async fn sync_tvdb(&self, item_id: i64) -> Result<SyncTally, RuntimeError> {
        let client = self.tvdb_client().await?;
        self.sync_episodes_from(&client, item_id).await
    }

    /// TVDB candidates for an item, searched by `query` or the item's name.
    pub async fn search_tvdb(
        &self,
        item_id: i64,
        query: Option<&str>,
    ) -> Result<Vec<SeriesMatch>, RuntimeError> {
        let client = self.tvdb_client().await?;
        self.search_series_from(&client, item_id, query).await
    }

    pub async fn search_series_from<S: SeriesLookup>(
        &self,
        source: &S,
        item_id: i64,
        query: Option<&str>,
    ) -> Result<Vec<SeriesMatch>, RuntimeError> {
        let (query, item_type) = {
            let catalog = self.catalog.lock().await;
            let item = catalog.item(item_id)?;
            let query = query.map_or_else(|| item.name().to_string(), str::to_string);
            (query, item.item_type)
        };
        source
            .search(&query, item_type)
            .await
            .map_err(|e| RuntimeError::Api(e.to_string()))
    }

    /// Point an item at a TVDB record.
    pub async fn link_tvdb(&self, item_id: i64, found: &SeriesMatch) -> Result<(), RuntimeError> {
        let patch = ItemPatch {
            tvdb_id: Some(Some(found.tvdb_id)),
            tvdb_slug: Some(found.slug.clone()),
            ..Default::default()
        };
        self.update_item(item_id, patch).await?;
        tracing::info!(item_id, tvdb_id = found.tvdb_id, "Linked item to TVDB");
        Ok(())
    }

    /// Fill a movie's duration from its TVDB runtime.
    pub async fn fill_movie_runtime(&self, item_id: i64) -> Result<Option<String>, RuntimeError> {
        let client = self.tvdb_client().await?;
        self.fill_movie_runtime_from(&client, item_id).await
    }

    /// Returns the runtime found, which is written only when it differs.
    pub async fn fill_movie_runtime_from<S: SeriesLookup>(
        &self,
        source: &S,
        item_id: i64,
    ) -> Result<Option<String>, RuntimeError> {
        let movie_id = {
            let catalog = self.catalog.lock().await;
            let item = catalog.item(item_id)?;
            if item.item_type != ItemType::Movie {
                return Err(RuntimeError::Config(format!("{} is not a movie", item.name())));
            }
            item.tvdb_id
                .ok_or_else(|| RuntimeError::Config(format!("{} has no TVDB id", item.name())))?
        };

        let runtime = source
            .movie_runtime(movie_id)
            .await
            .map_err(|e| RuntimeError::Api(e.to_string()))?;
        let Some(duration) = runtime else {
            return Ok(None);
        };

        let mut catalog = self.catalog.lock().await;
        if catalog.item(item_id)?.duration.as_deref() != Some(duration.as_str()) {
            let patch = ItemPatch {
                duration: Some(Some(duration.clone())),
                ..Default::default()
            };
            written(actions::update_item(&mut catalog, &self.db, item_id, patch).await?)?;
        }
        Ok(Some(duration))
    }

    async fn tvdb_client(&self) -> Result<TvdbClient, RuntimeError> {
        let tvdb = self.get_config().await.services.tvdb;
        if !tvdb.is_configured() {
            return Err(RuntimeError::Config(
                "services.tvdb.api_key is not configured".into(),
            ));
        }
        Ok(TvdbClient::new(tvdb.api_key, Some(tvdb.pin)))
    }

    /// Refresh an item's episodes from any episode source.
    pub async fn sync_episodes_from<S: EpisodeSource>(
        &self,
        source: &S,
        item_id: i64,
    ) -> Result<SyncTally, RuntimeError> {
        let (series_id, include_unaired) = {
            let catalog = self.catalog.lock().await;
            let item = catalog.item(item_id)?;
            let series_id = item
                .tvdb_id
                .ok_or_else(|| RuntimeError::Config(format!("{} has no TVDB id", item.name())))?;
            (series_id, item.source == Source::Local)
        };

        let episodes = source
            .series_episodes(series_id, include_unaired)
            .await
            .map_err(|e| RuntimeError::Api(e.to_string()))?;

        let mut catalog = self.catalog.lock().await;
        let tally = Reconciler::new(&mut catalog, &self.db)
            .external_episodes(item_id, episodes)
            .await?;
        Ok(tally)
    }

    /// Refresh one playlist item from YouTube.
    pub async fn update_playlist(&self, item_id: i64) -> Result<SyncTally, RuntimeError> {
        let client = self.youtube_client().await?;
        self.update_playlist_from(&client, item_id).await
    }

    /// Refresh a playlist item from any playlist source.
    pub async fn update_playlist_from<S: PlaylistSource>(
        &self,
        source: &S,
        item_id: i64,
    ) -> Result<SyncTally, RuntimeError> {
        let playlist_id = {
            let catalog = self.catalog.lock().await;
            let item = catalog.item(item_id)?;
            if item.source != Source::YtPlaylist {
                return Err(RuntimeError::Config(format!(
                    "{} is not a YouTube playlist",
                    item.name()
                )));
            }
            let url = item.url.as_deref().unwrap_or_default();
            playlist_id_from_url(url).map_err(|e| RuntimeError::Config(e.to_string()))?
        };

        let videos = source
            .playlist_videos(&playlist_id)
            .await
            .map_err(|e| RuntimeError::Api(e.to_string()))?;

        let mut catalog = self.catalog.lock().await;
        let tally = Reconciler::new(&mut catalog, &self.db)
            .playlist_videos(item_id, videos)
            .await?;
        Ok(tally)
    }

    /// Refresh every playlist item that is due (or all of them when forced).
    pub async fn update_all_playlists(&self, forced: bool) -> Result<PlaylistRefresh, RuntimeError> {
        let client = self.youtube_client().await?;
        self.update_all_playlists_from(&client, forced).await
    }

    pub async fn update_all_playlists_from<S: PlaylistSource>(
        &self,
        source: &S,
        forced: bool,
    ) -> Result<PlaylistRefresh, RuntimeError> {
        let interval = self.config.read().await.services.youtube.refresh_interval_secs();
        let now = unix_now();
        let due: Vec<i64> = {
            let catalog = self.catalog.lock().await;
            catalog
                .items()
                .filter(|i| i.source == Source::YtPlaylist)
                .filter(|i| i.needs_source_update(now, interval, forced))
                .filter_map(|i| i.id)
                .collect()
        };

        let mut refresh = PlaylistRefresh::default();
        for item_id in due {
            match self.update_playlist_from(source, item_id).await {
                Ok(tally) => {
                    refresh.playlists_updated += 1;
                    if tally.new_episodes > 0 {
                        refresh.items_with_new_videos += 1;
                    }
                    refresh.videos_added += tally.new_episodes;
                    refresh.errors.extend(tally.errors);
                }
                Err(e) => {
                    tracing::warn!(item_id, error = %e, "Playlist refresh failed");
                    refresh.errors.push(format!("item {item_id}: {e}"));
                }
            }
        }

        tracing::info!(
            playlists = refresh.playlists_updated,
            added = refresh.videos_added,
            "Playlist refresh finished"
        );
        Ok(refresh)
    }

    async fn youtube_client(&self) -> Result<YoutubeClient, RuntimeError> {
        let youtube = self.get_config().await.services.youtube;
        if !youtube.is_configured() {
            return Err(RuntimeError::Config(
                "services.youtube.api_key is not configured".into(),
            ));
        }
        Ok(YoutubeClient::new(youtube.api_key))
    }

    // ── Item actions ────────────────────────────────────────────

    pub async fn add_item(&self, record: ItemRecord) -> Result<i64, RuntimeError> {
        let mut catalog = self.catalog.lock().await;
        Ok(actions::add_item(&mut catalog, &self.db, record).await?)
    }

    pub async fn update_item(&self, item_id: i64, patch: ItemPatch) -> Result<(), RuntimeError> {
        let mut catalog = self.catalog.lock().await;
        let status = actions::update_item(&mut catalog, &self.db, item_id, patch).await?;
        written(status)
    }

    pub async fn set_archived(&self, item_id: i64, archived: bool) -> Result<(), RuntimeError> {
        let mut catalog = self.catalog.lock().await;
        let status = actions::set_archived(&mut catalog, &self.db, item_id, archived).await?;
        written(status)
    }

    /// Move an item's episode pointer and return the new position.
    pub async fn nav(
        &self,
        item_id: i64,
        destination: Destination,
    ) -> Result<ItemSummaryDto, RuntimeError> {
        let mut rng = StdRng::from_entropy();
        let mut catalog = self.catalog.lock().await;
        actions::episode_nav(&mut catalog, &self.db, item_id, destination, &mut rng).await?;
        Ok(ItemSummaryDto::from_item(catalog.item(item_id)?))
    }

    /// Resolve what to open for an item and mark it watched now.
    pub async fn play(&self, item_id: i64) -> Result<PlayTarget, RuntimeError> {
        let mut catalog = self.catalog.lock().await;
        Ok(actions::play(&mut catalog, &self.db, item_id).await?)
    }

    pub async fn delete_item(&self, item_id: i64) -> Result<(), RuntimeError> {
        let mut catalog = self.catalog.lock().await;
        let status = actions::delete_item(&mut catalog, &self.db, item_id).await?;
        written(status)
    }

    pub async fn delete_episode(&self, item_id: i64, episode_id: i64) -> Result<(), RuntimeError> {
        let mut catalog = self.catalog.lock().await;
        let status = actions::delete_episode(&mut catalog, &self.db, item_id, episode_id).await?;
        written(status)
    }
}

fn written(status: WriteStatus) -> Result<(), RuntimeError> {
    match status {
        WriteStatus::Written => Ok(()),
        WriteStatus::NotConnected => Err(RuntimeError::Database("no database connection".into())),
    }
}
