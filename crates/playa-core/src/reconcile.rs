//! Reconciliation of the catalog against filesystem scans and remote
//! listings.
//!
//! Every pass matches incoming records by natural key, writes only the
//! fields that differ, creates what is new and prunes what disappeared.
//! Writes are awaited one at a time; a failed write is recorded in the
//! tally and the pass moves on.

use std::collections::{BTreeSet, HashSet};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::error::PlayaError;
use crate::matcher::{find_episode, find_item, EpisodeKey, ItemKey};
use crate::models::{
    unix_now, Episode, EpisodeFile, EpisodePatch, Item, ItemRecord, ItemType, MovieFile,
    PlaylistVideo, RemoteEpisode, ScanResults, Source,
};
use crate::ordering;
use crate::persistence::{Db, Persistence};

/// Counters for one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncTally {
    pub new_item_ids: BTreeSet<i64>,
    pub item_ids_with_new_episodes: BTreeSet<i64>,
    pub new_episodes: usize,
    pub updated_items: usize,
    pub updated_episodes: usize,
    pub deleted_items: usize,
    pub deleted_episodes: usize,
    /// Incoming records without a usable natural key.
    pub skipped: usize,
    /// Messages of writes that failed during the pass.
    pub errors: Vec<String>,
}

impl SyncTally {
    pub fn has_changes(&self) -> bool {
        !self.new_item_ids.is_empty()
            || self.new_episodes > 0
            || self.updated_items > 0
            || self.updated_episodes > 0
            || self.deleted_items > 0
            || self.deleted_episodes > 0
    }

    /// The one-line summary shown after a scan.
    pub fn summary(&self) -> String {
        format!(
            "Scan complete. New items: {} — Items with new episodes: {} — New episodes: {} — \
             Updated episodes: {} — Deleted items: {} — Deleted episodes: {}",
            self.new_item_ids.len(),
            self.item_ids_with_new_episodes.len(),
            self.new_episodes,
            self.updated_episodes,
            self.deleted_items,
            self.deleted_episodes,
        )
    }

    /// Fold another pass's counters into this one.
    pub fn merge(&mut self, other: SyncTally) {
        self.new_item_ids.extend(other.new_item_ids);
        self.item_ids_with_new_episodes
            .extend(other.item_ids_with_new_episodes);
        self.new_episodes += other.new_episodes;
        self.updated_items += other.updated_items;
        self.updated_episodes += other.updated_episodes;
        self.deleted_items += other.deleted_items;
        self.deleted_episodes += other.deleted_episodes;
        self.skipped += other.skipped;
        self.errors.extend(other.errors);
    }
}

/// Runs reconciliation passes over a catalog.
pub struct Reconciler<'a, P> {
    catalog: &'a mut Catalog,
    db: &'a Db<P>,
    unarchive_on_new_episodes: bool,
    tally: SyncTally,
}

impl<'a, P: Persistence> Reconciler<'a, P> {
    pub fn new(catalog: &'a mut Catalog, db: &'a Db<P>) -> Self {
        Self {
            catalog,
            db,
            unarchive_on_new_episodes: true,
            tally: SyncTally::default(),
        }
    }

    /// Whether an archived local item gaining episodes is un-archived.
    pub fn unarchive_on_new_episodes(mut self, enabled: bool) -> Self {
        self.unarchive_on_new_episodes = enabled;
        self
    }

    // ── Passes ──────────────────────────────────────────────────

    /// Reconcile local shows and their episode files against a TV scan.
    #[tracing::instrument(skip_all, fields(shows = scan.show_dir_names.len(), files = scan.episode_files.len()))]
    pub async fn local_shows(&mut self, scan: ScanResults) -> Result<SyncTally, PlayaError> {
        self.tally = SyncTally::default();
        if !self.db.is_connected() {
            return Ok(SyncTally::default());
        }

        let mut dir_names: Vec<String> = Vec::new();
        for name in scan
            .show_dir_names
            .iter()
            .chain(scan.episode_files.iter().map(|f| &f.show_dir_name))
        {
            if !dir_names.contains(name) {
                dir_names.push(name.clone());
            }
        }

        let existing: Vec<i64> = self.ids_of(ItemType::Show, Source::Local);
        for id in &existing {
            if let Some(item) = self.catalog.find_item_mut(*id) {
                item.clear_new_episodes();
            }
        }

        let mut seen_items: HashSet<i64> = HashSet::new();
        for dir_name in &dir_names {
            let key = ItemKey::LocalShow {
                dir_name: dir_name.clone(),
            };
            let item_id = match find_item(self.catalog, &key)? {
                Some(id) => id,
                None => {
                    let item = Item::from_record(ItemRecord::local_show(dir_name));
                    match self.create_item(item).await {
                        Some(id) => id,
                        None => continue,
                    }
                }
            };
            seen_items.insert(item_id);

            let mut seen_keys: HashSet<EpisodeKey> = HashSet::new();
            for file in scan
                .episode_files
                .iter()
                .filter(|f| &f.show_dir_name == dir_name)
            {
                let key = EpisodeKey::Pathname(file.pathname.clone());
                self.local_episode(item_id, &key, file).await?;
                seen_keys.insert(key);
            }
            self.prune_episodes(item_id, Source::Local, &seen_keys).await;
        }

        self.prune_items(&existing, &seen_items).await;
        self.unarchive_items().await;
        self.finish(&seen_items).await;

        info!(
            new_items = self.tally.new_item_ids.len(),
            new_episodes = self.tally.new_episodes,
            updated_episodes = self.tally.updated_episodes,
            deleted_items = self.tally.deleted_items,
            deleted_episodes = self.tally.deleted_episodes,
            "local shows reconciled"
        );
        Ok(std::mem::take(&mut self.tally))
    }

    /// Reconcile local movies against a movie scan.
    #[tracing::instrument(skip_all, fields(files = files.len()))]
    pub async fn local_movies(&mut self, files: Vec<MovieFile>) -> Result<SyncTally, PlayaError> {
        self.tally = SyncTally::default();
        if !self.db.is_connected() {
            return Ok(SyncTally::default());
        }

        let existing = self.ids_of(ItemType::Movie, Source::Local);
        let mut seen_items: HashSet<i64> = HashSet::new();

        for file in &files {
            let key = ItemKey::LocalMovie {
                pathname: file.pathname.clone(),
            };
            match find_item(self.catalog, &key)? {
                Some(id) => {
                    seen_items.insert(id);
                    let item = self.catalog.item(id)?;
                    let patch = item.diff_movie(file);
                    if patch.is_empty() {
                        continue;
                    }
                    let mut updated = item.clone();
                    updated.apply(patch);
                    match self.db.save_item(&mut updated).await {
                        Ok(_) => {
                            debug!(item_id = id, "movie updated");
                            self.catalog.add_item(updated)?;
                            self.tally.updated_items += 1;
                        }
                        Err(e) => self.record_error(&key, e),
                    }
                }
                None => {
                    let item = Item::from_record(ItemRecord::local_movie(file));
                    if let Some(id) = self.create_item(item).await {
                        seen_items.insert(id);
                    }
                }
            }
        }

        self.prune_items(&existing, &seen_items).await;
        self.catalog.sort_items();

        info!(
            new_items = self.tally.new_item_ids.len(),
            updated_items = self.tally.updated_items,
            deleted_items = self.tally.deleted_items,
            "local movies reconciled"
        );
        Ok(std::mem::take(&mut self.tally))
    }

    /// Reconcile an item's episodes against a TVDB listing.
    ///
    /// For a local item the listing only enriches episodes already found
    /// on disk: nothing is created or pruned.
    #[tracing::instrument(skip(self, episodes), fields(episodes = episodes.len()))]
    pub async fn external_episodes(
        &mut self,
        item_id: i64,
        episodes: Vec<RemoteEpisode>,
    ) -> Result<SyncTally, PlayaError> {
        self.tally = SyncTally::default();
        if !self.db.is_connected() {
            return Ok(SyncTally::default());
        }
        if episodes.is_empty() {
            return Err(PlayaError::InvalidSourceResponse(format!(
                "no episodes returned for item {item_id}"
            )));
        }
        let source = self.catalog.item(item_id)?.source;
        if source == Source::YtPlaylist {
            return Err(PlayaError::InvalidSourceResponse(format!(
                "item {item_id} is a playlist, not a TVDB series"
            )));
        }
        let enrich_only = source == Source::Local;
        self.catalog.item_mut(item_id)?.clear_new_episodes();

        let mut seen_keys: HashSet<EpisodeKey> = HashSet::new();
        for remote in &episodes {
            let (Some(season), Some(number)) = (remote.season_num, remote.episode_num) else {
                self.tally.skipped += 1;
                continue;
            };
            let key = EpisodeKey::SeasonEpisode(season, number);
            match find_episode(self.catalog.item(item_id)?, &key)? {
                Some(episode_id) => {
                    let episode = self.episode(item_id, episode_id)?;
                    let mut patch = episode.diff_remote(remote);
                    if enrich_only {
                        // Local rows carry no finale columns.
                        patch.is_season_finale = None;
                        patch.is_series_finale = None;
                    }
                    self.update_episode(item_id, source, episode_id, patch, &key)
                        .await;
                }
                None if enrich_only => {}
                None => {
                    self.create_episode(source, Episode::from_remote(item_id, remote), &key)
                        .await;
                }
            }
            seen_keys.insert(key);
        }

        if !enrich_only {
            self.prune_episodes(item_id, source, &seen_keys).await;
        }
        self.stamp_source_update(item_id).await;
        self.finish(&HashSet::from([item_id])).await;

        info!(
            item_id,
            new_episodes = self.tally.new_episodes,
            updated_episodes = self.tally.updated_episodes,
            deleted_episodes = self.tally.deleted_episodes,
            skipped = self.tally.skipped,
            "external episodes reconciled"
        );
        Ok(std::mem::take(&mut self.tally))
    }

    /// Reconcile a playlist item's episodes against its video listing.
    #[tracing::instrument(skip(self, videos), fields(videos = videos.len()))]
    pub async fn playlist_videos(
        &mut self,
        item_id: i64,
        videos: Vec<PlaylistVideo>,
    ) -> Result<SyncTally, PlayaError> {
        self.tally = SyncTally::default();
        if !self.db.is_connected() {
            return Ok(SyncTally::default());
        }
        if videos.is_empty() {
            return Err(PlayaError::InvalidSourceResponse(format!(
                "no videos returned for item {item_id}"
            )));
        }
        let source = self.catalog.item(item_id)?.source;
        if source != Source::YtPlaylist {
            return Err(PlayaError::InvalidSourceResponse(format!(
                "item {item_id} is not a playlist"
            )));
        }
        self.catalog.item_mut(item_id)?.clear_new_episodes();

        let mut seen_keys: HashSet<EpisodeKey> = HashSet::new();
        for video in &videos {
            let key = EpisodeKey::Url(video.url.clone());
            match find_episode(self.catalog.item(item_id)?, &key)? {
                Some(episode_id) => {
                    let patch = self.episode(item_id, episode_id)?.diff_video(video);
                    self.update_episode(item_id, source, episode_id, patch, &key)
                        .await;
                }
                None => {
                    self.create_episode(source, Episode::from_video(item_id, video), &key)
                        .await;
                }
            }
            seen_keys.insert(key);
        }

        self.prune_episodes(item_id, source, &seen_keys).await;
        self.stamp_source_update(item_id).await;
        self.finish(&HashSet::from([item_id])).await;

        info!(
            item_id,
            new_episodes = self.tally.new_episodes,
            updated_episodes = self.tally.updated_episodes,
            deleted_episodes = self.tally.deleted_episodes,
            "playlist videos reconciled"
        );
        Ok(std::mem::take(&mut self.tally))
    }

    // ── Steps ───────────────────────────────────────────────────

    fn ids_of(&self, item_type: ItemType, source: Source) -> Vec<i64> {
        self.catalog
            .items_by(item_type, source)
            .into_iter()
            .filter_map(|i| i.id)
            .collect()
    }

    fn episode(&self, item_id: i64, episode_id: i64) -> Result<&Episode, PlayaError> {
        self.catalog
            .item(item_id)?
            .episode(episode_id)
            .ok_or_else(|| PlayaError::NotFound(format!("episode {episode_id}")))
    }

    async fn local_episode(
        &mut self,
        item_id: i64,
        key: &EpisodeKey,
        file: &EpisodeFile,
    ) -> Result<(), PlayaError> {
        match find_episode(self.catalog.item(item_id)?, key)? {
            Some(episode_id) => {
                let patch = self.episode(item_id, episode_id)?.diff_file(file);
                self.update_episode(item_id, Source::Local, episode_id, patch, key)
                    .await;
            }
            None => {
                self.create_episode(Source::Local, Episode::from_file(item_id, file), key)
                    .await;
            }
        }
        Ok(())
    }

    /// Insert a new item and add it to the catalog.
    async fn create_item(&mut self, mut item: Item) -> Option<i64> {
        let context = ItemKey::of(&item).map_or_else(|| "new item".to_string(), |k| k.to_string());
        if let Err(e) = self.db.save_item(&mut item).await {
            self.record_error(&context, e);
            return None;
        }
        match self.catalog.add_item(item) {
            Ok(id) => {
                debug!(item_id = id, "item created");
                self.tally.new_item_ids.insert(id);
                Some(id)
            }
            Err(e) => {
                self.record_error(&context, e);
                None
            }
        }
    }

    async fn create_episode(&mut self, source: Source, mut episode: Episode, key: &EpisodeKey) {
        let item_id = episode.item_id;
        if let Err(e) = self.db.save_episode(source, &mut episode).await {
            self.record_error(key, e);
            return;
        }
        let Some(episode_id) = episode.id else {
            return;
        };
        if let Err(e) = self.catalog.add_episode(episode) {
            self.record_error(key, e);
            return;
        }
        if let Some(item) = self.catalog.find_item_mut(item_id) {
            item.mark_new_episode(episode_id);
        }
        debug!(item_id, episode_id, %key, "episode created");
        self.tally.new_episodes += 1;
        if !self.tally.new_item_ids.contains(&item_id) {
            self.tally.item_ids_with_new_episodes.insert(item_id);
        }
    }

    async fn update_episode(
        &mut self,
        item_id: i64,
        source: Source,
        episode_id: i64,
        patch: EpisodePatch,
        key: &EpisodeKey,
    ) {
        if patch.is_empty() {
            return;
        }
        let Some(mut episode) = self
            .catalog
            .find_item(item_id)
            .and_then(|i| i.episode(episode_id))
            .cloned()
        else {
            return;
        };
        episode.apply(patch);
        if let Err(e) = self.db.save_episode(source, &mut episode).await {
            self.record_error(key, e);
            return;
        }
        if let Some(stored) = self
            .catalog
            .find_item_mut(item_id)
            .and_then(|i| i.episode_mut(episode_id))
        {
            *stored = episode;
        }
        debug!(item_id, episode_id, %key, "episode updated");
        self.tally.updated_episodes += 1;
    }

    /// Delete episodes of `item_id` whose key was not seen this pass.
    ///
    /// Episodes are sorted first so a pruned current episode hands the
    /// pointer to its successor in display order, new episodes included.
    async fn prune_episodes(&mut self, item_id: i64, source: Source, seen: &HashSet<EpisodeKey>) {
        let Some(item) = self.catalog.find_item_mut(item_id) else {
            return;
        };
        ordering::sort_episodes(item);
        let stale: Vec<i64> = item
            .episodes()
            .filter(|e| !EpisodeKey::of(e, source).is_some_and(|k| seen.contains(&k)))
            .filter_map(|e| e.id)
            .collect();

        for episode_id in stale {
            if let Err(e) = self.db.delete_episode(episode_id).await {
                self.record_error(&format!("episode {episode_id}"), e);
                continue;
            }
            match self.catalog.remove_episode(item_id, episode_id) {
                Ok(true) => self.persist_pointer(item_id).await,
                Ok(false) => {}
                Err(e) => self.record_error(&format!("episode {episode_id}"), e),
            }
            debug!(item_id, episode_id, "episode pruned");
            self.tally.deleted_episodes += 1;
        }
    }

    /// Delete items from `candidates` that were not seen this pass.
    async fn prune_items(&mut self, candidates: &[i64], seen: &HashSet<i64>) {
        for id in candidates.iter().filter(|id| !seen.contains(id)) {
            let Some(item) = self.catalog.find_item(*id) else {
                continue;
            };
            if let Err(e) = self.db.delete_item(item).await {
                self.record_error(&format!("item {id}"), e);
                continue;
            }
            self.catalog.remove_item(*id);
            debug!(item_id = id, "item pruned");
            self.tally.deleted_items += 1;
        }
    }

    /// Un-archive archived local items that gained episodes this pass.
    async fn unarchive_items(&mut self) {
        if !self.unarchive_on_new_episodes {
            return;
        }
        let ids: Vec<i64> = self
            .tally
            .item_ids_with_new_episodes
            .iter()
            .copied()
            .collect();
        for id in ids {
            let Some(item) = self.catalog.find_item(id) else {
                continue;
            };
            if item.source != Source::Local || !item.is_archived {
                continue;
            }
            let mut updated = item.clone();
            updated.is_archived = false;
            match self.db.save_item(&mut updated).await {
                Ok(_) => {
                    info!(item_id = id, "un-archived item with new episodes");
                    if let Err(e) = self.catalog.add_item(updated) {
                        self.record_error(&format!("item {id}"), e);
                    }
                    self.tally.updated_items += 1;
                }
                Err(e) => self.record_error(&format!("item {id}"), e),
            }
        }
    }

    async fn stamp_source_update(&mut self, item_id: i64) {
        let Some(item) = self.catalog.find_item(item_id) else {
            return;
        };
        let mut updated = item.clone();
        updated.updated_from_source_at = Some(unix_now());
        match self.db.save_item(&mut updated).await {
            Ok(_) => {
                if let Err(e) = self.catalog.add_item(updated) {
                    self.record_error(&format!("item {item_id}"), e);
                }
            }
            Err(e) => self.record_error(&format!("item {item_id}"), e),
        }
    }

    /// Sort episodes of the touched items, move fresh pointers onto new
    /// episodes, then re-bucket the catalog.
    async fn finish(&mut self, item_ids: &HashSet<i64>) {
        for id in item_ids {
            let Some(item) = self.catalog.find_item_mut(*id) else {
                continue;
            };
            ordering::sort_episodes(item);
            if item.set_current_to_new_episode() {
                self.persist_pointer(*id).await;
            }
        }
        self.catalog.sort_items();
    }

    async fn persist_pointer(&mut self, item_id: i64) {
        let Some(item) = self.catalog.find_item(item_id) else {
            return;
        };
        if let Err(e) = self.db.update_current_episode(item).await {
            self.record_error(&format!("item {item_id}"), e);
        }
    }

    fn record_error(&mut self, context: &(impl std::fmt::Display + ?Sized), error: PlayaError) {
        warn!(%context, %error, "write failed, continuing");
        self.tally.errors.push(format!("{context}: {error}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DisplayContext;
    use crate::models::{EpisodePointer, Row, Table};
    use crate::storage::Storage;

    fn db() -> Db<Storage> {
        Db::connected(Storage::open_memory().unwrap())
    }

    fn file(dir: &str, name: &str) -> EpisodeFile {
        EpisodeFile {
            show_dir_name: dir.into(),
            pathname: format!("/tv/{dir}/{name}"),
            filename: name.into(),
            duration: None,
        }
    }

    fn scan(dirs: &[&str], files: Vec<EpisodeFile>) -> ScanResults {
        ScanResults {
            show_dir_names: dirs.iter().map(|d| d.to_string()).collect(),
            episode_files: files,
        }
    }

    fn remote(season: i64, episode: i64, name: &str) -> RemoteEpisode {
        RemoteEpisode {
            season_num: Some(season),
            episode_num: Some(episode),
            name: Some(name.into()),
            ..Default::default()
        }
    }

    fn video(url: &str, order: i64) -> PlaylistVideo {
        PlaylistVideo {
            name: Some(format!("Video {order}")),
            url: url.into(),
            order_num: Some(order),
            ..Default::default()
        }
    }

    async fn rows(db: &Db<Storage>, table: Table) -> Vec<Row> {
        db.load(table).await.unwrap()
    }

    async fn remote_item(catalog: &mut Catalog, db: &Db<Storage>, source: Source) -> i64 {
        let mut item = Item::from_record(ItemRecord {
            url: Some("https://example.com/list".into()),
            ..ItemRecord::new(ItemType::Show, source)
        });
        db.save_item(&mut item).await.unwrap();
        catalog.add_item(item).unwrap()
    }

    #[tokio::test]
    async fn test_scan_creates_shows_and_episodes() {
        let db = db();
        let mut catalog = Catalog::new(false);
        let tally = Reconciler::new(&mut catalog, &db)
            .local_shows(scan(
                &["Foo"],
                vec![file("Foo", "Foo.S01E02.mkv"), file("Foo", "Foo.S01E01.mkv")],
            ))
            .await
            .unwrap();

        assert_eq!(tally.new_item_ids.len(), 1);
        assert_eq!(tally.new_episodes, 2);
        // New shows are not counted as "items with new episodes".
        assert!(tally.item_ids_with_new_episodes.is_empty());

        let item = catalog.items().next().unwrap();
        let first = item.episodes().next().unwrap();
        assert_eq!(first.sxxexx().as_deref(), Some("S01E01"));
        assert_eq!(item.current_episode, EpisodePointer::At(first.id.unwrap()));

        assert_eq!(rows(&db, Table::Items).await.len(), 1);
        assert_eq!(rows(&db, Table::Episodes).await.len(), 2);
        let stored = &rows(&db, Table::Items).await[0];
        assert_eq!(stored.i64("current_episode_id"), first.id);
    }

    #[tokio::test]
    async fn test_rescan_with_same_input_changes_nothing() {
        let db = db();
        let mut catalog = Catalog::new(false);
        let input = scan(
            &["Foo", "Bar"],
            vec![file("Foo", "Foo.S01E01.mkv"), file("Bar", "Bar.S01E01.mkv")],
        );
        let mut reconciler = Reconciler::new(&mut catalog, &db);
        reconciler.local_shows(input.clone()).await.unwrap();
        let second = reconciler.local_shows(input).await.unwrap();
        assert!(!second.has_changes());
        assert!(second.errors.is_empty());
    }

    #[tokio::test]
    async fn test_changed_filename_same_pathname_is_one_update() {
        let db = db();
        let mut catalog = Catalog::new(false);
        let mut reconciler = Reconciler::new(&mut catalog, &db);
        reconciler
            .local_shows(scan(&["Foo"], vec![file("Foo", "Foo.S01E02.mkv")]))
            .await
            .unwrap();

        let mut renamed = file("Foo", "Foo.S01E02.mkv");
        renamed.filename = "Foo.S01E02.Pilot.mkv".into();
        let tally = reconciler
            .local_shows(scan(&["Foo"], vec![renamed]))
            .await
            .unwrap();

        assert_eq!(tally.updated_episodes, 1);
        assert_eq!(tally.new_episodes, 0);
        assert_eq!(tally.deleted_episodes, 0);
        assert_eq!(tally.deleted_items, 0);

        let stored = &rows(&db, Table::Episodes).await[0];
        assert_eq!(stored.text("filename").as_deref(), Some("Foo.S01E02.Pilot.mkv"));
        assert_eq!(stored.text("name").as_deref(), Some("Pilot"));
    }

    #[tokio::test]
    async fn test_missing_files_and_shows_are_pruned() {
        let db = db();
        let mut catalog = Catalog::new(false);
        let mut reconciler = Reconciler::new(&mut catalog, &db);
        reconciler
            .local_shows(scan(
                &["Foo", "Bar"],
                vec![
                    file("Foo", "Foo.S01E01.mkv"),
                    file("Foo", "Foo.S01E02.mkv"),
                    file("Bar", "Bar.S01E01.mkv"),
                ],
            ))
            .await
            .unwrap();

        let tally = reconciler
            .local_shows(scan(&["Foo"], vec![file("Foo", "Foo.S01E01.mkv")]))
            .await
            .unwrap();
        assert_eq!(tally.deleted_items, 1);
        assert_eq!(tally.deleted_episodes, 1);

        assert_eq!(catalog.len(), 1);
        assert_eq!(rows(&db, Table::Items).await.len(), 1);
        assert_eq!(rows(&db, Table::Episodes).await.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_scan_prunes_everything() {
        let db = db();
        let mut catalog = Catalog::new(false);
        let mut reconciler = Reconciler::new(&mut catalog, &db);
        reconciler
            .local_shows(scan(&["Foo"], vec![file("Foo", "Foo.S01E01.mkv")]))
            .await
            .unwrap();
        let tally = reconciler.local_shows(ScanResults::default()).await.unwrap();
        assert_eq!(tally.deleted_items, 1);
        assert!(catalog.is_empty());
        assert!(rows(&db, Table::Episodes).await.is_empty());
    }

    #[tokio::test]
    async fn test_pruned_selected_item_moves_selection() {
        let db = db();
        let mut catalog = Catalog::new(false);
        Reconciler::new(&mut catalog, &db)
            .local_shows(scan(&["Alpha", "Beta"], vec![]))
            .await
            .unwrap();
        let beta = catalog.items().find(|i| i.name() == "Beta").unwrap().id;
        catalog.select(DisplayContext::Home, beta);

        Reconciler::new(&mut catalog, &db)
            .local_shows(scan(&["Alpha"], vec![]))
            .await
            .unwrap();
        let alpha = catalog.items().next().and_then(|i| i.id);
        assert_eq!(catalog.selected_id(DisplayContext::Home), alpha);

        Reconciler::new(&mut catalog, &db)
            .local_shows(ScanResults::default())
            .await
            .unwrap();
        assert_eq!(catalog.selected_id(DisplayContext::Home), None);
    }

    #[tokio::test]
    async fn test_pruned_selection_moves_to_show_created_in_same_pass() {
        let db = db();
        let mut catalog = Catalog::new(false);
        Reconciler::new(&mut catalog, &db)
            .local_shows(scan(&["Beta", "Gamma"], vec![]))
            .await
            .unwrap();
        let gamma = catalog.items().find(|i| i.name() == "Gamma").unwrap().id;
        catalog.select(DisplayContext::Home, gamma);

        Reconciler::new(&mut catalog, &db)
            .local_shows(scan(&["Alpha", "Beta"], vec![]))
            .await
            .unwrap();
        let names: Vec<&str> = catalog
            .list(DisplayContext::Home)
            .into_iter()
            .filter_map(|id| catalog.find_item(id))
            .map(|i| i.name())
            .collect();
        assert_eq!(names, ["Alpha", "Beta"]);
        let selected = catalog.selected_item(DisplayContext::Home).map(|i| i.name());
        assert_eq!(selected, Some("Alpha"));
    }

    #[tokio::test]
    async fn test_pruned_selection_moves_to_movie_created_in_same_pass() {
        let db = db();
        let mut catalog = Catalog::new(false);
        let movie = |name: &str| MovieFile {
            pathname: format!("/m/{name}.mkv"),
            filename: format!("{name}.mkv"),
            duration: None,
        };
        let mut reconciler = Reconciler::new(&mut catalog, &db);
        reconciler
            .local_movies(vec![movie("Beta"), movie("Gamma")])
            .await
            .unwrap();
        drop(reconciler);
        let gamma = catalog.items().find(|i| i.name() == "Gamma").unwrap().id;
        catalog.select(DisplayContext::Home, gamma);

        Reconciler::new(&mut catalog, &db)
            .local_movies(vec![movie("Alpha"), movie("Beta")])
            .await
            .unwrap();
        let selected = catalog.selected_item(DisplayContext::Home).map(|i| i.name());
        assert_eq!(selected, Some("Alpha"));
    }

    #[tokio::test]
    async fn test_pruned_current_episode_moves_to_new_successor() {
        let db = db();
        let mut catalog = Catalog::new(false);
        Reconciler::new(&mut catalog, &db)
            .local_shows(scan(
                &["Foo"],
                vec![file("Foo", "Foo.S01E01.mkv"), file("Foo", "Foo.S01E05.mkv")],
            ))
            .await
            .unwrap();
        let id = catalog.item_ids()[0];
        assert_eq!(
            catalog.item(id).unwrap().current_episode().unwrap().episode_num,
            Some(1)
        );

        Reconciler::new(&mut catalog, &db)
            .local_shows(scan(
                &["Foo"],
                vec![file("Foo", "Foo.S01E05.mkv"), file("Foo", "Foo.S01E02.mkv")],
            ))
            .await
            .unwrap();
        let item = catalog.item(id).unwrap();
        let order: Vec<Option<i64>> = item.episodes().map(|e| e.episode_num).collect();
        assert_eq!(order, [Some(2), Some(5)]);
        assert_eq!(item.current_episode().unwrap().episode_num, Some(2));

        let current = item.current_episode.episode_id();
        assert_eq!(rows(&db, Table::Items).await[0].i64("current_episode_id"), current);
    }

    #[tokio::test]
    async fn test_archived_show_with_new_episode_is_unarchived() {
        let db = db();
        let mut catalog = Catalog::new(false);
        Reconciler::new(&mut catalog, &db)
            .local_shows(scan(&["Foo"], vec![file("Foo", "Foo.S01E01.mkv")]))
            .await
            .unwrap();
        let id = catalog.item_ids()[0];
        let mut item = catalog.item(id).unwrap().clone();
        item.is_archived = true;
        db.save_item(&mut item).await.unwrap();
        catalog.add_item(item).unwrap();

        let tally = Reconciler::new(&mut catalog, &db)
            .local_shows(scan(
                &["Foo"],
                vec![file("Foo", "Foo.S01E01.mkv"), file("Foo", "Foo.S01E02.mkv")],
            ))
            .await
            .unwrap();
        assert_eq!(tally.updated_items, 1);
        assert!(tally.item_ids_with_new_episodes.contains(&id));
        assert!(!catalog.item(id).unwrap().is_archived);
        assert!(!rows(&db, Table::Items).await[0].flag("is_archived"));
    }

    #[tokio::test]
    async fn test_unarchive_can_be_disabled() {
        let db = db();
        let mut catalog = Catalog::new(false);
        Reconciler::new(&mut catalog, &db)
            .local_shows(scan(&["Foo"], vec![]))
            .await
            .unwrap();
        let id = catalog.item_ids()[0];
        catalog.item_mut(id).unwrap().is_archived = true;

        Reconciler::new(&mut catalog, &db)
            .unarchive_on_new_episodes(false)
            .local_shows(scan(&["Foo"], vec![file("Foo", "Foo.S01E01.mkv")]))
            .await
            .unwrap();
        assert!(catalog.item(id).unwrap().is_archived);
    }

    #[tokio::test]
    async fn test_finished_show_moves_to_new_episode() {
        let db = db();
        let mut catalog = Catalog::new(false);
        let mut reconciler = Reconciler::new(&mut catalog, &db);
        reconciler
            .local_shows(scan(&["Foo"], vec![file("Foo", "Foo.S01E01.mkv")]))
            .await
            .unwrap();
        drop(reconciler);
        let id = catalog.item_ids()[0];
        catalog.item_mut(id).unwrap().current_episode = EpisodePointer::Finished;

        Reconciler::new(&mut catalog, &db)
            .local_shows(scan(
                &["Foo"],
                vec![file("Foo", "Foo.S01E01.mkv"), file("Foo", "Foo.S01E02.mkv")],
            ))
            .await
            .unwrap();
        let item = catalog.item(id).unwrap();
        assert_eq!(item.current_episode().unwrap().episode_num, Some(2));
    }

    #[tokio::test]
    async fn test_movies_created_updated_pruned() {
        let db = db();
        let mut catalog = Catalog::new(false);
        let movie = |path: &str, duration: Option<&str>| MovieFile {
            pathname: format!("/m/{path}"),
            filename: path.into(),
            duration: duration.map(String::from),
        };
        let mut reconciler = Reconciler::new(&mut catalog, &db);
        let tally = reconciler
            .local_movies(vec![movie("A (2001).mkv", None), movie("B.mkv", None)])
            .await
            .unwrap();
        assert_eq!(tally.new_item_ids.len(), 2);

        let tally = reconciler
            .local_movies(vec![movie("A (2001).mkv", Some("1:40:00"))])
            .await
            .unwrap();
        assert_eq!(tally.updated_items, 1);
        assert_eq!(tally.deleted_items, 1);

        let names: Vec<&str> = catalog.items().map(|i| i.name()).collect();
        assert_eq!(names, ["A"]);
        assert_eq!(
            rows(&db, Table::Items).await[0].text("duration").as_deref(),
            Some("1:40:00")
        );
    }

    #[tokio::test]
    async fn test_movies_leave_shows_alone() {
        let db = db();
        let mut catalog = Catalog::new(false);
        let mut reconciler = Reconciler::new(&mut catalog, &db);
        reconciler
            .local_shows(scan(&["Foo"], vec![]))
            .await
            .unwrap();
        let tally = reconciler.local_movies(vec![]).await.unwrap();
        assert_eq!(tally.deleted_items, 0);
        assert_eq!(catalog.len(), 1);
    }

    #[tokio::test]
    async fn test_external_episodes_create_update_prune_and_skip() {
        let db = db();
        let mut catalog = Catalog::new(false);
        let id = remote_item(&mut catalog, &db, Source::External).await;
        let mut reconciler = Reconciler::new(&mut catalog, &db);

        let tally = reconciler
            .external_episodes(id, vec![remote(1, 1, "Pilot"), remote(1, 2, "Second")])
            .await
            .unwrap();
        assert_eq!(tally.new_episodes, 2);
        assert!(tally.item_ids_with_new_episodes.contains(&id));

        let unnumbered = RemoteEpisode {
            name: Some("Special".into()),
            ..Default::default()
        };
        let tally = reconciler
            .external_episodes(id, vec![remote(1, 1, "Pilot (Director's Cut)"), unnumbered])
            .await
            .unwrap();
        assert_eq!(tally.updated_episodes, 1);
        assert_eq!(tally.deleted_episodes, 1);
        assert_eq!(tally.skipped, 1);
        assert_eq!(tally.new_episodes, 0);

        let item = catalog.item(id).unwrap();
        assert_eq!(item.episode_count(), 1);
        assert!(item.updated_from_source_at.is_some());
        let stored = rows(&db, Table::Items).await;
        assert!(stored[0].i64("updated_from_source_at").is_some());
    }

    #[tokio::test]
    async fn test_external_episodes_only_enrich_local_items() {
        let db = db();
        let mut catalog = Catalog::new(false);
        let mut reconciler = Reconciler::new(&mut catalog, &db);
        reconciler
            .local_shows(scan(
                &["Foo"],
                vec![file("Foo", "Foo.S01E01.mkv"), file("Foo", "Foo.S01E02.mkv")],
            ))
            .await
            .unwrap();
        drop(reconciler);
        let id = catalog.item_ids()[0];

        let tally = Reconciler::new(&mut catalog, &db)
            .external_episodes(id, vec![remote(1, 1, "Pilot"), remote(1, 3, "Third")])
            .await
            .unwrap();
        assert_eq!(tally.updated_episodes, 1);
        assert_eq!(tally.new_episodes, 0);
        assert_eq!(tally.deleted_episodes, 0);

        let item = catalog.item(id).unwrap();
        assert_eq!(item.episode_count(), 2);
        assert_eq!(item.episodes().next().unwrap().name.as_deref(), Some("Pilot"));

        // A rescan with the same files keeps the enriched name.
        let tally = Reconciler::new(&mut catalog, &db)
            .local_shows(scan(
                &["Foo"],
                vec![file("Foo", "Foo.S01E01.mkv"), file("Foo", "Foo.S01E02.mkv")],
            ))
            .await
            .unwrap();
        assert!(!tally.has_changes());
    }

    #[tokio::test]
    async fn test_empty_remote_listing_is_rejected_before_changes() {
        let db = db();
        let mut catalog = Catalog::new(false);
        let id = remote_item(&mut catalog, &db, Source::External).await;
        let mut reconciler = Reconciler::new(&mut catalog, &db);
        reconciler
            .external_episodes(id, vec![remote(1, 1, "Pilot")])
            .await
            .unwrap();

        let err = reconciler.external_episodes(id, vec![]).await.unwrap_err();
        assert!(matches!(err, PlayaError::InvalidSourceResponse(_)));
        assert_eq!(catalog.item(id).unwrap().episode_count(), 1);
    }

    #[tokio::test]
    async fn test_playlist_video_missing_from_listing_is_pruned() {
        let db = db();
        let mut catalog = Catalog::new(false);
        let id = remote_item(&mut catalog, &db, Source::YtPlaylist).await;
        let mut reconciler = Reconciler::new(&mut catalog, &db);
        reconciler
            .playlist_videos(id, vec![video("https://y/a", 0), video("https://y/b", 1)])
            .await
            .unwrap();

        let tally = reconciler
            .playlist_videos(id, vec![video("https://y/b", 0)])
            .await
            .unwrap();
        assert_eq!(tally.deleted_episodes, 1);
        assert_eq!(tally.updated_episodes, 1);

        let stored = rows(&db, Table::Episodes).await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].text("url").as_deref(), Some("https://y/b"));
    }

    #[tokio::test]
    async fn test_playlist_pass_on_wrong_item_is_rejected() {
        let db = db();
        let mut catalog = Catalog::new(false);
        let id = remote_item(&mut catalog, &db, Source::External).await;
        let err = Reconciler::new(&mut catalog, &db)
            .playlist_videos(id, vec![video("https://y/a", 0)])
            .await
            .unwrap_err();
        assert!(matches!(err, PlayaError::InvalidSourceResponse(_)));
    }

    #[tokio::test]
    async fn test_disconnected_pass_is_a_noop() {
        let db: Db<Storage> = Db::disconnected();
        let mut catalog = Catalog::new(false);
        let tally = Reconciler::new(&mut catalog, &db)
            .local_shows(scan(&["Foo"], vec![file("Foo", "Foo.S01E01.mkv")]))
            .await
            .unwrap();
        assert_eq!(tally, SyncTally::default());
        assert!(catalog.is_empty());
    }

    #[tokio::test]
    async fn test_failed_write_is_recorded_and_pass_continues() {
        let db = db();
        let mut catalog = Catalog::new(false);
        // An item the database has never seen: updating it fails.
        let mut ghost = Item::from_record(ItemRecord::local_show("Ghost"));
        ghost.id = Some(999);
        catalog.add_item(ghost).unwrap();
        catalog.add_episode(Episode {
            id: Some(998),
            item_id: 999,
            pathname: Some("/tv/Ghost/Ghost.S01E01.mkv".into()),
            filename: Some("Ghost.S01E01.mkv".into()),
            ..Default::default()
        })
        .unwrap();

        let mut changed = file("Ghost", "Ghost.S01E01.mkv");
        changed.duration = Some("22:00".into());
        let tally = Reconciler::new(&mut catalog, &db)
            .local_shows(scan(&["Ghost", "Foo"], vec![changed, file("Foo", "Foo.S01E01.mkv")]))
            .await
            .unwrap();

        assert_eq!(tally.errors.len(), 1);
        assert_eq!(tally.updated_episodes, 0);
        assert_eq!(tally.new_item_ids.len(), 1);
        assert_eq!(tally.new_episodes, 1);
    }

    #[test]
    fn test_summary_line() {
        let tally = SyncTally {
            new_item_ids: BTreeSet::from([1, 2]),
            new_episodes: 5,
            deleted_episodes: 1,
            ..Default::default()
        };
        assert_eq!(
            tally.summary(),
            "Scan complete. New items: 2 — Items with new episodes: 0 — New episodes: 5 — \
             Updated episodes: 0 — Deleted items: 0 — Deleted episodes: 1"
        );
    }
}
