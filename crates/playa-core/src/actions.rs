//! User operations on the catalog, each persisted through `Db`.

use std::path::PathBuf;

use rand::Rng;
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::error::PlayaError;
use crate::matcher::{find_item, ItemKey};
use crate::models::{
    unix_now, Episode, EpisodePointer, Item, ItemPatch, ItemRecord, ItemType, Source, Table,
};
use crate::navigation::{navigate, Destination};
use crate::ordering;
use crate::persistence::{Db, Persistence, WriteStatus};

/// What to hand to the system opener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayTarget {
    File(PathBuf),
    Url(String),
}

impl std::fmt::Display for PlayTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Url(url) => f.write_str(url),
        }
    }
}

/// Build the catalog from every stored item and episode.
pub async fn load_catalog<P: Persistence>(
    db: &Db<P>,
    show_finished_items: bool,
) -> Result<Catalog, PlayaError> {
    let mut catalog = Catalog::new(show_finished_items);

    for row in db.load(Table::Items).await? {
        catalog.add_item(Item::from_row(&row))?;
    }
    let mut orphans = 0usize;
    for row in db.load(Table::Episodes).await? {
        let episode = Episode::from_row(&row);
        if catalog.find_item(episode.item_id).is_none() {
            orphans += 1;
            continue;
        }
        catalog.add_episode(episode)?;
    }
    if orphans > 0 {
        warn!(orphans, "skipped episodes whose item no longer exists");
    }

    catalog.sort_all_episodes();
    catalog.sort_items();
    info!(items = catalog.len(), "catalog loaded");
    Ok(catalog)
}

/// Add a user-created external or playlist item. Adding a url that is
/// already in the catalog returns the existing item.
pub async fn add_item<P: Persistence>(
    catalog: &mut Catalog,
    db: &Db<P>,
    record: ItemRecord,
) -> Result<i64, PlayaError> {
    if record.source == Source::Local {
        return Err(PlayaError::Config(
            "local items come from scanning the library directories".into(),
        ));
    }
    let mut item = Item::from_record(record);
    let Some(key) = ItemKey::of(&item) else {
        return Err(PlayaError::Config("external items need a url".into()));
    };
    if let Some(id) = find_item(catalog, &key)? {
        return Ok(id);
    }

    if db.save_item(&mut item).await? == WriteStatus::NotConnected {
        return Err(PlayaError::WriteFailed("no database connection".into()));
    }
    let id = catalog.add_item(item)?;
    catalog.sort_items();
    info!(item_id = id, %key, "item added");
    Ok(id)
}

/// Apply user edits to an item.
pub async fn update_item<P: Persistence>(
    catalog: &mut Catalog,
    db: &Db<P>,
    item_id: i64,
    patch: ItemPatch,
) -> Result<WriteStatus, PlayaError> {
    if patch.is_empty() {
        return Ok(WriteStatus::Written);
    }
    let reorder = patch.order_is_reversed.is_some();
    let mut item = catalog.item(item_id)?.clone();
    item.apply(patch);
    let status = db.save_item(&mut item).await?;
    if reorder {
        ordering::sort_episodes(&mut item);
    }
    catalog.add_item(item)?;
    catalog.sort_items();
    debug!(item_id, "item updated");
    Ok(status)
}

pub async fn set_archived<P: Persistence>(
    catalog: &mut Catalog,
    db: &Db<P>,
    item_id: i64,
    archived: bool,
) -> Result<WriteStatus, PlayaError> {
    let patch = ItemPatch {
        is_archived: Some(archived),
        ..Default::default()
    };
    update_item(catalog, db, item_id, patch).await
}

/// Move an item's episode pointer, persisting it only when it changed.
pub async fn episode_nav<P: Persistence, R: Rng + ?Sized>(
    catalog: &mut Catalog,
    db: &Db<P>,
    item_id: i64,
    destination: Destination,
    rng: &mut R,
) -> Result<EpisodePointer, PlayaError> {
    let item = catalog.item_mut(item_id)?;
    let previous = item.current_episode;
    if !navigate(item, destination, rng) {
        return Ok(previous);
    }
    let pointer = item.current_episode;
    if let Err(e) = db.update_current_episode(item).await {
        item.current_episode = previous;
        return Err(e);
    }
    catalog.sort_items();
    debug!(item_id, %destination, ?pointer, "episode pointer moved");
    Ok(pointer)
}

/// Resolve what playing `item_id` opens and stamp `last_watched_at`.
pub async fn play<P: Persistence>(
    catalog: &mut Catalog,
    db: &Db<P>,
    item_id: i64,
) -> Result<PlayTarget, PlayaError> {
    let item = catalog.item_mut(item_id)?;
    let target = play_target(item)
        .ok_or_else(|| PlayaError::NotFound(format!("nothing to play for {}", item.name())))?;

    item.last_watched_at = Some(unix_now());
    db.update_last_watched_at(item).await?;
    catalog.sort_items();
    info!(item_id, %target, "playing");
    Ok(target)
}

fn play_target(item: &Item) -> Option<PlayTarget> {
    match (item.source, item.item_type) {
        (Source::Local, ItemType::Movie) => {
            item.pathname.clone().map(PathBuf::from).map(PlayTarget::File)
        }
        (Source::Local, ItemType::Show) => item
            .current_episode()
            .and_then(|e| e.pathname.clone())
            .map(PathBuf::from)
            .map(PlayTarget::File),
        _ => item
            .current_episode()
            .and_then(|e| e.url.clone())
            .or_else(|| item.url.clone())
            .map(PlayTarget::Url),
    }
}

/// Delete an item and its episodes from the database, then the catalog.
pub async fn delete_item<P: Persistence>(
    catalog: &mut Catalog,
    db: &Db<P>,
    item_id: i64,
) -> Result<WriteStatus, PlayaError> {
    let status = db.delete_item(catalog.item(item_id)?).await?;
    catalog.remove_item(item_id);
    info!(item_id, "item deleted");
    Ok(status)
}

/// Delete one episode, advancing the pointer if it was current.
pub async fn delete_episode<P: Persistence>(
    catalog: &mut Catalog,
    db: &Db<P>,
    item_id: i64,
    episode_id: i64,
) -> Result<WriteStatus, PlayaError> {
    if catalog.item(item_id)?.episode(episode_id).is_none() {
        return Err(PlayaError::NotFound(format!("episode {episode_id}")));
    }
    let status = db.delete_episode(episode_id).await?;
    if catalog.remove_episode(item_id, episode_id)? {
        db.update_current_episode(catalog.item(item_id)?).await?;
    }
    catalog.sort_items();
    debug!(item_id, episode_id, "episode deleted");
    Ok(status)
}
