//! In-memory catalog: items, display buckets and the cross-item selection.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::PlayaError;
use crate::models::{Episode, Item, ItemType, Source};
use crate::navigation::{navigate, Destination};
use crate::normalize::alpha_name;
use crate::ordering::{self, Bucket};

/// Which top-level list the user is browsing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum DisplayContext {
    #[default]
    Home,
    Archives,
}

/// One step through a display list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Next,
    Prev,
}

/// Item ids per display list, each in item sort order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Buckets {
    pub home_unfinished_shows: Vec<i64>,
    pub home_finished_shows: Vec<i64>,
    pub home_unfinished_movies: Vec<i64>,
    pub home_finished_movies: Vec<i64>,
    pub archived_shows: Vec<i64>,
    pub archived_movies: Vec<i64>,
}

impl Buckets {
    fn list_mut(&mut self, item_type: ItemType, bucket: Bucket) -> &mut Vec<i64> {
        match (item_type, bucket) {
            (ItemType::Show, Bucket::Unfinished) => &mut self.home_unfinished_shows,
            (ItemType::Show, Bucket::Finished) => &mut self.home_finished_shows,
            (ItemType::Show, Bucket::Archived) => &mut self.archived_shows,
            (ItemType::Movie, Bucket::Unfinished) => &mut self.home_unfinished_movies,
            (ItemType::Movie, Bucket::Finished) => &mut self.home_finished_movies,
            (ItemType::Movie, Bucket::Archived) => &mut self.archived_movies,
        }
    }

    fn remove(&mut self, id: i64) {
        for list in [
            &mut self.home_unfinished_shows,
            &mut self.home_finished_shows,
            &mut self.home_unfinished_movies,
            &mut self.home_finished_movies,
            &mut self.archived_shows,
            &mut self.archived_movies,
        ] {
            list.retain(|i| *i != id);
        }
    }
}

/// A search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    pub id: i64,
    pub name: String,
    pub item_type: ItemType,
    pub source: Source,
}

/// The selected item of each display list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selection {
    pub home: Option<i64>,
    pub archives: Option<i64>,
}

impl Selection {
    pub fn get(&self, context: DisplayContext) -> Option<i64> {
        match context {
            DisplayContext::Home => self.home,
            DisplayContext::Archives => self.archives,
        }
    }

    fn set(&mut self, context: DisplayContext, item_id: Option<i64>) {
        match context {
            DisplayContext::Home => self.home = item_id,
            DisplayContext::Archives => self.archives = item_id,
        }
    }
}

const CONTEXTS: [DisplayContext; 2] = [DisplayContext::Home, DisplayContext::Archives];

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    items: HashMap<i64, Item>,
    item_ids: Vec<i64>,
    buckets: Buckets,
    selection: Selection,
    /// Contexts whose selected item was removed before the next re-sort.
    reselect: Vec<DisplayContext>,
    show_finished_items: bool,
}

impl Catalog {
    pub fn new(show_finished_items: bool) -> Self {
        Self {
            show_finished_items,
            ..Self::default()
        }
    }

    pub fn show_finished_items(&self) -> bool {
        self.show_finished_items
    }

    pub fn set_show_finished_items(&mut self, show: bool) {
        self.show_finished_items = show;
        self.fix_selection();
    }

    // ── Items ───────────────────────────────────────────────────

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Item ids in display order.
    pub fn item_ids(&self) -> &[i64] {
        &self.item_ids
    }

    /// Items in display order.
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.item_ids.iter().filter_map(|id| self.items.get(id))
    }

    pub fn find_item(&self, id: i64) -> Option<&Item> {
        self.items.get(&id)
    }

    pub fn find_item_mut(&mut self, id: i64) -> Option<&mut Item> {
        self.items.get_mut(&id)
    }

    /// Like `find_item`, but a missing id is an error.
    pub fn item(&self, id: i64) -> Result<&Item, PlayaError> {
        self.items
            .get(&id)
            .ok_or_else(|| PlayaError::NotFound(format!("item {id}")))
    }

    pub fn item_mut(&mut self, id: i64) -> Result<&mut Item, PlayaError> {
        self.items
            .get_mut(&id)
            .ok_or_else(|| PlayaError::NotFound(format!("item {id}")))
    }

    pub fn items_by(&self, item_type: ItemType, source: Source) -> Vec<&Item> {
        self.items()
            .filter(|i| i.item_type == item_type && i.source == source)
            .collect()
    }

    /// Add a saved item, or replace the stored one with the same id.
    ///
    /// A replacement without episodes keeps the episodes already held.
    pub fn add_item(&mut self, mut item: Item) -> Result<i64, PlayaError> {
        let id = item
            .id
            .ok_or_else(|| PlayaError::NotFound("item has not been saved yet".into()))?;
        match self.items.remove(&id) {
            Some(existing) => {
                if item.episode_count() == 0 {
                    for episode in existing.episodes() {
                        item.insert_episode(episode.clone());
                    }
                }
            }
            None => self.item_ids.push(id),
        }
        self.items.insert(id, item);
        Ok(id)
    }

    /// Add a saved episode to its parent, replacing one with the same id.
    /// Returns `true` when the episode was not present before.
    pub fn add_episode(&mut self, episode: Episode) -> Result<bool, PlayaError> {
        if episode.id.is_none() {
            return Err(PlayaError::NotFound("episode has not been saved yet".into()));
        }
        let item = self.item_mut(episode.item_id)?;
        Ok(item.insert_episode(episode))
    }

    /// Drop an item from the maps, buckets and selection.
    ///
    /// A context that had the item selected moves to its first item now,
    /// and again after the next `sort_items` once new items are bucketed.
    pub fn remove_item(&mut self, id: i64) -> Option<Item> {
        let item = self.items.remove(&id)?;
        self.item_ids.retain(|i| *i != id);
        self.buckets.remove(id);
        for context in CONTEXTS {
            if self.selection.get(context) == Some(id) && !self.reselect.contains(&context) {
                self.reselect.push(context);
            }
        }
        self.fix_selection();
        Some(item)
    }

    /// Drop an episode. Removing the current episode first advances the
    /// pointer with `Next`; returns `true` when the pointer changed.
    pub fn remove_episode(&mut self, item_id: i64, episode_id: i64) -> Result<bool, PlayaError> {
        let item = self.item_mut(item_id)?;
        let mut changed = false;
        if item.current_episode.episode_id() == Some(episode_id) {
            changed = navigate(item, Destination::Next, &mut rand::thread_rng());
        }
        item.remove_episode(episode_id);
        Ok(changed)
    }

    /// Items whose alpha name contains the alpha-normalized query.
    pub fn search(&self, query: &str) -> Vec<SearchResult> {
        let needle = alpha_name(query);
        if needle.is_empty() {
            return Vec::new();
        }
        self.items()
            .filter(|item| item.alpha_name().contains(&needle))
            .filter_map(|item| {
                Some(SearchResult {
                    id: item.id?,
                    name: item.name().to_string(),
                    item_type: item.item_type,
                    source: item.source,
                })
            })
            .collect()
    }

    // ── Ordering ────────────────────────────────────────────────

    /// Re-sort items, rebuild the buckets and fix a dangling selection.
    pub fn sort_items(&mut self) {
        let items = &self.items;
        self.item_ids.sort_by(|a, b| match (items.get(a), items.get(b)) {
            (Some(a), Some(b)) => ordering::compare_items(a, b),
            _ => a.cmp(b),
        });

        let mut buckets = Buckets::default();
        for id in &self.item_ids {
            if let Some(item) = self.items.get(id) {
                buckets
                    .list_mut(item.item_type, ordering::bucket_of(item))
                    .push(*id);
            }
        }
        self.buckets = buckets;
        for context in std::mem::take(&mut self.reselect) {
            self.select_first(context);
        }
        self.fix_selection();
    }

    pub fn sort_all_episodes(&mut self) {
        for item in self.items.values_mut() {
            ordering::sort_episodes(item);
        }
    }

    pub fn buckets(&self) -> &Buckets {
        &self.buckets
    }

    /// The ids shown in `context`, in display order.
    pub fn list(&self, context: DisplayContext) -> Vec<i64> {
        let b = &self.buckets;
        let lists: Vec<&Vec<i64>> = match context {
            DisplayContext::Home if self.show_finished_items => vec![
                &b.home_unfinished_shows,
                &b.home_finished_shows,
                &b.home_unfinished_movies,
                &b.home_finished_movies,
            ],
            DisplayContext::Home => vec![&b.home_unfinished_shows, &b.home_unfinished_movies],
            DisplayContext::Archives => vec![&b.archived_shows, &b.archived_movies],
        };
        lists.into_iter().flatten().copied().collect()
    }

    // ── Selection ───────────────────────────────────────────────

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn selected_id(&self, context: DisplayContext) -> Option<i64> {
        self.selection.get(context)
    }

    pub fn selected_item(&self, context: DisplayContext) -> Option<&Item> {
        self.selection
            .get(context)
            .and_then(|id| self.items.get(&id))
    }

    /// Select an item in `context`. Ids not in that list select nothing.
    pub fn select(&mut self, context: DisplayContext, item_id: Option<i64>) {
        let item_id = item_id.filter(|id| self.list(context).contains(id));
        self.set_selection(context, item_id);
    }

    /// Select the first item of `context`, or nothing when it is empty.
    pub fn select_first(&mut self, context: DisplayContext) -> Option<i64> {
        let first = self.list(context).first().copied();
        self.set_selection(context, first);
        first
    }

    /// Step the selection through `context` without wrapping. An unknown
    /// selection snaps to the first item.
    pub fn item_nav(&mut self, context: DisplayContext, step: Step) -> Option<i64> {
        let list = self.list(context);
        let current = self
            .selection
            .get(context)
            .and_then(|id| list.iter().position(|i| *i == id));

        let target = match (current, step) {
            (None, _) => list.first().copied(),
            (Some(i), Step::Next) => list.get((i + 1).min(list.len() - 1)).copied(),
            (Some(i), Step::Prev) => list.get(i.saturating_sub(1)).copied(),
        };
        self.set_selection(context, target);
        target
    }

    fn set_selection(&mut self, context: DisplayContext, item_id: Option<i64>) {
        self.reselect.retain(|c| *c != context);
        self.selection.set(context, item_id);
    }

    /// Reselect a context's first item when its selection left its list.
    fn fix_selection(&mut self) {
        for context in CONTEXTS {
            let still_listed = self
                .selection
                .get(context)
                .is_some_and(|id| self.list(context).contains(&id));
            if !still_listed {
                let first = self.list(context).first().copied();
                self.selection.set(context, first);
            }
        }
    }
}
