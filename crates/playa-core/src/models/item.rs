use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::episode::Episode;
use super::incoming::MovieFile;
use super::record::{Record, Row, Value};
use crate::normalize::alpha_name;
use crate::parse::parse_movie_name;

/// Whether an item is a show (many episodes) or a movie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Show,
    Movie,
}

impl ItemType {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::Show => "show",
            Self::Movie => "movie",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "show" => Some(Self::Show),
            "movie" => Some(Self::Movie),
            _ => None,
        }
    }
}

impl std::fmt::Display for ItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_db_str())
    }
}

/// Where an item's episodes come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    /// Files under the configured TV or movie directory.
    #[serde(rename = "local")]
    Local,
    /// A streaming/web item whose episodes come from TVDB.
    #[serde(rename = "external")]
    External,
    /// A YouTube playlist.
    #[serde(rename = "ytPlaylist")]
    YtPlaylist,
}

impl Source {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::External => "external",
            Self::YtPlaylist => "ytPlaylist",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "local" => Some(Self::Local),
            "external" => Some(Self::External),
            "ytPlaylist" => Some(Self::YtPlaylist),
            _ => None,
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_db_str())
    }
}

/// An item's current position in its episode list.
///
/// Stored in `items.current_episode_id`: `0` is `BeforeStart`, NULL is
/// `Finished`, anything else is an episode id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum EpisodePointer {
    #[default]
    BeforeStart,
    Finished,
    At(i64),
}

impl EpisodePointer {
    pub fn episode_id(&self) -> Option<i64> {
        match self {
            Self::At(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished)
    }

    pub fn to_value(self) -> Value {
        match self {
            Self::BeforeStart => Value::Integer(0),
            Self::Finished => Value::Null,
            Self::At(id) => Value::Integer(id),
        }
    }

    /// Decode a stored column. A missing column means a row written before
    /// the pointer existed, which is the `BeforeStart` default.
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            None => Self::BeforeStart,
            Some(Value::Null) => Self::Finished,
            Some(v) => match v.as_i64() {
                Some(id) if id > 0 => Self::At(id),
                _ => Self::BeforeStart,
            },
        }
    }
}

/// Raw fields for constructing a new item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub item_type: ItemType,
    pub source: Source,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub dir_name: Option<String>,
    #[serde(default)]
    pub pathname: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub tvdb_id: Option<i64>,
    #[serde(default)]
    pub tvdb_slug: Option<String>,
    #[serde(default)]
    pub is_archived: bool,
}

impl ItemRecord {
    pub fn new(item_type: ItemType, source: Source) -> Self {
        Self {
            item_type,
            source,
            name: None,
            dir_name: None,
            pathname: None,
            filename: None,
            url: None,
            duration: None,
            tvdb_id: None,
            tvdb_slug: None,
            is_archived: false,
        }
    }

    pub fn local_show(dir_name: &str) -> Self {
        Self {
            dir_name: Some(dir_name.to_string()),
            ..Self::new(ItemType::Show, Source::Local)
        }
    }

    pub fn local_movie(file: &MovieFile) -> Self {
        Self {
            pathname: Some(file.pathname.clone()),
            filename: Some(file.filename.clone()),
            duration: file.duration.clone(),
            ..Self::new(ItemType::Movie, Source::Local)
        }
    }
}

/// Update mask for an item. `None` leaves a field unchanged; for nullable
/// fields `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemPatch {
    pub name: Option<String>,
    pub is_archived: Option<bool>,
    pub tvdb_id: Option<Option<i64>>,
    pub tvdb_slug: Option<Option<String>>,
    pub artwork_filename: Option<Option<String>>,
    pub last_watched_at: Option<Option<i64>>,
    pub duration: Option<Option<String>>,
    pub order_is_reversed: Option<bool>,
    pub updated_from_source_at: Option<Option<i64>>,
}

impl ItemPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

const COMMON_COLUMNS: &[&str] = &[
    "is_archived",
    "type",
    "source",
    "name",
    "tvdb_id",
    "tvdb_slug",
    "last_watched_at",
    "artwork_filename",
    "order_is_reversed",
    "duration",
    "current_episode_id",
    "updated_from_source_at",
];
const LOCAL_SHOW_COLUMNS: &[&str] = &["dir_name"];
const LOCAL_MOVIE_COLUMNS: &[&str] = &["pathname", "filename"];
const REMOTE_COLUMNS: &[&str] = &["url"];

/// A show, movie, external item or playlist, with its episodes.
#[derive(Debug, Clone)]
pub struct Item {
    pub id: Option<i64>,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
    pub item_type: ItemType,
    pub source: Source,
    name: String,
    alpha_name: String,
    pub is_archived: bool,
    pub tvdb_id: Option<i64>,
    pub tvdb_slug: Option<String>,
    pub last_watched_at: Option<i64>,
    pub artwork_filename: Option<String>,
    pub dir_name: Option<String>,
    pub pathname: Option<String>,
    pub filename: Option<String>,
    pub url: Option<String>,
    pub order_is_reversed: bool,
    pub duration: Option<String>,
    pub current_episode: EpisodePointer,
    pub updated_from_source_at: Option<i64>,
    episode_ids: Vec<i64>,
    episodes: HashMap<i64, Episode>,
    new_episode_ids: HashSet<i64>,
}

impl Item {
    /// Build an unsaved item. A missing name falls back to the directory
    /// name, the name parsed from the movie filename, or the url.
    pub fn from_record(record: ItemRecord) -> Self {
        let name = record
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| default_name(&record));

        Self {
            id: None,
            created_at: None,
            updated_at: None,
            item_type: record.item_type,
            source: record.source,
            alpha_name: alpha_name(&name),
            name,
            is_archived: record.is_archived,
            tvdb_id: record.tvdb_id,
            tvdb_slug: record.tvdb_slug,
            last_watched_at: None,
            artwork_filename: None,
            dir_name: record.dir_name,
            pathname: record.pathname,
            filename: record.filename,
            url: record.url,
            order_is_reversed: false,
            duration: record.duration,
            current_episode: EpisodePointer::BeforeStart,
            updated_from_source_at: None,
            episode_ids: Vec::new(),
            episodes: HashMap::new(),
            new_episode_ids: HashSet::new(),
        }
    }

    /// Rebuild an item from a stored row. Unknown type/source strings fall
    /// back to a local show.
    pub fn from_row(row: &Row) -> Self {
        let item_type = row
            .text("type")
            .and_then(|s| ItemType::from_db_str(&s))
            .unwrap_or(ItemType::Show);
        let source = row
            .text("source")
            .and_then(|s| Source::from_db_str(&s))
            .unwrap_or(Source::Local);

        let mut item = Self::from_record(ItemRecord {
            name: row.text("name"),
            dir_name: row.text("dir_name"),
            pathname: row.text("pathname"),
            filename: row.text("filename"),
            url: row.text("url"),
            duration: row.text("duration"),
            tvdb_id: row.i64("tvdb_id"),
            tvdb_slug: row.text("tvdb_slug"),
            is_archived: row.flag("is_archived"),
            ..ItemRecord::new(item_type, source)
        });
        item.id = row.i64("id");
        item.created_at = row.i64("created_at");
        item.updated_at = row.i64("updated_at");
        item.last_watched_at = row.i64("last_watched_at");
        item.artwork_filename = row.text("artwork_filename");
        item.order_is_reversed = row.flag("order_is_reversed");
        item.current_episode = EpisodePointer::from_value(row.get("current_episode_id"));
        item.updated_from_source_at = row.i64("updated_from_source_at");
        item
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn alpha_name(&self) -> &str {
        &self.alpha_name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.alpha_name = alpha_name(&self.name);
    }

    pub fn apply(&mut self, patch: ItemPatch) {
        if let Some(name) = patch.name {
            self.set_name(name);
        }
        if let Some(v) = patch.is_archived {
            self.is_archived = v;
        }
        if let Some(v) = patch.tvdb_id {
            self.tvdb_id = v;
        }
        if let Some(v) = patch.tvdb_slug {
            self.tvdb_slug = v;
        }
        if let Some(v) = patch.artwork_filename {
            self.artwork_filename = v;
        }
        if let Some(v) = patch.last_watched_at {
            self.last_watched_at = v;
        }
        if let Some(v) = patch.duration {
            self.duration = v;
        }
        if let Some(v) = patch.order_is_reversed {
            self.order_is_reversed = v;
        }
        if let Some(v) = patch.updated_from_source_at {
            self.updated_from_source_at = v;
        }
    }

    /// Changes a re-scanned movie file would make. The pathname is the key,
    /// so only the probed duration can differ.
    pub fn diff_movie(&self, file: &MovieFile) -> ItemPatch {
        let mut patch = ItemPatch::default();
        if file.duration.is_some() && file.duration != self.duration {
            patch.duration = Some(file.duration.clone());
        }
        patch
    }

    /// Whether a remote item is due for a refresh from its source.
    pub fn needs_source_update(&self, now: i64, interval_secs: i64, forced: bool) -> bool {
        if forced {
            return true;
        }
        match self.updated_from_source_at {
            None => true,
            Some(at) => now - at >= interval_secs,
        }
    }

    // ── Episodes ────────────────────────────────────────────────

    /// Episode ids in display order.
    pub fn episode_ids(&self) -> &[i64] {
        &self.episode_ids
    }

    pub fn episode(&self, id: i64) -> Option<&Episode> {
        self.episodes.get(&id)
    }

    pub(crate) fn episode_mut(&mut self, id: i64) -> Option<&mut Episode> {
        self.episodes.get_mut(&id)
    }

    /// Episodes in display order.
    pub fn episodes(&self) -> impl Iterator<Item = &Episode> {
        self.episode_ids.iter().filter_map(|id| self.episodes.get(id))
    }

    pub fn episode_count(&self) -> usize {
        self.episode_ids.len()
    }

    pub fn current_episode(&self) -> Option<&Episode> {
        self.current_episode
            .episode_id()
            .and_then(|id| self.episodes.get(&id))
    }

    /// Insert or replace an episode. Returns `true` when the id was not
    /// present before. Episodes without an id are ignored.
    pub fn insert_episode(&mut self, episode: Episode) -> bool {
        let Some(id) = episode.id else {
            return false;
        };
        let is_new = self.episodes.insert(id, episode).is_none();
        if is_new {
            self.episode_ids.push(id);
        }
        is_new
    }

    /// Remove an episode from the maps. The pointer is left to the caller.
    pub fn remove_episode(&mut self, id: i64) -> Option<Episode> {
        let episode = self.episodes.remove(&id)?;
        self.episode_ids.retain(|e| *e != id);
        self.new_episode_ids.remove(&id);
        Some(episode)
    }

    pub fn new_episode_ids(&self) -> &HashSet<i64> {
        &self.new_episode_ids
    }

    pub(crate) fn mark_new_episode(&mut self, id: i64) {
        self.new_episode_ids.insert(id);
    }

    pub(crate) fn clear_new_episodes(&mut self) {
        self.new_episode_ids.clear();
    }

    pub(crate) fn set_episode_order(&mut self, ids: Vec<i64>) {
        self.episode_ids = ids;
    }

    /// Move a `BeforeStart`/`Finished` pointer onto the first new episode in
    /// display order. Returns `true` if the pointer moved.
    pub fn set_current_to_new_episode(&mut self) -> bool {
        if matches!(self.current_episode, EpisodePointer::At(_)) {
            return false;
        }
        let first_new = self
            .episode_ids
            .iter()
            .find(|id| self.new_episode_ids.contains(id))
            .copied();
        match first_new {
            Some(id) => {
                self.current_episode = EpisodePointer::At(id);
                true
            }
            None => false,
        }
    }

    // ── Persistence ─────────────────────────────────────────────

    fn column_sets(&self) -> [&'static [&'static str]; 2] {
        let specific = match (self.source, self.item_type) {
            (Source::Local, ItemType::Show) => LOCAL_SHOW_COLUMNS,
            (Source::Local, ItemType::Movie) => LOCAL_MOVIE_COLUMNS,
            _ => REMOTE_COLUMNS,
        };
        [COMMON_COLUMNS, specific]
    }

    fn column_value(&self, column: &str) -> Value {
        match column {
            "is_archived" => self.is_archived.into(),
            "type" => self.item_type.as_db_str().into(),
            "source" => self.source.as_db_str().into(),
            "name" => self.name.as_str().into(),
            "tvdb_id" => self.tvdb_id.into(),
            "tvdb_slug" => self.tvdb_slug.clone().into(),
            "last_watched_at" => self.last_watched_at.into(),
            "artwork_filename" => self.artwork_filename.clone().into(),
            "order_is_reversed" => self.order_is_reversed.into(),
            "duration" => self.duration.clone().into(),
            "current_episode_id" => self.current_episode.to_value(),
            "updated_from_source_at" => self.updated_from_source_at.into(),
            "dir_name" => self.dir_name.clone().into(),
            "pathname" => self.pathname.clone().into(),
            "filename" => self.filename.clone().into(),
            "url" => self.url.clone().into(),
            _ => Value::Null,
        }
    }

    /// The persisted field list for this item's type and source.
    pub fn to_record(&self) -> Record {
        let mut record = Record::new();
        for columns in self.column_sets() {
            for &column in columns {
                record.push(column, self.column_value(column));
            }
        }
        record
    }
}

fn default_name(record: &ItemRecord) -> String {
    let fallback = match (record.source, record.item_type) {
        (Source::Local, ItemType::Show) => record.dir_name.clone(),
        (Source::Local, ItemType::Movie) => {
            record.filename.as_deref().map(parse_movie_name)
        }
        _ => record.url.clone(),
    };
    fallback.unwrap_or_default()
}
