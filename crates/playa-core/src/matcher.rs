//! Natural-key lookup of incoming records against the catalog.
//!
//! Keys are strict: a renamed file or a re-numbered episode is a different
//! entity. Finding more than one entry for a key means the catalog is
//! corrupt, so it is reported instead of picking one.

use std::fmt;

use crate::catalog::Catalog;
use crate::error::PlayaError;
use crate::models::{Episode, Item, ItemType, Source};

/// Identity of an episode within its item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EpisodeKey {
    /// Local file.
    Pathname(String),
    /// TVDB episode; both numbers are required.
    SeasonEpisode(i64, i64),
    /// Playlist video.
    Url(String),
}

impl EpisodeKey {
    /// The key an existing episode of a `source` item is matched by.
    /// `None` when the fields making up the key are missing.
    pub fn of(episode: &Episode, source: Source) -> Option<Self> {
        match source {
            Source::Local => episode.pathname.clone().map(Self::Pathname),
            Source::External => match (episode.season_num, episode.episode_num) {
                (Some(s), Some(e)) => Some(Self::SeasonEpisode(s, e)),
                _ => None,
            },
            Source::YtPlaylist => episode.url.clone().map(Self::Url),
        }
    }

    pub fn matches(&self, episode: &Episode) -> bool {
        match self {
            Self::Pathname(p) => episode.pathname.as_deref() == Some(p.as_str()),
            Self::SeasonEpisode(s, e) => {
                episode.season_num == Some(*s) && episode.episode_num == Some(*e)
            }
            Self::Url(u) => episode.url.as_deref() == Some(u.as_str()),
        }
    }
}

impl fmt::Display for EpisodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pathname(p) => write!(f, "pathname {p}"),
            Self::SeasonEpisode(s, e) => write!(f, "S{s:02}E{e:02}"),
            Self::Url(u) => write!(f, "url {u}"),
        }
    }
}

/// Identity of an item within the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemKey {
    LocalShow { dir_name: String },
    LocalMovie { pathname: String },
    Remote {
        item_type: ItemType,
        source: Source,
        url: String,
    },
}

impl ItemKey {
    pub fn of(item: &Item) -> Option<Self> {
        match (item.source, item.item_type) {
            (Source::Local, ItemType::Show) => item
                .dir_name
                .clone()
                .map(|dir_name| Self::LocalShow { dir_name }),
            (Source::Local, ItemType::Movie) => item
                .pathname
                .clone()
                .map(|pathname| Self::LocalMovie { pathname }),
            (source, item_type) => item.url.clone().map(|url| Self::Remote {
                item_type,
                source,
                url,
            }),
        }
    }

    pub fn matches(&self, item: &Item) -> bool {
        match self {
            Self::LocalShow { dir_name } => {
                item.source == Source::Local
                    && item.item_type == ItemType::Show
                    && item.dir_name.as_deref() == Some(dir_name.as_str())
            }
            Self::LocalMovie { pathname } => {
                item.source == Source::Local
                    && item.item_type == ItemType::Movie
                    && item.pathname.as_deref() == Some(pathname.as_str())
            }
            Self::Remote {
                item_type,
                source,
                url,
            } => {
                item.source == *source
                    && item.item_type == *item_type
                    && item.url.as_deref() == Some(url.as_str())
            }
        }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocalShow { dir_name } => write!(f, "show dir {dir_name}"),
            Self::LocalMovie { pathname } => write!(f, "movie {pathname}"),
            Self::Remote { source, url, .. } => write!(f, "{source} {url}"),
        }
    }
}

/// Find the episode of `item` with `key`.
pub fn find_episode(item: &Item, key: &EpisodeKey) -> Result<Option<i64>, PlayaError> {
    let scope = || format!("item {}", item.id.unwrap_or_default());
    single(
        item.episodes().filter(|e| key.matches(e)).filter_map(|e| e.id),
        scope,
        key,
    )
}

/// Find the catalog item with `key`.
pub fn find_item(catalog: &Catalog, key: &ItemKey) -> Result<Option<i64>, PlayaError> {
    single(
        catalog.items().filter(|i| key.matches(i)).filter_map(|i| i.id),
        || "catalog".to_string(),
        key,
    )
}

fn single(
    mut ids: impl Iterator<Item = i64>,
    scope: impl FnOnce() -> String,
    key: &impl fmt::Display,
) -> Result<Option<i64>, PlayaError> {
    let first = ids.next();
    if first.is_some() && ids.next().is_some() {
        return Err(PlayaError::MatchAmbiguous {
            scope: scope(),
            key: key.to_string(),
        });
    }
    Ok(first)
}
