use super::incoming::{EpisodeFile, PlaylistVideo, RemoteEpisode};
use super::item::Source;
use super::record::{Record, Row, Value};
use crate::normalize::slugify;
use crate::parse::parse_episode_filename;

/// One playable unit under an item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Episode {
    pub id: Option<i64>,
    pub item_id: i64,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
    pub pathname: Option<String>,
    pub filename: Option<String>,
    pub url: Option<String>,
    pub season_num: Option<i64>,
    pub episode_num: Option<i64>,
    pub order_num: Option<i64>,
    pub name: Option<String>,
    pub overview: Option<String>,
    /// Unix seconds.
    pub released_on: Option<i64>,
    pub duration: Option<String>,
    pub is_season_finale: bool,
    pub is_series_finale: bool,
}

/// Update mask for an episode; same conventions as `ItemPatch`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EpisodePatch {
    pub filename: Option<Option<String>>,
    pub season_num: Option<Option<i64>>,
    pub episode_num: Option<Option<i64>>,
    pub order_num: Option<Option<i64>>,
    pub name: Option<Option<String>>,
    pub overview: Option<Option<String>>,
    pub released_on: Option<Option<i64>>,
    pub duration: Option<Option<String>>,
    pub is_season_finale: Option<bool>,
    pub is_series_finale: Option<bool>,
}

impl EpisodePatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

const COMMON_COLUMNS: &[&str] = &["item_id", "name", "overview", "duration", "searchable_text"];
const LOCAL_COLUMNS: &[&str] = &[
    "pathname",
    "filename",
    "season_num",
    "episode_num",
    "released_on",
];
const EXTERNAL_COLUMNS: &[&str] = &[
    "season_num",
    "episode_num",
    "released_on",
    "is_season_finale",
    "is_series_finale",
];
const PLAYLIST_COLUMNS: &[&str] = &["url", "order_num", "released_on"];

/// Fill `slot` when `new` differs from `old`.
fn diff_field<T: PartialEq + Clone>(slot: &mut Option<T>, old: &T, new: &T) {
    if old != new {
        *slot = Some(new.clone());
    }
}

impl Episode {
    /// A scanned file. Season, episode and name come from the filename.
    pub fn from_file(item_id: i64, file: &EpisodeFile) -> Self {
        let parsed = parse_episode_filename(&file.filename);
        Self {
            item_id,
            pathname: Some(file.pathname.clone()),
            filename: Some(file.filename.clone()),
            season_num: parsed.season_num,
            episode_num: parsed.episode_num,
            name: parsed.name,
            duration: file.duration.clone(),
            ..Self::default()
        }
    }

    pub fn from_remote(item_id: i64, remote: &RemoteEpisode) -> Self {
        Self {
            item_id,
            season_num: remote.season_num,
            episode_num: remote.episode_num,
            name: remote.name.clone(),
            overview: remote.overview.clone(),
            released_on: remote.released_on,
            duration: remote.duration.clone(),
            is_season_finale: remote.is_season_finale,
            is_series_finale: remote.is_series_finale,
            ..Self::default()
        }
    }

    pub fn from_video(item_id: i64, video: &PlaylistVideo) -> Self {
        Self {
            item_id,
            url: Some(video.url.clone()),
            order_num: video.order_num,
            name: video.name.clone(),
            overview: video.overview.clone(),
            released_on: video.released_on,
            duration: video.duration.clone(),
            ..Self::default()
        }
    }

    pub fn from_row(row: &Row) -> Self {
        Self {
            id: row.i64("id"),
            item_id: row.i64("item_id").unwrap_or_default(),
            created_at: row.i64("created_at"),
            updated_at: row.i64("updated_at"),
            pathname: row.text("pathname"),
            filename: row.text("filename"),
            url: row.text("url"),
            season_num: row.i64("season_num"),
            episode_num: row.i64("episode_num"),
            order_num: row.i64("order_num"),
            name: row.text("name"),
            overview: row.text("overview"),
            released_on: row.i64("released_on"),
            duration: row.text("duration"),
            is_season_finale: row.flag("is_season_finale"),
            is_series_finale: row.flag("is_series_finale"),
        }
    }

    pub fn apply(&mut self, patch: EpisodePatch) {
        if let Some(v) = patch.filename {
            self.filename = v;
        }
        if let Some(v) = patch.season_num {
            self.season_num = v;
        }
        if let Some(v) = patch.episode_num {
            self.episode_num = v;
        }
        if let Some(v) = patch.order_num {
            self.order_num = v;
        }
        if let Some(v) = patch.name {
            self.name = v;
        }
        if let Some(v) = patch.overview {
            self.overview = v;
        }
        if let Some(v) = patch.released_on {
            self.released_on = v;
        }
        if let Some(v) = patch.duration {
            self.duration = v;
        }
        if let Some(v) = patch.is_season_finale {
            self.is_season_finale = v;
        }
        if let Some(v) = patch.is_series_finale {
            self.is_series_finale = v;
        }
    }

    /// Changes a re-scanned file would make.
    ///
    /// Parsed season/episode/name are only refreshed when the filename
    /// itself changed, so names enriched from TVDB survive a rescan.
    pub fn diff_file(&self, file: &EpisodeFile) -> EpisodePatch {
        let mut patch = EpisodePatch::default();
        let filename = Some(file.filename.clone());
        if filename != self.filename {
            let parsed = parse_episode_filename(&file.filename);
            patch.filename = Some(filename);
            diff_field(&mut patch.season_num, &self.season_num, &parsed.season_num);
            diff_field(&mut patch.episode_num, &self.episode_num, &parsed.episode_num);
            diff_field(&mut patch.name, &self.name, &parsed.name);
        }
        if file.duration.is_some() {
            diff_field(&mut patch.duration, &self.duration, &file.duration);
        }
        patch
    }

    pub fn diff_remote(&self, remote: &RemoteEpisode) -> EpisodePatch {
        let mut patch = EpisodePatch::default();
        diff_field(&mut patch.name, &self.name, &remote.name);
        diff_field(&mut patch.overview, &self.overview, &remote.overview);
        diff_field(&mut patch.released_on, &self.released_on, &remote.released_on);
        if remote.duration.is_some() {
            diff_field(&mut patch.duration, &self.duration, &remote.duration);
        }
        diff_field(
            &mut patch.is_season_finale,
            &self.is_season_finale,
            &remote.is_season_finale,
        );
        diff_field(
            &mut patch.is_series_finale,
            &self.is_series_finale,
            &remote.is_series_finale,
        );
        patch
    }

    pub fn diff_video(&self, video: &PlaylistVideo) -> EpisodePatch {
        let mut patch = EpisodePatch::default();
        diff_field(&mut patch.name, &self.name, &video.name);
        diff_field(&mut patch.overview, &self.overview, &video.overview);
        diff_field(&mut patch.order_num, &self.order_num, &video.order_num);
        diff_field(&mut patch.released_on, &self.released_on, &video.released_on);
        if video.duration.is_some() {
            diff_field(&mut patch.duration, &self.duration, &video.duration);
        }
        patch
    }

    /// `S01E02`, when both numbers are known.
    pub fn sxxexx(&self) -> Option<String> {
        match (self.season_num, self.episode_num) {
            (Some(s), Some(e)) => Some(format!("S{s:02}E{e:02}")),
            _ => None,
        }
    }

    /// Lowercased words of the label, name, filename and overview.
    pub fn searchable_text(&self) -> String {
        let filename = self.filename.as_ref().map(|f| f.replace(['.', '_'], " "));
        let label = self.sxxexx();
        let parts: Vec<&str> = [
            label.as_deref(),
            self.name.as_deref(),
            filename.as_deref(),
            self.overview.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect();
        slugify(&parts.join(" "), " ")
    }

    /// Display label: `S01E02 Name`, or whatever of the two is known,
    /// falling back to the filename or url.
    pub fn display_name(&self) -> String {
        match (self.sxxexx(), self.name.as_deref()) {
            (Some(label), Some(name)) => format!("{label} {name}"),
            (Some(label), None) => label,
            (None, Some(name)) => name.to_string(),
            (None, None) => self
                .filename
                .clone()
                .or_else(|| self.url.clone())
                .unwrap_or_default(),
        }
    }

    fn column_value(&self, column: &str) -> Value {
        match column {
            "item_id" => self.item_id.into(),
            "name" => self.name.clone().into(),
            "overview" => self.overview.clone().into(),
            "duration" => self.duration.clone().into(),
            "searchable_text" => self.searchable_text().into(),
            "pathname" => self.pathname.clone().into(),
            "filename" => self.filename.clone().into(),
            "url" => self.url.clone().into(),
            "season_num" => self.season_num.into(),
            "episode_num" => self.episode_num.into(),
            "order_num" => self.order_num.into(),
            "released_on" => self.released_on.into(),
            "is_season_finale" => self.is_season_finale.into(),
            "is_series_finale" => self.is_series_finale.into(),
            _ => Value::Null,
        }
    }

    /// The persisted field list for an episode of a `source` item.
    pub fn to_record(&self, source: Source) -> Record {
        let specific = match source {
            Source::Local => LOCAL_COLUMNS,
            Source::External => EXTERNAL_COLUMNS,
            Source::YtPlaylist => PLAYLIST_COLUMNS,
        };
        let mut record = Record::new();
        for &column in COMMON_COLUMNS.iter().chain(specific) {
            record.push(column, self.column_value(column));
        }
        record
    }
}
