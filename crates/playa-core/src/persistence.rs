//! The persistence seam between the catalog and a database.

use std::future::Future;

use crate::error::PlayaError;
use crate::models::{unix_now, Episode, Item, Record, Row, Source, Table, Value};

/// Row-level storage operations the catalog needs.
///
/// Implementations never see domain types, only static column lists and
/// values; `Db` does the translation.
pub trait Persistence {
    /// Insert a row and return its new id.
    fn insert(
        &self,
        table: Table,
        record: &Record,
    ) -> impl Future<Output = Result<i64, PlayaError>>;

    fn update(
        &self,
        table: Table,
        id: i64,
        record: &Record,
    ) -> impl Future<Output = Result<(), PlayaError>>;

    /// Write a single column.
    fn update_field(
        &self,
        table: Table,
        id: i64,
        column: &'static str,
        value: Value,
    ) -> impl Future<Output = Result<(), PlayaError>>;

    /// Delete a row. Deleting a missing row succeeds.
    fn delete(&self, table: Table, id: i64) -> impl Future<Output = Result<(), PlayaError>>;

    fn select_all(&self, table: Table) -> impl Future<Output = Result<Vec<Row>, PlayaError>>;
}

/// Outcome of a write through `Db`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    Written,
    /// No database handle; nothing was written.
    NotConnected,
}

/// Optional persistence handle plus the domain-level writes built on it.
pub struct Db<P> {
    inner: Option<P>,
}

impl<P: Persistence> Db<P> {
    pub fn connected(persistence: P) -> Self {
        Self {
            inner: Some(persistence),
        }
    }

    pub fn disconnected() -> Self {
        Self { inner: None }
    }

    pub fn is_connected(&self) -> bool {
        self.inner.is_some()
    }

    pub fn inner(&self) -> Option<&P> {
        self.inner.as_ref()
    }

    /// Insert a new item (assigning its id) or update an existing one.
    pub async fn save_item(&self, item: &mut Item) -> Result<WriteStatus, PlayaError> {
        let Some(db) = &self.inner else {
            return Ok(WriteStatus::NotConnected);
        };
        let record = item.to_record();
        let now = unix_now();
        match item.id {
            Some(id) => {
                db.update(Table::Items, id, &record).await.map_err(write_failed)?;
            }
            None => {
                let id = db.insert(Table::Items, &record).await.map_err(write_failed)?;
                item.id = Some(id);
                item.created_at = Some(now);
            }
        }
        item.updated_at = Some(now);
        Ok(WriteStatus::Written)
    }

    /// Insert or update an episode with the field list of its item's source.
    pub async fn save_episode(
        &self,
        source: Source,
        episode: &mut Episode,
    ) -> Result<WriteStatus, PlayaError> {
        let Some(db) = &self.inner else {
            return Ok(WriteStatus::NotConnected);
        };
        let record = episode.to_record(source);
        let now = unix_now();
        match episode.id {
            Some(id) => {
                db.update(Table::Episodes, id, &record)
                    .await
                    .map_err(write_failed)?;
            }
            None => {
                let id = db
                    .insert(Table::Episodes, &record)
                    .await
                    .map_err(write_failed)?;
                episode.id = Some(id);
                episode.created_at = Some(now);
            }
        }
        episode.updated_at = Some(now);
        Ok(WriteStatus::Written)
    }

    /// Persist only `current_episode_id`.
    pub async fn update_current_episode(&self, item: &Item) -> Result<WriteStatus, PlayaError> {
        self.write_item_field(item, "current_episode_id", item.current_episode.to_value())
            .await
    }

    /// Persist only `last_watched_at`.
    pub async fn update_last_watched_at(&self, item: &Item) -> Result<WriteStatus, PlayaError> {
        self.write_item_field(item, "last_watched_at", item.last_watched_at.into())
            .await
    }

    async fn write_item_field(
        &self,
        item: &Item,
        column: &'static str,
        value: Value,
    ) -> Result<WriteStatus, PlayaError> {
        let Some(db) = &self.inner else {
            return Ok(WriteStatus::NotConnected);
        };
        let id = saved_id(item.id, "item")?;
        db.update_field(Table::Items, id, column, value)
            .await
            .map_err(write_failed)?;
        Ok(WriteStatus::Written)
    }

    /// Delete every episode row of `item`, then the item row.
    ///
    /// Stops at the first failure; since deleting a missing row succeeds,
    /// retrying finishes the job.
    pub async fn delete_item(&self, item: &Item) -> Result<WriteStatus, PlayaError> {
        let Some(db) = &self.inner else {
            return Ok(WriteStatus::NotConnected);
        };
        let id = saved_id(item.id, "item")?;
        for episode_id in item.episode_ids() {
            db.delete(Table::Episodes, *episode_id)
                .await
                .map_err(write_failed)?;
        }
        db.delete(Table::Items, id).await.map_err(write_failed)?;
        Ok(WriteStatus::Written)
    }

    pub async fn delete_episode(&self, episode_id: i64) -> Result<WriteStatus, PlayaError> {
        let Some(db) = &self.inner else {
            return Ok(WriteStatus::NotConnected);
        };
        db.delete(Table::Episodes, episode_id)
            .await
            .map_err(write_failed)?;
        Ok(WriteStatus::Written)
    }

    /// All rows of `table`; empty without a handle.
    pub async fn load(&self, table: Table) -> Result<Vec<Row>, PlayaError> {
        match &self.inner {
            Some(db) => db.select_all(table).await,
            None => Ok(Vec::new()),
        }
    }
}

fn saved_id(id: Option<i64>, what: &str) -> Result<i64, PlayaError> {
    id.ok_or_else(|| PlayaError::NotFound(format!("{what} has not been saved yet")))
}

fn write_failed(e: PlayaError) -> PlayaError {
    match e {
        PlayaError::WriteFailed(_) => e,
        other => PlayaError::WriteFailed(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EpisodeFile, ItemRecord};
    use crate::storage::Storage;

    fn db() -> Db<Storage> {
        Db::connected(Storage::open_memory().unwrap())
    }

    #[tokio::test]
    async fn test_save_item_assigns_id_then_updates() {
        let db = db();
        let mut item = Item::from_record(ItemRecord::local_show("Foo"));
        assert_eq!(db.save_item(&mut item).await.unwrap(), WriteStatus::Written);
        let id = item.id.unwrap();

        item.set_name("Bar");
        db.save_item(&mut item).await.unwrap();

        let rows = db.load(Table::Items).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].i64("id"), Some(id));
        assert_eq!(rows[0].text("name").as_deref(), Some("Bar"));
    }

    #[tokio::test]
    async fn test_disconnected_writes_nothing() {
        let db: Db<Storage> = Db::disconnected();
        let mut item = Item::from_record(ItemRecord::local_show("Foo"));
        assert_eq!(
            db.save_item(&mut item).await.unwrap(),
            WriteStatus::NotConnected
        );
        assert_eq!(item.id, None);
        assert!(db.load(Table::Items).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_of_missing_row_is_write_failed() {
        let db = db();
        let mut item = Item::from_record(ItemRecord::local_show("Foo"));
        item.id = Some(99);
        let err = db.save_item(&mut item).await.unwrap_err();
        assert!(matches!(err, PlayaError::WriteFailed(_)));
    }

    #[tokio::test]
    async fn test_delete_item_is_two_phase_and_idempotent() {
        let db = db();
        let mut item = Item::from_record(ItemRecord::local_show("Foo"));
        db.save_item(&mut item).await.unwrap();

        let mut episode = Episode::from_file(
            item.id.unwrap(),
            &EpisodeFile {
                show_dir_name: "Foo".into(),
                pathname: "/tv/Foo/a.mkv".into(),
                filename: "a.mkv".into(),
                duration: None,
            },
        );
        db.save_episode(Source::Local, &mut episode).await.unwrap();
        item.insert_episode(episode);

        db.delete_item(&item).await.unwrap();
        db.delete_item(&item).await.unwrap();
        assert!(db.load(Table::Items).await.unwrap().is_empty());
        assert!(db.load(Table::Episodes).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_current_episode_writes_one_column() {
        let db = db();
        let mut item = Item::from_record(ItemRecord::local_show("Foo"));
        db.save_item(&mut item).await.unwrap();

        item.current_episode = crate::models::EpisodePointer::Finished;
        item.set_name("Unsaved rename");
        db.update_current_episode(&item).await.unwrap();

        let row = &db.load(Table::Items).await.unwrap()[0];
        assert_eq!(row.get("current_episode_id"), Some(&Value::Null));
        assert_eq!(row.text("name").as_deref(), Some("Foo"));
    }
}
