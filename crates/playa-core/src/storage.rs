use std::path::Path;

use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection, ToSql};

use crate::error::PlayaError;
use crate::models::{unix_now, Record, Row, Table, Value};
use crate::persistence::Persistence;

const SCHEMA_V1: &str = include_str!("../../../migrations/001_initial.sql");
const SCHEMA_V2: &str = include_str!("../../../migrations/002_add_finale_columns.sql");

/// SQLite-backed storage for the playa catalog.
pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// Open (or create) the database at the given path and run migrations.
    pub fn open(path: &Path) -> Result<Self, PlayaError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        run_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, PlayaError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        run_migrations(&conn)?;
        Ok(Self { conn })
    }

    pub fn schema_version(&self) -> Result<i32, PlayaError> {
        Ok(self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?)
    }

    // ── Row operations ──────────────────────────────────────────

    /// Insert a record, stamping `created_at`/`updated_at`.
    pub fn insert_row(&self, table: Table, record: &Record) -> Result<i64, PlayaError> {
        let now = unix_now();
        let columns: Vec<&str> = record
            .columns()
            .chain(["created_at", "updated_at"])
            .collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            columns.join(", "),
            placeholders.join(", ")
        );

        let stamp = Value::Integer(now);
        let values = record.values().chain([&stamp, &stamp]);
        self.conn.execute(&sql, params_from_iter(values))?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Overwrite the record's columns on row `id`, stamping `updated_at`.
    pub fn update_row(&self, table: Table, id: i64, record: &Record) -> Result<(), PlayaError> {
        let now = Value::Integer(unix_now());
        let mut assignments: Vec<String> = record
            .columns()
            .enumerate()
            .map(|(i, c)| format!("{c} = ?{}", i + 1))
            .collect();
        assignments.push(format!("updated_at = ?{}", record.len() + 1));
        let sql = format!(
            "UPDATE {table} SET {} WHERE id = ?{}",
            assignments.join(", "),
            record.len() + 2
        );

        let key = Value::Integer(id);
        let values = record.values().chain([&now, &key]);
        let changed = self.conn.execute(&sql, params_from_iter(values))?;
        if changed == 0 {
            return Err(PlayaError::WriteFailed(format!("no {table} row with id {id}")));
        }
        Ok(())
    }

    pub fn update_column(
        &self,
        table: Table,
        id: i64,
        column: &str,
        value: &Value,
    ) -> Result<(), PlayaError> {
        let sql = format!("UPDATE {table} SET {column} = ?1 WHERE id = ?2");
        let changed = self.conn.execute(&sql, rusqlite::params![value, id])?;
        if changed == 0 {
            return Err(PlayaError::WriteFailed(format!("no {table} row with id {id}")));
        }
        Ok(())
    }

    pub fn delete_row(&self, table: Table, id: i64) -> Result<(), PlayaError> {
        let sql = format!("DELETE FROM {table} WHERE id = ?1");
        self.conn.execute(&sql, [id])?;
        Ok(())
    }

    /// Every row of `table` in id order.
    pub fn all_rows(&self, table: Table) -> Result<Vec<Row>, PlayaError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT * FROM {table} ORDER BY id"))?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let rows = stmt
            .query_map([], |row| {
                let mut out = Row::new();
                for (i, name) in names.iter().enumerate() {
                    out.insert(name.as_str(), from_sql(row.get_ref(i)?));
                }
                Ok(out)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl Persistence for Storage {
    async fn insert(&self, table: Table, record: &Record) -> Result<i64, PlayaError> {
        self.insert_row(table, record)
    }

    async fn update(&self, table: Table, id: i64, record: &Record) -> Result<(), PlayaError> {
        self.update_row(table, id, record)
    }

    async fn update_field(
        &self,
        table: Table,
        id: i64,
        column: &'static str,
        value: Value,
    ) -> Result<(), PlayaError> {
        self.update_column(table, id, column, &value)
    }

    async fn delete(&self, table: Table, id: i64) -> Result<(), PlayaError> {
        self.delete_row(table, id)
    }

    async fn select_all(&self, table: Table) -> Result<Vec<Row>, PlayaError> {
        self.all_rows(table)
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(v) => ToSqlOutput::Borrowed(ValueRef::Integer(*v)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Integer(v),
        ValueRef::Real(v) => Value::Text(v.to_string()),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

/// Run schema migrations using `PRAGMA user_version` for version tracking.
fn run_migrations(conn: &Connection) -> Result<(), PlayaError> {
    let version: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .unwrap_or(0);

    if version < 1 {
        conn.execute_batch(SCHEMA_V1)?;
        conn.pragma_update(None, "user_version", 1)?;
    }
    if version < 2 {
        conn.execute_batch(SCHEMA_V2)?;
        conn.pragma_update(None, "user_version", 2)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn show_record(dir_name: &str) -> Record {
        let mut record = Record::new();
        record.push("type", "show");
        record.push("source", "local");
        record.push("name", dir_name);
        record.push("dir_name", dir_name);
        record
    }

    #[test]
    fn test_migrations_reach_latest_version() {
        let storage = Storage::open_memory().unwrap();
        assert_eq!(storage.schema_version().unwrap(), 2);
    }

    #[test]
    fn test_reopen_file_keeps_data() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("playa.db");
        {
            let storage = Storage::open(&path).unwrap();
            storage.insert_row(Table::Items, &show_record("Foo")).unwrap();
        }
        let storage = Storage::open(&path).unwrap();
        assert_eq!(storage.all_rows(Table::Items).unwrap().len(), 1);
    }

    #[test]
    fn test_insert_stamps_timestamps_and_defaults() {
        let storage = Storage::open_memory().unwrap();
        let id = storage.insert_row(Table::Items, &show_record("Foo")).unwrap();

        let rows = storage.all_rows(Table::Items).unwrap();
        assert_eq!(rows[0].i64("id"), Some(id));
        assert!(rows[0].i64("created_at").is_some());
        assert!(rows[0].i64("updated_at").is_some());
        assert_eq!(rows[0].i64("current_episode_id"), Some(0));
        assert!(!rows[0].flag("is_archived"));
    }

    #[test]
    fn test_update_and_update_column() {
        let storage = Storage::open_memory().unwrap();
        let id = storage.insert_row(Table::Items, &show_record("Foo")).unwrap();

        let mut record = Record::new();
        record.push("name", "Bar");
        storage.update_row(Table::Items, id, &record).unwrap();
        storage
            .update_column(Table::Items, id, "current_episode_id", &Value::Null)
            .unwrap();

        let row = &storage.all_rows(Table::Items).unwrap()[0];
        assert_eq!(row.text("name").as_deref(), Some("Bar"));
        assert_eq!(row.get("current_episode_id"), Some(&Value::Null));
    }

    #[test]
    fn test_update_missing_row_fails() {
        let storage = Storage::open_memory().unwrap();
        let err = storage
            .update_column(Table::Items, 5, "name", &Value::from("x"))
            .unwrap_err();
        assert!(matches!(err, PlayaError::WriteFailed(_)));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let storage = Storage::open_memory().unwrap();
        let id = storage.insert_row(Table::Items, &show_record("Foo")).unwrap();
        storage.delete_row(Table::Items, id).unwrap();
        storage.delete_row(Table::Items, id).unwrap();
        assert!(storage.all_rows(Table::Items).unwrap().is_empty());
    }

    #[test]
    fn test_episode_finale_columns_exist() {
        let storage = Storage::open_memory().unwrap();
        let item_id = storage.insert_row(Table::Items, &show_record("Foo")).unwrap();
        let mut record = Record::new();
        record.push("item_id", item_id);
        record.push("season_num", 1_i64);
        record.push("episode_num", 10_i64);
        record.push("is_season_finale", true);
        storage.insert_row(Table::Episodes, &record).unwrap();

        let row = &storage.all_rows(Table::Episodes).unwrap()[0];
        assert!(row.flag("is_season_finale"));
        assert!(!row.flag("is_series_finale"));
    }
}
