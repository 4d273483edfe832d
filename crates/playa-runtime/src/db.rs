use std::path::Path;

use tokio::sync::{mpsc, oneshot};

use playa_core::error::PlayaError;
use playa_core::models::{Record, Row, Table, Value};
use playa_core::persistence::Persistence;
use playa_core::storage::Storage;

/// Handle to the thread that owns the SQLite connection.
#[derive(Clone)]
pub struct DbHandle {
    tx: mpsc::UnboundedSender<DbCommand>,
}

enum DbCommand {
    Insert {
        table: Table,
        record: Record,
        reply: oneshot::Sender<Result<i64, PlayaError>>,
    },
    Update {
        table: Table,
        id: i64,
        record: Record,
        reply: oneshot::Sender<Result<(), PlayaError>>,
    },
    UpdateField {
        table: Table,
        id: i64,
        column: &'static str,
        value: Value,
        reply: oneshot::Sender<Result<(), PlayaError>>,
    },
    Delete {
        table: Table,
        id: i64,
        reply: oneshot::Sender<Result<(), PlayaError>>,
    },
    SelectAll {
        table: Table,
        reply: oneshot::Sender<Result<Vec<Row>, PlayaError>>,
    },
}

impl DbHandle {
    pub fn open(path: &Path) -> Option<Self> {
        let storage = Storage::open(path)
            .map_err(|e| tracing::error!("Failed to open database: {e}"))
            .ok()?;
        Self::spawn(storage)
    }

    /// An actor over an in-memory database.
    pub fn open_memory() -> Option<Self> {
        let storage = Storage::open_memory()
            .map_err(|e| tracing::error!("Failed to open in-memory database: {e}"))
            .ok()?;
        Self::spawn(storage)
    }

    fn spawn(storage: Storage) -> Option<Self> {
        let (tx, rx) = mpsc::unbounded_channel();

        std::thread::Builder::new()
            .name("db-actor".into())
            .spawn(move || actor_loop(storage, rx))
            .map_err(|e| tracing::error!("Failed to spawn DB thread: {e}"))
            .ok()?;

        Some(Self { tx })
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T, PlayaError>>) -> DbCommand,
    ) -> Result<T, PlayaError> {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(make(reply));
        rx.await
            .unwrap_or_else(|_| Err(PlayaError::Config("DB actor closed".into())))
    }
}

impl Persistence for DbHandle {
    async fn insert(&self, table: Table, record: &Record) -> Result<i64, PlayaError> {
        let record = record.clone();
        self.request(|reply| DbCommand::Insert {
            table,
            record,
            reply,
        })
        .await
    }

    async fn update(&self, table: Table, id: i64, record: &Record) -> Result<(), PlayaError> {
        let record = record.clone();
        self.request(|reply| DbCommand::Update {
            table,
            id,
            record,
            reply,
        })
        .await
    }

    async fn update_field(
        &self,
        table: Table,
        id: i64,
        column: &'static str,
        value: Value,
    ) -> Result<(), PlayaError> {
        self.request(|reply| DbCommand::UpdateField {
            table,
            id,
            column,
            value,
            reply,
        })
        .await
    }

    async fn delete(&self, table: Table, id: i64) -> Result<(), PlayaError> {
        self.request(|reply| DbCommand::Delete { table, id, reply })
            .await
    }

    async fn select_all(&self, table: Table) -> Result<Vec<Row>, PlayaError> {
        self.request(|reply| DbCommand::SelectAll { table, reply })
            .await
    }
}

fn actor_loop(storage: Storage, mut rx: mpsc::UnboundedReceiver<DbCommand>) {
    while let Some(cmd) = rx.blocking_recv() {
        match cmd {
            DbCommand::Insert {
                table,
                record,
                reply,
            } => {
                let _ = reply.send(storage.insert_row(table, &record));
            }
            DbCommand::Update {
                table,
                id,
                record,
                reply,
            } => {
                let _ = reply.send(storage.update_row(table, id, &record));
            }
            DbCommand::UpdateField {
                table,
                id,
                column,
                value,
                reply,
            } => {
                let _ = reply.send(storage.update_column(table, id, column, &value));
            }
            DbCommand::Delete { table, id, reply } => {
                let _ = reply.send(storage.delete_row(table, id));
            }
            DbCommand::SelectAll { table, reply } => {
                let _ = reply.send(storage.all_rows(table));
            }
        }
    }
    tracing::debug!("DB actor stopped");
}
