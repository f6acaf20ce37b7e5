//! Storage backends behind the HTTP surface.
//!
//! Both backends share one contract: `submit` validates and appends a change
//! idempotently, `get_state` returns the list's log and merged state or
//! `NotFound`. The in-memory backend can persist a JSON snapshot after every
//! accepted change; the PostgreSQL backend relies on a unique index over the
//! idempotency key.

use crate::db::{self, Pool};
use crate::error::{AppError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tally_engine::{
    merge_records, Change, ChangeLog, ChangeRequest, Error as EngineError, ListService, ListView,
    LogSnapshot,
};
use tokio::sync::Mutex;

/// Where changes are stored.
#[derive(Clone)]
pub enum Backend {
    Memory(MemoryBackend),
    Postgres(Pool),
}

/// Process-local lists, optionally mirrored to a snapshot file.
#[derive(Clone)]
pub struct MemoryBackend {
    service: Arc<ListService>,
    snapshot_path: Option<PathBuf>,
    // Serializes snapshot writes so the newest export lands last.
    write_lock: Arc<Mutex<()>>,
}

impl MemoryBackend {
    pub fn service(&self) -> &ListService {
        &self.service
    }

    async fn persist(&self) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let _guard = self.write_lock.lock().await;
        let json = self.service.log().export_snapshot().to_json()?;
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

impl Backend {
    /// An empty in-memory backend that never touches disk.
    pub fn memory() -> Self {
        Backend::Memory(MemoryBackend {
            service: Arc::new(ListService::new()),
            snapshot_path: None,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// An in-memory backend restored from, and persisted to, a snapshot file.
    ///
    /// A missing file starts empty. Invalid records in the file are skipped.
    pub async fn memory_with_snapshot(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let log = ChangeLog::new();

        match tokio::fs::read_to_string(&path).await {
            Ok(json) => {
                let snapshot = LogSnapshot::from_json(&json)?;
                let meta = snapshot.metadata();
                let rejected = log.import_snapshot(snapshot);
                tracing::info!(
                    path = %path.display(),
                    lists = meta.list_count,
                    changes = meta.change_count,
                    rejected,
                    "restored snapshot"
                );
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no snapshot yet, starting empty");
            }
            Err(e) => return Err(e.into()),
        }

        Ok(Backend::Memory(MemoryBackend {
            service: Arc::new(ListService::with_log(log)),
            snapshot_path: Some(path),
            write_lock: Arc::new(Mutex::new(())),
        }))
    }

    /// A PostgreSQL backend over an already-migrated pool.
    pub fn postgres(pool: Pool) -> Self {
        Backend::Postgres(pool)
    }

    /// Short name for health reporting.
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Memory(_) => "memory",
            Backend::Postgres(_) => "postgres",
        }
    }

    /// Validate and store a change, returning it as stored.
    pub async fn submit(&self, request: ChangeRequest) -> Result<Change> {
        match self {
            Backend::Memory(memory) => {
                let change = memory.service.submit_request(request)?;
                memory.persist().await?;
                Ok(change)
            }
            Backend::Postgres(pool) => submit_postgres(pool, request).await,
        }
    }

    /// The list's log and merged state.
    pub async fn get_state(&self, list_id: &str) -> Result<ListView> {
        match self {
            Backend::Memory(memory) => Ok(memory.service.get_state(list_id)?),
            Backend::Postgres(pool) => get_state_postgres(pool, list_id).await,
        }
    }
}

async fn submit_postgres(pool: &Pool, request: ChangeRequest) -> Result<Change> {
    let list_id = request.list_id.clone();
    let mut tx = pool.begin().await?;
    db::lock_list(&mut *tx, &list_id).await?;

    let change = match request.timestamp {
        Some(_) => request.into_change(|_| 0),
        None => {
            let next = db::next_timestamp(&mut *tx, &list_id).await?;
            request.into_change(|_| next)
        }
    }
    .map_err(EngineError::from)?;

    for (column, value) in [
        ("target", change.target),
        ("bought", change.bought),
        ("timestamp", change.timestamp),
    ] {
        db::to_column(column, value).map_err(AppError::Unprocessable)?;
    }

    let inserted = db::insert_change(&mut *tx, &change).await?;
    tx.commit().await?;

    tracing::debug!(
        list_id = %change.list_id,
        item = %change.item_name,
        kind = %change.kind,
        timestamp = change.timestamp,
        duplicate = !inserted,
        "stored change"
    );
    Ok(change)
}

async fn get_state_postgres(pool: &Pool, list_id: &str) -> Result<ListView> {
    if !db::list_exists(pool, list_id).await? {
        return Err(EngineError::NotFound(list_id.to_string()).into());
    }

    let rows = db::get_changes(pool, list_id).await?;
    let records: Vec<_> = rows.iter().map(|row| row.to_change()).collect();
    let merged = merge_records(records.iter().cloned());
    if merged.skipped() > 0 {
        tracing::warn!(
            list_id,
            skipped = merged.skipped(),
            "skipped malformed rows while merging"
        );
    }

    Ok(ListView {
        list_id: list_id.to_string(),
        log: records
            .into_iter()
            .filter_map(|record| record.ok().filter(|change| change.validate().is_ok()))
            .collect(),
        state: merged.items,
    })
}
