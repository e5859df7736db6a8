//! # Path Cache
//!
//! A persistent local index of path↔entity associations, one SQLite store
//! per project root at `.pipeline/cache/path_cache.db`. The materializer
//! writes an entry for every entity directory it creates; lookups answer
//! "which paths belong to this entity" and "which entity owns this path"
//! without touching the tracking service.
//!
//! The store is shared by unrelated processes, potentially on different
//! hosts against the same network volume. Every write happens inside an
//! immediate transaction so an entry is either fully recorded or absent,
//! and brief locks held by other writers are absorbed by a busy timeout
//! plus a short bounded retry loop rather than failing outright.
//!
//! A path maps to at most one entity. Re-adding an identical mapping is a
//! no-op; remapping a path to a different entity is a hard `Conflict` and
//! leaves the existing entry untouched. Consistency with the live
//! filesystem is best-effort: deleting or renaming a directory does not
//! remove its entry, and stale entries are an accepted failure mode.

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::debug;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use crate::defaults;
use crate::entity::EntityRef;
use crate::error::{Error, Result};

/// How long a single statement waits on a lock before reporting busy.
const BUSY_TIMEOUT: Duration = Duration::from_millis(2000);

/// Bounded retries after the busy timeout itself expires.
const CONTENTION_RETRIES: u32 = 3;
const CONTENTION_DELAY: Duration = Duration::from_millis(250);

/// Persistent path↔entity index for one project.
pub struct PathCache {
    conn: Connection,
    db_path: PathBuf,
}

impl PathCache {
    /// Open (creating if needed) the path cache for a project root.
    pub fn open(project_path: &Path) -> Result<Self> {
        let db_path = defaults::path_cache_file(project_path);
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&db_path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS path_cache (
                entity_type TEXT NOT NULL,
                entity_id INTEGER NOT NULL,
                entity_name TEXT NOT NULL,
                path TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_path_cache_entity
                ON path_cache(entity_type, entity_id);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_path_cache_path
                ON path_cache(path);
            "#,
        )?;

        Ok(Self { conn, db_path })
    }

    /// Location of the backing database file.
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Record that `path` belongs to `entity`.
    ///
    /// Idempotent for an identical `(path, entity_type, entity_id)`; fails
    /// with `Conflict` when the path is already bound to a different
    /// entity, preserving the existing mapping.
    pub fn add_mapping(&mut self, entity: &EntityRef, path: &Path) -> Result<()> {
        let path_str = path_key(path);
        let mut attempt = 0;
        loop {
            match self.try_add_mapping(entity, &path_str) {
                Err(e) if is_contention(&e) && attempt < CONTENTION_RETRIES => {
                    attempt += 1;
                    debug!(
                        "path cache '{}' is locked, retrying ({}/{})",
                        self.db_path.display(),
                        attempt,
                        CONTENTION_RETRIES
                    );
                    std::thread::sleep(CONTENTION_DELAY);
                }
                other => return other,
            }
        }
    }

    fn try_add_mapping(&mut self, entity: &EntityRef, path_str: &str) -> Result<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing = tx
            .query_row(
                "SELECT entity_type, entity_id, entity_name FROM path_cache WHERE path = ?1",
                params![path_str],
                |row| {
                    Ok(EntityRef {
                        entity_type: row.get(0)?,
                        id: row.get(1)?,
                        name: row.get(2)?,
                    })
                },
            )
            .optional()?;

        match existing {
            Some(existing)
                if existing.entity_type == entity.entity_type && existing.id == entity.id =>
            {
                tx.commit()?;
                Ok(())
            }
            Some(existing) => Err(Error::Conflict {
                path: path_str.to_string(),
                existing,
                incoming: entity.clone(),
            }),
            None => {
                tx.execute(
                    "INSERT INTO path_cache (entity_type, entity_id, entity_name, path) \
                     VALUES (?1, ?2, ?3, ?4)",
                    params![entity.entity_type, entity.id, entity.name, path_str],
                )?;
                tx.commit()?;
                Ok(())
            }
        }
    }

    /// All paths recorded for an entity, sorted.
    pub fn get_paths(&self, entity_type: &str, entity_id: i64) -> Result<Vec<PathBuf>> {
        let mut stmt = self.conn.prepare(
            "SELECT path FROM path_cache WHERE entity_type = ?1 AND entity_id = ?2 ORDER BY path",
        )?;
        let rows = stmt.query_map(params![entity_type, entity_id], |row| {
            row.get::<_, String>(0)
        })?;

        let mut paths = Vec::new();
        for row in rows {
            paths.push(PathBuf::from(row?));
        }
        Ok(paths)
    }

    /// The entity recorded for a path, if any.
    pub fn get_entity(&self, path: &Path) -> Result<Option<EntityRef>> {
        let entity = self
            .conn
            .query_row(
                "SELECT entity_type, entity_id, entity_name FROM path_cache WHERE path = ?1",
                params![path_key(path)],
                |row| {
                    Ok(EntityRef {
                        entity_type: row.get(0)?,
                        id: row.get(1)?,
                        name: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(entity)
    }

    /// Number of recorded mappings.
    pub fn len(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM path_cache", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn is_contention(error: &Error) -> bool {
    matches!(
        error,
        Error::Sqlite(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::DatabaseBusy
                || e.code == rusqlite::ErrorCode::DatabaseLocked
    )
}
