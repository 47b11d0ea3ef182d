//! SQLite implementation of `MachineStore`.
//!
//! This provides a document store that survives service restarts.
//!
//! # Schema Versioning
//!
//! The database has a `schema_version` table that tracks the schema version.
//! When the schema needs to change, increment `CURRENT_SCHEMA_VERSION` and add
//! a migration in `run_migrations()`. Migrations run sequentially from the
//! current version to the target version.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use laundry_core::{Machine, MachineKind, Status, StatusWrite};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, warn};

use super::{MachineStore, StoreError};

/// Current schema version. Increment this when making schema changes and add
/// corresponding migration logic in `run_migrations()`.
const CURRENT_SCHEMA_VERSION: i64 = 1;

/// SQLite-backed machine store.
///
/// Uses `tokio::task::spawn_blocking` to run synchronous rusqlite operations
/// without blocking the async runtime.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

type RawRow = (String, String, String, i64, String);

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn decode_row((id, kind, number, status, college): RawRow) -> Result<Machine, StoreError> {
    let kind: MachineKind = kind
        .parse()
        .map_err(|e| StoreError::corruption(format!("machine {}: {}", id, e)))?;
    Ok(Machine {
        id,
        kind,
        number,
        status: Status(status),
        college,
    })
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>, StoreError> {
    conn.lock()
        .map_err(|_| StoreError::storage("lock connection", "connection mutex poisoned"))
}

impl SqliteStore {
    /// Open (or create) a SQLite store at the given path.
    ///
    /// Creates the database file and schema if they don't exist.
    /// Runs any pending migrations if the database has an older schema.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path_ref = path.as_ref();

        // Ensure parent directory exists (unless it's :memory: or empty path)
        let path_str = path_ref.to_string_lossy();
        if path_str != ":memory:" && !path_str.is_empty() {
            if let Some(parent) = path_ref.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        StoreError::storage(
                            "create database directory",
                            format!("{}: {}", parent.display(), e),
                        )
                    })?;
                }
            }
        }

        let conn = Connection::open(path_ref)
            .map_err(|e| StoreError::storage("open database", e.to_string()))?;

        // In-memory databases report "memory" here, which is fine.
        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .map_err(|e| StoreError::storage("set journal_mode", e.to_string()))?;
        if !journal_mode.eq_ignore_ascii_case("wal") && !journal_mode.eq_ignore_ascii_case("memory")
        {
            warn!(
                "SQLite kept journal_mode '{}' instead of WAL; continuing",
                journal_mode
            );
        }

        conn.execute_batch(
            r#"
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            CREATE TABLE IF NOT EXISTS schema_version (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                version INTEGER NOT NULL
            );
            "#,
        )
        .map_err(|e| StoreError::storage("configure database", e.to_string()))?;

        // 0 if the table is empty = fresh database
        let current_version: i64 = conn
            .query_row(
                "SELECT version FROM schema_version WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StoreError::storage("get schema version", e.to_string()))?
            .unwrap_or(0);

        Self::run_migrations(&conn, current_version)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run migrations from `from_version` to `CURRENT_SCHEMA_VERSION`.
    fn run_migrations(conn: &Connection, from_version: i64) -> Result<(), StoreError> {
        if from_version > CURRENT_SCHEMA_VERSION {
            return Err(StoreError::storage(
                "schema version",
                format!(
                    "Database schema version {} is newer than supported version {}. \
                     Please upgrade the application.",
                    from_version, CURRENT_SCHEMA_VERSION
                ),
            ));
        }

        if from_version == CURRENT_SCHEMA_VERSION {
            return Ok(());
        }

        if from_version < 1 {
            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS machines (
                    id TEXT PRIMARY KEY,
                    type TEXT NOT NULL,
                    number TEXT NOT NULL,
                    status INTEGER NOT NULL,
                    college TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_machines_college_type
                    ON machines(college, type);
                "#,
            )
            .map_err(|e| StoreError::storage("migration v1", e.to_string()))?;
        }

        conn.execute(
            "INSERT OR REPLACE INTO schema_version (id, version) VALUES (1, ?1)",
            params![CURRENT_SCHEMA_VERSION],
        )
        .map_err(|e| StoreError::storage("update schema version", e.to_string()))?;

        Ok(())
    }

    /// Create a new in-memory SQLite store (for testing).
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, StoreError> {
        Self::new(":memory:")
    }
}

#[async_trait]
impl MachineStore for SqliteStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn query(&self, college: &str, kind: MachineKind) -> Result<Vec<Machine>, StoreError> {
        let conn = self.conn.clone();
        let college = college.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn)?;

            let mut stmt = conn
                .prepare(
                    "SELECT id, type, number, status, college FROM machines
                     WHERE college = ?1 AND type = ?2",
                )
                .map_err(|e| StoreError::storage("query", e.to_string()))?;

            let rows = stmt
                .query_map(params![college, kind.as_str()], read_row)
                .map_err(|e| StoreError::storage("query", e.to_string()))?;

            let mut results = Vec::new();
            for row in rows {
                let raw = row.map_err(|e| StoreError::storage("query row", e.to_string()))?;
                // Skip undecodable rows so one bad document doesn't hide the rest.
                match decode_row(raw) {
                    Ok(machine) => results.push(machine),
                    Err(e) => warn!("Skipping machine row: {}", e),
                }
            }
            Ok(results)
        })
        .await
        .map_err(|e| StoreError::storage("query", e.to_string()))?
    }

    async fn get(&self, id: &str) -> Result<Option<Machine>, StoreError> {
        let conn = self.conn.clone();
        let id = id.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn)?;

            let raw = conn
                .query_row(
                    "SELECT id, type, number, status, college FROM machines WHERE id = ?1",
                    params![id],
                    read_row,
                )
                .optional()
                .map_err(|e| StoreError::storage("get", e.to_string()))?;

            raw.map(decode_row).transpose()
        })
        .await
        .map_err(|e| StoreError::storage("get", e.to_string()))?
    }

    async fn put(&self, machine: &Machine) -> Result<(), StoreError> {
        let conn = self.conn.clone();
        let machine = machine.clone();

        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn)?;

            conn.execute(
                "INSERT INTO machines (id, type, number, status, college)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                     type = excluded.type,
                     number = excluded.number,
                     status = excluded.status,
                     college = excluded.college",
                params![
                    machine.id,
                    machine.kind.as_str(),
                    machine.number,
                    machine.status.0,
                    machine.college
                ],
            )
            .map_err(|e| StoreError::storage("put", e.to_string()))?;

            Ok(())
        })
        .await
        .map_err(|e| StoreError::storage("put", e.to_string()))?
    }

    async fn set_status(&self, id: &str, status: Status) -> Result<(), StoreError> {
        let conn = self.conn.clone();
        let id = id.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn)?;

            let changed = conn
                .execute(
                    "UPDATE machines SET status = ?1 WHERE id = ?2",
                    params![status.0, id],
                )
                .map_err(|e| StoreError::storage("set_status", e.to_string()))?;

            if changed == 0 {
                return Err(StoreError::not_found(id));
            }
            Ok(())
        })
        .await
        .map_err(|e| StoreError::storage("set_status", e.to_string()))?
    }

    async fn apply_status_writes(&self, writes: &[StatusWrite]) -> Result<(), StoreError> {
        let conn = self.conn.clone();
        let writes = writes.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut conn = lock(&conn)?;

            let tx = conn
                .transaction()
                .map_err(|e| StoreError::storage("begin transaction", e.to_string()))?;

            for write in &writes {
                let changed = tx
                    .execute(
                        "UPDATE machines SET status = ?1 WHERE id = ?2",
                        params![write.to.0, write.id],
                    )
                    .map_err(|e| StoreError::storage("apply_status_writes", e.to_string()))?;
                if changed == 0 {
                    // Dropping the transaction rolls it back.
                    return Err(StoreError::not_found(&write.id));
                }
            }

            tx.commit()
                .map_err(|e| StoreError::storage("commit transaction", e.to_string()))?;
            debug!("Committed {} status write(s)", writes.len());
            Ok(())
        })
        .await
        .map_err(|e| StoreError::storage("apply_status_writes", e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use laundry_core::MachineSet;

    async fn seeded() -> SqliteStore {
        let store = SqliteStore::new_in_memory().unwrap();
        for machine in MachineSet::mock("baker").iter() {
            store.put(machine).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_get_returns_none_for_missing() {
        let store = SqliteStore::new_in_memory().unwrap();
        assert!(store.get("mock-baker-washer-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let store = seeded().await;
        let machine = store.get("mock-baker-bin-7").await.unwrap().unwrap();
        assert_eq!(machine.kind, MachineKind::Bin);
        assert_eq!(machine.number, "7");
        assert_eq!(machine.status, Status::EMPTY);
        assert_eq!(machine.college, "baker");
    }

    #[tokio::test]
    async fn test_query_filters() {
        let store = seeded().await;
        let washers = store.query("baker", MachineKind::Washer).await.unwrap();
        assert_eq!(washers.len(), 10);
        assert!(store
            .query("jones", MachineKind::Washer)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_put_twice_does_not_duplicate() {
        let store = seeded().await;
        for machine in MachineSet::mock("baker").iter() {
            store.put(machine).await.unwrap();
        }
        let mut total = 0;
        for kind in MachineKind::ALL {
            total += store.query("baker", kind).await.unwrap().len();
        }
        assert_eq!(total, 30);
    }

    #[tokio::test]
    async fn test_set_status() {
        let store = seeded().await;
        store
            .set_status("mock-baker-dryer-4", Status::BROKEN)
            .await
            .unwrap();
        let dryer = store.get("mock-baker-dryer-4").await.unwrap().unwrap();
        assert_eq!(dryer.status, Status::BROKEN);
        assert_eq!(dryer.number, "4");
    }

    #[tokio::test]
    async fn test_set_status_missing_is_not_found() {
        let store = seeded().await;
        let err = store.set_status("nope", Status::IN_USE).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_transfer_rolls_back_on_missing_target() {
        let store = seeded().await;
        let writes = vec![
            StatusWrite {
                id: "mock-baker-washer-1".to_string(),
                kind: MachineKind::Washer,
                from: Status::IN_USE,
                to: Status::AVAILABLE,
            },
            StatusWrite {
                id: "mock-baker-dryer-99".to_string(),
                kind: MachineKind::Dryer,
                from: Status::AVAILABLE,
                to: Status::IN_USE,
            },
        ];
        store
            .set_status("mock-baker-washer-1", Status::IN_USE)
            .await
            .unwrap();

        assert!(store.apply_status_writes(&writes).await.is_err());
        let washer = store.get("mock-baker-washer-1").await.unwrap().unwrap();
        assert_eq!(washer.status, Status::IN_USE);
    }

    #[tokio::test]
    async fn test_corrupt_row_skipped_in_query() {
        let store = seeded().await;
        {
            let conn = store.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO machines (id, type, number, status, college)
                 VALUES ('odd', 'tumbler', '1', 0, 'baker')",
                [],
            )
            .unwrap();
        }
        assert_eq!(
            store.query("baker", MachineKind::Washer).await.unwrap().len(),
            10
        );
        let err = store.get("odd").await.unwrap_err();
        assert!(matches!(err, StoreError::Corruption { .. }));
    }

    #[tokio::test]
    async fn test_reopen_file_keeps_documents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("laundry.db");
        {
            let store = SqliteStore::new(&path).unwrap();
            store
                .put(&Machine::mock("wiess", MachineKind::Washer, 1))
                .await
                .unwrap();
        }
        let store = SqliteStore::new(&path).unwrap();
        assert!(store.get("mock-wiess-washer-1").await.unwrap().is_some());
    }

    #[test]
    fn test_newer_schema_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("laundry.db");
        {
            let _store = SqliteStore::new(&path).unwrap();
        }
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute(
                "UPDATE schema_version SET version = ?1 WHERE id = 1",
                params![CURRENT_SCHEMA_VERSION + 1],
            )
            .unwrap();
        }
        assert!(SqliteStore::new(&path).is_err());
    }
}
