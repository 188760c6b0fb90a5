//! Local SQLite database for the till.
//!
//! A single `kv_store` table holds the JSON blobs written by `storage`.
//! Uses WAL mode. A file that fails to open is moved aside as
//! `pos.db.corrupt-<timestamp>` and a fresh database is created once.

use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::StorageError;

const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

pub struct DbState {
    pub conn: Mutex<Connection>,
    pub db_path: PathBuf,
}

/// Current schema version. Bump when adding new migrations.
const CURRENT_SCHEMA_VERSION: i32 = 1;

const DB_FILE: &str = "pos.db";

/// Open `{data_dir}/pos.db`, creating the directory when needed.
pub fn init(data_dir: &Path) -> Result<DbState, StorageError> {
    fs::create_dir_all(data_dir)?;

    let db_path = data_dir.join(DB_FILE);
    info!("Opening database at {}", db_path.display());

    let conn = match open_and_configure(&db_path).and_then(|c| run_migrations(&c).map(|_| c)) {
        Ok(c) => c,
        Err(first_err) => {
            warn!("Database open failed ({first_err}), moving it aside and retrying once");
            if db_path.exists() {
                let backup = quarantine(&db_path)?;
                warn!(backup = %backup.display(), "Unreadable database kept as backup");
            }
            let conn = open_and_configure(&db_path)
                .map_err(|e| StorageError::OpenRetry(e.to_string()))?;
            run_migrations(&conn).map_err(|e| StorageError::OpenRetry(e.to_string()))?;
            conn
        }
    };

    info!("Database initialized (schema v{CURRENT_SCHEMA_VERSION})");

    Ok(DbState {
        conn: Mutex::new(conn),
        db_path,
    })
}

/// Rename `db_path` and its WAL/SHM sidecars to `<name>.corrupt-<timestamp>`.
fn quarantine(db_path: &Path) -> Result<PathBuf, StorageError> {
    let stamp = chrono::Utc::now().format("%Y%m%d%H%M%S%3f");
    let mut name = db_path.as_os_str().to_owned();
    name.push(format!(".corrupt-{stamp}"));
    let backup = PathBuf::from(name);

    fs::rename(db_path, &backup)?;
    for suffix in ["-wal", "-shm"] {
        let mut sidecar = db_path.as_os_str().to_owned();
        sidecar.push(suffix);
        let sidecar = PathBuf::from(sidecar);
        if sidecar.exists() {
            let mut target = backup.as_os_str().to_owned();
            target.push(suffix);
            if let Err(e) = fs::rename(&sidecar, PathBuf::from(target)) {
                warn!(path = %sidecar.display(), error = %e, "Could not move database sidecar");
            }
        }
    }
    Ok(backup)
}

/// In-memory database with the full schema, for tests and dry runs.
pub fn init_in_memory() -> Result<DbState, StorageError> {
    let conn = Connection::open_in_memory()?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    run_migrations(&conn)?;
    Ok(DbState {
        conn: Mutex::new(conn),
        db_path: PathBuf::from(":memory:"),
    })
}

fn open_and_configure(path: &Path) -> Result<Connection, StorageError> {
    let conn = Connection::open(path)?;
    // Before any pragma so a lock held by another till waits instead of failing.
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;",
    )?;
    Ok(conn)
}

fn run_migrations(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT DEFAULT (datetime('now'))
        );",
    )?;

    let current: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    if current >= CURRENT_SCHEMA_VERSION {
        return Ok(());
    }

    info!("Migrating database from v{current} to v{CURRENT_SCHEMA_VERSION}");

    if current < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

/// Migration v1: key-value store.
fn migrate_v1(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS kv_store (
            store_key TEXT PRIMARY KEY,
            store_value TEXT NOT NULL,
            updated_at TEXT DEFAULT (datetime('now'))
        );

        INSERT INTO schema_version (version) VALUES (1);
        ",
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Key-value helpers
// ---------------------------------------------------------------------------

pub fn get_value(conn: &Connection, key: &str) -> Result<Option<String>, StorageError> {
    let value = conn
        .query_row(
            "SELECT store_value FROM kv_store WHERE store_key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

pub fn set_value(conn: &Connection, key: &str, value: &str) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO kv_store (store_key, store_value, updated_at)
         VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(store_key) DO UPDATE SET
            store_value = excluded.store_value,
            updated_at = excluded.updated_at",
        params![key, value],
    )?;
    Ok(())
}

pub fn remove_value(conn: &Connection, key: &str) -> Result<bool, StorageError> {
    let removed = conn.execute("DELETE FROM kv_store WHERE store_key = ?1", params![key])?;
    Ok(removed > 0)
}
