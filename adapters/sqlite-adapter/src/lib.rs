//! sqlite-adapter — SQLite implementation of the MappingStore port for local/dev.
//!
//! Purpose
//! - Provide a lightweight, file-based store to run the system locally
//!   without cloud dependencies.
//! - Implements the `MappingStore` trait from the `domain` crate with the same
//!   conditional-insert and atomic-increment semantics as the Dynamo adapter.
//!
//! Notes
//! - Uses `rusqlite` with the `bundled` feature for portability.
//! - Stores timestamps as seconds since UNIX_EPOCH.
//! - `clicks` is nullable so that `increment_counter`'s default is honoured
//!   for rows written by other tools.

use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use domain::{CoreError, Mapping, MappingStore, PutOutcome, ShortCode};
use rusqlite::{params, Connection};

/// Columns that `increment_counter` may touch. Field names are interpolated
/// into SQL, so anything else is rejected.
const COUNTER_COLUMNS: &[&str] = &["clicks"];

/// SQLite-backed store for local development.
pub struct SqliteStore {
    conn: std::sync::Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a SQLite database at the given path and ensure schema.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        let conn = Connection::open(path).map_err(map_sqerr)?;
        init_schema(&conn)?;
        Ok(Self {
            conn: std::sync::Mutex::new(conn),
        })
    }

    /// Construct from env var `DB_PATH` (defaults to `./data/mappings.db`).
    pub fn from_env() -> Result<Self, CoreError> {
        let path = std::env::var("DB_PATH").unwrap_or_else(|_| "./data/mappings.db".to_string());
        // Ensure directory exists
        if let Some(dir) = Path::new(&path).parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        Self::new(path)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, CoreError> {
        self.conn
            .lock()
            .map_err(|_| CoreError::Storage("mutex poisoned".into()))
    }
}

fn init_schema(conn: &Connection) -> Result<(), CoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS mappings (
            short_code TEXT PRIMARY KEY,
            target_url TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            clicks INTEGER DEFAULT 0
        );
        "#,
    )
    .map_err(map_sqerr)
}

fn map_sqerr<E: std::fmt::Display>(e: E) -> CoreError {
    CoreError::Storage(format!("sqlite error: {e}"))
}

fn system_time_to_secs(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH).unwrap_or(Duration::from_secs(0)).as_secs()
}

fn secs_to_system_time(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs)
}

fn row_to_mapping(row: &rusqlite::Row) -> Result<Mapping, CoreError> {
    let code: String = row.get(0).map_err(map_sqerr)?;
    let target_url: String = row.get(1).map_err(map_sqerr)?;
    let ts: i64 = row.get(2).map_err(map_sqerr)?;
    let clicks: Option<i64> = row.get(3).map_err(map_sqerr)?;

    let short_code = ShortCode::new(code)
        .map_err(|e| CoreError::Storage(format!("bad short_code in db: {e}")))?;
    Ok(Mapping {
        short_code,
        target_url,
        created_at: secs_to_system_time(ts.max(0) as u64),
        clicks: clicks.unwrap_or(0).max(0) as u64,
    })
}

impl MappingStore for SqliteStore {
    fn put_if_absent(&self, mapping: &Mapping) -> Result<PutOutcome, CoreError> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "INSERT OR IGNORE INTO mappings(short_code, target_url, created_at, clicks) VALUES(?1, ?2, ?3, ?4)",
                params![
                    mapping.short_code.as_str(),
                    mapping.target_url,
                    system_time_to_secs(mapping.created_at) as i64,
                    mapping.clicks as i64,
                ],
            )
            .map_err(map_sqerr)?;
        if changed == 0 {
            Ok(PutOutcome::AlreadyExists)
        } else {
            Ok(PutOutcome::Inserted)
        }
    }

    fn get(&self, code: &ShortCode) -> Result<Option<Mapping>, CoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT short_code, target_url, created_at, clicks FROM mappings WHERE short_code = ?1")
            .map_err(map_sqerr)?;
        let mut rows = stmt.query(params![code.as_str()]).map_err(map_sqerr)?;
        if let Some(row) = rows.next().map_err(map_sqerr)? {
            Ok(Some(row_to_mapping(row)?))
        } else {
            Ok(None)
        }
    }

    fn increment_counter(
        &self,
        code: &ShortCode,
        field: &str,
        delta: u64,
        default: u64,
    ) -> Result<(), CoreError> {
        if !COUNTER_COLUMNS.contains(&field) {
            return Err(CoreError::Storage(format!("unknown counter field: {field}")));
        }
        let conn = self.lock()?;
        let sql = format!(
            "UPDATE mappings SET {field} = COALESCE({field}, ?1) + ?2 WHERE short_code = ?3"
        );
        let changed = conn
            .execute(&sql, params![default as i64, delta as i64, code.as_str()])
            .map_err(map_sqerr)?;
        if changed == 0 {
            return Err(CoreError::NotFound);
        }
        Ok(())
    }
}
