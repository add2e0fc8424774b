//! `SQLite` schema definitions for visitlog.
//!
//! Local storage is a small key-value table; the whole visitor mapping lives
//! under a single key. The schema version is stamped in `metadata`.

use rusqlite::{Connection, OptionalExtension};

use crate::error::{Error, Result};

/// The schema version this build writes.
pub const SCHEMA_VERSION: i32 = 1;

const VERSION_KEY: &str = "schema_version";

/// SQL statement to create the key-value state table.
pub const CREATE_LOCAL_STATE_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS local_state (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[CREATE_LOCAL_STATE_TABLE, CREATE_METADATA_TABLE];

/// Create the tables and stamp the schema version.
///
/// # Errors
///
/// Returns [`Error::DatabaseSchema`] if the database carries a version other
/// than [`SCHEMA_VERSION`], or a database error if creation fails.
pub fn initialize(conn: &Connection) -> Result<()> {
    for statement in SCHEMA_STATEMENTS {
        conn.execute(statement, [])?;
    }
    conn.execute(
        "INSERT OR IGNORE INTO metadata (key, value) VALUES (?1, ?2)",
        (VERSION_KEY, SCHEMA_VERSION.to_string()),
    )?;

    let version = schema_version(conn)?;
    if version != Some(SCHEMA_VERSION) {
        return Err(Error::DatabaseSchema {
            message: format!(
                "found version {}, this build supports {SCHEMA_VERSION}",
                version.map_or_else(|| "none".to_string(), |v| v.to_string())
            ),
        });
    }
    Ok(())
}

fn schema_version(conn: &Connection) -> Result<Option<i32>> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM metadata WHERE key = ?1",
            [VERSION_KEY],
            |row| row.get(0),
        )
        .optional()?;
    value
        .map(|v| {
            v.parse().map_err(|_| Error::DatabaseSchema {
                message: format!("invalid schema version: {v}"),
            })
        })
        .transpose()
}
