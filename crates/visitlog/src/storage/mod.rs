//! Local fallback storage for visitlog.
//!
//! Records that could not be written remotely are kept in a `SQLite`
//! key-value table. The whole identifier → record mapping is stored as one
//! JSON document under [`VISITORS_KEY`] and is read and rewritten as a unit
//! inside a transaction, so an entry is either fully written or not at all.

pub mod schema;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::record::{FieldUpdates, RecordField, StoredVisitor, VisitorRecord};

/// Key under which the visitor mapping is stored.
pub const VISITORS_KEY: &str = "visitors";

/// JSON key of the save timestamp inside each entry.
const SAVED_AT_KEY: &str = "savedAt";

/// Local key-value store for visitor records.
#[derive(Debug)]
pub struct LocalStore {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl LocalStore {
    /// Open or create a store at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening local store at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        schema::initialize(&conn)?;

        info!("Local store opened at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        schema::initialize(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up a record by identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the database read fails or the stored entry is malformed.
    pub fn get(&self, identifier: &str) -> Result<Option<StoredVisitor>> {
        let mapping = read_mapping(&self.conn)?;
        mapping
            .get(identifier)
            .map(|entry| serde_json::from_value(entry.clone()).map_err(Error::from))
            .transpose()
    }

    /// All stored records, keyed by identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the database read fails or an entry is malformed.
    pub fn all(&self) -> Result<BTreeMap<String, StoredVisitor>> {
        read_mapping(&self.conn)?
            .into_iter()
            .map(|(key, entry)| -> Result<(String, StoredVisitor)> {
                Ok((key, serde_json::from_value(entry)?))
            })
            .collect()
    }

    /// Number of stored records.
    ///
    /// # Errors
    ///
    /// Returns an error if the database read fails.
    pub fn count(&self) -> Result<usize> {
        Ok(read_mapping(&self.conn)?.len())
    }

    /// Merge a record into the entry for its identifier and stamp the save time.
    ///
    /// Keys already present in the entry but absent from the record are kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier is empty or the write fails; in that
    /// case nothing is written.
    pub fn save(&mut self, record: &VisitorRecord) -> Result<StoredVisitor> {
        if record.identifier.trim().is_empty() {
            return Err(Error::internal("cannot store a record without an identifier"));
        }

        let tx = self.conn.transaction()?;
        let mut mapping = read_mapping(&tx)?;

        let mut entry = take_entry(&mut mapping, &record.identifier);
        let Value::Object(fields) = serde_json::to_value(record)? else {
            return Err(Error::internal("visitor record did not serialize to an object"));
        };
        entry.extend(fields);
        entry.insert(SAVED_AT_KEY.to_string(), serde_json::to_value(Utc::now())?);

        let stored: StoredVisitor = serde_json::from_value(Value::Object(entry.clone()))?;
        mapping.insert(record.identifier.clone(), Value::Object(entry));
        write_mapping(&tx, &mapping)?;
        tx.commit()?;

        debug!(identifier = %record.identifier, "Saved visitor locally");
        Ok(stored)
    }

    /// Apply field updates to an existing entry and stamp the save time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] without writing anything if no entry exists
    /// for `identifier`.
    pub fn amend(&mut self, identifier: &str, updates: &FieldUpdates) -> Result<StoredVisitor> {
        let tx = self.conn.transaction()?;
        let mut mapping = read_mapping(&tx)?;

        let Some(Value::Object(entry)) = mapping.get_mut(identifier) else {
            return Err(Error::not_found(identifier));
        };
        for (field, value) in updates {
            entry.insert(field.local_key().to_string(), field_value(*field, value));
        }
        entry.insert(SAVED_AT_KEY.to_string(), serde_json::to_value(Utc::now())?);

        let stored: StoredVisitor = serde_json::from_value(Value::Object(entry.clone()))?;
        write_mapping(&tx, &mapping)?;
        tx.commit()?;

        debug!(identifier, fields = updates.len(), "Amended local visitor");
        Ok(stored)
    }
}

fn take_entry(mapping: &mut Map<String, Value>, identifier: &str) -> Map<String, Value> {
    match mapping.remove(identifier) {
        Some(Value::Object(entry)) => entry,
        _ => Map::new(),
    }
}

fn field_value(field: RecordField, value: &str) -> Value {
    if field == RecordField::Signature && value.is_empty() {
        Value::Null
    } else {
        Value::String(value.to_string())
    }
}

/// Read the visitor mapping; a missing key is an empty mapping.
fn read_mapping(conn: &Connection) -> Result<Map<String, Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM local_state WHERE key = ?1",
            [VISITORS_KEY],
            |row| row.get(0),
        )
        .optional()?;

    match raw {
        None => Ok(Map::new()),
        Some(raw) => match serde_json::from_str(&raw)? {
            Value::Object(mapping) => Ok(mapping),
            _ => Err(Error::internal(format!(
                "local state '{VISITORS_KEY}' is not a JSON object"
            ))),
        },
    }
}

fn write_mapping(conn: &Connection, mapping: &Map<String, Value>) -> Result<()> {
    let raw = serde_json::to_string(mapping)?;
    conn.execute(
        r"
        INSERT INTO local_state (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        ",
        (VISITORS_KEY, raw),
    )?;
    Ok(())
}
