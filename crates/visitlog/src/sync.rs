//! Record synchronization.
//!
//! [`SyncClient`] writes visitor records to the remote list and falls back to
//! the local store when the remote write fails. Amendments go remote first
//! and fall back the same way. Lookup by identifier reads the local store.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::record::{FieldUpdates, StoredVisitor, VisitorRecord};
use crate::remote::fields::IDENTIFIER_FIELD;
use crate::remote::{create_fields, update_fields, RemoteList};
use crate::storage::LocalStore;

/// Detail reported when no remote list is configured.
const REMOTE_DISABLED: &str = "remote list is not configured";

/// Where a submitted record ended up.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// The remote list accepted the record; nothing was written locally.
    Remote {
        /// The service's reply.
        result: Value,
    },
    /// The remote write failed and the record was stored locally.
    Local {
        /// The entry as stored.
        stored: StoredVisitor,
        /// Why the remote write failed.
        remote_error: String,
    },
    /// Neither store accepted the record. Nothing was written.
    Failed {
        /// Why the remote write failed.
        remote_error: String,
        /// Why the local write failed.
        local_error: String,
    },
}

impl SubmitOutcome {
    /// Whether the record was persisted somewhere.
    #[must_use]
    pub fn is_saved(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    /// Message shown to the person registering.
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Self::Remote { .. } => "Registro guardado en servidor.",
            Self::Local { .. } => "Registro guardado localmente.",
            Self::Failed { .. } => "Error al guardar el registro.",
        }
    }
}

/// Where an amendment was applied.
#[derive(Debug, Clone, PartialEq)]
pub enum AmendOutcome {
    /// The remote item was updated.
    Remote {
        /// Handle of the updated item.
        item_id: String,
        /// The service's reply.
        result: Value,
    },
    /// The local entry was updated.
    Local {
        /// The entry after the update.
        stored: StoredVisitor,
        /// Why the remote update was not applied, if it was attempted and failed.
        remote_error: Option<String>,
    },
}

impl AmendOutcome {
    /// Message shown after recording a departure.
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Self::Remote { .. } => "Salida registrada en servidor.",
            Self::Local { .. } => "Salida registrada localmente.",
        }
    }
}

/// Remote-first writer with a local fallback.
pub struct SyncClient {
    remote: Option<Arc<dyn RemoteList>>,
    store: Mutex<LocalStore>,
}

impl std::fmt::Debug for SyncClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncClient")
            .field("remote", &self.remote.is_some())
            .field("store", &self.store)
            .finish()
    }
}

impl SyncClient {
    /// Create a client writing to `remote` with `store` as fallback.
    #[must_use]
    pub fn new(remote: Arc<dyn RemoteList>, store: LocalStore) -> Self {
        Self {
            remote: Some(remote),
            store: Mutex::new(store),
        }
    }

    /// Create a client that only uses the local store.
    #[must_use]
    pub fn local_only(store: LocalStore) -> Self {
        Self {
            remote: None,
            store: Mutex::new(store),
        }
    }

    /// Whether a remote list is attached.
    #[must_use]
    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    fn store(&self) -> Result<MutexGuard<'_, LocalStore>> {
        self.store
            .lock()
            .map_err(|_| Error::internal("local store lock poisoned"))
    }

    /// Persist a record remotely, or locally if the remote write fails.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the record has no identifier. Storage
    /// failures are reported through [`SubmitOutcome::Failed`], not as errors.
    pub async fn submit(&self, record: &VisitorRecord) -> Result<SubmitOutcome> {
        let identifier = record.identifier.trim();
        if identifier.is_empty() {
            let mut errors = BTreeMap::new();
            errors.insert("cedula".to_string(), "Cédula requerida".to_string());
            return Err(Error::Validation { errors });
        }
        let record = if identifier.len() == record.identifier.len() {
            Cow::Borrowed(record)
        } else {
            Cow::Owned(VisitorRecord {
                identifier: identifier.to_string(),
                ..record.clone()
            })
        };
        let record = record.as_ref();

        let remote_error = match &self.remote {
            Some(remote) => match remote.create(create_fields(record)).await {
                Ok(result) => {
                    info!(identifier = %record.identifier, "Visitor stored remotely");
                    return Ok(SubmitOutcome::Remote { result });
                }
                Err(e) => {
                    warn!(identifier = %record.identifier, error = %e, "Remote write failed, storing locally");
                    e.to_string()
                }
            },
            None => REMOTE_DISABLED.to_string(),
        };

        match self.store().and_then(|mut store| store.save(record)) {
            Ok(stored) => {
                info!(identifier = %record.identifier, "Visitor stored locally");
                Ok(SubmitOutcome::Local {
                    stored,
                    remote_error,
                })
            }
            Err(e) => {
                warn!(identifier = %record.identifier, error = %e, "Local write failed");
                Ok(SubmitOutcome::Failed {
                    remote_error,
                    local_error: e.to_string(),
                })
            }
        }
    }

    /// Look up a locally stored record. Surrounding whitespace in
    /// `identifier` is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the local store cannot be read.
    pub fn find(&self, identifier: &str) -> Result<Option<StoredVisitor>> {
        self.store()?.get(identifier.trim())
    }

    /// Apply `updates` to the record with `identifier`, remote first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if neither store holds the identifier, or
    /// the remote error if the remote failed and no local entry exists.
    pub async fn amend(&self, identifier: &str, updates: &FieldUpdates) -> Result<AmendOutcome> {
        let identifier = identifier.trim();
        let mut remote_error = None;

        if let Some(remote) = &self.remote {
            match amend_remote(remote.as_ref(), identifier, updates).await {
                Ok(Some(outcome)) => return Ok(outcome),
                Ok(None) => debug!(identifier, "No remote item, amending locally"),
                Err(e) => {
                    warn!(identifier, error = %e, "Remote amend failed, amending locally");
                    remote_error = Some(e);
                }
            }
        }

        match self.store()?.amend(identifier, updates) {
            Ok(stored) => Ok(AmendOutcome::Local {
                stored,
                remote_error: remote_error.map(|e| e.to_string()),
            }),
            Err(e) if e.is_not_found() => Err(remote_error.unwrap_or(e)),
            Err(e) => Err(e),
        }
    }
}

async fn amend_remote(
    remote: &dyn RemoteList,
    identifier: &str,
    updates: &FieldUpdates,
) -> Result<Option<AmendOutcome>> {
    let Some(item) = remote.find_by_field(IDENTIFIER_FIELD, identifier).await? else {
        return Ok(None);
    };
    let result = remote.update(&item.id, update_fields(updates)).await?;
    info!(identifier, item_id = %item.id, "Remote visitor amended");
    Ok(Some(AmendOutcome::Remote {
        item_id: item.id,
        result,
    }))
}
