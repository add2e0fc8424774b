//! Visitor record types.
//!
//! Field names on the wire follow the registration form (`cedula`, `nombre`,
//! `horaEntrada`, ...); the Rust names describe what each field holds.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A single visit, as collected by the registration form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisitorRecord {
    /// National ID or passport number; the lookup key.
    #[serde(rename = "cedula", deserialize_with = "nullable_string")]
    pub identifier: String,

    /// Full name.
    #[serde(rename = "nombre", deserialize_with = "nullable_string")]
    pub name: String,

    /// Company or affiliation.
    #[serde(rename = "empresa", deserialize_with = "nullable_string")]
    pub company: String,

    /// Contact e-mail address.
    #[serde(rename = "correo", deserialize_with = "nullable_string")]
    pub email: String,

    /// Visit date (`YYYY-MM-DD`).
    #[serde(rename = "fecha", deserialize_with = "nullable_string")]
    pub visit_date: String,

    /// Arrival time (`HH:MM`).
    #[serde(rename = "horaEntrada", deserialize_with = "nullable_string")]
    pub arrival_time: String,

    /// Departure time (`HH:MM`); empty until the visitor leaves.
    #[serde(rename = "horaSalida", deserialize_with = "nullable_string")]
    pub departure_time: String,

    /// Area being visited.
    #[serde(deserialize_with = "nullable_string")]
    pub area: String,

    /// Service to be performed.
    #[serde(rename = "servicio", deserialize_with = "nullable_string")]
    pub service: String,

    /// Whether a visitor badge was requested.
    #[serde(rename = "carnetVisita")]
    pub badge_requested: bool,

    /// Signature as a PNG data URI.
    #[serde(rename = "firmaDataUrl")]
    pub signature: Option<String>,
}

impl VisitorRecord {
    /// Create an empty record for the given identifier.
    #[must_use]
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            ..Self::default()
        }
    }

    /// Read a string field.
    #[must_use]
    pub fn get(&self, field: RecordField) -> &str {
        match field {
            RecordField::Name => &self.name,
            RecordField::Company => &self.company,
            RecordField::Email => &self.email,
            RecordField::VisitDate => &self.visit_date,
            RecordField::ArrivalTime => &self.arrival_time,
            RecordField::DepartureTime => &self.departure_time,
            RecordField::Area => &self.area,
            RecordField::Service => &self.service,
            RecordField::Signature => self.signature.as_deref().unwrap_or_default(),
        }
    }

    /// Overwrite a string field.
    pub fn set(&mut self, field: RecordField, value: impl Into<String>) {
        let value = value.into();
        match field {
            RecordField::Name => self.name = value,
            RecordField::Company => self.company = value,
            RecordField::Email => self.email = value,
            RecordField::VisitDate => self.visit_date = value,
            RecordField::ArrivalTime => self.arrival_time = value,
            RecordField::DepartureTime => self.departure_time = value,
            RecordField::Area => self.area = value,
            RecordField::Service => self.service = value,
            RecordField::Signature => {
                self.signature = if value.is_empty() { None } else { Some(value) };
            }
        }
    }

    /// Apply a set of updates, leaving other fields untouched.
    pub fn apply(&mut self, updates: &FieldUpdates) {
        for (field, value) in updates {
            self.set(*field, value.clone());
        }
    }
}

/// A record as kept in local storage: every record field plus when it was
/// last saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredVisitor {
    /// The record itself.
    #[serde(flatten)]
    pub record: VisitorRecord,

    /// When this entry was last written locally.
    #[serde(rename = "savedAt", default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

/// Record fields that can be amended after creation.
///
/// The identifier is the lookup key and is never amended; the badge flag is
/// collected on arrival only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RecordField {
    /// `nombre`
    Name,
    /// `empresa`
    Company,
    /// `correo`
    Email,
    /// `fecha`
    VisitDate,
    /// `horaEntrada`
    ArrivalTime,
    /// `horaSalida`
    DepartureTime,
    /// `area`
    Area,
    /// `servicio`
    Service,
    /// `firmaDataUrl`
    Signature,
}

impl RecordField {
    /// Every amendable field.
    pub const ALL: [RecordField; 9] = [
        Self::Name,
        Self::Company,
        Self::Email,
        Self::VisitDate,
        Self::ArrivalTime,
        Self::DepartureTime,
        Self::Area,
        Self::Service,
        Self::Signature,
    ];

    /// The key used in local storage and API payloads.
    #[must_use]
    pub fn local_key(self) -> &'static str {
        match self {
            Self::Name => "nombre",
            Self::Company => "empresa",
            Self::Email => "correo",
            Self::VisitDate => "fecha",
            Self::ArrivalTime => "horaEntrada",
            Self::DepartureTime => "horaSalida",
            Self::Area => "area",
            Self::Service => "servicio",
            Self::Signature => "firmaDataUrl",
        }
    }
}

impl std::fmt::Display for RecordField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.local_key())
    }
}

/// Field updates for an amend operation.
pub type FieldUpdates = BTreeMap<RecordField, String>;

/// Build an update set that only changes the departure time.
#[must_use]
pub fn departure_update(departure_time: impl Into<String>) -> FieldUpdates {
    let mut updates = FieldUpdates::new();
    updates.insert(RecordField::DepartureTime, departure_time.into());
    updates
}

/// A string field that also accepts `null` (as empty) and JSON scalars
/// (as their text).
pub(crate) fn nullable_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(optional_string(deserializer)?.unwrap_or_default())
}

/// Like [`nullable_string`], but keeps `null` distinct from a value.
pub(crate) fn optional_string<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(scalar @ (Value::Number(_) | Value::Bool(_))) => Ok(Some(scalar.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected a string, found {other}"
        ))),
    }
}
