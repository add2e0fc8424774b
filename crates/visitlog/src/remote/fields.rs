//! Mapping between visitor records and remote list column names.

use serde_json::{Map, Value};

use crate::record::{FieldUpdates, RecordField, VisitorRecord};

/// Title used when a record has neither a name nor an identifier.
pub const DEFAULT_TITLE: &str = "Visitante";

/// Remote column holding the visitor identifier.
pub const IDENTIFIER_FIELD: &str = "Cedula";

/// Remote column holding the item title.
pub const TITLE_FIELD: &str = "Title";

/// Remote column name for an amendable record field.
#[must_use]
pub fn remote_name(field: RecordField) -> &'static str {
    match field {
        RecordField::Name => "Nombre",
        RecordField::Company => "Empresa",
        RecordField::Email => "Correo",
        RecordField::VisitDate => "Fecha",
        RecordField::ArrivalTime => "HoraEntrada",
        RecordField::DepartureTime => "HoraSalida",
        RecordField::Area => "Area",
        RecordField::Service => "Servicio",
        RecordField::Signature => "FirmaDataUrl",
    }
}

/// Derive the item title: the name, else the identifier, else [`DEFAULT_TITLE`].
#[must_use]
pub fn title_for(record: &VisitorRecord) -> &str {
    if !record.name.is_empty() {
        &record.name
    } else if !record.identifier.is_empty() {
        &record.identifier
    } else {
        DEFAULT_TITLE
    }
}

/// Columns written when a visit is created.
///
/// Departure time and the badge flag are not part of the create payload.
#[must_use]
pub fn create_fields(record: &VisitorRecord) -> Map<String, Value> {
    let columns = [
        (TITLE_FIELD, title_for(record)),
        (remote_name(RecordField::Name), record.name.as_str()),
        (IDENTIFIER_FIELD, record.identifier.as_str()),
        (remote_name(RecordField::Company), record.company.as_str()),
        (remote_name(RecordField::Email), record.email.as_str()),
        (remote_name(RecordField::VisitDate), record.visit_date.as_str()),
        (
            remote_name(RecordField::ArrivalTime),
            record.arrival_time.as_str(),
        ),
        (remote_name(RecordField::Service), record.service.as_str()),
        (remote_name(RecordField::Area), record.area.as_str()),
        (
            remote_name(RecordField::Signature),
            record.signature.as_deref().unwrap_or_default(),
        ),
    ];

    columns
        .into_iter()
        .map(|(name, value)| (name.to_string(), Value::String(value.to_string())))
        .collect()
}

/// Columns written by a partial update.
#[must_use]
pub fn update_fields(updates: &FieldUpdates) -> Map<String, Value> {
    updates
        .iter()
        .map(|(field, value)| (remote_name(*field).to_string(), Value::String(value.clone())))
        .collect()
}

/// Render a column value the way it is compared during lookup.
///
/// Strings compare by their content; other JSON values by their JSON text.
#[must_use]
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
