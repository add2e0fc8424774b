//! HTTP API for creating and amending visitor items.
//!
//! Both endpoints live at `/api/visitors` and always answer with a JSON
//! envelope: `{"ok": true, ...}` on success, `{"ok": false, "error": ...}`
//! otherwise.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::reply::Response;
use warp::{Filter, Reply};

use crate::error::{Error, Result};
use crate::record::{FieldUpdates, RecordField, VisitorRecord};
use crate::remote::fields::IDENTIFIER_FIELD;
use crate::remote::{create_fields, update_fields, RemoteList};

/// Largest accepted request body. Signatures travel inline as data URIs.
const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AmendRequest {
    #[serde(deserialize_with = "crate::record::nullable_string")]
    cedula: String,
    #[serde(rename = "horaSalida", deserialize_with = "crate::record::optional_string")]
    departure_time: Option<String>,
}

/// Build the `/api/visitors` routes.
pub fn routes(
    remote: Arc<dyn RemoteList>,
) -> impl Filter<Extract = impl Reply, Error = warp::Rejection> + Clone {
    let create = warp::path!("api" / "visitors")
        .and(warp::post())
        .and(body())
        .and(with_remote(remote.clone()))
        .then(create_visitor);

    let amend = warp::path!("api" / "visitors")
        .and(warp::patch())
        .and(body())
        .and(with_remote(remote))
        .then(amend_visitor);

    create.or(amend).unify().with(warp::trace::request())
}

/// Serve the API on `addr` until `shutdown` resolves.
///
/// # Errors
///
/// Returns [`Error::ServerBind`] if the address cannot be bound.
pub async fn serve(
    addr: SocketAddr,
    remote: Arc<dyn RemoteList>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let (bound, server) = warp::serve(routes(remote))
        .try_bind_with_graceful_shutdown(addr, shutdown)
        .map_err(|e| Error::ServerBind {
            address: addr.to_string(),
            message: e.to_string(),
        })?;

    info!("HTTP API listening on {bound}");
    server.await;
    info!("HTTP API stopped");
    Ok(())
}

/// The raw request body. Neither a `Content-Length` header nor a non-empty
/// body is required; size is checked by [`parse_body`].
fn body() -> impl Filter<Extract = (Bytes,), Error = warp::Rejection> + Clone {
    warp::body::bytes()
}

fn with_remote(
    remote: Arc<dyn RemoteList>,
) -> impl Filter<Extract = (Arc<dyn RemoteList>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || remote.clone())
}

/// Why a request body could not be used.
enum BodyError {
    TooLarge,
    Invalid(Error),
}

impl BodyError {
    fn into_response(self, method: &str) -> Response {
        match self {
            Self::TooLarge => failure(
                StatusCode::PAYLOAD_TOO_LARGE,
                &format!("request body exceeds {MAX_BODY_BYTES} bytes"),
            ),
            Self::Invalid(e) => {
                error!("{method} /api/visitors failed: {e}");
                failure(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
            }
        }
    }
}

/// Check the size of a JSON body and parse it, treating an empty body as `{}`.
fn parse_body<T: DeserializeOwned>(body: &[u8]) -> std::result::Result<T, BodyError> {
    if body.len() > MAX_BODY_BYTES {
        return Err(BodyError::TooLarge);
    }
    decode_json(body).map_err(BodyError::Invalid)
}

fn decode_json<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        Ok(serde_json::from_str("{}")?)
    } else {
        Ok(serde_json::from_slice(body)?)
    }
}

async fn create_visitor(body: Bytes, remote: Arc<dyn RemoteList>) -> Response {
    let record: VisitorRecord = match parse_body(&body) {
        Ok(record) => record,
        Err(e) => return e.into_response("POST"),
    };

    match remote.create(create_fields(&record)).await {
        Ok(result) => reply(StatusCode::OK, json!({ "ok": true, "result": result })),
        Err(e) => {
            error!("POST /api/visitors failed: {e}");
            failure(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

async fn amend_visitor(body: Bytes, remote: Arc<dyn RemoteList>) -> Response {
    let request: AmendRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(e) => return e.into_response("PATCH"),
    };

    let identifier = request.cedula.trim();
    if identifier.is_empty() {
        return failure(StatusCode::BAD_REQUEST, "cedula required");
    }

    let mut updates = FieldUpdates::new();
    if let Some(departure_time) = request.departure_time {
        updates.insert(RecordField::DepartureTime, departure_time);
    }

    match amend(remote.as_ref(), identifier, &updates).await {
        Ok(update) => reply(StatusCode::OK, json!({ "ok": true, "update": update })),
        Err(e) if e.is_not_found() => failure(StatusCode::NOT_FOUND, "not found"),
        Err(e) => {
            error!("PATCH /api/visitors failed: {e}");
            failure(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

async fn amend(remote: &dyn RemoteList, identifier: &str, updates: &FieldUpdates) -> Result<Value> {
    let item = remote
        .find_by_field(IDENTIFIER_FIELD, identifier)
        .await?
        .ok_or_else(|| Error::not_found(identifier))?;
    remote.update(&item.id, update_fields(updates)).await
}

fn reply(status: StatusCode, body: Value) -> Response {
    warp::reply::with_status(warp::reply::json(&body), status).into_response()
}

fn failure(status: StatusCode, message: &str) -> Response {
    reply(status, json!({ "ok": false, "error": message }))
}
