//! `visitlog` - Visitor registration with remote list storage and local fallback
//!
//! This library captures visitor arrivals (including a drawn signature),
//! writes them to a SharePoint list through the Microsoft Graph API, and
//! keeps a local `SQLite` copy whenever the remote write fails. Departures
//! are recorded by amending the stored record.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod form;
pub mod logging;
pub mod record;
pub mod remote;
pub mod signature;
pub mod storage;
pub mod sync;

pub use config::Config;
pub use error::{Error, Result};
pub use form::VisitorForm;
pub use logging::init_logging;
pub use record::{FieldUpdates, RecordField, StoredVisitor, VisitorRecord};
pub use remote::{GraphClient, ListItem, RemoteList};
pub use signature::{EncodedImage, StrokeSample, StrokeSurface};
pub use storage::LocalStore;
pub use sync::{AmendOutcome, SubmitOutcome, SyncClient};
