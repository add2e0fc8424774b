//! Arrival form session.
//!
//! A [`VisitorForm`] holds the values being entered for one arrival, owns the
//! signature [`StrokeSurface`] and follows its change notifications, so the
//! latest exported signature is always what gets submitted.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use chrono::{Local, NaiveDateTime};
use regex::Regex;
use tokio::sync::watch;

use crate::config::SignatureConfig;
use crate::error::{Error, Result};
use crate::record::VisitorRecord;
use crate::signature::{EncodedImage, StrokeSurface};

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\S+@\S+\.\S+$").expect("Invalid regex pattern"))
}

/// Mutable state of one arrival form.
#[derive(Debug)]
pub struct VisitorForm {
    /// Visit date, `YYYY-MM-DD`.
    pub visit_date: String,
    /// Arrival time, `HH:MM`.
    pub arrival_time: String,
    /// Visitor name.
    pub name: String,
    /// Visitor identifier (cédula).
    pub identifier: String,
    /// Visitor company.
    pub company: String,
    /// Contact email.
    pub email: String,
    /// Area being visited.
    pub area: String,
    /// Service requested.
    pub service: String,
    /// Whether a visitor badge was requested.
    pub badge_requested: bool,
    surface: StrokeSurface,
    signature: watch::Receiver<Option<EncodedImage>>,
}

impl VisitorForm {
    /// Start a form dated now, with a surface sized from `config`.
    #[must_use]
    pub fn new(config: &SignatureConfig) -> Self {
        Self::started_at(Local::now().naive_local(), StrokeSurface::from_config(config))
    }

    /// Start a form dated `now` that captures its signature on `surface`.
    #[must_use]
    pub fn started_at(now: NaiveDateTime, surface: StrokeSurface) -> Self {
        let signature = surface.subscribe();
        Self {
            visit_date: now.format("%Y-%m-%d").to_string(),
            arrival_time: now.format("%H:%M").to_string(),
            name: String::new(),
            identifier: String::new(),
            company: String::new(),
            email: String::new(),
            area: String::new(),
            service: String::new(),
            badge_requested: false,
            surface,
            signature,
        }
    }

    /// The signature surface, for feeding pointer input.
    pub fn surface_mut(&mut self) -> &mut StrokeSurface {
        &mut self.surface
    }

    /// The most recently published signature, if any.
    #[must_use]
    pub fn signature(&self) -> Option<EncodedImage> {
        self.signature.borrow().clone()
    }

    /// Check every field and report all failures at once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] mapping each failing field to a message.
    pub fn validate(&self) -> Result<()> {
        let mut errors = BTreeMap::new();
        let mut require = |key: &str, value: &str, message: &str| {
            if value.trim().is_empty() {
                errors.insert(key.to_string(), message.to_string());
            }
        };

        require("nombre", &self.name, "Nombre requerido");
        require("cedula", &self.identifier, "Cédula requerida");
        require("empresa", &self.company, "Empresa requerida");
        require("correo", &self.email, "Correo requerido");
        require("area", &self.area, "Área a visitar requerida");
        require("servicio", &self.service, "Servicio requerido");

        if !self.email.trim().is_empty() && !email_pattern().is_match(&self.email) {
            errors.insert("correo".to_string(), "Correo inválido".to_string());
        }

        if !self.signature().is_some_and(|image| !image.is_blank()) {
            errors.insert("firmaDataUrl".to_string(), "Firma requerida".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation { errors })
        }
    }

    /// Validate and produce the record to submit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if any field fails validation.
    pub fn into_record(self) -> Result<VisitorRecord> {
        self.validate()?;
        let signature = self.signature().map(|image| image.as_data_url().to_string());
        Ok(VisitorRecord {
            identifier: self.identifier,
            name: self.name,
            company: self.company,
            email: self.email,
            visit_date: self.visit_date,
            arrival_time: self.arrival_time,
            departure_time: String::new(),
            area: self.area,
            service: self.service,
            badge_requested: self.badge_requested,
            signature,
        })
    }
}
