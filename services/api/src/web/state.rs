//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use axum::http::StatusCode;
use patient_portal_core::messages;
use patient_portal_core::ports::{DiagnosisService, DocumentStore, IdentityService};
use patient_portal_core::{Locale, MedicalHistoryRepository};
use std::sync::Arc;
use tracing::warn;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub identity: Arc<dyn IdentityService>,
    pub diagnosis: Arc<dyn DiagnosisService>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn medical_history(&self) -> MedicalHistoryRepository {
        MedicalHistoryRepository::new(self.store.clone())
    }

    /// The locale asked for by `Accept-Language`, or the configured default.
    pub fn locale(&self, headers: &axum::http::HeaderMap) -> Locale {
        let header = headers
            .get(axum::http::header::ACCEPT_LANGUAGE)
            .and_then(|v| v.to_str().ok());
        Locale::from_accept_language(header, self.config.default_locale)
    }

    /// The inference server for a request: the configured one unless the
    /// request names another host from the allowlist.
    pub fn diagnosis_host(
        &self,
        requested: Option<&str>,
        locale: Locale,
    ) -> Result<String, (StatusCode, String)> {
        match requested.map(str::trim).filter(|h| !h.is_empty()) {
            None => Ok(self.config.diagnosis_host.clone()),
            Some(host) if self.config.is_allowed_diagnosis_host(host) => Ok(host.to_string()),
            Some(host) => {
                warn!("Rejected diagnosis host override {}", host);
                Err((StatusCode::BAD_REQUEST, messages::host_not_allowed(locale, host)))
            }
        }
    }
}
