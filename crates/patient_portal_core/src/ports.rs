//! crates/patient_portal_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete document store, identity provider and
//! inference server.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::diagnosis::{DiagnoseRequest, DiagnosisError, DiagnosisResult};
use crate::domain::{User, UserCredentials};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// A raw document as returned by the store, before any decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub data: Value,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// A flat, schemaless document store organized in named collections.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts a document under a freshly generated id and returns that id.
    async fn add(&self, collection: &str, data: Value) -> PortResult<String>;

    /// Like `add`, but the store writes its own current time into `timestamp_field`.
    async fn add_with_server_timestamp(
        &self,
        collection: &str,
        data: Value,
        timestamp_field: &str,
    ) -> PortResult<String>;

    /// Creates or replaces the document stored under `id`.
    async fn set(&self, collection: &str, id: &str, data: Value) -> PortResult<()>;

    /// Merges the top-level fields of `data` into an existing document.
    async fn update(&self, collection: &str, id: &str, data: Value) -> PortResult<()>;

    async fn get(&self, collection: &str, id: &str) -> PortResult<Option<StoredDocument>>;

    async fn delete(&self, collection: &str, id: &str) -> PortResult<()>;

    /// Returns every document whose string field `field` equals `value`.
    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> PortResult<Vec<StoredDocument>>;
}

/// The identity provider: accounts and login sessions.
#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
        display_name: &str,
    ) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Resolves a live session id to its user.
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<User>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;
}

/// The external symptom-to-disease inference server.
#[async_trait]
pub trait DiagnosisService: Send + Sync {
    /// Sends one diagnosis request to the server at `host` (`host:port`).
    async fn diagnose(
        &self,
        host: &str,
        request: &DiagnoseRequest,
    ) -> Result<Vec<DiagnosisResult>, DiagnosisError>;

    /// Checks that the server at `host` answers its root path, returning the status code.
    async fn health_check(&self, host: &str) -> Result<u16, DiagnosisError>;
}
