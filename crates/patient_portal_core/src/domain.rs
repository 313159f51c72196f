//! crates/patient_portal_core/src/domain.rs
//!
//! Defines the core account and session data structures shared by every
//! use case. Medical and exam records live in their own modules.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Represents a user of the identity provider - used throughout app
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: String,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: String,
    pub hashed_password: String,
}

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// The authenticated caller of a request.
///
/// Produced once per request by the auth middleware and handed to every
/// handler and use case that needs to know who is acting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: String,
}

impl SessionContext {
    /// The identifier stored in `userId` / `patientId` document fields.
    pub fn owner_key(&self) -> String {
        self.user_id.to_string()
    }
}

impl From<User> for SessionContext {
    fn from(user: User) -> Self {
        Self {
            user_id: user.user_id,
            email: user.email,
            display_name: user.display_name,
        }
    }
}

/// The patient profile stored in the `patients` collection under the user id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub patient_id: String,
    pub patient_name: String,
    pub email: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Patient {
    pub const COLLECTION: &'static str = "patients";
}

/// Language used for user-facing messages and list separators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Ar,
}

impl Locale {
    /// Parses a short language code such as `en`, `ar` or `ar-SA`.
    pub fn parse(code: &str) -> Option<Self> {
        let primary = code.trim().split(['-', '_']).next()?.to_ascii_lowercase();
        match primary.as_str() {
            "en" => Some(Locale::En),
            "ar" => Some(Locale::Ar),
            _ => None,
        }
    }

    /// Picks the first supported language of an `Accept-Language` header.
    pub fn from_accept_language(header: Option<&str>, fallback: Locale) -> Locale {
        header
            .into_iter()
            .flat_map(|h| h.split(','))
            .filter_map(|part| part.split(';').next())
            .find_map(Locale::parse)
            .unwrap_or(fallback)
    }

    /// Separator used when a list of values is joined for display or editing.
    pub fn list_separator(self) -> &'static str {
        match self {
            Locale::En => ", ",
            Locale::Ar => "، ",
        }
    }
}
