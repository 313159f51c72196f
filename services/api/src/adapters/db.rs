//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DocumentStore` and `IdentityService` ports from the `core` crate. It
//! handles all interactions with the PostgreSQL database using `sqlx`.
//!
//! Documents are kept as JSONB rows in a single `documents` table, partitioned
//! by collection name.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use patient_portal_core::domain::{User, UserCredentials};
use patient_portal_core::ports::{
    DocumentStore, IdentityService, PortError, PortResult, StoredDocument,
};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DocumentStore` and `IdentityService` ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct DocumentRecord {
    id: String,
    data: Value,
}
impl DocumentRecord {
    fn to_domain(self) -> StoredDocument {
        StoredDocument {
            id: self.id,
            data: self.data,
        }
    }
}

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    email: String,
    display_name: String,
    hashed_password: String,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            user_id: self.user_id,
            email: self.email,
            display_name: self.display_name,
        }
    }

    fn to_credentials(self) -> UserCredentials {
        UserCredentials {
            user_id: self.user_id,
            email: self.email,
            display_name: self.display_name,
            hashed_password: self.hashed_password,
        }
    }
}

//=========================================================================================
// `DocumentStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl DocumentStore for DbAdapter {
    async fn add(&self, collection: &str, data: Value) -> PortResult<String> {
        let id = Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO documents (collection, id, data) VALUES ($1, $2, $3)")
            .bind(collection)
            .bind(&id)
            .bind(&data)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(id)
    }

    async fn add_with_server_timestamp(
        &self,
        collection: &str,
        data: Value,
        timestamp_field: &str,
    ) -> PortResult<String> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"INSERT INTO documents (collection, id, data)
               VALUES ($1, $2, jsonb_set($3::jsonb, ARRAY[$4::text],
                   to_jsonb(to_char(now() AT TIME ZONE 'UTC', 'YYYY-MM-DD"T"HH24:MI:SS.US"Z"'))))"#,
        )
        .bind(collection)
        .bind(&id)
        .bind(&data)
        .bind(timestamp_field)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO documents (collection, id, data) VALUES ($1, $2, $3) \
             ON CONFLICT (collection, id) DO UPDATE SET data = EXCLUDED.data",
        )
        .bind(collection)
        .bind(id)
        .bind(&data)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, data: Value) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE documents SET data = data || $3::jsonb WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .bind(&data)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("{}/{} not found", collection, id)));
        }
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> PortResult<Option<StoredDocument>> {
        let record = sqlx::query_as::<_, DocumentRecord>(
            "SELECT id, data FROM documents WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(DocumentRecord::to_domain))
    }

    async fn delete(&self, collection: &str, id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> PortResult<Vec<StoredDocument>> {
        let records = sqlx::query_as::<_, DocumentRecord>(
            "SELECT id, data FROM documents WHERE collection = $1 AND data ->> $2 = $3",
        )
        .bind(collection)
        .bind(field)
        .bind(value)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }
}

//=========================================================================================
// `IdentityService` Trait Implementation
//=========================================================================================

#[async_trait]
impl IdentityService for DbAdapter {
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
        display_name: &str,
    ) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (user_id, email, display_name, hashed_password) VALUES ($1, $2, $3, $4) \
             RETURNING user_id, email, display_name, hashed_password",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(display_name)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                PortError::Conflict(format!("Email {} is already registered", email))
            }
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT user_id, email, display_name, hashed_password FROM users WHERE lower(email) = lower($1)",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", email)),
            _ => unexpected(e),
        })?;
        Ok(record.to_credentials())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT u.user_id, u.email, u.display_name, u.hashed_password \
             FROM auth_sessions s JOIN users u ON u.user_id = s.user_id \
             WHERE s.id = $1 AND s.expires_at > now()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        record
            .map(UserRecord::to_domain)
            .ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}
