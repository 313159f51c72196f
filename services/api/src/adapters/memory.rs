//! services/api/src/adapters/memory.rs
//!
//! In-process implementations of the `DocumentStore` and `IdentityService`
//! ports, used when no database is configured and by the web tests.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use patient_portal_core::domain::{AuthSession, User, UserCredentials};
use patient_portal_core::ports::{
    DocumentStore, IdentityService, PortError, PortResult, StoredDocument,
};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Collections keep insertion order so listings are stable.
#[derive(Default)]
pub struct MemoryAdapter {
    collections: RwLock<HashMap<String, Vec<StoredDocument>>>,
    users: RwLock<HashMap<String, UserCredentials>>,
    sessions: RwLock<HashMap<String, AuthSession>>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryAdapter {
    async fn add(&self, collection: &str, data: Value) -> PortResult<String> {
        let id = Uuid::new_v4().to_string();
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .push(StoredDocument {
                id: id.clone(),
                data,
            });
        Ok(id)
    }

    async fn add_with_server_timestamp(
        &self,
        collection: &str,
        mut data: Value,
        timestamp_field: &str,
    ) -> PortResult<String> {
        let map = data
            .as_object_mut()
            .ok_or_else(|| PortError::Unexpected("documents must be JSON objects".to_string()))?;
        map.insert(
            timestamp_field.to_string(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)),
        );
        self.add(collection, data).await
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> PortResult<()> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        match docs.iter_mut().find(|doc| doc.id == id) {
            Some(doc) => doc.data = data,
            None => docs.push(StoredDocument {
                id: id.to_string(),
                data,
            }),
        }
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, data: Value) -> PortResult<()> {
        let mut collections = self.collections.write().await;
        let doc = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|doc| doc.id == id))
            .ok_or_else(|| PortError::NotFound(format!("{}/{} not found", collection, id)))?;

        match (doc.data.as_object_mut(), data) {
            (Some(target), Value::Object(fields)) => {
                target.extend(fields);
                Ok(())
            }
            _ => Err(PortError::Unexpected(
                "documents must be JSON objects".to_string(),
            )),
        }
    }

    async fn get(&self, collection: &str, id: &str) -> PortResult<Option<StoredDocument>> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .and_then(|docs| docs.iter().find(|doc| doc.id == id).cloned()))
    }

    async fn delete(&self, collection: &str, id: &str) -> PortResult<()> {
        if let Some(docs) = self.collections.write().await.get_mut(collection) {
            docs.retain(|doc| doc.id != id);
        }
        Ok(())
    }

    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> PortResult<Vec<StoredDocument>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| doc.data.get(field).and_then(Value::as_str) == Some(value))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl IdentityService for MemoryAdapter {
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
        display_name: &str,
    ) -> PortResult<User> {
        let mut users = self.users.write().await;
        let key = email.to_lowercase();
        if users.contains_key(&key) {
            return Err(PortError::Conflict(format!(
                "Email {} is already registered",
                email
            )));
        }

        let credentials = UserCredentials {
            user_id: Uuid::new_v4(),
            email: email.to_string(),
            display_name: display_name.to_string(),
            hashed_password: hashed_password.to_string(),
        };
        let user = User {
            user_id: credentials.user_id,
            email: credentials.email.clone(),
            display_name: credentials.display_name.clone(),
        };
        users.insert(key, credentials);
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        self.users
            .read()
            .await
            .get(&email.to_lowercase())
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", email)))
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        self.sessions.write().await.insert(
            session_id.to_string(),
            AuthSession {
                id: session_id.to_string(),
                user_id,
                expires_at,
            },
        );
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<User> {
        let user_id = {
            let mut sessions = self.sessions.write().await;
            let (user_id, expires_at) = sessions
                .get(session_id)
                .map(|session| (session.user_id, session.expires_at))
                .ok_or(PortError::Unauthorized)?;
            if expires_at <= Utc::now() {
                sessions.remove(session_id);
                return Err(PortError::Unauthorized);
            }
            user_id
        };

        self.users
            .read()
            .await
            .values()
            .find(|creds| creds.user_id == user_id)
            .map(|creds| User {
                user_id: creds.user_id,
                email: creds.email.clone(),
                display_name: creds.display_name.clone(),
            })
            .ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.sessions.write().await.remove(session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[tokio::test]
    async fn update_merges_fields_and_requires_existing_document() {
        let store = MemoryAdapter::new();
        let id = store.add("diseases", json!({"a": 1, "b": 2})).await.unwrap();
        store.update("diseases", &id, json!({"b": 3, "c": 4})).await.unwrap();

        let doc = store.get("diseases", &id).await.unwrap().unwrap();
        assert_eq!(doc.data, json!({"a": 1, "b": 3, "c": 4}));
        assert!(matches!(
            store.update("diseases", "nope", json!({})).await,
            Err(PortError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn server_timestamp_is_written_as_rfc3339() {
        let store = MemoryAdapter::new();
        let id = store
            .add_with_server_timestamp("exams", json!({"userId": "u"}), "date")
            .await
            .unwrap();
        let doc = store.get("exams", &id).await.unwrap().unwrap();
        let date = doc.data["date"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(date).is_ok());
    }

    #[tokio::test]
    async fn query_filters_on_field_equality() {
        let store = MemoryAdapter::new();
        store.add("exams", json!({"userId": "a"})).await.unwrap();
        store.add("exams", json!({"userId": "b"})).await.unwrap();
        store.add("exams", json!({"userId": "a"})).await.unwrap();
        assert_eq!(store.query_eq("exams", "userId", "a").await.unwrap().len(), 2);
        assert!(store.query_eq("patients", "userId", "a").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sessions_expire_and_emails_are_unique() {
        let identity = MemoryAdapter::new();
        let user = identity
            .create_user_with_email("Sara@Example.com", "hash", "Sara")
            .await
            .unwrap();
        assert!(matches!(
            identity.create_user_with_email("sara@example.com", "hash", "Sara").await,
            Err(PortError::Conflict(_))
        ));

        identity
            .create_auth_session("live", user.user_id, Utc::now() + Duration::days(1))
            .await
            .unwrap();
        identity
            .create_auth_session("stale", user.user_id, Utc::now() - Duration::days(1))
            .await
            .unwrap();

        assert_eq!(identity.validate_auth_session("live").await.unwrap(), user);
        assert!(identity.validate_auth_session("stale").await.is_err());
        assert!(!identity.sessions.read().await.contains_key("stale"));

        identity.delete_auth_session("live").await.unwrap();
        assert!(identity.validate_auth_session("live").await.is_err());
    }
}
