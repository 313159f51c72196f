//! In-crate fakes of the ports used by the unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::diagnosis::{interpret_response, DiagnoseRequest, DiagnosisError, DiagnosisResult};
use crate::ports::{DiagnosisService, DocumentStore, PortError, PortResult, StoredDocument};

/// A document store that keeps insertion order and records every delete.
#[derive(Default)]
pub struct RecordingStore {
    collections: Mutex<HashMap<String, Vec<StoredDocument>>>,
    deletes: Mutex<Vec<(String, String)>>,
    fail_writes: bool,
}

impl RecordingStore {
    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub fn document(&self, collection: &str, id: &str) -> Option<Value> {
        self.collections
            .lock()
            .unwrap()
            .get(collection)?
            .iter()
            .find(|doc| doc.id == id)
            .map(|doc| doc.data.clone())
    }

    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .lock()
            .unwrap()
            .get(collection)
            .map_or(0, Vec::len)
    }

    pub fn deletes(&self) -> Vec<(String, String)> {
        self.deletes.lock().unwrap().clone()
    }

    fn check_writable(&self) -> PortResult<()> {
        if self.fail_writes {
            return Err(PortError::Unexpected("store is read-only".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for RecordingStore {
    async fn add(&self, collection: &str, data: Value) -> PortResult<String> {
        self.check_writable()?;
        let id = Uuid::new_v4().to_string();
        self.collections
            .lock()
            .unwrap()
            .entry(collection.to_string())
            .or_default()
            .push(StoredDocument { id: id.clone(), data });
        Ok(id)
    }

    async fn add_with_server_timestamp(
        &self,
        collection: &str,
        mut data: Value,
        timestamp_field: &str,
    ) -> PortResult<String> {
        if let Some(map) = data.as_object_mut() {
            map.insert(
                timestamp_field.to_string(),
                Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)),
            );
        }
        self.add(collection, data).await
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> PortResult<()> {
        self.check_writable()?;
        let mut collections = self.collections.lock().unwrap();
        let docs = collections.entry(collection.to_string()).or_default();
        match docs.iter_mut().find(|doc| doc.id == id) {
            Some(doc) => doc.data = data,
            None => docs.push(StoredDocument { id: id.to_string(), data }),
        }
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, data: Value) -> PortResult<()> {
        self.check_writable()?;
        let mut collections = self.collections.lock().unwrap();
        let doc = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|doc| doc.id == id))
            .ok_or_else(|| PortError::NotFound(format!("{}/{}", collection, id)))?;
        if let (Some(target), Value::Object(fields)) = (doc.data.as_object_mut(), data) {
            target.extend(fields);
        }
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> PortResult<Option<StoredDocument>> {
        Ok(self
            .collections
            .lock()
            .unwrap()
            .get(collection)
            .and_then(|docs| docs.iter().find(|doc| doc.id == id).cloned()))
    }

    async fn delete(&self, collection: &str, id: &str) -> PortResult<()> {
        self.check_writable()?;
        self.deletes
            .lock()
            .unwrap()
            .push((collection.to_string(), id.to_string()));
        if let Some(docs) = self.collections.lock().unwrap().get_mut(collection) {
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
        Ok(self
            .collections
            .lock()
            .unwrap()
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

/// A diagnosis server that answers every request with a canned response.
pub struct StubDiagnosis {
    status: u16,
    body: String,
    requests: Mutex<Vec<(String, DiagnoseRequest)>>,
}

impl StubDiagnosis {
    pub fn replying(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<(String, DiagnoseRequest)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl DiagnosisService for StubDiagnosis {
    async fn diagnose(
        &self,
        host: &str,
        request: &DiagnoseRequest,
    ) -> Result<Vec<DiagnosisResult>, DiagnosisError> {
        self.requests
            .lock()
            .unwrap()
            .push((host.to_string(), request.clone()));
        interpret_response(self.status, &self.body)
    }

    async fn health_check(&self, _host: &str) -> Result<u16, DiagnosisError> {
        Ok(self.status)
    }
}
