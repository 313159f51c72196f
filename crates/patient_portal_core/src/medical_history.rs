//! crates/patient_portal_core/src/medical_history.rs
//!
//! The patient's medical history: diseases, allergies, medications and travel.
//! Each entry type lives in its own collection keyed by `patientId` and is
//! managed independently through [`MedicalHistoryRepository`].

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::ports::{DocumentStore, PortError, PortResult, StoredDocument};
use std::sync::Arc;

const PATIENT_FIELD: &str = "patientId";
const CREATED_FIELD: &str = "createdAt";
const UPDATED_FIELD: &str = "updatedAt";

//=========================================================================================
// Entry Types
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiseaseStatus {
    Active,
    Cured,
    Chronic,
    InTreatment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiseaseSeverity {
    Mild,
    Moderate,
    Severe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllergyType {
    Food,
    Medication,
    Environmental,
    Insect,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllergySeverity {
    Mild,
    Moderate,
    Severe,
    LifeThreatening,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TravelPurpose {
    Tourism,
    Business,
    Medical,
    Education,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Disease {
    #[serde(skip)]
    pub id: Option<String>,
    pub patient_id: String,
    pub disease_name: String,
    pub diagnosis_date: DateTime<Utc>,
    pub status: DiseaseStatus,
    pub severity: DiseaseSeverity,
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub treatments: Vec<String>,
    #[serde(default)]
    pub doctor_name: Option<String>,
    #[serde(default)]
    pub hospital_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Allergy {
    #[serde(skip)]
    pub id: Option<String>,
    pub patient_id: String,
    pub allergy_name: String,
    pub allergy_type: AllergyType,
    pub severity: AllergySeverity,
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub diagnosis_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub treatment: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Medication {
    #[serde(skip)]
    pub id: Option<String>,
    pub patient_id: String,
    pub medication_name: String,
    pub dosage: String,
    pub frequency: String,
    pub start_date: DateTime<Utc>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    pub is_active: bool,
    #[serde(default)]
    pub prescribed_by: Option<String>,
    pub reason_for_taking: String,
    #[serde(default)]
    pub side_effects: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TravelHistory {
    #[serde(skip)]
    pub id: Option<String>,
    pub patient_id: String,
    pub destination: String,
    pub departure_date: DateTime<Utc>,
    pub return_date: DateTime<Utc>,
    pub purpose: TravelPurpose,
    #[serde(default)]
    pub health_issues_during_travel: Vec<String>,
    #[serde(default)]
    pub vaccinations_taken: Vec<String>,
    #[serde(default)]
    pub countries_visited: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A medical-history entry stored in its own collection.
pub trait MedicalRecord: Serialize + DeserializeOwned + Send + Sync + 'static {
    const COLLECTION: &'static str;
    /// Human-readable entry kind used in log lines and errors.
    const KIND: &'static str;

    fn id(&self) -> Option<&str>;
    fn set_id(&mut self, id: String);
    fn patient_id(&self) -> &str;
}

macro_rules! medical_record {
    ($ty:ty, $collection:literal, $kind:literal) => {
        impl MedicalRecord for $ty {
            const COLLECTION: &'static str = $collection;
            const KIND: &'static str = $kind;

            fn id(&self) -> Option<&str> {
                self.id.as_deref()
            }

            fn set_id(&mut self, id: String) {
                self.id = Some(id);
            }

            fn patient_id(&self) -> &str {
                &self.patient_id
            }
        }
    };
}

medical_record!(Disease, "diseases", "Disease");
medical_record!(Allergy, "allergies", "Allergy");
medical_record!(Medication, "medications", "Medication");
medical_record!(TravelHistory, "travelHistory", "Travel history");

/// Every medical-history entry of one patient.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalHistory {
    pub diseases: Vec<Disease>,
    pub allergies: Vec<Allergy>,
    pub medications: Vec<Medication>,
    pub travel_history: Vec<TravelHistory>,
}

//=========================================================================================
// Repository
//=========================================================================================

/// CRUD over the medical-history collections of a [`DocumentStore`].
#[derive(Clone)]
pub struct MedicalHistoryRepository {
    store: Arc<dyn DocumentStore>,
}

impl MedicalHistoryRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn get_by_id<T: MedicalRecord>(&self, id: &str) -> PortResult<Option<T>> {
        match self.store.get(T::COLLECTION, id).await? {
            Some(doc) => decode_record(doc).map(Some),
            None => Ok(None),
        }
    }

    /// Inserts `record` when it has no id yet, otherwise updates the stored entry.
    /// Returns the record's id.
    pub async fn save<T: MedicalRecord>(&self, record: &mut T) -> PortResult<String> {
        let mut data = serde_json::to_value(&*record)
            .map_err(|e| PortError::Unexpected(format!("Failed to encode {}: {}", T::KIND, e)))?;
        let now = Value::String(Utc::now().to_rfc3339());

        match record.id().map(str::to_string) {
            Some(id) => {
                stamp(&mut data, UPDATED_FIELD, now);
                self.store.update(T::COLLECTION, &id, data).await?;
                info!("Updated {} {}", T::KIND, id);
                Ok(id)
            }
            None => {
                stamp(&mut data, CREATED_FIELD, now);
                let id = self.store.add(T::COLLECTION, data).await?;
                info!("Created {} {}", T::KIND, id);
                record.set_id(id.clone());
                Ok(id)
            }
        }
    }

    pub async fn delete<T: MedicalRecord>(&self, record: &T) -> PortResult<()> {
        let id = record
            .id()
            .ok_or_else(|| PortError::NotFound(format!("{} has not been saved", T::KIND)))?;
        self.store.delete(T::COLLECTION, id).await?;
        info!("Deleted {} {}", T::KIND, id);
        Ok(())
    }

    /// All entries of one kind for `patient_id`. Entries that no longer decode are skipped.
    pub async fn list_for_patient<T: MedicalRecord>(&self, patient_id: &str) -> PortResult<Vec<T>> {
        let docs = self
            .store
            .query_eq(T::COLLECTION, PATIENT_FIELD, patient_id)
            .await?;

        let mut records = Vec::with_capacity(docs.len());
        for doc in docs {
            let id = doc.id.clone();
            match decode_record::<T>(doc) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping {} {}: {}", T::KIND, id, e),
            }
        }
        Ok(records)
    }

    /// All four entry kinds, fetched concurrently.
    pub async fn full_history(&self, patient_id: &str) -> PortResult<MedicalHistory> {
        let (diseases, allergies, medications, travel_history) = futures::try_join!(
            self.list_for_patient::<Disease>(patient_id),
            self.list_for_patient::<Allergy>(patient_id),
            self.list_for_patient::<Medication>(patient_id),
            self.list_for_patient::<TravelHistory>(patient_id),
        )?;

        Ok(MedicalHistory {
            diseases,
            allergies,
            medications,
            travel_history,
        })
    }
}

fn decode_record<T: MedicalRecord>(doc: StoredDocument) -> PortResult<T> {
    let mut record: T = serde_json::from_value(doc.data)
        .map_err(|e| PortError::Unexpected(format!("Malformed {} {}: {}", T::KIND, doc.id, e)))?;
    record.set_id(doc.id);
    Ok(record)
}

fn stamp(data: &mut Value, field: &str, at: Value) {
    if let Some(map) = data.as_object_mut() {
        map.insert(field.to_string(), at);
    }
}
