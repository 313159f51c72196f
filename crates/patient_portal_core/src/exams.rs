//! crates/patient_portal_core/src/exams.rs
//!
//! Exam records and the normalizer that reads them back.
//!
//! Exams written over the application's lifetime do not share one shape: the
//! date may be a store timestamp, a `{seconds, nanoseconds}` object or missing,
//! and list fields may hold anything. [`decode_exam`] is the single place where
//! a stored document becomes an [`ExamRecord`], with every tolerated deviation
//! mapped to a fixed fallback:
//!
//! | field                       | fallback                          |
//! |-----------------------------|-----------------------------------|
//! | `date`                      | now, flagged with [`DateFallback`] |
//! | `symptoms`                  | `[]` when not an array            |
//! | `symptoms[]`                | dropped when not text             |
//! | `results`                   | `[]` when not an array            |
//! | `results[].disease`         | [`UNKNOWN_DISEASE`]               |
//! | `results[].confidence`      | `0.0` when not numeric            |
//! | `results[].confidenceLevel` | `low`                             |
//! | `notes`                     | absent when not a string          |
//! | `userId`                    | the user the history was loaded for |
//!
//! Only documents that are not objects are skipped, one by one, so a single
//! bad record never hides the rest of the history.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Map, Value};
use tracing::{error, info, warn};

use crate::diagnosis::{ConfidenceLevel, DiagnosisResult};
use crate::ports::{DocumentStore, PortError, PortResult, StoredDocument};

pub const COLLECTION: &str = "exams";
pub const DATE_FIELD: &str = "date";
pub const OWNER_FIELD: &str = "userId";

/// Placeholder for a stored result without a disease name.
pub const UNKNOWN_DISEASE: &str = "unknown";

//=========================================================================================
// Records
//=========================================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ExamRecord {
    /// Empty until the record has been stored.
    pub id: String,
    pub user_id: String,
    pub date: DateTime<Utc>,
    pub symptoms: Vec<String>,
    pub results: Vec<DiagnosisResult>,
    pub notes: Option<String>,
}

impl ExamRecord {
    /// A record about to be stored; id and date are assigned by the store.
    pub fn draft(user_id: String, symptoms: Vec<String>, results: Vec<DiagnosisResult>) -> Self {
        Self {
            id: String::new(),
            user_id,
            date: Utc::now(),
            symptoms,
            results,
            notes: None,
        }
    }

    /// The stored shape, without the id and date the store assigns.
    pub fn to_document(&self) -> Value {
        let mut doc = json!({
            "userId": self.user_id,
            "symptoms": self.symptoms,
            "results": self.results,
        });
        if let (Some(notes), Some(map)) = (&self.notes, doc.as_object_mut()) {
            map.insert("notes".to_string(), Value::String(notes.clone()));
        }
        doc
    }
}

/// Why an exam's date had to be replaced by the load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFallback {
    Missing,
    Unrecognized,
}

/// An exam as read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedExam {
    pub record: ExamRecord,
    /// Set when `record.date` is the load time rather than the stored date.
    pub date_fallback: Option<DateFallback>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExamDecodeError {
    #[error("exam {0} is not an object")]
    NotAnObject(String),
}

//=========================================================================================
// Date Encodings
//=========================================================================================

/// The date encodings found in stored exams, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoredDate {
    /// A timestamp written by the store itself (RFC 3339 text).
    Native(DateTime<Utc>),
    /// A `{seconds, nanoseconds}` object, or the `_seconds`/`_nanoseconds` export form.
    Parts { seconds: i64, nanoseconds: u32 },
    Missing,
    Unrecognized,
}

impl StoredDate {
    pub fn classify(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => Self::Missing,
            Some(Value::String(text)) => DateTime::parse_from_rfc3339(text)
                .map(|date| Self::Native(date.with_timezone(&Utc)))
                .unwrap_or(Self::Unrecognized),
            Some(Value::Object(map)) => timestamp_parts(map, "seconds", "nanoseconds")
                .or_else(|| timestamp_parts(map, "_seconds", "_nanoseconds"))
                .map(|(seconds, nanoseconds)| Self::Parts { seconds, nanoseconds })
                .unwrap_or(Self::Unrecognized),
            Some(_) => Self::Unrecognized,
        }
    }

    /// The decoded date, or `now` together with the reason it was substituted.
    pub fn resolve(self, now: DateTime<Utc>) -> (DateTime<Utc>, Option<DateFallback>) {
        match self {
            Self::Native(date) => (date, None),
            Self::Parts { seconds, nanoseconds } => match Utc.timestamp_opt(seconds, nanoseconds).single() {
                Some(date) => (date, None),
                None => (now, Some(DateFallback::Unrecognized)),
            },
            Self::Missing => (now, Some(DateFallback::Missing)),
            Self::Unrecognized => (now, Some(DateFallback::Unrecognized)),
        }
    }
}

fn timestamp_parts(map: &Map<String, Value>, secs_key: &str, nanos_key: &str) -> Option<(i64, u32)> {
    let seconds = map.get(secs_key)?.as_i64()?;
    let nanoseconds = u32::try_from(map.get(nanos_key)?.as_u64()?).ok()?;
    Some((seconds, nanoseconds))
}

//=========================================================================================
// The Normalizer
//=========================================================================================

/// Decodes one stored exam document loaded for `owner`.
pub fn decode_exam(
    doc: &StoredDocument,
    owner: &str,
    now: DateTime<Utc>,
) -> Result<DecodedExam, ExamDecodeError> {
    let data = doc
        .data
        .as_object()
        .ok_or_else(|| ExamDecodeError::NotAnObject(doc.id.clone()))?;

    let (date, date_fallback) = StoredDate::classify(data.get(DATE_FIELD)).resolve(now);

    let symptoms = match data.get("symptoms") {
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .filter_map(|(index, item)| match item.as_str() {
                Some(symptom) => Some(symptom.to_string()),
                None => {
                    warn!("Exam {} has a non-text symptom at position {}, dropping it", doc.id, index);
                    None
                }
            })
            .collect(),
        _ => Vec::new(),
    };

    let results = match data.get("results") {
        Some(Value::Array(items)) => items.iter().map(decode_result).collect(),
        _ => Vec::new(),
    };

    let record = ExamRecord {
        id: doc.id.clone(),
        user_id: data
            .get(OWNER_FIELD)
            .and_then(Value::as_str)
            .unwrap_or(owner)
            .to_string(),
        date,
        symptoms,
        results,
        notes: data.get("notes").and_then(Value::as_str).map(str::to_string),
    };

    Ok(DecodedExam { record, date_fallback })
}

fn decode_result(value: &Value) -> DiagnosisResult {
    let disease = value
        .get("disease")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .unwrap_or(UNKNOWN_DISEASE);

    DiagnosisResult {
        disease: disease.to_string(),
        confidence: value.get("confidence").and_then(Value::as_f64).unwrap_or(0.0),
        confidence_level: value
            .get("confidenceLevel")
            .and_then(Value::as_str)
            .and_then(ConfidenceLevel::parse)
            .unwrap_or_default(),
    }
}

//=========================================================================================
// History
//=========================================================================================

/// A user's exams, newest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExamHistory {
    pub exams: Vec<DecodedExam>,
    /// Ids of documents that could not be decoded.
    pub skipped: Vec<String>,
}

impl ExamHistory {
    /// Decodes every document independently and orders the survivors by date.
    pub fn from_documents(docs: Vec<StoredDocument>, owner: &str, now: DateTime<Utc>) -> Self {
        let mut history = Self::default();

        for doc in docs {
            match decode_exam(&doc, owner, now) {
                Ok(exam) => {
                    match exam.date_fallback {
                        Some(DateFallback::Missing) => {
                            warn!("Exam {} has no date, using the current time", doc.id)
                        }
                        Some(DateFallback::Unrecognized) => {
                            warn!("Exam {} has an unrecognized date format, using the current time", doc.id)
                        }
                        None => {}
                    }
                    history.exams.push(exam);
                }
                Err(e) => {
                    error!("Skipping exam {}: {}", doc.id, e);
                    history.skipped.push(doc.id);
                }
            }
        }

        history
            .exams
            .sort_by(|a, b| b.record.date.cmp(&a.record.date));
        history
    }

    /// Whether `id` is one of the loaded exams or one of the skipped documents.
    pub fn contains(&self, id: &str) -> bool {
        self.exams.iter().any(|exam| exam.record.id == id) || self.skipped.iter().any(|s| s == id)
    }

    /// Drops `id` from the in-memory lists. Returns whether it was present.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.exams.len() + self.skipped.len();
        self.exams.retain(|exam| exam.record.id != id);
        self.skipped.retain(|s| s != id);
        self.exams.len() + self.skipped.len() != before
    }
}

/// Loads all exams owned by `user_id`.
///
/// No ordering is asked of the store; sorting happens after the fetch.
pub async fn load_history(store: &dyn DocumentStore, user_id: &str) -> PortResult<ExamHistory> {
    let docs = store.query_eq(COLLECTION, OWNER_FIELD, user_id).await?;
    let history = ExamHistory::from_documents(docs, user_id, Utc::now());
    info!(
        "Loaded {} exam(s) for user {} ({} skipped)",
        history.exams.len(),
        user_id,
        history.skipped.len()
    );
    Ok(history)
}

/// Deletes one exam of a loaded history and drops it from the list.
///
/// Only ids that belong to `history`, skipped documents included, can be
/// deleted; exactly one delete is issued to the store.
pub async fn delete_exam(
    store: &dyn DocumentStore,
    history: &mut ExamHistory,
    id: &str,
) -> PortResult<()> {
    if !history.contains(id) {
        return Err(PortError::NotFound(format!("Exam {} not found", id)));
    }
    store.delete(COLLECTION, id).await?;
    history.remove(id);
    info!("Deleted exam {}", id);
    Ok(())
}
