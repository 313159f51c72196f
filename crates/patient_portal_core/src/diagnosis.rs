//! crates/patient_portal_core/src/diagnosis.rs
//!
//! The diagnosis round-trip: building the request sent to the inference
//! server, interpreting whatever comes back, and recording the outcome as an
//! exam. Sending the request and persisting the exam are separate operations
//! so that callers can report each outcome on its own.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::domain::{Locale, SessionContext};
use crate::exams::{self, ExamRecord};
use crate::messages;
use crate::ports::{DiagnosisService, DocumentStore, PortResult};
use crate::symptoms::{SymptomError, SymptomSelection};

//=========================================================================================
// Result Types
//=========================================================================================

/// Coarse bucket of a numeric confidence score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    /// The bucketing the inference server itself applies.
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence > 0.7 {
            Self::High
        } else if confidence > 0.4 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// One ranked disease candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisResult {
    pub disease: String,
    pub confidence: f64,
    pub confidence_level: ConfidenceLevel,
}

impl DiagnosisResult {
    /// Confidence as a percentage with one decimal, e.g. `82.0%`.
    pub fn confidence_percent(&self) -> String {
        format!("{:.1}%", self.confidence * 100.0)
    }
}

/// Primary and secondary candidates of a ranked result list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiagnosisSummary<'a> {
    pub primary: &'a DiagnosisResult,
    pub secondary: &'a [DiagnosisResult],
}

impl<'a> DiagnosisSummary<'a> {
    /// The server ranks by descending confidence, so the head is the primary result.
    pub fn from_results(results: &'a [DiagnosisResult]) -> Option<Self> {
        let (primary, secondary) = results.split_first()?;
        Some(Self { primary, secondary })
    }
}

//=========================================================================================
// Wire Types
//=========================================================================================

/// The JSON body posted to `/api/diagnose`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnoseRequest {
    pub symptoms: String,
    pub auto_use_suggestions: bool,
}

impl DiagnoseRequest {
    pub fn from_selection(selection: &SymptomSelection) -> Self {
        Self {
            symptoms: selection.joined(),
            auto_use_suggestions: true,
        }
    }
}

#[derive(Deserialize)]
struct DiagnoseResponse {
    results: Vec<RawDiagnosisResult>,
}

#[derive(Deserialize)]
struct RawDiagnosisResult {
    disease: String,
    confidence: f64,
    #[serde(default)]
    confidence_level: Option<String>,
}

impl RawDiagnosisResult {
    fn into_result(self) -> DiagnosisResult {
        let confidence_level = match self.confidence_level.as_deref().and_then(ConfidenceLevel::parse) {
            Some(level) => level,
            None => {
                warn!(
                    "Unrecognized confidence level {:?} for '{}', deriving it from the score",
                    self.confidence_level, self.disease
                );
                ConfidenceLevel::from_confidence(self.confidence)
            }
        };
        DiagnosisResult {
            disease: self.disease,
            confidence: self.confidence,
            confidence_level,
        }
    }
}

//=========================================================================================
// Errors
//=========================================================================================

/// What a failed response from the inference server told us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerErrorDetail {
    /// A `message` field from a JSON body, or the raw non-JSON body.
    Text(String),
    /// A JSON body without a usable `message`.
    Unspecified,
    /// No body at all.
    Empty,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DiagnosisError {
    #[error("no symptoms selected")]
    NoSymptoms,
    #[error(transparent)]
    Symptom(#[from] SymptomError),
    #[error("could not connect to the diagnosis server at {host}")]
    Connection { host: String },
    #[error("diagnosis server returned status {status}: {detail:?}")]
    Server { status: u16, detail: ServerErrorDetail },
    #[error("could not decode the diagnosis response: {raw}")]
    Decode { raw: String },
    #[error("diagnosis request failed: {0}")]
    Transport(String),
}

impl DiagnosisError {
    /// Whether the error was caught before any network traffic.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::NoSymptoms | Self::Symptom(_))
    }

    /// The localized message shown to the user.
    pub fn user_message(&self, locale: Locale) -> String {
        match self {
            Self::NoSymptoms => messages::no_symptoms_selected(locale),
            Self::Symptom(SymptomError::Unknown(tag)) => messages::unknown_symptom(locale, tag),
            Self::Connection { host } => messages::connection_failed(locale, host),
            Self::Server { status, detail } => {
                let detail = match detail {
                    ServerErrorDetail::Text(text) => text.clone(),
                    ServerErrorDetail::Unspecified => messages::generic_server_error(locale),
                    ServerErrorDetail::Empty => messages::status_error(locale, *status),
                };
                messages::diagnosis_failed(locale, &detail)
            }
            Self::Decode { raw } => messages::unreadable_response(locale, raw),
            Self::Transport(detail) => messages::transport_failed(locale, detail),
        }
    }
}

//=========================================================================================
// Response Interpretation
//=========================================================================================

/// Turns a raw HTTP status and body from `/api/diagnose` into results.
///
/// The body is taken as text so that anything unparseable can still be shown
/// to the user verbatim.
pub fn interpret_response(status: u16, body: &str) -> Result<Vec<DiagnosisResult>, DiagnosisError> {
    if !(200..300).contains(&status) {
        return Err(DiagnosisError::Server {
            status,
            detail: error_detail(body),
        });
    }

    let parsed: DiagnoseResponse = serde_json::from_str(body).map_err(|_| DiagnosisError::Decode {
        raw: body.to_string(),
    })?;

    Ok(parsed
        .results
        .into_iter()
        .map(RawDiagnosisResult::into_result)
        .collect())
}

/// Best-effort extraction of the reason from a failed response body.
pub fn error_detail(body: &str) -> ServerErrorDetail {
    match serde_json::from_str::<Value>(body) {
        Ok(json) => match json.get("message").and_then(Value::as_str) {
            Some(message) if !message.is_empty() => ServerErrorDetail::Text(message.to_string()),
            _ => ServerErrorDetail::Unspecified,
        },
        Err(_) if body.is_empty() => ServerErrorDetail::Empty,
        Err(_) => ServerErrorDetail::Text(body.to_string()),
    }
}

//=========================================================================================
// Use Cases
//=========================================================================================

/// Sends the selection to the inference server at `host`.
///
/// An empty selection is rejected without touching the network.
pub async fn diagnose(
    service: &dyn DiagnosisService,
    host: &str,
    selection: &SymptomSelection,
) -> Result<Vec<DiagnosisResult>, DiagnosisError> {
    if selection.is_empty() {
        return Err(DiagnosisError::NoSymptoms);
    }

    let request = DiagnoseRequest::from_selection(selection);
    info!("Requesting diagnosis from {} for [{}]", host, request.symptoms);
    let results = service.diagnose(host, &request).await?;
    info!("Diagnosis returned {} candidate(s)", results.len());
    Ok(results)
}

/// Records a finished diagnosis as a new exam owned by the session's user.
///
/// Nothing is written without a session or without results; `Ok(None)` reports
/// that case. The exam date is assigned by the store.
pub async fn persist_exam(
    store: &dyn DocumentStore,
    session: Option<&SessionContext>,
    selection: &SymptomSelection,
    results: &[DiagnosisResult],
) -> PortResult<Option<String>> {
    let Some(session) = session else {
        return Ok(None);
    };
    if results.is_empty() {
        return Ok(None);
    }

    let record = ExamRecord::draft(session.owner_key(), selection.as_slice().to_vec(), results.to_vec());
    let id = store
        .add_with_server_timestamp(exams::COLLECTION, record.to_document(), exams::DATE_FIELD)
        .await?;
    info!("Stored exam {} for user {}", id, session.user_id);
    Ok(Some(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingStore, StubDiagnosis};
    use serde_json::json;
    use uuid::Uuid;

    fn flu_and_cold() -> &'static str {
        r#"{"results":[{"disease":"Flu","confidence":0.82,"confidence_level":"high"},{"disease":"Cold","confidence":0.41,"confidence_level":"medium"}]}"#
    }

    fn session() -> SessionContext {
        SessionContext {
            user_id: Uuid::new_v4(),
            email: "patient@example.com".to_string(),
            display_name: "Patient".to_string(),
        }
    }

    #[test]
    fn request_joins_symptoms_with_comma_space() {
        let selection = SymptomSelection::from_tags(["headache", "fatigue", "cough"]).unwrap();
        let request = DiagnoseRequest::from_selection(&selection);
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"symptoms": "headache, fatigue, cough", "auto_use_suggestions": true})
        );
    }

    #[test]
    fn response_levels_are_carried_over() {
        let results = interpret_response(200, flu_and_cold()).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].confidence_level, ConfidenceLevel::High);
        assert_eq!(results[1].confidence_level, ConfidenceLevel::Medium);

        let summary = DiagnosisSummary::from_results(&results).unwrap();
        assert_eq!(summary.primary.disease, "Flu");
        assert_eq!(summary.primary.confidence_percent(), "82.0%");
        assert_eq!(summary.secondary.len(), 1);
        assert_eq!(summary.secondary[0].confidence_percent(), "41.0%");
    }

    #[test]
    fn unrecognized_level_falls_back_to_score_buckets() {
        let body = r#"{"results":[{"disease":"Malaria","confidence":0.55,"confidence_level":"very"},{"disease":"Dengue","confidence":0.9}]}"#;
        let results = interpret_response(200, body).unwrap();
        assert_eq!(results[0].confidence_level, ConfidenceLevel::Medium);
        assert_eq!(results[1].confidence_level, ConfidenceLevel::High);
    }

    #[test]
    fn plain_text_server_error_is_shown_verbatim() {
        let err = interpret_response(500, "internal error").unwrap_err();
        assert_eq!(
            err,
            DiagnosisError::Server {
                status: 500,
                detail: ServerErrorDetail::Text("internal error".to_string())
            }
        );
        assert_eq!(
            err.user_message(Locale::En),
            "An error occurred during diagnosis: internal error"
        );
    }

    #[test]
    fn json_server_error_uses_message_field() {
        let err = interpret_response(400, r#"{"status":"error","message":"No valid symptoms found"}"#)
            .unwrap_err();
        assert!(err.user_message(Locale::En).ends_with("No valid symptoms found"));

        let err = interpret_response(503, r#"{"status":"error"}"#).unwrap_err();
        assert!(matches!(
            err,
            DiagnosisError::Server { detail: ServerErrorDetail::Unspecified, .. }
        ));

        let err = interpret_response(502, "").unwrap_err();
        assert_eq!(err.user_message(Locale::En), "An error occurred during diagnosis: Error: 502");
    }

    #[test]
    fn malformed_success_body_surfaces_raw_text() {
        let err = interpret_response(200, "<html>oops</html>").unwrap_err();
        assert_eq!(err, DiagnosisError::Decode { raw: "<html>oops</html>".to_string() });
        assert!(err.user_message(Locale::En).contains("<html>oops</html>"));

        assert!(matches!(
            interpret_response(200, r#"{"status":"success"}"#),
            Err(DiagnosisError::Decode { .. })
        ));
    }

    #[test]
    fn error_messages_are_distinct() {
        let errors = [
            DiagnosisError::NoSymptoms,
            DiagnosisError::Connection { host: "10.0.0.1:5021".to_string() },
            DiagnosisError::Server { status: 500, detail: ServerErrorDetail::Unspecified },
            DiagnosisError::Decode { raw: String::new() },
            DiagnosisError::Transport("reset".to_string()),
        ];
        for locale in [Locale::En, Locale::Ar] {
            let mut rendered: Vec<String> = errors.iter().map(|e| e.user_message(locale)).collect();
            rendered.sort();
            rendered.dedup();
            assert_eq!(rendered.len(), errors.len());
        }
        assert!(errors[1].user_message(Locale::Ar).contains("10.0.0.1:5021"));
    }

    #[tokio::test]
    async fn empty_selection_never_reaches_the_server() {
        let service = StubDiagnosis::replying(200, flu_and_cold());
        let err = diagnose(&service, "localhost:5021", &SymptomSelection::new())
            .await
            .unwrap_err();
        assert_eq!(err, DiagnosisError::NoSymptoms);
        assert!(err.is_validation());
        assert!(service.requests().is_empty());
    }

    #[tokio::test]
    async fn diagnose_sends_the_selection_to_the_given_host() {
        let service = StubDiagnosis::replying(200, flu_and_cold());
        let selection = SymptomSelection::from_tags(["headache", "fatigue"]).unwrap();
        let results = diagnose(&service, "10.1.1.1:5021", &selection).await.unwrap();

        assert_eq!(results.len(), 2);
        let requests = service.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0, "10.1.1.1:5021");
        assert_eq!(requests[0].1.symptoms, "headache, fatigue");
    }

    #[tokio::test]
    async fn persist_exam_appends_one_record() {
        let store = RecordingStore::default();
        let session = session();
        let selection = SymptomSelection::from_tags(["headache", "fatigue"]).unwrap();
        let results = interpret_response(200, flu_and_cold()).unwrap();

        let id = persist_exam(&store, Some(&session), &selection, &results)
            .await
            .unwrap()
            .expect("exam id");

        let stored = store.document(exams::COLLECTION, &id).expect("stored exam");
        assert_eq!(stored["userId"], json!(session.owner_key()));
        assert_eq!(stored["symptoms"], json!(["headache", "fatigue"]));
        assert_eq!(stored["results"][0]["confidenceLevel"], json!("high"));
        assert!(stored["date"].is_string());
    }

    #[tokio::test]
    async fn persist_exam_skips_without_session_or_results() {
        let store = RecordingStore::default();
        let selection = SymptomSelection::from_tags(["cough"]).unwrap();
        let results = interpret_response(200, flu_and_cold()).unwrap();

        assert_eq!(persist_exam(&store, None, &selection, &results).await.unwrap(), None);
        assert_eq!(
            persist_exam(&store, Some(&session()), &selection, &[]).await.unwrap(),
            None
        );
        assert_eq!(store.count(exams::COLLECTION), 0);
    }

    #[tokio::test]
    async fn persist_failure_is_reported_separately() {
        let store = RecordingStore::failing_writes();
        let selection = SymptomSelection::from_tags(["cough"]).unwrap();
        let results = interpret_response(200, flu_and_cold()).unwrap();
        assert!(persist_exam(&store, Some(&session()), &selection, &results)
            .await
            .is_err());
    }
}
