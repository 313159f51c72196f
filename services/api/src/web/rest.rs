//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for symptoms, diagnosis and exam history, and
//! the master definition for the OpenAPI specification.

use crate::web::state::AppState;
use crate::web::{auth, records};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use patient_portal_core::diagnosis::{self, DiagnosisError, DiagnosisSummary};
use patient_portal_core::exams::{self, DateFallback, DecodedExam};
use patient_portal_core::ports::PortError;
use patient_portal_core::{symptoms, DiagnosisResult, SessionContext, SymptomSelection};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::{IntoParams, OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        auth::current_patient_handler,
        list_symptoms_handler,
        diagnose_handler,
        diagnosis_health_handler,
        list_exams_handler,
        delete_exam_handler,
        records::medical_history_handler,
        records::list_records_handler,
        records::create_record_handler,
        records::get_record_handler,
        records::update_record_handler,
        records::delete_record_handler,
        records::record_form_handler,
    ),
    components(
        schemas(
            auth::SignupRequest, auth::LoginRequest, auth::AuthResponse, auth::PatientResponse,
            SymptomListResponse, DiagnosisRequest, DiagnosisResultResponse, DiagnosisResponse,
            HealthResponse, ExamResponse, ExamListResponse, records::RecordKind,
        )
    ),
    tags(
        (name = "Patient Portal API", description = "Symptom diagnosis, exam history and medical history for patients.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SymptomQuery {
    /// Case-insensitive substring of the symptom's readable name.
    pub term: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct SymptomListResponse {
    pub symptoms: Vec<String>,
}

/// The symptoms picked by the user.
#[derive(Deserialize, ToSchema)]
pub struct DiagnosisRequest {
    pub symptoms: Vec<String>,
    /// Overrides the configured inference server; must be on the allowlist.
    #[serde(default)]
    pub host: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisResultResponse {
    pub disease: String,
    pub confidence: f64,
    /// `low`, `medium` or `high`.
    pub confidence_level: String,
    /// e.g. `82.0%`.
    pub confidence_percent: String,
}

impl From<&DiagnosisResult> for DiagnosisResultResponse {
    fn from(result: &DiagnosisResult) -> Self {
        Self {
            disease: result.disease.clone(),
            confidence: result.confidence,
            confidence_level: result.confidence_level.as_str().to_string(),
            confidence_percent: result.confidence_percent(),
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisResponse {
    pub results: Vec<DiagnosisResultResponse>,
    pub primary: Option<DiagnosisResultResponse>,
    pub secondary: Vec<DiagnosisResultResponse>,
    /// Id of the stored exam, when one was written.
    pub exam_id: Option<String>,
    pub persisted: bool,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HealthQuery {
    pub host: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub host: String,
    pub status: u16,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExamResponse {
    pub id: String,
    pub user_id: String,
    pub date: DateTime<Utc>,
    pub symptoms: Vec<String>,
    pub results: Vec<DiagnosisResultResponse>,
    pub notes: Option<String>,
    /// `missing` or `unrecognized` when `date` is the load time.
    pub date_fallback: Option<String>,
}

impl From<&DecodedExam> for ExamResponse {
    fn from(exam: &DecodedExam) -> Self {
        let record = &exam.record;
        Self {
            id: record.id.clone(),
            user_id: record.user_id.clone(),
            date: record.date,
            symptoms: record.symptoms.clone(),
            results: record.results.iter().map(Into::into).collect(),
            notes: record.notes.clone(),
            date_fallback: exam.date_fallback.map(|fallback| {
                match fallback {
                    DateFallback::Missing => "missing",
                    DateFallback::Unrecognized => "unrecognized",
                }
                .to_string()
            }),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ExamListResponse {
    pub exams: Vec<ExamResponse>,
    /// Ids of stored exams that could not be read.
    pub skipped: Vec<String>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DeleteExamQuery {
    /// Must be `true`; the delete cannot be undone.
    #[serde(default)]
    pub confirm: bool,
}

fn diagnosis_status(e: &DiagnosisError) -> StatusCode {
    if e.is_validation() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::BAD_GATEWAY
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// List the known symptoms, optionally filtered by a search term.
#[utoipa::path(
    get,
    path = "/symptoms",
    params(SymptomQuery),
    responses(
        (status = 200, description = "Matching symptom identifiers, sorted", body = SymptomListResponse)
    )
)]
pub async fn list_symptoms_handler(Query(query): Query<SymptomQuery>) -> Json<SymptomListResponse> {
    let matches = match query.term.as_deref().map(str::trim) {
        Some(term) if !term.is_empty() => symptoms::search(term),
        _ => symptoms::known_symptoms().to_vec(),
    };
    Json(SymptomListResponse {
        symptoms: matches.into_iter().map(str::to_string).collect(),
    })
}

/// Run a diagnosis for the selected symptoms.
///
/// With a session the diagnosis is also stored as an exam. A failed write does
/// not fail the request; it is reported through `persisted`.
#[utoipa::path(
    post,
    path = "/diagnosis",
    request_body = DiagnosisRequest,
    responses(
        (status = 200, description = "Ranked disease candidates", body = DiagnosisResponse),
        (status = 400, description = "No symptoms, an unknown symptom or a host that is not allowed"),
        (status = 502, description = "The inference server failed or could not be reached")
    )
)]
pub async fn diagnose_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Option<SessionContext>>,
    headers: HeaderMap,
    Json(req): Json<DiagnosisRequest>,
) -> Result<Json<DiagnosisResponse>, (StatusCode, String)> {
    let locale = state.locale(&headers);
    let host = state.diagnosis_host(req.host.as_deref(), locale)?;

    let selection = SymptomSelection::from_tags(&req.symptoms).map_err(|e| {
        let e = DiagnosisError::from(e);
        (diagnosis_status(&e), e.user_message(locale))
    })?;

    let results = diagnosis::diagnose(state.diagnosis.as_ref(), &host, &selection)
        .await
        .map_err(|e| {
            if !e.is_validation() {
                error!("Diagnosis via {} failed: {}", host, e);
            }
            (diagnosis_status(&e), e.user_message(locale))
        })?;

    let exam_id =
        match diagnosis::persist_exam(state.store.as_ref(), session.as_ref(), &selection, &results)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                error!("Failed to store exam: {:?}", e);
                None
            }
        };

    let summary = DiagnosisSummary::from_results(&results);
    Ok(Json(DiagnosisResponse {
        results: results.iter().map(Into::into).collect(),
        primary: summary.map(|s| s.primary.into()),
        secondary: summary
            .map(|s| s.secondary.iter().map(Into::into).collect())
            .unwrap_or_default(),
        persisted: exam_id.is_some(),
        exam_id,
    }))
}

/// Check that the inference server answers.
#[utoipa::path(
    get,
    path = "/diagnosis/health",
    params(HealthQuery),
    responses(
        (status = 200, description = "The server answered with a success status", body = HealthResponse),
        (status = 400, description = "The host is not allowed"),
        (status = 502, description = "The server is unreachable or unhealthy")
    )
)]
pub async fn diagnosis_health_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HealthQuery>,
    headers: HeaderMap,
) -> Result<Json<HealthResponse>, (StatusCode, String)> {
    let locale = state.locale(&headers);
    let host = state.diagnosis_host(query.host.as_deref(), locale)?;

    let status = state.diagnosis.health_check(&host).await.map_err(|e| {
        warn!("Health check of {} failed: {}", host, e);
        (StatusCode::BAD_GATEWAY, e.user_message(locale))
    })?;

    Ok(Json(HealthResponse { host, status }))
}

/// List the signed-in user's exams, newest first.
#[utoipa::path(
    get,
    path = "/exams",
    responses(
        (status = 200, description = "Exam history", body = ExamListResponse),
        (status = 401, description = "No active session"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_exams_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
) -> Result<Json<ExamListResponse>, (StatusCode, String)> {
    let history = exams::load_history(state.store.as_ref(), &session.owner_key())
        .await
        .map_err(|e| {
            error!("Failed to load exams: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to load exams".to_string())
        })?;

    Ok(Json(ExamListResponse {
        exams: history.exams.iter().map(Into::into).collect(),
        skipped: history.skipped,
    }))
}

/// Delete one of the signed-in user's exams. Requires `?confirm=true`.
#[utoipa::path(
    delete,
    path = "/exams/{id}",
    params(
        ("id" = String, Path, description = "The exam id."),
        DeleteExamQuery
    ),
    responses(
        (status = 204, description = "Exam deleted"),
        (status = 401, description = "No active session"),
        (status = 404, description = "No such exam for this user"),
        (status = 428, description = "Deletion was not confirmed")
    )
)]
pub async fn delete_exam_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
    Query(query): Query<DeleteExamQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if !query.confirm {
        return Err((
            StatusCode::PRECONDITION_REQUIRED,
            "Deleting an exam must be confirmed with confirm=true".to_string(),
        ));
    }

    let store = state.store.as_ref();
    let mut history = exams::load_history(store, &session.owner_key())
        .await
        .map_err(|e| {
            error!("Failed to load exams: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to load exams".to_string())
        })?;

    exams::delete_exam(store, &mut history, &id)
        .await
        .map_err(|e| match e {
            PortError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            e => {
                error!("Failed to delete exam {}: {:?}", id, e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to delete exam".to_string())
            }
        })?;
    info!("User {} deleted exam {}", session.user_id, id);

    Ok(StatusCode::NO_CONTENT)
}
