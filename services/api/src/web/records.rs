//! services/api/src/web/records.rs
//!
//! Handlers for the four medical-history collections. Every route takes the
//! entry kind as its first path segment and dispatches to one generic
//! implementation per operation.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    Extension,
};
use patient_portal_core::forms::{AllergyForm, DiseaseForm, MedicationForm, RecordForm, TravelForm};
use patient_portal_core::{Locale, MedicalHistoryRepository, MedicalRecord, SessionContext};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;

use crate::web::state::AppState;

type HandlerError = (StatusCode, String);

/// The medical-history collection addressed by a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Diseases,
    Allergies,
    Medications,
    Travel,
}

/// Runs `$op::<Form>(args..)` for the form type matching `$kind`.
macro_rules! for_kind {
    ($kind:expr, $op:ident($($arg:expr),*)) => {
        match $kind {
            RecordKind::Diseases => $op::<DiseaseForm>($($arg),*).await,
            RecordKind::Allergies => $op::<AllergyForm>($($arg),*).await,
            RecordKind::Medications => $op::<MedicationForm>($($arg),*).await,
            RecordKind::Travel => $op::<TravelForm>($($arg),*).await,
        }
    };
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalHistoryResponse {
    pub diseases: Vec<Value>,
    pub allergies: Vec<Value>,
    pub medications: Vec<Value>,
    pub travel_history: Vec<Value>,
}

//=========================================================================================
// Generic Operations
//=========================================================================================

fn internal(what: &str, e: impl std::fmt::Debug) -> HandlerError {
    error!("Failed to {}: {:?}", what, e);
    (StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to {}", what))
}

/// The stored shape of `record` plus its id.
fn record_json<T: MedicalRecord>(record: &T) -> Result<Value, HandlerError> {
    let mut value = serde_json::to_value(record).map_err(|e| internal("encode record", e))?;
    if let (Some(id), Some(map)) = (record.id(), value.as_object_mut()) {
        map.insert("id".to_string(), Value::String(id.to_string()));
    }
    Ok(value)
}

fn records_json<T: MedicalRecord>(records: &[T]) -> Result<Vec<Value>, HandlerError> {
    records.iter().map(record_json).collect()
}

fn parse_form<F: DeserializeOwned>(body: Value) -> Result<F, HandlerError> {
    serde_json::from_value(body).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))
}

/// Loads `id` and checks that it belongs to the session's patient.
async fn owned_record<T: MedicalRecord>(
    repo: &MedicalHistoryRepository,
    session: &SessionContext,
    id: &str,
) -> Result<T, HandlerError> {
    match repo.get_by_id::<T>(id).await {
        Ok(Some(record)) if record.patient_id() == session.owner_key() => Ok(record),
        Ok(_) => Err((StatusCode::NOT_FOUND, format!("{} {} not found", T::KIND, id))),
        Err(e) => Err(internal("load record", e)),
    }
}

async fn list<F: RecordForm>(
    repo: MedicalHistoryRepository,
    session: SessionContext,
) -> Result<Json<Vec<Value>>, HandlerError> {
    let records = repo
        .list_for_patient::<F::Record>(&session.owner_key())
        .await
        .map_err(|e| internal("list records", e))?;
    Ok(Json(records_json(&records)?))
}

async fn create<F: RecordForm + DeserializeOwned>(
    repo: MedicalHistoryRepository,
    session: SessionContext,
    body: Value,
) -> Result<(StatusCode, Json<Value>), HandlerError> {
    let mut record = parse_form::<F>(body)?
        .into_record(&session.owner_key(), None)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    repo.save(&mut record)
        .await
        .map_err(|e| internal("save record", e))?;
    Ok((StatusCode::CREATED, Json(record_json(&record)?)))
}

async fn get<F: RecordForm>(
    repo: MedicalHistoryRepository,
    session: SessionContext,
    id: String,
) -> Result<Json<Value>, HandlerError> {
    let record = owned_record::<F::Record>(&repo, &session, &id).await?;
    Ok(Json(record_json(&record)?))
}

async fn update<F: RecordForm + DeserializeOwned>(
    repo: MedicalHistoryRepository,
    session: SessionContext,
    id: String,
    body: Value,
) -> Result<Json<Value>, HandlerError> {
    let form = parse_form::<F>(body)?;
    let mut record = form
        .into_record(&session.owner_key(), Some(id.clone()))
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    owned_record::<F::Record>(&repo, &session, &id).await?;

    repo.save(&mut record)
        .await
        .map_err(|e| internal("update record", e))?;
    Ok(Json(record_json(&record)?))
}

async fn delete<F: RecordForm>(
    repo: MedicalHistoryRepository,
    session: SessionContext,
    id: String,
) -> Result<StatusCode, HandlerError> {
    let record = owned_record::<F::Record>(&repo, &session, &id).await?;
    repo.delete(&record)
        .await
        .map_err(|e| internal("delete record", e))?;
    info!("User {} deleted {} {}", session.user_id, <F::Record as MedicalRecord>::KIND, id);
    Ok(StatusCode::NO_CONTENT)
}

async fn form<F: RecordForm + Serialize>(
    repo: MedicalHistoryRepository,
    session: SessionContext,
    id: String,
    locale: Locale,
) -> Result<Json<Value>, HandlerError> {
    let record = owned_record::<F::Record>(&repo, &session, &id).await?;
    let form = F::from_record(&record, locale);
    serde_json::to_value(form)
        .map(Json)
        .map_err(|e| internal("encode form", e))
}

//=========================================================================================
// Handlers
//=========================================================================================

/// All medical-history entries of the signed-in patient.
#[utoipa::path(
    get,
    path = "/medical-history",
    responses(
        (status = 200, description = "Diseases, allergies, medications and travel history"),
        (status = 401, description = "No active session")
    )
)]
pub async fn medical_history_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
) -> Result<Json<MedicalHistoryResponse>, HandlerError> {
    let history = state
        .medical_history()
        .full_history(&session.owner_key())
        .await
        .map_err(|e| internal("load medical history", e))?;

    Ok(Json(MedicalHistoryResponse {
        diseases: records_json(&history.diseases)?,
        allergies: records_json(&history.allergies)?,
        medications: records_json(&history.medications)?,
        travel_history: records_json(&history.travel_history)?,
    }))
}

/// Entries of one kind.
#[utoipa::path(
    get,
    path = "/medical-history/{kind}",
    params(("kind" = RecordKind, Path, description = "diseases, allergies, medications or travel")),
    responses(
        (status = 200, description = "Entries of the requested kind"),
        (status = 401, description = "No active session")
    )
)]
pub async fn list_records_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Path(kind): Path<RecordKind>,
) -> Result<Json<Vec<Value>>, HandlerError> {
    for_kind!(kind, list(state.medical_history(), session))
}

/// Create an entry from its form. Lists are comma-separated text, dates `YYYY-MM-DD`.
#[utoipa::path(
    post,
    path = "/medical-history/{kind}",
    params(("kind" = RecordKind, Path, description = "diseases, allergies, medications or travel")),
    responses(
        (status = 201, description = "Entry created"),
        (status = 400, description = "Invalid form"),
        (status = 401, description = "No active session")
    )
)]
pub async fn create_record_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Path(kind): Path<RecordKind>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), HandlerError> {
    for_kind!(kind, create(state.medical_history(), session, body))
}

#[utoipa::path(
    get,
    path = "/medical-history/{kind}/{id}",
    params(
        ("kind" = RecordKind, Path, description = "diseases, allergies, medications or travel"),
        ("id" = String, Path, description = "The entry id.")
    ),
    responses(
        (status = 200, description = "The entry"),
        (status = 404, description = "No such entry for this patient")
    )
)]
pub async fn get_record_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Path((kind, id)): Path<(RecordKind, String)>,
) -> Result<Json<Value>, HandlerError> {
    for_kind!(kind, get(state.medical_history(), session, id))
}

/// Replace an entry with the submitted form.
#[utoipa::path(
    put,
    path = "/medical-history/{kind}/{id}",
    params(
        ("kind" = RecordKind, Path, description = "diseases, allergies, medications or travel"),
        ("id" = String, Path, description = "The entry id.")
    ),
    responses(
        (status = 200, description = "Entry updated"),
        (status = 400, description = "Invalid form"),
        (status = 404, description = "No such entry for this patient")
    )
)]
pub async fn update_record_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Path((kind, id)): Path<(RecordKind, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, HandlerError> {
    for_kind!(kind, update(state.medical_history(), session, id, body))
}

#[utoipa::path(
    delete,
    path = "/medical-history/{kind}/{id}",
    params(
        ("kind" = RecordKind, Path, description = "diseases, allergies, medications or travel"),
        ("id" = String, Path, description = "The entry id.")
    ),
    responses(
        (status = 204, description = "Entry deleted"),
        (status = 404, description = "No such entry for this patient")
    )
)]
pub async fn delete_record_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Path((kind, id)): Path<(RecordKind, String)>,
) -> Result<StatusCode, HandlerError> {
    for_kind!(kind, delete(state.medical_history(), session, id))
}

/// The entry as an editable form, lists joined for the request's locale.
#[utoipa::path(
    get,
    path = "/medical-history/{kind}/{id}/form",
    params(
        ("kind" = RecordKind, Path, description = "diseases, allergies, medications or travel"),
        ("id" = String, Path, description = "The entry id.")
    ),
    responses(
        (status = 200, description = "Prefilled form"),
        (status = 404, description = "No such entry for this patient")
    )
)]
pub async fn record_form_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Path((kind, id)): Path<(RecordKind, String)>,
    headers: HeaderMap,
) -> Result<Json<Value>, HandlerError> {
    let locale = state.locale(&headers);
    for_kind!(kind, form(state.medical_history(), session, id, locale))
}
