//! services/api/src/web/auth.rs
//!
//! Account endpoints: registration, login, logout and the current patient profile.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use patient_portal_core::forms::{normalize_email, RegistrationForm};
use patient_portal_core::ports::PortError;
use patient_portal_core::{Patient, SessionContext};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::middleware::{session_cookie, SESSION_COOKIE};
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub patient_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    #[serde(default)]
    pub phone_number: String,
    /// `YYYY-MM-DD`.
    #[serde(default)]
    pub date_of_birth: String,
    #[serde(default)]
    pub gender: String,
}

impl From<SignupRequest> for RegistrationForm {
    fn from(req: SignupRequest) -> Self {
        RegistrationForm {
            patient_name: req.patient_name,
            email: req.email,
            password: req.password,
            confirm_password: req.confirm_password,
            phone_number: req.phone_number,
            date_of_birth: req.date_of_birth,
            gender: req.gender,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PatientResponse {
    pub patient_id: String,
    pub patient_name: String,
    pub email: String,
    pub phone_number: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<Patient> for PatientResponse {
    fn from(p: Patient) -> Self {
        Self {
            patient_id: p.patient_id,
            patient_name: p.patient_name,
            email: p.email,
            phone_number: p.phone_number,
            date_of_birth: p.date_of_birth,
            gender: p.gender,
            created_at: p.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: String,
    pub patient: PatientResponse,
}

//=========================================================================================
// Helpers
//=========================================================================================

fn hash_password(password: &str) -> Result<String, (StatusCode, String)> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to hash password".to_string())
        })
}

/// Opens a new auth session and returns the `Set-Cookie` value for it.
async fn start_session(state: &AppState, user_id: Uuid) -> Result<String, (StatusCode, String)> {
    let auth_session_id = Uuid::new_v4().to_string();
    let ttl = Duration::try_days(state.config.session_ttl_days).ok_or_else(|| {
        error!("Session TTL of {} days is out of range", state.config.session_ttl_days);
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create session".to_string())
    })?;

    state
        .identity
        .create_auth_session(&auth_session_id, user_id, Utc::now() + ttl)
        .await
        .map_err(|e| {
            error!("Failed to create auth session: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create session".to_string())
        })?;

    Ok(format!(
        "{}={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE,
        auth_session_id,
        ttl.num_seconds()
    ))
}

/// Loads the profile written at registration under the user id.
pub async fn load_patient(state: &AppState, user_id: Uuid) -> Result<Patient, (StatusCode, String)> {
    let doc = state
        .store
        .get(Patient::COLLECTION, &user_id.to_string())
        .await
        .map_err(|e| {
            error!("Failed to load patient {}: {:?}", user_id, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to load patient".to_string())
        })?
        .ok_or_else(|| {
            error!("Patient profile {} does not exist", user_id);
            (StatusCode::NOT_FOUND, "Patient data not found".to_string())
        })?;

    serde_json::from_value(doc.data).map_err(|e| {
        error!("Malformed patient profile {}: {}", user_id, e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to load patient".to_string())
    })
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/signup - Create a new patient account
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created successfully", body = AuthResponse),
        (status = 400, description = "Invalid registration form"),
        (status = 409, description = "Email already in use"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // 1. Validate the form before touching any service
    let form = RegistrationForm::from(req);
    let date_of_birth = form
        .validate()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    // 2. Hash the password and create the account
    let email = normalize_email(&form.email);
    let password_hash = hash_password(&form.password)?;
    let user = state
        .identity
        .create_user_with_email(&email, &password_hash, form.patient_name.trim())
        .await
        .map_err(|e| match e {
            PortError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            e => {
                error!("Failed to create user: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create user".to_string())
            }
        })?;

    // 3. Write the patient profile under the new user id
    let patient = Patient {
        patient_id: user.user_id.to_string(),
        patient_name: form.patient_name.trim().to_string(),
        email: user.email.clone(),
        phone_number: form.phone_number.trim().to_string(),
        date_of_birth: Some(date_of_birth),
        gender: form.gender.trim().to_string(),
        created_at: Some(Utc::now()),
    };
    let data = serde_json::to_value(&patient).map_err(|e| {
        error!("Failed to encode patient profile: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create patient".to_string())
    })?;
    state
        .store
        .set(Patient::COLLECTION, &patient.patient_id, data)
        .await
        .map_err(|e| {
            error!("Failed to store patient profile: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create patient".to_string())
        })?;
    info!("Registered patient {}", user.user_id);

    // 4. Sign the new user in
    let cookie = start_session(&state, user.user_id).await?;
    let response = AuthResponse {
        user_id: user.user_id,
        email: user.email,
        display_name: user.display_name,
        patient: patient.into(),
    };

    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(response),
    ))
}

/// POST /auth/login - Login with existing account
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 404, description = "Account has no patient profile"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // 1. Get user by email
    let user_creds = state
        .identity
        .get_user_by_email(&normalize_email(&req.email))
        .await
        .map_err(|e| {
            error!("Failed to get user: {:?}", e);
            (StatusCode::UNAUTHORIZED, "Invalid email or password".to_string())
        })?;

    // 2. Verify password
    let parsed_hash = PasswordHash::new(&user_creds.hashed_password).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Authentication error".to_string())
    })?;

    let valid = Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_ok();

    if !valid {
        return Err((StatusCode::UNAUTHORIZED, "Invalid email or password".to_string()));
    }

    // 3. The account is only usable with its patient profile
    let patient = load_patient(&state, user_creds.user_id).await?;

    // 4. Issue the session cookie
    let cookie = start_session(&state, user_creds.user_id).await?;
    info!("User {} logged in", user_creds.user_id);

    let response = AuthResponse {
        user_id: user_creds.user_id,
        email: user_creds.email,
        display_name: user_creds.display_name,
        patient: patient.into(),
    };

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(response),
    ))
}

/// POST /auth/logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let auth_session_id = session_cookie(&headers)
        .ok_or((StatusCode::UNAUTHORIZED, "No session found".to_string()))?;

    state
        .identity
        .delete_auth_session(auth_session_id)
        .await
        .map_err(|e| {
            error!("Failed to delete auth session: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to logout".to_string())
        })?;

    let cookie = format!(
        "{}=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0",
        SESSION_COOKIE
    );

    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)]))
}

/// GET /patients/me - The signed-in patient's profile
#[utoipa::path(
    get,
    path = "/patients/me",
    responses(
        (status = 200, description = "Current patient profile", body = PatientResponse),
        (status = 401, description = "No active session"),
        (status = 404, description = "Patient profile not found")
    )
)]
pub async fn current_patient_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
) -> Result<Json<PatientResponse>, (StatusCode, String)> {
    let patient = load_patient(&state, session.user_id).await?;
    Ok(Json(patient.into()))
}
