pub mod auth;
pub mod middleware;
pub mod records;
pub mod rest;
pub mod state;


use axum::{
    http::{
        header::{ACCEPT, ACCEPT_LANGUAGE, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::config::ConfigError;
use crate::error::ApiError;
use crate::web::auth::{current_patient_handler, login_handler, logout_handler, signup_handler};
use crate::web::middleware::{optional_auth, require_auth};
use crate::web::records::{
    create_record_handler, delete_record_handler, get_record_handler, list_records_handler,
    medical_history_handler, record_form_handler, update_record_handler,
};
use crate::web::rest::{
    delete_exam_handler, diagnose_handler, diagnosis_health_handler, list_exams_handler,
    list_symptoms_handler,
};
use crate::web::state::AppState;

pub use rest::ApiDoc;

/// Builds the API router with its auth layers and CORS policy.
pub fn router(state: Arc<AppState>) -> Result<Router, ApiError> {
    let origin = state.config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ConfigError::InvalidValue("CORS_ORIGIN".to_string(), e.to_string())
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT, ACCEPT_LANGUAGE]);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/signup", post(signup_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/symptoms", get(list_symptoms_handler))
        .route("/diagnosis/health", get(diagnosis_health_handler));

    // Anonymous diagnosis is allowed; exams are only stored with a session
    let diagnosis_routes = Router::new()
        .route("/diagnosis", post(diagnose_handler))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            optional_auth,
        ));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/patients/me", get(current_patient_handler))
        .route("/exams", get(list_exams_handler))
        .route("/exams/{id}", delete(delete_exam_handler))
        .route("/medical-history", get(medical_history_handler))
        .route(
            "/medical-history/{kind}",
            get(list_records_handler).post(create_record_handler),
        )
        .route(
            "/medical-history/{kind}/{id}",
            get(get_record_handler)
                .put(update_record_handler)
                .delete(delete_record_handler),
        )
        .route("/medical-history/{kind}/{id}/form", get(record_form_handler))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    Ok(Router::new()
        .merge(public_routes)
        .merge(diagnosis_routes)
        .merge(protected_routes)
        .layer(cors)
        .with_state(state))
}
