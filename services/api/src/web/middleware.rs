//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use patient_portal_core::SessionContext;
use std::sync::Arc;
use tracing::{debug, error};

use crate::web::state::AppState;

pub const SESSION_COOKIE: &str = "session";

/// Reads the auth session id from the `Cookie` header.
pub fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?
        .split(';')
        .find_map(|c| {
            c.trim()
                .strip_prefix(SESSION_COOKIE)
                .and_then(|rest| rest.strip_prefix('='))
        })
        .filter(|id| !id.is_empty())
}

async fn resolve_session(state: &AppState, headers: &HeaderMap) -> Option<SessionContext> {
    let auth_session_id = session_cookie(headers)?;
    match state.identity.validate_auth_session(auth_session_id).await {
        Ok(user) => Some(SessionContext::from(user)),
        Err(e) => {
            debug!("Rejected auth session: {:?}", e);
            None
        }
    }
}

/// Middleware that validates the auth session cookie.
///
/// If valid, inserts the `SessionContext` into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let session = resolve_session(&state, req.headers()).await.ok_or_else(|| {
        error!("Request to {} without a valid session", req.uri().path());
        StatusCode::UNAUTHORIZED
    })?;

    req.extensions_mut().insert(session);
    Ok(next.run(req).await)
}

/// Like `require_auth`, but anonymous requests pass through with `None`.
pub async fn optional_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let session = resolve_session(&state, req.headers()).await;
    req.extensions_mut().insert(session);
    next.run(req).await
}
