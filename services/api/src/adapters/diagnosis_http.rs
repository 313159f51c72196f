//! services/api/src/adapters/diagnosis_http.rs
//!
//! This module contains the adapter for the external symptom-to-disease
//! inference server. It implements the `DiagnosisService` port from the `core`
//! crate over plain HTTP using `reqwest`.

use async_trait::async_trait;
use patient_portal_core::diagnosis::{
    error_detail, interpret_response, DiagnoseRequest, DiagnosisError, DiagnosisResult,
};
use patient_portal_core::ports::DiagnosisService;
use std::time::Duration;
use tracing::{debug, error};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `DiagnosisService` against `http://{host}/api/diagnose`.
#[derive(Clone)]
pub struct HttpDiagnosisAdapter {
    client: reqwest::Client,
}

impl HttpDiagnosisAdapter {
    /// Creates a new `HttpDiagnosisAdapter`. Requests never time out unless `timeout` is set.
    pub fn new(timeout: Option<Duration>) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

/// `http://{host}{path}`, accepting hosts given with or without a scheme.
fn endpoint(host: &str, path: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        format!("{}{}", host, path)
    } else {
        format!("http://{}{}", host, path)
    }
}

fn transport_error(host: &str, e: reqwest::Error) -> DiagnosisError {
    if e.is_connect() {
        DiagnosisError::Connection {
            host: host.to_string(),
        }
    } else if e.is_timeout() {
        DiagnosisError::Transport(format!("request to {} timed out", host))
    } else {
        DiagnosisError::Transport(e.to_string())
    }
}

//=========================================================================================
// `DiagnosisService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DiagnosisService for HttpDiagnosisAdapter {
    async fn diagnose(
        &self,
        host: &str,
        request: &DiagnoseRequest,
    ) -> Result<Vec<DiagnosisResult>, DiagnosisError> {
        let url = endpoint(host, "/api/diagnose");
        debug!("POST {} with {:?}", url, request);

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!("Diagnosis request to {} failed: {}", url, e);
                transport_error(host, e)
            })?;

        let status = response.status().as_u16();
        // Read the body as text first so unparseable replies can still be reported.
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(host, e))?;
        debug!("Diagnosis server answered {}: {}", status, body);

        interpret_response(status, &body)
    }

    async fn health_check(&self, host: &str) -> Result<u16, DiagnosisError> {
        let url = endpoint(host, "/");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| transport_error(host, e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(status.as_u16());
        }
        let body = response.text().await.unwrap_or_default();
        Err(DiagnosisError::Server {
            status: status.as_u16(),
            detail: error_detail(&body),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::{get, post}, Json, Router};
    use patient_portal_core::diagnosis::{ConfidenceLevel, ServerErrorDetail};
    use patient_portal_core::SymptomSelection;
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    /// Serves `router` on an ephemeral port and returns its `host:port`.
    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr.to_string()
    }

    fn request(tags: &[&str]) -> DiagnoseRequest {
        DiagnoseRequest::from_selection(&SymptomSelection::from_tags(tags.iter().copied()).unwrap())
    }

    #[test]
    fn endpoint_adds_scheme_only_when_missing() {
        assert_eq!(endpoint("10.0.0.2:5021", "/api/diagnose"), "http://10.0.0.2:5021/api/diagnose");
        assert_eq!(endpoint("http://box:5021/", "/"), "http://box:5021/");
    }

    #[tokio::test]
    async fn posts_joined_symptoms_and_maps_results() {
        let seen: Arc<Mutex<Option<Value>>> = Arc::default();
        let captured = seen.clone();
        let host = serve(Router::new().route(
            "/api/diagnose",
            post(move |Json(body): Json<Value>| {
                let captured = captured.clone();
                async move {
                    *captured.lock().unwrap() = Some(body);
                    Json(json!({
                        "status": "success",
                        "results": [
                            {"disease": "Flu", "confidence": 0.82, "confidence_level": "high"},
                            {"disease": "Cold", "confidence": 0.41, "confidence_level": "medium"}
                        ]
                    }))
                }
            }),
        ))
        .await;

        let adapter = HttpDiagnosisAdapter::new(None).unwrap();
        let results = adapter
            .diagnose(&host, &request(&["headache", "fatigue"]))
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].disease, "Flu");
        assert_eq!(results[1].confidence_level, ConfidenceLevel::Medium);
        assert_eq!(
            seen.lock().unwrap().clone().unwrap(),
            json!({"symptoms": "headache, fatigue", "auto_use_suggestions": true})
        );
    }

    #[tokio::test]
    async fn plain_text_500_is_passed_through() {
        let host = serve(Router::new().route(
            "/api/diagnose",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "internal error") }),
        ))
        .await;

        let adapter = HttpDiagnosisAdapter::new(None).unwrap();
        let err = adapter.diagnose(&host, &request(&["cough"])).await.unwrap_err();
        assert_eq!(
            err,
            DiagnosisError::Server {
                status: 500,
                detail: ServerErrorDetail::Text("internal error".to_string())
            }
        );
    }

    #[tokio::test]
    async fn refused_connection_names_the_host() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let host = listener.local_addr().unwrap().to_string();
        drop(listener);

        let adapter = HttpDiagnosisAdapter::new(None).unwrap();
        let err = adapter.diagnose(&host, &request(&["cough"])).await.unwrap_err();
        assert_eq!(err, DiagnosisError::Connection { host });
    }

    #[tokio::test]
    async fn health_check_reports_status() {
        let host = serve(Router::new().route(
            "/",
            get(|| async { Json(json!({"status": "success", "model_loaded": true})) }),
        ))
        .await;

        let adapter = HttpDiagnosisAdapter::new(None).unwrap();
        assert_eq!(adapter.health_check(&host).await.unwrap(), 200);
    }
}
