//! HTTP surface.
//!
//! Public endpoints:
//! - `POST /api/submissions`                       (intake, 201)
//! - `GET  /offer/{token}`                         (offer with context)
//! - `POST /offer/{token}/accept`
//! - `POST /offer/{token}/decline`
//!
//! Admin endpoints (bearer key when `admin.api_key` is set):
//! - `GET   /api/admin/submissions?status=&days=`
//! - `GET   /api/admin/submissions/{id}`
//! - `PATCH /api/admin/submissions/{id}/status`
//! - `POST  /api/admin/submissions/{id}/valuation`
//! - `PATCH /api/admin/valuations/{id}`
//! - `POST  /api/admin/valuations/{id}/finalize`
//! - `POST  /api/admin/offers`
//! - `GET   /api/admin/offers/{id}`
//! - `POST  /api/admin/offers/{id}/send`
//! - `PATCH /api/admin/offers/{id}/status`
//! - `DELETE /api/admin/offers/{id}?reason=`
//! - `GET   /api/admin/metrics?days=`
//! - `GET   /api/admin/alerts`

use std::sync::Arc;

use axum::{http::HeaderMap, http::StatusCode, Json, Router};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use subtle::ConstantTimeEq;
use tracing::{error, warn};

use crate::services::{ServiceError, Services};

pub mod admin;
pub mod public;

const ACTOR_HEADER: &str = "x-actor";
const DEFAULT_ADMIN_ACTOR: &str = "admin";

#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    admin_api_key: Option<Arc<SecretString>>,
}

impl AppState {
    pub fn new(services: Services, admin_api_key: Option<SecretString>) -> Self {
        Self { services, admin_api_key: admin_api_key.map(Arc::new) }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorBody>);

pub fn router(state: AppState) -> Router {
    Router::new().merge(public::router(state.clone())).merge(admin::router(state))
}

pub fn status_for(error: &ServiceError) -> StatusCode {
    match error {
        ServiceError::NotFound { .. } => StatusCode::NOT_FOUND,
        ServiceError::InvalidTransition { .. }
        | ServiceError::InvalidInput(_)
        | ServiceError::AlreadyDecided { .. }
        | ServiceError::Expired { .. } => StatusCode::BAD_REQUEST,
        ServiceError::DuplicateOffer { .. }
        | ServiceError::DuplicateValuation { .. }
        | ServiceError::Conflict(_) => StatusCode::CONFLICT,
        ServiceError::MissingContext(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ServiceError::UpstreamFailure(_) => StatusCode::BAD_GATEWAY,
        ServiceError::PartialSend { .. }
        | ServiceError::Persistence(_)
        | ServiceError::Template(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Converts a service failure into a response. Internal failures keep their
/// detail in the log and answer with a generic message.
pub fn api_error(error: ServiceError) -> ApiError {
    let status = status_for(&error);
    let message = if error.is_internal() {
        error!(
            event_name = "http.request.failed",
            status = status.as_u16(),
            error = %error,
            "request failed"
        );
        "an internal error occurred".to_string()
    } else {
        if status.is_server_error() {
            warn!(
                event_name = "http.request.upstream_failed",
                status = status.as_u16(),
                error = %error,
                "upstream call failed"
            );
        }
        error.to_string()
    };
    (status, Json(ErrorBody { error: message }))
}

/// Checks the admin bearer key when one is configured and returns the acting
/// staff identity from `x-actor`.
pub(crate) fn admin_guard(headers: &HeaderMap, state: &AppState) -> Result<String, ApiError> {
    if let Some(expected) = &state.admin_api_key {
        let provided = headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "));
        match provided {
            Some(token) if bool::from(token.as_bytes().ct_eq(expected.expose_secret().as_bytes())) => {}
            Some(_) => {
                return Err((
                    StatusCode::UNAUTHORIZED,
                    Json(ErrorBody { error: "invalid admin api key".to_string() }),
                ));
            }
            None => {
                return Err((
                    StatusCode::UNAUTHORIZED,
                    Json(ErrorBody { error: "missing admin api key".to_string() }),
                ));
            }
        }
    }

    Ok(headers
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_ADMIN_ACTOR)
        .to_string())
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use secrecy::SecretString;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::{router, AppState};
    use crate::services::test_support::{harness, Harness};

    pub fn app(admin_api_key: Option<&str>) -> (Router, Harness) {
        let harness = harness();
        let state = AppState::new(
            harness.services.clone(),
            admin_api_key.map(|key| SecretString::from(key.to_string())),
        );
        (router(state), harness)
    }

    pub async fn call(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        };

        let response = app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, value)
    }
}
