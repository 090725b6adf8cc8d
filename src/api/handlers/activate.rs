//! Activation link endpoints.

use axum::{
    Json,
    extract::{Extension, Path},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Redirect},
};
use std::sync::Arc;
use tracing::{debug, error};

use super::types::{ActivationFailedResponse, PageResponse, ResendActivationRequest};
use super::{missing_payload, request_context};
use crate::registration::{ActivationError, Registrar};

pub const ACTIVATION_COMPLETE_PATH: &str = "/activate/complete";

/// Follow an emailed activation link.
///
/// Any key that does not activate an account renders the failure page with HTTP 200.
#[utoipa::path(
    get,
    path = "/activate/{activation_key}",
    params(
        ("activation_key" = String, Path, description = "Key from the activation email")
    ),
    responses(
        (status = 303, description = "Account activated"),
        (status = 200, description = "Activation failed", body = ActivationFailedResponse),
        (status = 500, description = "Activation failed unexpectedly", body = String)
    ),
    tag = "activation"
)]
pub async fn activate(
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    registrar: Extension<Arc<Registrar>>,
    Path(activation_key): Path<String>,
) -> impl IntoResponse {
    let request = request_context(&method, &uri, &headers);

    match registrar.activate(&activation_key, &request).await {
        Ok(_) => Redirect::to(ACTIVATION_COMPLETE_PATH).into_response(),
        Err(ActivationError::Internal(err)) => {
            error!("Failed to activate user: {err:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Activation failed".to_string(),
            )
                .into_response()
        }
        Err(err) => {
            debug!("Activation rejected: {err}");
            Json(ActivationFailedResponse {
                activated: false,
                reason: err.reason().to_string(),
            })
            .into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/activate/complete",
    responses(
        (status = 200, description = "Account activated", body = PageResponse)
    ),
    tag = "activation"
)]
pub async fn activation_complete() -> impl IntoResponse {
    Json(PageResponse::new("Your account is now active."))
}

/// Send the activation email again (always returns 204 to avoid user enumeration).
#[utoipa::path(
    post,
    path = "/activate/resend",
    request_body = ResendActivationRequest,
    responses(
        (status = 204, description = "Resend accepted")
    ),
    tag = "activation"
)]
pub async fn resend_activation(
    registrar: Extension<Arc<Registrar>>,
    payload: Option<Json<ResendActivationRequest>>,
) -> impl IntoResponse {
    let request: ResendActivationRequest = match payload {
        Some(Json(payload)) => payload,
        None => return missing_payload(),
    };

    match registrar.resend_activation(&request.email).await {
        Ok(outcome) => debug!("Resend activation: {outcome:?}"),
        Err(err) => {
            // Avoid leaking failures; always return 204 to callers.
            error!("Failed to resend activation email: {err:#}");
        }
    }

    StatusCode::NO_CONTENT.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registration::{MemoryStore, RegistrationConfig, Workflow};
    use anyhow::Result;
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::Request,
        routing::{get, post},
    };
    use tower::ServiceExt;

    fn app(workflow: Workflow) -> Result<Router> {
        let config =
            RegistrationConfig::new("http://localhost".to_string()).with_workflow(workflow);
        let registrar = Registrar::new(config, Arc::new(MemoryStore::new()))?;
        Ok(Router::new()
            .route("/activate/complete", get(activation_complete))
            .route("/activate/resend", post(resend_activation))
            .route("/activate/{activation_key}", get(activate))
            .layer(Extension(Arc::new(registrar))))
    }

    async fn get_json(app: Router, uri: &str) -> Result<(StatusCode, serde_json::Value)> {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty())?)
            .await?;
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        Ok((status, serde_json::from_slice(&body)?))
    }

    #[tokio::test]
    async fn unknown_key_renders_failure_page() -> Result<()> {
        let (status, body) = get_json(app(Workflow::Model)?, "/activate/not-a-key").await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["activated"], false);
        assert_eq!(body["reason"], "invalid_key");
        Ok(())
    }

    #[tokio::test]
    async fn simple_workflow_has_no_activation() -> Result<()> {
        let (status, body) = get_json(app(Workflow::Simple)?, "/activate/anything").await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["reason"], "unsupported");
        Ok(())
    }

    #[tokio::test]
    async fn complete_page_is_not_treated_as_a_key() -> Result<()> {
        let (status, body) = get_json(app(Workflow::Model)?, "/activate/complete").await?;
        assert_eq!(status, StatusCode::OK);
        assert!(body["message"].is_string());
        Ok(())
    }

    #[tokio::test]
    async fn resend_is_always_no_content() -> Result<()> {
        for body in [r#"{"email":"nobody@example.com"}"#, r#"{"email":"not-an-email"}"#] {
            let response = app(Workflow::Model)?
                .oneshot(
                    Request::builder()
                        .method("POST")
                        .uri("/activate/resend")
                        .header("Content-Type", "application/json")
                        .body(Body::from(body))?,
                )
                .await?;
            assert_eq!(response.status(), StatusCode::NO_CONTENT);
        }
        Ok(())
    }
}
