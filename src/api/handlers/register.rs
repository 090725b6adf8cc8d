//! Registration endpoints.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Redirect},
};
use std::sync::Arc;
use tracing::error;

use super::types::{FieldErrorsResponse, PageResponse, RegisterRequest};
use super::{missing_payload, request_context};
use crate::registration::{RegistrationError, RegistrationForm, Registrar};

pub const REGISTRATION_COMPLETE_PATH: &str = "/register/complete";
pub const REGISTRATION_CLOSED_PATH: &str = "/register/closed";

/// Register a new account and redirect to the next page of the workflow.
#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterRequest,
    responses(
        (status = 303, description = "Registered, or registration is closed"),
        (status = 400, description = "Invalid form", body = FieldErrorsResponse),
        (status = 500, description = "Registration failed", body = String)
    ),
    tag = "registration"
)]
pub async fn register(
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    registrar: Extension<Arc<Registrar>>,
    payload: Option<Json<RegisterRequest>>,
) -> impl IntoResponse {
    let form: RegistrationForm = match payload {
        Some(Json(payload)) => payload.into(),
        None => return missing_payload(),
    };

    let request = request_context(&method, &uri, &headers);

    match registrar.register(&form, &request).await {
        Ok(_) => {
            let next = if registrar.config().workflow().requires_activation() {
                REGISTRATION_COMPLETE_PATH
            } else {
                registrar.config().success_url()
            };
            Redirect::to(next).into_response()
        }
        Err(RegistrationError::Closed) => Redirect::to(REGISTRATION_CLOSED_PATH).into_response(),
        Err(RegistrationError::Invalid(errors)) => (
            StatusCode::BAD_REQUEST,
            Json(FieldErrorsResponse::from(errors)),
        )
            .into_response(),
        Err(RegistrationError::Internal(err)) => {
            error!("Failed to register user: {err:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Registration failed".to_string(),
            )
                .into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/register/complete",
    responses(
        (status = 200, description = "Registration accepted", body = PageResponse)
    ),
    tag = "registration"
)]
pub async fn registration_complete(registrar: Extension<Arc<Registrar>>) -> impl IntoResponse {
    Json(PageResponse::new(format!(
        "Check your email: an activation link valid for {} days has been sent.",
        registrar.config().activation_days()
    )))
}

#[utoipa::path(
    get,
    path = "/register/closed",
    responses(
        (status = 200, description = "Registration is closed", body = PageResponse)
    ),
    tag = "registration"
)]
pub async fn registration_closed() -> impl IntoResponse {
    Json(PageResponse::new("Registration is currently closed."))
}
