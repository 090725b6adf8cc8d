//! Request/response types for registration endpoints.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

use crate::registration::{FormErrors, RegistrationForm};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password1: String,
    pub password2: String,
    /// Terms of service acceptance; only checked when the server requires it.
    #[serde(default)]
    pub tos: bool,
}

impl From<RegisterRequest> for RegistrationForm {
    fn from(request: RegisterRequest) -> Self {
        Self {
            username: request.username,
            email: request.email,
            password1: request.password1,
            password2: request.password2,
            tos: request.tos,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct FieldErrorsResponse {
    /// Messages keyed by form field.
    pub errors: BTreeMap<String, Vec<String>>,
}

impl From<FormErrors> for FieldErrorsResponse {
    fn from(errors: FormErrors) -> Self {
        Self {
            errors: errors.into_map(),
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct PageResponse {
    pub message: String,
}

impl PageResponse {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ActivationFailedResponse {
    pub activated: bool,
    pub reason: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ResendActivationRequest {
    pub email: String,
}
