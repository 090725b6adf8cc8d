//! Route handlers and the helpers they share.

pub mod activate;
pub mod health;
pub mod register;
pub mod types;

use axum::http::{HeaderMap, Method, StatusCode, Uri, header::USER_AGENT};
use axum::response::{IntoResponse, Response};

use crate::registration::RequestContext;

/// Capture the request details handed to signal listeners.
pub(crate) fn request_context(method: &Method, uri: &Uri, headers: &HeaderMap) -> RequestContext {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };

    RequestContext {
        method: method.to_string(),
        path: uri.path().to_string(),
        request_id: header("x-request-id"),
        client_ip: extract_client_ip(headers),
        user_agent: header(USER_AGENT.as_str()),
    }
}

pub(crate) fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

pub(crate) fn missing_payload() -> Response {
    (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response()
}
