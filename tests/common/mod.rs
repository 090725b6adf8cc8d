//! Shared harness: the full router over an in-memory store and a manual clock.

#![allow(dead_code)]

use anyhow::{Context, Result};
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header::LOCATION},
};
use chrono::{TimeZone, Utc};
use registrar::{
    api,
    registration::{
        EmailMessage, EmailSender, ManualClock, MemoryStore, RegistrationConfig, Registrar,
    },
};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

pub const BASE_URL: &str = "https://accounts.example.com";

#[derive(Default)]
pub struct RecordingSender {
    messages: Mutex<Vec<EmailMessage>>,
}

impl RecordingSender {
    pub fn messages(&self) -> Vec<EmailMessage> {
        self.messages
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }

    /// Activation key from the most recent email.
    pub fn last_key(&self) -> Result<String> {
        let message = self.messages().pop().context("no email sent")?;
        let prefix = format!("{BASE_URL}/activate/");
        message
            .body
            .lines()
            .find_map(|line| line.strip_prefix(prefix.as_str()))
            .map(str::to_string)
            .context("activation link missing from email")
    }
}

impl EmailSender for RecordingSender {
    fn send(&self, message: &EmailMessage) -> Result<()> {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message.clone());
        }
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub registrar: Arc<Registrar>,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub sender: Arc<RecordingSender>,
}

impl TestApp {
    pub fn new(config: RegistrationConfig) -> Result<Self> {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0)
                .single()
                .context("valid timestamp")?,
        ));
        let sender = Arc::new(RecordingSender::default());
        let registrar = Arc::new(
            Registrar::new(config, store.clone())?
                .with_clock(clock.clone())
                .with_email_sender(sender.clone()),
        );
        Ok(Self {
            router: api::app(registrar.clone()),
            registrar,
            store,
            clock,
            sender,
        })
    }

    pub async fn register(&self, username: &str) -> Result<Response> {
        let body = serde_json::json!({
            "username": username,
            "email": format!("{username}@example.com"),
            "password1": "correct horse",
            "password2": "correct horse",
        });
        self.post_json("/register", &body).await
    }

    pub async fn post_json(&self, uri: &str, body: &serde_json::Value) -> Result<Response> {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .header("x-forwarded-for", "203.0.113.7")
            .header("user-agent", "integration-test")
            .body(Body::from(serde_json::to_vec(body)?))?;
        self.send(request).await
    }

    pub async fn get(&self, uri: &str) -> Result<Response> {
        let request = Request::builder()
            .uri(uri)
            .header("user-agent", "integration-test")
            .body(Body::empty())?;
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> Result<Response> {
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let request_id = response
            .headers()
            .get("x-request-id")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        Ok(Response {
            status,
            location,
            request_id,
            json,
        })
    }
}

#[derive(Debug)]
pub struct Response {
    pub status: StatusCode,
    pub location: Option<String>,
    pub request_id: Option<String>,
    pub json: serde_json::Value,
}

impl Response {
    pub fn is_redirect_to(&self, path: &str) -> bool {
        self.status == StatusCode::SEE_OTHER && self.location.as_deref() == Some(path)
    }
}
