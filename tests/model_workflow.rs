mod common;

use anyhow::{Context, Result};
use axum::http::StatusCode;
use chrono::Duration;
use common::TestApp;
use registrar::registration::{
    FormPolicy, RegistrationConfig, RegistrationStore, RequestContext, UserActivated, Workflow,
};
use std::sync::{Arc, Mutex};

fn config() -> RegistrationConfig {
    RegistrationConfig::new(common::BASE_URL.to_string())
}

fn record_activations(app: &TestApp) -> Arc<Mutex<Vec<(String, RequestContext)>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    app.registrar
        .signals()
        .user_activated
        .connect(move |event: &UserActivated| {
            if let Ok(mut seen) = sink.lock() {
                seen.push((event.user.username.clone(), event.request.clone()));
            }
        });
    seen
}

#[tokio::test]
async fn registration_creates_inactive_user_with_unique_key() -> Result<()> {
    let app = TestApp::new(config())?;

    let response = app.register("alice").await?;
    assert!(response.is_redirect_to("/register/complete"), "{response:?}");
    assert!(response.request_id.is_some());
    app.register("bob").await?;

    let alice = app
        .store
        .find_user_by_username("alice")
        .await?
        .context("alice missing")?;
    assert!(!alice.is_active);

    let messages = app.sender.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].to_email, "alice@example.com");
    assert!(messages[0].body.contains("within 7 days"));
    assert_ne!(messages[0].body, messages[1].body);

    let profile = app
        .store
        .find_profile_by_user(alice.id)
        .await?
        .context("profile missing")?;
    assert_eq!(profile.activation_key.len(), 64);
    Ok(())
}

#[tokio::test]
async fn activation_fires_signal_once_and_key_cannot_be_reused() -> Result<()> {
    let app = TestApp::new(config())?;
    let seen = record_activations(&app);

    app.register("alice").await?;
    let key = app.sender.last_key()?;
    let path = format!("/activate/{key}");

    let response = app.get(&path).await?;
    assert!(response.is_redirect_to("/activate/complete"), "{response:?}");

    let alice = app.store.find_user_by_username("alice").await?;
    assert_eq!(alice.map(|user| user.is_active), Some(true));

    let again = app.get(&path).await?;
    assert_eq!(again.status, StatusCode::OK);
    assert_eq!(again.json["activated"], false);

    let seen = seen.lock().map(|seen| seen.clone()).unwrap_or_default();
    assert_eq!(seen.len(), 1);
    let (username, request) = &seen[0];
    assert_eq!(username, "alice");
    assert_eq!(request.method, "GET");
    assert_eq!(request.path, path);
    assert_eq!(request.user_agent.as_deref(), Some("integration-test"));
    assert!(request.request_id.is_some());
    Ok(())
}

#[tokio::test]
async fn expired_key_renders_failure_page() -> Result<()> {
    let app = TestApp::new(config().with_activation_days(2))?;
    let seen = record_activations(&app);

    app.register("alice").await?;
    let key = app.sender.last_key()?;

    app.clock.advance(Duration::days(2));
    let response = app.get(&format!("/activate/{key}")).await?;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json["activated"], false);
    assert_eq!(response.json["reason"], "expired");

    let alice = app.store.find_user_by_username("alice").await?;
    assert_eq!(alice.map(|user| user.is_active), Some(false));
    assert!(seen.lock().map(|seen| seen.is_empty()).unwrap_or(false));
    Ok(())
}

#[tokio::test]
async fn activation_just_inside_window_succeeds() -> Result<()> {
    let app = TestApp::new(config())?;
    app.register("alice").await?;
    let key = app.sender.last_key()?;

    app.clock.advance(Duration::days(7) - Duration::seconds(1));
    let response = app.get(&format!("/activate/{key}")).await?;
    assert!(response.is_redirect_to("/activate/complete"));
    Ok(())
}

#[tokio::test]
async fn default_alias_behaves_like_model() -> Result<()> {
    let workflow: Workflow = "default".parse().map_err(anyhow::Error::msg)?;
    let app = TestApp::new(config().with_workflow(workflow))?;

    let response = app.register("carol").await?;
    assert!(response.is_redirect_to("/register/complete"));
    assert_eq!(app.store.profile_count().await, 1);

    let key = app.sender.last_key()?;
    let response = app.get(&format!("/activate/{key}")).await?;
    assert!(response.is_redirect_to("/activate/complete"));
    Ok(())
}

#[tokio::test]
async fn closed_registration_redirects_without_creating_users() -> Result<()> {
    let app = TestApp::new(config().with_registration_open(false))?;

    let response = app.register("dave").await?;
    assert!(response.is_redirect_to("/register/closed"));
    assert_eq!(app.store.user_count().await, 0);
    assert!(app.sender.messages().is_empty());

    let page = app.get("/register/closed").await?;
    assert_eq!(page.status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn form_policies_reject_bad_input() -> Result<()> {
    let policy = FormPolicy {
        require_tos: true,
        unique_email: true,
        reject_free_email: true,
    };
    let app = TestApp::new(config().with_form_policy(policy))?;

    let response = app
        .post_json(
            "/register",
            &serde_json::json!({
                "username": "bad name!",
                "email": "someone@gmail.com",
                "password1": "one",
                "password2": "two",
            }),
        )
        .await?;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    for field in ["username", "email", "password2", "tos"] {
        assert!(response.json["errors"][field].is_array(), "{field}");
    }

    let ok = app
        .post_json(
            "/register",
            &serde_json::json!({
                "username": "erin",
                "email": "erin@example.com",
                "password1": "pw",
                "password2": "pw",
                "tos": true,
            }),
        )
        .await?;
    assert!(ok.is_redirect_to("/register/complete"));

    let duplicate = app
        .post_json(
            "/register",
            &serde_json::json!({
                "username": "erin2",
                "email": "ERIN@example.com",
                "password1": "pw",
                "password2": "pw",
                "tos": true,
            }),
        )
        .await?;
    assert_eq!(duplicate.status, StatusCode::BAD_REQUEST);
    assert!(duplicate.json["errors"]["email"].is_array());
    assert_eq!(app.store.user_count().await, 1);
    Ok(())
}

#[tokio::test]
async fn resend_and_cleanup() -> Result<()> {
    let app = TestApp::new(config())?;
    app.register("frank").await?;
    app.register("gina").await?;
    let gina_key = app.sender.last_key()?;
    app.get(&format!("/activate/{gina_key}")).await?;

    let response = app
        .post_json(
            "/activate/resend",
            &serde_json::json!({ "email": "frank@example.com" }),
        )
        .await?;
    assert_eq!(response.status, StatusCode::NO_CONTENT);
    assert_eq!(app.sender.messages().len(), 3);

    app.clock.advance(Duration::days(8));
    assert_eq!(app.registrar.delete_expired_users().await?, 1);
    assert!(app.store.find_user_by_username("frank").await?.is_none());
    assert!(app.store.find_user_by_username("gina").await?.is_some());
    Ok(())
}
