//! HttpBackend against a wiremock server

use crate::common::*;
use assert_matches::assert_matches;
use caresync::client::auth::SessionEvent;
use caresync::client::sync::{RefreshOutcome, SchedulerState, SessionTokenScheduler};
use caresync::client::HttpBackend;
use caresync::shared::error::{ErrorKind, SyncError};
use caresync::shared::TokenPair;
use chrono::Duration as ChronoDuration;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_login_stores_credential_and_attaches_bearer() {
    let mock = MockBackend::start().await;
    let access = access_token(chrono::Utc::now() + ChronoDuration::minutes(15));

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({"email": "clinic@example.com", "password": "hunter2"})))
        .respond_with(json_response(200, token_pair_body(&access, "refresh-1")))
        .expect(1)
        .mount(&mock.server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/clinic/reviews"))
        .and(header("authorization", format!("Bearer {}", access).as_str()))
        .respond_with(json_response(200, ok_envelope(json!([]))))
        .expect(1)
        .mount(&mock.server)
        .await;

    let credential = crate::assert_ok!(mock.backend.login("clinic@example.com", "hunter2").await);
    assert_eq!(credential.refresh_token, "refresh-1");
    assert_eq!(mock.auth.bearer(), Some(access));

    let reviews: Vec<Value> = crate::assert_ok!(mock.backend.fetch("/api/clinic/reviews").await);
    assert!(reviews.is_empty());
}

#[tokio::test]
async fn test_failed_login_leaves_session_empty() {
    let mock = MockBackend::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(json_response(401, failed_envelope("Invalid email or password", Value::Null)))
        .mount(&mock.server)
        .await;

    let result = mock.backend.login("clinic@example.com", "wrong").await;

    assert_matches!(result, Err(SyncError::Unauthorized { status: 401, .. }));
    assert!(!mock.auth.is_authenticated());
}

#[tokio::test]
async fn test_validation_error_surfaces_field_detail() {
    let mock = MockBackend::start().await;
    sign_in(&mock.auth, ChronoDuration::minutes(30));

    Mock::given(method("PUT"))
        .and(path("/api/clinic/info"))
        .respond_with(json_response(
            422,
            failed_envelope(
                "One or more validation errors occurred.",
                json!({"Phone": ["Phone number is not valid"]}),
            ),
        ))
        .mount(&mock.server)
        .await;

    let error = mock
        .backend
        .put("/api/clinic/info", &json!({"phone": "abc"}))
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Validation);
    assert_eq!(error.user_message(), "Phone: Phone number is not valid");
}

#[tokio::test]
async fn test_server_error_is_transient() {
    let mock = MockBackend::start().await;
    sign_in(&mock.auth, ChronoDuration::minutes(30));

    Mock::given(method("GET"))
        .and(path("/api/clinic/schedule"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock.server)
        .await;

    let error = mock.backend.fetch::<Value>("/api/clinic/schedule").await.unwrap_err();

    assert_matches!(error, SyncError::Server { status: 503, .. });
    assert!(error.is_transient());
}

#[tokio::test]
async fn test_success_status_with_failed_envelope_is_rejected() {
    let mock = MockBackend::start().await;
    sign_in(&mock.auth, ChronoDuration::minutes(30));

    Mock::given(method("POST"))
        .and(path("/api/doctor/documents"))
        .respond_with(json_response(200, failed_envelope("Document type not accepted", json!(["kind"]))))
        .mount(&mock.server)
        .await;

    let error = mock
        .backend
        .post("/api/doctor/documents", &json!({"kind": "selfie", "url": "https://files.example/a.png"}))
        .await
        .unwrap_err();

    assert_matches!(error, SyncError::Rejected { .. });
    assert_eq!(error.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_write_ack_carries_server_message() {
    let mock = MockBackend::start().await;
    sign_in(&mock.auth, ChronoDuration::minutes(30));

    Mock::given(method("PUT"))
        .and(path("/api/clinic/schedule"))
        .respond_with(json_response(200, ok_message("Schedule updated")))
        .mount(&mock.server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/doctor/documents/license"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock.server)
        .await;

    let ack = crate::assert_ok!(mock.backend.put("/api/clinic/schedule", &json!({"slots": []})).await);
    assert_eq!(ack.message.as_deref(), Some("Schedule updated"));

    let ack = crate::assert_ok!(mock.backend.delete("/api/doctor/documents/license").await);
    assert_eq!(ack.message, None);
}

#[tokio::test]
async fn test_query_parameters_are_encoded() {
    let mock = MockBackend::start().await;
    sign_in(&mock.auth, ChronoDuration::minutes(30));

    Mock::given(method("GET"))
        .and(path("/api/pharmacies/search"))
        .and(query_param("q", "st. mary & co"))
        .respond_with(json_response(200, ok_envelope(json!([]))))
        .expect(1)
        .mount(&mock.server)
        .await;

    let hits: Vec<Value> = crate::assert_ok!(
        mock.backend
            .fetch_with_query("/api/pharmacies/search", &[("q", "st. mary & co")])
            .await
    );
    assert!(hits.is_empty());
}

#[tokio::test]
async fn test_unreachable_backend_is_transport_error() {
    let mock = MockBackend::start().await;
    sign_in(&mock.auth, ChronoDuration::minutes(30));
    let config = caresync::client::Config::with_builder(
        caresync::shared::AppConfig::builder().server_url("http://127.0.0.1:9"),
    )
    .unwrap();
    let backend = HttpBackend::new(config, mock.auth.clone()).unwrap();

    let error = backend.fetch::<Value>("/api/clinic/info").await.unwrap_err();

    assert_matches!(error, SyncError::Transport { .. });
    assert_eq!(error.kind(), ErrorKind::TransientWrite);
}

#[tokio::test]
async fn test_renewal_over_http_replaces_credential() {
    let mock = MockBackend::start().await;
    let old = sign_in(&mock.auth, ChronoDuration::minutes(2));
    let renewed_access = access_token_for(&mock.auth, ChronoDuration::minutes(15));

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh-token"))
        .and(body_json(json!({
            "accessToken": old.access_token,
            "refreshToken": "refresh-token-1"
        })))
        .respond_with(json_response(200, token_pair_body(&renewed_access, "refresh-token-2")))
        .expect(1)
        .mount(&mock.server)
        .await;

    let scheduler = SessionTokenScheduler::new(
        mock.auth.clone(),
        Arc::new(mock.backend.clone()),
        Duration::from_secs(300),
    );

    let outcome = scheduler.refresh_now().await;

    assert_matches!(outcome, RefreshOutcome::Renewed { .. });
    let credential = mock.auth.credential().unwrap();
    assert_eq!(credential.access_token, renewed_access);
    assert_eq!(credential.refresh_token, "refresh-token-2");
    assert_matches!(scheduler.state(), SchedulerState::Scheduled { .. });
    scheduler.stop();
}

#[tokio::test]
async fn test_semantic_renewal_failure_logs_out_once() {
    let mock = MockBackend::start().await;
    sign_in(&mock.auth, ChronoDuration::minutes(2));
    let mut events = mock.auth.events();

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh-token"))
        .respond_with(json_response(200, failed_envelope("Refresh token expired", Value::Null)))
        .expect(1)
        .mount(&mock.server)
        .await;

    let scheduler = SessionTokenScheduler::new(
        mock.auth.clone(),
        Arc::new(mock.backend.clone()),
        Duration::from_secs(300),
    );
    scheduler.start();

    let mut state = scheduler.subscribe();
    let settled = tokio::time::timeout(
        Duration::from_secs(5),
        state.wait_for(|s| *s == SchedulerState::LoggedOut),
    )
    .await
    .is_ok();
    assert!(settled, "scheduler never logged out");

    assert_eq!(events.recv().await.unwrap(), SessionEvent::LoggedOut);
    assert!(!mock.auth.is_authenticated());
    assert_eq!(scheduler.refresh_now().await, RefreshOutcome::Skipped(
        caresync::client::sync::SkipReason::Terminated
    ));

    // Requests after logout never leave the client
    let error = mock.backend.fetch::<Value>("/api/clinic/info").await.unwrap_err();
    assert_eq!(error, SyncError::NotAuthenticated);
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_renewer_receives_current_pair() {
    let mock = MockBackend::start().await;
    let credential = sign_in(&mock.auth, ChronoDuration::minutes(1));
    let renewed = access_token_for(&mock.auth, ChronoDuration::minutes(15));

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh-token"))
        .respond_with(json_response(200, token_pair_body(&renewed, "refresh-token-2")))
        .mount(&mock.server)
        .await;

    let pair = crate::assert_ok!(mock.backend.renew_tokens(&credential.token_pair()).await);
    assert_eq!(
        pair,
        TokenPair {
            access_token: renewed,
            refresh_token: "refresh-token-2".to_string(),
        }
    );
}
