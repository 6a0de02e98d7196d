mod common;

use common::mock_server::{authorization, SmctfMock};
use serde_json::json;
use smctf::types::{LoginRequest, RegisterRequest};
use smctf::{ApiRequest, CredentialStore, Error, ErrorKind};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn public_requests_carry_no_authorization() {
    let mock = SmctfMock::logged_in("access-1", "refresh-1").await;
    mock.mount_json("GET", "/api/config", 200, json!({ "title": "smctf", "description": "" }))
        .await;

    mock.client().config().await.unwrap();

    let calls = mock.requests_to("/api/config").await;
    assert_eq!(calls.len(), 1);
    assert_eq!(authorization(&calls[0]), None);
    assert_eq!(
        calls[0]
            .headers
            .get("accept")
            .and_then(|v| v.to_str().ok()),
        Some("application/json")
    );
}

#[tokio::test]
async fn authenticated_requests_carry_the_bearer_token() {
    let mock = SmctfMock::logged_in("access-1", "refresh-1").await;
    mock.mount_json(
        "GET",
        "/api/me",
        200,
        json!({ "id": 7, "email": "bob@example.com", "username": "bob", "role": "admin" }),
    )
    .await;

    let user = mock.client().me().await.unwrap();
    assert_eq!(user.role, "admin");
    assert_eq!(user.team_id, None);
    assert_eq!(mock.store.user().map(|u| u.id), Some(7));

    let calls = mock.requests_to("/api/me").await;
    assert_eq!(authorization(&calls[0]).as_deref(), Some("Bearer access-1"));
}

#[tokio::test]
async fn no_content_resolves_to_none() {
    let mock = SmctfMock::logged_in("access-1", "refresh-1").await;
    Mock::given(method("DELETE"))
        .and(path("/api/admin/challenges/3"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock.server)
        .await;

    let request = ApiRequest::delete("/api/admin/challenges/3").authenticated();
    let result: Option<serde_json::Value> = mock.client().send(&request).await.unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn non_json_success_resolves_to_none() {
    let mock = SmctfMock::start().await;
    Mock::given(method("GET"))
        .and(path("/healthz"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&mock.server)
        .await;

    let client = mock.client();
    let request = ApiRequest::get("/healthz");
    let result: Option<serde_json::Value> = client.send(&request).await.unwrap();
    assert!(result.is_none());

    let err = client
        .send_expect::<serde_json::Value>(&request)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnexpectedBody { ref path } if path == "/healthz"));
}

#[tokio::test]
async fn malformed_json_is_a_decode_error() {
    let mock = SmctfMock::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("[{", "application/json"))
        .mount(&mock.server)
        .await;

    let err = mock.client().users().await.unwrap_err();
    assert!(matches!(err, Error::Decode(_)));
    assert_eq!(err.kind(), ErrorKind::NetworkOrProtocolError);
}

#[tokio::test]
async fn unreachable_server_is_a_network_error() {
    let mock = SmctfMock::start().await;
    let client = mock.client().with_base_url("http://127.0.0.1:9");

    let err = client.challenges().await.unwrap_err();
    assert!(matches!(err, Error::Http(_)));
    assert_eq!(err.kind(), ErrorKind::NetworkOrProtocolError);
    assert_eq!(err.status(), None);
}

#[tokio::test]
async fn validation_failures_expose_field_errors() {
    let mock = SmctfMock::start().await;
    mock.mount_fixture("auth/register_invalid.json").await;

    let err = mock
        .client()
        .register(&RegisterRequest {
            email: "not-an-email".into(),
            username: "al".into(),
            password: "x".into(),
            registration_key: "k-123".into(),
        })
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    let api = err.api_error().unwrap();
    assert_eq!(api.message, "invalid input");
    assert_eq!(
        api.field_errors(),
        vec![
            ("email".to_string(), "must be a valid email".to_string()),
            ("username".to_string(), "too short".to_string()),
        ]
    );
}

#[tokio::test]
async fn rate_limited_submission_reads_headers() {
    let mock = SmctfMock::logged_in("access-1", "refresh-1").await;
    mock.mount_fixture("challenges/submit_rate_limited.json").await;

    let err = mock.client().submit_flag(4, "flag{guess}").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RateLimited);

    let api = err.api_error().unwrap();
    let limit = api.rate_limit.unwrap();
    assert_eq!(limit.limit, 5);
    assert_eq!(limit.remaining, 0);
    assert_eq!(limit.reset_seconds, 42);
    assert_eq!(
        api.user_message(),
        "Too many requests. Please try again in 42 seconds."
    );
}

#[tokio::test]
async fn correct_flag_submission() {
    let mock = SmctfMock::logged_in("access-1", "refresh-1").await;
    Mock::given(method("POST"))
        .and(path("/api/challenges/4/submit"))
        .and(body_json(json!({ "flag": "flag{right}" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "correct": true, "ctf_state": "active" })),
        )
        .mount(&mock.server)
        .await;

    let result = mock.client().submit_flag(4, "flag{right}").await.unwrap();
    assert!(result.correct);
}

#[tokio::test]
async fn login_stores_tokens_and_user() {
    let mock = SmctfMock::start().await;
    mock.mount_fixture("auth/login.json").await;

    let auth = mock
        .client()
        .login(&LoginRequest {
            email: "alice@example.com".into(),
            password: "hunter22".into(),
        })
        .await
        .unwrap();

    assert_eq!(auth.user.username, "alice");
    let tokens = mock.store.read().unwrap();
    assert_eq!(tokens.access_token, "access-abc");
    assert_eq!(tokens.refresh_token, "refresh-abc");
    assert_eq!(mock.store.user().and_then(|u| u.team_name).as_deref(), Some("blue"));
}

#[tokio::test]
async fn failed_login_leaves_store_empty() {
    let mock = SmctfMock::start().await;
    mock.mount_json("POST", "/api/auth/login", 401, json!({ "error": "invalid credentials" }))
        .await;

    let err = mock
        .client()
        .login(&LoginRequest {
            email: "alice@example.com".into(),
            password: "wrong".into(),
        })
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(401));
    assert!(mock.store.read().is_none());
    assert!(mock.requests_to("/api/auth/refresh").await.is_empty());
}

#[tokio::test]
async fn logout_revokes_refresh_token_and_clears() {
    let mock = SmctfMock::logged_in("access-1", "refresh-1").await;
    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .and(body_json(json!({ "refresh_token": "refresh-1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
        .expect(1)
        .mount(&mock.server)
        .await;

    mock.client().logout().await.unwrap();
    assert!(mock.store.read().is_none());
}

#[tokio::test]
async fn logout_clears_even_when_server_fails() {
    let mock = SmctfMock::logged_in("access-1", "refresh-1").await;
    mock.mount_json("POST", "/api/auth/logout", 500, json!({ "error": "boom" }))
        .await;

    let err = mock.client().logout().await.unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert!(mock.store.read().is_none());
}

#[tokio::test]
async fn server_errors_keep_the_session() {
    let mock = SmctfMock::logged_in("access-1", "refresh-1").await;
    mock.mount_json("GET", "/api/me", 500, json!({ "error": "database down" }))
        .await;

    let err = mock.client().me().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RequestFailed);
    assert_eq!(err.api_error().unwrap().message, "database down");
    assert!(mock.store.read().is_some());
}

#[tokio::test]
async fn error_without_json_body_uses_default_message() {
    let mock = SmctfMock::start().await;
    Mock::given(method("GET"))
        .and(path("/api/challenges"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&mock.server)
        .await;

    let err = mock.client().challenges().await.unwrap_err();
    let api = err.api_error().unwrap();
    assert_eq!(api.status, 502);
    assert_eq!(api.message, "request failed");
    assert!(api.details.is_none());
}
