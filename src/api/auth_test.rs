use secrecy::ExposeSecret;

use super::*;
use crate::api::stub_server::{Reply, StubServer};

fn user(email: Option<&str>) -> AuthUser {
    AuthUser {
        id: UserId("user-1".into()),
        email: email.map(str::to_string),
        registered: true,
    }
}

#[test]
fn token_is_read_from_body() {
    let token = token_from_response(&json!({ "token": "jwt" })).unwrap();
    assert_eq!(token.expose_secret(), "jwt");
}

#[test]
fn missing_or_empty_token_is_none() {
    assert!(token_from_response(&json!({})).is_none());
    assert!(token_from_response(&json!({ "token": "" })).is_none());
    assert!(token_from_response(&json!({ "token": null })).is_none());
    assert!(token_from_response(&json!({ "token": 42 })).is_none());
}

#[test]
fn session_uses_email_as_name() {
    let session = Session::new(&user(Some("a@example.com")), SecretString::from("t".to_string()));
    assert_eq!(session.user_id, UserId("user-1".into()));
    assert_eq!(session.name, "a@example.com");
    assert_eq!(session.image, DEFAULT_AVATAR);
}

#[test]
fn session_without_email_is_unknown() {
    let session = Session::new(&user(None), SecretString::from("t".to_string()));
    assert_eq!(session.name, UNKNOWN_NAME);
}

#[test]
fn session_debug_redacts_token() {
    let session = Session::new(&user(None), SecretString::from("hunter2".to_string()));
    assert!(!format!("{:?}", session).contains("hunter2"));
}

#[test]
fn missing_token_error_names_user() {
    let err = AuthError::MissingToken(UserId("user-1".into()));
    assert_eq!(err.to_string(), "no token issued for user user-1");
}

fn unregistered(email: &str) -> AuthUser {
    AuthUser {
        registered: false,
        ..user(Some(email))
    }
}

#[tokio::test]
async fn sign_in_continues_after_failed_registration() {
    let stub = StubServer::start(vec![
        Reply::json(500, json!({ "error": "boom" })),
        Reply::json(200, json!({ "token": "jwt" })),
    ])
    .await;

    let session = AuthClient::new(reqwest::Client::new(), stub.url.clone())
        .sign_in(&unregistered("a@example.com"))
        .await
        .unwrap();

    assert_eq!(session.token.expose_secret(), "jwt");
    assert_eq!(session.name, "a@example.com");
    assert_eq!(stub.paths(), vec!["/api/register-user", "/api/token"]);
}

#[tokio::test]
async fn registered_user_skips_registration() {
    let stub = StubServer::start(vec![Reply::json(200, json!({ "token": "jwt" }))]).await;

    AuthClient::new(reqwest::Client::new(), stub.url.clone())
        .sign_in(&user(None))
        .await
        .unwrap();

    assert_eq!(stub.paths(), vec!["/api/token"]);
}

#[tokio::test]
async fn empty_token_fails_sign_in() {
    let stub = StubServer::start(vec![Reply::json(200, json!({ "token": "" }))]).await;

    let err = AuthClient::new(reqwest::Client::new(), stub.url.clone())
        .sign_in(&user(None))
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::MissingToken(id) if id == UserId("user-1".into())));
}

#[tokio::test]
async fn token_endpoint_error_fails_sign_in() {
    let stub = StubServer::start(vec![Reply::json(503, json!({}))]).await;

    let err = AuthClient::new(reqwest::Client::new(), stub.url.clone())
        .sign_in(&user(None))
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Status { status, .. } if status == StatusCode::SERVICE_UNAVAILABLE));
}
