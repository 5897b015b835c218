//! Provisioning tests against a local HTTP server
//!
//! Each test serves `POST /api/terminals` on a random port.

use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;

use jt_core::traits::TerminalProvisioner;
use jt_core::{Credential, Endpoint, ProvisionError};
use jterm::provision::HttpProvisioner;

/// Serve `router` on a random port and return its base URL
async fn start_test_server(router: Router) -> Endpoint {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    Endpoint::parse(&format!("http://{}", addr)).unwrap()
}

/// Router answering every create with a fixed status and body
fn fixed(status: StatusCode, body: &'static str) -> Router {
    Router::new().route("/api/terminals", post(move || async move { (status, body) }))
}

#[tokio::test]
async fn test_created_terminal_name() {
    let endpoint = start_test_server(fixed(
        StatusCode::OK,
        r#"{"name": "4", "last_activity": "2024-01-01T00:00:00Z"}"#,
    ))
    .await;

    let name = HttpProvisioner::new()
        .provision(&endpoint, &Credential::none())
        .await
        .unwrap();
    assert_eq!(name.as_str(), "4");
}

#[tokio::test]
async fn test_201_is_accepted() {
    let endpoint = start_test_server(fixed(StatusCode::CREATED, r#"{"name": "term-a"}"#)).await;

    let name = HttpProvisioner::new()
        .provision(&endpoint, &Credential::none())
        .await
        .unwrap();
    assert_eq!(name.as_str(), "term-a");
}

#[tokio::test]
async fn test_server_error_reports_status_and_body() {
    let endpoint = start_test_server(fixed(
        StatusCode::INTERNAL_SERVER_ERROR,
        "terminals disabled",
    ))
    .await;

    let err = HttpProvisioner::new()
        .provision(&endpoint, &Credential::none())
        .await
        .unwrap_err();

    match err {
        ProvisionError::Status { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "terminals disabled");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_missing_name_is_error() {
    let endpoint = start_test_server(fixed(StatusCode::OK, r#"{"id": 1}"#)).await;

    let err = HttpProvisioner::new()
        .provision(&endpoint, &Credential::none())
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisionError::MissingIdentifier));
}

#[tokio::test]
async fn test_non_json_body_is_error() {
    let endpoint = start_test_server(fixed(StatusCode::OK, "<html></html>")).await;

    let err = HttpProvisioner::new()
        .provision(&endpoint, &Credential::none())
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisionError::InvalidBody(_)));
}

#[tokio::test]
async fn test_token_sent_as_authorization_header() {
    let router = Router::new().route(
        "/api/terminals",
        post(|headers: HeaderMap| async move {
            match headers.get("authorization").and_then(|v| v.to_str().ok()) {
                Some("token s3cret") => (StatusCode::OK, r#"{"name": "9"}"#),
                _ => (StatusCode::FORBIDDEN, "Forbidden"),
            }
        }),
    );
    let endpoint = start_test_server(router).await;
    let provisioner = HttpProvisioner::new();

    let name = provisioner
        .provision(&endpoint, &Credential::new("s3cret"))
        .await
        .unwrap();
    assert_eq!(name.as_str(), "9");

    let err = provisioner
        .provision(&endpoint, &Credential::none())
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisionError::Status { status: 403, .. }));
}

#[tokio::test]
async fn test_unreachable_server_is_request_error() {
    // Bind then drop to get a port nothing listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let endpoint = Endpoint::parse(&format!("http://{}", addr)).unwrap();
    let err = HttpProvisioner::new()
        .provision(&endpoint, &Credential::none())
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisionError::Request(_)));
}
