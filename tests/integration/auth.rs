//! Integration tests for token handling

use super::*;
use futures::future::join_all;
use std::time::Duration;
use wiremock::matchers::{body_json, body_string, header};

#[tokio::test]
async fn test_expired_token_is_refreshed_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("stale", 3600)))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_token(&server, "fresh").await;

    Mock::given(method("GET"))
        .and(header("Authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/datasets/ds/data/query"))
        .and(header("Authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(datapoints(0, 3), None)))
        .mount(&server)
        .await;

    let client = client(&server, ObeliskKind::Core);
    let params = QueryParams::new("ds").data_type(DataType::Number);
    let items = client.core().unwrap().query(&params).await.unwrap();

    assert_eq!(items.len(), 3);
    assert_eq!(token_requests(&server).await, 2);
    assert_eq!(data_requests(&server).await.len(), 2);
}

#[tokio::test]
async fn test_persistent_unauthorized_surfaces() {
    let server = MockServer::start().await;
    mount_token(&server, "tok").await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = ObeliskClient::new(
        config(&server, ObeliskKind::Core)
            .retry_policy(RetryPolicy::immediate(3))
            .build()
            .unwrap(),
    )
    .unwrap();
    let params = QueryParams::new("ds").data_type(DataType::Number);
    let error = client.core().unwrap().query(&params).await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Client);
    assert_eq!(error.status_code(), Some(reqwest::StatusCode::UNAUTHORIZED));
    // One refresh, no retries
    assert_eq!(data_requests(&server).await.len(), 2);
}

#[tokio::test]
async fn test_concurrent_callers_share_one_exchange() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_body("tok", 3600))
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/datasets/ds/data/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(datapoints(0, 1), None)))
        .mount(&server)
        .await;

    let client = client(&server, ObeliskKind::Core);
    let core = client.core().unwrap();
    let params = QueryParams::new("ds").data_type(DataType::Number);

    let results = join_all((0..8).map(|_| core.query(&params))).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(token_requests(&server).await, 1);
    assert_eq!(data_requests(&server).await.len(), 8);
}

#[tokio::test]
async fn test_rejected_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"error": "invalid_client"})),
        )
        .mount(&server)
        .await;

    let client = client(&server, ObeliskKind::Core);
    let params = QueryParams::new("ds").data_type(DataType::Number);
    let error = client.core().unwrap().query(&params).await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Authentication);
    assert!(data_requests(&server).await.is_empty());
}

#[tokio::test]
async fn test_core_exchange_is_form_encoded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(header("Content-Type", "application/x-www-form-urlencoded"))
        .and(body_string("grant_type=client_credentials"))
        .and(header(
            "Authorization",
            "Basic Y2xpZW50LWlkOmNsaWVudC1zZWNyZXQ=",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("tok", 3600)))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, ObeliskKind::Core);
    let token = client.token_manager().get_access_token().await.unwrap();
    assert_eq!(token.authorization_header(), "Bearer tok");
}

#[tokio::test]
async fn test_classic_exchange_is_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_json(json!({ "grant_type": "client_credentials" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("tok", 3600)))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, ObeliskKind::Classic);
    client.token_manager().get_access_token().await.unwrap();
}
