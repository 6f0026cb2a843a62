//! Integration tests using WireMock
//!
//! These tests run the clients against a mock Obelisk server and token
//! endpoint, covering the full request/response cycle including token
//! exchange, pagination, retries and error mapping.

mod auth;
mod blocking;
mod core_queries;
mod events;

use integrations_obelisk::prelude::*;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

pub const TOKEN_PATH: &str = "/auth/token";

/// Token endpoint response.
pub fn token_body(token: &str, expires_in: i64) -> Value {
    json!({ "access_token": token, "expires_in": expires_in, "token_type": "Bearer" })
}

/// Query page envelope.
pub fn page_body(items: Vec<Value>, cursor: Option<&str>) -> Value {
    json!({ "items": items, "cursor": cursor })
}

/// `n` datapoints with consecutive timestamps starting at `from`.
pub fn datapoints(from: i64, n: i64) -> Vec<Value> {
    (from..from + n)
        .map(|ts| json!({ "timestamp": ts, "metric": "temp::number", "value": ts }))
        .collect()
}

/// Mounts a token endpoint that always hands out `token`.
pub async fn mount_token(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(token, 3600)))
        .mount(server)
        .await;
}

/// Config builder pointing at the mock server.
pub fn config(server: &MockServer, kind: ObeliskKind) -> ObeliskConfigBuilder {
    let root = match kind {
        ObeliskKind::Core => format!("{}/datasets", server.uri()),
        ObeliskKind::Classic | ObeliskKind::Hfs => server.uri(),
    };
    ObeliskConfig::builder()
        .kind(kind)
        .credentials("client-id", "client-secret")
        .base_url(root)
        .token_url(format!("{}{}", server.uri(), TOKEN_PATH))
}

/// Async client for `kind` against the mock server.
pub fn client(server: &MockServer, kind: ObeliskKind) -> ObeliskClient {
    ObeliskClient::new(config(server, kind).build().unwrap()).unwrap()
}

/// Requests the server received, excluding token exchanges.
pub async fn data_requests(server: &MockServer) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() != TOKEN_PATH)
        .collect()
}

/// Requests the token endpoint received.
pub async fn token_requests(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == TOKEN_PATH)
        .count()
}

/// All values of a repeated query parameter, in order.
pub fn query_values(request: &Request, key: &str) -> Vec<String> {
    request
        .url
        .query_pairs()
        .filter(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
        .collect()
}
