//! Integration tests for CORE queries and ingest

use super::*;
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{body_json, header, query_param};

const QUERY_PATH: &str = "/datasets/ds/data/query";

/// Serves `total` datapoints; the cursor is the offset of the next item.
fn sequence(total: i64) -> impl Fn(&Request) -> ResponseTemplate + Send + Sync {
    move |request: &Request| {
        let offset: i64 = query_values(request, "cursor")
            .first()
            .and_then(|c| c.parse().ok())
            .unwrap_or(0);
        let limit: i64 = query_values(request, "limit")
            .first()
            .and_then(|l| l.parse().ok())
            .unwrap_or(250);

        let n = limit.min(total - offset).max(0);
        let next = offset + n;
        let cursor = (next < total).then(|| next.to_string());
        ResponseTemplate::new(200).set_body_json(page_body(datapoints(offset, n), cursor.as_deref()))
    }
}

async fn mount_sequence(server: &MockServer, total: i64) {
    Mock::given(method("GET"))
        .and(path(QUERY_PATH))
        .respond_with(sequence(total))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_query_returns_exactly_the_limit() {
    let server = MockServer::start().await;
    mount_token(&server, "tok").await;
    mount_sequence(&server, 1000).await;

    let client = client(&server, ObeliskKind::Core);
    let params = QueryParams::new("ds").data_type(DataType::Number).limit(600);
    let items = client.core().unwrap().query(&params).await.unwrap();

    assert_eq!(items.len(), 600);
    assert_eq!(items[0].timestamp(), Some(0));
    assert_eq!(items[599].timestamp(), Some(599));

    let limits: Vec<String> = data_requests(&server)
        .await
        .iter()
        .map(|r| query_values(r, "limit")[0].clone())
        .collect();
    assert_eq!(limits, vec!["250", "250", "100"]);
}

#[tokio::test]
async fn test_query_stops_when_data_runs_out() {
    let server = MockServer::start().await;
    mount_token(&server, "tok").await;
    mount_sequence(&server, 120).await;

    let client = client(&server, ObeliskKind::Core);
    let params = QueryParams::new("ds").data_type(DataType::Number).limit(500);
    let items = client.core().unwrap().query(&params).await.unwrap();

    assert_eq!(items.len(), 120);
    assert_eq!(data_requests(&server).await.len(), 1);
}

#[tokio::test]
async fn test_unbounded_query_follows_every_cursor() {
    let server = MockServer::start().await;
    mount_token(&server, "tok").await;
    mount_sequence(&server, 700).await;

    let client = client(&server, ObeliskKind::Core);
    let params = QueryParams::new("ds").data_type(DataType::Number);
    let items = client.core().unwrap().query(&params).await.unwrap();

    assert_eq!(items.len(), 700);
    assert_eq!(data_requests(&server).await.len(), 3);
}

#[tokio::test]
async fn test_multi_valued_parameters_are_repeated() {
    let server = MockServer::start().await;
    mount_token(&server, "tok").await;
    Mock::given(method("GET"))
        .and(path(QUERY_PATH))
        .and(header("Authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(vec![], None)))
        .mount(&server)
        .await;

    let client = client(&server, ObeliskKind::Core);
    let params = QueryParams::new("ds")
        .group_by(["source", "metric"])
        .aggregator(Aggregator::Mean)
        .fields(["source", "metric", "value"])
        .data_type(DataType::Number)
        .filter(Filter::from(Comparison::equal("source", "s1")));
    client.core().unwrap().query(&params).await.unwrap();

    let requests = data_requests(&server).await;
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(query_values(request, "groupBy"), vec!["source", "metric"]);
    assert_eq!(
        query_values(request, "fields"),
        vec!["source", "metric", "value"]
    );
    assert_eq!(query_values(request, "aggregator"), vec!["mean"]);
    assert_eq!(query_values(request, "filter"), vec!["'source'=='s1'"]);
    assert!(!request.url.query().unwrap_or_default().contains("source%2Cmetric"));
}

#[tokio::test]
async fn test_short_page_with_cursor_is_a_protocol_error() {
    let server = MockServer::start().await;
    mount_token(&server, "tok").await;
    Mock::given(method("GET"))
        .and(path(QUERY_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(page_body(datapoints(0, 10), Some("more"))),
        )
        .mount(&server)
        .await;

    let client = client(&server, ObeliskKind::Core);
    let params = QueryParams::new("ds").data_type(DataType::Number).limit(100);
    let error = client.core().unwrap().query(&params).await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Protocol);
}

#[tokio::test]
async fn test_fetch_single_chunk_exposes_cursor() {
    let server = MockServer::start().await;
    mount_token(&server, "tok").await;
    Mock::given(method("GET"))
        .and(path(QUERY_PATH))
        .and(query_param("cursor", "abc"))
        .and(query_param("limit", "5"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(page_body(datapoints(0, 5), Some("def"))),
        )
        .mount(&server)
        .await;

    let client = client(&server, ObeliskKind::Core);
    let params = QueryParams::new("ds")
        .data_type(DataType::Number)
        .cursor("abc")
        .limit(5);
    let result = client.core().unwrap().fetch_single_chunk(&params).await.unwrap();

    assert_eq!(result.items.len(), 5);
    assert_eq!(result.cursor.as_deref(), Some("def"));
}

#[tokio::test]
async fn test_unknown_dataset_is_a_client_error() {
    let server = MockServer::start().await;
    mount_token(&server, "tok").await;
    Mock::given(method("GET"))
        .and(path("/datasets/missing/data/query"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "Not found"})))
        .mount(&server)
        .await;

    let client = client(&server, ObeliskKind::Core);
    let params = QueryParams::new("missing").data_type(DataType::Number);
    let error = client.core().unwrap().query(&params).await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Client);
    assert!(!error.is_retryable());
}

#[tokio::test]
async fn test_ingest_posts_json_array() {
    let server = MockServer::start().await;
    mount_token(&server, "tok").await;
    Mock::given(method("POST"))
        .and(path("/datasets/ds/data/ingest"))
        .and(body_json(json!([
            { "metric": "temp::number", "value": 21.5 },
            { "metric": "on::bool", "value": true, "labels": { "room": "kitchen" } },
        ])))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, ObeliskKind::Core);
    let data = vec![
        IncomingDatapoint::new("temp::number", 21.5).unwrap(),
        IncomingDatapoint::new("on::bool", true)
            .unwrap()
            .with_label("room", "kitchen"),
    ];
    assert_ok!(client.core().unwrap().send("ds", &data).await);
}

#[tokio::test]
async fn test_ingest_rejects_mistyped_value_locally() {
    let server = MockServer::start().await;

    let client = client(&server, ObeliskKind::Core);
    let mut point = IncomingDatapoint::new("temp::number", 1).unwrap();
    point.value = json!("warm");

    let error = assert_err!(client.core().unwrap().send("ds", &[point]).await);
    assert_eq!(error.kind(), ErrorKind::Validation);
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_catalog_lookups() {
    let server = MockServer::start().await;
    mount_token(&server, "tok").await;
    Mock::given(method("GET"))
        .and(path("/datasets/ds/metrics"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{ "id": "temp::number" }])),
        )
        .mount(&server)
        .await;

    let client = client(&server, ObeliskKind::Core);
    let metrics = client.catalog().unwrap().metrics("ds").await.unwrap();
    assert_eq!(metrics[0]["id"], "temp::number");
}
