//! Integration tests for the events API

use super::*;
use chrono::{Duration, TimeZone, Utc};
use futures::StreamExt;
use tokio_test::assert_ok;
use wiremock::matchers::{body_partial_json, query_param};

const EVENTS_PATH: &str = "/data/query/events";

fn body(request: &Request) -> Value {
    serde_json::from_slice(&request.body).unwrap()
}

#[tokio::test]
async fn test_events_query_pages_through_body_cursor() {
    let server = MockServer::start().await;
    mount_token(&server, "tok").await;
    Mock::given(method("POST"))
        .and(path(EVENTS_PATH))
        .and(body_partial_json(json!({ "cursor": "c2" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(datapoints(2, 2), Some("c3"))))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(EVENTS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(datapoints(0, 2), Some("c2"))))
        .mount(&server)
        .await;

    let client = ObeliskClient::new(
        config(&server, ObeliskKind::Hfs)
            .page_cap(2)
            .build()
            .unwrap(),
    )
    .unwrap();
    let query = EventsQuery::new(["ds"]).metrics(["temp::number"]).limit(3);
    let items = client.events().unwrap().query(&query).await.unwrap();

    assert_eq!(items.len(), 3);
    assert_eq!(items[2].timestamp(), Some(2));

    let bodies: Vec<Value> = data_requests(&server).await.iter().map(body).collect();
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[0]["limit"], 2);
    assert_eq!(bodies[1]["limit"], 1);
    assert_eq!(bodies[1]["dataRange"]["metrics"], json!(["temp::number"]));
}

#[tokio::test]
async fn test_events_time_chunked_windows() {
    let server = MockServer::start().await;
    mount_token(&server, "tok").await;
    Mock::given(method("POST"))
        .and(path(EVENTS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(datapoints(0, 1), None)))
        .mount(&server)
        .await;

    let client = client(&server, ObeliskKind::Classic);
    let start = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
    let params = EventsChunkedParams::new(EventsQuery::new(["ds"]), start, start + Duration::hours(3))
        .jump(Duration::hours(2))
        .direction(SortDirection::Descending);

    let chunks: Vec<_> = client
        .events()
        .unwrap()
        .query_time_chunked(params)
        .collect()
        .await;
    assert_eq!(chunks.len(), 2);

    let bodies: Vec<Value> = data_requests(&server).await.iter().map(body).collect();
    let from = start.timestamp_millis();
    assert_eq!(bodies[0]["from"], from);
    assert_eq!(bodies[0]["to"], from + 2 * 3_600_000 - 1);
    assert_eq!(bodies[1]["from"], from + 2 * 3_600_000);
    assert_eq!(bodies[1]["to"], from + 3 * 3_600_000 - 1);
    assert_eq!(bodies[1]["orderBy"]["ordering"], "desc");
}

#[tokio::test]
async fn test_events_ingest() {
    let server = MockServer::start().await;
    mount_token(&server, "tok").await;
    Mock::given(method("POST"))
        .and(path("/data/ingest/ds"))
        .and(query_param("datasetId", "ds"))
        .and(query_param("timestampPrecision", "microseconds"))
        .and(query_param("mode", "store_only"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, ObeliskKind::Hfs);
    let events = vec![json!({ "timestamp": 1, "metric": "temp::number", "value": 3 })];
    let result = client
        .events()
        .unwrap()
        .send(
            "ds",
            &events,
            TimestampPrecision::Microseconds,
            IngestMode::StoreOnly,
        )
        .await;
    assert_ok!(result);
}

#[tokio::test]
async fn test_core_client_has_no_events() {
    let server = MockServer::start().await;
    let client = client(&server, ObeliskKind::Core);
    let error = client.events().unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Configuration);
}
