//! Integration tests for the blocking client
//!
//! The mock server lives on its own runtime; the blocking client is driven
//! from a plain test thread, the way applications without async use it.

use super::*;
use chrono::{Duration, TimeZone, Utc};
use tokio::runtime::Runtime;

// The server must drop before its runtime.
struct Fixture {
    server: MockServer,
    runtime: Runtime,
}

impl Fixture {
    fn new() -> Self {
        let runtime = Runtime::new().unwrap();
        let server = runtime.block_on(MockServer::start());
        runtime.block_on(mount_token(&server, "tok"));
        Self { server, runtime }
    }

    fn mount(&self, mock: Mock) {
        self.runtime.block_on(mock.mount(&self.server));
    }

    fn config(&self) -> ObeliskConfig {
        config(&self.server, ObeliskKind::Core).build().unwrap()
    }

    fn data_requests(&self) -> usize {
        self.runtime.block_on(data_requests(&self.server)).len()
    }
}

fn paged_mocks() -> Vec<Mock> {
    vec![
        Mock::given(method("GET"))
            .and(path("/datasets/ds/data/query"))
            .and(wiremock::matchers::query_param("cursor", "p2"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(page_body(datapoints(250, 30), None)),
            ),
        Mock::given(method("GET"))
            .and(path("/datasets/ds/data/query"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(page_body(datapoints(0, 250), Some("p2"))),
            ),
    ]
}

#[test]
fn test_blocking_query_matches_async() {
    let fixture = Fixture::new();
    for mock in paged_mocks() {
        fixture.mount(mock);
    }
    let params = QueryParams::new("ds").data_type(DataType::Number).limit(260);

    let blocking = BlockingObeliskClient::new(fixture.config()).unwrap();
    let blocking_items = blocking.core().unwrap().query(&params).unwrap();

    let client = ObeliskClient::new(fixture.config()).unwrap();
    let async_items = fixture
        .runtime
        .block_on(async { client.core().unwrap().query(&params).await })
        .unwrap();

    assert_eq!(blocking_items.len(), 260);
    assert_eq!(blocking_items, async_items);
    assert_eq!(fixture.data_requests(), 4);
}

#[test]
fn test_blocking_errors_match_async() {
    let fixture = Fixture::new();
    fixture.mount(
        Mock::given(method("GET"))
            .and(path("/datasets/ds/data/query"))
            .respond_with(ResponseTemplate::new(500)),
    );
    let params = QueryParams::new("ds").data_type(DataType::Number);

    let blocking = BlockingObeliskClient::new(fixture.config()).unwrap();
    let blocking_error = blocking.core().unwrap().query(&params).unwrap_err();

    let client = ObeliskClient::new(fixture.config()).unwrap();
    let async_error = fixture
        .runtime
        .block_on(async { client.core().unwrap().query(&params).await })
        .unwrap_err();

    assert_eq!(blocking_error.kind(), ErrorKind::Transient);
    assert_eq!(blocking_error.kind(), async_error.kind());
    assert_eq!(blocking_error.status_code(), async_error.status_code());
    assert_eq!(blocking_error.attempts(), async_error.attempts());
}

#[test]
fn test_blocking_time_chunked_iterator() {
    let fixture = Fixture::new();
    fixture.mount(
        Mock::given(method("GET"))
            .and(path("/datasets/ds/data/query"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(page_body(datapoints(0, 4), None)),
            ),
    );

    let client = BlockingObeliskClient::new(fixture.config()).unwrap();
    let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let params = ChunkedParams::new(
        QueryParams::new("ds").data_type(DataType::Number),
        start,
        start + Duration::hours(24),
    )
    .jump(Duration::hours(6));

    let total: usize = client
        .core()
        .unwrap()
        .query_time_chunked(params)
        .map(|chunk| chunk.unwrap().len())
        .sum();

    assert_eq!(total, 16);
    assert_eq!(fixture.data_requests(), 4);
}
