//! Events query and ingest service for Classic and HFS deployments.

use super::{require_dataset, ServiceContext};
use crate::client::{expect_status, ApiRequest, RequestExecutor};
use crate::errors::{ObeliskError, ObeliskResult};
use crate::pagination::{Page, PageFetcher, PageRequest};
use crate::request::RequestBuilder;
use crate::types::{
    Datapoint, EventsChunkedParams, EventsQuery, IngestMode, QueryResult, TimestampPrecision,
};
use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;
use url::Url;

/// Fetches pages of an events query with `POST {root}/data/query/events`.
pub struct EventsPageFetcher<'a> {
    executor: &'a RequestExecutor,
    builder: RequestBuilder,
    query: &'a EventsQuery,
    url: Url,
}

impl<'a> EventsPageFetcher<'a> {
    /// Creates a fetcher for `query`.
    pub fn new(
        executor: &'a RequestExecutor,
        builder: RequestBuilder,
        query: &'a EventsQuery,
    ) -> ObeliskResult<Self> {
        let url = executor.endpoint(&["data", "query", "events"])?;
        Ok(Self {
            executor,
            builder,
            query,
            url,
        })
    }
}

#[async_trait]
impl PageFetcher for EventsPageFetcher<'_> {
    type Item = Datapoint;

    async fn fetch_page(&self, request: &PageRequest) -> ObeliskResult<Page<Datapoint>> {
        let body = self.builder.events_body(self.query, request);
        let api = ApiRequest::post_json(self.url.clone(), &body)?;
        let result: QueryResult<Datapoint> =
            self.executor.execute_json(&api, StatusCode::OK).await?;
        Ok(result.into())
    }
}

/// Service for the events API of Classic and HFS deployments.
#[derive(Clone)]
pub struct EventsService {
    ctx: ServiceContext,
}

impl std::fmt::Debug for EventsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventsService")
            .field("kind", &self.ctx.kind)
            .finish_non_exhaustive()
    }
}

impl EventsService {
    pub(crate) fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Fetches a single page of events, starting at the query's cursor.
    ///
    /// A short page that still carries a cursor is a protocol error.
    pub async fn fetch_single_chunk(&self, query: &EventsQuery) -> ObeliskResult<QueryResult> {
        query.validate()?;
        let fetcher = EventsPageFetcher::new(&self.ctx.executor, self.ctx.builder, query)?;
        let request = PageRequest {
            cursor: query.cursor.clone(),
            page_size: self.ctx.builder.page_size(query.limit),
        };

        let page = fetcher.fetch_checked(&request).await?;
        Ok(QueryResult {
            items: page.items,
            cursor: page.cursor,
        })
    }

    /// Queries events over as many pages as needed, up to `query.limit`.
    pub async fn query(&self, query: &EventsQuery) -> ObeliskResult<Vec<Datapoint>> {
        query.validate()?;
        let fetcher = EventsPageFetcher::new(&self.ctx.executor, self.ctx.builder, query)?;

        debug!(datasets = ?query.datasets, limit = ?query.limit, "Starting events query");
        self.ctx
            .engine
            .collect(&fetcher, query.limit, query.cursor.clone())
            .await
    }

    /// Runs one query per time window and yields each window's events.
    ///
    /// The stream ends after the first error.
    pub fn query_time_chunked(
        &self,
        params: EventsChunkedParams,
    ) -> impl Stream<Item = ObeliskResult<Vec<Datapoint>>> + Send + 'static {
        let invalid = params.validate().err().map(|e| Err(ObeliskError::from(e)));
        let state = invalid
            .is_none()
            .then(|| (self.clone(), params.chunks()));

        stream::iter(invalid).chain(stream::unfold(state, |state| async move {
            let (service, mut chunks) = state?;
            let query = chunks.next()?;
            match service.query(&query).await {
                Ok(items) => Some((Ok(items), Some((service, chunks)))),
                Err(err) => Some((Err(err), None)),
            }
        }))
    }

    /// Publishes raw events to `dataset` with a single request.
    ///
    /// The event format differs between Classic and HFS and is not checked.
    pub async fn send(
        &self,
        dataset: &str,
        data: &[Value],
        precision: TimestampPrecision,
        mode: IngestMode,
    ) -> ObeliskResult<()> {
        require_dataset(dataset)?;

        let url = self.ctx.executor.endpoint(&["data", "ingest", dataset])?;
        let request = ApiRequest::post_json(url, data)?
            .with_query(RequestBuilder::ingest_params(dataset, precision, mode));
        let response = self.ctx.executor.execute(&request).await?;
        expect_status(&response, StatusCode::NO_CONTENT)?;

        debug!(dataset, count = data.len(), "Published events");
        Ok(())
    }
}
