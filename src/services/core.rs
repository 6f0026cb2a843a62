//! Obelisk CORE data service.

use super::{require_dataset, ServiceContext};
use crate::client::{expect_status, ApiRequest, RequestExecutor};
use crate::errors::{ObeliskError, ObeliskResult};
use crate::pagination::{Page, PageFetcher, PageRequest};
use crate::request::RequestBuilder;
use crate::types::{ChunkedParams, Datapoint, IncomingDatapoint, QueryParams, QueryResult};
use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use reqwest::StatusCode;
use tracing::debug;
use url::Url;

/// Fetches pages of a CORE data query with `GET {root}/{dataset}/data/query`.
pub struct CorePageFetcher<'a> {
    executor: &'a RequestExecutor,
    builder: RequestBuilder,
    params: &'a QueryParams,
    url: Url,
}

impl<'a> CorePageFetcher<'a> {
    /// Creates a fetcher for `params`.
    pub fn new(
        executor: &'a RequestExecutor,
        builder: RequestBuilder,
        params: &'a QueryParams,
    ) -> ObeliskResult<Self> {
        let url = executor.endpoint(&[params.dataset.as_str(), "data", "query"])?;
        Ok(Self {
            executor,
            builder,
            params,
            url,
        })
    }
}

#[async_trait]
impl PageFetcher for CorePageFetcher<'_> {
    type Item = Datapoint;

    async fn fetch_page(&self, request: &PageRequest) -> ObeliskResult<Page<Datapoint>> {
        let api = ApiRequest::get(self.url.clone())
            .with_query(self.builder.core_query(self.params, request));
        let result: QueryResult<Datapoint> =
            self.executor.execute_json(&api, StatusCode::OK).await?;
        Ok(result.into())
    }
}

/// Service for the Obelisk CORE query and ingest APIs.
#[derive(Clone)]
pub struct CoreService {
    ctx: ServiceContext,
}

impl std::fmt::Debug for CoreService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreService")
            .field("kind", &self.ctx.kind)
            .finish_non_exhaustive()
    }
}

impl CoreService {
    pub(crate) fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Fetches a single page, starting at the params' cursor.
    ///
    /// The page size is the params' limit, capped at the server page cap. A
    /// short page that still carries a cursor is a protocol error.
    pub async fn fetch_single_chunk(&self, params: &QueryParams) -> ObeliskResult<QueryResult> {
        params.validate()?;
        let fetcher = CorePageFetcher::new(&self.ctx.executor, self.ctx.builder, params)?;
        let request = PageRequest {
            cursor: params.cursor.clone(),
            page_size: self.ctx.builder.page_size(params.limit),
        };

        let page = fetcher.fetch_checked(&request).await?;
        Ok(QueryResult {
            items: page.items,
            cursor: page.cursor,
        })
    }

    /// Runs a query over as many pages as needed.
    ///
    /// Returns at most `params.limit` datapoints, or everything when no limit
    /// is set. Any failure fails the whole query.
    pub async fn query(&self, params: &QueryParams) -> ObeliskResult<Vec<Datapoint>> {
        params.validate()?;
        let fetcher = CorePageFetcher::new(&self.ctx.executor, self.ctx.builder, params)?;

        debug!(dataset = %params.dataset, limit = ?params.limit, "Starting CORE query");
        self.ctx
            .engine
            .collect(&fetcher, params.limit, params.cursor.clone())
            .await
    }

    /// Runs one query per time window and yields each window's datapoints.
    ///
    /// The stream ends after the first error.
    pub fn query_time_chunked(
        &self,
        params: ChunkedParams,
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

    /// Ingests datapoints into `dataset` with a single request.
    pub async fn send(&self, dataset: &str, data: &[IncomingDatapoint]) -> ObeliskResult<()> {
        require_dataset(dataset)?;
        for point in data {
            point.validate()?;
        }

        let url = self.ctx.executor.endpoint(&[dataset, "data", "ingest"])?;
        let request = ApiRequest::post_json(url, data)?;
        let response = self.ctx.executor.execute(&request).await?;
        expect_status(&response, StatusCode::NO_CONTENT)?;

        debug!(dataset, count = data.len(), "Ingested datapoints");
        Ok(())
    }
}
