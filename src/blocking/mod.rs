//! Blocking edition of the client.
//!
//! Every call runs the async implementation to completion on a
//! current-thread runtime owned by the client, so both editions share one
//! code path and fail with the same errors. The blocking client must not be
//! used from inside an async context.

use crate::client::ObeliskClient;
use crate::config::{ObeliskConfig, ObeliskKind};
use crate::errors::{ConfigurationError, ObeliskError, ObeliskResult};
use crate::services::{CatalogService, CoreService, EventsService};
use crate::transport::HttpTransport;
use crate::types::{
    ChunkedParams, Datapoint, EventsChunkedParams, EventsQuery, IncomingDatapoint, IngestMode,
    QueryParams, QueryResult, TimestampPrecision,
};
use futures::stream::{Stream, StreamExt};
use serde_json::Value;
use std::pin::Pin;
use std::sync::Arc;
use tokio::runtime::{Builder, Runtime};

type ChunkStream = Pin<Box<dyn Stream<Item = ObeliskResult<Vec<Datapoint>>> + Send>>;

/// Blocking Obelisk client.
pub struct BlockingObeliskClient {
    runtime: Arc<Runtime>,
    inner: ObeliskClient,
}

impl BlockingObeliskClient {
    /// Creates a client that talks HTTP through reqwest.
    pub fn new(config: ObeliskConfig) -> ObeliskResult<Self> {
        Ok(Self {
            runtime: runtime()?,
            inner: ObeliskClient::new(config)?,
        })
    }

    /// Creates a client on top of a custom transport.
    pub fn with_transport(
        config: ObeliskConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> ObeliskResult<Self> {
        Ok(Self {
            runtime: runtime()?,
            inner: ObeliskClient::with_transport(config, transport),
        })
    }

    /// Creates a client for `kind` with credentials from the environment.
    pub fn from_env(kind: ObeliskKind) -> ObeliskResult<Self> {
        let config = ObeliskConfig::builder().kind(kind).from_env().build()?;
        Self::new(config)
    }

    /// CORE query and ingest service.
    pub fn core(&self) -> ObeliskResult<BlockingCoreService> {
        Ok(BlockingCoreService {
            runtime: self.runtime.clone(),
            inner: self.inner.core()?,
        })
    }

    /// Events query and ingest service.
    pub fn events(&self) -> ObeliskResult<BlockingEventsService> {
        Ok(BlockingEventsService {
            runtime: self.runtime.clone(),
            inner: self.inner.events()?,
        })
    }

    /// Dataset metadata service.
    pub fn catalog(&self) -> ObeliskResult<BlockingCatalogService> {
        Ok(BlockingCatalogService {
            runtime: self.runtime.clone(),
            inner: self.inner.catalog()?,
        })
    }

    /// The async client driven by this one.
    pub fn inner(&self) -> &ObeliskClient {
        &self.inner
    }
}

impl std::fmt::Debug for BlockingObeliskClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingObeliskClient")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

fn runtime() -> ObeliskResult<Arc<Runtime>> {
    Builder::new_current_thread()
        .enable_all()
        .build()
        .map(Arc::new)
        .map_err(|e| ObeliskError::Configuration(ConfigurationError::Runtime(e.to_string())))
}

/// Blocking wrapper around [`CoreService`].
pub struct BlockingCoreService {
    runtime: Arc<Runtime>,
    inner: CoreService,
}

impl std::fmt::Debug for BlockingCoreService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingCoreService")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl BlockingCoreService {
    /// See [`CoreService::fetch_single_chunk`].
    pub fn fetch_single_chunk(&self, params: &QueryParams) -> ObeliskResult<QueryResult> {
        self.runtime.block_on(self.inner.fetch_single_chunk(params))
    }

    /// See [`CoreService::query`].
    pub fn query(&self, params: &QueryParams) -> ObeliskResult<Vec<Datapoint>> {
        self.runtime.block_on(self.inner.query(params))
    }

    /// See [`CoreService::query_time_chunked`].
    pub fn query_time_chunked(&self, params: ChunkedParams) -> BlockingChunks {
        BlockingChunks::new(
            self.runtime.clone(),
            Box::pin(self.inner.query_time_chunked(params)),
        )
    }

    /// See [`CoreService::send`].
    pub fn send(&self, dataset: &str, data: &[IncomingDatapoint]) -> ObeliskResult<()> {
        self.runtime.block_on(self.inner.send(dataset, data))
    }
}

/// Blocking wrapper around [`EventsService`].
pub struct BlockingEventsService {
    runtime: Arc<Runtime>,
    inner: EventsService,
}

impl std::fmt::Debug for BlockingEventsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingEventsService")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl BlockingEventsService {
    /// See [`EventsService::fetch_single_chunk`].
    pub fn fetch_single_chunk(&self, query: &EventsQuery) -> ObeliskResult<QueryResult> {
        self.runtime.block_on(self.inner.fetch_single_chunk(query))
    }

    /// See [`EventsService::query`].
    pub fn query(&self, query: &EventsQuery) -> ObeliskResult<Vec<Datapoint>> {
        self.runtime.block_on(self.inner.query(query))
    }

    /// See [`EventsService::query_time_chunked`].
    pub fn query_time_chunked(&self, params: EventsChunkedParams) -> BlockingChunks {
        BlockingChunks::new(
            self.runtime.clone(),
            Box::pin(self.inner.query_time_chunked(params)),
        )
    }

    /// See [`EventsService::send`].
    pub fn send(
        &self,
        dataset: &str,
        data: &[Value],
        precision: TimestampPrecision,
        mode: IngestMode,
    ) -> ObeliskResult<()> {
        self.runtime
            .block_on(self.inner.send(dataset, data, precision, mode))
    }
}

/// Blocking wrapper around [`CatalogService`].
pub struct BlockingCatalogService {
    runtime: Arc<Runtime>,
    inner: CatalogService,
}

impl std::fmt::Debug for BlockingCatalogService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingCatalogService")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl BlockingCatalogService {
    /// See [`CatalogService::datasets`].
    pub fn datasets(&self) -> ObeliskResult<Value> {
        self.runtime.block_on(self.inner.datasets())
    }

    /// See [`CatalogService::dataset`].
    pub fn dataset(&self, id: &str) -> ObeliskResult<Value> {
        self.runtime.block_on(self.inner.dataset(id))
    }

    /// See [`CatalogService::metrics`].
    pub fn metrics(&self, id: &str) -> ObeliskResult<Value> {
        self.runtime.block_on(self.inner.metrics(id))
    }

    /// See [`CatalogService::things`].
    pub fn things(&self, id: &str) -> ObeliskResult<Value> {
        self.runtime.block_on(self.inner.things(id))
    }
}

/// Iterator over the windows of a time-chunked query.
///
/// Each call to `next` runs one window's query. Iteration ends after the
/// first error.
pub struct BlockingChunks {
    runtime: Arc<Runtime>,
    stream: ChunkStream,
}

impl BlockingChunks {
    fn new(runtime: Arc<Runtime>, stream: ChunkStream) -> Self {
        Self { runtime, stream }
    }
}

impl Iterator for BlockingChunks {
    type Item = ObeliskResult<Vec<Datapoint>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.runtime.block_on(self.stream.next())
    }
}
