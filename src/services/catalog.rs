//! Dataset metadata lookups on CORE.
//!
//! Responses are returned as raw JSON; their schema belongs to the server.

use super::{require_dataset, ServiceContext};
use crate::client::ApiRequest;
use crate::errors::ObeliskResult;
use reqwest::StatusCode;
use serde_json::Value;

/// Pass-through metadata GETs under the CORE dataset root.
#[derive(Clone)]
pub struct CatalogService {
    ctx: ServiceContext,
}

impl std::fmt::Debug for CatalogService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogService")
            .field("kind", &self.ctx.kind)
            .finish_non_exhaustive()
    }
}

impl CatalogService {
    pub(crate) fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Lists the datasets visible to the client: `GET {root}`.
    pub async fn datasets(&self) -> ObeliskResult<Value> {
        self.get(&[]).await
    }

    /// Describes one dataset: `GET {root}/{id}`.
    pub async fn dataset(&self, id: &str) -> ObeliskResult<Value> {
        require_dataset(id)?;
        self.get(&[id]).await
    }

    /// Lists the metrics of a dataset: `GET {root}/{id}/metrics`.
    pub async fn metrics(&self, id: &str) -> ObeliskResult<Value> {
        require_dataset(id)?;
        self.get(&[id, "metrics"]).await
    }

    /// Lists the things of a dataset: `GET {root}/{id}/things`.
    pub async fn things(&self, id: &str) -> ObeliskResult<Value> {
        require_dataset(id)?;
        self.get(&[id, "things"]).await
    }

    async fn get(&self, segments: &[&str]) -> ObeliskResult<Value> {
        let url = self.ctx.executor.endpoint(segments)?;
        self.ctx
            .executor
            .execute_json(&ApiRequest::get(url), StatusCode::OK)
            .await
    }
}
