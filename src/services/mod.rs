//! Obelisk API service implementations.

mod catalog;
mod core;
mod events;

pub use self::catalog::CatalogService;
pub use self::core::{CorePageFetcher, CoreService};
pub use self::events::{EventsPageFetcher, EventsService};

use crate::client::RequestExecutor;
use crate::config::{ObeliskConfig, ObeliskKind};
use crate::errors::{ConfigurationError, ObeliskError, ObeliskResult};
use crate::pagination::QueryEngine;
use crate::request::RequestBuilder;
use std::sync::Arc;

/// State shared by all services of one client.
#[derive(Clone)]
pub(crate) struct ServiceContext {
    pub(crate) executor: Arc<RequestExecutor>,
    pub(crate) kind: ObeliskKind,
    pub(crate) builder: RequestBuilder,
    pub(crate) engine: QueryEngine,
}

impl ServiceContext {
    pub(crate) fn new(config: &ObeliskConfig, executor: Arc<RequestExecutor>) -> Self {
        Self {
            executor,
            kind: config.kind,
            builder: RequestBuilder::new(config.page_cap),
            engine: QueryEngine::new(config.page_cap),
        }
    }

    /// Fails unless the client talks to one of `kinds`.
    pub(crate) fn require(&self, operation: &'static str, kinds: &[ObeliskKind]) -> ObeliskResult<()> {
        if kinds.contains(&self.kind) {
            Ok(())
        } else {
            Err(ObeliskError::Configuration(ConfigurationError::UnsupportedKind {
                operation,
                kind: self.kind.to_string(),
            }))
        }
    }
}

fn require_dataset(dataset: &str) -> ObeliskResult<()> {
    if dataset.is_empty() {
        return Err(ObeliskError::invalid_parameter("Dataset must not be empty"));
    }
    Ok(())
}
