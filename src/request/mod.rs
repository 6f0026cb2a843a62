//! Wire encoding of Obelisk requests.
//!
//! Everything here is pure: parameters in, query pairs or JSON bodies out.
//! Multi-valued fields become repeated query parameters (`fields=a&fields=b`),
//! never a comma-joined value, and the per-page `limit` never exceeds the
//! page cap.

pub mod filter;

use crate::errors::{ObeliskError, ObeliskResult};
use crate::pagination::PageRequest;
use crate::types::{EventsQuery, IngestMode, QueryParams, TimestampPrecision};
use serde_json::{json, Map, Value};

/// Ordered query parameters. Keys may repeat.
pub type QueryPairs = Vec<(String, String)>;

/// Encodes query parameters and bodies for one deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestBuilder {
    page_cap: usize,
}

impl RequestBuilder {
    /// Creates a builder for a server with the given page cap.
    pub fn new(page_cap: usize) -> Self {
        Self {
            page_cap: page_cap.max(1),
        }
    }

    /// Maximum number of items per page.
    pub fn page_cap(&self) -> usize {
        self.page_cap
    }

    /// Page size for the next request: `min(remaining, page_cap)`, or the
    /// page cap when nothing limits the total.
    pub fn page_size(&self, remaining: Option<usize>) -> usize {
        remaining.map_or(self.page_cap, |r| r.min(self.page_cap))
    }

    /// Query string pairs of a CORE data query page.
    ///
    /// The cursor and limit come from `page`; the rest of the parameters are
    /// identical for every page of one query.
    pub fn core_query(&self, params: &QueryParams, page: &PageRequest) -> QueryPairs {
        let mut pairs = QueryPairs::new();

        for field in &params.group_by {
            pairs.push(("groupBy".to_string(), field.clone()));
        }
        if let Some(aggregator) = params.aggregator {
            pairs.push(("aggregator".to_string(), aggregator.as_str().to_string()));
        }
        for field in params.fields.iter().flatten() {
            pairs.push(("fields".to_string(), field.clone()));
        }
        for field in &params.order_by {
            pairs.push(("orderBy".to_string(), field.clone()));
        }
        if let Some(data_type) = params.data_type {
            pairs.push(("dataType".to_string(), data_type.as_str().to_string()));
        }
        if let Some(filter) = &params.filter {
            pairs.push(("filter".to_string(), filter.clone()));
        }
        if let Some(cursor) = &page.cursor {
            pairs.push(("cursor".to_string(), cursor.clone()));
        }
        pairs.push((
            "limit".to_string(),
            page.page_size.min(self.page_cap).to_string(),
        ));

        pairs
    }

    /// JSON body of an events query page.
    pub fn events_body(&self, query: &EventsQuery, page: &PageRequest) -> Value {
        let mut data_range = Map::new();
        data_range.insert("datasets".to_string(), json!(query.datasets));
        if let Some(metrics) = &query.metrics {
            data_range.insert("metrics".to_string(), json!(metrics));
        }

        let mut body = Map::new();
        body.insert("dataRange".to_string(), Value::Object(data_range));

        let optional = [
            ("cursor", page.cursor.as_ref().map(|c| json!(c))),
            ("fields", query.fields.as_ref().map(|f| json!(f))),
            ("from", query.from.map(|t| json!(t))),
            ("to", query.to.map(|t| json!(t))),
            ("orderBy", query.order_by.clone()),
            ("filter", query.filter.clone()),
            ("limitBy", query.limit_by.clone()),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                body.insert(key.to_string(), value);
            }
        }
        body.insert(
            "limit".to_string(),
            json!(page.page_size.min(self.page_cap)),
        );

        Value::Object(body)
    }

    /// Query string pairs of an events ingest request.
    pub fn ingest_params(
        dataset: &str,
        precision: TimestampPrecision,
        mode: IngestMode,
    ) -> QueryPairs {
        vec![
            ("datasetId".to_string(), dataset.to_string()),
            ("timestampPrecision".to_string(), precision.as_str().to_string()),
            ("mode".to_string(), mode.as_str().to_string()),
        ]
    }

    /// Renders pairs as an `application/x-www-form-urlencoded` string.
    pub fn to_query_string(pairs: &[(String, String)]) -> ObeliskResult<String> {
        serde_urlencoded::to_string(pairs)
            .map_err(|e| ObeliskError::invalid_parameter(format!("Cannot encode query: {}", e)))
    }
}
