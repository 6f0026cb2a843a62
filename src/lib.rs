//! Obelisk Integration Module
//!
//! Client library for the Obelisk IoT data platform. It covers the CORE
//! query, ingest and catalog APIs as well as the events API of the Classic
//! and HFS deployments.
//!
//! # Features
//!
//! - **Authentication**: client-credentials token exchange with a shared,
//!   single-flight token cache and one refresh on `401`
//! - **Queries**: multi-page queries with strict limit accounting, single
//!   page fetches and time-chunked queries
//! - **Filters**: typed RSQL filter construction
//! - **Ingest**: CORE datapoints and raw Classic/HFS events
//! - **Resilience**: pluggable retry policies for transient failures
//! - **Blocking edition**: the same operations without an async runtime
//!
//! # Example
//!
//! ```no_run
//! use integrations_obelisk::prelude::*;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ObeliskClient::builder()
//!     .kind(ObeliskKind::Core)
//!     .credentials("client_id", "client_secret")
//!     .retry_policy(RetryPolicy::exponential(3, Duration::from_millis(500)))
//!     .build()?;
//!
//! let filter = Filter::new().and(vec![
//!     Comparison::equal("source", "sensor-1"),
//!     Comparison::greater("value", 20),
//! ]);
//! let params = QueryParams::new("my-dataset")
//!     .data_type(DataType::Number)
//!     .filter(filter)
//!     .limit(1000);
//!
//! for point in client.core()?.query(&params).await? {
//!     println!("{:?} {:?}", point.timestamp(), point.value());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Logging goes through `tracing`; install a subscriber in the application
//! to see it.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
pub mod auth;
pub mod blocking;
pub mod client;
pub mod config;
pub mod errors;
pub mod pagination;
pub mod request;
pub mod resilience;
pub mod services;
pub mod transport;
pub mod types;

// Internal modules (not part of public API)
#[cfg(test)]
mod mocks;

// Re-exports for convenience
pub use auth::{AccessToken, AuthProvider, Credentials, TokenManager};
pub use blocking::BlockingObeliskClient;
pub use client::{ObeliskClient, ObeliskClientBuilder};
pub use config::{ObeliskConfig, ObeliskConfigBuilder, ObeliskKind};
pub use errors::{ErrorKind, ObeliskError, ObeliskResult};
pub use resilience::RetryPolicy;
pub use types::{
    ChunkedParams, DataType, Datapoint, EventsChunkedParams, EventsQuery, IncomingDatapoint,
    QueryParams, QueryResult,
};

/// Prelude module with commonly used types and traits.
///
/// ```no_run
/// use integrations_obelisk::prelude::*;
/// ```
pub mod prelude {
    // Clients
    pub use crate::blocking::BlockingObeliskClient;
    pub use crate::client::ObeliskClient;

    // Configuration
    pub use crate::config::{ObeliskConfig, ObeliskConfigBuilder, ObeliskKind};
    pub use crate::resilience::RetryPolicy;

    // Authentication
    pub use crate::auth::{AccessToken, AuthProvider, TokenManager};

    // Services
    pub use crate::services::{CatalogService, CoreService, EventsService};

    // Common types
    pub use crate::types::{
        Aggregator, ChunkedParams, DataType, Datapoint, EventsChunkedParams, EventsQuery,
        IncomingDatapoint, IngestMode, Position, QueryParams, QueryResult, SortDirection,
        TimestampPrecision,
    };

    // Filters
    pub use crate::request::filter::{Comparison, Constraint, Filter};

    // Errors
    pub use crate::errors::{ErrorKind, ObeliskError, ObeliskResult};
}
