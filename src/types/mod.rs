//! Type definitions for the Obelisk APIs.

mod query;

pub use query::{ChunkedParams, EventsChunkedParams, EventsQuery, QueryParams, SortDirection};

use crate::errors::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Value type of a metric, given by its `::type` suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// A single number.
    #[serde(rename = "number")]
    Number,
    /// An array of numbers.
    #[serde(rename = "number[]")]
    NumberArray,
    /// Arbitrary JSON.
    #[serde(rename = "json")]
    Json,
    /// A boolean.
    #[serde(rename = "bool")]
    Bool,
    /// A string.
    #[serde(rename = "string")]
    String,
}

impl DataType {
    /// Wire name of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Number => "number",
            DataType::NumberArray => "number[]",
            DataType::Json => "json",
            DataType::Bool => "bool",
            DataType::String => "string",
        }
    }

    /// Whether `value` is acceptable for a metric of this type.
    ///
    /// JSON metrics accept anything.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            DataType::Number => value.is_number(),
            DataType::NumberArray => value
                .as_array()
                .map(|items| items.iter().all(Value::is_number))
                .unwrap_or(false),
            DataType::Json => true,
            DataType::Bool => value.is_boolean(),
            DataType::String => value.is_string(),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "number" => Ok(DataType::Number),
            "number[]" => Ok(DataType::NumberArray),
            "json" => Ok(DataType::Json),
            "bool" => Ok(DataType::Bool),
            "string" => Ok(DataType::String),
            other => Err(ValidationError::UnknownDataType(other.to_string())),
        }
    }
}

/// Extracts the data type from a typed metric name such as `temp::number`.
pub fn type_suffix(metric: &str) -> Result<DataType, ValidationError> {
    let mut parts = metric.split("::");
    match (parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(suffix), None) => suffix.parse(),
        _ => Err(ValidationError::InvalidMetric(metric.to_string())),
    }
}

/// Server-side aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregator {
    /// Last value.
    Last,
    /// Minimum.
    Min,
    /// Mean.
    Mean,
    /// Maximum.
    Max,
    /// Count.
    Count,
    /// Standard deviation.
    Stddev,
}

impl Aggregator {
    /// Wire name of the aggregator.
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregator::Last => "last",
            Aggregator::Min => "min",
            Aggregator::Mean => "mean",
            Aggregator::Max => "max",
            Aggregator::Count => "count",
            Aggregator::Stddev => "stddev",
        }
    }
}

/// Where ingested data goes on Classic deployments.
///
/// Ignored by HFS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestMode {
    /// Long-term storage and stream.
    #[default]
    Default,
    /// Stream only.
    StreamOnly,
    /// Long-term storage only.
    StoreOnly,
}

impl IngestMode {
    /// Wire name of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestMode::Default => "default",
            IngestMode::StreamOnly => "stream_only",
            IngestMode::StoreOnly => "store_only",
        }
    }
}

/// Unit of numeric timestamps in ingested data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampPrecision {
    /// Seconds since the epoch.
    Seconds,
    /// Milliseconds since the epoch.
    #[default]
    Milliseconds,
    /// Microseconds since the epoch.
    Microseconds,
}

impl TimestampPrecision {
    /// Wire name of the precision.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimestampPrecision::Seconds => "seconds",
            TimestampPrecision::Milliseconds => "milliseconds",
            TimestampPrecision::Microseconds => "microseconds",
        }
    }
}

/// Geographic position attached to a datapoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
    /// Elevation.
    pub elevation: f64,
}

/// Datapoint returned by a query.
///
/// Which fields are present depends on the query, so the datapoint is kept
/// as an open JSON object with accessors for the common ones.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Datapoint(pub Map<String, Value>);

impl Datapoint {
    /// Returns a field by name.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Timestamp as a number, if the server sent one.
    pub fn timestamp(&self) -> Option<i64> {
        self.get("timestamp").and_then(Value::as_i64)
    }

    /// Value field.
    pub fn value(&self) -> Option<&Value> {
        self.get("value")
    }

    /// Metric name.
    pub fn metric(&self) -> Option<&str> {
        self.get("metric").and_then(Value::as_str)
    }

    /// Source name.
    pub fn source(&self) -> Option<&str> {
        self.get("source").and_then(Value::as_str)
    }

    /// Dataset id.
    pub fn dataset(&self) -> Option<&str> {
        self.get("dataset").and_then(Value::as_str)
    }

    /// Consumes the datapoint and returns the underlying map.
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

/// Datapoint to be ingested into Obelisk CORE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingDatapoint {
    /// Observation time. The server uses the ingest time when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    /// Typed metric name, `name::type`.
    pub metric: String,

    /// Observed value, matching the metric's type.
    pub value: Value,

    /// Free-form labels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,

    /// Position of the observation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Position>,
}

impl IncomingDatapoint {
    /// Creates and validates a datapoint.
    pub fn new(metric: impl Into<String>, value: impl Into<Value>) -> Result<Self, ValidationError> {
        let datapoint = Self {
            timestamp: None,
            metric: metric.into(),
            value: value.into(),
            labels: None,
            location: None,
        };
        datapoint.validate()?;
        Ok(datapoint)
    }

    /// Sets the observation time.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Adds a label.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Sets the position.
    pub fn with_location(mut self, location: Position) -> Self {
        self.location = Some(location);
        self
    }

    /// Checks the value against the metric's type suffix.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let data_type = type_suffix(&self.metric)?;
        if !data_type.accepts(&self.value) {
            return Err(ValidationError::TypeMismatch {
                metric: self.metric.clone(),
                expected: data_type.to_string(),
            });
        }
        Ok(())
    }
}

/// Paged query response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult<T = Datapoint> {
    /// Items of this page.
    pub items: Vec<T>,

    /// Continuation cursor. Absent when no more data follows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}
