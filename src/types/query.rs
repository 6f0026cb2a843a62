//! Query parameters for the CORE and events APIs.

use super::{Aggregator, DataType};
use crate::errors::ValidationError;
use crate::request::filter::{Comparison, Constraint, Filter};
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};

/// Parameters of a CORE data query.
///
/// List fields are sent in the order given, each entry as its own query
/// parameter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams {
    /// Dataset to query.
    pub dataset: String,

    /// Fields to group by.
    pub group_by: Vec<String>,

    /// Aggregation applied per group.
    pub aggregator: Option<Aggregator>,

    /// Fields to return. The server default is used when absent.
    pub fields: Option<Vec<String>>,

    /// Sort order. Prefix a field with `-` to sort descending.
    pub order_by: Vec<String>,

    /// Value type of the queried metrics.
    pub data_type: Option<DataType>,

    /// RSQL filter expression.
    pub filter: Option<String>,

    /// Cursor to start from.
    pub cursor: Option<String>,

    /// Maximum number of items to return across all pages. Unbounded when
    /// absent.
    pub limit: Option<usize>,
}

impl QueryParams {
    /// Creates parameters for a query on `dataset`.
    pub fn new(dataset: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            ..Default::default()
        }
    }

    /// Sets the group-by fields.
    pub fn group_by<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the aggregator.
    pub fn aggregator(mut self, aggregator: Aggregator) -> Self {
        self.aggregator = Some(aggregator);
        self
    }

    /// Sets the returned fields.
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the sort order.
    pub fn order_by<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order_by = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the data type.
    pub fn data_type(mut self, data_type: DataType) -> Self {
        self.data_type = Some(data_type);
        self
    }

    /// Sets the filter, either a raw RSQL string or a [`Filter`].
    pub fn filter(mut self, filter: impl ToString) -> Self {
        self.filter = Some(filter.to_string());
        self
    }

    /// Sets the starting cursor.
    pub fn cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }

    /// Sets the total limit.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Validates the parameters.
    ///
    /// Requesting the `value` field, explicitly or through the server
    /// default, requires a data type.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.dataset.is_empty() {
            return Err(ValidationError::InvalidParameter(
                "Dataset must not be empty".to_string(),
            ));
        }

        let wants_value = match &self.fields {
            None => true,
            Some(fields) => fields.iter().any(|f| f == "value"),
        };
        if wants_value && self.data_type.is_none() {
            return Err(ValidationError::MissingDataType);
        }

        Ok(())
    }

    fn for_window(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> QueryParams {
        let mut items: Vec<Constraint> = vec![
            Comparison::greater_equal("timestamp", from).into(),
            Comparison::less("timestamp", to).into(),
        ];
        if let Some(raw) = &self.filter {
            items.push(Constraint::raw(raw.clone()));
        }

        QueryParams {
            filter: Some(Filter::new().and(items).to_string()),
            cursor: None,
            ..self.clone()
        }
    }
}

/// A CORE query split into consecutive time windows.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkedParams {
    /// Query applied to every window. Its cursor is ignored.
    pub query: QueryParams,

    /// Start of the first window, inclusive.
    pub start: DateTime<Utc>,

    /// End of the last window, exclusive.
    pub end: DateTime<Utc>,

    /// Window length.
    pub jump: Duration,
}

impl ChunkedParams {
    /// Splits `query` over `[start, end)` in one-hour windows.
    pub fn new(query: QueryParams, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            query,
            start,
            end,
            jump: Duration::hours(1),
        }
    }

    /// Sets the window length.
    pub fn jump(mut self, jump: Duration) -> Self {
        self.jump = jump;
        self
    }

    /// Validates the parameters.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.query.validate()?;
        if self.jump <= Duration::zero() {
            return Err(ValidationError::InvalidParameter(
                "Chunk length must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// One query per window, with the window bounds AND-ed into the filter.
    pub fn chunks(&self) -> impl Iterator<Item = QueryParams> + Send + 'static {
        let template = self.query.clone();
        windows(self.start, self.end, self.jump).map(move |(from, to)| template.for_window(from, to))
    }
}

/// Sort direction for time-chunked events queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    /// Oldest first.
    #[default]
    Ascending,
    /// Newest first.
    Descending,
}

impl SortDirection {
    /// Wire name of the direction.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "asc",
            SortDirection::Descending => "desc",
        }
    }
}

/// Parameters of an events query on Classic or HFS.
///
/// `order_by`, `filter` and `limit_by` are passed through as JSON; the
/// caller is responsible for their format.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventsQuery {
    /// Datasets to query.
    pub datasets: Vec<String>,

    /// Metric ids or wildcards such as `*::number`. All metrics when absent.
    pub metrics: Option<Vec<String>>,

    /// Fields to return.
    pub fields: Option<Vec<String>>,

    /// Lower time bound in UTC milliseconds, inclusive.
    pub from: Option<i64>,

    /// Upper time bound in UTC milliseconds, inclusive.
    pub to: Option<i64>,

    /// Ordering specification.
    pub order_by: Option<Value>,

    /// Filter expression.
    pub filter: Option<Value>,

    /// Maximum number of events across all pages. Unbounded when absent.
    pub limit: Option<usize>,

    /// Per-index-combination limits.
    pub limit_by: Option<Value>,

    /// Cursor to start from.
    pub cursor: Option<String>,
}

impl EventsQuery {
    /// Creates a query over `datasets`.
    pub fn new<I, S>(datasets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            datasets: datasets.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Restricts the metrics.
    pub fn metrics<I, S>(mut self, metrics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metrics = Some(metrics.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the returned fields.
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the lower time bound.
    pub fn from_millis(mut self, from: i64) -> Self {
        self.from = Some(from);
        self
    }

    /// Sets the upper time bound.
    pub fn to_millis(mut self, to: i64) -> Self {
        self.to = Some(to);
        self
    }

    /// Sets the ordering.
    pub fn order_by(mut self, order_by: Value) -> Self {
        self.order_by = Some(order_by);
        self
    }

    /// Sets the filter.
    pub fn filter(mut self, filter: Value) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Sets the total limit.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets per-index limits.
    pub fn limit_by(mut self, limit_by: Value) -> Self {
        self.limit_by = Some(limit_by);
        self
    }

    /// Sets the starting cursor.
    pub fn cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }

    /// Validates the parameters.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.datasets.is_empty() {
            return Err(ValidationError::InvalidParameter(
                "At least one dataset is required".to_string(),
            ));
        }
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(ValidationError::InvalidParameter(format!(
                    "from ({}) is after to ({})",
                    from, to
                )));
            }
        }
        Ok(())
    }
}

/// An events query split into consecutive time windows.
#[derive(Debug, Clone, PartialEq)]
pub struct EventsChunkedParams {
    /// Query applied to every window. Its time bounds, ordering and cursor
    /// are replaced per window.
    pub query: EventsQuery,

    /// Start of the first window, inclusive.
    pub start: DateTime<Utc>,

    /// End of the last window, exclusive.
    pub end: DateTime<Utc>,

    /// Window length.
    pub jump: Duration,

    /// Order of events within a window.
    pub direction: SortDirection,
}

impl EventsChunkedParams {
    /// Splits `query` over `[start, end)` in one-hour windows.
    pub fn new(query: EventsQuery, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            query,
            start,
            end,
            jump: Duration::hours(1),
            direction: SortDirection::Ascending,
        }
    }

    /// Sets the window length.
    pub fn jump(mut self, jump: Duration) -> Self {
        self.jump = jump;
        self
    }

    /// Sets the ordering within each window.
    pub fn direction(mut self, direction: SortDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Validates the parameters.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.query.validate()?;
        if self.jump <= Duration::zero() {
            return Err(ValidationError::InvalidParameter(
                "Chunk length must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// One query per window, ordered by timestamp.
    pub fn chunks(&self) -> impl Iterator<Item = EventsQuery> + Send + 'static {
        let template = self.query.clone();
        let ordering = json!({ "field": ["timestamp"], "ordering": self.direction.as_str() });
        windows(self.start, self.end, self.jump).map(move |(from, to)| EventsQuery {
            from: Some(from.timestamp_millis()),
            to: Some(to.timestamp_millis() - 1),
            order_by: Some(ordering.clone()),
            cursor: None,
            ..template.clone()
        })
    }
}

/// Consecutive `[from, to)` windows covering `[start, end)`. The last window
/// is clipped to `end`. Yields nothing for a non-positive jump.
fn windows(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    jump: Duration,
) -> impl Iterator<Item = (DateTime<Utc>, DateTime<Utc>)> + Send + 'static {
    let mut current = start;
    std::iter::from_fn(move || {
        if jump <= Duration::zero() || current >= end {
            return None;
        }
        let next = current
            .checked_add_signed(jump)
            .map_or(end, |next| next.min(end));
        let window = (current, next);
        current = next;
        Some(window)
    })
}
