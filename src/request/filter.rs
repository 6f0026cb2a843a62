//! RSQL filter builder for Obelisk CORE queries.
//!
//! ```
//! use integrations_obelisk::request::filter::{Comparison, Filter};
//!
//! let filter = Filter::new()
//!     .and([
//!         Comparison::equal("source", "test source"),
//!         Comparison::is_in("metricType", ["number", "number[]"]),
//!     ])
//!     .or([Comparison::less("timestamp", 1757422128000i64)]);
//!
//! assert_eq!(
//!     filter.to_string(),
//!     "(('source'=='test source';'metricType'=in=('number','number[]')),'timestamp'<'1757422128000')"
//! );
//! ```
//!
//! Field names are not checked against the available datapoint fields, and
//! neither is the type of the right-hand side.

use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;

/// Value usable on the right-hand side of a comparison.
pub trait FilterValue {
    /// Unquoted RSQL rendering of the value.
    fn to_rsql(&self) -> String;
}

impl FilterValue for str {
    fn to_rsql(&self) -> String {
        self.to_string()
    }
}

impl FilterValue for String {
    fn to_rsql(&self) -> String {
        self.clone()
    }
}

impl<T: FilterValue + ?Sized> FilterValue for &T {
    fn to_rsql(&self) -> String {
        (**self).to_rsql()
    }
}

impl FilterValue for DateTime<Utc> {
    fn to_rsql(&self) -> String {
        self.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }
}

macro_rules! display_filter_value {
    ($($ty:ty),*) => {
        $(
            impl FilterValue for $ty {
                fn to_rsql(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

display_filter_value!(bool, i32, i64, u32, u64, usize, f32, f64);

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// A single `field op value` comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison {
    field: String,
    op: &'static str,
    right: Right,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Right {
    None,
    Single(String),
    Group(Vec<String>),
}

impl Comparison {
    fn single(field: impl Into<String>, op: &'static str, value: impl FilterValue) -> Self {
        Self {
            field: field.into(),
            op,
            right: Right::Single(value.to_rsql()),
        }
    }

    fn group<I>(field: impl Into<String>, op: &'static str, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: FilterValue,
    {
        Self {
            field: field.into(),
            op,
            right: Right::Group(values.into_iter().map(|v| v.to_rsql()).collect()),
        }
    }

    /// `field == value`
    pub fn equal(field: impl Into<String>, value: impl FilterValue) -> Self {
        Self::single(field, "==", value)
    }

    /// `field != value`
    pub fn not_equal(field: impl Into<String>, value: impl FilterValue) -> Self {
        Self::single(field, "!=", value)
    }

    /// `field < value`
    pub fn less(field: impl Into<String>, value: impl FilterValue) -> Self {
        Self::single(field, "<", value)
    }

    /// `field <= value`
    pub fn less_equal(field: impl Into<String>, value: impl FilterValue) -> Self {
        Self::single(field, "<=", value)
    }

    /// `field > value`
    pub fn greater(field: impl Into<String>, value: impl FilterValue) -> Self {
        Self::single(field, ">", value)
    }

    /// `field >= value`
    pub fn greater_equal(field: impl Into<String>, value: impl FilterValue) -> Self {
        Self::single(field, ">=", value)
    }

    /// `field =in= (values...)`
    pub fn is_in<I>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: FilterValue,
    {
        Self::group(field, "=in=", values)
    }

    /// `field =out= (values...)`
    pub fn is_not_in<I>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: FilterValue,
    {
        Self::group(field, "=out=", values)
    }

    /// `field =null=`
    pub fn null(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            op: "=null=",
            right: Right::None,
        }
    }

    /// `field =notnull=`
    pub fn not_null(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            op: "=notnull=",
            right: Right::None,
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", quote(&self.field), self.op)?;
        match &self.right {
            Right::None => Ok(()),
            Right::Single(value) => f.write_str(&quote(value)),
            Right::Group(values) => {
                let quoted: Vec<String> = values.iter().map(|v| quote(v)).collect();
                write!(f, "({})", quoted.join(","))
            }
        }
    }
}

/// A comparison or a parenthesised group of constraints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// A single comparison.
    Comparison(Comparison),
    /// All of the contents must hold (`;`).
    And(Vec<Constraint>),
    /// Any of the contents must hold (`,`).
    Or(Vec<Constraint>),
    /// A caller-supplied RSQL expression, used as is.
    Raw(String),
}

impl Constraint {
    /// Wraps a raw RSQL expression.
    pub fn raw(expression: impl Into<String>) -> Self {
        Constraint::Raw(expression.into())
    }
}

impl From<Comparison> for Constraint {
    fn from(comparison: Comparison) -> Self {
        Constraint::Comparison(comparison)
    }
}

fn write_group(f: &mut fmt::Formatter<'_>, items: &[Constraint], sep: &str) -> fmt::Result {
    f.write_str("(")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{}", item)?;
    }
    f.write_str(")")
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Comparison(c) => write!(f, "{}", c),
            Constraint::And(items) => write_group(f, items, ";"),
            Constraint::Or(items) => write_group(f, items, ","),
            Constraint::Raw(expression) => write!(f, "({})", expression),
        }
    }
}

/// Programmatic RSQL filter.
///
/// Groups always enclose their contents in parentheses so precedence never
/// depends on RSQL's operator binding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    content: Option<Constraint>,
}

impl Filter {
    /// Creates an empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Encloses the current contents, if any, in an AND group with `items`.
    pub fn and<I, C>(self, items: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Constraint>,
    {
        let group = self.extend(items);
        Self {
            content: Some(Constraint::And(group)),
        }
    }

    /// Encloses the current contents, if any, in an OR group with `items`.
    pub fn or<I, C>(self, items: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Constraint>,
    {
        let group = self.extend(items);
        Self {
            content: Some(Constraint::Or(group)),
        }
    }

    /// True if nothing was added yet.
    pub fn is_empty(&self) -> bool {
        self.content.is_none()
    }

    fn extend<I, C>(self, items: I) -> Vec<Constraint>
    where
        I: IntoIterator<Item = C>,
        C: Into<Constraint>,
    {
        self.content
            .into_iter()
            .chain(items.into_iter().map(Into::into))
            .collect()
    }
}

impl From<Constraint> for Filter {
    fn from(content: Constraint) -> Self {
        Self {
            content: Some(content),
        }
    }
}

impl From<Comparison> for Filter {
    fn from(comparison: Comparison) -> Self {
        Constraint::from(comparison).into()
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.content {
            Some(content) => write!(f, "{}", content),
            None => Ok(()),
        }
    }
}
