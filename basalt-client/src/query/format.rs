//! Uniform value formatting for query compilation.
//!
//! Every value handed to a constraint goes through the same formatting rules
//! no matter which operator consumes it: datetimes become date descriptors,
//! records and pointers become pointer descriptors, regular expressions
//! reduce to their pattern source, and nested queries compile to a
//! where/className pair.

use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use super::CompileContext;
use super::query::Query;
use crate::constants::KEY_CLASS_NAME;
use crate::error::{Error, Result};
use crate::object::{GeoPoint, Pointer, Record, encode_date};

/// A constraint value, held in domain form until compile time.
#[derive(Debug, Clone)]
pub enum QueryValue {
    /// A plain JSON value, passed through as-is.
    Json(Value),
    Date(DateTime<Utc>),
    Pointer(Pointer),
    /// A regular expression, reduced to its pattern source string.
    Regex(String),
    Geo(GeoPoint),
    SubQuery(Box<Query>),
    List(Vec<QueryValue>),
}

impl QueryValue {
    /// Format this value into its wire shape.
    pub fn compile(&self, ctx: &CompileContext) -> Result<Value> {
        match self {
            Self::Json(value) => Ok(value.clone()),
            Self::Date(dt) => Ok(encode_date(dt)),
            Self::Pointer(pointer) => Ok(pointer.to_json()),
            Self::Regex(source) => Ok(Value::String(source.clone())),
            Self::Geo(point) => Ok(point.to_json()),
            Self::SubQuery(query) => Ok(json!({
                "where": query.compile_where(ctx)?,
                KEY_CLASS_NAME: query.collection(),
            })),
            Self::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(item.compile(ctx)?);
                }
                Ok(Value::Array(out))
            }
        }
    }

    /// Whether this value will compile to a JSON array.
    pub(crate) fn is_listlike(&self) -> bool {
        matches!(self, Self::List(_)) || matches!(self, Self::Json(Value::Array(_)))
    }
}

impl From<Value> for QueryValue {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<bool> for QueryValue {
    fn from(value: bool) -> Self {
        Self::Json(Value::Bool(value))
    }
}

impl From<i32> for QueryValue {
    fn from(value: i32) -> Self {
        Self::Json(json!(value))
    }
}

impl From<i64> for QueryValue {
    fn from(value: i64) -> Self {
        Self::Json(json!(value))
    }
}

impl From<u64> for QueryValue {
    fn from(value: u64) -> Self {
        Self::Json(json!(value))
    }
}

impl From<f64> for QueryValue {
    fn from(value: f64) -> Self {
        Self::Json(json!(value))
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        Self::Json(Value::String(value.to_string()))
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        Self::Json(Value::String(value))
    }
}

impl From<DateTime<Utc>> for QueryValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Date(value)
    }
}

impl From<Pointer> for QueryValue {
    fn from(value: Pointer) -> Self {
        Self::Pointer(value)
    }
}

impl From<GeoPoint> for QueryValue {
    fn from(value: GeoPoint) -> Self {
        Self::Geo(value)
    }
}

impl From<regex::Regex> for QueryValue {
    fn from(value: regex::Regex) -> Self {
        Self::Regex(value.as_str().to_string())
    }
}

impl From<&regex::Regex> for QueryValue {
    fn from(value: &regex::Regex) -> Self {
        Self::Regex(value.as_str().to_string())
    }
}

impl From<Query> for QueryValue {
    fn from(value: Query) -> Self {
        Self::SubQuery(Box::new(value))
    }
}

impl<T: Into<QueryValue>> From<Vec<T>> for QueryValue {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

/// A record formats as its pointer, which unsaved records do not have.
impl TryFrom<&Record> for QueryValue {
    type Error = Error;

    fn try_from(record: &Record) -> Result<Self> {
        Ok(Self::Pointer(record.pointer()?))
    }
}
