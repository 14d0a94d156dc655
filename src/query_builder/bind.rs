//! Typed bind parameters.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::Query as SqlxQuery;

/// A value bound to a positional placeholder
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    Json(Value),
}

impl BindValue {
    pub fn is_null(&self) -> bool {
        matches!(self, BindValue::Null)
    }

    /// Coerce a scalar into its text form.
    ///
    /// Used for document predicates that compare against `->>` extractions, which
    /// always yield text on the database side.
    pub fn into_text(self) -> BindValue {
        match self {
            BindValue::Null => BindValue::Null,
            BindValue::Bool(b) => BindValue::Text(b.to_string()),
            BindValue::Int(i) => BindValue::Text(i.to_string()),
            BindValue::Float(f) => BindValue::Text(f.to_string()),
            BindValue::Text(s) => BindValue::Text(s),
            BindValue::Timestamp(t) => BindValue::Text(t.to_rfc3339()),
            BindValue::Json(Value::String(s)) => BindValue::Text(s),
            BindValue::Json(v) => BindValue::Text(v.to_string()),
        }
    }

    pub fn into_json(self) -> Value {
        match self {
            BindValue::Null => Value::Null,
            BindValue::Bool(b) => Value::Bool(b),
            BindValue::Int(i) => Value::from(i),
            BindValue::Float(f) => Value::from(f),
            BindValue::Text(s) => Value::String(s),
            BindValue::Timestamp(t) => Value::String(t.to_rfc3339()),
            BindValue::Json(v) => v,
        }
    }

    /// Render the value as an unquoted SQL literal body (quotes are added by the caller).
    pub(crate) fn literal_text(&self) -> Option<String> {
        match self {
            BindValue::Null => None,
            BindValue::Bool(b) => Some(b.to_string()),
            BindValue::Int(i) => Some(i.to_string()),
            BindValue::Float(f) => Some(f.to_string()),
            BindValue::Text(s) => Some(s.clone()),
            BindValue::Timestamp(t) => Some(t.to_rfc3339()),
            BindValue::Json(Value::String(s)) => Some(s.clone()),
            BindValue::Json(v) => Some(v.to_string()),
        }
    }
}

impl From<&str> for BindValue {
    fn from(value: &str) -> Self {
        BindValue::Text(value.to_string())
    }
}

impl From<String> for BindValue {
    fn from(value: String) -> Self {
        BindValue::Text(value)
    }
}

impl From<&String> for BindValue {
    fn from(value: &String) -> Self {
        BindValue::Text(value.clone())
    }
}

impl From<i64> for BindValue {
    fn from(value: i64) -> Self {
        BindValue::Int(value)
    }
}

impl From<i32> for BindValue {
    fn from(value: i32) -> Self {
        BindValue::Int(i64::from(value))
    }
}

impl From<u32> for BindValue {
    fn from(value: u32) -> Self {
        BindValue::Int(i64::from(value))
    }
}

impl From<bool> for BindValue {
    fn from(value: bool) -> Self {
        BindValue::Bool(value)
    }
}

impl From<f64> for BindValue {
    fn from(value: f64) -> Self {
        BindValue::Float(value)
    }
}

impl From<DateTime<Utc>> for BindValue {
    fn from(value: DateTime<Utc>) -> Self {
        BindValue::Timestamp(value)
    }
}

impl<T: Into<BindValue>> From<Option<T>> for BindValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(BindValue::Null, Into::into)
    }
}

/// JSON scalars map onto their native bind types; arrays and objects bind as JSONB.
impl From<Value> for BindValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => BindValue::Null,
            Value::Bool(b) => BindValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => BindValue::Int(i),
                None => BindValue::Float(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => BindValue::Text(s),
            other => BindValue::Json(other),
        }
    }
}

/// Bind every parameter, in order, onto a sqlx query
pub fn bind_params<'q>(
    mut query: SqlxQuery<'q, Postgres, PgArguments>,
    params: &'q [BindValue],
) -> SqlxQuery<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            BindValue::Null => query.bind(None::<String>),
            BindValue::Bool(b) => query.bind(*b),
            BindValue::Int(i) => query.bind(*i),
            BindValue::Float(f) => query.bind(*f),
            BindValue::Text(s) => query.bind(s.as_str()),
            BindValue::Timestamp(t) => query.bind(*t),
            BindValue::Json(v) => query.bind(sqlx::types::Json(v)),
        };
    }
    query
}
