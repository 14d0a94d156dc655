//! Mapping PostgreSQL rows into JSON documents.

use crate::constants::JSONB_FIELD_NAME;
use crate::query_builder::Selection;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Number, Value};
use sqlx::postgres::PgRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};

/// Decode every column of a row by its PostgreSQL type
pub fn row_to_map(row: &PgRow) -> Map<String, Value> {
    row.columns()
        .iter()
        .map(|column| {
            let value = decode_column(row, column.ordinal(), column.type_info().name());
            (column.name().to_string(), value)
        })
        .collect()
}

fn decode_column(row: &PgRow, index: usize, type_name: &str) -> Value {
    if row.try_get_raw(index).map(|raw| raw.is_null()).unwrap_or(true) {
        return Value::Null;
    }

    match type_name {
        "BOOL" => row.try_get::<bool, _>(index).map(Value::Bool).unwrap_or(Value::Null),
        "INT2" => row.try_get::<i16, _>(index).map(Value::from).unwrap_or(Value::Null),
        "INT4" => row.try_get::<i32, _>(index).map(Value::from).unwrap_or(Value::Null),
        "INT8" => row.try_get::<i64, _>(index).map(Value::from).unwrap_or(Value::Null),
        "FLOAT4" => row
            .try_get::<f32, _>(index)
            .ok()
            .and_then(|f| Number::from_f64(f64::from(f)))
            .map_or(Value::Null, Value::Number),
        "FLOAT8" => row
            .try_get::<f64, _>(index)
            .ok()
            .and_then(Number::from_f64)
            .map_or(Value::Null, Value::Number),
        "JSON" | "JSONB" => row.try_get::<Value, _>(index).unwrap_or(Value::Null),
        "TIMESTAMPTZ" => row
            .try_get::<DateTime<Utc>, _>(index)
            .map(|t| Value::String(t.to_rfc3339()))
            .unwrap_or(Value::Null),
        "TIMESTAMP" => row
            .try_get::<NaiveDateTime, _>(index)
            .map(|t| Value::String(t.to_string()))
            .unwrap_or(Value::Null),
        "UUID" => row
            .try_get::<uuid::Uuid, _>(index)
            .map(|u| Value::String(u.to_string()))
            .unwrap_or(Value::Null),
        _ => row.try_get::<String, _>(index).map(Value::String).unwrap_or(Value::Null),
    }
}

/// Shape a decoded row into the document a caller asked for.
///
/// Without select fields the whole `data` document is returned (or every column
/// for relational tables). With select fields each alias is extracted; object and
/// array fields are JSON-decoded when they arrive as text.
pub fn shape_row(mut columns: Map<String, Value>, selections: &[Selection]) -> Value {
    if selections.is_empty() {
        return match columns.remove(JSONB_FIELD_NAME) {
            Some(Value::String(text)) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
            Some(document) => document,
            None => Value::Object(columns),
        };
    }

    let mut document = Map::new();
    for selection in selections {
        let alias = selection.alias();
        let raw = columns
            .remove(alias)
            .or_else(|| columns.remove(&alias.to_lowercase()))
            .unwrap_or(Value::Null);

        let value = match raw {
            Value::String(text) if selection.decodes_json() => {
                serde_json::from_str(&text).unwrap_or(Value::String(text))
            }
            other => other,
        };
        document.insert(alias.to_string(), value);
    }
    Value::Object(document)
}
