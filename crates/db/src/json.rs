//! Conversion between rows and the JSON objects Postgres produces with
//! `row_to_json` and consumes with `json_populate_record`.
//!
//! JSON carries no column types, so decoding uses the table declaration:
//! date columns parse as timestamps and GUID keys as UUIDs.

use chrono::{DateTime, NaiveDateTime};
use serde_json::{Map, Number, Value};
use tenvault_core::row::DataRowInfo;
use tenvault_core::schema::{IdType, TableInfo};
use tenvault_core::value::DATETIME_KEY_FORMAT;
use tenvault_core::ColumnValue;
use uuid::Uuid;

const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
/// `timestamptz` forms; `%#z` takes `+hh`, `+hhmm` and `+hh:mm`.
const ZONED_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f%#z", "%Y-%m-%d %H:%M:%S%.f%#z"];

pub fn encode_row(row: &DataRowInfo) -> Value {
    let map: Map<String, Value> = row
        .iter()
        .map(|(column, value)| (column.to_string(), encode_value(value)))
        .collect();
    Value::Object(map)
}

pub fn encode_value(value: &ColumnValue) -> Value {
    match value {
        ColumnValue::Null => Value::Null,
        ColumnValue::Bool(b) => Value::Bool(*b),
        ColumnValue::Int(i) => Value::Number((*i).into()),
        ColumnValue::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
        ColumnValue::Text(s) => Value::String(s.clone()),
        ColumnValue::Guid(g) => Value::String(g.hyphenated().to_string()),
        ColumnValue::DateTime(dt) => Value::String(dt.format(DATETIME_KEY_FORMAT).to_string()),
        ColumnValue::Binary(bytes) => {
            let mut hex = String::with_capacity(2 + bytes.len() * 2);
            hex.push_str("\\x");
            for b in bytes {
                hex.push_str(&format!("{b:02x}"));
            }
            Value::String(hex)
        }
    }
}

pub fn decode_row(table: &TableInfo, object: Map<String, Value>) -> DataRowInfo {
    object
        .into_iter()
        .map(|(column, value)| {
            let decoded = decode_value(table, &column, value);
            (column, decoded)
        })
        .collect()
}

fn decode_value(table: &TableInfo, column: &str, value: Value) -> ColumnValue {
    match value {
        Value::Null => ColumnValue::Null,
        Value::Bool(b) => ColumnValue::Bool(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => ColumnValue::Int(i),
            None => ColumnValue::Float(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => {
            if table.date_column(column).is_some() {
                if let Some(dt) = parse_timestamp(&s) {
                    return ColumnValue::DateTime(dt);
                }
            }
            if table.is_id_column(column) && table.id_type == IdType::Guid {
                if let Ok(g) = Uuid::parse_str(&s) {
                    return ColumnValue::Guid(g);
                }
            }
            ColumnValue::Text(s)
        }
        nested @ (Value::Array(_) | Value::Object(_)) => ColumnValue::Text(nested.to_string()),
    }
}

/// Parse the timestamp forms Postgres emits. Values carrying a UTC offset
/// are converted to UTC.
fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .or_else(|| {
            ZONED_FORMATS
                .iter()
                .find_map(|f| DateTime::parse_from_str(s, f).ok())
        })
        .map(|dt| dt.naive_utc())
        .or_else(|| {
            TIMESTAMP_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        })
}
