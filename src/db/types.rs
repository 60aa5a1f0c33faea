//! Value coercion between application values and wire values.
//!
//! Outbound coercion ([`to_wire`]) runs on every bound value during
//! translation. Inbound coercion ([`from_wire`], [`normalize_rows`]) runs on
//! every returned row and is driven by the column type code. Neither
//! direction fails: anything that cannot be converted is passed through.

use crate::models::{
    ColumnMetadata, RawQueryResult, Record, TIMESTAMP_FORMAT, Value, WireValue, type_codes,
};
use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;

/// Bookkeeping columns removed from every returned row.
pub const BOOKKEEPING_COLUMNS: &[&str] = &["ss_time_stamp", "time_stamp"];

/// Columns whose text is always treated as a JSON document.
const JSON_COLUMNS: &[&str] = &["error_data"];

/// Alternate layouts accepted when reading timestamps.
const TIMESTAMP_FALLBACK_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S"];

// =============================================================================
// Outbound
// =============================================================================

/// Convert an application value into the form sent to the connector.
pub fn to_wire(value: &Value) -> WireValue {
    match value {
        Value::Null => WireValue::Null,
        Value::Bool(b) => WireValue::Int(i64::from(*b)),
        Value::Int(v) => WireValue::Int(*v),
        Value::Float(v) => WireValue::Float(*v),
        Value::Text(s) => WireValue::Text(s.clone()),
        Value::DateTime(dt) => WireValue::Text(dt.format(TIMESTAMP_FORMAT).to_string()),
        Value::Bytes(b) => WireValue::Bytes(b.clone()),
        array @ Value::Array(_) => WireValue::Text(array.to_plain_text()),
        Value::Json(json) => WireValue::Text(json.to_string()),
    }
}

// =============================================================================
// Inbound
// =============================================================================

/// Convert a wire value read from `column` into an application value.
pub fn from_wire(value: WireValue, column: &ColumnMetadata) -> Value {
    match (column.type_code, value) {
        (_, WireValue::Null) => Value::Null,
        (type_codes::TIMESTAMP, WireValue::Text(s)) => parse_timestamp(&s)
            .map(Value::DateTime)
            .unwrap_or(Value::Text(s)),
        (type_codes::BIT, WireValue::Text(s)) => Value::Bool(s.trim() == "1"),
        (type_codes::BIT, WireValue::Int(n)) => Value::Bool(n == 1),
        (type_codes::BIT, _) => Value::Bool(false),
        (type_codes::VARBINARY | type_codes::LONG_VARBINARY, WireValue::Text(s)) => {
            Value::Bytes(s.into_bytes())
        }
        (_, WireValue::Text(s)) => decode_text(s, &column.name),
        (_, WireValue::Int(n)) => Value::Int(n),
        (_, WireValue::Float(f)) => Value::Float(f),
        (_, WireValue::Bytes(b)) => Value::Bytes(b),
    }
}

/// Coerce every row of a raw result and drop bookkeeping columns.
pub fn normalize_rows(result: RawQueryResult) -> Vec<Record> {
    let RawQueryResult { columns, rows } = result;

    rows.into_iter()
        .map(|row| {
            columns
                .iter()
                .zip(row)
                .filter(|(column, _)| !is_bookkeeping(&column.name))
                .map(|(column, value)| (column.name.clone(), from_wire(value, column)))
                .collect()
        })
        .collect()
}

fn is_bookkeeping(name: &str) -> bool {
    BOOKKEEPING_COLUMNS
        .iter()
        .any(|c| c.eq_ignore_ascii_case(name))
}

/// Fractional seconds are discarded before parsing.
fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let whole = text.trim().split('.').next().unwrap_or_default();
    std::iter::once(TIMESTAMP_FORMAT)
        .chain(TIMESTAMP_FALLBACK_FORMATS.iter().copied())
        .find_map(|fmt| NaiveDateTime::parse_from_str(whole, fmt).ok())
}

/// JSON-shaped text becomes structured; parse failures keep the raw text.
fn decode_text(text: String, column: &str) -> Value {
    let trimmed = text.trim();
    let json_shaped = (trimmed.starts_with('[') && trimmed.ends_with(']'))
        || (trimmed.starts_with('{') && trimmed.ends_with('}'));

    if json_shaped || JSON_COLUMNS.contains(&column) {
        if let Ok(json) = serde_json::from_str::<JsonValue>(trimmed) {
            return Value::Json(json);
        }
    }
    Value::Text(text)
}

// =============================================================================
// Type Classification
// =============================================================================

/// Classify a declared column type name into a wire type code.
pub fn type_code_for(type_name: &str) -> i16 {
    let lower = type_name.to_lowercase();

    if lower.contains("timestamp") || lower.contains("datetime") {
        return type_codes::TIMESTAMP;
    }
    if lower == "date" {
        return type_codes::DATE;
    }
    if lower == "bit" || lower == "bool" || lower == "boolean" {
        return type_codes::BIT;
    }
    if lower.contains("blob") || lower.contains("binary") || lower == "bytea" {
        return type_codes::VARBINARY;
    }
    if lower.contains("int") {
        return if lower.contains("big") {
            type_codes::BIGINT
        } else {
            type_codes::INTEGER
        };
    }
    if lower.contains("real")
        || lower.contains("float")
        || lower.contains("double")
        || lower.contains("numeric")
        || lower.contains("decimal")
    {
        return type_codes::DOUBLE;
    }
    if lower.contains("char") || lower.contains("text") || lower.contains("clob") {
        return type_codes::VARCHAR;
    }
    type_codes::UNKNOWN
}
