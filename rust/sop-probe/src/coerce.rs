//! Turns database cells into JSON-safe values.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use rust_decimal::Decimal;
use serde_json::{Number, Value};

/// A single cell as handed over by a driver adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Decimal(Decimal),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Timestamptz(DateTime<FixedOffset>),
    Time(NaiveTime),
    Bytes(Vec<u8>),
    Json(Value),
    /// Vendor type with no closer mapping, already rendered as text.
    Other(String),
}

/// Never fails. Values JSON already represents pass through unchanged.
pub fn coerce(cell: CellValue) -> Value {
    match cell {
        CellValue::Null => Value::Null,
        CellValue::Bool(flag) => Value::Bool(flag),
        CellValue::Int(int) => Value::from(int),
        CellValue::Text(text) => Value::String(text),
        CellValue::Json(json) => json,
        CellValue::Float(float) => float_or_text(float),
        // Nearest float to the decimal's text form.
        CellValue::Decimal(decimal) => {
            let text = decimal.to_string();
            match text.parse::<f64>() {
                Ok(float) => float_or_text(float),
                Err(_) => Value::String(text),
            }
        }
        CellValue::Date(date) => Value::String(date.format("%Y-%m-%d").to_string()),
        CellValue::DateTime(datetime) => Value::String(iso_naive(&datetime)),
        CellValue::Timestamptz(stamp) => Value::String(format!(
            "{}{}",
            iso_naive(&stamp.naive_local()),
            stamp.format("%:z")
        )),
        CellValue::Time(time) => Value::String(format!(
            "{}{}",
            time.format("%H:%M:%S"),
            micros(time.nanosecond())
        )),
        CellValue::Bytes(bytes) => Value::String(hex_upper(&bytes)),
        CellValue::Other(text) => Value::String(text),
    }
}

// NaN and infinities have no JSON form.
fn float_or_text(float: f64) -> Value {
    Number::from_f64(float)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(float.to_string()))
}

fn iso_naive(datetime: &NaiveDateTime) -> String {
    format!(
        "{}{}",
        datetime.format("%Y-%m-%dT%H:%M:%S"),
        micros(datetime.nanosecond())
    )
}

/// Six fractional digits when there is a sub-second part, none otherwise.
fn micros(nanos: u32) -> String {
    match nanos % 1_000_000_000 / 1_000 {
        0 => String::new(),
        micros => format!(".{micros:06}"),
    }
}

fn hex_upper(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).collect()
}
