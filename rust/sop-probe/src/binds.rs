//! Free-form bind parameter text into typed values.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

pub const MAX_ROWS_BIND: &str = "max_rows";

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum BindValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<&str> for BindValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<i64> for BindValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

/// Named binds in first-insertion order. Re-inserting a key replaces the
/// value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindMap {
    entries: Vec<(String, BindValue)>,
}

impl BindMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<BindValue>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<BindValue> {
        let idx = self.entries.iter().position(|(key, _)| key == name)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn get(&self, name: &str) -> Option<&BindValue> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BindValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Copy without the row cap, which is never a caller bind.
    pub fn without_max_rows(&self) -> Self {
        let mut binds = self.clone();
        binds.remove(MAX_ROWS_BIND);
        binds
    }
}

impl<K: Into<String>, V: Into<BindValue>> FromIterator<(K, V)> for BindMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut binds = BindMap::new();
        for (key, value) in iter {
            binds.insert(key, value);
        }
        binds
    }
}

impl Serialize for BindMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Parses a JSON object or a `k=v` list separated by `,`, `;` or newlines.
///
/// Never fails: unusable input yields an empty map, and tokens without `=`
/// or with an empty key (`=5`) are skipped. `a=` keeps an empty string value.
pub fn parse_bind_params(text: &str) -> BindMap {
    let text = text.trim();
    if text.is_empty() {
        return BindMap::new();
    }

    if text.starts_with('{') && text.ends_with('}') {
        if let Ok(value) = serde_json::from_str::<Value>(text) {
            return match value {
                Value::Object(object) => object
                    .into_iter()
                    .map(|(key, value)| (key, from_json(value)))
                    .collect(),
                _ => BindMap::new(),
            };
        }
    }

    if text.starts_with('[') || text.starts_with('"') {
        if let Ok(value) = serde_json::from_str::<Value>(text) {
            if !value.is_object() {
                return BindMap::new();
            }
        }
    }

    let mut binds = BindMap::new();
    for token in text.split([',', ';', '\n']) {
        let Some((key, value)) = token.split_once('=') else {
            continue;
        };
        let key = strip_quotes(key);
        if key.is_empty() {
            continue;
        }
        binds.insert(key, coerce_token(strip_quotes(value)));
    }
    binds
}

fn strip_quotes(raw: &str) -> &str {
    raw.trim().trim_matches('"').trim_matches('\'')
}

fn coerce_token(value: &str) -> BindValue {
    if is_integer(value) {
        if let Ok(parsed) = value.parse::<i64>() {
            return BindValue::Int(parsed);
        }
    }

    if is_decimal(value) {
        if let Ok(parsed) = value.parse::<f64>() {
            return BindValue::Float(parsed);
        }
    }

    match value.to_ascii_lowercase().as_str() {
        "true" => BindValue::Bool(true),
        "false" => BindValue::Bool(false),
        "null" | "none" => BindValue::Null,
        _ => BindValue::Text(value.to_string()),
    }
}

fn is_integer(value: &str) -> bool {
    let digits = value.strip_prefix('-').unwrap_or(value);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

// `12.`, `12.5` and `-0.25` qualify; `.5` does not.
fn is_decimal(value: &str) -> bool {
    let unsigned = value.strip_prefix('-').unwrap_or(value);
    match unsigned.split_once('.') {
        Some((whole, fraction)) => {
            !whole.is_empty()
                && whole.bytes().all(|b| b.is_ascii_digit())
                && fraction.bytes().all(|b| b.is_ascii_digit())
        }
        None => false,
    }
}

fn from_json(value: Value) -> BindValue {
    match value {
        Value::Null => BindValue::Null,
        Value::Bool(flag) => BindValue::Bool(flag),
        Value::Number(number) => match number.as_i64() {
            Some(int) => BindValue::Int(int),
            None => BindValue::Float(number.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(text) => BindValue::Text(text),
        nested @ (Value::Array(_) | Value::Object(_)) => BindValue::Text(nested.to_string()),
    }
}
