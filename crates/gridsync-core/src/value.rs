// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Column name -> value for one row.
pub type Fields = BTreeMap<String, CellValue>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum CellValue {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Instant(OffsetDateTime),
    List(Vec<CellValue>),
    Map(BTreeMap<String, CellValue>),
}

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            Self::Float(value) if value.fract() == 0.0 => Some(*value as i64),
            Self::Text(value) => value.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn display(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(value) => value.to_string(),
            Self::Integer(value) => value.to_string(),
            Self::Float(value) => value.to_string(),
            Self::Text(value) => value.clone(),
            Self::Instant(value) => format_instant(*value),
            Self::List(_) | Self::Map(_) => Value::from(self.clone()).to_string(),
        }
    }
}

impl PartialEq for CellValue {
    fn eq(&self, other: &Self) -> bool {
        is_equal(self, other)
    }
}

/// Deep value equality for cell contents.
///
/// Instants compare by the moment they denote (offset is ignored), also
/// against RFC 3339 text since JSON carries them as strings. Lists
/// element-wise in order, maps by key set and per-key value. Integers and
/// floats compare numerically so `1` and `1.0` are the same cell value.
pub fn is_equal(left: &CellValue, right: &CellValue) -> bool {
    match (left, right) {
        (CellValue::Null, CellValue::Null) => true,
        (CellValue::Bool(left), CellValue::Bool(right)) => left == right,
        (CellValue::Integer(left), CellValue::Integer(right)) => left == right,
        (CellValue::Float(left), CellValue::Float(right)) => left == right,
        (CellValue::Integer(int), CellValue::Float(float))
        | (CellValue::Float(float), CellValue::Integer(int)) => (*int as f64) == *float,
        (CellValue::Text(left), CellValue::Text(right)) => left == right,
        (CellValue::Instant(left), CellValue::Instant(right)) => {
            left.unix_timestamp_nanos() == right.unix_timestamp_nanos()
        }
        (CellValue::Instant(instant), CellValue::Text(text))
        | (CellValue::Text(text), CellValue::Instant(instant)) => {
            OffsetDateTime::parse(text.trim(), &Rfc3339).is_ok_and(|parsed| {
                parsed.unix_timestamp_nanos() == instant.unix_timestamp_nanos()
            })
        }
        (CellValue::List(left), CellValue::List(right)) => {
            left.len() == right.len()
                && left
                    .iter()
                    .zip(right)
                    .all(|(left, right)| is_equal(left, right))
        }
        (CellValue::Map(left), CellValue::Map(right)) => {
            left.len() == right.len()
                && left.iter().all(|(key, value)| {
                    right
                        .get(key)
                        .is_some_and(|other| is_equal(value, other))
                })
        }
        _ => false,
    }
}

/// Field names whose values differ between two rows, including fields
/// present on only one side. A missing field counts as null.
pub fn changed_fields(current: &Fields, baseline: &Fields) -> Vec<String> {
    let mut changed: Vec<String> = current
        .iter()
        .filter(|(key, value)| {
            let before = baseline.get(*key).unwrap_or(&CellValue::Null);
            !is_equal(value, before)
        })
        .map(|(key, _)| key.clone())
        .collect();
    for (key, value) in baseline {
        if !current.contains_key(key) && !value.is_null() {
            changed.push(key.clone());
        }
    }
    changed
}

pub fn fields_from_json(value: Value) -> Fields {
    match CellValue::from(value) {
        CellValue::Map(fields) => fields,
        _ => Fields::new(),
    }
}

pub fn fields_to_json(fields: &Fields) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(key, value)| (key.clone(), Value::from(value.clone())))
            .collect(),
    )
}

fn format_instant(value: OffsetDateTime) -> String {
    value
        .format(&Rfc3339)
        .unwrap_or_else(|_| value.unix_timestamp().to_string())
}

impl From<Value> for CellValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(value) => Self::Bool(value),
            Value::Number(number) => match number.as_i64() {
                Some(value) => Self::Integer(value),
                None => number.as_f64().map_or(Self::Null, Self::Float),
            },
            Value::String(value) => Self::Text(value),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Value::Object(entries) => Self::Map(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, Self::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<CellValue> for Value {
    fn from(value: CellValue) -> Self {
        match value {
            CellValue::Null => Value::Null,
            CellValue::Bool(value) => Value::Bool(value),
            CellValue::Integer(value) => Value::Number(value.into()),
            CellValue::Float(value) => Number::from_f64(value).map_or(Value::Null, Value::Number),
            CellValue::Text(value) => Value::String(value),
            CellValue::Instant(value) => Value::String(format_instant(value)),
            CellValue::List(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            CellValue::Map(entries) => Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect::<Map<String, Value>>(),
            ),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<OffsetDateTime> for CellValue {
    fn from(value: OffsetDateTime) -> Self {
        Self::Instant(value)
    }
}
