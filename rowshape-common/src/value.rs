use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::de::Error as _;
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValueError;

/// A single flat row, keyed by field name. Absent keys stand for undefined fields.
pub type Record = IndexMap<String, Value>;

/// An ordered sequence of records.
pub type Dataset = Vec<Record>;

/// Free-form side outputs of a pipeline (e.g. a computed axis extent).
pub type Options = IndexMap<String, Value>;

/// Label used for pivot columns whose source value is null, absent or empty.
pub const EMPTY_VALUE_LABEL: &str = "-";

/// The value stored in a record field
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Date(DateTime<Utc>),
    Array(Vec<Value>),
}

impl Value {
    /// Coerce to a finite number.
    ///
    /// Numeric strings are parsed, dates map to epoch milliseconds. Everything
    /// else, including NaN and infinities, yields `None`.
    pub fn as_number(&self) -> Option<f64> {
        let n = match self {
            Value::Number(n) => *n,
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return None;
                }
                trimmed.parse::<f64>().ok()?
            }
            Value::Date(d) => d.timestamp_millis() as f64,
            Value::Null | Value::Bool(_) | Value::Array(_) => return None,
        };
        n.is_finite().then_some(n)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(values) => Some(values.as_slice()),
            _ => None,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    /// String coercion used to build categorical group keys
    pub fn key_string(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Date(d) => d.to_rfc3339_opts(SecondsFormat::Millis, true),
            Value::Array(values) => values
                .iter()
                .map(|v| match v {
                    Value::Null => String::new(),
                    other => other.key_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    /// Convert a JSON value into a record value. `field` is only used for error reporting.
    pub fn from_json(field: &str, json: serde_json::Value) -> Result<Self, ValueError> {
        Ok(match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => n.as_f64().map_or(Value::Null, Value::Number),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(values) => Value::Array(
                values
                    .into_iter()
                    .map(|v| Value::from_json(field, v))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            serde_json::Value::Object(_) => {
                return Err(ValueError::UnsupportedValue {
                    field: field.to_string(),
                    kind: "object",
                })
            }
        })
    }
}

/// Finite numeric value of an optional field
pub fn number_of(value: Option<&Value>) -> Option<f64> {
    value.and_then(Value::as_number)
}

/// Categorical key of an optional field. Absent fields key as `"undefined"`.
pub fn key_of(value: Option<&Value>) -> String {
    value.map_or_else(|| "undefined".to_string(), Value::key_string)
}

/// Map null, absent and empty-string values to [`EMPTY_VALUE_LABEL`]
pub fn normalize_empty_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => EMPTY_VALUE_LABEL.to_string(),
        Some(Value::String(s)) if s.is_empty() => EMPTY_VALUE_LABEL.to_string(),
        Some(v) => v.key_string(),
    }
}

/// Largest integer an f64 holds exactly
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Integral numbers are written without a fractional part, like JSON producers expect
fn as_safe_integer(n: f64) -> Option<i64> {
    (n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER).then_some(n as i64)
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let label = if n > 0.0 { "Infinity" } else { "-Infinity" };
        label.to_string()
    } else if n == 0.0 {
        // Also covers -0.0
        "0".to_string()
    } else {
        n.to_string()
    }
}

/// Build a dataset from a JSON array of flat objects
pub fn dataset_from_json(json: serde_json::Value) -> Result<Dataset, ValueError> {
    let rows = match json {
        serde_json::Value::Array(rows) => rows,
        serde_json::Value::Object(_) => return Err(ValueError::NotAnArray("an object")),
        serde_json::Value::Null => return Err(ValueError::NotAnArray("null")),
        _ => return Err(ValueError::NotAnArray("a scalar")),
    };

    rows.into_iter()
        .enumerate()
        .map(|(i, row)| match row {
            serde_json::Value::Object(fields) => fields
                .into_iter()
                .map(|(k, v)| {
                    let value = Value::from_json(&k, v)?;
                    Ok((k, value))
                })
                .collect::<Result<Record, ValueError>>(),
            _ => Err(ValueError::NotAnObject(i)),
        })
        .collect()
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => match as_safe_integer(*n) {
                Some(i) => serializer.serialize_i64(i),
                None if n.is_finite() => serializer.serialize_f64(*n),
                None => serializer.serialize_none(),
            },
            Value::String(s) => serializer.serialize_str(s),
            Value::Date(d) => {
                serializer.serialize_str(&d.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            Value::Array(values) => {
                let mut seq = serializer.serialize_seq(Some(values.len()))?;
                for v in values {
                    seq.serialize_element(v)?;
                }
                seq.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        Value::from_json("<value>", json).map_err(D::Error::custom)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Number(value as f64)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(value as f64)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Number(value as f64)
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Number(value as f64)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Date(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Value::Array(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Build a [`Record`] from `key => value` pairs.
///
/// ```
/// use rowshape_common::record;
/// let row = record! { "product" => "A", "sales" => 100 };
/// assert_eq!(row["sales"].as_number(), Some(100.0));
/// ```
#[macro_export]
macro_rules! record {
    () => {
        $crate::value::Record::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut record = $crate::value::Record::new();
        $(
            record.insert(::std::string::String::from($key), $crate::value::Value::from($value));
        )+
        record
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    #[rstest]
    #[case(Value::from(12.5), Some(12.5))]
    #[case(Value::from("42"), Some(42.0))]
    #[case(Value::from(" 7 "), Some(7.0))]
    #[case(Value::from(""), None)]
    #[case(Value::from("invalid"), None)]
    #[case(Value::from("NaN"), None)]
    #[case(Value::Number(f64::INFINITY), None)]
    #[case(Value::Null, None)]
    #[case(Value::Bool(true), None)]
    #[case(Value::from(vec![1, 2]), None)]
    fn test_as_number(#[case] value: Value, #[case] expected: Option<f64>) {
        assert_eq!(value.as_number(), expected);
    }

    #[test]
    fn test_date_as_number_is_epoch_millis() {
        let d = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(Value::Date(d).as_number(), Some(1_704_067_200_000.0));
    }

    #[rstest]
    #[case(Value::from(100), "100")]
    #[case(Value::from(1.5), "1.5")]
    #[case(Value::Number(-0.0), "0")]
    #[case(Value::from("A"), "A")]
    #[case(Value::Null, "null")]
    #[case(Value::Bool(false), "false")]
    #[case(Value::from(vec![Value::from(1), Value::Null, Value::from("b")]), "1,,b")]
    fn test_key_string(#[case] value: Value, #[case] expected: &str) {
        assert_eq!(value.key_string(), expected);
    }

    #[test]
    fn test_key_of_absent_field() {
        assert_eq!(key_of(None), "undefined");
        assert_eq!(key_of(Some(&Value::Null)), "null");
    }

    #[test]
    fn test_normalize_empty_value() {
        assert_eq!(normalize_empty_value(None), "-");
        assert_eq!(normalize_empty_value(Some(&Value::Null)), "-");
        assert_eq!(normalize_empty_value(Some(&Value::from(""))), "-");
        assert_eq!(normalize_empty_value(Some(&Value::from(" "))), " ");
        assert_eq!(normalize_empty_value(Some(&Value::from("Electronics"))), "Electronics");
        assert_eq!(normalize_empty_value(Some(&Value::from(3))), "3");
    }

    #[test]
    fn test_dataset_from_json() {
        let json = serde_json::json!([
            {"key": "alpha", "foo": [1, 2], "bar": null},
            {"key": "beta", "flag": true}
        ]);
        let data = dataset_from_json(json).unwrap();
        assert_eq!(
            data,
            vec![
                record! {"key" => "alpha", "foo" => vec![1, 2], "bar" => Value::Null},
                record! {"key" => "beta", "flag" => true},
            ]
        );
    }

    #[test]
    fn test_dataset_from_json_rejects_nested_objects() {
        let json = serde_json::json!([{"key": {"nested": 1}}]);
        assert_eq!(
            dataset_from_json(json),
            Err(ValueError::UnsupportedValue {
                field: "key".to_string(),
                kind: "object"
            })
        );
        assert_eq!(
            dataset_from_json(serde_json::json!([1])),
            Err(ValueError::NotAnObject(0))
        );
        assert_eq!(
            dataset_from_json(serde_json::json!({"a": 1})),
            Err(ValueError::NotAnArray("an object"))
        );
    }

    #[test]
    fn test_serialize_integers() {
        let json = |v: Value| serde_json::to_value(v).unwrap();
        assert_eq!(json(Value::from(3)), serde_json::json!(3));
        assert_eq!(json(Value::from(-0.0)), serde_json::json!(0));
        assert_eq!(json(Value::from(2.5)), serde_json::json!(2.5));
        assert_eq!(json(Value::from(1e300)), serde_json::json!(1e300));
        assert_eq!(json(Value::Number(f64::INFINITY)), serde_json::Value::Null);
    }

    #[test]
    fn test_serialize_dates_with_millis() {
        let d = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let row = record! {"timestamp" => d, "sales" => 250, "ratio" => 0.5, "missing" => f64::NAN};
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "timestamp": "2024-01-02T03:04:05.000Z",
                "sales": 250,
                "ratio": 0.5,
                "missing": null
            })
        );
    }

    #[test]
    fn test_deserialize_record() {
        let row: Record = serde_json::from_str(r#"{"a": 1, "b": "x", "c": [true, null]}"#).unwrap();
        assert_eq!(
            row,
            record! {"a" => 1, "b" => "x", "c" => vec![Value::Bool(true), Value::Null]}
        );
        assert!(serde_json::from_str::<Record>(r#"{"a": {"b": 1}}"#).is_err());
    }
}
