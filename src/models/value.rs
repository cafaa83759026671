//! Scalar values bound to and decoded from statements.

use crate::error::{DbError, DbResult};
use chrono::NaiveDateTime;

/// Scalar type of a NULL argument.
///
/// PostgreSQL types every parameter, so a NULL bound as text cannot be
/// assigned to an integer or timestamp column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Bool,
    Int,
    Float,
    Text,
    Bytes,
    Timestamp,
}

/// A bindable / decoded column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// NULL of unknown type, as decoded from rows
    Null,
    /// NULL of a known type, as bound from `Option<T>` fields
    NullOf(Kind),
    /// Boolean value
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    Text(String),
    /// Binary data
    Bytes(Vec<u8>),
    /// Date and time without zone
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null | Self::NullOf(_))
    }

    /// Get the type name of this value for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null | Self::NullOf(_) => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Timestamp(_) => "timestamp",
        }
    }
}

/// Types whose `None` binds as a NULL of a known [`Kind`].
pub trait HasKind {
    const KIND: Kind;
}

macro_rules! has_kind {
    ($kind:ident: $($t:ty),+) => {
        $(
            impl HasKind for $t {
                const KIND: Kind = Kind::$kind;
            }
        )+
    };
}

has_kind!(Bool: bool);
has_kind!(Int: i8, i16, i32, i64, u8, u16, u32);
has_kind!(Float: f32, f64);
has_kind!(Text: String, &str);
has_kind!(Bytes: Vec<u8>);
has_kind!(Timestamp: NaiveDateTime);

macro_rules! value_from_int {
    ($($t:ty),+) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Int(i64::from(v))
                }
            }
        )+
    };
}

value_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v)
    }
}

impl<T: Into<Value> + HasKind> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::NullOf(T::KIND))
    }
}

/// Conversion out of a decoded [`Value`].
///
/// NULL converts to the type's zero value, matching how rows are scanned into
/// plain records; use `Option<T>` to observe NULL explicitly.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, String>;
}

fn mismatch(expected: &str, value: &Value) -> String {
    format!("expected {}, found {}", expected, value.type_name())
}

macro_rules! from_value_int {
    ($($t:ty),+) => {
        $(
            impl FromValue for $t {
                fn from_value(value: &Value) -> Result<Self, String> {
                    match value {
                        Value::Null | Value::NullOf(_) => Ok(0),
                        Value::Int(v) => <$t>::try_from(*v).map_err(|e| e.to_string()),
                        Value::Bool(v) => Ok(<$t>::from(*v)),
                        Value::Text(s) => s.trim().parse::<$t>().map_err(|e| e.to_string()),
                        other => Err(mismatch(stringify!($t), other)),
                    }
                }
            }
        )+
    };
}

from_value_int!(i8, i16, i32, i64, u8, u16, u32, u64);

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Null | Value::NullOf(_) => Ok(false),
            Value::Bool(v) => Ok(*v),
            // MySQL BOOLEAN is TINYINT(1)
            Value::Int(v) => Ok(*v != 0),
            other => Err(mismatch("bool", other)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Null | Value::NullOf(_) => Ok(0.0),
            Value::Float(v) => Ok(*v),
            Value::Int(v) => Ok(*v as f64),
            Value::Text(s) => s.trim().parse().map_err(|e: std::num::ParseFloatError| e.to_string()),
            other => Err(mismatch("f64", other)),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: &Value) -> Result<Self, String> {
        f64::from_value(value).map(|v| v as f32)
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Null | Value::NullOf(_) => Ok(String::new()),
            Value::Text(s) => Ok(s.clone()),
            Value::Bytes(b) => String::from_utf8(b.clone()).map_err(|e| e.to_string()),
            Value::Int(v) => Ok(v.to_string()),
            Value::Float(v) => Ok(v.to_string()),
            Value::Bool(v) => Ok(v.to_string()),
            Value::Timestamp(t) => Ok(t.to_string()),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Null | Value::NullOf(_) => Ok(Vec::new()),
            Value::Bytes(b) => Ok(b.clone()),
            Value::Text(s) => Ok(s.clone().into_bytes()),
            other => Err(mismatch("bytes", other)),
        }
    }
}

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

impl FromValue for NaiveDateTime {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Null | Value::NullOf(_) => Ok(NaiveDateTime::default()),
            Value::Timestamp(t) => Ok(*t),
            // SQLite keeps datetimes as text
            Value::Text(s) => TIMESTAMP_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .ok_or_else(|| format!("invalid timestamp '{}'", s)),
            other => Err(mismatch("timestamp", other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Null | Value::NullOf(_) => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, String> {
        Ok(value.clone())
    }
}

/// Convert a value for `column`, mapping failures to [`DbError::Decode`].
pub fn convert<T: FromValue>(column: &str, value: &Value) -> DbResult<T> {
    T::from_value(value).map_err(|message| DbError::decode(column, message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_from_option_none_is_typed_null() {
        assert_eq!(Value::from(None::<i64>), Value::NullOf(Kind::Int));
        assert_eq!(Value::from(None::<i32>), Value::NullOf(Kind::Int));
        assert_eq!(Value::from(None::<bool>), Value::NullOf(Kind::Bool));
        assert_eq!(
            Value::from(None::<NaiveDateTime>),
            Value::NullOf(Kind::Timestamp)
        );
        assert!(Value::from(None::<String>).is_null());
        assert_eq!(Value::from(Some("a")), Value::Text("a".to_string()));
    }

    #[test]
    fn test_typed_null_decodes_like_null() {
        let null = Value::NullOf(Kind::Int);
        assert_eq!(Option::<i64>::from_value(&null), Ok(None));
        assert_eq!(i64::from_value(&null), Ok(0));
        assert_eq!(String::from_value(&null), Ok(String::new()));
        assert_eq!(null.type_name(), "null");
    }

    #[test]
    fn test_null_converts_to_zero_values() {
        assert_eq!(i64::from_value(&Value::Null), Ok(0));
        assert_eq!(String::from_value(&Value::Null), Ok(String::new()));
        assert_eq!(Option::<i64>::from_value(&Value::Null), Ok(None));
    }

    #[test]
    fn test_int_narrowing_checks_range() {
        assert_eq!(i32::from_value(&Value::Int(7)), Ok(7));
        assert!(i8::from_value(&Value::Int(1000)).is_err());
    }

    #[test]
    fn test_tinyint_as_bool() {
        assert_eq!(bool::from_value(&Value::Int(1)), Ok(true));
        assert_eq!(bool::from_value(&Value::Int(0)), Ok(false));
    }

    #[test]
    fn test_timestamp_from_sqlite_text() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap();
        let parsed = NaiveDateTime::from_value(&Value::Text("2024-03-01 12:30:00".into()));
        assert_eq!(parsed, Ok(expected));
    }

    #[test]
    fn test_convert_reports_column() {
        let err = convert::<i64>("age", &Value::Bytes(vec![1])).unwrap_err();
        assert!(err.to_string().contains("age"));
    }
}
