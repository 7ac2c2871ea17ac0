use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Wire format for datetimes inside JSON payloads
const JSON_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Display format for datetimes, matching how the master workbook shows them
const DISPLAY_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single scalar cell of a master or log table
///
/// Empty text is always represented as [`Value::Empty`], so a blank input
/// and a missing cell compare equal.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Empty,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    DateTime(NaiveDateTime),
}

impl Value {
    /// Build a text value, mapping the empty string to [`Value::Empty`]
    pub fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.is_empty() {
            Value::Empty
        } else {
            Value::Text(s)
        }
    }

    /// Build a numeric value, storing integral floats as integers
    ///
    /// Workbooks keep every number as a float; integral ones are shown
    /// without a decimal point by spreadsheet tools, so they load as `Int`.
    pub fn number(f: f64) -> Self {
        if f.is_finite() && f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 {
            Value::Int(f as i64)
        } else {
            Value::Float(f)
        }
    }

    /// Infer a value from a raw text field (CSV input)
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Value::Empty;
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return Value::Int(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            if f.is_finite() {
                return Value::Float(f);
            }
        }
        Value::Text(raw.to_string())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Empty, Value::Empty) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Float(_), _) | (_, Value::Float(_)) => {
                match (self.as_f64(), other.as_f64()) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                }
            }
            _ => false,
        }
    }
}

/// String form used for key matching, picker options and display
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => Ok(()),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) if x.is_finite() && x.fract() == 0.0 => write!(f, "{:.1}", x),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => f.write_str(s),
            Value::DateTime(dt) => write!(f, "{}", dt.format(DISPLAY_DATETIME_FORMAT)),
        }
    }
}

impl From<&calamine::Data> for Value {
    fn from(cell: &calamine::Data) -> Self {
        use calamine::Data;

        match cell {
            Data::Int(i) => Value::Int(*i),
            Data::Float(f) => Value::number(*f),
            Data::String(s) => Value::text(s.as_str()),
            Data::Bool(b) => Value::Bool(*b),
            Data::DateTime(dt) => match dt.as_datetime() {
                Some(naive) => Value::DateTime(naive),
                None => Value::number(dt.as_f64()),
            },
            Data::DateTimeIso(s) | Data::DurationIso(s) => Value::text(s.as_str()),
            // Formula errors (#N/A, #REF!) carry no usable value
            Data::Error(_) | Data::Empty => Value::Empty,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::text(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Empty => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Text(s) => serializer.serialize_str(s),
            Value::DateTime(dt) => {
                serializer.serialize_str(&dt.format(JSON_DATETIME_FORMAT).to_string())
            }
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<RawValue>::deserialize(deserializer)?;
        Ok(match raw {
            None => Value::Empty,
            Some(RawValue::Bool(b)) => Value::Bool(b),
            Some(RawValue::Int(i)) => Value::Int(i),
            Some(RawValue::Float(f)) => Value::Float(f),
            Some(RawValue::Text(s)) => {
                match NaiveDateTime::parse_from_str(&s, JSON_DATETIME_FORMAT) {
                    Ok(dt) => Value::DateTime(dt),
                    Err(_) => Value::text(s),
                }
            }
        })
    }
}
