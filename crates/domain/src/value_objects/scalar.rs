//! Scalar attribute values promoted out of record payloads for filtering.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DomainError;

/// Storage kind of a promoted attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    Integer,
    Float,
    Text,
    Bool,
}

impl AttributeKind {
    /// Whether values of this kind compare numerically.
    pub fn is_numeric(&self) -> bool {
        matches!(self, AttributeKind::Integer | AttributeKind::Float)
    }
}

/// A single filterable value: a number, a string or a boolean.
///
/// Deserializes untagged, so `3` is an integer, `0.5` a float, `true` a
/// boolean and anything quoted is text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl ScalarValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Numeric view of the value. Booleans and text are not numbers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScalarValue::Integer(i) => Some(*i as f64),
            ScalarValue::Float(f) => Some(*f),
            ScalarValue::Bool(_) | ScalarValue::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScalarValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Canonical text form, used for exact text comparisons in storage.
    pub fn to_text(&self) -> String {
        match self {
            ScalarValue::Bool(b) => b.to_string(),
            ScalarValue::Integer(i) => i.to_string(),
            ScalarValue::Float(f) => f.to_string(),
            ScalarValue::Text(s) => s.clone(),
        }
    }

    /// Case-folded text form, used for case-insensitive comparisons.
    pub fn folded(&self) -> String {
        fold_case(&self.to_text())
    }

    /// Infer a value from a loosely typed literal (query strings, config).
    ///
    /// `true`/`false` become booleans, integers and decimals become numbers,
    /// everything else stays text.
    pub fn infer(literal: &str) -> Self {
        let trimmed = literal.trim();
        match trimmed {
            "true" => return ScalarValue::Bool(true),
            "false" => return ScalarValue::Bool(false),
            _ => {}
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return ScalarValue::Integer(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            if f.is_finite() {
                return ScalarValue::Float(f);
            }
        }
        ScalarValue::Text(literal.to_string())
    }

    /// Coerce a JSON value into the declared attribute kind.
    ///
    /// Returns `None` when the value is missing, null, or cannot be coerced
    /// (e.g. `"fireball"` as an integer).
    pub fn coerce_json(value: &serde_json::Value, kind: AttributeKind) -> Option<Self> {
        use serde_json::Value;

        match (kind, value) {
            (_, Value::Null) => None,
            (AttributeKind::Integer, Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .map(ScalarValue::Integer),
            (AttributeKind::Integer, Value::String(s)) => {
                s.trim().parse::<i64>().ok().map(ScalarValue::Integer)
            }
            (AttributeKind::Float, Value::Number(n)) => n.as_f64().map(ScalarValue::Float),
            (AttributeKind::Float, Value::String(s)) => parse_fraction(s).map(ScalarValue::Float),
            (AttributeKind::Bool, Value::Bool(b)) => Some(ScalarValue::Bool(*b)),
            (AttributeKind::Bool, Value::String(s)) => parse_bool(s).map(ScalarValue::Bool),
            (AttributeKind::Bool, Value::Number(n)) => n.as_i64().map(|i| ScalarValue::Bool(i != 0)),
            (AttributeKind::Text, Value::String(s)) => Some(ScalarValue::Text(s.clone())),
            (AttributeKind::Text, Value::Number(n)) => Some(ScalarValue::Text(n.to_string())),
            (AttributeKind::Text, Value::Bool(b)) => Some(ScalarValue::Text(b.to_string())),
            _ => None,
        }
    }

    /// Convert a filter literal into the declared kind of the field it targets.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Parse` when the literal cannot represent the kind.
    pub fn conform_to(&self, kind: AttributeKind) -> Result<Self, DomainError> {
        let conformed = match (kind, self) {
            (AttributeKind::Text, other) => Some(ScalarValue::Text(other.to_text())),
            (AttributeKind::Integer, ScalarValue::Integer(_)) => Some(self.clone()),
            (AttributeKind::Integer, ScalarValue::Float(f)) if f.fract() == 0.0 => {
                Some(ScalarValue::Integer(*f as i64))
            }
            (AttributeKind::Float, ScalarValue::Integer(i)) => Some(ScalarValue::Float(*i as f64)),
            (AttributeKind::Float, ScalarValue::Float(_)) => Some(self.clone()),
            (AttributeKind::Bool, ScalarValue::Bool(_)) => Some(self.clone()),
            (kind, ScalarValue::Text(s)) => {
                ScalarValue::coerce_json(&serde_json::Value::String(s.clone()), kind)
            }
            _ => None,
        };
        conformed.ok_or_else(|| {
            DomainError::parse(format!("'{}' is not a valid {:?} value", self, kind))
        })
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

impl From<&str> for ScalarValue {
    fn from(s: &str) -> Self {
        ScalarValue::Text(s.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(s: String) -> Self {
        ScalarValue::Text(s)
    }
}

impl From<i64> for ScalarValue {
    fn from(i: i64) -> Self {
        ScalarValue::Integer(i)
    }
}

impl From<i32> for ScalarValue {
    fn from(i: i32) -> Self {
        ScalarValue::Integer(i64::from(i))
    }
}

impl From<f64> for ScalarValue {
    fn from(f: f64) -> Self {
        ScalarValue::Float(f)
    }
}

impl From<bool> for ScalarValue {
    fn from(b: bool) -> Self {
        ScalarValue::Bool(b)
    }
}

/// Case folding used everywhere a case-insensitive comparison is made.
pub fn fold_case(s: &str) -> String {
    s.to_lowercase()
}

/// Parses decimals and simple fractions such as challenge ratings (`"1/4"`).
fn parse_fraction(s: &str) -> Option<f64> {
    let s = s.trim();
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.trim().parse().ok()?;
        let den: f64 = den.trim().parse().ok()?;
        if den == 0.0 {
            return None;
        }
        return Some(num / den);
    }
    s.parse::<f64>().ok().filter(|f| f.is_finite())
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Some(true),
        "false" | "no" | "n" | "0" | "" => Some(false),
        _ => None,
    }
}
