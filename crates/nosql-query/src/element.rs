//! Backend-agnostic value model
//!
//! Every value an adapter hands to the core is classified exactly once into a
//! [`DatabaseElement`]. Classification is total: a native value the adapter
//! does not recognise degrades to [`ObjectValue::Opaque`] instead of failing.

use crate::wrapper::{JsonObjectWrapper, Record};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Numeric primitive, kept as the backend reported it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(&self) -> f64 {
        match self {
            Number::Int(i) => *i as f64,
            Number::Float(f) => *f,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{}", i),
            Number::Float(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Number::Int(value)
    }
}

impl From<i32> for Number {
    fn from(value: i32) -> Self {
        Number::Int(value as i64)
    }
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Number::Float(value)
    }
}

/// Kind of a primitive value
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    Boolean,
    Number,
    Date,
    String,
    Null,
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimitiveKind::Boolean => write!(f, "boolean"),
            PrimitiveKind::Number => write!(f, "number"),
            PrimitiveKind::Date => write!(f, "date"),
            PrimitiveKind::String => write!(f, "string"),
            PrimitiveKind::Null => write!(f, "null"),
        }
    }
}

/// A primitive value. The variant is its kind.
#[derive(Debug, Clone, PartialEq)]
pub enum DatabasePrimitive {
    Boolean(bool),
    Number(Number),
    Date(DateTime<Utc>),
    String(String),
    Null,
}

impl DatabasePrimitive {
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            DatabasePrimitive::Boolean(_) => PrimitiveKind::Boolean,
            DatabasePrimitive::Number(_) => PrimitiveKind::Number,
            DatabasePrimitive::Date(_) => PrimitiveKind::Date,
            DatabasePrimitive::String(_) => PrimitiveKind::String,
            DatabasePrimitive::Null => PrimitiveKind::Null,
        }
    }
}

impl fmt::Display for DatabasePrimitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabasePrimitive::Boolean(b) => write!(f, "{}", b),
            DatabasePrimitive::Number(n) => write!(f, "{}", n),
            DatabasePrimitive::Date(d) => {
                write!(f, "{}", d.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            DatabasePrimitive::String(s) => write!(f, "{}", s),
            DatabasePrimitive::Null => write!(f, "null"),
        }
    }
}

/// A native value of a kind the adapter has no dedicated mapping for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpaqueValue {
    /// Backend type name (e.g. "objectId", "binary")
    pub type_name: String,
    /// Default rendering of the value
    pub text: String,
}

impl OpaqueValue {
    pub fn new(type_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            text: text.into(),
        }
    }
}

/// Non-primitive, non-array value
#[derive(Debug, Clone)]
pub enum ObjectValue {
    /// Nested record the tree builder expands
    Record(Record),
    /// Classification fallback, rendered as text and never expanded
    Opaque(OpaqueValue),
}

/// Normalized value of one field or array element
#[derive(Debug, Clone)]
pub enum DatabaseElement {
    Primitive(DatabasePrimitive),
    Object(ObjectValue),
    Array(Vec<DatabaseElement>),
}

impl DatabaseElement {
    pub fn null() -> Self {
        DatabaseElement::Primitive(DatabasePrimitive::Null)
    }

    pub fn boolean(value: bool) -> Self {
        DatabaseElement::Primitive(DatabasePrimitive::Boolean(value))
    }

    pub fn number(value: impl Into<Number>) -> Self {
        DatabaseElement::Primitive(DatabasePrimitive::Number(value.into()))
    }

    pub fn string(value: impl Into<String>) -> Self {
        DatabaseElement::Primitive(DatabasePrimitive::String(value.into()))
    }

    pub fn date(value: DateTime<Utc>) -> Self {
        DatabaseElement::Primitive(DatabasePrimitive::Date(value))
    }

    pub fn record(record: Record) -> Self {
        DatabaseElement::Object(ObjectValue::Record(record))
    }

    pub fn opaque(type_name: impl Into<String>, text: impl Into<String>) -> Self {
        DatabaseElement::Object(ObjectValue::Opaque(OpaqueValue::new(type_name, text)))
    }

    pub fn as_primitive(&self) -> Option<&DatabasePrimitive> {
        match self {
            DatabaseElement::Primitive(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            DatabaseElement::Object(ObjectValue::Record(r)) => Some(r),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[DatabaseElement]> {
        match self {
            DatabaseElement::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Whether the tree builder has children to expand for this value
    pub fn is_composite(&self) -> bool {
        matches!(
            self,
            DatabaseElement::Array(_) | DatabaseElement::Object(ObjectValue::Record(_))
        )
    }

    /// Declared type name, used for icons and debugging
    pub fn type_name(&self) -> String {
        match self {
            DatabaseElement::Primitive(p) => p.kind().to_string(),
            DatabaseElement::Object(ObjectValue::Record(_)) => "object".to_string(),
            DatabaseElement::Object(ObjectValue::Opaque(o)) => o.type_name.clone(),
            DatabaseElement::Array(_) => "array".to_string(),
        }
    }

    /// Convert back to JSON for display and for document round trips
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;

        match self {
            DatabaseElement::Primitive(p) => match p {
                DatabasePrimitive::Boolean(b) => Value::Bool(*b),
                DatabasePrimitive::Number(Number::Int(i)) => Value::from(*i),
                DatabasePrimitive::Number(Number::Float(f)) => serde_json::Number::from_f64(*f)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
                DatabasePrimitive::Date(d) => {
                    Value::String(d.to_rfc3339_opts(SecondsFormat::Millis, true))
                }
                DatabasePrimitive::String(s) => Value::String(s.clone()),
                DatabasePrimitive::Null => Value::Null,
            },
            DatabaseElement::Object(ObjectValue::Record(record)) => {
                let mut map = serde_json::Map::new();
                for name in record.names() {
                    let value = record
                        .get(&name)
                        .map(|v| v.to_json())
                        .unwrap_or(Value::Null);
                    map.insert(name, value);
                }
                Value::Object(map)
            }
            DatabaseElement::Object(ObjectValue::Opaque(o)) => Value::String(o.text.clone()),
            DatabaseElement::Array(items) => {
                Value::Array(items.iter().map(|v| v.to_json()).collect())
            }
        }
    }
}

/// Classify a JSON value.
///
/// JSON carries no date type, so strings stay strings.
pub fn classify_json(value: &serde_json::Value) -> DatabaseElement {
    use serde_json::Value;

    match value {
        Value::Null => DatabaseElement::null(),
        Value::Bool(b) => DatabaseElement::boolean(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                DatabaseElement::number(i)
            } else if let (true, Some(f)) = (n.is_f64(), n.as_f64()) {
                DatabaseElement::number(f)
            } else {
                // u64 above i64::MAX
                DatabaseElement::opaque("number", n.to_string())
            }
        }
        Value::String(s) => DatabaseElement::string(s.clone()),
        Value::Array(items) => DatabaseElement::Array(items.iter().map(classify_json).collect()),
        Value::Object(map) => {
            DatabaseElement::record(Arc::new(JsonObjectWrapper::new(map.clone())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_classify_json_primitives() {
        assert!(matches!(
            classify_json(&json!(true)),
            DatabaseElement::Primitive(DatabasePrimitive::Boolean(true))
        ));
        assert!(matches!(
            classify_json(&json!(3)),
            DatabaseElement::Primitive(DatabasePrimitive::Number(Number::Int(3)))
        ));
        assert!(matches!(
            classify_json(&json!(1.5)),
            DatabaseElement::Primitive(DatabasePrimitive::Number(Number::Float(_)))
        ));
        assert!(matches!(
            classify_json(&json!(null)),
            DatabaseElement::Primitive(DatabasePrimitive::Null)
        ));
    }

    #[test]
    fn test_classify_json_does_not_sniff_dates() {
        let element = classify_json(&json!("2024-01-01T00:00:00Z"));
        assert_eq!(
            element.as_primitive().map(|p| p.kind()),
            Some(PrimitiveKind::String)
        );
    }

    #[test]
    fn test_classify_json_is_deterministic() {
        let value = json!({"a": [1, {"b": "c"}], "d": false});
        let first = classify_json(&value);
        let second = classify_json(&value);
        assert_eq!(first.type_name(), second.type_name());
        assert_eq!(first.to_json(), second.to_json());
    }

    #[test]
    fn test_huge_unsigned_falls_back_to_opaque() {
        let element = classify_json(&json!(u64::MAX));
        assert_eq!(element.type_name(), "number");
        assert!(matches!(element, DatabaseElement::Object(ObjectValue::Opaque(_))));
    }

    #[test]
    fn test_composites() {
        let element = classify_json(&json!({"tags": ["a", "b"]}));
        assert!(element.is_composite());
        let record = element.as_record().unwrap();
        let tags = record.get("tags").unwrap();
        assert_eq!(tags.as_array().unwrap().len(), 2);
        assert!(!DatabaseElement::opaque("binary", "00ff").is_composite());
    }

    #[test]
    fn test_date_display() {
        let date = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        let primitive = DatabasePrimitive::Date(date);
        assert_eq!(primitive.to_string(), "2024-03-01T12:30:00.000Z");
    }
}
