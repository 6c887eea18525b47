/*!
 * Core data types for LedgerFlow.
 *
 * This module defines the dynamic value model and the untyped entity record
 * that flows through the automation pipeline. The engine is deliberately
 * schema-agnostic: transactions, accounts, payees, categories, schedules,
 * and budgets all travel as plain key/value records.
 */
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unique identifier for LedgerFlow resources
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Id(String);

impl Id {
    /// Create a new ID with a random UUID
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create an ID from a string
    pub fn from_string<S: AsRef<str>>(s: S) -> Self {
        Self(s.as_ref().to_string())
    }

    /// Get the string representation of the ID
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Self::from_string(s)
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Self::from_string(s)
    }
}

impl From<Uuid> for Id {
    fn from(uuid: Uuid) -> Self {
        Self::from_string(uuid.to_string())
    }
}

/// A dynamically-typed value carried by entity records and rule definitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Integer(i64),
    /// Floating-point value
    Float(f64),
    /// String value
    String(String),
    /// Array of values
    Array(Vec<Value>),
    /// Map of string keys to values
    Object(HashMap<String, Value>),
    /// Timestamp
    Timestamp(DateTime<Utc>),
}

impl Value {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if the value is a boolean
    pub fn is_bool(&self) -> bool {
        matches!(self, Value::Bool(_))
    }

    /// Check if the value is numeric (integer or float)
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }

    /// Check if the value is a string
    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    /// Check if the value is an array
    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    /// Check if the value is an object
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    /// Try to get a boolean value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get an integer value
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Float(f) if *f == (*f as i64) as f64 => Some(*f as i64),
            _ => None,
        }
    }

    /// Try to get a float value
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get a string value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get an array value
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Try to get an object value
    pub fn as_object(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Try to get a timestamp value
    pub fn as_timestamp(&self) -> Option<&DateTime<Utc>> {
        match self {
            Value::Timestamp(t) => Some(t),
            _ => None,
        }
    }

    /// Coerce the value to a float, accepting numbers and numeric strings
    pub fn coerce_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Coerce the value to a UTC datetime.
    ///
    /// Accepts native timestamps, RFC 3339 strings, and bare `YYYY-MM-DD`
    /// dates (interpreted as UTC midnight).
    pub fn coerce_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Timestamp(t) => Some(*t),
            Value::String(s) => {
                let s = s.trim();
                if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                    return Some(dt.with_timezone(&Utc));
                }
                if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                    return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
                }
                None
            }
            _ => None,
        }
    }

    /// Render the value for display in log messages and templates
    pub fn render(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
            Value::Array(a) => {
                let items: Vec<String> = a.iter().map(|v| v.render()).collect();
                format!("[{}]", items.join(", "))
            }
            Value::Object(_) => "[object]".to_string(),
            Value::Timestamp(t) => t.to_rfc3339(),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i as i64)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Value::Timestamp(t)
    }
}

impl From<Vec<Value>> for Value {
    fn from(a: Vec<Value>) -> Self {
        Value::Array(a)
    }
}

impl From<HashMap<String, Value>> for Value {
    fn from(o: HashMap<String, Value>) -> Self {
        Value::Object(o)
    }
}

/// An untyped entity record: the current state of a transaction, account,
/// payee, category, schedule, or budget as a plain key/value map
pub type Entity = HashMap<String, Value>;

/// A reference-counted entity record
pub type SharedEntity = Arc<Entity>;

/// Build an entity record from key/value pairs
pub fn entity<K, V, I>(pairs: I) -> Entity
where
    K: Into<String>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_creation() {
        let id = Id::new();
        assert!(!id.as_str().is_empty());

        let id = Id::from_string("test-id");
        assert_eq!(id.as_str(), "test-id");

        let id: Id = "another-id".into();
        assert_eq!(id.as_str(), "another-id");
    }

    #[test]
    fn test_value_type_checks() {
        assert!(Value::Null.is_null());
        assert!(Value::Bool(true).is_bool());
        assert!(Value::Integer(42).is_numeric());
        assert!(Value::Float(3.14).is_numeric());
        assert!(Value::String("hello".to_string()).is_string());
        assert!(Value::Array(vec![]).is_array());
        assert!(Value::Object(HashMap::new()).is_object());
    }

    #[test]
    fn test_numeric_cross_coercion() {
        let v = Value::Integer(42);
        assert_eq!(v.as_float(), Some(42.0));

        let v = Value::Float(3.0);
        assert_eq!(v.as_integer(), Some(3));

        let v = Value::Float(3.14);
        assert_eq!(v.as_integer(), None);
    }

    #[test]
    fn test_coerce_f64_from_strings() {
        assert_eq!(Value::from("10").coerce_f64(), Some(10.0));
        assert_eq!(Value::from(" -2.5 ").coerce_f64(), Some(-2.5));
        assert_eq!(Value::from("abc").coerce_f64(), None);
        assert_eq!(Value::Bool(true).coerce_f64(), None);
    }

    #[test]
    fn test_coerce_datetime() {
        let dt = Value::from("2024-01-15T10:00:00Z").coerce_datetime().unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-01-15T10:00:00+00:00");

        let dt = Value::from("2024-01-15").coerce_datetime().unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-01-15T00:00:00+00:00");

        assert!(Value::from("not a date").coerce_datetime().is_none());
        assert!(Value::Integer(5).coerce_datetime().is_none());
    }

    #[test]
    fn test_entity_builder() {
        let e = entity([("amount", Value::from(-150)), ("categoryId", Value::Null)]);
        assert_eq!(e.get("amount"), Some(&Value::Integer(-150)));
        assert_eq!(e.get("categoryId"), Some(&Value::Null));
    }

    #[test]
    fn test_render() {
        assert_eq!(Value::from("x").render(), "x");
        assert_eq!(Value::Integer(7).render(), "7");
        assert_eq!(Value::Null.render(), "null");
        assert_eq!(
            Value::Array(vec![Value::Integer(1), Value::Integer(2)]).render(),
            "[1, 2]"
        );
    }
}
