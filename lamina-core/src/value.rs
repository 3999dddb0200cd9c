//! Runtime value model
//!
//! Template data is a small dynamic value tree. The serde representation is
//! untagged so caller-supplied JSON maps onto it directly: `{"user": {"name":
//! "alice"}}` deserializes to nested maps without any wrapper syntax.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A template runtime value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Truthiness for conditionals: empty-ish values are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Array(items) => !items.is_empty(),
            Value::Map(entries) => !entries.is_empty(),
        }
    }

    /// Text form used by echo ops: null renders empty, `true` renders `1`,
    /// `false` renders empty, numbers canonically, containers as JSON.
    pub fn render_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(true) => String::from("1"),
            Value::Bool(false) => String::new(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Str(s) => s.clone(),
            Value::Array(_) | Value::Map(_) => {
                serde_json::to_string(self).unwrap_or_default()
            }
        }
    }

    /// Type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
        }
    }

    /// Member lookup (`a.b`): maps by key, anything else yields None.
    pub fn get_member(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Map(entries) => entries.get(name),
            _ => None,
        }
    }

    /// Index lookup (`a[i]`): arrays by integer, maps by string key.
    pub fn get_index(&self, index: &Value) -> Option<&Value> {
        match (self, index) {
            (Value::Array(items), Value::Int(i)) => {
                if *i < 0 {
                    None
                } else {
                    items.get(*i as usize)
                }
            }
            (Value::Map(entries), Value::Str(key)) => entries.get(key),
            _ => None,
        }
    }

    /// Numeric view, if this value is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
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

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(entries: BTreeMap<String, Value>) -> Self {
        Value::Map(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Bool(true).is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(Value::Int(-1).is_truthy());
        assert!(!Value::Str(String::new()).is_truthy());
        assert!(Value::from("x").is_truthy());
        assert!(!Value::Array(vec![]).is_truthy());
        assert!(Value::Array(vec![Value::Null]).is_truthy());
        assert!(!Value::Map(BTreeMap::new()).is_truthy());
    }

    #[test]
    fn test_render_string_scalars() {
        assert_eq!(Value::Null.render_string(), "");
        assert_eq!(Value::Bool(true).render_string(), "1");
        assert_eq!(Value::Bool(false).render_string(), "");
        assert_eq!(Value::Int(42).render_string(), "42");
        assert_eq!(Value::Float(1.5).render_string(), "1.5");
        assert_eq!(Value::Float(2.0).render_string(), "2");
        assert_eq!(Value::from("hi").render_string(), "hi");
    }

    #[test]
    fn test_render_string_containers() {
        let arr = Value::Array(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(arr.render_string(), "[1,2]");
    }

    #[test]
    fn test_member_and_index() {
        let mut entries = BTreeMap::new();
        entries.insert("name".to_string(), Value::from("alice"));
        let map = Value::Map(entries);

        assert_eq!(map.get_member("name"), Some(&Value::from("alice")));
        assert_eq!(map.get_member("missing"), None);
        assert_eq!(
            map.get_index(&Value::from("name")),
            Some(&Value::from("alice"))
        );

        let arr = Value::Array(vec![Value::Int(10), Value::Int(20)]);
        assert_eq!(arr.get_index(&Value::Int(1)), Some(&Value::Int(20)));
        assert_eq!(arr.get_index(&Value::Int(-1)), None);
        assert_eq!(arr.get_index(&Value::Int(5)), None);
    }

    #[test]
    fn test_untagged_deserialization() {
        let v: Value = serde_json::from_str(r#"{"user": {"name": "alice"}, "n": 3}"#).unwrap();
        match &v {
            Value::Map(entries) => {
                assert_eq!(entries["n"], Value::Int(3));
                assert_eq!(
                    entries["user"].get_member("name"),
                    Some(&Value::from("alice"))
                );
            }
            other => panic!("expected map, got {:?}", other),
        }
    }

    #[test]
    fn test_serde_round_trip() {
        let v: Value = serde_json::from_str(r#"[null, true, 1, 2.5, "s", {"k": []}]"#).unwrap();
        let text = serde_json::to_string(&v).unwrap();
        let back: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v, back);
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Value::Null.type_name(), "null");
        assert_eq!(Value::Array(vec![]).type_name(), "array");
    }
}
