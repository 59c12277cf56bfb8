//! Dynamically-typed payload tree
//!
//! Both transports normalize whatever the service sends back into a
//! [`WireNode`] before the response mapper turns it into a typed value.

use std::collections::BTreeMap;
use std::fmt;

/// A decoded response value
#[derive(Debug, Clone, PartialEq)]
pub enum WireNode {
    Nil,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    List(Vec<WireNode>),
    Map(BTreeMap<String, WireNode>),
}

impl WireNode {
    /// Short name of the node's shape, used in error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            WireNode::Nil => "nil",
            WireNode::Bool(_) => "boolean",
            WireNode::Int(_) => "integer",
            WireNode::Double(_) => "double",
            WireNode::String(_) => "string",
            WireNode::List(_) => "list",
            WireNode::Map(_) => "map",
        }
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(self, WireNode::List(_) | WireNode::Map(_))
    }

    /// Look up a member of a map node
    pub fn get(&self, key: &str) -> Option<&WireNode> {
        match self {
            WireNode::Map(map) => map.get(key),
            _ => None,
        }
    }

    /// Render a scalar as text; `None` for lists and maps
    pub fn scalar_text(&self) -> Option<String> {
        match self {
            WireNode::Nil => None,
            WireNode::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
            WireNode::Int(i) => Some(i.to_string()),
            WireNode::Double(d) => Some(d.to_string()),
            WireNode::String(s) => Some(s.clone()),
            WireNode::List(_) | WireNode::Map(_) => None,
        }
    }

    /// Build a map node from key/value pairs
    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, WireNode)>,
    {
        WireNode::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl From<&str> for WireNode {
    fn from(value: &str) -> Self {
        WireNode::String(value.to_string())
    }
}

impl From<String> for WireNode {
    fn from(value: String) -> Self {
        WireNode::String(value)
    }
}

impl From<i64> for WireNode {
    fn from(value: i64) -> Self {
        WireNode::Int(value)
    }
}

impl From<f64> for WireNode {
    fn from(value: f64) -> Self {
        WireNode::Double(value)
    }
}

impl From<bool> for WireNode {
    fn from(value: bool) -> Self {
        WireNode::Bool(value)
    }
}

impl From<serde_json::Value> for WireNode {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => WireNode::Nil,
            serde_json::Value::Bool(b) => WireNode::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => WireNode::Int(i),
                None => WireNode::Double(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => WireNode::String(s),
            serde_json::Value::Array(items) => {
                WireNode::List(items.into_iter().map(WireNode::from).collect())
            }
            serde_json::Value::Object(map) => {
                WireNode::Map(map.into_iter().map(|(k, v)| (k, WireNode::from(v))).collect())
            }
        }
    }
}

impl fmt::Display for WireNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireNode::List(items) => write!(f, "[{} items]", items.len()),
            WireNode::Map(map) => write!(f, "{{{} members}}", map.len()),
            other => write!(f, "{}", other.scalar_text().unwrap_or_else(|| "nil".to_string())),
        }
    }
}
