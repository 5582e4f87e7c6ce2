//! Dotted key paths into decoded response bodies.
//!
//! `result.Department` walks `body["result"]["Department"]`. Anything that
//! cannot be walked resolves to [`Node::Missing`], which yields no records.

use serde_json::{Map, Value};

use crate::error::FetchError;
use crate::types::Record;

/// A parsed dotted key path
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyPath {
    raw: String,
    segments: Vec<String>,
}

/// Position reached while walking a body
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Node<'a> {
    /// A JSON object
    Map(&'a Map<String, Value>),
    /// A JSON array
    Sequence(&'a [Value]),
    /// Any other JSON value, including null
    Scalar(&'a Value),
    /// A segment was absent or could not be indexed
    Missing,
}

impl<'a> Node<'a> {
    fn from_value(value: &'a Value) -> Self {
        match value {
            Value::Object(map) => Node::Map(map),
            Value::Array(items) => Node::Sequence(items),
            other => Node::Scalar(other),
        }
    }

    /// Step into a named child. Only maps have named children.
    pub fn child(self, segment: &str) -> Node<'a> {
        match self {
            Node::Map(map) => map.get(segment).map_or(Node::Missing, Node::from_value),
            _ => Node::Missing,
        }
    }
}

impl KeyPath {
    /// Parse a dotted path. An empty path addresses the body itself.
    pub fn parse(path: &str) -> Self {
        let segments = if path.is_empty() {
            Vec::new()
        } else {
            path.split('.').map(str::to_string).collect()
        };
        Self {
            raw: path.to_string(),
            segments,
        }
    }

    /// The path as written
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Walk `body` along the path
    pub fn resolve<'a>(&self, body: &'a Value) -> Node<'a> {
        self.segments
            .iter()
            .fold(Node::from_value(body), |node, segment| node.child(segment))
    }

    /// Records found at the end of the path.
    ///
    /// Map values and array elements become records; scalars and missing
    /// paths yield none. A child that is not an object fails the whole body.
    pub fn extract_records(&self, body: &Value) -> Result<Vec<Record>, FetchError> {
        let children: Vec<&Value> = match self.resolve(body) {
            Node::Map(map) => map.values().collect(),
            Node::Sequence(items) => items.iter().collect(),
            Node::Scalar(_) | Node::Missing => return Ok(Vec::new()),
        };

        children
            .into_iter()
            .map(|child| match child {
                Value::Object(record) => Ok(record.clone()),
                other => Err(FetchError::Shape {
                    path: self.raw.clone(),
                    found: json_type(other),
                }),
            })
            .collect()
    }
}

impl std::fmt::Display for KeyPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
