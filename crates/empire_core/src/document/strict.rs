//! JSON parsing that refuses to silently collapse duplicate object keys.
//!
//! `serde_json::Value` keeps the last of two equal keys. The visitor here
//! builds the same tree but remembers the JSON pointer of the first duplicate
//! it sees so the load can fail with the offending key instead.

use std::fmt;

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde_json::{Map, Number, Value};

use crate::core_api::CoreError;

pub fn parse_document(bytes: &[u8]) -> Result<Value, CoreError> {
    let node: Node = serde_json::from_slice(bytes)
        .map_err(|e| CoreError::malformed(format!("invalid JSON: {e}")))?;

    match node.duplicate {
        Some(pointer) => Err(CoreError::duplicate(
            pointer,
            "duplicate key within one object",
        )),
        None => Ok(node.value),
    }
}

pub(crate) fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

struct Node {
    value: Value,
    duplicate: Option<String>,
}

impl Node {
    fn leaf(value: Value) -> Self {
        Self {
            value,
            duplicate: None,
        }
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(NodeVisitor)
    }
}

struct NodeVisitor;

impl<'de> Visitor<'de> for NodeVisitor {
    type Value = Node;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Node, E> {
        Ok(Node::leaf(Value::Bool(v)))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Node, E> {
        Ok(Node::leaf(Value::from(v)))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Node, E> {
        Ok(Node::leaf(Value::from(v)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Node, E> {
        Ok(Node::leaf(Number::from_f64(v).map_or(Value::Null, Value::Number)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Node, E> {
        Ok(Node::leaf(Value::String(v.to_string())))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Node, E> {
        Ok(Node::leaf(Value::String(v)))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Node, E> {
        Ok(Node::leaf(Value::Null))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Node, A::Error> {
        let mut items = Vec::new();
        let mut duplicate = None;

        while let Some(node) = seq.next_element::<Node>()? {
            if duplicate.is_none()
                && let Some(inner) = node.duplicate
            {
                duplicate = Some(format!("/{}{inner}", items.len()));
            }
            items.push(node.value);
        }

        Ok(Node {
            value: Value::Array(items),
            duplicate,
        })
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Node, A::Error> {
        let mut out = Map::new();
        let mut duplicate = None;

        while let Some(key) = map.next_key::<String>()? {
            let node: Node = map.next_value()?;
            if out.contains_key(&key) {
                if duplicate.is_none() {
                    duplicate = Some(format!("/{}", escape_token(&key)));
                }
                continue;
            }
            if duplicate.is_none()
                && let Some(inner) = node.duplicate
            {
                duplicate = Some(format!("/{}{inner}", escape_token(&key)));
            }
            out.insert(key, node.value);
        }

        Ok(Node {
            value: Value::Object(out),
            duplicate,
        })
    }
}
