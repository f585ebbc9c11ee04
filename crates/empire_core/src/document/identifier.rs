use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key linking a placed item to its type definition.
///
/// Integer-valued strings normalise to `Int`, so `"104"` in one document and
/// `104` in the other name the same object type. The raw JSON form is kept by
/// the owning record, not here.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Identifier {
    Int(i64),
    Str(String),
}

impl Identifier {
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Self::Int),
            Value::String(s) => Some(Self::parse(s)),
            _ => None,
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<i64>() {
            Ok(v) => Self::Int(v),
            Err(_) => Self::Str(raw.to_string()),
        }
    }

    /// JSON form used when the editor creates a new record.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Int(v) => Value::from(*v),
            Self::Str(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Identifier {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}
