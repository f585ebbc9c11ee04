use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::identifier::Identifier;
use crate::core_api::CoreError;

pub const IDENTIFIER_KEY: &str = "id";

/// Fields whose presence marks an object as a placed instance rather than a
/// type definition.
pub const PLACEMENT_FIELDS: [&str; 4] = ["x", "y", "position", "pos"];

const POSITIONAL_X_SLOT: usize = 1;
const POSITIONAL_Y_SLOT: usize = 2;
const DEFAULT_COORDINATE: i64 = 54;

/// Session-local handle to one placed record. Never serialised into the save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemRef(pub(crate) u64);

impl ItemRef {
    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordShape {
    /// `[id, x, y, ...]`
    Positional,
    /// `{"id": .., "x": .., "y": .., ...}`
    Keyed,
}

/// The record exactly as it appeared in the save, identifier slot included.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordBody {
    Positional(Vec<Value>),
    Keyed(Map<String, Value>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemRecord {
    reference: ItemRef,
    identifier: Identifier,
    body: RecordBody,
}

pub fn is_placed_instance(value: &Value) -> bool {
    match value {
        Value::Array(slots) => slots.first().and_then(Identifier::from_value).is_some(),
        Value::Object(fields) => {
            fields.contains_key(IDENTIFIER_KEY)
                && PLACEMENT_FIELDS.iter().any(|key| fields.contains_key(*key))
        }
        _ => false,
    }
}

impl ItemRecord {
    pub(crate) fn from_value(value: Value, reference: ItemRef) -> Result<Self, CoreError> {
        let (identifier, body) = match value {
            Value::Array(slots) => {
                let identifier = slots.first().and_then(Identifier::from_value);
                (identifier, RecordBody::Positional(slots))
            }
            Value::Object(fields) => {
                let identifier = fields.get(IDENTIFIER_KEY).and_then(Identifier::from_value);
                (identifier, RecordBody::Keyed(fields))
            }
            other => {
                return Err(CoreError::malformed(format!(
                    "item record must be an array or object, found {}",
                    json_kind(&other)
                )));
            }
        };

        let Some(identifier) = identifier else {
            return Err(CoreError::malformed("item record has no usable identifier"));
        };

        Ok(Self {
            reference,
            identifier,
            body,
        })
    }

    /// Builds a fresh record from the default template for `shape`, then
    /// applies `overrides`. Positional overrides address slots by index or by
    /// the `x`/`y` aliases.
    pub(crate) fn with_defaults(
        identifier: &Identifier,
        shape: RecordShape,
        overrides: &Map<String, Value>,
        reference: ItemRef,
    ) -> Result<Self, CoreError> {
        let mut body = match shape {
            RecordShape::Positional => RecordBody::Positional(vec![
                identifier.to_value(),
                Value::from(DEFAULT_COORDINATE),
                Value::from(DEFAULT_COORDINATE),
                Value::from(0),
                Value::from(0),
                Value::from(0),
                Value::Array(Vec::new()),
                Value::Object(Map::new()),
            ]),
            RecordShape::Keyed => {
                let mut fields = Map::new();
                fields.insert(IDENTIFIER_KEY.to_string(), identifier.to_value());
                fields.insert("x".to_string(), Value::from(DEFAULT_COORDINATE));
                fields.insert("y".to_string(), Value::from(DEFAULT_COORDINATE));
                RecordBody::Keyed(fields)
            }
        };

        for (key, value) in overrides {
            body.set(key, value.clone())?;
        }

        Ok(Self {
            reference,
            identifier: identifier.clone(),
            body,
        })
    }

    pub fn reference(&self) -> ItemRef {
        self.reference
    }

    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    pub fn body(&self) -> &RecordBody {
        &self.body
    }

    pub fn shape(&self) -> RecordShape {
        match self.body {
            RecordBody::Positional(_) => RecordShape::Positional,
            RecordBody::Keyed(_) => RecordShape::Keyed,
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    pub fn position(&self) -> Option<(i64, i64)> {
        let x = self.body.get("x")?.as_i64()?;
        let y = self.body.get("y")?.as_i64()?;
        Some((x, y))
    }

    pub fn to_value(&self) -> Value {
        match &self.body {
            RecordBody::Positional(slots) => Value::Array(slots.clone()),
            RecordBody::Keyed(fields) => Value::Object(fields.clone()),
        }
    }
}

impl RecordBody {
    fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Positional(slots) => slots.get(positional_slot(key)?),
            Self::Keyed(fields) => fields.get(key).or_else(|| keyed_position(fields, key)),
        }
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), CoreError> {
        if key == IDENTIFIER_KEY {
            return Err(
                CoreError::unsupported("the identifier of a new item cannot be overridden")
                    .with_subject(key),
            );
        }

        match self {
            Self::Positional(slots) => {
                let slot = positional_slot(key).ok_or_else(|| {
                    CoreError::unsupported("positional items take slot indexes or x/y overrides")
                        .with_subject(key)
                })?;
                if slot >= MAX_POSITIONAL_SLOTS {
                    return Err(CoreError::unsupported(format!(
                        "positional slot must be below {MAX_POSITIONAL_SLOTS}"
                    ))
                    .with_subject(key));
                }
                if slot == 0 {
                    return Err(CoreError::unsupported(
                        "the identifier of a new item cannot be overridden",
                    )
                    .with_subject(key));
                }
                if slot >= slots.len() {
                    slots.resize(slot + 1, Value::Null);
                }
                slots[slot] = value;
            }
            Self::Keyed(fields) => {
                fields.insert(key.to_string(), value);
            }
        }
        Ok(())
    }
}

// Overrides may pad a record with nulls up to this many slots.
const MAX_POSITIONAL_SLOTS: usize = 64;

fn positional_slot(key: &str) -> Option<usize> {
    match key {
        IDENTIFIER_KEY => Some(0),
        "x" => Some(POSITIONAL_X_SLOT),
        "y" => Some(POSITIONAL_Y_SLOT),
        other => other.parse().ok(),
    }
}

fn keyed_position<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    let index = match key {
        "x" => 0,
        "y" => 1,
        _ => return None,
    };
    fields
        .get("position")
        .or_else(|| fields.get("pos"))
        .and_then(|pos| pos.as_array())
        .and_then(|pos| pos.get(index))
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
