use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};

use super::identifier::Identifier;
use super::record::{IDENTIFIER_KEY, json_kind};
use super::{ITEMS_KEY, strict, to_pretty_bytes};
use crate::core_api::{CoreError, CoreErrorCode};
use crate::dialect::{self, Dialect};

/// One object type definition. Everything beyond the identifier is opaque.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigEntry {
    identifier: Identifier,
    fields: Map<String, Value>,
}

impl ConfigEntry {
    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    pub fn name(&self) -> Option<&str> {
        self.fields.get("name").and_then(Value::as_str)
    }

    /// Thumbnail base name, without directory or extension.
    pub fn img_name(&self) -> Option<&str> {
        self.fields.get("img_name").and_then(Value::as_str)
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigDocument {
    root: Map<String, Value>,
    entries: Vec<ConfigEntry>,
    index: BTreeMap<Identifier, usize>,
}

impl ConfigDocument {
    pub fn parse(bytes: &[u8]) -> Result<Self, CoreError> {
        let root = strict::parse_document(bytes)?;
        match dialect::classify(&root)? {
            Dialect::Configuration => Self::from_value(root),
            other => Err(CoreError::new(
                CoreErrorCode::UnrecognizedFormat,
                format!("document classified as {other}, not a configuration"),
            )),
        }
    }

    /// Builds the identifier index. Used both at load time and after every
    /// patch file, so a patch that breaks the index is rejected.
    pub fn from_value(root: Value) -> Result<Self, CoreError> {
        let mut root = match root {
            Value::Object(root) => root,
            other => {
                return Err(CoreError::malformed(format!(
                    "configuration root must be an object, found {}",
                    json_kind(&other)
                )));
            }
        };

        let items = root.get_mut(ITEMS_KEY).map(Value::take).ok_or_else(|| {
            CoreError::malformed(format!("configuration has no \"{ITEMS_KEY}\" collection"))
        })?;
        let items = match items {
            Value::Array(items) => items,
            other => {
                return Err(CoreError::malformed(format!(
                    "configuration \"{ITEMS_KEY}\" must be an array, found {}",
                    json_kind(&other)
                )));
            }
        };

        let mut entries = Vec::with_capacity(items.len());
        let mut index = BTreeMap::new();
        for (position, item) in items.into_iter().enumerate() {
            let fields = match item {
                Value::Object(fields) => fields,
                other => {
                    return Err(CoreError::malformed(format!(
                        "configuration item {position} must be an object, found {}",
                        json_kind(&other)
                    )));
                }
            };
            let identifier = fields
                .get(IDENTIFIER_KEY)
                .and_then(Identifier::from_value)
                .ok_or_else(|| {
                    CoreError::malformed(format!(
                        "configuration item {position} has no usable \"{IDENTIFIER_KEY}\""
                    ))
                })?;

            if index.insert(identifier.clone(), position).is_some() {
                return Err(CoreError::duplicate(
                    identifier.to_string(),
                    format!("identifier defined more than once (again at item {position})"),
                ));
            }
            entries.push(ConfigEntry { identifier, fields });
        }

        Ok(Self {
            root,
            entries,
            index,
        })
    }

    pub fn get(&self, identifier: &Identifier) -> Option<&ConfigEntry> {
        self.index.get(identifier).map(|&position| &self.entries[position])
    }

    pub fn contains(&self, identifier: &Identifier) -> bool {
        self.index.contains_key(identifier)
    }

    /// Entries in document order.
    pub fn entries(&self) -> &[ConfigEntry] {
        &self.entries
    }

    pub fn identifiers(&self) -> BTreeSet<Identifier> {
        self.index.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        if name == ITEMS_KEY {
            return None;
        }
        self.root.get(name)
    }

    pub fn to_value(&self) -> Value {
        let mut root = self.root.clone();
        let items = self.entries.iter().map(ConfigEntry::to_value).collect();
        root.insert(ITEMS_KEY.to_string(), Value::Array(items));
        Value::Object(root)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, CoreError> {
        to_pretty_bytes(&self.to_value())
    }
}
