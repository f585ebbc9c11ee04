//! Classifies a parsed document as one of the two save dialects or as a
//! configuration file. Detection never guesses: a document that fits no
//! shape, or fits more than one, is `Unrecognized`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::core_api::{CoreError, CoreErrorCode};
use crate::document::{
    IDENTIFIER_KEY, ITEMS_KEY, MAPS_KEY, PLACEMENT_FIELDS, PLAYER_INFO_KEY, is_placed_instance,
};

const SAVE_MARKER_KEYS: [&str; 2] = [PLAYER_INFO_KEY, "privateState"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dialect {
    /// Social Empires: `maps` container of towns.
    SaveDialectMultiTown,
    /// Social Wars: one flat `items` collection of placed instances.
    SaveDialectSingleTown,
    Configuration,
    Unrecognized,
}

impl Dialect {
    pub fn is_save(self) -> bool {
        matches!(
            self,
            Self::SaveDialectMultiTown | Self::SaveDialectSingleTown
        )
    }

    pub fn has_towns(self) -> bool {
        self == Self::SaveDialectMultiTown
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SaveDialectMultiTown => "multi-town save",
            Self::SaveDialectSingleTown => "single-town save",
            Self::Configuration => "configuration",
            Self::Unrecognized => "unrecognized",
        }
    }

    pub fn game_name(self) -> Option<&'static str> {
        match self {
            Self::SaveDialectMultiTown => Some("Social Empires"),
            Self::SaveDialectSingleTown => Some("Social Wars"),
            Self::Configuration | Self::Unrecognized => None,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemsShape {
    Empty,
    Placed,
    Definitions,
    Mixed,
}

pub fn detect(root: &Value) -> Dialect {
    let Some(root) = root.as_object() else {
        return Dialect::Unrecognized;
    };

    let has_maps = matches!(root.get(MAPS_KEY), Some(Value::Array(_) | Value::Object(_)));
    let items = root.get(ITEMS_KEY).and_then(Value::as_array);

    let dialect = match (has_maps, items) {
        // Both containers at once: precedence is unknown, so refuse.
        (true, Some(_)) => Dialect::Unrecognized,
        (true, None) => Dialect::SaveDialectMultiTown,
        (false, Some(items)) => match items_shape(items) {
            ItemsShape::Placed => Dialect::SaveDialectSingleTown,
            ItemsShape::Definitions => Dialect::Configuration,
            ItemsShape::Empty if has_save_marker(root) => Dialect::SaveDialectSingleTown,
            ItemsShape::Empty | ItemsShape::Mixed => Dialect::Unrecognized,
        },
        (false, None) => Dialect::Unrecognized,
    };

    debug!(%dialect, "classified document");
    dialect
}

/// `detect`, failing closed on `Unrecognized`.
pub fn classify(root: &Value) -> Result<Dialect, CoreError> {
    match detect(root) {
        Dialect::Unrecognized => Err(CoreError::new(
            CoreErrorCode::UnrecognizedFormat,
            "document matches neither save dialect nor the configuration shape",
        )),
        dialect => Ok(dialect),
    }
}

fn items_shape(items: &[Value]) -> ItemsShape {
    if items.is_empty() {
        return ItemsShape::Empty;
    }
    if items.iter().all(is_placed_instance) {
        return ItemsShape::Placed;
    }
    if items.iter().all(is_definition) {
        return ItemsShape::Definitions;
    }
    ItemsShape::Mixed
}

fn is_definition(value: &Value) -> bool {
    value.as_object().is_some_and(|fields| {
        fields.contains_key(IDENTIFIER_KEY)
            && !PLACEMENT_FIELDS.iter().any(|key| fields.contains_key(*key))
    })
}

fn has_save_marker(root: &Map<String, Value>) -> bool {
    SAVE_MARKER_KEYS.iter().any(|key| root.contains_key(*key))
}
