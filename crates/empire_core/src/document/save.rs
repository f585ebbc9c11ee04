use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::identifier::Identifier;
use super::record::{ItemRecord, ItemRef, RecordShape, json_kind};
use super::{ITEMS_KEY, MAPS_KEY, strict, to_pretty_bytes};
use crate::core_api::{CoreError, CoreErrorCode};
use crate::dialect::{self, Dialect};

pub const PLAYER_INFO_KEY: &str = "playerInfo";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TownKey {
    Index(usize),
    Name(String),
}

impl TownKey {
    /// Canonical decimal text becomes an index; anything else, including
    /// `"01"` or `"+1"`, stays a name.
    pub fn parse(raw: &str) -> Self {
        match raw.parse::<usize>() {
            Ok(index) if index.to_string() == raw => Self::Index(index),
            _ => Self::Name(raw.to_string()),
        }
    }
}

impl fmt::Display for TownKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{index}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

impl From<usize> for TownKey {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<&str> for TownKey {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Town {
    key: TownKey,
    // Town object minus its items; ITEMS_KEY stays as a placeholder so the
    // collection is written back at its original position.
    metadata: Map<String, Value>,
    items: Arc<Vec<ItemRecord>>,
}

impl Town {
    pub fn key(&self) -> &TownKey {
        &self.key
    }

    pub fn name(&self) -> Option<&str> {
        self.metadata.get("name").and_then(Value::as_str)
    }

    pub fn display_name(&self) -> String {
        if let Some(name) = self.name() {
            return name.to_string();
        }
        match &self.key {
            TownKey::Index(index) => format!("Town {}", index + 1),
            TownKey::Name(name) => name.clone(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        if name == ITEMS_KEY {
            return None;
        }
        self.metadata.get(name)
    }

    pub fn items(&self) -> &[ItemRecord] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, reference: ItemRef) -> Option<&ItemRecord> {
        self.items.iter().find(|item| item.reference() == reference)
    }

    /// Copy-on-read view of the current items. Later mutation of the town
    /// does not affect an outstanding listing.
    pub fn snapshot(&self) -> ItemListing {
        ItemListing {
            town: self.key.clone(),
            items: Arc::clone(&self.items),
        }
    }

    /// Encoding new records should use: that of the existing records, or
    /// positional for an empty town.
    pub fn preferred_shape(&self) -> RecordShape {
        self.items
            .first()
            .map(ItemRecord::shape)
            .unwrap_or(RecordShape::Positional)
    }

    pub(crate) fn items_mut(&mut self) -> &mut Vec<ItemRecord> {
        Arc::make_mut(&mut self.items)
    }

    pub(crate) fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub(crate) fn metadata_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.metadata
    }

    fn items_value(&self) -> Value {
        Value::Array(self.items.iter().map(ItemRecord::to_value).collect())
    }

    fn to_value(&self) -> Value {
        let mut out = self.metadata.clone();
        out.insert(ITEMS_KEY.to_string(), self.items_value());
        Value::Object(out)
    }
}

#[derive(Debug, Clone)]
pub struct ItemListing {
    town: TownKey,
    items: Arc<Vec<ItemRecord>>,
}

impl ItemListing {
    pub fn town(&self) -> &TownKey {
        &self.town
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ItemRecord> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ItemRecord> {
        self.items.iter()
    }

    pub fn references(&self) -> Vec<ItemRef> {
        self.items.iter().map(ItemRecord::reference).collect()
    }
}

impl<'a> IntoIterator for &'a ItemListing {
    type Item = &'a ItemRecord;
    type IntoIter = std::slice::Iter<'a, ItemRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TownContainer {
    /// `"maps": [town, ...]`
    Sequence,
    /// `"maps": {"key": town, ...}`
    Keyed,
    /// Single-town saves keep their items on the root object, which is
    /// held as the metadata of the one implicit town.
    Root,
}

#[derive(Debug, Clone)]
pub struct SaveDocument {
    dialect: Dialect,
    root: Map<String, Value>,
    container: TownContainer,
    towns: Vec<Town>,
    selected: usize,
    next_reference: u64,
    source: Option<Vec<u8>>,
    modified: bool,
}

impl SaveDocument {
    pub fn parse(bytes: &[u8]) -> Result<Self, CoreError> {
        let root = strict::parse_document(bytes)?;
        let dialect = dialect::classify(&root)?;
        Self::from_source(root, dialect, bytes)
    }

    /// `from_value` that remembers the bytes `root` was parsed from.
    pub(crate) fn from_source(
        root: Value,
        dialect: Dialect,
        bytes: &[u8],
    ) -> Result<Self, CoreError> {
        let mut doc = Self::from_value(root, dialect)?;
        doc.source = Some(bytes.to_vec());
        Ok(doc)
    }

    pub fn from_value(root: Value, dialect: Dialect) -> Result<Self, CoreError> {
        let Value::Object(mut root) = root else {
            return Err(CoreError::malformed("save root must be a JSON object"));
        };

        let mut next_reference = 0u64;
        let (container, towns) = match dialect {
            Dialect::SaveDialectMultiTown => {
                let maps = root.get_mut(MAPS_KEY).map(Value::take).ok_or_else(|| {
                    CoreError::malformed(format!("save has no \"{MAPS_KEY}\" container"))
                })?;
                match maps {
                    Value::Array(entries) => {
                        let towns = entries
                            .into_iter()
                            .enumerate()
                            .map(|(index, value)| {
                                town_from_value(TownKey::Index(index), value, &mut next_reference)
                            })
                            .collect::<Result<Vec<_>, _>>()?;
                        (TownContainer::Sequence, towns)
                    }
                    Value::Object(entries) => {
                        let towns = entries
                            .into_iter()
                            .map(|(key, value)| {
                                town_from_value(TownKey::Name(key), value, &mut next_reference)
                            })
                            .collect::<Result<Vec<_>, _>>()?;
                        (TownContainer::Keyed, towns)
                    }
                    other => {
                        return Err(CoreError::malformed(format!(
                            "\"{MAPS_KEY}\" must be an array or object, found {}",
                            json_kind(&other)
                        )));
                    }
                }
            }
            Dialect::SaveDialectSingleTown => {
                let items = root.get_mut(ITEMS_KEY).map(Value::take).ok_or_else(|| {
                    CoreError::malformed(format!("save has no \"{ITEMS_KEY}\" collection"))
                })?;
                let items = records_from_value(items, &TownKey::Index(0), &mut next_reference)?;
                let town = Town {
                    key: TownKey::Index(0),
                    metadata: std::mem::take(&mut root),
                    items: Arc::new(items),
                };
                (TownContainer::Root, vec![town])
            }
            Dialect::Configuration | Dialect::Unrecognized => {
                return Err(CoreError::new(
                    CoreErrorCode::UnrecognizedFormat,
                    format!("document classified as {dialect}, not a save"),
                ));
            }
        };

        if towns.is_empty() {
            return Err(CoreError::malformed("save contains no towns"));
        }

        Ok(Self {
            dialect,
            root,
            container,
            towns,
            selected: 0,
            next_reference,
            source: None,
            modified: false,
        })
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn has_town_selector(&self) -> bool {
        self.container != TownContainer::Root
    }

    pub fn towns(&self) -> &[Town] {
        &self.towns
    }

    pub fn town(&self, key: &TownKey) -> Option<&Town> {
        self.town_position(key).map(|index| &self.towns[index])
    }

    pub fn selected_town(&self) -> &Town {
        &self.towns[self.selected]
    }

    pub fn player_info(&self) -> Option<&Map<String, Value>> {
        self.field(PLAYER_INFO_KEY).and_then(Value::as_object)
    }

    pub fn player_id(&self) -> Option<String> {
        self.player_info()?.get("pid").map(scalar_to_string)
    }

    pub fn player_name(&self) -> Option<String> {
        self.player_info()?.get("name").map(scalar_to_string)
    }

    /// Top-level field other than the town container.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match (self.container, name) {
            (TownContainer::Root, _) => self.towns[0].field(name),
            (TownContainer::Sequence | TownContainer::Keyed, MAPS_KEY) => None,
            _ => self.root.get(name),
        }
    }

    pub fn item_count(&self) -> usize {
        self.towns.iter().map(Town::len).sum()
    }

    pub fn identifiers(&self) -> BTreeSet<Identifier> {
        self.towns
            .iter()
            .flat_map(|town| town.items.iter())
            .map(|item| item.identifier().clone())
            .collect()
    }

    /// Town position and item position of `reference`.
    pub fn locate(&self, reference: ItemRef) -> Option<(usize, usize)> {
        self.towns.iter().enumerate().find_map(|(town_index, town)| {
            town.items
                .iter()
                .position(|item| item.reference() == reference)
                .map(|item_index| (town_index, item_index))
        })
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn to_value(&self) -> Value {
        if self.container == TownContainer::Root {
            return self.towns[0].to_value();
        }
        let mut root = self.root.clone();
        match self.container {
            TownContainer::Sequence => {
                let towns = self.towns.iter().map(Town::to_value).collect();
                root.insert(MAPS_KEY.to_string(), Value::Array(towns));
            }
            TownContainer::Keyed => {
                let towns = self
                    .towns
                    .iter()
                    .map(|town| (town.key.to_string(), town.to_value()))
                    .collect();
                root.insert(MAPS_KEY.to_string(), Value::Object(towns));
            }
            TownContainer::Root => {}
        }
        Value::Object(root)
    }

    pub fn to_bytes_unmodified(&self) -> Result<Vec<u8>, CoreError> {
        self.source.clone().ok_or_else(|| {
            CoreError::unsupported("save was not loaded from bytes; no source to emit")
        })
    }

    pub fn to_bytes_modified(&self) -> Result<Vec<u8>, CoreError> {
        to_pretty_bytes(&self.to_value())
    }

    /// Source bytes when nothing changed, re-serialised JSON otherwise.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CoreError> {
        match (&self.source, self.modified) {
            (Some(source), false) => Ok(source.clone()),
            _ => self.to_bytes_modified(),
        }
    }

    pub(crate) fn selected_index(&self) -> usize {
        self.selected
    }

    pub(crate) fn set_selected(&mut self, index: usize) {
        self.selected = index;
    }

    /// Exact key text first. Sequence containers then accept any numeral
    /// naming a position.
    pub(crate) fn town_position(&self, key: &TownKey) -> Option<usize> {
        let wanted = key.to_string();
        let exact = self.towns.iter().position(|town| town.key.to_string() == wanted);
        match self.container {
            TownContainer::Sequence => exact.or_else(|| {
                wanted
                    .parse::<usize>()
                    .ok()
                    .filter(|index| *index < self.towns.len())
            }),
            TownContainer::Keyed | TownContainer::Root => exact,
        }
    }

    pub(crate) fn town_mut(&mut self, index: usize) -> &mut Town {
        &mut self.towns[index]
    }

    pub(crate) fn root_mut(&mut self) -> &mut Map<String, Value> {
        match self.container {
            TownContainer::Root => self.towns[0].metadata_mut(),
            TownContainer::Sequence | TownContainer::Keyed => &mut self.root,
        }
    }

    pub(crate) fn allocate_reference(&mut self) -> ItemRef {
        let reference = ItemRef(self.next_reference);
        self.next_reference += 1;
        reference
    }

    pub(crate) fn mark_modified(&mut self) {
        self.modified = true;
    }
}

fn town_from_value(
    key: TownKey,
    value: Value,
    next_reference: &mut u64,
) -> Result<Town, CoreError> {
    let mut metadata = match value {
        Value::Object(metadata) => metadata,
        other => {
            return Err(CoreError::malformed(format!(
                "town {key} must be an object, found {}",
                json_kind(&other)
            )));
        }
    };
    let items = metadata.get_mut(ITEMS_KEY).map(Value::take).ok_or_else(|| {
        CoreError::malformed(format!("town {key} has no \"{ITEMS_KEY}\" collection"))
    })?;
    let items = records_from_value(items, &key, next_reference)?;

    Ok(Town {
        key,
        metadata,
        items: Arc::new(items),
    })
}

fn records_from_value(
    value: Value,
    town: &TownKey,
    next_reference: &mut u64,
) -> Result<Vec<ItemRecord>, CoreError> {
    let entries = match value {
        Value::Array(entries) => entries,
        other => {
            return Err(CoreError::malformed(format!(
                "items of town {town} must be an array, found {}",
                json_kind(&other)
            )));
        }
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let reference = ItemRef(*next_reference);
            *next_reference += 1;
            ItemRecord::from_value(entry, reference).map_err(|e| {
                CoreError::malformed(format!("town {town}, item {index}: {}", e.message))
            })
        })
        .collect()
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
