//! Typed, mutable view of save files and configuration files.
//!
//! Both documents keep every field they do not model in an opaque
//! `serde_json::Map` (insertion ordered), so a load/save cycle reproduces
//! untouched content exactly.

mod config;
mod identifier;
mod record;
mod save;
mod strict;

use serde::Serialize;
use serde_json::Value;
use serde_json::ser::PrettyFormatter;

use crate::core_api::{CoreError, CoreErrorCode};

pub use config::{ConfigDocument, ConfigEntry};
pub use identifier::Identifier;
pub use record::{
    IDENTIFIER_KEY, ItemRecord, ItemRef, PLACEMENT_FIELDS, RecordBody, RecordShape,
    is_placed_instance,
};
pub use save::{ItemListing, PLAYER_INFO_KEY, SaveDocument, Town, TownKey};
pub use strict::parse_document;

pub(crate) use strict::escape_token;

pub const MAPS_KEY: &str = "maps";
pub const ITEMS_KEY: &str = "items";

const INDENT: &[u8] = b"    ";

/// Four-space indented JSON, the layout the games' tooling writes.
pub(crate) fn to_pretty_bytes(value: &Value) -> Result<Vec<u8>, CoreError> {
    let mut out = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(INDENT));
    value.serialize(&mut serializer).map_err(|e| {
        CoreError::new(CoreErrorCode::Io, format!("failed to serialise document: {e}"))
    })?;
    Ok(out)
}
