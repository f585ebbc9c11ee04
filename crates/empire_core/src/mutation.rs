//! Add, delete, list and town selection over a loaded save.
//!
//! Every operation validates before it touches the document, so a failed
//! call leaves the save exactly as it was.

use std::collections::BTreeSet;

use serde_json::{Map, Value};
use tracing::debug;

use crate::core_api::{CoreError, CoreErrorCode};
use crate::document::{
    ConfigDocument, Identifier, ItemListing, ItemRecord, ItemRef, SaveDocument, TownKey,
};

/// Appends one item built from the identifier's defaults plus `overrides`
/// to the selected town.
pub fn add(
    save: &mut SaveDocument,
    config: &ConfigDocument,
    identifier: &Identifier,
    overrides: &Map<String, Value>,
) -> Result<ItemRef, CoreError> {
    let mut added = add_many(save, config, identifier, overrides, 1)?;
    added
        .pop()
        .ok_or_else(|| CoreError::unsupported("no item was added"))
}

pub fn add_many(
    save: &mut SaveDocument,
    config: &ConfigDocument,
    identifier: &Identifier,
    overrides: &Map<String, Value>,
    quantity: usize,
) -> Result<Vec<ItemRef>, CoreError> {
    if quantity == 0 {
        return Err(CoreError::unsupported("quantity must be at least 1"));
    }
    let entry = config.get(identifier).ok_or_else(|| {
        CoreError::new(
            CoreErrorCode::UnknownIdentifier,
            "identifier is not defined in the loaded configuration",
        )
        .with_subject(identifier.to_string())
    })?;

    let selected = save.selected_index();
    let shape = save.selected_town().preferred_shape();
    let mut records = Vec::with_capacity(quantity);
    for _ in 0..quantity {
        let reference = save.allocate_reference();
        records.push(ItemRecord::with_defaults(
            entry.identifier(),
            shape,
            overrides,
            reference,
        )?);
    }

    let references: Vec<ItemRef> = records.iter().map(ItemRecord::reference).collect();
    let town = save.town_mut(selected);
    town.items_mut().extend(records);
    debug!(%identifier, quantity, town = %town.key(), "items added");
    save.mark_modified();
    Ok(references)
}

pub fn delete(save: &mut SaveDocument, reference: ItemRef) -> Result<ItemRecord, CoreError> {
    let (town, index) = save
        .locate(reference)
        .ok_or_else(|| reference_not_found(reference))?;
    let removed = save.town_mut(town).items_mut().remove(index);
    save.mark_modified();
    Ok(removed)
}

/// Deletes all of `references` or, if any is missing, none of them.
pub fn delete_many(
    save: &mut SaveDocument,
    references: &[ItemRef],
) -> Result<Vec<ItemRecord>, CoreError> {
    let unique: BTreeSet<ItemRef> = references.iter().copied().collect();
    if let Some(missing) = unique.iter().find(|r| save.locate(**r).is_none()) {
        return Err(reference_not_found(*missing));
    }
    unique
        .into_iter()
        .map(|reference| delete(save, reference))
        .collect()
}

pub fn list(save: &SaveDocument, town: &TownKey) -> Result<ItemListing, CoreError> {
    save.town(town)
        .map(|town| town.snapshot())
        .ok_or_else(|| town_not_found(town))
}

pub fn list_selected(save: &SaveDocument) -> ItemListing {
    save.selected_town().snapshot()
}

/// Switches the active town. Saves without a town container have nothing to
/// switch and reject the call without changing anything.
pub fn select_town(save: &mut SaveDocument, town: &TownKey) -> Result<(), CoreError> {
    if !save.has_town_selector() {
        return Err(CoreError::unsupported(format!(
            "{} documents have no towns to select",
            save.dialect()
        )));
    }
    let index = save.town_position(town).ok_or_else(|| town_not_found(town))?;
    save.set_selected(index);
    Ok(())
}

pub fn find(
    save: &SaveDocument,
    town: &TownKey,
    identifier: &Identifier,
) -> Result<Vec<ItemRef>, CoreError> {
    let listing = list(save, town)?;
    Ok(listing
        .iter()
        .filter(|item| item.identifier() == identifier)
        .map(ItemRecord::reference)
        .collect())
}

/// Reference of the `index`-th item (0-based, document order) of a town.
pub fn item_at(save: &SaveDocument, town: &TownKey, index: usize) -> Result<ItemRef, CoreError> {
    let town_ref = save.town(town).ok_or_else(|| town_not_found(town))?;
    town_ref
        .items()
        .get(index)
        .map(ItemRecord::reference)
        .ok_or_else(|| {
            CoreError::new(CoreErrorCode::ReferenceNotFound, "no item at that position")
                .with_subject(format!("{town}#{index}"))
        })
}

fn reference_not_found(reference: ItemRef) -> CoreError {
    CoreError::new(
        CoreErrorCode::ReferenceNotFound,
        "item is not present in any town",
    )
    .with_subject(reference.raw().to_string())
}

fn town_not_found(town: &TownKey) -> CoreError {
    CoreError::new(CoreErrorCode::ReferenceNotFound, "no such town").with_subject(town.to_string())
}
