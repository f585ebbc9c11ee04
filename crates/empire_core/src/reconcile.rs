use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::core_api::{CoreError, CoreErrorCode};
use crate::document::{ConfigDocument, Identifier, SaveDocument, TownKey};

/// Identifier set differences between a save and a configuration. Always
/// computed fresh from the documents; never cached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    /// Referenced by placed items but not defined in the configuration.
    pub missing_in_config: BTreeSet<Identifier>,
    /// Defined in the configuration but placed in no town.
    pub unused_in_save: BTreeSet<Identifier>,
}

impl ReconciliationReport {
    pub fn is_clean(&self) -> bool {
        self.missing_in_config.is_empty()
    }
}

/// Reconciles every town of `save` against `config`.
pub fn reconcile(save: &SaveDocument, config: &ConfigDocument) -> ReconciliationReport {
    let placed = save.identifiers();
    build_report(&placed, &placed, config)
}

/// `missing_in_config` is limited to one town; `unused_in_save` still spans
/// all loaded towns, since an identifier placed elsewhere is not unused.
pub fn reconcile_town(
    save: &SaveDocument,
    town: &TownKey,
    config: &ConfigDocument,
) -> Result<ReconciliationReport, CoreError> {
    let town = save.town(town).ok_or_else(|| {
        CoreError::new(CoreErrorCode::ReferenceNotFound, "no such town")
            .with_subject(town.to_string())
    })?;
    let in_town: BTreeSet<Identifier> = town
        .items()
        .iter()
        .map(|item| item.identifier().clone())
        .collect();
    Ok(build_report(&in_town, &save.identifiers(), config))
}

fn build_report(
    scope: &BTreeSet<Identifier>,
    all_placed: &BTreeSet<Identifier>,
    config: &ConfigDocument,
) -> ReconciliationReport {
    let defined = config.identifiers();
    ReconciliationReport {
        missing_in_config: scope.difference(&defined).cloned().collect(),
        unused_in_save: defined.difference(all_placed).cloned().collect(),
    }
}
