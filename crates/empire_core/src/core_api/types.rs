use serde::{Deserialize, Serialize};

use super::error::CoreError;
use crate::dialect::Dialect;
use crate::document::TownKey;
use crate::patch::PatchCapability;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedPatch {
    pub file: String,
    /// Index of the failing operation, `None` when the file as a whole was
    /// unusable (not JSON, not an operation list, broke the configuration).
    pub operation: Option<usize>,
    pub path: Option<String>,
    pub error: CoreError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchReport {
    pub capability: PatchCapability,
    pub applied: Vec<String>,
    pub skipped: Vec<SkippedPatch>,
    /// Files offered while patch support was unavailable.
    pub not_applied: Vec<String>,
}

impl PatchReport {
    pub fn new(capability: PatchCapability) -> Self {
        Self {
            capability,
            applied: Vec::new(),
            skipped: Vec::new(),
            not_applied: Vec::new(),
        }
    }

    /// The configuration loaded, but not every offered patch is in it.
    pub fn is_degraded(&self) -> bool {
        !self.skipped.is_empty() || !self.not_applied.is_empty()
    }

    pub fn patches_applied(&self) -> bool {
        self.capability == PatchCapability::Available
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapabilityIssue {
    PatchingUnavailable,
    NoTownSelector,
    ResourcesUnavailable,
    NoConfigLoaded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Capabilities {
    pub can_select_town: bool,
    pub can_add_items: bool,
    pub can_edit_resources: bool,
    pub can_patch: bool,
    pub issues: Vec<CapabilityIssue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TownSummary {
    pub key: TownKey,
    pub name: String,
    pub item_count: usize,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SaveSummary {
    pub dialect: Dialect,
    pub player_id: Option<String>,
    pub player_name: Option<String>,
    pub towns: Vec<TownSummary>,
    pub item_count: usize,
    pub modified: bool,
}
