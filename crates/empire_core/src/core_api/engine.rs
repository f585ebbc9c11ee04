use std::path::PathBuf;
use std::thread::{self, JoinHandle};

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::assets::{AssetLocator, DEFAULT_ASSET_DIRS};
use crate::dialect::{self, Dialect};
use crate::document::{
    ConfigDocument, Identifier, ItemListing, ItemRecord, ItemRef, SaveDocument, TownKey,
    parse_document,
};
use crate::mutation;
use crate::patch::{PatchCapability, PatchEngine, PatchFile};
use crate::reconcile::{self, ReconciliationReport};
use crate::resources::{self, PlayerResources, Race, Resource};

use super::error::{CoreError, CoreErrorCode};
use super::types::{Capabilities, CapabilityIssue, PatchReport, SaveSummary, TownSummary};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    pub patch_capability: PatchCapability,
    /// Thumbnail directories, searched in order.
    pub asset_dirs: Vec<PathBuf>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            patch_capability: PatchCapability::default(),
            asset_dirs: DEFAULT_ASSET_DIRS.iter().map(PathBuf::from).collect(),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct Engine {
    options: EngineOptions,
    patcher: PatchEngine,
}

/// Result of opening a document without saying up front what it is.
#[derive(Debug, Clone)]
pub enum Loaded {
    Save(SaveDocument),
    Config {
        config: ConfigDocument,
        report: PatchReport,
    },
}

impl Loaded {
    pub fn dialect(&self) -> Dialect {
        match self {
            Self::Save(save) => save.dialect(),
            Self::Config { .. } => Dialect::Configuration,
        }
    }
}

impl Engine {
    pub fn new() -> Self {
        Self::with_options(EngineOptions::default())
    }

    pub fn with_options(options: EngineOptions) -> Self {
        let patcher = PatchEngine::new(options.patch_capability);
        Self { options, patcher }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn asset_locator(&self) -> AssetLocator {
        AssetLocator::new(self.options.asset_dirs.clone())
    }

    pub fn load_save<B: AsRef<[u8]>>(&self, bytes: B) -> Result<SaveDocument, CoreError> {
        let save = SaveDocument::parse(bytes.as_ref())?;
        info!(
            dialect = %save.dialect(),
            towns = save.towns().len(),
            items = save.item_count(),
            "save loaded"
        );
        Ok(save)
    }

    /// Parses a configuration and applies `patches` to it in order. Patch
    /// failures never fail the load; they are listed in the report.
    pub fn load_config<B: AsRef<[u8]>>(
        &self,
        bytes: B,
        patches: &[PatchFile],
    ) -> Result<(ConfigDocument, PatchReport), CoreError> {
        let config = ConfigDocument::parse(bytes.as_ref())?;
        Ok(self.finish_config(config, patches))
    }

    /// Detects the dialect and loads the document as a save or a
    /// configuration. `patches` are only used for configurations.
    pub fn open_bytes<B: AsRef<[u8]>>(
        &self,
        bytes: B,
        patches: &[PatchFile],
    ) -> Result<Loaded, CoreError> {
        let bytes = bytes.as_ref();
        let root = parse_document(bytes)?;
        let dialect = dialect::classify(&root)?;

        if dialect.is_save() {
            let save = SaveDocument::from_source(root, dialect, bytes)?;
            info!(%dialect, items = save.item_count(), "save loaded");
            Ok(Loaded::Save(save))
        } else {
            let config = ConfigDocument::from_value(root)?;
            let (config, report) = self.finish_config(config, patches);
            Ok(Loaded::Config { config, report })
        }
    }

    /// `open_bytes` on a worker thread so a caller's UI loop keeps running
    /// during large loads.
    pub fn spawn_open(
        &self,
        bytes: Vec<u8>,
        patches: Vec<PatchFile>,
    ) -> JoinHandle<Result<Loaded, CoreError>> {
        let engine = self.clone();
        thread::spawn(move || engine.open_bytes(&bytes, &patches))
    }

    fn finish_config(
        &self,
        config: ConfigDocument,
        patches: &[PatchFile],
    ) -> (ConfigDocument, PatchReport) {
        let (config, report) = self.patcher.apply(config, patches);
        info!(
            entries = config.len(),
            applied = report.applied.len(),
            skipped = report.skipped.len(),
            "configuration loaded"
        );
        (config, report)
    }
}

/// One editing context: at most one save and one configuration. A load that
/// fails leaves whatever was loaded before in place.
#[derive(Debug, Default)]
pub struct Session {
    engine: Engine,
    save: Option<SaveDocument>,
    config: Option<ConfigDocument>,
    patch_report: Option<PatchReport>,
}

impl Session {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            save: None,
            config: None,
            patch_report: None,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn save(&self) -> Option<&SaveDocument> {
        self.save.as_ref()
    }

    pub fn config(&self) -> Option<&ConfigDocument> {
        self.config.as_ref()
    }

    pub fn patch_report(&self) -> Option<&PatchReport> {
        self.patch_report.as_ref()
    }

    pub fn open_save<B: AsRef<[u8]>>(&mut self, bytes: B) -> Result<&SaveDocument, CoreError> {
        let save = self.engine.load_save(bytes)?;
        Ok(self.save.insert(save))
    }

    pub fn open_config<B: AsRef<[u8]>>(
        &mut self,
        bytes: B,
        patches: &[PatchFile],
    ) -> Result<&PatchReport, CoreError> {
        let (config, report) = self.engine.load_config(bytes, patches)?;
        self.config = Some(config);
        Ok(self.patch_report.insert(report))
    }

    pub fn open<B: AsRef<[u8]>>(
        &mut self,
        bytes: B,
        patches: &[PatchFile],
    ) -> Result<Dialect, CoreError> {
        let loaded = self.engine.open_bytes(bytes, patches)?;
        Ok(self.install(loaded))
    }

    /// Takes a document produced by `Engine::open_bytes` or
    /// `Engine::spawn_open`, replacing the document of the same kind.
    pub fn install(&mut self, loaded: Loaded) -> Dialect {
        let dialect = loaded.dialect();
        match loaded {
            Loaded::Save(save) => self.save = Some(save),
            Loaded::Config { config, report } => {
                self.config = Some(config);
                self.patch_report = Some(report);
            }
        }
        debug!(%dialect, "document installed");
        dialect
    }

    pub fn capabilities(&self) -> Capabilities {
        let mut issues = Vec::new();

        let can_patch = self.engine.options.patch_capability == PatchCapability::Available;
        if !can_patch {
            issues.push(CapabilityIssue::PatchingUnavailable);
        }

        let can_select_town = self.save.as_ref().is_some_and(SaveDocument::has_town_selector);
        if self.save.is_some() && !can_select_town {
            issues.push(CapabilityIssue::NoTownSelector);
        }

        let can_add_items = self.save.is_some() && self.config.is_some();
        if self.config.is_none() {
            issues.push(CapabilityIssue::NoConfigLoaded);
        }

        let can_edit_resources = self
            .save
            .as_ref()
            .is_some_and(|save| resources::read(save).is_ok());
        if self.save.is_some() && !can_edit_resources {
            issues.push(CapabilityIssue::ResourcesUnavailable);
        }

        Capabilities {
            can_select_town,
            can_add_items,
            can_edit_resources,
            can_patch,
            issues,
        }
    }

    pub fn summary(&self) -> Result<SaveSummary, CoreError> {
        let save = self.require_save()?;
        let selected = save.selected_town().key();
        let towns = save
            .towns()
            .iter()
            .map(|town| TownSummary {
                key: town.key().clone(),
                name: town.display_name(),
                item_count: town.len(),
                selected: town.key() == selected,
            })
            .collect();

        Ok(SaveSummary {
            dialect: save.dialect(),
            player_id: save.player_id(),
            player_name: save.player_name(),
            towns,
            item_count: save.item_count(),
            modified: save.is_modified(),
        })
    }

    pub fn reconcile(&self) -> Result<ReconciliationReport, CoreError> {
        let save = self.require_save()?;
        let config = self.require_config()?;
        Ok(reconcile::reconcile(save, config))
    }

    pub fn reconcile_town(&self, town: &TownKey) -> Result<ReconciliationReport, CoreError> {
        let save = self.require_save()?;
        let config = self.require_config()?;
        reconcile::reconcile_town(save, town, config)
    }

    pub fn add(
        &mut self,
        identifier: &Identifier,
        overrides: &Map<String, Value>,
    ) -> Result<ItemRef, CoreError> {
        let config = self.config.as_ref().ok_or_else(no_config)?;
        let save = self.save.as_mut().ok_or_else(no_save)?;
        mutation::add(save, config, identifier, overrides)
    }

    pub fn add_many(
        &mut self,
        identifier: &Identifier,
        overrides: &Map<String, Value>,
        quantity: usize,
    ) -> Result<Vec<ItemRef>, CoreError> {
        let config = self.config.as_ref().ok_or_else(no_config)?;
        let save = self.save.as_mut().ok_or_else(no_save)?;
        mutation::add_many(save, config, identifier, overrides, quantity)
    }

    pub fn delete(&mut self, reference: ItemRef) -> Result<ItemRecord, CoreError> {
        mutation::delete(self.require_save_mut()?, reference)
    }

    pub fn delete_many(&mut self, references: &[ItemRef]) -> Result<Vec<ItemRecord>, CoreError> {
        mutation::delete_many(self.require_save_mut()?, references)
    }

    pub fn list(&self, town: &TownKey) -> Result<ItemListing, CoreError> {
        mutation::list(self.require_save()?, town)
    }

    pub fn list_selected(&self) -> Result<ItemListing, CoreError> {
        Ok(mutation::list_selected(self.require_save()?))
    }

    pub fn select_town(&mut self, town: &TownKey) -> Result<(), CoreError> {
        mutation::select_town(self.require_save_mut()?, town)
    }

    pub fn find(&self, town: &TownKey, identifier: &Identifier) -> Result<Vec<ItemRef>, CoreError> {
        mutation::find(self.require_save()?, town, identifier)
    }

    pub fn item_at(&self, town: &TownKey, index: usize) -> Result<ItemRef, CoreError> {
        mutation::item_at(self.require_save()?, town, index)
    }

    pub fn resources(&self) -> Result<PlayerResources, CoreError> {
        resources::read(self.require_save()?)
    }

    pub fn set_resource(&mut self, resource: Resource, value: i64) -> Result<(), CoreError> {
        resources::set_resource(self.require_save_mut()?, resource, value)
    }

    pub fn set_race(&mut self, race: Race) -> Result<(), CoreError> {
        resources::set_race(self.require_save_mut()?, race)
    }

    pub fn set_skin(&mut self, skin: usize) -> Result<(), CoreError> {
        resources::set_skin(self.require_save_mut()?, skin)
    }

    pub fn asset_path(&self, identifier: &Identifier) -> Result<Option<PathBuf>, CoreError> {
        self.engine
            .asset_locator()
            .locate(self.require_config()?, identifier)
    }

    /// Bytes of the current save: the original bytes when nothing changed.
    pub fn serialize(&self) -> Result<Vec<u8>, CoreError> {
        self.require_save()?.to_bytes()
    }

    /// Bytes of the configuration with every applied patch folded in.
    pub fn export_config(&self) -> Result<Vec<u8>, CoreError> {
        self.require_config()?.to_bytes()
    }

    fn require_save(&self) -> Result<&SaveDocument, CoreError> {
        self.save.as_ref().ok_or_else(no_save)
    }

    fn require_save_mut(&mut self) -> Result<&mut SaveDocument, CoreError> {
        self.save.as_mut().ok_or_else(no_save)
    }

    fn require_config(&self) -> Result<&ConfigDocument, CoreError> {
        self.config.as_ref().ok_or_else(no_config)
    }
}

fn no_save() -> CoreError {
    CoreError::new(CoreErrorCode::UnsupportedOperation, "no save is loaded")
}

fn no_config() -> CoreError {
    CoreError::new(
        CoreErrorCode::UnsupportedOperation,
        "no configuration is loaded",
    )
}
