use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt::{self, Debug};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use uuid::Uuid;

use crate::kernel::component::{Disposer, KernelComponent};
use crate::kernel::container::ComponentContainer;
use crate::kernel::error::Result;
use crate::storage::config::ManagerConfig;
use crate::storage::directory::DirectoryBasedStorage;
use crate::storage::error::StorageSystemError;
use crate::storage::externalization::ExternalizationCoordinator;
use crate::storage::file::{FileBasedStorage, FileStorageParams, StorageDataFactory};
use crate::storage::macros::MacroTable;
use crate::storage::provider::StorageProvider;
use crate::storage::spec::{RoamingType, StateStorageOperation, StorageSpec, StorageVariant};
use crate::storage::state::StorageData;
use crate::storage::traits::{
    HostMode, LegacyStorageLookup, NoLegacyStorage, PathMacroSubstitutor, PersistentComponent,
    StateStorage, StaticHostMode, StreamProvider, StreamProviderSlot,
};

/// The two strategies a concrete manager supplies to every file storage it builds
#[derive(Clone)]
pub struct FileStorageStrategies {
    pub data_factory: StorageDataFactory,
    pub use_prolog: bool,
}

impl FileStorageStrategies {
    pub fn new(data_factory: StorageDataFactory, use_prolog: bool) -> Self {
        Self { data_factory, use_prolog }
    }

    /// Empty documents rooted at `root_tag`, written with a prolog
    pub fn for_root_tag(root_tag: impl Into<String>) -> Self {
        let root_tag = root_tag.into();
        Self {
            data_factory: Arc::new(move |_file_spec: &str, _file_path: &Path| {
                StorageData::new(root_tag.clone())
            }),
            use_prolog: true,
        }
    }
}

impl Debug for FileStorageStrategies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStorageStrategies")
            .field("use_prolog", &self.use_prolog)
            .finish_non_exhaustive()
    }
}

/// Collaborators injected into a [`StateStorageManager`]
pub struct ManagerDeps {
    pub provider: Arc<dyn StorageProvider>,
    pub container: Arc<dyn ComponentContainer>,
    pub legacy_lookup: Arc<dyn LegacyStorageLookup>,
    pub host_mode: Arc<dyn HostMode>,
    /// The manager's own macro substitutor
    pub substitutor: Option<Arc<dyn PathMacroSubstitutor>>,
    /// Per path template replacements for `substitutor`; `None` disables substitution
    pub substitutor_overrides: HashMap<String, Option<Arc<dyn PathMacroSubstitutor>>>,
    /// Defaults to [`FileStorageStrategies::for_root_tag`] with the configured root tag
    pub strategies: Option<FileStorageStrategies>,
}

impl ManagerDeps {
    pub fn new(provider: Arc<dyn StorageProvider>, container: Arc<dyn ComponentContainer>) -> Self {
        Self {
            provider,
            container,
            legacy_lookup: Arc::new(NoLegacyStorage),
            host_mode: Arc::new(StaticHostMode(false)),
            substitutor: None,
            substitutor_overrides: HashMap::new(),
            strategies: None,
        }
    }

    pub fn with_legacy_lookup(mut self, lookup: Arc<dyn LegacyStorageLookup>) -> Self {
        self.legacy_lookup = lookup;
        self
    }

    pub fn with_host_mode(mut self, host_mode: Arc<dyn HostMode>) -> Self {
        self.host_mode = host_mode;
        self
    }

    pub fn with_substitutor(mut self, substitutor: Arc<dyn PathMacroSubstitutor>) -> Self {
        self.substitutor = Some(substitutor);
        self
    }

    pub fn with_substitutor_override(
        mut self,
        file_spec: impl Into<String>,
        substitutor: Option<Arc<dyn PathMacroSubstitutor>>,
    ) -> Self {
        self.substitutor_overrides.insert(file_spec.into(), substitutor);
        self
    }

    pub fn with_strategies(mut self, strategies: FileStorageStrategies) -> Self {
        self.strategies = Some(strategies);
        self
    }
}

/// Resolves storage specs into cached storage instances.
///
/// One lock guards the cache for lookup, construction and insertion, so at
/// most one instance is ever built per resolution key. Macro expansion takes
/// the macro table's own lock while the cache lock is held, never the other
/// way round. The cache lock is not re-entrant: storage construction must not
/// call back into the manager.
pub struct StateStorageManager {
    name: &'static str,
    macros: MacroTable,
    storages: Mutex<HashMap<String, Arc<dyn StateStorage>>>,
    stream_provider: StreamProviderSlot,
    root_tag_name: String,
    workspace_file: String,
    provider: Arc<dyn StorageProvider>,
    container: Arc<dyn ComponentContainer>,
    legacy_lookup: Arc<dyn LegacyStorageLookup>,
    host_mode: Arc<dyn HostMode>,
    substitutor: Option<Arc<dyn PathMacroSubstitutor>>,
    substitutor_overrides: HashMap<String, Option<Arc<dyn PathMacroSubstitutor>>>,
    strategies: FileStorageStrategies,
}

impl StateStorageManager {
    /// Create a manager and register it with its owner's teardown registry.
    pub fn new(config: &ManagerConfig, deps: ManagerDeps, parent: &Disposer) -> Arc<Self> {
        let strategies = deps
            .strategies
            .unwrap_or_else(|| FileStorageStrategies::for_root_tag(config.root_tag_name.clone()));

        let manager = Arc::new(Self {
            name: "StateStorageManager",
            macros: MacroTable::new(),
            storages: Mutex::new(HashMap::new()),
            stream_provider: StreamProviderSlot::new(),
            root_tag_name: config.root_tag_name.clone(),
            workspace_file: config.workspace_file.clone(),
            provider: deps.provider,
            container: deps.container,
            legacy_lookup: deps.legacy_lookup,
            host_mode: deps.host_mode,
            substitutor: deps.substitutor,
            substitutor_overrides: deps.substitutor_overrides,
            strategies,
        });

        for definition in &config.macros {
            manager.add_macro(&definition.token, &definition.expansion);
        }

        parent.register(manager.clone());
        manager
    }

    fn lock_storages(&self) -> MutexGuard<'_, HashMap<String, Arc<dyn StateStorage>>> {
        self.storages.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn root_tag_name(&self) -> &str {
        &self.root_tag_name
    }

    pub fn workspace_file(&self) -> &str {
        &self.workspace_file
    }

    pub fn macro_substitutor(&self) -> Option<&Arc<dyn PathMacroSubstitutor>> {
        self.substitutor.as_ref()
    }

    /// Substitutor handed to storages declared with `file_spec`
    pub fn macro_substitutor_for(&self, file_spec: &str) -> Option<Arc<dyn PathMacroSubstitutor>> {
        match self.substitutor_overrides.get(file_spec) {
            Some(overridden) => overridden.clone(),
            None => self.substitutor.clone(),
        }
    }

    // --- Macros ---

    pub fn add_macro(&self, token: &str, expansion: &str) {
        self.macros.add(token, expansion);
    }

    pub fn macro_value(&self, token: &str) -> Option<String> {
        self.macros.get(token)
    }

    pub fn macros(&self) -> &MacroTable {
        &self.macros
    }

    pub fn expand_macros(&self, path: &str) -> Result<String> {
        self.macros.expand(path)
    }

    pub fn collapse_macros(&self, path: &str) -> String {
        self.macros.collapse(path)
    }

    // --- Storage cache ---

    /// Cached storage for `spec`, built on first use.
    pub fn get_state_storage(&self, spec: &StorageSpec) -> Result<Arc<dyn StateStorage>> {
        let key = spec.resolution_key();
        let mut storages = self.lock_storages();
        if let Some(existing) = storages.get(key) {
            return Ok(Arc::clone(existing));
        }

        let storage = self.create_state_storage(spec)?;
        storages.insert(key.to_string(), Arc::clone(&storage));
        Ok(storage)
    }

    /// Cached file storage for a bare path template, built on first use.
    pub fn get_file_storage(
        &self,
        file_spec: &str,
        roaming_type: RoamingType,
    ) -> Result<Arc<dyn StateStorage>> {
        let mut storages = self.lock_storages();
        if let Some(existing) = storages.get(file_spec) {
            return Ok(Arc::clone(existing));
        }

        let storage = self.create_file_storage(file_spec, roaming_type)?;
        storages.insert(file_spec.to_string(), Arc::clone(&storage));
        Ok(storage)
    }

    /// File storages already built for `keys`; never builds anything.
    /// Each storage appears once, in the order of its first requested key.
    pub fn cached_file_storages<I, S>(&self, keys: I) -> Vec<Arc<FileBasedStorage>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let storages = self.lock_storages();
        collect_file_storages(&storages, keys)
    }

    /// [`cached_file_storages`](Self::cached_file_storages) for two key sets
    /// under a single lock acquisition.
    pub fn cached_file_storages_pair<I, J, S, T>(
        &self,
        changed: I,
        deleted: J,
    ) -> (Vec<Arc<FileBasedStorage>>, Vec<Arc<FileBasedStorage>>)
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        let storages = self.lock_storages();
        (
            collect_file_storages(&storages, changed),
            collect_file_storages(&storages, deleted),
        )
    }

    /// Snapshot of every cached resolution key
    pub fn storage_keys(&self) -> HashSet<String> {
        self.lock_storages().keys().cloned().collect()
    }

    /// Drop the cache entry for `key`. The removed storage is not notified.
    pub fn clear_state_storage(&self, key: &str) {
        if self.lock_storages().remove(key).is_some() {
            log::debug!("Cleared cached storage '{}'", key);
        }
    }

    /// Roaming actually used for a file storage declared with `file_spec`
    pub fn effective_roaming_type(&self, file_spec: &str, requested: RoamingType) -> RoamingType {
        if file_spec == self.workspace_file {
            RoamingType::Disabled
        } else {
            requested
        }
    }

    /// Storage the component was saved to before it declared its storages
    pub fn old_storage(
        &self,
        component: &dyn PersistentComponent,
        component_name: &str,
        operation: StateStorageOperation,
    ) -> Result<Option<Arc<dyn StateStorage>>> {
        let Some(file_spec) = self
            .legacy_lookup
            .legacy_spec_for(component, component_name, operation)
        else {
            return Ok(None);
        };

        let roaming_type = if component.is_roaming_disabled() {
            RoamingType::Disabled
        } else {
            RoamingType::PerUser
        };
        self.get_file_storage(&file_spec, roaming_type).map(Some)
    }

    /// Begin a save round
    pub fn start_externalization(&self) -> ExternalizationCoordinator<'_> {
        ExternalizationCoordinator::new(self)
    }

    // --- Stream provider ---

    pub fn stream_provider(&self) -> Option<Arc<dyn StreamProvider>> {
        self.stream_provider.get()
    }

    pub fn set_stream_provider(&self, stream_provider: Option<Arc<dyn StreamProvider>>) {
        self.stream_provider.set(stream_provider);
    }

    // --- Construction (cache lock held) ---

    fn create_state_storage(&self, spec: &StorageSpec) -> Result<Arc<dyn StateStorage>> {
        match &spec.variant {
            StorageVariant::Custom { class } => {
                let registration_key = Uuid::new_v4().to_string();
                log::debug!(
                    "Constructing custom storage '{}' under key {}",
                    class.name(),
                    registration_key
                );
                self.container.construct_storage(&registration_key, class)
            }
            StorageVariant::DirectoryBased { splitter } => {
                let dir_path = self.expand_macros(&spec.file)?;
                let splitter = self.container.construct_splitter(splitter)?;
                log::debug!("Constructing directory storage '{}' at {}", spec.file, dir_path);
                Ok(Arc::new(DirectoryBasedStorage::new(
                    PathBuf::from(dir_path),
                    splitter,
                    self.macro_substitutor_for(&spec.file),
                    Arc::clone(&self.provider),
                )))
            }
            StorageVariant::FileBased => self.create_file_storage(&spec.file, spec.roaming_type),
        }
    }

    fn create_file_storage(
        &self,
        file_spec: &str,
        roaming_type: RoamingType,
    ) -> Result<Arc<dyn StateStorage>> {
        let file_path = self.expand_macros(file_spec)?;
        if !self.host_mode.is_headless_or_test_mode() && !has_extension(&file_path) {
            return Err(StorageSystemError::MissingExtension {
                path: PathBuf::from(file_path),
            }
            .into());
        }

        let roaming_type = self.effective_roaming_type(file_spec, roaming_type);
        log::debug!(
            "Constructing file storage '{}' at {} ({:?})",
            file_spec,
            file_path,
            roaming_type
        );
        Ok(Arc::new(FileBasedStorage::new(FileStorageParams {
            file_path: PathBuf::from(file_path),
            file_spec: file_spec.to_string(),
            roaming_type,
            substitutor: self.macro_substitutor_for(file_spec),
            data_factory: Arc::clone(&self.strategies.data_factory),
            use_prolog: self.strategies.use_prolog,
            provider: Arc::clone(&self.provider),
            stream_provider: self.stream_provider.clone(),
        })))
    }
}

fn collect_file_storages<I, S>(
    storages: &HashMap<String, Arc<dyn StateStorage>>,
    keys: I,
) -> Vec<Arc<FileBasedStorage>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut found: Vec<Arc<FileBasedStorage>> = Vec::new();
    for storage in keys.into_iter().filter_map(|key| storages.get(key.as_ref())) {
        let cloned = storage.clone();
        let any: Arc<dyn Any + Send + Sync> = cloned;
        if let Ok(file_storage) = Arc::downcast::<FileBasedStorage>(any) {
            if !found.iter().any(|existing| Arc::ptr_eq(existing, &file_storage)) {
                found.push(file_storage);
            }
        }
    }
    found
}

/// Whether the last path segment contains a dot
fn has_extension(path: &str) -> bool {
    let file_name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    file_name.contains('.')
}

impl Debug for StateStorageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateStorageManager")
            .field("name", &self.name)
            .field("provider", &self.provider.name())
            .field("macros", &self.macros.len())
            .field("storages", &self.lock_storages().len())
            .finish()
    }
}

#[async_trait]
impl KernelComponent for StateStorageManager {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        Ok(())
    }

    // Cached storages are left as they are; nothing is released here.
    async fn stop(&self) -> Result<()> {
        Ok(())
    }
}
