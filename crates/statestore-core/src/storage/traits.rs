use std::any::Any;
use std::fmt::Debug;
use std::sync::{Arc, PoisonError, RwLock};

use crate::kernel::error::Result;
use crate::storage::spec::{Resolution, RoamingType, StateStorageOperation, StorageSpec};
use crate::storage::state::StateData;

/// A persistence medium for component state.
///
/// Instances are shared (`Arc`) and identified by pointer: the manager keeps at
/// most one per resolution key.
pub trait StateStorage: Any + Send + Sync + Debug {
    /// Begin collecting writes for one save round. `None` means this storage
    /// cannot be written.
    fn start_externalization(&self) -> Option<Box<dyn ExternalizationSession>>;
}

/// Pending writes to one storage within a save round
pub trait ExternalizationSession: Send {
    fn set_state(
        &mut self,
        component: &dyn PersistentComponent,
        component_name: &str,
        state: StateData,
        origin: Option<&StorageSpec>,
    );

    /// Produce the committable unit, or `None` when nothing needs to be persisted.
    fn create_save_session(&mut self) -> Option<Arc<dyn SaveSession>>;
}

/// A prepared, committable unit of persisted change
pub trait SaveSession: Send + Sync + Debug {
    fn save(&self) -> Result<()>;
}

/// A component whose state is persisted.
///
/// Both capabilities are optional; the defaults describe a plain component.
pub trait PersistentComponent {
    /// Per-target routing capability
    fn storage_chooser(&self) -> Option<&dyn StateStorageChooser> {
        None
    }

    /// Whether legacy storages of this component must stay local
    fn is_roaming_disabled(&self) -> bool {
        false
    }
}

/// Decides, per declared storage, what a component write does to it
pub trait StateStorageChooser {
    fn resolution(&self, spec: &StorageSpec, operation: StateStorageOperation) -> Resolution;
}

/// Finds the pre-declaration storage path a component used to be saved to
pub trait LegacyStorageLookup: Send + Sync {
    fn legacy_spec_for(
        &self,
        component: &dyn PersistentComponent,
        component_name: &str,
        operation: StateStorageOperation,
    ) -> Option<String>;
}

/// Lookup that never knows a legacy storage
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLegacyStorage;

impl LegacyStorageLookup for NoLegacyStorage {
    fn legacy_spec_for(
        &self,
        _component: &dyn PersistentComponent,
        _component_name: &str,
        _operation: StateStorageOperation,
    ) -> Option<String> {
        None
    }
}

/// Host mode query consulted by the missing-extension check
pub trait HostMode: Send + Sync {
    fn is_headless_or_test_mode(&self) -> bool;
}

/// Host mode fixed at construction
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticHostMode(pub bool);

impl HostMode for StaticHostMode {
    fn is_headless_or_test_mode(&self) -> bool {
        self.0
    }
}

/// Mirrors persisted content to a remote location
pub trait StreamProvider: Send + Sync + Debug {
    fn is_enabled(&self) -> bool {
        true
    }

    fn save_content(&self, file_spec: &str, content: &[u8], roaming_type: RoamingType) -> Result<()>;

    fn delete(&self, file_spec: &str, roaming_type: RoamingType) -> Result<()>;
}

/// Replaceable, shared reference to the current stream provider.
///
/// Last writer wins; readers see whichever provider was set most recently.
#[derive(Debug, Clone, Default)]
pub struct StreamProviderSlot {
    current: Arc<RwLock<Option<Arc<dyn StreamProvider>>>>,
}

impl StreamProviderSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Arc<dyn StreamProvider>> {
        self.current.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set(&self, provider: Option<Arc<dyn StreamProvider>>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = provider;
    }
}

/// Replaces absolute path fragments inside persisted values with macros and back
pub trait PathMacroSubstitutor: Send + Sync + Debug {
    fn expand_path(&self, text: &str) -> String;
    fn collapse_path(&self, text: &str) -> String;
}

/// Splits a component state into the files of a directory storage
pub trait StateSplitter: Send + Sync + Debug {
    /// Returns `(file name, content)` pairs; file names must be unique.
    fn split_state(&self, component_name: &str, state: &StateData) -> Vec<(String, StateData)>;
}
