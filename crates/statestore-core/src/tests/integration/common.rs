#![cfg(test)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tempfile::{tempdir, TempDir};

use crate::kernel::component::Disposer;
use crate::kernel::container::StorageContainer;
use crate::kernel::error::Result;
use crate::storage::config::ManagerConfig;
use crate::storage::local::LocalStorageProvider;
use crate::storage::manager::{ManagerDeps, StateStorageManager};
use crate::storage::spec::{Resolution, RoamingType, StateStorageOperation, StorageSpec};
use crate::storage::state::StateData;
use crate::storage::traits::{
    ExternalizationSession, LegacyStorageLookup, PathMacroSubstitutor, PersistentComponent,
    SaveSession, StateSplitter, StateStorage, StateStorageChooser, StaticHostMode, StreamProvider,
};

// ===== MOCK STORAGES =====

/// One write forwarded to a [`RecordingStorage`] session
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedWrite {
    pub component_name: String,
    pub state: StateData,
    pub origin_file: Option<String>,
}

/// Storage that records every write and produces a save unit per non-empty session
#[derive(Debug, Default)]
pub struct RecordingStorage {
    pub label: String,
    pub session_starts: AtomicUsize,
    pub writes: Arc<Mutex<Vec<RecordedWrite>>>,
    /// Never start a session
    pub refuse_sessions: bool,
    /// Sessions report nothing to save
    pub nothing_to_save: bool,
}

impl RecordingStorage {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            ..Self::default()
        }
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.writes.lock().unwrap().clone()
    }

    pub fn session_starts(&self) -> usize {
        self.session_starts.load(Ordering::SeqCst)
    }
}

impl StateStorage for RecordingStorage {
    fn start_externalization(&self) -> Option<Box<dyn ExternalizationSession>> {
        if self.refuse_sessions {
            return None;
        }
        self.session_starts.fetch_add(1, Ordering::SeqCst);
        Some(Box::new(RecordingSession {
            label: self.label.clone(),
            writes: Arc::clone(&self.writes),
            written: 0,
            nothing_to_save: self.nothing_to_save,
        }))
    }
}

struct RecordingSession {
    label: String,
    writes: Arc<Mutex<Vec<RecordedWrite>>>,
    written: usize,
    nothing_to_save: bool,
}

impl ExternalizationSession for RecordingSession {
    fn set_state(
        &mut self,
        _component: &dyn PersistentComponent,
        component_name: &str,
        state: StateData,
        origin: Option<&StorageSpec>,
    ) {
        self.written += 1;
        self.writes.lock().unwrap().push(RecordedWrite {
            component_name: component_name.to_string(),
            state,
            origin_file: origin.map(|spec| spec.file.clone()),
        });
    }

    fn create_save_session(&mut self) -> Option<Arc<dyn SaveSession>> {
        if self.nothing_to_save || self.written == 0 {
            return None;
        }
        Some(Arc::new(LabelledSaveSession {
            label: self.label.clone(),
            writes: self.written,
        }))
    }
}

#[derive(Debug)]
pub struct LabelledSaveSession {
    pub label: String,
    pub writes: usize,
}

impl SaveSession for LabelledSaveSession {
    fn save(&self) -> Result<()> {
        Ok(())
    }
}

// ===== MOCK COMPONENTS =====

/// Component without any optional capability
pub struct PlainComponent;

impl PersistentComponent for PlainComponent {}

/// Component routing each declared file through a fixed table; unlisted files are written
#[derive(Default)]
pub struct RoutedComponent {
    pub routes: HashMap<String, Resolution>,
    pub roaming_disabled: bool,
    pub asked: Mutex<Vec<(String, StateStorageOperation)>>,
}

impl RoutedComponent {
    pub fn new(routes: &[(&str, Resolution)]) -> Self {
        Self {
            routes: routes
                .iter()
                .map(|(file, resolution)| (file.to_string(), *resolution))
                .collect(),
            ..Self::default()
        }
    }
}

impl StateStorageChooser for RoutedComponent {
    fn resolution(&self, spec: &StorageSpec, operation: StateStorageOperation) -> Resolution {
        self.asked.lock().unwrap().push((spec.file.clone(), operation));
        self.routes.get(&spec.file).copied().unwrap_or(Resolution::Write)
    }
}

impl PersistentComponent for RoutedComponent {
    fn storage_chooser(&self) -> Option<&dyn StateStorageChooser> {
        Some(self)
    }

    fn is_roaming_disabled(&self) -> bool {
        self.roaming_disabled
    }
}

// ===== MOCK COLLABORATORS =====

/// Legacy lookup answering the same path for every component
pub struct FixedLegacyLookup(pub Option<String>);

impl LegacyStorageLookup for FixedLegacyLookup {
    fn legacy_spec_for(
        &self,
        _component: &dyn PersistentComponent,
        _component_name: &str,
        _operation: StateStorageOperation,
    ) -> Option<String> {
        self.0.clone()
    }
}

#[derive(Debug, Default)]
pub struct RecordingStreamProvider {
    pub saved: Mutex<Vec<(String, Vec<u8>, RoamingType)>>,
    pub deleted: Mutex<Vec<(String, RoamingType)>>,
}

impl StreamProvider for RecordingStreamProvider {
    fn save_content(&self, file_spec: &str, content: &[u8], roaming_type: RoamingType) -> Result<()> {
        self.saved
            .lock()
            .unwrap()
            .push((file_spec.to_string(), content.to_vec(), roaming_type));
        Ok(())
    }

    fn delete(&self, file_spec: &str, roaming_type: RoamingType) -> Result<()> {
        self.deleted.lock().unwrap().push((file_spec.to_string(), roaming_type));
        Ok(())
    }
}

/// Substitutor replacing one literal prefix with a token
#[derive(Debug)]
pub struct PrefixSubstitutor {
    pub prefix: String,
    pub token: String,
}

impl PathMacroSubstitutor for PrefixSubstitutor {
    fn expand_path(&self, text: &str) -> String {
        text.replace(&self.token, &self.prefix)
    }

    fn collapse_path(&self, text: &str) -> String {
        text.replace(&self.prefix, &self.token)
    }
}

/// Splitter writing each top-level key of a state to its own file
#[derive(Debug, Default)]
pub struct KeySplitter;

impl StateSplitter for KeySplitter {
    fn split_state(&self, component_name: &str, state: &StateData) -> Vec<(String, StateData)> {
        state
            .iter()
            .map(|(key, value)| {
                (
                    format!("{}.{}.json", component_name, key),
                    StateData::new().with(key, value.clone()),
                )
            })
            .collect()
    }
}

// ===== FIXTURE =====

/// A manager over a temporary directory, with `$ROOT$` pointing at it
pub struct ManagerFixture {
    pub manager: Arc<StateStorageManager>,
    pub container: Arc<StorageContainer>,
    pub disposer: Disposer,
    pub temp_dir: TempDir,
}

impl ManagerFixture {
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }
}

pub fn setup_manager() -> ManagerFixture {
    setup_manager_with(|deps| deps)
}

/// Build a fixture, letting the caller adjust the collaborators first
pub fn setup_manager_with<F>(customize: F) -> ManagerFixture
where
    F: FnOnce(ManagerDeps) -> ManagerDeps,
{
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let root = temp_dir.path().to_string_lossy().to_string();

    let container = Arc::new(StorageContainer::new());
    let provider = Arc::new(LocalStorageProvider::new(temp_dir.path().to_path_buf()));
    let deps = ManagerDeps::new(provider, container.clone())
        .with_host_mode(Arc::new(StaticHostMode(false)));
    let config = ManagerConfig::default().with_macro("$ROOT$", root);

    let disposer = Disposer::new();
    let manager = StateStorageManager::new(&config, customize(deps), &disposer);

    ManagerFixture {
        manager,
        container,
        disposer,
        temp_dir,
    }
}

pub fn state(pairs: &[(&str, &str)]) -> StateData {
    pairs.iter().fold(StateData::new(), |acc, (key, value)| {
        acc.with(key, serde_json::Value::String(value.to_string()))
    })
}
