use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use crate::kernel::error::Result;
use crate::storage::error::StorageSystemError;
use crate::storage::provider::StorageProvider;
use crate::storage::spec::StorageSpec;
use crate::storage::state::StateData;
use crate::storage::traits::{
    ExternalizationSession, PathMacroSubstitutor, PersistentComponent, SaveSession, StateSplitter,
    StateStorage,
};

/// Storage spreading component state over the files of one directory.
///
/// The splitter decides which files a component state becomes; files written
/// by an earlier save and no longer produced are removed.
#[derive(Debug)]
pub struct DirectoryBasedStorage {
    inner: Arc<DirectoryStorageInner>,
}

#[derive(Debug)]
struct DirectoryStorageInner {
    dir_path: PathBuf,
    splitter: Arc<dyn StateSplitter>,
    substitutor: Option<Arc<dyn PathMacroSubstitutor>>,
    provider: Arc<dyn StorageProvider>,
    committed: RwLock<Committed>,
}

#[derive(Debug, Default)]
struct Committed {
    states: BTreeMap<String, StateData>,
    files: BTreeSet<String>,
}

impl DirectoryBasedStorage {
    pub fn new(
        dir_path: PathBuf,
        splitter: Arc<dyn StateSplitter>,
        substitutor: Option<Arc<dyn PathMacroSubstitutor>>,
        provider: Arc<dyn StorageProvider>,
    ) -> Self {
        Self {
            inner: Arc::new(DirectoryStorageInner {
                dir_path,
                splitter,
                substitutor,
                provider,
                committed: RwLock::new(Committed::default()),
            }),
        }
    }

    pub fn dir_path(&self) -> &Path {
        &self.inner.dir_path
    }

    pub fn splitter(&self) -> &Arc<dyn StateSplitter> {
        &self.inner.splitter
    }

    pub fn component_state(&self, component_name: &str) -> Option<StateData> {
        self.inner
            .committed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .states
            .get(component_name)
            .cloned()
    }

    /// Names of the files written by the last save
    pub fn file_names(&self) -> Vec<String> {
        self.inner
            .committed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .files
            .iter()
            .cloned()
            .collect()
    }
}

impl StateStorage for DirectoryBasedStorage {
    fn start_externalization(&self) -> Option<Box<dyn ExternalizationSession>> {
        let committed = self
            .inner
            .committed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .states
            .clone();
        Some(Box::new(DirectoryExternalizationSession {
            storage: Arc::clone(&self.inner),
            pending: committed.clone(),
            committed,
        }))
    }
}

struct DirectoryExternalizationSession {
    storage: Arc<DirectoryStorageInner>,
    committed: BTreeMap<String, StateData>,
    pending: BTreeMap<String, StateData>,
}

impl ExternalizationSession for DirectoryExternalizationSession {
    fn set_state(
        &mut self,
        _component: &dyn PersistentComponent,
        component_name: &str,
        state: StateData,
        _origin: Option<&StorageSpec>,
    ) {
        if state.is_empty() {
            self.pending.remove(component_name);
            return;
        }
        let state = match &self.storage.substitutor {
            Some(substitutor) => state.collapse_paths(substitutor.as_ref()),
            None => state,
        };
        self.pending.insert(component_name.to_string(), state);
    }

    fn create_save_session(&mut self) -> Option<Arc<dyn SaveSession>> {
        if self.pending == self.committed {
            return None;
        }
        Some(Arc::new(DirectorySaveSession {
            storage: Arc::clone(&self.storage),
            states: self.pending.clone(),
        }))
    }
}

#[derive(Debug)]
struct DirectorySaveSession {
    storage: Arc<DirectoryStorageInner>,
    states: BTreeMap<String, StateData>,
}

impl SaveSession for DirectorySaveSession {
    fn save(&self) -> Result<()> {
        let storage = &self.storage;
        let mut written = BTreeSet::new();
        for (component_name, state) in &self.states {
            for (file_name, piece) in storage.splitter.split_state(component_name, state) {
                let content = serde_json::to_string_pretty(&piece)
                    .map_err(|e| StorageSystemError::serialization("json", e))?;
                storage
                    .provider
                    .write_string(&storage.dir_path.join(&file_name), &content)?;
                written.insert(file_name);
            }
        }

        let mut committed = storage.committed.write().unwrap_or_else(PoisonError::into_inner);
        for stale in committed.files.difference(&written) {
            let path = storage.dir_path.join(stale);
            if storage.provider.exists(&path) {
                storage.provider.remove_file(&path)?;
            }
        }
        committed.states = self.states.clone();
        committed.files = written;
        log::debug!("Saved directory storage {}", storage.dir_path.display());
        Ok(())
    }
}
