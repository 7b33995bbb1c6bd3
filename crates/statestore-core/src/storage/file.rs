use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use crate::kernel::error::Result;
use crate::storage::provider::StorageProvider;
use crate::storage::spec::{RoamingType, StorageSpec};
use crate::storage::state::{StateData, StorageData};
use crate::storage::traits::{
    ExternalizationSession, PathMacroSubstitutor, PersistentComponent, SaveSession, StateStorage,
    StreamProviderSlot,
};

/// Builds the initial content of a file storage from `(file_spec, file_path)`.
pub type StorageDataFactory = Arc<dyn Fn(&str, &Path) -> StorageData + Send + Sync>;

/// Everything a [`FileBasedStorage`] is built from
pub struct FileStorageParams {
    pub file_path: PathBuf,
    pub file_spec: String,
    pub roaming_type: RoamingType,
    pub substitutor: Option<Arc<dyn PathMacroSubstitutor>>,
    pub data_factory: StorageDataFactory,
    pub use_prolog: bool,
    pub provider: Arc<dyn StorageProvider>,
    pub stream_provider: StreamProviderSlot,
}

/// Storage holding the state of several components in a single file
#[derive(Debug)]
pub struct FileBasedStorage {
    inner: Arc<FileStorageInner>,
}

#[derive(Debug)]
struct FileStorageInner {
    file_spec: String,
    file_path: PathBuf,
    roaming_type: RoamingType,
    substitutor: Option<Arc<dyn PathMacroSubstitutor>>,
    use_prolog: bool,
    provider: Arc<dyn StorageProvider>,
    stream_provider: StreamProviderSlot,
    // Last committed content
    data: RwLock<StorageData>,
}

impl FileBasedStorage {
    /// Build the storage, loading the existing file when there is one.
    pub fn new(params: FileStorageParams) -> Self {
        let initial = (params.data_factory)(&params.file_spec, &params.file_path);
        let data = if params.provider.is_file(&params.file_path) {
            match params
                .provider
                .read_to_string(&params.file_path)
                .and_then(|text| StorageData::from_document(&text))
            {
                Ok(loaded) => loaded,
                Err(e) => {
                    log::warn!(
                        "Cannot load storage file {}, starting empty: {}",
                        params.file_path.display(),
                        e
                    );
                    initial
                }
            }
        } else {
            initial
        };

        Self {
            inner: Arc::new(FileStorageInner {
                file_spec: params.file_spec,
                file_path: params.file_path,
                roaming_type: params.roaming_type,
                substitutor: params.substitutor,
                use_prolog: params.use_prolog,
                provider: params.provider,
                stream_provider: params.stream_provider,
                data: RwLock::new(data),
            }),
        }
    }

    /// The unexpanded path template this storage was declared with
    pub fn file_spec(&self) -> &str {
        &self.inner.file_spec
    }

    pub fn file_path(&self) -> &Path {
        &self.inner.file_path
    }

    /// Effective roaming type, after the workspace-file override
    pub fn roaming_type(&self) -> RoamingType {
        self.inner.roaming_type
    }

    pub fn use_prolog(&self) -> bool {
        self.inner.use_prolog
    }

    pub fn macro_substitutor(&self) -> Option<&Arc<dyn PathMacroSubstitutor>> {
        self.inner.substitutor.as_ref()
    }

    pub fn root_tag(&self) -> String {
        self.inner.read_data().root_tag().to_string()
    }

    /// Committed state of a component
    pub fn component_state(&self, component_name: &str) -> Option<StateData> {
        self.inner.read_data().state(component_name).cloned()
    }

    pub fn component_names(&self) -> Vec<String> {
        self.inner.read_data().component_names()
    }
}

impl FileStorageInner {
    fn read_data(&self) -> std::sync::RwLockReadGuard<'_, StorageData> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn mirror(&self, content: Option<&[u8]>) {
        if self.roaming_type == RoamingType::Disabled {
            return;
        }
        let Some(stream_provider) = self.stream_provider.get() else {
            return;
        };
        if !stream_provider.is_enabled() {
            return;
        }
        let result = match content {
            Some(bytes) => stream_provider.save_content(&self.file_spec, bytes, self.roaming_type),
            None => stream_provider.delete(&self.file_spec, self.roaming_type),
        };
        // Remote mirroring is best effort; the local file is authoritative.
        if let Err(e) = result {
            log::warn!("Cannot mirror {} to stream provider: {}", self.file_spec, e);
        }
    }
}

impl StateStorage for FileBasedStorage {
    fn start_externalization(&self) -> Option<Box<dyn ExternalizationSession>> {
        let committed = self.inner.read_data().clone();
        Some(Box::new(FileExternalizationSession {
            storage: Arc::clone(&self.inner),
            pending: committed.clone(),
            committed,
        }))
    }
}

struct FileExternalizationSession {
    storage: Arc<FileStorageInner>,
    committed: StorageData,
    pending: StorageData,
}

impl ExternalizationSession for FileExternalizationSession {
    fn set_state(
        &mut self,
        _component: &dyn PersistentComponent,
        component_name: &str,
        state: StateData,
        _origin: Option<&StorageSpec>,
    ) {
        let state = match &self.storage.substitutor {
            Some(substitutor) => state.collapse_paths(substitutor.as_ref()),
            None => state,
        };
        self.pending.set_state(component_name, state);
    }

    fn create_save_session(&mut self) -> Option<Arc<dyn SaveSession>> {
        if self.pending == self.committed {
            return None;
        }
        Some(Arc::new(FileSaveSession {
            storage: Arc::clone(&self.storage),
            data: self.pending.clone(),
        }))
    }
}

#[derive(Debug)]
struct FileSaveSession {
    storage: Arc<FileStorageInner>,
    data: StorageData,
}

impl SaveSession for FileSaveSession {
    fn save(&self) -> Result<()> {
        let storage = &self.storage;
        if self.data.is_empty() {
            // Nothing left to persist: the file goes away
            if storage.provider.exists(&storage.file_path) {
                storage.provider.remove_file(&storage.file_path)?;
            }
            storage.mirror(None);
        } else {
            let document = self.data.to_document(storage.use_prolog)?;
            storage.provider.write_string(&storage.file_path, &document)?;
            storage.mirror(Some(document.as_bytes()));
        }

        *storage.data.write().unwrap_or_else(PoisonError::into_inner) = self.data.clone();
        log::debug!("Saved storage {} to {}", storage.file_spec, storage.file_path.display());
        Ok(())
    }
}
