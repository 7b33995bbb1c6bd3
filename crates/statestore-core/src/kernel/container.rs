use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::kernel::error::{Error, Result};
use crate::storage::spec::{SplitterHandle, StorageClass};
use crate::storage::traits::{StateSplitter, StateStorage};

/// Builds a storage instance of a registered class.
pub type StorageFactory = Arc<dyn Fn() -> Result<Arc<dyn StateStorage>> + Send + Sync>;

/// Builds a state splitter of a registered kind.
pub type SplitterFactory = Arc<dyn Fn() -> Arc<dyn StateSplitter> + Send + Sync>;

/// Dependency-construction collaborator used for host-supplied storage classes
/// and directory splitters.
pub trait ComponentContainer: Send + Sync + Debug {
    /// Register `class` under the unique `key` and return the instance built for it.
    fn construct_storage(&self, key: &str, class: &StorageClass) -> Result<Arc<dyn StateStorage>>;

    /// Build the splitter referred to by `handle`.
    fn construct_splitter(&self, handle: &SplitterHandle) -> Result<Arc<dyn StateSplitter>>;
}

/// Registry of named factories, keyed by class/handle name.
#[derive(Default)]
pub struct StorageContainer {
    storage_classes: RwLock<HashMap<String, StorageFactory>>,
    splitters: RwLock<HashMap<String, SplitterFactory>>,
    // Instances keyed by the registration key they were constructed under
    instances: Mutex<HashMap<String, Arc<dyn StateStorage>>>,
}

impl StorageContainer {
    /// Create a new empty container
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a storage class implementation under `class_name`.
    /// A later registration with the same name replaces the earlier one.
    pub fn register_storage_class<F>(&self, class_name: impl Into<String>, factory: F)
    where
        F: Fn() -> Result<Arc<dyn StateStorage>> + Send + Sync + 'static,
    {
        self.storage_classes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(class_name.into(), Arc::new(factory));
    }

    /// Register a splitter implementation under `name`.
    pub fn register_splitter<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn StateSplitter> + Send + Sync + 'static,
    {
        self.splitters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), Arc::new(factory));
    }

    pub fn has_storage_class(&self, class_name: &str) -> bool {
        self.storage_classes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(class_name)
    }

    /// Get the instance constructed under a registration key.
    pub fn instance(&self, key: &str) -> Option<Arc<dyn StateStorage>> {
        self.instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Registration keys of all constructed instances.
    pub fn registered_keys(&self) -> Vec<String> {
        self.instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

impl ComponentContainer for StorageContainer {
    fn construct_storage(&self, key: &str, class: &StorageClass) -> Result<Arc<dyn StateStorage>> {
        let factory = self
            .storage_classes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(class.name())
            .cloned()
            .ok_or_else(|| {
                Error::container("construct_storage", class.name(), "storage class is not registered")
            })?;

        // Factory runs outside the registry lock; it may be slow or re-enter the container.
        let instance = factory()?;
        let mut instances = self.instances.lock().unwrap_or_else(PoisonError::into_inner);
        if instances.contains_key(key) {
            return Err(Error::container(
                "construct_storage",
                class.name(),
                format!("registration key '{}' is already in use", key),
            ));
        }
        instances.insert(key.to_string(), instance.clone());
        Ok(instance)
    }

    fn construct_splitter(&self, handle: &SplitterHandle) -> Result<Arc<dyn StateSplitter>> {
        let splitters = self.splitters.read().unwrap_or_else(PoisonError::into_inner);
        match splitters.get(handle.name()) {
            Some(factory) => Ok(factory()),
            None => Err(Error::container(
                "construct_splitter",
                handle.name(),
                "splitter is not registered",
            )),
        }
    }
}

impl Debug for StorageContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let classes: Vec<String> = self
            .storage_classes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        f.debug_struct("StorageContainer")
            .field("storage_classes", &classes)
            .field("instances", &self.registered_keys().len())
            .finish()
    }
}
