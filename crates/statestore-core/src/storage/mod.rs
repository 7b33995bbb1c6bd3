//! # Statestore Storage System
//!
//! Resolves "where does this component's state live" declarations into cached
//! storage instances and coordinates the writes of a save round.
//!
//! - [`MacroTable`]: `$TOKEN$` path virtualization.
//! - [`StateStorageManager`]: the storage cache and factory.
//! - [`ExternalizationCoordinator`]: one save round across several storages.
//! - [`FileBasedStorage`] / [`DirectoryBasedStorage`]: the built-in media,
//!   committing through a [`StorageProvider`].
pub mod config;
pub mod directory;
pub mod error;
pub mod externalization;
pub mod file;
pub mod local;
pub mod macros;
pub mod manager;
pub mod provider;
pub mod spec;
pub mod state;
pub mod traits;

/// Re-export key types
pub use config::{ConfigFormat, MacroDefinition, ManagerConfig};
pub use directory::DirectoryBasedStorage;
pub use error::StorageSystemError;
pub use externalization::ExternalizationCoordinator;
pub use file::{FileBasedStorage, FileStorageParams, StorageDataFactory};
pub use local::LocalStorageProvider;
pub use macros::MacroTable;
pub use manager::{FileStorageStrategies, ManagerDeps, StateStorageManager};
pub use provider::StorageProvider;
pub use spec::{
    Resolution, RoamingType, SplitterHandle, StateStorageOperation, StorageClass, StorageSpec,
    StorageVariant,
};
pub use state::{StateData, StorageData};
pub use traits::{
    ExternalizationSession, HostMode, LegacyStorageLookup, NoLegacyStorage, PathMacroSubstitutor,
    PersistentComponent, SaveSession, StateSplitter, StateStorage, StateStorageChooser,
    StaticHostMode, StreamProvider, StreamProviderSlot,
};

// Test module declaration
#[cfg(test)]
mod tests;
