pub mod kernel;
pub mod storage;

// Re-export key public types for hosts embedding the manager
pub use kernel::error::Error as KernelError;
pub use kernel::{ComponentContainer, Disposer, KernelComponent, StorageContainer};
pub use storage::{
    ExternalizationCoordinator, ManagerConfig, ManagerDeps, StateData, StateStorage,
    StateStorageManager, StorageSpec,
};

#[cfg(test)]
mod tests;
