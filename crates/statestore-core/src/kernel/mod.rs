//! # Statestore Kernel
//!
//! Crate-wide plumbing shared by the storage subsystem.
//!
//! ## Key Components:
//!
//! - **Component Lifecycle**: the [`KernelComponent`](component::KernelComponent) trait and
//!   the [`Disposer`](component::Disposer) teardown registry a host uses to stop the
//!   components it owns.
//! - **Dependency Construction**: the [`ComponentContainer`](container::ComponentContainer)
//!   collaborator used to build host-supplied storage classes, with the
//!   [`StorageContainer`](container::StorageContainer) registry implementation.
//! - **Core Constants**: reserved paths and document markers in `constants`.
//! - **Error Handling**: the crate [`Error`](error::Error) and `Result` alias.
pub mod component;
pub mod constants;
pub mod container;
pub mod error;

pub use component::{Disposer, KernelComponent};
pub use container::{ComponentContainer, StorageContainer};
pub use error::{Error, Result};
