use std::sync::Arc;

use crate::kernel::error::Result;
use crate::storage::manager::StateStorageManager;
use crate::storage::spec::{Resolution, StateStorageOperation, StorageSpec};
use crate::storage::state::StateData;
use crate::storage::traits::{ExternalizationSession, PersistentComponent, SaveSession, StateStorage};

/// One save round: fans component writes out to their storages and compiles
/// the resulting save units.
///
/// A coordinator is used by a single caller and dropped after
/// [`create_save_sessions`](Self::create_save_sessions); concurrent rounds use
/// separate coordinators.
pub struct ExternalizationCoordinator<'a> {
    manager: &'a StateStorageManager,
    // Insertion ordered; storages compared by identity
    sessions: Vec<(Arc<dyn StateStorage>, Box<dyn ExternalizationSession>)>,
}

impl<'a> ExternalizationCoordinator<'a> {
    pub(crate) fn new(manager: &'a StateStorageManager) -> Self {
        Self {
            manager,
            sessions: Vec::new(),
        }
    }

    /// Write `state` to every storage declared in `specs`, subject to the
    /// component's routing. Deprecated or cleared targets receive an empty state.
    ///
    /// Stops at the first storage that cannot be resolved; writes already
    /// forwarded stay in place.
    pub fn set_state(
        &mut self,
        specs: &[StorageSpec],
        component: &dyn PersistentComponent,
        component_name: &str,
        state: &StateData,
    ) -> Result<()> {
        let chooser = component.storage_chooser();
        for spec in specs {
            let resolution = match chooser {
                Some(chooser) => chooser.resolution(spec, StateStorageOperation::Write),
                None => Resolution::Write,
            };
            if resolution == Resolution::Skip {
                continue;
            }

            let storage = self.manager.get_state_storage(spec)?;
            let Some(session) = self.session_for(storage) else {
                continue;
            };
            let written = if spec.deprecated || resolution == Resolution::Clear {
                StateData::new()
            } else {
                state.clone()
            };
            session.set_state(component, component_name, written, Some(spec));
        }
        Ok(())
    }

    /// Write `state` to the component's legacy storage, if it has one.
    pub fn set_state_in_old_storage(
        &mut self,
        component: &dyn PersistentComponent,
        component_name: &str,
        state: StateData,
    ) -> Result<()> {
        let storage =
            self.manager
                .old_storage(component, component_name, StateStorageOperation::Write)?;
        if let Some(storage) = storage {
            if let Some(session) = self.session_for(storage) {
                session.set_state(component, component_name, state, None);
            }
        }
        Ok(())
    }

    /// Memoized externalization session of `storage`. A storage that refuses
    /// to start one is asked again next time.
    fn session_for(
        &mut self,
        storage: Arc<dyn StateStorage>,
    ) -> Option<&mut Box<dyn ExternalizationSession>> {
        let position = self
            .sessions
            .iter()
            .position(|(existing, _)| same_storage(existing, &storage));
        let index = match position {
            Some(index) => index,
            None => {
                let session = storage.start_externalization()?;
                self.sessions.push((storage, session));
                self.sessions.len() - 1
            }
        };
        self.sessions.get_mut(index).map(|(_, session)| session)
    }

    /// Number of storages touched in this round
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Save units of every touched storage that has something to persist, in
    /// the order the storages were first touched, without duplicates.
    pub fn create_save_sessions(&mut self) -> Vec<Arc<dyn SaveSession>> {
        if let [(_, only)] = self.sessions.as_mut_slice() {
            return only.create_save_session().into_iter().collect();
        }

        let mut save_sessions: Vec<Arc<dyn SaveSession>> = Vec::new();
        for (_, session) in self.sessions.iter_mut() {
            if let Some(save_session) = session.create_save_session() {
                if !save_sessions.iter().any(|existing| same_save_session(existing, &save_session)) {
                    save_sessions.push(save_session);
                }
            }
        }
        save_sessions
    }
}

fn same_storage(a: &Arc<dyn StateStorage>, b: &Arc<dyn StateStorage>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

fn same_save_session(a: &Arc<dyn SaveSession>, b: &Arc<dyn SaveSession>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
