use std::any::Any;
use std::fmt::Debug;
use std::sync::{Arc, Mutex, PoisonError};
use async_trait::async_trait;
use crate::kernel::error::{Error, KernelLifecyclePhase, Result};

/// Core component lifecycle trait for components owned by a host
#[async_trait]
pub trait KernelComponent: Any + Send + Sync + Debug {
    fn name(&self) -> &'static str;
    async fn initialize(&self) -> Result<()>;
    async fn start(&self) -> Result<()>;
    async fn stop(&self) -> Result<()>;
}

/// Teardown registry held by the owner of one or more components.
///
/// Components register themselves when they are constructed and are stopped
/// in reverse registration order by [`Disposer::dispose_all`].
#[derive(Default, Debug)]
pub struct Disposer {
    components: Mutex<Vec<Arc<dyn KernelComponent>>>,
}

impl Disposer {
    /// Create a new empty disposer
    pub fn new() -> Self {
        Self {
            components: Mutex::new(Vec::new()),
        }
    }

    /// Register a component for teardown.
    pub fn register(&self, component: Arc<dyn KernelComponent>) {
        log::debug!("Registering component '{}' for teardown", component.name());
        self.components
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(component);
    }

    /// Names of the registered components, in registration order.
    pub fn registered_names(&self) -> Vec<&'static str> {
        self.components
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|c| c.name())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.components.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop every registered component, newest first.
    ///
    /// All components are stopped even if some fail; the first failure is
    /// returned. The registry is empty afterwards.
    pub async fn dispose_all(&self) -> Result<()> {
        // Take the list out so the lock is not held across awaits.
        let components = std::mem::take(
            &mut *self.components.lock().unwrap_or_else(PoisonError::into_inner),
        );

        let mut first_error = None;
        for component in components.iter().rev() {
            log::info!("Stopping component: {}", component.name());
            if let Err(e) = component.stop().await {
                log::error!("Error stopping component {}: {}", component.name(), e);
                if first_error.is_none() {
                    first_error = Some(Error::KernelLifecycleError {
                        phase: KernelLifecyclePhase::Shutdown,
                        component_name: Some(component.name().to_string()),
                        message: e.to_string(),
                    });
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
