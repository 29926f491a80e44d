//! Process-wide client slot

use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Client registry is uninitialized; bootstrap has not succeeded yet")]
    Uninitialized,
}

/// Holds the most recently bootstrapped client
///
/// Unset until the first successful bootstrap. Later bootstraps replace the
/// client (last write wins); a failed bootstrap never touches it.
pub struct ClientRegistry<C> {
    slot: RwLock<Option<Arc<C>>>,
}

impl<C> ClientRegistry<C> {
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(None),
        }
    }

    /// Publish `client`, returning the one it replaces
    pub fn set(&self, client: Arc<C>) -> Option<Arc<C>> {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        slot.replace(client)
    }

    /// Current client, or `None` if never initialized
    pub fn get(&self) -> Option<Arc<C>> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Current client, or [`RegistryError::Uninitialized`]
    pub fn client(&self) -> Result<Arc<C>, RegistryError> {
        self.get().ok_or(RegistryError::Uninitialized)
    }

    pub fn is_initialized(&self) -> bool {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl<C> Default for ClientRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}
