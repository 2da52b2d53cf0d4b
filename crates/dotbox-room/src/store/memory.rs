use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dotbox_engine::GameState;
use dotbox_protocol::RoomCode;

use super::RoomStore;
use crate::StoreError;

/// In-process store for tests and single-process deployments.
///
/// Clones share the same map, so a fresh room actor spawned with a clone
/// sees what a previous actor saved. Does not survive a process restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<HashMap<RoomCode, GameState>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rooms with a stored state.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Whether a state is stored for `code`.
    pub fn contains(&self, code: &RoomCode) -> bool {
        self.lock().contains_key(code)
    }

    /// Synchronous snapshot of the stored state for `code`.
    pub fn get(&self, code: &RoomCode) -> Option<GameState> {
        self.lock().get(code).cloned()
    }

    /// Synchronously seeds a state, e.g. to simulate one left behind by a
    /// previous process.
    pub fn insert(&self, code: RoomCode, state: GameState) {
        self.lock().insert(code, state);
    }

    // The map is only touched in short non-panicking sections, so a
    // poisoned lock still holds consistent data.
    fn lock(&self) -> MutexGuard<'_, HashMap<RoomCode, GameState>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RoomStore for MemoryStore {
    async fn load(&self, code: &RoomCode) -> Result<Option<GameState>, StoreError> {
        Ok(self.get(code))
    }

    async fn save(&self, code: &RoomCode, state: &GameState) -> Result<(), StoreError> {
        self.insert(code.clone(), state.clone());
        Ok(())
    }

    async fn purge(&self, code: &RoomCode) -> Result<(), StoreError> {
        self.lock().remove(code);
        Ok(())
    }
}
