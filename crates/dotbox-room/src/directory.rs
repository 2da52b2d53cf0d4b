//! Room directory: maps room codes to running room actors.

use std::collections::HashMap;

use dotbox_protocol::{RoomCode, ROOM_CODE_ALPHABET};
use dotbox_transport::ConnectionId;
use rand::Rng;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::room::spawn_room;
use crate::{Admission, PeerSender, RoomConfig, RoomError, RoomHandle, RoomStore};

/// How many fresh codes to try before giving up.
const MAX_CODE_ATTEMPTS: usize = 16;

/// Creates room codes and routes connections to the room that owns them.
///
/// Holds no game logic. Actors that stopped (after purging an empty room)
/// are replaced transparently on the next reference to their code, and the
/// replacement hydrates from the store on its first connection.
pub struct RoomDirectory<S: RoomStore> {
    config: RoomConfig,
    store: S,
    rooms: Mutex<HashMap<RoomCode, RoomHandle>>,
}

impl<S: RoomStore> RoomDirectory<S> {
    /// Creates an empty directory.
    pub fn new(config: RoomConfig, store: S) -> Self {
        Self {
            config,
            store,
            rooms: Mutex::new(HashMap::new()),
        }
    }

    /// The config every spawned room uses.
    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// The shared store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Generates an unused code and starts its room.
    ///
    /// A code is unused if no live actor owns it and nothing is persisted
    /// under it.
    pub async fn create_room(&self) -> Result<RoomCode, RoomError> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = generate_code()?;
            // Checked before locking so slow storage never blocks lookups.
            if matches!(self.store.load(&code).await, Ok(Some(_))) {
                continue;
            }
            let mut rooms = self.rooms.lock().await;
            prune_closed(&mut rooms);
            if rooms.contains_key(&code) {
                continue;
            }
            let handle = self.spawn(code.clone())?;
            rooms.insert(code.clone(), handle);
            info!(room = %code, "room created");
            return Ok(code);
        }
        Err(RoomError::CodeSpaceExhausted(MAX_CODE_ATTEMPTS))
    }

    /// Returns the room for `code`, starting its actor on first reference.
    pub async fn room(&self, code: &RoomCode) -> Result<RoomHandle, RoomError> {
        let mut rooms = self.rooms.lock().await;
        prune_closed(&mut rooms);
        if let Some(handle) = rooms.get(code) {
            return Ok(handle.clone());
        }
        let handle = self.spawn(code.clone())?;
        rooms.insert(code.clone(), handle.clone());
        debug!(room = %code, "room actor started on reference");
        Ok(handle)
    }

    /// Routes a connection to the room for `code` and asks for a slot.
    ///
    /// Retries once if the actor stopped between lookup and admission.
    pub async fn admit(
        &self,
        code: &RoomCode,
        conn_id: ConnectionId,
        sender: PeerSender,
    ) -> Result<(RoomHandle, Admission), RoomError> {
        let handle = self.room(code).await?;
        let first = handle.connect(conn_id, sender.clone()).await;
        match first {
            Err(RoomError::Unavailable(_)) => {
                let handle = self.room(code).await?;
                let admission = handle.connect(conn_id, sender).await?;
                Ok((handle, admission))
            }
            result => result.map(|admission| (handle, admission)),
        }
    }

    /// Number of rooms with a running actor.
    pub async fn room_count(&self) -> usize {
        let mut rooms = self.rooms.lock().await;
        prune_closed(&mut rooms);
        rooms.len()
    }

    /// Codes of rooms with a running actor, sorted.
    pub async fn room_codes(&self) -> Vec<RoomCode> {
        let mut rooms = self.rooms.lock().await;
        prune_closed(&mut rooms);
        let mut codes: Vec<RoomCode> = rooms.keys().cloned().collect();
        codes.sort();
        codes
    }

    /// Stops every room actor. Their sockets are asked to close; persisted
    /// states are kept.
    pub async fn shutdown_all(&self) {
        let handles: Vec<RoomHandle> = self.rooms.lock().await.drain().map(|(_, h)| h).collect();
        let count = handles.len();
        for handle in handles {
            let _ = handle.shutdown().await;
        }
        info!(count, "all rooms shut down");
    }

    fn spawn(&self, code: RoomCode) -> Result<RoomHandle, RoomError> {
        let state = self.config.initial_state()?;
        Ok(spawn_room(code, state, &self.config, self.store.clone()))
    }
}

/// Drops handles whose actor has stopped.
fn prune_closed(rooms: &mut HashMap<RoomCode, RoomHandle>) {
    rooms.retain(|_, handle| !handle.is_closed());
}

/// Draws a code from the thread-local CSPRNG.
fn generate_code() -> Result<RoomCode, RoomError> {
    let mut rng = rand::rng();
    let alphabet_len = ROOM_CODE_ALPHABET.len();
    let indices: Vec<usize> = (0..RoomCode::GENERATED_LEN)
        .map(|_| rng.random_range(0..alphabet_len))
        .collect();
    Ok(RoomCode::from_indices(indices)?)
}
