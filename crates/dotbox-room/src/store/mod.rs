//! Persistence for room game states.
//!
//! Rooms follow a "hydrate before use, persist after mutation" contract:
//! every state-touching operation reloads the stored state first, and every
//! accepted move is written back before it is broadcast. A room actor that
//! is respawned after a process restart therefore resumes from the last
//! accepted move.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use dotbox_engine::GameState;
use dotbox_protocol::RoomCode;

use crate::StoreError;

/// Storage backend for room states, keyed by room code.
///
/// `Clone` because every room actor holds its own copy; implementations
/// share their underlying storage between clones. The methods return
/// `Send` futures so actors generic over the store can be spawned onto the
/// multi-threaded runtime.
pub trait RoomStore: Clone + Send + Sync + 'static {
    /// The stored state for `code`, or `None` if nothing is stored.
    fn load(
        &self,
        code: &RoomCode,
    ) -> impl std::future::Future<Output = Result<Option<GameState>, StoreError>> + Send;

    /// Overwrites the stored state for `code`.
    fn save(
        &self,
        code: &RoomCode,
        state: &GameState,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Removes everything stored for `code`. Purging an unknown code is
    /// not an error.
    fn purge(
        &self,
        code: &RoomCode,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;
}
