use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dotbox_engine::GameState;
use dotbox_protocol::RoomCode;
use tokio::fs;

use super::RoomStore;
use crate::StoreError;

/// Store that keeps one JSON file per room under a directory.
///
/// Files are named `<CODE>.json`. Writes go to a temporary sibling first
/// and are renamed into place, so a crash mid-write never leaves a
/// truncated state behind.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: Arc<PathBuf>,
}

impl FileStore {
    /// Opens (and creates, if needed) the store directory.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        tracing::debug!(dir = %dir.display(), "file store opened");
        Ok(Self { dir: Arc::new(dir) })
    }

    /// The directory holding the room files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, code: &RoomCode) -> PathBuf {
        self.dir.join(format!("{code}.json"))
    }
}

impl RoomStore for FileStore {
    async fn load(&self, code: &RoomCode) -> Result<Option<GameState>, StoreError> {
        match fs::read(self.path_for(code)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, code: &RoomCode, state: &GameState) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(state)?;
        let tmp = self.dir.join(format!("{code}.json.tmp"));
        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, self.path_for(code)).await?;
        Ok(())
    }

    async fn purge(&self, code: &RoomCode) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(code)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
