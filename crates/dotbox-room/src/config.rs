//! Room configuration.

use dotbox_engine::{BoardError, GameState, DEFAULT_DOTS};
use dotbox_heartbeat::HeartbeatConfig;

/// Settings shared by every room a [`RoomDirectory`](crate::RoomDirectory)
/// spawns.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// Dot rows of a fresh board.
    pub rows: usize,

    /// Dot columns of a fresh board.
    pub cols: usize,

    /// Ping interval and staleness threshold.
    pub heartbeat: HeartbeatConfig,

    /// Capacity of each room actor's command channel. Senders wait when it
    /// is full.
    pub channel_size: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            rows: DEFAULT_DOTS,
            cols: DEFAULT_DOTS,
            heartbeat: HeartbeatConfig::default(),
            channel_size: 64,
        }
    }
}

impl RoomConfig {
    /// Sets the board size in dots.
    pub fn board(mut self, rows: usize, cols: usize) -> Self {
        self.rows = rows;
        self.cols = cols;
        self
    }

    /// Sets the heartbeat timings.
    pub fn heartbeat(mut self, heartbeat: HeartbeatConfig) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    /// Sets the command channel capacity (at least 1).
    pub fn channel_size(mut self, size: usize) -> Self {
        self.channel_size = size.max(1);
        self
    }

    /// An empty board with the configured dimensions.
    pub fn initial_state(&self) -> Result<GameState, BoardError> {
        GameState::new(self.rows, self.cols)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_room_config_default() {
        let config = RoomConfig::default();
        assert_eq!((config.rows, config.cols), (8, 8));
        assert_eq!(config.heartbeat.interval, Duration::from_secs(30));
        assert_eq!(config.channel_size, 64);
    }

    #[test]
    fn test_room_config_builders() {
        let config = RoomConfig::default()
            .board(3, 4)
            .channel_size(0)
            .heartbeat(HeartbeatConfig::with_interval(Duration::from_secs(1)));
        assert_eq!((config.rows, config.cols), (3, 4));
        assert_eq!(config.channel_size, 1);
        assert_eq!(config.heartbeat.stale_after, Duration::from_secs(3));

        let state = config.initial_state().unwrap();
        assert_eq!((state.rows(), state.cols()), (3, 4));
    }

    #[test]
    fn test_room_config_rejects_degenerate_board() {
        let config = RoomConfig::default().board(1, 8);
        assert!(config.initial_state().is_err());
    }
}
