//! Integration tests for code generation and routing in the room directory.

use std::collections::HashSet;

use dotbox_engine::Player;
use dotbox_room::{MemoryStore, RoomCode, RoomConfig, RoomDirectory, RoomError};
use dotbox_transport::ConnectionId;
use tokio::sync::mpsc;

#[tokio::test]
async fn test_create_room_returns_distinct_codes() {
    let dir = RoomDirectory::new(RoomConfig::default(), MemoryStore::new());
    let mut codes = HashSet::new();
    for _ in 0..20 {
        codes.insert(dir.create_room().await.unwrap());
    }
    assert_eq!(codes.len(), 20);
    assert_eq!(dir.room_count().await, 20);
}

#[tokio::test]
async fn test_same_code_routes_to_same_room() {
    let dir = RoomDirectory::new(RoomConfig::default(), MemoryStore::new());
    let upper = RoomCode::parse("ABC234").unwrap();
    let lower = RoomCode::parse("abc234").unwrap();

    let (tx1, _rx1) = mpsc::unbounded_channel();
    let (tx2, _rx2) = mpsc::unbounded_channel();
    let (_, first) = dir.admit(&upper, ConnectionId::new(1), tx1).await.unwrap();
    let (handle, second) = dir.admit(&lower, ConnectionId::new(2), tx2).await.unwrap();

    assert_eq!(first.player, Player::One);
    assert_eq!(second.player, Player::Two);
    assert_eq!(handle.code(), &upper);
    assert_eq!(dir.room_codes().await, vec![upper]);
}

#[tokio::test]
async fn test_create_room_skips_codes_with_persisted_state() {
    let store = MemoryStore::new();
    let dir = RoomDirectory::new(RoomConfig::default(), store.clone());
    let code = dir.create_room().await.unwrap();
    assert!(!store.contains(&code), "a fresh room has nothing persisted yet");
}

#[tokio::test]
async fn test_admit_after_shutdown_starts_fresh_actor() {
    let dir = RoomDirectory::new(RoomConfig::default(), MemoryStore::new());
    let code = dir.create_room().await.unwrap();
    let old = dir.room(&code).await.unwrap();

    old.shutdown().await.unwrap();
    // Wait for the actor to drop its receiver.
    while !old.is_closed() {
        tokio::task::yield_now().await;
    }
    assert!(matches!(old.info().await, Err(RoomError::Unavailable(_))));

    let (tx, _rx) = mpsc::unbounded_channel();
    let (handle, admission) = dir.admit(&code, ConnectionId::new(7), tx).await.unwrap();
    assert!(!handle.is_closed());
    assert_eq!(admission.player, Player::One);
}

#[tokio::test]
async fn test_invalid_board_config_is_reported() {
    let dir = RoomDirectory::new(RoomConfig::default().board(0, 0), MemoryStore::new());
    assert!(matches!(dir.create_room().await, Err(RoomError::Board(_))));
}

#[tokio::test]
async fn test_shutdown_all_empties_directory() {
    let dir = RoomDirectory::new(RoomConfig::default(), MemoryStore::new());
    dir.create_room().await.unwrap();
    dir.create_room().await.unwrap();

    dir.shutdown_all().await;
    assert_eq!(dir.room_count().await, 0);
}
