//! Integration tests for the Dotbox server: routing, admission, the relay
//! loop, and full client sessions, over real sockets.

use std::time::Duration;

use dotbox::prelude::*;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::io::AsyncReadExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

const TIMEOUT: Duration = Duration::from_secs(5);

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

struct Running {
    addr: String,
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl Running {
    async fn stop(self) {
        let _ = self.stop.send(());
        self.task.await.expect("server task should finish");
    }
}

async fn spawn<S: RoomStore>(builder: DotboxServerBuilder<S>) -> Running {
    let server = builder
        .bind("127.0.0.1:0")
        .build()
        .await
        .expect("server should build");
    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        let _ = server
            .run_until(async {
                let _ = stopped.await;
            })
            .await;
    });
    Running { addr, stop, task }
}

/// Starts a server with default settings and returns the address.
async fn start_server() -> String {
    let server = DotboxServerBuilder::new()
        .bind("127.0.0.1:0")
        .build()
        .await
        .expect("server should build");
    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    tokio::spawn(async move {
        let _ = server.run().await;
    });
    addr
}

async fn connect(addr: &str, path: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}{path}"))
        .await
        .expect("should connect");
    ws
}

async fn send_json(ws: &mut ClientWs, value: Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .expect("send");
}

/// Next application message, skipping control frames.
async fn recv_json(ws: &mut ClientWs) -> Value {
    tokio::time::timeout(TIMEOUT, async {
        loop {
            let msg = ws.next().await.expect("stream ended").expect("recv");
            if msg.is_text() || msg.is_binary() {
                return serde_json::from_slice(&msg.into_data()).expect("decode");
            }
            assert!(!msg.is_close(), "connection closed while waiting for a message");
        }
    })
    .await
    .expect("message in time")
}

/// Asserts the server closes the socket without sending anything else.
async fn expect_closed(ws: &mut ClientWs) {
    let next = tokio::time::timeout(TIMEOUT, ws.next())
        .await
        .expect("close in time");
    match next {
        None | Some(Err(_)) => {}
        Some(Ok(msg)) => assert!(msg.is_close(), "expected close, got {msg:?}"),
    }
}

/// Opens `/new` and returns the socket plus the assigned room code.
async fn create_room(addr: &str) -> (ClientWs, String) {
    let mut ws = connect(addr, "/new").await;
    let joined = recv_json(&mut ws).await;
    assert_eq!(joined["type"], "joined");
    let code = joined["roomId"].as_str().expect("roomId").to_string();
    (ws, code)
}

/// Two players in one room, both greetings consumed.
async fn full_room(addr: &str) -> (ClientWs, ClientWs, String) {
    let (mut a, code) = create_room(addr).await;
    let mut b = connect(addr, &format!("/room/{code}")).await;
    assert_eq!(recv_json(&mut b).await["type"], "joined");
    assert_eq!(recv_json(&mut a).await["type"], "opponent_joined");
    (a, b, code)
}

fn mv(r: usize, c: usize, is_h: bool) -> Value {
    json!({ "type": "move", "r": r, "c": c, "isH": is_h })
}

async fn next_event(
    events: &mut mpsc::Receiver<ClientEvent>,
    mut predicate: impl FnMut(&ClientEvent) -> bool,
) -> ClientEvent {
    tokio::time::timeout(TIMEOUT, async {
        loop {
            let event = events.recv().await.expect("event stream ended");
            if predicate(&event) {
                return event;
            }
        }
    })
    .await
    .expect("event in time")
}

// =========================================================================
// Routing and admission
// =========================================================================

#[tokio::test]
async fn test_new_room_assigns_first_slot_and_code() {
    let addr = start_server().await;
    let mut ws = connect(&addr, "/new").await;

    let joined = recv_json(&mut ws).await;
    assert_eq!(joined["type"], "joined");
    assert_eq!(joined["playerIndex"], 1);
    assert_eq!(joined["ready"], false);
    assert_eq!(joined["gameState"]["moveCount"], 0);
    assert_eq!(joined["gameState"]["currentPlayer"], 1);

    let code = joined["roomId"].as_str().unwrap();
    assert_eq!(code.len(), 6);
    assert!(RoomCode::parse(code).is_ok());
}

#[tokio::test]
async fn test_second_connection_takes_slot_two() {
    let addr = start_server().await;
    let (mut a, code) = create_room(&addr).await;

    let mut b = connect(&addr, &format!("/room/{}", code.to_lowercase())).await;
    let joined = recv_json(&mut b).await;
    assert_eq!(joined["playerIndex"], 2);
    assert_eq!(joined["ready"], true);
    assert_eq!(joined["roomId"], code.as_str());

    let notice = recv_json(&mut a).await;
    assert_eq!(notice["type"], "opponent_joined");
    assert!(notice["gameState"].is_object());
}

#[tokio::test]
async fn test_third_connection_gets_full_and_is_closed() {
    let addr = start_server().await;
    let (mut a, mut b, code) = full_room(&addr).await;

    let mut c = connect(&addr, &format!("/room/{code}")).await;
    assert_eq!(recv_json(&mut c).await, json!({ "type": "full" }));
    expect_closed(&mut c).await;

    // The rejected socket never became a player.
    send_json(&mut a, mv(0, 0, true)).await;
    assert_eq!(recv_json(&mut a).await["type"], "state");
    assert_eq!(recv_json(&mut b).await["type"], "state");
}

#[tokio::test]
async fn test_invalid_room_code_is_rejected() {
    let addr = start_server().await;
    let mut ws = connect(&addr, "/room/NO!").await;

    let reply = recv_json(&mut ws).await;
    assert_eq!(reply, json!({ "type": "error", "message": "Invalid room code" }));
    expect_closed(&mut ws).await;
}

#[tokio::test]
async fn test_unknown_path_is_rejected() {
    let addr = start_server().await;
    let mut ws = connect(&addr, "/lobby").await;

    assert_eq!(recv_json(&mut ws).await["type"], "error");
    expect_closed(&mut ws).await;
}

#[tokio::test]
async fn test_silent_socket_does_not_block_new_connections() {
    let builder = DotboxServerBuilder::new().handshake_timeout(Duration::from_secs(1));
    let running = spawn(builder).await;

    // Opens TCP but never sends the upgrade request.
    let mut silent = tokio::net::TcpStream::connect(&running.addr).await.unwrap();

    let (_ws, code) = tokio::time::timeout(Duration::from_secs(3), create_room(&running.addr))
        .await
        .expect("a stalled handshake should not hold up other peers");
    assert!(RoomCode::parse(&code).is_ok());

    // The stalled peer is dropped once its handshake window passes.
    let mut buf = [0u8; 1];
    let read = tokio::time::timeout(TIMEOUT, silent.read(&mut buf))
        .await
        .expect("server should drop the silent socket");
    assert!(matches!(read, Ok(0) | Err(_)));

    running.stop().await;
}

// =========================================================================
// Moves
// =========================================================================

#[tokio::test]
async fn test_move_without_opponent_gets_waiting_notice() {
    let addr = start_server().await;
    let (mut a, _code) = create_room(&addr).await;

    send_json(&mut a, mv(0, 0, true)).await;
    let reply = recv_json(&mut a).await;
    assert_eq!(reply, json!({ "type": "error", "message": "Waiting for opponent" }));
}

#[tokio::test]
async fn test_accepted_move_is_broadcast_to_both() {
    let addr = start_server().await;
    let (mut a, mut b, _code) = full_room(&addr).await;

    send_json(&mut a, mv(0, 0, true)).await;
    for ws in [&mut a, &mut b] {
        let state = recv_json(ws).await;
        assert_eq!(state["type"], "state");
        assert_eq!(state["gameState"]["moveCount"], 1);
        assert_eq!(state["gameState"]["currentPlayer"], 2);
        assert_eq!(state["gameState"]["hLines"][0][0], 1);
    }
}

#[tokio::test]
async fn test_rule_violations_are_reported_to_sender_only() {
    let addr = start_server().await;
    let (mut a, mut b, _code) = full_room(&addr).await;

    send_json(&mut b, mv(0, 0, true)).await;
    assert_eq!(
        recv_json(&mut b).await,
        json!({ "type": "error", "message": "Not your turn" })
    );

    send_json(&mut a, mv(40, 0, true)).await;
    assert_eq!(
        recv_json(&mut a).await,
        json!({ "type": "error", "message": "Invalid move" })
    );

    send_json(&mut a, json!({ "type": "move", "r": 0, "c": 0 })).await;
    assert_eq!(
        recv_json(&mut a).await,
        json!({ "type": "error", "message": "Invalid move" })
    );

    // Nothing reached the opponent and the state is untouched.
    send_json(&mut a, mv(0, 0, true)).await;
    assert_eq!(recv_json(&mut b).await["gameState"]["moveCount"], 1);
}

#[tokio::test]
async fn test_malformed_frames_are_dropped() {
    let addr = start_server().await;
    let (mut a, mut b, _code) = full_room(&addr).await;

    a.send(Message::Text("not json".to_string().into())).await.unwrap();
    send_json(&mut a, json!({ "type": "teleport" })).await;
    send_json(&mut a, mv(0, 0, false)).await;

    let state = recv_json(&mut a).await;
    assert_eq!(state["type"], "state");
    assert_eq!(recv_json(&mut b).await["gameState"]["vLines"][0][0], 1);
}

// =========================================================================
// Disconnects and persistence
// =========================================================================

#[tokio::test]
async fn test_disconnect_notifies_survivor_with_state() {
    let addr = start_server().await;
    let (mut a, mut b, _code) = full_room(&addr).await;

    send_json(&mut a, mv(0, 0, true)).await;
    recv_json(&mut a).await;
    recv_json(&mut b).await;

    b.close(None).await.unwrap();
    let notice = recv_json(&mut a).await;
    assert_eq!(notice["type"], "opponent_disconnected");
    assert_eq!(notice["gameState"]["moveCount"], 1);
}

#[tokio::test]
async fn test_rejoin_after_restart_resumes_persisted_game() {
    let dir = tempfile::tempdir().unwrap();

    let first = spawn(DotboxServerBuilder::new().store(FileStore::open(dir.path()).await.unwrap())).await;
    let (mut a, mut b, code) = full_room(&first.addr).await;
    send_json(&mut a, mv(0, 0, true)).await;
    recv_json(&mut a).await;
    recv_json(&mut b).await;
    first.stop().await;
    expect_closed(&mut a).await;

    let second = spawn(DotboxServerBuilder::new().store(FileStore::open(dir.path()).await.unwrap())).await;
    let mut a = connect(&second.addr, &format!("/room/{code}")).await;
    let joined = recv_json(&mut a).await;
    assert_eq!(joined["playerIndex"], 1);
    assert_eq!(joined["gameState"]["moveCount"], 1);
    assert_eq!(joined["gameState"]["currentPlayer"], 2);
    second.stop().await;
}

#[tokio::test]
async fn test_shutdown_stops_all_rooms() {
    let running = spawn(DotboxServerBuilder::new()).await;
    let (mut a, _code) = create_room(&running.addr).await;

    running.stop().await;
    expect_closed(&mut a).await;
}

#[tokio::test]
async fn test_build_rejects_degenerate_board() {
    let result = DotboxServerBuilder::new()
        .bind("127.0.0.1:0")
        .room_config(RoomConfig::default().board(1, 5))
        .build()
        .await;
    assert!(matches!(result, Err(DotboxError::Room(RoomError::Board(_)))));
}

// =========================================================================
// Full client sessions
// =========================================================================

#[tokio::test]
async fn test_client_sessions_play_a_move() {
    let addr = start_server().await;
    let config = ClientConfig::new(format!("ws://{addr}"));

    let (mut host, mut host_events) = ClientSession::start(config.clone());
    host.create_room().unwrap();
    let ClientEvent::Joined { room, player_index } =
        next_event(&mut host_events, |e| matches!(e, ClientEvent::Joined { .. })).await
    else {
        unreachable!()
    };
    assert_eq!(player_index, Player::One);

    let (mut guest, mut guest_events) = ClientSession::start(config);
    guest.join(room.as_str()).unwrap();
    next_event(&mut guest_events, |e| *e == ClientEvent::Status(ClientStatus::Ready)).await;
    next_event(&mut host_events, |e| *e == ClientEvent::Status(ClientStatus::Ready)).await;

    host.play(0, 0, true).unwrap();
    let ClientEvent::State(state) =
        next_event(&mut guest_events, |e| matches!(e, ClientEvent::State(s) if s.move_count() == 1)).await
    else {
        unreachable!()
    };
    assert_eq!(state.current_player(), Player::Two);
    next_event(&mut guest_events, |e| *e == ClientEvent::Feedback(Feedback::LineDrawn)).await;

    host.shutdown().await;
    guest.shutdown().await;
}

#[tokio::test]
async fn test_unresponsive_peer_is_evicted() {
    let heartbeat = HeartbeatConfig::with_interval(Duration::from_millis(50))
        .stale_after(Duration::from_millis(150))
        .initial_jitter(Duration::ZERO);
    let running = spawn(
        DotboxServerBuilder::new().room_config(RoomConfig::default().heartbeat(heartbeat)),
    )
    .await;

    // The session answers pings; the raw socket never does.
    let (mut host, mut events) = ClientSession::start(ClientConfig::new(format!("ws://{}", running.addr)));
    host.create_room().unwrap();
    let ClientEvent::Joined { room, .. } =
        next_event(&mut events, |e| matches!(e, ClientEvent::Joined { .. })).await
    else {
        unreachable!()
    };
    let mut silent = connect(&running.addr, &format!("/room/{room}")).await;
    next_event(&mut events, |e| *e == ClientEvent::Status(ClientStatus::Ready)).await;

    next_event(&mut events, |e| *e == ClientEvent::Status(ClientStatus::Disconnected)).await;

    // The silent socket was pinged, then closed by the server.
    let mut saw_ping = false;
    loop {
        let next = tokio::time::timeout(TIMEOUT, silent.next()).await.expect("close in time");
        match next {
            Some(Ok(msg)) if msg.is_text() => {
                let value: Value = serde_json::from_slice(&msg.into_data()).unwrap();
                saw_ping |= value["type"] == "ping";
            }
            Some(Ok(msg)) if !msg.is_close() => {}
            _ => break,
        }
    }
    assert!(saw_ping);

    host.shutdown().await;
    running.stop().await;
}
