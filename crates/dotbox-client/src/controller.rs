//! The client-side session state machine.
//!
//! [`ClientController`] holds no sockets and no timers. Every input (a user
//! action or a transport callback) returns a list of [`Directive`]s that the
//! driver carries out. That keeps the reconnection policy and the stale
//! callback rules testable without a network.
//!
//! # Generations
//!
//! Each connection attempt is tagged with a generation number. Tearing a
//! connection down bumps the counter, so late callbacks from a superseded
//! socket carry an old generation and are ignored.

use std::time::Duration;

use dotbox_engine::{GameState, Line, Player};
use dotbox_protocol::{ClientMessage, RoomCode, ServerMessage};
use tracing::{debug, info};

use crate::{ClientConfig, ClientError, ClientEvent, ConnectTarget, Feedback};

/// Connection status as shown to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientStatus {
    /// Not in a room (lobby).
    Idle,
    /// A connection is being opened.
    Connecting,
    /// In a room, opponent not there yet.
    Waiting,
    /// Both players present.
    Ready,
    /// Waiting out the delay before an automatic reconnect.
    Reconnecting,
    /// The match was interrupted; no automatic retries.
    Disconnected,
}

/// An effect the driver must perform.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// Open a connection to `target`, tagging its callbacks with `generation`.
    Open {
        /// Tag for every callback of this connection.
        generation: u64,
        /// Where to connect.
        target: ConnectTarget,
    },
    /// Close the connection (or abandon the attempt) of `generation`.
    Close {
        /// The superseded connection.
        generation: u64,
    },
    /// Send a message on the connection of `generation`.
    Send {
        /// The connection to send on.
        generation: u64,
        /// What to send.
        message: ClientMessage,
    },
    /// Call [`ClientController::on_reconnect_due`] with `generation` after
    /// `delay`.
    ScheduleReconnect {
        /// Token to hand back.
        generation: u64,
        /// How long to wait.
        delay: Duration,
    },
    /// Surface an event to the application.
    Emit(ClientEvent),
}

#[derive(Debug, Clone, Copy)]
struct Socket {
    generation: u64,
    open: bool,
}

/// Pure state machine behind a [`ClientSession`](crate::ClientSession).
#[derive(Debug)]
pub struct ClientController {
    max_reconnect_attempts: u32,
    reconnect_delay: Duration,
    status: ClientStatus,
    generation: u64,
    socket: Option<Socket>,
    player: Option<Player>,
    room: Option<RoomCode>,
    attempts: u32,
    game: Option<GameState>,
}

impl ClientController {
    /// A controller in the `Idle` state.
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            max_reconnect_attempts: config.max_reconnect_attempts,
            reconnect_delay: config.reconnect_delay,
            status: ClientStatus::Idle,
            generation: 0,
            socket: None,
            player: None,
            room: None,
            attempts: 0,
            game: None,
        }
    }

    /// Current status.
    pub fn status(&self) -> ClientStatus {
        self.status
    }

    /// Current generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Slot assigned by the room.
    pub fn player(&self) -> Option<Player> {
        self.player
    }

    /// Code of the current room.
    pub fn room(&self) -> Option<&RoomCode> {
        self.room.as_ref()
    }

    /// Automatic reconnects since the last successful open.
    pub fn reconnect_attempts(&self) -> u32 {
        self.attempts
    }

    /// Local copy of the last state received.
    pub fn game(&self) -> Option<&GameState> {
        self.game.as_ref()
    }

    // -- user actions -------------------------------------------------------

    /// Connects to a freshly created room.
    pub fn create_room(&mut self) -> Vec<Directive> {
        self.forget_room();
        self.connect(ConnectTarget::NewRoom)
    }

    /// Connects to an existing room.
    pub fn join(&mut self, room: RoomCode) -> Vec<Directive> {
        self.forget_room();
        self.connect(ConnectTarget::Room(room))
    }

    /// Leaves the room and returns to the lobby. Never reconnects.
    pub fn leave(&mut self) -> Vec<Directive> {
        let mut out = self.teardown();
        self.forget_room();
        self.set_status(ClientStatus::Idle, &mut out);
        out
    }

    /// Requests a move on the open connection.
    pub fn play(&self, line: Line) -> Result<Vec<Directive>, ClientError> {
        match self.socket {
            Some(Socket {
                generation,
                open: true,
            }) if matches!(self.status, ClientStatus::Waiting | ClientStatus::Ready) => {
                Ok(vec![Directive::Send {
                    generation,
                    message: ClientMessage::play(line),
                }])
            }
            _ => Err(ClientError::NotConnected),
        }
    }

    // -- transport callbacks ------------------------------------------------

    /// The connection of `generation` opened.
    pub fn on_open(&mut self, generation: u64) -> Vec<Directive> {
        let Some(socket) = self.socket.as_mut().filter(|s| s.generation == generation) else {
            debug!(generation, "open from superseded connection, ignoring");
            return vec![Directive::Close { generation }];
        };
        socket.open = true;
        self.attempts = 0;
        debug!(generation, "connection open");
        Vec::new()
    }

    /// The connection of `generation` could not be opened.
    ///
    /// A failed first attempt surfaces [`ClientError::CouldNotConnect`] and
    /// returns to `Idle` without touching the reconnect counter. A failed
    /// automatic reconnect counts as another drop.
    pub fn on_open_failed(&mut self, generation: u64, reason: String) -> Vec<Directive> {
        if !self.is_current(generation) {
            return Vec::new();
        }
        if self.attempts > 0 {
            debug!(generation, %reason, "reconnect attempt failed");
            return self.on_closed(generation);
        }
        info!(generation, %reason, "could not connect");
        self.socket = None;
        self.generation += 1;
        let mut out = vec![Directive::Emit(ClientEvent::Error(ClientError::CouldNotConnect(
            reason,
        )))];
        self.set_status(ClientStatus::Idle, &mut out);
        out
    }

    /// A message arrived on the connection of `generation`.
    pub fn on_message(&mut self, generation: u64, message: ServerMessage) -> Vec<Directive> {
        if !self.is_current(generation) {
            debug!(generation, "message from superseded connection, ignoring");
            return Vec::new();
        }
        let mut out = Vec::new();
        match message {
            ServerMessage::Joined {
                player_index,
                room_id,
                game_state,
                ready,
            } => {
                info!(room = %room_id, player = %player_index, ready, "joined room");
                self.player = Some(player_index);
                self.room = Some(room_id.clone());
                out.push(Directive::Emit(ClientEvent::Joined {
                    player_index,
                    room: room_id,
                }));
                self.adopt(game_state, &mut out);
                let status = if ready {
                    ClientStatus::Ready
                } else {
                    ClientStatus::Waiting
                };
                self.set_status(status, &mut out);
            }
            ServerMessage::OpponentJoined { game_state } => {
                self.adopt(game_state, &mut out);
                self.set_status(ClientStatus::Ready, &mut out);
            }
            ServerMessage::State { game_state } => {
                let feedback = Feedback::infer(self.game.as_ref(), &game_state);
                self.adopt(game_state, &mut out);
                if let Some(feedback) = feedback {
                    out.push(Directive::Emit(ClientEvent::Feedback(feedback)));
                }
            }
            ServerMessage::OpponentDisconnected { game_state } => {
                if let Some(game_state) = game_state {
                    self.adopt(game_state, &mut out);
                }
                self.set_status(ClientStatus::Disconnected, &mut out);
            }
            ServerMessage::Full => {
                out.push(Directive::Emit(ClientEvent::Error(ClientError::RoomFull)));
                out.extend(self.teardown());
                self.forget_room();
                self.set_status(ClientStatus::Idle, &mut out);
            }
            ServerMessage::Error { message } => {
                out.push(Directive::Emit(ClientEvent::Notice(message)));
            }
            ServerMessage::Ping => {
                out.push(Directive::Send {
                    generation,
                    message: ClientMessage::Pong,
                });
            }
        }
        out
    }

    /// The connection of `generation` closed after opening.
    pub fn on_closed(&mut self, generation: u64) -> Vec<Directive> {
        if !self.is_current(generation) {
            return Vec::new();
        }
        self.socket = None;
        let mut out = Vec::new();

        match (self.status, self.room.clone()) {
            (ClientStatus::Idle, _) => {}
            (ClientStatus::Disconnected, _) => {
                debug!("connection closed while disconnected, not retrying");
            }
            (_, Some(_)) if self.attempts < self.max_reconnect_attempts => {
                self.attempts += 1;
                info!(
                    attempt = self.attempts,
                    max = self.max_reconnect_attempts,
                    "connection lost, scheduling reconnect"
                );
                self.set_status(ClientStatus::Reconnecting, &mut out);
                out.push(Directive::ScheduleReconnect {
                    generation: self.generation,
                    delay: self.reconnect_delay,
                });
            }
            (_, room) => {
                let error = if room.is_some() {
                    ClientError::ReconnectExhausted(self.attempts)
                } else {
                    ClientError::ConnectionLost
                };
                info!(%error, "giving up on connection");
                self.set_status(ClientStatus::Disconnected, &mut out);
                out.push(Directive::Emit(ClientEvent::Error(error)));
            }
        }
        out
    }

    /// The delay from a [`Directive::ScheduleReconnect`] has elapsed.
    pub fn on_reconnect_due(&mut self, generation: u64) -> Vec<Directive> {
        if generation != self.generation || self.status != ClientStatus::Reconnecting {
            return Vec::new();
        }
        match self.room.clone() {
            Some(room) => self.connect(ConnectTarget::Room(room)),
            None => Vec::new(),
        }
    }

    // -- internals ----------------------------------------------------------

    fn connect(&mut self, target: ConnectTarget) -> Vec<Directive> {
        let mut out = self.teardown();
        if let ConnectTarget::Room(room) = &target {
            self.room = Some(room.clone());
        }
        self.socket = Some(Socket {
            generation: self.generation,
            open: false,
        });
        self.set_status(ClientStatus::Connecting, &mut out);
        out.push(Directive::Open {
            generation: self.generation,
            target,
        });
        out
    }

    /// Invalidates the current generation and closes its socket.
    fn teardown(&mut self) -> Vec<Directive> {
        self.generation += 1;
        self.socket
            .take()
            .map(|socket| Directive::Close {
                generation: socket.generation,
            })
            .into_iter()
            .collect()
    }

    fn forget_room(&mut self) {
        self.room = None;
        self.player = None;
        self.game = None;
        self.attempts = 0;
    }

    /// Replaces the local copy wholesale.
    fn adopt(&mut self, game_state: GameState, out: &mut Vec<Directive>) {
        self.game = Some(game_state.clone());
        out.push(Directive::Emit(ClientEvent::State(game_state)));
    }

    fn set_status(&mut self, status: ClientStatus, out: &mut Vec<Directive>) {
        if self.status != status {
            debug!(from = ?self.status, to = ?status, "client status changed");
            self.status = status;
            out.push(Directive::Emit(ClientEvent::Status(status)));
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.socket.is_some_and(|s| s.generation == generation)
    }
}

#[cfg(test)]
mod tests {
    use dotbox_engine::apply_move;

    use super::*;

    fn controller() -> ClientController {
        ClientController::new(&ClientConfig::default())
    }

    fn room() -> RoomCode {
        RoomCode::parse("ABCD").unwrap()
    }

    fn joined(ready: bool) -> ServerMessage {
        ServerMessage::Joined {
            player_index: Player::One,
            room_id: room(),
            game_state: GameState::standard(),
            ready,
        }
    }

    fn emitted(out: &[Directive]) -> Vec<ClientEvent> {
        out.iter()
            .filter_map(|d| match d {
                Directive::Emit(event) => Some(event.clone()),
                _ => None,
            })
            .collect()
    }

    /// Joins and opens; returns the live generation.
    fn connected(c: &mut ClientController, ready: bool) -> u64 {
        c.join(room());
        let generation = c.generation();
        c.on_open(generation);
        c.on_message(generation, joined(ready));
        generation
    }

    #[test]
    fn test_join_opens_connection_and_enters_connecting() {
        let mut c = controller();
        let out = c.join(room());
        assert_eq!(c.status(), ClientStatus::Connecting);
        assert_eq!(
            out,
            vec![
                Directive::Emit(ClientEvent::Status(ClientStatus::Connecting)),
                Directive::Open {
                    generation: c.generation(),
                    target: ConnectTarget::Room(room()),
                },
            ]
        );
    }

    #[test]
    fn test_connect_tears_down_previous_connection_first() {
        let mut c = controller();
        let old = connected(&mut c, false);
        let out = c.create_room();
        assert_eq!(out[0], Directive::Close { generation: old });
        assert!(c.generation() > old);
        assert!(c.room().is_none());
    }

    #[test]
    fn test_joined_records_slot_room_and_status() {
        let mut c = controller();
        c.create_room();
        let generation = c.generation();
        c.on_open(generation);
        let out = c.on_message(generation, joined(false));

        assert_eq!(c.status(), ClientStatus::Waiting);
        assert_eq!(c.player(), Some(Player::One));
        assert_eq!(c.room(), Some(&room()));
        assert_eq!(
            emitted(&out),
            vec![
                ClientEvent::Joined {
                    player_index: Player::One,
                    room: room(),
                },
                ClientEvent::State(GameState::standard()),
                ClientEvent::Status(ClientStatus::Waiting),
            ]
        );
    }

    #[test]
    fn test_joined_ready_and_opponent_joined() {
        let mut c = controller();
        connected(&mut c, true);
        assert_eq!(c.status(), ClientStatus::Ready);

        let mut c = controller();
        let generation = connected(&mut c, false);
        c.on_message(
            generation,
            ServerMessage::OpponentJoined {
                game_state: GameState::standard(),
            },
        );
        assert_eq!(c.status(), ClientStatus::Ready);
    }

    #[test]
    fn test_state_adopts_and_infers_feedback() {
        let mut c = controller();
        let generation = connected(&mut c, true);
        let next = apply_move(&GameState::standard(), Line::horizontal(0, 0)).unwrap();

        let out = c.on_message(generation, ServerMessage::State { game_state: next.clone() });
        assert_eq!(c.game(), Some(&next));
        assert_eq!(
            emitted(&out),
            vec![
                ClientEvent::State(next),
                ClientEvent::Feedback(Feedback::LineDrawn),
            ]
        );
    }

    #[test]
    fn test_ping_is_answered_with_pong_only() {
        let mut c = controller();
        let generation = connected(&mut c, true);
        let before = c.game().cloned();

        let out = c.on_message(generation, ServerMessage::Ping);
        assert_eq!(
            out,
            vec![Directive::Send {
                generation,
                message: ClientMessage::Pong,
            }]
        );
        assert_eq!(c.game().cloned(), before);
        assert_eq!(c.status(), ClientStatus::Ready);
    }

    #[test]
    fn test_error_message_is_informational() {
        let mut c = controller();
        let generation = connected(&mut c, true);
        let out = c.on_message(generation, ServerMessage::error("Not your turn"));
        assert_eq!(emitted(&out), vec![ClientEvent::Notice("Not your turn".into())]);
        assert_eq!(c.status(), ClientStatus::Ready);
    }

    #[test]
    fn test_full_goes_idle_and_never_reconnects() {
        let mut c = controller();
        c.join(room());
        let generation = c.generation();
        c.on_open(generation);

        let out = c.on_message(generation, ServerMessage::Full);
        assert_eq!(c.status(), ClientStatus::Idle);
        assert_eq!(c.reconnect_attempts(), 0);
        assert!(out.contains(&Directive::Close { generation }));
        assert!(emitted(&out).contains(&ClientEvent::Error(ClientError::RoomFull)));

        // The server closing the socket afterwards is a stale callback.
        assert!(c.on_closed(generation).is_empty());
        assert_eq!(c.status(), ClientStatus::Idle);
    }

    #[test]
    fn test_opponent_disconnected_keeps_state_and_stops_retries() {
        let mut c = controller();
        let generation = connected(&mut c, true);
        let latest = apply_move(&GameState::standard(), Line::vertical(0, 0)).unwrap();

        c.on_message(
            generation,
            ServerMessage::OpponentDisconnected {
                game_state: Some(latest.clone()),
            },
        );
        assert_eq!(c.status(), ClientStatus::Disconnected);
        assert_eq!(c.game(), Some(&latest));

        let out = c.on_closed(generation);
        assert!(out.is_empty());
        assert_eq!(c.status(), ClientStatus::Disconnected);
    }

    #[test]
    fn test_unexpected_close_schedules_bounded_reconnects() {
        let config = ClientConfig::default().with_max_reconnect_attempts(2);
        let mut c = ClientController::new(&config);
        let generation = connected(&mut c, true);

        let out = c.on_closed(generation);
        assert_eq!(c.status(), ClientStatus::Reconnecting);
        assert_eq!(c.reconnect_attempts(), 1);
        assert!(out.contains(&Directive::ScheduleReconnect {
            generation: c.generation(),
            delay: Duration::from_secs(2),
        }));

        let out = c.on_reconnect_due(c.generation());
        assert_eq!(c.status(), ClientStatus::Connecting);
        assert!(out.contains(&Directive::Open {
            generation: c.generation(),
            target: ConnectTarget::Room(room()),
        }));

        // The server is still down: each failed attempt counts.
        c.on_open_failed(c.generation(), "refused".into());
        assert_eq!(c.status(), ClientStatus::Reconnecting);
        assert_eq!(c.reconnect_attempts(), 2);

        c.on_reconnect_due(c.generation());
        let out = c.on_open_failed(c.generation(), "refused".into());
        assert_eq!(c.status(), ClientStatus::Disconnected);
        assert!(emitted(&out).contains(&ClientEvent::Error(ClientError::ReconnectExhausted(2))));

        // Terminal: nothing left to fire.
        assert!(c.on_reconnect_due(c.generation()).is_empty());
    }

    #[test]
    fn test_successful_open_resets_attempts() {
        let mut c = controller();
        let generation = connected(&mut c, true);
        c.on_closed(generation);
        assert_eq!(c.reconnect_attempts(), 1);

        c.on_reconnect_due(c.generation());
        c.on_open(c.generation());
        assert_eq!(c.reconnect_attempts(), 0);
    }

    #[test]
    fn test_open_failure_returns_idle_without_consuming_attempt() {
        let mut c = controller();
        c.join(room());
        let out = c.on_open_failed(c.generation(), "connection refused".into());
        assert_eq!(c.status(), ClientStatus::Idle);
        assert_eq!(c.reconnect_attempts(), 0);
        assert!(
            emitted(&out)
                .contains(&ClientEvent::Error(ClientError::CouldNotConnect("connection refused".into())))
        );
    }

    #[test]
    fn test_stale_generation_callbacks_are_ignored() {
        let mut c = controller();
        let old = connected(&mut c, true);
        c.join(room());
        let current = c.generation();

        assert!(c.on_message(old, ServerMessage::Full).is_empty());
        assert!(c.on_closed(old).is_empty());
        assert_eq!(c.on_open(old), vec![Directive::Close { generation: old }]);
        assert_eq!(c.status(), ClientStatus::Connecting);
        assert_eq!(c.generation(), current);
    }

    #[test]
    fn test_leave_cancels_pending_reconnect() {
        let mut c = controller();
        let generation = connected(&mut c, true);
        c.on_closed(generation);
        let token = c.generation();

        c.leave();
        assert_eq!(c.status(), ClientStatus::Idle);
        assert!(c.on_reconnect_due(token).is_empty());
        assert_eq!(c.status(), ClientStatus::Idle);
    }

    #[test]
    fn test_close_before_room_known_is_connection_lost() {
        let mut c = controller();
        c.create_room();
        let generation = c.generation();
        c.on_open(generation);
        let out = c.on_closed(generation);
        assert_eq!(c.status(), ClientStatus::Disconnected);
        assert!(emitted(&out).contains(&ClientEvent::Error(ClientError::ConnectionLost)));
    }

    #[test]
    fn test_play_requires_open_connection() {
        let mut c = controller();
        assert_eq!(c.play(Line::horizontal(0, 0)), Err(ClientError::NotConnected));

        let generation = connected(&mut c, true);
        let out = c.play(Line::horizontal(0, 0)).unwrap();
        assert_eq!(
            out,
            vec![Directive::Send {
                generation,
                message: ClientMessage::play(Line::horizontal(0, 0)),
            }]
        );
    }
}
