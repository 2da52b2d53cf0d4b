//! Room actor: an isolated Tokio task that owns one match.
//!
//! The actor holds the authoritative [`GameState`], the two player slots and
//! the heartbeat cycle. The outside world talks to it only through a
//! [`RoomHandle`], so every mutation runs on one sequential path and the
//! heartbeat never interleaves with message handling.

use std::ops::ControlFlow;

use dotbox_engine::{apply_move, GameState, Player};
use dotbox_heartbeat::{Beat, HeartbeatScheduler};
use dotbox_protocol::{notice, ClientMessage, RoomCode, ServerMessage};
use dotbox_transport::ConnectionId;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{RoomConfig, RoomError, RoomStore};

/// What the room asks a connection handler to do with its socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerOutbound {
    /// Encode and send this message.
    Message(ServerMessage),
    /// The peer stopped answering pings. Close the socket and stop; the
    /// room has already released the slot.
    Close,
}

/// Channel for delivering outbound traffic to one connection handler.
///
/// Unbounded so a slow socket never stalls the room; each handler drains
/// its own queue in order.
pub type PeerSender = mpsc::UnboundedSender<PeerOutbound>;

/// Result of a successful [`RoomHandle::connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    /// The slot assigned to the connection.
    pub player: Player,
    /// Whether the opponent's slot was already occupied.
    pub ready: bool,
}

/// A snapshot of room metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    /// The room's code.
    pub code: RoomCode,
    /// Slots that currently hold a live socket.
    pub occupied: Vec<Player>,
    /// Moves applied to the in-memory state.
    pub move_count: u64,
}

impl RoomInfo {
    /// Number of connected players.
    pub fn player_count(&self) -> usize {
        self.occupied.len()
    }
}

pub(crate) enum RoomCommand {
    Connect {
        conn_id: ConnectionId,
        sender: PeerSender,
        reply: oneshot::Sender<Result<Admission, RoomError>>,
    },
    Client {
        conn_id: ConnectionId,
        msg: ClientMessage,
    },
    Disconnect {
        conn_id: ConnectionId,
    },
    Info {
        reply: oneshot::Sender<RoomInfo>,
    },
    Shutdown,
}

/// Handle to a running room actor.
///
/// Cheap to clone. Every method fails with [`RoomError::Unavailable`] once
/// the actor has stopped.
#[derive(Clone)]
pub struct RoomHandle {
    code: RoomCode,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    /// The room's code.
    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    /// Whether the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Asks the room to admit a connection.
    ///
    /// On success the `joined` greeting is already queued on `sender`.
    /// A full room answers [`RoomError::RoomFull`] and never tracks the
    /// connection.
    pub async fn connect(
        &self,
        conn_id: ConnectionId,
        sender: PeerSender,
    ) -> Result<Admission, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::Connect {
            conn_id,
            sender,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| self.unavailable())?
    }

    /// Delivers a decoded client message (fire-and-forget).
    pub async fn deliver(&self, conn_id: ConnectionId, msg: ClientMessage) -> Result<(), RoomError> {
        self.send(RoomCommand::Client { conn_id, msg }).await
    }

    /// Reports that a connection's socket has closed.
    pub async fn disconnect(&self, conn_id: ConnectionId) -> Result<(), RoomError> {
        self.send(RoomCommand::Disconnect { conn_id }).await
    }

    /// Requests the current room info.
    pub async fn info(&self) -> Result<RoomInfo, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::Info { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    /// Stops the actor, closing every tracked socket.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.send(RoomCommand::Shutdown).await
    }

    async fn send(&self, cmd: RoomCommand) -> Result<(), RoomError> {
        self.sender.send(cmd).await.map_err(|_| self.unavailable())
    }

    fn unavailable(&self) -> RoomError {
        RoomError::Unavailable(self.code.clone())
    }
}

/// A tracked socket in one slot.
struct Peer {
    conn_id: ConnectionId,
    sender: PeerSender,
    /// Last pong (or admission) time.
    last_seen: Instant,
}

impl Peer {
    fn send(&self, msg: ServerMessage) {
        // A closed queue means the handler is already on its way out and
        // will report the disconnect itself.
        let _ = self.sender.send(PeerOutbound::Message(msg));
    }
}

fn slot_player(index: usize) -> Player {
    if index == 0 { Player::One } else { Player::Two }
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor<S: RoomStore> {
    code: RoomCode,
    state: GameState,
    /// Index 0 is player 1, index 1 is player 2.
    slots: [Option<Peer>; 2],
    store: S,
    heartbeat: HeartbeatScheduler,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl<S: RoomStore> RoomActor<S> {
    async fn run(mut self) {
        info!(room = %self.code, "room actor started");

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else { break };
                    if self.handle_command(cmd).await.is_break() {
                        break;
                    }
                }
                beat = self.heartbeat.wait_for_beat() => {
                    if self.on_heartbeat(beat).await.is_break() {
                        break;
                    }
                }
            }
        }

        info!(room = %self.code, "room actor stopped");
    }

    async fn handle_command(&mut self, cmd: RoomCommand) -> ControlFlow<()> {
        match cmd {
            RoomCommand::Connect {
                conn_id,
                sender,
                reply,
            } => {
                let result = self.handle_connect(conn_id, sender).await;
                let _ = reply.send(result);
            }
            RoomCommand::Client {
                conn_id,
                msg: ClientMessage::Pong,
            } => self.handle_pong(conn_id),
            RoomCommand::Client { conn_id, msg } => self.handle_move(conn_id, &msg).await,
            RoomCommand::Disconnect { conn_id } => self.handle_disconnect(conn_id).await,
            RoomCommand::Info { reply } => {
                let _ = reply.send(self.info());
            }
            RoomCommand::Shutdown => {
                info!(room = %self.code, "room shutting down");
                for peer in self.slots.iter_mut().filter_map(Option::take) {
                    let _ = peer.sender.send(PeerOutbound::Close);
                }
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    async fn handle_connect(
        &mut self,
        conn_id: ConnectionId,
        sender: PeerSender,
    ) -> Result<Admission, RoomError> {
        if let Some(index) = self.slot_of(conn_id) {
            warn!(room = %self.code, %conn_id, "connection admitted twice, ignoring");
            return Ok(Admission {
                player: slot_player(index),
                ready: self.is_full(),
            });
        }
        let Some(index) = self.slots.iter().position(Option::is_none) else {
            info!(room = %self.code, %conn_id, "room full, rejecting connection");
            return Err(RoomError::RoomFull(self.code.clone()));
        };

        self.hydrate().await;

        let player = slot_player(index);
        let peer = Peer {
            conn_id,
            sender,
            last_seen: Instant::now(),
        };
        let ready = self.slots[1 - index].is_some();
        peer.send(ServerMessage::Joined {
            player_index: player,
            room_id: self.code.clone(),
            game_state: self.state.clone(),
            ready,
        });
        self.slots[index] = Some(peer);
        self.heartbeat.arm();

        if let Some(opponent) = &self.slots[1 - index] {
            opponent.send(ServerMessage::OpponentJoined {
                game_state: self.state.clone(),
            });
        }

        info!(room = %self.code, %conn_id, slot = %player, ready, "player joined");
        Ok(Admission { player, ready })
    }

    async fn handle_move(&mut self, conn_id: ConnectionId, msg: &ClientMessage) {
        let Some(index) = self.slot_of(conn_id) else {
            warn!(room = %self.code, %conn_id, "message from untracked connection, ignoring");
            return;
        };
        if !self.is_full() {
            self.notice(index, notice::WAITING_FOR_OPPONENT);
            return;
        }

        self.hydrate().await;

        let player = slot_player(index);
        if player != self.state.current_player() {
            self.notice(index, notice::NOT_YOUR_TURN);
            return;
        }
        let Some(line) = msg.requested_line() else {
            debug!(room = %self.code, %conn_id, ?msg, "incomplete move request");
            self.notice(index, notice::INVALID_MOVE);
            return;
        };

        match apply_move(&self.state, line) {
            Ok(next) => {
                self.state = next;
                debug!(
                    room = %self.code,
                    slot = %player,
                    %line,
                    move_count = self.state.move_count(),
                    "move accepted"
                );
                self.persist().await;
                self.broadcast(ServerMessage::State {
                    game_state: self.state.clone(),
                });
                if self.state.is_finished() {
                    info!(room = %self.code, winner = ?self.state.winner(), "game finished");
                }
            }
            Err(e) => {
                debug!(room = %self.code, slot = %player, error = %e, "move rejected");
                self.notice(index, notice::INVALID_MOVE);
            }
        }
    }

    fn handle_pong(&mut self, conn_id: ConnectionId) {
        if let Some(peer) = self
            .slots
            .iter_mut()
            .flatten()
            .find(|peer| peer.conn_id == conn_id)
        {
            peer.last_seen = Instant::now();
        }
    }

    async fn handle_disconnect(&mut self, conn_id: ConnectionId) {
        // Sockets closed for staleness were already released.
        let Some(index) = self.slot_of(conn_id) else {
            debug!(room = %self.code, %conn_id, "disconnect from untracked connection");
            return;
        };
        self.slots[index] = None;
        info!(room = %self.code, %conn_id, slot = %slot_player(index), "player left");

        self.hydrate().await;
        self.announce_disconnect();
    }

    /// One heartbeat tick: purge and stop if nobody is left, otherwise
    /// close stale sockets and ping the rest.
    async fn on_heartbeat(&mut self, beat: Beat) -> ControlFlow<()> {
        if self.slots.iter().all(Option::is_none) {
            info!(room = %self.code, "room empty at heartbeat, purging");
            if let Err(e) = self.store.purge(&self.code).await {
                warn!(room = %self.code, error = %e, "failed to purge room state");
            }
            return ControlFlow::Break(());
        }

        let mut evicted = false;
        for index in 0..self.slots.len() {
            let stale = matches!(
                &self.slots[index],
                Some(peer) if self.heartbeat.is_stale(peer.last_seen, beat.at)
            );
            if !stale {
                continue;
            }
            if let Some(peer) = self.slots[index].take() {
                warn!(
                    room = %self.code,
                    conn_id = %peer.conn_id,
                    slot = %slot_player(index),
                    "peer stopped answering pings, closing"
                );
                let _ = peer.sender.send(PeerOutbound::Close);
                evicted = true;
            }
        }
        if evicted {
            self.hydrate().await;
            self.announce_disconnect();
        }

        for peer in self.slots.iter().flatten() {
            peer.send(ServerMessage::Ping);
        }
        ControlFlow::Continue(())
    }

    /// Replaces the in-memory state with the persisted one, if any.
    async fn hydrate(&mut self) {
        match self.store.load(&self.code).await {
            // A failed save leaves storage behind memory; never roll back.
            Ok(Some(stored)) if stored.move_count() < self.state.move_count() => {
                debug!(
                    room = %self.code,
                    stored = stored.move_count(),
                    in_memory = self.state.move_count(),
                    "stored room state is stale, keeping in-memory copy"
                );
            }
            Ok(Some(stored)) => {
                if stored.move_count() != self.state.move_count() {
                    debug!(
                        room = %self.code,
                        stored = stored.move_count(),
                        in_memory = self.state.move_count(),
                        "hydrated room state from storage"
                    );
                }
                self.state = stored;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(room = %self.code, error = %e, "failed to load room state, using in-memory copy");
            }
        }
    }

    async fn persist(&self) {
        if let Err(e) = self.store.save(&self.code, &self.state).await {
            warn!(
                room = %self.code,
                move_count = self.state.move_count(),
                error = %e,
                "failed to persist room state"
            );
        }
    }

    fn announce_disconnect(&self) {
        self.broadcast(ServerMessage::OpponentDisconnected {
            game_state: Some(self.state.clone()),
        });
    }

    fn broadcast(&self, msg: ServerMessage) {
        for peer in self.slots.iter().flatten() {
            peer.send(msg.clone());
        }
    }

    fn notice(&self, index: usize, message: &str) {
        if let Some(peer) = &self.slots[index] {
            peer.send(ServerMessage::error(message));
        }
    }

    fn slot_of(&self, conn_id: ConnectionId) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|peer| peer.conn_id == conn_id))
    }

    fn is_full(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            code: self.code.clone(),
            occupied: self
                .slots
                .iter()
                .enumerate()
                .filter(|(_, slot)| slot.is_some())
                .map(|(index, _)| slot_player(index))
                .collect(),
            move_count: self.state.move_count(),
        }
    }
}

/// Spawns a room actor task and returns a handle to it.
///
/// The heartbeat starts armed, so a room nobody ever connects to is purged
/// and stopped after one interval.
pub(crate) fn spawn_room<S: RoomStore>(
    code: RoomCode,
    state: GameState,
    config: &RoomConfig,
    store: S,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(config.channel_size.max(1));
    let mut heartbeat = HeartbeatScheduler::new(config.heartbeat.clone());
    heartbeat.arm();

    let actor = RoomActor {
        code: code.clone(),
        state,
        slots: [None, None],
        store,
        heartbeat,
        receiver: rx,
    };
    tokio::spawn(actor.run());

    RoomHandle { code, sender: tx }
}
