//! Async driver that runs a [`ClientController`] over real WebSockets.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dotbox_engine::Line;
use dotbox_protocol::{ClientMessage, Codec, JsonCodec, RoomCode, ServerMessage};
use dotbox_transport::{ClientConnection, Connection};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{ClientConfig, ClientController, ClientError, ClientEvent, Directive};

/// Upper bound on a graceful WebSocket close before the socket is dropped.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

enum Command {
    CreateRoom,
    Join(RoomCode),
    Play(Line),
    Leave,
    Shutdown,
}

/// Transport callbacks, each tagged with the generation of its connection.
enum Input {
    Opened {
        generation: u64,
        conn: Arc<ClientConnection>,
    },
    OpenFailed {
        generation: u64,
        reason: String,
    },
    Frame {
        generation: u64,
        data: Vec<u8>,
    },
    Closed {
        generation: u64,
    },
    ReconnectDue {
        generation: u64,
    },
}

/// Handle to a running client session.
///
/// Created with [`ClientSession::start`], which spawns the driver task and
/// returns this handle together with the event receiver. All methods queue
/// a command and return immediately.
pub struct ClientSession {
    commands: mpsc::UnboundedSender<Command>,
    task: Option<JoinHandle<()>>,
    shutdown_timeout: Duration,
}

impl ClientSession {
    /// Starts an idle session.
    #[must_use = "the event receiver must be used to receive events"]
    pub fn start(config: ClientConfig) -> (Self, mpsc::Receiver<ClientEvent>) {
        let (commands, command_rx) = mpsc::unbounded_channel();
        // tokio panics on a zero-capacity channel.
        let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity.max(1));
        let (inputs_tx, inputs_rx) = mpsc::unbounded_channel();
        let shutdown_timeout = config.shutdown_timeout;

        let driver = Driver {
            controller: ClientController::new(&config),
            config,
            events: event_tx,
            inputs_tx,
            inputs_rx,
            links: HashMap::new(),
        };
        let task = tokio::spawn(driver.run(command_rx));

        let session = Self {
            commands,
            task: Some(task),
            shutdown_timeout,
        };
        (session, event_rx)
    }

    /// Asks the server for a fresh room and joins it as player 1.
    pub fn create_room(&self) -> Result<(), ClientError> {
        self.send(Command::CreateRoom)
    }

    /// Joins the room with the given code (case-insensitive).
    pub fn join(&self, code: &str) -> Result<(), ClientError> {
        let code = RoomCode::parse(code)?;
        self.send(Command::Join(code))
    }

    /// Requests a move. Rejections arrive as [`ClientEvent::Notice`].
    pub fn play(&self, row: usize, col: usize, horizontal: bool) -> Result<(), ClientError> {
        self.send(Command::Play(Line::new(row, col, horizontal)))
    }

    /// Leaves the current room and returns to `Idle`.
    pub fn leave(&self) -> Result<(), ClientError> {
        self.send(Command::Leave)
    }

    /// Closes any connection and stops the driver task.
    ///
    /// The event receiver yields `None` afterwards.
    pub async fn shutdown(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => warn!("client driver terminated with join error: {join_err}"),
                Err(_) => {
                    warn!("client driver did not exit within timeout; aborting task");
                    task.abort();
                }
            }
        }
    }

    fn send(&self, command: Command) -> Result<(), ClientError> {
        self.commands.send(command).map_err(|_| ClientError::Shutdown)
    }
}

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("running", &self.task.is_some())
            .finish()
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// One connection attempt: the task that opens and reads it, plus the
/// socket once it is open.
struct Link {
    task: JoinHandle<()>,
    conn: Option<Arc<ClientConnection>>,
}

impl Link {
    fn shutdown(self) {
        let Link { task, conn } = self;
        tokio::spawn(async move {
            if let Some(conn) = conn {
                let _ = tokio::time::timeout(CLOSE_TIMEOUT, conn.close()).await;
            }
            task.abort();
        });
    }
}

struct Driver {
    config: ClientConfig,
    controller: ClientController,
    events: mpsc::Sender<ClientEvent>,
    inputs_tx: mpsc::UnboundedSender<Input>,
    inputs_rx: mpsc::UnboundedReceiver<Input>,
    links: HashMap<u64, Link>,
}

impl Driver {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        debug!("client driver started");
        loop {
            tokio::select! {
                command = commands.recv() => {
                    let out = match command {
                        Some(Command::CreateRoom) => self.controller.create_room(),
                        Some(Command::Join(code)) => self.controller.join(code),
                        Some(Command::Play(line)) => self
                            .controller
                            .play(line)
                            .unwrap_or_else(|e| vec![Directive::Emit(ClientEvent::Error(e))]),
                        Some(Command::Leave) => self.controller.leave(),
                        Some(Command::Shutdown) | None => break,
                    };
                    self.apply(out).await;
                }
                Some(input) = self.inputs_rx.recv() => {
                    let out = self.handle_input(input);
                    self.apply(out).await;
                }
            }
        }

        for (_, link) in self.links.drain() {
            link.shutdown();
        }
        debug!("client driver stopped");
    }

    fn handle_input(&mut self, input: Input) -> Vec<Directive> {
        match input {
            Input::Opened { generation, conn } => match self.links.get_mut(&generation) {
                Some(link) => {
                    link.conn = Some(conn);
                    self.controller.on_open(generation)
                }
                None => {
                    // Abandoned while the handshake was in flight.
                    tokio::spawn(async move {
                        let _ = tokio::time::timeout(CLOSE_TIMEOUT, conn.close()).await;
                    });
                    Vec::new()
                }
            },
            Input::OpenFailed { generation, reason } => {
                self.links.remove(&generation);
                self.controller.on_open_failed(generation, reason)
            }
            Input::Frame { generation, data } => match JsonCodec.decode::<ServerMessage>(&data) {
                Ok(message) => self.controller.on_message(generation, message),
                Err(e) => {
                    debug!(generation, error = %e, "dropping malformed frame");
                    Vec::new()
                }
            },
            Input::Closed { generation } => {
                self.links.remove(&generation);
                self.controller.on_closed(generation)
            }
            Input::ReconnectDue { generation } => self.controller.on_reconnect_due(generation),
        }
    }

    async fn apply(&mut self, directives: Vec<Directive>) {
        for directive in directives {
            match directive {
                Directive::Open { generation, target } => {
                    let url = self.config.url_for(&target);
                    debug!(generation, %url, "opening connection");
                    let task = tokio::spawn(run_connection(url, generation, self.inputs_tx.clone()));
                    self.links.insert(generation, Link { task, conn: None });
                }
                Directive::Close { generation } => {
                    if let Some(link) = self.links.remove(&generation) {
                        debug!(generation, "closing connection");
                        link.shutdown();
                    }
                }
                Directive::Send {
                    generation,
                    message,
                } => self.send(generation, &message).await,
                Directive::ScheduleReconnect { generation, delay } => {
                    let inputs = self.inputs_tx.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let _ = inputs.send(Input::ReconnectDue { generation });
                    });
                }
                Directive::Emit(event) => self.emit(event),
            }
        }
    }

    async fn send(&self, generation: u64, message: &ClientMessage) {
        let Some(conn) = self.links.get(&generation).and_then(|link| link.conn.clone()) else {
            debug!(generation, "no open connection to send on");
            return;
        };
        match JsonCodec.encode(message) {
            Ok(bytes) => {
                if let Err(e) = conn.send(&bytes).await {
                    // The reader will notice the close.
                    debug!(generation, error = %e, "send failed");
                }
            }
            Err(e) => warn!(error = %e, "failed to encode client message"),
        }
    }

    /// Never blocks the driver: a full channel drops the event.
    fn emit(&self, event: ClientEvent) {
        match self.events.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                warn!(event = ?dropped, "event channel full, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("event channel closed, receiver dropped");
            }
        }
    }
}

/// Opens one connection and forwards everything it receives.
async fn run_connection(url: String, generation: u64, inputs: mpsc::UnboundedSender<Input>) {
    let conn = match dotbox_transport::connect(&url).await {
        Ok(conn) => Arc::new(conn),
        Err(e) => {
            let _ = inputs.send(Input::OpenFailed {
                generation,
                reason: e.to_string(),
            });
            return;
        }
    };
    if inputs
        .send(Input::Opened {
            generation,
            conn: Arc::clone(&conn),
        })
        .is_err()
    {
        return;
    }

    loop {
        match conn.recv().await {
            Ok(Some(data)) => {
                if inputs.send(Input::Frame { generation, data }).is_err() {
                    return;
                }
            }
            Ok(None) => break,
            Err(e) => {
                debug!(generation, error = %e, "receive failed");
                break;
            }
        }
    }
    let _ = inputs.send(Input::Closed { generation });
}
