//! Client side of a Dotbox match.
//!
//! [`ClientSession`] opens a WebSocket to a room, answers heartbeats,
//! keeps a local copy of the authoritative state and reconnects a bounded
//! number of times when the connection drops. The decisions are made by
//! the network-free [`ClientController`]; the session only executes its
//! [`Directive`]s.
//!
//! ```ignore
//! let (session, mut events) = ClientSession::start(ClientConfig::new("ws://127.0.0.1:8080"));
//! session.create_room()?;
//! while let Some(event) = events.recv().await {
//!     match event {
//!         ClientEvent::Joined { room, .. } => println!("share this code: {room}"),
//!         ClientEvent::State(state) => render(&state),
//!         _ => {}
//!     }
//! }
//! ```

mod config;
mod controller;
mod error;
mod event;
mod feedback;
mod session;

pub use config::{ClientConfig, ConnectTarget};
pub use controller::{ClientController, ClientStatus, Directive};
pub use error::ClientError;
pub use event::ClientEvent;
pub use feedback::Feedback;
pub use session::ClientSession;
