//! # Dotbox
//!
//! Two-player Dots and Boxes with a server-authoritative room per match.
//!
//! The server routes each WebSocket by its request path (`/new` creates a
//! room, `/room/{CODE}` joins one), hands it to that room's actor, and
//! relays traffic both ways. Rooms persist their state after every accepted
//! move and reload it before every state-touching operation.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dotbox::prelude::*;
//!
//! # async fn serve() -> Result<(), DotboxError> {
//! let server = DotboxServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .room_config(RoomConfig::default())
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::DotboxError;
pub use server::{DotboxServer, DotboxServerBuilder};

/// Re-exports for building servers and clients.
pub mod prelude {
    pub use crate::{DotboxError, DotboxServer, DotboxServerBuilder};

    pub use dotbox_client::{
        ClientConfig, ClientError, ClientEvent, ClientSession, ClientStatus, Feedback,
    };
    pub use dotbox_engine::{apply_move, GameState, Line, MoveError, Outcome, Player};
    pub use dotbox_heartbeat::HeartbeatConfig;
    pub use dotbox_protocol::{ClientMessage, RoomCode, ServerMessage};
    pub use dotbox_room::{
        FileStore, MemoryStore, RoomConfig, RoomDirectory, RoomError, RoomStore, StoreError,
    };
}
