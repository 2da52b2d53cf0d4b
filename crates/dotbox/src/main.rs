//! Dotbox server binary.
//!
//! # Usage
//!
//! ```bash
//! # In-memory rooms (lost on restart)
//! dotbox-server --bind 0.0.0.0:8080
//!
//! # Rooms persisted under ./rooms, resumed after a restart
//! dotbox-server --bind 0.0.0.0:8080 --data-dir ./rooms
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use dotbox::DotboxServerBuilder;
use dotbox_heartbeat::HeartbeatConfig;
use dotbox_room::{FileStore, RoomConfig, RoomStore};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Dots and Boxes room server
#[derive(Parser, Debug)]
#[command(name = "dotbox-server")]
#[command(about = "Server-authoritative Dots and Boxes rooms over WebSockets")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    bind: String,

    /// Directory for persisted rooms (in-memory if omitted)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Seconds between heartbeat pings
    #[arg(long, default_value = "30")]
    heartbeat_secs: u64,

    /// Seconds without a pong before a socket is closed (default: three
    /// heartbeat intervals)
    #[arg(long)]
    stale_secs: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn room_config(&self) -> RoomConfig {
        let mut heartbeat = HeartbeatConfig::with_interval(Duration::from_secs(self.heartbeat_secs));
        if let Some(stale) = self.stale_secs {
            heartbeat = heartbeat.stale_after(Duration::from_secs(stale));
        }
        RoomConfig::default().heartbeat(heartbeat.validated())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Dotbox server starting");

    let builder = DotboxServerBuilder::new()
        .bind(&args.bind)
        .room_config(args.room_config());

    match &args.data_dir {
        Some(dir) => {
            let store = FileStore::open(dir.clone()).await?;
            tracing::info!(dir = %store.dir().display(), "persisting rooms to disk");
            serve(builder.store(store)).await?;
        }
        None => {
            tracing::warn!("No data directory given - rooms live in memory only");
            serve(builder).await?;
        }
    }

    Ok(())
}

async fn serve<S: RoomStore>(
    builder: DotboxServerBuilder<S>,
) -> Result<(), Box<dyn std::error::Error>> {
    let server = builder.build().await?;
    tracing::info!("Server listening on {}", server.local_addr()?);
    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutdown signal received");
        })
        .await?;
    Ok(())
}
