//! Heartbeat scheduler for Dotbox rooms.
//!
//! A room pings its sockets on a fixed interval while it has anyone to
//! ping, and closes sockets that have not answered for longer than the
//! staleness threshold. [`HeartbeatScheduler`] owns the timing half of that
//! cycle; the room owns the sockets and the bookkeeping.
//!
//! # Armed and disarmed
//!
//! A disarmed scheduler's [`HeartbeatScheduler::wait_for_beat`] pends
//! forever, so it can sit unconditionally inside a room actor's
//! `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* handle commands */ }
//!         beat = heartbeat.wait_for_beat() => {
//!             if sockets.is_empty() {
//!                 heartbeat.disarm();
//!             } else {
//!                 /* close stale sockets, ping the rest */
//!             }
//!         }
//!     }
//! }
//! ```
//!
//! All instants are [`tokio::time::Instant`], so paused-clock tests drive
//! the scheduler deterministically.

use std::time::Duration;

use rand::Rng;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

/// Timing knobs for the heartbeat cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// Time between two beats.
    pub interval: Duration,
    /// A socket whose last answer is older than this is considered dead.
    pub stale_after: Duration,
    /// Upper bound of the random delay added each time the scheduler is
    /// armed, so rooms created together do not ping in lockstep.
    pub initial_jitter: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            stale_after: Duration::from_secs(90),
            initial_jitter: Duration::from_millis(500),
        }
    }
}

impl HeartbeatConfig {
    /// Shortest interval the scheduler accepts.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(10);

    /// Config with the given interval and a staleness threshold of three
    /// missed intervals.
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            stale_after: interval * 3,
            ..Default::default()
        }
    }

    /// Sets the staleness threshold.
    pub fn stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// Sets the jitter bound.
    pub fn initial_jitter(mut self, jitter: Duration) -> Self {
        self.initial_jitter = jitter;
        self
    }

    /// Fix out-of-range values so the config is safe to use.
    ///
    /// Called by [`HeartbeatScheduler::new`]. The interval is raised to
    /// [`Self::MIN_INTERVAL`] and the staleness threshold is never shorter
    /// than one interval.
    pub fn validated(mut self) -> Self {
        if self.interval < Self::MIN_INTERVAL {
            warn!(
                interval_ms = self.interval.as_millis() as u64,
                "heartbeat interval below minimum, clamping"
            );
            self.interval = Self::MIN_INTERVAL;
        }
        if self.stale_after < self.interval {
            warn!(
                stale_ms = self.stale_after.as_millis() as u64,
                interval_ms = self.interval.as_millis() as u64,
                "stale threshold shorter than interval, raising"
            );
            self.stale_after = self.interval;
        }
        self
    }
}

/// Returned by [`HeartbeatScheduler::wait_for_beat`].
#[derive(Debug, Clone, Copy)]
pub struct Beat {
    /// Beats fired since the scheduler was created (starts at 1).
    pub count: u64,
    /// When the beat fired.
    pub at: Instant,
}

/// Recurring heartbeat timer for one room.
pub struct HeartbeatScheduler {
    config: HeartbeatConfig,
    next_beat: Option<Instant>,
    count: u64,
}

impl HeartbeatScheduler {
    /// Creates a disarmed scheduler.
    pub fn new(config: HeartbeatConfig) -> Self {
        let config = config.validated();
        debug!(
            interval_ms = config.interval.as_millis() as u64,
            stale_ms = config.stale_after.as_millis() as u64,
            "heartbeat scheduler created"
        );
        Self {
            config,
            next_beat: None,
            count: 0,
        }
    }

    /// Schedules the next beat one interval (plus jitter) from now.
    ///
    /// No-op if already armed, so the cadence is not pushed back every time
    /// another socket joins.
    pub fn arm(&mut self) {
        if self.next_beat.is_some() {
            return;
        }
        let jitter = self.jitter();
        self.next_beat = Some(Instant::now() + self.config.interval + jitter);
        trace!(jitter_ms = jitter.as_millis() as u64, "heartbeat armed");
    }

    /// Stops rescheduling. A pending `wait_for_beat` will never resolve.
    pub fn disarm(&mut self) {
        if self.next_beat.take().is_some() {
            trace!(beats = self.count, "heartbeat disarmed");
        }
    }

    /// Whether a beat is scheduled.
    pub fn is_armed(&self) -> bool {
        self.next_beat.is_some()
    }

    /// Waits for the next beat, then schedules the one after it.
    ///
    /// Pends forever while disarmed.
    pub async fn wait_for_beat(&mut self) -> Beat {
        let Some(next) = self.next_beat else {
            std::future::pending::<()>().await;
            unreachable!()
        };

        time::sleep_until(next).await;

        let now = Instant::now();
        self.count += 1;
        // Schedule from now; a late wake-up should not cause a burst.
        self.next_beat = Some(now + self.config.interval);
        trace!(beat = self.count, "heartbeat fired");

        Beat {
            count: self.count,
            at: now,
        }
    }

    /// Whether a socket last heard from at `last_seen` is dead as of `now`.
    pub fn is_stale(&self, last_seen: Instant, now: Instant) -> bool {
        now.saturating_duration_since(last_seen) > self.config.stale_after
    }

    /// Beats fired so far.
    pub fn beats(&self) -> u64 {
        self.count
    }

    /// The validated config in use.
    pub fn config(&self) -> &HeartbeatConfig {
        &self.config
    }

    fn jitter(&self) -> Duration {
        let max = self.config.initial_jitter.as_micros() as u64;
        if max == 0 {
            Duration::ZERO
        } else {
            Duration::from_micros(rand::rng().random_range(0..max))
        }
    }
}
