//! Presence: the liveness heartbeat a client writes while attached.
//!
//! Presence only maintains the `pings/<id>` slot in the room document. It
//! never removes a player from the seat list; deciding that a silent room
//! is dead belongs to the reclamation sweep in the room layer.
//!
//! Two implementations of the [`Presence`] seam:
//!
//! - [`HeartbeatPresence`] — portable to any store: write a timestamp
//!   immediately and then on every interval, let the sweep evict silence.
//! - [`DisconnectPresence`] — adds the store-armed cleanup where the
//!   backend supports it, so a crashed client's ping disappears without
//!   waiting for the sweep.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use parlor_protocol::{PlayerId, RoomCode, RoomPatch, now_ms, paths};
use parlor_store::{Store, StoreError};

use crate::SessionError;

/// Default spacing between heartbeat writes.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// A running presence loop for one player in one room.
///
/// Dropping the handle cancels the loop. For [`DisconnectPresence`] the
/// cancellation also releases the store-side arm, which deletes the ping
/// slot, the same self-healing path an abnormal termination takes.
pub struct PresenceHandle {
    task: JoinHandle<()>,
}

impl PresenceHandle {
    /// Stops the heartbeat.
    pub fn stop(self) {
        // Drop does the work.
    }
}

impl Drop for PresenceHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// The presence seam: how a client advertises "I'm still here".
pub trait Presence: Send + Sync {
    /// Writes the first heartbeat and spawns the periodic loop.
    ///
    /// # Errors
    /// Surfaces the store error if the very first write fails (room
    /// already gone, backend unreachable).
    async fn start<S: Store>(
        &self,
        store: Arc<S>,
        code: &RoomCode,
        player: &PlayerId,
    ) -> Result<PresenceHandle, SessionError>;
}

// ---------------------------------------------------------------------------
// Heartbeat-only presence
// ---------------------------------------------------------------------------

/// Push-heartbeat presence with sweep-side eviction.
#[derive(Debug, Clone)]
pub struct HeartbeatPresence {
    interval: Duration,
}

impl HeartbeatPresence {
    /// Presence with a custom heartbeat interval.
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Default for HeartbeatPresence {
    fn default() -> Self {
        Self::new(DEFAULT_HEARTBEAT_INTERVAL)
    }
}

impl Presence for HeartbeatPresence {
    async fn start<S: Store>(
        &self,
        store: Arc<S>,
        code: &RoomCode,
        player: &PlayerId,
    ) -> Result<PresenceHandle, SessionError> {
        let key = code.storage_key();
        write_ping(&*store, &key, player).await?;

        let task = tokio::spawn(heartbeat_loop::<S>(
            store,
            key,
            player.clone(),
            self.interval,
            None,
        ));
        Ok(PresenceHandle { task })
    }
}

// ---------------------------------------------------------------------------
// Disconnect-hook presence
// ---------------------------------------------------------------------------

/// Heartbeat presence plus a store-armed ping removal on disconnect.
#[derive(Debug, Clone)]
pub struct DisconnectPresence {
    interval: Duration,
}

impl DisconnectPresence {
    /// Presence with a custom heartbeat interval.
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Default for DisconnectPresence {
    fn default() -> Self {
        Self::new(DEFAULT_HEARTBEAT_INTERVAL)
    }
}

impl Presence for DisconnectPresence {
    async fn start<S: Store>(
        &self,
        store: Arc<S>,
        code: &RoomCode,
        player: &PlayerId,
    ) -> Result<PresenceHandle, SessionError> {
        let key = code.storage_key();
        let arm = store.arm_on_disconnect(&key, &paths::ping(player)).await?;
        write_ping(&*store, &key, player).await?;

        let task = tokio::spawn(heartbeat_loop::<S>(
            store,
            key,
            player.clone(),
            self.interval,
            Some(arm),
        ));
        Ok(PresenceHandle { task })
    }
}

// ---------------------------------------------------------------------------
// Shared loop
// ---------------------------------------------------------------------------

async fn write_ping<S: Store>(
    store: &S,
    key: &str,
    player: &PlayerId,
) -> Result<(), StoreError> {
    let patch = RoomPatch::new().ping(player, now_ms()).into_patch();
    store.update(key, patch).await
}

/// Periodic heartbeat. Holds the disconnect arm (if any) for its whole
/// life, so cancelling the task releases the arm and the store deletes
/// the ping slot.
async fn heartbeat_loop<S: Store>(
    store: Arc<S>,
    key: String,
    player: PlayerId,
    period: Duration,
    _arm: Option<S::Arm>,
) {
    let mut ticker = time::interval_at(time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        match write_ping(&*store, &key, &player).await {
            Ok(()) => {}
            Err(StoreError::Missing(_)) => {
                tracing::debug!(%key, "room gone, heartbeat stopping");
                break;
            }
            Err(err) => {
                tracing::warn!(%key, %err, "heartbeat write failed");
            }
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
