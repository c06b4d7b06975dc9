//! Reclamation of stale and abandoned rooms.
//!
//! A best-effort, client-driven distributed sweep: any subscribed client
//! runs it periodically, and lifecycle operations run it opportunistically
//! before create/join to thin out dead codes. There is no election and no
//! locking; concurrent sweepers may race to delete the same room, which is
//! harmless because `Store::remove` is delete-if-exists.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use parlor_protocol::{Room, RoomCode, decode_room, now_ms};
use parlor_store::Store;

use crate::{LobbyConfig, RoomError};

/// Why a room was reclaimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    /// No seated players; the document is garbage awaiting deletion.
    Empty,
    /// `lastActivity` is past the hard idle cap, regardless of presence.
    Idle,
    /// Nobody has heartbeat inside the presence window and the room is
    /// past its creation grace period.
    Abandoned,
}

/// Decides whether a room is reclaimable at `now` (milliseconds).
///
/// Pure so the expiry matrix is testable with explicit timestamps.
pub fn is_stale(room: &Room, now: u64, config: &LobbyConfig) -> Option<StaleReason> {
    if room.players.is_empty() {
        return Some(StaleReason::Empty);
    }

    let idle_cap = config.idle_cap.as_millis() as u64;
    if now.saturating_sub(room.last_activity) > idle_cap {
        return Some(StaleReason::Idle);
    }

    let age = now.saturating_sub(room.created_at);
    if age <= config.creation_grace.as_millis() as u64 {
        return None;
    }
    let window = config.presence_window.as_millis() as u64;
    let anyone_alive = room
        .freshest_ping()
        .is_some_and(|ping| now.saturating_sub(ping) <= window);
    if !anyone_alive {
        return Some(StaleReason::Abandoned);
    }

    None
}

/// One pass over every live room, deleting the reclaimable ones.
///
/// Returns how many rooms this pass deleted. Rooms that vanish or fail to
/// decode mid-pass are skipped; another sweeper may already be working the
/// same list.
pub async fn sweep<S: Store>(store: &S, config: &LobbyConfig) -> Result<usize, RoomError> {
    let now = now_ms();
    let mut deleted = 0;

    for key in store.list().await? {
        if RoomCode::from_storage_key(&key).is_none() {
            continue;
        }
        let Some(value) = store.get(&key).await? else {
            continue; // raced with another deleter
        };
        let room = match decode_room(&value) {
            Ok(room) => room,
            Err(err) => {
                tracing::warn!(%key, %err, "skipping undecodable room document");
                continue;
            }
        };
        if let Some(reason) = is_stale(&room, now, config) {
            store.remove(&key).await?;
            deleted += 1;
            tracing::info!(code = %room.code, ?reason, "stale room reclaimed");
        }
    }

    Ok(deleted)
}

/// A running periodic sweeper. Dropping the handle cancels it.
pub struct SweeperHandle {
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stops the sweeper.
    pub fn stop(self) {
        // Drop does the work.
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawns the periodic sweep every `config.sweep_interval`.
pub fn spawn_sweeper<S: Store>(store: Arc<S>, config: LobbyConfig) -> SweeperHandle {
    let task = tokio::spawn(async move {
        let period = config.sweep_interval.max(Duration::from_secs(1));
        let mut ticker = time::interval_at(time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(err) = sweep(&*store, &config).await {
                tracing::warn!(%err, "reclamation sweep failed");
            }
        }
    });
    SweeperHandle { task }
}

// =========================================================================
// Tests
// =========================================================================
