//! Timing and retry configuration for the room layer.

use std::time::Duration;

/// Configuration for lobby operations, presence, and reclamation.
///
/// The defaults are the protocol's reference timings; tests shrink them
/// to keep scenarios fast.
#[derive(Debug, Clone)]
pub struct LobbyConfig {
    /// Spacing between presence heartbeats.
    pub heartbeat_interval: Duration,

    /// Spacing between periodic reclamation sweeps run by a subscribed
    /// client.
    pub sweep_interval: Duration,

    /// Hard idle cap: a room whose `lastActivity` is older than this is
    /// reclaimed even if heartbeats are still fresh (stuck client).
    pub idle_cap: Duration,

    /// Presence window: a room with no ping newer than this counts as
    /// fully disconnected.
    pub presence_window: Duration,

    /// Grace period after creation before presence-based eviction
    /// applies, so a freshly created room isn't reclaimed while its host
    /// is still connecting.
    pub creation_grace: Duration,

    /// How many times a conditional write is retried with a fresh read
    /// before the operation gives up as contended.
    pub write_retries: u32,

    /// How many candidate codes creation tries before giving up on an
    /// unlucky streak of collisions.
    pub create_retries: u32,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(60),
            idle_cap: Duration::from_secs(15 * 60),
            presence_window: Duration::from_secs(2 * 60),
            creation_grace: Duration::from_secs(2 * 60),
            write_retries: 5,
            create_retries: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_reference_timings() {
        let config = LobbyConfig::default();
        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
        assert_eq!(config.idle_cap, Duration::from_secs(900));
        assert_eq!(config.presence_window, Duration::from_secs(120));
        assert_eq!(config.creation_grace, Duration::from_secs(120));
    }
}
