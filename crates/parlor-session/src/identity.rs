//! Local identity: the stable player token and display name.
//!
//! The vault is the browser's local storage (or whatever the host
//! platform offers); the token it holds is the player's identity for as
//! long as the vault survives. Everything here is an explicit object
//! passed to the client at construction, never an ambient singleton.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rand::Rng;

use parlor_protocol::{Player, PlayerId};

use crate::SessionError;

/// Vault key under which the player token is persisted.
pub const PLAYER_ID_KEY: &str = "parlor_player_id";

/// Vault key under which the display name is persisted.
pub const PLAYER_NAME_KEY: &str = "parlor_player_name";

/// Minimum display-name length after trimming.
const NAME_MIN: usize = 2;
/// Maximum display-name length after trimming.
const NAME_MAX: usize = 20;

/// The local key-value storage identity lives in.
pub trait IdentityVault: Send + Sync {
    /// Reads a stored value.
    fn load(&self, key: &str) -> Option<String>;

    /// Writes a value, replacing any previous one.
    fn store(&self, key: &str, value: &str);
}

/// An in-process vault for tests and demos.
#[derive(Clone, Default)]
pub struct MemoryVault {
    inner: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryVault {
    /// Creates an empty vault.
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityVault for MemoryVault {
    fn load(&self, key: &str) -> Option<String> {
        self.inner.lock().ok()?.get(key).cloned()
    }

    fn store(&self, key: &str, value: &str) {
        if let Ok(mut map) = self.inner.lock() {
            map.insert(key.to_string(), value.to_string());
        }
    }
}

/// Who this client is: the session context handed to the room client at
/// construction.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub player_id: PlayerId,
    pub name: String,
}

impl SessionContext {
    /// Restores the stable player token from the vault (generating and
    /// persisting a fresh one on first run) and adopts the given display
    /// name.
    ///
    /// # Errors
    /// [`SessionError::InvalidName`] if the trimmed name is outside
    /// 2–20 characters.
    pub fn restore_or_create(
        vault: &impl IdentityVault,
        name: &str,
    ) -> Result<Self, SessionError> {
        let name = validate_name(name)?;
        let token = match vault.load(PLAYER_ID_KEY) {
            Some(token) => token,
            None => {
                let token = generate_token();
                vault.store(PLAYER_ID_KEY, &token);
                token
            }
        };
        vault.store(PLAYER_NAME_KEY, &name);

        Ok(Self {
            player_id: PlayerId::new(token),
            name,
        })
    }

    /// The seated-player record this session writes into a room.
    pub fn as_player(&self, is_host: bool) -> Player {
        Player {
            id: self.player_id.clone(),
            name: self.name.clone(),
            is_host,
        }
    }
}

fn validate_name(raw: &str) -> Result<String, SessionError> {
    let trimmed = raw.trim();
    let len = trimmed.chars().count();
    if !(NAME_MIN..=NAME_MAX).contains(&len) {
        return Err(SessionError::InvalidName(raw.to_string()));
    }
    Ok(trimmed.to_string())
}

/// Generates a random 32-character hex token (128 bits of entropy).
fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
