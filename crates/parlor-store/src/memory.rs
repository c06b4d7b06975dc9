//! In-process store implementation.
//!
//! Backs the same contract a hosted realtime database provides: atomic
//! merges, per-document version counters, snapshot fan-out to subscribers,
//! and disconnect-armed cleanup. State lives behind one `std::sync::Mutex`
//! that is never held across an await point, so the async trait methods
//! stay trivially cancel-safe.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::{
    DisconnectArm, Patch, Snapshot, Store, StoreError, Subscription, VERSION_FIELD,
};

/// Shared in-process document store.
///
/// Cheap to clone; clones share the same underlying documents, which is
/// how multiple clients in one process see each other's writes.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    docs: BTreeMap<String, Value>,
    watchers: HashMap<String, Vec<mpsc::UnboundedSender<Snapshot>>>,
}

impl Inner {
    /// Pushes the current snapshot of `key` to every live watcher.
    /// Watchers whose receiver is gone are pruned.
    fn notify(&mut self, key: &str) {
        let snapshot = self.docs.get(key).cloned();
        if let Some(list) = self.watchers.get_mut(key) {
            list.retain(|tx| tx.send(snapshot.clone()).is_ok());
            if list.is_empty() {
                self.watchers.remove(key);
            }
        }
    }
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".into()))
    }
}

impl Store for MemoryStore {
    type Arm = MemoryArm;

    async fn get(&self, key: &str) -> Result<Snapshot, StoreError> {
        Ok(self.lock()?.docs.get(key).cloned())
    }

    async fn create(&self, key: &str, mut doc: Value) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if inner.docs.contains_key(key) {
            return Err(StoreError::AlreadyExists(key.to_string()));
        }
        stamp_version(&mut doc, 0);
        inner.docs.insert(key.to_string(), doc);
        inner.notify(key);
        tracing::debug!(%key, "document created");
        Ok(())
    }

    async fn set(&self, key: &str, mut doc: Value) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let version = match inner.docs.get(key) {
            Some(existing) => version_of(existing) + 1,
            None => 0,
        };
        stamp_version(&mut doc, version);
        inner.docs.insert(key.to_string(), doc);
        inner.notify(key);
        Ok(())
    }

    async fn update(&self, key: &str, patch: Patch) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let doc = inner
            .docs
            .get_mut(key)
            .ok_or_else(|| StoreError::Missing(key.to_string()))?;
        let version = version_of(doc);
        apply_patch(doc, &patch)?;
        stamp_version(doc, version + 1);
        inner.notify(key);
        Ok(())
    }

    async fn update_if(
        &self,
        key: &str,
        expected_version: u64,
        patch: Patch,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let doc = inner
            .docs
            .get_mut(key)
            .ok_or_else(|| StoreError::Missing(key.to_string()))?;
        let found = version_of(doc);
        if found != expected_version {
            return Err(StoreError::Conflict {
                key: key.to_string(),
                expected: expected_version,
                found,
            });
        }
        apply_patch(doc, &patch)?;
        stamp_version(doc, found + 1);
        inner.notify(key);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if inner.docs.remove(key).is_some() {
            inner.notify(key);
            tracing::debug!(%key, "document removed");
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.lock()?.docs.keys().cloned().collect())
    }

    async fn subscribe(&self, key: &str) -> Result<Subscription, StoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock()?;
        // Deliver the current state immediately, then register for changes.
        let _ = tx.send(inner.docs.get(key).cloned());
        inner.watchers.entry(key.to_string()).or_default().push(tx);
        Ok(Subscription::new(rx))
    }

    async fn arm_on_disconnect(
        &self,
        key: &str,
        path: &str,
    ) -> Result<MemoryArm, StoreError> {
        validate_path(path)?;
        Ok(MemoryArm {
            inner: Arc::clone(&self.inner),
            key: key.to_string(),
            path: path.to_string(),
            armed: true,
        })
    }
}

// ---------------------------------------------------------------------------
// Disconnect arm
// ---------------------------------------------------------------------------

/// Armed cleanup for [`MemoryStore`].
///
/// The store executes the armed delete when the arm is dropped while still
/// armed, the in-process stand-in for "this connection died". A client
/// that terminates abnormally drops its arms and the cleanup fires; a
/// graceful teardown calls [`disarm`](DisconnectArm::disarm) first.
pub struct MemoryArm {
    inner: Arc<Mutex<Inner>>,
    key: String,
    path: String,
    armed: bool,
}

impl DisconnectArm for MemoryArm {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for MemoryArm {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        let applied = match inner.docs.get_mut(&self.key) {
            Some(doc) => {
                let version = version_of(doc);
                let ok = apply_op(doc, &self.path, &Value::Null).is_ok();
                if ok {
                    stamp_version(doc, version + 1);
                }
                ok
            }
            None => false,
        };
        if applied {
            tracing::debug!(key = %self.key, path = %self.path, "disconnect cleanup fired");
            inner.notify(&self.key);
        }
    }
}

// ---------------------------------------------------------------------------
// Patch application
// ---------------------------------------------------------------------------

fn validate_path(path: &str) -> Result<(), StoreError> {
    if path.is_empty() || path.split('/').any(str::is_empty) {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(())
}

fn apply_patch(doc: &mut Value, patch: &Patch) -> Result<(), StoreError> {
    for (path, value) in patch.ops() {
        apply_op(doc, path, value)?;
    }
    Ok(())
}

/// Sets (or, for null, deletes) the field addressed by a `/`-separated
/// path, creating intermediate objects along the way.
fn apply_op(doc: &mut Value, path: &str, value: &Value) -> Result<(), StoreError> {
    validate_path(path)?;
    let segments: Vec<&str> = path.split('/').collect();
    let (last, parents) = segments
        .split_last()
        .expect("validated path has at least one segment");

    let mut node = doc;
    for segment in parents {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        node = node
            .as_object_mut()
            .expect("just ensured object")
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    let map = node.as_object_mut().expect("just ensured object");
    if value.is_null() {
        map.remove(*last);
    } else {
        map.insert(last.to_string(), value.clone());
    }
    Ok(())
}

fn version_of(doc: &Value) -> u64 {
    doc.get(VERSION_FIELD).and_then(Value::as_u64).unwrap_or(0)
}

fn stamp_version(doc: &mut Value, version: u64) {
    if let Value::Object(map) = doc {
        map.insert(VERSION_FIELD.to_string(), version.into());
    }
}
