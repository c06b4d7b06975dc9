//! Realtime document-store abstraction for Parlor.
//!
//! Provides the [`Store`] trait that abstracts over shared key-value
//! document backends (a hosted realtime database, an in-process store for
//! tests and demos). A document is a JSON object addressed by a flat
//! string key; mutations are whole-document writes or atomic multi-path
//! merges ([`Patch`]). Subscribers observe a monotonic sequence of whole
//! document snapshots, never a torn read across the fields of one update.
//!
//! The store offers two write disciplines:
//!
//! - [`Store::update`] — last-write-wins per field. Two clients racing on
//!   a stale read can both succeed; the later physical write lands.
//! - [`Store::update_if`] — conditional on the document's version counter.
//!   A racing writer loses with [`StoreError::Conflict`] and must re-read.
//!
//! # Feature Flags
//!
//! - `memory` (default) — in-process [`MemoryStore`] backed by
//!   `std::sync::Mutex`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "memory")]
mod memory;

pub use error::StoreError;
#[cfg(feature = "memory")]
pub use memory::{MemoryArm, MemoryStore};

use std::future::Future;

use serde_json::Value;
use tokio::sync::mpsc;

/// Name of the store-managed version counter field at the document root.
///
/// The store materializes the counter inside the document so subscribers
/// can issue conditional writes against the version they last observed.
pub const VERSION_FIELD: &str = "version";

/// A whole-document snapshot: `None` means the document is absent
/// (never created, or deleted).
pub type Snapshot = Option<Value>;

// ---------------------------------------------------------------------------
// Patch
// ---------------------------------------------------------------------------

/// An atomic multi-path merge.
///
/// Each operation addresses a field by a `/`-separated path from the
/// document root (e.g. `gameData/winner`) and sets it to a value.
/// Setting a path to [`Value::Null`] deletes the addressed key (the
/// backend's merge semantics). All operations in one patch apply
/// indivisibly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    ops: Vec<(String, Value)>,
}

impl Patch {
    /// Creates an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a set operation for `path`.
    pub fn set(mut self, path: impl Into<String>, value: Value) -> Self {
        self.ops.push((path.into(), value));
        self
    }

    /// Adds a delete operation for `path` (a null write).
    pub fn delete(mut self, path: impl Into<String>) -> Self {
        self.ops.push((path.into(), Value::Null));
        self
    }

    /// Returns `true` if the patch carries no operations.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// The operations in application order.
    pub fn ops(&self) -> &[(String, Value)] {
        &self.ops
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// A live feed of document snapshots for one key.
///
/// The first snapshot (the document's state at subscription time) is
/// delivered immediately. Dropping the subscription detaches it.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Snapshot>,
}

impl Subscription {
    /// Wraps a receiver end. Store implementations push snapshots into
    /// the paired sender after every applied mutation.
    pub fn new(rx: mpsc::UnboundedReceiver<Snapshot>) -> Self {
        Self { rx }
    }

    /// Waits for the next snapshot.
    ///
    /// Returns `None` when the store side has closed the feed (store
    /// dropped or shut down).
    pub async fn recv(&mut self) -> Option<Snapshot> {
        self.rx.recv().await
    }
}

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

/// Store-managed cleanup armed per connection.
///
/// An armed path is deleted by the store when the owning connection dies,
/// including an abnormal client termination. Graceful teardown calls
/// [`disarm`](DisconnectArm::disarm) first to cancel the cleanup.
pub trait DisconnectArm: Send + 'static {
    /// Cancels the armed cleanup.
    fn disarm(self);
}

/// A shared realtime document store.
///
/// Implementations must apply each mutation indivisibly and notify every
/// subscriber of the key with the resulting whole-document snapshot.
/// There is no cross-client transaction beyond [`update_if`]'s version
/// check; callers own the read-modify-write discipline.
pub trait Store: Send + Sync + 'static {
    /// The disconnect-cleanup handle type produced by this store.
    type Arm: DisconnectArm;

    /// Reads the current document, or `None` if absent.
    fn get(&self, key: &str) -> impl Future<Output = Result<Snapshot, StoreError>> + Send;

    /// Creates a document that must not already exist.
    ///
    /// # Errors
    /// [`StoreError::AlreadyExists`] if a live document holds the key.
    fn create(
        &self,
        key: &str,
        doc: Value,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Replaces the document wholesale, creating it if absent.
    fn set(
        &self,
        key: &str,
        doc: Value,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Applies an atomic multi-path merge to an existing document.
    ///
    /// Last-write-wins: no version check is performed.
    ///
    /// # Errors
    /// [`StoreError::Missing`] if the document does not exist.
    fn update(
        &self,
        key: &str,
        patch: Patch,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Applies a merge only if the document's version counter still
    /// equals `expected_version`.
    ///
    /// # Errors
    /// [`StoreError::Conflict`] if another write landed first;
    /// [`StoreError::Missing`] if the document does not exist.
    fn update_if(
        &self,
        key: &str,
        expected_version: u64,
        patch: Patch,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Deletes the document. Idempotent: deleting an absent key succeeds.
    fn remove(&self, key: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Lists the keys of all live documents.
    fn list(&self) -> impl Future<Output = Result<Vec<String>, StoreError>> + Send;

    /// Opens a snapshot feed for the key. The current state is delivered
    /// immediately, then every subsequent applied mutation.
    fn subscribe(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Subscription, StoreError>> + Send;

    /// Arms a store-managed delete of `path` inside the document, to run
    /// when this connection dies.
    fn arm_on_disconnect(
        &self,
        key: &str,
        path: &str,
    ) -> impl Future<Output = Result<Self::Arm, StoreError>> + Send;
}
