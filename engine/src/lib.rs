//! # Tether Engine
//!
//! Bidirectional synchronization between a local key/value store and a
//! remote replica.
//!
//! The engine drives reconciliation passes over two change feeds: items
//! updated locally since the last sync, and items updated remotely. Pairs
//! that diverged are routed through the conflict resolver from
//! [`tether_merge`], and each resolution is applied as an upload, a
//! download, a merge of both sides, a delete, or a skip.
//!
//! ## Design Principles
//!
//! - **Pluggable edges**: storage and transport are capability traits
//!   ([`LocalStore`], [`RemoteBackend`]); the engine never names a provider
//! - **Offline first**: mutations made while disconnected queue up and are
//!   replayed on reconnect, with bounded memory
//! - **Failure isolation**: a failing item never aborts a pass; every remote
//!   call is wrapped in retry with exponential backoff
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tether_engine::{
//!     LocalStore, MemoryLocalStore, MemoryRemoteBackend, SyncConfig, SyncEngine, Value,
//! };
//!
//! # async fn run() -> tether_engine::Result<()> {
//! let local = Arc::new(MemoryLocalStore::new());
//! let remote = Arc::new(MemoryRemoteBackend::new());
//!
//! let engine = Arc::new(SyncEngine::new(local.clone(), remote, SyncConfig::default()));
//! engine.initialize().await?;
//!
//! local.set("greeting", Value::from("hello")).await?;
//! let report = engine.sync(Default::default()).await?;
//! assert_eq!(report.uploaded, 1);
//!
//! engine.destroy();
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency
//!
//! One engine instance serializes its own reconciliation: a second `sync()`
//! while one is in flight fails with [`Error::SyncInProgress`]. All IO
//! happens at await points; no state is shared across threads except behind
//! the engine's own locks.

pub mod backend;
pub mod callbacks;
pub mod config;
pub mod connectivity;
pub mod engine;
pub mod error;
pub mod item;
pub mod memory;
pub mod queue;
pub mod retry;
pub mod state;
pub mod store;
pub mod transform;

// Re-export main types at crate root
pub use backend::{ChangeSender, RemoteBackend, Subscription};
pub use callbacks::{SyncCallbacks, SyncDirection};
pub use config::{ConflictMode, SyncConfig, SyncStrategy};
pub use connectivity::{AlwaysOnline, ConnectivityProbe};
pub use engine::{SyncEngine, SyncError, SyncOptions, SyncReport};
pub use error::{Error, Result};
pub use item::{Metadata, StorageItem};
pub use memory::{MemoryLocalStore, MemoryRemoteBackend};
pub use queue::{OfflineQueue, QueueItem, QueueOp};
pub use retry::{with_retry, RetryPolicy};
pub use state::{PersistedState, SyncState, VersionVector};
pub use store::{is_reserved_key, LocalStore, QUEUE_KEY, STATE_KEY};
pub use transform::{Compressor, Encryptor};

#[cfg(feature = "http-probe")]
pub use connectivity::HttpProbe;

// Re-export the merge core types hosts interact with
pub use tether_merge::{
    ConflictResolution, ConflictResolver, ConflictType, FieldRule, Key, MergeStrategy,
    ResolutionAction, ResolverConfig, SyncConflict, Timestamp, Value,
};

/// Current wall-clock time in milliseconds since the epoch.
pub fn now_ms() -> Timestamp {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
