//! Engine configuration.

use crate::callbacks::SyncCallbacks;
use crate::connectivity::ConnectivityProbe;
use crate::retry::RetryPolicy;
use crate::transform::{Compressor, Encryptor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tether_merge::{ConflictResolution, ResolverConfig, SyncConflict};

/// How change sets are selected for a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncStrategy {
    /// Scan everything on both sides
    Full,
    /// Changes since the last successful pass (default)
    #[default]
    Incremental,
    /// Reserved; falls back to incremental with a warning
    Delta,
    /// Only the keys given in the sync options
    Selective,
}

/// How divergent pairs are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictMode {
    LocalWins,
    RemoteWins,
    #[default]
    LastWriteWins,
    /// Structural merge, three-way when an ancestor is known
    AutoMerge,
    /// Leave conflicts unresolved for the host to handle
    Manual,
    /// Delegate to `custom_resolver`
    Custom,
}

/// A host-provided conflict resolution callback, consulted in
/// [`ConflictMode::Custom`].
pub type CustomConflictFn =
    Arc<dyn Fn(&SyncConflict) -> Option<ConflictResolution> + Send + Sync>;

/// Sync engine configuration.
#[derive(Clone)]
pub struct SyncConfig {
    /// Change-set selection
    pub strategy: SyncStrategy,
    /// Conflict handling mode
    pub conflict: ConflictMode,
    /// Settings for the embedded conflict resolver
    pub resolver: ResolverConfig,
    /// Host callback for [`ConflictMode::Custom`]
    pub custom_resolver: Option<CustomConflictFn>,
    /// Run a pass on this period, when set
    pub sync_interval: Option<Duration>,
    /// Subscribe to backend push events
    pub realtime: bool,
    /// Items between cooperative yields while draining the queue
    pub batch_size: usize,
    /// Backoff for every remote call
    pub retry: RetryPolicy,
    /// Queue mutations while disconnected
    pub offline_queue: bool,
    /// Offline queue bound
    pub max_queue_size: usize,
    /// This replica's identifier in the version vector
    pub replica_id: String,
    /// Emit per-item debug logs
    pub logging: bool,
    /// Host callbacks
    pub callbacks: SyncCallbacks,
    /// Payload compression at the upload/download boundary
    pub compression: Option<Arc<dyn Compressor>>,
    /// Payload encryption at the upload/download boundary
    pub encryption: Option<Arc<dyn Encryptor>>,
    /// Connectivity probe; the default HEAD probe is used when unset
    pub probe: Option<Arc<dyn ConnectivityProbe>>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            strategy: SyncStrategy::default(),
            conflict: ConflictMode::default(),
            resolver: ResolverConfig::default(),
            custom_resolver: None,
            sync_interval: None,
            realtime: false,
            batch_size: 100,
            retry: RetryPolicy::default(),
            offline_queue: true,
            max_queue_size: 1000,
            replica_id: "local".to_string(),
            logging: false,
            callbacks: SyncCallbacks::default(),
            compression: None,
            encryption: None,
            probe: None,
        }
    }
}

impl fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncConfig")
            .field("strategy", &self.strategy)
            .field("conflict", &self.conflict)
            .field("resolver", &self.resolver)
            .field("custom_resolver", &self.custom_resolver.is_some())
            .field("sync_interval", &self.sync_interval)
            .field("realtime", &self.realtime)
            .field("batch_size", &self.batch_size)
            .field("retry", &self.retry)
            .field("offline_queue", &self.offline_queue)
            .field("max_queue_size", &self.max_queue_size)
            .field("replica_id", &self.replica_id)
            .field("logging", &self.logging)
            .field("callbacks", &self.callbacks)
            .field("compression", &self.compression.is_some())
            .field("encryption", &self.encryption.is_some())
            .field("probe", &self.probe.is_some())
            .finish()
    }
}
