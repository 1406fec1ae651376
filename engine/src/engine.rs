//! The sync engine: reconciliation passes, point operations, and timers.
//!
//! # Reconciliation
//!
//! One pass drains the offline queue, collects items changed on each side
//! since the last pass, pairs them by key, and routes divergent pairs
//! through the conflict resolver. Per-item failures are collected in the
//! report and never abort the pass; the pass fails only when a change feed
//! itself cannot be read.

use crate::backend::{RemoteBackend, Subscription};
use crate::callbacks::SyncDirection;
use crate::config::{ConflictMode, SyncConfig, SyncStrategy};
use crate::connectivity::ConnectivityProbe;
use crate::error::{Error, Result};
use crate::item::{value_size, Metadata, StorageItem};
use crate::now_ms;
use crate::queue::{OfflineQueue, QueueItem, QueueOp};
use crate::retry::with_retry;
use crate::state::{PersistedState, SyncState};
use crate::store::{is_reserved_key, LocalStore, QUEUE_KEY, STATE_KEY};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tether_merge::{
    ConflictResolution, ConflictResolver, Key, MergeStrategy, ResolutionAction, SyncConflict,
    Timestamp, Value,
};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;

/// Options for a single reconciliation pass.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Restrict the local side to these keys
    pub keys: Option<Vec<Key>>,
}

/// A failure captured during a pass. Item-level when `key` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<Key>,
    pub message: String,
    pub retryable: bool,
}

/// The outcome of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// True when no errors were captured
    pub success: bool,
    pub uploaded: usize,
    pub downloaded: usize,
    pub conflicts_resolved: usize,
    pub skipped: usize,
    pub errors: Vec<SyncError>,
    pub duration_ms: u64,
    /// When the pass started (milliseconds since epoch)
    pub timestamp: Timestamp,
}

impl SyncReport {
    fn new(timestamp: Timestamp) -> Self {
        Self {
            success: false,
            uploaded: 0,
            downloaded: 0,
            conflicts_resolved: 0,
            skipped: 0,
            errors: Vec::new(),
            duration_ms: 0,
            timestamp,
        }
    }
}

/// Clears the reentrancy flag on every exit path.
struct ClearFlag<'a>(&'a AtomicBool);

impl Drop for ClearFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Drives reconciliation between a [`LocalStore`] and a [`RemoteBackend`].
///
/// One engine instance serves one logical replica. Construct it inside an
/// `Arc`; the periodic timer and the real-time subscription hold weak
/// references back to it.
pub struct SyncEngine {
    local: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteBackend>,
    probe: Option<Arc<dyn ConnectivityProbe>>,
    config: SyncConfig,
    resolver: parking_lot::Mutex<ConflictResolver>,
    state: RwLock<SyncState>,
    queue: Mutex<OfflineQueue>,
    syncing: AtomicBool,
    initialized: AtomicBool,
    destroyed: AtomicBool,
    tasks: parking_lot::Mutex<Vec<JoinHandle<()>>>,
    subscription: parking_lot::Mutex<Option<Subscription>>,
}

impl SyncEngine {
    /// Create an engine over the given store and backend.
    pub fn new(
        local: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteBackend>,
        config: SyncConfig,
    ) -> Self {
        let resolver = build_resolver(&config);
        let probe = config.probe.clone().or_else(default_probe);
        let queue = OfflineQueue::new(config.max_queue_size);

        Self {
            local,
            remote,
            probe,
            config,
            resolver: parking_lot::Mutex::new(resolver),
            state: RwLock::new(SyncState::default()),
            queue: Mutex::new(queue),
            syncing: AtomicBool::new(false),
            initialized: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
            tasks: parking_lot::Mutex::new(Vec::new()),
            subscription: parking_lot::Mutex::new(None),
        }
    }

    /// Load persisted state, probe connectivity, and start background work
    /// (periodic sync, real-time subscription) as configured.
    pub async fn initialize(self: &Arc<Self>) -> Result<()> {
        if self.destroyed.load(Ordering::SeqCst) {
            return Err(Error::NotInitialized);
        }

        if let Some(value) = self.local.get(STATE_KEY).await? {
            match PersistedState::from_value(&value) {
                Ok(persisted) => {
                    let mut state = self.state.write().await;
                    state.last_sync = persisted.last_sync;
                    state.version_vector = persisted.version_vector;
                }
                Err(err) => tracing::warn!(error = %err, "discarding unreadable sync state"),
            }
        }

        if self.config.offline_queue {
            if let Some(value) = self.local.get(QUEUE_KEY).await? {
                match OfflineQueue::from_value(&value, self.config.max_queue_size) {
                    Ok(loaded) => {
                        let pending = loaded.len();
                        *self.queue.lock().await = loaded;
                        self.state.write().await.pending_changes = pending;
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "discarding unreadable offline queue")
                    }
                }
            }
        }

        self.initialized.store(true, Ordering::SeqCst);
        self.check_connectivity().await;

        if self.config.realtime {
            self.start_realtime();
        }
        if let Some(interval) = self.config.sync_interval {
            self.start_periodic(interval);
        }

        tracing::info!(replica = %self.config.replica_id, "sync engine initialized");
        Ok(())
    }

    /// Run one reconciliation pass.
    pub async fn sync(&self, options: SyncOptions) -> Result<SyncReport> {
        self.ensure_ready()?;
        if self.syncing.swap(true, Ordering::SeqCst) {
            return Err(Error::SyncInProgress);
        }
        let _flag = ClearFlag(&self.syncing);

        let started = Instant::now();
        self.state.write().await.is_syncing = true;
        if let Some(cb) = &self.config.callbacks.on_sync_start {
            cb();
        }
        tracing::debug!("sync pass started");

        let outcome = self.run_pass(options).await;
        self.state.write().await.is_syncing = false;

        match outcome {
            Ok(mut report) => {
                report.duration_ms = started.elapsed().as_millis() as u64;
                report.success = report.errors.is_empty();
                tracing::info!(
                    uploaded = report.uploaded,
                    downloaded = report.downloaded,
                    conflicts = report.conflicts_resolved,
                    skipped = report.skipped,
                    errors = report.errors.len(),
                    duration_ms = report.duration_ms,
                    "sync pass finished"
                );
                if let Some(cb) = &self.config.callbacks.on_sync_complete {
                    cb(&report);
                }
                Ok(report)
            }
            Err(err) => {
                tracing::warn!(error = %err, "sync pass failed");
                if let Some(cb) = &self.config.callbacks.on_sync_error {
                    cb(&err);
                }
                Err(err)
            }
        }
    }

    async fn run_pass(&self, options: SyncOptions) -> Result<SyncReport> {
        let mut report = SyncReport::new(now_ms());

        if self.config.offline_queue && self.state.read().await.is_connected {
            self.drain_queue(&mut report).await;
        }

        let since = self.change_window(&options).await;
        let local_items = self
            .collect_local_changes(since, options.keys.as_deref())
            .await?;
        let mut remote_items =
            with_retry(&self.config.retry, || self.remote.list_changed_since(since)).await?;
        remote_items.retain(|item| !is_reserved_key(&item.key));

        let remote_lookup: HashMap<&str, &StorageItem> = remote_items
            .iter()
            .map(|item| (item.key.as_str(), item))
            .collect();
        let total = local_items.len() + remote_items.len();
        let mut completed = 0usize;
        let mut matched: HashSet<&str> = HashSet::new();

        for item in &local_items {
            let remote_item = remote_lookup.get(item.key.as_str()).copied();
            if remote_item.is_some() {
                matched.insert(item.key.as_str());
            }
            if let Err(err) = self.sync_pair(item, remote_item, &mut report).await {
                self.record_item_error(&mut report, &item.key, err);
            }
            completed += if remote_item.is_some() { 2 } else { 1 };
            self.notify_progress(completed, total);
        }

        for item in &remote_items {
            if matched.contains(item.key.as_str()) {
                continue;
            }
            match self.download_item(item).await {
                Ok(()) => {
                    report.downloaded += 1;
                    self.notify_item(&item.key, SyncDirection::Download);
                }
                Err(err) => self.record_item_error(&mut report, &item.key, err),
            }
            completed += 1;
            self.notify_progress(completed, total);
        }

        let pending = self.queue.lock().await.len();
        {
            let mut state = self.state.write().await;
            state.last_sync = now_ms();
            state.pending_changes = pending;
            state.version_vector.observe(&self.config.replica_id);
        }
        if let Err(err) = self.persist_state().await {
            tracing::warn!(error = %err, "failed to persist sync state");
            report.errors.push(SyncError {
                key: None,
                message: err.to_string(),
                retryable: false,
            });
        }

        Ok(report)
    }

    /// The "changes since" cutoff for this pass.
    async fn change_window(&self, options: &SyncOptions) -> Timestamp {
        let last_sync = self.state.read().await.last_sync;
        match self.config.strategy {
            SyncStrategy::Full => 0,
            SyncStrategy::Incremental => last_sync,
            SyncStrategy::Delta => {
                tracing::warn!("delta strategy is not implemented; falling back to incremental");
                last_sync
            }
            SyncStrategy::Selective => {
                if options.keys.is_none() {
                    tracing::warn!(
                        "selective strategy without keys; falling back to incremental"
                    );
                }
                last_sync
            }
        }
    }

    async fn collect_local_changes(
        &self,
        since: Timestamp,
        keys: Option<&[Key]>,
    ) -> Result<Vec<StorageItem>> {
        let keys: Vec<Key> = match keys {
            Some(keys) => keys.to_vec(),
            None => self.local.keys().await?,
        };

        let mut items = Vec::new();
        for key in keys {
            if is_reserved_key(&key) {
                continue;
            }
            let Some(metadata) = self.local.metadata(&key).await? else {
                continue;
            };
            if metadata.updated_at <= since {
                continue;
            }
            let Some(value) = self.local.get(&key).await? else {
                continue;
            };
            items.push(StorageItem::new(key, value, metadata));
        }
        Ok(items)
    }

    async fn sync_pair(
        &self,
        local_item: &StorageItem,
        remote_item: Option<&StorageItem>,
        report: &mut SyncReport,
    ) -> Result<()> {
        let Some(remote_item) = remote_item else {
            self.upload_item(local_item).await?;
            report.uploaded += 1;
            self.notify_item(&local_item.key, SyncDirection::Upload);
            return Ok(());
        };

        let conflict = SyncConflict::new(
            local_item.key.clone(),
            Some(local_item.value.clone()),
            Some(remote_item.value.clone()),
            local_item.metadata.updated_at,
            remote_item.metadata.updated_at,
        );
        let resolution = self.resolve_conflict(&conflict);
        self.apply_resolution(&conflict, resolution, report).await
    }

    fn resolve_conflict(&self, conflict: &SyncConflict) -> ConflictResolution {
        match self.config.conflict {
            ConflictMode::Manual => ConflictResolution::skip("manual resolution required"),
            ConflictMode::Custom => {
                if let Some(custom) = &self.config.custom_resolver {
                    if let Some(resolution) = custom(conflict) {
                        return resolution;
                    }
                }
                self.resolver.lock().resolve(conflict)
            }
            _ => self.resolver.lock().resolve(conflict),
        }
    }

    async fn apply_resolution(
        &self,
        conflict: &SyncConflict,
        resolution: ConflictResolution,
        report: &mut SyncReport,
    ) -> Result<()> {
        if self.config.logging {
            tracing::debug!(key = %conflict.key, action = ?resolution.action, "applying resolution");
        }
        match resolution.action {
            ResolutionAction::Upload => {
                let value = require_value(&conflict.key, resolution.value)?;
                self.upload_value(&conflict.key, value, conflict.local_timestamp)
                    .await?;
                report.uploaded += 1;
                self.notify_item(&conflict.key, SyncDirection::Upload);
            }
            ResolutionAction::Download => {
                let value = require_value(&conflict.key, resolution.value)?;
                self.local.set(&conflict.key, value).await?;
                report.downloaded += 1;
                self.notify_item(&conflict.key, SyncDirection::Download);
            }
            ResolutionAction::Merge => {
                let value = require_value(&conflict.key, resolution.value)?;
                // The merged value applies to both sides
                self.upload_value(&conflict.key, value.clone(), now_ms())
                    .await?;
                self.local.set(&conflict.key, value).await?;
                report.conflicts_resolved += 1;
                report.uploaded += 1;
                self.notify_item(&conflict.key, SyncDirection::Upload);
            }
            ResolutionAction::Delete => {
                // Delete whichever side still holds a value
                let remote_present = conflict
                    .remote_value
                    .as_ref()
                    .map(|v| !v.is_null())
                    .unwrap_or(false);
                if remote_present {
                    self.delete_remote_now(&conflict.key).await?;
                    report.uploaded += 1;
                    self.notify_item(&conflict.key, SyncDirection::Upload);
                } else {
                    self.local.delete(&conflict.key).await?;
                    report.downloaded += 1;
                    self.notify_item(&conflict.key, SyncDirection::Download);
                }
            }
            ResolutionAction::Skip => {
                report.skipped += 1;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Point operations
    // ------------------------------------------------------------------

    /// Upload a single value, queueing it when offline.
    pub async fn push(&self, key: &str, value: Value) -> Result<()> {
        self.ensure_ready()?;
        self.reject_reserved(key)?;

        if self.state.read().await.is_connected {
            self.upload_value(key, value, now_ms()).await
        } else if self.config.offline_queue {
            self.enqueue_offline(QueueItem::set(key, value, now_ms())).await
        } else {
            Err(Error::Disconnected)
        }
    }

    /// Fetch a single value from the backend. Requires connectivity.
    pub async fn pull(&self, key: &str) -> Result<Option<Value>> {
        self.ensure_ready()?;
        if !self.state.read().await.is_connected {
            return Err(Error::Disconnected);
        }
        with_retry(&self.config.retry, || self.remote.get(key)).await
    }

    /// Delete a key on the backend, queueing the deletion when offline.
    pub async fn delete_remote(&self, key: &str) -> Result<()> {
        self.ensure_ready()?;
        self.reject_reserved(key)?;

        if self.state.read().await.is_connected {
            self.delete_remote_now(key).await
        } else if self.config.offline_queue {
            self.enqueue_offline(QueueItem::delete(key, now_ms())).await
        } else {
            Err(Error::Disconnected)
        }
    }

    // ------------------------------------------------------------------
    // Connectivity
    // ------------------------------------------------------------------

    /// Probe connectivity and record the result.
    pub async fn check_connectivity(&self) -> bool {
        let online = match &self.probe {
            Some(probe) => probe.is_online().await,
            None => true,
        };
        self.set_connected(online).await;
        online
    }

    /// Record connectivity observed by the host. Fires
    /// `on_connection_change` on edges.
    pub async fn set_connected(&self, connected: bool) {
        let changed = {
            let mut state = self.state.write().await;
            let changed = state.is_connected != connected;
            state.is_connected = connected;
            changed
        };
        if changed {
            tracing::info!(connected, "connectivity changed");
            if let Some(cb) = &self.config.callbacks.on_connection_change {
                cb(connected);
            }
        }
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// A snapshot of the current sync state.
    pub async fn state(&self) -> SyncState {
        self.state.read().await.clone()
    }

    /// Pending mutations in the offline queue.
    pub async fn pending_changes(&self) -> usize {
        self.queue.lock().await.len()
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::SeqCst)
    }

    /// Access the embedded conflict resolver (history, field resolvers).
    pub fn with_resolver<R>(&self, f: impl FnOnce(&mut ConflictResolver) -> R) -> R {
        f(&mut self.resolver.lock())
    }

    /// Tear down timers and subscriptions. Subsequent operations fail with
    /// [`Error::NotInitialized`]; an in-flight pass completes naturally.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(subscription) = self.subscription.lock().take() {
            subscription.stop();
        }
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        tracing::info!("sync engine destroyed");
    }

    // ------------------------------------------------------------------
    // Offline queue
    // ------------------------------------------------------------------

    async fn drain_queue(&self, report: &mut SyncReport) {
        let snapshot = self.queue.lock().await.take_all();
        if snapshot.is_empty() {
            return;
        }
        tracing::info!(count = snapshot.len(), "draining offline queue");

        for (index, mut item) in snapshot.into_iter().enumerate() {
            if let Err(err) = self.replay_queued(&item).await {
                item.retry_count += 1;
                if item.retry_count >= self.config.retry.max_attempts {
                    tracing::warn!(
                        key = %item.key,
                        retries = item.retry_count,
                        "dropping queued mutation after repeated failures"
                    );
                    report.errors.push(SyncError {
                        key: Some(item.key.clone()),
                        message: err.to_string(),
                        retryable: false,
                    });
                } else {
                    self.queue.lock().await.restore(item);
                }
            }
            if (index + 1) % self.config.batch_size.max(1) == 0 {
                tokio::task::yield_now().await;
            }
        }

        if let Err(err) = self.persist_queue().await {
            tracing::warn!(error = %err, "failed to persist offline queue");
            report.errors.push(SyncError {
                key: None,
                message: err.to_string(),
                retryable: false,
            });
        }
        let pending = self.queue.lock().await.len();
        self.state.write().await.pending_changes = pending;
    }

    async fn replay_queued(&self, item: &QueueItem) -> Result<()> {
        match &item.op {
            QueueOp::Set { value } => {
                self.upload_value(&item.key, value.clone(), item.timestamp)
                    .await
            }
            QueueOp::Delete => self.delete_remote_now(&item.key).await,
        }
    }

    async fn enqueue_offline(&self, item: QueueItem) -> Result<()> {
        let key = item.key.clone();
        let (evicted, pending) = {
            let mut queue = self.queue.lock().await;
            let evicted = queue.enqueue(item);
            (evicted, queue.len())
        };
        if let Some(evicted) = evicted {
            tracing::warn!(key = %evicted.key, "offline queue full, dropped oldest mutation");
        }
        self.state.write().await.pending_changes = pending;
        self.persist_queue().await?;
        tracing::debug!(key = %key, pending, "queued offline mutation");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Transfer helpers
    // ------------------------------------------------------------------

    async fn upload_item(&self, item: &StorageItem) -> Result<()> {
        let (value, compressed, encrypted) = self.encode_outgoing(&item.value)?;
        let mut metadata = item.metadata.clone();
        metadata.compressed = compressed;
        metadata.encrypted = encrypted;
        metadata.size = value_size(&value);
        self.put_with_retry(&item.key, value, metadata).await
    }

    async fn upload_value(&self, key: &str, value: Value, timestamp: Timestamp) -> Result<()> {
        let (encoded, compressed, encrypted) = self.encode_outgoing(&value)?;
        let mut metadata = match self.local.metadata(key).await? {
            Some(existing) => existing,
            None => Metadata::for_value(key, &value, timestamp),
        };
        metadata.compressed = compressed;
        metadata.encrypted = encrypted;
        metadata.size = value_size(&encoded);
        self.put_with_retry(key, encoded, metadata).await
    }

    async fn put_with_retry(&self, key: &str, value: Value, metadata: Metadata) -> Result<()> {
        with_retry(&self.config.retry, || {
            self.remote.put(key, value.clone(), metadata.clone())
        })
        .await
    }

    async fn delete_remote_now(&self, key: &str) -> Result<()> {
        with_retry(&self.config.retry, || self.remote.delete(key)).await
    }

    async fn download_item(&self, item: &StorageItem) -> Result<()> {
        let value = self.decode_incoming(item.value.clone(), &item.metadata)?;
        self.local.set(&item.key, value).await
    }

    fn encode_outgoing(&self, value: &Value) -> Result<(Value, bool, bool)> {
        let mut encoded = value.clone();
        let mut compressed = false;
        let mut encrypted = false;
        if let Some(compressor) = &self.config.compression {
            encoded = compressor.compress(&encoded)?;
            compressed = true;
        }
        if let Some(encryptor) = &self.config.encryption {
            encoded = encryptor.encrypt(&encoded)?;
            encrypted = true;
        }
        Ok((encoded, compressed, encrypted))
    }

    fn decode_incoming(&self, value: Value, metadata: &Metadata) -> Result<Value> {
        let mut decoded = value;
        if metadata.encrypted {
            let Some(encryptor) = &self.config.encryption else {
                return Err(Error::backend(
                    "received an encrypted payload without an encryptor",
                ));
            };
            decoded = encryptor.decrypt(&decoded)?;
        }
        if metadata.compressed {
            let Some(compressor) = &self.config.compression else {
                return Err(Error::backend(
                    "received a compressed payload without a compressor",
                ));
            };
            decoded = compressor.decompress(&decoded)?;
        }
        Ok(decoded)
    }

    // ------------------------------------------------------------------
    // Background tasks
    // ------------------------------------------------------------------

    fn start_periodic(self: &Arc<Self>, interval: Duration) {
        let weak = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(engine) = weak.upgrade() else { break };
                if engine.destroyed.load(Ordering::SeqCst) {
                    break;
                }
                // Ticks are dropped while syncing or disconnected
                if engine.syncing.load(Ordering::SeqCst)
                    || !engine.state.read().await.is_connected
                {
                    continue;
                }
                if let Err(err) = engine.sync(SyncOptions::default()).await {
                    tracing::warn!(error = %err, "periodic sync failed");
                }
            }
        });
        self.tasks.lock().push(handle);
    }

    fn start_realtime(self: &Arc<Self>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let Some(subscription) = self.remote.subscribe(tx) else {
            tracing::debug!("backend does not support realtime subscriptions");
            return;
        };
        *self.subscription.lock() = Some(subscription);

        let weak = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            while let Some(item) = rx.recv().await {
                let Some(engine) = weak.upgrade() else { break };
                if engine.destroyed.load(Ordering::SeqCst) {
                    break;
                }
                if let Err(err) = engine.apply_remote_event(item).await {
                    tracing::warn!(error = %err, "failed to apply realtime event");
                }
            }
        });
        self.tasks.lock().push(handle);
    }

    /// Real-time writes bypass the reconciliation loop; `last_sync` is
    /// deliberately untouched.
    async fn apply_remote_event(&self, item: StorageItem) -> Result<()> {
        if is_reserved_key(&item.key) {
            return Ok(());
        }
        let value = self.decode_incoming(item.value, &item.metadata)?;
        self.local.set(&item.key, value).await?;
        self.notify_item(&item.key, SyncDirection::Download);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    async fn persist_queue(&self) -> Result<()> {
        let value = self.queue.lock().await.to_value()?;
        self.local.set(QUEUE_KEY, value).await
    }

    async fn persist_state(&self) -> Result<()> {
        let persisted = {
            let state = self.state.read().await;
            PersistedState {
                last_sync: state.last_sync,
                version_vector: state.version_vector.clone(),
            }
        };
        self.local.set(STATE_KEY, persisted.to_value()?).await
    }

    // ------------------------------------------------------------------
    // Small helpers
    // ------------------------------------------------------------------

    fn ensure_ready(&self) -> Result<()> {
        if self.destroyed.load(Ordering::SeqCst) || !self.initialized.load(Ordering::SeqCst) {
            return Err(Error::NotInitialized);
        }
        Ok(())
    }

    fn reject_reserved(&self, key: &str) -> Result<()> {
        if is_reserved_key(key) {
            return Err(Error::storage(format!("key '{key}' is reserved")));
        }
        Ok(())
    }

    fn record_item_error(&self, report: &mut SyncReport, key: &str, err: Error) {
        let retryable = err.is_retryable(&self.config.retry.retry_on_status_codes);
        tracing::warn!(key = %key, error = %err, "failed to sync item");
        report.errors.push(SyncError {
            key: Some(key.to_string()),
            message: err.to_string(),
            retryable,
        });
    }

    fn notify_progress(&self, completed: usize, total: usize) {
        if let Some(cb) = &self.config.callbacks.on_progress {
            cb(completed, total);
        }
    }

    fn notify_item(&self, key: &str, direction: SyncDirection) {
        if let Some(cb) = &self.config.callbacks.on_item_synced {
            cb(key, direction);
        }
    }
}

/// Map the engine-level conflict mode onto the embedded resolver.
fn build_resolver(config: &SyncConfig) -> ConflictResolver {
    let mut resolver_config = config.resolver.clone();
    resolver_config.default_strategy = match config.conflict {
        ConflictMode::LocalWins => MergeStrategy::LocalWins,
        ConflictMode::RemoteWins => MergeStrategy::RemoteWins,
        ConflictMode::LastWriteWins => MergeStrategy::LastWriteWins,
        ConflictMode::AutoMerge => MergeStrategy::DeepMerge,
        ConflictMode::Manual | ConflictMode::Custom => resolver_config.default_strategy,
    };
    if config.conflict == ConflictMode::AutoMerge {
        resolver_config.enable_three_way_merge = true;
    }
    ConflictResolver::new(resolver_config)
}

fn default_probe() -> Option<Arc<dyn ConnectivityProbe>> {
    #[cfg(feature = "http-probe")]
    {
        Some(Arc::new(crate::connectivity::HttpProbe::new()))
    }
    #[cfg(not(feature = "http-probe"))]
    {
        None
    }
}

fn require_value(key: &str, value: Option<Value>) -> Result<Value> {
    value.ok_or_else(|| {
        Error::Resolver(tether_merge::Error::Unresolvable {
            key: key.to_string(),
            reason: "resolution carries no value".to_string(),
        })
    })
}
