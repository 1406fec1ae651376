//! Host callback surface.

use crate::engine::SyncReport;
use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Which way an item moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncDirection {
    Upload,
    Download,
}

/// Callbacks the engine invokes as a pass progresses.
///
/// All callbacks are optional and run inline at the engine's suspension
/// points; keep them cheap.
#[derive(Clone, Default)]
pub struct SyncCallbacks {
    pub on_sync_start: Option<Arc<dyn Fn() + Send + Sync>>,
    pub on_sync_complete: Option<Arc<dyn Fn(&SyncReport) + Send + Sync>>,
    /// `(completed, total)` in processing order
    pub on_progress: Option<Arc<dyn Fn(usize, usize) + Send + Sync>>,
    pub on_item_synced: Option<Arc<dyn Fn(&str, SyncDirection) + Send + Sync>>,
    /// Pass-level failures only; per-item failures appear in the report
    pub on_sync_error: Option<Arc<dyn Fn(&Error) + Send + Sync>>,
    /// Fired on edges of the connectivity flag
    pub on_connection_change: Option<Arc<dyn Fn(bool) + Send + Sync>>,
}

impl SyncCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_sync_start(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_sync_start = Some(Arc::new(callback));
        self
    }

    pub fn on_sync_complete(
        mut self,
        callback: impl Fn(&SyncReport) + Send + Sync + 'static,
    ) -> Self {
        self.on_sync_complete = Some(Arc::new(callback));
        self
    }

    pub fn on_progress(mut self, callback: impl Fn(usize, usize) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    pub fn on_item_synced(
        mut self,
        callback: impl Fn(&str, SyncDirection) + Send + Sync + 'static,
    ) -> Self {
        self.on_item_synced = Some(Arc::new(callback));
        self
    }

    pub fn on_sync_error(mut self, callback: impl Fn(&Error) + Send + Sync + 'static) -> Self {
        self.on_sync_error = Some(Arc::new(callback));
        self
    }

    pub fn on_connection_change(
        mut self,
        callback: impl Fn(bool) + Send + Sync + 'static,
    ) -> Self {
        self.on_connection_change = Some(Arc::new(callback));
        self
    }
}

impl fmt::Debug for SyncCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncCallbacks")
            .field("on_sync_start", &self.on_sync_start.is_some())
            .field("on_sync_complete", &self.on_sync_complete.is_some())
            .field("on_progress", &self.on_progress.is_some())
            .field("on_item_synced", &self.on_item_synced.is_some())
            .field("on_sync_error", &self.on_sync_error.is_some())
            .field("on_connection_change", &self.on_connection_change.is_some())
            .finish()
    }
}
