use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::errors::InventoryError;
use crate::inventory::{InventorySnapshot, InventorySource};

/// Holds the current inventory snapshot behind a watch channel. Readers clone
/// the `Arc` and never wait on a fetch; refreshes build the next snapshot off to
/// the side and swap it in whole.
pub struct InventoryCache {
    source: Arc<dyn InventorySource>,
    current: watch::Sender<Arc<InventorySnapshot>>,
    refresh_lock: Mutex<()>,
    fetch_timeout: Duration,
}

impl InventoryCache {
    pub fn new(source: Arc<dyn InventorySource>, fetch_timeout: Duration) -> Self {
        let (current, _) = watch::channel(Arc::new(InventorySnapshot::unloaded()));
        Self { source, current, refresh_lock: Mutex::new(()), fetch_timeout }
    }

    pub fn current(&self) -> Arc<InventorySnapshot> {
        self.current.borrow().clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.current.borrow().is_loaded()
    }

    /// Fetches from the source and swaps the snapshot in. On failure the
    /// previous snapshot stays current.
    pub async fn refresh(&self) -> Result<Arc<InventorySnapshot>, InventoryError> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    pub async fn reload(&self) -> Result<Arc<InventorySnapshot>, InventoryError> {
        info!(event_name = "inventory.reload.requested", source = self.source.name(), "reload requested");
        self.refresh().await
    }

    /// Returns the current snapshot, loading it first on a cold cache. The whole
    /// call, lock wait included, is bounded by the fetch timeout.
    pub async fn snapshot_or_load(&self) -> Result<Arc<InventorySnapshot>, InventoryError> {
        let current = self.current();
        if current.is_loaded() {
            return Ok(current);
        }

        let timeout_ms = self.fetch_timeout.as_millis() as u64;
        let load = async {
            let _guard = self.refresh_lock.lock().await;
            let current = self.current();
            if current.is_loaded() {
                return Ok(current);
            }
            self.refresh_locked().await
        };

        tokio::time::timeout(self.fetch_timeout, load)
            .await
            .map_err(|_| InventoryError::Timeout { timeout_ms })?
    }

    async fn refresh_locked(&self) -> Result<Arc<InventorySnapshot>, InventoryError> {
        let timeout_ms = self.fetch_timeout.as_millis() as u64;
        let fetched = tokio::time::timeout(self.fetch_timeout, self.source.fetch()).await;

        let projects = match fetched {
            Ok(Ok(projects)) if projects.is_empty() => Err(InventoryError::Empty),
            Ok(Ok(projects)) => Ok(projects),
            Ok(Err(error)) => Err(error),
            Err(_) => Err(InventoryError::Timeout { timeout_ms }),
        };

        let projects = match projects {
            Ok(projects) => projects,
            Err(error) => {
                warn!(
                    event_name = "inventory.refresh.failed",
                    source = self.source.name(),
                    error = %error,
                    kept_version = self.current.borrow().version(),
                    "inventory refresh failed, keeping previous snapshot"
                );
                return Err(error);
            }
        };

        let version = self.current.borrow().version() + 1;
        let snapshot = Arc::new(InventorySnapshot::new(version, projects));
        self.current.send_replace(snapshot.clone());

        info!(
            event_name = "inventory.snapshot.swapped",
            source = self.source.name(),
            version,
            project_count = snapshot.projects().len(),
            "inventory snapshot swapped"
        );

        Ok(snapshot)
    }

    /// Refreshes on a fixed period until the returned handle is aborted.
    pub fn spawn_refresh(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                // failures are logged inside refresh; the old snapshot keeps serving
                let _ = cache.refresh().await;
            }
        })
    }
}
