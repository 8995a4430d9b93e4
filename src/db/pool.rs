//! Connection lifecycle management.
//!
//! The [`ConnectionManager`] owns the single process-wide [`DbHandle`]. Callers
//! `acquire` it per request; when the handle has gone stale (closed, broken,
//! expired credentials, or explicitly invalidated) exactly one caller
//! reconnects while the others wait briefly for the new handle.
//!
//! Every handle the manager installs gets a new generation number. A caller
//! that saw a failure reports it against the [`Lease`] it used, so a late
//! failure on a replaced handle cannot mark its successor stale.

use crate::config::{BackendKind, DatabaseConfig};
use crate::db::backend::DbHandle;
use crate::error::{DbError, DbResult};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, RwLock};
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};

/// How long a caller waits for another caller's reconnect to finish.
pub const DEFAULT_RECONNECT_WAIT: Duration = Duration::from_secs(1);

/// A handle together with the generation it was installed as.
#[derive(Debug, Clone)]
pub struct Lease {
    pub handle: DbHandle,
    pub generation: u64,
}

pub struct ConnectionManager {
    config: DatabaseConfig,
    current: RwLock<Option<Lease>>,
    /// Set by `invalidate`; cleared when a new handle is installed.
    stale: AtomicBool,
    /// Held by the one caller currently reconnecting.
    reconnecting: AtomicBool,
    reconnected: Notify,
    reconnect_count: AtomicU64,
    next_generation: AtomicU64,
    shut_down: AtomicBool,
    reconnect_wait: Duration,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("backend", &self.config.kind())
            .field("stale", &self.stale.load(Ordering::Relaxed))
            .field("reconnecting", &self.reconnecting.load(Ordering::Relaxed))
            .field("reconnect_count", &self.reconnect_count())
            .finish()
    }
}

/// Releases the in-flight flag and wakes waiters, even if the reconnecting
/// future is dropped part way.
struct ReconnectGuard<'a>(&'a ConnectionManager);

impl Drop for ReconnectGuard<'_> {
    fn drop(&mut self) {
        self.0.reconnecting.store(false, Ordering::Release);
        self.0.reconnected.notify_waiters();
    }
}

impl ConnectionManager {
    /// Create a manager for the given backend. Nothing is opened until
    /// [`initialize`](Self::initialize).
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            config,
            current: RwLock::new(None),
            stale: AtomicBool::new(false),
            reconnecting: AtomicBool::new(false),
            reconnected: Notify::new(),
            reconnect_count: AtomicU64::new(0),
            next_generation: AtomicU64::new(1),
            shut_down: AtomicBool::new(false),
            reconnect_wait: DEFAULT_RECONNECT_WAIT,
        }
    }

    /// Override how long waiters block on another caller's reconnect.
    pub fn with_reconnect_wait(mut self, wait: Duration) -> Self {
        self.reconnect_wait = wait;
        self
    }

    /// Connect and create the schema. Errors here are startup failures.
    pub async fn initialize(&self) -> DbResult<()> {
        info!(
            backend = %self.config.kind(),
            target = %self.config.describe(),
            "Connecting to database"
        );
        let handle = open(&self.config).await?;
        self.install(handle).await;
        info!(backend = %self.config.kind(), "Database ready");
        Ok(())
    }

    pub fn kind(&self) -> BackendKind {
        self.config.kind()
    }

    /// Number of reconnect attempts since startup.
    pub fn reconnect_count(&self) -> u64 {
        self.reconnect_count.load(Ordering::Relaxed)
    }

    /// Get a usable handle, reconnecting if the current one is stale.
    pub async fn acquire(&self) -> DbResult<DbHandle> {
        self.lease().await.map(|lease| lease.handle)
    }

    /// Like [`acquire`](Self::acquire), keeping the generation so a failure
    /// can be reported with [`invalidate_lease`](Self::invalidate_lease).
    pub async fn lease(&self) -> DbResult<Lease> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(DbError::NotConnected);
        }
        if let Some(lease) = self.healthy_lease().await {
            return Ok(lease);
        }

        if self
            .reconnecting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let _guard = ReconnectGuard(self);
            // A reconnect may have completed between the health check and the flag
            if let Some(lease) = self.healthy_lease().await {
                return Ok(lease);
            }
            return self.reconnect().await;
        }

        self.wait_for_reconnect().await;
        // Whatever is current now, even if the reconnect is still running
        self.current
            .read()
            .await
            .clone()
            .ok_or(DbError::NotConnected)
    }

    /// Mark the current handle stale so the next `acquire` reconnects.
    pub fn invalidate(&self) {
        if !self.stale.swap(true, Ordering::AcqRel) {
            debug!(backend = %self.config.kind(), "Database handle invalidated");
        }
    }

    /// Mark the handle behind `lease` stale, unless it has already been
    /// replaced. Returns whether it was still current.
    pub async fn invalidate_lease(&self, lease: &Lease) -> bool {
        // Hold the read lock so a reconnect cannot install its handle in between
        let current = self.current.read().await;
        match current.as_ref() {
            Some(live) if live.generation == lease.generation => {
                self.invalidate();
                true
            }
            _ => {
                debug!(
                    backend = %self.config.kind(),
                    generation = lease.generation,
                    "Ignoring failure on a replaced handle"
                );
                false
            }
        }
    }

    /// Close the handle. Safe before `initialize` and safe to repeat.
    pub async fn shutdown(&self) {
        self.shut_down.store(true, Ordering::Release);
        let lease = self.current.write().await.take();
        if let Some(lease) = lease {
            lease.handle.close().await;
            info!(backend = %self.config.kind(), "Database connection closed");
        }
    }

    async fn healthy_lease(&self) -> Option<Lease> {
        if self.stale.load(Ordering::Acquire) {
            return None;
        }
        self.current
            .read()
            .await
            .as_ref()
            .filter(|lease| lease.handle.is_connected())
            .cloned()
    }

    /// Store a freshly opened handle under a new generation.
    async fn install(&self, handle: DbHandle) -> Lease {
        let lease = Lease {
            handle,
            generation: self.next_generation.fetch_add(1, Ordering::Relaxed),
        };
        let mut current = self.current.write().await;
        *current = Some(lease.clone());
        self.stale.store(false, Ordering::Release);
        lease
    }

    async fn reconnect(&self) -> DbResult<Lease> {
        let attempt = self.reconnect_count.fetch_add(1, Ordering::Relaxed) + 1;
        warn!(
            backend = %self.config.kind(),
            attempt,
            "Database handle is stale, reconnecting"
        );

        let old = self.current.write().await.take();
        if let Some(old) = old {
            old.handle.close().await;
        }

        match open(&self.config).await {
            Ok(handle) => {
                let lease = self.install(handle).await;
                info!(
                    backend = %self.config.kind(),
                    attempt,
                    generation = lease.generation,
                    "Reconnected to database"
                );
                Ok(lease)
            }
            Err(e) => {
                warn!(
                    backend = %self.config.kind(),
                    attempt,
                    error = %e,
                    "Reconnect failed"
                );
                Err(e)
            }
        }
    }

    async fn wait_for_reconnect(&self) {
        let deadline = Instant::now() + self.reconnect_wait;
        loop {
            let notified = self.reconnected.notified();
            tokio::pin!(notified);
            // Register before re-checking the flag so a notify in between is not lost
            notified.as_mut().enable();
            if !self.reconnecting.load(Ordering::Acquire) {
                return;
            }
            if timeout_at(deadline, notified).await.is_err() {
                debug!("Timed out waiting for reconnect");
                return;
            }
        }
    }
}

async fn open(config: &DatabaseConfig) -> DbResult<DbHandle> {
    let handle = DbHandle::connect(config).await?;
    if let Err(e) = handle.ensure_schema().await {
        handle.close().await;
        return Err(e);
    }
    Ok(handle)
}
