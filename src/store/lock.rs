//! Per-config locking for read-modify-write sequences.
//!
//! Version allocation (read max, insert max + 1) and active-version updates
//! (read config, set pointer, save) each run while holding the config's lock,
//! so concurrent writers against one config are serialized while writers on
//! different configs proceed in parallel.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, StoreError};

/// Registry of per-config async mutexes.
#[derive(Debug, Clone, Default)]
pub struct ConfigLocks {
    inner: Arc<Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>>,
}

/// Proof that the holder owns a config's lock. Released on drop.
#[derive(Debug)]
pub struct ConfigGuard {
    lock_id: Uuid,
    config_id: Uuid,
    acquired_at: DateTime<Utc>,
    _guard: OwnedMutexGuard<()>,
}

impl ConfigLocks {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for and takes the lock of a config.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry itself is poisoned.
    pub async fn acquire(&self, config_id: Uuid) -> Result<ConfigGuard> {
        let mutex = {
            let mut locks = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
            // Drop entries nobody holds or waits on.
            locks.retain(|_, m| Arc::strong_count(m) > 1);
            Arc::clone(locks.entry(config_id).or_default())
        };

        let guard = mutex.lock_owned().await;
        let lock = ConfigGuard {
            lock_id: Uuid::new_v4(),
            config_id,
            acquired_at: Utc::now(),
            _guard: guard,
        };
        debug!("Acquired config lock {} for {config_id}", lock.lock_id);
        Ok(lock)
    }

    /// Returns the number of configs with a live lock entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry is poisoned.
    pub fn tracked(&self) -> Result<usize> {
        let locks = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(locks.values().filter(|m| Arc::strong_count(m) > 1).count())
    }
}

impl ConfigGuard {
    /// Gets the lock ID.
    #[must_use]
    pub const fn lock_id(&self) -> Uuid {
        self.lock_id
    }

    /// Gets the locked config.
    #[must_use]
    pub const fn config_id(&self) -> Uuid {
        self.config_id
    }

    /// Gets when the lock was acquired.
    #[must_use]
    pub const fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }
}

impl Drop for ConfigGuard {
    fn drop(&mut self) {
        debug!("Released config lock {} for {}", self.lock_id, self.config_id);
    }
}
