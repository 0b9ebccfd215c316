//! In-process LockCache with TTL expiry driven by a [`Clock`].

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};

use crate::ports::{Clock, LockCache, LockError, LockKey, LockOutcome};

pub struct MemoryLockCache<C> {
    clock: C,
    /// key -> expiry
    entries: Mutex<HashMap<LockKey, DateTime<Utc>>>,
}

impl<C: Clock> MemoryLockCache<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Drops expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize, LockError> {
        let now = self.clock.now();
        let mut entries = self.lock_entries()?;
        let before = entries.len();
        entries.retain(|_, expires_at| *expires_at > now);
        Ok(before - entries.len())
    }

    fn lock_entries(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<LockKey, DateTime<Utc>>>, LockError> {
        self.entries
            .lock()
            .map_err(|_| LockError::Unavailable("lock table poisoned".to_string()))
    }
}

#[async_trait]
impl<C: Clock> LockCache for MemoryLockCache<C> {
    async fn try_lock(&self, key: &LockKey, ttl: Duration) -> Result<LockOutcome, LockError> {
        let ttl = TimeDelta::from_std(ttl)
            .map_err(|e| LockError::Unavailable(format!("ttl out of range: {e}")))?;
        let now = self.clock.now();

        // check-and-set under one guard
        let mut entries = self.lock_entries()?;
        match entries.get(key) {
            Some(expires_at) if *expires_at > now => Ok(LockOutcome::AlreadyLocked),
            _ => {
                entries.insert(key.clone(), now + ttl);
                Ok(LockOutcome::Acquired)
            }
        }
    }
}
