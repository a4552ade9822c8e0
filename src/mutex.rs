// SPDX-License-Identifier: LGPL-2.1-or-later
// Copyright (C) 2025 Shahzad A. Bhatti <bhatti@plexobject.com>
//
// This file is part of PlexSpaces.
//
// PlexSpaces is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 2.1 of the License, or
// (at your option) any later version.
//
// PlexSpaces is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with PlexSpaces. If not, see <https://www.gnu.org/licenses/>.

//! Distributed mutex implementing the Redlock acquisition protocol.
//!
//! ## Purpose
//! A [`Mutex`] names one lease across a fixed set of replicas. Acquisition
//! writes a fresh, unguessable value to every replica in parallel and holds
//! the lease iff a quorum accepted the write within the validity window.
//! Release and extension are conditional on the lease value, so a holder can
//! never delete or extend a lease it no longer owns.
//!
//! ## Concurrency
//! A `Mutex` is owned by one caller; distinct callers contending for the
//! same lease must each hold their own `Mutex` bound to the same name.
//! Within one operation the per-replica sub-operations run concurrently and
//! are aggregated once all complete.

use crate::quorum;
use crate::store::Pool;
use crate::value::GenValueFn;
use crate::{LockError, LockResult};
use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Function type mapping the 1-indexed attempt number to the backoff slept
/// before the next acquisition attempt.
pub type DelayFn = dyn Fn(u32) -> Duration + Send + Sync;

/// A distributed mutex over a fixed replica set.
///
/// Created by [`Redlock::new_mutex`](crate::Redlock::new_mutex). Long-lived
/// and reusable: the lease value is transient per acquisition.
pub struct Mutex {
    pub(crate) name: String,
    pub(crate) expiry: Duration,
    pub(crate) tries: u32,
    pub(crate) delay_func: Arc<DelayFn>,
    pub(crate) factor: f64,
    pub(crate) gen_value_func: Arc<GenValueFn>,
    pub(crate) quorum: usize,
    pub(crate) pools: Vec<Arc<dyn Pool>>,
    pub(crate) value: String,
    pub(crate) until: Option<Instant>,
}

impl Mutex {
    /// Name of the mutex; the key written to each replica.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lease value; empty while no lease is held.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Deadline the locally tracked lease is valid until.
    pub fn until(&self) -> Option<Instant> {
        self.until
    }

    /// Acquire the mutex.
    ///
    /// ## Behavior
    /// Attempts acquisition up to the configured number of tries. Each
    /// attempt writes a fresh lease value to every replica in parallel and
    /// succeeds iff a quorum accepted the write with validity to spare
    /// (expiry minus acquisition latency minus clock drift). A failed
    /// attempt releases its partial acquisitions best-effort, then backs
    /// off per the configured delay function.
    ///
    /// ## Returns
    /// - `Ok(())`: lease held; [`value`](Self::value) identifies it
    /// - `Err(LockError::LockFailed)`: retries exhausted without a valid
    ///   quorum
    /// - Any error from the value generator, propagated immediately
    pub async fn lock(&mut self) -> LockResult<()> {
        for attempt in 1..=self.tries {
            let value = (self.gen_value_func)().map_err(|e| {
                warn!(name = %self.name, error = %e, "lease value generation failed");
                e
            })?;

            let start = Instant::now();
            let n = self
                .act_on_pools(|pool| {
                    Self::try_acquire(pool, self.name.clone(), value.clone(), self.expiry)
                })
                .await;

            if let Some(validity) =
                quorum::decide(n, self.pools.len(), start.elapsed(), self.expiry, self.factor)
            {
                debug!(
                    name = %self.name,
                    successes = n,
                    validity_ms = validity.as_millis() as u64,
                    "mutex acquired"
                );
                self.value = value;
                self.until = Some(Instant::now() + validity);
                return Ok(());
            }

            debug!(name = %self.name, attempt, successes = n, "acquisition attempt failed");
            self.act_on_pools(|pool| Self::try_release(pool, self.name.clone(), value.clone()))
                .await;

            if attempt < self.tries {
                tokio::time::sleep((self.delay_func)(attempt)).await;
            }
        }

        warn!(name = %self.name, tries = self.tries, "mutex acquisition failed");
        Err(LockError::LockFailed)
    }

    /// Release the mutex.
    ///
    /// Conditionally deletes the lease on every replica in parallel; only
    /// replicas still holding this acquisition's value are affected.
    /// Returns `Err(LockError::LockFailed)` when fewer than a quorum of
    /// replicas confirmed the release, or when no lease is held.
    pub async fn unlock(&mut self) -> LockResult<()> {
        if self.value.is_empty() {
            return Err(LockError::LockFailed);
        }

        let value = self.value.clone();
        let n = self
            .act_on_pools(|pool| Self::try_release(pool, self.name.clone(), value.clone()))
            .await;

        if n < self.quorum {
            return Err(LockError::LockFailed);
        }
        self.value.clear();
        self.until = None;
        Ok(())
    }

    /// Extend the held lease by the configured expiry.
    ///
    /// Conditionally resets the TTL on every replica in parallel; the same
    /// quorum rule as [`unlock`](Self::unlock) applies. On success the
    /// locally tracked deadline is refreshed, though lease correctness
    /// always rests with the replicas.
    pub async fn extend(&mut self) -> LockResult<()> {
        if self.value.is_empty() {
            return Err(LockError::LockFailed);
        }

        let value = self.value.clone();
        let n = self
            .act_on_pools(|pool| {
                Self::try_extend(pool, self.name.clone(), value.clone(), self.expiry)
            })
            .await;

        if n < self.quorum {
            return Err(LockError::LockFailed);
        }
        let refreshed = self.expiry.saturating_sub(quorum::drift(self.expiry, self.factor));
        self.until = Some(Instant::now() + refreshed);
        Ok(())
    }

    /// Run one sub-operation per replica concurrently and count successes.
    ///
    /// Per-replica errors are logged and counted as non-success; they never
    /// abort the batch.
    async fn act_on_pools<F, Fut>(&self, op: F) -> usize
    where
        F: Fn(Arc<dyn Pool>) -> Fut,
        Fut: Future<Output = LockResult<bool>>,
    {
        let results = join_all(self.pools.iter().cloned().map(op)).await;
        let mut n = 0;
        for (replica, result) in results.into_iter().enumerate() {
            match result {
                Ok(true) => n += 1,
                Ok(false) => {}
                Err(e) => {
                    debug!(name = %self.name, replica, error = %e, "replica operation failed")
                }
            }
        }
        n
    }

    async fn try_acquire(
        pool: Arc<dyn Pool>,
        name: String,
        value: String,
        expiry: Duration,
    ) -> LockResult<bool> {
        let mut conn = pool.get().await?;
        conn.set_nx_px(&name, &value, expiry).await
    }

    async fn try_release(pool: Arc<dyn Pool>, name: String, value: String) -> LockResult<bool> {
        let mut conn = pool.get().await?;
        conn.delete_if_equal(&name, &value).await
    }

    async fn try_extend(
        pool: Arc<dyn Pool>,
        name: String,
        value: String,
        expiry: Duration,
    ) -> LockResult<bool> {
        let mut conn = pool.get().await?;
        conn.pexpire_if_equal(&name, &value, expiry).await
    }
}

#[cfg(all(test, feature = "memory-backend"))]
mod tests {
    use crate::memory::MemoryPool;
    use crate::redlock::{set_gen_value_func, set_retry_delay, set_tries, Redlock};
    use crate::{LockError, Pool};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn new_redlock(n: usize) -> (Vec<Arc<MemoryPool>>, Redlock) {
        let pools: Vec<Arc<MemoryPool>> = (0..n).map(|_| Arc::new(MemoryPool::new())).collect();
        let redlock = Redlock::new(pools.iter().map(|p| p.clone() as Arc<dyn Pool>).collect());
        (pools, redlock)
    }

    #[tokio::test]
    async fn test_lock_sets_value_and_deadline() {
        let (_, redlock) = new_redlock(5);
        let mut mutex = redlock.new_mutex("test-lock", []);

        mutex.lock().await.unwrap();
        assert_eq!(mutex.value().len(), 24);
        assert!(mutex.until().unwrap() > Instant::now());
    }

    #[tokio::test]
    async fn test_unlock_clears_lease() {
        let (pools, redlock) = new_redlock(5);
        let mut mutex = redlock.new_mutex("test-lock", []);

        mutex.lock().await.unwrap();
        mutex.unlock().await.unwrap();
        assert!(mutex.value().is_empty());
        assert!(mutex.until().is_none());
        for pool in &pools {
            assert!(pool.store().value_of("test-lock").await.is_none());
        }
    }

    #[tokio::test]
    async fn test_unlock_without_lease_fails() {
        let (_, redlock) = new_redlock(5);
        let mut mutex = redlock.new_mutex("test-lock", []);

        assert!(matches!(mutex.unlock().await, Err(LockError::LockFailed)));
    }

    #[tokio::test]
    async fn test_extend_without_lease_fails() {
        let (_, redlock) = new_redlock(5);
        let mut mutex = redlock.new_mutex("test-lock", []);

        assert!(matches!(mutex.extend().await, Err(LockError::LockFailed)));
    }

    #[tokio::test]
    async fn test_generator_error_aborts_immediately() {
        let (_, redlock) = new_redlock(5);
        let mut mutex = redlock.new_mutex(
            "test-lock",
            [
                set_gen_value_func(|| Err(LockError::ValueGeneration("entropy".to_string()))),
                set_tries(3),
                set_retry_delay(Duration::from_millis(1)),
            ],
        );

        let start = Instant::now();
        let result = mutex.lock().await;
        assert!(matches!(result, Err(LockError::ValueGeneration(_))));
        // no retries were attempted
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_lock_is_reusable_after_unlock() {
        let (_, redlock) = new_redlock(3);
        let mut mutex = redlock.new_mutex("test-lock", []);

        mutex.lock().await.unwrap();
        let first = mutex.value().to_string();
        mutex.unlock().await.unwrap();

        mutex.lock().await.unwrap();
        assert_ne!(mutex.value(), first);
        mutex.unlock().await.unwrap();
    }
}
