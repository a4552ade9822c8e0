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

//! In-memory replica backend (for testing).
//!
//! ## Purpose
//! Simulates one independent replica per [`MemoryStore`], with the
//! fault-injection knobs the protocol tests need: a pool can be marked
//! down (connections fail) or given artificial latency (every operation
//! sleeps first).
//!
//! ## Limitations
//! - Not persistent (state lost on drop)
//! - Not distributed (single process only)
//! - Lazy expiry: expired entries are dropped on access, not by a sweeper

use crate::store::{Conn, Pool};
use crate::{LockError, LockResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn expired(&self) -> bool {
        self.expires_at.map(|at| at <= Instant::now()).unwrap_or(false)
    }
}

/// A single simulated replica: one keyspace with millisecond TTLs.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Unconditionally write a value with no TTL (test setup).
    pub async fn force_set(&self, key: &str, value: &str) {
        self.entries.write().await.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: None,
            },
        );
    }

    /// Current live value of `key`, or `None` if absent or expired.
    pub async fn value_of(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.write().await;
        Self::purge_expired(&mut entries, key);
        entries.get(key).map(|e| e.value.clone())
    }

    /// Remaining TTL of `key` in milliseconds; `-2` if missing, `-1` if the
    /// key carries no TTL.
    pub async fn pttl_of(&self, key: &str) -> i64 {
        let mut entries = self.entries.write().await;
        Self::purge_expired(&mut entries, key);
        match entries.get(key) {
            None => -2,
            Some(Entry { expires_at: None, .. }) => -1,
            Some(Entry { expires_at: Some(at), .. }) => {
                at.saturating_duration_since(Instant::now()).as_millis() as i64
            }
        }
    }

    async fn set_nx_px(&self, key: &str, value: &str, ttl: Duration) -> bool {
        let mut entries = self.entries.write().await;
        Self::purge_expired(&mut entries, key);
        if entries.contains_key(key) {
            return false;
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        true
    }

    async fn delete_if_equal(&self, key: &str, expected: &str) -> bool {
        let mut entries = self.entries.write().await;
        Self::purge_expired(&mut entries, key);
        match entries.get(key) {
            Some(e) if e.value == expected => {
                entries.remove(key);
                true
            }
            _ => false,
        }
    }

    async fn pexpire_if_equal(&self, key: &str, expected: &str, ttl: Duration) -> bool {
        let mut entries = self.entries.write().await;
        Self::purge_expired(&mut entries, key);
        match entries.get_mut(key) {
            Some(e) if e.value == expected => {
                e.expires_at = Some(Instant::now() + ttl);
                true
            }
            _ => false,
        }
    }

    fn purge_expired(entries: &mut HashMap<String, Entry>, key: &str) {
        if entries.get(key).map(|e| e.expired()).unwrap_or(false) {
            entries.remove(key);
        }
    }
}

/// Pool handing out connections to one [`MemoryStore`] replica.
#[derive(Clone, Default)]
pub struct MemoryPool {
    store: MemoryStore,
    down: Arc<AtomicBool>,
    latency_ms: Arc<AtomicU64>,
}

impl MemoryPool {
    /// Create a pool over a fresh, empty replica.
    pub fn new() -> Self {
        Self::default()
    }

    /// The replica this pool is bound to.
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Simulate a crashed replica: while down, `get` fails.
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    /// Inject latency ahead of every operation on new connections.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms.store(latency.as_millis() as u64, Ordering::SeqCst);
    }
}

#[async_trait]
impl Pool for MemoryPool {
    async fn get(&self) -> LockResult<Box<dyn Conn>> {
        if self.down.load(Ordering::SeqCst) {
            return Err(LockError::BackendError("replica is down".to_string()));
        }
        Ok(Box::new(MemoryConn {
            store: self.store.clone(),
            latency: Duration::from_millis(self.latency_ms.load(Ordering::SeqCst)),
        }))
    }
}

struct MemoryConn {
    store: MemoryStore,
    latency: Duration,
}

impl MemoryConn {
    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl Conn for MemoryConn {
    async fn set_nx_px(&mut self, key: &str, value: &str, ttl: Duration) -> LockResult<bool> {
        self.simulate_latency().await;
        Ok(self.store.set_nx_px(key, value, ttl).await)
    }

    async fn get(&mut self, key: &str) -> LockResult<Option<String>> {
        self.simulate_latency().await;
        Ok(self.store.value_of(key).await)
    }

    async fn pttl(&mut self, key: &str) -> LockResult<i64> {
        self.simulate_latency().await;
        Ok(self.store.pttl_of(key).await)
    }

    async fn delete_if_equal(&mut self, key: &str, expected: &str) -> LockResult<bool> {
        self.simulate_latency().await;
        Ok(self.store.delete_if_equal(key, expected).await)
    }

    async fn pexpire_if_equal(
        &mut self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> LockResult<bool> {
        self.simulate_latency().await;
        Ok(self.store.pexpire_if_equal(key, expected, ttl).await)
    }
}
