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

//! Redis replica backend.
//!
//! ## Purpose
//! Maps the [`Pool`]/[`Conn`] seams onto one Redis replica: `SET NX PX` for
//! acquisition, Lua scripts for the conditional delete and conditional
//! PEXPIRE so both stay atomic at the replica.

use crate::store::{Conn, Pool};
use crate::{LockError, LockResult};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use redis::aio::ConnectionManager;
use redis::Script;
use std::time::Duration;
use tracing::instrument;

/// Delete `KEYS[1]` only if it still holds `ARGV[1]`.
static DELETE_IF_EQUAL: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r#"if redis.call("get", KEYS[1]) == ARGV[1] then
  return redis.call("del", KEYS[1])
else
  return 0
end"#,
    )
});

/// Reset the TTL of `KEYS[1]` to `ARGV[2]` ms only if it still holds `ARGV[1]`.
static PEXPIRE_IF_EQUAL: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r#"if redis.call("get", KEYS[1]) == ARGV[1] then
  return redis.call("pexpire", KEYS[1], ARGV[2])
else
  return 0
end"#,
    )
});

/// Connection pool bound to a single Redis replica.
///
/// Backed by a multiplexed [`ConnectionManager`] which reconnects on
/// failure; each [`Conn`] handed out is an independent handle onto it.
///
/// Example URLs:
/// - `redis://127.0.0.1/`
/// - `redis+tls://host:6379/`
#[derive(Clone)]
pub struct RedisPool {
    conn: ConnectionManager,
}

impl RedisPool {
    /// Create a pool for the replica at `redis_url`.
    #[instrument(skip(redis_url))]
    pub async fn new(redis_url: &str) -> LockResult<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| LockError::BackendError(format!("failed to create redis client: {e}")))?;
        let conn = client
            .get_tokio_connection_manager()
            .await
            .map_err(|e| LockError::BackendError(format!("failed to connect redis: {e}")))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl Pool for RedisPool {
    async fn get(&self) -> LockResult<Box<dyn Conn>> {
        Ok(Box::new(RedisConn {
            conn: self.conn.clone(),
        }))
    }
}

struct RedisConn {
    conn: ConnectionManager,
}

#[async_trait]
impl Conn for RedisConn {
    async fn set_nx_px(&mut self, key: &str, value: &str, ttl: Duration) -> LockResult<bool> {
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async(&mut self.conn)
            .await?;
        Ok(reply.as_deref() == Some("OK"))
    }

    async fn get(&mut self, key: &str) -> LockResult<Option<String>> {
        let value: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut self.conn)
            .await?;
        Ok(value)
    }

    async fn pttl(&mut self, key: &str) -> LockResult<i64> {
        let pttl: i64 = redis::cmd("PTTL")
            .arg(key)
            .query_async(&mut self.conn)
            .await?;
        Ok(pttl)
    }

    async fn delete_if_equal(&mut self, key: &str, expected: &str) -> LockResult<bool> {
        let deleted: i64 = DELETE_IF_EQUAL
            .key(key)
            .arg(expected)
            .invoke_async(&mut self.conn)
            .await?;
        Ok(deleted == 1)
    }

    async fn pexpire_if_equal(
        &mut self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> LockResult<bool> {
        let reset: i64 = PEXPIRE_IF_EQUAL
            .key(key)
            .arg(expected)
            .arg(ttl.as_millis() as u64)
            .invoke_async(&mut self.conn)
            .await?;
        Ok(reset == 1)
    }
}
